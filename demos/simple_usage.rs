/// Complete memodb API demo
///
/// Demonstrates all major engine operations:
/// - CRUD operations (insert, find, update, replace, delete)
/// - Upserts
/// - Secondary indexes and uniqueness
/// - Metadata listings
/// - File-backed persistence
use serde_json::json;

use memodb::bson::document::Document;
use memodb::catalog::dataset::Handle;
use memodb::engine::Engine;
use memodb::engine::store::{FileStore, MemoryStore};

fn doc(v: serde_json::Value) -> Document {
    Document::try_from(&v).expect("valid document")
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("\n╔═══════════════════════════════════════════════╗");
    println!("║        memodb engine - Complete API Demo      ║");
    println!("╚═══════════════════════════════════════════════╝\n");

    // Step 1: Open an in-memory engine
    println!("Step 1: Opening in-memory engine...");
    let engine = Engine::new(MemoryStore)?;
    let books = Handle::new("library", "books");
    println!("Done!\n");

    // Step 2: INSERT
    println!("Step 2: INSERT - Adding documents...");
    let result = engine.insert(
        &books,
        vec![
            doc(json!({"_id": 1, "title": "Systems Programming", "year": 2019, "copies": 3})),
            doc(json!({"_id": 2, "title": "Database Internals", "year": 2019, "copies": 1})),
            doc(json!({"_id": 3, "title": "Designing Data Apps", "year": 2017, "copies": 5})),
        ],
        true,
    )?;
    println!("  Inserted {} documents\n", result.modified.len());

    // Step 3: FIND
    println!("Step 3: FIND - Querying documents...");
    let found = engine.find(&books, &doc(json!({"year": 2019})), None, 0, 0)?;
    println!("  year == 2019: {} results", found.matched.len());

    let sorted = engine.find(
        &books,
        &doc(json!({})),
        Some(&doc(json!({"year": -1, "title": 1}))),
        0,
        2,
    )?;
    for book in &sorted.matched {
        println!("  top: {}", book);
    }
    println!();

    // Step 4: UPDATE and UPSERT
    println!("Step 4: UPDATE - Checking out a copy...");
    engine.update(
        &books,
        &doc(json!({"_id": 2})),
        None,
        &doc(json!({"$inc": {"copies": -1}})),
        0,
        false,
    )?;

    let upserted = engine.update(
        &books,
        &doc(json!({"title": "The Missing Volume"})),
        None,
        &doc(json!({"$set": {"copies": 1}})),
        0,
        true,
    )?;
    if let Some(fresh) = &upserted.upserted {
        println!("  upserted with generated _id: {}\n", fresh);
    }

    // Step 5: Secondary index with uniqueness
    println!("Step 5: INDEX - Unique index on title...");
    let name = engine.create_index(&books, &doc(json!({"title": 1})), None, true, None)?;
    println!("  created index {:?}", name);

    let dup = engine.insert(
        &books,
        vec![doc(json!({"_id": 9, "title": "Database Internals"}))],
        false,
    )?;
    println!("  duplicate title rejected: {} error(s)\n", dup.errors.len());

    // Step 6: Metadata
    println!("Step 6: METADATA - Listings...");
    for db in engine.list_databases(None)? {
        println!("  database: {}", db);
    }
    for index in engine.list_indexes(&books, None)? {
        println!("  index: {}", index);
    }
    println!(
        "  documents in {}: {}\n",
        books,
        engine.num_documents(&books)?
    );

    // Step 7: DELETE
    println!("Step 7: DELETE - Removing old books...");
    let removed = engine.delete(&books, &doc(json!({"year": {"$lt": 2018}})), None, 0)?;
    println!("  deleted {} document(s)\n", removed.matched.len());

    // Step 8: Persistence via the file store
    println!("Step 8: PERSISTENCE - File-backed engine...");
    let dir = std::env::temp_dir().join("memodb-demo");
    std::fs::create_dir_all(&dir)?;
    let path = dir.join("library.mdb");
    {
        let persistent = Engine::new(FileStore::new(&path))?;
        persistent.insert(
            &books,
            vec![doc(json!({"title": "Persisted", "year": 2024}))],
            true,
        )?;
    }
    let reopened = Engine::new(FileStore::new(&path))?;
    println!(
        "  reopened from {}: {} document(s)",
        path.display(),
        reopened.num_documents(&books)?
    );
    std::fs::remove_file(&path).ok();

    println!("\nAll done!");
    Ok(())
}
