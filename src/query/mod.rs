pub mod matcher;
pub mod sort;
pub mod update;

use std::sync::Arc;

use crate::bson::document::Document;
use crate::catalog::index::Column;
use crate::core::error::Result;

/// The match/update engine the database engine runs against.
///
/// The engine core never interprets query or update documents itself; it
/// routes them through this trait, so tests can swap in a reduced fake
/// (equality-only filters, `$set`-only updates) without touching CRUD
/// semantics.
pub trait QueryEngine: Send + Sync {
    /// Matching sublist of `docs` in input order; `limit == 0` means
    /// unlimited.
    fn filter(
        &self,
        docs: &[Arc<Document>],
        query: &Document,
        limit: usize,
    ) -> Result<Vec<Arc<Document>>>;

    /// Stable sorted copy of `docs` over an ordered (path, ±1) spec.
    fn sort(&self, docs: &[Arc<Document>], spec: &Document) -> Result<Vec<Arc<Document>>>;

    /// Apply an update document to one document in place. `upsert` enables
    /// insert-only operators.
    fn apply(&self, doc: &mut Document, update: &Document, upsert: bool) -> Result<()>;

    /// Apply an update document to every element in place.
    fn update(&self, docs: &mut [Document], update: &Document, upsert: bool) -> Result<()> {
        for doc in docs.iter_mut() {
            self.apply(doc, update, upsert)?;
        }
        Ok(())
    }

    /// The equality skeleton of a match expression, used to seed upserts.
    fn extract(&self, query: &Document) -> Result<Document>;

    /// Validate an index/sort key spec into columns.
    fn columns(&self, keys: &Document) -> Result<Vec<Column>>;
}

/// The full-featured engine backed by this crate's matcher and update
/// operator implementations.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultQueryEngine;

impl QueryEngine for DefaultQueryEngine {
    fn filter(
        &self,
        docs: &[Arc<Document>],
        query: &Document,
        limit: usize,
    ) -> Result<Vec<Arc<Document>>> {
        matcher::filter(docs, query, limit)
    }

    fn sort(&self, docs: &[Arc<Document>], spec: &Document) -> Result<Vec<Arc<Document>>> {
        sort::sort(docs, spec)
    }

    fn apply(&self, doc: &mut Document, update: &Document, upsert: bool) -> Result<()> {
        update::apply(doc, update, upsert)
    }

    fn extract(&self, query: &Document) -> Result<Document> {
        update::extract(query)
    }

    fn columns(&self, keys: &Document) -> Result<Vec<Column>> {
        sort::columns(keys)
    }
}
