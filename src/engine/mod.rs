pub mod result;
pub mod store;

use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::bson::document::Document;
use crate::bson::objectid::ObjectId;
use crate::bson::value::Value;
use crate::catalog::dataset::{Dataset, Handle};
use crate::catalog::index::{Column, Index, IndexConfig};
use crate::catalog::namespace::ID_INDEX;
use crate::core::error::{Error, ErrorKind, Result};
use crate::engine::result::OpResult;
use crate::engine::store::Store;
use crate::query::{DefaultQueryEngine, QueryEngine};

/// The database engine: CRUD over namespaces with snapshot consistency.
///
/// One exclusive lock serializes every public operation. Mutations follow a
/// fixed sequence: clone the current dataset, clone the touched namespace,
/// mutate the clone, hand the new snapshot to the store, and only then
/// publish it as current. Readers handed documents from a snapshot keep a
/// stable view because published snapshots are never mutated.
pub struct Engine {
    inner: Mutex<Inner>,
}

struct Inner {
    dataset: Arc<Dataset>,
    store: Box<dyn Store>,
    queries: Box<dyn QueryEngine>,
}

impl Engine {
    /// Open an engine over a store, loading the initial dataset.
    pub fn new<S: Store + 'static>(store: S) -> Result<Self> {
        Engine::with_query_engine(store, DefaultQueryEngine)
    }

    /// Open with a custom match/update engine.
    pub fn with_query_engine<S, Q>(store: S, queries: Q) -> Result<Self>
    where
        S: Store + 'static,
        Q: QueryEngine + 'static,
    {
        let dataset = store.load()?;
        Ok(Engine {
            inner: Mutex::new(Inner {
                dataset: Arc::new(dataset),
                store: Box::new(store),
                queries: Box::new(queries),
            }),
        })
    }

    /// The current snapshot. Callers may hold it for as long as they like;
    /// later mutations publish fresh snapshots instead of touching it.
    pub fn dataset(&self) -> Arc<Dataset> {
        self.inner.lock().dataset.clone()
    }

    /// Find documents, optionally sorted, with bounded skip and limit
    /// (0 means unlimited). Returned documents alias the current snapshot.
    pub fn find(
        &self,
        handle: &Handle,
        query: &Document,
        sort: Option<&Document>,
        skip: usize,
        limit: usize,
    ) -> Result<OpResult> {
        let inner = self.inner.lock();
        let matched = inner.select(handle, query, sort, skip, limit)?;
        Ok(OpResult::with_matched(matched))
    }

    /// Insert documents. Missing `_id`s are generated; each document is
    /// privately cloned so later caller mutations cannot alias engine
    /// state. With `ordered` the first duplicate aborts the remainder;
    /// otherwise duplicates accumulate in `errors` and the rest proceed.
    /// The snapshot is published only when at least one document landed.
    pub fn insert(&self, handle: &Handle, docs: Vec<Document>, ordered: bool) -> Result<OpResult> {
        let mut inner = self.inner.lock();
        let mut snapshot = (*inner.dataset).clone();
        let mut ns = snapshot
            .namespace(handle)
            .map(|n| (**n).clone())
            .unwrap_or_default();

        let mut modified = Vec::new();
        let mut errors = Vec::new();

        for mut doc in docs {
            if doc.get("_id").is_none() {
                doc.prepend("_id", Value::ObjectId(ObjectId::new()));
            }
            let doc = Arc::new(doc);

            if ns.docs.contains(&doc) {
                errors.push(Error::new(
                    ErrorKind::DuplicateDocument,
                    format!("document already present in {}", handle),
                ));
                if ordered {
                    break;
                }
                continue;
            }

            let mut added: Vec<String> = Vec::new();
            let mut rejected_by: Option<String> = None;
            for (name, index) in ns.indexes.iter_mut() {
                if index.add(&doc)? {
                    added.push(name.clone());
                } else {
                    rejected_by = Some(name.clone());
                    break;
                }
            }
            if let Some(name) = rejected_by {
                for added_name in added {
                    if let Some(index) = ns.indexes.get_mut(&added_name) {
                        index.remove(&doc)?;
                    }
                }
                errors.push(duplicate_key(&name));
                if ordered {
                    break;
                }
                continue;
            }

            ns.docs.add(doc.clone())?;
            modified.push(doc);
        }

        if !modified.is_empty() {
            snapshot.namespaces.insert(handle.clone(), Arc::new(ns));
            inner.publish(snapshot)?;
            debug!(
                "insert {}: {} stored, {} rejected",
                handle,
                modified.len(),
                errors.len()
            );
        }
        Ok(OpResult { modified, errors, ..OpResult::empty() })
    }

    /// Replace at most one matching document, preserving its position.
    /// The replacement must keep the matched document's `_id`; with
    /// `upsert` a miss synthesizes a new document from query and
    /// replacement instead.
    pub fn replace(
        &self,
        handle: &Handle,
        query: &Document,
        sort: Option<&Document>,
        repl: Document,
        upsert: bool,
    ) -> Result<OpResult> {
        let mut inner = self.inner.lock();
        let matched = inner.select(handle, query, sort, 0, 1)?;
        let Some(orig) = matched.first().cloned() else {
            if upsert {
                return inner.upsert(handle, query, Some(repl), None);
            }
            return Ok(OpResult::empty());
        };

        let mut repl = repl;
        match repl.get("_id") {
            None => {
                let id = orig.id();
                repl.prepend("_id", id);
            }
            Some(rid) => {
                if *rid != orig.id() {
                    return Err(Error::new(
                        ErrorKind::ImmutableId,
                        "replacement must keep the matched document's _id".to_string(),
                    ));
                }
            }
        }
        let repl = Arc::new(repl);

        let mut snapshot = (*inner.dataset).clone();
        let mut ns = snapshot
            .namespace(handle)
            .map(|n| (**n).clone())
            .unwrap_or_default();
        for index in ns.indexes.values_mut() {
            index.remove(&orig)?;
        }
        for (name, index) in ns.indexes.iter_mut() {
            if !index.add(&repl)? {
                return Err(duplicate_key(name));
            }
        }
        ns.docs.replace(&orig, repl.clone())?;

        snapshot.namespaces.insert(handle.clone(), Arc::new(ns));
        inner.publish(snapshot)?;
        debug!("replace {}: _id {:?}", handle, repl.id());
        Ok(OpResult {
            matched: vec![orig],
            modified: vec![repl],
            ..OpResult::empty()
        })
    }

    /// Update up to `limit` matching documents in place (0 means all).
    /// `_id` is immutable; with `upsert` a miss synthesizes a document
    /// from the query skeleton and the update instead.
    pub fn update(
        &self,
        handle: &Handle,
        query: &Document,
        sort: Option<&Document>,
        update: &Document,
        limit: usize,
        upsert: bool,
    ) -> Result<OpResult> {
        let mut inner = self.inner.lock();
        let matched = inner.select(handle, query, sort, 0, limit)?;
        if matched.is_empty() {
            if upsert {
                return inner.upsert(handle, query, None, Some(update));
            }
            return Ok(OpResult::empty());
        }

        let mut clones: Vec<Document> = matched.iter().map(|d| (**d).clone()).collect();
        inner.queries.update(&mut clones, update, false)?;
        for (orig, clone) in matched.iter().zip(clones.iter()) {
            if clone.id() != orig.id() {
                return Err(Error::new(
                    ErrorKind::ImmutableId,
                    "update must not change _id".to_string(),
                ));
            }
        }
        let clones: Vec<Arc<Document>> = clones.into_iter().map(Arc::new).collect();

        let mut snapshot = (*inner.dataset).clone();
        let mut ns = snapshot
            .namespace(handle)
            .map(|n| (**n).clone())
            .unwrap_or_default();
        for (orig, clone) in matched.iter().zip(clones.iter()) {
            for index in ns.indexes.values_mut() {
                index.remove(orig)?;
            }
            for (name, index) in ns.indexes.iter_mut() {
                if !index.add(clone)? {
                    return Err(duplicate_key(name));
                }
            }
            ns.docs.replace(orig, clone.clone())?;
        }

        snapshot.namespaces.insert(handle.clone(), Arc::new(ns));
        inner.publish(snapshot)?;
        debug!("update {}: {} documents", handle, clones.len());
        Ok(OpResult {
            matched,
            modified: clones,
            ..OpResult::empty()
        })
    }

    /// Delete up to `limit` matching documents (0 means all). The returned
    /// documents stay reachable through any previously obtained snapshot.
    pub fn delete(
        &self,
        handle: &Handle,
        query: &Document,
        sort: Option<&Document>,
        limit: usize,
    ) -> Result<OpResult> {
        let mut inner = self.inner.lock();
        let matched = inner.select(handle, query, sort, 0, limit)?;
        if matched.is_empty() {
            return Ok(OpResult::empty());
        }

        let mut snapshot = (*inner.dataset).clone();
        let mut ns = snapshot
            .namespace(handle)
            .map(|n| (**n).clone())
            .unwrap_or_default();
        for doc in &matched {
            ns.docs.remove(doc)?;
            for index in ns.indexes.values_mut() {
                index.remove(doc)?;
            }
        }

        snapshot.namespaces.insert(handle.clone(), Arc::new(ns));
        inner.publish(snapshot)?;
        debug!("delete {}: {} documents", handle, matched.len());
        Ok(OpResult::with_matched(matched))
    }

    /// Drop one namespace, or every namespace of a database when the
    /// handle's collection is empty. Dropping nothing publishes nothing.
    pub fn drop_namespace(&self, handle: &Handle) -> Result<()> {
        let mut inner = self.inner.lock();
        let mut snapshot = (*inner.dataset).clone();
        let removed = if handle.is_database() {
            let targets: Vec<Handle> = snapshot
                .namespaces
                .keys()
                .filter(|h| h.db == handle.db)
                .cloned()
                .collect();
            for target in &targets {
                snapshot.namespaces.remove(target);
            }
            !targets.is_empty()
        } else {
            snapshot.namespaces.remove(handle).is_some()
        };
        if removed {
            inner.publish(snapshot)?;
            debug!("drop {}", handle);
        }
        Ok(())
    }

    /// Create an index, backfilling it from the namespace's documents. The
    /// namespace is created when absent. An empty name is derived from the
    /// columns as `path_1_<dir>_..._path_k_<dir>`. Recreating an identical
    /// index is a no-op returning its name.
    pub fn create_index(
        &self,
        handle: &Handle,
        keys: &Document,
        name: Option<&str>,
        unique: bool,
        partial: Option<Document>,
    ) -> Result<String> {
        let mut inner = self.inner.lock();
        let columns = inner.queries.columns(keys)?;
        let name = match name {
            Some(n) if !n.is_empty() => n.to_string(),
            _ => derive_index_name(&columns),
        };
        let config = IndexConfig { columns, unique, partial };

        let mut snapshot = (*inner.dataset).clone();
        let mut ns = snapshot
            .namespace(handle)
            .map(|n| (**n).clone())
            .unwrap_or_default();

        if let Some(existing) = ns.indexes.get(&name) {
            if *existing.config() == config {
                return Ok(name);
            }
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                format!("index {:?} already exists with different options", name),
            ));
        }

        let mut index = Index::from_config(config);
        for doc in ns.docs.list() {
            if !index.add(doc)? {
                return Err(duplicate_key(&name));
            }
        }
        ns.indexes.insert(name.clone(), index);

        snapshot.namespaces.insert(handle.clone(), Arc::new(ns));
        inner.publish(snapshot)?;
        debug!("create index {:?} on {}", name, handle);
        Ok(name)
    }

    /// Drop one index by name, or every index except the implicit `_id_`
    /// when the name is `"*"`. The `_id_` index cannot be dropped by name.
    pub fn drop_index(&self, handle: &Handle, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::new(
                ErrorKind::InvalidIndexName,
                "index name must not be empty".to_string(),
            ));
        }
        let mut inner = self.inner.lock();
        let mut snapshot = (*inner.dataset).clone();
        let Some(ns) = snapshot.namespace(handle) else {
            return Err(missing_namespace(handle));
        };
        let mut ns = (**ns).clone();

        if name == "*" {
            let before = ns.indexes.len();
            ns.indexes.retain(|n, _| n == ID_INDEX);
            if ns.indexes.len() == before {
                return Ok(());
            }
        } else {
            if name == ID_INDEX {
                return Err(Error::new(
                    ErrorKind::InvalidIndexName,
                    "the _id_ index cannot be dropped".to_string(),
                ));
            }
            if ns.indexes.remove(name).is_none() {
                return Err(Error::new(
                    ErrorKind::MissingIndex,
                    format!("no index named {:?} on {}", name, handle),
                ));
            }
        }

        snapshot.namespaces.insert(handle.clone(), Arc::new(ns));
        inner.publish(snapshot)?;
        debug!("drop index {:?} on {}", name, handle);
        Ok(())
    }

    /// Synthesized metadata for every database, sorted by name.
    pub fn list_databases(&self, query: Option<&Document>) -> Result<Vec<Arc<Document>>> {
        let inner = self.inner.lock();
        let mut dbs: Vec<(String, bool)> = Vec::new();
        for (handle, ns) in inner.dataset.namespaces.iter() {
            match dbs.iter_mut().find(|(name, _)| *name == handle.db) {
                Some((_, empty)) => *empty &= ns.docs().is_empty(),
                None => dbs.push((handle.db.clone(), ns.docs().is_empty())),
            }
        }
        let docs: Vec<Arc<Document>> = dbs
            .into_iter()
            .map(|(name, empty)| {
                let mut doc = Document::new();
                doc.set("name", Value::String(name));
                doc.set("sizeOnDisk", Value::Int64(0));
                doc.set("empty", Value::Boolean(empty));
                Arc::new(doc)
            })
            .collect();
        inner.filter_metadata(docs, query)
    }

    /// Synthesized metadata for every collection of a database, sorted by
    /// name.
    pub fn list_collections(
        &self,
        db: &str,
        query: Option<&Document>,
    ) -> Result<Vec<Arc<Document>>> {
        let inner = self.inner.lock();
        let docs: Vec<Arc<Document>> = inner
            .dataset
            .namespaces
            .keys()
            .filter(|handle| handle.db == db)
            .map(|handle| {
                let mut info = Document::new();
                info.set("readOnly", Value::Boolean(false));
                let mut doc = Document::new();
                doc.set("name", Value::String(handle.coll.clone()));
                doc.set("type", Value::String("collection".to_string()));
                doc.set("options", Value::Document(Document::new()));
                doc.set("info", Value::Document(info));
                Arc::new(doc)
            })
            .collect();
        inner.filter_metadata(docs, query)
    }

    /// Synthesized metadata for the namespace's indexes, sorted by name.
    pub fn list_indexes(
        &self,
        handle: &Handle,
        query: Option<&Document>,
    ) -> Result<Vec<Arc<Document>>> {
        let inner = self.inner.lock();
        let Some(ns) = inner.dataset.namespace(handle) else {
            return Err(missing_namespace(handle));
        };
        let docs: Vec<Arc<Document>> = ns
            .indexes()
            .iter()
            .map(|(name, index)| {
                let mut key = Document::new();
                for column in &index.config().columns {
                    let direction = if column.reverse { -1 } else { 1 };
                    key.set(column.path.to_string(), Value::Int32(direction));
                }
                let mut doc = Document::new();
                doc.set("v", Value::Int32(2));
                doc.set("key", Value::Document(key));
                doc.set("name", Value::String(name.clone()));
                if index.is_unique() && name != ID_INDEX {
                    doc.set("unique", Value::Boolean(true));
                }
                if let Some(partial) = &index.config().partial {
                    doc.set("partialFilterExpression", Value::Document(partial.clone()));
                }
                Arc::new(doc)
            })
            .collect();
        inner.filter_metadata(docs, query)
    }

    /// Number of documents in the namespace; absent namespaces count zero.
    pub fn num_documents(&self, handle: &Handle) -> Result<usize> {
        let inner = self.inner.lock();
        Ok(inner
            .dataset
            .namespace(handle)
            .map(|ns| ns.docs().len())
            .unwrap_or(0))
    }
}

impl Inner {
    /// Shared read path: sorted copy when requested, bounded skip, then
    /// the match engine's filter.
    fn select(
        &self,
        handle: &Handle,
        query: &Document,
        sort: Option<&Document>,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Arc<Document>>> {
        let Some(ns) = self.dataset.namespace(handle) else {
            return Ok(Vec::new());
        };
        let mut list: Vec<Arc<Document>> = ns.docs().list().to_vec();
        if let Some(spec) = sort {
            if !spec.is_empty() {
                list = self.queries.sort(&list, spec)?;
            }
        }
        if skip > 0 {
            let skip = skip.min(list.len());
            list.drain(..skip);
        }
        self.queries.filter(&list, query, limit)
    }

    /// Insert-if-absent half of replace/update: synthesize the document
    /// from the query's equality skeleton plus the replacement or update,
    /// then add it like an insert of one.
    fn upsert(
        &mut self,
        handle: &Handle,
        query: &Document,
        repl: Option<Document>,
        update: Option<&Document>,
    ) -> Result<OpResult> {
        let mut doc = self.queries.extract(query)?;
        if let Some(repl) = repl {
            let qid = doc.get("_id").cloned();
            let rid = repl.get("_id").cloned();
            if let (Some(qid), Some(rid)) = (&qid, &rid) {
                if qid != rid {
                    return Err(Error::new(
                        ErrorKind::MismatchedIds,
                        "query and replacement disagree on _id".to_string(),
                    ));
                }
            }
            doc = repl;
            if doc.get("_id").is_none() {
                if let Some(qid) = qid {
                    doc.prepend("_id", qid);
                }
            }
        } else if let Some(update) = update {
            self.queries.apply(&mut doc, update, true)?;
        }
        if doc.get("_id").is_none() {
            doc.prepend("_id", Value::ObjectId(ObjectId::new()));
        }
        let doc = Arc::new(doc);

        let mut snapshot = (*self.dataset).clone();
        let mut ns = snapshot
            .namespace(handle)
            .map(|n| (**n).clone())
            .unwrap_or_default();
        for (name, index) in ns.indexes.iter_mut() {
            if !index.add(&doc)? {
                return Err(duplicate_key(name));
            }
        }
        ns.docs.add(doc.clone())?;

        snapshot.namespaces.insert(handle.clone(), Arc::new(ns));
        self.publish(snapshot)?;
        debug!("upsert {}: _id {:?}", handle, doc.id());
        Ok(OpResult { upserted: Some(doc), ..OpResult::empty() })
    }

    /// Hand the snapshot to the store, then atomically make it current.
    /// A store failure leaves the previous dataset in place.
    fn publish(&mut self, snapshot: Dataset) -> Result<()> {
        self.store.store(&snapshot)?;
        self.dataset = Arc::new(snapshot);
        Ok(())
    }

    fn filter_metadata(
        &self,
        docs: Vec<Arc<Document>>,
        query: Option<&Document>,
    ) -> Result<Vec<Arc<Document>>> {
        match query {
            Some(q) => self.queries.filter(&docs, q, 0),
            None => Ok(docs),
        }
    }
}

fn duplicate_key(index: &str) -> Error {
    Error::new(
        ErrorKind::DuplicateKey,
        format!("duplicate key for index {:?}", index),
    )
}

fn missing_namespace(handle: &Handle) -> Error {
    Error::new(
        ErrorKind::MissingNamespace,
        format!("namespace {} does not exist", handle),
    )
}

fn derive_index_name(columns: &[Column]) -> String {
    columns
        .iter()
        .map(|c| format!("{}_{}", c.path, if c.reverse { "-1" } else { "1" }))
        .collect::<Vec<_>>()
        .join("_")
}
