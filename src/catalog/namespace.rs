use std::collections::BTreeMap;

use crate::bson::path::Path;
use crate::catalog::docset::DocumentSet;
use crate::catalog::index::{Column, Index};

/// Name of the implicit primary-key index every namespace carries.
pub const ID_INDEX: &str = "_id_";

/// One collection's documents plus its named indexes.
///
/// A namespace is always created with the implicit unique `_id_` index.
/// Cloning clones the document set and every index eagerly, but the
/// documents themselves are shared: mutating a clone never observably
/// affects the original.
#[derive(Debug, Clone)]
pub struct Namespace {
    pub(crate) docs: DocumentSet,
    pub(crate) indexes: BTreeMap<String, Index>,
}

impl Namespace {
    pub fn new() -> Self {
        let mut ns = Namespace::empty();
        let id_index = Index::new(
            vec![Column { path: Path::parse("_id"), reverse: false }],
            true,
            None,
        );
        ns.indexes.insert(ID_INDEX.to_string(), id_index);
        ns
    }

    /// A namespace with no indexes at all; occupancy and indexes are
    /// reattached by the store when it rebuilds a loaded image.
    pub(crate) fn empty() -> Self {
        Namespace {
            docs: DocumentSet::new(),
            indexes: BTreeMap::new(),
        }
    }

    pub fn docs(&self) -> &DocumentSet {
        &self.docs
    }

    pub fn indexes(&self) -> &BTreeMap<String, Index> {
        &self.indexes
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Namespace::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bson::document::Document;
    use serde_json::json;
    use std::sync::Arc;

    fn doc(v: serde_json::Value) -> Arc<Document> {
        Arc::new(Document::try_from(&v).unwrap())
    }

    #[test]
    fn test_new_namespace_has_id_index() {
        let ns = Namespace::new();
        let index = ns.indexes().get(ID_INDEX).unwrap();
        assert!(index.is_unique());
        assert_eq!(index.config().columns.len(), 1);
        assert_eq!(index.config().columns[0].path, Path::parse("_id"));
    }

    #[test]
    fn test_id_index_rejects_duplicate_ids() {
        let mut ns = Namespace::new();
        let a = doc(json!({"_id": 1}));
        let b = doc(json!({"_id": 1}));
        let id_index = ns.indexes.get_mut(ID_INDEX).unwrap();
        assert!(id_index.add(&a).unwrap());
        assert!(!id_index.add(&b).unwrap());
    }

    #[test]
    fn test_clone_is_isolated() {
        let mut ns = Namespace::new();
        let a = doc(json!({"_id": 1}));
        ns.docs.add(a.clone()).unwrap();
        ns.indexes.get_mut(ID_INDEX).unwrap().add(&a).unwrap();

        let mut copy = ns.clone();
        let b = doc(json!({"_id": 2}));
        copy.docs.add(b.clone()).unwrap();
        copy.indexes.get_mut(ID_INDEX).unwrap().add(&b).unwrap();
        copy.docs.remove(&a).unwrap();
        copy.indexes.get_mut(ID_INDEX).unwrap().remove(&a).unwrap();

        // the original still sees exactly its own document
        assert_eq!(ns.docs().len(), 1);
        assert!(ns.docs().contains(&a));
        assert_eq!(ns.indexes()[ID_INDEX].occurrences(&a), 1);
        assert_eq!(ns.indexes()[ID_INDEX].occurrences(&b), 0);
    }
}
