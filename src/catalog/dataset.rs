use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::catalog::namespace::Namespace;

/// Identifier of a namespace: database name plus collection name.
/// Database-level operations leave `coll` empty.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Handle {
    pub db: String,
    pub coll: String,
}

impl Handle {
    pub fn new(db: impl Into<String>, coll: impl Into<String>) -> Self {
        Handle { db: db.into(), coll: coll.into() }
    }

    /// A database-level handle, addressing every collection of `db`.
    pub fn database(db: impl Into<String>) -> Self {
        Handle { db: db.into(), coll: String::new() }
    }

    pub fn is_database(&self) -> bool {
        self.coll.is_empty()
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.db, self.coll)
    }
}

impl From<(&str, &str)> for Handle {
    fn from((db, coll): (&str, &str)) -> Self {
        Handle::new(db, coll)
    }
}

/// One immutable snapshot of the whole database: every namespace, keyed by
/// handle.
///
/// Cloning copies only the namespace map; the namespaces behind the shared
/// pointers are cloned individually when a mutation touches them. A dataset
/// that has been published is never mutated again.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub(crate) namespaces: BTreeMap<Handle, Arc<Namespace>>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn namespace(&self, handle: &Handle) -> Option<&Arc<Namespace>> {
        self.namespaces.get(handle)
    }

    pub fn handles(&self) -> impl Iterator<Item = &Handle> {
        self.namespaces.keys()
    }

    pub fn len(&self) -> usize {
        self.namespaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_renders_dotted() {
        let h = Handle::new("db", "coll");
        assert_eq!(h.to_string(), "db.coll");
        assert!(!h.is_database());
        assert!(Handle::database("db").is_database());
    }

    #[test]
    fn test_clone_shares_namespaces() {
        let mut ds = Dataset::new();
        let h = Handle::new("d", "c");
        ds.namespaces.insert(h.clone(), Arc::new(Namespace::new()));

        let copy = ds.clone();
        assert!(Arc::ptr_eq(
            copy.namespace(&h).unwrap(),
            ds.namespace(&h).unwrap()
        ));
    }

    #[test]
    fn test_clone_map_is_independent() {
        let mut ds = Dataset::new();
        let h = Handle::new("d", "c");
        ds.namespaces.insert(h.clone(), Arc::new(Namespace::new()));

        let mut copy = ds.clone();
        copy.namespaces.remove(&h);
        assert!(ds.namespace(&h).is_some());
        assert!(copy.namespace(&h).is_none());
    }
}
