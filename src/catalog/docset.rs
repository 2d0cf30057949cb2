use std::collections::HashMap;
use std::sync::Arc;

use crate::bson::document::Document;
use crate::core::error::{Error, ErrorKind, Result};

/// Identity key of a shared document: the Arc's pointer address.
fn key(doc: &Arc<Document>) -> usize {
    Arc::as_ptr(doc) as usize
}

/// An ordered list of documents with an identity-keyed membership index.
///
/// Insertion order is preserved in `list`; `index` maps each document's
/// identity to its position. Cloning shares the documents themselves (the
/// pointers are copied, so identities survive the clone).
#[derive(Debug, Clone, Default)]
pub struct DocumentSet {
    list: Vec<Arc<Document>>,
    index: HashMap<usize, usize>,
}

impl DocumentSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn list(&self) -> &[Arc<Document>] {
        &self.list
    }

    pub fn contains(&self, doc: &Arc<Document>) -> bool {
        self.index.contains_key(&key(doc))
    }

    pub fn position(&self, doc: &Arc<Document>) -> Option<usize> {
        self.index.get(&key(doc)).copied()
    }

    /// Append a document. Fails when the same document is already present.
    pub fn add(&mut self, doc: Arc<Document>) -> Result<()> {
        let k = key(&doc);
        if self.index.contains_key(&k) {
            return Err(Error::new(
                ErrorKind::DuplicateDocument,
                "document already present in set".to_string(),
            ));
        }
        self.index.insert(k, self.list.len());
        self.list.push(doc);
        Ok(())
    }

    /// Remove a document in O(1) by swapping with the last element.
    pub fn remove(&mut self, doc: &Arc<Document>) -> Result<()> {
        let k = key(doc);
        let Some(pos) = self.index.remove(&k) else {
            return Err(Error::new(
                ErrorKind::Internal,
                "document not present in set".to_string(),
            ));
        };
        self.list.swap_remove(pos);
        if pos < self.list.len() {
            self.index.insert(key(&self.list[pos]), pos);
        }
        Ok(())
    }

    /// Swap one document for another, keeping the position.
    pub fn replace(&mut self, old: &Arc<Document>, new: Arc<Document>) -> Result<()> {
        let Some(pos) = self.index.remove(&key(old)) else {
            return Err(Error::new(
                ErrorKind::Internal,
                "document not present in set".to_string(),
            ));
        };
        self.index.insert(key(&new), pos);
        self.list[pos] = new;
        Ok(())
    }
}
