use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::bson::document::Document;
use crate::bson::path::Path;
use crate::bson::value::Value;
use crate::core::error::Result;
use crate::query::matcher;

/// One indexed column: the path whose value feeds the key, and whether the
/// column sorts descending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub path: Path,
    pub reverse: bool,
}

/// Index definition: what is indexed, independent of which documents
/// currently occupy it. This is the part a store persists; occupancy is
/// rebuilt by re-adding documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    pub columns: Vec<Column>,
    pub unique: bool,
    pub partial: Option<Document>,
}

#[derive(Debug, Clone)]
struct IndexEntry {
    key: Vec<Value>,
    docs: Vec<Arc<Document>>,
}

/// A sorted multi-key index over one namespace's documents.
///
/// Entries are kept sorted by the extracted key tuple, column-wise reversed
/// where flagged. Documents sharing a key stay in insertion order; a unique
/// index rejects the second occupant of a key. An optional partial filter
/// restricts which documents participate; filter evaluation errors
/// propagate to the caller.
#[derive(Debug, Clone)]
pub struct Index {
    config: IndexConfig,
    entries: Vec<IndexEntry>,
}

impl Index {
    pub fn new(columns: Vec<Column>, unique: bool, partial: Option<Document>) -> Self {
        Index {
            config: IndexConfig { columns, unique, partial },
            entries: Vec::new(),
        }
    }

    pub fn from_config(config: IndexConfig) -> Self {
        Index { config, entries: Vec::new() }
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn is_unique(&self) -> bool {
        self.config.unique
    }

    /// Key tuple extracted at each column's path. Unresolved paths yield
    /// `Missing`, which orders (and collides) like an explicit null.
    pub fn key_for(&self, doc: &Document) -> Vec<Value> {
        self.config
            .columns
            .iter()
            .map(|c| doc.get_path(&c.path))
            .collect()
    }

    fn compare_keys(&self, a: &[Value], b: &[Value]) -> Ordering {
        for (i, column) in self.config.columns.iter().enumerate() {
            let ord = match (a.get(i), b.get(i)) {
                (Some(x), Some(y)) => x.compare(y),
                _ => Ordering::Equal,
            };
            let ord = if column.reverse { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    fn search(&self, key: &[Value]) -> std::result::Result<usize, usize> {
        self.entries.binary_search_by(|e| self.compare_keys(&e.key, key))
    }

    /// Whether the document participates, per the partial filter.
    fn participates(&self, doc: &Document) -> Result<bool> {
        match &self.config.partial {
            Some(filter) => matcher::matches(doc, filter),
            None => Ok(true),
        }
    }

    /// Insert a document. Returns true on success and for documents the
    /// partial filter excludes; false when a unique key is already taken.
    pub fn add(&mut self, doc: &Arc<Document>) -> Result<bool> {
        if !self.participates(doc)? {
            return Ok(true);
        }
        let key = self.key_for(doc);
        match self.search(&key) {
            Ok(pos) => {
                if self.config.unique {
                    return Ok(false);
                }
                let entry = &mut self.entries[pos];
                if !entry.docs.iter().any(|d| Arc::ptr_eq(d, doc)) {
                    entry.docs.push(doc.clone());
                }
                Ok(true)
            }
            Err(pos) => {
                self.entries.insert(pos, IndexEntry { key, docs: vec![doc.clone()] });
                Ok(true)
            }
        }
    }

    /// Remove a document; a no-op when it was never added (for instance
    /// because the partial filter excluded it).
    pub fn remove(&mut self, doc: &Arc<Document>) -> Result<()> {
        if !self.participates(doc)? {
            return Ok(());
        }
        let key = self.key_for(doc);
        if let Ok(pos) = self.search(&key) {
            let entry = &mut self.entries[pos];
            entry.docs.retain(|d| !Arc::ptr_eq(d, doc));
            if entry.docs.is_empty() {
                self.entries.remove(pos);
            }
        }
        Ok(())
    }

    /// Documents whose key equals `key` exactly, in insertion order.
    pub fn lookup(&self, key: &[Value]) -> Vec<Arc<Document>> {
        match self.search(key) {
            Ok(pos) => self.entries[pos].docs.clone(),
            Err(_) => Vec::new(),
        }
    }

    /// Documents with keys in the inclusive range [lo, hi], in key order.
    /// Either bound may be absent; `reverse` walks the range backwards.
    pub fn range(
        &self,
        lo: Option<&[Value]>,
        hi: Option<&[Value]>,
        reverse: bool,
    ) -> Vec<Arc<Document>> {
        let start = match lo {
            Some(k) => self
                .entries
                .partition_point(|e| self.compare_keys(&e.key, k) == Ordering::Less),
            None => 0,
        };
        let end = match hi {
            Some(k) => self
                .entries
                .partition_point(|e| self.compare_keys(&e.key, k) != Ordering::Greater),
            None => self.entries.len(),
        };
        if start >= end {
            return Vec::new();
        }
        let slice = &self.entries[start..end];
        let mut out = Vec::new();
        if reverse {
            for entry in slice.iter().rev() {
                out.extend(entry.docs.iter().cloned());
            }
        } else {
            for entry in slice {
                out.extend(entry.docs.iter().cloned());
            }
        }
        out
    }

    /// Every indexed document in key order.
    pub fn list(&self) -> Vec<Arc<Document>> {
        self.range(None, None, false)
    }

    pub fn len(&self) -> usize {
        self.entries.iter().map(|e| e.docs.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// How many times the document occurs in the index (0 or 1 when the
    /// invariants hold).
    pub fn occurrences(&self, doc: &Arc<Document>) -> usize {
        self.entries
            .iter()
            .map(|e| e.docs.iter().filter(|d| Arc::ptr_eq(d, doc)).count())
            .sum()
    }
}
