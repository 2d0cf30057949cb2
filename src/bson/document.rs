use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::bson::value::Value;

/// An ordered sequence of (key, value) pairs.
///
/// Key order is preserved through every mutation: overwriting an existing
/// key keeps its position, setting a new key appends at the end.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    entries: Vec<(String, Value)>,
}

impl Document {
    pub fn new() -> Self {
        Document { entries: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Set a key, overwriting in place or appending when new.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Set a key at the front of the document; used for generated `_id`s.
    pub fn prepend(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.entries.insert(0, (key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The document's `_id`, or `Missing` when it has none.
    pub fn id(&self) -> Value {
        self.get("_id").cloned().unwrap_or(Value::Missing)
    }

    /// Element-wise comparison: (key, value) pairs in document order, the
    /// shorter prefix ordering first.
    pub fn compare(&self, other: &Document) -> Ordering {
        for ((ka, va), (kb, vb)) in self.entries.iter().zip(other.entries.iter()) {
            let ord = ka.as_bytes().cmp(kb.as_bytes());
            if ord != Ordering::Equal {
                return ord;
            }
            let ord = va.compare(vb);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        self.entries.len().cmp(&other.entries.len())
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_preserved() {
        let mut doc = Document::new();
        doc.set("b", Value::Int32(1));
        doc.set("a", Value::Int32(2));
        doc.set("c", Value::Int32(3));
        assert_eq!(doc.keys().collect::<Vec<_>>(), vec!["b", "a", "c"]);

        // overwrite keeps position
        doc.set("a", Value::Int32(9));
        assert_eq!(doc.keys().collect::<Vec<_>>(), vec!["b", "a", "c"]);
        assert_eq!(doc.get("a"), Some(&Value::Int32(9)));
    }

    #[test]
    fn test_remove_and_reinsert_appends() {
        let mut doc = Document::new();
        doc.set("a", Value::Int32(1));
        doc.set("b", Value::Int32(2));
        assert_eq!(doc.remove("a"), Some(Value::Int32(1)));
        doc.set("a", Value::Int32(3));
        assert_eq!(doc.keys().collect::<Vec<_>>(), vec!["b", "a"]);
    }

    #[test]
    fn test_prepend() {
        let mut doc = Document::new();
        doc.set("a", Value::Int32(1));
        doc.prepend("_id", Value::Int32(7));
        assert_eq!(doc.keys().collect::<Vec<_>>(), vec!["_id", "a"]);
    }

    #[test]
    fn test_id_helper() {
        let mut doc = Document::new();
        assert!(doc.id().is_missing());
        doc.set("_id", Value::Int32(1));
        assert_eq!(doc.id(), Value::Int32(1));
    }
}
