use std::fmt;

use serde::{Deserialize, Serialize};

use crate::bson::document::Document;
use crate::bson::value::Value;

use crate::core::error::{Error, ErrorKind, Result};

/// A dotted path into a document.
///
/// Numeric segments address either a document key or an array index; the
/// container met at traversal time decides. The empty path addresses the
/// root document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Path {
    segments: Vec<String>,
}

impl Path {
    pub fn root() -> Self {
        Path { segments: Vec::new() }
    }

    pub fn parse(s: &str) -> Self {
        if s.is_empty() {
            return Path::root();
        }
        Path {
            segments: s.split('.').map(str::to_string).collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

impl From<&str> for Path {
    fn from(s: &str) -> Self {
        Path::parse(s)
    }
}

impl Document {
    /// Resolve a dotted path.
    ///
    /// Returns `Missing` when the path does not resolve; explicit nulls
    /// resolve to `Null`. A non-index segment applied to an array is
    /// broadcast over its elements, collecting the resolving results into
    /// an array (`Missing` when none resolve).
    pub fn get_path(&self, path: &Path) -> Value {
        let Some((head, rest)) = path.segments().split_first() else {
            return Value::Document(self.clone());
        };
        match self.get(head) {
            Some(v) => get_in_value(v, rest),
            None => Value::Missing,
        }
    }

    /// Write a value at a dotted path.
    ///
    /// With `create = false` the full path must already resolve to a
    /// compatible container chain. With `create = true` missing
    /// intermediate documents and arrays are fabricated, array indices
    /// padding the array with nulls up to the required length. A scalar
    /// sitting in the middle of the path is an error either way.
    pub fn put_path(&mut self, path: &Path, value: Value, create: bool) -> Result<()> {
        if path.is_root() {
            return match value {
                Value::Document(d) => {
                    *self = d;
                    Ok(())
                }
                other => Err(Error::new(
                    ErrorKind::InvalidPath,
                    format!("root value must be a document, got {}", other.type_name()),
                )),
            };
        }
        put_in_document(self, path.segments(), value, create)
    }

    /// Remove the value at a dotted path.
    ///
    /// Document keys are removed; array slots become `Null` so the array
    /// keeps its length. Paths that do not resolve are ignored.
    pub fn unset_path(&mut self, path: &Path) {
        unset_in_document(self, path.segments());
    }
}

fn get_in_value(v: &Value, segments: &[String]) -> Value {
    let Some((head, rest)) = segments.split_first() else {
        return v.clone();
    };
    match v {
        Value::Document(d) => match d.get(head) {
            Some(child) => get_in_value(child, rest),
            None => Value::Missing,
        },
        Value::Array(arr) => {
            if let Ok(idx) = head.parse::<usize>() {
                match arr.get(idx) {
                    Some(child) => get_in_value(child, rest),
                    None => Value::Missing,
                }
            } else {
                let mut collected = Vec::new();
                for child in arr {
                    let resolved = get_in_value(child, segments);
                    if !resolved.is_missing() {
                        collected.push(resolved);
                    }
                }
                if collected.is_empty() {
                    Value::Missing
                } else {
                    Value::Array(collected)
                }
            }
        }
        _ => Value::Missing,
    }
}

/// Empty container matching the next path segment.
fn fabricate(next: &str) -> Value {
    if next.parse::<usize>().is_ok() {
        Value::Array(Vec::new())
    } else {
        Value::Document(Document::new())
    }
}

fn put_in_document(
    doc: &mut Document,
    segments: &[String],
    value: Value,
    create: bool,
) -> Result<()> {
    let Some((head, rest)) = segments.split_first() else {
        return Ok(());
    };
    if rest.is_empty() {
        doc.set(head.clone(), value);
        return Ok(());
    }
    match doc.get_mut(head) {
        Some(child) => put_in_value(child, rest, value, create),
        None => {
            if !create {
                return Err(Error::new(
                    ErrorKind::InvalidPath,
                    format!("path segment {:?} does not resolve", head),
                ));
            }
            let mut child = fabricate(&rest[0]);
            put_in_value(&mut child, rest, value, create)?;
            doc.set(head.clone(), child);
            Ok(())
        }
    }
}

fn put_in_value(v: &mut Value, segments: &[String], value: Value, create: bool) -> Result<()> {
    let Some((head, rest)) = segments.split_first() else {
        *v = value;
        return Ok(());
    };
    match v {
        Value::Document(d) => put_in_document(d, segments, value, create),
        Value::Array(arr) => {
            let idx: usize = head.parse().map_err(|_| {
                Error::new(
                    ErrorKind::InvalidPath,
                    format!("segment {:?} is not an array index", head),
                )
            })?;
            if idx >= arr.len() {
                if !create {
                    return Err(Error::new(
                        ErrorKind::InvalidPath,
                        format!("array index {} out of bounds", idx),
                    ));
                }
                arr.resize(idx + 1, Value::Null);
            }
            if rest.is_empty() {
                arr[idx] = value;
                return Ok(());
            }
            if create && matches!(arr[idx], Value::Null) {
                arr[idx] = fabricate(&rest[0]);
            }
            put_in_value(&mut arr[idx], rest, value, create)
        }
        other => Err(Error::new(
            ErrorKind::InvalidPath,
            format!("cannot descend into {}", other.type_name()),
        )),
    }
}

fn unset_in_document(doc: &mut Document, segments: &[String]) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    if rest.is_empty() {
        doc.remove(head);
        return;
    }
    if let Some(child) = doc.get_mut(head) {
        unset_in_value(child, rest);
    }
}

fn unset_in_value(v: &mut Value, segments: &[String]) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    match v {
        Value::Document(d) => unset_in_document(d, segments),
        Value::Array(arr) => {
            let Ok(idx) = head.parse::<usize>() else {
                return;
            };
            let Some(slot) = arr.get_mut(idx) else {
                return;
            };
            if rest.is_empty() {
                *slot = Value::Null;
            } else {
                unset_in_value(slot, rest);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(v: serde_json::Value) -> Document {
        Document::try_from(&v).unwrap()
    }

    #[test]
    fn test_get_nested() {
        let d = doc(json!({"a": {"b": {"c": 42}}}));
        assert_eq!(d.get_path(&"a.b.c".into()), Value::Int32(42));
        assert_eq!(d.get_path(&"a.b".into()), Value::Document(doc(json!({"c": 42}))));
        assert!(d.get_path(&"a.x".into()).is_missing());
        assert!(d.get_path(&"x".into()).is_missing());
    }

    #[test]
    fn test_missing_vs_null() {
        let d = doc(json!({"a": null}));
        assert_eq!(d.get_path(&"a".into()), Value::Null);
        let missing = d.get_path(&"b".into());
        assert!(missing.is_missing());
        // ordering still treats the two as equal
        assert_eq!(missing, Value::Null);
    }

    #[test]
    fn test_array_index_and_broadcast() {
        let d = doc(json!({"a": [{"b": 1}, {"b": 2}, {"c": 3}]}));
        assert_eq!(d.get_path(&"a.1.b".into()), Value::Int32(2));
        assert_eq!(
            d.get_path(&"a.b".into()),
            Value::Array(vec![Value::Int32(1), Value::Int32(2)])
        );
        assert!(d.get_path(&"a.9".into()).is_missing());
        assert!(d.get_path(&"a.d".into()).is_missing());
    }

    #[test]
    fn test_numeric_segment_on_document() {
        let d = doc(json!({"a": {"0": "zero"}}));
        assert_eq!(d.get_path(&"a.0".into()), Value::String("zero".into()));
    }

    #[test]
    fn test_root_path() {
        let d = doc(json!({"a": 1}));
        assert_eq!(d.get_path(&Path::root()), Value::Document(d.clone()));
    }

    #[test]
    fn test_put_create_fabricates() {
        let mut d = Document::new();
        d.put_path(&"a.b.c".into(), Value::Int32(1), true).unwrap();
        assert_eq!(d.get_path(&"a.b.c".into()), Value::Int32(1));

        // array index pads with nulls
        let mut d = Document::new();
        d.put_path(&"a.2".into(), Value::Int32(9), true).unwrap();
        assert_eq!(
            d.get_path(&"a".into()),
            Value::Array(vec![Value::Null, Value::Null, Value::Int32(9)])
        );
    }

    #[test]
    fn test_put_without_create_fails_on_missing() {
        let mut d = doc(json!({"a": 1}));
        assert!(d.put_path(&"b.c".into(), Value::Int32(1), false).is_err());
        // scalar in the middle of the path is an error either way
        assert!(d.put_path(&"a.c".into(), Value::Int32(1), true).is_err());
    }

    #[test]
    fn test_put_get_round_trip() {
        let paths = ["x", "a.b", "arr.0", "arr.1.k", "deep.0.1.v"];
        for (i, p) in paths.iter().enumerate() {
            let mut d = Document::new();
            let v = Value::Int32(i as i32);
            d.put_path(&Path::parse(p), v.clone(), true).unwrap();
            assert_eq!(d.get_path(&Path::parse(p)), v, "path {}", p);
        }
    }

    #[test]
    fn test_unset_document_key() {
        let mut d = doc(json!({"a": {"b": 1, "c": 2}}));
        d.unset_path(&"a.b".into());
        assert!(d.get_path(&"a.b".into()).is_missing());
        assert_eq!(d.get_path(&"a.c".into()), Value::Int32(2));
    }

    #[test]
    fn test_unset_array_slot_keeps_length() {
        let mut d = doc(json!({"a": [1, 2, 3]}));
        d.unset_path(&"a.1".into());
        assert_eq!(
            d.get_path(&"a".into()),
            Value::Array(vec![Value::Int32(1), Value::Null, Value::Int32(3)])
        );
    }

    #[test]
    fn test_unset_unresolved_is_noop() {
        let mut d = doc(json!({"a": 1}));
        d.unset_path(&"b.c".into());
        assert_eq!(d.get_path(&"a".into()), Value::Int32(1));
    }
}
