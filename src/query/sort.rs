use std::cmp::Ordering;
use std::sync::Arc;

use crate::bson::document::Document;
use crate::bson::path::Path;
use crate::bson::value::Value;
use crate::catalog::index::Column;
use crate::core::error::{Error, ErrorKind, Result};

/// Translate an ordered key-spec document ({path: ±1, ...}) into columns.
/// Shared by sorting and index creation; only ±1 directions are supported.
pub fn columns(keys: &Document) -> Result<Vec<Column>> {
    if keys.is_empty() {
        return Err(Error::new(
            ErrorKind::InvalidArgument,
            "key specification must name at least one path".to_string(),
        ));
    }
    let mut out = Vec::with_capacity(keys.len());
    for (path, direction) in keys.iter() {
        let reverse = match direction {
            Value::Int32(1) | Value::Int64(1) => false,
            Value::Int32(-1) | Value::Int64(-1) => true,
            Value::Double(d) if *d == 1.0 => false,
            Value::Double(d) if *d == -1.0 => true,
            other => {
                return Err(Error::new(
                    ErrorKind::InvalidArgument,
                    format!("direction for {:?} must be 1 or -1, got {}", path, other.type_name()),
                ));
            }
        };
        out.push(Column { path: Path::parse(path), reverse });
    }
    Ok(out)
}

/// Stable sort over the spec's columns; the input is untouched.
pub fn sort(docs: &[Arc<Document>], spec: &Document) -> Result<Vec<Arc<Document>>> {
    let columns = columns(spec)?;
    let mut out = docs.to_vec();
    out.sort_by(|a, b| compare_docs(a, b, &columns));
    Ok(out)
}

fn compare_docs(a: &Document, b: &Document, columns: &[Column]) -> Ordering {
    for column in columns {
        let ord = a
            .get_path(&column.path)
            .compare(&b.get_path(&column.path));
        let ord = if column.reverse { ord.reverse() } else { ord };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn docs(values: &[serde_json::Value]) -> Vec<Arc<Document>> {
        values
            .iter()
            .map(|v| Arc::new(Document::try_from(v).unwrap()))
            .collect()
    }

    fn field(doc: &Document, path: &str) -> Value {
        doc.get_path(&Path::parse(path))
    }

    #[test]
    fn test_single_column_ascending() {
        let input = docs(&[json!({"a": 3}), json!({"a": 1}), json!({"a": 2})]);
        let sorted = sort(&input, &Document::try_from(&json!({"a": 1})).unwrap()).unwrap();
        let order: Vec<_> = sorted.iter().map(|d| field(d, "a")).collect();
        assert_eq!(order, vec![Value::Int32(1), Value::Int32(2), Value::Int32(3)]);
        // input untouched
        assert_eq!(field(&input[0], "a"), Value::Int32(3));
    }

    #[test]
    fn test_descending_and_compound() {
        let input = docs(&[
            json!({"a": 1, "b": 1}),
            json!({"a": 2, "b": 1}),
            json!({"a": 1, "b": 2}),
        ]);
        let spec = Document::try_from(&json!({"a": -1, "b": 1})).unwrap();
        let sorted = sort(&input, &spec).unwrap();
        let order: Vec<_> = sorted
            .iter()
            .map(|d| (field(d, "a"), field(d, "b")))
            .collect();
        assert_eq!(
            order,
            vec![
                (Value::Int32(2), Value::Int32(1)),
                (Value::Int32(1), Value::Int32(1)),
                (Value::Int32(1), Value::Int32(2)),
            ]
        );
    }

    #[test]
    fn test_stability_on_ties() {
        let input = docs(&[
            json!({"a": 1, "tag": "first"}),
            json!({"a": 1, "tag": "second"}),
            json!({"a": 0, "tag": "third"}),
        ]);
        let sorted = sort(&input, &Document::try_from(&json!({"a": 1})).unwrap()).unwrap();
        assert_eq!(field(&sorted[0], "tag"), Value::String("third".into()));
        assert_eq!(field(&sorted[1], "tag"), Value::String("first".into()));
        assert_eq!(field(&sorted[2], "tag"), Value::String("second".into()));
    }

    #[test]
    fn test_missing_sorts_with_nulls() {
        let input = docs(&[json!({"a": 5}), json!({"b": 1}), json!({"a": null})]);
        let sorted = sort(&input, &Document::try_from(&json!({"a": 1})).unwrap()).unwrap();
        assert!(field(&sorted[0], "a").is_missing());
        assert_eq!(field(&sorted[1], "a"), Value::Null);
        assert_eq!(field(&sorted[2], "a"), Value::Int32(5));
    }

    #[test]
    fn test_columns_validation() {
        assert!(columns(&Document::new()).is_err());
        assert!(columns(&Document::try_from(&json!({"a": 2})).unwrap()).is_err());
        assert!(columns(&Document::try_from(&json!({"a": "hashed"})).unwrap()).is_err());
        let cols = columns(&Document::try_from(&json!({"a": 1, "b.c": -1})).unwrap()).unwrap();
        assert_eq!(cols.len(), 2);
        assert!(!cols[0].reverse);
        assert!(cols[1].reverse);
        assert_eq!(cols[1].path, Path::parse("b.c"));
    }
}
