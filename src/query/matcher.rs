use std::cmp::Ordering;
use std::sync::Arc;

use regex::Regex;

use crate::bson::document::Document;
use crate::bson::path::Path;
use crate::bson::value::Value;
use crate::core::error::{Error, ErrorKind, Result};

/// Evaluate a match expression against one document.
///
/// A query document is a conjunction: every entry must hold. Entries are
/// either top-level logical operators (`$and`, `$or`, `$nor`) or a dotted
/// field path paired with an equality value or an operator document.
pub fn matches(doc: &Document, query: &Document) -> Result<bool> {
    for (key, condition) in query.iter() {
        let ok = match key {
            "$comment" => true,
            "$and" => {
                let clauses = clause_list(condition, "$and")?;
                all_match(doc, clauses)?
            }
            "$or" => {
                let clauses = clause_list(condition, "$or")?;
                any_match(doc, clauses)?
            }
            "$nor" => {
                let clauses = clause_list(condition, "$nor")?;
                !any_match(doc, clauses)?
            }
            _ if key.starts_with('$') => {
                return Err(Error::new(
                    ErrorKind::Query,
                    format!("unsupported top-level operator {:?}", key),
                ));
            }
            path => {
                let field = doc.get_path(&Path::parse(path));
                condition_on_value(&field, condition)?
            }
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Evaluate every document and keep the matches, stopping at `limit`
/// (0 means unlimited).
pub fn filter(
    docs: &[Arc<Document>],
    query: &Document,
    limit: usize,
) -> Result<Vec<Arc<Document>>> {
    let mut matched = Vec::new();
    for doc in docs {
        if matches(doc, query)? {
            matched.push(doc.clone());
            if limit > 0 && matched.len() == limit {
                break;
            }
        }
    }
    Ok(matched)
}

/// One field condition applied to an already-resolved value: either an
/// operator document or an equality target. Shared with `$elemMatch` and
/// the update engine's `$pull`.
pub(crate) fn condition_on_value(field: &Value, condition: &Value) -> Result<bool> {
    if let Value::Document(cond) = condition {
        if is_operator_doc(cond) {
            return matches_operators(field, cond);
        }
    }
    Ok(equality_match(field, condition))
}

/// A non-empty document whose every key is a `$` operator.
pub(crate) fn is_operator_doc(doc: &Document) -> bool {
    !doc.is_empty() && doc.keys().all(|k| k.starts_with('$'))
}

fn clause_list<'a>(v: &'a Value, op: &str) -> Result<&'a [Value]> {
    match v {
        Value::Array(items) if !items.is_empty() => Ok(items),
        _ => Err(Error::new(
            ErrorKind::Query,
            format!("{} takes a non-empty array of clauses", op),
        )),
    }
}

fn all_match(doc: &Document, clauses: &[Value]) -> Result<bool> {
    for clause in clauses {
        if !matches(doc, clause_doc(clause)?)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn any_match(doc: &Document, clauses: &[Value]) -> Result<bool> {
    for clause in clauses {
        if matches(doc, clause_doc(clause)?)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn clause_doc(clause: &Value) -> Result<&Document> {
    match clause {
        Value::Document(d) => Ok(d),
        other => Err(Error::new(
            ErrorKind::Query,
            format!("logical clause must be a document, got {}", other.type_name()),
        )),
    }
}

/// Equality in query position: direct comparison, containment when the
/// field is an array, and regex semantics when the target is a regex.
fn equality_match(field: &Value, target: &Value) -> bool {
    if let Value::Regex { pattern, options } = target {
        return regex_match(field, pattern, options).unwrap_or(false);
    }
    if field.compare(target) == Ordering::Equal {
        return true;
    }
    if let Value::Array(items) = field {
        return items.iter().any(|e| e.compare(target) == Ordering::Equal);
    }
    false
}

fn matches_operators(field: &Value, cond: &Document) -> Result<bool> {
    for (op, target) in cond.iter() {
        let ok = match op {
            "$comment" => true,
            // consumed together with $regex
            "$options" => true,
            "$eq" => equality_match(field, target),
            "$ne" => !equality_match(field, target),
            "$gt" => order_match(field, target, |o| o == Ordering::Greater),
            "$gte" => order_match(field, target, |o| o != Ordering::Less),
            "$lt" => order_match(field, target, |o| o == Ordering::Less),
            "$lte" => order_match(field, target, |o| o != Ordering::Greater),
            "$in" => in_match(field, target, "$in")?,
            "$nin" => !in_match(field, target, "$nin")?,
            "$exists" => value_truthy(target) == !field.is_missing(),
            "$type" => type_match(field, target)?,
            "$size" => size_match(field, target)?,
            "$all" => all_members_match(field, target)?,
            "$regex" => {
                let pattern = match target {
                    Value::String(s) => s.as_str(),
                    Value::Regex { pattern, .. } => pattern.as_str(),
                    other => {
                        return Err(Error::new(
                            ErrorKind::Query,
                            format!("$regex takes a string, got {}", other.type_name()),
                        ));
                    }
                };
                let options = match cond.get("$options") {
                    Some(Value::String(o)) => o.as_str(),
                    _ => match target {
                        Value::Regex { options, .. } => options.as_str(),
                        _ => "",
                    },
                };
                regex_match(field, pattern, options)?
            }
            "$elemMatch" => elem_match(field, target)?,
            "$not" => !not_operand(field, target)?,
            _ => {
                return Err(Error::new(
                    ErrorKind::Query,
                    format!("unsupported operator {:?}", op),
                ));
            }
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Ordered comparison bracketed by type rank: values of different ranks
/// never satisfy an inequality (the numeric variants share one rank).
fn order_match(field: &Value, target: &Value, ok: impl Fn(Ordering) -> bool) -> bool {
    let direct =
        field.type_rank() == target.type_rank() && ok(field.compare(target));
    if direct {
        return true;
    }
    if let Value::Array(items) = field {
        return items
            .iter()
            .any(|e| e.type_rank() == target.type_rank() && ok(e.compare(target)));
    }
    false
}

fn in_match(field: &Value, target: &Value, op: &str) -> Result<bool> {
    let members = match target {
        Value::Array(items) => items,
        other => {
            return Err(Error::new(
                ErrorKind::Query,
                format!("{} takes an array, got {}", op, other.type_name()),
            ));
        }
    };
    Ok(members.iter().any(|m| equality_match(field, m)))
}

fn value_truthy(v: &Value) -> bool {
    match v {
        Value::Boolean(b) => *b,
        Value::Int32(i) => *i != 0,
        Value::Int64(i) => *i != 0,
        Value::Double(d) => *d != 0.0,
        Value::Null | Value::Missing | Value::Undefined => false,
        _ => true,
    }
}

fn type_match(field: &Value, spec: &Value) -> Result<bool> {
    if field.is_missing() {
        return Ok(false);
    }
    if let Value::Array(specs) = spec {
        for s in specs {
            if type_match(field, s)? {
                return Ok(true);
            }
        }
        return Ok(false);
    }
    let direct = one_type_match(field, spec)?;
    if direct {
        return Ok(true);
    }
    if let Value::Array(items) = field {
        for item in items {
            if one_type_match(item, spec)? {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

fn one_type_match(v: &Value, spec: &Value) -> Result<bool> {
    match spec {
        Value::String(name) => match name.as_str() {
            "number" => Ok(v.is_number()),
            other => Ok(v.type_name() == other),
        },
        n if n.is_number() => match n.as_usize() {
            Some(code) => Ok(v.type_code() == code as i32),
            None => Err(Error::new(
                ErrorKind::Query,
                "$type code must be a non-negative integer".to_string(),
            )),
        },
        other => Err(Error::new(
            ErrorKind::Query,
            format!("$type takes a name or code, got {}", other.type_name()),
        )),
    }
}

fn size_match(field: &Value, target: &Value) -> Result<bool> {
    let Some(want) = target.as_usize() else {
        return Err(Error::new(
            ErrorKind::Query,
            "$size takes a non-negative integer".to_string(),
        ));
    };
    match field {
        Value::Array(items) => Ok(items.len() == want),
        _ => Ok(false),
    }
}

fn all_members_match(field: &Value, target: &Value) -> Result<bool> {
    let members = match target {
        Value::Array(items) => items,
        other => {
            return Err(Error::new(
                ErrorKind::Query,
                format!("$all takes an array, got {}", other.type_name()),
            ));
        }
    };
    Ok(members.iter().all(|m| equality_match(field, m)))
}

fn regex_match(field: &Value, pattern: &str, options: &str) -> Result<bool> {
    let mut flags = String::new();
    for o in options.chars() {
        match o {
            'i' | 'm' | 's' | 'x' => flags.push(o),
            other => {
                return Err(Error::new(
                    ErrorKind::Query,
                    format!("unsupported regex option {:?}", other),
                ));
            }
        }
    }
    let full = if flags.is_empty() {
        pattern.to_string()
    } else {
        format!("(?{}){}", flags, pattern)
    };
    let re = Regex::new(&full)
        .map_err(|e| Error::new(ErrorKind::Query, format!("bad regex: {}", e)))?;
    match field {
        Value::String(s) => Ok(re.is_match(s)),
        Value::Array(items) => Ok(items
            .iter()
            .any(|e| matches!(e, Value::String(s) if re.is_match(s)))),
        _ => Ok(false),
    }
}

fn elem_match(field: &Value, sub: &Value) -> Result<bool> {
    let Value::Array(items) = field else {
        return Ok(false);
    };
    let sub = match sub {
        Value::Document(d) => d,
        other => {
            return Err(Error::new(
                ErrorKind::Query,
                format!("$elemMatch takes a document, got {}", other.type_name()),
            ));
        }
    };
    for item in items {
        let hit = if is_operator_doc(sub) {
            matches_operators(item, sub)?
        } else {
            match item {
                Value::Document(d) => matches(d, sub)?,
                _ => false,
            }
        };
        if hit {
            return Ok(true);
        }
    }
    Ok(false)
}

fn not_operand(field: &Value, target: &Value) -> Result<bool> {
    match target {
        Value::Document(d) if is_operator_doc(d) => matches_operators(field, d),
        Value::Regex { pattern, options } => regex_match(field, pattern, options),
        other => Err(Error::new(
            ErrorKind::Query,
            format!("$not takes an operator document or regex, got {}", other.type_name()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(v: serde_json::Value) -> Document {
        Document::try_from(&v).unwrap()
    }

    fn hit(target: serde_json::Value, query: serde_json::Value) -> bool {
        matches(&doc(target), &doc(query)).unwrap()
    }

    #[test]
    fn test_empty_query_matches_everything() {
        assert!(hit(json!({"a": 1}), json!({})));
    }

    #[test]
    fn test_equality() {
        assert!(hit(json!({"a": 1}), json!({"a": 1})));
        assert!(hit(json!({"a": 1}), json!({"a": 1.0})));
        assert!(!hit(json!({"a": 1}), json!({"a": 2})));
        assert!(hit(json!({"a": {"b": 2}}), json!({"a.b": 2})));
    }

    #[test]
    fn test_equality_with_null_matches_missing() {
        assert!(hit(json!({"a": null}), json!({"a": null})));
        assert!(hit(json!({"b": 1}), json!({"a": null})));
        assert!(!hit(json!({"a": 1}), json!({"a": null})));
    }

    #[test]
    fn test_array_containment() {
        assert!(hit(json!({"a": [1, 2, 3]}), json!({"a": 2})));
        assert!(!hit(json!({"a": [1, 2, 3]}), json!({"a": 4})));
        // whole-array equality still works
        assert!(hit(json!({"a": [1, 2]}), json!({"a": [1, 2]})));
    }

    #[test]
    fn test_comparisons() {
        assert!(hit(json!({"a": 5}), json!({"a": {"$gt": 3}})));
        assert!(hit(json!({"a": 5}), json!({"a": {"$gte": 5}})));
        assert!(!hit(json!({"a": 5}), json!({"a": {"$lt": 5}})));
        assert!(hit(json!({"a": 5}), json!({"a": {"$gt": 3, "$lte": 5}})));
        // different ranks never satisfy an inequality
        assert!(!hit(json!({"a": "zzz"}), json!({"a": {"$gt": 5}})));
        // but any array element may
        assert!(hit(json!({"a": [1, 10]}), json!({"a": {"$gt": 5}})));
    }

    #[test]
    fn test_ne() {
        assert!(hit(json!({"a": 1}), json!({"a": {"$ne": 2}})));
        assert!(!hit(json!({"a": 1}), json!({"a": {"$ne": 1}})));
        // containment counts against $ne
        assert!(!hit(json!({"a": [1, 2]}), json!({"a": {"$ne": 2}})));
    }

    #[test]
    fn test_in_nin() {
        assert!(hit(json!({"a": 2}), json!({"a": {"$in": [1, 2]}})));
        assert!(!hit(json!({"a": 3}), json!({"a": {"$in": [1, 2]}})));
        assert!(hit(json!({"a": [3, 4]}), json!({"a": {"$in": [4]}})));
        assert!(hit(json!({"a": 3}), json!({"a": {"$nin": [1, 2]}})));
        assert!(matches(&doc(json!({"a": 1})), &doc(json!({"a": {"$in": 3}}))).is_err());
    }

    #[test]
    fn test_exists() {
        assert!(hit(json!({"a": 1}), json!({"a": {"$exists": true}})));
        assert!(hit(json!({"a": null}), json!({"a": {"$exists": true}})));
        assert!(!hit(json!({"b": 1}), json!({"a": {"$exists": true}})));
        assert!(hit(json!({"b": 1}), json!({"a": {"$exists": false}})));
    }

    #[test]
    fn test_type() {
        assert!(hit(json!({"a": 1}), json!({"a": {"$type": "int"}})));
        assert!(hit(json!({"a": 1}), json!({"a": {"$type": "number"}})));
        assert!(hit(json!({"a": "s"}), json!({"a": {"$type": 2}})));
        assert!(hit(json!({"a": [1]}), json!({"a": {"$type": "array"}})));
        assert!(hit(json!({"a": [1]}), json!({"a": {"$type": "int"}})));
        assert!(!hit(json!({"a": 1}), json!({"a": {"$type": "string"}})));
        assert!(hit(json!({"a": 1}), json!({"a": {"$type": ["string", "int"]}})));
    }

    #[test]
    fn test_size() {
        assert!(hit(json!({"a": [1, 2]}), json!({"a": {"$size": 2}})));
        assert!(!hit(json!({"a": [1]}), json!({"a": {"$size": 2}})));
        assert!(!hit(json!({"a": 5}), json!({"a": {"$size": 2}})));
    }

    #[test]
    fn test_all() {
        assert!(hit(json!({"a": [1, 2, 3]}), json!({"a": {"$all": [1, 3]}})));
        assert!(!hit(json!({"a": [1, 2]}), json!({"a": {"$all": [1, 3]}})));
    }

    #[test]
    fn test_regex() {
        assert!(hit(json!({"a": "hello"}), json!({"a": {"$regex": "^he"}})));
        assert!(!hit(json!({"a": "hello"}), json!({"a": {"$regex": "^HE"}})));
        assert!(hit(json!({"a": "hello"}), json!({"a": {"$regex": "^HE", "$options": "i"}})));
        assert!(hit(json!({"a": ["x", "hey"]}), json!({"a": {"$regex": "^he"}})));
        assert!(matches(&doc(json!({"a": "x"})), &doc(json!({"a": {"$regex": "("}}))).is_err());
    }

    #[test]
    fn test_elem_match() {
        assert!(hit(
            json!({"a": [{"x": 1}, {"x": 5}]}),
            json!({"a": {"$elemMatch": {"x": {"$gt": 3}}}})
        ));
        assert!(!hit(
            json!({"a": [{"x": 1}]}),
            json!({"a": {"$elemMatch": {"x": {"$gt": 3}}}})
        ));
        // operator form applies to scalar elements
        assert!(hit(json!({"a": [1, 8]}), json!({"a": {"$elemMatch": {"$gt": 5}}})));
    }

    #[test]
    fn test_not() {
        assert!(hit(json!({"a": 1}), json!({"a": {"$not": {"$gt": 5}}})));
        assert!(!hit(json!({"a": 9}), json!({"a": {"$not": {"$gt": 5}}})));
        // $not over a missing field matches
        assert!(hit(json!({"b": 1}), json!({"a": {"$not": {"$gt": 5}}})));
    }

    #[test]
    fn test_logical_operators() {
        assert!(hit(json!({"a": 1, "b": 2}), json!({"$and": [{"a": 1}, {"b": 2}]})));
        assert!(hit(json!({"a": 1}), json!({"$or": [{"a": 2}, {"a": 1}]})));
        assert!(!hit(json!({"a": 1}), json!({"$nor": [{"a": 1}]})));
        assert!(hit(json!({"a": 1}), json!({"$nor": [{"a": 2}, {"b": {"$exists": true}}]})));
        assert!(matches(&doc(json!({})), &doc(json!({"$and": []}))).is_err());
        assert!(matches(&doc(json!({})), &doc(json!({"$bogus": 1}))).is_err());
    }

    #[test]
    fn test_operator_doc_vs_literal_doc() {
        // a document without $ keys is an equality target, not operators
        assert!(hit(json!({"a": {"b": 1}}), json!({"a": {"b": 1}})));
        assert!(!hit(json!({"a": {"b": 1}}), json!({"a": {"b": 2}})));
    }

    #[test]
    fn test_filter_limit() {
        let docs: Vec<_> = (0..10)
            .map(|i| Arc::new(doc(json!({"n": i, "even": i % 2 == 0}))))
            .collect();
        let q = doc(json!({"even": true}));
        let all = filter(&docs, &q, 0).unwrap();
        assert_eq!(all.len(), 5);
        let capped = filter(&docs, &q, 2).unwrap();
        assert_eq!(capped.len(), 2);
        assert!(Arc::ptr_eq(&capped[0], &docs[0]));
        assert!(Arc::ptr_eq(&capped[1], &docs[2]));
    }
}
