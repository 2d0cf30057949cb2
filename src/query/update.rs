use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::bson::document::Document;
use crate::bson::path::Path;
use crate::bson::pathnode::PathNode;
use crate::bson::value::Value;
use crate::core::error::{Error, ErrorKind, Result};
use crate::query::matcher;

/// Apply an update document to one document in place.
///
/// An update either carries `$` operators (applied in document order, with
/// overlapping target paths rejected up front) or is an operator-free
/// replacement, which swaps the whole document body while keeping the
/// existing `_id`. The `upsert` flag only enables `$setOnInsert`.
pub fn apply(doc: &mut Document, update: &Document, upsert: bool) -> Result<()> {
    let operator_keys = update.keys().filter(|k| k.starts_with('$')).count();
    if operator_keys == 0 {
        return replace_document(doc, update);
    }
    if operator_keys != update.len() {
        return Err(Error::new(
            ErrorKind::Update,
            "update cannot mix operators with plain fields".to_string(),
        ));
    }
    check_conflicts(update)?;
    for (op, operand) in update.iter() {
        let operand = operand_doc(op, operand)?;
        match op {
            "$set" => {
                for (path, v) in operand.iter() {
                    doc.put_path(&Path::parse(path), v.clone(), true)
                        .map_err(update_error)?;
                }
            }
            "$setOnInsert" => {
                if upsert {
                    for (path, v) in operand.iter() {
                        doc.put_path(&Path::parse(path), v.clone(), true)
                            .map_err(update_error)?;
                    }
                }
            }
            "$unset" => {
                for (path, _) in operand.iter() {
                    doc.unset_path(&Path::parse(path));
                }
            }
            "$inc" => apply_arithmetic(doc, operand, ArithmeticOp::Add)?,
            "$mul" => apply_arithmetic(doc, operand, ArithmeticOp::Mul)?,
            "$min" => apply_bound(doc, operand, std::cmp::Ordering::Less)?,
            "$max" => apply_bound(doc, operand, std::cmp::Ordering::Greater)?,
            "$rename" => apply_rename(doc, operand)?,
            "$push" => apply_push(doc, operand, false)?,
            "$addToSet" => apply_push(doc, operand, true)?,
            "$pull" => apply_pull(doc, operand)?,
            "$pop" => apply_pop(doc, operand)?,
            other => {
                return Err(Error::new(
                    ErrorKind::Update,
                    format!("unsupported update operator {:?}", other),
                ));
            }
        }
    }
    Ok(())
}

/// The equality skeleton of a match expression: plain field/value pairs and
/// `$eq` conditions, with `$and` clauses flattened in. Dotted keys become
/// nested structure. Used to seed upserted documents.
pub fn extract(query: &Document) -> Result<Document> {
    let mut out = Document::new();
    extract_into(query, &mut out)?;
    Ok(out)
}

fn extract_into(query: &Document, out: &mut Document) -> Result<()> {
    for (key, condition) in query.iter() {
        if key == "$and" {
            if let Value::Array(clauses) = condition {
                for clause in clauses {
                    if let Value::Document(d) = clause {
                        extract_into(d, out)?;
                    }
                }
            }
            continue;
        }
        if key.starts_with('$') {
            continue;
        }
        match condition {
            Value::Document(d) if matcher::is_operator_doc(d) => {
                if let Some(eq) = d.get("$eq") {
                    out.put_path(&Path::parse(key), eq.clone(), true)
                        .map_err(update_error)?;
                }
            }
            Value::Regex { .. } => {}
            plain => {
                out.put_path(&Path::parse(key), plain.clone(), true)
                    .map_err(update_error)?;
            }
        }
    }
    Ok(())
}

fn update_error(err: Error) -> Error {
    Error::new(ErrorKind::Update, err.context)
}

fn replace_document(doc: &mut Document, update: &Document) -> Result<()> {
    let id = doc.get("_id").cloned();
    *doc = update.clone();
    if let Some(id) = id {
        if !doc.contains_key("_id") {
            doc.prepend("_id", id);
        }
    }
    Ok(())
}

fn operand_doc<'a>(op: &str, operand: &'a Value) -> Result<&'a Document> {
    match operand {
        Value::Document(d) => Ok(d),
        other => Err(Error::new(
            ErrorKind::Update,
            format!("{} takes a document, got {}", op, other.type_name()),
        )),
    }
}

/// Reject updates whose operators target overlapping paths, e.g. a `$set`
/// on `a.b` together with anything on `a` or `a.b.c`.
fn check_conflicts(update: &Document) -> Result<()> {
    let mut claimed: PathNode<&str> = PathNode::new();
    for (op, operand) in update.iter() {
        let Value::Document(operand) = operand else {
            continue;
        };
        for (path, target) in operand.iter() {
            let mut paths = vec![Path::parse(path)];
            if op == "$rename" {
                if let Value::String(to) = target {
                    paths.push(Path::parse(to));
                }
            }
            for p in paths {
                if !claimed.insert(&p, op) {
                    return Err(Error::new(
                        ErrorKind::Update,
                        format!("conflicting update paths at {:?}", p.to_string()),
                    ));
                }
            }
        }
    }
    Ok(())
}

#[derive(Clone, Copy)]
enum ArithmeticOp {
    Add,
    Mul,
}

fn apply_arithmetic(doc: &mut Document, operand: &Document, op: ArithmeticOp) -> Result<()> {
    for (path, amount) in operand.iter() {
        if !amount.is_number() {
            return Err(Error::new(
                ErrorKind::Update,
                format!("numeric operand required at {:?}, got {}", path, amount.type_name()),
            ));
        }
        let path = Path::parse(path);
        let current = doc.get_path(&path);
        let next = match (&current, &op) {
            (Value::Missing, ArithmeticOp::Add) => amount.clone(),
            (Value::Missing, ArithmeticOp::Mul) => zero_like(amount),
            (v, _) if v.is_number() => match op {
                ArithmeticOp::Add => add_numbers(v, amount)?,
                ArithmeticOp::Mul => mul_numbers(v, amount)?,
            },
            (v, _) => {
                return Err(Error::new(
                    ErrorKind::Update,
                    format!("cannot apply arithmetic to {} at {:?}", v.type_name(), path.to_string()),
                ));
            }
        };
        doc.put_path(&path, next, true).map_err(update_error)?;
    }
    Ok(())
}

fn apply_bound(doc: &mut Document, operand: &Document, keep: std::cmp::Ordering) -> Result<()> {
    for (path, bound) in operand.iter() {
        let path = Path::parse(path);
        let current = doc.get_path(&path);
        if current.is_missing() || bound.compare(&current) == keep {
            doc.put_path(&path, bound.clone(), true).map_err(update_error)?;
        }
    }
    Ok(())
}

fn apply_rename(doc: &mut Document, operand: &Document) -> Result<()> {
    for (from, to) in operand.iter() {
        let Value::String(to) = to else {
            return Err(Error::new(
                ErrorKind::Update,
                format!("$rename target for {:?} must be a string", from),
            ));
        };
        let from = Path::parse(from);
        let value = doc.get_path(&from);
        if value.is_missing() {
            continue;
        }
        doc.unset_path(&from);
        doc.put_path(&Path::parse(to), value, true).map_err(update_error)?;
    }
    Ok(())
}

/// `$push` / `$addToSet`; the only modifier understood is `$each`.
fn apply_push(doc: &mut Document, operand: &Document, unique: bool) -> Result<()> {
    for (path, spec) in operand.iter() {
        let additions: Vec<Value> = match spec {
            Value::Document(d) if d.contains_key("$each") => {
                if let Some(unknown) = d.keys().find(|k| *k != "$each") {
                    return Err(Error::new(
                        ErrorKind::Update,
                        format!("unsupported push modifier {:?}", unknown),
                    ));
                }
                match d.get("$each") {
                    Some(Value::Array(items)) => items.clone(),
                    _ => {
                        return Err(Error::new(
                            ErrorKind::Update,
                            "$each takes an array".to_string(),
                        ));
                    }
                }
            }
            single => vec![single.clone()],
        };
        let path = Path::parse(path);
        let mut items = match doc.get_path(&path) {
            Value::Missing => Vec::new(),
            Value::Array(items) => items,
            other => {
                return Err(Error::new(
                    ErrorKind::Update,
                    format!("cannot push into {} at {:?}", other.type_name(), path.to_string()),
                ));
            }
        };
        for add in additions {
            if unique && items.iter().any(|e| *e == add) {
                continue;
            }
            items.push(add);
        }
        doc.put_path(&path, Value::Array(items), true).map_err(update_error)?;
    }
    Ok(())
}

/// `$pull` removes array elements matching the operand, which is either a
/// per-element condition or an equality value.
fn apply_pull(doc: &mut Document, operand: &Document) -> Result<()> {
    for (path, condition) in operand.iter() {
        let path = Path::parse(path);
        let items = match doc.get_path(&path) {
            Value::Missing => continue,
            Value::Array(items) => items,
            other => {
                return Err(Error::new(
                    ErrorKind::Update,
                    format!("cannot pull from {} at {:?}", other.type_name(), path.to_string()),
                ));
            }
        };
        let mut kept = Vec::with_capacity(items.len());
        for item in items {
            let removed = match condition {
                Value::Document(d) if !matcher::is_operator_doc(d) => match &item {
                    Value::Document(elem) => matcher::matches(elem, d)?,
                    _ => false,
                },
                cond => matcher::condition_on_value(&item, cond)?,
            };
            if !removed {
                kept.push(item);
            }
        }
        doc.put_path(&path, Value::Array(kept), true).map_err(update_error)?;
    }
    Ok(())
}

fn apply_pop(doc: &mut Document, operand: &Document) -> Result<()> {
    for (path, which) in operand.iter() {
        let from_front = match which {
            Value::Int32(1) | Value::Int64(1) => false,
            Value::Int32(-1) | Value::Int64(-1) => true,
            other => {
                return Err(Error::new(
                    ErrorKind::Update,
                    format!("$pop takes 1 or -1, got {}", other.type_name()),
                ));
            }
        };
        let path = Path::parse(path);
        let mut items = match doc.get_path(&path) {
            Value::Missing => continue,
            Value::Array(items) => items,
            other => {
                return Err(Error::new(
                    ErrorKind::Update,
                    format!("cannot pop from {} at {:?}", other.type_name(), path.to_string()),
                ));
            }
        };
        if !items.is_empty() {
            if from_front {
                items.remove(0);
            } else {
                items.pop();
            }
        }
        doc.put_path(&path, Value::Array(items), true).map_err(update_error)?;
    }
    Ok(())
}

fn zero_like(v: &Value) -> Value {
    match v {
        Value::Int32(_) => Value::Int32(0),
        Value::Int64(_) => Value::Int64(0),
        Value::Double(_) => Value::Double(0.0),
        Value::Decimal(_) => Value::Decimal(Decimal::ZERO),
        _ => Value::Int32(0),
    }
}

fn as_f64(v: &Value) -> f64 {
    match v {
        Value::Int32(i) => *i as f64,
        Value::Int64(i) => *i as f64,
        Value::Double(d) => *d,
        Value::Decimal(d) => d.to_f64().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

fn as_decimal(v: &Value) -> Decimal {
    match v {
        Value::Int32(i) => Decimal::from(*i),
        Value::Int64(i) => Decimal::from(*i),
        Value::Decimal(d) => *d,
        _ => Decimal::ZERO,
    }
}

fn overflow(what: &str) -> Error {
    Error::new(ErrorKind::Update, format!("{} overflow", what))
}

/// Numeric addition preserving the widest representation involved; i32
/// sums widen to i64 instead of overflowing.
fn add_numbers(a: &Value, b: &Value) -> Result<Value> {
    match (a, b) {
        (Value::Double(_), _) | (_, Value::Double(_)) => Ok(Value::Double(as_f64(a) + as_f64(b))),
        (Value::Decimal(_), _) | (_, Value::Decimal(_)) => as_decimal(a)
            .checked_add(as_decimal(b))
            .map(Value::Decimal)
            .ok_or_else(|| overflow("decimal addition")),
        (Value::Int64(_), _) | (_, Value::Int64(_)) => {
            let (x, y) = (int_of(a), int_of(b));
            x.checked_add(y)
                .map(Value::Int64)
                .ok_or_else(|| overflow("integer addition"))
        }
        (Value::Int32(x), Value::Int32(y)) => Ok(match x.checked_add(*y) {
            Some(sum) => Value::Int32(sum),
            None => Value::Int64(*x as i64 + *y as i64),
        }),
        _ => Err(overflow("numeric")),
    }
}

fn mul_numbers(a: &Value, b: &Value) -> Result<Value> {
    match (a, b) {
        (Value::Double(_), _) | (_, Value::Double(_)) => Ok(Value::Double(as_f64(a) * as_f64(b))),
        (Value::Decimal(_), _) | (_, Value::Decimal(_)) => as_decimal(a)
            .checked_mul(as_decimal(b))
            .map(Value::Decimal)
            .ok_or_else(|| overflow("decimal multiplication")),
        (Value::Int64(_), _) | (_, Value::Int64(_)) => {
            let (x, y) = (int_of(a), int_of(b));
            x.checked_mul(y)
                .map(Value::Int64)
                .ok_or_else(|| overflow("integer multiplication"))
        }
        (Value::Int32(x), Value::Int32(y)) => Ok(match x.checked_mul(*y) {
            Some(product) => Value::Int32(product),
            None => Value::Int64(*x as i64 * *y as i64),
        }),
        _ => Err(overflow("numeric")),
    }
}

fn int_of(v: &Value) -> i64 {
    match v {
        Value::Int32(i) => *i as i64,
        Value::Int64(i) => *i,
        _ => 0,
    }
}
