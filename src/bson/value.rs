use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};

use crate::bson::document::Document;
use crate::bson::objectid::ObjectId;

/// A single document value.
///
/// Variants are declared in canonical comparison order: every variant
/// belongs to a rank, ranks compare before values, and ties within a rank
/// are broken by the per-variant rules in `compare`. `Missing` is what path
/// lookup returns when a path does not resolve; it orders like `Null` but
/// predicates can still tell the two apart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Null,
    Missing,
    Undefined,
    Int32(i32),
    Int64(i64),
    Double(f64),
    Decimal(Decimal),
    String(String),
    Document(Document),
    Array(Vec<Value>),
    Binary { subtype: u8, bytes: Vec<u8> },
    ObjectId(ObjectId),
    Boolean(bool),
    DateTime(DateTime<Utc>),
    Timestamp(u64),
    Regex { pattern: String, options: String },
}

impl Value {
    /// Canonical type rank used for cross-type ordering.
    pub fn type_rank(&self) -> u8 {
        match self {
            Value::Null | Value::Missing | Value::Undefined => 1,
            Value::Int32(_) | Value::Int64(_) | Value::Double(_) | Value::Decimal(_) => 2,
            Value::String(_) => 3,
            Value::Document(_) => 4,
            Value::Array(_) => 5,
            Value::Binary { .. } => 6,
            Value::ObjectId(_) => 7,
            Value::Boolean(_) => 8,
            Value::DateTime(_) | Value::Timestamp(_) => 9,
            Value::Regex { .. } => 10,
        }
    }

    /// Type name as used by the `$type` predicate.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Missing => "missing",
            Value::Undefined => "undefined",
            Value::Int32(_) => "int",
            Value::Int64(_) => "long",
            Value::Double(_) => "double",
            Value::Decimal(_) => "decimal",
            Value::String(_) => "string",
            Value::Document(_) => "object",
            Value::Array(_) => "array",
            Value::Binary { .. } => "binData",
            Value::ObjectId(_) => "objectId",
            Value::Boolean(_) => "bool",
            Value::DateTime(_) => "date",
            Value::Timestamp(_) => "timestamp",
            Value::Regex { .. } => "regex",
        }
    }

    /// Numeric type code as used by the `$type` predicate.
    pub fn type_code(&self) -> i32 {
        match self {
            Value::Null => 10,
            Value::Missing => 0,
            Value::Undefined => 6,
            Value::Int32(_) => 16,
            Value::Int64(_) => 18,
            Value::Double(_) => 1,
            Value::Decimal(_) => 19,
            Value::String(_) => 2,
            Value::Document(_) => 3,
            Value::Array(_) => 4,
            Value::Binary { .. } => 5,
            Value::ObjectId(_) => 7,
            Value::Boolean(_) => 8,
            Value::DateTime(_) => 9,
            Value::Timestamp(_) => 17,
            Value::Regex { .. } => 11,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    pub fn is_number(&self) -> bool {
        self.type_rank() == 2
    }

    /// Interpret an integer-valued number as usize, for count-like operands.
    pub fn as_usize(&self) -> Option<usize> {
        match self {
            Value::Int32(i) if *i >= 0 => Some(*i as usize),
            Value::Int64(i) if *i >= 0 => Some(*i as usize),
            Value::Double(d) if *d >= 0.0 && d.fract() == 0.0 => Some(*d as usize),
            _ => None,
        }
    }

    /// Total preorder over all values.
    ///
    /// Ranks compare first; within a rank numbers compare exactly across
    /// integer/double/decimal representations, NaN is equal only to itself
    /// and below every real, and composite values compare element-wise with
    /// the shorter prefix ordered first.
    pub fn compare(&self, other: &Value) -> Ordering {
        let (ra, rb) = (self.type_rank(), other.type_rank());
        if ra != rb {
            return ra.cmp(&rb);
        }
        match (self, other) {
            (Value::Null | Value::Missing | Value::Undefined, _) => Ordering::Equal,
            (a, b) if a.is_number() => compare_numeric(a, b),
            (Value::String(a), Value::String(b)) => a.as_bytes().cmp(b.as_bytes()),
            (Value::Document(a), Value::Document(b)) => a.compare(b),
            (Value::Array(a), Value::Array(b)) => compare_arrays(a, b),
            (
                Value::Binary { subtype: sa, bytes: ba },
                Value::Binary { subtype: sb, bytes: bb },
            ) => sa.cmp(sb).then_with(|| ba.cmp(bb)),
            (Value::ObjectId(a), Value::ObjectId(b)) => a.bytes().cmp(b.bytes()),
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (a @ (Value::DateTime(_) | Value::Timestamp(_)), b) => ticks(a).cmp(&ticks(b)),
            (
                Value::Regex { pattern: pa, options: oa },
                Value::Regex { pattern: pb, options: ob },
            ) => pa.cmp(pb).then_with(|| oa.cmp(ob)),
            _ => Ordering::Equal,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

fn compare_arrays(a: &[Value], b: &[Value]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        let ord = x.compare(y);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

/// Common tick scale for date/timestamp comparison.
fn ticks(v: &Value) -> i128 {
    match v {
        Value::DateTime(dt) => dt.timestamp_millis() as i128,
        Value::Timestamp(t) => *t as i128,
        _ => 0,
    }
}

/// Exact comparison across the four numeric representations.
///
/// Integers and decimals compare through `Decimal`. Doubles route through
/// `Decimal` when finite and representable, the sign decides when the
/// magnitude exceeds the decimal range.
fn compare_numeric(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Double(x), Value::Double(y)) => compare_doubles(*x, *y),
        (Value::Double(x), _) => compare_double_decimal(*x, decimal_of(b)),
        (_, Value::Double(y)) => compare_double_decimal(*y, decimal_of(a)).reverse(),
        _ => decimal_of(a).cmp(&decimal_of(b)),
    }
}

fn decimal_of(v: &Value) -> Decimal {
    match v {
        Value::Int32(i) => Decimal::from(*i),
        Value::Int64(i) => Decimal::from(*i),
        Value::Decimal(d) => *d,
        _ => Decimal::ZERO,
    }
}

fn compare_doubles(x: f64, y: f64) -> Ordering {
    match (x.is_nan(), y.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
    }
}

fn compare_double_decimal(x: f64, d: Decimal) -> Ordering {
    if x.is_nan() {
        return Ordering::Less;
    }
    if x == f64::INFINITY {
        return Ordering::Greater;
    }
    if x == f64::NEG_INFINITY {
        return Ordering::Less;
    }
    match Decimal::from_f64(x) {
        Some(xd) => xd.cmp(&d),
        None => {
            if x > 0.0 {
                Ordering::Greater
            } else {
                Ordering::Less
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_less(a: Value, b: Value) {
        assert_eq!(a.compare(&b), Ordering::Less, "{:?} < {:?}", a, b);
        assert_eq!(b.compare(&a), Ordering::Greater, "{:?} > {:?}", b, a);
    }

    #[test]
    fn test_rank_order() {
        let ladder = vec![
            Value::Null,
            Value::Int32(1),
            Value::String("a".into()),
            Value::Document(Document::new()),
            Value::Array(vec![]),
            Value::Binary { subtype: 0, bytes: vec![] },
            Value::ObjectId(ObjectId::new()),
            Value::Boolean(false),
            Value::Timestamp(0),
            Value::Regex { pattern: "a".into(), options: "".into() },
        ];
        for pair in ladder.windows(2) {
            assert_less(pair[0].clone(), pair[1].clone());
        }
    }

    #[test]
    fn test_null_missing_undefined_equal() {
        assert_eq!(Value::Null.compare(&Value::Missing), Ordering::Equal);
        assert_eq!(Value::Missing.compare(&Value::Undefined), Ordering::Equal);
        assert_eq!(Value::Null, Value::Missing);
    }

    #[test]
    fn test_numeric_cross_type() {
        assert_eq!(Value::Int32(5).compare(&Value::Int64(5)), Ordering::Equal);
        assert_eq!(Value::Int64(5).compare(&Value::Double(5.0)), Ordering::Equal);
        assert_eq!(
            Value::Double(2.5).compare(&Value::Decimal(Decimal::new(25, 1))),
            Ordering::Equal
        );
        assert_less(Value::Int32(2), Value::Double(2.5));
        assert_less(Value::Double(2.5), Value::Int64(3));
        // exact comparison beyond f64's 53-bit integer precision
        assert_less(Value::Int64(9_007_199_254_740_993), Value::Int64(9_007_199_254_740_994));
    }

    #[test]
    fn test_nan_orders_below_reals() {
        assert_eq!(
            Value::Double(f64::NAN).compare(&Value::Double(f64::NAN)),
            Ordering::Equal
        );
        assert_less(Value::Double(f64::NAN), Value::Double(f64::NEG_INFINITY));
        assert_less(Value::Double(f64::NAN), Value::Int64(i64::MIN));
    }

    #[test]
    fn test_infinities_against_decimals() {
        assert_less(Value::Decimal(Decimal::MAX), Value::Double(f64::INFINITY));
        assert_less(Value::Double(f64::NEG_INFINITY), Value::Int32(i32::MIN));
        assert_less(Value::Decimal(Decimal::MAX), Value::Double(1e300));
    }

    #[test]
    fn test_string_bytewise() {
        assert_less(Value::String("a".into()), Value::String("ab".into()));
        assert_less(Value::String("A".into()), Value::String("a".into()));
    }

    #[test]
    fn test_array_prefix_rule() {
        let short = Value::Array(vec![Value::Int32(1)]);
        let long = Value::Array(vec![Value::Int32(1), Value::Int32(0)]);
        assert_less(short, long);
        assert_less(
            Value::Array(vec![Value::Int32(1), Value::Int32(2)]),
            Value::Array(vec![Value::Int32(2)]),
        );
    }

    #[test]
    fn test_document_key_then_value() {
        let mut a = Document::new();
        a.set("a", Value::Int32(1));
        let mut b = Document::new();
        b.set("a", Value::Int32(2));
        let mut c = Document::new();
        c.set("b", Value::Int32(0));
        assert_less(Value::Document(a.clone()), Value::Document(b.clone()));
        assert_less(Value::Document(b), Value::Document(c));
        // shorter prefix first
        let mut d = a.clone();
        d.set("z", Value::Null);
        assert_less(Value::Document(a), Value::Document(d));
    }

    #[test]
    fn test_boolean_and_dates() {
        assert_less(Value::Boolean(false), Value::Boolean(true));
        assert_less(Value::Timestamp(1), Value::Timestamp(2));
        let early = Value::DateTime(DateTime::from_timestamp_millis(1_000).unwrap());
        let late = Value::DateTime(DateTime::from_timestamp_millis(2_000).unwrap());
        assert_less(early.clone(), late);
        // cross-variant within the rank compares on the shared tick scale
        assert_less(Value::Timestamp(500), early);
    }

    #[test]
    fn test_transitivity_sample() {
        use rand::Rng;
        use rand::seq::SliceRandom;
        let mut rng = rand::thread_rng();
        let pool: Vec<Value> = (0..60)
            .map(|i| match i % 6 {
                0 => Value::Int32(rng.gen_range(-100..100)),
                1 => Value::Int64(rng.gen_range(-100..100)),
                2 => Value::Double(rng.gen_range(-100.0..100.0)),
                3 => Value::String(format!("s{}", rng.gen_range(0..50))),
                4 => Value::Boolean(rng.gen_range(0..2) == 1),
                _ => Value::Null,
            })
            .collect();
        let mut sorted = pool.clone();
        sorted.sort_by(|a, b| a.compare(b));
        // a sorted sequence under a total preorder is pairwise non-decreasing
        for pair in sorted.windows(2) {
            assert_ne!(pair[0].compare(&pair[1]), Ordering::Greater);
        }
        // reflexive and antisymmetric on a shuffled sample
        let mut shuffled = pool.clone();
        shuffled.shuffle(&mut rng);
        for v in &shuffled {
            assert_eq!(v.compare(v), Ordering::Equal);
        }
        for a in &shuffled {
            for b in &shuffled {
                assert_eq!(a.compare(b), b.compare(a).reverse());
            }
        }
    }
}
