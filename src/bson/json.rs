use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::json;

use crate::bson::document::Document;
use crate::bson::objectid::ObjectId;
use crate::bson::value::Value;
use crate::core::error::{Error, ErrorKind, Result};

// JSON interop. Types JSON has no syntax for travel as single-key tagged
// wrappers ({"$oid": ...}, {"$date": ...}, ...); document key order is
// preserved in both directions.

impl Value {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null | Value::Missing => serde_json::Value::Null,
            Value::Undefined => json!({"$undefined": true}),
            Value::Int32(i) => json!(i),
            Value::Int64(i) => json!(i),
            Value::Double(d) => {
                if d.is_finite() {
                    json!(d)
                } else if d.is_nan() {
                    json!({"$numberDouble": "NaN"})
                } else if *d > 0.0 {
                    json!({"$numberDouble": "Infinity"})
                } else {
                    json!({"$numberDouble": "-Infinity"})
                }
            }
            Value::Decimal(d) => json!({"$numberDecimal": d.to_string()}),
            Value::String(s) => json!(s),
            Value::Document(d) => d.to_json(),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Binary { subtype, bytes } => {
                json!({"$binary": {"bytes": bytes, "subType": subtype}})
            }
            Value::ObjectId(id) => json!({"$oid": id.to_string()}),
            Value::Boolean(b) => json!(b),
            Value::DateTime(dt) => json!({"$date": dt.to_rfc3339()}),
            Value::Timestamp(t) => json!({"$timestamp": t}),
            Value::Regex { pattern, options } => {
                json!({"$regularExpression": {"pattern": pattern, "options": options}})
            }
        }
    }
}

impl Document {
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for (k, v) in self.iter() {
            map.insert(k.to_string(), v.to_json());
        }
        serde_json::Value::Object(map)
    }
}

impl TryFrom<&serde_json::Value> for Value {
    type Error = Error;

    fn try_from(v: &serde_json::Value) -> Result<Self> {
        match v {
            serde_json::Value::Null => Ok(Value::Null),
            serde_json::Value::Bool(b) => Ok(Value::Boolean(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    if i >= i32::MIN as i64 && i <= i32::MAX as i64 {
                        Ok(Value::Int32(i as i32))
                    } else {
                        Ok(Value::Int64(i))
                    }
                } else if let Some(f) = n.as_f64() {
                    Ok(Value::Double(f))
                } else {
                    Err(Error::new(
                        ErrorKind::Parse,
                        format!("unrepresentable number {}", n),
                    ))
                }
            }
            serde_json::Value::String(s) => Ok(Value::String(s.clone())),
            serde_json::Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(Value::try_from(item)?);
                }
                Ok(Value::Array(out))
            }
            serde_json::Value::Object(map) => from_object(map),
        }
    }
}

impl TryFrom<&serde_json::Value> for Document {
    type Error = Error;

    fn try_from(v: &serde_json::Value) -> Result<Self> {
        match Value::try_from(v)? {
            Value::Document(d) => Ok(d),
            other => Err(Error::new(
                ErrorKind::Parse,
                format!("expected a JSON object, got {}", other.type_name()),
            )),
        }
    }
}

fn from_object(map: &serde_json::Map<String, serde_json::Value>) -> Result<Value> {
    if map.len() == 1 {
        let (key, inner) = match map.iter().next() {
            Some(entry) => entry,
            None => return Ok(Value::Document(Document::new())),
        };
        match key.as_str() {
            "$oid" => {
                let hex = expect_str(inner, "$oid")?;
                return Ok(Value::ObjectId(hex.parse::<ObjectId>()?));
            }
            "$date" => {
                let s = expect_str(inner, "$date")?;
                let dt = DateTime::parse_from_rfc3339(s).map_err(|e| {
                    Error::new(ErrorKind::Parse, format!("bad $date {:?}: {}", s, e))
                })?;
                return Ok(Value::DateTime(dt.with_timezone(&Utc)));
            }
            "$numberDecimal" => {
                let s = expect_str(inner, "$numberDecimal")?;
                let d = s.parse::<Decimal>().map_err(|e| {
                    Error::new(ErrorKind::Parse, format!("bad $numberDecimal {:?}: {}", s, e))
                })?;
                return Ok(Value::Decimal(d));
            }
            "$numberDouble" => {
                return match expect_str(inner, "$numberDouble")? {
                    "NaN" => Ok(Value::Double(f64::NAN)),
                    "Infinity" => Ok(Value::Double(f64::INFINITY)),
                    "-Infinity" => Ok(Value::Double(f64::NEG_INFINITY)),
                    other => Err(Error::new(
                        ErrorKind::Parse,
                        format!("bad $numberDouble {:?}", other),
                    )),
                };
            }
            "$timestamp" => {
                let t = inner.as_u64().ok_or_else(|| {
                    Error::new(ErrorKind::Parse, "$timestamp must be an integer".to_string())
                })?;
                return Ok(Value::Timestamp(t));
            }
            "$undefined" => return Ok(Value::Undefined),
            "$regularExpression" => {
                let pattern = expect_str(&inner["pattern"], "$regularExpression.pattern")?;
                let options = expect_str(&inner["options"], "$regularExpression.options")?;
                return Ok(Value::Regex {
                    pattern: pattern.to_string(),
                    options: options.to_string(),
                });
            }
            "$binary" => {
                let subtype = inner["subType"].as_u64().unwrap_or(0) as u8;
                let bytes = inner["bytes"]
                    .as_array()
                    .ok_or_else(|| {
                        Error::new(ErrorKind::Parse, "$binary.bytes must be an array".to_string())
                    })?
                    .iter()
                    .map(|b| {
                        b.as_u64().and_then(|n| u8::try_from(n).ok()).ok_or_else(|| {
                            Error::new(ErrorKind::Parse, "$binary byte out of range".to_string())
                        })
                    })
                    .collect::<Result<Vec<u8>>>()?;
                return Ok(Value::Binary { subtype, bytes });
            }
            _ => {}
        }
    }

    let mut doc = Document::new();
    for (k, v) in map {
        doc.set(k.clone(), Value::try_from(v)?);
    }
    Ok(Value::Document(doc))
}

fn expect_str<'a>(v: &'a serde_json::Value, what: &str) -> Result<&'a str> {
    v.as_str()
        .ok_or_else(|| Error::new(ErrorKind::Parse, format!("{} must be a string", what)))
}
