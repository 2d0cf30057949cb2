use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::error::{Error, ErrorKind};

/// Process-wide machine identifier, drawn once from a v4 uuid.
static MACHINE: OnceLock<[u8; 5]> = OnceLock::new();

/// Monotonic counter for the trailing three bytes.
static COUNTER: AtomicU32 = AtomicU32::new(0);

/// A 12-byte globally-unique document identifier.
///
/// Layout: 4-byte big-endian unix seconds, 5 machine bytes, 3-byte counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId([u8; 12]);

impl ObjectId {
    /// Generate a fresh id.
    pub fn new() -> Self {
        let machine = MACHINE.get_or_init(|| {
            let uuid = Uuid::new_v4();
            let mut m = [0u8; 5];
            m.copy_from_slice(&uuid.as_bytes()[..5]);
            m
        });

        let seconds = Utc::now().timestamp() as u32;
        let count = COUNTER.fetch_add(1, Ordering::SeqCst);

        let mut bytes = [0u8; 12];
        bytes[..4].copy_from_slice(&seconds.to_be_bytes());
        bytes[4..9].copy_from_slice(machine);
        bytes[9..].copy_from_slice(&count.to_be_bytes()[1..]);
        ObjectId(bytes)
    }

    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        ObjectId(bytes)
    }

    pub fn bytes(&self) -> &[u8; 12] {
        &self.0
    }

    /// Unix seconds encoded in the id.
    pub fn seconds(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        ObjectId::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl FromStr for ObjectId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 24 {
            return Err(Error::new(
                ErrorKind::Parse,
                format!("object id must be 24 hex characters, got {}", s.len()),
            ));
        }
        let mut bytes = [0u8; 12];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let hex = std::str::from_utf8(chunk)
                .map_err(|_| Error::new(ErrorKind::Parse, "object id is not ascii".to_string()))?;
            bytes[i] = u8::from_str_radix(hex, 16).map_err(|_| {
                Error::new(ErrorKind::Parse, format!("invalid hex pair {:?}", hex))
            })?;
        }
        Ok(ObjectId::from_bytes(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_ids_are_distinct() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        assert_ne!(a, b);
        // same machine portion, differing counter
        assert_eq!(a.bytes()[4..9], b.bytes()[4..9]);
    }

    #[test]
    fn test_hex_round_trip() {
        let id = ObjectId::new();
        let hex = id.to_string();
        assert_eq!(hex.len(), 24);
        assert_eq!(hex.parse::<ObjectId>().unwrap(), id);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("xyz".parse::<ObjectId>().is_err());
        assert!("zz".repeat(12).parse::<ObjectId>().is_err());
    }

    #[test]
    fn test_timestamp_prefix() {
        let before = Utc::now().timestamp() as u32;
        let id = ObjectId::new();
        let after = Utc::now().timestamp() as u32;
        assert!(id.seconds() >= before && id.seconds() <= after);
    }
}
