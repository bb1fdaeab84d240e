//! Twelve-byte document identifiers.
//!
//! Layout: 4 bytes of big-endian seconds since the epoch, 5 bytes chosen
//! once per process, 3 bytes of a wrapping counter. Rendered as 24 lowercase
//! hex digits.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

/// Returned when a string is not 24 hex digits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed object id: {0:?}")]
pub struct MalformedObjectId(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; 12]);

fn process_unique() -> &'static [u8; 5] {
    static UNIQUE: OnceLock<[u8; 5]> = OnceLock::new();
    UNIQUE.get_or_init(rand::random)
}

fn counter() -> &'static AtomicU32 {
    static COUNTER: OnceLock<AtomicU32> = OnceLock::new();
    COUNTER.get_or_init(|| AtomicU32::new(rand::random::<u32>() & 0x00ff_ffff))
}

impl ObjectId {
    /// Generate a fresh identifier.
    pub fn new() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0);
        let count = counter().fetch_add(1, Ordering::Relaxed) & 0x00ff_ffff;

        let mut bytes = [0u8; 12];
        bytes[..4].copy_from_slice(&secs.to_be_bytes());
        bytes[4..9].copy_from_slice(process_unique());
        bytes[9..].copy_from_slice(&count.to_be_bytes()[1..]);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    pub fn bytes(&self) -> [u8; 12] {
        self.0
    }

    /// Parse exactly 24 hex digits (either case).
    pub fn parse_str(s: &str) -> Result<Self, MalformedObjectId> {
        if s.len() != 24 {
            return Err(MalformedObjectId(s.to_string()));
        }
        let mut bytes = [0u8; 12];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| MalformedObjectId(s.to_string()))?;
        Ok(Self(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = MalformedObjectId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_form() {
        let id = ObjectId::from_bytes([
            0x5f, 0x00, 0x01, 0xab, 0xcd, 0xef, 0x10, 0x20, 0x30, 0x40, 0x50, 0xff,
        ]);
        assert_eq!(id.to_hex(), "5f0001abcdef1020304050ff");
        assert_eq!(ObjectId::parse_str("5F0001ABCDEF1020304050FF").unwrap(), id);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in [
            "",
            "abc",
            "zz0001abcdef1020304050ff",
            "5f0001abcdef1020304050ff0",
            "5f0001abcdef1020304050\u{e9}",
        ] {
            assert!(ObjectId::parse_str(bad).is_err(), "{bad:?}");
        }
    }

    #[test]
    fn test_new_ids_are_distinct() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        assert_ne!(a, b);
        assert_eq!(a.bytes()[4..9], b.bytes()[4..9]);
        assert_eq!(a.to_hex().len(), 24);
    }
}
