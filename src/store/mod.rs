//! Persistence.
//!
//! - **chunks**: overlapping text chunks in a SQLite FTS5 index, tagged by
//!   document id.
//! - **analysis**: one pretty-printed JSON file per analysed contract.
//! - **Utilities**: `sha256_hex`, `now_iso8601`.

pub mod analysis;
pub mod chunks;

use chrono::{SecondsFormat, Utc};
use sha2::{Digest, Sha256};

/// Hex SHA-256 of `content`. Used as the content identity of a contract.
pub fn sha256_hex(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Current UTC time as RFC 3339 with second precision.
pub fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
