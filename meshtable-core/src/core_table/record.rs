//! Payload-free descriptors used to negotiate replication.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::content::Checksum;
use super::key::Key;

/// Descriptor of a Content: which key, which payload, which version.
///
/// Peers exchange Records to find divergence without moving payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record {
    pub key: Key,
    pub checksum: Checksum,
    pub version: u64,
}

impl Record {
    pub fn new(key: Key, checksum: Checksum, version: u64) -> Self {
        Record { key, checksum, version }
    }

    /// Whether this record describes a tombstone
    pub fn is_tombstone(&self) -> bool {
        self.checksum.is_tombstone()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}#{}", self.key, self.version, self.checksum)
    }
}
