/*
    Content - the full value stored at a Key

    Responsibilities:
    `content.rs` defines the stored value format and its validity rules.
    It handles: checksums (SHA-256 over the payload), the size bound, versioning
    by millisecond timestamp, and tombstones.

    A tombstone is a Content in the Deleted state. It has no payload and carries
    the all-zero checksum so its Record can be recognized without a state field.

    Inputs:
    - raw application payloads
    - payloads decrypted from peers

    Outputs:
    - validated Content values
    - Records describing them
    - dead-tombstone checks for pruning
*/

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::errors::{TableError, TableResult};
use super::key::Key;
use super::record::Record;

/// Maximum payload size in bytes
pub const MAX_SIZE: usize = 2000;

/// Default tombstone retention window (30 days)
pub const TOMBSTONE_RETENTION: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Current Unix time in milliseconds.
/// Returns 0 if the system clock is before the UNIX epoch.
pub fn now_millis() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

/// SHA-256 digest of a payload
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checksum([u8; 32]);

impl Checksum {
    /// Checksum carried by tombstones
    pub const TOMBSTONE: Checksum = Checksum([0u8; 32]);

    pub fn of(bytes: &[u8]) -> Self {
        Checksum(Sha256::digest(bytes).into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_tombstone(&self) -> bool {
        *self == Self::TOMBSTONE
    }
}

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Checksum({})", self)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}

/// Application-defined content type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentType(pub u16);

impl ContentType {
    pub const TOMBSTONE: ContentType = ContentType(0);
    pub const BINARY: ContentType = ContentType(1);
    pub const TEXT: ContentType = ContentType(2);
    pub const JSON: ContentType = ContentType(3);
    pub const WAYPOINT: ContentType = ContentType(16);
}

/// Lifecycle state of a Content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentState {
    Extant,
    Deleted,
}

/// Value stored at a Key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    pub checksum: Checksum,
    pub bytes: Option<Vec<u8>>,
    pub content_type: ContentType,
    /// Milliseconds since the UNIX epoch (1 for freshly built content)
    pub version: u64,
    pub state: ContentState,
}

impl Content {
    /// Build extant content from a payload.
    ///
    /// Oversized payloads are rejected outright; callers should not retry.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>, content_type: ContentType) -> TableResult<Self> {
        let bytes = bytes.into();
        if bytes.len() > MAX_SIZE {
            return Err(TableError::ContentTooLarge { size: bytes.len(), max: MAX_SIZE });
        }

        Ok(Content {
            checksum: Checksum::of(&bytes),
            bytes: Some(bytes),
            content_type,
            version: 1,
            state: ContentState::Extant,
        })
    }

    /// Tombstone at the given version
    pub fn tombstone(version: u64) -> Self {
        Content {
            checksum: Checksum::TOMBSTONE,
            bytes: None,
            content_type: ContentType::TOMBSTONE,
            version,
            state: ContentState::Deleted,
        }
    }

    /// Same content restamped at `version`
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    pub fn is_deleted(&self) -> bool {
        self.state == ContentState::Deleted
    }

    pub fn is_extant(&self) -> bool {
        self.state == ContentState::Extant
    }

    pub fn len(&self) -> usize {
        self.bytes.as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Self-consistency: checksum matches payload and payload fits, or a well-formed tombstone
    pub fn is_valid(&self) -> bool {
        match self.state {
            ContentState::Extant => match &self.bytes {
                Some(bytes) => bytes.len() <= MAX_SIZE && Checksum::of(bytes) == self.checksum,
                None => false,
            },
            ContentState::Deleted => self.bytes.is_none() && self.checksum.is_tombstone(),
        }
    }

    /// Cross-consistency with an advertised Record
    pub fn is_valid_for(&self, record: &Record) -> bool {
        self.is_valid() && self.checksum == record.checksum && self.version == record.version
    }

    /// Descriptor for this content at `key`
    pub fn record(&self, key: Key) -> Record {
        Record::new(key, self.checksum, self.version)
    }

    /// Dead tombstone: deleted and older than the retention window at `now`
    pub fn is_dead(&self, now: u64, retention: Duration) -> bool {
        self.is_deleted() && now.saturating_sub(self.version) > retention.as_millis() as u64
    }
}
