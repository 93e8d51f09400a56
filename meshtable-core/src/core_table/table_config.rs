/*
    TableConfig - limits and tuning for the replicated table

    Responsibilities:
    `table_config.rs` defines the ceilings and retention window the engine enforces,
    plus the depth of the persistence request queue and the clock skew
    allowed on incoming versions.

    Inputs:
    - defaults, or the `[table]` section of the config file

    Outputs:
    - static values to the rest of the table subsystem
*/

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::content::TOMBSTONE_RETENTION;

/// Maximum number of namespaces held at once
pub const MAX_NAMESPACES: usize = 32767;

/// Maximum number of entries (tombstones included) per namespace
pub const MAX_RECORDS: usize = 32767;

/// Default persistence queue depth
pub const DEFAULT_PERSIST_QUEUE_DEPTH: usize = 16;

/// Default allowance for versions stamped ahead of the local clock
pub const DEFAULT_MAX_CLOCK_SKEW: Duration = Duration::from_secs(3600);

/// Configuration for the replicated table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Namespace ceiling
    pub max_namespaces: usize,

    /// Per-namespace entry ceiling
    pub max_records: usize,

    /// How long a tombstone is kept before a prune pass may drop it
    #[serde(with = "humantime_serde")]
    pub tombstone_retention: Duration,

    /// Bound of the persistence request queue
    pub persist_queue_depth: usize,

    /// How far ahead of the local clock an accepted version may be
    #[serde(with = "humantime_serde")]
    pub max_clock_skew: Duration,
}

impl Default for TableConfig {
    fn default() -> Self {
        TableConfig {
            max_namespaces: MAX_NAMESPACES,
            max_records: MAX_RECORDS,
            tombstone_retention: TOMBSTONE_RETENTION,
            persist_queue_depth: DEFAULT_PERSIST_QUEUE_DEPTH,
            max_clock_skew: DEFAULT_MAX_CLOCK_SKEW,
        }
    }
}

impl TableConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set namespace ceiling
    pub fn with_max_namespaces(mut self, max: usize) -> Self {
        self.max_namespaces = max;
        self
    }

    /// Builder: set per-namespace ceiling
    pub fn with_max_records(mut self, max: usize) -> Self {
        self.max_records = max;
        self
    }

    /// Builder: set tombstone retention
    pub fn with_tombstone_retention(mut self, retention: Duration) -> Self {
        self.tombstone_retention = retention;
        self
    }

    /// Builder: set persistence queue depth
    pub fn with_persist_queue_depth(mut self, depth: usize) -> Self {
        self.persist_queue_depth = depth;
        self
    }

    /// Builder: set clock skew allowance
    pub fn with_max_clock_skew(mut self, skew: Duration) -> Self {
        self.max_clock_skew = skew;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_namespaces == 0 {
            return Err("max_namespaces must be greater than 0".to_string());
        }
        if self.max_records == 0 {
            return Err("max_records must be greater than 0".to_string());
        }
        if self.persist_queue_depth == 0 {
            return Err("persist_queue_depth must be greater than 0".to_string());
        }
        Ok(())
    }
}
