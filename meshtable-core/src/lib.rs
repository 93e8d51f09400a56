//! meshtable: a replicated, namespaced, encrypted key/value table.
//!
//! Peers keep a local copy of every namespace they belong to and converge
//! by advertising record summaries and fetching the content they lack.
//! Transport, key management and storage are plugged in through the traits
//! in [`core_table::traits`].

pub mod adapters;
pub mod config;
pub mod core_table;
pub mod logging;
pub mod metrics;
pub mod simulation;

#[cfg(test)]
pub mod test_utils;

pub use config::Config;
pub use core_table::{
    Content, ContentType, Event, Key, NamespaceId, PeerId, Record, ReplicatedTable, TableConfig,
    TableError, TableResult,
};
pub use logging::{init_logging, LogLevel};
