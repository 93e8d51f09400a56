/*
    core_table - replicated, namespaced, encrypted key/value table

    Main subsystem of meshtable. Handles:
    - Data model (Key, Content, Record, tombstones)
    - Local mutations with first-write-wins creation
    - Advertise-then-fetch reconciliation between peers
    - Capacity ceilings and tombstone pruning
    - Background snapshot persistence
    - An optional timer task driving sync, fetch and prune

    Transport, key management and storage are collaborators behind the
    traits in `traits.rs`.
*/

pub mod content;
pub mod driver;
pub mod errors;
pub mod events;
pub mod key;
pub mod pending;
pub mod record;
pub mod table;
pub mod table_config;
pub mod traits;

mod persistence;
mod reconcile;

#[cfg(test)]
pub mod tests;

pub use content::{Checksum, Content, ContentState, ContentType, MAX_SIZE, TOMBSTONE_RETENTION};
pub use errors::{CapacityScope, CipherError, StateError, StateResult, TableError, TableResult};
pub use driver::SyncDriver;
pub use events::{Event, Target};
pub use key::{Key, NamespaceId, PeerId};
pub use pending::PendingFetches;
pub use record::Record;
pub use table::{ReplicatedTable, ReplicatedTableBuilder, TableStats};
pub use table_config::{TableConfig, MAX_NAMESPACES, MAX_RECORDS};
pub use traits::{ContentCipher, NamespaceState, Publisher, Table, TableListener};
