/*
    Adapters - shipped implementations of the table's collaborators

    - cipher:       ChaCha20-Poly1305 namespace cipher
    - bus:          in-process publisher
    - file_state:   snapshot file persistence
    - memory_state: in-memory persistence
    - listener:     change listeners
*/

pub mod bus;
pub mod cipher;
pub mod file_state;
pub mod listener;
pub mod memory_state;

pub use bus::{BusStats, LocalBus};
pub use cipher::{GroupCipher, NamespaceSecret};
pub use file_state::{FileNamespaceState, Snapshot, SnapshotMetadata};
pub use listener::{BroadcastListener, NoopListener, TableChange};
pub use memory_state::MemoryNamespaceState;
