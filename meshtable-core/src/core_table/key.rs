/*
    Key - identifies one logical item within one namespace

    Responsibilities:
    `key.rs` defines the addressing types shared by the table and the wire protocol.
    It handles: namespace/id pairs, peer identities, and their display forms.

    A key is only ever compared for equality and hashed; no ordering is implied
    between keys of different namespaces.

    Inputs:
    - namespace UUIDs (one per group, or nil for the local/self namespace)
    - item UUIDs chosen by the writer

    Outputs:
    - hashable `Key` values
    - `PeerId` identities used as event senders and fetch targets
*/

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Namespace identifier. The nil UUID is the local, per-recipient namespace.
pub type NamespaceId = Uuid;

/// Identity of a participant in the replication group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(Uuid);

impl PeerId {
    pub fn new(id: Uuid) -> Self {
        PeerId(id)
    }

    /// Generate a random identity (tests and simulations)
    pub fn generate() -> Self {
        PeerId(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl From<Uuid> for PeerId {
    fn from(id: Uuid) -> Self {
        PeerId(id)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form keeps log lines readable
        write!(f, "{}", &self.0.simple().to_string()[..8])
    }
}

/// Address of one item: (namespace, id)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Key {
    pub namespace: NamespaceId,
    pub id: Uuid,
}

impl Key {
    pub fn new(namespace: NamespaceId, id: Uuid) -> Self {
        Key { namespace, id }
    }

    /// Key with a fresh random id inside `namespace`
    pub fn generate(namespace: NamespaceId) -> Self {
        Key { namespace, id: Uuid::new_v4() }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.id)
    }
}
