//! Collaborator Traits
//!
//! Interfaces the replicated table consumes. The table owns none of the
//! transport, key management or storage; it only relies on these contracts.

use async_trait::async_trait;
use std::collections::HashMap;
use uuid::Uuid;

use super::content::Content;
use super::errors::{CipherError, StateResult};
use super::events::{Event, Target};
use super::key::{Key, NamespaceId, PeerId};

/// Whole-table snapshot: namespace -> id -> content
pub type Table = HashMap<NamespaceId, HashMap<Uuid, Content>>;

/// Event transport
///
/// Delivery is best-effort, unordered and possibly duplicated. Implementations
/// must not block the caller; queue and return.
pub trait Publisher: Send + Sync {
    /// Send `event` to one identity or to every subscriber of a namespace
    fn publish(&self, target: Target, event: Event);
}

/// Per-namespace payload encryption
///
/// The namespace is the encryption context: a group namespace implies the
/// group key, the nil namespace implies per-recipient keys.
pub trait ContentCipher: Send + Sync {
    /// Encrypt `content` on behalf of `owner` for `namespace`
    fn encrypt(
        &self,
        owner: PeerId,
        namespace: NamespaceId,
        content: &Content,
    ) -> Result<Vec<u8>, CipherError>;

    /// Decrypt a payload sent by `sender` for `namespace`
    fn decrypt(
        &self,
        sender: PeerId,
        namespace: NamespaceId,
        payload: &[u8],
    ) -> Result<Content, CipherError>;
}

/// Durable whole-table snapshot store
///
/// Implementations must replace the previous snapshot atomically.
#[async_trait]
pub trait NamespaceState: Send + Sync {
    /// Load the last written table, or an empty one
    async fn read(&self) -> StateResult<Table>;

    /// Replace the stored table
    async fn write(&self, table: Table) -> StateResult<()>;
}

/// Application callback for remotely applied changes.
///
/// Local `put`/`delete` never loop back through the listener.
pub trait TableListener: Send + Sync {
    fn on_add(&self, key: &Key, content: &Content);

    fn on_remove(&self, key: &Key, content: &Content);
}
