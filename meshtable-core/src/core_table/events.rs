/*
    Events - reconciliation messages exchanged between table replicas.

    Responsibilities:
    `events.rs` defines the closed set of events the table sends and handles:

    Announcements:
    - CREATE_ENTRY(record, encrypted payload | none)
    - DELETE_RECORD(record)

    Anti-entropy:
    - SYNC_RECORDS(namespace)      "what do you have"
    - PUBLISH_RECORDS(records)     "here is what I have"
    - SYNC_CONTENT(record)         "send me this exact content"

    Serialization is done with bincode.

    Inputs:
    - inbound traffic from the Publisher's transport

    Outputs:
    - structured event enums and their delivery targets
*/

use serde::{Deserialize, Serialize};

use super::key::{NamespaceId, PeerId};
use super::record::Record;

/// Reconciliation event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    /// Content for a record. `None` payload means the sender has nothing for it.
    CreateEntry { sender: PeerId, record: Record, payload: Option<Vec<u8>> },

    /// The record's key is now deleted
    DeleteRecord { sender: PeerId, record: Record },

    /// Ask peers to advertise their records for a namespace
    SyncRecords { sender: PeerId, namespace: NamespaceId },

    /// Advertisement of held records
    PublishRecords { sender: PeerId, records: Vec<Record> },

    /// Ask one peer for the content of an exact record
    SyncContent { sender: PeerId, record: Record },
}

/// Where an event should be delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Target {
    /// A single identity
    Peer(PeerId),
    /// Every identity subscribed to the namespace
    Namespace(NamespaceId),
}

impl Event {
    /// Sender identity of any event
    pub fn sender(&self) -> PeerId {
        match self {
            Event::CreateEntry { sender, .. } => *sender,
            Event::DeleteRecord { sender, .. } => *sender,
            Event::SyncRecords { sender, .. } => *sender,
            Event::PublishRecords { sender, .. } => *sender,
            Event::SyncContent { sender, .. } => *sender,
        }
    }

    /// Namespace the event concerns, if it names exactly one
    pub fn namespace(&self) -> Option<NamespaceId> {
        match self {
            Event::CreateEntry { record, .. } => Some(record.key.namespace),
            Event::DeleteRecord { record, .. } => Some(record.key.namespace),
            Event::SyncRecords { namespace, .. } => Some(*namespace),
            Event::PublishRecords { records, .. } => records.first().map(|r| r.key.namespace),
            Event::SyncContent { record, .. } => Some(record.key.namespace),
        }
    }

    /// Short name for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Event::CreateEntry { .. } => "create_entry",
            Event::DeleteRecord { .. } => "delete_record",
            Event::SyncRecords { .. } => "sync_records",
            Event::PublishRecords { .. } => "publish_records",
            Event::SyncContent { .. } => "sync_content",
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}
