//! Table Change Listeners
//!
//! Ready-made `TableListener` implementations.

use tokio::sync::broadcast;

use crate::core_table::content::Content;
use crate::core_table::key::Key;
use crate::core_table::traits::TableListener;

/// Remotely applied change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableChange {
    Added { key: Key, content: Content },
    Removed { key: Key, content: Content },
}

impl TableChange {
    pub fn key(&self) -> &Key {
        match self {
            TableChange::Added { key, .. } => key,
            TableChange::Removed { key, .. } => key,
        }
    }
}

/// Listener that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopListener;

impl TableListener for NoopListener {
    fn on_add(&self, _key: &Key, _content: &Content) {}

    fn on_remove(&self, _key: &Key, _content: &Content) {}
}

/// Listener that forwards changes to any number of subscribers
///
/// Uses a tokio broadcast channel; slow subscribers lag rather than block the table.
#[derive(Clone)]
pub struct BroadcastListener {
    tx: broadcast::Sender<TableChange>,
}

impl BroadcastListener {
    /// # Arguments
    /// * `capacity` - Number of changes buffered per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TableChange> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    fn emit(&self, change: TableChange) {
        // No receivers is fine
        let _ = self.tx.send(change);
    }
}

impl Default for BroadcastListener {
    fn default() -> Self {
        Self::new(256)
    }
}

impl TableListener for BroadcastListener {
    fn on_add(&self, key: &Key, content: &Content) {
        self.emit(TableChange::Added { key: *key, content: content.clone() });
    }

    fn on_remove(&self, key: &Key, content: &Content) {
        self.emit(TableChange::Removed { key: *key, content: content.clone() });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_table::content::ContentType;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_broadcast_listener_forwards() {
        let listener = BroadcastListener::new(8);
        let mut rx = listener.subscribe();
        assert_eq!(listener.subscriber_count(), 1);

        let key = Key::generate(Uuid::new_v4());
        let content = Content::from_bytes(b"x".to_vec(), ContentType::TEXT).unwrap();

        listener.on_add(&key, &content);
        listener.on_remove(&key, &content);

        assert_eq!(rx.recv().await.unwrap(), TableChange::Added { key, content: content.clone() });
        let removed = rx.recv().await.unwrap();
        assert_eq!(removed.key(), &key);
        assert!(matches!(removed, TableChange::Removed { .. }));
    }

    #[test]
    fn test_no_subscribers_is_fine() {
        let listener = BroadcastListener::default();
        let key = Key::generate(Uuid::new_v4());
        listener.on_add(&key, &Content::tombstone(1));
    }
}
