//! Test fixtures for creating common test objects
//!
//! Factory functions for content and a publisher that records instead of sending.

use std::sync::{Mutex, PoisonError};

use super::deterministic_rng::deterministic_bytes_with_seed;
use crate::core_table::content::{Content, ContentType};
use crate::core_table::events::{Event, Target};
use crate::core_table::traits::Publisher;

/// Extant text content at version 1
pub fn text_content(text: &str) -> Content {
    Content::from_bytes(text.as_bytes().to_vec(), ContentType::TEXT)
        .expect("fixture text fits MAX_SIZE")
}

/// Extant binary content of `len` seeded bytes
pub fn binary_content(len: usize, seed: u64) -> Content {
    Content::from_bytes(deterministic_bytes_with_seed(len, seed), ContentType::BINARY)
        .expect("fixture length fits MAX_SIZE")
}

/// Publisher that keeps every published event in order
#[derive(Default)]
pub struct RecordingPublisher {
    sent: Mutex<Vec<(Target, Event)>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain everything published so far
    pub fn take(&self) -> Vec<(Target, Event)> {
        std::mem::take(&mut *self.sent.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn len(&self) -> usize {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Publisher for RecordingPublisher {
    fn publish(&self, target: Target, event: Event) {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).push((target, event));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_table::key::PeerId;
    use uuid::Uuid;

    #[test]
    fn test_recording_publisher_drains() {
        let publisher = RecordingPublisher::new();
        let event = Event::SyncRecords { sender: PeerId::generate(), namespace: Uuid::new_v4() };
        publisher.publish(Target::Peer(PeerId::generate()), event.clone());

        assert_eq!(publisher.len(), 1);
        assert_eq!(publisher.take()[0].1, event);
        assert_eq!(publisher.len(), 0);
    }

    #[test]
    fn test_binary_content_is_reproducible() {
        assert_eq!(binary_content(64, 1), binary_content(64, 1));
        assert_ne!(binary_content(64, 1).checksum, binary_content(64, 2).checksum);
    }
}
