//! In-process event bus
//!
//! Routes table events between peers living in the same process. Each peer
//! joins the bus and gets an unbounded receiver; namespace-targeted events
//! reach every subscriber of that namespace except the sender.
//!
//! Used by the integration tests and the CLI simulation. A configurable drop
//! rate stands in for a lossy transport.

use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use tokio::sync::mpsc;
use tracing::trace;

use crate::core_table::events::{Event, Target};
use crate::core_table::key::{NamespaceId, PeerId};
use crate::core_table::traits::Publisher;

#[derive(Default)]
struct Routes {
    peers: HashMap<PeerId, mpsc::UnboundedSender<Event>>,
    subscriptions: HashMap<NamespaceId, HashSet<PeerId>>,
}

/// Delivery counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusStats {
    pub delivered: u64,
    pub dropped: u64,
}

/// In-memory publisher shared by every peer of a simulation
#[derive(Default)]
pub struct LocalBus {
    routes: RwLock<Routes>,
    /// Drop probability in parts per million
    drop_ppm: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a peer and return its inbox
    pub fn join(&self, peer: PeerId) -> mpsc::UnboundedReceiver<Event> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.routes.write().unwrap_or_else(PoisonError::into_inner).peers.insert(peer, tx);
        rx
    }

    /// Remove a peer and all its subscriptions
    pub fn leave(&self, peer: &PeerId) {
        let mut routes = self.routes.write().unwrap_or_else(PoisonError::into_inner);
        routes.peers.remove(peer);
        for members in routes.subscriptions.values_mut() {
            members.remove(peer);
        }
    }

    pub fn subscribe(&self, peer: PeerId, namespace: NamespaceId) {
        self.routes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .subscriptions
            .entry(namespace)
            .or_default()
            .insert(peer);
    }

    pub fn unsubscribe(&self, peer: &PeerId, namespace: &NamespaceId) {
        let mut routes = self.routes.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(members) = routes.subscriptions.get_mut(namespace) {
            members.remove(peer);
        }
    }

    /// Probability in [0, 1] that any single delivery is dropped
    pub fn set_drop_rate(&self, rate: f64) {
        let ppm = (rate.clamp(0.0, 1.0) * 1_000_000.0) as u64;
        self.drop_ppm.store(ppm, Ordering::Relaxed);
    }

    pub fn stats(&self) -> BusStats {
        BusStats {
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    fn should_drop(&self) -> bool {
        let ppm = self.drop_ppm.load(Ordering::Relaxed);
        ppm > 0 && rand::rng().random_range(0..1_000_000) < ppm
    }

    fn deliver(&self, tx: &mpsc::UnboundedSender<Event>, event: Event) {
        if self.should_drop() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }
        // A closed inbox means the peer is gone; nothing to do
        if tx.send(event).is_ok() {
            self.delivered.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl Publisher for LocalBus {
    fn publish(&self, target: Target, event: Event) {
        let routes = self.routes.read().unwrap_or_else(PoisonError::into_inner);
        trace!(kind = event.kind(), sender = %event.sender(), ?target, "Routing event");

        match target {
            Target::Peer(peer) => {
                if let Some(tx) = routes.peers.get(&peer) {
                    self.deliver(tx, event);
                }
            }
            Target::Namespace(namespace) => {
                let sender = event.sender();
                let Some(members) = routes.subscriptions.get(&namespace) else {
                    return;
                };
                for member in members.iter().filter(|m| **m != sender) {
                    if let Some(tx) = routes.peers.get(member) {
                        self.deliver(tx, event.clone());
                    }
                }
            }
        }
    }
}
