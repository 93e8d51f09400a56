/*
    Simulation - several replicas wired over one LocalBus

    Drives a group of tables sharing one namespace without a network:
    events sit in per-peer inboxes until `deliver` drains them, and the
    caller-owned tick (`tick`) runs one fetch per peer. Used by the scenario
    tests and by `meshtable simulate`.
*/

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::adapters::{BusStats, GroupCipher, LocalBus, MemoryNamespaceState};
use crate::core_table::{
    Event, NamespaceId, NamespaceState, PeerId, Record, ReplicatedTable, TableConfig, TableResult,
};

/// Simulation parameters
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub peers: usize,
    /// Probability that any single delivery is lost
    pub drop_rate: f64,
    pub seed: u64,
    pub table: TableConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig { peers: 3, drop_rate: 0.0, seed: 42, table: TableConfig::default() }
    }
}

/// One replica and its inbox
pub struct SimPeer {
    pub table: ReplicatedTable,
    inbox: mpsc::UnboundedReceiver<Event>,
}

/// A group of replicas sharing one namespace
pub struct Simulation {
    bus: Arc<LocalBus>,
    namespace: NamespaceId,
    peers: Vec<SimPeer>,
    rng: StdRng,
}

impl Simulation {
    /// Peers backed by in-memory state
    pub async fn new(config: SimulationConfig) -> TableResult<Self> {
        let states = (0..config.peers)
            .map(|_| Arc::new(MemoryNamespaceState::new()) as Arc<dyn NamespaceState>)
            .collect();
        Self::with_states(config, states).await
    }

    /// One peer per supplied state store
    pub async fn with_states(
        config: SimulationConfig,
        states: Vec<Arc<dyn NamespaceState>>,
    ) -> TableResult<Self> {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let namespace = Uuid::from_bytes(rng.random());
        let secret = GroupCipher::generate_secret();

        let bus = Arc::new(LocalBus::new());
        bus.set_drop_rate(config.drop_rate);

        let mut peers = Vec::with_capacity(states.len());
        for state in states {
            let local = PeerId::new(Uuid::from_bytes(rng.random()));
            let inbox = bus.join(local);
            bus.subscribe(local, namespace);

            let cipher = Arc::new(GroupCipher::new().with_secret(namespace, secret));
            let table = ReplicatedTable::builder(local, bus.clone(), cipher)
                .config(config.table.clone())
                .state(state)
                .rng_seed(rng.random())
                .build()
                .await?;
            peers.push(SimPeer { table, inbox });
        }

        info!(%namespace, peers = peers.len(), drop_rate = config.drop_rate, "Simulation ready");
        Ok(Simulation { bus, namespace, peers, rng })
    }

    pub fn namespace(&self) -> NamespaceId {
        self.namespace
    }

    pub fn peers(&self) -> &[SimPeer] {
        &self.peers
    }

    pub fn table(&self, index: usize) -> &ReplicatedTable {
        &self.peers[index].table
    }

    pub fn bus_stats(&self) -> BusStats {
        self.bus.stats()
    }

    /// Index of a peer chosen with the simulation RNG
    pub fn random_peer(&mut self) -> usize {
        self.rng.random_range(0..self.peers.len())
    }

    /// Process queued events until every inbox is empty.
    /// Returns the number of events handled.
    pub fn deliver(&mut self) -> TableResult<usize> {
        let mut total = 0;
        loop {
            let mut handled = 0;
            for peer in &mut self.peers {
                while let Ok(event) = peer.inbox.try_recv() {
                    peer.table.process(event)?;
                    handled += 1;
                }
            }
            if handled == 0 {
                return Ok(total);
            }
            total += handled;
        }
    }

    /// Every peer asks the namespace for records
    pub fn sync_all(&self) {
        for peer in &self.peers {
            peer.table.sync(self.namespace);
        }
    }

    /// One fetch per peer, then deliver. Returns the number of fetch requests sent.
    pub fn tick(&mut self) -> TableResult<usize> {
        let requests =
            self.peers.iter().filter(|peer| peer.table.process_pending_records().is_some()).count();
        self.deliver()?;
        Ok(requests)
    }

    pub fn pending(&self) -> usize {
        self.peers.iter().map(|peer| peer.table.pending_len()).sum()
    }

    /// Whether every peer exposes the same live entries.
    ///
    /// Tombstones are left out: only the deleting peer keeps one.
    pub fn is_converged(&self) -> bool {
        let mut sets = self.peers.iter().map(|peer| {
            peer.table
                .records()
                .into_iter()
                .filter(|record| !record.is_tombstone())
                .collect::<HashSet<Record>>()
        });
        match sets.next() {
            Some(first) => sets.all(|set| set == first),
            None => true,
        }
    }

    /// Sync rounds until converged. Returns the number of rounds used, or
    /// `None` if `max_rounds` was not enough.
    pub fn run_until_converged(&mut self, max_rounds: usize) -> TableResult<Option<usize>> {
        self.deliver()?;
        for round in 1..=max_rounds {
            self.sync_all();
            self.deliver()?;
            while self.pending() > 0 {
                self.tick()?;
            }
            if self.is_converged() {
                debug!(round, "Converged");
                return Ok(Some(round));
            }
        }
        Ok(None)
    }
}
