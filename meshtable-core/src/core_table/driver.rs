/*
    SyncDriver - timers that keep one table reconciling

    The table itself never schedules work. A caller that wants the usual
    cadence spawns a driver: it asks every joined or held namespace for
    records, fetches one pending record per fetch tick and prunes dead
    tombstones. Stopping (or dropping) the driver ends the task.
*/

use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, trace, warn};

use super::key::NamespaceId;
use super::table::ReplicatedTable;
use crate::config::SyncConfig;

/// Handle to a running sync task
pub struct SyncDriver {
    shutdown_tx: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

impl SyncDriver {
    /// Start driving `table`. `joined` are namespaces to sync even while
    /// nothing is held for them yet.
    pub fn spawn(
        table: Arc<ReplicatedTable>,
        joined: Vec<NamespaceId>,
        config: &SyncConfig,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(run(table, joined, config.clone(), shutdown_rx));
        SyncDriver { shutdown_tx, handle }
    }

    /// Signal the task and wait for it to finish
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.handle.await {
            warn!("Sync driver task failed: {}", e);
        }
    }
}

async fn run(
    table: Arc<ReplicatedTable>,
    joined: Vec<NamespaceId>,
    config: SyncConfig,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut sync = interval(config.sync_interval);
    let mut fetch = interval(config.fetch_interval);
    let mut prune = interval(config.prune_interval);
    for timer in [&mut sync, &mut fetch, &mut prune] {
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    }

    debug!(peer = %table.local_peer(), joined = joined.len(), "Sync driver started");

    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            _ = sync.tick() => {
                let mut namespaces: HashSet<NamespaceId> = table.namespaces().into_iter().collect();
                namespaces.extend(joined.iter().copied());
                for namespace in namespaces {
                    table.sync(namespace);
                }
            }
            _ = fetch.tick() => {
                if let Some(source) = table.process_pending_records() {
                    trace!(%source, "Fetch requested");
                }
            }
            _ = prune.tick() => {
                let removed = table.prune();
                if removed > 0 {
                    debug!(removed, "Periodic prune");
                }
            }
        }
    }

    debug!(peer = %table.local_peer(), "Sync driver stopped");
}
