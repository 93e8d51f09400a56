//! In-memory namespace state
//!
//! Keeps the last written snapshot in memory. Used by tests and by tables
//! that do not need durability.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::core_table::errors::StateResult;
use crate::core_table::traits::{NamespaceState, Table};

/// Snapshot store backed by memory
#[derive(Debug, Default)]
pub struct MemoryNamespaceState {
    table: RwLock<Table>,
    writes: AtomicUsize,
}

impl MemoryNamespaceState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing snapshot
    pub fn with_table(table: Table) -> Self {
        MemoryNamespaceState { table: RwLock::new(table), writes: AtomicUsize::new(0) }
    }

    /// Number of writes received so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NamespaceState for MemoryNamespaceState {
    async fn read(&self) -> StateResult<Table> {
        Ok(self.table.read().await.clone())
    }

    async fn write(&self, table: Table) -> StateResult<()> {
        *self.table.write().await = table;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
