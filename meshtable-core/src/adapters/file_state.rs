/*
    file_state.rs - Snapshot file persistence for the table

    Writes the whole table to a single file after every mutation batch.
    Enables restart without re-fetching everything from peers.

    Features:
    - Atomic replace (write to temp, fsync, then rename)
    - Magic header + format version so foreign files are rejected
    - Missing file reads as an empty table
*/

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::core_table::content::now_millis;
use crate::core_table::errors::{StateError, StateResult};
use crate::core_table::traits::{NamespaceState, Table};

/// Magic header for snapshot files
const MAGIC_HEADER: &[u8; 8] = b"MSHT0001";

/// Current snapshot format version
const FORMAT_VERSION: u8 = 1;

const HEADER_LEN: usize = MAGIC_HEADER.len() + 1;

/// Snapshot metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    /// Milliseconds since the UNIX epoch when written
    pub timestamp: u64,

    /// Number of namespaces
    pub namespaces_count: usize,

    /// Number of entries across namespaces, tombstones included
    pub entries_count: usize,
}

/// Snapshot file contents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub metadata: SnapshotMetadata,
    pub table: Table,
}

impl Snapshot {
    pub fn new(table: Table) -> Self {
        let metadata = SnapshotMetadata {
            timestamp: now_millis(),
            namespaces_count: table.len(),
            entries_count: table.values().map(|m| m.len()).sum(),
        };
        Snapshot { metadata, table }
    }

    /// Encode with header
    pub fn to_bytes(&self) -> StateResult<Vec<u8>> {
        let body = bincode::serialize(self)?;
        let mut data = Vec::with_capacity(HEADER_LEN + body.len());
        data.extend_from_slice(MAGIC_HEADER);
        data.push(FORMAT_VERSION);
        data.extend_from_slice(&body);
        Ok(data)
    }

    /// Decode, checking header and version
    pub fn from_bytes(data: &[u8]) -> StateResult<Self> {
        if data.len() < HEADER_LEN || &data[..MAGIC_HEADER.len()] != MAGIC_HEADER {
            return Err(StateError::Corrupted("Invalid snapshot header".to_string()));
        }

        let version = data[MAGIC_HEADER.len()];
        if version != FORMAT_VERSION {
            return Err(StateError::Corrupted(format!(
                "Unsupported snapshot format version: {}",
                version
            )));
        }

        bincode::deserialize(&data[HEADER_LEN..]).map_err(|e| StateError::Corrupted(e.to_string()))
    }
}

/// Snapshot store backed by one file
#[derive(Debug, Clone)]
pub struct FileNamespaceState {
    path: PathBuf,
}

impl FileNamespaceState {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileNamespaceState { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Load the full snapshot including metadata
    pub async fn load(&self) -> StateResult<Option<Snapshot>> {
        match tokio::fs::read(&self.path).await {
            Ok(data) => Snapshot::from_bytes(&data).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl NamespaceState for FileNamespaceState {
    async fn read(&self) -> StateResult<Table> {
        Ok(self.load().await?.map(|snapshot| snapshot.table).unwrap_or_default())
    }

    async fn write(&self, table: Table) -> StateResult<()> {
        let snapshot = Snapshot::new(table);
        let data = snapshot.to_bytes()?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let temp_path = self.temp_path();
        let mut file = tokio::fs::File::create(&temp_path).await?;
        file.write_all(&data).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&temp_path, &self.path).await?;

        debug!(
            path = %self.path.display(),
            entries = snapshot.metadata.entries_count,
            "Snapshot written"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_table::content::{Content, ContentType};
    use std::collections::HashMap;
    use tempfile::tempdir;
    use uuid::Uuid;

    fn sample_table() -> Table {
        let mut entries = HashMap::new();
        entries.insert(Uuid::new_v4(), Content::from_bytes(b"one".to_vec(), ContentType::TEXT).unwrap());
        entries.insert(Uuid::new_v4(), Content::tombstone(now_millis()));

        let mut table = Table::new();
        table.insert(Uuid::new_v4(), entries);
        table
    }

    #[tokio::test]
    async fn test_missing_file_reads_empty() {
        let dir = tempdir().unwrap();
        let state = FileNamespaceState::new(dir.path().join("table.bin"));

        assert!(state.read().await.unwrap().is_empty());
        assert!(state.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let dir = tempdir().unwrap();
        let state = FileNamespaceState::new(dir.path().join("nested").join("table.bin"));
        let table = sample_table();

        state.write(table.clone()).await.unwrap();
        assert_eq!(state.read().await.unwrap(), table);

        let snapshot = state.load().await.unwrap().unwrap();
        assert_eq!(snapshot.metadata.namespaces_count, 1);
        assert_eq!(snapshot.metadata.entries_count, 2);

        // No temp file left behind
        let files: Vec<_> = std::fs::read_dir(dir.path().join("nested")).unwrap().collect();
        assert_eq!(files.len(), 1);
    }

    #[tokio::test]
    async fn test_overwrite_replaces() {
        let dir = tempdir().unwrap();
        let state = FileNamespaceState::new(dir.path().join("table.bin"));

        state.write(sample_table()).await.unwrap();
        state.write(Table::new()).await.unwrap();

        assert!(state.read().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_foreign_file_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("table.bin");
        std::fs::write(&path, b"definitely not a snapshot").unwrap();

        let state = FileNamespaceState::new(path);
        assert!(matches!(state.read().await, Err(StateError::Corrupted(_))));
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let mut data = Snapshot::new(Table::new()).to_bytes().unwrap();
        data[MAGIC_HEADER.len()] = 99;

        let result = Snapshot::from_bytes(&data);
        assert!(matches!(result, Err(StateError::Corrupted(msg)) if msg.contains("99")));
    }

    #[test]
    fn test_truncated_body_rejected() {
        let data = Snapshot::new(sample_table()).to_bytes().unwrap();
        assert!(Snapshot::from_bytes(&data[..data.len() / 2]).is_err());
    }
}
