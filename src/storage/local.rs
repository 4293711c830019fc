// src/storage/local.rs

//! Local filesystem storage implementation.
//!
//! All writes are atomic (write to temp, then rename) so a crashed run never
//! leaves a half-written snapshot behind.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{Record, RunMeta};
use crate::pipeline::ChangeSet;
use crate::storage::{Checkpoint, HarvestSnapshot, HarvestStorage};

const CURRENT_KEY: &str = "current.json";
const CHECKPOINT_KEY: &str = "checkpoint.json";

/// Local filesystem storage backend.
#[derive(Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Write JSON data.
    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Run snapshot key for a given run id.
    fn run_key(run_id: &str) -> String {
        format!("runs/{run_id}.json")
    }

    /// Staged changeset key for a given run id.
    fn changes_key(run_id: &str) -> String {
        format!("changes/{run_id}.json")
    }
}

#[async_trait]
impl HarvestStorage for LocalStorage {
    async fn write_checkpoint(&self, rows: &[Record]) -> Result<String> {
        let checkpoint = Checkpoint::new(rows.to_vec());
        self.write_json(CHECKPOINT_KEY, &checkpoint).await?;
        log::info!("Checkpoint: {} rows written", checkpoint.count);
        Ok(CHECKPOINT_KEY.to_string())
    }

    async fn load_checkpoint(&self) -> Result<Option<Vec<Record>>> {
        Ok(self
            .read_json::<Checkpoint>(CHECKPOINT_KEY)
            .await?
            .map(|c| c.rows))
    }

    async fn clear_checkpoint(&self) -> Result<()> {
        let path = self.path(CHECKPOINT_KEY);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn write_run(&self, rows: &[Record], meta: &RunMeta) -> Result<String> {
        let run_id = Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
        let snapshot = HarvestSnapshot::new(rows.to_vec(), meta.clone());

        self.write_json(&Self::run_key(&run_id), &snapshot).await?;
        self.write_json(CURRENT_KEY, &snapshot).await?;
        log::info!("Run {run_id}: {} rows written", snapshot.count);
        Ok(run_id)
    }

    async fn load_baseline(&self) -> Result<HashMap<String, Record>> {
        let Some(snapshot) = self.read_json::<HarvestSnapshot>(CURRENT_KEY).await? else {
            log::warn!("No {CURRENT_KEY} found; baseline is empty");
            return Ok(HashMap::new());
        };
        let mut baseline = HashMap::with_capacity(snapshot.rows.len());
        for record in snapshot.rows {
            let identity = record.identity();
            if !identity.is_empty() {
                baseline.insert(identity, record);
            }
        }
        Ok(baseline)
    }

    async fn stage_changes(&self, run_id: &str, changes: &ChangeSet) -> Result<()> {
        self.write_json(&Self::changes_key(run_id), changes).await?;
        log::info!("Run {run_id}: staged changes {}", changes.summary());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IDENTITY_FIELD, StopReason};
    use crate::pipeline::compute_diff;
    use tempfile::TempDir;

    fn record(number: &str) -> Record {
        Record::from_pairs([(IDENTITY_FIELD, number), ("Status", "MARKETED")])
    }

    fn meta(rows: usize) -> RunMeta {
        RunMeta {
            rows,
            stop: StopReason::Exhausted,
            ..RunMeta::default()
        }
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage.write_bytes("test.txt", b"hello").await.unwrap();
        let data = storage.read_bytes("test.txt").await.unwrap();
        assert_eq!(data, Some(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn test_read_nonexistent() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let data = storage.read_bytes("nope.txt").await.unwrap();
        assert!(data.is_none());
    }

    #[tokio::test]
    async fn test_checkpoint_roundtrip_and_clear() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        assert!(storage.load_checkpoint().await.unwrap().is_none());

        storage
            .write_checkpoint(&[record("001"), record("002")])
            .await
            .unwrap();
        let rows = storage.load_checkpoint().await.unwrap().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].identity(), "001");

        storage.clear_checkpoint().await.unwrap();
        assert!(storage.load_checkpoint().await.unwrap().is_none());
        // Clearing twice is not an error.
        storage.clear_checkpoint().await.unwrap();
    }

    #[tokio::test]
    async fn test_write_run_promotes_baseline() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        assert!(storage.load_baseline().await.unwrap().is_empty());

        let rows = vec![record("00123456"), record("00123457")];
        let run_id = storage.write_run(&rows, &meta(2)).await.unwrap();
        assert!(tmp.path().join(format!("runs/{run_id}.json")).exists());

        let baseline = storage.load_baseline().await.unwrap();
        assert_eq!(baseline.len(), 2);
        assert_eq!(baseline["00123456"].get("Status"), "MARKETED");
    }

    #[tokio::test]
    async fn test_stage_changes() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let rows = vec![record("001")];
        let changes = compute_diff(&rows, &HashMap::new());
        storage.stage_changes("20260829T000000Z", &changes).await.unwrap();

        let loaded: ChangeSet = storage
            .read_json("changes/20260829T000000Z.json")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.added.len(), 1);
    }
}
