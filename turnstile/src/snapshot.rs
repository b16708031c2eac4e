//! File-backed participant store.
//!
//! [`SnapshotStore`] keeps records in memory and, on every mutation, writes
//! the complete record set as JSON to `<prefix>_<step>.json`. `step`
//! cycles through `max_snapshots` slots so the previous few states stay on
//! disk. Each file carries a generation number; on open, the highest
//! readable generation is restored.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::participant::{ParticipantId, ParticipantRecord};
use crate::store::{MemoryStore, ParticipantStore};

/// Default number of rotating snapshot files.
pub const DEFAULT_MAX_SNAPSHOTS: usize = 10;

const SNAPSHOT_VERSION: u16 = 1;

#[derive(Serialize, Deserialize)]
struct SnapshotFile {
    version: u16,
    generation: u64,
    records: Vec<ParticipantRecord>,
}

#[derive(Debug)]
pub struct SnapshotStore {
    inner: MemoryStore,
    dir: PathBuf,
    file_prefix: String,
    max_snapshots: usize,
    step: usize,
    generation: u64,
}

impl SnapshotStore {
    /// Open the store rooted at `prefix` (e.g. `/var/lib/turnstile/queue`),
    /// restoring the newest snapshot if one exists.
    pub async fn open(
        prefix: impl AsRef<Path>,
        max_snapshots: usize,
    ) -> Result<Self, StoreError> {
        let prefix = prefix.as_ref();
        let file_prefix = prefix
            .file_name()
            .and_then(|name| name.to_str())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                StoreError::Corrupt(format!(
                    "snapshot prefix has no file name: {}",
                    prefix.display()
                ))
            })?
            .to_string();
        let dir = match prefix.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        tokio::fs::create_dir_all(&dir).await?;

        let mut store = Self {
            inner: MemoryStore::new(),
            dir,
            file_prefix,
            max_snapshots: max_snapshots.max(1),
            step: 0,
            generation: 0,
        };

        if let Some((path, step, snapshot)) = store.latest_snapshot().await? {
            info!(
                path = %path.display(),
                generation = snapshot.generation,
                records = snapshot.records.len(),
                "restored queue snapshot"
            );
            store.inner = MemoryStore::with_records(snapshot.records);
            store.step = (step + 1) % store.max_snapshots;
            store.generation = snapshot.generation + 1;
        } else {
            info!(dir = %store.dir.display(), prefix = %store.file_prefix, "no queue snapshot found");
        }

        Ok(store)
    }

    /// Path of the snapshot slot `step`.
    pub fn snapshot_path(&self, step: usize) -> PathBuf {
        self.dir.join(format!("{}_{}.json", self.file_prefix, step))
    }

    fn parse_step(&self, file_name: &str) -> Option<usize> {
        file_name
            .strip_prefix(&self.file_prefix)?
            .strip_prefix('_')?
            .strip_suffix(".json")?
            .parse()
            .ok()
    }

    /// The readable snapshot with the highest generation. Unreadable
    /// slots (for example a torn write) are skipped with a warning.
    async fn latest_snapshot(
        &self,
    ) -> Result<Option<(PathBuf, usize, SnapshotFile)>, StoreError> {
        let mut latest: Option<(PathBuf, usize, SnapshotFile)> = None;
        let mut entries = tokio::fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(step) = file_name.to_str().and_then(|n| self.parse_step(n))
            else {
                continue;
            };
            let path = entry.path();
            let bytes = tokio::fs::read(&path).await?;
            let snapshot: SnapshotFile = match serde_json::from_slice(&bytes) {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    warn!(path = %path.display(), "skipping unreadable snapshot: {err}");
                    continue;
                }
            };
            if snapshot.version != SNAPSHOT_VERSION {
                return Err(StoreError::Corrupt(format!(
                    "unsupported snapshot version {} in {}",
                    snapshot.version,
                    path.display()
                )));
            }
            let newer = latest
                .as_ref()
                .map_or(true, |(_, _, seen)| snapshot.generation > seen.generation);
            if newer {
                latest = Some((path, step, snapshot));
            }
        }

        Ok(latest)
    }

    /// Persist `records` into the next slot. Nothing in memory changes here.
    async fn write_snapshot(
        &mut self,
        records: Vec<ParticipantRecord>,
    ) -> Result<(), StoreError> {
        let mut records = records;
        records.sort_by_key(|r| r.seq);
        let snapshot = SnapshotFile {
            version: SNAPSHOT_VERSION,
            generation: self.generation,
            records,
        };
        let bytes = serde_json::to_vec_pretty(&snapshot)?;

        let path = self.snapshot_path(self.step);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!(path = %path.display(), records = snapshot.records.len(), "wrote queue snapshot");
        self.step = (self.step + 1) % self.max_snapshots;
        self.generation += 1;
        Ok(())
    }

    fn records_with(
        &self,
        apply: impl FnOnce(&mut Vec<ParticipantRecord>),
    ) -> Vec<ParticipantRecord> {
        let mut records: Vec<ParticipantRecord> =
            self.inner.records().values().cloned().collect();
        apply(&mut records);
        records
    }
}

#[async_trait]
impl ParticipantStore for SnapshotStore {
    async fn load_all(&self) -> Result<Vec<ParticipantRecord>, StoreError> {
        self.inner.load_all().await
    }

    async fn get(
        &self,
        id: &ParticipantId,
    ) -> Result<Option<ParticipantRecord>, StoreError> {
        self.inner.get(id).await
    }

    async fn upsert(&mut self, record: &ParticipantRecord) -> Result<(), StoreError> {
        let next = self.records_with(|records| {
            records.retain(|r| r.id != record.id);
            records.push(record.clone());
        });
        self.write_snapshot(next).await?;
        self.inner
            .records_mut()
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn remove(&mut self, id: &ParticipantId) -> Result<(), StoreError> {
        if !self.inner.records().contains_key(id) {
            return Ok(());
        }
        let next = self.records_with(|records| records.retain(|r| &r.id != id));
        self.write_snapshot(next).await?;
        self.inner.records_mut().remove(id);
        Ok(())
    }

    async fn remove_many(&mut self, ids: &[ParticipantId]) -> Result<(), StoreError> {
        if ids.is_empty() {
            return Ok(());
        }
        let next = self.records_with(|records| records.retain(|r| !ids.contains(&r.id)));
        self.write_snapshot(next).await?;
        for id in ids {
            self.inner.records_mut().remove(id);
        }
        Ok(())
    }
}
