//! In-process adapters. Nothing survives a restart.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use domains::{BlobStore, Snapshot, SnapshotRepo};

#[derive(Default)]
pub struct MemorySnapshotRepo {
    slot: Mutex<Option<Snapshot>>,
}

impl MemorySnapshotRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populated, as if a previous run had persisted `snapshot`.
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            slot: Mutex::new(Some(snapshot)),
        }
    }
}

#[async_trait]
impl SnapshotRepo for MemorySnapshotRepo {
    async fn load(&self) -> anyhow::Result<Option<Snapshot>> {
        let slot = self
            .slot
            .lock()
            .map_err(|_| anyhow::anyhow!("memory snapshot slot poisoned"))?;
        Ok(slot.clone())
    }

    async fn save(&self, snapshot: &Snapshot) -> anyhow::Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| anyhow::anyhow!("memory snapshot slot poisoned"))?;
        *slot = Some(snapshot.clone());
        Ok(())
    }
}

/// Blobs keyed by a monotonically assigned reference.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: DashMap<String, Bytes>,
    next_id: AtomicU64,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, data: Bytes, _content_type: &str) -> anyhow::Result<String> {
        let blob_ref = format!("mem-{}", self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.blobs.insert(blob_ref.clone(), data);
        Ok(blob_ref)
    }

    async fn get(&self, blob_ref: &str) -> anyhow::Result<Option<Bytes>> {
        Ok(self.blobs.get(blob_ref).map(|entry| entry.value().clone()))
    }
}
