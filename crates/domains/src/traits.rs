//! # Core Traits (Ports)
//!
//! Any storage adapter must implement these traits to be used by the store.

use async_trait::async_trait;
use bytes::Bytes;

use crate::models::Snapshot;

/// Durable source of truth for posts, comments and users.
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait SnapshotRepo: Send + Sync {
    /// Returns `None` when nothing has been persisted yet.
    async fn load(&self) -> anyhow::Result<Option<Snapshot>>;
    /// Replaces the stored snapshot as a whole.
    async fn save(&self, snapshot: &Snapshot) -> anyhow::Result<()>;
}

/// Opaque byte store for attached files.
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Saves raw bytes and returns a reference for `AttachedFile::blob_ref`.
    async fn put(&self, data: Bytes, content_type: &str) -> anyhow::Result<String>;
    /// Returns `None` if the reference is unknown.
    async fn get(&self, blob_ref: &str) -> anyhow::Result<Option<Bytes>>;
}
