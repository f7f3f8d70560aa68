//! Local filesystem `BlobStore`.
//!
//! Content-addressed: the blob reference is the SHA-256 of the bytes, stored
//! under a sharded path `ab/cd/<hash>`. Identical uploads share one file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use domains::BlobStore;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

const MAX_TEMP_ATTEMPTS: u32 = 64;

pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `None` for anything that is not a lowercase hex SHA-256, which also
    /// keeps caller-supplied references from escaping the root.
    fn sharded_path(&self, hash: &str) -> Option<PathBuf> {
        let well_formed = hash.len() == 64
            && hash.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !well_formed {
            return None;
        }
        Some(self.root.join(&hash[0..2]).join(&hash[2..4]).join(hash))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, data: Bytes, content_type: &str) -> anyhow::Result<String> {
        let hash = hex::encode(Sha256::digest(&data));
        let target = self
            .sharded_path(&hash)
            .context("sha-256 digest produced an unexpected reference")?;

        if fs::try_exists(&target).await.unwrap_or(false) {
            debug!(%hash, "blob already stored");
            return Ok(hash);
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        let (mut file, temp) = create_temp_file(&target, &hash).await?;
        let written = async {
            file.write_all(&data).await?;
            file.sync_all().await
        }
        .await;
        drop(file);
        if let Err(err) = written {
            let _ = fs::remove_file(&temp).await;
            return Err(err).with_context(|| format!("writing {}", temp.display()));
        }

        if let Err(err) = fs::rename(&temp, &target).await {
            let _ = fs::remove_file(&temp).await;
            // A concurrent upload of the same bytes got there first.
            if fs::try_exists(&target).await.unwrap_or(false) {
                debug!(%hash, "blob stored concurrently");
                return Ok(hash);
            }
            return Err(err).with_context(|| format!("moving blob into {}", target.display()));
        }
        debug!(%hash, content_type, size = data.len(), "blob stored");
        Ok(hash)
    }

    async fn get(&self, blob_ref: &str) -> anyhow::Result<Option<Bytes>> {
        let Some(path) = self.sharded_path(blob_ref) else {
            return Ok(None);
        };
        match fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("reading {}", path.display())),
        }
    }
}

/// A fresh `.{hash}.tmp.{pid}.{attempt}` next to the target.
async fn create_temp_file(target: &Path, hash: &str) -> anyhow::Result<(fs::File, PathBuf)> {
    let parent = target
        .parent()
        .context("blob path has no parent directory")?;
    for attempt in 0..MAX_TEMP_ATTEMPTS {
        let temp = parent.join(format!(".{}.tmp.{}.{}", hash, std::process::id(), attempt));
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp)
            .await
        {
            Ok(file) => return Ok((file, temp)),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
            Err(err) => return Err(err).with_context(|| format!("creating {}", temp.display())),
        }
    }
    anyhow::bail!("no free temp file for blob {hash} after {MAX_TEMP_ATTEMPTS} attempts")
}
