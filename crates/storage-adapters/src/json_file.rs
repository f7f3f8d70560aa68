//! Snapshot repository backed by one JSON document on disk.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use domains::{Snapshot, SnapshotRepo};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

pub struct JsonFileSnapshotRepo {
    path: PathBuf,
}

impl JsonFileSnapshotRepo {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "snapshot.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SnapshotRepo for JsonFileSnapshotRepo {
    async fn load(&self) -> anyhow::Result<Option<Snapshot>> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no snapshot on disk yet");
                return Ok(None);
            }
            Err(err) => {
                return Err(err).with_context(|| format!("reading {}", self.path.display()))
            }
        };
        if raw.trim().is_empty() {
            warn!(path = %self.path.display(), "snapshot file is empty, starting fresh");
            return Ok(None);
        }
        let snapshot = serde_json::from_str(&raw)
            .with_context(|| format!("parsing {}", self.path.display()))?;
        Ok(Some(snapshot))
    }

    /// Write to a sibling temp file, fsync, then rename over the target, so
    /// a crash mid-write never leaves a truncated snapshot behind.
    async fn save(&self, snapshot: &Snapshot) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let body = serde_json::to_vec_pretty(snapshot).context("serializing snapshot")?;

        let temp = self.temp_path();
        let mut file = fs::File::create(&temp)
            .await
            .with_context(|| format!("creating {}", temp.display()))?;
        file.write_all(&body).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp, &self.path)
            .await
            .with_context(|| format!("replacing {}", self.path.display()))?;
        debug!(path = %self.path.display(), bytes = body.len(), "snapshot written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domains::User;

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("svont-json-{}", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn missing_and_blank_files_load_as_none() {
        let dir = scratch_dir();
        let repo = JsonFileSnapshotRepo::new(dir.join("content.json"));
        assert!(repo.load().await.unwrap().is_none());

        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(repo.path(), "  \n").unwrap();
        assert!(repo.load().await.unwrap().is_none());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn save_creates_directories_and_replaces_atomically() {
        let dir = scratch_dir();
        let repo = JsonFileSnapshotRepo::new(dir.join("nested").join("content.json"));

        let mut snapshot = Snapshot::empty();
        snapshot.users.push(User {
            id: "u1".into(),
            email: "u1@example.com".into(),
            display_name: "One".into(),
            profile_pic: String::new(),
            first_sign_in: Utc::now(),
            last_sign_in: Utc::now(),
        });
        repo.save(&snapshot).await.unwrap();
        repo.save(&snapshot).await.unwrap();

        let loaded = repo.load().await.unwrap().unwrap();
        assert_eq!(loaded.users, snapshot.users);
        assert!(!repo.temp_path().exists());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = scratch_dir();
        std::fs::create_dir_all(&dir).unwrap();
        let repo = JsonFileSnapshotRepo::new(dir.join("content.json"));
        std::fs::write(repo.path(), "{ not json").unwrap();
        let err = repo.load().await.unwrap_err();
        assert!(format!("{err:#}").contains("parsing"));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
