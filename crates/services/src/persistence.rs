//! # Persistence Coordinator
//!
//! Bulk load, bulk flush and reload of the content store. Snapshot I/O never
//! runs under the state lock: a load builds a complete replacement state
//! first and swaps it in only on success, so a failed load leaves the
//! current state untouched.

use std::collections::{HashMap, VecDeque};

use domains::{Comment, Result, Snapshot, StoreError, SNAPSHOT_VERSION};
use tracing::{info, instrument, warn};

use crate::store::{ContentStore, StoreState, StoreStats};
use crate::text::normalize_tags;

impl ContentStore {
    /// Replaces the in-memory state with the stored snapshot, all or nothing.
    /// An empty repository yields an empty store.
    #[instrument(skip(self))]
    pub async fn load_all(&self) -> Result<StoreStats> {
        let _gate = self.gate.lock().await;
        self.load_from_repo().await
    }

    /// Flushes a consistent snapshot. Writes wait only while the copy is taken.
    #[instrument(skip(self))]
    pub async fn persist_all(&self) -> Result<StoreStats> {
        let _gate = self.gate.lock().await;
        let (snapshot, stats) = {
            let state = self.read_state();
            (snapshot_of(&state), state.stats())
        };
        self.snapshots
            .save(&snapshot)
            .await
            .map_err(|err| StoreError::persistence(&err))?;
        info!(posts = stats.posts, comments = stats.comments, "content persisted");
        Ok(stats)
    }

    /// Discards the in-memory state and rebuilds it from the repository.
    /// The old state stays in place if the rebuild fails.
    #[instrument(skip(self))]
    pub async fn reload(&self) -> Result<StoreStats> {
        let _gate = self.gate.lock().await;
        info!("reloading content from durable storage");
        self.load_from_repo().await
    }

    /// Full dump of posts, comments and users.
    pub fn snapshot(&self) -> Snapshot {
        snapshot_of(&self.read_state())
    }

    async fn load_from_repo(&self) -> Result<StoreStats> {
        let snapshot = self
            .snapshots
            .load()
            .await
            .map_err(|err| StoreError::persistence(&err))?
            .unwrap_or_else(Snapshot::empty);
        let fresh = rebuild_state(snapshot)?;
        let stats = fresh.stats();
        *self.write_state() = fresh;
        info!(
            posts = stats.posts,
            comments = stats.comments,
            tags = stats.tags,
            users = stats.users,
            "content loaded"
        );
        Ok(stats)
    }
}

pub(crate) fn snapshot_of(state: &StoreState) -> Snapshot {
    let mut posts: Vec<_> = state.posts.iter().cloned().collect();
    posts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    Snapshot {
        version: SNAPSHOT_VERSION,
        taken_at: chrono::Utc::now(),
        posts,
        comments: state.comments.iter_sorted().cloned().collect(),
        users: state.users.values().cloned().collect(),
    }
}

/// Builds a fresh state from a snapshot and derives both indices.
///
/// Duplicate post IDs abort the load. Comments that cannot be attached
/// (unknown post, missing parent, repeated ID) are dropped with a warning.
/// Replies are attached after their parents whatever their timestamps say.
pub(crate) fn rebuild_state(snapshot: Snapshot) -> Result<StoreState> {
    if snapshot.version > SNAPSHOT_VERSION {
        return Err(StoreError::Persistence(format!(
            "snapshot version {} is newer than supported version {}",
            snapshot.version, SNAPSHOT_VERSION
        )));
    }

    let mut state = StoreState::default();
    for mut post in snapshot.posts {
        if post.id.trim().is_empty() {
            return Err(StoreError::Persistence("snapshot contains a post without an ID".into()));
        }
        post.tags = normalize_tags(&post.tags);
        let id = post.id.clone();
        state.posts.insert_loaded(post)?;
        state.comments.register_post(&id);
        state.reindex(&id);
    }

    attach_comments(&mut state, snapshot.comments);

    for user in snapshot.users {
        state.users.insert(user.id.clone(), user);
    }
    Ok(state)
}

/// Attaches comments in snapshot order, except that a reply whose parent
/// has not been attached yet waits for it. Timestamps play no part, so a
/// clock step between parent and reply cannot reorder them.
fn attach_comments(state: &mut StoreState, comments: Vec<Comment>) {
    let mut waiting: HashMap<(String, String), Vec<Comment>> = HashMap::new();
    for comment in comments {
        let mut ready = VecDeque::from([comment]);
        while let Some(comment) = ready.pop_front() {
            if let Some(parent) = &comment.parent_comment_id {
                if !state.comments.contains(&comment.post_id, parent) {
                    waiting
                        .entry((comment.post_id.clone(), parent.clone()))
                        .or_default()
                        .push(comment);
                    continue;
                }
            }
            let key = (comment.post_id.clone(), comment.id.clone());
            match state.comments.insert_loaded(comment) {
                Ok(()) => ready.extend(waiting.remove(&key).unwrap_or_default()),
                Err(reason) => warn!(comment_id = %key.1, %reason, "dropping comment from snapshot"),
            }
        }
    }
    for comment in waiting.into_values().flatten() {
        warn!(
            comment_id = %comment.id,
            parent = comment.parent_comment_id.as_deref().unwrap_or_default(),
            "dropping comment from snapshot: parent comment is missing"
        );
    }
}
