//! # ContentStore
//!
//! The single entry point for the request layer. All records and both
//! indices sit behind one `RwLock`: reads share it, and every mutation holds
//! the write half for the post change *and* its reindexing, so no reader can
//! see a post in one index but not the other. Blob and snapshot I/O always
//! happen outside the lock.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use bytes::Bytes;
use chrono::Utc;
use domains::{
    AttachedFile, BlobStore, Comment, CommentNode, Identity, Post, Result, SnapshotRepo,
    StoreError, Tag, UploadedFile, User,
};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::auth::can_mutate;
use crate::comments::CommentTree;
use crate::forms::{CommentForm, PostForm};
use crate::posts::{validate_required, PostPatch, PostStore};
use crate::ranking::{rank_popular, Page, PopularityWeights};
use crate::search::SearchIndex;
use crate::tags::TagIndex;

/// Listing defaults and ranking weights.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreOptions {
    pub default_page_size: usize,
    pub popular_page_size: usize,
    pub tag_page_size: usize,
    pub max_page_size: usize,
    pub popularity: PopularityWeights,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            popular_page_size: 10,
            tag_page_size: 10,
            max_page_size: 100,
            popularity: PopularityWeights::default(),
        }
    }
}

/// Counts reported after load/persist and for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub posts: usize,
    pub published: usize,
    pub comments: usize,
    pub tags: usize,
    pub users: usize,
}

#[derive(Debug, Default)]
pub(crate) struct StoreState {
    pub(crate) posts: PostStore,
    pub(crate) comments: CommentTree,
    pub(crate) tags: TagIndex,
    pub(crate) search: SearchIndex,
    pub(crate) users: BTreeMap<String, User>,
}

impl StoreState {
    /// Brings both indices in line with the stored version of the post.
    pub(crate) fn reindex(&mut self, post_id: &str) {
        if let Ok(post) = self.posts.get(post_id, true) {
            self.tags.on_post_upserted(post);
            self.search.on_post_upserted(post);
        }
    }

    pub(crate) fn stats(&self) -> StoreStats {
        StoreStats {
            posts: self.posts.len(),
            published: self.posts.iter().filter(|p| p.is_published()).count(),
            comments: self.comments.len(),
            tags: self.tags.len(),
            users: self.users.len(),
        }
    }

    fn owned_post(&self, post_id: &str, identity: &Identity) -> Result<&Post> {
        let post = self.posts.get(post_id, true)?;
        if !can_mutate(identity, post) {
            return Err(StoreError::forbidden(format!(
                "user '{}' does not own post '{}'",
                identity.user_id, post_id
            )));
        }
        Ok(post)
    }
}

pub struct ContentStore {
    state: RwLock<StoreState>,
    pub(crate) snapshots: Box<dyn SnapshotRepo>,
    blobs: Box<dyn BlobStore>,
    options: StoreOptions,
    /// Serializes persist and reload so an older snapshot never lands last.
    pub(crate) gate: tokio::sync::Mutex<()>,
}

impl ContentStore {
    /// Starts empty; call `load_all` to read the durable state.
    pub fn new(
        snapshots: Box<dyn SnapshotRepo>,
        blobs: Box<dyn BlobStore>,
        options: StoreOptions,
    ) -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            snapshots,
            blobs,
            options,
            gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub(crate) fn read_state(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(|poisoned| {
            error!("content store lock poisoned, continuing with last state");
            poisoned.into_inner()
        })
    }

    pub(crate) fn write_state(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(|poisoned| {
            error!("content store lock poisoned, continuing with last state");
            poisoned.into_inner()
        })
    }

    fn page(&self, offset: i64, limit: i64, default_limit: usize) -> Page {
        Page::new(offset, limit, default_limit, self.options.max_page_size)
    }

    pub fn stats(&self) -> StoreStats {
        self.read_state().stats()
    }

    // ── Posts ───────────────────────────────────────────────────────────────

    pub async fn create_post(
        &self,
        identity: &Identity,
        form: PostForm,
        files: Vec<UploadedFile>,
    ) -> Result<Post> {
        let mut post = form.into_new_post(identity);
        validate_required(&post)?;
        post.attached_files = self.store_files(files).await?;

        let mut state = self.write_state();
        let id = state.posts.create(post, Utc::now())?;
        state.comments.register_post(&id);
        state.reindex(&id);
        let post = state.posts.get(&id, true)?.clone();
        info!(post_id = %id, draft = post.draft, "post created");
        Ok(post)
    }

    pub fn get_post(&self, post_id: &str, include_draft: bool) -> Result<Post> {
        self.read_state()
            .posts
            .get(post_id, include_draft)
            .cloned()
    }

    /// Author-only. Files are stored before the write lock is taken; the
    /// ownership check is repeated under the lock.
    pub async fn update_post(
        &self,
        post_id: &str,
        identity: &Identity,
        form: PostForm,
        files: Vec<UploadedFile>,
    ) -> Result<Post> {
        let patch = form.into_patch();
        self.read_state().owned_post(post_id, identity)?;
        let attached = self.store_files(files).await?;
        self.apply_update(post_id, identity, patch, attached)
    }

    fn apply_update(
        &self,
        post_id: &str,
        identity: &Identity,
        patch: PostPatch,
        attached: Vec<AttachedFile>,
    ) -> Result<Post> {
        let mut state = self.write_state();
        state.owned_post(post_id, identity)?;
        let post = state
            .posts
            .update(post_id, patch, attached, Utc::now())?
            .clone();
        state.reindex(post_id);
        info!(post_id, draft = post.draft, "post updated");
        Ok(post)
    }

    /// Author-only. Removes the post, its comments and its index entries.
    pub fn delete_post(&self, post_id: &str, identity: &Identity) -> Result<()> {
        let mut state = self.write_state();
        state.owned_post(post_id, identity)?;
        let post = state.posts.delete(post_id)?;
        let comments = state.comments.remove_post(post_id);
        state.tags.on_post_deleted(post_id, &post.tags);
        state.search.on_post_deleted(post_id);
        info!(post_id, comments, "post deleted");
        Ok(())
    }

    /// Whether `identity` may mutate the post.
    pub fn can_mutate(&self, post_id: &str, identity: &Identity) -> Result<bool> {
        let state = self.read_state();
        let post = state.posts.get(post_id, true)?;
        Ok(can_mutate(identity, post))
    }

    /// Published posts, newest first.
    pub fn list_posts(&self, offset: i64, limit: i64) -> Vec<Post> {
        let page = self.page(offset, limit, self.options.default_page_size);
        self.read_state().posts.list_page(page, Post::is_published)
    }

    /// The caller's own drafts, newest first.
    pub fn list_drafts(&self, identity: &Identity, offset: i64, limit: i64) -> Vec<Post> {
        let page = self.page(offset, limit, self.options.default_page_size);
        self.read_state()
            .posts
            .list_page(page, |post| post.draft && post.author_id == identity.user_id)
    }

    pub fn popular_posts(&self, offset: i64, limit: i64) -> Vec<Post> {
        let page = self.page(offset, limit, self.options.popular_page_size);
        rank_popular(self.read_state().posts.iter(), &self.options.popularity, page)
    }

    pub fn upvote_post(&self, post_id: &str, email: &str) -> Result<Post> {
        let mut state = self.write_state();
        let (post, added) = state.posts.upvote(post_id, email)?;
        debug!(post_id, added, upvotes = post.upvote_count(), "post upvoted");
        Ok(post.clone())
    }

    /// Counts a public view of a published post.
    pub fn record_view(&self, post_id: &str) -> Result<u64> {
        self.write_state().posts.record_view(post_id)
    }

    // ── Files ───────────────────────────────────────────────────────────────

    pub async fn attach_file(
        &self,
        post_id: &str,
        identity: &Identity,
        file: UploadedFile,
    ) -> Result<AttachedFile> {
        self.read_state().owned_post(post_id, identity)?;
        let name = file.name.clone();
        let attached = self.store_files(vec![file]).await?;
        let post = self.apply_update(post_id, identity, PostPatch::default(), attached)?;
        post.file(&name)
            .cloned()
            .ok_or_else(|| StoreError::not_found("File", &name))
    }

    /// Files are served for drafts too; their names are only known to
    /// whoever can already see the post.
    pub async fn file_for_post(&self, post_id: &str, name: &str) -> Result<(AttachedFile, Bytes)> {
        let file = self
            .read_state()
            .posts
            .get(post_id, true)?
            .file(name)
            .cloned()
            .ok_or_else(|| StoreError::not_found("File", name))?;
        let bytes = self
            .blobs
            .get(&file.blob_ref)
            .await
            .map_err(|err| StoreError::persistence(&err))?
            .ok_or_else(|| StoreError::not_found("File", name))?;
        Ok((file, bytes))
    }

    async fn store_files(&self, files: Vec<UploadedFile>) -> Result<Vec<AttachedFile>> {
        let mut attached: Vec<AttachedFile> = Vec::with_capacity(files.len());
        for file in files {
            validate_file_name(&file.name)?;
            let content_type = resolve_content_type(&file);
            let size = file.bytes.len() as u64;
            let blob_ref = self
                .blobs
                .put(file.bytes, &content_type)
                .await
                .map_err(|err| StoreError::persistence(&err))?;
            debug!(name = %file.name, %blob_ref, size, "stored attachment");

            let entry = AttachedFile {
                name: file.name,
                blob_ref,
                content_type,
                size,
            };
            match attached.iter_mut().find(|f| f.name == entry.name) {
                Some(existing) => *existing = entry,
                None => attached.push(entry),
            }
        }
        Ok(attached)
    }

    // ── Tags & search ───────────────────────────────────────────────────────

    pub fn posts_for_tag(&self, tag_name: &str, offset: i64, limit: i64) -> Vec<Post> {
        let page = self.page(offset, limit, self.options.tag_page_size);
        let state = self.read_state();
        state.tags.posts_for_tag(tag_name, page, &state.posts)
    }

    pub fn search_tags(&self, query: &str) -> Vec<Tag> {
        self.read_state().tags.search(query)
    }

    pub fn all_tags(&self) -> Vec<Tag> {
        self.read_state().tags.all_tags()
    }

    pub fn search_posts(&self, query: &str) -> Vec<Post> {
        let state = self.read_state();
        state.search.search(query, &state.posts)
    }

    // ── Comments ────────────────────────────────────────────────────────────

    pub fn add_comment(&self, post_id: &str, identity: &Identity, form: CommentForm) -> Result<Comment> {
        let (parent, new) = form.into_new_comment(identity);
        let comment = self
            .write_state()
            .comments
            .add(post_id, parent.as_deref(), new, Utc::now())?;
        info!(post_id, comment_id = %comment.id, "comment added");
        Ok(comment)
    }

    /// Flat, parents before replies. Gated like [`Self::get_post`]: a draft's
    /// comments are `NotFound` unless `include_draft` is set.
    pub fn comments(&self, post_id: &str, include_draft: bool) -> Result<Vec<Comment>> {
        let state = self.read_state();
        state.posts.get(post_id, include_draft)?;
        Ok(state.comments.list_for_post(post_id)?.to_vec())
    }

    pub fn comment_thread(&self, post_id: &str, include_draft: bool) -> Result<Vec<CommentNode>> {
        let state = self.read_state();
        state.posts.get(post_id, include_draft)?;
        state.comments.thread_for_post(post_id)
    }

    pub fn upvote_comment(&self, post_id: &str, comment_id: &str, email: &str) -> Result<Comment> {
        let mut state = self.write_state();
        let (comment, added) = state.comments.upvote(post_id, comment_id, email)?;
        debug!(post_id, comment_id, added, "comment upvoted");
        Ok(comment.clone())
    }

    // ── Users ───────────────────────────────────────────────────────────────

    /// Records a sign-in, creating the user on first sight.
    pub fn sign_in(&self, identity: &Identity, display_name: &str, profile_pic: &str) -> Result<User> {
        if identity.user_id.trim().is_empty() || identity.email.trim().is_empty() {
            return Err(StoreError::validation("sign-in requires a user ID and an email"));
        }
        let now = Utc::now();
        let mut state = self.write_state();
        let user = state
            .users
            .entry(identity.user_id.clone())
            .and_modify(|user| {
                user.email = identity.email.clone();
                user.display_name = display_name.to_string();
                user.profile_pic = profile_pic.to_string();
                user.last_sign_in = now;
            })
            .or_insert_with(|| User {
                id: identity.user_id.clone(),
                email: identity.email.clone(),
                display_name: display_name.to_string(),
                profile_pic: profile_pic.to_string(),
                first_sign_in: now,
                last_sign_in: now,
            })
            .clone();
        info!(user_id = %user.id, "user signed in");
        Ok(user)
    }

    pub fn user(&self, user_id: &str) -> Result<User> {
        self.read_state()
            .users
            .get(user_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("User", user_id))
    }
}

fn validate_file_name(name: &str) -> Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." || trimmed.contains(['/', '\\']) {
        return Err(StoreError::validation(format!("invalid file name '{name}'")));
    }
    Ok(())
}

/// The declared type if it parses, otherwise a guess from the extension.
fn resolve_content_type(file: &UploadedFile) -> String {
    match file.content_type.parse::<mime::Mime>() {
        Ok(declared) => declared.essence_str().to_string(),
        Err(_) => mime_guess::from_path(&file.name)
            .first_or_octet_stream()
            .essence_str()
            .to_string(),
    }
}
