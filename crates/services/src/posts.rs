//! # Post Store
//!
//! Owns every `Post` record. Index maintenance is not done here; the facade
//! calls the tag and search indices inside the same critical section.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use domains::{AttachedFile, Post, Result, StoreError};

use crate::ranking::{newest_first, Page};
use crate::text::{new_post_id, normalize_tags};

/// Changed fields of an update. `None` leaves the field untouched.
/// The author is immutable after creation and has no field here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostPatch {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub tags: Option<BTreeSet<String>>,
    pub draft: Option<bool>,
}

#[derive(Debug, Default)]
pub struct PostStore {
    posts: HashMap<String, Post>,
}

impl PostStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.posts.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Post> {
        self.posts.values()
    }

    /// Assigns an ID when absent, stamps timestamps and starts with no votes.
    pub fn create(&mut self, mut post: Post, now: DateTime<Utc>) -> Result<String> {
        validate_required(&post)?;

        if post.id.is_empty() {
            post.id = loop {
                let candidate = new_post_id(&post.title);
                if !self.posts.contains_key(&candidate) {
                    break candidate;
                }
            };
        } else if self.posts.contains_key(&post.id) {
            return Err(StoreError::validation(format!(
                "post ID '{}' is already taken",
                post.id
            )));
        }

        post.tags = normalize_tags(&post.tags);
        post.created_at = now;
        post.updated_at = now;
        post.upvoter_emails.clear();
        post.views = 0;

        let id = post.id.clone();
        self.posts.insert(id.clone(), post);
        Ok(id)
    }

    /// Drafts are only returned when `include_draft` is set.
    pub fn get(&self, id: &str, include_draft: bool) -> Result<&Post> {
        match self.posts.get(id) {
            Some(post) if include_draft || post.is_published() => Ok(post),
            _ => Err(StoreError::not_found("Post", id)),
        }
    }

    /// Applies the patch and any new attachments, then bumps `updated_at`.
    pub fn update(
        &mut self,
        id: &str,
        patch: PostPatch,
        files: Vec<AttachedFile>,
        now: DateTime<Utc>,
    ) -> Result<&Post> {
        let post = self
            .posts
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found("Post", id))?;

        if let Some(title) = &patch.title {
            if title.trim().is_empty() {
                return Err(StoreError::validation("title must not be empty"));
            }
        }

        if let Some(title) = patch.title {
            post.title = title;
        }
        if let Some(summary) = patch.summary {
            post.summary = summary;
        }
        if let Some(content) = patch.content {
            post.content = content;
        }
        if let Some(tags) = patch.tags {
            post.tags = normalize_tags(&tags);
        }
        if let Some(draft) = patch.draft {
            post.draft = draft;
        }
        for file in files {
            upsert_file(post, file);
        }
        post.updated_at = now;
        Ok(post)
    }

    pub fn delete(&mut self, id: &str) -> Result<Post> {
        self.posts
            .remove(id)
            .ok_or_else(|| StoreError::not_found("Post", id))
    }

    /// Newest first, sliced to `page`.
    pub fn list_page(&self, page: Page, predicate: impl Fn(&Post) -> bool) -> Vec<Post> {
        let mut matching: Vec<&Post> = self.posts.values().filter(|p| predicate(p)).collect();
        matching.sort_by(|a, b| newest_first(a, b));
        page.apply(matching.into_iter().cloned())
    }

    /// Returns whether the vote was new. Drafts cannot be upvoted.
    pub fn upvote(&mut self, id: &str, email: &str) -> Result<(&Post, bool)> {
        if email.trim().is_empty() {
            return Err(StoreError::validation("an email is required to upvote"));
        }
        let post = match self.posts.get_mut(id) {
            Some(post) if post.is_published() => post,
            _ => return Err(StoreError::not_found("Post", id)),
        };
        let added = post.upvoter_emails.insert(email.to_string());
        Ok((post, added))
    }

    pub fn record_view(&mut self, id: &str) -> Result<u64> {
        match self.posts.get_mut(id) {
            Some(post) if post.is_published() => {
                post.views += 1;
                Ok(post.views)
            }
            _ => Err(StoreError::not_found("Post", id)),
        }
    }

    /// Inserts a post read back from durable storage as-is.
    pub(crate) fn insert_loaded(&mut self, post: Post) -> Result<()> {
        if self.posts.contains_key(&post.id) {
            return Err(StoreError::Persistence(format!(
                "snapshot contains post ID '{}' more than once",
                post.id
            )));
        }
        self.posts.insert(post.id.clone(), post);
        Ok(())
    }
}

pub(crate) fn validate_required(post: &Post) -> Result<()> {
    if post.title.trim().is_empty() {
        return Err(StoreError::validation("title must not be empty"));
    }
    if post.author_id.trim().is_empty() {
        return Err(StoreError::validation("authorId must not be empty"));
    }
    Ok(())
}

/// One entry per file name; re-attaching a name replaces it in place.
fn upsert_file(post: &mut Post, file: AttachedFile) {
    match post.attached_files.iter_mut().find(|f| f.name == file.name) {
        Some(existing) => *existing = file,
        None => post.attached_files.push(file),
    }
}
