//! # Domain Models
//!
//! These structs represent the core entities of Svont.
//! Sets are `BTreeSet` so that serialized snapshots and equality checks are
//! independent of insertion order.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current on-disk snapshot layout.
pub const SNAPSHOT_VERSION: u32 = 1;

/// A content item with header metadata and a markdown body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    /// Slug-based identifier, immutable once assigned.
    pub id: String,
    pub title: String,
    pub summary: String,
    pub content: String,
    /// Immutable after creation; the ownership key for update/delete.
    pub author_id: String,
    pub author_display_name: String,
    pub author_profile_pic: String,
    /// Normalized tag names.
    pub tags: BTreeSet<String>,
    /// Drafts are invisible to listings, search and the tag index.
    pub draft: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Upvote dedup key.
    pub upvoter_emails: BTreeSet<String>,
    pub attached_files: Vec<AttachedFile>,
    #[serde(default)]
    pub views: u64,
}

impl Post {
    pub fn upvote_count(&self) -> usize {
        self.upvoter_emails.len()
    }

    pub fn is_published(&self) -> bool {
        !self.draft
    }

    pub fn file(&self, name: &str) -> Option<&AttachedFile> {
        self.attached_files.iter().find(|f| f.name == name)
    }
}

/// A file attached to a post. The bytes live in the `BlobStore`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachedFile {
    pub name: String,
    /// Opaque reference returned by `BlobStore::put`.
    pub blob_ref: String,
    pub content_type: String,
    pub size: u64,
}

/// A threaded reply to a post, optionally to another comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    /// `None` means top-level.
    pub parent_comment_id: Option<String>,
    pub author_id: String,
    pub author_display_name: String,
    pub author_profile_pic: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub upvoter_emails: BTreeSet<String>,
}

/// Nested view of a comment and its replies.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentNode {
    #[serde(flatten)]
    pub comment: Comment,
    pub children: Vec<CommentNode>,
}

/// A normalized label and the number of published posts carrying it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub name: String,
    pub post_count: usize,
}

/// A signed-in account, as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub profile_pic: String,
    pub first_sign_in: DateTime<Utc>,
    pub last_sign_in: DateTime<Utc>,
}

/// The caller, already validated by the request layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: String,
    pub email: String,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
        }
    }
}

/// A file received with a create/update/attach request.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    /// Empty when the client sent none; the store then guesses from `name`.
    pub content_type: String,
    pub bytes: bytes::Bytes,
}

/// Full dump of the durable state. Indices are derived and not included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub version: u32,
    pub taken_at: DateTime<Utc>,
    pub posts: Vec<Post>,
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub users: Vec<User>,
}

impl Snapshot {
    pub fn empty() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            taken_at: Utc::now(),
            posts: Vec::new(),
            comments: Vec::new(),
            users: Vec::new(),
        }
    }
}
