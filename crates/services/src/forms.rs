//! Typed views over the field maps the request layer decodes.
//!
//! Unknown keys are ignored on purpose (and logged at debug) so that clients
//! may send extra fields without failing the request.

use std::collections::BTreeSet;

use chrono::Utc;
use domains::{Identity, Post, Result};
use tracing::debug;

use crate::comments::NewComment;
use crate::posts::PostPatch;
use crate::text::{parse_bool_field, parse_tag_list};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostForm {
    pub title: Option<String>,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub author_id: Option<String>,
    pub author_display_name: Option<String>,
    pub author_profile_pic: Option<String>,
    pub tags: Option<BTreeSet<String>>,
    pub draft: Option<bool>,
}

impl PostForm {
    pub fn from_fields<I, K, V>(fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut form = Self::default();
        for (key, value) in fields {
            let value = value.as_ref();
            match key.as_ref() {
                "title" => form.title = Some(value.to_string()),
                "content" => form.content = Some(value.to_string()),
                "summary" => form.summary = Some(value.to_string()),
                "authorId" => form.author_id = Some(value.to_string()),
                "authorDisplayName" => form.author_display_name = Some(value.to_string()),
                "authorProfilePic" => form.author_profile_pic = Some(value.to_string()),
                "tags" => form.tags = Some(parse_tag_list(value)),
                "draft" => form.draft = Some(parse_bool_field("draft", value)?),
                other => debug!(field = other, "ignoring unknown post form field"),
            }
        }
        Ok(form)
    }

    /// Builds the record to create. The caller's identity wins over any
    /// `authorId` field. ID and timestamps are assigned by the store.
    pub fn into_new_post(self, identity: &Identity) -> Post {
        let now = Utc::now();
        let author_id = if identity.user_id.is_empty() {
            self.author_id.unwrap_or_default()
        } else {
            identity.user_id.clone()
        };
        Post {
            id: String::new(),
            title: self.title.unwrap_or_default(),
            summary: self.summary.unwrap_or_default(),
            content: self.content.unwrap_or_default(),
            author_id,
            author_display_name: self.author_display_name.unwrap_or_default(),
            author_profile_pic: self.author_profile_pic.unwrap_or_default(),
            tags: self.tags.unwrap_or_default(),
            draft: self.draft.unwrap_or(false),
            created_at: now,
            updated_at: now,
            upvoter_emails: BTreeSet::new(),
            attached_files: Vec::new(),
            views: 0,
        }
    }

    /// Author fields are dropped: the author is immutable after creation.
    pub fn into_patch(self) -> PostPatch {
        if self.author_id.is_some() {
            debug!("ignoring authorId on update");
        }
        PostPatch {
            title: self.title,
            summary: self.summary,
            content: self.content,
            tags: self.tags,
            draft: self.draft,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentForm {
    pub content: String,
    pub parent_comment_id: Option<String>,
    pub author_display_name: String,
    pub author_profile_pic: String,
}

impl CommentForm {
    pub fn from_fields<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut form = Self::default();
        for (key, value) in fields {
            let value = value.as_ref();
            match key.as_ref() {
                "content" => form.content = value.to_string(),
                "parentCommentId" => {
                    let parent = value.trim();
                    form.parent_comment_id = (!parent.is_empty()).then(|| parent.to_string());
                }
                "authorDisplayName" => form.author_display_name = value.to_string(),
                "authorProfilePic" => form.author_profile_pic = value.to_string(),
                other => debug!(field = other, "ignoring unknown comment form field"),
            }
        }
        form
    }

    pub(crate) fn into_new_comment(self, identity: &Identity) -> (Option<String>, NewComment) {
        (
            self.parent_comment_id,
            NewComment {
                author_id: identity.user_id.clone(),
                author_display_name: self.author_display_name,
                author_profile_pic: self.author_profile_pic,
                content: self.content,
            },
        )
    }
}
