//! # Comment Tree
//!
//! Comments per post, kept in creation order. Because a parent must already
//! exist when a reply is added, creation order is also parent-before-child.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use domains::{Comment, CommentNode, Result, StoreError};

use crate::text::new_comment_id;

/// Levels of nesting in [`CommentTree::thread_for_post`], roots included.
pub const MAX_THREAD_DEPTH: usize = 32;

/// Author-supplied part of a new comment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewComment {
    pub author_id: String,
    pub author_display_name: String,
    pub author_profile_pic: String,
    pub content: String,
}

#[derive(Debug, Default)]
pub struct CommentTree {
    /// Every known post has an entry, possibly empty.
    by_post: HashMap<String, Vec<Comment>>,
}

impl CommentTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_post(&mut self, post_id: &str) {
        self.by_post.entry(post_id.to_string()).or_default();
    }

    /// Cascade for post deletion. Returns how many comments went with it.
    pub fn remove_post(&mut self, post_id: &str) -> usize {
        self.by_post.remove(post_id).map_or(0, |comments| comments.len())
    }

    pub fn len(&self) -> usize {
        self.by_post.values().map(Vec::len).sum()
    }

    pub fn add(
        &mut self,
        post_id: &str,
        parent_comment_id: Option<&str>,
        new: NewComment,
        now: DateTime<Utc>,
    ) -> Result<Comment> {
        let comments = self
            .by_post
            .get_mut(post_id)
            .ok_or_else(|| StoreError::not_found("Post", post_id))?;

        if new.content.trim().is_empty() {
            return Err(StoreError::validation("comment content must not be empty"));
        }
        if let Some(parent_id) = parent_comment_id {
            if !comments.iter().any(|c| c.id == parent_id) {
                return Err(StoreError::validation(format!(
                    "parent comment '{parent_id}' does not belong to post '{post_id}'"
                )));
            }
        }

        let comment = Comment {
            id: new_comment_id(),
            post_id: post_id.to_string(),
            parent_comment_id: parent_comment_id.map(str::to_string),
            author_id: new.author_id,
            author_display_name: new.author_display_name,
            author_profile_pic: new.author_profile_pic,
            content: new.content,
            created_at: now,
            upvoter_emails: BTreeSet::new(),
        };
        comments.push(comment.clone());
        Ok(comment)
    }

    /// Flat list, parents before their replies.
    pub fn list_for_post(&self, post_id: &str) -> Result<&[Comment]> {
        self.by_post
            .get(post_id)
            .map(Vec::as_slice)
            .ok_or_else(|| StoreError::not_found("Post", post_id))
    }

    /// Nested view: roots in creation order, each with its replies.
    ///
    /// Nesting stops at [`MAX_THREAD_DEPTH`] levels; replies below that hang
    /// off the deepest ancestor that still fits, in creation order. Built
    /// without recursion so long reply chains cannot exhaust the stack.
    pub fn thread_for_post(&self, post_id: &str) -> Result<Vec<CommentNode>> {
        let comments = self.list_for_post(post_id)?;

        // Parents come first, so one forward pass places every comment.
        let mut placed: HashMap<&str, (Option<&str>, usize)> = HashMap::with_capacity(comments.len());
        let mut anchors = Vec::with_capacity(comments.len());
        for comment in comments {
            let slot = match comment
                .parent_comment_id
                .as_deref()
                .and_then(|parent| placed.get_key_value(parent))
            {
                None => (None, 0),
                Some((_, &(anchor, depth))) if depth + 1 >= MAX_THREAD_DEPTH => (anchor, depth),
                Some((&parent, &(_, depth))) => (Some(parent), depth + 1),
            };
            placed.insert(comment.id.as_str(), slot);
            anchors.push(slot.0);
        }

        // Children come after their parent, so walking backwards finishes
        // every subtree before its root is wrapped.
        let mut pending: HashMap<&str, Vec<CommentNode>> = HashMap::new();
        let mut roots = Vec::new();
        for (comment, anchor) in comments.iter().zip(anchors).rev() {
            let mut children = pending.remove(comment.id.as_str()).unwrap_or_default();
            children.reverse();
            let node = CommentNode {
                comment: comment.clone(),
                children,
            };
            match anchor {
                Some(parent) => pending.entry(parent).or_default().push(node),
                None => roots.push(node),
            }
        }
        roots.reverse();
        Ok(roots)
    }

    pub fn contains(&self, post_id: &str, comment_id: &str) -> bool {
        self.by_post
            .get(post_id)
            .is_some_and(|comments| comments.iter().any(|c| c.id == comment_id))
    }

    /// Returns whether the vote was new.
    pub fn upvote(&mut self, post_id: &str, comment_id: &str, email: &str) -> Result<(&Comment, bool)> {
        if email.trim().is_empty() {
            return Err(StoreError::validation("an email is required to upvote"));
        }
        let comment = self
            .by_post
            .get_mut(post_id)
            .ok_or_else(|| StoreError::not_found("Post", post_id))?
            .iter_mut()
            .find(|c| c.id == comment_id)
            .ok_or_else(|| StoreError::not_found("Comment", comment_id))?;
        let added = comment.upvoter_emails.insert(email.to_string());
        Ok((comment, added))
    }

    /// Every comment, grouped by post (posts in ID order), creation order within.
    pub fn iter_sorted(&self) -> impl Iterator<Item = &Comment> {
        let mut post_ids: Vec<&String> = self.by_post.keys().collect();
        post_ids.sort();
        post_ids
            .into_iter()
            .flat_map(move |id| self.by_post[id].iter())
    }

    /// Appends a comment read back from storage. Callers feed comments in
    /// creation order; the reason is returned for anything that cannot be
    /// attached.
    pub(crate) fn insert_loaded(&mut self, comment: Comment) -> std::result::Result<(), String> {
        let comments = self
            .by_post
            .get_mut(&comment.post_id)
            .ok_or_else(|| format!("post '{}' does not exist", comment.post_id))?;
        if comments.iter().any(|c| c.id == comment.id) {
            return Err(format!("duplicate comment ID '{}'", comment.id));
        }
        if let Some(parent) = &comment.parent_comment_id {
            if !comments.iter().any(|c| &c.id == parent) {
                return Err(format!("parent comment '{parent}' is missing"));
            }
        }
        comments.push(comment);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn by(author: &str, content: &str) -> NewComment {
        NewComment {
            author_id: author.to_string(),
            content: content.to_string(),
            ..NewComment::default()
        }
    }

    #[test]
    fn add_requires_known_post() {
        let mut tree = CommentTree::new();
        let err = tree.add("ghost", None, by("u1", "hi"), Utc::now()).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(..)));
    }

    #[test]
    fn parent_must_belong_to_same_post() {
        let mut tree = CommentTree::new();
        tree.register_post("a");
        tree.register_post("b");
        let on_a = tree.add("a", None, by("u1", "root"), Utc::now()).unwrap();

        let err = tree
            .add("b", Some(on_a.id.as_str()), by("u2", "reply"), Utc::now())
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert_eq!(tree.list_for_post("b").unwrap().len(), 0);
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn thread_nests_replies() {
        let mut tree = CommentTree::new();
        tree.register_post("p");
        let root = tree.add("p", None, by("u1", "root"), Utc::now()).unwrap();
        let reply = tree.add("p", Some(root.id.as_str()), by("u2", "reply"), Utc::now()).unwrap();
        tree.add("p", Some(reply.id.as_str()), by("u1", "nested"), Utc::now()).unwrap();
        tree.add("p", None, by("u3", "second root"), Utc::now()).unwrap();

        let flat: Vec<&str> = tree
            .list_for_post("p")
            .unwrap()
            .iter()
            .map(|c| c.content.as_str())
            .collect();
        assert_eq!(flat, vec!["root", "reply", "nested", "second root"]);

        let thread = tree.thread_for_post("p").unwrap();
        assert_eq!(thread.len(), 2);
        assert_eq!(thread[0].children[0].comment.content, "reply");
        assert_eq!(thread[0].children[0].children[0].comment.content, "nested");
        assert!(thread[1].children.is_empty());
    }

    #[test]
    fn deep_reply_chains_are_flattened_below_the_depth_limit() {
        let mut tree = CommentTree::new();
        tree.register_post("p");
        let mut parent = tree.add("p", None, by("u1", "0"), Utc::now()).unwrap().id;
        for n in 1..5_000 {
            parent = tree
                .add("p", Some(parent.as_str()), by("u1", &n.to_string()), Utc::now())
                .unwrap()
                .id;
        }

        let thread = tree.thread_for_post("p").unwrap();
        assert_eq!(thread.len(), 1);

        let mut depth = 1;
        let mut level = &thread[0];
        while let Some(first) = level.children.first() {
            depth += 1;
            level = first;
        }
        assert_eq!(depth, MAX_THREAD_DEPTH);

        // Everything past the limit hangs off the deepest nested parent.
        let mut total = 0;
        let mut stack: Vec<&CommentNode> = thread.iter().collect();
        while let Some(node) = stack.pop() {
            total += 1;
            stack.extend(node.children.iter());
        }
        assert_eq!(total, 5_000);
        let deepest_parent_children: Vec<&str> = {
            let mut node = &thread[0];
            for _ in 0..MAX_THREAD_DEPTH - 2 {
                node = &node.children[0];
            }
            node.children.iter().map(|c| c.comment.content.as_str()).collect()
        };
        assert_eq!(deepest_parent_children.len(), 5_000 - (MAX_THREAD_DEPTH - 1));
        assert_eq!(deepest_parent_children[0], (MAX_THREAD_DEPTH - 1).to_string());
        assert_eq!(deepest_parent_children.last().copied(), Some("4999"));
    }

    #[test]
    fn contains_is_scoped_to_the_post() {
        let mut tree = CommentTree::new();
        tree.register_post("a");
        tree.register_post("b");
        let c = tree.add("a", None, by("u1", "hi"), Utc::now()).unwrap();
        assert!(tree.contains("a", &c.id));
        assert!(!tree.contains("b", &c.id));
        assert!(!tree.contains("ghost", &c.id));
    }

    #[test]
    fn upvote_dedupes_by_email() {
        let mut tree = CommentTree::new();
        tree.register_post("p");
        let c = tree.add("p", None, by("u1", "hi"), Utc::now()).unwrap();
        assert!(tree.upvote("p", &c.id, "x@example.com").unwrap().1);
        assert!(!tree.upvote("p", &c.id, "x@example.com").unwrap().1);
        assert_eq!(tree.list_for_post("p").unwrap()[0].upvoter_emails.len(), 1);
        assert!(matches!(
            tree.upvote("p", "missing", "x@example.com"),
            Err(StoreError::NotFound(..))
        ));
    }

    #[test]
    fn remove_post_cascades() {
        let mut tree = CommentTree::new();
        tree.register_post("p");
        tree.add("p", None, by("u1", "one"), Utc::now()).unwrap();
        tree.add("p", None, by("u1", "two"), Utc::now()).unwrap();
        assert_eq!(tree.remove_post("p"), 2);
        assert!(tree.list_for_post("p").is_err());
    }
}
