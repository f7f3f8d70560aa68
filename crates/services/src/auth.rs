//! Ownership capability. The identity itself is verified upstream; this only
//! decides whether a verified identity may mutate a post.

use domains::{Identity, Post};

/// Only the author may update, attach to, or delete a post.
pub fn can_mutate(identity: &Identity, post: &Post) -> bool {
    !identity.user_id.is_empty() && identity.user_id == post.author_id
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeSet;

    fn post_by(author: &str) -> Post {
        Post {
            id: "p".to_string(),
            title: "t".to_string(),
            summary: String::new(),
            content: String::new(),
            author_id: author.to_string(),
            author_display_name: String::new(),
            author_profile_pic: String::new(),
            tags: BTreeSet::new(),
            draft: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            upvoter_emails: BTreeSet::new(),
            attached_files: Vec::new(),
            views: 0,
        }
    }

    #[test]
    fn author_may_mutate() {
        assert!(can_mutate(&Identity::new("u1", "a@example.com"), &post_by("u1")));
    }

    #[test]
    fn others_and_anonymous_may_not() {
        assert!(!can_mutate(&Identity::new("u2", "b@example.com"), &post_by("u1")));
        assert!(!can_mutate(&Identity::new("", ""), &post_by("")));
    }
}
