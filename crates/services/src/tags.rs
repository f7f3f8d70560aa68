//! # Tag Index
//!
//! Inverted index tag -> post IDs over published posts only. Holds IDs, never
//! posts; listings resolve through the `PostStore`.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use domains::{Post, Tag};
use tracing::debug;

use crate::posts::PostStore;
use crate::ranking::{newest_first, Page};
use crate::text::normalize_tag;

#[derive(Debug, Default)]
pub struct TagIndex {
    entries: BTreeMap<String, BTreeSet<String>>,
    /// Tags each post is currently indexed under, to diff on update.
    by_post: HashMap<String, BTreeSet<String>>,
}

impl TagIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the post to exactly the entries of its current tags, or out of
    /// every entry when it is a draft.
    pub fn on_post_upserted(&mut self, post: &Post) {
        let wanted: BTreeSet<String> = if post.draft {
            BTreeSet::new()
        } else {
            post.tags.clone()
        };
        let previous = self.by_post.remove(&post.id).unwrap_or_default();

        for stale in previous.difference(&wanted) {
            self.remove_from(stale, &post.id);
        }
        for fresh in wanted.difference(&previous) {
            self.entries
                .entry(fresh.clone())
                .or_default()
                .insert(post.id.clone());
        }
        if !wanted.is_empty() {
            self.by_post.insert(post.id.clone(), wanted);
        }
    }

    pub fn on_post_deleted(&mut self, post_id: &str, tags: &BTreeSet<String>) {
        let indexed = self.by_post.remove(post_id).unwrap_or_default();
        for tag in indexed.union(tags) {
            self.remove_from(tag, post_id);
        }
    }

    fn remove_from(&mut self, tag: &str, post_id: &str) {
        if let Some(ids) = self.entries.get_mut(tag) {
            ids.remove(post_id);
            if ids.is_empty() {
                self.entries.remove(tag);
                debug!(tag, "pruned empty tag entry");
            }
        }
    }

    pub fn contains(&self, tag: &str, post_id: &str) -> bool {
        self.entries
            .get(tag)
            .is_some_and(|ids| ids.contains(post_id))
    }

    /// Substring match over tag names, ordered by name. The query is
    /// normalized like a tag, so "Web Dev" finds "web-dev".
    pub fn search(&self, query: &str) -> Vec<Tag> {
        let Some(needle) = normalize_tag(query) else {
            return Vec::new();
        };
        self.entries
            .iter()
            .filter(|(name, _)| name.contains(&needle))
            .map(|(name, ids)| Tag {
                name: name.clone(),
                post_count: ids.len(),
            })
            .collect()
    }

    pub fn all_tags(&self) -> Vec<Tag> {
        self.entries
            .iter()
            .map(|(name, ids)| Tag {
                name: name.clone(),
                post_count: ids.len(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Posts carrying the tag, newest first.
    pub fn posts_for_tag(&self, tag_name: &str, page: Page, posts: &PostStore) -> Vec<Post> {
        let Some(ids) = normalize_tag(tag_name).and_then(|tag| self.entries.get(&tag)) else {
            return Vec::new();
        };
        let mut tagged: Vec<&Post> = ids
            .iter()
            .filter_map(|id| posts.get(id, false).ok())
            .collect();
        tagged.sort_by(|a, b| newest_first(a, b));
        page.apply(tagged.into_iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn tagged(store: &mut PostStore, title: &str, tags: &[&str], offset_secs: i64) -> String {
        let now = Utc::now() + Duration::seconds(offset_secs);
        let post = Post {
            id: String::new(),
            title: title.to_string(),
            summary: String::new(),
            content: String::new(),
            author_id: "u1".to_string(),
            author_display_name: String::new(),
            author_profile_pic: String::new(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            draft: false,
            created_at: now,
            updated_at: now,
            upvoter_emails: BTreeSet::new(),
            attached_files: Vec::new(),
            views: 0,
        };
        store.create(post, now).unwrap()
    }

    #[test]
    fn upsert_diffs_membership() {
        let mut posts = PostStore::new();
        let mut index = TagIndex::new();
        let id = tagged(&mut posts, "One", &["rust", "web"], 0);
        index.on_post_upserted(posts.get(&id, true).unwrap());
        assert!(index.contains("rust", &id));
        assert!(index.contains("web", &id));

        let mut post = posts.get(&id, true).unwrap().clone();
        post.tags = BTreeSet::from(["rust".to_string(), "cli".to_string()]);
        index.on_post_upserted(&post);
        assert!(index.contains("cli", &id));
        assert!(!index.contains("web", &id));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn drafts_leave_the_index() {
        let mut posts = PostStore::new();
        let mut index = TagIndex::new();
        let id = tagged(&mut posts, "One", &["rust"], 0);
        let mut post = posts.get(&id, true).unwrap().clone();
        index.on_post_upserted(&post);

        post.draft = true;
        index.on_post_upserted(&post);
        assert!(!index.contains("rust", &id));
        assert!(index.search("rust").is_empty());
    }

    #[test]
    fn delete_prunes_entries() {
        let mut posts = PostStore::new();
        let mut index = TagIndex::new();
        let id = tagged(&mut posts, "One", &["solo"], 0);
        let post = posts.get(&id, true).unwrap().clone();
        index.on_post_upserted(&post);
        index.on_post_deleted(&id, &post.tags);
        assert_eq!(index.len(), 0);
    }

    #[test]
    fn search_is_substring_and_case_insensitive() {
        let mut posts = PostStore::new();
        let mut index = TagIndex::new();
        for (title, tags) in [("a", vec!["rust", "rustacean"]), ("b", vec!["trust", "go"])] {
            let id = tagged(&mut posts, title, &tags, 0);
            index.on_post_upserted(posts.get(&id, true).unwrap());
        }
        let names: Vec<String> = index.search("RUST").into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["rust", "rustacean", "trust"]);
        assert!(index.search("python").is_empty());
        assert!(index.search("  ").is_empty());
    }

    #[test]
    fn search_normalizes_multi_word_queries() {
        let mut posts = PostStore::new();
        let mut index = TagIndex::new();
        let id = tagged(&mut posts, "a", &["Web Dev", "webassembly"], 0);
        index.on_post_upserted(posts.get(&id, true).unwrap());

        let names: Vec<String> = index.search(" web  DEV ").into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["web-dev"]);
        assert_eq!(index.search("web").len(), 2);
    }

    #[test]
    fn posts_for_tag_pages_newest_first() {
        let mut posts = PostStore::new();
        let mut index = TagIndex::new();
        for i in 0..3 {
            let id = tagged(&mut posts, &format!("Post {i}"), &["news"], i);
            index.on_post_upserted(posts.get(&id, true).unwrap());
        }
        let titles: Vec<String> = index
            .posts_for_tag(" News ", Page::new(0, 2, 10, 100), &posts)
            .into_iter()
            .map(|p| p.title)
            .collect();
        assert_eq!(titles, vec!["Post 2", "Post 1"]);
        assert!(index
            .posts_for_tag("news", Page::new(1000, 20, 10, 100), &posts)
            .is_empty());
        assert!(index
            .posts_for_tag("unknown", Page::new(0, 20, 10, 100), &posts)
            .is_empty());
    }
}
