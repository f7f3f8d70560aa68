//! # Search Index
//!
//! Token -> (post ID -> weight) over published posts, with a forward map so
//! an update can drop the tokens of the previous version.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use domains::Post;

use crate::posts::PostStore;
use crate::ranking::newest_first;
use crate::text::tokenize;

pub const TITLE_WEIGHT: u32 = 3;
pub const SUMMARY_WEIGHT: u32 = 2;
pub const CONTENT_WEIGHT: u32 = 1;

#[derive(Debug, Default)]
pub struct SearchIndex {
    postings: HashMap<String, HashMap<String, u32>>,
    forward: HashMap<String, Vec<String>>,
}

impl SearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_post_upserted(&mut self, post: &Post) {
        self.on_post_deleted(&post.id);
        if post.draft {
            return;
        }

        let weights = token_weights(post);
        let mut tokens = Vec::with_capacity(weights.len());
        for (token, weight) in weights {
            self.postings
                .entry(token.clone())
                .or_default()
                .insert(post.id.clone(), weight);
            tokens.push(token);
        }
        // Published posts always get an entry, even without searchable tokens.
        self.forward.insert(post.id.clone(), tokens);
    }

    pub fn on_post_deleted(&mut self, post_id: &str) {
        let Some(tokens) = self.forward.remove(post_id) else {
            return;
        };
        for token in tokens {
            if let Some(ids) = self.postings.get_mut(&token) {
                ids.remove(post_id);
                if ids.is_empty() {
                    self.postings.remove(&token);
                }
            }
        }
    }

    pub fn is_indexed(&self, post_id: &str) -> bool {
        self.forward.contains_key(post_id)
    }

    pub fn weight(&self, token: &str, post_id: &str) -> Option<u32> {
        self.postings.get(token)?.get(post_id).copied()
    }

    /// OR across query tokens; a post scores the sum of its weights for the
    /// distinct tokens it matches. Ties go to the newer post.
    pub fn search(&self, query: &str, posts: &PostStore) -> Vec<Post> {
        let query_tokens: BTreeSet<String> = tokenize(query).collect();
        let mut scores: HashMap<&str, u32> = HashMap::new();
        for token in &query_tokens {
            if let Some(ids) = self.postings.get(token) {
                for (id, weight) in ids {
                    *scores.entry(id.as_str()).or_default() += weight;
                }
            }
        }

        let mut hits: Vec<(u32, &Post)> = scores
            .into_iter()
            .filter_map(|(id, score)| posts.get(id, false).ok().map(|post| (score, post)))
            .collect();
        hits.sort_by(|(left_score, left), (right_score, right)| match right_score.cmp(left_score) {
            Ordering::Equal => newest_first(left, right),
            other => other,
        });
        hits.into_iter().map(|(_, post)| post.clone()).collect()
    }
}

fn token_weights(post: &Post) -> HashMap<String, u32> {
    let mut weights = HashMap::new();
    for (text, field_weight) in [
        (&post.title, TITLE_WEIGHT),
        (&post.summary, SUMMARY_WEIGHT),
        (&post.content, CONTENT_WEIGHT),
    ] {
        for token in tokenize(text) {
            *weights.entry(token).or_insert(0) += field_weight;
        }
    }
    weights
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn add(store: &mut PostStore, index: &mut SearchIndex, title: &str, content: &str, offset_secs: i64) -> String {
        let now = Utc::now() + Duration::seconds(offset_secs);
        let post = Post {
            id: String::new(),
            title: title.to_string(),
            summary: String::new(),
            content: content.to_string(),
            author_id: "u1".to_string(),
            author_display_name: String::new(),
            author_profile_pic: String::new(),
            tags: BTreeSet::new(),
            draft: false,
            created_at: now,
            updated_at: now,
            upvoter_emails: BTreeSet::new(),
            attached_files: Vec::new(),
            views: 0,
        };
        let id = store.create(post, now).unwrap();
        index.on_post_upserted(store.get(&id, true).unwrap());
        id
    }

    #[test]
    fn title_outweighs_body() {
        let mut store = PostStore::new();
        let mut index = SearchIndex::new();
        let body = add(&mut store, &mut index, "Gardening", "notes on tokio runtime", 10);
        let title = add(&mut store, &mut index, "Tokio tips", "misc", 0);

        let ids: Vec<String> = index.search("TOKIO", &store).into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![title, body]);
    }

    #[test]
    fn more_matched_tokens_rank_higher() {
        let mut store = PostStore::new();
        let mut index = SearchIndex::new();
        let one = add(&mut store, &mut index, "About", "rust", 5);
        let both = add(&mut store, &mut index, "About", "rust async", 0);
        let ids: Vec<String> = index.search("rust async", &store).into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![both, one]);
    }

    #[test]
    fn update_drops_stale_tokens() {
        let mut store = PostStore::new();
        let mut index = SearchIndex::new();
        let id = add(&mut store, &mut index, "Old words", "", 0);
        let mut post = store.get(&id, true).unwrap().clone();
        post.title = "New words".to_string();
        index.on_post_upserted(&post);
        assert_eq!(index.weight("old", &id), None);
        assert_eq!(index.weight("words", &id), Some(TITLE_WEIGHT));
    }

    #[test]
    fn drafts_are_not_indexed() {
        let mut store = PostStore::new();
        let mut index = SearchIndex::new();
        let id = add(&mut store, &mut index, "Visible", "", 0);
        let mut post = store.get(&id, true).unwrap().clone();
        post.draft = true;
        index.on_post_upserted(&post);
        assert!(!index.is_indexed(&id));
        assert!(index.search("visible", &store).is_empty());
    }

    #[test]
    fn published_post_without_tokens_is_still_indexed() {
        let mut store = PostStore::new();
        let mut index = SearchIndex::new();
        let id = add(&mut store, &mut index, "X", "", 0);
        assert!(index.is_indexed(&id));
        assert!(index.search("x", &store).is_empty());

        index.on_post_deleted(&id);
        assert!(!index.is_indexed(&id));
    }

    #[test]
    fn ties_break_by_recency_and_repeat() {
        let mut store = PostStore::new();
        let mut index = SearchIndex::new();
        let older = add(&mut store, &mut index, "Same", "", 0);
        let newer = add(&mut store, &mut index, "Same", "", 30);
        let first: Vec<String> = index.search("same", &store).into_iter().map(|p| p.id).collect();
        assert_eq!(first, vec![newer, older]);
        for _ in 0..5 {
            let again: Vec<String> = index.search("same", &store).into_iter().map(|p| p.id).collect();
            assert_eq!(again, first);
        }
        assert!(index.search("", &store).is_empty());
    }
}
