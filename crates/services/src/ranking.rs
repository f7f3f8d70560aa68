//! Popularity scoring and the pagination contract shared by every listing.

use std::cmp::Ordering;

use domains::Post;

/// A normalized `[offset, offset + limit)` window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

impl Page {
    /// Negative offsets become 0, `limit <= 0` becomes `default_limit`,
    /// and limits are capped at `max_limit`.
    pub fn new(offset: i64, limit: i64, default_limit: usize, max_limit: usize) -> Self {
        let offset = usize::try_from(offset).unwrap_or(0);
        let limit = match usize::try_from(limit) {
            Ok(0) | Err(_) => default_limit,
            Ok(limit) => limit,
        };
        Self {
            offset,
            limit: limit.min(max_limit.max(1)),
        }
    }

    /// Past-the-end windows yield an empty vector.
    pub fn apply<T>(&self, items: impl IntoIterator<Item = T>) -> Vec<T> {
        items.into_iter().skip(self.offset).take(self.limit).collect()
    }
}

/// `created_at` descending, then `id` ascending.
pub fn newest_first(a: &Post, b: &Post) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| a.id.cmp(&b.id))
}

/// Inputs of the popularity formula.
///
/// `score = log10(1 + upvote_weight * upvotes + view_weight * views)
///          + created_at_secs / decay_secs`
///
/// The recency term uses the absolute creation time rather than "now", so the
/// order of two posts never changes while their data stays the same. One
/// order of magnitude more engagement is worth `decay_secs` of freshness.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PopularityWeights {
    pub upvote_weight: f64,
    pub view_weight: f64,
    pub decay_secs: f64,
}

impl Default for PopularityWeights {
    fn default() -> Self {
        Self {
            upvote_weight: 1.0,
            view_weight: 0.1,
            decay_secs: 45_000.0,
        }
    }
}

pub fn popularity_score(post: &Post, weights: &PopularityWeights) -> f64 {
    let engagement = weights.upvote_weight * post.upvote_count() as f64
        + weights.view_weight * post.views as f64;
    let recency = post.created_at.timestamp() as f64 / weights.decay_secs.max(1.0);
    (1.0 + engagement.max(0.0)).log10() + recency
}

/// Published posts ordered by score, ties broken by [`newest_first`].
pub fn rank_popular<'a>(
    posts: impl IntoIterator<Item = &'a Post>,
    weights: &PopularityWeights,
    page: Page,
) -> Vec<Post> {
    let mut scored: Vec<(f64, &Post)> = posts
        .into_iter()
        .filter(|post| post.is_published())
        .map(|post| (popularity_score(post, weights), post))
        .collect();
    scored.sort_by(|(left_score, left), (right_score, right)| {
        right_score
            .total_cmp(left_score)
            .then_with(|| newest_first(left, right))
    });
    page.apply(scored.into_iter().map(|(_, post)| post.clone()))
}
