//! Identifier and text helpers: slugs, IDs, tag normalization, tokenizing.

use std::collections::BTreeSet;

use domains::{Result, StoreError};
use uuid::Uuid;

const MAX_SLUG_LEN: usize = 48;
const MIN_TOKEN_LEN: usize = 2;

/// Lower-cased ASCII alphanumerics joined by single hyphens.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len().min(MAX_SLUG_LEN));
    let mut pending_dash = false;
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
            if slug.len() >= MAX_SLUG_LEN {
                break;
            }
        } else {
            pending_dash = true;
        }
    }
    slug.trim_end_matches('-').to_string()
}

/// `"{slug}-{8 hex}"`, or `"post-{8 hex}"` when the title has no usable characters.
/// Uniqueness is checked by the caller.
pub fn new_post_id(title: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    let slug = slugify(title);
    if slug.is_empty() {
        format!("post-{}", &suffix[..8])
    } else {
        format!("{}-{}", slug, &suffix[..8])
    }
}

/// Time-ordered, so a reply's ID always sorts after its parent's.
pub fn new_comment_id() -> String {
    Uuid::now_v7().to_string()
}

pub fn normalize_tag(raw: &str) -> Option<String> {
    let tag = raw
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-");
    if tag.is_empty() {
        None
    } else {
        Some(tag)
    }
}

pub fn normalize_tags<I, S>(raw: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raw.into_iter()
        .filter_map(|tag| normalize_tag(tag.as_ref()))
        .collect()
}

/// Parses the comma-separated `tags` form field.
pub fn parse_tag_list(raw: &str) -> BTreeSet<String> {
    normalize_tags(raw.split(','))
}

/// Case-folded tokens split on anything that is not alphanumeric.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.chars().count() >= MIN_TOKEN_LEN)
        .map(str::to_lowercase)
}

pub fn parse_bool_field(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        other => Err(StoreError::validation(format!(
            "field '{name}' expects a boolean, got '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_collapses_punctuation() {
        assert_eq!(slugify("  Hello, World!  Rust 2024 "), "hello-world-rust-2024");
        assert_eq!(slugify("¿Qué?"), "qu");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn slug_is_capped() {
        let slug = slugify(&"abc ".repeat(40));
        assert!(slug.len() <= MAX_SLUG_LEN);
        assert!(!slug.ends_with('-'));
    }

    #[test]
    fn post_id_keeps_slug_prefix() {
        let id = new_post_id("Hello World");
        assert!(id.starts_with("hello-world-"));
        assert_eq!(id.len(), "hello-world-".len() + 8);
        assert!(new_post_id("???").starts_with("post-"));
        assert_ne!(new_post_id("same"), new_post_id("same"));
    }

    #[test]
    fn comment_ids_sort_by_creation() {
        let first = new_comment_id();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = new_comment_id();
        assert!(first < second);
    }

    #[test]
    fn tags_are_normalized_and_deduped() {
        let tags = parse_tag_list(" Rust, rust ,,Web  Dev, ");
        assert_eq!(
            tags.into_iter().collect::<Vec<_>>(),
            vec!["rust".to_string(), "web-dev".to_string()]
        );
        assert_eq!(normalize_tag("   "), None);
    }

    #[test]
    fn tokenize_folds_case_and_drops_short_tokens() {
        let tokens: Vec<String> = tokenize("Rust's *async* I/O: a Deep-Dive").collect();
        assert_eq!(tokens, vec!["rust", "async", "deep", "dive"]);
    }

    #[test]
    fn bool_field_accepts_common_spellings() {
        assert!(parse_bool_field("draft", "TRUE").unwrap());
        assert!(parse_bool_field("draft", "on").unwrap());
        assert!(!parse_bool_field("draft", "0").unwrap());
        assert!(matches!(
            parse_bool_field("draft", "maybe"),
            Err(StoreError::Validation(_))
        ));
    }
}
