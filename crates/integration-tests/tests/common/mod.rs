//! Shared fixtures for the integration suites.
#![allow(dead_code)]

use domains::{Identity, Post};
use services::{ContentStore, PostForm, StoreOptions};
use storage_adapters::{MemoryBlobStore, MemorySnapshotRepo};

pub fn memory_store() -> ContentStore {
    ContentStore::new(
        Box::new(MemorySnapshotRepo::new()),
        Box::new(MemoryBlobStore::new()),
        StoreOptions::default(),
    )
}

pub fn alice() -> Identity {
    Identity::new("alice", "alice@example.com")
}

pub fn bob() -> Identity {
    Identity::new("bob", "bob@example.com")
}

pub fn form(fields: &[(&str, &str)]) -> PostForm {
    PostForm::from_fields(fields.iter().copied()).expect("valid form")
}

pub async fn publish(store: &ContentStore, author: &Identity, title: &str, tags: &str) -> Post {
    store
        .create_post(author, form(&[("title", title), ("tags", tags)]), Vec::new())
        .await
        .expect("create post")
}

/// Every tag of a published post is indexed and searchable; drafts appear
/// in neither index.
pub fn assert_indexes_agree(store: &ContentStore, post_id: &str) {
    let post = store.get_post(post_id, true).expect("post exists");
    let published = !post.draft;
    for tag in &post.tags {
        let listed = store
            .posts_for_tag(tag, 0, 100)
            .iter()
            .any(|p| p.id == post_id);
        assert_eq!(listed, published, "tag index for '{tag}'");
    }
    let by_title = store
        .search_posts(&post.title)
        .iter()
        .any(|p| p.id == post_id);
    assert_eq!(by_title, published, "search index for '{}'", post.title);
}
