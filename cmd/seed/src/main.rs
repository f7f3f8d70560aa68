//! Seeds a JSON-backed store with demo users, posts, comments and an
//! attachment. Refuses to touch a store that already has content.

use anyhow::{bail, Context};
use bytes::Bytes;
use configs::{Settings, StorageBackend};
use domains::{Identity, UploadedFile};
use services::{CommentForm, ContentStore, PostForm, StoreOptions};
use storage_adapters::{JsonFileSnapshotRepo, LocalBlobStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

const POSTS: &[(&str, &str, &str, &str)] = &[
    (
        "Getting started with async Rust",
        "Futures, executors and why nothing runs until you poll.",
        "An async fn returns a future. Nothing happens until an executor polls it.",
        "rust, async, tutorial",
    ),
    (
        "Content addressed storage",
        "Hash the bytes, use the hash as the name.",
        "Deduplication falls out of naming blobs by their SHA-256 digest.",
        "storage, hashing",
    ),
    (
        "Ranking posts by popularity",
        "Logarithmic votes plus a recency term.",
        "Ten upvotes count as much as one more unit of recency.",
        "ranking, rust",
    ),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("loading settings")?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level)),
        )
        .init();

    if settings.storage.backend != StorageBackend::Json {
        bail!("seeding needs the json storage backend");
    }
    let store = ContentStore::new(
        Box::new(JsonFileSnapshotRepo::new(settings.snapshot_path())),
        Box::new(LocalBlobStore::new(settings.blob_path())),
        StoreOptions::default(),
    );
    let existing = store.load_all().await.context("loading existing content")?;
    if existing.posts > 0 {
        bail!("store at {} already has {} posts", settings.snapshot_path().display(), existing.posts);
    }

    let ada = Identity::new("ada", "ada@example.com");
    let linus = Identity::new("linus", "linus@example.com");
    store.sign_in(&ada, "Ada", "")?;
    store.sign_in(&linus, "Linus", "")?;

    let mut ids = Vec::with_capacity(POSTS.len());
    for (title, summary, content, tags) in POSTS {
        let form = PostForm::from_fields([
            ("title", *title),
            ("summary", *summary),
            ("content", *content),
            ("tags", *tags),
            ("authorDisplayName", "Ada"),
        ])?;
        ids.push(store.create_post(&ada, form, Vec::new()).await?.id);
    }

    store
        .create_post(
            &linus,
            PostForm::from_fields([("title", "Unfinished thoughts"), ("tags", "wip"), ("draft", "true")])?,
            Vec::new(),
        )
        .await?;

    store
        .attach_file(
            &ids[1],
            &ada,
            UploadedFile {
                name: "notes.txt".to_string(),
                content_type: "text/plain".to_string(),
                bytes: Bytes::from_static(b"sha256 all the things\n"),
            },
        )
        .await?;

    let root = store.add_comment(
        &ids[0],
        &linus,
        CommentForm::from_fields([("content", "Great intro."), ("authorDisplayName", "Linus")]),
    )?;
    store.add_comment(
        &ids[0],
        &ada,
        CommentForm::from_fields([
            ("content", "Thanks!"),
            ("parentCommentId", root.id.as_str()),
            ("authorDisplayName", "Ada"),
        ]),
    )?;
    store.upvote_comment(&ids[0], &root.id, &ada.email)?;

    for voter in [&ada.email, &linus.email] {
        store.upvote_post(&ids[0], voter)?;
    }
    store.upvote_post(&ids[2], &linus.email)?;

    let stats = store.persist_all().await?;
    info!(posts = stats.posts, comments = stats.comments, tags = stats.tags, "seeded");
    Ok(())
}
