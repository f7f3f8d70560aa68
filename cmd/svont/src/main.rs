//! # svont
//!
//! Hosts the content store: loads the durable state at startup, keeps it in
//! memory while running and flushes it once more on shutdown.

use std::sync::Arc;

use anyhow::Context;
use configs::{LogFormat, LoggingSettings, Settings, StorageBackend};
use domains::{BlobStore, SnapshotRepo};
use services::{ContentStore, PopularityWeights, StoreOptions};
use storage_adapters::{JsonFileSnapshotRepo, LocalBlobStore, MemoryBlobStore, MemorySnapshotRepo};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("loading settings")?;
    init_tracing(&settings.logging);

    let store = Arc::new(build_store(&settings));
    let stats = store.load_all().await.context("loading content")?;
    info!(
        backend = ?settings.storage.backend,
        posts = stats.posts,
        published = stats.published,
        comments = stats.comments,
        tags = stats.tags,
        "svont ready"
    );

    shutdown_signal().await;
    info!("shutdown requested, persisting content");
    if let Err(err) = store.persist_all().await {
        error!(error = %err, "final persist failed");
        return Err(err.into());
    }
    Ok(())
}

fn init_tracing(logging: &LoggingSettings) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    match logging.format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Pretty => subscriber.init(),
    }
}

fn build_store(settings: &Settings) -> ContentStore {
    let (snapshots, blobs): (Box<dyn SnapshotRepo>, Box<dyn BlobStore>) =
        match settings.storage.backend {
            StorageBackend::Json => (
                Box::new(JsonFileSnapshotRepo::new(settings.snapshot_path())),
                Box::new(LocalBlobStore::new(settings.blob_path())),
            ),
            StorageBackend::Memory => (
                Box::new(MemorySnapshotRepo::new()),
                Box::new(MemoryBlobStore::new()),
            ),
        };
    ContentStore::new(snapshots, blobs, store_options(settings))
}

fn store_options(settings: &Settings) -> StoreOptions {
    let store = &settings.store;
    StoreOptions {
        default_page_size: store.default_page_size,
        popular_page_size: store.popular_page_size,
        tag_page_size: store.tag_page_size,
        max_page_size: store.max_page_size,
        popularity: PopularityWeights {
            upvote_weight: store.upvote_weight,
            view_weight: store.view_weight,
            decay_secs: store.popularity_decay_secs,
        },
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
