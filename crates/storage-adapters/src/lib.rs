//! Adapters for the `SnapshotRepo` and `BlobStore` ports.
//!
//! - `json_file` / `local_blobs`: durable, on local disk.
//! - `memory`: process-local, for tests and the `memory` backend.

pub mod json_file;
pub mod local_blobs;
pub mod memory;

pub use json_file::JsonFileSnapshotRepo;
pub use local_blobs::LocalBlobStore;
pub use memory::{MemoryBlobStore, MemorySnapshotRepo};
