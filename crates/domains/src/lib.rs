//! svont/crates/domains/src/lib.rs
//!
//! Domain records, the error taxonomy and the storage ports of Svont.

pub mod error;
pub mod models;
pub mod traits;

// Re-exporting for easier access in other crates
pub use error::*;
pub use models::*;
pub use traits::*;
