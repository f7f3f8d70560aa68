//! # StoreError
//!
//! Centralized error handling for the content store.
//! The request layer maps each variant to its own transport status, so
//! variants stay distinguishable and never collapse into a plain string.

use thiserror::Error;

/// The primary error type for all content-store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Malformed or missing input (e.g., blank title, unknown parent comment)
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found (e.g., Post, Comment, File)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Identity does not own the resource
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Durable storage failure during load or persist
    #[error("persistence error: {0}")]
    Persistence(String),
}

impl StoreError {
    pub fn validation<T: ToString>(msg: T) -> Self {
        Self::Validation(msg.to_string())
    }

    pub fn not_found(kind: &str, id: &str) -> Self {
        Self::NotFound(kind.to_string(), id.to_string())
    }

    pub fn forbidden<T: ToString>(msg: T) -> Self {
        Self::Forbidden(msg.to_string())
    }

    /// Keeps the whole `anyhow` context chain in the message.
    pub fn persistence(err: &anyhow::Error) -> Self {
        Self::Persistence(format!("{err:#}"))
    }
}

/// A specialized Result type for content-store logic.
pub type Result<T> = std::result::Result<T, StoreError>;
