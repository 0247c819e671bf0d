//! Common types and utilities shared across Tilechat crates.
//!
//! This crate defines the chat data model, the shared error type, the
//! persisted settings and observability helpers used throughout the
//! workspace. It is intentionally lightweight so that every crate can depend
//! on it without pulling in the HTTP or terminal stacks.
//!
//! # Overview
//!
//! - [`ChatMessage`], [`ImageRef`] and [`Transcript`]: the conversation model
//! - [`Settings`] and [`KeyValueStore`]: the persisted theme preference
//! - [`observability`]: centralised tracing/logging initialisation
//! - [`ChatError`] and [`Result`]: shared error handling
//!
//! # Examples
//!
//! ```rust
//! use tilechat_common::{ChatMessage, Role, Transcript};
//!
//! let mut transcript = Transcript::default();
//! transcript.push(ChatMessage::user(Some("hello".into()), Vec::new()));
//! transcript.push(ChatMessage::assistant("hi there"));
//! assert_eq!(transcript.len(), 2);
//! assert_eq!(transcript.last().map(|m| m.role()), Some(Role::Assistant));
//! ```

pub mod message;
pub mod observability;
pub mod settings;

pub use message::{ChatMessage, ImageRef, Role, Transcript, DEFAULT_IMAGE_MIME};
pub use settings::{JsonFileStore, KeyValueStore, MemoryStore, Settings};

/// Maximum size of a single image attachment (10 MiB).
pub const MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;

/// Default number of images that may be pending at once.
pub const DEFAULT_ATTACHMENT_CAPACITY: usize = 3;

/// Error types used across the Tilechat system.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    /// A selected file is not an `image/*` type.
    #[error("{name} is not an image file ({content_type})")]
    InvalidFileType { name: String, content_type: String },

    /// A selected file exceeds the per-file size ceiling.
    #[error("{name} is too large ({size} bytes, limit {limit} bytes)")]
    FileTooLarge { name: String, size: u64, limit: u64 },

    /// Reading or decoding the file failed.
    #[error("failed to read {name}: {reason}")]
    FileReadError { name: String, reason: String },

    /// Accepting the file would exceed the attachment capacity.
    #[error("{name} was not attached: at most {capacity} images may be pending")]
    CapacityExceeded { name: String, capacity: usize },

    /// Transport failure or non-success HTTP status.
    #[error("Network error: {message}")]
    Network {
        status: Option<u16>,
        message: String,
    },

    /// The response body did not carry the expected fields.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Configuration was incomplete or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The settings store could not be read or written.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl ChatError {
    /// Name of the offending file for file-validation errors.
    pub fn file_name(&self) -> Option<&str> {
        match self {
            Self::InvalidFileType { name, .. }
            | Self::FileTooLarge { name, .. }
            | Self::FileReadError { name, .. }
            | Self::CapacityExceeded { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// Convenient alias for results that use [`ChatError`].
pub type Result<T> = std::result::Result<T, ChatError>;
