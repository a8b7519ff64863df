//! Error types for document operations.
//!
//! Every fallible document operation returns [`Result`], whose error type is
//! [`DocumentError`]. Ownership violations, stale handles and unknown custom
//! changes are reported as values; the document is left unchanged.

use thiserror::Error;

use vellum_core::key::{LayerKey, PartKey};

/// The error type for document operations.
#[derive(Debug, Error, PartialEq)]
pub enum DocumentError {
    #[error("Unknown part {0}")]
    UnknownPart(PartKey),

    #[error("Unknown layer {0}")]
    UnknownLayer(LayerKey),

    #[error("Invalid ownership for part {part}: {reason}")]
    InvalidOwnership { part: PartKey, reason: String },

    #[error("Part {part} is not a {role}")]
    MissingRole { part: PartKey, role: &'static str },

    #[error("Part {part} is not a top-level member of layer {layer}")]
    NotTopLevel { part: PartKey, layer: LayerKey },

    #[error("Cannot reorder part {0} relative to itself")]
    SelfReorder(PartKey),

    #[error("Cannot remove the last layer")]
    LastLayer,

    #[error("No handler for change hint {0}")]
    UnknownChangeHint(u32),

    #[error("Hint {0} is reserved for built-in changes")]
    ReservedHint(u32),

    #[error("Part {0} is still attached")]
    NotDetached(PartKey),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl DocumentError {
    /// Create a new `InvalidOwnership` error.
    pub fn invalid_ownership(part: PartKey, reason: impl Into<String>) -> Self {
        Self::InvalidOwnership {
            part,
            reason: reason.into(),
        }
    }
}

/// Result alias for document operations.
pub type Result<T> = std::result::Result<T, DocumentError>;
