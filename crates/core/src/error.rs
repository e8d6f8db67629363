//! Error types for the STM runtime
//!
//! This module defines the single error enum surfaced by every operation.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use crate::types::{Handle, Property};
use thiserror::Error;

/// Result type alias for STM operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the STM runtime
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Commit validation found a target that changed underneath the transaction
    ///
    /// The transaction is left untouched; the caller may dispose it or retry
    /// with a fresh one.
    #[error("Transaction conflict on {target}{}", property_suffix(.property))]
    Conflict {
        /// Target whose generation no longer matches
        target: Handle,
        /// Property involved, when known
        property: Option<Property>,
    },

    /// API misuse (wrong shape, inactive transaction, unsupported value)
    #[error("Invalid usage: {0}")]
    InvalidUsage(String),

    /// Handle does not resolve in this runtime
    #[error("Unknown target: {0}")]
    UnknownTarget(Handle),

    /// A hook rejected or failed the operation
    #[error("Hook error: {0}")]
    Hook(String),
}

fn property_suffix(property: &Option<Property>) -> String {
    match property {
        Some(p) => format!(" at {}", p),
        None => String::new(),
    }
}

impl Error {
    /// Conflict on a whole target
    pub fn conflict(target: Handle) -> Self {
        Error::Conflict {
            target,
            property: None,
        }
    }

    /// Invalid usage with a message
    pub fn invalid_usage(message: impl Into<String>) -> Self {
        Error::InvalidUsage(message.into())
    }

    /// Hook failure with a message
    pub fn hook(message: impl Into<String>) -> Self {
        Error::Hook(message.into())
    }

    /// True for commit conflicts
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict { .. })
    }

    /// Target named by a conflict, if this is one
    pub fn conflict_target(&self) -> Option<Handle> {
        match self {
            Error::Conflict { target, .. } => Some(*target),
            _ => None,
        }
    }
}
