//! Commit validation
//!
//! Conflicts are detected per target, never per property:
//! - A root commit conflicts when a target it touched has committed a newer
//!   generation since the buffer first observed it.
//! - A nested commit conflicts when the parent observed the same target at a
//!   different generation, or when the parent wrote the target and the child
//!   did not observe exactly that write.
//!
//! Validation is all-or-nothing: a single conflict rejects the commit, and
//! the rejected transaction is left exactly as it was.

use std::fmt;
use tessera_core::{Error, Generation, Handle};

/// Reasons a buffer cannot be committed or merged
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictType {
    /// The target committed since this buffer first observed it
    StaleGeneration {
        /// Target in conflict
        target: Handle,
        /// Generation observed on first touch
        observed: Generation,
        /// Generation the target carries now
        current: Generation,
    },

    /// Parent and child observed the target at different generations
    ParentGenerationMismatch {
        /// Target in conflict
        target: Handle,
        /// Generation observed by the child
        child: Generation,
        /// Generation observed by the parent
        parent: Generation,
    },

    /// The parent wrote the target after, or independently of, what the child observed
    ParentDiverged {
        /// Target in conflict
        target: Handle,
    },
}

impl ConflictType {
    /// Target in conflict
    pub fn target(&self) -> Handle {
        match self {
            ConflictType::StaleGeneration { target, .. }
            | ConflictType::ParentGenerationMismatch { target, .. }
            | ConflictType::ParentDiverged { target } => *target,
        }
    }
}

impl fmt::Display for ConflictType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictType::StaleGeneration {
                target,
                observed,
                current,
            } => write!(f, "{} observed at {} but now at {}", target, observed, current),
            ConflictType::ParentGenerationMismatch {
                target,
                child,
                parent,
            } => write!(
                f,
                "{} observed at {} by child and {} by parent",
                target, child, parent
            ),
            ConflictType::ParentDiverged { target } => {
                write!(f, "{} was written by the parent independently", target)
            }
        }
    }
}

impl From<ConflictType> for Error {
    fn from(conflict: ConflictType) -> Self {
        Error::conflict(conflict.target())
    }
}

/// Result of transaction validation
///
/// Accumulates all conflicts found during validation.
/// A transaction commits only if is_valid() returns true.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// All conflicts detected during validation
    pub conflicts: Vec<ConflictType>,
}

impl ValidationResult {
    /// Create a successful validation result (no conflicts)
    pub fn ok() -> Self {
        ValidationResult {
            conflicts: Vec::new(),
        }
    }

    /// Record a conflict
    pub fn push(&mut self, conflict: ConflictType) {
        self.conflicts.push(conflict);
    }

    /// Check if validation passed (no conflicts)
    pub fn is_valid(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Get the number of conflicts
    pub fn conflict_count(&self) -> usize {
        self.conflicts.len()
    }

    /// Convert into an error carrying the first conflict
    pub fn into_result(self) -> Result<(), Error> {
        match self.conflicts.into_iter().next() {
            None => Ok(()),
            Some(conflict) => Err(conflict.into()),
        }
    }
}
