//! Core types for Tessera
//!
//! This crate defines the foundational types used throughout the system:
//! - Handle, TargetId, SpaceId, ShapeKind: identity of wrapped targets
//! - Value, RawNode: values flowing through wrappers and the plain graphs they wrap
//! - Generation: the process-wide clock used for conflict detection
//! - Change: the mutation descriptions handed to hooks
//! - StmConfig: runtime configuration
//! - Error: error type for every operation

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod change;
pub mod config;
pub mod error;
pub mod generation;
pub mod types;
pub mod value;

pub use change::{Change, ChangeKind};
pub use config::{ShapeSet, StmConfig};
pub use error::{Error, Result};
pub use generation::{current_generation, next_generation, Generation};
pub use types::{Handle, Property, ShapeKind, SpaceId, TargetId};
pub use value::{
    Attributes, Elements, Entries, FxBuildHasher, Members, RawBody, RawNode, Value, WeakRawNode,
};
