//! Transactional wrappers for Tessera
//!
//! This crate implements software transactional memory over wrapped object
//! graphs:
//! - Stm: the runtime, owning targets, the identity registry and hooks
//! - Wrappers: object, sequence, mapping and set views over targets
//! - Transaction: per-target buffers with copy-on-write staging
//! - Validation: generation-based conflict detection at commit time
//! - Hooks: lifecycle callbacks for wrapping, mutation, commit and disposal
//!
//! Outside a transaction every wrapper operation applies immediately and
//! advances the target's generation. Inside one, operations are staged and
//! become visible only when the outermost transaction commits.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod buffer;
mod registry;
mod target;

pub mod capability;
pub mod dispatch;
pub mod hooks;
pub mod mapping;
pub mod object;
pub mod sequence;
pub mod set;
pub mod stm;
pub mod transaction;
pub mod validation;

pub use capability::{Capabilities, Description, Wrapped};
pub use dispatch::WrapFn;
pub use hooks::{Hooks, NoHooks, OnLeave, PostCommit, TracingHooks};
pub use mapping::MappingRef;
pub use object::ObjectRef;
pub use sequence::SequenceRef;
pub use set::SetRef;
pub use stm::Stm;
pub use transaction::{EnterGuard, Transaction, TransactionStatus};
pub use validation::{ConflictType, ValidationResult};

pub use tessera_core;
