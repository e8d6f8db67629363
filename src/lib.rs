//! Tessera - software transactional memory for in-process object graphs
//!
//! Tessera wraps plain containers (objects, sequences, mappings and sets)
//! into transactional views. Outside a transaction every operation applies
//! immediately; inside one, changes are staged per target and become visible
//! atomically on commit, or not at all.
//!
//! # Quick Start
//!
//! ```
//! use tessera::{RawNode, Stm, Value};
//!
//! let stm = Stm::new();
//! let account = stm.wrap_object(RawNode::object_from([("balance", 100)]))?;
//!
//! stm.in_transaction(|| {
//!     let balance = account.get("balance")?.and_then(|v| v.as_int()).unwrap_or(0);
//!     account.set("balance", balance - 30)
//! })?;
//!
//! assert_eq!(account.get("balance")?, Some(Value::Int(70)));
//! # Ok::<(), tessera::Error>(())
//! ```
//!
//! # Architecture
//!
//! - `tessera-core`: values, handles, the generation clock, changes, errors
//!   and configuration
//! - `tessera-concurrency`: the runtime, wrappers, buffers, transactions and
//!   hooks
//!
//! Everything public is re-exported here.

pub use tessera_concurrency::*;
pub use tessera_core::{
    current_generation, next_generation, Change, ChangeKind, Error, Generation, Handle, Property,
    RawBody, RawNode, Result, ShapeKind, ShapeSet, StmConfig, Value,
};
