//! Uniform wrapper capabilities
//!
//! Every view answers the same five questions (get, set, delete,
//! enumerate, describe) regardless of its shape. Shape-specific operations
//! live on the views themselves.

use crate::mapping::MappingRef;
use crate::object::ObjectRef;
use crate::sequence::SequenceRef;
use crate::set::SetRef;
use tessera_core::{Generation, Handle, Result, ShapeKind, Value};

/// Summary of a wrapper as seen by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Description {
    /// Target identity
    pub handle: Handle,
    /// Shape of the target
    pub kind: ShapeKind,
    /// Visible number of attributes, elements, entries or members
    pub len: usize,
    /// Generation of the last committed change
    pub generation: Generation,
}

/// Capabilities shared by every view
pub trait Capabilities {
    /// How a view addresses its contents
    type Key;

    /// Value stored under `key`
    fn get(&self, key: &Self::Key) -> Result<Option<Value>>;

    /// Store `value` under `key`
    fn set(&self, key: Self::Key, value: Value) -> Result<()>;

    /// Remove `key`; true if something was removed
    fn delete(&self, key: &Self::Key) -> Result<bool>;

    /// Every key, in the view's natural order
    fn enumerate(&self) -> Result<Vec<Self::Key>>;

    /// Summary of the wrapper
    fn describe(&self) -> Result<Description>;
}

/// A view of any shape
#[derive(Debug, Clone)]
pub enum Wrapped {
    /// Object view
    Object(ObjectRef),
    /// Sequence view
    Sequence(SequenceRef),
    /// Mapping view
    Mapping(MappingRef),
    /// Set view
    Set(SetRef),
}

impl Wrapped {
    /// Target identity
    pub fn handle(&self) -> Handle {
        match self {
            Wrapped::Object(v) => v.handle(),
            Wrapped::Sequence(v) => v.handle(),
            Wrapped::Mapping(v) => v.handle(),
            Wrapped::Set(v) => v.handle(),
        }
    }

    /// Shape of the target
    pub fn kind(&self) -> ShapeKind {
        self.handle().kind()
    }

    /// Summary of the wrapper
    pub fn describe(&self) -> Result<Description> {
        match self {
            Wrapped::Object(v) => v.describe(),
            Wrapped::Sequence(v) => v.describe(),
            Wrapped::Mapping(v) => v.describe(),
            Wrapped::Set(v) => v.describe(),
        }
    }

    /// Object view, if this is one
    pub fn into_object(self) -> Option<ObjectRef> {
        match self {
            Wrapped::Object(v) => Some(v),
            _ => None,
        }
    }

    /// Sequence view, if this is one
    pub fn into_sequence(self) -> Option<SequenceRef> {
        match self {
            Wrapped::Sequence(v) => Some(v),
            _ => None,
        }
    }

    /// Mapping view, if this is one
    pub fn into_mapping(self) -> Option<MappingRef> {
        match self {
            Wrapped::Mapping(v) => Some(v),
            _ => None,
        }
    }

    /// Set view, if this is one
    pub fn into_set(self) -> Option<SetRef> {
        match self {
            Wrapped::Set(v) => Some(v),
            _ => None,
        }
    }
}
