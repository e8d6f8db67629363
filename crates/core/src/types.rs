//! Identity types for wrapped targets
//!
//! This module defines the identifiers shared by every layer:
//! - ShapeKind: which container shape a target has
//! - SpaceId: identifies the runtime that owns a target
//! - TargetId: arena slot of a target within its runtime
//! - Handle: caller-facing identity of a wrapper
//! - Property: attribute name or sequence index addressed by a change

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

/// Container shape of a wrapped target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShapeKind {
    /// Record with named attributes
    Object,
    /// Ordered list of elements
    Sequence,
    /// Key/value association, insertion ordered
    Mapping,
    /// Unique members, insertion ordered
    Set,
}

impl ShapeKind {
    /// All shapes, in declaration order
    pub const ALL: [ShapeKind; 4] = [
        ShapeKind::Object,
        ShapeKind::Sequence,
        ShapeKind::Mapping,
        ShapeKind::Set,
    ];

    /// Lowercase name used in logs and display output
    pub fn as_str(&self) -> &'static str {
        match self {
            ShapeKind::Object => "object",
            ShapeKind::Sequence => "sequence",
            ShapeKind::Mapping => "mapping",
            ShapeKind::Set => "set",
        }
    }
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one runtime instance
///
/// Handles carry the space they were minted in so that a handle from one
/// runtime is never resolved against another runtime's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpaceId(u32);

impl SpaceId {
    /// Allocate a fresh, process-unique space id
    pub fn next() -> Self {
        static NEXT: AtomicU32 = AtomicU32::new(1);
        SpaceId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

/// Arena slot of a target within its runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u32);

impl TargetId {
    /// Create a target id from an arena index
    pub const fn new(index: u32) -> Self {
        TargetId(index)
    }

    /// Arena index
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Caller-facing identity of a wrapped target
///
/// A handle is `Copy` and compares by identity: two handles are equal
/// exactly when they name the same target in the same runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle {
    space: SpaceId,
    id: TargetId,
    kind: ShapeKind,
}

impl Handle {
    /// Create a handle
    pub fn new(space: SpaceId, id: TargetId, kind: ShapeKind) -> Self {
        Handle { space, id, kind }
    }

    /// Runtime this handle belongs to
    pub fn space(&self) -> SpaceId {
        self.space
    }

    /// Arena slot of the target
    pub fn id(&self) -> TargetId {
        self.id
    }

    /// Shape of the target
    pub fn kind(&self) -> ShapeKind {
        self.kind
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.id)
    }
}

/// Attribute name or sequence index
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Property {
    /// Named attribute of an object
    Name(Rc<str>),
    /// Position in a sequence
    Index(usize),
}

impl From<&str> for Property {
    fn from(name: &str) -> Self {
        Property::Name(Rc::from(name))
    }
}

impl From<String> for Property {
    fn from(name: String) -> Self {
        Property::Name(Rc::from(name))
    }
}

impl From<Rc<str>> for Property {
    fn from(name: Rc<str>) -> Self {
        Property::Name(name)
    }
}

impl From<usize> for Property {
    fn from(index: usize) -> Self {
        Property::Index(index)
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Property::Name(name) => write!(f, "{}", name),
            Property::Index(index) => write!(f, "[{}]", index),
        }
    }
}
