//! Change model
//!
//! A `Change` describes one mutation of one target. Changes are handed to
//! hooks in two situations: a direct (non-transactional) mutation produces
//! exactly one change before it is applied, and a commit produces the net
//! changes of every written buffer.

use crate::types::{Handle, Property};
use crate::value::Value;

/// One mutation of one target
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    /// Target being mutated
    pub target: Handle,
    /// What happened
    pub kind: ChangeKind,
}

/// Kinds of mutation
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeKind {
    /// Attribute or index assigned
    SetValue {
        /// Attribute name or index
        property: Property,
        /// New value
        value: Value,
    },
    /// Attribute or index removed
    DeleteValue {
        /// Attribute name or index
        property: Property,
    },
    /// Range of a sequence replaced
    Splice {
        /// First affected index
        start: usize,
        /// Number of elements removed
        delete_count: usize,
        /// Elements inserted at `start`
        new_items: Vec<Value>,
    },
    /// Sequence reversed in place
    Reverse,
    /// Sequence sorted in place
    Sort,
    /// Mapping entry assigned
    SetElement {
        /// Entry key
        key: Value,
        /// New value
        value: Value,
    },
    /// Mapping entry or set member removed
    DeleteElement {
        /// Key or member
        key: Value,
    },
    /// Mapping or set emptied
    ClearElements,
    /// Set member added
    AddElement {
        /// New member
        value: Value,
    },
}

impl Change {
    /// Build a change
    pub fn new(target: Handle, kind: ChangeKind) -> Self {
        Change { target, kind }
    }

    /// Assignment of a property
    pub fn set_value(target: Handle, property: impl Into<Property>, value: Value) -> Self {
        Self::new(
            target,
            ChangeKind::SetValue {
                property: property.into(),
                value,
            },
        )
    }

    /// Removal of a property
    pub fn delete_value(target: Handle, property: impl Into<Property>) -> Self {
        Self::new(
            target,
            ChangeKind::DeleteValue {
                property: property.into(),
            },
        )
    }

    /// Range replacement
    pub fn splice(target: Handle, start: usize, delete_count: usize, new_items: Vec<Value>) -> Self {
        Self::new(
            target,
            ChangeKind::Splice {
                start,
                delete_count,
                new_items,
            },
        )
    }

    /// Lowercase tag naming the kind of change
    pub fn tag(&self) -> &'static str {
        self.kind.tag()
    }
}

impl ChangeKind {
    /// Lowercase tag naming this kind
    pub fn tag(&self) -> &'static str {
        match self {
            ChangeKind::SetValue { .. } => "setvalue",
            ChangeKind::DeleteValue { .. } => "deletevalue",
            ChangeKind::Splice { .. } => "splice",
            ChangeKind::Reverse => "reverse",
            ChangeKind::Sort => "sort",
            ChangeKind::SetElement { .. } => "setelement",
            ChangeKind::DeleteElement { .. } => "deleteelement",
            ChangeKind::ClearElements => "clearelements",
            ChangeKind::AddElement { .. } => "addelement",
        }
    }
}
