//! Runtime configuration
//!
//! Configuration is fixed when a runtime is created. The defaults enable
//! every container shape and every diagnostic.

use crate::types::ShapeKind;

/// Container shapes a runtime recognizes when wrapping
///
/// Objects are always recognized; the other shapes are opt-in flags so a
/// runtime can be restricted to plain records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeSet {
    /// Recognize sequences
    pub sequences: bool,
    /// Recognize mappings
    pub mappings: bool,
    /// Recognize sets
    pub sets: bool,
}

impl ShapeSet {
    /// Every shape
    pub const fn all() -> Self {
        ShapeSet {
            sequences: true,
            mappings: true,
            sets: true,
        }
    }

    /// Only objects
    pub const fn objects_only() -> Self {
        ShapeSet {
            sequences: false,
            mappings: false,
            sets: false,
        }
    }

    /// Whether `kind` is recognized
    pub fn contains(&self, kind: ShapeKind) -> bool {
        match kind {
            ShapeKind::Object => true,
            ShapeKind::Sequence => self.sequences,
            ShapeKind::Mapping => self.mappings,
            ShapeKind::Set => self.sets,
        }
    }
}

impl Default for ShapeSet {
    fn default() -> Self {
        Self::all()
    }
}

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StmConfig {
    /// Shapes installed into the wrapping dispatcher at construction
    pub shapes: ShapeSet,
    /// Log an error when a transaction with touched buffers is dropped undisposed
    pub leak_diagnostics: bool,
    /// Keep a registry of transactions that have not been disposed
    pub track_live_transactions: bool,
}

impl StmConfig {
    /// Default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the installed shapes
    pub fn with_shapes(mut self, shapes: ShapeSet) -> Self {
        self.shapes = shapes;
        self
    }

    /// Toggle leak diagnostics
    pub fn with_leak_diagnostics(mut self, enabled: bool) -> Self {
        self.leak_diagnostics = enabled;
        self
    }

    /// Toggle the live-transaction registry
    pub fn with_live_tracking(mut self, enabled: bool) -> Self {
        self.track_live_transactions = enabled;
        self
    }
}

impl Default for StmConfig {
    fn default() -> Self {
        StmConfig {
            shapes: ShapeSet::all(),
            leak_diagnostics: true,
            track_live_transactions: true,
        }
    }
}
