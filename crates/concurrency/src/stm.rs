//! The runtime
//!
//! `Stm` owns everything one STM instance needs: the target arena, the
//! identity registry, the wrapping dispatcher, the installed hooks and the
//! slot holding the current transaction. It is a cheap `Rc` handle; clones
//! share state.
//!
//! The runtime is single-threaded. Each runtime has its own current
//! transaction slot, while the generation clock is shared process-wide.

use crate::buffer::Shape;
use crate::capability::Wrapped;
use crate::dispatch::{self, WrapFn};
use crate::hooks::{Hooks, NoHooks};
use crate::mapping::{self, MappingRef, MappingShape};
use crate::object::{ObjectRef, ObjectShape};
use crate::registry::IdentityRegistry;
use crate::sequence::{self, SequenceRef, SequenceShape};
use crate::set::{self, SetRef, SetShape};
use crate::target::{Heap, Target};
use crate::transaction::Transaction;
use rustc_hash::FxHashSet;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use tessera_core::{
    current_generation, next_generation, Change, Error, Generation, Handle, RawBody, RawNode,
    Result, ShapeKind, ShapeSet, SpaceId, StmConfig, Value,
};
use tracing::{debug, trace};

/// An STM runtime
#[derive(Clone)]
pub struct Stm {
    inner: Rc<StmInner>,
}

struct StmInner {
    config: StmConfig,
    space: SpaceId,
    heap: RefCell<Heap>,
    registry: RefCell<IdentityRegistry>,
    adopting: RefCell<Vec<RawNode>>,
    wrap_any: RefCell<WrapFn>,
    installed: Cell<ShapeSet>,
    hooks: RefCell<Rc<dyn Hooks>>,
    current: RefCell<Option<Transaction>>,
    live: RefCell<FxHashSet<Generation>>,
}

impl Stm {
    /// Runtime with the default configuration
    pub fn new() -> Self {
        Self::with_config(StmConfig::default())
    }

    /// Runtime with an explicit configuration
    pub fn with_config(config: StmConfig) -> Self {
        let space = SpaceId::next();
        let shapes = config.shapes;
        let stm = Stm {
            inner: Rc::new(StmInner {
                config,
                space,
                heap: RefCell::new(Heap::new(space)),
                registry: RefCell::new(IdentityRegistry::new()),
                adopting: RefCell::new(Vec::new()),
                wrap_any: RefCell::new(dispatch::base()),
                installed: Cell::new(ShapeSet::objects_only()),
                hooks: RefCell::new(Rc::new(NoHooks)),
                current: RefCell::new(None),
                live: RefCell::new(FxHashSet::default()),
            }),
        };
        if shapes.sequences {
            sequence::install(&stm);
        }
        if shapes.mappings {
            mapping::install(&stm);
        }
        if shapes.sets {
            set::install(&stm);
        }
        debug!(space = space.as_u32(), ?shapes, "runtime created");
        stm
    }

    /// Configuration this runtime was created with
    pub fn config(&self) -> &StmConfig {
        &self.inner.config
    }

    /// Identifier stamped into every handle this runtime mints
    pub fn space(&self) -> SpaceId {
        self.inner.space
    }

    /// Number of targets created so far
    pub fn target_count(&self) -> usize {
        self.inner.heap.borrow().len()
    }

    /// Whether two handles name the same runtime
    pub fn ptr_eq(&self, other: &Stm) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // === Hooks ===

    /// Currently installed hooks
    pub fn hooks(&self) -> Rc<dyn Hooks> {
        self.inner.hooks.borrow().clone()
    }

    /// Install hooks, returning the previously installed ones
    pub fn set_hooks(&self, hooks: Rc<dyn Hooks>) -> Rc<dyn Hooks> {
        self.inner.hooks.replace(hooks)
    }

    // === Wrapping ===

    /// Current wrapping dispatcher
    pub fn wrap_any(&self) -> WrapFn {
        self.inner.wrap_any.borrow().clone()
    }

    /// Replace the wrapping dispatcher, returning the previous one
    pub fn set_wrap_any(&self, wrap: WrapFn) -> WrapFn {
        self.inner.wrap_any.replace(wrap)
    }

    /// Shapes currently recognized by the dispatcher
    pub fn installed_shapes(&self) -> ShapeSet {
        self.inner.installed.get()
    }

    pub(crate) fn mark_installed(&self, kind: ShapeKind) -> bool {
        let mut shapes = self.inner.installed.get();
        if shapes.contains(kind) {
            return false;
        }
        match kind {
            ShapeKind::Object => return false,
            ShapeKind::Sequence => shapes.sequences = true,
            ShapeKind::Mapping => shapes.mappings = true,
            ShapeKind::Set => shapes.sets = true,
        }
        self.inner.installed.set(shapes);
        true
    }

    /// Wrap a value
    ///
    /// Scalars and handles pass through unchanged. A raw node is wrapped
    /// recursively; wrapping the same raw node again yields the same handle,
    /// and aliasing and cycles in the raw graph are preserved. The wrapped
    /// hook fires once for a newly wrapped root.
    pub fn wrap(&self, value: impl Into<Value>) -> Result<Value> {
        let node = match value.into() {
            Value::Raw(node) => node,
            other => return self.check_member(other),
        };
        if let Some(handle) = self.lookup(&node) {
            return Ok(Value::Ref(handle));
        }
        let wrap = self.wrap_any();
        let handle = wrap(self, &node)?;
        self.hooks().on_wrapped(&node, handle);
        Ok(Value::Ref(handle))
    }

    /// Handle of the target already wrapping `node`, if any
    pub fn lookup(&self, node: &RawNode) -> Option<Handle> {
        self.inner.registry.borrow_mut().get(node)
    }

    /// Wrap a value stored into a container
    pub(crate) fn wrap_member(&self, value: Value) -> Result<Value> {
        match value {
            Value::Raw(node) => {
                if let Some(handle) = self.lookup(&node) {
                    return Ok(Value::Ref(handle));
                }
                let wrap = self.wrap_any();
                Ok(Value::Ref(wrap(self, &node)?))
            }
            other => self.check_member(other),
        }
    }

    /// Translate a lookup key without wrapping anything new
    pub(crate) fn resolve_key(&self, key: &Value) -> Value {
        match key {
            Value::Raw(node) => self.lookup(node).map_or_else(|| key.clone(), Value::Ref),
            other => other.clone(),
        }
    }

    fn check_member(&self, value: Value) -> Result<Value> {
        match value {
            Value::Ref(handle) if handle.space() != self.space() => {
                Err(Error::UnknownTarget(handle))
            }
            other => Ok(other),
        }
    }

    /// Create and register a target for `node`, then fill it
    ///
    /// The node is registered before its members are wrapped, so cycles
    /// resolve to the target under construction. If filling fails, every
    /// registration made since this call is withdrawn; the arena slots stay
    /// allocated but nothing refers to them.
    pub(crate) fn adopt<S: Shape>(
        &self,
        node: &RawNode,
        convert: impl FnOnce(&Stm, RawBody) -> Result<S::Body>,
    ) -> Result<Handle> {
        if let Some(handle) = self.lookup(node) {
            return Ok(handle);
        }
        let target = self
            .inner
            .heap
            .borrow_mut()
            .allocate::<S>(S::Body::default(), current_generation())?;
        let handle = target.handle();
        self.inner.registry.borrow_mut().register(node, handle);
        let mark = {
            let mut adopting = self.inner.adopting.borrow_mut();
            adopting.push(node.clone());
            adopting.len() - 1
        };

        let raw = node.borrow().clone();
        match convert(self, raw) {
            Ok(body) => {
                *target.state().borrow_mut() = body;
                target.set_generation(current_generation());
                if mark == 0 {
                    self.inner.adopting.borrow_mut().clear();
                }
                trace!(handle = %handle, "target wrapped");
                Ok(handle)
            }
            Err(e) => {
                let withdrawn: Vec<RawNode> =
                    self.inner.adopting.borrow_mut().drain(mark..).collect();
                let mut registry = self.inner.registry.borrow_mut();
                for node in &withdrawn {
                    registry.forget(node);
                }
                trace!(handle = %handle, withdrawn = withdrawn.len(), "wrap failed");
                Err(e)
            }
        }
    }

    pub(crate) fn resolve<S: Shape>(&self, handle: Handle) -> Result<Rc<Target<S::Body>>> {
        self.inner.heap.borrow().resolve::<S>(handle)
    }

    /// Generation of the last committed change to a target
    pub fn generation_of(&self, handle: Handle) -> Result<Generation> {
        self.inner.heap.borrow().entry(handle).map(|entry| entry.generation())
    }

    // === Views ===

    /// Object view of a handle
    pub fn object(&self, handle: Handle) -> Result<ObjectRef> {
        Ok(ObjectRef::new(self.clone(), self.resolve::<ObjectShape>(handle)?))
    }

    /// Sequence view of a handle
    pub fn sequence(&self, handle: Handle) -> Result<SequenceRef> {
        Ok(SequenceRef::new(self.clone(), self.resolve::<SequenceShape>(handle)?))
    }

    /// Mapping view of a handle
    pub fn mapping(&self, handle: Handle) -> Result<MappingRef> {
        Ok(MappingRef::new(self.clone(), self.resolve::<MappingShape>(handle)?))
    }

    /// Set view of a handle
    pub fn set(&self, handle: Handle) -> Result<SetRef> {
        Ok(SetRef::new(self.clone(), self.resolve::<SetShape>(handle)?))
    }

    /// View of whatever shape a handle names
    pub fn view(&self, handle: Handle) -> Result<Wrapped> {
        Ok(match handle.kind() {
            ShapeKind::Object => Wrapped::Object(self.object(handle)?),
            ShapeKind::Sequence => Wrapped::Sequence(self.sequence(handle)?),
            ShapeKind::Mapping => Wrapped::Mapping(self.mapping(handle)?),
            ShapeKind::Set => Wrapped::Set(self.set(handle)?),
        })
    }

    /// View of a wrapped value
    pub fn view_value(&self, value: &Value) -> Result<Wrapped> {
        match value {
            Value::Ref(handle) => self.view(*handle),
            other => Err(Error::invalid_usage(format!(
                "expected a wrapped container, found {}",
                other.type_name()
            ))),
        }
    }

    /// Wrap a raw node and return its object view
    pub fn wrap_object(&self, node: RawNode) -> Result<ObjectRef> {
        self.object(self.wrap_handle(node)?)
    }

    /// Wrap a raw node and return its sequence view
    pub fn wrap_sequence(&self, node: RawNode) -> Result<SequenceRef> {
        self.sequence(self.wrap_handle(node)?)
    }

    /// Wrap a raw node and return its mapping view
    pub fn wrap_mapping(&self, node: RawNode) -> Result<MappingRef> {
        self.mapping(self.wrap_handle(node)?)
    }

    /// Wrap a raw node and return its set view
    pub fn wrap_set(&self, node: RawNode) -> Result<SetRef> {
        self.set(self.wrap_handle(node)?)
    }

    fn wrap_handle(&self, node: RawNode) -> Result<Handle> {
        self.wrap(node)?
            .as_handle()
            .ok_or_else(|| Error::invalid_usage("raw node did not wrap into a container"))
    }

    // === Transactions ===

    /// Create a transaction, nested under the current one if there is one
    pub fn transaction(&self) -> Transaction {
        Transaction::begin(self, self.current_transaction())
    }

    /// Run `f` in a fresh transaction and commit it if `f` succeeds
    ///
    /// The transaction is disposed on every path, including errors and
    /// panics. A conflict is returned to the caller; nothing is retried.
    pub fn in_transaction<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let tx = DisposeOnDrop(self.transaction());
        let value = tx.0.call(f)??;
        tx.0.commit()?;
        Ok(value)
    }

    /// Transaction currently in scope
    pub fn current_transaction(&self) -> Option<Transaction> {
        self.inner.current.borrow().clone()
    }

    pub(crate) fn replace_current(&self, tx: Option<Transaction>) -> Option<Transaction> {
        self.inner.current.replace(tx)
    }

    /// Generations of transactions created and not yet disposed
    pub fn live_transactions(&self) -> Vec<Generation> {
        let mut live: Vec<_> = self.inner.live.borrow().iter().copied().collect();
        live.sort();
        live
    }

    pub(crate) fn track(&self, generation: Generation) {
        if self.inner.config.track_live_transactions {
            self.inner.live.borrow_mut().insert(generation);
        }
    }

    pub(crate) fn untrack(&self, generation: Generation) {
        self.inner.live.borrow_mut().remove(&generation);
    }

    // === Staged access ===

    /// Read a target through the current transaction, or directly
    pub(crate) fn read<S: Shape, R>(
        &self,
        target: &Rc<Target<S::Body>>,
        f: impl FnOnce(&S::Body) -> R,
    ) -> Result<R> {
        let staged = match self.current_transaction() {
            Some(tx) => tx.stage_read::<S>(target)?,
            None => target.state().clone(),
        };
        let body = staged.borrow();
        Ok(f(&body))
    }

    /// Mutate a target through the current transaction, or directly
    ///
    /// A direct mutation reports `change` to the hooks first, applies `f`
    /// to the live contents, then advances the target's generation once.
    pub(crate) fn write<S: Shape, R>(
        &self,
        target: &Rc<Target<S::Body>>,
        change: impl Fn() -> Change,
        f: impl FnOnce(&mut S::Body) -> R,
    ) -> Result<R> {
        match self.current_transaction() {
            Some(tx) => {
                let staged = tx.stage_write::<S>(target)?;
                let mut body = staged.borrow_mut();
                Ok(f(&mut body))
            }
            None => {
                self.hooks().on_direct_change(target.handle(), &change)?;
                let result = {
                    let mut body = target.state().borrow_mut();
                    f(&mut body)
                };
                target.set_generation(next_generation());
                Ok(result)
            }
        }
    }
}

impl Default for Stm {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Stm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stm")
            .field("space", &self.inner.space)
            .field("targets", &self.target_count())
            .field("installed", &self.installed_shapes())
            .finish()
    }
}

struct DisposeOnDrop(Transaction);

impl Drop for DisposeOnDrop {
    fn drop(&mut self) {
        self.0.dispose();
    }
}
