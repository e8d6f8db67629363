//! Transactions
//!
//! A transaction owns one buffer per target it has touched. While a
//! transaction is current, every wrapper read and write goes through its
//! buffers; nothing is visible outside until commit.
//!
//! ## Commit Sequence
//!
//! ```text
//! 1. Active -> Validating
//! 2. Validate every buffer (root: against live generations,
//!    nested: against the parent's buffers)
//! 3. IF conflicts: back to Active, return Conflict
//! 4. Call the commit hook with the lazy change stream
//! 5. Apply buffers to live targets (root) or merge into the parent (nested)
//! 6. Clear the buffer table, Validating -> Committed
//! 7. Run the post-commit callback returned by the hook
//! ```
//!
//! A transaction is reusable after a conflict: the caller may dispose it or
//! keep working in it. `dispose` is always required, committed or not.

use crate::buffer::{with_buffer, AnyBuffer, Buffer, BufferOps, Shape};
use crate::hooks::{OnLeave, PostCommit};
use crate::stm::Stm;
use crate::target::{Staged, Target};
use crate::validation::{ConflictType, ValidationResult};
use indexmap::IndexMap;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use tessera_core::{next_generation, Error, FxBuildHasher, Generation, Result, TargetId};
use tracing::{debug, error, warn};

type BufferTable = IndexMap<TargetId, AnyBuffer, FxBuildHasher>;

/// Status of a transaction in its lifecycle
///
/// State transitions:
/// - `Active` → `Validating` (begin commit)
/// - `Validating` → `Active` (conflict detected, hook failed)
/// - `Validating` → `Committed` (buffers applied)
/// - any → `Disposed`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Transaction accepts reads and writes
    Active,
    /// Transaction is being validated and applied
    Validating,
    /// Transaction committed; it must still be disposed
    Committed,
    /// Transaction released its buffers
    Disposed,
}

/// Handle to a transaction
///
/// Cloning yields another handle to the same transaction.
#[derive(Clone)]
pub struct Transaction {
    inner: Rc<TxInner>,
}

struct TxInner {
    generation: Generation,
    parent: Option<Transaction>,
    stm: Stm,
    buffers: RefCell<BufferTable>,
    status: Cell<TransactionStatus>,
}

impl Transaction {
    pub(crate) fn begin(stm: &Stm, parent: Option<Transaction>) -> Transaction {
        let generation = next_generation();
        let tx = Transaction {
            inner: Rc::new(TxInner {
                generation,
                parent,
                stm: stm.clone(),
                buffers: RefCell::new(BufferTable::default()),
                status: Cell::new(TransactionStatus::Active),
            }),
        };
        stm.track(generation);
        debug!(tx = %generation, nested = tx.is_nested(), "transaction created");
        stm.hooks().on_transaction_created(&tx);
        tx
    }

    /// Generation drawn when the transaction was created; unique per transaction
    pub fn generation(&self) -> Generation {
        self.inner.generation
    }

    /// Numeric identifier; the raw value of the creation generation
    pub fn id(&self) -> u64 {
        self.inner.generation.as_u64()
    }

    /// Enclosing transaction, for nested transactions
    pub fn parent(&self) -> Option<&Transaction> {
        self.inner.parent.as_ref()
    }

    /// True when created while another transaction was current
    pub fn is_nested(&self) -> bool {
        self.inner.parent.is_some()
    }

    /// Runtime this transaction belongs to
    pub fn runtime(&self) -> &Stm {
        &self.inner.stm
    }

    /// Current lifecycle status
    pub fn status(&self) -> TransactionStatus {
        self.inner.status.get()
    }

    /// True while reads and writes are accepted
    pub fn is_active(&self) -> bool {
        self.status() == TransactionStatus::Active
    }

    /// Whether any buffer has been read or written
    pub fn has_touched_buffers(&self) -> bool {
        self.inner.buffers.borrow().values().any(|b| b.is_touched())
    }

    /// Number of buffers currently held
    pub fn buffer_count(&self) -> usize {
        self.inner.buffers.borrow().len()
    }

    /// Whether two handles name the same transaction
    pub fn ptr_eq(&self, other: &Transaction) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn ensure_active(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(Error::invalid_usage(format!(
                "transaction {} is not active: {:?}",
                self.generation(),
                self.status()
            )))
        }
    }

    // === Scoping ===

    /// Make this transaction current until the guard is dropped
    ///
    /// Guards nest: dropping one restores whatever was current before it.
    pub fn enter(&self) -> Result<EnterGuard> {
        if self.status() == TransactionStatus::Disposed {
            return Err(Error::invalid_usage(format!(
                "cannot enter disposed transaction {}",
                self.generation()
            )));
        }
        let stm = self.runtime().clone();
        let on_leave = stm.hooks().on_enter(self);
        let previous = stm.replace_current(Some(self.clone()));
        Ok(EnterGuard {
            stm,
            previous,
            on_leave,
        })
    }

    /// Run `f` with this transaction current
    pub fn call<T>(&self, f: impl FnOnce() -> T) -> Result<T> {
        let _guard = self.enter()?;
        Ok(f())
    }

    // === Buffer access ===

    pub(crate) fn stage_read<S: Shape>(
        &self,
        target: &Rc<Target<S::Body>>,
    ) -> Result<Rc<Staged<S::Body>>> {
        self.ensure_active()?;
        let mut buffers = self.inner.buffers.borrow_mut();
        let buffer = self.buffer_entry::<S>(&mut buffers, target)?;
        Ok(buffer.read())
    }

    pub(crate) fn stage_write<S: Shape>(
        &self,
        target: &Rc<Target<S::Body>>,
    ) -> Result<Rc<Staged<S::Body>>> {
        self.ensure_active()?;
        let mut buffers = self.inner.buffers.borrow_mut();
        let buffer = self.buffer_entry::<S>(&mut buffers, target)?;
        Ok(buffer.write())
    }

    /// Existing buffer for `target`, or a new one seeded from the nearest ancestor
    fn buffer_entry<'b, S: Shape>(
        &self,
        buffers: &'b mut BufferTable,
        target: &Rc<Target<S::Body>>,
    ) -> Result<&'b mut Buffer<S>> {
        let handle = target.handle();
        let any = buffers.entry(handle.id()).or_insert_with(|| {
            let seed = self
                .inner
                .parent
                .as_ref()
                .and_then(|parent| parent.visible_state::<S>(handle.id()));
            S::into_any(Buffer::new(target.clone(), seed))
        });
        S::buffer_mut(any)
            .ok_or_else(|| Error::invalid_usage(format!("{} staged with another shape", handle)))
    }

    fn visible_state<S: Shape>(&self, id: TargetId) -> Option<Rc<Staged<S::Body>>> {
        let own = self
            .inner
            .buffers
            .borrow()
            .get(&id)
            .and_then(S::buffer)
            .map(|buffer| buffer.staged().clone());
        own.or_else(|| {
            self.inner
                .parent
                .as_ref()
                .and_then(|parent| parent.visible_state::<S>(id))
        })
    }

    /// Validate a child buffer for a target this transaction never staged
    fn check_unbuffered_child<S: Shape>(
        &self,
        child: &Buffer<S>,
    ) -> std::result::Result<(), ConflictType> {
        let exposed = self.visible_state::<S>(child.target().handle().id());
        child.check_exposed(exposed.as_ref())
    }

    fn merge_child<S: Shape>(&self, child: &Buffer<S>) -> Result<()> {
        let mut buffers = self.inner.buffers.borrow_mut();
        let parent = self.buffer_entry::<S>(&mut buffers, child.target())?;
        child.merge_into(parent);
        Ok(())
    }

    // === Commit Operation ===

    /// Check every buffer without committing
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::ok();
        let buffers = self.inner.buffers.borrow();
        match self.parent() {
            None => {
                for buffer in buffers.values() {
                    if let Err(conflict) = buffer.check_committable() {
                        result.push(conflict);
                    }
                }
            }
            Some(parent) => {
                let parent_buffers = parent.inner.buffers.borrow();
                for (id, buffer) in buffers.iter() {
                    let checked = match parent_buffers.get(id) {
                        Some(own) => buffer.check_mergeable_into(own),
                        None => with_buffer!(buffer, b => parent.check_unbuffered_child(b)),
                    };
                    if let Err(conflict) = checked {
                        result.push(conflict);
                    }
                }
            }
        }
        result
    }

    /// Commit the transaction
    ///
    /// A root transaction applies its buffers to the live targets; a nested
    /// one merges them into its parent, where they stay invisible until the
    /// parent commits.
    ///
    /// # Errors
    /// - `Conflict` if validation fails; the transaction is left unchanged
    ///   and still `Active`
    /// - `InvalidUsage` if the transaction (or its parent) is not active
    /// - any error returned by the commit hook; nothing is applied
    pub fn commit(&self) -> Result<()> {
        self.ensure_active()?;
        if let Some(parent) = self.parent() {
            if !parent.is_active() {
                return Err(Error::invalid_usage(format!(
                    "cannot merge into transaction {}: {:?}",
                    parent.generation(),
                    parent.status()
                )));
            }
        }
        self.inner.status.set(TransactionStatus::Validating);

        let validation = self.validate();
        if let Some(first) = validation.conflicts.first() {
            warn!(
                tx = %self.generation(),
                conflicts = validation.conflict_count(),
                first = %first,
                "commit rejected"
            );
            self.inner.status.set(TransactionStatus::Active);
            return validation.into_result();
        }

        let nested = self.is_nested();
        let snapshot: Vec<AnyBuffer> = self.inner.buffers.borrow().values().cloned().collect();
        let post_commit = {
            let mut changes = snapshot.iter().flat_map(|buffer| buffer.changes());
            match self.runtime().hooks().on_commit(self, &mut changes, nested) {
                Ok(post_commit) => post_commit,
                Err(e) => {
                    self.inner.status.set(TransactionStatus::Active);
                    return Err(e);
                }
            }
        };
        let _post_commit = PostCommitGuard(post_commit);

        let buffers = std::mem::take(&mut *self.inner.buffers.borrow_mut());
        match self.parent() {
            None => {
                for buffer in buffers.values() {
                    buffer.commit(self.generation());
                }
            }
            Some(parent) => {
                for buffer in buffers.values() {
                    with_buffer!(buffer, b => parent.merge_child(b))?;
                }
            }
        }

        self.inner.status.set(TransactionStatus::Committed);
        debug!(
            tx = %self.generation(),
            nested,
            buffers = buffers.len(),
            "transaction committed"
        );
        Ok(())
    }

    /// Release all buffers
    ///
    /// Required after every transaction, committed or not. Idempotent.
    pub fn dispose(&self) {
        if self.status() == TransactionStatus::Disposed {
            return;
        }
        let had_touched_buffers = self.has_touched_buffers();
        self.inner.status.set(TransactionStatus::Disposed);
        self.inner.buffers.borrow_mut().clear();
        self.runtime().untrack(self.generation());
        debug!(tx = %self.generation(), had_touched_buffers, "transaction disposed");
        self.runtime()
            .hooks()
            .on_dispose(self, had_touched_buffers);
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("generation", &self.generation())
            .field("status", &self.status())
            .field("nested", &self.is_nested())
            .field("buffers", &self.buffer_count())
            .finish()
    }
}

impl Drop for TxInner {
    fn drop(&mut self) {
        let status = self.status.get();
        if status == TransactionStatus::Disposed {
            return;
        }
        self.stm.untrack(self.generation);
        if self.stm.config().leak_diagnostics
            && self.buffers.get_mut().values().any(|b| b.is_touched())
        {
            error!(
                tx = %self.generation,
                status = ?status,
                "transaction dropped without dispose; staged changes discarded"
            );
        }
    }
}

struct PostCommitGuard(Option<PostCommit>);

impl Drop for PostCommitGuard {
    fn drop(&mut self) {
        if let Some(post_commit) = self.0.take() {
            post_commit();
        }
    }
}

/// Keeps a transaction current; restores the previous one on drop
#[must_use = "the transaction is only current while the guard is alive"]
pub struct EnterGuard {
    stm: Stm,
    previous: Option<Transaction>,
    on_leave: Option<OnLeave>,
}

impl Drop for EnterGuard {
    fn drop(&mut self) {
        self.stm.replace_current(self.previous.take());
        if let Some(on_leave) = self.on_leave.take() {
            on_leave();
        }
    }
}

impl fmt::Debug for EnterGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnterGuard")
            .field("previous", &self.previous)
            .finish()
    }
}
