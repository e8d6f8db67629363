//! Lifecycle hooks
//!
//! A runtime holds exactly one active [`Hooks`] value. Installing a new one
//! with [`Stm::set_hooks`] returns the previous value, so hooks compose by
//! chaining: the new hook keeps the old one and delegates to it.
//!
//! Every method has a no-op default. Hooks run synchronously on the calling
//! thread; an error returned from a fallible hook propagates to the caller
//! of the operation that triggered it.

use crate::stm::Stm;
use crate::transaction::Transaction;
use std::rc::Rc;
use tessera_core::{Change, Handle, RawNode, Result};
use tracing::{debug, enabled, trace, Level};

/// Callback run after a commit completes, even if applying it failed
pub type PostCommit = Box<dyn FnOnce()>;

/// Callback run when a transaction stops being current
pub type OnLeave = Box<dyn FnOnce()>;

/// Observer of runtime lifecycle events
pub trait Hooks {
    /// A raw value finished recursive wrapping
    fn on_wrapped(&self, _original: &RawNode, _wrapper: Handle) {}

    /// A transaction was created
    fn on_transaction_created(&self, _tx: &Transaction) {}

    /// A transaction passed validation and is about to apply its buffers
    ///
    /// `changes` is lazy: nothing is diffed unless the hook iterates it.
    /// The returned callback, if any, runs once the commit has finished.
    fn on_commit(
        &self,
        _tx: &Transaction,
        _changes: &mut dyn Iterator<Item = Change>,
        _nested: bool,
    ) -> Result<Option<PostCommit>> {
        Ok(None)
    }

    /// A mutation is about to be applied outside any transaction
    ///
    /// `change` describes the mutation and is only evaluated on demand.
    /// Returning an error cancels the mutation.
    fn on_direct_change(&self, _target: Handle, _change: &dyn Fn() -> Change) -> Result<()> {
        Ok(())
    }

    /// A transaction was disposed
    fn on_dispose(&self, _tx: &Transaction, _had_touched_buffers: bool) {}

    /// A transaction became current; the returned callback runs when it stops being current
    fn on_enter(&self, _tx: &Transaction) -> Option<OnLeave> {
        None
    }
}

/// Hooks that do nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl Hooks for NoHooks {}

/// Hooks that log every event and delegate to the previously installed hooks
pub struct TracingHooks {
    previous: Rc<dyn Hooks>,
}

impl TracingHooks {
    /// Chain logging hooks in front of whatever `stm` currently has installed
    pub fn install(stm: &Stm) {
        let previous = stm.hooks();
        stm.set_hooks(Rc::new(TracingHooks { previous }));
    }
}

impl Hooks for TracingHooks {
    fn on_wrapped(&self, original: &RawNode, wrapper: Handle) {
        trace!(handle = %wrapper, raw = ?original, "wrapped");
        self.previous.on_wrapped(original, wrapper);
    }

    fn on_transaction_created(&self, tx: &Transaction) {
        trace!(tx = %tx.generation(), nested = tx.is_nested(), "transaction created");
        self.previous.on_transaction_created(tx);
    }

    fn on_commit(
        &self,
        tx: &Transaction,
        changes: &mut dyn Iterator<Item = Change>,
        nested: bool,
    ) -> Result<Option<PostCommit>> {
        let tx_generation = tx.generation();
        let mut logged = changes.inspect(|change| {
            debug!(
                tx = %tx_generation,
                handle = %change.target,
                change = change.tag(),
                nested,
                "commit change"
            );
        });
        self.previous.on_commit(tx, &mut logged, nested)
    }

    fn on_direct_change(&self, target: Handle, change: &dyn Fn() -> Change) -> Result<()> {
        if enabled!(Level::DEBUG) {
            debug!(handle = %target, change = change().tag(), "direct change");
        }
        self.previous.on_direct_change(target, change)
    }

    fn on_dispose(&self, tx: &Transaction, had_touched_buffers: bool) {
        trace!(tx = %tx.generation(), had_touched_buffers, "transaction disposed");
        self.previous.on_dispose(tx, had_touched_buffers);
    }

    fn on_enter(&self, tx: &Transaction) -> Option<OnLeave> {
        trace!(tx = %tx.generation(), "transaction entered");
        self.previous.on_enter(tx)
    }
}
