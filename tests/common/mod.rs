//! Shared test utilities for the integration suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's main.rs.

#![allow(dead_code)]

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;
use std::sync::Once;
pub use tessera::{
    Change, Error, Handle, Hooks, PostCommit, RawNode, Result, Stm, Transaction, Value,
};

// ============================================================================
// Initialization
// ============================================================================

static INIT_TRACING: Once = Once::new();

/// Route `tracing` output to the test harness; filter with `RUST_LOG`
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// Scenario runner
// ============================================================================

/// The three ways an operation can be applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// No transaction: applied immediately
    Direct,
    /// Inside a transaction that commits
    Committed,
    /// Inside a transaction that fails and is rolled back
    Aborted,
}

impl Scenario {
    pub const ALL: [Scenario; 3] = [Scenario::Direct, Scenario::Committed, Scenario::Aborted];

    /// Apply `apply` under this scenario and check what `observe` reports
    ///
    /// Inside a transaction the effect must be visible immediately. After a
    /// commit (or a direct call) it must be visible outside; after an abort
    /// the state must be exactly what it was before.
    pub fn run<T, A>(self, stm: &Stm, observe: impl Fn() -> T, apply: A, expected: T)
    where
        T: PartialEq + Debug,
        A: FnOnce() -> Result<()>,
    {
        let before = observe();
        match self {
            Scenario::Direct => {
                apply().unwrap();
                assert_eq!(observe(), expected, "direct");
            }
            Scenario::Committed => {
                stm.in_transaction(|| {
                    apply()?;
                    assert_eq!(observe(), expected, "inside committed transaction");
                    Ok(())
                })
                .unwrap();
                assert_eq!(observe(), expected, "after commit");
            }
            Scenario::Aborted => {
                let result: Result<()> = stm.in_transaction(|| {
                    apply()?;
                    assert_eq!(observe(), expected, "inside aborted transaction");
                    Err(Error::invalid_usage("abort"))
                });
                assert!(result.is_err());
                assert_eq!(observe(), before, "after abort");
            }
        }
    }
}

/// Run `f` with `tx` current, flattening the two error layers
pub fn within<T>(tx: &Transaction, f: impl FnOnce() -> Result<T>) -> Result<T> {
    tx.call(f)?
}

// ============================================================================
// Recording hooks
// ============================================================================

/// Hooks that record every event as a short string, then delegate
pub struct Recorder {
    pub events: Rc<RefCell<Vec<String>>>,
    pub commits: Rc<RefCell<Vec<Vec<Change>>>>,
    previous: Rc<dyn Hooks>,
}

impl Recorder {
    /// Install a recorder on `stm`, returning its shared logs
    pub fn install(stm: &Stm) -> (Rc<RefCell<Vec<String>>>, Rc<RefCell<Vec<Vec<Change>>>>) {
        let events = Rc::new(RefCell::new(Vec::new()));
        let commits = Rc::new(RefCell::new(Vec::new()));
        let recorder = Recorder {
            events: events.clone(),
            commits: commits.clone(),
            previous: stm.hooks(),
        };
        stm.set_hooks(Rc::new(recorder));
        (events, commits)
    }

    fn log(&self, event: String) {
        self.events.borrow_mut().push(event);
    }
}

impl Hooks for Recorder {
    fn on_wrapped(&self, original: &RawNode, wrapper: Handle) {
        self.log(format!("wrapped {}", wrapper));
        self.previous.on_wrapped(original, wrapper);
    }

    fn on_transaction_created(&self, tx: &Transaction) {
        self.log(format!("created nested={}", tx.is_nested()));
        self.previous.on_transaction_created(tx);
    }

    fn on_commit(
        &self,
        tx: &Transaction,
        changes: &mut dyn Iterator<Item = Change>,
        nested: bool,
    ) -> Result<Option<PostCommit>> {
        let changes: Vec<Change> = changes.collect();
        self.log(format!("commit nested={} changes={}", nested, changes.len()));
        self.commits.borrow_mut().push(changes);
        self.previous.on_commit(tx, &mut std::iter::empty::<Change>(), nested)
    }

    fn on_direct_change(&self, target: Handle, change: &dyn Fn() -> Change) -> Result<()> {
        self.log(format!("direct {} {}", target, change().tag()));
        self.previous.on_direct_change(target, change)
    }

    fn on_dispose(&self, tx: &Transaction, had_touched_buffers: bool) {
        self.log(format!("dispose touched={}", had_touched_buffers));
        self.previous.on_dispose(tx, had_touched_buffers);
    }
}

/// Integers as values
pub fn ints(values: &[i64]) -> Vec<Value> {
    values.iter().map(|v| Value::Int(*v)).collect()
}
