//! Identity registry from raw nodes to the targets wrapping them
//!
//! Entries are keyed by allocation address and hold only a weak reference
//! to the raw node, so the registry never keeps a caller's graph alive.
//! An address whose node has died (and may since have been reused) is
//! treated as absent.

use rustc_hash::FxHashMap;
use tessera_core::{Handle, RawNode, WeakRawNode};

const MIN_PRUNE_AT: usize = 64;

pub(crate) struct IdentityRegistry {
    entries: FxHashMap<usize, (WeakRawNode, Handle)>,
    prune_at: usize,
}

impl IdentityRegistry {
    pub(crate) fn new() -> Self {
        IdentityRegistry {
            entries: FxHashMap::default(),
            prune_at: MIN_PRUNE_AT,
        }
    }

    /// Handle of the target wrapping `node`, if any
    pub(crate) fn get(&mut self, node: &RawNode) -> Option<Handle> {
        let addr = node.addr();
        let hit = self
            .entries
            .get(&addr)
            .map(|(weak, handle)| (weak.is(node), *handle));
        match hit {
            Some((true, handle)) => Some(handle),
            Some((false, _)) => {
                self.entries.remove(&addr);
                None
            }
            None => None,
        }
    }

    pub(crate) fn register(&mut self, node: &RawNode, handle: Handle) {
        if self.entries.len() >= self.prune_at {
            self.prune();
        }
        self.entries.insert(node.addr(), (node.downgrade(), handle));
    }

    pub(crate) fn forget(&mut self, node: &RawNode) {
        if self.get(node).is_some() {
            self.entries.remove(&node.addr());
        }
    }

    fn prune(&mut self) {
        self.entries.retain(|_, (weak, _)| weak.upgrade().is_some());
        self.prune_at = (self.entries.len() * 2).max(MIN_PRUNE_AT);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
