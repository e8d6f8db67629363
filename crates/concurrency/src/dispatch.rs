//! Wrapping dispatcher
//!
//! Wrapping a raw node goes through a single replaceable function. The base
//! function recognizes plain objects; each further shape installs itself by
//! wrapping the previous function, handling its own shape and delegating
//! everything else. Anything no installed shape recognizes is rejected.

use crate::stm::Stm;
use std::rc::Rc;
use tessera_core::{Error, Handle, RawNode, Result, ShapeKind};
use tracing::debug;

/// Function that wraps a raw node into a target and returns its handle
pub type WrapFn = Rc<dyn Fn(&Stm, &RawNode) -> Result<Handle>>;

/// Dispatcher that only recognizes objects
pub(crate) fn base() -> WrapFn {
    Rc::new(|stm: &Stm, node: &RawNode| match node.kind() {
        ShapeKind::Object => crate::object::adopt(stm, node),
        other => Err(Error::invalid_usage(format!(
            "cannot wrap a raw {}: shape not installed",
            other
        ))),
    })
}

/// Chain `wrap` in front of the current dispatcher for raw nodes of `kind`
///
/// Returns false if `kind` was already installed.
pub(crate) fn extend(stm: &Stm, kind: ShapeKind, wrap: fn(&Stm, &RawNode) -> Result<Handle>) -> bool {
    if !stm.mark_installed(kind) {
        return false;
    }
    let previous = stm.wrap_any();
    stm.set_wrap_any(Rc::new(move |stm: &Stm, node: &RawNode| {
        if node.kind() == kind {
            wrap(stm, node)
        } else {
            previous(stm, node)
        }
    }));
    debug!(space = stm.space().as_u32(), shape = %kind, "shape installed");
    true
}
