//! Targets and the arena that owns them
//!
//! A target is the live state behind a wrapper: its contents plus the
//! generation of its last committed change. Targets live in an arena owned
//! by the runtime and are addressed by `Handle`; they are never freed while
//! the runtime exists, so a handle stays valid for the runtime's lifetime.
//!
//! Contents are held in a `Staged` cell. The same cell type backs a target's
//! live state and a buffer's private copy, which lets a buffer alias the live
//! state until its first write.

use crate::buffer::Shape;
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::rc::Rc;
use tessera_core::{
    Attributes, Elements, Entries, Error, Generation, Handle, Members, Result, SpaceId,
    TargetId,
};

/// Contents plus a revision counter bumped on every staged write
pub(crate) struct Staged<B> {
    body: RefCell<B>,
    revision: Cell<u64>,
}

impl<B> Staged<B> {
    pub(crate) fn new(body: B) -> Rc<Self> {
        Rc::new(Staged {
            body: RefCell::new(body),
            revision: Cell::new(0),
        })
    }

    pub(crate) fn borrow(&self) -> Ref<'_, B> {
        self.body.borrow()
    }

    pub(crate) fn borrow_mut(&self) -> RefMut<'_, B> {
        self.body.borrow_mut()
    }

    pub(crate) fn revision(&self) -> u64 {
        self.revision.get()
    }

    pub(crate) fn bump(&self) {
        self.revision.set(self.revision.get() + 1);
    }
}

/// Live state of one wrapped container
pub(crate) struct Target<B> {
    handle: Handle,
    generation: Cell<Generation>,
    state: Rc<Staged<B>>,
}

impl<B> Target<B> {
    fn new(handle: Handle, body: B, generation: Generation) -> Rc<Self> {
        Rc::new(Target {
            handle,
            generation: Cell::new(generation),
            state: Staged::new(body),
        })
    }

    pub(crate) fn handle(&self) -> Handle {
        self.handle
    }

    /// Generation of the last committed change
    pub(crate) fn generation(&self) -> Generation {
        self.generation.get()
    }

    pub(crate) fn set_generation(&self, generation: Generation) {
        self.generation.set(generation);
    }

    pub(crate) fn state(&self) -> &Rc<Staged<B>> {
        &self.state
    }
}

/// One arena slot
pub(crate) enum Entry {
    Object(Rc<Target<Attributes>>),
    Sequence(Rc<Target<Elements>>),
    Mapping(Rc<Target<Entries>>),
    Set(Rc<Target<Members>>),
}

impl Entry {
    pub(crate) fn handle(&self) -> Handle {
        match self {
            Entry::Object(t) => t.handle(),
            Entry::Sequence(t) => t.handle(),
            Entry::Mapping(t) => t.handle(),
            Entry::Set(t) => t.handle(),
        }
    }

    pub(crate) fn generation(&self) -> Generation {
        match self {
            Entry::Object(t) => t.generation(),
            Entry::Sequence(t) => t.generation(),
            Entry::Mapping(t) => t.generation(),
            Entry::Set(t) => t.generation(),
        }
    }
}

/// Arena of every target created by one runtime
pub(crate) struct Heap {
    space: SpaceId,
    entries: Vec<Entry>,
}

impl Heap {
    pub(crate) fn new(space: SpaceId) -> Self {
        Heap {
            space,
            entries: Vec::new(),
        }
    }

    /// Allocate a target with the given contents
    pub(crate) fn allocate<S: Shape>(
        &mut self,
        body: S::Body,
        generation: Generation,
    ) -> Result<Rc<Target<S::Body>>> {
        let index = u32::try_from(self.entries.len())
            .map_err(|_| Error::invalid_usage("target arena exhausted"))?;
        let handle = Handle::new(self.space, TargetId::new(index), S::KIND);
        let target = Target::new(handle, body, generation);
        self.entries.push(S::into_entry(target.clone()));
        Ok(target)
    }

    /// Resolve any handle minted by this arena
    pub(crate) fn entry(&self, handle: Handle) -> Result<&Entry> {
        if handle.space() != self.space {
            return Err(Error::UnknownTarget(handle));
        }
        self.entries
            .get(handle.id().index())
            .filter(|entry| entry.handle() == handle)
            .ok_or(Error::UnknownTarget(handle))
    }

    /// Resolve a handle to a target of shape `S`
    pub(crate) fn resolve<S: Shape>(&self, handle: Handle) -> Result<Rc<Target<S::Body>>> {
        if handle.kind() != S::KIND {
            return Err(Error::invalid_usage(format!(
                "{} is not a {}",
                handle,
                S::KIND
            )));
        }
        let entry = self.entry(handle)?;
        S::target(entry)
            .cloned()
            .ok_or(Error::UnknownTarget(handle))
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
