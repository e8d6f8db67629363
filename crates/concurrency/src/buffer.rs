//! Per-transaction, per-target buffers
//!
//! A buffer is a transaction's private view of one target:
//! - `seed` is the state the buffer was created against (the parent
//!   transaction's buffer, or the target's live state)
//! - `staged` is what reads and writes go through; it aliases `seed`
//!   until the first write copies it
//! - `touched` is the target generation observed on first access, and is
//!   never reset afterwards
//!
//! Each container shape supplies its copy, replace and diff operations
//! through the [`Shape`] trait; everything else is shared.

use crate::target::{Entry, Staged, Target};
use crate::validation::ConflictType;
use std::fmt;
use std::rc::Rc;
use tessera_core::{next_generation, Change, Generation, Handle, ShapeKind};
use tracing::trace;

/// Per-shape behavior of buffers and targets
pub(crate) trait Shape: Sized + 'static {
    /// Contents of a target of this shape
    type Body: Clone + Default + fmt::Debug + 'static;

    /// Shape tag
    const KIND: ShapeKind;

    /// Copy taken on a buffer's first write
    fn make_copy(source: &Self::Body) -> Self::Body {
        source.clone()
    }

    /// Overwrite `dest` in place with the contents of `source`
    fn replace(dest: &mut Self::Body, source: &Self::Body);

    /// Net changes turning `original` into `staged`
    fn changes(target: Handle, original: &Self::Body, staged: &Self::Body) -> Vec<Change>;

    fn target(entry: &Entry) -> Option<&Rc<Target<Self::Body>>>;
    fn into_entry(target: Rc<Target<Self::Body>>) -> Entry;
    fn buffer(any: &AnyBuffer) -> Option<&Buffer<Self>>;
    fn buffer_mut(any: &mut AnyBuffer) -> Option<&mut Buffer<Self>>;
    fn into_any(buffer: Buffer<Self>) -> AnyBuffer;
}

/// Operations every buffer supports
pub(crate) trait BufferOps {
    /// Target this buffer stages
    fn handle(&self) -> Handle;

    /// Whether the buffer has been read or written
    fn is_touched(&self) -> bool;

    /// Whether the buffer holds a private copy
    fn is_written(&self) -> bool;

    /// Validate for a root commit
    fn check_committable(&self) -> Result<(), ConflictType>;

    /// Validate for a merge into the parent transaction's buffer
    fn check_mergeable_into(&self, parent: &Self) -> Result<(), ConflictType>;

    /// Apply staged contents to the live target
    fn commit(&self, generation: Generation);

    /// Fold this buffer into the parent transaction's buffer
    fn merge_into(&self, parent: &mut Self);

    /// Net changes staged by this buffer
    fn changes(&self) -> Vec<Change>;
}

pub(crate) struct Buffer<S: Shape> {
    target: Rc<Target<S::Body>>,
    seed: Rc<Staged<S::Body>>,
    staged: Rc<Staged<S::Body>>,
    written: bool,
    touched: Option<Generation>,
    seed_revision: u64,
}

impl<S: Shape> Clone for Buffer<S> {
    fn clone(&self) -> Self {
        Buffer {
            target: self.target.clone(),
            seed: self.seed.clone(),
            staged: self.staged.clone(),
            written: self.written,
            touched: self.touched,
            seed_revision: self.seed_revision,
        }
    }
}

impl<S: Shape> Buffer<S> {
    /// Create an untouched buffer
    ///
    /// Without a seed the buffer stages the target's live state directly.
    pub(crate) fn new(target: Rc<Target<S::Body>>, seed: Option<Rc<Staged<S::Body>>>) -> Self {
        let seed = seed.unwrap_or_else(|| target.state().clone());
        trace!(handle = %target.handle(), "buffer created");
        Buffer {
            staged: seed.clone(),
            seed,
            target,
            written: false,
            touched: None,
            seed_revision: 0,
        }
    }

    pub(crate) fn target(&self) -> &Rc<Target<S::Body>> {
        &self.target
    }

    pub(crate) fn staged(&self) -> &Rc<Staged<S::Body>> {
        &self.staged
    }

    fn touch(&mut self) {
        if self.touched.is_none() {
            self.touched = Some(self.target.generation());
            self.seed_revision = self.seed.revision();
        }
    }

    /// Staged contents for reading
    pub(crate) fn read(&mut self) -> Rc<Staged<S::Body>> {
        self.touch();
        self.staged.clone()
    }

    /// Staged contents for writing, copying them first if still shared
    pub(crate) fn write(&mut self) -> Rc<Staged<S::Body>> {
        self.touch();
        if !self.written {
            let copy = S::make_copy(&self.staged.borrow());
            self.staged = Staged::new(copy);
            self.written = true;
            trace!(handle = %self.target.handle(), "buffer copied on write");
        }
        self.staged.bump();
        self.staged.clone()
    }

    /// Validate a merge into a parent that has not touched the target
    ///
    /// `exposed` is the state the parent would seed a buffer from. A private
    /// ancestor copy must be the one this buffer started from, unchanged
    /// since first access; the live state falls back to the generation check.
    pub(crate) fn check_exposed(
        &self,
        exposed: Option<&Rc<Staged<S::Body>>>,
    ) -> Result<(), ConflictType> {
        if self.touched.is_none() {
            return Ok(());
        }
        match exposed {
            Some(state) if !Rc::ptr_eq(state, self.target.state()) => {
                if Rc::ptr_eq(&self.seed, state) && self.seed_revision == state.revision() {
                    Ok(())
                } else {
                    Err(ConflictType::ParentDiverged {
                        target: self.handle(),
                    })
                }
            }
            _ => self.check_committable(),
        }
    }

    fn conflict_with_live(&self, observed: Generation) -> ConflictType {
        ConflictType::StaleGeneration {
            target: self.target.handle(),
            observed,
            current: self.target.generation(),
        }
    }
}

impl<S: Shape> BufferOps for Buffer<S> {
    fn handle(&self) -> Handle {
        self.target.handle()
    }

    fn is_touched(&self) -> bool {
        self.touched.is_some()
    }

    fn is_written(&self) -> bool {
        self.written
    }

    fn check_committable(&self) -> Result<(), ConflictType> {
        match self.touched {
            Some(observed) if observed != self.target.generation() => {
                Err(self.conflict_with_live(observed))
            }
            _ => Ok(()),
        }
    }

    fn check_mergeable_into(&self, parent: &Self) -> Result<(), ConflictType> {
        let Some(observed) = self.touched else {
            return Ok(());
        };
        if parent.touched.is_none() {
            return self.check_exposed(Some(&parent.staged));
        }

        if parent.written {
            // Only a child that started from the parent's current private
            // copy, with no parent write since, may merge over it.
            let seeded_from_parent = Rc::ptr_eq(&self.seed, &parent.staged)
                && self.seed_revision == parent.staged.revision();
            if seeded_from_parent {
                Ok(())
            } else {
                Err(ConflictType::ParentDiverged {
                    target: self.handle(),
                })
            }
        } else if parent.touched == Some(observed) {
            Ok(())
        } else {
            Err(ConflictType::ParentGenerationMismatch {
                target: self.handle(),
                child: observed,
                parent: parent.touched.unwrap_or_default(),
            })
        }
    }

    fn commit(&self, generation: Generation) {
        if !self.written {
            return;
        }
        {
            let staged = self.staged.borrow();
            let mut live = self.target.state().borrow_mut();
            S::replace(&mut live, &staged);
        }
        let stamp = if generation > self.target.generation() {
            generation
        } else {
            next_generation()
        };
        self.target.set_generation(stamp);
        trace!(handle = %self.handle(), generation = %stamp, "buffer committed");
    }

    fn merge_into(&self, parent: &mut Self) {
        if parent.touched.is_none() {
            parent.touched = self.touched;
            parent.seed_revision = self.seed_revision;
        }
        if !self.written || Rc::ptr_eq(&parent.staged, &self.staged) {
            return;
        }
        if parent.written {
            S::replace(&mut parent.staged.borrow_mut(), &self.staged.borrow());
        } else {
            parent.staged = self.staged.clone();
            parent.written = true;
        }
        parent.staged.bump();
        trace!(handle = %self.handle(), "buffer merged into parent");
    }

    fn changes(&self) -> Vec<Change> {
        if !self.written {
            return Vec::new();
        }
        S::changes(self.handle(), &self.seed.borrow(), &self.staged.borrow())
    }
}

/// A buffer of any shape
pub(crate) enum AnyBuffer {
    Object(Buffer<crate::object::ObjectShape>),
    Sequence(Buffer<crate::sequence::SequenceShape>),
    Mapping(Buffer<crate::mapping::MappingShape>),
    Set(Buffer<crate::set::SetShape>),
}

/// Run `$body` with `$b` bound to the typed buffer inside an [`AnyBuffer`]
macro_rules! with_buffer {
    ($any:expr, $b:ident => $body:expr) => {
        match $any {
            $crate::buffer::AnyBuffer::Object($b) => $body,
            $crate::buffer::AnyBuffer::Sequence($b) => $body,
            $crate::buffer::AnyBuffer::Mapping($b) => $body,
            $crate::buffer::AnyBuffer::Set($b) => $body,
        }
    };
}

pub(crate) use with_buffer;

impl Clone for AnyBuffer {
    fn clone(&self) -> Self {
        match self {
            AnyBuffer::Object(b) => AnyBuffer::Object(b.clone()),
            AnyBuffer::Sequence(b) => AnyBuffer::Sequence(b.clone()),
            AnyBuffer::Mapping(b) => AnyBuffer::Mapping(b.clone()),
            AnyBuffer::Set(b) => AnyBuffer::Set(b.clone()),
        }
    }
}

impl BufferOps for AnyBuffer {
    fn handle(&self) -> Handle {
        with_buffer!(self, b => b.handle())
    }

    fn is_touched(&self) -> bool {
        with_buffer!(self, b => b.is_touched())
    }

    fn is_written(&self) -> bool {
        with_buffer!(self, b => b.is_written())
    }

    fn check_committable(&self) -> Result<(), ConflictType> {
        with_buffer!(self, b => b.check_committable())
    }

    fn check_mergeable_into(&self, parent: &Self) -> Result<(), ConflictType> {
        match (self, parent) {
            (AnyBuffer::Object(c), AnyBuffer::Object(p)) => c.check_mergeable_into(p),
            (AnyBuffer::Sequence(c), AnyBuffer::Sequence(p)) => c.check_mergeable_into(p),
            (AnyBuffer::Mapping(c), AnyBuffer::Mapping(p)) => c.check_mergeable_into(p),
            (AnyBuffer::Set(c), AnyBuffer::Set(p)) => c.check_mergeable_into(p),
            _ => Err(ConflictType::ParentDiverged {
                target: self.handle(),
            }),
        }
    }

    fn commit(&self, generation: Generation) {
        with_buffer!(self, b => b.commit(generation))
    }

    fn merge_into(&self, parent: &mut Self) {
        match (self, parent) {
            (AnyBuffer::Object(c), AnyBuffer::Object(p)) => c.merge_into(p),
            (AnyBuffer::Sequence(c), AnyBuffer::Sequence(p)) => c.merge_into(p),
            (AnyBuffer::Mapping(c), AnyBuffer::Mapping(p)) => c.merge_into(p),
            (AnyBuffer::Set(c), AnyBuffer::Set(p)) => c.merge_into(p),
            _ => debug_assert!(false, "buffers for one target always share a shape"),
        }
    }

    fn changes(&self) -> Vec<Change> {
        with_buffer!(self, b => b.changes())
    }
}
