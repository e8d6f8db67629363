//! Set wrappers
//!
//! An insertion-ordered collection of distinct values. Membership uses the
//! same equality as mapping keys: NaN is a member of a set holding NaN, and
//! a raw container is the same member as its wrapper.

use crate::buffer::{AnyBuffer, Buffer, Shape};
use crate::capability::{Capabilities, Description};
use crate::dispatch;
use crate::stm::Stm;
use crate::target::{Entry, Target};
use std::fmt;
use std::rc::Rc;
use tessera_core::{
    Change, ChangeKind, Error, Handle, Members, RawBody, RawNode, Result, ShapeKind, Value,
};

pub(crate) struct SetShape;

impl Shape for SetShape {
    type Body = Members;
    const KIND: ShapeKind = ShapeKind::Set;

    fn replace(dest: &mut Members, source: &Members) {
        dest.clear();
        dest.extend(source.iter().cloned());
    }

    fn changes(target: Handle, _original: &Members, staged: &Members) -> Vec<Change> {
        std::iter::once(Change::new(target, ChangeKind::ClearElements))
            .chain(staged.iter().map(|member| {
                Change::new(
                    target,
                    ChangeKind::AddElement {
                        value: member.clone(),
                    },
                )
            }))
            .collect()
    }

    fn target(entry: &Entry) -> Option<&Rc<Target<Members>>> {
        match entry {
            Entry::Set(target) => Some(target),
            _ => None,
        }
    }

    fn into_entry(target: Rc<Target<Members>>) -> Entry {
        Entry::Set(target)
    }

    fn buffer(any: &AnyBuffer) -> Option<&Buffer<Self>> {
        match any {
            AnyBuffer::Set(buffer) => Some(buffer),
            _ => None,
        }
    }

    fn buffer_mut(any: &mut AnyBuffer) -> Option<&mut Buffer<Self>> {
        match any {
            AnyBuffer::Set(buffer) => Some(buffer),
            _ => None,
        }
    }

    fn into_any(buffer: Buffer<Self>) -> AnyBuffer {
        AnyBuffer::Set(buffer)
    }
}

fn adopt(stm: &Stm, node: &RawNode) -> Result<Handle> {
    stm.adopt::<SetShape>(node, |stm, raw| match raw {
        RawBody::Set(members) => members
            .into_iter()
            .map(|member| stm.wrap_member(member))
            .collect(),
        other => Err(Error::invalid_usage(format!(
            "expected a raw set, found a raw {}",
            other.kind()
        ))),
    })
}

/// Teach `stm` to wrap raw sets; false if already installed
pub fn install(stm: &Stm) -> bool {
    dispatch::extend(stm, ShapeKind::Set, adopt)
}

/// View of a wrapped set
#[derive(Clone)]
pub struct SetRef {
    stm: Stm,
    target: Rc<Target<Members>>,
}

impl SetRef {
    pub(crate) fn new(stm: Stm, target: Rc<Target<Members>>) -> Self {
        SetRef { stm, target }
    }

    /// Target identity
    pub fn handle(&self) -> Handle {
        self.target.handle()
    }

    /// Wrapped value of this set, for storing elsewhere
    pub fn value(&self) -> Value {
        Value::Ref(self.handle())
    }

    fn read<R>(&self, f: impl FnOnce(&Members) -> R) -> Result<R> {
        self.stm.read::<SetShape, R>(&self.target, f)
    }

    fn write<R>(&self, change: impl Fn() -> Change, f: impl FnOnce(&mut Members) -> R) -> Result<R> {
        self.stm.write::<SetShape, R>(&self.target, change, f)
    }

    /// Whether `value` is a member
    pub fn has(&self, value: &Value) -> Result<bool> {
        let value = self.stm.resolve_key(value);
        self.read(|members| members.contains(&value))
    }

    /// Number of members
    pub fn len(&self) -> Result<usize> {
        self.read(|members| members.len())
    }

    /// True when there are no members
    pub fn is_empty(&self) -> Result<bool> {
        self.read(|members| members.is_empty())
    }

    /// Members in insertion order
    pub fn values(&self) -> Result<Vec<Value>> {
        self.read(|members| members.iter().cloned().collect())
    }

    /// Call `f` for each member, in insertion order
    pub fn for_each(&self, mut f: impl FnMut(&Value)) -> Result<()> {
        for member in self.values()? {
            f(&member);
        }
        Ok(())
    }

    /// Add a member; true if it was not already present
    pub fn add(&self, value: impl Into<Value>) -> Result<bool> {
        let value = self.stm.wrap_member(value.into())?;
        let handle = self.handle();
        self.write(
            || {
                Change::new(
                    handle,
                    ChangeKind::AddElement {
                        value: value.clone(),
                    },
                )
            },
            |members| members.insert(value.clone()),
        )
    }

    /// Remove a member; true if it was present
    pub fn delete(&self, value: &Value) -> Result<bool> {
        let value = self.stm.resolve_key(value);
        let handle = self.handle();
        self.write(
            || Change::new(handle, ChangeKind::DeleteElement { key: value.clone() }),
            |members| members.shift_remove(&value),
        )
    }

    /// Remove every member
    pub fn clear(&self) -> Result<()> {
        let handle = self.handle();
        self.write(
            || Change::new(handle, ChangeKind::ClearElements),
            |members| members.clear(),
        )
    }
}

impl Capabilities for SetRef {
    type Key = Value;

    /// The member itself, if present
    fn get(&self, key: &Value) -> Result<Option<Value>> {
        let key = self.stm.resolve_key(key);
        self.read(|members| members.get(&key).cloned())
    }

    /// Add `key`; a set stores no separate value, so `value` must equal it
    fn set(&self, key: Value, value: Value) -> Result<()> {
        if key != value {
            return Err(Error::invalid_usage(format!(
                "a set member maps to itself: cannot store {} under {}",
                value, key
            )));
        }
        self.add(key).map(|_| ())
    }

    fn delete(&self, key: &Value) -> Result<bool> {
        SetRef::delete(self, key)
    }

    fn enumerate(&self) -> Result<Vec<Value>> {
        self.values()
    }

    fn describe(&self) -> Result<Description> {
        Ok(Description {
            handle: self.handle(),
            kind: ShapeKind::Set,
            len: self.len()?,
            generation: self.target.generation(),
        })
    }
}

impl fmt::Debug for SetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SetRef({})", self.handle())
    }
}
