//! Mapping wrappers
//!
//! A mapping is an insertion-ordered dictionary keyed by any value. Raw
//! containers used as keys or values are wrapped on the way in, so a raw
//! key and its wrapped handle address the same entry. A committed mapping
//! reports its contents coarsely: a clear followed by one set per entry.

use crate::buffer::{AnyBuffer, Buffer, Shape};
use crate::capability::{Capabilities, Description};
use crate::dispatch;
use crate::stm::Stm;
use crate::target::{Entry, Target};
use std::fmt;
use std::rc::Rc;
use tessera_core::{
    Change, ChangeKind, Entries, Error, Handle, RawBody, RawNode, Result, ShapeKind, Value,
};

pub(crate) struct MappingShape;

impl Shape for MappingShape {
    type Body = Entries;
    const KIND: ShapeKind = ShapeKind::Mapping;

    fn replace(dest: &mut Entries, source: &Entries) {
        dest.clear();
        dest.extend(source.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    fn changes(target: Handle, _original: &Entries, staged: &Entries) -> Vec<Change> {
        std::iter::once(Change::new(target, ChangeKind::ClearElements))
            .chain(staged.iter().map(|(key, value)| {
                Change::new(
                    target,
                    ChangeKind::SetElement {
                        key: key.clone(),
                        value: value.clone(),
                    },
                )
            }))
            .collect()
    }

    fn target(entry: &Entry) -> Option<&Rc<Target<Entries>>> {
        match entry {
            Entry::Mapping(target) => Some(target),
            _ => None,
        }
    }

    fn into_entry(target: Rc<Target<Entries>>) -> Entry {
        Entry::Mapping(target)
    }

    fn buffer(any: &AnyBuffer) -> Option<&Buffer<Self>> {
        match any {
            AnyBuffer::Mapping(buffer) => Some(buffer),
            _ => None,
        }
    }

    fn buffer_mut(any: &mut AnyBuffer) -> Option<&mut Buffer<Self>> {
        match any {
            AnyBuffer::Mapping(buffer) => Some(buffer),
            _ => None,
        }
    }

    fn into_any(buffer: Buffer<Self>) -> AnyBuffer {
        AnyBuffer::Mapping(buffer)
    }
}

fn adopt(stm: &Stm, node: &RawNode) -> Result<Handle> {
    stm.adopt::<MappingShape>(node, |stm, raw| match raw {
        RawBody::Mapping(entries) => entries
            .into_iter()
            .map(|(key, value)| -> Result<(Value, Value)> {
                Ok((stm.wrap_member(key)?, stm.wrap_member(value)?))
            })
            .collect(),
        other => Err(Error::invalid_usage(format!(
            "expected a raw mapping, found a raw {}",
            other.kind()
        ))),
    })
}

/// Teach `stm` to wrap raw mappings; false if already installed
pub fn install(stm: &Stm) -> bool {
    dispatch::extend(stm, ShapeKind::Mapping, adopt)
}

/// View of a wrapped mapping
#[derive(Clone)]
pub struct MappingRef {
    stm: Stm,
    target: Rc<Target<Entries>>,
}

impl MappingRef {
    pub(crate) fn new(stm: Stm, target: Rc<Target<Entries>>) -> Self {
        MappingRef { stm, target }
    }

    /// Target identity
    pub fn handle(&self) -> Handle {
        self.target.handle()
    }

    /// Wrapped value of this mapping, for storing elsewhere
    pub fn value(&self) -> Value {
        Value::Ref(self.handle())
    }

    fn read<R>(&self, f: impl FnOnce(&Entries) -> R) -> Result<R> {
        self.stm.read::<MappingShape, R>(&self.target, f)
    }

    fn write<R>(&self, change: impl Fn() -> Change, f: impl FnOnce(&mut Entries) -> R) -> Result<R> {
        self.stm.write::<MappingShape, R>(&self.target, change, f)
    }

    /// Value stored under `key`
    pub fn get(&self, key: &Value) -> Result<Option<Value>> {
        let key = self.stm.resolve_key(key);
        self.read(|entries| entries.get(&key).cloned())
    }

    /// Whether `key` is present
    pub fn has(&self, key: &Value) -> Result<bool> {
        let key = self.stm.resolve_key(key);
        self.read(|entries| entries.contains_key(&key))
    }

    /// Number of entries
    pub fn len(&self) -> Result<usize> {
        self.read(|entries| entries.len())
    }

    /// True when there are no entries
    pub fn is_empty(&self) -> Result<bool> {
        self.read(|entries| entries.is_empty())
    }

    /// Keys in insertion order
    pub fn keys(&self) -> Result<Vec<Value>> {
        self.read(|entries| entries.keys().cloned().collect())
    }

    /// Values in insertion order
    pub fn values(&self) -> Result<Vec<Value>> {
        self.read(|entries| entries.values().cloned().collect())
    }

    /// Key/value pairs in insertion order
    pub fn entries(&self) -> Result<Vec<(Value, Value)>> {
        self.read(|entries| {
            entries
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
    }

    /// Call `f` for each entry, in insertion order
    pub fn for_each(&self, mut f: impl FnMut(&Value, &Value)) -> Result<()> {
        for (key, value) in self.entries()? {
            f(&value, &key);
        }
        Ok(())
    }

    /// Store `value` under `key`
    ///
    /// A new key goes last; an existing key keeps its position.
    pub fn set(&self, key: impl Into<Value>, value: impl Into<Value>) -> Result<()> {
        let key = self.stm.wrap_member(key.into())?;
        let value = self.stm.wrap_member(value.into())?;
        let handle = self.handle();
        self.write(
            || {
                Change::new(
                    handle,
                    ChangeKind::SetElement {
                        key: key.clone(),
                        value: value.clone(),
                    },
                )
            },
            |entries| {
                entries.insert(key.clone(), value.clone());
            },
        )
    }

    /// Remove `key`; true if it was present
    pub fn delete(&self, key: &Value) -> Result<bool> {
        let key = self.stm.resolve_key(key);
        let handle = self.handle();
        self.write(
            || Change::new(handle, ChangeKind::DeleteElement { key: key.clone() }),
            |entries| entries.shift_remove(&key).is_some(),
        )
    }

    /// Remove every entry
    pub fn clear(&self) -> Result<()> {
        let handle = self.handle();
        self.write(
            || Change::new(handle, ChangeKind::ClearElements),
            |entries| entries.clear(),
        )
    }
}

impl Capabilities for MappingRef {
    type Key = Value;

    fn get(&self, key: &Value) -> Result<Option<Value>> {
        MappingRef::get(self, key)
    }

    fn set(&self, key: Value, value: Value) -> Result<()> {
        MappingRef::set(self, key, value)
    }

    fn delete(&self, key: &Value) -> Result<bool> {
        MappingRef::delete(self, key)
    }

    fn enumerate(&self) -> Result<Vec<Value>> {
        self.keys()
    }

    fn describe(&self) -> Result<Description> {
        Ok(Description {
            handle: self.handle(),
            kind: ShapeKind::Mapping,
            len: self.len()?,
            generation: self.target.generation(),
        })
    }
}

impl fmt::Debug for MappingRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MappingRef({})", self.handle())
    }
}
