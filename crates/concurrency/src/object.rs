//! Object wrappers
//!
//! An object is a record of named attributes. Reads and writes address one
//! attribute at a time; values stored are wrapped first, so a raw container
//! assigned to an attribute becomes (or resolves to) a target of its own.

use crate::buffer::{AnyBuffer, Buffer, Shape};
use crate::capability::{Capabilities, Description};
use crate::stm::Stm;
use crate::target::{Entry, Target};
use std::fmt;
use std::rc::Rc;
use tessera_core::{
    Attributes, Change, Error, Handle, RawBody, RawNode, Result, ShapeKind, Value,
};

pub(crate) struct ObjectShape;

impl Shape for ObjectShape {
    type Body = Attributes;
    const KIND: ShapeKind = ShapeKind::Object;

    fn replace(dest: &mut Attributes, source: &Attributes) {
        dest.clone_from(source);
    }

    fn changes(target: Handle, original: &Attributes, staged: &Attributes) -> Vec<Change> {
        let mut changes: Vec<Change> = original
            .keys()
            .filter(|name| !staged.contains_key(*name))
            .map(|name| Change::delete_value(target, name.clone()))
            .collect();
        changes.extend(
            staged
                .iter()
                .filter(|(name, value)| {
                    !original
                        .get(*name)
                        .is_some_and(|old| old.strict_eq(value))
                })
                .map(|(name, value)| Change::set_value(target, name.clone(), value.clone())),
        );
        changes
    }

    fn target(entry: &Entry) -> Option<&Rc<Target<Attributes>>> {
        match entry {
            Entry::Object(target) => Some(target),
            _ => None,
        }
    }

    fn into_entry(target: Rc<Target<Attributes>>) -> Entry {
        Entry::Object(target)
    }

    fn buffer(any: &AnyBuffer) -> Option<&Buffer<Self>> {
        match any {
            AnyBuffer::Object(buffer) => Some(buffer),
            _ => None,
        }
    }

    fn buffer_mut(any: &mut AnyBuffer) -> Option<&mut Buffer<Self>> {
        match any {
            AnyBuffer::Object(buffer) => Some(buffer),
            _ => None,
        }
    }

    fn into_any(buffer: Buffer<Self>) -> AnyBuffer {
        AnyBuffer::Object(buffer)
    }
}

/// Wrap a raw object; installed in every runtime's base dispatcher
pub(crate) fn adopt(stm: &Stm, node: &RawNode) -> Result<Handle> {
    stm.adopt::<ObjectShape>(node, |stm, raw| match raw {
        RawBody::Object(attributes) => attributes
            .into_iter()
            .map(|(name, value)| -> Result<(Rc<str>, Value)> {
                Ok((name, stm.wrap_member(value)?))
            })
            .collect(),
        other => Err(Error::invalid_usage(format!(
            "expected a raw object, found a raw {}",
            other.kind()
        ))),
    })
}

/// View of a wrapped object
#[derive(Clone)]
pub struct ObjectRef {
    stm: Stm,
    target: Rc<Target<Attributes>>,
}

impl ObjectRef {
    pub(crate) fn new(stm: Stm, target: Rc<Target<Attributes>>) -> Self {
        ObjectRef { stm, target }
    }

    /// Target identity
    pub fn handle(&self) -> Handle {
        self.target.handle()
    }

    /// Wrapped value of this object, for storing elsewhere
    pub fn value(&self) -> Value {
        Value::Ref(self.handle())
    }

    fn read<R>(&self, f: impl FnOnce(&Attributes) -> R) -> Result<R> {
        self.stm.read::<ObjectShape, R>(&self.target, f)
    }

    /// Value of an attribute
    pub fn get(&self, name: &str) -> Result<Option<Value>> {
        self.read(|attrs| attrs.get(name).cloned())
    }

    /// Whether an attribute is present
    pub fn has(&self, name: &str) -> Result<bool> {
        self.read(|attrs| attrs.contains_key(name))
    }

    /// Number of attributes
    pub fn len(&self) -> Result<usize> {
        self.read(|attrs| attrs.len())
    }

    /// True when there are no attributes
    pub fn is_empty(&self) -> Result<bool> {
        self.read(|attrs| attrs.is_empty())
    }

    /// Attribute names, in insertion order
    pub fn keys(&self) -> Result<Vec<Rc<str>>> {
        self.read(|attrs| attrs.keys().cloned().collect())
    }

    /// Attribute values, in insertion order
    pub fn values(&self) -> Result<Vec<Value>> {
        self.read(|attrs| attrs.values().cloned().collect())
    }

    /// Name/value pairs, in insertion order
    pub fn entries(&self) -> Result<Vec<(Rc<str>, Value)>> {
        self.read(|attrs| {
            attrs
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect()
        })
    }

    /// Assign an attribute
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = self.stm.wrap_member(value.into())?;
        let name: Rc<str> = Rc::from(name);
        let handle = self.handle();
        self.stm.write::<ObjectShape, ()>(
            &self.target,
            || Change::set_value(handle, name.clone(), value.clone()),
            |attrs| {
                attrs.insert(name.clone(), value.clone());
            },
        )
    }

    /// Remove an attribute; true if it was present
    pub fn delete(&self, name: &str) -> Result<bool> {
        let name: Rc<str> = Rc::from(name);
        let handle = self.handle();
        self.stm.write::<ObjectShape, bool>(
            &self.target,
            || Change::delete_value(handle, name.clone()),
            |attrs| attrs.shift_remove(&name).is_some(),
        )
    }
}

impl Capabilities for ObjectRef {
    type Key = Rc<str>;

    fn get(&self, key: &Rc<str>) -> Result<Option<Value>> {
        ObjectRef::get(self, key)
    }

    fn set(&self, key: Rc<str>, value: Value) -> Result<()> {
        ObjectRef::set(self, &key, value)
    }

    fn delete(&self, key: &Rc<str>) -> Result<bool> {
        ObjectRef::delete(self, key)
    }

    fn enumerate(&self) -> Result<Vec<Rc<str>>> {
        self.keys()
    }

    fn describe(&self) -> Result<Description> {
        Ok(Description {
            handle: self.handle(),
            kind: ShapeKind::Object,
            len: self.len()?,
            generation: self.target.generation(),
        })
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({})", self.handle())
    }
}
