//! Value model
//!
//! `Value` is what flows through wrappers: scalars by value, containers by
//! identity. A container is either a `RawNode` (a caller-owned plain graph
//! that has not been wrapped yet) or a `Handle` to a wrapped target.
//!
//! Equality follows identity semantics:
//! - scalars compare by value, with `Float` using SameValueZero
//!   (NaN equals NaN, +0 equals -0)
//! - `Int(1)` and `Float(1.0)` are different values
//! - raw nodes compare by pointer, handles by target identity
//!
//! This makes `Value` usable as a mapping key or set member.

use crate::error::{Error, Result};
use crate::types::{Handle, ShapeKind};
use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxHasher;
use std::cell::{Ref, RefCell, RefMut};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{BuildHasherDefault, Hash, Hasher};
use std::rc::{Rc, Weak};

/// Hasher used for value-keyed collections
pub type FxBuildHasher = BuildHasherDefault<FxHasher>;

/// Attributes of an object, in insertion order
pub type Attributes = IndexMap<Rc<str>, Value, FxBuildHasher>;

/// Elements of a sequence
pub type Elements = Vec<Value>;

/// Entries of a mapping, in insertion order
pub type Entries = IndexMap<Value, Value, FxBuildHasher>;

/// Members of a set, in insertion order
pub type Members = IndexSet<Value, FxBuildHasher>;

/// A value stored in, or passed to, a wrapper
#[derive(Clone, Debug)]
pub enum Value {
    /// Absent value
    Null,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Floating point number
    Float(f64),
    /// Immutable string
    Str(Rc<str>),
    /// Unwrapped plain container, compared by identity
    Raw(RawNode),
    /// Wrapped container
    Ref(Handle),
}

impl Value {
    /// Construct a string value
    pub fn str(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }

    /// Name of the variant, for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Raw(_) => "raw",
            Value::Ref(_) => "ref",
        }
    }

    /// True for `Null`
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// True for raw nodes and handles
    pub fn is_container(&self) -> bool {
        matches!(self, Value::Raw(_) | Value::Ref(_))
    }

    /// Boolean payload
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer payload
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Float payload
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// String payload
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Handle payload
    pub fn as_handle(&self) -> Option<Handle> {
        match self {
            Value::Ref(h) => Some(*h),
            _ => None,
        }
    }

    /// Raw node payload
    pub fn as_raw(&self) -> Option<&RawNode> {
        match self {
            Value::Raw(node) => Some(node),
            _ => None,
        }
    }

    /// Strict equality: like `==` except NaN never equals anything
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Float(a), Value::Float(b)) => a == b,
            _ => self == other,
        }
    }

    /// Total order used by the default sequence sort
    ///
    /// Null < Bool < numbers < strings < raw nodes < handles. Integers and
    /// floats are compared numerically with each other.
    pub fn compare(&self, other: &Value) -> Ordering {
        fn rank(v: &Value) -> u8 {
            match v {
                Value::Null => 0,
                Value::Bool(_) => 1,
                Value::Int(_) | Value::Float(_) => 2,
                Value::Str(_) => 3,
                Value::Raw(_) => 4,
                Value::Ref(_) => 5,
            }
        }

        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).total_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.total_cmp(&(*b as f64)),
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (Value::Raw(a), Value::Raw(b)) => a.addr().cmp(&b.addr()),
            (Value::Ref(a), Value::Ref(b)) => a.cmp(b),
            _ => rank(self).cmp(&rank(other)),
        }
    }
}

fn canonical_bits(f: f64) -> u64 {
    if f.is_nan() {
        f64::NAN.to_bits()
    } else if f == 0.0 {
        0
    } else {
        f.to_bits()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Raw(a), Value::Raw(b)) => a.ptr_eq(b),
            (Value::Ref(a), Value::Ref(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Float(f) => canonical_bits(*f).hash(state),
            Value::Str(s) => s.hash(state),
            Value::Raw(node) => node.addr().hash(state),
            Value::Ref(h) => h.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => f.write_str(s),
            Value::Raw(node) => write!(f, "<raw {}>", node.kind()),
            Value::Ref(h) => write!(f, "<{}>", h),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<Rc<str>> for Value {
    fn from(s: Rc<str>) -> Self {
        Value::Str(s)
    }
}

impl From<RawNode> for Value {
    fn from(node: RawNode) -> Self {
        Value::Raw(node)
    }
}

impl From<Handle> for Value {
    fn from(h: Handle) -> Self {
        Value::Ref(h)
    }
}

/// Contents of a raw node
#[derive(Clone, Debug)]
pub enum RawBody {
    /// Plain object
    Object(Attributes),
    /// Plain list
    Sequence(Elements),
    /// Plain key/value association
    Mapping(Entries),
    /// Plain set
    Set(Members),
}

impl RawBody {
    /// Shape this body would wrap into
    pub fn kind(&self) -> ShapeKind {
        match self {
            RawBody::Object(_) => ShapeKind::Object,
            RawBody::Sequence(_) => ShapeKind::Sequence,
            RawBody::Mapping(_) => ShapeKind::Mapping,
            RawBody::Set(_) => ShapeKind::Set,
        }
    }

    /// Number of attributes, elements, entries or members
    pub fn len(&self) -> usize {
        match self {
            RawBody::Object(a) => a.len(),
            RawBody::Sequence(e) => e.len(),
            RawBody::Mapping(e) => e.len(),
            RawBody::Set(m) => m.len(),
        }
    }

    /// True when there is nothing inside
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A caller-owned plain container
///
/// Raw nodes are shared by reference, so graphs with aliasing and cycles
/// can be built before wrapping. Identity is the allocation.
#[derive(Clone)]
pub struct RawNode(Rc<RefCell<RawBody>>);

impl RawNode {
    /// Wrap a body
    pub fn new(body: RawBody) -> Self {
        RawNode(Rc::new(RefCell::new(body)))
    }

    /// Empty plain object
    pub fn object() -> Self {
        Self::new(RawBody::Object(Attributes::default()))
    }

    /// Plain object from name/value pairs
    pub fn object_from<K, V>(attributes: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Rc<str>>,
        V: Into<Value>,
    {
        let attributes = attributes
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::new(RawBody::Object(attributes))
    }

    /// Plain list
    pub fn sequence<V: Into<Value>>(items: impl IntoIterator<Item = V>) -> Self {
        Self::new(RawBody::Sequence(items.into_iter().map(Into::into).collect()))
    }

    /// Plain key/value association
    pub fn mapping<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Value>,
        V: Into<Value>,
    {
        let entries = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::new(RawBody::Mapping(entries))
    }

    /// Plain set
    pub fn set<V: Into<Value>>(members: impl IntoIterator<Item = V>) -> Self {
        Self::new(RawBody::Set(members.into_iter().map(Into::into).collect()))
    }

    /// Shape this node would wrap into
    pub fn kind(&self) -> ShapeKind {
        self.0.borrow().kind()
    }

    /// Borrow the contents
    pub fn borrow(&self) -> Ref<'_, RawBody> {
        self.0.borrow()
    }

    /// Mutably borrow the contents
    pub fn borrow_mut(&self) -> RefMut<'_, RawBody> {
        self.0.borrow_mut()
    }

    /// Same allocation
    pub fn ptr_eq(&self, other: &RawNode) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Address of the allocation, used as an identity key
    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    /// Non-owning reference to this node
    pub fn downgrade(&self) -> WeakRawNode {
        WeakRawNode(Rc::downgrade(&self.0))
    }

    /// Set an attribute on a plain object
    pub fn insert(&self, name: impl Into<Rc<str>>, value: impl Into<Value>) -> Result<()> {
        match &mut *self.0.borrow_mut() {
            RawBody::Object(attributes) => {
                attributes.insert(name.into(), value.into());
                Ok(())
            }
            other => Err(shape_error("insert", ShapeKind::Object, other.kind())),
        }
    }

    /// Append an element to a plain list
    pub fn push(&self, value: impl Into<Value>) -> Result<()> {
        match &mut *self.0.borrow_mut() {
            RawBody::Sequence(elements) => {
                elements.push(value.into());
                Ok(())
            }
            other => Err(shape_error("push", ShapeKind::Sequence, other.kind())),
        }
    }

    /// Set an entry on a plain key/value association
    pub fn set_entry(&self, key: impl Into<Value>, value: impl Into<Value>) -> Result<()> {
        match &mut *self.0.borrow_mut() {
            RawBody::Mapping(entries) => {
                entries.insert(key.into(), value.into());
                Ok(())
            }
            other => Err(shape_error("set_entry", ShapeKind::Mapping, other.kind())),
        }
    }

    /// Add a member to a plain set
    pub fn add(&self, member: impl Into<Value>) -> Result<()> {
        match &mut *self.0.borrow_mut() {
            RawBody::Set(members) => {
                members.insert(member.into());
                Ok(())
            }
            other => Err(shape_error("add", ShapeKind::Set, other.kind())),
        }
    }
}

fn shape_error(op: &str, expected: ShapeKind, actual: ShapeKind) -> Error {
    Error::invalid_usage(format!(
        "{} requires a raw {}, found a raw {}",
        op, expected, actual
    ))
}

impl fmt::Debug for RawNode {
    // Shallow on purpose: raw graphs may be cyclic.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(body) => write!(f, "RawNode({} x{} @{:#x})", body.kind(), body.len(), self.addr()),
            Err(_) => write!(f, "RawNode(<borrowed> @{:#x})", self.addr()),
        }
    }
}

/// Weak counterpart of [`RawNode`]
#[derive(Clone, Debug)]
pub struct WeakRawNode(Weak<RefCell<RawBody>>);

impl WeakRawNode {
    /// Recover the node if it is still alive
    pub fn upgrade(&self) -> Option<RawNode> {
        self.0.upgrade().map(RawNode)
    }

    /// True when this points at `node` and `node` is alive
    pub fn is(&self, node: &RawNode) -> bool {
        self.0
            .upgrade()
            .map_or(false, |rc| Rc::ptr_eq(&rc, &node.0))
    }
}
