//! Sequence wrappers
//!
//! A sequence is an ordered list of elements with the usual list vocabulary.
//! Queries run over a snapshot of the visible elements, so callbacks passed
//! to them may freely read other wrappers. Mutations are described as
//! normalized changes:
//!
//! ```text
//! push(v)             splice(len, 0, [v])
//! pop()               splice(len - 1, 1, [])
//! shift()             splice(0, 1, [])
//! unshift(v)          splice(0, 0, [v])
//! fill(v, s, e)       splice(s, e - s, [v; e - s])
//! copy_within(t, s)   splice(t, n, copied)
//! set(i, v)           setvalue [i]
//! delete(i)           deletevalue [i]
//! reverse() / sort()  reverse / sort
//! ```
//!
//! Negative positions count back from the end; out-of-range positions clamp.

use crate::buffer::{AnyBuffer, Buffer, Shape};
use crate::capability::{Capabilities, Description};
use crate::dispatch;
use crate::stm::Stm;
use crate::target::{Entry, Target};
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;
use tessera_core::{
    Change, ChangeKind, Elements, Error, Handle, RawBody, RawNode, Result, ShapeKind, Value,
};

/// Longest sequence that index assignment or `set_len` may produce
pub const MAX_LEN: usize = u32::MAX as usize;

pub(crate) struct SequenceShape;

impl Shape for SequenceShape {
    type Body = Elements;
    const KIND: ShapeKind = ShapeKind::Sequence;

    fn replace(dest: &mut Elements, source: &Elements) {
        dest.clone_from(source);
    }

    fn changes(target: Handle, original: &Elements, staged: &Elements) -> Vec<Change> {
        vec![Change::splice(target, 0, original.len(), staged.clone())]
    }

    fn target(entry: &Entry) -> Option<&Rc<Target<Elements>>> {
        match entry {
            Entry::Sequence(target) => Some(target),
            _ => None,
        }
    }

    fn into_entry(target: Rc<Target<Elements>>) -> Entry {
        Entry::Sequence(target)
    }

    fn buffer(any: &AnyBuffer) -> Option<&Buffer<Self>> {
        match any {
            AnyBuffer::Sequence(buffer) => Some(buffer),
            _ => None,
        }
    }

    fn buffer_mut(any: &mut AnyBuffer) -> Option<&mut Buffer<Self>> {
        match any {
            AnyBuffer::Sequence(buffer) => Some(buffer),
            _ => None,
        }
    }

    fn into_any(buffer: Buffer<Self>) -> AnyBuffer {
        AnyBuffer::Sequence(buffer)
    }
}

fn adopt(stm: &Stm, node: &RawNode) -> Result<Handle> {
    stm.adopt::<SequenceShape>(node, |stm, raw| match raw {
        RawBody::Sequence(items) => items
            .into_iter()
            .map(|item| stm.wrap_member(item))
            .collect(),
        other => Err(Error::invalid_usage(format!(
            "expected a raw sequence, found a raw {}",
            other.kind()
        ))),
    })
}

/// Teach `stm` to wrap raw sequences; false if already installed
pub fn install(stm: &Stm) -> bool {
    dispatch::extend(stm, ShapeKind::Sequence, adopt)
}

fn check_len(len: usize) -> Result<()> {
    if len > MAX_LEN {
        return Err(Error::invalid_usage(format!(
            "sequence length {} exceeds {}",
            len, MAX_LEN
        )));
    }
    Ok(())
}

/// Resolve a possibly negative position against `len`, clamping to `0..=len`
fn relative_index(index: isize, len: usize) -> usize {
    if index < 0 {
        len.saturating_sub(index.unsigned_abs())
    } else {
        (index as usize).min(len)
    }
}

fn join_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// View of a wrapped sequence
#[derive(Clone)]
pub struct SequenceRef {
    stm: Stm,
    target: Rc<Target<Elements>>,
}

impl SequenceRef {
    pub(crate) fn new(stm: Stm, target: Rc<Target<Elements>>) -> Self {
        SequenceRef { stm, target }
    }

    /// Target identity
    pub fn handle(&self) -> Handle {
        self.target.handle()
    }

    /// Wrapped value of this sequence, for storing elsewhere
    pub fn value(&self) -> Value {
        Value::Ref(self.handle())
    }

    fn read<R>(&self, f: impl FnOnce(&Elements) -> R) -> Result<R> {
        self.stm.read::<SequenceShape, R>(&self.target, f)
    }

    fn write<R>(&self, change: impl Fn() -> Change, f: impl FnOnce(&mut Elements) -> R) -> Result<R> {
        self.stm.write::<SequenceShape, R>(&self.target, change, f)
    }

    fn wrap_all<I>(&self, items: I) -> Result<Vec<Value>>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        items
            .into_iter()
            .map(|item| self.stm.wrap_member(item.into()))
            .collect()
    }

    /// Elements of a sequence-like value: a wrapped sequence or a raw list
    fn spread(&self, value: &Value) -> Result<Option<Vec<Value>>> {
        match value {
            Value::Ref(handle) if handle.kind() == ShapeKind::Sequence => {
                Ok(Some(self.stm.sequence(*handle)?.to_vec()?))
            }
            Value::Raw(node) => match &*node.borrow() {
                RawBody::Sequence(items) => Ok(Some(items.clone())),
                _ => Ok(None),
            },
            _ => Ok(None),
        }
    }

    // === Queries ===

    /// Number of elements
    pub fn len(&self) -> Result<usize> {
        self.read(|items| items.len())
    }

    /// True when there are no elements
    pub fn is_empty(&self) -> Result<bool> {
        self.read(|items| items.is_empty())
    }

    /// Element at `index`
    pub fn get(&self, index: usize) -> Result<Option<Value>> {
        self.read(|items| items.get(index).cloned())
    }

    /// Element at `index`, counting back from the end when negative
    pub fn at(&self, index: isize) -> Result<Option<Value>> {
        self.read(|items| {
            let index = if index < 0 {
                items.len().checked_sub(index.unsigned_abs())?
            } else {
                index as usize
            };
            items.get(index).cloned()
        })
    }

    /// First element
    pub fn first(&self) -> Result<Option<Value>> {
        self.read(|items| items.first().cloned())
    }

    /// Last element
    pub fn last(&self) -> Result<Option<Value>> {
        self.read(|items| items.last().cloned())
    }

    /// Copy of the visible elements
    pub fn to_vec(&self) -> Result<Vec<Value>> {
        self.read(|items| items.clone())
    }

    /// Iterator over a snapshot of the visible elements
    pub fn iter(&self) -> Result<std::vec::IntoIter<Value>> {
        Ok(self.to_vec()?.into_iter())
    }

    /// Indices `0..len`
    pub fn keys(&self) -> Result<Vec<usize>> {
        Ok((0..self.len()?).collect())
    }

    /// Index/element pairs
    pub fn entries(&self) -> Result<Vec<(usize, Value)>> {
        Ok(self.to_vec()?.into_iter().enumerate().collect())
    }

    /// Elements in `start..end`
    pub fn slice(&self, start: isize, end: Option<isize>) -> Result<Vec<Value>> {
        self.read(|items| {
            let len = items.len();
            let start = relative_index(start, len);
            let end = end.map_or(len, |end| relative_index(end, len));
            if start < end {
                items[start..end].to_vec()
            } else {
                Vec::new()
            }
        })
    }

    /// Elements followed by each of `others`, spreading sequences
    pub fn concat(&self, others: &[Value]) -> Result<Vec<Value>> {
        let mut out = self.to_vec()?;
        for other in others {
            match self.spread(other)? {
                Some(items) => out.extend(items),
                None => out.push(other.clone()),
            }
        }
        Ok(out)
    }

    /// Elements with nested sequences spread, `depth` levels deep
    pub fn flat(&self, depth: usize) -> Result<Vec<Value>> {
        let mut out = Vec::new();
        self.flatten_into(self.to_vec()?, depth, &mut out)?;
        Ok(out)
    }

    fn flatten_into(&self, items: Vec<Value>, depth: usize, out: &mut Vec<Value>) -> Result<()> {
        for item in items {
            if depth > 0 {
                if let Some(inner) = self.spread(&item)? {
                    self.flatten_into(inner, depth - 1, out)?;
                    continue;
                }
            }
            out.push(item);
        }
        Ok(())
    }

    /// Map each element
    pub fn map<T>(&self, mut f: impl FnMut(&Value, usize) -> T) -> Result<Vec<T>> {
        Ok(self
            .to_vec()?
            .iter()
            .enumerate()
            .map(|(i, item)| f(item, i))
            .collect())
    }

    /// Map each element to a list and concatenate the lists
    pub fn flat_map(&self, mut f: impl FnMut(&Value, usize) -> Vec<Value>) -> Result<Vec<Value>> {
        Ok(self
            .to_vec()?
            .iter()
            .enumerate()
            .flat_map(|(i, item)| f(item, i))
            .collect())
    }

    /// Elements satisfying `predicate`
    pub fn filter(&self, mut predicate: impl FnMut(&Value, usize) -> bool) -> Result<Vec<Value>> {
        Ok(self
            .to_vec()?
            .into_iter()
            .enumerate()
            .filter(|(i, item)| predicate(item, *i))
            .map(|(_, item)| item)
            .collect())
    }

    /// Call `f` for each element
    pub fn for_each(&self, mut f: impl FnMut(&Value, usize)) -> Result<()> {
        for (i, item) in self.to_vec()?.iter().enumerate() {
            f(item, i);
        }
        Ok(())
    }

    /// First element satisfying `predicate`
    pub fn find(&self, mut predicate: impl FnMut(&Value, usize) -> bool) -> Result<Option<Value>> {
        Ok(self
            .to_vec()?
            .into_iter()
            .enumerate()
            .find(|(i, item)| predicate(item, *i))
            .map(|(_, item)| item))
    }

    /// Index of the first element satisfying `predicate`
    pub fn find_index(&self, mut predicate: impl FnMut(&Value, usize) -> bool) -> Result<Option<usize>> {
        Ok(self
            .to_vec()?
            .iter()
            .enumerate()
            .position(|(i, item)| predicate(item, i)))
    }

    /// Last element satisfying `predicate`
    pub fn find_last(&self, mut predicate: impl FnMut(&Value, usize) -> bool) -> Result<Option<Value>> {
        Ok(self
            .to_vec()?
            .into_iter()
            .enumerate()
            .rev()
            .find(|(i, item)| predicate(item, *i))
            .map(|(_, item)| item))
    }

    /// Index of the last element satisfying `predicate`
    pub fn find_last_index(
        &self,
        mut predicate: impl FnMut(&Value, usize) -> bool,
    ) -> Result<Option<usize>> {
        Ok(self
            .to_vec()?
            .iter()
            .enumerate()
            .rev()
            .find(|(i, item)| predicate(item, *i))
            .map(|(i, _)| i))
    }

    /// Whether every element satisfies `predicate`
    pub fn every(&self, mut predicate: impl FnMut(&Value, usize) -> bool) -> Result<bool> {
        Ok(self
            .to_vec()?
            .iter()
            .enumerate()
            .all(|(i, item)| predicate(item, i)))
    }

    /// Whether any element satisfies `predicate`
    pub fn some(&self, mut predicate: impl FnMut(&Value, usize) -> bool) -> Result<bool> {
        Ok(self
            .to_vec()?
            .iter()
            .enumerate()
            .any(|(i, item)| predicate(item, i)))
    }

    /// Whether `value` is an element; NaN finds NaN
    pub fn includes(&self, value: &Value) -> Result<bool> {
        let value = self.stm.resolve_key(value);
        self.read(|items| items.contains(&value))
    }

    /// Index of the first strictly equal element
    pub fn index_of(&self, value: &Value) -> Result<Option<usize>> {
        let value = self.stm.resolve_key(value);
        self.read(|items| items.iter().position(|item| item.strict_eq(&value)))
    }

    /// Index of the last strictly equal element
    pub fn last_index_of(&self, value: &Value) -> Result<Option<usize>> {
        let value = self.stm.resolve_key(value);
        self.read(|items| items.iter().rposition(|item| item.strict_eq(&value)))
    }

    /// Elements rendered as text and joined with `separator`; nulls render empty
    pub fn join(&self, separator: &str) -> Result<String> {
        self.read(|items| {
            items
                .iter()
                .map(join_text)
                .collect::<Vec<_>>()
                .join(separator)
        })
    }

    /// Fold left to right starting from the first element
    pub fn reduce(&self, mut f: impl FnMut(Value, &Value, usize) -> Value) -> Result<Option<Value>> {
        let items = self.to_vec()?;
        let mut iter = items.iter().enumerate();
        let Some((_, first)) = iter.next() else {
            return Ok(None);
        };
        Ok(Some(iter.fold(first.clone(), |acc, (i, item)| f(acc, item, i))))
    }

    /// Fold left to right from `init`
    pub fn fold<T>(&self, init: T, mut f: impl FnMut(T, &Value, usize) -> T) -> Result<T> {
        Ok(self
            .to_vec()?
            .iter()
            .enumerate()
            .fold(init, |acc, (i, item)| f(acc, item, i)))
    }

    /// Fold right to left starting from the last element
    pub fn reduce_right(
        &self,
        mut f: impl FnMut(Value, &Value, usize) -> Value,
    ) -> Result<Option<Value>> {
        let items = self.to_vec()?;
        let mut iter = items.iter().enumerate().rev();
        let Some((_, last)) = iter.next() else {
            return Ok(None);
        };
        Ok(Some(iter.fold(last.clone(), |acc, (i, item)| f(acc, item, i))))
    }

    /// Fold right to left from `init`
    pub fn fold_right<T>(&self, init: T, mut f: impl FnMut(T, &Value, usize) -> T) -> Result<T> {
        Ok(self
            .to_vec()?
            .iter()
            .enumerate()
            .rev()
            .fold(init, |acc, (i, item)| f(acc, item, i)))
    }

    // === Mutations ===

    /// Append one element; returns the new length
    pub fn push(&self, value: impl Into<Value>) -> Result<usize> {
        self.push_all([value.into()])
    }

    /// Append elements; returns the new length
    pub fn push_all<I>(&self, items: I) -> Result<usize>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let items = self.wrap_all(items)?;
        let start = self.len()?;
        let handle = self.handle();
        self.write(
            || Change::splice(handle, start, 0, items.clone()),
            |elements| {
                elements.extend(items.iter().cloned());
                elements.len()
            },
        )
    }

    /// Remove and return the last element
    pub fn pop(&self) -> Result<Option<Value>> {
        let len = self.len()?;
        let handle = self.handle();
        self.write(
            || Change::splice(handle, len.saturating_sub(1), len.min(1), Vec::new()),
            |elements| elements.pop(),
        )
    }

    /// Remove and return the first element
    pub fn shift(&self) -> Result<Option<Value>> {
        let len = self.len()?;
        let handle = self.handle();
        self.write(
            || Change::splice(handle, 0, len.min(1), Vec::new()),
            |elements| {
                if elements.is_empty() {
                    None
                } else {
                    Some(elements.remove(0))
                }
            },
        )
    }

    /// Prepend one element; returns the new length
    pub fn unshift(&self, value: impl Into<Value>) -> Result<usize> {
        self.unshift_all([value.into()])
    }

    /// Prepend elements, keeping their order; returns the new length
    pub fn unshift_all<I>(&self, items: I) -> Result<usize>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let items = self.wrap_all(items)?;
        let handle = self.handle();
        self.write(
            || Change::splice(handle, 0, 0, items.clone()),
            |elements| {
                elements.splice(0..0, items.iter().cloned());
                elements.len()
            },
        )
    }

    /// Remove `delete_count` elements at `start` (all to the end when `None`)
    /// and insert `items` there; returns the removed elements
    pub fn splice<I>(&self, start: isize, delete_count: Option<usize>, items: I) -> Result<Vec<Value>>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let items = self.wrap_all(items)?;
        let len = self.len()?;
        let start = relative_index(start, len);
        let count = delete_count.map_or(len - start, |count| count.min(len - start));
        let handle = self.handle();
        self.write(
            || Change::splice(handle, start, count, items.clone()),
            |elements| {
                let start = start.min(elements.len());
                let end = (start + count).min(elements.len());
                elements.splice(start..end, items.iter().cloned()).collect()
            },
        )
    }

    /// Reverse in place
    pub fn reverse(&self) -> Result<()> {
        let handle = self.handle();
        self.write(
            || Change::new(handle, ChangeKind::Reverse),
            |elements| elements.reverse(),
        )
    }

    /// Sort in place by [`Value::compare`]
    pub fn sort(&self) -> Result<()> {
        self.sort_by(|a, b| a.compare(b))
    }

    /// Stable sort in place with a caller comparator
    ///
    /// The comparator runs against a snapshot, so it may read other wrappers.
    pub fn sort_by(&self, mut compare: impl FnMut(&Value, &Value) -> Ordering) -> Result<()> {
        let mut sorted = self.to_vec()?;
        sorted.sort_by(&mut compare);
        let handle = self.handle();
        self.write(
            || Change::new(handle, ChangeKind::Sort),
            move |elements| *elements = sorted,
        )
    }

    /// Overwrite `start..end` with `value`
    pub fn fill(&self, value: impl Into<Value>, start: isize, end: Option<isize>) -> Result<()> {
        let value = self.stm.wrap_member(value.into())?;
        let len = self.len()?;
        let start = relative_index(start, len);
        let end = end.map_or(len, |end| relative_index(end, len)).max(start);
        let handle = self.handle();
        self.write(
            || Change::splice(handle, start, end - start, vec![value.clone(); end - start]),
            |elements| {
                let end = end.min(elements.len());
                for slot in &mut elements[start.min(end)..end] {
                    *slot = value.clone();
                }
            },
        )
    }

    /// Copy the elements in `start..end` over the elements starting at `target`
    pub fn copy_within(&self, target: isize, start: isize, end: Option<isize>) -> Result<()> {
        let len = self.len()?;
        let to = relative_index(target, len);
        let from = relative_index(start, len);
        let end = end.map_or(len, |end| relative_index(end, len));
        let count = end.saturating_sub(from).min(len - to);
        let copied = self.read(|items| items[from..from + count].to_vec())?;
        let handle = self.handle();
        self.write(
            || Change::splice(handle, to, count, copied.clone()),
            |elements| {
                for (offset, item) in copied.iter().enumerate() {
                    if let Some(slot) = elements.get_mut(to + offset) {
                        *slot = item.clone();
                    }
                }
            },
        )
    }

    /// Assign the element at `index`, padding with nulls past the end
    pub fn set(&self, index: usize, value: impl Into<Value>) -> Result<()> {
        check_len(index.saturating_add(1))?;
        let value = self.stm.wrap_member(value.into())?;
        let handle = self.handle();
        self.write(
            || Change::set_value(handle, index, value.clone()),
            |elements| {
                if index >= elements.len() {
                    elements.resize(index + 1, Value::Null);
                }
                elements[index] = value.clone();
            },
        )
    }

    /// Clear the element at `index` to null, keeping the length
    pub fn delete(&self, index: usize) -> Result<bool> {
        let handle = self.handle();
        self.write(
            || Change::delete_value(handle, index),
            |elements| match elements.get_mut(index) {
                Some(slot) => {
                    *slot = Value::Null;
                    true
                }
                None => false,
            },
        )
    }

    /// Truncate, or extend with nulls, to `new_len`
    pub fn set_len(&self, new_len: usize) -> Result<()> {
        check_len(new_len)?;
        let len = self.len()?;
        let handle = self.handle();
        self.write(
            || {
                if new_len < len {
                    Change::splice(handle, new_len, len - new_len, Vec::new())
                } else {
                    Change::splice(handle, len, 0, vec![Value::Null; new_len - len])
                }
            },
            |elements| elements.resize(new_len, Value::Null),
        )
    }
}

impl Capabilities for SequenceRef {
    type Key = usize;

    fn get(&self, key: &usize) -> Result<Option<Value>> {
        SequenceRef::get(self, *key)
    }

    fn set(&self, key: usize, value: Value) -> Result<()> {
        SequenceRef::set(self, key, value)
    }

    fn delete(&self, key: &usize) -> Result<bool> {
        SequenceRef::delete(self, *key)
    }

    fn enumerate(&self) -> Result<Vec<usize>> {
        self.keys()
    }

    fn describe(&self) -> Result<Description> {
        Ok(Description {
            handle: self.handle(),
            kind: ShapeKind::Sequence,
            len: self.len()?,
            generation: self.target.generation(),
        })
    }
}

impl fmt::Debug for SequenceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SequenceRef({})", self.handle())
    }
}
