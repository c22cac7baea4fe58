//! Raw composites.
//!
//! A [`Target`] is the plain, unobserved data behind an observable wrapper.
//! Reading or writing a target directly never tracks or triggers anything;
//! the wrappers in [`super::proxy`] add that on top.

use std::cell::{Cell, Ref, RefCell};
use std::collections::TryReserveError;
use std::fmt;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};
use tracing::warn;

use super::proxy;
use super::value::Value;
use crate::error::{ReactiveError, Result};
use crate::graph::{Identity, Key, TargetId};

/// Largest length an array target may grow to. Indices run below it.
pub const MAX_ARRAY_LENGTH: usize = u32::MAX as usize;

/// The concrete shape of a composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    Record,
    Array,
    Map,
    Set,
}

impl Shape {
    pub fn is_collection(self) -> bool {
        matches!(self, Shape::Map | Shape::Set)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Record => write!(f, "record"),
            Shape::Array => write!(f, "array"),
            Shape::Map => write!(f, "map"),
            Shape::Set => write!(f, "set"),
        }
    }
}

/// How a target may be wrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetType {
    /// Frozen or marked raw; returned unchanged by the factory.
    Invalid,
    /// Records and arrays, intercepted by the base handlers.
    Common,
    /// Maps and sets, intercepted by the collection handlers.
    Collection,
}

/// The data inside a target.
#[derive(Debug, Clone)]
pub enum Composite {
    Record(IndexMap<Key, Value>),
    Array(Vec<Value>),
    Map(IndexMap<Key, Value>),
    Set(IndexSet<Key>),
}

impl Composite {
    pub fn shape(&self) -> Shape {
        match self {
            Composite::Record(_) => Shape::Record,
            Composite::Array(_) => Shape::Array,
            Composite::Map(_) => Shape::Map,
            Composite::Set(_) => Shape::Set,
        }
    }
}

/// What a raw write replaced.
#[derive(Debug, Clone)]
pub(crate) struct Written {
    pub(crate) had_key: bool,
    pub(crate) old_value: Value,
}

/// A reference-counted raw composite with a stable identity.
///
/// Clones share the same data. When the last handle is dropped, every
/// dependency edge and cached wrapper keyed by this target goes with it.
#[derive(Clone)]
pub struct Target {
    inner: Rc<TargetInner>,
}

struct TargetInner {
    identity: Identity,
    data: RefCell<Composite>,
    skip: Cell<bool>,
    frozen: Cell<bool>,
}

impl Drop for TargetInner {
    fn drop(&mut self) {
        proxy::evict(self.identity.id());
    }
}

impl Target {
    pub fn new(data: Composite) -> Self {
        Self {
            inner: Rc::new(TargetInner {
                identity: Identity::new(),
                data: RefCell::new(data),
                skip: Cell::new(false),
                frozen: Cell::new(false),
            }),
        }
    }

    pub fn record() -> Self {
        Self::new(Composite::Record(IndexMap::new()))
    }

    pub fn array() -> Self {
        Self::new(Composite::Array(Vec::new()))
    }

    pub fn map() -> Self {
        Self::new(Composite::Map(IndexMap::new()))
    }

    pub fn empty_set() -> Self {
        Self::new(Composite::Set(IndexSet::new()))
    }

    pub fn record_from<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Key>,
        V: Into<Value>,
    {
        Self::new(Composite::Record(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        ))
    }

    pub fn array_from<V: Into<Value>>(items: impl IntoIterator<Item = V>) -> Self {
        Self::new(Composite::Array(items.into_iter().map(Into::into).collect()))
    }

    pub fn map_from<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Key>,
        V: Into<Value>,
    {
        Self::new(Composite::Map(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        ))
    }

    pub fn set_from<K: Into<Key>>(members: impl IntoIterator<Item = K>) -> Self {
        Self::new(Composite::Set(members.into_iter().map(Into::into).collect()))
    }

    pub fn id(&self) -> TargetId {
        self.inner.identity.id()
    }

    pub fn shape(&self) -> Shape {
        self.inner.data.borrow().shape()
    }

    pub fn ptr_eq(&self, other: &Target) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Make the target non-extensible: it can no longer be wrapped, and raw
    /// writes are rejected.
    pub fn freeze(&self) -> &Self {
        self.inner.frozen.set(true);
        self
    }

    pub fn is_frozen(&self) -> bool {
        self.inner.frozen.get()
    }

    /// Set the skip marker so the proxy factory leaves this target alone.
    pub fn mark_raw(&self) -> &Self {
        self.inner.skip.set(true);
        self
    }

    pub fn is_skipped(&self) -> bool {
        self.inner.skip.get()
    }

    pub fn target_type(&self) -> TargetType {
        if self.is_skipped() || self.is_frozen() {
            return TargetType::Invalid;
        }
        if self.shape().is_collection() {
            TargetType::Collection
        } else {
            TargetType::Common
        }
    }

    /// Borrow the data for inspection.
    pub fn data(&self) -> Ref<'_, Composite> {
        self.inner.data.borrow()
    }

    // ---- Raw reads ----

    pub fn get(&self, key: &Key) -> Value {
        match &*self.data() {
            Composite::Record(map) | Composite::Map(map) => {
                map.get(key).cloned().unwrap_or_default()
            }
            Composite::Array(items) => match key.as_index() {
                Some(index) => items.get(index).cloned().unwrap_or_default(),
                None if key.is_length() => Value::from(items.len()),
                None => Value::Undefined,
            },
            Composite::Set(_) => Value::Undefined,
        }
    }

    pub fn has(&self, key: &Key) -> bool {
        match &*self.data() {
            Composite::Record(map) | Composite::Map(map) => map.contains_key(key),
            Composite::Array(items) => match key.as_index() {
                Some(index) => index < items.len(),
                None => key.is_length(),
            },
            Composite::Set(members) => members.contains(key),
        }
    }

    pub fn len(&self) -> usize {
        match &*self.data() {
            Composite::Record(map) | Composite::Map(map) => map.len(),
            Composite::Array(items) => items.len(),
            Composite::Set(members) => members.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<Key> {
        match &*self.data() {
            Composite::Record(map) | Composite::Map(map) => map.keys().cloned().collect(),
            Composite::Array(items) => (0..items.len()).map(Key::Index).collect(),
            Composite::Set(members) => members.iter().cloned().collect(),
        }
    }

    pub fn values(&self) -> Vec<Value> {
        match &*self.data() {
            Composite::Record(map) | Composite::Map(map) => map.values().cloned().collect(),
            Composite::Array(items) => items.clone(),
            Composite::Set(members) => members.iter().cloned().map(Value::from).collect(),
        }
    }

    pub fn entries(&self) -> Vec<(Key, Value)> {
        match &*self.data() {
            Composite::Record(map) | Composite::Map(map) => {
                map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
            }
            Composite::Array(items) => items
                .iter()
                .enumerate()
                .map(|(index, value)| (Key::Index(index), value.clone()))
                .collect(),
            Composite::Set(members) => members
                .iter()
                .map(|member| (member.clone(), Value::from(member.clone())))
                .collect(),
        }
    }

    // ---- Raw writes ----

    /// Write without notifying anyone. Returns `false` if the write was
    /// rejected.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> bool {
        match self.write(&key.into(), value.into()) {
            Ok(_) => true,
            Err(err) => {
                warn!(target = %self.id(), "{}", err);
                false
            }
        }
    }

    fn check_writable(&self) -> Result<()> {
        if self.is_frozen() {
            return Err(ReactiveError::Frozen(self.id()));
        }
        Ok(())
    }

    pub(crate) fn write(&self, key: &Key, value: Value) -> Result<Written> {
        self.check_writable()?;
        let shape = self.shape();
        let mut data = self.inner.data.borrow_mut();
        match &mut *data {
            Composite::Record(map) | Composite::Map(map) => {
                let old_value = map.insert(key.clone(), value);
                Ok(Written {
                    had_key: old_value.is_some(),
                    old_value: old_value.unwrap_or_default(),
                })
            }
            Composite::Array(items) => {
                if let Some(index) = key.as_index() {
                    if index < items.len() {
                        let old_value = std::mem::replace(&mut items[index], value);
                        return Ok(Written {
                            had_key: true,
                            old_value,
                        });
                    }
                    let invalid = || ReactiveError::InvalidKey {
                        key: key.clone(),
                        shape,
                    };
                    if index >= MAX_ARRAY_LENGTH {
                        return Err(invalid());
                    }
                    reserve_to(items, index + 1).map_err(|_| invalid())?;
                    items.resize(index, Value::Undefined);
                    items.push(value);
                    return Ok(Written {
                        had_key: false,
                        old_value: Value::Undefined,
                    });
                }
                if key.is_length() {
                    let len = value
                        .as_length()
                        .ok_or_else(|| ReactiveError::InvalidLength(value.clone()))?;
                    reserve_to(items, len)
                        .map_err(|_| ReactiveError::InvalidLength(value.clone()))?;
                    let old_value = Value::from(items.len());
                    items.resize(len, Value::Undefined);
                    return Ok(Written {
                        had_key: true,
                        old_value,
                    });
                }
                Err(ReactiveError::InvalidKey {
                    key: key.clone(),
                    shape,
                })
            }
            Composite::Set(_) => Err(ReactiveError::Unsupported { op: "set", shape }),
        }
    }

    /// Remove `key`, returning what was there.
    ///
    /// Deleting an array slot leaves a hole (`Undefined`) and keeps the length.
    pub(crate) fn remove(&self, key: &Key) -> Result<Option<Value>> {
        self.check_writable()?;
        let shape = self.shape();
        let mut data = self.inner.data.borrow_mut();
        match &mut *data {
            Composite::Record(map) | Composite::Map(map) => Ok(map.shift_remove(key)),
            Composite::Array(items) => match key.as_index() {
                Some(index) if index < items.len() => {
                    Ok(Some(std::mem::take(&mut items[index])))
                }
                Some(_) => Ok(None),
                None => Err(ReactiveError::InvalidKey {
                    key: key.clone(),
                    shape,
                }),
            },
            Composite::Set(members) => Ok(members.shift_take(key).map(Value::from)),
        }
    }

    /// Add a member to a set target. Returns `false` if it was present.
    pub(crate) fn insert(&self, member: Key) -> Result<bool> {
        self.check_writable()?;
        let shape = self.shape();
        match &mut *self.inner.data.borrow_mut() {
            Composite::Set(members) => Ok(members.insert(member)),
            _ => Err(ReactiveError::Unsupported { op: "add", shape }),
        }
    }

    /// Empty a map or set target. Returns whether it had any entries.
    pub(crate) fn clear(&self) -> Result<bool> {
        self.check_writable()?;
        let shape = self.shape();
        match &mut *self.inner.data.borrow_mut() {
            Composite::Map(map) => {
                let had_entries = !map.is_empty();
                map.clear();
                Ok(had_entries)
            }
            Composite::Set(members) => {
                let had_entries = !members.is_empty();
                members.clear();
                Ok(had_entries)
            }
            _ => Err(ReactiveError::Unsupported { op: "clear", shape }),
        }
    }

    /// Mutate an array target in place.
    pub(crate) fn with_array_mut<R>(
        &self,
        op: &'static str,
        f: impl FnOnce(&mut Vec<Value>) -> R,
    ) -> Result<R> {
        self.check_writable()?;
        let shape = self.shape();
        match &mut *self.inner.data.borrow_mut() {
            Composite::Array(items) => Ok(f(items)),
            _ => Err(ReactiveError::Unsupported { op, shape }),
        }
    }

    /// A copy of an array target's elements.
    pub(crate) fn array_snapshot(&self) -> Option<Vec<Value>> {
        match &*self.data() {
            Composite::Array(items) => Some(items.clone()),
            _ => None,
        }
    }
}

/// Make room for `len` elements without aborting when the allocation fails.
fn reserve_to(items: &mut Vec<Value>, len: usize) -> std::result::Result<(), TryReserveError> {
    items.try_reserve(len.saturating_sub(items.len()))
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("id", &self.id())
            .field("shape", &self.shape())
            .field("len", &self.len())
            .finish()
    }
}

impl PartialEq for Target {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Target {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_writes_past_the_end_pad_with_undefined() {
        let arr = Target::array_from([1, 2]);
        let written = arr.write(&Key::Index(4), Value::from(5)).unwrap();

        assert!(!written.had_key);
        assert_eq!(arr.len(), 5);
        assert_eq!(arr.get(&Key::Index(3)), Value::Undefined);
        assert_eq!(arr.get(&Key::length()), Value::from(5));
    }

    #[test]
    fn array_length_write_truncates() {
        let arr = Target::array_from([1, 2, 3]);
        let written = arr.write(&Key::length(), Value::from(1)).unwrap();

        assert_eq!(written.old_value, Value::from(3));
        assert_eq!(arr.values(), vec![Value::from(1)]);
    }

    #[test]
    fn invalid_length_is_rejected() {
        let arr = Target::array();
        assert_eq!(
            arr.write(&Key::length(), Value::from(-1)).unwrap_err(),
            ReactiveError::InvalidLength(Value::from(-1))
        );
        assert!(!arr.set("name", 1));
    }

    #[test]
    fn oversized_array_writes_are_rejected() {
        let arr = Target::array_from([1, 2, 3]);
        for index in [usize::MAX, 10_000_000_000, MAX_ARRAY_LENGTH] {
            assert_eq!(
                arr.write(&Key::Index(index), Value::from(9)).unwrap_err(),
                ReactiveError::InvalidKey {
                    key: Key::Index(index),
                    shape: Shape::Array
                }
            );
        }
        let too_long = Value::from(MAX_ARRAY_LENGTH as f64 + 1.0);
        assert_eq!(
            arr.write(&Key::length(), too_long.clone()).unwrap_err(),
            ReactiveError::InvalidLength(too_long)
        );
        assert_eq!(arr.len(), 3);
    }

    #[test]
    fn record_write_reports_previous_value() {
        let obj = Target::record_from([("a", 1)]);
        let written = obj.write(&Key::from("a"), Value::from(2)).unwrap();
        assert!(written.had_key);
        assert_eq!(written.old_value, Value::from(1));

        let written = obj.write(&Key::from("b"), Value::from(3)).unwrap();
        assert!(!written.had_key);
        assert_eq!(obj.keys(), vec![Key::from("a"), Key::from("b")]);
    }

    #[test]
    fn frozen_targets_reject_writes() {
        let obj = Target::record();
        obj.freeze();
        assert!(!obj.set("a", 1));
        assert_eq!(obj.target_type(), TargetType::Invalid);
        assert!(!obj.has(&Key::from("a")));
    }

    #[test]
    fn target_types() {
        assert_eq!(Target::record().target_type(), TargetType::Common);
        assert_eq!(Target::array().target_type(), TargetType::Common);
        assert_eq!(Target::map().target_type(), TargetType::Collection);

        let skipped = Target::empty_set();
        skipped.mark_raw();
        assert_eq!(skipped.target_type(), TargetType::Invalid);
    }

    #[test]
    fn sets_store_keys() {
        let set = Target::set_from(["a", "b"]);
        assert!(set.has(&Key::from("a")));
        assert!(!set.insert(Key::from("a")).unwrap());
        assert_eq!(set.remove(&Key::from("b")).unwrap(), Some(Value::from("b")));
        assert!(set.clear().unwrap());
        assert!(set.is_empty());
    }

    #[test]
    fn deleting_an_array_slot_leaves_a_hole() {
        let arr = Target::array_from([1, 2, 3]);
        assert_eq!(arr.remove(&Key::Index(1)).unwrap(), Some(Value::from(2)));
        assert_eq!(arr.len(), 3);
        assert_eq!(arr.get(&Key::Index(1)), Value::Undefined);
    }
}
