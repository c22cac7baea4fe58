//! The dynamic value model.
//!
//! A [`Value`] is what flows through observable slots: primitives, raw
//! composites, observable wrappers and ref cells. Composites, wrappers and
//! refs are handles; cloning a value never copies the data behind it.

use std::fmt;
use std::rc::Rc;

use super::proxy::Proxy;
use super::target::{Target, MAX_ARRAY_LENGTH};
use crate::graph::Key;
use crate::reactive::RefHandle;

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    /// A raw, unobserved composite.
    Object(Target),
    /// An observable wrapper around a composite.
    Proxy(Proxy),
    /// A ref-family cell.
    Ref(RefHandle),
}

impl Value {
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// Whether this is a composite, raw or wrapped.
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Proxy(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_target(&self) -> Option<&Target> {
        match self {
            Value::Object(target) => Some(target),
            _ => None,
        }
    }

    pub fn as_proxy(&self) -> Option<&Proxy> {
        match self {
            Value::Proxy(proxy) => Some(proxy),
            _ => None,
        }
    }

    pub fn as_ref_handle(&self) -> Option<&RefHandle> {
        match self {
            Value::Ref(handle) => Some(handle),
            _ => None,
        }
    }

    /// Interpret the value as an array length.
    pub fn as_length(&self) -> Option<usize> {
        match self {
            Value::Number(n)
                if *n >= 0.0 && n.fract() == 0.0 && *n <= MAX_ARRAY_LENGTH as f64 =>
            {
                Some(*n as usize)
            }
            _ => None,
        }
    }

    /// `Object.is` equality: `NaN` equals itself, `+0` and `-0` differ,
    /// handles compare by identity.
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => {
                a.to_bits() == b.to_bits() || (a.is_nan() && b.is_nan())
            }
            _ => self.same_non_number(other),
        }
    }

    /// Like [`same_value`](Self::same_value) but `+0` equals `-0`.
    pub fn same_value_zero(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            _ => self.same_non_number(other),
        }
    }

    /// Strict equality: `NaN` differs from everything, `+0` equals `-0`.
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            _ => self.same_non_number(other),
        }
    }

    fn same_non_number(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Proxy(a), Value::Proxy(b)) => a.ptr_eq(b),
            (Value::Ref(a), Value::Ref(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Read `key`. Wrappers intercept the read; raw composites are read
    /// directly; anything else yields `Undefined`.
    pub fn get(&self, key: impl Into<Key>) -> Value {
        match self {
            Value::Proxy(proxy) => proxy.get(key),
            Value::Object(target) => target.get(&key.into()),
            _ => Value::Undefined,
        }
    }

    /// Write `key`. Returns `false` when the value is not a composite or the
    /// write is invalid for its shape. Writes to readonly wrappers warn and
    /// report success without mutating.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> bool {
        match self {
            Value::Proxy(proxy) => proxy.set(key, value),
            Value::Object(target) => target.set(key, value),
            _ => false,
        }
    }

    pub fn has(&self, key: impl Into<Key>) -> bool {
        match self {
            Value::Proxy(proxy) => proxy.has(key),
            Value::Object(target) => target.has(&key.into()),
            _ => false,
        }
    }

    pub fn keys(&self) -> Vec<Key> {
        match self {
            Value::Proxy(proxy) => proxy.keys(),
            Value::Object(target) => target.keys(),
            _ => Vec::new(),
        }
    }

    /// Entry count of a composite.
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::Proxy(proxy) => Some(proxy.len()),
            Value::Object(target) => Some(target.len()),
            _ => None,
        }
    }
}

/// `!Object.is(value, old)`.
pub fn has_changed(value: &Value, old: &Value) -> bool {
    !value.same_value(old)
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.same_value(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Object(target) => write!(f, "Object({} {})", target.shape(), target.id()),
            Value::Proxy(proxy) => fmt::Debug::fmt(proxy, f),
            Value::Ref(handle) => write!(f, "Ref({})", handle.id()),
        }
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Undefined
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<Rc<str>> for Value {
    fn from(s: Rc<str>) -> Self {
        Value::String(s)
    }
}

impl From<Target> for Value {
    fn from(target: Target) -> Self {
        Value::Object(target)
    }
}

impl From<&Target> for Value {
    fn from(target: &Target) -> Self {
        Value::Object(target.clone())
    }
}

impl From<Proxy> for Value {
    fn from(proxy: Proxy) -> Self {
        Value::Proxy(proxy)
    }
}

impl From<&Value> for Value {
    fn from(value: &Value) -> Self {
        value.clone()
    }
}

impl From<RefHandle> for Value {
    fn from(handle: RefHandle) -> Self {
        Value::Ref(handle)
    }
}

impl From<Key> for Value {
    fn from(key: Key) -> Self {
        match key {
            Key::Index(index) => Value::from(index),
            Key::Name(name) => Value::String(name),
        }
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_is_the_same_value_as_itself() {
        let nan = Value::from(f64::NAN);
        assert!(nan.same_value(&nan));
        assert!(!has_changed(&nan, &Value::from(f64::NAN)));
        assert!(!nan.strict_equals(&nan));
        assert!(nan.same_value_zero(&nan));
    }

    #[test]
    fn signed_zeros_differ_only_under_same_value() {
        let pos = Value::from(0.0);
        let neg = Value::from(-0.0);
        assert!(!pos.same_value(&neg));
        assert!(pos.same_value_zero(&neg));
        assert!(pos.strict_equals(&neg));
    }

    #[test]
    fn composites_compare_by_identity() {
        let a = Target::record();
        let b = Target::record();
        assert_eq!(Value::from(&a), Value::from(&a));
        assert_ne!(Value::from(&a), Value::from(&b));
    }

    #[test]
    fn mixed_kinds_are_never_equal() {
        assert_ne!(Value::from(1), Value::from("1"));
        assert_ne!(Value::Null, Value::Undefined);
        assert_eq!(Value::from(()), Value::Undefined);
    }

    #[test]
    fn lengths_must_be_non_negative_integers() {
        assert_eq!(Value::from(3).as_length(), Some(3));
        assert_eq!(Value::from(-1).as_length(), None);
        assert_eq!(Value::from(1.5).as_length(), None);
        assert_eq!(Value::from("3").as_length(), None);
    }

    #[test]
    fn primitives_have_no_properties() {
        assert_eq!(Value::from(1).get("a"), Value::Undefined);
        assert!(!Value::Null.set("a", 1));
        assert_eq!(Value::from("x").len(), None);
    }
}
