//! Property keys.
//!
//! Keys are normalized on construction: a canonical non-negative integer
//! string (`"0"`, `"17"`, but not `"017"` or `"-1"`) becomes
//! [`Key::Index`], everything else is a [`Key::Name`]. This makes
//! `"3"` and `3` the same key, and lets the array-length trigger rule compare
//! indices numerically.

use std::fmt;
use std::rc::Rc;

/// The sentinel key under which arrays expose their length.
pub const LENGTH: &str = "length";

/// The key ref-family cells track and trigger against.
pub const VALUE: &str = "value";

/// A property, map or set key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    /// An integer-like key.
    Index(usize),
    /// Any other string key.
    Name(Rc<str>),
}

impl Key {
    /// The `"length"` key.
    pub fn length() -> Self {
        Key::Name(Rc::from(LENGTH))
    }

    /// The `"value"` key.
    pub fn value() -> Self {
        Key::Name(Rc::from(VALUE))
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            Key::Index(index) => Some(*index),
            Key::Name(_) => None,
        }
    }

    pub fn is_index(&self) -> bool {
        matches!(self, Key::Index(_))
    }

    pub fn is_length(&self) -> bool {
        matches!(self, Key::Name(name) if &**name == LENGTH)
    }

    fn parse(name: &str) -> Self {
        let canonical = !name.is_empty()
            && name.bytes().all(|b| b.is_ascii_digit())
            && (name == "0" || !name.starts_with('0'));
        match canonical.then(|| name.parse::<usize>().ok()).flatten() {
            Some(index) => Key::Index(index),
            None => Key::Name(Rc::from(name)),
        }
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::parse(name)
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::parse(&name)
    }
}

impl From<&String> for Key {
    fn from(name: &String) -> Self {
        Key::parse(name)
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

impl From<i32> for Key {
    fn from(index: i32) -> Self {
        match usize::try_from(index) {
            Ok(index) => Key::Index(index),
            Err(_) => Key::Name(Rc::from(index.to_string())),
        }
    }
}

impl From<&Key> for Key {
    fn from(key: &Key) -> Self {
        key.clone()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Index(index) => write!(f, "{}", index),
            Key::Name(name) => f.write_str(name),
        }
    }
}

/// A key in the dependency store.
///
/// Besides ordinary property keys, a target can be depended on as a whole
/// for enumeration (`keys()`, `len()` on non-arrays, iteration of maps and
/// sets).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DepKey {
    Prop(Key),
    Iterate,
}

impl DepKey {
    pub fn length() -> Self {
        DepKey::Prop(Key::length())
    }

    pub fn value() -> Self {
        DepKey::Prop(Key::value())
    }

    pub fn as_key(&self) -> Option<&Key> {
        match self {
            DepKey::Prop(key) => Some(key),
            DepKey::Iterate => None,
        }
    }
}

impl From<Key> for DepKey {
    fn from(key: Key) -> Self {
        DepKey::Prop(key)
    }
}

impl From<&Key> for DepKey {
    fn from(key: &Key) -> Self {
        DepKey::Prop(key.clone())
    }
}

impl From<&str> for DepKey {
    fn from(name: &str) -> Self {
        DepKey::Prop(Key::from(name))
    }
}

impl fmt::Display for DepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DepKey::Prop(key) => key.fmt(f),
            DepKey::Iterate => f.write_str("<iterate>"),
        }
    }
}
