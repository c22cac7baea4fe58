//! JSON Bridge
//!
//! Serializes a [`Value`] as a snapshot of its raw data and builds values
//! from JSON documents.
//!
//! Serialization reads through wrappers and refs without tracking, so it is
//! safe to call inside an effect. Cyclic structures fail with
//! [`ReactiveError::Cyclic`].

use std::cell::RefCell;

use serde::de::{Deserialize, Deserializer};
use serde::ser::{Error as _, Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::error::ReactiveError;
use crate::graph::TargetId;
use crate::observable::{Composite, Target, Value};
use crate::reactive::untracked;

/// Largest integer an `f64` holds exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// A value plus the targets currently being serialized above it.
struct Snapshot<'a> {
    value: &'a Value,
    path: &'a RefCell<Vec<TargetId>>,
}

impl Snapshot<'_> {
    fn child<'b>(&'b self, value: &'b Value) -> Snapshot<'b> {
        Snapshot {
            value,
            path: self.path,
        }
    }

    fn target<S: Serializer>(&self, target: &Target, serializer: S) -> Result<S::Ok, S::Error> {
        let id = target.id();
        if self.path.borrow().contains(&id) {
            return Err(S::Error::custom(ReactiveError::Cyclic(id)));
        }
        self.path.borrow_mut().push(id);
        let result = self.composite(&target.data(), serializer);
        self.path.borrow_mut().pop();
        result
    }

    fn composite<S: Serializer>(&self, data: &Composite, serializer: S) -> Result<S::Ok, S::Error> {
        match data {
            Composite::Record(entries) | Composite::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(&key.to_string(), &self.child(value))?;
                }
                map.end()
            }
            Composite::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(&self.child(item))?;
                }
                seq.end()
            }
            Composite::Set(members) => {
                let mut seq = serializer.serialize_seq(Some(members.len()))?;
                for member in members {
                    seq.serialize_element(&member.to_string())?;
                }
                seq.end()
            }
        }
    }
}

impl Serialize for Snapshot<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.value {
            Value::Undefined | Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER => {
                serializer.serialize_i64(*n as i64)
            }
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::String(s) => serializer.serialize_str(s),
            Value::Object(target) => self.target(target, serializer),
            Value::Proxy(proxy) => self.target(proxy.target(), serializer),
            Value::Ref(handle) => {
                let inner = untracked(|| handle.value());
                self.child(&inner).serialize(serializer)
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let path = RefCell::new(Vec::new());
        Snapshot {
            value: self,
            path: &path,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => n.as_f64().map(Value::Number).unwrap_or_default(),
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => {
                Value::Object(Target::array_from(items.into_iter().map(Value::from)))
            }
            serde_json::Value::Object(entries) => Value::Object(Target::record_from(
                entries.into_iter().map(|(key, value)| (key, Value::from(value))),
            )),
        }
    }
}

impl Value {
    /// Parse a JSON document into raw composites.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize a raw snapshot of this value as JSON text.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
