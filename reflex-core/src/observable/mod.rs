//! Observable Containers
//!
//! Plain data enters the tracked graph here. A [`Target`] is a raw record,
//! array, map or set; wrapping it with [`reactive`], [`shallow_reactive`],
//! [`readonly`] or [`shallow_readonly`] yields a [`Proxy`] whose accessors
//! call `track` on reads and `trigger` on writes.
//!
//! # Example
//!
//! ```rust
//! use reflex_core::observable::{reactive, Target, Value};
//! use reflex_core::reactive::{effect, EffectOptions};
//!
//! let state = reactive(&Value::from(Target::record_from([("count", 0)])));
//!
//! let reader = state.clone();
//! let _log = effect(move || println!("count = {:?}", reader.get("count")), EffectOptions::new());
//!
//! state.set("count", 1); // prints "count = 1"
//! ```
//!
//! Wrapping is lazy: nested composites are wrapped when they are read, not
//! when the outer container is wrapped.

mod arrays;
mod collections;
mod handlers;
mod proxy;
mod target;
mod value;

pub use proxy::{
    is_proxy, is_reactive, is_readonly, is_shallow, mark_raw, reactive, readonly,
    shallow_reactive, shallow_readonly, to_raw, Proxy, ReactiveFlag,
};
pub use target::{Composite, Shape, Target, TargetType, MAX_ARRAY_LENGTH};
pub use value::{has_changed, Value};
