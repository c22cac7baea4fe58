//! Reflex Core
//!
//! A fine-grained reactive dependency-tracking engine. Effects discover
//! which pieces of observable state they read while they run, and re-run
//! exactly when those pieces change.
//!
//! It implements:
//!
//! - Effects with optional schedulers and debugger hooks
//! - Observable wrappers over records, arrays, maps and sets
//! - Lazily invalidated computed values
//! - Ref cells: boxed values, property aliases and user-defined refs
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `graph`: keys, operation kinds and the dependency store
//! - `reactive`: tracking context, effects, computed values and refs
//! - `observable`: the value model and the proxy factory
//! - `error`: errors reported by checked writes
//!
//! Everything is single-threaded: state lives in thread-locals and handles
//! are `Rc`-based.
//!
//! # Example
//!
//! ```rust
//! use reflex_core::observable::{reactive, Target, Value};
//! use reflex_core::reactive::{computed, effect, EffectOptions};
//!
//! let state = reactive(&Value::from(Target::record_from([("count", 1)])));
//!
//! let source = state.clone();
//! let doubled = computed(move || source.get("count").as_f64().unwrap_or(0.0) * 2.0);
//!
//! let view = doubled.clone();
//! let _render = effect(
//!     move || println!("doubled = {:?}", view.value()),
//!     EffectOptions::new(),
//! );
//!
//! // Effect automatically runs, prints: "doubled = 10"
//! state.set("count", 5);
//! ```

pub mod error;
pub mod graph;
pub mod observable;
pub mod reactive;

#[cfg(feature = "json")]
mod json;

pub use error::{ReactiveError, Result};
pub use observable::{
    is_proxy, is_reactive, is_readonly, mark_raw, reactive, readonly, shallow_reactive,
    shallow_readonly, to_raw, Proxy, Target, Value,
};
pub use reactive::{
    computed, custom_ref, effect, r#ref, shallow_ref, stop, to_ref, to_refs, writable_computed,
    Computed, EffectOptions, ReactiveEffect, Ref,
};
