//! Reactive Primitives
//!
//! This module implements the core of the engine: effects, the tracking
//! context, computed values and refs.
//!
//! # Concepts
//!
//! ## Effects
//!
//! An effect is a computation that re-runs whenever something it read
//! changes. Reads are discovered while it runs; nothing is declared up
//! front. A scheduler can take over the decision of when a re-run happens.
//!
//! ## Computed
//!
//! A computed value caches a derivation. Source changes only mark it dirty;
//! it recomputes on the next read.
//!
//! ## Refs
//!
//! A ref is a single observable slot, for values that are not composites
//! or when a whole value is replaced rather than mutated.
//!
//! # Implementation Notes
//!
//! A thread-local stack records the running effect. Observable reads call
//! [`track`], which links the read to that effect; writes call [`trigger`],
//! which re-runs every effect linked to what was written.

mod computed;
mod context;
mod effect;
mod refs;
mod runtime;
mod subscriber;

pub use computed::{computed, writable_computed, Computed};
pub use context::{enable_tracking, pause_tracking, reset_tracking, untracked, ReactiveContext};
pub(crate) use context::TrackingPaused;
pub use effect::{effect, effect_from, stop, EffectFn, EffectOptions, ReactiveEffect, Scheduler};
pub use refs::{
    custom_ref, is_ref, proxy_refs, r#ref, shallow_ref, to_ref, to_refs, trigger_ref, unref,
    CustomRef, CustomRefHooks, ObjectRef, Ref, RefHandle, RefLike, RefsView,
};
pub use runtime::{track, trigger, Runtime, TrackEvent, TriggerEvent};
pub use subscriber::EffectId;
