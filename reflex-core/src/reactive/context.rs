//! Reactive Context
//!
//! The reactive context tracks which effect is currently running and whether
//! reads are allowed to record dependencies at all.
//!
//! # Implementation
//!
//! Two thread-local stacks:
//!
//! - the effect stack. Running an effect pushes it; the innermost entry is
//!   the active effect. Nested effects work because the outer one becomes
//!   active again when the inner one pops.
//! - the tracking stack. [`pause_tracking`] and [`enable_tracking`] push the
//!   previous flag and set a new one; [`reset_tracking`] pops it back. Callers
//!   never need to remember what the flag was.
//!
//! Both stacks are restored by guards, so a panicking computation cannot
//! leave a stale active effect behind.

use std::cell::RefCell;

use smallvec::SmallVec;

use super::effect::ReactiveEffect;
use super::EffectId;

thread_local! {
    static CONTEXT: RefCell<ContextState> = RefCell::new(ContextState::new());
}

struct ContextState {
    effect_stack: Vec<ReactiveEffect>,
    should_track: bool,
    track_stack: SmallVec<[bool; 8]>,
}

impl ContextState {
    fn new() -> Self {
        Self {
            effect_stack: Vec::new(),
            should_track: true,
            track_stack: SmallVec::new(),
        }
    }
}

/// Guard that pops the active effect when dropped.
pub struct ReactiveContext {
    effect: EffectId,
}

impl ReactiveContext {
    /// Make `effect` the active effect and enable tracking.
    ///
    /// Both are undone when the returned guard is dropped.
    pub(crate) fn enter(effect: ReactiveEffect) -> Self {
        let id = effect.id();
        CONTEXT.with(|context| {
            let mut context = context.borrow_mut();
            let previous = context.should_track;
            context.track_stack.push(previous);
            context.should_track = true;
            context.effect_stack.push(effect);
        });

        Self { effect: id }
    }

    /// Check if an effect is currently running.
    pub fn is_active() -> bool {
        CONTEXT.with(|context| !context.borrow().effect_stack.is_empty())
    }

    /// The innermost running effect, if any.
    pub fn active_effect() -> Option<ReactiveEffect> {
        CONTEXT.with(|context| context.borrow().effect_stack.last().cloned())
    }

    pub fn active_effect_id() -> Option<EffectId> {
        CONTEXT.with(|context| context.borrow().effect_stack.last().map(ReactiveEffect::id))
    }

    /// Whether `effect` is anywhere on the effect stack.
    pub fn contains(effect: EffectId) -> bool {
        CONTEXT.with(|context| {
            context
                .borrow()
                .effect_stack
                .iter()
                .any(|running| running.id() == effect)
        })
    }

    /// Number of effects currently on the stack.
    pub fn depth() -> usize {
        CONTEXT.with(|context| context.borrow().effect_stack.len())
    }

    /// Whether reads may currently record dependencies.
    pub fn should_track() -> bool {
        CONTEXT.with(|context| context.borrow().should_track)
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        let popped = CONTEXT.with(|context| {
            let mut context = context.borrow_mut();
            let popped = context.effect_stack.pop();
            context.should_track = context.track_stack.pop().unwrap_or(true);
            popped
        });

        if let Some(effect) = popped {
            debug_assert_eq!(
                effect.id(),
                self.effect,
                "ReactiveContext mismatch: expected {}, got {}",
                self.effect,
                effect.id()
            );
        }
    }
}

/// Stop reads from recording dependencies until the matching [`reset_tracking`].
pub fn pause_tracking() {
    CONTEXT.with(|context| {
        let mut context = context.borrow_mut();
        let previous = context.should_track;
        context.track_stack.push(previous);
        context.should_track = false;
    });
}

/// Allow reads to record dependencies until the matching [`reset_tracking`].
pub fn enable_tracking() {
    CONTEXT.with(|context| {
        let mut context = context.borrow_mut();
        let previous = context.should_track;
        context.track_stack.push(previous);
        context.should_track = true;
    });
}

/// Restore the tracking flag saved by the last pause/enable.
pub fn reset_tracking() {
    CONTEXT.with(|context| {
        let mut context = context.borrow_mut();
        context.should_track = context.track_stack.pop().unwrap_or(true);
    });
}

/// Guard form of [`pause_tracking`]; resets on drop.
pub(crate) struct TrackingPaused(());

impl TrackingPaused {
    pub(crate) fn new() -> Self {
        pause_tracking();
        Self(())
    }
}

impl Drop for TrackingPaused {
    fn drop(&mut self) {
        reset_tracking();
    }
}

/// Run `f` without recording any dependency for the active effect.
pub fn untracked<T>(f: impl FnOnce() -> T) -> T {
    let _paused = TrackingPaused::new();
    f()
}
