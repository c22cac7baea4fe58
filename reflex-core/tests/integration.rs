//! Integration Tests for Reactive System
//!
//! These tests verify that observables, effects, computed values and refs
//! work together correctly.

use std::cell::{Cell, RefCell};
use std::fmt::Write as _;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

use reflex_core::observable::{
    is_proxy, is_reactive, is_readonly, mark_raw, reactive, readonly, shallow_readonly, to_raw,
    Target, Value,
};
use reflex_core::reactive::{
    computed, effect, proxy_refs, r#ref, stop, to_refs, EffectOptions, ReactiveContext,
    ReactiveEffect, Runtime,
};
use reflex_core::{writable_computed, ReactiveError};

fn record(entries: &[(&str, i32)]) -> Value {
    Value::from(Target::record_from(entries.iter().copied()))
}

fn counted(f: impl Fn() + 'static) -> (ReactiveEffect, Rc<Cell<usize>>) {
    let runs = Rc::new(Cell::new(0));
    let counter = runs.clone();
    let handle = effect(
        move || {
            counter.set(counter.get() + 1);
            f();
        },
        EffectOptions::new(),
    );
    (handle, runs)
}

/// Collects the fields of every WARN event as one line per event.
struct WarnCapture {
    lines: Arc<Mutex<Vec<String>>>,
}

impl<S: Subscriber> Layer<S> for WarnCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() != Level::WARN {
            return;
        }
        struct Line(String);
        impl Visit for Line {
            fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
                let _ = write!(self.0, "{}={:?} ", field.name(), value);
            }
        }
        let mut line = Line(String::new());
        event.record(&mut line);
        self.lines.lock().expect("warn capture lock").push(line.0);
    }
}

/// Run `f` with a subscriber that records warnings, returning them.
fn capture_warnings(f: impl FnOnce()) -> Vec<String> {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::registry().with(WarnCapture {
        lines: Arc::clone(&lines),
    });
    tracing::subscriber::with_default(subscriber, f);
    let captured = lines.lock().expect("warn capture lock").clone();
    captured
}

/// Test that wrapping is identity-stable and idempotent.
#[test]
fn wrapping_is_stable_and_idempotent() {
    let obj = record(&[("a", 1)]);
    let first = reactive(&obj);

    assert_eq!(reactive(&obj), first);
    assert_eq!(reactive(&first), first);
    assert!(is_proxy(&first));
}

/// Test that primitives are rejected by every factory.
#[test]
fn primitives_wrap_to_undefined() {
    for primitive in [Value::from(1), Value::from("s"), Value::Bool(true), Value::Null] {
        assert_eq!(reactive(&primitive), Value::Undefined);
    }
}

/// Test that an effect re-runs once per actual change.
#[test]
fn effect_reruns_once_per_change() {
    let state = reactive(&record(&[("a", 1)]));
    let (_effect, runs) = {
        let state = state.clone();
        counted(move || {
            state.get("a");
        })
    };
    assert_eq!(runs.get(), 1);

    state.set("a", 2);
    assert_eq!(runs.get(), 2);

    state.set("a", 2);
    assert_eq!(runs.get(), 2);
}

/// Test that push re-runs a length reader exactly once.
#[test]
fn push_reruns_length_reader_once() {
    let arr = reactive(&Value::from(Target::array_from([1, 2, 3])));
    let (_effect, runs) = {
        let arr = arr.clone();
        counted(move || {
            arr.get("length");
        })
    };

    arr.as_proxy().unwrap().push([4]).unwrap();
    assert_eq!(runs.get(), 2);
}

/// Test that includes depends on the elements, so growing the array
/// re-runs it.
#[test]
fn includes_reruns_on_new_index() {
    let arr = reactive(&Value::from(Target::array_from([1, 2, 3])));
    let found = Rc::new(Cell::new(false));
    let (_effect, runs) = {
        let arr = arr.clone();
        let found = found.clone();
        counted(move || found.set(arr.as_proxy().unwrap().includes(9)))
    };
    assert!(!found.get());

    arr.set(5, 9);
    assert_eq!(runs.get(), 2);
    assert!(found.get());
}

/// Test that computed values are lazy and cached.
#[test]
fn computed_is_lazy_and_cached() {
    let state = reactive(&record(&[("n", 1)]));
    let calls = Rc::new(Cell::new(0));
    let doubled = {
        let state = state.clone();
        let calls = calls.clone();
        computed(move || {
            calls.set(calls.get() + 1);
            state.get("n").as_f64().unwrap_or(0.0) * 2.0
        })
    };
    assert_eq!(calls.get(), 0);

    assert_eq!(doubled.value(), Value::from(2.0));
    assert_eq!(doubled.value(), Value::from(2.0));
    assert_eq!(calls.get(), 1);

    state.set("n", 4);
    assert_eq!(calls.get(), 1);
    assert_eq!(doubled.value(), Value::from(8.0));
    assert_eq!(doubled.value(), Value::from(8.0));
    assert_eq!(calls.get(), 2);
}

/// Test that a scheduler receives the effect instead of it running.
#[test]
fn scheduler_takes_over_reruns() {
    let state = reactive(&record(&[("a", 1)]));
    let queue: Rc<RefCell<Vec<ReactiveEffect>>> = Rc::new(RefCell::new(Vec::new()));
    let runs = Rc::new(Cell::new(0));

    let handle = {
        let state = state.clone();
        let runs = runs.clone();
        let queue = queue.clone();
        effect(
            move || {
                runs.set(runs.get() + 1);
                state.get("a");
            },
            EffectOptions::new().scheduler(move |effect| queue.borrow_mut().push(effect.clone())),
        )
    };

    state.set("a", 2);
    assert_eq!(runs.get(), 1);
    assert_eq!(queue.borrow().len(), 1);

    // Flushing the queue runs the effect
    let pending: Vec<_> = queue.borrow_mut().drain(..).collect();
    for job in pending {
        job.run();
    }
    assert_eq!(runs.get(), 2);
    assert_eq!(handle.run_count(), 2);
}

/// Test that a self-writing effect does not recurse unless allowed to.
#[test]
fn self_writes_recurse_only_when_allowed() {
    let state = reactive(&record(&[("n", 0)]));
    let (_guarded, runs) = {
        let state = state.clone();
        counted(move || {
            let n = state.get("n").as_f64().unwrap_or(0.0);
            state.set("n", n + 1.0);
        })
    };
    assert_eq!(runs.get(), 1);
    assert_eq!(state.get("n"), Value::from(1.0));

    let counter = reactive(&record(&[("n", 0)]));
    let recursive_runs = Rc::new(Cell::new(0));
    let _recursive = {
        let counter = counter.clone();
        let recursive_runs = recursive_runs.clone();
        effect(
            move || {
                recursive_runs.set(recursive_runs.get() + 1);
                let n = counter.get("n").as_f64().unwrap_or(0.0);
                if n < 5.0 {
                    counter.set("n", n + 1.0);
                }
            },
            EffectOptions::new().allow_recurse(true),
        )
    };
    assert_eq!(counter.get("n"), Value::from(5.0));
    assert_eq!(recursive_runs.get(), 6);
}

/// Test that readonly writes are rejected without mutation.
#[test]
fn readonly_write_is_a_noop() {
    let raw = record(&[("x", 1)]);
    let locked = readonly(&raw);

    assert!(locked.set("x", 5));
    assert_eq!(raw.get("x"), Value::from(1));
    assert_eq!(
        locked.as_proxy().unwrap().try_set("x", 5),
        Err(ReactiveError::ReadonlyTarget {
            op: "set",
            key: "x".into()
        })
    );
    assert!(is_readonly(&locked));
    assert!(!is_reactive(&locked));
}

/// Test that a rejected readonly write emits one warning naming the key.
#[test]
fn readonly_write_warns() {
    let raw = record(&[("x", 1)]);
    let locked = readonly(&raw);

    let warnings = capture_warnings(|| {
        assert!(locked.set("x", 5));
    });
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("\"x\""), "{}", warnings[0]);
    assert!(warnings[0].contains("readonly"), "{}", warnings[0]);

    // Accepted writes stay silent
    let state = reactive(&raw);
    assert!(capture_warnings(|| {
        state.set("x", 2);
    })
    .is_empty());
}

/// Test that writing a getter-only computed emits one warning naming it.
#[test]
fn getter_only_computed_write_warns() {
    let fixed = computed(|| 1);
    let id = fixed.id().to_string();

    let warnings = capture_warnings(|| fixed.set_value(2));
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains(&id), "{}", warnings[0]);
    assert!(warnings[0].contains("computed value is readonly"), "{}", warnings[0]);
    assert_eq!(fixed.value(), Value::from(1));

    let sink = Rc::new(Cell::new(0.0));
    let mirror = {
        let sink = sink.clone();
        writable_computed(|| 0, move |value| sink.set(value.as_f64().unwrap_or(0.0)))
    };
    assert!(capture_warnings(|| mirror.set_value(3)).is_empty());
    assert_eq!(sink.get(), 3.0);
}

/// Test that to_raw undoes every wrapper.
#[test]
fn to_raw_round_trips() {
    let obj = record(&[]);
    assert_eq!(to_raw(&reactive(&obj)), obj);
    assert_eq!(to_raw(&readonly(&obj)), obj);
    assert_eq!(to_raw(&shallow_readonly(&reactive(&obj))), obj);
}

/// Test that effects pick up new dependencies and drop stale ones.
#[test]
fn dependencies_follow_branches() {
    let state = reactive(&Value::from(Target::record_from([
        ("flag", Value::Bool(true)),
        ("a", Value::from(1)),
        ("b", Value::from(2)),
    ])));
    let (handle, runs) = {
        let state = state.clone();
        counted(move || {
            if state.get("flag") == Value::Bool(true) {
                state.get("a");
            } else {
                state.get("b");
            }
        })
    };
    assert_eq!(handle.dependency_count(), 2);

    state.set("flag", false);
    assert_eq!(runs.get(), 2);

    // "a" is no longer read
    state.set("a", 10);
    assert_eq!(runs.get(), 2);
    state.set("b", 20);
    assert_eq!(runs.get(), 3);
}

/// Test that a stopped effect never re-runs.
#[test]
fn stopped_effect_stays_quiet() {
    let state = reactive(&record(&[("a", 1)]));
    let (handle, runs) = {
        let state = state.clone();
        counted(move || {
            state.get("a");
        })
    };

    stop(&handle);
    state.set("a", 2);
    assert_eq!(runs.get(), 1);
    assert!(!Runtime::is_observed(to_raw(&state).as_target().unwrap().id()));
}

/// Test that nested effects restore the outer one.
#[test]
fn nested_effects_track_independently() {
    let state = reactive(&record(&[("outer", 0), ("inner", 0)]));
    let inner_runs = Rc::new(Cell::new(0));
    let holder: Rc<RefCell<Option<ReactiveEffect>>> = Rc::new(RefCell::new(None));

    let (_outer, outer_runs) = {
        let state = state.clone();
        let inner_runs = inner_runs.clone();
        let holder = holder.clone();
        counted(move || {
            let state_inner = state.clone();
            let inner_runs = inner_runs.clone();
            let inner = effect(
                move || {
                    inner_runs.set(inner_runs.get() + 1);
                    state_inner.get("inner");
                },
                EffectOptions::new(),
            );
            holder.borrow_mut().replace(inner);
            state.get("outer");
        })
    };
    assert_eq!(outer_runs.get(), 1);
    assert_eq!(inner_runs.get(), 1);

    state.set("inner", 1);
    assert_eq!(outer_runs.get(), 1);
    assert_eq!(inner_runs.get(), 2);

    state.set("outer", 1);
    assert_eq!(outer_runs.get(), 2);
    assert_eq!(ReactiveContext::depth(), 0);
}

/// Test that skipped objects are never wrapped, even when nested.
#[test]
fn marked_raw_values_stay_raw() {
    let config = mark_raw(&record(&[("debug", 1)]));
    let state = reactive(&Value::from(Target::record_from([("config", config.clone())])));

    assert_eq!(state.get("config"), config);
    assert!(!is_proxy(&state.get("config")));
}

/// Test that refs and observables compose.
#[test]
fn refs_compose_with_observables() {
    let state = reactive(&record(&[("a", 1), ("b", 2)]));
    let refs = to_refs(&state);
    let total = Rc::new(Cell::new(0.0));
    let _sum = {
        let refs = refs.clone();
        let total = total.clone();
        effect(
            move || {
                let sum: f64 = refs
                    .values()
                    .filter_map(|r| r.value().as_f64())
                    .sum();
                total.set(sum);
            },
            EffectOptions::new(),
        )
    };
    assert_eq!(total.get(), 3.0);

    state.set("b", 10);
    assert_eq!(total.get(), 11.0);

    let count = r#ref(1);
    let view = proxy_refs(&Value::from(Target::record_from([("count", count.clone())])));
    view.set("count", 7);
    assert_eq!(count.value(), Value::from(7));
}

/// Test that dropping the last handle to an observed object releases its
/// dependency entries.
#[test]
fn dropped_targets_release_their_edges() {
    let target = Target::record_from([("a", 1)]);
    let id = target.id();
    let state = reactive(&Value::from(target));
    let handle = {
        let state = state.clone();
        effect(move || state.get("a"), EffectOptions::new())
    };
    assert!(Runtime::is_observed(id));

    drop(handle);
    drop(state);
    assert!(!Runtime::is_observed(id));
}
