//! Fine-grained reactivity: signals, deriveds, effects, scopes.
//!
//! The graph is single-threaded and lives in thread-local state. A signal
//! is a value cell with a revision counter and a subscriber list. A
//! derived is a lazily memoized computation that is both an observer (of
//! its dependencies) and an observable (for its readers). An effect is a
//! side-effecting observer scheduled onto a queue and flushed in
//! dependency order.
//!
//! Change propagation is push-mark / pull-value: writing a signal marks
//! downstream deriveds stale and schedules downstream effects; derived
//! values recompute only when read. A derived whose recomputed value
//! equals the memo keeps its revision, so equal writes are cut off as
//! early as possible.
//!
//! Ownership follows scopes: every effect created inside a scope is
//! disposed with it, and disposal removes the effect from every
//! subscriber list it joined.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::error::Error;

// =============================================================================
// Runtime
// =============================================================================

/// Effects re-entering themselves via their own writes get one extra pass
/// per flush, then the flush drops them and reports a cycle.
const EFFECT_RERUN_CAP: u32 = 2;

struct Runtime {
    clock: u64,
    next_id: u64,
    current: Option<Rc<ObserverCore>>,
    batch_depth: u32,
    flushing: bool,
    queue: Vec<Rc<ObserverCore>>,
    flush_hooks: Vec<Box<dyn FnOnce()>>,
    scope_stack: Vec<Rc<ScopeCore>>,
    run_counts: HashMap<u64, u32>,
}

impl Runtime {
    fn new() -> Self {
        Self {
            clock: 0,
            next_id: 0,
            current: None,
            batch_depth: 0,
            flushing: false,
            queue: Vec::new(),
            flush_hooks: Vec::new(),
            scope_stack: Vec::new(),
            run_counts: HashMap::new(),
        }
    }
}

thread_local! {
    static RT: RefCell<Runtime> = RefCell::new(Runtime::new());
}

fn next_id() -> u64 {
    RT.with(|rt| {
        let mut rt = rt.borrow_mut();
        rt.next_id += 1;
        rt.next_id
    })
}

fn next_clock() -> u64 {
    RT.with(|rt| {
        let mut rt = rt.borrow_mut();
        rt.clock += 1;
        rt.clock
    })
}

// =============================================================================
// Graph nodes
// =============================================================================

/// Observable side of a signal or derived.
struct DepMeta {
    id: u64,
    revision: Cell<u64>,
    depth: Cell<u32>,
    subs: RefCell<Vec<Rc<ObserverCore>>>,
}

impl DepMeta {
    fn new() -> Rc<Self> {
        Rc::new(Self {
            id: next_id(),
            revision: Cell::new(0),
            depth: Cell::new(0),
            subs: RefCell::new(Vec::new()),
        })
    }
}

/// Observer side of an effect or derived.
struct ObserverCore {
    id: u64,
    /// Effect body; `None` for deriveds (their recompute is pulled).
    run: RefCell<Option<Rc<dyn Fn()>>>,
    /// Derived staleness propagation; `None` for effects.
    stale_hook: RefCell<Option<Rc<dyn Fn()>>>,
    deps: RefCell<Vec<Rc<DepMeta>>>,
    scheduled: Cell<bool>,
    disposed: Cell<bool>,
    depth: Cell<u32>,
}

impl ObserverCore {
    fn new() -> Rc<Self> {
        Rc::new(Self {
            id: next_id(),
            run: RefCell::new(None),
            stale_hook: RefCell::new(None),
            deps: RefCell::new(Vec::new()),
            scheduled: Cell::new(false),
            disposed: Cell::new(false),
            depth: Cell::new(0),
        })
    }
}

/// Unsubscribe an observer from every dependency it tracked.
fn clear_deps(obs: &Rc<ObserverCore>) {
    let deps = std::mem::take(&mut *obs.deps.borrow_mut());
    for dep in deps {
        dep.subs.borrow_mut().retain(|s| s.id != obs.id);
    }
}

/// Record a read of `meta` by the currently tracking observer, if any.
fn track(meta: &Rc<DepMeta>) {
    let current = RT.with(|rt| rt.borrow().current.clone());
    let Some(obs) = current else { return };
    if obs.disposed.get() {
        return;
    }
    let mut deps = obs.deps.borrow_mut();
    if deps.iter().any(|d| d.id == meta.id) {
        return;
    }
    deps.push(meta.clone());
    meta.subs.borrow_mut().push(obs.clone());
    if meta.depth.get() >= obs.depth.get() {
        obs.depth.set(meta.depth.get() + 1);
    }
}

/// Notify everything subscribed to `meta` that it changed.
fn notify(meta: &DepMeta) {
    let subs: Vec<Rc<ObserverCore>> = meta.subs.borrow().clone();
    for obs in subs {
        if obs.disposed.get() {
            continue;
        }
        let hook = obs.stale_hook.borrow().clone();
        if let Some(hook) = hook {
            hook();
        } else {
            schedule(obs);
        }
    }
}

fn schedule(obs: Rc<ObserverCore>) {
    if obs.scheduled.get() {
        return;
    }
    obs.scheduled.set(true);
    let flush_now = RT.with(|rt| {
        let mut rt = rt.borrow_mut();
        rt.queue.push(obs);
        rt.batch_depth == 0 && !rt.flushing
    });
    if flush_now {
        flush();
    }
}

/// Restores the previous tracker even when the tracked closure unwinds,
/// so a caught panic cannot leave a stale observer installed.
struct TrackerGuard {
    prev: Option<Rc<ObserverCore>>,
}

impl TrackerGuard {
    fn install(obs: Rc<ObserverCore>) -> Self {
        let prev = RT.with(|rt| {
            let mut rt = rt.borrow_mut();
            std::mem::replace(&mut rt.current, Some(obs))
        });
        Self { prev }
    }
}

impl Drop for TrackerGuard {
    fn drop(&mut self) {
        let prev = self.prev.take();
        RT.with(|rt| rt.borrow_mut().current = prev);
    }
}

/// Run one effect with dependency tracking.
fn run_effect(obs: &Rc<ObserverCore>) {
    if obs.disposed.get() {
        return;
    }
    let Some(body) = obs.run.borrow().clone() else {
        return;
    };
    clear_deps(obs);
    obs.depth.set(0);
    let _tracker = TrackerGuard::install(obs.clone());
    body();
}

/// Drain the effect queue, then the flush-end hooks.
///
/// Effects run in dependency-depth order so a producer always settles
/// before its consumers within one flush.
pub fn flush_sync() {
    flush();
}

fn flush() {
    let already = RT.with(|rt| {
        let mut rt = rt.borrow_mut();
        if rt.flushing {
            return true;
        }
        rt.flushing = true;
        rt.run_counts.clear();
        false
    });
    if already {
        return;
    }

    loop {
        let next = RT.with(|rt| {
            let mut rt = rt.borrow_mut();
            if rt.queue.is_empty() {
                return None;
            }
            rt.queue.sort_by_key(|o| o.depth.get());
            Some(rt.queue.remove(0))
        });
        let Some(obs) = next else { break };
        obs.scheduled.set(false);

        let over_cap = RT.with(|rt| {
            let mut rt = rt.borrow_mut();
            let count = rt.run_counts.entry(obs.id).or_insert(0);
            *count += 1;
            *count > EFFECT_RERUN_CAP
        });
        if over_cap {
            log::error!("effect did not converge within one extra pass; dropping ({})", Error::ReactiveCycle);
            continue;
        }

        run_effect(&obs);
    }

    let hooks = RT.with(|rt| {
        let mut rt = rt.borrow_mut();
        rt.flushing = false;
        std::mem::take(&mut rt.flush_hooks)
    });
    for hook in hooks {
        hook();
    }
}

/// Register a hook to run once after the current flush (or immediately if
/// nothing is flushing and no batch is open). The primitive binder uses
/// this to coalesce engine wakes: many writes, one wake.
pub fn on_flush_end(f: impl FnOnce() + 'static) {
    let run_now = RT.with(|rt| {
        let mut rt = rt.borrow_mut();
        if rt.flushing || rt.batch_depth > 0 {
            rt.flush_hooks.push(Box::new(f));
            None
        } else {
            Some(f)
        }
    });
    if let Some(f) = run_now {
        f();
    }
}

// =============================================================================
// Signal
// =============================================================================

struct SignalCore<T> {
    value: RefCell<T>,
    meta: Rc<DepMeta>,
}

/// A writable reactive value cell.
pub struct Signal<T> {
    core: Rc<SignalCore<T>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
        }
    }
}

/// Create a signal holding `initial`.
pub fn signal<T: Clone + PartialEq + 'static>(initial: T) -> Signal<T> {
    Signal {
        core: Rc::new(SignalCore {
            value: RefCell::new(initial),
            meta: DepMeta::new(),
        }),
    }
}

impl<T: Clone + PartialEq + 'static> Signal<T> {
    /// Read the current value, tracking the read in the running observer.
    pub fn get(&self) -> T {
        track(&self.core.meta);
        self.core.value.borrow().clone()
    }

    /// Read without establishing a dependency.
    pub fn get_untracked(&self) -> T {
        self.core.value.borrow().clone()
    }

    /// Write a new value. Equal values are dropped without notifying
    /// anyone (equality-preserving update).
    pub fn set(&self, value: T) {
        {
            let current = self.core.value.borrow();
            if *current == value {
                return;
            }
        }
        *self.core.value.borrow_mut() = value;
        self.core.meta.revision.set(next_clock());
        notify(&self.core.meta);
        let flush_now = RT.with(|rt| {
            let rt = rt.borrow();
            rt.batch_depth == 0 && !rt.flushing
        });
        if flush_now {
            flush();
        }
    }

    /// Mutate in place through a closure, then notify.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let mut next = self.core.value.borrow().clone();
        f(&mut next);
        self.set(next);
    }
}

// =============================================================================
// Derived
// =============================================================================

struct DerivedCore<T> {
    value: RefCell<Option<T>>,
    stale: Cell<bool>,
    running: Cell<bool>,
    compute: Rc<dyn Fn() -> T>,
    meta: Rc<DepMeta>,
    obs: Rc<ObserverCore>,
}

/// A lazily memoized computation over other cells.
pub struct Derived<T> {
    core: Rc<DerivedCore<T>>,
}

impl<T> Clone for Derived<T> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
        }
    }
}

/// Create a derived cell computing its value from other cells.
pub fn derived<T: Clone + PartialEq + 'static>(compute: impl Fn() -> T + 'static) -> Derived<T> {
    let core = Rc::new(DerivedCore {
        value: RefCell::new(None),
        stale: Cell::new(true),
        running: Cell::new(false),
        compute: Rc::new(compute),
        meta: DepMeta::new(),
        obs: ObserverCore::new(),
    });

    // When a dependency changes: mark stale once, propagate to readers.
    let weak: Weak<DerivedCore<T>> = Rc::downgrade(&core);
    let hook: Rc<dyn Fn()> = Rc::new(move || {
        if let Some(core) = weak.upgrade() {
            if !core.stale.get() {
                core.stale.set(true);
                notify(&core.meta);
            }
        }
    });
    *core.obs.stale_hook.borrow_mut() = Some(hook);

    Derived { core }
}

/// Clears the running flag even when evaluation unwinds, so a cycle
/// keeps raising on subsequent reads instead of wedging the cell.
struct RunningGuard<'a>(&'a Cell<bool>);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl<T: Clone + PartialEq + 'static> Derived<T> {
    /// Read the value, recomputing if any dependency changed since the
    /// memo was taken.
    ///
    /// # Panics
    ///
    /// Panics with [`Error::ReactiveCycle`] if the derived transitively
    /// reads itself. Use [`Derived::try_get`] at boundaries that need the
    /// error as a value.
    pub fn get(&self) -> T {
        track(&self.core.meta);
        self.eval()
    }

    /// Like [`Derived::get`], but surfaces a cycle as `Err` instead of
    /// panicking.
    pub fn try_get(&self) -> Result<T, Error> {
        track(&self.core.meta);
        if self.core.running.get() {
            return Err(Error::ReactiveCycle);
        }
        let core = self.core.clone();
        std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            Derived { core }.eval()
        }))
        .map_err(|_| Error::ReactiveCycle)
    }

    fn eval(&self) -> T {
        let core = &self.core;
        if core.running.get() {
            panic!("{}", Error::ReactiveCycle);
        }
        if !core.stale.get() {
            if let Some(v) = core.value.borrow().as_ref() {
                return v.clone();
            }
        }

        core.running.set(true);
        let _guard = RunningGuard(&core.running);

        clear_deps(&core.obs);
        core.obs.depth.set(0);
        let compute = core.compute.clone();
        let result = {
            let _tracker = TrackerGuard::install(core.obs.clone());
            compute()
        };

        let changed = match core.value.borrow().as_ref() {
            Some(old) => *old != result,
            None => true,
        };
        if changed {
            *core.value.borrow_mut() = Some(result.clone());
            core.meta.revision.set(next_clock());
        }
        core.stale.set(false);
        core.meta.depth.set(core.obs.depth.get());
        result
    }
}

// =============================================================================
// Effect
// =============================================================================

/// Create an effect: runs immediately, re-runs when any tracked
/// dependency changes. Returns a disposer.
///
/// The effect is owned by the current scope if one is active; the
/// disposer works either way.
pub fn effect(f: impl Fn() + 'static) -> impl FnOnce() {
    let obs = ObserverCore::new();
    *obs.run.borrow_mut() = Some(Rc::new(f));

    if let Some(scope) = RT.with(|rt| rt.borrow().scope_stack.last().cloned()) {
        scope.effects.borrow_mut().push(obs.clone());
    }

    run_effect(&obs);

    let obs_for_dispose = obs.clone();
    move || dispose_observer(&obs_for_dispose)
}

fn dispose_observer(obs: &Rc<ObserverCore>) {
    if obs.disposed.get() {
        return;
    }
    obs.disposed.set(true);
    clear_deps(obs);
    *obs.run.borrow_mut() = None;
    *obs.stale_hook.borrow_mut() = None;
}

// =============================================================================
// Batch / untracked
// =============================================================================

/// Defer effect execution until `f` returns; each affected effect runs
/// once with the union of changes, and flush-end hooks (wake requests)
/// fire once after that.
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    RT.with(|rt| rt.borrow_mut().batch_depth += 1);
    let result = f();
    let flush_now = RT.with(|rt| {
        let mut rt = rt.borrow_mut();
        rt.batch_depth -= 1;
        rt.batch_depth == 0 && !rt.flushing
    });
    if flush_now {
        flush();
    }
    result
}

/// Run `f` with dependency tracking suspended.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let prev = RT.with(|rt| rt.borrow_mut().current.take());
    let result = f();
    RT.with(|rt| rt.borrow_mut().current = prev);
    result
}

// =============================================================================
// Scopes
// =============================================================================

struct ScopeCore {
    cleanups: RefCell<Vec<Box<dyn FnOnce()>>>,
    children: RefCell<Vec<Rc<ScopeCore>>>,
    effects: RefCell<Vec<Rc<ObserverCore>>>,
    disposed: Cell<bool>,
}

/// A disposal boundary owning the reactive resources created inside it.
#[derive(Clone)]
pub struct Scope {
    core: Rc<ScopeCore>,
}

/// Create a scope. It registers as a child of the currently running scope
/// so disposing a parent disposes the whole subtree.
pub fn effect_scope() -> Scope {
    let core = Rc::new(ScopeCore {
        cleanups: RefCell::new(Vec::new()),
        children: RefCell::new(Vec::new()),
        effects: RefCell::new(Vec::new()),
        disposed: Cell::new(false),
    });
    if let Some(parent) = RT.with(|rt| rt.borrow().scope_stack.last().cloned()) {
        parent.children.borrow_mut().push(core.clone());
    }
    Scope { core }
}

/// Run `f` inside a fresh scope and return both.
pub fn scoped<R>(f: impl FnOnce() -> R) -> (Scope, R) {
    let scope = effect_scope();
    let result = scope.run(f);
    (scope, result)
}

/// Register a teardown with the current scope. Cleanups run in reverse
/// registration order when the scope disposes.
pub fn on_scope_dispose(f: impl FnOnce() + 'static) {
    let registered = RT.with(|rt| {
        let rt = rt.borrow();
        if let Some(scope) = rt.scope_stack.last() {
            scope.cleanups.borrow_mut().push(Box::new(f));
            true
        } else {
            false
        }
    });
    if !registered {
        log::warn!("on_scope_dispose called outside any scope; cleanup dropped");
    }
}

impl Scope {
    /// Run `f` with this scope active: effects and child scopes created
    /// inside belong to it.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> R {
        RT.with(|rt| rt.borrow_mut().scope_stack.push(self.core.clone()));
        let result = f();
        RT.with(|rt| {
            rt.borrow_mut().scope_stack.pop();
        });
        result
    }

    /// Dispose the scope: cleanups in reverse order, then child scopes,
    /// then every owned effect is removed from every dependency set.
    pub fn stop(&self) {
        if self.core.disposed.get() {
            return;
        }
        self.core.disposed.set(true);

        let cleanups = std::mem::take(&mut *self.core.cleanups.borrow_mut());
        for cleanup in cleanups.into_iter().rev() {
            cleanup();
        }

        let children = std::mem::take(&mut *self.core.children.borrow_mut());
        for child in children.into_iter().rev() {
            Scope { core: child }.stop();
        }

        let effects = std::mem::take(&mut *self.core.effects.borrow_mut());
        for obs in &effects {
            dispose_observer(obs);
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.core.disposed.get()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_get_set() {
        let s = signal(1);
        assert_eq!(s.get(), 1);
        s.set(2);
        assert_eq!(s.get(), 2);
    }

    #[test]
    fn effect_tracks_and_reruns() {
        let s = signal(0);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = seen.clone();
        let s_read = s.clone();
        let _dispose = effect(move || {
            seen_clone.borrow_mut().push(s_read.get());
        });
        s.set(1);
        s.set(2);
        assert_eq!(&*seen.borrow(), &[0, 1, 2]);
    }

    #[test]
    fn equal_set_does_not_rerun() {
        let s = signal(5);
        let runs = Rc::new(Cell::new(0));
        let runs_clone = runs.clone();
        let s_read = s.clone();
        let _dispose = effect(move || {
            let _ = s_read.get();
            runs_clone.set(runs_clone.get() + 1);
        });
        assert_eq!(runs.get(), 1);
        s.set(5);
        assert_eq!(runs.get(), 1);
        s.set(6);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn derived_is_lazy_and_memoized() {
        let s = signal(2);
        let computes = Rc::new(Cell::new(0));
        let computes_clone = computes.clone();
        let s_read = s.clone();
        let d = derived(move || {
            computes_clone.set(computes_clone.get() + 1);
            s_read.get() * 10
        });
        assert_eq!(computes.get(), 0, "derived must not compute before read");
        assert_eq!(d.get(), 20);
        assert_eq!(d.get(), 20);
        assert_eq!(computes.get(), 1, "second read hits the memo");
        s.set(3);
        assert_eq!(computes.get(), 1, "write alone must not recompute");
        assert_eq!(d.get(), 30);
        assert_eq!(computes.get(), 2);
    }

    #[test]
    fn derived_equality_preserves_revision() {
        let s = signal(1);
        let s_read = s.clone();
        let parity = derived(move || s_read.get() % 2);
        let runs = Rc::new(Cell::new(0));
        let runs_clone = runs.clone();
        let parity_read = parity.clone();
        let latest = Rc::new(Cell::new(-1));
        let latest_clone = latest.clone();
        let _dispose = effect(move || {
            latest_clone.set(parity_read.get());
            runs_clone.set(runs_clone.get() + 1);
        });
        assert_eq!(latest.get(), 1);
        s.set(3); // parity unchanged
        assert_eq!(latest.get(), 1);
        s.set(4);
        assert_eq!(latest.get(), 0);
        assert!(runs.get() >= 2);
    }

    #[test]
    fn batch_coalesces_effect_runs() {
        let a = signal(0);
        let b = signal(0);
        let runs = Rc::new(Cell::new(0));
        let runs_clone = runs.clone();
        let a_read = a.clone();
        let b_read = b.clone();
        let _dispose = effect(move || {
            let _ = a_read.get();
            let _ = b_read.get();
            runs_clone.set(runs_clone.get() + 1);
        });
        assert_eq!(runs.get(), 1);
        batch(|| {
            a.set(1);
            b.set(2);
            a.set(3);
        });
        assert_eq!(runs.get(), 2, "one re-run for the whole batch");
    }

    #[test]
    fn batch_runs_flush_hooks_once() {
        let hook_runs = Rc::new(Cell::new(0));
        let a = signal(0);
        batch(|| {
            a.set(1);
            let hr = hook_runs.clone();
            on_flush_end(move || hr.set(hr.get() + 1));
            a.set(2);
        });
        assert_eq!(hook_runs.get(), 1);
    }

    #[test]
    fn untracked_reads_do_not_subscribe() {
        let s = signal(0);
        let runs = Rc::new(Cell::new(0));
        let runs_clone = runs.clone();
        let s_read = s.clone();
        let _dispose = effect(move || {
            untracked(|| s_read.get());
            runs_clone.set(runs_clone.get() + 1);
        });
        s.set(1);
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn disposer_removes_subscription() {
        let s = signal(0);
        let runs = Rc::new(Cell::new(0));
        let runs_clone = runs.clone();
        let s_read = s.clone();
        let dispose = effect(move || {
            let _ = s_read.get();
            runs_clone.set(runs_clone.get() + 1);
        });
        dispose();
        s.set(1);
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn scope_disposal_tears_down_effects() {
        let s = signal(0);
        let runs = Rc::new(Cell::new(0));
        let scope = effect_scope();
        let runs_clone = runs.clone();
        let s_read = s.clone();
        scope.run(move || {
            let _ = effect(move || {
                let _ = s_read.get();
                runs_clone.set(runs_clone.get() + 1);
            });
        });
        assert_eq!(runs.get(), 1);
        scope.stop();
        s.set(1);
        assert_eq!(runs.get(), 1, "disposed scope must not react");
    }

    #[test]
    fn scope_cleanups_run_in_reverse() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let scope = effect_scope();
        let o1 = order.clone();
        let o2 = order.clone();
        scope.run(move || {
            on_scope_dispose(move || o1.borrow_mut().push(1));
            on_scope_dispose(move || o2.borrow_mut().push(2));
        });
        scope.stop();
        assert_eq!(&*order.borrow(), &[2, 1]);
    }

    #[test]
    fn nested_scope_disposed_with_parent() {
        let s = signal(0);
        let runs = Rc::new(Cell::new(0));
        let parent = effect_scope();
        let runs_clone = runs.clone();
        let s_read = s.clone();
        parent.run(move || {
            let child = effect_scope();
            child.run(move || {
                let _ = effect(move || {
                    let _ = s_read.get();
                    runs_clone.set(runs_clone.get() + 1);
                });
            });
        });
        parent.stop();
        s.set(1);
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn derived_cycle_detected() {
        // A and B read each other through shared slots; the first read of
        // either must fail rather than loop.
        let a_slot: Rc<RefCell<Option<Derived<i32>>>> = Rc::new(RefCell::new(None));
        let b_slot: Rc<RefCell<Option<Derived<i32>>>> = Rc::new(RefCell::new(None));

        let b_for_a = b_slot.clone();
        let a = derived(move || {
            b_for_a
                .borrow()
                .as_ref()
                .map(|b| b.get() + 1)
                .unwrap_or(0)
        });
        let a_for_b = a_slot.clone();
        let b = derived(move || {
            a_for_b
                .borrow()
                .as_ref()
                .map(|a| a.get() + 1)
                .unwrap_or(0)
        });
        *a_slot.borrow_mut() = Some(a.clone());
        *b_slot.borrow_mut() = Some(b.clone());

        assert!(matches!(a.try_get(), Err(Error::ReactiveCycle)));
        // Still raising on the next read, not wedged.
        assert!(matches!(a.try_get(), Err(Error::ReactiveCycle)));
        assert!(matches!(b.try_get(), Err(Error::ReactiveCycle)));
    }

    #[test]
    fn chained_deriveds_propagate() {
        let s = signal(1);
        let s_read = s.clone();
        let doubled = derived(move || s_read.get() * 2);
        let doubled_read = doubled.clone();
        let plus_one = derived(move || doubled_read.get() + 1);

        let seen = Rc::new(Cell::new(0));
        let seen_clone = seen.clone();
        let plus_read = plus_one.clone();
        let _dispose = effect(move || seen_clone.set(plus_read.get()));
        assert_eq!(seen.get(), 3);
        s.set(10);
        assert_eq!(seen.get(), 21);
    }
}
