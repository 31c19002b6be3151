//! Frame cycling on shared clocks.
//!
//! One clock per fps, shared by every cell ticking at that rate: cheap
//! and visually synchronized. The clock thread bumps an atomic; the
//! authoring side pumps atomics into tick signals with [`sync_clocks`]
//! (the mount handle's idle loop does this), which is what re-runs any
//! effect reading a cycling cell. A cell whose `active` signal is false
//! unsubscribes; a clock with no subscribers stops its thread.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use crate::reactive::{Derived, Signal, derived, effect, on_scope_dispose, signal};

struct Clock {
    ticks: Arc<AtomicU64>,
    tick_signal: Signal<u64>,
    running: Arc<AtomicBool>,
    subscribers: usize,
}

thread_local! {
    static CLOCKS: RefCell<HashMap<u8, Clock>> = RefCell::new(HashMap::new());
}

/// The shared tick signal for `fps`, creating its clock if needed.
fn shared_tick(fps: u8) -> Signal<u64> {
    CLOCKS.with(|clocks| {
        let mut clocks = clocks.borrow_mut();
        let clock = clocks.entry(fps).or_insert_with(|| Clock {
            ticks: Arc::new(AtomicU64::new(0)),
            tick_signal: signal(0),
            running: Arc::new(AtomicBool::new(false)),
            subscribers: 0,
        });
        clock.tick_signal.clone()
    })
}

fn subscribe(fps: u8) {
    if fps == 0 {
        return;
    }
    CLOCKS.with(|clocks| {
        let mut clocks = clocks.borrow_mut();
        let Some(clock) = clocks.get_mut(&fps) else {
            return;
        };
        clock.subscribers += 1;
        if clock.subscribers == 1 {
            clock.running.store(true, Ordering::SeqCst);
            let running = clock.running.clone();
            let ticks = clock.ticks.clone();
            let interval = Duration::from_millis(1000 / fps.max(1) as u64);
            std::thread::spawn(move || {
                while running.load(Ordering::SeqCst) {
                    std::thread::sleep(interval);
                    if running.load(Ordering::SeqCst) {
                        ticks.fetch_add(1, Ordering::SeqCst);
                    }
                }
            });
        }
    });
}

fn unsubscribe(fps: u8) {
    CLOCKS.with(|clocks| {
        let mut clocks = clocks.borrow_mut();
        if let Some(clock) = clocks.get_mut(&fps) {
            clock.subscribers = clock.subscribers.saturating_sub(1);
            if clock.subscribers == 0 {
                clock.running.store(false, Ordering::SeqCst);
            }
        }
    });
}

/// Pump clock atomics into their tick signals. Call from the authoring
/// thread's idle loop; effects reading cycling cells re-run from here.
pub fn sync_clocks() {
    CLOCKS.with(|clocks| {
        let snapshot: Vec<(Signal<u64>, u64)> = clocks
            .borrow()
            .values()
            .map(|c| (c.tick_signal.clone(), c.ticks.load(Ordering::SeqCst)))
            .collect();
        for (tick_signal, ticks) in snapshot {
            tick_signal.set(ticks);
        }
    });
}

/// Subscriber count for an fps clock (tests, diagnostics).
pub fn clock_subscribers(fps: u8) -> usize {
    CLOCKS.with(|clocks| clocks.borrow().get(&fps).map_or(0, |c| c.subscribers))
}

/// Options for [`cycle`] and [`pulse`].
pub struct TickOptions {
    pub fps: u8,
    /// Ticks are only scheduled while this reads true.
    pub active: Option<Signal<bool>>,
}

impl Default for TickOptions {
    fn default() -> Self {
        Self { fps: 2, active: None }
    }
}

/// A cell stepping through `frames` at `fps` frames per second.
///
/// Cells created with the same fps share one clock. While inactive the
/// cell holds its current frame and schedules nothing.
pub fn cycle<T: Clone + PartialEq + 'static>(frames: Vec<T>, opts: TickOptions) -> Derived<T> {
    assert!(!frames.is_empty(), "cycle needs at least one frame");
    let fps = opts.fps;
    let tick = shared_tick(fps);

    // Subscription follows the active signal; a plain cycle subscribes
    // for the life of the enclosing scope.
    let subscribed = Rc::new(std::cell::Cell::new(false));
    match &opts.active {
        Some(active) => {
            let active = active.clone();
            let subscribed_for_effect = subscribed.clone();
            let _ = effect(move || {
                let want = active.get();
                if want && !subscribed_for_effect.get() {
                    subscribe(fps);
                    subscribed_for_effect.set(true);
                } else if !want && subscribed_for_effect.get() {
                    unsubscribe(fps);
                    subscribed_for_effect.set(false);
                }
            });
        }
        None => {
            subscribe(fps);
            subscribed.set(true);
        }
    }
    {
        let subscribed = subscribed.clone();
        on_scope_dispose(move || {
            if subscribed.get() {
                unsubscribe(fps);
            }
        });
    }

    let active = opts.active;
    let held = Rc::new(std::cell::Cell::new(0u64));
    derived(move || {
        let is_active = active.as_ref().map(|a| a.get()).unwrap_or(true);
        if is_active {
            held.set(tick.get());
        }
        frames[(held.get() % frames.len() as u64) as usize].clone()
    })
}

/// A boolean cell toggling at `fps`; the cursor-blink shape.
pub fn pulse(opts: TickOptions) -> Derived<bool> {
    cycle(vec![true, false], opts)
}
