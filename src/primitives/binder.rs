//! Authoring-side binder context.
//!
//! Primitives run inside a context that knows which store they write to
//! and which node is the current parent. The context is thread-local and
//! re-entrant: control-flow primitives re-install it when their effects
//! rebuild subtrees long after `mount`'s build call returned.
//!
//! Wake coalescing lives here too: every store mutation requests a wake,
//! but only one wake reaches the engine per effect flush.

use std::cell::{Cell, RefCell};
use std::sync::Arc;

use crate::reactive::on_flush_end;
use crate::store::{DirtyMask, Store};

struct BinderCtx {
    store: Arc<Store>,
    parents: Vec<usize>,
    /// When tracking, every reserved node index is logged (keyed-list
    /// reconciliation needs to know which nodes an item produced).
    alloc_log: Vec<Vec<usize>>,
}

thread_local! {
    static CTX: RefCell<Vec<BinderCtx>> = const { RefCell::new(Vec::new()) };
    static WAKE_PENDING: Cell<bool> = const { Cell::new(false) };
}

/// Install a binder context for the duration of `f`.
pub fn with_context<R>(store: Arc<Store>, parent: Option<usize>, f: impl FnOnce() -> R) -> R {
    CTX.with(|ctx| {
        ctx.borrow_mut().push(BinderCtx {
            store,
            parents: parent.into_iter().collect(),
            alloc_log: Vec::new(),
        })
    });
    let result = f();
    CTX.with(|ctx| {
        ctx.borrow_mut().pop();
    });
    result
}

/// The active store. Panics outside an authoring context; primitives are
/// only callable inside `mount` or a control-flow rebuild.
pub fn store() -> Arc<Store> {
    CTX.with(|ctx| {
        ctx.borrow()
            .last()
            .map(|c| c.store.clone())
            .expect("primitive created outside an authoring context")
    })
}

pub fn current_parent() -> Option<usize> {
    CTX.with(|ctx| ctx.borrow().last().and_then(|c| c.parents.last().copied()))
}

pub fn push_parent(index: usize) {
    CTX.with(|ctx| {
        if let Some(c) = ctx.borrow_mut().last_mut() {
            c.parents.push(index);
        }
    });
}

pub fn pop_parent() {
    CTX.with(|ctx| {
        if let Some(c) = ctx.borrow_mut().last_mut() {
            c.parents.pop();
        }
    });
}

/// Record a node allocation in the innermost tracking frame.
pub(crate) fn log_allocation(index: usize) {
    CTX.with(|ctx| {
        if let Some(c) = ctx.borrow_mut().last_mut() {
            if let Some(frame) = c.alloc_log.last_mut() {
                frame.push(index);
            }
        }
    });
}

/// Run `f` collecting every node index it reserves.
pub fn track_allocations<R>(f: impl FnOnce() -> R) -> (R, Vec<usize>) {
    CTX.with(|ctx| {
        if let Some(c) = ctx.borrow_mut().last_mut() {
            c.alloc_log.push(Vec::new());
        }
    });
    let result = f();
    let nodes = CTX.with(|ctx| {
        ctx.borrow_mut()
            .last_mut()
            .and_then(|c| c.alloc_log.pop())
            .unwrap_or_default()
    });
    (result, nodes)
}

/// Ask the engine to look at the store. Coalesced: any number of calls
/// inside one batch/flush produce exactly one wake, issued after every
/// write and dirty mark has landed.
pub fn request_wake(store: &Arc<Store>) {
    if WAKE_PENDING.replace(true) {
        return;
    }
    let store = store.clone();
    on_flush_end(move || {
        WAKE_PENDING.set(false);
        store.wake();
    });
}

/// Mark dirty then request a wake; the write-then-commit tail shared by
/// every binding effect.
pub fn commit(store: &Arc<Store>, index: usize, mask: DirtyMask) {
    store.mark_dirty(index, mask);
    request_wake(store);
}
