//! Conditional and keyed-list rendering.
//!
//! Both primitives follow the same shape: an effect subscribes to the
//! driving data, and branch/item subtrees each live in their own scope
//! so swapping them in and out is one `stop()`.
//!
//! `each` reconciles by key: an item whose key survives keeps its
//! subtree and only its value signal is written; removed keys dispose
//! their scopes; added keys render fresh; order changes rewrite the
//! nodes' sibling order and mark the parent HIERARCHY dirty.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;
use std::rc::Rc;

use crate::reactive::{Scope, Signal, effect, effect_scope, on_scope_dispose, signal};
use crate::store::DirtyMask;

use super::binder;
use super::types::Cleanup;

/// Render `then_fn` while `condition` is true, the optional `else_fn`
/// otherwise. Toggling disposes the inactive branch's scope and builds
/// the other.
pub fn show<ThenF, ElseF>(
    condition: impl Fn() -> bool + 'static,
    then_fn: ThenF,
    else_fn: Option<ElseF>,
) -> Cleanup
where
    ThenF: Fn() -> Cleanup + 'static,
    ElseF: Fn() -> Cleanup + 'static,
{
    let store = binder::store();
    let parent = binder::current_parent();

    let active: Rc<RefCell<Option<Scope>>> = Rc::new(RefCell::new(None));
    let was_true: Rc<RefCell<Option<bool>>> = Rc::new(RefCell::new(None));

    let outer = effect_scope();
    let active_for_effect = active.clone();
    let active_for_dispose = active.clone();

    outer.run(move || {
        let _ = effect(move || {
            let now = condition();
            if *was_true.borrow() == Some(now) {
                return;
            }
            *was_true.borrow_mut() = Some(now);

            if let Some(prev) = active_for_effect.borrow_mut().take() {
                prev.stop();
            }

            let branch = effect_scope();
            branch.run(|| {
                binder::with_context(store.clone(), parent, || {
                    if now {
                        let _ = then_fn();
                    } else if let Some(else_fn) = &else_fn {
                        let _ = else_fn();
                    }
                });
            });
            *active_for_effect.borrow_mut() = Some(branch);
        });

        on_scope_dispose(move || {
            if let Some(branch) = active_for_dispose.borrow_mut().take() {
                branch.stop();
            }
        });
    });

    Box::new(move || outer.stop())
}

/// `show` without an else branch.
pub fn when(
    condition: impl Fn() -> bool + 'static,
    then_fn: impl Fn() -> Cleanup + 'static,
) -> Cleanup {
    show(condition, then_fn, None::<fn() -> Cleanup>)
}

struct EachItem<T> {
    scope: Scope,
    value: Signal<T>,
    nodes: Vec<usize>,
}

/// Keyed list rendering.
///
/// `render` receives a getter for the item's current value; reading it
/// inside bound props keeps the subtree live across value updates
/// without rebuilding.
pub fn each<T, K, R>(
    items: impl Fn() -> Vec<T> + 'static,
    render: R,
    key_of: impl Fn(&T) -> K + 'static,
) -> Cleanup
where
    T: Clone + PartialEq + 'static,
    K: Clone + Eq + Hash + Debug + 'static,
    R: Fn(Rc<dyn Fn() -> T>, &K) -> Cleanup + 'static,
{
    let store = binder::store();
    let parent = binder::current_parent();

    let entries: Rc<RefCell<HashMap<K, EachItem<T>>>> = Rc::new(RefCell::new(HashMap::new()));

    let outer = effect_scope();
    let entries_for_effect = entries.clone();
    let entries_for_dispose = entries.clone();

    outer.run(move || {
        let _ = effect(move || {
            let next = items();
            let mut seen: HashSet<K> = HashSet::with_capacity(next.len());
            let mut order_changed = false;

            for (position, item) in next.iter().enumerate() {
                let key = key_of(item);
                if !seen.insert(key.clone()) {
                    log::warn!("duplicate key {key:?} in each(); item skipped");
                    continue;
                }

                let mut map = entries_for_effect.borrow_mut();
                if let Some(entry) = map.get(&key) {
                    // Key survives: update the value signal only.
                    entry.value.set(item.clone());
                    for &node in &entry.nodes {
                        if store.sibling_order(node) != position as u16 {
                            store.set_sibling_order(node, position as u16);
                            order_changed = true;
                        }
                    }
                } else {
                    // New key: build the subtree in its own scope.
                    let value = signal(item.clone());
                    let scope = effect_scope();
                    let value_for_getter = value.clone();
                    let (_, nodes) = scope.run(|| {
                        binder::with_context(store.clone(), parent, || {
                            binder::track_allocations(|| {
                                let getter: Rc<dyn Fn() -> T> =
                                    Rc::new(move || value_for_getter.get());
                                let _ = render(getter, &key);
                            })
                        })
                    });
                    for &node in &nodes {
                        store.set_sibling_order(node, position as u16);
                    }
                    order_changed = true;
                    map.insert(key, EachItem { scope, value, nodes });
                }
            }

            // Dispose removed keys.
            let removed: Vec<K> = entries_for_effect
                .borrow()
                .keys()
                .filter(|k| !seen.contains(*k))
                .cloned()
                .collect();
            for key in removed {
                if let Some(entry) = entries_for_effect.borrow_mut().remove(&key) {
                    entry.scope.stop();
                }
                order_changed = true;
            }

            if order_changed {
                if let Some(p) = parent {
                    binder::commit(&store, p, DirtyMask::HIERARCHY);
                }
            }
        });

        on_scope_dispose(move || {
            for (_, entry) in entries_for_dispose.borrow_mut().drain() {
                entry.scope.stop();
            }
        });
    });

    Box::new(move || outer.stop())
}
