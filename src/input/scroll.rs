//! Scroll application and chaining.
//!
//! A delta lands on the innermost scrollable container under the target;
//! whatever the clamp leaves unconsumed bubbles to the nearest scrollable
//! ancestor, and so on up the chain. Scrolling only moves content, so it
//! dirties VISUAL, never LAYOUT.

use crate::store::{DirtyMask, Store};

/// Apply `(dx, dy)` starting at `node`, chaining leftovers upward.
/// Returns true if any container moved.
pub fn scroll_by(store: &Store, node: usize, dx: f32, dy: f32) -> bool {
    let mut target = Some(node);
    let mut dx = dx;
    let mut dy = dy;
    let mut moved = false;

    while let Some(i) = target {
        if (dx == 0.0 && dy == 0.0) || i >= store.node_count() {
            break;
        }
        if store.scrollable(i) != 0 {
            let (used_x, used_y) = apply(store, i, dx, dy);
            if used_x != 0.0 || used_y != 0.0 {
                moved = true;
                store.mark_dirty(i, DirtyMask::VISUAL);
            }
            dx -= used_x;
            dy -= used_y;
        }
        target = store.parent_index(i);
    }
    moved
}

/// Apply what fits on one container; returns the consumed portion.
fn apply(store: &Store, i: usize, dx: f32, dy: f32) -> (f32, f32) {
    let x = store.scroll_x(i);
    let y = store.scroll_y(i);
    let new_x = (x + dx).clamp(0.0, store.scroll_max_x(i).max(0.0));
    let new_y = (y + dy).clamp(0.0, store.scroll_max_y(i).max(0.0));
    store.set_scroll_x(i, new_x);
    store.set_scroll_y(i, new_y);
    (new_x - x, new_y - y)
}

/// Set an absolute scroll offset, clamped. Returns true on change.
pub fn scroll_to(store: &Store, i: usize, x: f32, y: f32) -> bool {
    if store.scrollable(i) == 0 {
        return false;
    }
    let old_x = store.scroll_x(i);
    let old_y = store.scroll_y(i);
    let new_x = x.clamp(0.0, store.scroll_max_x(i).max(0.0));
    let new_y = y.clamp(0.0, store.scroll_max_y(i).max(0.0));
    store.set_scroll_x(i, new_x);
    store.set_scroll_y(i, new_y);
    let changed = new_x != old_x || new_y != old_y;
    if changed {
        store.mark_dirty(i, DirtyMask::VISUAL);
    }
    changed
}

/// Scroll ancestors so `node` is inside their viewports (focus follows).
pub fn scroll_into_view(store: &Store, node: usize) {
    let mut current = store.parent_index(node);
    while let Some(p) = current {
        if store.scrollable(p) != 0 {
            let child_top = store.computed_y(node);
            let child_bottom = child_top + store.computed_h(node);
            let viewport = store.computed_h(p);
            let scroll = store.scroll_y(p);

            if child_top < scroll {
                scroll_to(store, p, store.scroll_x(p), child_top);
            } else if child_bottom > scroll + viewport {
                scroll_to(store, p, store.scroll_x(p), child_bottom - viewport);
            }
            break;
        }
        current = store.parent_index(p);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreConfig;
    use crate::types::ComponentType;

    /// Outer scrollable holding an inner scrollable.
    fn nested() -> (Store, usize, usize) {
        let store = Store::allocate(StoreConfig {
            capacity: 8,
            text_pool_size: 128,
            ring_size: 4,
        })
        .unwrap();
        let outer = store.reserve_node().unwrap();
        store.set_component_type(outer, ComponentType::Box as u8);
        store.set_scrollable(outer, 1);
        store.set_scroll_max_y(outer, 10.0);

        let inner = store.reserve_node().unwrap();
        store.set_component_type(inner, ComponentType::Box as u8);
        store.set_parent(inner, Some(outer)).unwrap();
        store.set_scrollable(inner, 1);
        store.set_scroll_max_y(inner, 5.0);
        (store, outer, inner)
    }

    #[test]
    fn inner_consumes_when_in_range() {
        let (store, outer, inner) = nested();
        assert!(scroll_by(&store, inner, 0.0, 3.0));
        assert_eq!(store.scroll_y(inner), 3.0);
        assert_eq!(store.scroll_y(outer), 0.0);
    }

    #[test]
    fn residue_chains_to_outer() {
        let (store, outer, inner) = nested();
        scroll_by(&store, inner, 0.0, 3.0);
        // 4 more: inner has 2 left, the remaining 2 chain to outer.
        assert!(scroll_by(&store, inner, 0.0, 4.0));
        assert_eq!(store.scroll_y(inner), 5.0);
        assert_eq!(store.scroll_y(outer), 2.0);
    }

    #[test]
    fn saturated_chain_stops_moving() {
        let (store, outer, inner) = nested();
        scroll_by(&store, inner, 0.0, 100.0);
        assert_eq!(store.scroll_y(inner), 5.0);
        assert_eq!(store.scroll_y(outer), 10.0);
        assert!(!scroll_by(&store, inner, 0.0, 1.0));
    }

    #[test]
    fn negative_delta_clamps_at_zero() {
        let (store, _, inner) = nested();
        assert!(!scroll_by(&store, inner, 0.0, -3.0));
        assert_eq!(store.scroll_y(inner), 0.0);
    }

    #[test]
    fn scroll_marks_visual_dirty() {
        let (store, _, inner) = nested();
        scroll_by(&store, inner, 0.0, 1.0);
        assert!(store.dirty(inner).contains(DirtyMask::VISUAL));
    }

    #[test]
    fn scroll_into_view_descends() {
        let (store, outer, _) = nested();
        store.set_computed_h(outer, 4.0);
        let item = store.reserve_node().unwrap();
        store.set_component_type(item, ComponentType::Box as u8);
        store.set_parent(item, Some(outer)).unwrap();
        store.set_computed_y(item, 8.0);
        store.set_computed_h(item, 1.0);
        scroll_into_view(&store, item);
        assert_eq!(store.scroll_y(outer), 5.0);
    }
}
