//! Focus traversal over the node store.
//!
//! Focus order is `focus_order` ascending for nodes that set one,
//! then store index order for the rest. A trap stack confines Tab
//! cycling to a subtree (modal dialogs); focus history lets a closed
//! trap hand focus back to where it was.

use crate::store::Store;
use crate::types::ComponentType;

#[derive(Default)]
pub struct FocusManager {
    trap_stack: Vec<usize>,
    history: Vec<usize>,
}

impl FocusManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Focusable, visible nodes in traversal order, confined to the
    /// active trap if one is set.
    pub fn focusable_nodes(&self, store: &Store) -> Vec<usize> {
        let trap = self.trap_stack.last().copied();
        let mut nodes: Vec<usize> = (0..store.node_count())
            .filter(|&i| {
                store.focusable(i)
                    && store.visible(i)
                    && store.component_type(i) != ComponentType::None as u8
                    && trap.is_none_or(|t| is_descendant(store, i, t))
            })
            .collect();
        // Explicit orders first (ascending), then index order; the sort
        // is stable so equal keys keep index order.
        nodes.sort_by_key(|&i| {
            let order = store.focus_order(i);
            if order >= 0 { (0, order) } else { (1, i as i32) }
        });
        nodes
    }

    /// Move focus to a specific node. No-op for unfocusable targets.
    pub fn focus(&mut self, store: &Store, node: usize) -> bool {
        if node >= store.node_count() || !store.focusable(node) || !store.visible(node) {
            return false;
        }
        store.set_focused_index(Some(node));
        true
    }

    pub fn blur(&mut self, store: &Store) {
        store.set_focused_index(None);
    }

    /// Tab: next node in order, wrapping. Focuses the first node when
    /// nothing holds focus.
    pub fn focus_next(&mut self, store: &Store) -> Option<usize> {
        self.advance(store, 1)
    }

    /// Shift+Tab: previous node, wrapping.
    pub fn focus_previous(&mut self, store: &Store) -> Option<usize> {
        self.advance(store, -1)
    }

    fn advance(&mut self, store: &Store, direction: i32) -> Option<usize> {
        let nodes = self.focusable_nodes(store);
        if nodes.is_empty() {
            return None;
        }
        let next = match store.focused_index().and_then(|f| {
            nodes.iter().position(|&n| n == f)
        }) {
            Some(pos) => {
                let len = nodes.len() as i32;
                nodes[((pos as i32 + direction).rem_euclid(len)) as usize]
            }
            None => {
                if direction >= 0 {
                    nodes[0]
                } else {
                    *nodes.last().unwrap()
                }
            }
        };
        store.set_focused_index(Some(next));
        Some(next)
    }

    /// Confine traversal to `container`'s subtree, remembering the
    /// current focus for when the trap pops.
    pub fn push_trap(&mut self, store: &Store, container: usize) {
        if let Some(focused) = store.focused_index() {
            self.history.push(focused);
        }
        self.trap_stack.push(container);
    }

    /// Release the innermost trap and restore the remembered focus.
    pub fn pop_trap(&mut self, store: &Store) {
        self.trap_stack.pop();
        if let Some(prev) = self.history.pop() {
            if prev < store.node_count() && store.focusable(prev) && store.visible(prev) {
                store.set_focused_index(Some(prev));
            }
        }
    }

    pub fn trapped(&self) -> bool {
        !self.trap_stack.is_empty()
    }
}

fn is_descendant(store: &Store, mut node: usize, ancestor: usize) -> bool {
    loop {
        if node == ancestor {
            return true;
        }
        match store.parent_index(node) {
            Some(p) => node = p,
            None => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreConfig;

    fn store_with_focusables() -> (Store, Vec<usize>) {
        let store = Store::allocate(StoreConfig {
            capacity: 16,
            text_pool_size: 128,
            ring_size: 4,
        })
        .unwrap();
        let root = store.reserve_node().unwrap();
        store.set_component_type(root, ComponentType::Box as u8);
        let mut nodes = Vec::new();
        for _ in 0..3 {
            let i = store.reserve_node().unwrap();
            store.set_component_type(i, ComponentType::Box as u8);
            store.set_parent(i, Some(root)).unwrap();
            store.set_focusable(i, true);
            nodes.push(i);
        }
        (store, nodes)
    }

    #[test]
    fn tab_cycles_forward_and_wraps() {
        let (store, nodes) = store_with_focusables();
        let mut fm = FocusManager::new();
        assert_eq!(fm.focus_next(&store), Some(nodes[0]));
        assert_eq!(fm.focus_next(&store), Some(nodes[1]));
        assert_eq!(fm.focus_next(&store), Some(nodes[2]));
        assert_eq!(fm.focus_next(&store), Some(nodes[0]));
    }

    #[test]
    fn shift_tab_cycles_backward() {
        let (store, nodes) = store_with_focusables();
        let mut fm = FocusManager::new();
        assert_eq!(fm.focus_previous(&store), Some(nodes[2]));
        assert_eq!(fm.focus_previous(&store), Some(nodes[1]));
    }

    #[test]
    fn explicit_order_wins() {
        let (store, nodes) = store_with_focusables();
        store.set_focus_order(nodes[2], 0);
        let mut fm = FocusManager::new();
        assert_eq!(fm.focus_next(&store), Some(nodes[2]));
        assert_eq!(fm.focus_next(&store), Some(nodes[0]));
    }

    #[test]
    fn invisible_nodes_skipped() {
        let (store, nodes) = store_with_focusables();
        store.set_visible(nodes[1], false);
        let mut fm = FocusManager::new();
        fm.focus_next(&store);
        assert_eq!(fm.focus_next(&store), Some(nodes[2]));
    }

    #[test]
    fn trap_confines_and_restores() {
        let (store, nodes) = store_with_focusables();
        let mut fm = FocusManager::new();
        fm.focus(&store, nodes[0]);

        // Trap on a subtree: a container with one focusable child.
        let dialog = store.reserve_node().unwrap();
        store.set_component_type(dialog, ComponentType::Box as u8);
        let button = store.reserve_node().unwrap();
        store.set_component_type(button, ComponentType::Box as u8);
        store.set_parent(button, Some(dialog)).unwrap();
        store.set_focusable(button, true);

        fm.push_trap(&store, dialog);
        assert_eq!(fm.focus_next(&store), Some(button));
        assert_eq!(fm.focus_next(&store), Some(button), "trap must cycle inside");

        fm.pop_trap(&store);
        assert_eq!(store.focused_index(), Some(nodes[0]));
    }

    #[test]
    fn blur_clears_focus() {
        let (store, nodes) = store_with_focusables();
        let mut fm = FocusManager::new();
        fm.focus(&store, nodes[1]);
        assert_eq!(store.focused_index(), Some(nodes[1]));
        fm.blur(&store);
        assert_eq!(store.focused_index(), None);
    }
}
