//! Engine-side text editing for input nodes.
//!
//! The engine owns editing because keystrokes arrive on its thread: it
//! rewrites the node's text span, moves the caret (in characters), and
//! marks TEXT dirty so the frame repaints. Selection replaces on typing
//! and deletes as a unit.

use crate::store::{DirtyMask, Store};
use crate::store::events::{
    EventRecord, KEY_BACKSPACE, KEY_DELETE, KEY_END, KEY_HOME, KEY_LEFT, KEY_RIGHT, Modifiers,
};

/// Apply one key event to the focused input node. Returns true when the
/// node changed (text or caret).
pub fn apply_key(store: &Store, node: usize, event: &EventRecord) -> bool {
    let changed = match event.keycode {
        KEY_LEFT => move_caret(store, node, -1, event.modifiers.contains(Modifiers::SHIFT)),
        KEY_RIGHT => move_caret(store, node, 1, event.modifiers.contains(Modifiers::SHIFT)),
        KEY_HOME => set_caret(store, node, 0, event.modifiers.contains(Modifiers::SHIFT)),
        KEY_END => {
            let len = store.text(node).chars().count() as i32;
            set_caret(store, node, len, event.modifiers.contains(Modifiers::SHIFT))
        }
        KEY_BACKSPACE => delete_at(store, node, true),
        KEY_DELETE => delete_at(store, node, false),
        code => match char::from_u32(code) {
            Some(c)
                if !c.is_control()
                    && !event
                        .modifiers
                        .intersects(Modifiers::CTRL | Modifiers::ALT | Modifiers::SUPER) =>
            {
                insert_str(store, node, c.encode_utf8(&mut [0u8; 4]))
            }
            _ => false,
        },
    };
    if changed {
        store.mark_dirty(node, DirtyMask::TEXT | DirtyMask::LAYOUT);
    }
    changed
}

/// Insert text at the caret, replacing any selection.
pub fn insert_str(store: &Store, node: usize, text: &str) -> bool {
    if text.is_empty() {
        return false;
    }
    let current = store.text(node).to_string();
    let (sel_start, sel_end) = selection_range(store, node, &current);
    let start_byte = byte_of_char(&current, sel_start);
    let end_byte = byte_of_char(&current, sel_end);

    let mut next = String::with_capacity(current.len() + text.len());
    next.push_str(&current[..start_byte]);
    next.push_str(text);
    next.push_str(&current[end_byte..]);

    if store.write_text(node, &next).is_err() {
        log::warn!("input text dropped: text pool full");
        return false;
    }
    let caret = sel_start + text.chars().count() as i32;
    store.set_caret(node, caret);
    store.set_selection(node, -1, -1);
    true
}

fn delete_at(store: &Store, node: usize, backwards: bool) -> bool {
    let current = store.text(node).to_string();
    let (sel_start, sel_end) = selection_range(store, node, &current);

    let (from, to) = if sel_start != sel_end {
        (sel_start, sel_end)
    } else {
        let caret = store.caret(node).max(0);
        if backwards {
            if caret == 0 {
                return false;
            }
            (caret - 1, caret)
        } else {
            if caret >= current.chars().count() as i32 {
                return false;
            }
            (caret, caret + 1)
        }
    };

    let start_byte = byte_of_char(&current, from);
    let end_byte = byte_of_char(&current, to);
    let mut next = String::with_capacity(current.len());
    next.push_str(&current[..start_byte]);
    next.push_str(&current[end_byte..]);

    if store.write_text(node, &next).is_err() {
        return false;
    }
    store.set_caret(node, from);
    store.set_selection(node, -1, -1);
    true
}

fn move_caret(store: &Store, node: usize, delta: i32, select: bool) -> bool {
    let target = store.caret(node).max(0) + delta;
    set_caret(store, node, target, select)
}

fn set_caret(store: &Store, node: usize, position: i32, select: bool) -> bool {
    let len = store.text(node).chars().count() as i32;
    let old = store.caret(node);
    let new = position.clamp(0, len);

    if select {
        let (anchor, _) = store.selection(node);
        let anchor = if anchor < 0 { old } else { anchor };
        store.set_selection(node, anchor, new);
    } else {
        store.set_selection(node, -1, -1);
    }
    store.set_caret(node, new);
    new != old || select
}

/// Normalized selection as (start, end) character indices; collapses to
/// the caret when nothing is selected.
fn selection_range(store: &Store, node: usize, text: &str) -> (i32, i32) {
    let len = text.chars().count() as i32;
    let (a, b) = store.selection(node);
    if a < 0 || b < 0 {
        let caret = store.caret(node).clamp(0, len);
        return (caret, caret);
    }
    let (a, b) = (a.clamp(0, len), b.clamp(0, len));
    (a.min(b), a.max(b))
}

fn byte_of_char(s: &str, char_index: i32) -> usize {
    s.char_indices()
        .nth(char_index.max(0) as usize)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}
