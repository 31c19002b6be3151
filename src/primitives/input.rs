//! Editable input primitive.
//!
//! An input is a focusable leaf whose text the engine edits in place:
//! keystrokes for the focused node rewrite the store span and move the
//! caret, so the authoring side never sits on the keystroke path. The
//! `value` prop seeds (and can reactively replace) the content; read the
//! current text back through the store handle.

use crate::reactive::{effect, effect_scope, on_scope_dispose};
use crate::store::DirtyMask;
use crate::types::ComponentType;

use super::bind::{bind_color, bind_dim, bind_field};
use super::binder;
use super::types::{Cleanup, InputProps, PropValue};

pub fn input(props: InputProps) -> Cleanup {
    let store = binder::store();
    let parent = binder::current_parent();

    let reserved = match parent {
        Some(p) => store.reserve_child_node(p),
        None => store.reserve_node(),
    };
    let index = match reserved {
        Ok(i) => i,
        Err(e) => {
            log::error!("input not created: {e}");
            return Box::new(|| {});
        }
    };
    binder::log_allocation(index);

    store.set_component_type(index, ComponentType::Input as u8);
    if let Some(p) = parent {
        store.set_parent(index, Some(p)).unwrap();
    }
    store.set_focusable(index, true);
    store.set_focus_order(index, props.focus_order.unwrap_or(-1));
    store.set_cursor_style(index, props.cursor_style);
    store.set_selection(index, -1, -1);

    let scope = effect_scope();
    scope.run(|| {
        let s = &store;

        match props.value {
            Some(PropValue::Static(value)) => {
                if store.write_text(index, &value).is_ok() {
                    store.set_caret(index, value.chars().count() as i32);
                }
            }
            Some(PropValue::Signal(signal)) => {
                let store = store.clone();
                let _ = effect(move || {
                    let value = signal.get();
                    if store.write_text(index, &value).is_ok() {
                        store.set_caret(index, value.chars().count() as i32);
                        binder::commit(&store, index, DirtyMask::TEXT | DirtyMask::LAYOUT);
                    }
                });
            }
            Some(PropValue::Getter(getter)) => {
                let store = store.clone();
                let _ = effect(move || {
                    let value = getter();
                    if store.write_text(index, &value).is_ok() {
                        store.set_caret(index, value.chars().count() as i32);
                        binder::commit(&store, index, DirtyMask::TEXT | DirtyMask::LAYOUT);
                    }
                });
            }
            None => {}
        }

        bind_dim!(s, index, props.width, DirtyMask::LAYOUT, set_width);
        bind_dim!(s, index, props.height, DirtyMask::LAYOUT, set_height);
        bind_color!(s, index, props.fg, DirtyMask::VISUAL, set_fg_color);
        bind_color!(s, index, props.bg, DirtyMask::VISUAL, set_bg_color);
        if let Some(border) = props.border {
            bind_field(
                s,
                index,
                border,
                DirtyMask::LAYOUT | DirtyMask::VISUAL,
                |s, i, style: crate::types::BorderStyle| {
                    let width = (style != crate::types::BorderStyle::None) as u8;
                    s.set_border_style(i, style as u8);
                    s.set_border_t_width(i, width);
                    s.set_border_r_width(i, width);
                    s.set_border_b_width(i, width);
                    s.set_border_l_width(i, width);
                },
            );
        }
        bind_color!(s, index, props.border_color, DirtyMask::VISUAL, set_border_color);
        if let Some(visible) = props.visible {
            bind_field(s, index, visible, DirtyMask::LAYOUT | DirtyMask::HIERARCHY, |s, i, v| {
                s.set_visible(i, v)
            });
        }

        let store = store.clone();
        on_scope_dispose(move || {
            if store.focused_index() == Some(index) {
                store.set_focused_index(None);
            }
            let parent = store.parent_index(index);
            store.release_node(index);
            if let Some(p) = parent {
                binder::commit(&store, p, DirtyMask::HIERARCHY);
            }
        });
    });

    binder::commit(
        &store,
        index,
        DirtyMask::LAYOUT | DirtyMask::TEXT | DirtyMask::HIERARCHY,
    );

    Box::new(move || scope.stop())
}
