//! Text leaf primitive.
//!
//! Content can be a literal, a signal, or a getter; reactive content is
//! bound by an effect that rewrites the node's pool span and marks TEXT
//! and LAYOUT dirty (new content can change intrinsic size).

use crate::reactive::{effect, effect_scope, on_scope_dispose};
use crate::store::DirtyMask;
use crate::types::ComponentType;

use super::bind::{bind_color, bind_dim, bind_enum, bind_f32, bind_field};
use super::binder;
use super::types::{Cleanup, PropValue, TextProps};

pub fn text(props: TextProps) -> Cleanup {
    let store = binder::store();
    let parent = binder::current_parent();

    let reserved = match parent {
        Some(p) => store.reserve_child_node(p),
        None => store.reserve_node(),
    };
    let index = match reserved {
        Ok(i) => i,
        Err(e) => {
            log::error!("text not created: {e}");
            return Box::new(|| {});
        }
    };
    binder::log_allocation(index);

    store.set_component_type(index, ComponentType::Text as u8);
    if let Some(p) = parent {
        store.set_parent(index, Some(p)).unwrap();
    }

    let scope = effect_scope();
    scope.run(|| {
        let s = &store;

        match props.content {
            Some(PropValue::Static(content)) => {
                if let Err(e) = store.write_text(index, &content) {
                    log::warn!("text content dropped: {e}");
                }
            }
            Some(PropValue::Signal(signal)) => {
                let store = store.clone();
                let _ = effect(move || {
                    let content = signal.get();
                    if let Err(e) = store.write_text(index, &content) {
                        log::warn!("text content dropped: {e}");
                        return;
                    }
                    binder::commit(&store, index, DirtyMask::TEXT | DirtyMask::LAYOUT);
                });
            }
            Some(PropValue::Getter(getter)) => {
                let store = store.clone();
                let _ = effect(move || {
                    let content = getter();
                    if let Err(e) = store.write_text(index, &content) {
                        log::warn!("text content dropped: {e}");
                        return;
                    }
                    binder::commit(&store, index, DirtyMask::TEXT | DirtyMask::LAYOUT);
                });
            }
            None => {}
        }

        bind_color!(s, index, props.fg, DirtyMask::VISUAL, set_fg_color);
        bind_color!(s, index, props.bg, DirtyMask::VISUAL, set_bg_color);
        if let Some(attrs) = props.attrs {
            bind_field(s, index, attrs, DirtyMask::VISUAL, |s, i, v: crate::types::Attr| {
                s.set_attrs(i, v.bits())
            });
        }
        bind_enum!(s, index, props.align, DirtyMask::VISUAL, set_text_align);
        bind_enum!(s, index, props.wrap, DirtyMask::LAYOUT, set_text_wrap);
        bind_dim!(s, index, props.width, DirtyMask::LAYOUT, set_width);
        bind_dim!(s, index, props.height, DirtyMask::LAYOUT, set_height);
        bind_f32!(s, index, props.grow, DirtyMask::LAYOUT, set_flex_grow);
        if let Some(visible) = props.visible {
            bind_field(s, index, visible, DirtyMask::LAYOUT | DirtyMask::HIERARCHY, |s, i, v| {
                s.set_visible(i, v)
            });
        }

        let store = store.clone();
        on_scope_dispose(move || {
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
