//! Box: the flexbox container primitive.
//!
//! Reserves a node, writes static props once, spawns one binding effect
//! per reactive prop, then runs `children` with this node as the parent
//! context. The whole subtree lives in one scope; the returned cleanup
//! stops it and releases the node.

use crate::reactive::{effect_scope, on_scope_dispose};
use crate::store::DirtyMask;
use crate::types::ComponentType;

use super::bind::{bind_color, bind_dim, bind_enum, bind_f32, bind_field};
use super::binder;
use super::types::{BoxProps, Cleanup, PropValue};

pub fn box_primitive(props: BoxProps) -> Cleanup {
    let store = binder::store();
    let parent = binder::current_parent();

    let reserved = match parent {
        Some(p) => store.reserve_child_node(p),
        None => store.reserve_node(),
    };
    let index = match reserved {
        Ok(i) => i,
        Err(e) => {
            log::error!("box not created: {e}");
            return Box::new(|| {});
        }
    };
    binder::log_allocation(index);

    store.set_component_type(index, ComponentType::Box as u8);
    if let Some(p) = parent {
        // reserve_child_node guarantees the ordering precondition.
        store.set_parent(index, Some(p)).unwrap();
    }

    let scope = effect_scope();
    scope.run(|| {
        let s = &store;

        bind_dim!(s, index, props.width, DirtyMask::LAYOUT, set_width);
        bind_dim!(s, index, props.height, DirtyMask::LAYOUT, set_height);
        bind_dim!(s, index, props.min_width, DirtyMask::LAYOUT, set_min_w);
        bind_dim!(s, index, props.min_height, DirtyMask::LAYOUT, set_min_h);
        bind_dim!(s, index, props.max_width, DirtyMask::LAYOUT, set_max_w);
        bind_dim!(s, index, props.max_height, DirtyMask::LAYOUT, set_max_h);
        bind_dim!(s, index, props.basis, DirtyMask::LAYOUT, set_flex_basis);

        bind_enum!(s, index, props.direction, DirtyMask::LAYOUT, set_flex_direction);
        bind_enum!(s, index, props.wrap, DirtyMask::LAYOUT, set_flex_wrap);
        bind_enum!(s, index, props.justify, DirtyMask::LAYOUT, set_justify_content);
        bind_enum!(s, index, props.align_items, DirtyMask::LAYOUT, set_align_items);
        bind_enum!(s, index, props.align_content, DirtyMask::LAYOUT, set_align_content);
        bind_enum!(s, index, props.align_self, DirtyMask::LAYOUT, set_align_self);
        bind_enum!(s, index, props.position, DirtyMask::LAYOUT, set_position);
        bind_enum!(s, index, props.overflow, DirtyMask::LAYOUT, set_overflow);

        bind_f32!(s, index, props.grow, DirtyMask::LAYOUT, set_flex_grow);
        bind_f32!(s, index, props.shrink, DirtyMask::LAYOUT, set_flex_shrink);

        // Shorthands apply to the sides not individually set.
        bind_sides(
            s,
            index,
            props.padding,
            [props.padding_top, props.padding_right, props.padding_bottom, props.padding_left],
            Sides::Padding,
        );
        bind_sides(
            s,
            index,
            props.margin,
            [props.margin_top, props.margin_right, props.margin_bottom, props.margin_left],
            Sides::Margin,
        );

        bind_f32!(s, index, props.gap, DirtyMask::LAYOUT, set_gap);
        bind_f32!(s, index, props.row_gap, DirtyMask::LAYOUT, set_row_gap);
        bind_f32!(s, index, props.column_gap, DirtyMask::LAYOUT, set_column_gap);

        bind_f32!(s, index, props.inset_top, DirtyMask::LAYOUT, set_inset_t);
        bind_f32!(s, index, props.inset_right, DirtyMask::LAYOUT, set_inset_r);
        bind_f32!(s, index, props.inset_bottom, DirtyMask::LAYOUT, set_inset_b);
        bind_f32!(s, index, props.inset_left, DirtyMask::LAYOUT, set_inset_l);

        // Border style also toggles the layout-affecting edge widths.
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
        bind_color!(s, index, props.bg, DirtyMask::VISUAL, set_bg_color);
        bind_color!(s, index, props.fg, DirtyMask::VISUAL, set_fg_color);
        if let Some(attrs) = props.attrs {
            bind_field(s, index, attrs, DirtyMask::VISUAL, |s, i, v: crate::types::Attr| {
                s.set_attrs(i, v.bits())
            });
        }

        if let Some(visible) = props.visible {
            bind_field(s, index, visible, DirtyMask::LAYOUT | DirtyMask::HIERARCHY, |s, i, v| {
                s.set_visible(i, v)
            });
        }
        if props.focusable {
            store.set_focusable(index, true);
            store.set_focus_order(index, props.focus_order.unwrap_or(-1));
        }
        if let Some(z) = props.z {
            store.set_hit_z(index, z);
        }

        // Release path: drop the node and tell layout the tree changed.
        {
            let store = store.clone();
            on_scope_dispose(move || {
                let parent = store.parent_index(index);
                store.release_node(index);
                if let Some(p) = parent {
                    binder::commit(&store, p, DirtyMask::HIERARCHY);
                }
            });
        }

        if let Some(children) = props.children {
            binder::push_parent(index);
            children();
            binder::pop_parent();
        }
    });

    // All fields written; commit the node in one go.
    binder::commit(
        &store,
        index,
        DirtyMask::LAYOUT | DirtyMask::VISUAL | DirtyMask::HIERARCHY,
    );

    Box::new(move || scope.stop())
}

enum Sides {
    Padding,
    Margin,
}

type SideProp = Option<PropValue<f32>>;

/// Bind a four-side shorthand plus per-side overrides.
fn bind_sides(
    store: &std::sync::Arc<crate::store::Store>,
    index: usize,
    shorthand: SideProp,
    sides: [SideProp; 4],
    kind: Sides,
) {
    let setters: [fn(&crate::store::Store, usize, f32); 4] = match kind {
        Sides::Padding => [
            crate::store::Store::set_padding_t,
            crate::store::Store::set_padding_r,
            crate::store::Store::set_padding_b,
            crate::store::Store::set_padding_l,
        ],
        Sides::Margin => [
            crate::store::Store::set_margin_t,
            crate::store::Store::set_margin_r,
            crate::store::Store::set_margin_b,
            crate::store::Store::set_margin_l,
        ],
    };

    let mut side_present = [false; 4];
    for (slot, prop) in sides.into_iter().enumerate() {
        if let Some(prop) = prop {
            side_present[slot] = true;
            let setter = setters[slot];
            bind_field(store, index, prop, DirtyMask::LAYOUT, move |s, i, v| setter(s, i, v));
        }
    }

    if let Some(shorthand) = shorthand {
        match shorthand {
            PropValue::Static(v) => {
                for (slot, setter) in setters.iter().enumerate() {
                    if !side_present[slot] {
                        setter(store, index, v);
                    }
                }
            }
            reactive => {
                // One effect fans the shorthand out to the unset sides.
                let unset: Vec<fn(&crate::store::Store, usize, f32)> = setters
                    .iter()
                    .zip(side_present)
                    .filter(|(_, present)| !present)
                    .map(|(setter, _)| *setter)
                    .collect();
                bind_field(store, index, reactive, DirtyMask::LAYOUT, move |s, i, v| {
                    for setter in &unset {
                        setter(s, i, v);
                    }
                });
            }
        }
    }
}
