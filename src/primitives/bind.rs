//! Field binding: one effect per reactive prop, plain writes for the
//! rest.
//!
//! A binding effect re-runs when its prop's signal changes: it writes the
//! store field, marks the node dirty with the mask that matches the
//! field's pipeline phase, and requests a (coalesced) wake. Static props
//! never create effects; the constructor commits them in one batch.

use std::sync::Arc;

use crate::reactive::effect;
use crate::store::{DirtyMask, Store};

use super::binder::commit;
use super::types::PropValue;

pub(crate) fn bind_field<T, F>(
    store: &Arc<Store>,
    index: usize,
    prop: PropValue<T>,
    mask: DirtyMask,
    write: F,
) where
    T: Clone + PartialEq + 'static,
    F: Fn(&Store, usize, T) + 'static,
{
    match prop {
        PropValue::Static(v) => write(store, index, v),
        PropValue::Signal(s) => {
            let store = store.clone();
            let _ = effect(move || {
                let v = s.get();
                write(&store, index, v);
                commit(&store, index, mask);
            });
        }
        PropValue::Getter(g) => {
            let store = store.clone();
            let _ = effect(move || {
                let v = g();
                write(&store, index, v);
                commit(&store, index, mask);
            });
        }
    }
}

/// Bind a `Dimension` prop to an f32-encoded store field.
macro_rules! bind_dim {
    ($store:expr, $index:expr, $prop:expr, $mask:expr, $setter:ident) => {
        if let Some(prop) = $prop {
            $crate::primitives::bind::bind_field($store, $index, prop, $mask, |s, i, v| {
                s.$setter(i, crate::types::Dimension::encode(&v))
            });
        }
    };
}

/// Bind a plain f32 prop.
macro_rules! bind_f32 {
    ($store:expr, $index:expr, $prop:expr, $mask:expr, $setter:ident) => {
        if let Some(prop) = $prop {
            $crate::primitives::bind::bind_field($store, $index, prop, $mask, |s, i, v| {
                s.$setter(i, v)
            });
        }
    };
}

/// Bind an enum prop through its u8 wire value.
macro_rules! bind_enum {
    ($store:expr, $index:expr, $prop:expr, $mask:expr, $setter:ident) => {
        if let Some(prop) = $prop {
            $crate::primitives::bind::bind_field($store, $index, prop, $mask, |s, i, v| {
                s.$setter(i, v as u8)
            });
        }
    };
}

/// Bind an `Rgba` prop to a packed color field.
macro_rules! bind_color {
    ($store:expr, $index:expr, $prop:expr, $mask:expr, $setter:ident) => {
        if let Some(prop) = $prop {
            $crate::primitives::bind::bind_field($store, $index, prop, $mask, |s, i, v| {
                s.$setter(i, crate::types::pack_color(v))
            });
        }
    };
}

pub(crate) use {bind_color, bind_dim, bind_enum, bind_f32};
