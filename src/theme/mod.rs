//! Semantic color slots, reactive.
//!
//! A theme is a set of named color signals. Props bound through
//! [`themed`] re-run when the palette swaps, so restyling the whole tree
//! is one `set_theme` call.

use std::cell::RefCell;

use crate::primitives::types::PropValue;
use crate::reactive::{Signal, batch, signal};
use crate::types::Rgba;

/// Semantic slot names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Primary,
    Surface,
    Text,
    Muted,
    Accent,
    Success,
    Warning,
    Error,
}

/// A concrete palette: one color per slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub primary: Rgba,
    pub surface: Rgba,
    pub text: Rgba,
    pub muted: Rgba,
    pub accent: Rgba,
    pub success: Rgba,
    pub warning: Rgba,
    pub error: Rgba,
}

impl Default for Palette {
    fn default() -> Self {
        // Terminal-native: let the emulator's own colors carry the UI.
        Self {
            primary: Rgba::ansi(4),
            surface: Rgba::TERMINAL_DEFAULT,
            text: Rgba::TERMINAL_DEFAULT,
            muted: Rgba::ansi(8),
            accent: Rgba::ansi(6),
            success: Rgba::ansi(2),
            warning: Rgba::ansi(3),
            error: Rgba::ansi(1),
        }
    }
}

impl Palette {
    fn get(&self, slot: Slot) -> Rgba {
        match slot {
            Slot::Primary => self.primary,
            Slot::Surface => self.surface,
            Slot::Text => self.text,
            Slot::Muted => self.muted,
            Slot::Accent => self.accent,
            Slot::Success => self.success,
            Slot::Warning => self.warning,
            Slot::Error => self.error,
        }
    }
}

struct ThemeState {
    slots: Vec<(Slot, Signal<Rgba>)>,
}

thread_local! {
    static THEME: RefCell<Option<ThemeState>> = const { RefCell::new(None) };
}

const ALL_SLOTS: [Slot; 8] = [
    Slot::Primary,
    Slot::Surface,
    Slot::Text,
    Slot::Muted,
    Slot::Accent,
    Slot::Success,
    Slot::Warning,
    Slot::Error,
];

fn with_state<R>(f: impl FnOnce(&ThemeState) -> R) -> R {
    THEME.with(|theme| {
        let mut theme = theme.borrow_mut();
        let state = theme.get_or_insert_with(|| {
            let palette = Palette::default();
            ThemeState {
                slots: ALL_SLOTS
                    .iter()
                    .map(|&slot| (slot, signal(palette.get(slot))))
                    .collect(),
            }
        });
        f(state)
    })
}

/// The signal behind a slot.
pub fn slot_signal(slot: Slot) -> Signal<Rgba> {
    with_state(|state| {
        state
            .slots
            .iter()
            .find(|(s, _)| *s == slot)
            .map(|(_, sig)| sig.clone())
            .unwrap()
    })
}

/// Current color of a slot (tracked when read inside an effect).
pub fn color(slot: Slot) -> Rgba {
    slot_signal(slot).get()
}

/// A color prop bound to a slot: re-styles when the theme changes.
pub fn themed(slot: Slot) -> PropValue<Rgba> {
    PropValue::Signal(slot_signal(slot))
}

/// Swap the whole palette in one batch (one wake downstream).
pub fn set_theme(palette: Palette) {
    batch(|| {
        with_state(|state| {
            for (slot, sig) in &state.slots {
                sig.set(palette.get(*slot));
            }
        });
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::effect;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn slots_start_from_default_palette() {
        assert_eq!(color(Slot::Error), Rgba::ansi(1));
    }

    #[test]
    fn set_theme_propagates_to_readers() {
        let seen = Rc::new(Cell::new(Rgba::TRANSPARENT));
        let seen_for_effect = seen.clone();
        let _dispose = effect(move || {
            seen_for_effect.set(color(Slot::Primary));
        });

        let mut palette = Palette::default();
        palette.primary = Rgba::rgb(10, 20, 30);
        set_theme(palette);
        assert_eq!(seen.get(), Rgba::rgb(10, 20, 30));
        set_theme(Palette::default());
    }
}
