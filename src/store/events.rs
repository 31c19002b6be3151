//! Event records carried by the store's ring buffer.
//!
//! Fixed 32-byte wire format, written by the terminal driver and drained
//! by the engine. Key codes use a stable numeric encoding: printable
//! characters are their Unicode scalar value, special keys live above the
//! Unicode range under a prefix constant so the two can never collide.

use bitflags::bitflags;

/// Size of one ring slot in bytes.
pub const EVENT_RECORD_SIZE: usize = 32;

/// Special keys are encoded as `KEYCODE_SPECIAL_BASE + offset`, well above
/// any Unicode scalar value.
pub const KEYCODE_SPECIAL_BASE: u32 = 0x0400_0000;

macro_rules! special_keys {
    ($($name:ident = $off:expr;)*) => {
        $(pub const $name: u32 = KEYCODE_SPECIAL_BASE + $off;)*
    };
}

special_keys! {
    KEY_ENTER = 0;
    KEY_TAB = 1;
    KEY_BACKSPACE = 2;
    KEY_ESCAPE = 3;
    KEY_DELETE = 4;
    KEY_UP = 5;
    KEY_DOWN = 6;
    KEY_LEFT = 7;
    KEY_RIGHT = 8;
    KEY_HOME = 9;
    KEY_END = 10;
    KEY_PAGE_UP = 11;
    KEY_PAGE_DOWN = 12;
    KEY_INSERT = 13;
}

/// Function keys: F1..=F12.
pub const fn key_f(n: u8) -> u32 {
    KEYCODE_SPECIAL_BASE + 32 + n as u32
}

bitflags! {
    /// Keyboard modifier state.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Modifiers: u8 {
        const NONE  = 0;
        const SHIFT = 1 << 0;
        const ALT   = 1 << 1;
        const CTRL  = 1 << 2;
        const SUPER = 1 << 3;
    }
}

/// Kind of an event record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum EventKind {
    #[default]
    None = 0,
    KeyPress = 1,
    KeyRelease = 2,
    MouseDown = 3,
    MouseUp = 4,
    MouseMove = 5,
    Scroll = 6,
    Resize = 7,
    Paste = 8,
    FocusGained = 9,
    FocusLost = 10,
    Exit = 11,
}

impl From<u8> for EventKind {
    fn from(v: u8) -> Self {
        match v {
            1 => Self::KeyPress,
            2 => Self::KeyRelease,
            3 => Self::MouseDown,
            4 => Self::MouseUp,
            5 => Self::MouseMove,
            6 => Self::Scroll,
            7 => Self::Resize,
            8 => Self::Paste,
            9 => Self::FocusGained,
            10 => Self::FocusLost,
            11 => Self::Exit,
            _ => Self::None,
        }
    }
}

/// One fixed-size input event.
///
/// Field use by kind:
/// - key: `keycode` + `modifiers`
/// - mouse: `x`/`y` + `keycode` as button (0 left, 1 middle, 2 right)
/// - scroll: `x`/`y` position, `delta_x`/`delta_y` in cells
/// - resize: `x` = cols, `y` = rows
/// - paste: `keycode` = byte offset into the text pool, `x` = byte length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventRecord {
    pub kind: EventKind,
    pub modifiers: Modifiers,
    pub keycode: u32,
    pub x: u16,
    pub y: u16,
    pub delta_x: i16,
    pub delta_y: i16,
    pub timestamp_ms: u32,
}

impl EventRecord {
    pub fn key_press(keycode: u32, modifiers: Modifiers) -> Self {
        Self {
            kind: EventKind::KeyPress,
            modifiers,
            keycode,
            ..Default::default()
        }
    }

    pub fn mouse(kind: EventKind, button: u8, x: u16, y: u16, modifiers: Modifiers) -> Self {
        Self {
            kind,
            modifiers,
            keycode: button as u32,
            x,
            y,
            ..Default::default()
        }
    }

    pub fn scroll(x: u16, y: u16, delta_x: i16, delta_y: i16) -> Self {
        Self {
            kind: EventKind::Scroll,
            x,
            y,
            delta_x,
            delta_y,
            ..Default::default()
        }
    }

    pub fn resize(cols: u16, rows: u16) -> Self {
        Self {
            kind: EventKind::Resize,
            x: cols,
            y: rows,
            ..Default::default()
        }
    }

    /// Paste payloads ride the text pool; the record carries the span.
    pub fn paste(offset: u32, len: u16) -> Self {
        Self {
            kind: EventKind::Paste,
            keycode: offset,
            x: len,
            ..Default::default()
        }
    }

    /// Serialize into a 32-byte slot.
    pub fn write_to(&self, slot: &mut [u8]) {
        debug_assert!(slot.len() >= EVENT_RECORD_SIZE);
        slot[0] = self.kind as u8;
        slot[1] = self.modifiers.bits();
        slot[2..4].copy_from_slice(&[0, 0]);
        slot[4..8].copy_from_slice(&self.keycode.to_le_bytes());
        slot[8..10].copy_from_slice(&self.x.to_le_bytes());
        slot[10..12].copy_from_slice(&self.y.to_le_bytes());
        slot[12..14].copy_from_slice(&self.delta_x.to_le_bytes());
        slot[14..16].copy_from_slice(&self.delta_y.to_le_bytes());
        slot[16..20].copy_from_slice(&self.timestamp_ms.to_le_bytes());
    }

    /// Deserialize from a 32-byte slot.
    pub fn read_from(slot: &[u8]) -> Self {
        debug_assert!(slot.len() >= EVENT_RECORD_SIZE);
        Self {
            kind: EventKind::from(slot[0]),
            modifiers: Modifiers::from_bits_truncate(slot[1]),
            keycode: u32::from_le_bytes(slot[4..8].try_into().unwrap()),
            x: u16::from_le_bytes(slot[8..10].try_into().unwrap()),
            y: u16::from_le_bytes(slot[10..12].try_into().unwrap()),
            delta_x: i16::from_le_bytes(slot[12..14].try_into().unwrap()),
            delta_y: i16::from_le_bytes(slot[14..16].try_into().unwrap()),
            timestamp_ms: u32::from_le_bytes(slot[16..20].try_into().unwrap()),
        }
    }
}
