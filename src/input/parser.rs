//! Escape-sequence decoder for terminal input.
//!
//! A byte state machine over the raw stdin stream. Recognizes CSI key
//! sequences (arrows, Home/End, Insert/Delete, PgUp/PgDn, F1-F12,
//! xterm and CSI-u modifier forms), SS3 keys, SGR and X10 mouse reports,
//! bracketed paste, focus in/out, Alt-chords, control bytes, and UTF-8
//! text.
//!
//! Malformed sequences are skipped to the next safe resync point and
//! counted; decoding never fails outward.

use crate::store::events::{
    EventKind, EventRecord, KEY_BACKSPACE, KEY_DELETE, KEY_DOWN, KEY_END, KEY_ENTER, KEY_ESCAPE,
    KEY_HOME, KEY_INSERT, KEY_LEFT, KEY_PAGE_DOWN, KEY_PAGE_UP, KEY_RIGHT, KEY_TAB, KEY_UP,
    Modifiers, key_f,
};

/// A decoded unit of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Key { keycode: u32, modifiers: Modifiers },
    Mouse { kind: EventKind, button: u8, x: u16, y: u16, modifiers: Modifiers },
    Scroll { x: u16, y: u16, delta_y: i16 },
    Paste(String),
    FocusGained,
    FocusLost,
}

impl Decoded {
    fn key(keycode: u32, modifiers: Modifiers) -> Self {
        Self::Key { keycode, modifiers }
    }
}

enum Step {
    Emit(Decoded, usize),
    Skip(usize),
    Garbage(usize),
    Incomplete,
}

/// Streaming decoder; feed bytes, collect events.
pub struct Parser {
    buf: Vec<u8>,
    paste: Option<Vec<u8>>,
    decode_errors: u64,
}

impl Parser {
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(64),
            paste: None,
            decode_errors: 0,
        }
    }

    /// Malformed sequences dropped so far (telemetry, never an error).
    pub fn decode_errors(&self) -> u64 {
        self.decode_errors
    }

    /// Bytes held back waiting for a sequence to complete.
    pub fn has_pending(&self) -> bool {
        !self.buf.is_empty()
    }

    /// Feed bytes, returning every event they complete.
    pub fn feed(&mut self, data: &[u8]) -> Vec<Decoded> {
        self.buf.extend_from_slice(data);
        let mut events = Vec::new();

        loop {
            if self.buf.is_empty() {
                break;
            }

            if self.paste.is_some() {
                match self.continue_paste() {
                    Some(event) => events.push(event),
                    None => break,
                }
                continue;
            }

            match self.step() {
                Step::Emit(event, n) => {
                    self.buf.drain(..n);
                    events.push(event);
                }
                Step::Skip(n) => {
                    self.buf.drain(..n);
                }
                Step::Garbage(n) => {
                    self.buf.drain(..n);
                    self.decode_errors += 1;
                }
                Step::Incomplete => break,
            }
        }
        events
    }

    /// Flush bytes stuck mid-sequence (the escape-timeout path): a lone
    /// ESC becomes the Escape key.
    pub fn flush_pending(&mut self) -> Vec<Decoded> {
        let mut events = Vec::new();
        if self.buf.first() == Some(&0x1B) {
            self.buf.remove(0);
            events.push(Decoded::key(KEY_ESCAPE, Modifiers::NONE));
            events.extend(self.feed(&[]));
        } else {
            let rest = std::mem::take(&mut self.buf);
            events.extend(self.feed(&rest));
        }
        events
    }

    // =========================================================================
    // Single-step decode
    // =========================================================================

    fn step(&mut self) -> Step {
        let first = self.buf[0];
        match first {
            0x1B => self.step_escape(),
            // Control bytes map to Ctrl+letter, with a few dedicated keys.
            0x0D | 0x0A => Step::Emit(Decoded::key(KEY_ENTER, Modifiers::NONE), 1),
            0x09 => Step::Emit(Decoded::key(KEY_TAB, Modifiers::NONE), 1),
            0x08 | 0x7F => Step::Emit(Decoded::key(KEY_BACKSPACE, Modifiers::NONE), 1),
            0x01..=0x1A => Step::Emit(
                Decoded::key((first - 1 + b'a') as u32, Modifiers::CTRL),
                1,
            ),
            0x00 | 0x1C..=0x1F => Step::Garbage(1),
            0x20..=0x7E => Step::Emit(Decoded::key(first as u32, Modifiers::NONE), 1),
            0x80..=0xFF => self.step_utf8(),
        }
    }

    fn step_utf8(&mut self) -> Step {
        let len = match self.buf[0] {
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => return Step::Garbage(1),
        };
        if self.buf.len() < len {
            return Step::Incomplete;
        }
        match std::str::from_utf8(&self.buf[..len]) {
            Ok(s) => {
                let c = s.chars().next().unwrap();
                Step::Emit(Decoded::key(c as u32, Modifiers::NONE), len)
            }
            Err(_) => Step::Garbage(1),
        }
    }

    fn step_escape(&mut self) -> Step {
        if self.buf.len() < 2 {
            return Step::Incomplete;
        }
        match self.buf[1] {
            b'[' => self.step_csi(),
            b'O' => self.step_ss3(),
            0x1B => Step::Emit(Decoded::key(KEY_ESCAPE, Modifiers::ALT), 2),
            0x20..=0x7E => Step::Emit(
                Decoded::key(self.buf[1] as u32, Modifiers::ALT),
                2,
            ),
            _ => Step::Emit(Decoded::key(KEY_ESCAPE, Modifiers::NONE), 1),
        }
    }

    fn step_ss3(&mut self) -> Step {
        if self.buf.len() < 3 {
            return Step::Incomplete;
        }
        let event = match self.buf[2] {
            b'A' => Decoded::key(KEY_UP, Modifiers::NONE),
            b'B' => Decoded::key(KEY_DOWN, Modifiers::NONE),
            b'C' => Decoded::key(KEY_RIGHT, Modifiers::NONE),
            b'D' => Decoded::key(KEY_LEFT, Modifiers::NONE),
            b'H' => Decoded::key(KEY_HOME, Modifiers::NONE),
            b'F' => Decoded::key(KEY_END, Modifiers::NONE),
            b'P' => Decoded::key(key_f(1), Modifiers::NONE),
            b'Q' => Decoded::key(key_f(2), Modifiers::NONE),
            b'R' => Decoded::key(key_f(3), Modifiers::NONE),
            b'S' => Decoded::key(key_f(4), Modifiers::NONE),
            _ => return Step::Garbage(3),
        };
        Step::Emit(event, 3)
    }

    fn step_csi(&mut self) -> Step {
        if self.buf.len() < 3 {
            return Step::Incomplete;
        }

        if self.buf[2] == b'<' {
            return self.step_sgr_mouse();
        }
        if self.buf[2] == b'M' {
            return self.step_x10_mouse();
        }
        if self.buf[2] == b'I' {
            return Step::Emit(Decoded::FocusGained, 3);
        }
        if self.buf[2] == b'O' {
            return Step::Emit(Decoded::FocusLost, 3);
        }

        // Find the final byte.
        let mut end = 2;
        while end < self.buf.len() && !(0x40..=0x7E).contains(&self.buf[end]) {
            end += 1;
        }
        if end >= self.buf.len() {
            if self.buf.len() > 32 {
                // Runaway parameter bytes: resync.
                return Step::Garbage(self.buf.len());
            }
            return Step::Incomplete;
        }

        let final_byte = self.buf[end];
        let params: Vec<u32> = self.buf[2..end]
            .split(|&b| b == b';')
            .map(|p| {
                std::str::from_utf8(p)
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0)
            })
            .collect();
        let consumed = end + 1;

        let modifiers = params
            .get(1)
            .copied()
            .filter(|&m| m > 0)
            .map(decode_modifiers)
            .unwrap_or(Modifiers::NONE);

        let event = match final_byte {
            b'A' => Decoded::key(KEY_UP, modifiers),
            b'B' => Decoded::key(KEY_DOWN, modifiers),
            b'C' => Decoded::key(KEY_RIGHT, modifiers),
            b'D' => Decoded::key(KEY_LEFT, modifiers),
            b'H' => Decoded::key(KEY_HOME, modifiers),
            b'F' => Decoded::key(KEY_END, modifiers),
            b'Z' => Decoded::key(KEY_TAB, Modifiers::SHIFT),
            b'u' => {
                // CSI-u: codepoint;modifiers u
                let code = params.first().copied().unwrap_or(0);
                if code == 0 {
                    return Step::Garbage(consumed);
                }
                Decoded::key(code, modifiers)
            }
            b'~' => match params.first().copied().unwrap_or(0) {
                1 | 7 => Decoded::key(KEY_HOME, modifiers),
                2 => Decoded::key(KEY_INSERT, modifiers),
                3 => Decoded::key(KEY_DELETE, modifiers),
                4 | 8 => Decoded::key(KEY_END, modifiers),
                5 => Decoded::key(KEY_PAGE_UP, modifiers),
                6 => Decoded::key(KEY_PAGE_DOWN, modifiers),
                11..=15 => Decoded::key(key_f((params[0] - 10) as u8), modifiers),
                17..=21 => Decoded::key(key_f((params[0] - 11) as u8), modifiers),
                23 | 24 => Decoded::key(key_f((params[0] - 12) as u8), modifiers),
                200 => {
                    self.paste = Some(Vec::new());
                    return Step::Skip(consumed);
                }
                _ => return Step::Garbage(consumed),
            },
            _ => return Step::Garbage(consumed),
        };
        Step::Emit(event, consumed)
    }

    fn step_sgr_mouse(&mut self) -> Step {
        // ESC [ < b ; x ; y (M|m)
        let mut end = 3;
        while end < self.buf.len() && !matches!(self.buf[end], b'M' | b'm') {
            if !self.buf[end].is_ascii_digit() && self.buf[end] != b';' {
                return Step::Garbage(end + 1);
            }
            end += 1;
        }
        if end >= self.buf.len() {
            if self.buf.len() > 32 {
                return Step::Garbage(self.buf.len());
            }
            return Step::Incomplete;
        }

        let release = self.buf[end] == b'm';
        let params: Vec<u32> = self.buf[3..end]
            .split(|&b| b == b';')
            .map(|p| {
                std::str::from_utf8(p)
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0)
            })
            .collect();
        let consumed = end + 1;
        if params.len() != 3 {
            return Step::Garbage(consumed);
        }

        let b = params[0];
        // Terminal reports 1-indexed positions.
        let x = params[1].saturating_sub(1) as u16;
        let y = params[2].saturating_sub(1) as u16;
        let mut modifiers = Modifiers::NONE;
        if b & 4 != 0 {
            modifiers |= Modifiers::SHIFT;
        }
        if b & 8 != 0 {
            modifiers |= Modifiers::ALT;
        }
        if b & 16 != 0 {
            modifiers |= Modifiers::CTRL;
        }

        let event = if b & 64 != 0 {
            // Wheel: 64 up, 65 down.
            let delta = if b & 1 != 0 { 1 } else { -1 };
            Decoded::Scroll { x, y, delta_y: delta }
        } else if b & 32 != 0 {
            Decoded::Mouse { kind: EventKind::MouseMove, button: (b & 3) as u8, x, y, modifiers }
        } else {
            let kind = if release { EventKind::MouseUp } else { EventKind::MouseDown };
            Decoded::Mouse { kind, button: (b & 3) as u8, x, y, modifiers }
        };
        Step::Emit(event, consumed)
    }

    fn step_x10_mouse(&mut self) -> Step {
        // ESC [ M b x y, all offset by 32.
        if self.buf.len() < 6 {
            return Step::Incomplete;
        }
        let b = self.buf[3].saturating_sub(32) as u32;
        let x = self.buf[4].saturating_sub(33) as u16;
        let y = self.buf[5].saturating_sub(33) as u16;
        let event = if b & 64 != 0 {
            Decoded::Scroll { x, y, delta_y: if b & 1 != 0 { 1 } else { -1 } }
        } else if b & 3 == 3 {
            Decoded::Mouse { kind: EventKind::MouseUp, button: 0, x, y, modifiers: Modifiers::NONE }
        } else {
            Decoded::Mouse {
                kind: EventKind::MouseDown,
                button: (b & 3) as u8,
                x,
                y,
                modifiers: Modifiers::NONE,
            }
        };
        Step::Emit(event, 6)
    }

    /// Accumulate paste bytes until the `ESC [ 201 ~` terminator.
    fn continue_paste(&mut self) -> Option<Decoded> {
        const TERMINATOR: &[u8] = b"\x1b[201~";
        let pending = self.paste.as_mut().unwrap();

        if let Some(pos) = find_subslice(&self.buf, TERMINATOR) {
            pending.extend_from_slice(&self.buf[..pos]);
            self.buf.drain(..pos + TERMINATOR.len());
            let bytes = self.paste.take().unwrap();
            return Some(Decoded::Paste(String::from_utf8_lossy(&bytes).into_owned()));
        }

        // Keep a terminator-sized tail in case it arrives split.
        let keep = TERMINATOR.len().saturating_sub(1).min(self.buf.len());
        let take = self.buf.len() - keep;
        pending.extend_from_slice(&self.buf[..take]);
        self.buf.drain(..take);
        None
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

/// xterm modifier parameter: value - 1 is a bitset of shift/alt/ctrl.
fn decode_modifiers(param: u32) -> Modifiers {
    let bits = param.saturating_sub(1);
    let mut m = Modifiers::NONE;
    if bits & 1 != 0 {
        m |= Modifiers::SHIFT;
    }
    if bits & 2 != 0 {
        m |= Modifiers::ALT;
    }
    if bits & 4 != 0 {
        m |= Modifiers::CTRL;
    }
    if bits & 8 != 0 {
        m |= Modifiers::SUPER;
    }
    m
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Convert a decoded unit into the ring's record form. Paste is handled
/// separately because its payload lives in the text pool.
pub fn to_record(decoded: &Decoded, timestamp_ms: u32) -> Option<EventRecord> {
    let mut record = match decoded {
        Decoded::Key { keycode, modifiers } => EventRecord::key_press(*keycode, *modifiers),
        Decoded::Mouse { kind, button, x, y, modifiers } => {
            EventRecord::mouse(*kind, *button, *x, *y, *modifiers)
        }
        Decoded::Scroll { x, y, delta_y } => EventRecord::scroll(*x, *y, 0, *delta_y),
        Decoded::FocusGained => EventRecord {
            kind: EventKind::FocusGained,
            ..Default::default()
        },
        Decoded::FocusLost => EventRecord {
            kind: EventKind::FocusLost,
            ..Default::default()
        },
        Decoded::Paste(_) => return None,
    };
    record.timestamp_ms = timestamp_ms;
    Some(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one(bytes: &[u8]) -> Decoded {
        let mut p = Parser::new();
        let events = p.feed(bytes);
        assert_eq!(events.len(), 1, "expected one event from {:?}", bytes);
        events.into_iter().next().unwrap()
    }

    #[test]
    fn printable_ascii() {
        assert_eq!(parse_one(b"a"), Decoded::key('a' as u32, Modifiers::NONE));
        assert_eq!(parse_one(b" "), Decoded::key(' ' as u32, Modifiers::NONE));
    }

    #[test]
    fn utf8_multibyte() {
        assert_eq!(parse_one("é".as_bytes()), Decoded::key('é' as u32, Modifiers::NONE));
        assert_eq!(parse_one("你".as_bytes()), Decoded::key('你' as u32, Modifiers::NONE));
    }

    #[test]
    fn utf8_split_across_feeds() {
        let mut p = Parser::new();
        let bytes = "你".as_bytes();
        assert!(p.feed(&bytes[..1]).is_empty());
        assert_eq!(p.feed(&bytes[1..]), vec![Decoded::key('你' as u32, Modifiers::NONE)]);
    }

    #[test]
    fn control_bytes() {
        assert_eq!(parse_one(b"\r"), Decoded::key(KEY_ENTER, Modifiers::NONE));
        assert_eq!(parse_one(b"\t"), Decoded::key(KEY_TAB, Modifiers::NONE));
        assert_eq!(parse_one(b"\x7f"), Decoded::key(KEY_BACKSPACE, Modifiers::NONE));
        assert_eq!(parse_one(b"\x03"), Decoded::key('c' as u32, Modifiers::CTRL));
    }

    #[test]
    fn arrow_keys() {
        assert_eq!(parse_one(b"\x1b[A"), Decoded::key(KEY_UP, Modifiers::NONE));
        assert_eq!(parse_one(b"\x1b[B"), Decoded::key(KEY_DOWN, Modifiers::NONE));
        assert_eq!(parse_one(b"\x1b[C"), Decoded::key(KEY_RIGHT, Modifiers::NONE));
        assert_eq!(parse_one(b"\x1b[D"), Decoded::key(KEY_LEFT, Modifiers::NONE));
        assert_eq!(parse_one(b"\x1bOA"), Decoded::key(KEY_UP, Modifiers::NONE));
    }

    #[test]
    fn modified_arrows() {
        // xterm form: CSI 1;5 C = Ctrl+Right.
        assert_eq!(parse_one(b"\x1b[1;5C"), Decoded::key(KEY_RIGHT, Modifiers::CTRL));
        assert_eq!(
            parse_one(b"\x1b[1;2A"),
            Decoded::key(KEY_UP, Modifiers::SHIFT)
        );
    }

    #[test]
    fn tilde_keys() {
        assert_eq!(parse_one(b"\x1b[3~"), Decoded::key(KEY_DELETE, Modifiers::NONE));
        assert_eq!(parse_one(b"\x1b[5~"), Decoded::key(KEY_PAGE_UP, Modifiers::NONE));
        assert_eq!(parse_one(b"\x1b[6~"), Decoded::key(KEY_PAGE_DOWN, Modifiers::NONE));
        assert_eq!(parse_one(b"\x1b[15~"), Decoded::key(key_f(5), Modifiers::NONE));
    }

    #[test]
    fn csi_u_key() {
        // CSI-u: 'a' with Ctrl.
        assert_eq!(parse_one(b"\x1b[97;5u"), Decoded::key('a' as u32, Modifiers::CTRL));
    }

    #[test]
    fn shift_tab() {
        assert_eq!(parse_one(b"\x1b[Z"), Decoded::key(KEY_TAB, Modifiers::SHIFT));
    }

    #[test]
    fn alt_chord() {
        assert_eq!(parse_one(b"\x1bx"), Decoded::key('x' as u32, Modifiers::ALT));
    }

    #[test]
    fn lone_escape_after_flush() {
        let mut p = Parser::new();
        assert!(p.feed(b"\x1b").is_empty());
        assert!(p.has_pending());
        assert_eq!(p.flush_pending(), vec![Decoded::key(KEY_ESCAPE, Modifiers::NONE)]);
    }

    #[test]
    fn sgr_mouse_press_release() {
        assert_eq!(
            parse_one(b"\x1b[<0;10;5M"),
            Decoded::Mouse {
                kind: EventKind::MouseDown,
                button: 0,
                x: 9,
                y: 4,
                modifiers: Modifiers::NONE
            }
        );
        assert_eq!(
            parse_one(b"\x1b[<0;10;5m"),
            Decoded::Mouse {
                kind: EventKind::MouseUp,
                button: 0,
                x: 9,
                y: 4,
                modifiers: Modifiers::NONE
            }
        );
    }

    #[test]
    fn sgr_mouse_wheel() {
        assert_eq!(
            parse_one(b"\x1b[<64;3;3M"),
            Decoded::Scroll { x: 2, y: 2, delta_y: -1 }
        );
        assert_eq!(
            parse_one(b"\x1b[<65;3;3M"),
            Decoded::Scroll { x: 2, y: 2, delta_y: 1 }
        );
    }

    #[test]
    fn sgr_mouse_with_ctrl() {
        assert_eq!(
            parse_one(b"\x1b[<16;2;2M"),
            Decoded::Mouse {
                kind: EventKind::MouseDown,
                button: 0,
                x: 1,
                y: 1,
                modifiers: Modifiers::CTRL
            }
        );
    }

    #[test]
    fn bracketed_paste() {
        assert_eq!(
            parse_one(b"\x1b[200~hello\nworld\x1b[201~"),
            Decoded::Paste("hello\nworld".to_string())
        );
    }

    #[test]
    fn bracketed_paste_split_feeds() {
        let mut p = Parser::new();
        assert!(p.feed(b"\x1b[200~hel").is_empty());
        assert!(p.feed(b"lo\x1b[2").is_empty());
        assert_eq!(p.feed(b"01~"), vec![Decoded::Paste("hello".to_string())]);
    }

    #[test]
    fn focus_reports() {
        assert_eq!(parse_one(b"\x1b[I"), Decoded::FocusGained);
        assert_eq!(parse_one(b"\x1b[O"), Decoded::FocusLost);
    }

    #[test]
    fn garbage_resyncs_and_counts() {
        let mut p = Parser::new();
        // Unknown CSI final byte, then a normal key.
        let events = p.feed(b"\x1b[99qx");
        assert_eq!(events, vec![Decoded::key('x' as u32, Modifiers::NONE)]);
        assert_eq!(p.decode_errors(), 1);
    }

    #[test]
    fn multiple_events_one_feed() {
        let mut p = Parser::new();
        let events = p.feed(b"ab\x1b[A");
        assert_eq!(events.len(), 3);
    }
}
