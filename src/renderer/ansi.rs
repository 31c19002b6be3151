//! ANSI escape sequence writers.
//!
//! Everything the renderer and terminal driver emit goes through these:
//! cursor control, screen modes, 24-bit SGR color, attributes, mouse and
//! paste protocol toggles, and synchronized-output bracketing.

use std::io::{self, Write};

use crate::types::{Attr, Rgba};

/// Move cursor to absolute position (0-indexed in, 1-indexed on the wire).
#[inline]
pub fn cursor_to<W: Write>(w: &mut W, x: u16, y: u16) -> io::Result<()> {
    write!(w, "\x1b[{};{}H", y + 1, x + 1)
}

#[inline]
pub fn cursor_up<W: Write>(w: &mut W, n: u16) -> io::Result<()> {
    if n > 0 { write!(w, "\x1b[{}A", n) } else { Ok(()) }
}

#[inline]
pub fn cursor_column_zero<W: Write>(w: &mut W) -> io::Result<()> {
    write!(w, "\r")
}

#[inline]
pub fn cursor_hide<W: Write>(w: &mut W) -> io::Result<()> {
    write!(w, "\x1b[?25l")
}

#[inline]
pub fn cursor_show<W: Write>(w: &mut W) -> io::Result<()> {
    write!(w, "\x1b[?25h")
}

/// Set cursor shape: 0 block, 1 bar, 2 underline (blinking variants).
#[inline]
pub fn cursor_shape<W: Write>(w: &mut W, style: u8) -> io::Result<()> {
    let n = match style {
        1 => 5,
        2 => 3,
        _ => 1,
    };
    write!(w, "\x1b[{} q", n)
}

#[inline]
pub fn erase_to_eol<W: Write>(w: &mut W) -> io::Result<()> {
    write!(w, "\x1b[K")
}

#[inline]
pub fn clear_screen<W: Write>(w: &mut W) -> io::Result<()> {
    write!(w, "\x1b[2J\x1b[H")
}

#[inline]
pub fn enter_alt_screen<W: Write>(w: &mut W) -> io::Result<()> {
    write!(w, "\x1b[?1049h")
}

#[inline]
pub fn exit_alt_screen<W: Write>(w: &mut W) -> io::Result<()> {
    write!(w, "\x1b[?1049l")
}

#[inline]
pub fn disable_line_wrap<W: Write>(w: &mut W) -> io::Result<()> {
    write!(w, "\x1b[?7l")
}

#[inline]
pub fn enable_line_wrap<W: Write>(w: &mut W) -> io::Result<()> {
    write!(w, "\x1b[?7h")
}

/// Synchronized output: the terminal buffers everything until `end_sync`,
/// killing mid-frame flicker.
#[inline]
pub fn begin_sync<W: Write>(w: &mut W) -> io::Result<()> {
    write!(w, "\x1b[?2026h")
}

#[inline]
pub fn end_sync<W: Write>(w: &mut W) -> io::Result<()> {
    write!(w, "\x1b[?2026l")
}

#[inline]
pub fn enable_mouse<W: Write>(w: &mut W) -> io::Result<()> {
    // Click + motion tracking in SGR extended mode.
    write!(w, "\x1b[?1000h\x1b[?1002h\x1b[?1006h")
}

#[inline]
pub fn disable_mouse<W: Write>(w: &mut W) -> io::Result<()> {
    write!(w, "\x1b[?1006l\x1b[?1002l\x1b[?1000l")
}

#[inline]
pub fn enable_bracketed_paste<W: Write>(w: &mut W) -> io::Result<()> {
    write!(w, "\x1b[?2004h")
}

#[inline]
pub fn disable_bracketed_paste<W: Write>(w: &mut W) -> io::Result<()> {
    write!(w, "\x1b[?2004l")
}

/// Reset all attributes and colors.
#[inline]
pub fn reset<W: Write>(w: &mut W) -> io::Result<()> {
    write!(w, "\x1b[0m")
}

/// Foreground color: SGR 39 for the terminal default, indexed palette, or
/// 24-bit truecolor.
pub fn fg<W: Write>(w: &mut W, color: Rgba) -> io::Result<()> {
    if color.is_terminal_default() || color.is_transparent() {
        write!(w, "\x1b[39m")
    } else if color.is_ansi() {
        let index = color.ansi_index();
        if index < 8 {
            write!(w, "\x1b[{}m", 30 + index)
        } else if index < 16 {
            write!(w, "\x1b[{}m", 90 + index - 8)
        } else {
            write!(w, "\x1b[38;5;{}m", index)
        }
    } else {
        write!(w, "\x1b[38;2;{};{};{}m", color.r, color.g, color.b)
    }
}

/// Background color, same encoding rules as [`fg`].
pub fn bg<W: Write>(w: &mut W, color: Rgba) -> io::Result<()> {
    if color.is_terminal_default() || color.is_transparent() {
        write!(w, "\x1b[49m")
    } else if color.is_ansi() {
        let index = color.ansi_index();
        if index < 8 {
            write!(w, "\x1b[{}m", 40 + index)
        } else if index < 16 {
            write!(w, "\x1b[{}m", 100 + index - 8)
        } else {
            write!(w, "\x1b[48;5;{}m", index)
        }
    } else {
        write!(w, "\x1b[48;2;{};{};{}m", color.r, color.g, color.b)
    }
}

/// Emit the SGR codes for an attribute set.
pub fn attrs<W: Write>(w: &mut W, attr: Attr) -> io::Result<()> {
    if attr.is_empty() {
        return Ok(());
    }
    let mut first = true;
    write!(w, "\x1b[")?;
    for (flag, code) in [
        (Attr::BOLD, 1),
        (Attr::DIM, 2),
        (Attr::ITALIC, 3),
        (Attr::UNDERLINE, 4),
        (Attr::INVERSE, 7),
        (Attr::STRIKETHROUGH, 9),
    ] {
        if attr.contains(flag) {
            if !first {
                write!(w, ";")?;
            }
            write!(w, "{}", code)?;
            first = false;
        }
    }
    write!(w, "m")
}
