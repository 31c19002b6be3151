//! Output accumulation and stateful cell emission.
//!
//! Frames are built into one byte buffer and handed to the sink in a
//! single write. The [`CellWriter`] tracks the cursor position and the
//! last SGR state so sequential cells with unchanged style cost one
//! glyph's worth of bytes.

use std::io::{self, Write};

use crate::types::{Attr, Cell, Rgba};

use super::ansi;

/// Accumulates a frame's bytes for one write to the sink.
#[derive(Debug, Default)]
pub struct OutputBuffer {
    data: Vec<u8>,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self {
            data: Vec::with_capacity(16 * 1024),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn clear(&mut self) {
        self.data.clear();
    }

    #[inline]
    pub fn write_str(&mut self, s: &str) {
        self.data.extend_from_slice(s.as_bytes());
    }

    #[inline]
    pub fn write_glyph(&mut self, glyph: u32) {
        if let Some(c) = char::from_u32(glyph) {
            let mut buf = [0u8; 4];
            self.data.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
        }
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Hand the whole frame to the sink in one write, then reset.
    pub fn flush_to<W: Write>(&mut self, sink: &mut W) -> io::Result<()> {
        if self.data.is_empty() {
            return Ok(());
        }
        sink.write_all(&self.data)?;
        sink.flush()?;
        self.data.clear();
        Ok(())
    }
}

impl Write for OutputBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.data.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Emits cells while tracking cursor and SGR state, so only deltas reach
/// the wire.
#[derive(Debug)]
pub struct CellWriter {
    last_x: i32,
    last_y: i32,
    last_fg: Option<Rgba>,
    last_bg: Option<Rgba>,
    last_attrs: Attr,
}

impl CellWriter {
    pub fn new() -> Self {
        Self {
            last_x: -2,
            last_y: -2,
            last_fg: None,
            last_bg: None,
            last_attrs: Attr::NONE,
        }
    }

    /// Forget tracked state; the next cell re-emits everything.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Emit one cell at `(x, y)`.
    ///
    /// Continuation halves of wide glyphs advance the tracked position
    /// without emitting; the wide glyph itself covers both cells.
    pub fn emit(&mut self, out: &mut OutputBuffer, x: u16, y: u16, cell: &Cell) {
        if cell.glyph == Cell::CONTINUATION {
            self.last_x = x as i32;
            self.last_y = y as i32;
            return;
        }

        if y as i32 != self.last_y || x as i32 != self.last_x + 1 {
            ansi::cursor_to(out, x, y).ok();
        }

        if cell.attrs != self.last_attrs {
            // Attribute changes reset everything, then rebuild.
            ansi::reset(out).ok();
            if !cell.attrs.is_empty() {
                ansi::attrs(out, cell.attrs).ok();
            }
            self.last_fg = None;
            self.last_bg = None;
            self.last_attrs = cell.attrs;
        }

        if self.last_fg != Some(cell.fg) {
            ansi::fg(out, cell.fg).ok();
            self.last_fg = Some(cell.fg);
        }
        if self.last_bg != Some(cell.bg) {
            ansi::bg(out, cell.bg).ok();
            self.last_bg = Some(cell.bg);
        }

        out.write_glyph(cell.glyph);
        self.last_x = x as i32;
        self.last_y = y as i32;
    }

    /// Emit a cell's style deltas and glyph with no cursor movement.
    ///
    /// For sequential (inline) writing where position is implicit.
    /// Continuation cells become a space to keep the grid aligned.
    pub fn emit_sequential(&mut self, out: &mut OutputBuffer, cell: &Cell) {
        if cell.glyph == Cell::CONTINUATION {
            return;
        }

        if cell.attrs != self.last_attrs {
            ansi::reset(out).ok();
            if !cell.attrs.is_empty() {
                ansi::attrs(out, cell.attrs).ok();
            }
            self.last_fg = None;
            self.last_bg = None;
            self.last_attrs = cell.attrs;
        }
        if self.last_fg != Some(cell.fg) {
            ansi::fg(out, cell.fg).ok();
            self.last_fg = Some(cell.fg);
        }
        if self.last_bg != Some(cell.bg) {
            ansi::bg(out, cell.bg).ok();
            self.last_bg = Some(cell.bg);
        }
        out.write_glyph(cell.glyph);
    }
}

impl Default for CellWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(glyph: char) -> Cell {
        Cell {
            glyph: glyph as u32,
            fg: Rgba::WHITE,
            bg: Rgba::BLACK,
            attrs: Attr::NONE,
        }
    }

    #[test]
    fn buffer_single_flush() {
        let mut buf = OutputBuffer::new();
        buf.write_str("ab");
        buf.write_glyph('c' as u32);
        let mut sink = Vec::new();
        buf.flush_to(&mut sink).unwrap();
        assert_eq!(sink, b"abc");
        assert!(buf.is_empty());
    }

    #[test]
    fn sequential_cells_skip_cursor_moves() {
        let mut writer = CellWriter::new();
        let mut out = OutputBuffer::new();

        writer.emit(&mut out, 0, 0, &cell('A'));
        let first = out.len();
        out.clear();
        writer.emit(&mut out, 1, 0, &cell('B'));
        assert!(out.len() < first, "adjacent cell re-emitted cursor or SGR");
        assert_eq!(out.as_bytes(), b"B");
    }

    #[test]
    fn jump_re_emits_cursor_only() {
        let mut writer = CellWriter::new();
        let mut out = OutputBuffer::new();
        writer.emit(&mut out, 0, 0, &cell('A'));
        out.clear();
        writer.emit(&mut out, 5, 2, &cell('B'));
        assert_eq!(out.as_bytes(), b"\x1b[3;6HB");
    }

    #[test]
    fn attr_change_resets_colors() {
        let mut writer = CellWriter::new();
        let mut out = OutputBuffer::new();
        writer.emit(&mut out, 0, 0, &cell('A'));
        out.clear();
        let bold = Cell {
            attrs: Attr::BOLD,
            ..cell('B')
        };
        writer.emit(&mut out, 1, 0, &bold);
        let s = String::from_utf8_lossy(out.as_bytes()).to_string();
        assert!(s.contains("\x1b[0m"));
        assert!(s.contains("\x1b[1m"));
        assert!(s.ends_with('B'));
    }

    #[test]
    fn continuation_cells_emit_nothing() {
        let mut writer = CellWriter::new();
        let mut out = OutputBuffer::new();
        let cont = Cell {
            glyph: Cell::CONTINUATION,
            ..cell(' ')
        };
        writer.emit(&mut out, 0, 0, &cont);
        assert!(out.is_empty());
    }
}
