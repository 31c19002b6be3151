//! Frame diffing and minimal byte emission.
//!
//! Keeps the previously presented frame and emits only the cells that
//! changed, wrapped in a synchronized-output block, as one write to the
//! sink. After presenting, the new frame is swapped (not copied) into
//! the renderer.
//!
//! An unchanged frame emits zero bytes. The first frame, or any frame
//! after a resize or [`DiffRenderer::invalidate`], repaints everything
//! from a cleared screen.

use std::io::{self, Write};

use crate::framebuffer::FrameBuffer;
use crate::framebuffer::compose::Caret;

use super::ansi;
use super::output::{CellWriter, OutputBuffer};

pub struct DiffRenderer {
    output: OutputBuffer,
    cells: CellWriter,
    prev: FrameBuffer,
    prev_valid: bool,
    cursor_shown: bool,
}

impl DiffRenderer {
    pub fn new() -> Self {
        Self {
            output: OutputBuffer::new(),
            cells: CellWriter::new(),
            prev: FrameBuffer::new(0, 0),
            prev_valid: false,
            cursor_shown: false,
        }
    }

    /// Drop the previous frame; the next render is a full repaint.
    pub fn invalidate(&mut self) {
        self.prev_valid = false;
    }

    /// Present `next`, emitting only changes. Returns true if any bytes
    /// were written.
    pub fn render<W: Write>(
        &mut self,
        next: &mut FrameBuffer,
        caret: Option<Caret>,
        sink: &mut W,
    ) -> io::Result<bool> {
        let full = !self.prev_valid
            || self.prev.width() != next.width()
            || self.prev.height() != next.height();

        if !full && self.prev == *next && caret_unchanged(self.cursor_shown, &caret) {
            // Nothing moved; the terminal already shows this frame.
            return Ok(false);
        }

        ansi::begin_sync(&mut self.output)?;
        self.cells.reset();

        if full {
            ansi::clear_screen(&mut self.output)?;
            for y in 0..next.height() {
                for x in 0..next.width() {
                    let cell = next.get(x, y).unwrap();
                    self.cells.emit(&mut self.output, x, y, cell);
                }
            }
        } else {
            for y in 0..next.height() {
                for x in 0..next.width() {
                    let cell = next.get(x, y).unwrap();
                    if self.prev.get(x, y) != Some(cell) {
                        self.cells.emit(&mut self.output, x, y, cell);
                    }
                }
            }
        }

        // Hardware cursor: parked on the focused caret, otherwise hidden.
        match caret {
            Some(c) => {
                ansi::cursor_to(&mut self.output, c.x, c.y)?;
                ansi::cursor_shape(&mut self.output, c.style)?;
                ansi::cursor_show(&mut self.output)?;
                self.cursor_shown = true;
            }
            None => {
                if self.cursor_shown || full {
                    ansi::cursor_hide(&mut self.output)?;
                    self.cursor_shown = false;
                }
            }
        }

        ansi::end_sync(&mut self.output)?;
        self.output.flush_to(sink)?;

        std::mem::swap(&mut self.prev, next);
        self.prev_valid = true;
        Ok(true)
    }
}

fn caret_unchanged(cursor_shown: bool, caret: &Option<Caret>) -> bool {
    // Identical frames can still need bytes when the caret toggles.
    // Position changes always come with cell changes (the input text or
    // focus ring repaints), so visibility is the only extra signal.
    caret.is_some() == cursor_shown
}

impl Default for DiffRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Inline-mode renderer: owns only as many rows as the tree needs,
/// anchored at the cursor row where it was mounted. Every frame moves
/// back to the anchor and overwrites.
pub struct InlineRenderer {
    output: OutputBuffer,
    cells: CellWriter,
    rows_drawn: u16,
}

impl InlineRenderer {
    pub fn new() -> Self {
        Self {
            output: OutputBuffer::new(),
            cells: CellWriter::new(),
            rows_drawn: 0,
        }
    }

    pub fn render<W: Write>(&mut self, fb: &FrameBuffer, sink: &mut W) -> io::Result<()> {
        ansi::begin_sync(&mut self.output)?;

        // Return to the anchor row.
        if self.rows_drawn > 1 {
            ansi::cursor_up(&mut self.output, self.rows_drawn - 1)?;
        }
        ansi::cursor_column_zero(&mut self.output)?;

        self.cells.reset();
        for y in 0..fb.height() {
            if y > 0 {
                self.output.write_str("\r\n");
            }
            for x in 0..fb.width() {
                let cell = fb.get(x, y).unwrap();
                self.cells.emit_sequential(&mut self.output, cell);
            }
            ansi::reset(&mut self.output)?;
            ansi::erase_to_eol(&mut self.output)?;
            self.cells.reset();
        }

        ansi::end_sync(&mut self.output)?;
        self.rows_drawn = fb.height();
        self.output.flush_to(sink)
    }

    /// Erase the rendered region on unmount, leaving the shell where it
    /// started.
    pub fn clear<W: Write>(&mut self, sink: &mut W) -> io::Result<()> {
        if self.rows_drawn > 1 {
            ansi::cursor_up(&mut self.output, self.rows_drawn - 1)?;
        }
        ansi::cursor_column_zero(&mut self.output)?;
        for y in 0..self.rows_drawn {
            if y > 0 {
                self.output.write_str("\r\n");
            }
            ansi::erase_to_eol(&mut self.output)?;
        }
        self.rows_drawn = 0;
        self.output.flush_to(sink)
    }
}

impl Default for InlineRenderer {
    fn default() -> Self {
        Self::new()
    }
}
