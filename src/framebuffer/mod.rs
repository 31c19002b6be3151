//! Cell framebuffer and drawing primitives.
//!
//! A 2-D grid of [`Cell`]s in flat row-major storage. All drawing clips
//! against an optional [`ClipRect`]; translucent backgrounds blend into
//! what is already in the cell; wide glyphs occupy two cells with the
//! trailing half marked as a continuation.

pub mod compose;

use crate::layout::text_measure::cluster_width;
use crate::types::{Attr, BorderStyle, Cell, ClipRect, Rgba};

/// A 2-D buffer of terminal cells, `index = y * width + x`.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBuffer {
    width: u16,
    height: u16,
    cells: Vec<Cell>,
}

impl FrameBuffer {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            cells: vec![Cell::default(); width as usize * height as usize],
        }
    }

    #[inline]
    pub fn width(&self) -> u16 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u16 {
        self.height
    }

    #[inline]
    pub fn bounds(&self) -> ClipRect {
        ClipRect::new(0, 0, self.width, self.height)
    }

    #[inline]
    fn index(&self, x: u16, y: u16) -> usize {
        y as usize * self.width as usize + x as usize
    }

    #[inline]
    pub fn in_bounds(&self, x: u16, y: u16) -> bool {
        x < self.width && y < self.height
    }

    #[inline]
    pub fn get(&self, x: u16, y: u16) -> Option<&Cell> {
        if self.in_bounds(x, y) {
            Some(&self.cells[self.index(x, y)])
        } else {
            None
        }
    }

    #[inline]
    pub fn get_mut(&mut self, x: u16, y: u16) -> Option<&mut Cell> {
        if self.in_bounds(x, y) {
            let idx = self.index(x, y);
            Some(&mut self.cells[idx])
        } else {
            None
        }
    }

    #[inline]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Reset every cell to the default.
    pub fn clear(&mut self) {
        self.cells.fill(Cell::default());
    }

    /// Resize and clear. Used on terminal resize.
    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        self.cells.clear();
        self.cells
            .resize(width as usize * height as usize, Cell::default());
    }

    // =========================================================================
    // Drawing
    // =========================================================================

    /// Write one cell, honoring bounds and clip. Translucent backgrounds
    /// blend over the existing cell. Returns whether anything was written.
    pub fn set_cell(
        &mut self,
        x: i32,
        y: i32,
        glyph: u32,
        fg: Rgba,
        bg: Rgba,
        attrs: Attr,
        clip: Option<&ClipRect>,
    ) -> bool {
        if x < 0 || y < 0 {
            return false;
        }
        let (x, y) = (x as u16, y as u16);
        if !self.in_bounds(x, y) {
            debug_assert!(
                clip.is_some() || (x < self.width && y < self.height),
                "cell write outside the framebuffer"
            );
            return false;
        }
        if let Some(clip) = clip {
            if !clip.contains(x as i32, y as i32) {
                return false;
            }
        }

        let idx = self.index(x, y);
        let cell = &mut self.cells[idx];
        let blended_bg = if bg.is_transparent() {
            cell.bg
        } else if bg.is_opaque() || bg.is_terminal_default() || bg.is_ansi() {
            bg
        } else {
            Rgba::blend(bg, cell.bg)
        };
        cell.glyph = glyph;
        cell.fg = fg;
        cell.bg = blended_bg;
        cell.attrs = attrs;
        true
    }

    /// Fill a rectangle's background, clearing glyphs.
    pub fn fill_rect(
        &mut self,
        x: i32,
        y: i32,
        width: u16,
        height: u16,
        bg: Rgba,
        clip: Option<&ClipRect>,
    ) {
        let rect = ClipRect::new(x, y, width, height);
        let rect = match clip {
            Some(clip) => match rect.intersect(clip) {
                Some(r) => r,
                None => return,
            },
            None => rect,
        };
        let Some((x1, y1, w, h)) = rect.intersect(&self.bounds()).and_then(|r| r.visible_on_screen())
        else {
            return;
        };

        let opaque = bg.is_opaque() || bg.is_terminal_default() || bg.is_ansi();
        for row in y1..y1 + h {
            let start = self.index(x1, row);
            for cell in &mut self.cells[start..start + w as usize] {
                cell.bg = if opaque { bg } else { Rgba::blend(bg, cell.bg) };
                cell.glyph = b' ' as u32;
                cell.attrs = Attr::NONE;
            }
        }
    }

    /// Draw one character; background `None` leaves the cell's bg alone.
    pub fn draw_char(
        &mut self,
        x: i32,
        y: i32,
        ch: char,
        fg: Rgba,
        bg: Option<Rgba>,
        attrs: Attr,
        clip: Option<&ClipRect>,
    ) -> bool {
        self.set_cell(x, y, ch as u32, fg, bg.unwrap_or(Rgba::TRANSPARENT), attrs, clip)
    }

    /// Draw a string left-to-right from `(x, y)`.
    ///
    /// Wide glyphs take two cells; the second is marked continuation.
    /// Returns the number of cells advanced.
    pub fn draw_text(
        &mut self,
        x: i32,
        y: i32,
        text: &str,
        fg: Rgba,
        bg: Option<Rgba>,
        attrs: Attr,
        clip: Option<&ClipRect>,
    ) -> u16 {
        use unicode_segmentation::UnicodeSegmentation;

        let bg = bg.unwrap_or(Rgba::TRANSPARENT);
        let mut col = x;
        for cluster in text.graphemes(true) {
            if col >= self.width as i32 {
                break;
            }
            let w = cluster_width(cluster);
            if w == 0 {
                continue;
            }
            // A cluster renders from its first scalar; trailing marks are
            // already accounted for by cluster_width.
            let glyph = cluster.chars().next().map(|c| c as u32).unwrap_or(b' ' as u32);
            if self.set_cell(col, y, glyph, fg, bg, attrs, clip) && w == 2 {
                self.set_cell(col + 1, y, Cell::CONTINUATION, fg, bg, attrs, clip);
            }
            col += w as i32;
        }
        (col - x).max(0) as u16
    }

    /// Which border sides a node draws.
    pub fn draw_border(
        &mut self,
        x: i32,
        y: i32,
        width: u16,
        height: u16,
        style: BorderStyle,
        sides: BorderSides,
        color: Rgba,
        clip: Option<&ClipRect>,
    ) {
        if width == 0 || height == 0 || style == BorderStyle::None || sides == BorderSides::NONE {
            return;
        }
        let (horiz, vert, tl, tr, br, bl) = style.glyphs();
        let x2 = x + width as i32 - 1;
        let y2 = y + height as i32 - 1;

        if sides.top {
            for col in x..=x2 {
                self.draw_char(col, y, horiz, color, None, Attr::NONE, clip);
            }
        }
        if sides.bottom {
            for col in x..=x2 {
                self.draw_char(col, y2, horiz, color, None, Attr::NONE, clip);
            }
        }
        if sides.left {
            for row in y..=y2 {
                self.draw_char(x, row, vert, color, None, Attr::NONE, clip);
            }
        }
        if sides.right {
            for row in y..=y2 {
                self.draw_char(x2, row, vert, color, None, Attr::NONE, clip);
            }
        }

        // Corners exist where two sides meet; a lone side keeps its run
        // of straight glyphs instead.
        if sides.top && sides.left {
            self.draw_char(x, y, tl, color, None, Attr::NONE, clip);
        }
        if sides.top && sides.right {
            self.draw_char(x2, y, tr, color, None, Attr::NONE, clip);
        }
        if sides.bottom && sides.right {
            self.draw_char(x2, y2, br, color, None, Attr::NONE, clip);
        }
        if sides.bottom && sides.left {
            self.draw_char(x, y2, bl, color, None, Attr::NONE, clip);
        }
    }
}

/// Which of a node's four border sides are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BorderSides {
    pub top: bool,
    pub right: bool,
    pub bottom: bool,
    pub left: bool,
}

impl BorderSides {
    pub const NONE: Self = Self {
        top: false,
        right: false,
        bottom: false,
        left: false,
    };

    pub const ALL: Self = Self {
        top: true,
        right: true,
        bottom: true,
        left: true,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creation_and_bounds() {
        let fb = FrameBuffer::new(10, 4);
        assert_eq!(fb.width(), 10);
        assert_eq!(fb.height(), 4);
        assert!(fb.get(9, 3).is_some());
        assert!(fb.get(10, 0).is_none());
    }

    #[test]
    fn set_cell_and_read_back() {
        let mut fb = FrameBuffer::new(10, 4);
        fb.set_cell(3, 1, 'X' as u32, Rgba::RED, Rgba::BLACK, Attr::BOLD, None);
        let cell = fb.get(3, 1).unwrap();
        assert_eq!(cell.glyph, 'X' as u32);
        assert_eq!(cell.fg, Rgba::RED);
        assert_eq!(cell.attrs, Attr::BOLD);
    }

    #[test]
    fn out_of_bounds_write_dropped() {
        let mut fb = FrameBuffer::new(4, 4);
        assert!(!fb.set_cell(-1, 0, 'x' as u32, Rgba::WHITE, Rgba::BLACK, Attr::NONE, Some(&fb.bounds())));
        assert!(!fb.set_cell(4, 0, 'x' as u32, Rgba::WHITE, Rgba::BLACK, Attr::NONE, Some(&fb.bounds())));
    }

    #[test]
    fn clip_blocks_writes() {
        let mut fb = FrameBuffer::new(10, 10);
        let clip = ClipRect::new(2, 2, 3, 3);
        assert!(!fb.set_cell(0, 0, 'x' as u32, Rgba::WHITE, Rgba::BLACK, Attr::NONE, Some(&clip)));
        assert!(fb.set_cell(2, 2, 'x' as u32, Rgba::WHITE, Rgba::BLACK, Attr::NONE, Some(&clip)));
    }

    #[test]
    fn fill_rect_sets_background() {
        let mut fb = FrameBuffer::new(10, 10);
        fb.fill_rect(2, 2, 4, 4, Rgba::BLUE, None);
        assert_eq!(fb.get(2, 2).unwrap().bg, Rgba::BLUE);
        assert_eq!(fb.get(5, 5).unwrap().bg, Rgba::BLUE);
        assert_eq!(fb.get(6, 6).unwrap().bg, Rgba::TERMINAL_DEFAULT);
    }

    #[test]
    fn fill_rect_translucent_blends() {
        let mut fb = FrameBuffer::new(4, 1);
        fb.fill_rect(0, 0, 4, 1, Rgba::BLACK, None);
        fb.fill_rect(0, 0, 4, 1, Rgba::new(255, 255, 255, 128), None);
        let bg = fb.get(0, 0).unwrap().bg;
        assert!(bg.r > 120 && bg.r < 135);
    }

    #[test]
    fn draw_text_basic() {
        let mut fb = FrameBuffer::new(10, 2);
        let advanced = fb.draw_text(0, 0, "hi", Rgba::WHITE, None, Attr::NONE, None);
        assert_eq!(advanced, 2);
        assert_eq!(fb.get(0, 0).unwrap().glyph, 'h' as u32);
        assert_eq!(fb.get(1, 0).unwrap().glyph, 'i' as u32);
    }

    #[test]
    fn draw_text_wide_glyph_continuation() {
        let mut fb = FrameBuffer::new(10, 1);
        fb.draw_text(0, 0, "你a", Rgba::WHITE, None, Attr::NONE, None);
        assert_eq!(fb.get(0, 0).unwrap().glyph, '你' as u32);
        assert_eq!(fb.get(1, 0).unwrap().glyph, Cell::CONTINUATION);
        assert_eq!(fb.get(2, 0).unwrap().glyph, 'a' as u32);
    }

    #[test]
    fn border_full_box() {
        let mut fb = FrameBuffer::new(6, 4);
        fb.draw_border(0, 0, 6, 4, BorderStyle::Single, BorderSides::ALL, Rgba::WHITE, None);
        assert_eq!(fb.get(0, 0).unwrap().glyph, '┌' as u32);
        assert_eq!(fb.get(5, 0).unwrap().glyph, '┐' as u32);
        assert_eq!(fb.get(0, 3).unwrap().glyph, '└' as u32);
        assert_eq!(fb.get(5, 3).unwrap().glyph, '┘' as u32);
        assert_eq!(fb.get(2, 0).unwrap().glyph, '─' as u32);
        assert_eq!(fb.get(0, 2).unwrap().glyph, '│' as u32);
    }

    #[test]
    fn border_partial_sides_no_corner() {
        let mut fb = FrameBuffer::new(6, 4);
        let sides = BorderSides {
            top: true,
            right: false,
            bottom: false,
            left: false,
        };
        fb.draw_border(0, 0, 6, 4, BorderStyle::Single, sides, Rgba::WHITE, None);
        // Lone top side runs straight across, no corner glyphs.
        assert_eq!(fb.get(0, 0).unwrap().glyph, '─' as u32);
        assert_eq!(fb.get(5, 0).unwrap().glyph, '─' as u32);
        assert_eq!(fb.get(0, 1).unwrap().glyph, b' ' as u32);
    }

    #[test]
    fn resize_clears() {
        let mut fb = FrameBuffer::new(4, 4);
        fb.set_cell(0, 0, 'x' as u32, Rgba::WHITE, Rgba::BLACK, Attr::NONE, None);
        fb.resize(8, 8);
        assert_eq!(fb.width(), 8);
        assert_eq!(fb.get(0, 0).unwrap().glyph, b' ' as u32);
    }
}
