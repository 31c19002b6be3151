//! Core types shared by every pipeline stage.
//!
//! These flow between the authoring layer, the node store, the layout
//! engine, and the renderer. Everything here is plain data with exact
//! (integer) equality so frame diffing never needs an epsilon.

use bitflags::bitflags;

// =============================================================================
// Color
// =============================================================================

/// RGBA color with 8-bit channels.
///
/// Channels are stored as `i16` so the sentinel values survive exact
/// comparison: `r == -1` means "terminal default" (let the terminal pick),
/// `g == -2` marks an indexed ANSI palette color with the index in `r`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgba {
    pub r: i16,
    pub g: i16,
    pub b: i16,
    pub a: i16,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self {
            r: r as i16,
            g: g as i16,
            b: b as i16,
            a: a as i16,
        }
    }

    /// Opaque RGB color.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    /// Terminal default (emits SGR 39/49 instead of a color).
    pub const TERMINAL_DEFAULT: Self = Self {
        r: -1,
        g: -1,
        b: -1,
        a: -1,
    };

    /// Fully transparent; fills with this are skipped.
    pub const TRANSPARENT: Self = Self {
        r: 0,
        g: 0,
        b: 0,
        a: 0,
    };

    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const WHITE: Self = Self::rgb(255, 255, 255);
    pub const RED: Self = Self::rgb(255, 0, 0);
    pub const GREEN: Self = Self::rgb(0, 255, 0);
    pub const BLUE: Self = Self::rgb(0, 0, 255);
    pub const YELLOW: Self = Self::rgb(255, 255, 0);
    pub const CYAN: Self = Self::rgb(0, 255, 255);
    pub const MAGENTA: Self = Self::rgb(255, 0, 255);
    pub const GRAY: Self = Self::rgb(128, 128, 128);

    /// Indexed ANSI palette color (0-255).
    pub const fn ansi(index: u8) -> Self {
        Self {
            r: index as i16,
            g: -2,
            b: -2,
            a: 255,
        }
    }

    #[inline]
    pub const fn is_terminal_default(&self) -> bool {
        self.r == -1 && self.g == -1
    }

    #[inline]
    pub const fn is_ansi(&self) -> bool {
        self.g == -2
    }

    #[inline]
    pub const fn ansi_index(&self) -> u8 {
        self.r as u8
    }

    #[inline]
    pub const fn is_opaque(&self) -> bool {
        self.a == 255
    }

    #[inline]
    pub const fn is_transparent(&self) -> bool {
        self.a == 0
    }

    /// Alpha-blend `top` over `bottom` (straight alpha, integer math).
    pub fn blend(top: Rgba, bottom: Rgba) -> Rgba {
        if top.is_opaque() || bottom.is_terminal_default() || bottom.is_ansi() {
            return top;
        }
        if top.is_transparent() {
            return bottom;
        }
        let ta = top.a as i32;
        let ia = 255 - ta;
        Rgba {
            r: ((top.r as i32 * ta + bottom.r as i32 * ia) / 255) as i16,
            g: ((top.g as i32 * ta + bottom.g as i32 * ia) / 255) as i16,
            b: ((top.b as i32 * ta + bottom.b as i32 * ia) / 255) as i16,
            a: 255,
        }
    }
}

/// Pack a color into the `u32` the node store carries.
///
/// Byte order is RGBA: `r` in the most significant byte, `a` in the least.
/// The sentinels (terminal default, ANSI indexed) pack as 0, the store's
/// unset value.
#[inline]
pub const fn pack_color(c: Rgba) -> u32 {
    if c.is_terminal_default() || c.is_ansi() {
        return 0;
    }
    ((c.r as u32 & 0xFF) << 24)
        | ((c.g as u32 & 0xFF) << 16)
        | ((c.b as u32 & 0xFF) << 8)
        | (c.a as u32 & 0xFF)
}

/// Unpack a store color. Zero is the unset sentinel.
#[inline]
pub const fn unpack_color(packed: u32) -> Rgba {
    Rgba {
        r: ((packed >> 24) & 0xFF) as i16,
        g: ((packed >> 16) & 0xFF) as i16,
        b: ((packed >> 8) & 0xFF) as i16,
        a: (packed & 0xFF) as i16,
    }
}

// =============================================================================
// Cell
// =============================================================================

bitflags! {
    /// Text attributes carried per cell.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Attr: u8 {
        const NONE          = 0;
        const BOLD          = 1 << 0;
        const ITALIC        = 1 << 1;
        const UNDERLINE     = 1 << 2;
        const DIM           = 1 << 3;
        const INVERSE       = 1 << 4;
        const STRIKETHROUGH = 1 << 5;
    }
}

/// One terminal character position.
///
/// `glyph` is the Unicode scalar value; 0 marks the continuation half of a
/// wide glyph (the renderer skips it).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub glyph: u32,
    pub fg: Rgba,
    pub bg: Rgba,
    pub attrs: Attr,
}

impl Cell {
    /// Continuation marker for the trailing half of a wide glyph.
    pub const CONTINUATION: u32 = 0;
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            glyph: b' ' as u32,
            fg: Rgba::TERMINAL_DEFAULT,
            bg: Rgba::TERMINAL_DEFAULT,
            attrs: Attr::NONE,
        }
    }
}

// =============================================================================
// Clip rectangle
// =============================================================================

/// Clipping rectangle in screen space.
///
/// `x`/`y` are signed: content scrolled above or left of the viewport sits
/// at negative coordinates until the final screen clamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipRect {
    pub x: i32,
    pub y: i32,
    pub width: u16,
    pub height: u16,
}

impl ClipRect {
    pub const fn new(x: i32, y: i32, width: u16, height: u16) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[inline]
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x
            && y >= self.y
            && x < self.x + self.width as i32
            && y < self.y + self.height as i32
    }

    /// Intersection of two rects, `None` when they do not overlap.
    pub fn intersect(&self, other: &ClipRect) -> Option<ClipRect> {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width as i32).min(other.x + other.width as i32);
        let y2 = (self.y + self.height as i32).min(other.y + other.height as i32);
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(ClipRect::new(x1, y1, (x2 - x1) as u16, (y2 - y1) as u16))
    }

    /// The on-screen (non-negative) portion as `(x, y, w, h)`.
    pub fn visible_on_screen(&self) -> Option<(u16, u16, u16, u16)> {
        let x1 = self.x.max(0);
        let y1 = self.y.max(0);
        let x2 = self.x + self.width as i32;
        let y2 = self.y + self.height as i32;
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some((x1 as u16, y1 as u16, (x2 - x1) as u16, (y2 - y1) as u16))
    }
}

// =============================================================================
// Component type
// =============================================================================

/// What a node slot holds. `None` slots are ignored by layout and
/// compositing and sit on the free list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ComponentType {
    #[default]
    None = 0,
    Box = 1,
    Text = 2,
    Input = 3,
}

impl From<u8> for ComponentType {
    fn from(v: u8) -> Self {
        match v {
            1 => Self::Box,
            2 => Self::Text,
            3 => Self::Input,
            _ => Self::None,
        }
    }
}

// =============================================================================
// Border style
// =============================================================================

/// Border glyph family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum BorderStyle {
    #[default]
    None = 0,
    Single = 1,
    Double = 2,
    Rounded = 3,
    Bold = 4,
    Dashed = 5,
    Ascii = 6,
}

impl BorderStyle {
    /// Glyphs as `(horizontal, vertical, tl, tr, br, bl)`.
    pub const fn glyphs(&self) -> (char, char, char, char, char, char) {
        match self {
            Self::None => (' ', ' ', ' ', ' ', ' ', ' '),
            Self::Single => ('─', '│', '┌', '┐', '┘', '└'),
            Self::Double => ('═', '║', '╔', '╗', '╝', '╚'),
            Self::Rounded => ('─', '│', '╭', '╮', '╯', '╰'),
            Self::Bold => ('━', '┃', '┏', '┓', '┛', '┗'),
            Self::Dashed => ('╌', '╎', '┌', '┐', '┘', '└'),
            Self::Ascii => ('-', '|', '+', '+', '+', '+'),
        }
    }
}

impl From<u8> for BorderStyle {
    fn from(v: u8) -> Self {
        match v {
            1 => Self::Single,
            2 => Self::Double,
            3 => Self::Rounded,
            4 => Self::Bold,
            5 => Self::Dashed,
            6 => Self::Ascii,
            _ => Self::None,
        }
    }
}

// =============================================================================
// Flexbox enums
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum FlexDirection {
    Row = 0,
    #[default]
    Column = 1,
    RowReverse = 2,
    ColumnReverse = 3,
}

impl FlexDirection {
    #[inline]
    pub const fn is_row(&self) -> bool {
        matches!(self, Self::Row | Self::RowReverse)
    }

    #[inline]
    pub const fn is_reverse(&self) -> bool {
        matches!(self, Self::RowReverse | Self::ColumnReverse)
    }
}

impl From<u8> for FlexDirection {
    fn from(v: u8) -> Self {
        match v {
            0 => Self::Row,
            2 => Self::RowReverse,
            3 => Self::ColumnReverse,
            _ => Self::Column,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum FlexWrap {
    #[default]
    NoWrap = 0,
    Wrap = 1,
    WrapReverse = 2,
}

impl From<u8> for FlexWrap {
    fn from(v: u8) -> Self {
        match v {
            1 => Self::Wrap,
            2 => Self::WrapReverse,
            _ => Self::NoWrap,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum JustifyContent {
    #[default]
    Start = 0,
    End = 1,
    Center = 2,
    SpaceBetween = 3,
    SpaceAround = 4,
    SpaceEvenly = 5,
}

impl From<u8> for JustifyContent {
    fn from(v: u8) -> Self {
        match v {
            1 => Self::End,
            2 => Self::Center,
            3 => Self::SpaceBetween,
            4 => Self::SpaceAround,
            5 => Self::SpaceEvenly,
            _ => Self::Start,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum AlignItems {
    #[default]
    Stretch = 0,
    Start = 1,
    End = 2,
    Center = 3,
    Baseline = 4,
}

impl From<u8> for AlignItems {
    fn from(v: u8) -> Self {
        match v {
            1 => Self::Start,
            2 => Self::End,
            3 => Self::Center,
            4 => Self::Baseline,
            _ => Self::Stretch,
        }
    }
}

/// Per-item cross-axis override; `Auto` defers to the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum AlignSelf {
    #[default]
    Auto = 0,
    Stretch = 1,
    Start = 2,
    End = 3,
    Center = 4,
}

impl AlignSelf {
    pub const fn resolve(&self, container: AlignItems) -> AlignItems {
        match self {
            Self::Auto => container,
            Self::Stretch => AlignItems::Stretch,
            Self::Start => AlignItems::Start,
            Self::End => AlignItems::End,
            Self::Center => AlignItems::Center,
        }
    }
}

impl From<u8> for AlignSelf {
    fn from(v: u8) -> Self {
        match v {
            1 => Self::Stretch,
            2 => Self::Start,
            3 => Self::End,
            4 => Self::Center,
            _ => Self::Auto,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum AlignContent {
    #[default]
    Start = 0,
    End = 1,
    Center = 2,
    Stretch = 3,
    SpaceBetween = 4,
    SpaceAround = 5,
}

impl From<u8> for AlignContent {
    fn from(v: u8) -> Self {
        match v {
            1 => Self::End,
            2 => Self::Center,
            3 => Self::Stretch,
            4 => Self::SpaceBetween,
            5 => Self::SpaceAround,
            _ => Self::Start,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Position {
    #[default]
    Relative = 0,
    Absolute = 1,
}

impl From<u8> for Position {
    fn from(v: u8) -> Self {
        if v == 1 { Self::Absolute } else { Self::Relative }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Overflow {
    #[default]
    Visible = 0,
    Hidden = 1,
    Scroll = 2,
    Auto = 3,
}

impl Overflow {
    #[inline]
    pub const fn clips(&self) -> bool {
        !matches!(self, Self::Visible)
    }

    #[inline]
    pub const fn scrolls(&self) -> bool {
        matches!(self, Self::Scroll | Self::Auto)
    }
}

impl From<u8> for Overflow {
    fn from(v: u8) -> Self {
        match v {
            1 => Self::Hidden,
            2 => Self::Scroll,
            3 => Self::Auto,
            _ => Self::Visible,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Display {
    #[default]
    Flex = 0,
    None = 1,
}

impl From<u8> for Display {
    fn from(v: u8) -> Self {
        if v == 1 { Self::None } else { Self::Flex }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum TextAlign {
    #[default]
    Left = 0,
    Center = 1,
    Right = 2,
}

impl From<u8> for TextAlign {
    fn from(v: u8) -> Self {
        match v {
            1 => Self::Center,
            2 => Self::Right,
            _ => Self::Left,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum TextWrap {
    #[default]
    Wrap = 0,
    NoWrap = 1,
    Truncate = 2,
}

impl From<u8> for TextWrap {
    fn from(v: u8) -> Self {
        match v {
            1 => Self::NoWrap,
            2 => Self::Truncate,
            _ => Self::Wrap,
        }
    }
}

// =============================================================================
// Dimension
// =============================================================================

/// A size specification for width/height/min/max/basis.
///
/// The store carries dimensions as a single `f32`: `NaN` means auto, a
/// negative value is a percent magnitude, zero or positive is cells.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Dimension {
    Auto,
    Cells(f32),
    Percent(f32),
}

impl Dimension {
    /// Encode into the store's f32 representation.
    pub fn encode(&self) -> f32 {
        match self {
            Self::Auto => f32::NAN,
            Self::Cells(n) => n.max(0.0),
            Self::Percent(p) => -p.abs(),
        }
    }

    /// Decode from the store's f32 representation.
    pub fn decode(v: f32) -> Self {
        if v.is_nan() {
            Self::Auto
        } else if v < 0.0 {
            Self::Percent(-v)
        } else {
            Self::Cells(v)
        }
    }

    /// Resolve against a containing size; `None` for auto.
    pub fn resolve(&self, base: f32) -> Option<f32> {
        match self {
            Self::Auto => None,
            Self::Cells(n) => Some(*n),
            Self::Percent(p) => Some(base * p / 100.0),
        }
    }
}

impl Default for Dimension {
    fn default() -> Self {
        Self::Auto
    }
}

impl From<u16> for Dimension {
    fn from(v: u16) -> Self {
        Self::Cells(v as f32)
    }
}

impl From<f32> for Dimension {
    fn from(v: f32) -> Self {
        Self::Cells(v)
    }
}

// =============================================================================
// Tests
// =============================================================================
