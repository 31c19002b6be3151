//! Shared node store: the single memory region both layers speak through.
//!
//! Array-of-Structures layout. Each node's fields are contiguous, grouped
//! by access phase so layout touches only the first four cache lines of a
//! record, style reads the next four, and text/output live in the tail:
//!
//! ```text
//! ┌──────────────┬──────────────────────┬───────────┬────────────┐
//! │ header 256 B │ nodes cap × 1024 B   │ text pool │ event ring │
//! └──────────────┴──────────────────────┴───────────┴────────────┘
//! ```
//!
//! The allocation is 64-byte aligned, so the first node record starts on
//! a cache-line boundary and the 1024-byte stride keeps every record
//! aligned after it. All fields are little-endian scalars.
//!
//! Cross-thread discipline: node fields are plain stores; the per-node
//! dirty byte is the commit mark (producers set it only after finishing
//! the node's field writes), and the wake flag carries the release /
//! acquire edge between producer and engine.

pub mod events;

use std::alloc::{self, Layout as AllocLayout};
use std::ptr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use bitflags::bitflags;

use crate::error::{Error, Result};
use events::{EVENT_RECORD_SIZE, EventRecord};

// =============================================================================
// Layout constants
// =============================================================================

/// Identifies the buffer format ("EMTU").
pub const MAGIC: u32 = 0x454D_5455;
/// Bumped on any layout change.
pub const FORMAT_VERSION: u32 = 1;

pub const HEADER_SIZE: usize = 256;
/// One node record: 16 cache lines.
pub const NODE_STRIDE: usize = 1024;

pub const DEFAULT_CAPACITY: usize = 4096;
pub const DEFAULT_TEXT_POOL: usize = 1024 * 1024;
pub const DEFAULT_RING_SIZE: usize = 256;

/// Text pool compaction threshold (fill ratio numerator / denominator).
pub const TEXT_POOL_COMPACT_NUM: usize = 3;
pub const TEXT_POOL_COMPACT_DEN: usize = 4;

// Header offsets. Wake and ring indices are 4-byte aligned for atomics.
const H_MAGIC: usize = 0;
const H_VERSION: usize = 4;
const H_NODE_COUNT: usize = 8;
const H_CAPACITY: usize = 12;
const H_TERMINAL_COLS: usize = 16;
const H_TERMINAL_ROWS: usize = 20;
const H_WAKE_FLAG: usize = 24;
const H_EVENT_HEAD: usize = 28;
const H_EVENT_TAIL: usize = 32;
const H_TEXT_WRITE_PTR: usize = 36;
const H_LAYOUT_US: usize = 40;
const H_FRAMEBUFFER_US: usize = 44;
const H_RENDER_US: usize = 48;
const H_TOTAL_FRAME_US: usize = 52;
const H_RENDER_COUNT: usize = 56;
const H_INPUT_SEQ: usize = 60;
const H_CONFIG_FLAGS: usize = 64;
const H_FOCUSED_INDEX: usize = 68;
const H_EXIT_REQUESTED: usize = 72;

// -----------------------------------------------------------------------------
// Node field offsets.
//
// Group 1, bytes 0..256: identity + layout inputs (what the solver reads).
// -----------------------------------------------------------------------------
const N_PARENT_INDEX: usize = 0; // i32, -1 = root
const N_COMPONENT_TYPE: usize = 4; // u8
const N_VISIBLE: usize = 5; // u8
const N_FOCUSABLE: usize = 6; // u8
const N_DIRTY: usize = 7; // u8 bitset
const N_WIDTH: usize = 8; // f32 (NaN auto, negative percent)
const N_HEIGHT: usize = 12;
const N_MIN_W: usize = 16;
const N_MIN_H: usize = 20;
const N_MAX_W: usize = 24;
const N_MAX_H: usize = 28;
const N_FLEX_BASIS: usize = 32;
const N_FLEX_GROW: usize = 36;
const N_FLEX_SHRINK: usize = 40;
const N_PADDING_T: usize = 44;
const N_PADDING_R: usize = 48;
const N_PADDING_B: usize = 52;
const N_PADDING_L: usize = 56;
const N_MARGIN_T: usize = 60;
const N_MARGIN_R: usize = 64;
const N_MARGIN_B: usize = 68;
const N_MARGIN_L: usize = 72;
const N_GAP: usize = 76;
const N_ROW_GAP: usize = 80;
const N_COLUMN_GAP: usize = 84;
const N_INSET_T: usize = 88;
const N_INSET_R: usize = 92;
const N_INSET_B: usize = 96;
const N_INSET_L: usize = 100;
const N_FLEX_DIRECTION: usize = 104; // u8 enums from here
const N_FLEX_WRAP: usize = 105;
const N_JUSTIFY_CONTENT: usize = 106;
const N_ALIGN_ITEMS: usize = 107;
const N_ALIGN_CONTENT: usize = 108;
const N_ALIGN_SELF: usize = 109;
const N_POSITION: usize = 110;
const N_OVERFLOW: usize = 111;
const N_DISPLAY: usize = 112;
const N_FOCUS_ORDER: usize = 116; // i32, -1 = not focusable
const N_HIT_Z: usize = 120; // u16
const N_SIBLING_ORDER: usize = 122; // u16, keyed-list reorder output

// -----------------------------------------------------------------------------
// Group 2, bytes 256..512: style/visual (what the compositor reads).
// -----------------------------------------------------------------------------
const N_BORDER_T_WIDTH: usize = 256; // u8 × 4
const N_BORDER_R_WIDTH: usize = 257;
const N_BORDER_B_WIDTH: usize = 258;
const N_BORDER_L_WIDTH: usize = 259;
const N_BORDER_STYLE: usize = 260; // u8
const N_ATTRS: usize = 261; // u8
const N_VARIANT: usize = 262; // u8 semantic palette slot
const N_CURSOR_STYLE: usize = 263; // u8: 0 block, 1 bar, 2 underline
const N_BORDER_COLOR: usize = 264; // u32 packed RGBA
const N_BG_COLOR: usize = 268;
const N_FG_COLOR: usize = 272;
const N_CARET: usize = 276; // i32, input caret position (chars)
const N_SELECTION_START: usize = 280; // i32
const N_SELECTION_END: usize = 284; // i32

// -----------------------------------------------------------------------------
// Group 3, bytes 512..1024: text reference + computed outputs (solver
// writes, compositor reads).
// -----------------------------------------------------------------------------
const N_TEXT_OFFSET: usize = 512; // u32 into text pool
const N_TEXT_LEN: usize = 516; // u16
const N_TEXT_ALIGN: usize = 518; // u8
const N_TEXT_WRAP: usize = 519; // u8
const N_COMPUTED_X: usize = 520; // f32, relative to parent content box
const N_COMPUTED_Y: usize = 524;
const N_COMPUTED_W: usize = 528;
const N_COMPUTED_H: usize = 532;
const N_CONTENT_W: usize = 536;
const N_CONTENT_H: usize = 540;
const N_SCROLL_X: usize = 544;
const N_SCROLL_Y: usize = 548;
const N_SCROLL_MAX_X: usize = 552;
const N_SCROLL_MAX_Y: usize = 556;
const N_SCROLLABLE: usize = 560; // u8

bitflags! {
    /// Per-node dirty bits. Producers set, the engine clears after the
    /// matching phase completes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DirtyMask: u8 {
        const LAYOUT    = 1 << 0;
        const VISUAL    = 1 << 1;
        const TEXT      = 1 << 2;
        const HIERARCHY = 1 << 3;
    }
}

bitflags! {
    /// Engine behavior toggles, written by the authoring side.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ConfigFlags: u32 {
        const EXIT_ON_CTRL_C = 1 << 0;
        const TAB_NAVIGATION = 1 << 1;
        const ARROW_SCROLL   = 1 << 2;
        const WHEEL_SCROLL   = 1 << 3;
        const FOCUS_ON_CLICK = 1 << 4;
        const MOUSE_ENABLED  = 1 << 5;
    }
}

impl Default for ConfigFlags {
    fn default() -> Self {
        Self::EXIT_ON_CTRL_C
            | Self::TAB_NAVIGATION
            | Self::ARROW_SCROLL
            | Self::WHEEL_SCROLL
            | Self::FOCUS_ON_CLICK
    }
}

/// A bundle of style writes applied in one call. Unset fields keep the
/// node's current values. `f32` dimension fields use the store encoding
/// (NaN auto, negative percent).
#[derive(Debug, Clone, Copy, Default)]
pub struct StylePatch {
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub flex_direction: Option<u8>,
    pub justify_content: Option<u8>,
    pub align_items: Option<u8>,
    pub flex_grow: Option<f32>,
    pub flex_shrink: Option<f32>,
    pub overflow: Option<u8>,
    pub fg_color: Option<u32>,
    pub bg_color: Option<u32>,
    pub border_style: Option<u8>,
    pub border_color: Option<u32>,
    pub visible: Option<bool>,
}

/// Snapshot of the header's timing counters, all in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameTiming {
    pub layout_us: u32,
    pub framebuffer_us: u32,
    pub render_us: u32,
    pub total_frame_us: u32,
    pub render_count: u32,
}

/// Store sizing, fixed at allocation.
#[derive(Debug, Clone, Copy)]
pub struct StoreConfig {
    pub capacity: usize,
    pub text_pool_size: usize,
    /// Must be a power of two; usable capacity is one less.
    pub ring_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            text_pool_size: DEFAULT_TEXT_POOL,
            ring_size: DEFAULT_RING_SIZE,
        }
    }
}

// =============================================================================
// Store
// =============================================================================

/// The shared node store.
///
/// Owns one contiguous allocation. Handed between threads behind an
/// `Arc`; the wake flag and ring indices are the only fields accessed
/// with atomic orderings.
pub struct Store {
    ptr: *mut u8,
    len: usize,
    capacity: usize,
    text_pool_size: usize,
    ring_size: usize,
    text_pool_offset: usize,
    ring_offset: usize,
    free_list: Mutex<Vec<u32>>,
}

// SAFETY: cross-thread access follows the dirty-bit commit protocol and
// the wake flag's release/acquire pairing; see the module docs.
unsafe impl Send for Store {}
unsafe impl Sync for Store {}

impl Drop for Store {
    fn drop(&mut self) {
        unsafe {
            alloc::dealloc(self.ptr, AllocLayout::from_size_align_unchecked(self.len, 64));
        }
    }
}

impl Store {
    /// Allocate a store with the given sizing.
    pub fn allocate(config: StoreConfig) -> Result<Self> {
        if config.capacity == 0 || config.capacity > u32::MAX as usize / NODE_STRIDE {
            return Err(Error::Capacity { what: "node capacity" });
        }
        if !config.ring_size.is_power_of_two() {
            return Err(Error::Capacity { what: "event ring size (must be a power of two)" });
        }
        if config.text_pool_size > u32::MAX as usize {
            return Err(Error::Capacity { what: "text pool size" });
        }

        let nodes_bytes = config.capacity * NODE_STRIDE;
        let ring_bytes = config.ring_size * EVENT_RECORD_SIZE;
        let text_pool_offset = HEADER_SIZE + nodes_bytes;
        let ring_offset = text_pool_offset + config.text_pool_size;
        let len = ring_offset + ring_bytes;

        let layout = AllocLayout::from_size_align(len, 64)
            .map_err(|_| Error::Capacity { what: "store allocation" })?;
        let ptr = unsafe { alloc::alloc_zeroed(layout) };
        if ptr.is_null() {
            return Err(Error::Capacity { what: "store allocation" });
        }

        let store = Self {
            ptr,
            len,
            capacity: config.capacity,
            text_pool_size: config.text_pool_size,
            ring_size: config.ring_size,
            text_pool_offset,
            ring_offset,
            free_list: Mutex::new(Vec::new()),
        };
        store.write_header_u32(H_MAGIC, MAGIC);
        store.write_header_u32(H_VERSION, FORMAT_VERSION);
        store.write_header_u32(H_CAPACITY, config.capacity as u32);
        store.write_header_u32(H_CONFIG_FLAGS, ConfigFlags::default().bits());
        store.write_header_i32(H_FOCUSED_INDEX, -1);
        Ok(store)
    }

    pub fn with_defaults() -> Result<Self> {
        Self::allocate(StoreConfig::default())
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn buffer_len(&self) -> usize {
        self.len
    }

    // =========================================================================
    // Raw access helpers
    // =========================================================================

    #[inline]
    fn read_u32(&self, offset: usize) -> u32 {
        debug_assert!(offset + 4 <= self.len);
        unsafe { ptr::read_unaligned(self.ptr.add(offset) as *const u32) }
    }

    #[inline]
    fn write_u32(&self, offset: usize, value: u32) {
        debug_assert!(offset + 4 <= self.len);
        unsafe { ptr::write_unaligned(self.ptr.add(offset) as *mut u32, value) }
    }

    #[inline]
    fn read_i32(&self, offset: usize) -> i32 {
        self.read_u32(offset) as i32
    }

    #[inline]
    fn write_i32(&self, offset: usize, value: i32) {
        self.write_u32(offset, value as u32)
    }

    #[inline]
    fn read_f32(&self, offset: usize) -> f32 {
        f32::from_bits(self.read_u32(offset))
    }

    #[inline]
    fn write_f32(&self, offset: usize, value: f32) {
        self.write_u32(offset, value.to_bits())
    }

    #[inline]
    fn read_u16(&self, offset: usize) -> u16 {
        debug_assert!(offset + 2 <= self.len);
        unsafe { ptr::read_unaligned(self.ptr.add(offset) as *const u16) }
    }

    #[inline]
    fn write_u16(&self, offset: usize, value: u16) {
        debug_assert!(offset + 2 <= self.len);
        unsafe { ptr::write_unaligned(self.ptr.add(offset) as *mut u16, value) }
    }

    #[inline]
    fn read_u8(&self, offset: usize) -> u8 {
        debug_assert!(offset < self.len);
        unsafe { *self.ptr.add(offset) }
    }

    #[inline]
    fn write_u8(&self, offset: usize, value: u8) {
        debug_assert!(offset < self.len);
        unsafe { *self.ptr.add(offset) = value }
    }

    #[inline]
    fn node_offset(&self, i: usize) -> usize {
        debug_assert!(i < self.capacity);
        HEADER_SIZE + i * NODE_STRIDE
    }

    #[inline]
    fn atomic_at(&self, offset: usize) -> &AtomicU32 {
        debug_assert!(offset % 4 == 0);
        unsafe { &*(self.ptr.add(offset) as *const AtomicU32) }
    }

    // =========================================================================
    // Header
    // =========================================================================

    #[inline]
    fn read_header_u32(&self, offset: usize) -> u32 {
        self.read_u32(offset)
    }

    #[inline]
    fn write_header_u32(&self, offset: usize, value: u32) {
        self.write_u32(offset, value)
    }

    #[inline]
    fn write_header_i32(&self, offset: usize, value: i32) {
        self.write_i32(offset, value)
    }

    #[inline]
    pub fn magic(&self) -> u32 {
        self.read_header_u32(H_MAGIC)
    }

    #[inline]
    pub fn version(&self) -> u32 {
        self.read_header_u32(H_VERSION)
    }

    /// Live prefix length: one past the highest slot ever reserved.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.read_header_u32(H_NODE_COUNT) as usize
    }

    #[inline]
    pub fn terminal_size(&self) -> (u16, u16) {
        (
            self.read_header_u32(H_TERMINAL_COLS) as u16,
            self.read_header_u32(H_TERMINAL_ROWS) as u16,
        )
    }

    #[inline]
    pub fn set_terminal_size(&self, cols: u16, rows: u16) {
        self.write_header_u32(H_TERMINAL_COLS, cols as u32);
        self.write_header_u32(H_TERMINAL_ROWS, rows as u32);
    }

    #[inline]
    pub fn config_flags(&self) -> ConfigFlags {
        ConfigFlags::from_bits_truncate(self.read_header_u32(H_CONFIG_FLAGS))
    }

    #[inline]
    pub fn set_config_flags(&self, flags: ConfigFlags) {
        self.write_header_u32(H_CONFIG_FLAGS, flags.bits());
    }

    #[inline]
    pub fn focused_index(&self) -> Option<usize> {
        let idx = self.read_i32(H_FOCUSED_INDEX);
        if idx < 0 { None } else { Some(idx as usize) }
    }

    #[inline]
    pub fn set_focused_index(&self, idx: Option<usize>) {
        self.write_header_i32(H_FOCUSED_INDEX, idx.map_or(-1, |i| i as i32));
    }

    #[inline]
    pub fn exit_requested(&self) -> bool {
        self.read_header_u32(H_EXIT_REQUESTED) != 0
    }

    #[inline]
    pub fn request_exit(&self) {
        self.write_header_u32(H_EXIT_REQUESTED, 1);
        self.wake();
    }

    #[inline]
    pub fn render_count(&self) -> u32 {
        self.read_header_u32(H_RENDER_COUNT)
    }

    #[inline]
    pub fn increment_render_count(&self) {
        let n = self.read_header_u32(H_RENDER_COUNT);
        self.write_header_u32(H_RENDER_COUNT, n.wrapping_add(1));
    }

    #[inline]
    pub fn input_seq(&self) -> u32 {
        self.read_header_u32(H_INPUT_SEQ)
    }

    #[inline]
    pub fn bump_input_seq(&self) {
        let n = self.read_header_u32(H_INPUT_SEQ);
        self.write_header_u32(H_INPUT_SEQ, n.wrapping_add(1));
    }

    /// Record per-phase frame timings (engine only).
    pub fn write_timings(&self, layout_us: u32, framebuffer_us: u32, render_us: u32, total_us: u32) {
        self.write_header_u32(H_LAYOUT_US, layout_us);
        self.write_header_u32(H_FRAMEBUFFER_US, framebuffer_us);
        self.write_header_u32(H_RENDER_US, render_us);
        self.write_header_u32(H_TOTAL_FRAME_US, total_us);
    }

    pub fn snapshot_timing(&self) -> FrameTiming {
        FrameTiming {
            layout_us: self.read_header_u32(H_LAYOUT_US),
            framebuffer_us: self.read_header_u32(H_FRAMEBUFFER_US),
            render_us: self.read_header_u32(H_RENDER_US),
            total_frame_us: self.read_header_u32(H_TOTAL_FRAME_US),
            render_count: self.read_header_u32(H_RENDER_COUNT),
        }
    }

    // =========================================================================
    // Wake flag
    // =========================================================================

    /// Rouse the engine. Release ordering pairs with the engine's acquire
    /// swap so every preceding store write is visible when the wake is.
    #[inline]
    pub fn wake(&self) {
        self.atomic_at(H_WAKE_FLAG).store(1, Ordering::Release);
    }

    /// Engine side: observe and clear the wake flag in one swap.
    #[inline]
    pub fn consume_wake(&self) -> bool {
        self.atomic_at(H_WAKE_FLAG).swap(0, Ordering::AcqRel) != 0
    }

    #[inline]
    pub fn wake_pending(&self) -> bool {
        self.atomic_at(H_WAKE_FLAG).load(Ordering::Acquire) != 0
    }

    // =========================================================================
    // Node allocation
    // =========================================================================

    /// Reserve a node slot: reuse from the free list, else extend the
    /// live prefix. The slot comes back zeroed to defaults.
    pub fn reserve_node(&self) -> Result<usize> {
        if let Some(idx) = self.free_list.lock().unwrap().pop() {
            let idx = idx as usize;
            self.reset_node(idx);
            return Ok(idx);
        }
        let count = self.node_count();
        if count >= self.capacity {
            return Err(Error::Capacity { what: "node slots" });
        }
        self.write_header_u32(H_NODE_COUNT, (count + 1) as u32);
        self.reset_node(count);
        Ok(count)
    }

    /// Reserve a slot that can legally parent to `parent`: free-list
    /// entries at or below the parent index are skipped so the
    /// parent-before-child order holds.
    pub fn reserve_child_node(&self, parent: usize) -> Result<usize> {
        {
            let mut free = self.free_list.lock().unwrap();
            if let Some(pos) = free.iter().position(|&i| i as usize > parent) {
                let idx = free.swap_remove(pos) as usize;
                drop(free);
                self.reset_node(idx);
                return Ok(idx);
            }
        }
        let count = self.node_count();
        if count >= self.capacity {
            return Err(Error::Capacity { what: "node slots" });
        }
        self.write_header_u32(H_NODE_COUNT, (count + 1) as u32);
        self.reset_node(count);
        Ok(count)
    }

    /// Release a slot back to the free list. Parent link is dissolved and
    /// the slot ignored by every phase until reused.
    pub fn release_node(&self, i: usize) {
        if i >= self.node_count() {
            return;
        }
        self.reset_node(i);
        self.free_list.lock().unwrap().push(i as u32);
    }

    /// Reset a record to defaults: NONE type, no parent, auto dims.
    fn reset_node(&self, i: usize) {
        let base = self.node_offset(i);
        unsafe {
            ptr::write_bytes(self.ptr.add(base), 0, NODE_STRIDE);
        }
        self.write_i32(base + N_PARENT_INDEX, -1);
        self.write_u8(base + N_VISIBLE, 1);
        for field in [N_WIDTH, N_HEIGHT, N_MIN_W, N_MIN_H, N_MAX_W, N_MAX_H, N_FLEX_BASIS] {
            self.write_f32(base + field, f32::NAN);
        }
        self.write_f32(base + N_FLEX_SHRINK, 1.0);
        for field in [N_INSET_T, N_INSET_R, N_INSET_B, N_INSET_L] {
            self.write_f32(base + field, f32::NAN);
        }
        self.write_i32(base + N_FOCUS_ORDER, -1);
    }

    /// Set a parent link. `parent` must precede `child` so the tree stays
    /// in topological index order.
    pub fn set_parent(&self, child: usize, parent: Option<usize>) -> Result<()> {
        match parent {
            Some(p) if p >= child => Err(Error::InvalidTree { node: child }),
            Some(p) => {
                self.write_i32(self.node_offset(child) + N_PARENT_INDEX, p as i32);
                Ok(())
            }
            None => {
                self.write_i32(self.node_offset(child) + N_PARENT_INDEX, -1);
                Ok(())
            }
        }
    }

    #[inline]
    pub fn parent_index(&self, i: usize) -> Option<usize> {
        let p = self.read_i32(self.node_offset(i) + N_PARENT_INDEX);
        if p < 0 { None } else { Some(p as usize) }
    }

    /// Test hook: write a parent link without the topological check, the
    /// way a corrupted producer would.
    #[cfg(test)]
    pub(crate) fn set_parent_unchecked(&self, child: usize, parent: i32) {
        self.write_i32(self.node_offset(child) + N_PARENT_INDEX, parent);
    }

    // =========================================================================
    // Dirty flags
    // =========================================================================

    #[inline]
    pub fn dirty(&self, i: usize) -> DirtyMask {
        DirtyMask::from_bits_truncate(self.read_u8(self.node_offset(i) + N_DIRTY))
    }

    /// Set dirty bits. This is the commit mark: call only after every
    /// field write for the node in the current batch is done.
    #[inline]
    pub fn mark_dirty(&self, i: usize, mask: DirtyMask) {
        let off = self.node_offset(i) + N_DIRTY;
        self.write_u8(off, self.read_u8(off) | mask.bits());
    }

    /// Clear dirty bits after the matching phase ran (engine only).
    #[inline]
    pub fn clear_dirty(&self, i: usize, mask: DirtyMask) {
        let off = self.node_offset(i) + N_DIRTY;
        self.write_u8(off, self.read_u8(off) & !mask.bits());
    }

    /// Union of dirty bits over the live prefix.
    pub fn any_dirty(&self) -> DirtyMask {
        let mut acc = DirtyMask::empty();
        for i in 0..self.node_count() {
            acc |= self.dirty(i);
        }
        acc
    }

    // =========================================================================
    // Typed node accessors, group 1: identity + layout inputs
    // =========================================================================

    #[inline]
    pub fn component_type(&self, i: usize) -> u8 {
        self.read_u8(self.node_offset(i) + N_COMPONENT_TYPE)
    }

    #[inline]
    pub fn set_component_type(&self, i: usize, ty: u8) {
        self.write_u8(self.node_offset(i) + N_COMPONENT_TYPE, ty);
    }

    #[inline]
    pub fn visible(&self, i: usize) -> bool {
        self.read_u8(self.node_offset(i) + N_VISIBLE) != 0
    }

    #[inline]
    pub fn set_visible(&self, i: usize, v: bool) {
        self.write_u8(self.node_offset(i) + N_VISIBLE, v as u8);
    }

    #[inline]
    pub fn focusable(&self, i: usize) -> bool {
        self.read_u8(self.node_offset(i) + N_FOCUSABLE) != 0
    }

    #[inline]
    pub fn set_focusable(&self, i: usize, v: bool) {
        self.write_u8(self.node_offset(i) + N_FOCUSABLE, v as u8);
    }

    #[inline]
    pub fn focus_order(&self, i: usize) -> i32 {
        self.read_i32(self.node_offset(i) + N_FOCUS_ORDER)
    }

    #[inline]
    pub fn set_focus_order(&self, i: usize, order: i32) {
        self.write_i32(self.node_offset(i) + N_FOCUS_ORDER, order);
    }

    #[inline]
    pub fn hit_z(&self, i: usize) -> u16 {
        self.read_u16(self.node_offset(i) + N_HIT_Z)
    }

    #[inline]
    pub fn set_hit_z(&self, i: usize, z: u16) {
        self.write_u16(self.node_offset(i) + N_HIT_Z, z);
    }

    #[inline]
    pub fn sibling_order(&self, i: usize) -> u16 {
        self.read_u16(self.node_offset(i) + N_SIBLING_ORDER)
    }

    #[inline]
    pub fn set_sibling_order(&self, i: usize, order: u16) {
        self.write_u16(self.node_offset(i) + N_SIBLING_ORDER, order);
    }
}

// Generate f32 and u8 field accessors; the macro keeps this file honest
// about which byte each name maps to.
macro_rules! f32_fields {
    ($(($get:ident, $set:ident, $off:ident);)*) => {
        impl Store {
            $(
                #[inline]
                pub fn $get(&self, i: usize) -> f32 {
                    self.read_f32(self.node_offset(i) + $off)
                }

                #[inline]
                pub fn $set(&self, i: usize, v: f32) {
                    self.write_f32(self.node_offset(i) + $off, v);
                }
            )*
        }
    };
}

macro_rules! u8_fields {
    ($(($get:ident, $set:ident, $off:ident);)*) => {
        impl Store {
            $(
                #[inline]
                pub fn $get(&self, i: usize) -> u8 {
                    self.read_u8(self.node_offset(i) + $off)
                }

                #[inline]
                pub fn $set(&self, i: usize, v: u8) {
                    self.write_u8(self.node_offset(i) + $off, v);
                }
            )*
        }
    };
}

macro_rules! u32_fields {
    ($(($get:ident, $set:ident, $off:ident);)*) => {
        impl Store {
            $(
                #[inline]
                pub fn $get(&self, i: usize) -> u32 {
                    self.read_u32(self.node_offset(i) + $off)
                }

                #[inline]
                pub fn $set(&self, i: usize, v: u32) {
                    self.write_u32(self.node_offset(i) + $off, v);
                }
            )*
        }
    };
}

f32_fields! {
    (width, set_width, N_WIDTH);
    (height, set_height, N_HEIGHT);
    (min_w, set_min_w, N_MIN_W);
    (min_h, set_min_h, N_MIN_H);
    (max_w, set_max_w, N_MAX_W);
    (max_h, set_max_h, N_MAX_H);
    (flex_basis, set_flex_basis, N_FLEX_BASIS);
    (flex_grow, set_flex_grow, N_FLEX_GROW);
    (flex_shrink, set_flex_shrink, N_FLEX_SHRINK);
    (padding_t, set_padding_t, N_PADDING_T);
    (padding_r, set_padding_r, N_PADDING_R);
    (padding_b, set_padding_b, N_PADDING_B);
    (padding_l, set_padding_l, N_PADDING_L);
    (margin_t, set_margin_t, N_MARGIN_T);
    (margin_r, set_margin_r, N_MARGIN_R);
    (margin_b, set_margin_b, N_MARGIN_B);
    (margin_l, set_margin_l, N_MARGIN_L);
    (gap, set_gap, N_GAP);
    (row_gap, set_row_gap, N_ROW_GAP);
    (column_gap, set_column_gap, N_COLUMN_GAP);
    (inset_t, set_inset_t, N_INSET_T);
    (inset_r, set_inset_r, N_INSET_R);
    (inset_b, set_inset_b, N_INSET_B);
    (inset_l, set_inset_l, N_INSET_L);
    (computed_x, set_computed_x, N_COMPUTED_X);
    (computed_y, set_computed_y, N_COMPUTED_Y);
    (computed_w, set_computed_w, N_COMPUTED_W);
    (computed_h, set_computed_h, N_COMPUTED_H);
    (content_w, set_content_w, N_CONTENT_W);
    (content_h, set_content_h, N_CONTENT_H);
    (scroll_x, set_scroll_x, N_SCROLL_X);
    (scroll_y, set_scroll_y, N_SCROLL_Y);
    (scroll_max_x, set_scroll_max_x, N_SCROLL_MAX_X);
    (scroll_max_y, set_scroll_max_y, N_SCROLL_MAX_Y);
}

u8_fields! {
    (flex_direction, set_flex_direction, N_FLEX_DIRECTION);
    (flex_wrap, set_flex_wrap, N_FLEX_WRAP);
    (justify_content, set_justify_content, N_JUSTIFY_CONTENT);
    (align_items, set_align_items, N_ALIGN_ITEMS);
    (align_content, set_align_content, N_ALIGN_CONTENT);
    (align_self, set_align_self, N_ALIGN_SELF);
    (position, set_position, N_POSITION);
    (overflow, set_overflow, N_OVERFLOW);
    (display, set_display, N_DISPLAY);
    (border_t_width, set_border_t_width, N_BORDER_T_WIDTH);
    (border_r_width, set_border_r_width, N_BORDER_R_WIDTH);
    (border_b_width, set_border_b_width, N_BORDER_B_WIDTH);
    (border_l_width, set_border_l_width, N_BORDER_L_WIDTH);
    (border_style, set_border_style, N_BORDER_STYLE);
    (attrs, set_attrs, N_ATTRS);
    (variant, set_variant, N_VARIANT);
    (cursor_style, set_cursor_style, N_CURSOR_STYLE);
    (text_align, set_text_align, N_TEXT_ALIGN);
    (text_wrap, set_text_wrap, N_TEXT_WRAP);
    (scrollable, set_scrollable, N_SCROLLABLE);
}

u32_fields! {
    (border_color, set_border_color, N_BORDER_COLOR);
    (bg_color, set_bg_color, N_BG_COLOR);
    (fg_color, set_fg_color, N_FG_COLOR);
}

impl Store {
    #[inline]
    pub fn caret(&self, i: usize) -> i32 {
        self.read_i32(self.node_offset(i) + N_CARET)
    }

    #[inline]
    pub fn set_caret(&self, i: usize, pos: i32) {
        self.write_i32(self.node_offset(i) + N_CARET, pos);
    }

    #[inline]
    pub fn selection(&self, i: usize) -> (i32, i32) {
        let base = self.node_offset(i);
        (
            self.read_i32(base + N_SELECTION_START),
            self.read_i32(base + N_SELECTION_END),
        )
    }

    #[inline]
    pub fn set_selection(&self, i: usize, start: i32, end: i32) {
        let base = self.node_offset(i);
        self.write_i32(base + N_SELECTION_START, start);
        self.write_i32(base + N_SELECTION_END, end);
    }

    /// Apply a style patch: plain O(1) field stores, no dirty marking.
    /// The caller sets dirty bits after its batch of writes completes.
    pub fn write_style(&self, i: usize, patch: &StylePatch) {
        if let Some(v) = patch.width {
            self.set_width(i, v);
        }
        if let Some(v) = patch.height {
            self.set_height(i, v);
        }
        if let Some(v) = patch.flex_direction {
            self.set_flex_direction(i, v);
        }
        if let Some(v) = patch.justify_content {
            self.set_justify_content(i, v);
        }
        if let Some(v) = patch.align_items {
            self.set_align_items(i, v);
        }
        if let Some(v) = patch.flex_grow {
            self.set_flex_grow(i, v);
        }
        if let Some(v) = patch.flex_shrink {
            self.set_flex_shrink(i, v);
        }
        if let Some(v) = patch.overflow {
            self.set_overflow(i, v);
        }
        if let Some(v) = patch.fg_color {
            self.set_fg_color(i, v);
        }
        if let Some(v) = patch.bg_color {
            self.set_bg_color(i, v);
        }
        if let Some(v) = patch.border_style {
            self.set_border_style(i, v);
        }
        if let Some(v) = patch.border_color {
            self.set_border_color(i, v);
        }
        if let Some(v) = patch.visible {
            self.set_visible(i, v);
        }
    }

    // =========================================================================
    // Text pool
    // =========================================================================

    #[inline]
    pub fn text_pool_used(&self) -> usize {
        self.read_header_u32(H_TEXT_WRITE_PTR) as usize
    }

    #[inline]
    pub fn text_pool_capacity(&self) -> usize {
        self.text_pool_size
    }

    /// True when the pool fill crossed the compaction threshold.
    pub fn text_pool_needs_compaction(&self) -> bool {
        self.text_pool_used() * TEXT_POOL_COMPACT_DEN >= self.text_pool_size * TEXT_POOL_COMPACT_NUM
    }

    /// Append bytes to the pool, returning their `(offset, len)` span.
    ///
    /// Fails with `Capacity` when the pool cannot hold them; nothing is
    /// written in that case.
    pub fn append_text(&self, text: &str) -> Result<(u32, u16)> {
        let bytes = text.as_bytes();
        if bytes.len() > u16::MAX as usize {
            return Err(Error::Capacity { what: "text span (one write)" });
        }
        let write_ptr = self.text_pool_used();
        let end = write_ptr + bytes.len();
        if end > self.text_pool_size {
            return Err(Error::Capacity { what: "text pool" });
        }
        unsafe {
            ptr::copy_nonoverlapping(
                bytes.as_ptr(),
                self.ptr.add(self.text_pool_offset + write_ptr),
                bytes.len(),
            );
        }
        self.write_header_u32(H_TEXT_WRITE_PTR, end as u32);
        Ok((write_ptr as u32, bytes.len() as u16))
    }

    /// Borrow a raw pool span (paste payloads ride the pool too).
    pub fn pool_str(&self, offset: u32, len: u16) -> &str {
        let offset = offset as usize;
        let len = len as usize;
        if len == 0 || offset + len > self.text_pool_size {
            return "";
        }
        unsafe {
            let slice =
                std::slice::from_raw_parts(self.ptr.add(self.text_pool_offset + offset), len);
            std::str::from_utf8(slice).unwrap_or("")
        }
    }

    /// Append `text` to the pool and point node `i` at it.
    ///
    /// The old span leaks until the next compaction. Fails with
    /// `Capacity` when the pool cannot hold the bytes; the node keeps its
    /// previous span in that case.
    pub fn write_text(&self, i: usize, text: &str) -> Result<()> {
        let base = self.node_offset(i);
        if text.is_empty() {
            self.write_u32(base + N_TEXT_OFFSET, 0);
            self.write_u16(base + N_TEXT_LEN, 0);
            return Ok(());
        }
        let (offset, len) = self.append_text(text)?;
        self.write_u32(base + N_TEXT_OFFSET, offset);
        self.write_u16(base + N_TEXT_LEN, len);
        Ok(())
    }

    /// Borrow node `i`'s text. Empty on an unset or out-of-range span.
    pub fn text(&self, i: usize) -> &str {
        let base = self.node_offset(i);
        let offset = self.read_u32(base + N_TEXT_OFFSET) as usize;
        let len = self.read_u16(base + N_TEXT_LEN) as usize;
        if len == 0 || offset + len > self.text_pool_size {
            return "";
        }
        unsafe {
            let slice =
                std::slice::from_raw_parts(self.ptr.add(self.text_pool_offset + offset), len);
            std::str::from_utf8(slice).unwrap_or("")
        }
    }

    /// Rewrite every live span contiguously at the front of the pool.
    ///
    /// Engine-safe window only: every node still referencing pre-reset
    /// offsets is rewritten in this same pass.
    pub fn compact_text_pool(&self) {
        let mut cursor = 0usize;
        for i in 0..self.node_count() {
            let base = self.node_offset(i);
            let len = self.read_u16(base + N_TEXT_LEN) as usize;
            if len == 0 || self.component_type(i) == 0 {
                continue;
            }
            let offset = self.read_u32(base + N_TEXT_OFFSET) as usize;
            if offset + len > self.text_pool_size {
                continue;
            }
            if offset != cursor {
                unsafe {
                    ptr::copy(
                        self.ptr.add(self.text_pool_offset + offset),
                        self.ptr.add(self.text_pool_offset + cursor),
                        len,
                    );
                }
                self.write_u32(base + N_TEXT_OFFSET, cursor as u32);
            }
            cursor += len;
        }
        self.write_header_u32(H_TEXT_WRITE_PTR, cursor as u32);
    }

    // =========================================================================
    // Event ring
    // =========================================================================

    /// Usable event slots (one is sacrificed to tell full from empty).
    #[inline]
    pub fn event_capacity(&self) -> usize {
        self.ring_size - 1
    }

    #[inline]
    pub fn events_pending(&self) -> bool {
        self.atomic_at(H_EVENT_HEAD).load(Ordering::Acquire)
            != self.atomic_at(H_EVENT_TAIL).load(Ordering::Acquire)
    }

    /// Enqueue one event (single producer). Release ordering on the tail
    /// publishes the slot contents to the consumer.
    pub fn push_event(&self, event: &EventRecord) -> Result<()> {
        let head = self.atomic_at(H_EVENT_HEAD).load(Ordering::Acquire);
        let tail = self.atomic_at(H_EVENT_TAIL).load(Ordering::Acquire);
        let mask = (self.ring_size - 1) as u32;
        if (tail.wrapping_add(1)) & mask == head & mask {
            return Err(Error::Capacity { what: "event ring" });
        }
        let slot = (tail & mask) as usize;
        let offset = self.ring_offset + slot * EVENT_RECORD_SIZE;
        let slot_bytes =
            unsafe { std::slice::from_raw_parts_mut(self.ptr.add(offset), EVENT_RECORD_SIZE) };
        event.write_to(slot_bytes);
        self.atomic_at(H_EVENT_TAIL)
            .store(tail.wrapping_add(1), Ordering::Release);
        self.bump_input_seq();
        Ok(())
    }

    /// Drain the ring into `out` (single consumer).
    pub fn drain_events(&self, out: &mut Vec<EventRecord>) {
        let mask = (self.ring_size - 1) as u32;
        let tail = self.atomic_at(H_EVENT_TAIL).load(Ordering::Acquire);
        let mut head = self.atomic_at(H_EVENT_HEAD).load(Ordering::Acquire);
        while head != tail {
            let slot = (head & mask) as usize;
            let offset = self.ring_offset + slot * EVENT_RECORD_SIZE;
            let slot_bytes =
                unsafe { std::slice::from_raw_parts(self.ptr.add(offset), EVENT_RECORD_SIZE) };
            out.push(EventRecord::read_from(slot_bytes));
            head = head.wrapping_add(1);
        }
        self.atomic_at(H_EVENT_HEAD).store(head, Ordering::Release);
    }
}

// =============================================================================
// Tests
// =============================================================================
