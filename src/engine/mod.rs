//! The engine loop: single owner of layout, compositing, diffing, and
//! the terminal.
//!
//! One iteration: wait for a wake, drain and dispatch input, skip out if
//! nothing is dirty, otherwise run layout (when LAYOUT or HIERARCHY
//! dirty), compose the framebuffer, diff it to the terminal, rebuild the
//! hit grid, and record per-phase timings in the store header.
//!
//! Dirty bits are cleared here, and only after the phase they gate has
//! completed. A frame whose diff is empty writes zero bytes.

pub mod text_edit;
pub mod wake;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::Instant;

use crate::error::{Error, Result};
use crate::framebuffer::FrameBuffer;
use crate::framebuffer::compose::{self, ComposeOutput};
use crate::input::{FocusManager, HitGrid};
use crate::input::scroll;
use crate::layout::{self, LayoutContext};
use crate::renderer::{DiffRenderer, InlineRenderer};
use crate::store::events::{
    EventKind, EventRecord, KEY_DOWN, KEY_LEFT, KEY_RIGHT, KEY_TAB, KEY_UP, Modifiers,
};
use crate::store::{ConfigFlags, DirtyMask, Store};
use crate::terminal::{self, RenderMode, TerminalDriver};
use crate::types::ComponentType;
use wake::{WakeConfig, wait_for_wake};

/// Shared mode cell so the authoring side can flip fullscreen/inline.
pub struct ModeCell(AtomicU8);

impl ModeCell {
    pub fn new(mode: RenderMode) -> Self {
        Self(AtomicU8::new(mode as u8))
    }

    pub fn get(&self) -> RenderMode {
        if self.0.load(Ordering::Acquire) == RenderMode::Inline as u8 {
            RenderMode::Inline
        } else {
            RenderMode::Fullscreen
        }
    }

    pub fn set(&self, mode: RenderMode) {
        self.0.store(mode as u8, Ordering::Release);
    }
}

pub struct Engine {
    store: Arc<Store>,
    driver: TerminalDriver,
    mode: Arc<ModeCell>,
    wake_config: WakeConfig,
    ctx: LayoutContext,
    fb: FrameBuffer,
    diff: DiffRenderer,
    inline: InlineRenderer,
    hits: HitGrid,
    focus: FocusManager,
    events: Vec<EventRecord>,
    last_mode: RenderMode,
}

impl Engine {
    pub fn new(store: Arc<Store>, driver: TerminalDriver, mode: Arc<ModeCell>) -> Self {
        let (cols, rows) = driver.size();
        store.set_terminal_size(cols, rows);
        let last_mode = mode.get();
        Self {
            store,
            driver,
            mode,
            wake_config: WakeConfig::default(),
            ctx: LayoutContext::new(),
            fb: FrameBuffer::new(cols, rows),
            diff: DiffRenderer::new(),
            inline: InlineRenderer::new(),
            hits: HitGrid::new(cols, rows),
            focus: FocusManager::new(),
            events: Vec::new(),
            last_mode,
        }
    }

    /// Run until `running` clears or an exit is requested. Owns terminal
    /// acquisition and release.
    pub fn run(&mut self, running: Arc<AtomicBool>) -> Result<()> {
        let mouse = self.store.config_flags().contains(ConfigFlags::MOUSE_ENABLED);
        self.driver.enter(mouse)?;

        let result = self.run_inner(&running);

        // Restore on every path; a leave failure must not mask the real
        // error.
        let left = self.driver.leave();
        result?;
        left?;
        Ok(())
    }

    fn run_inner(&mut self, running: &Arc<AtomicBool>) -> Result<()> {
        self.tick(true)?;

        while running.load(Ordering::Relaxed) {
            if !wait_for_wake(&self.store, &self.wake_config, running) {
                break;
            }
            if self.store.exit_requested() || terminal::exit_pending() {
                running.store(false, Ordering::Relaxed);
                break;
            }
            self.tick(false)?;

            // Pool compaction happens only here, between iterations,
            // where no producer batch is mid-flight by contract.
            if self.store.text_pool_needs_compaction() {
                self.store.compact_text_pool();
            }
        }
        Ok(())
    }

    /// One pipeline iteration. `force` paints even with no dirty bits
    /// (first frame, mode switch).
    pub fn tick(&mut self, force: bool) -> Result<()> {
        let frame_start = Instant::now();
        let mut force = force;

        // Mode switches tear the screen; repaint from scratch.
        let mode = self.mode.get();
        if mode != self.last_mode {
            self.last_mode = mode;
            self.diff.invalidate();
            force = true;
        }

        // Out-of-band resize signal.
        if terminal::take_resize_pending() {
            let (cols, rows) = self.driver.size();
            self.apply_resize(cols, rows);
            force = true;
        }

        // Drain and dispatch input.
        self.events.clear();
        self.store.drain_events(&mut self.events);
        let events = std::mem::take(&mut self.events);
        for event in &events {
            self.dispatch(event);
        }
        self.events = events;

        let dirty = self.store.any_dirty();
        if !force && dirty.is_empty() {
            return Ok(());
        }

        // Layout phase.
        let layout_start = Instant::now();
        let needs_layout =
            force || dirty.intersects(DirtyMask::LAYOUT | DirtyMask::HIERARCHY);
        if needs_layout {
            let constrain = mode == RenderMode::Fullscreen;
            match layout::compute_layout(&self.store, &mut self.ctx, constrain) {
                Ok(()) => {}
                Err(Error::InvalidTree { node }) => {
                    // Frame-fatal only: keep the previous framebuffer.
                    log::error!("layout aborted: invalid tree at node {node}");
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
            for i in 0..self.store.node_count() {
                self.store
                    .clear_dirty(i, DirtyMask::LAYOUT | DirtyMask::HIERARCHY);
            }
        }
        let layout_us = layout_start.elapsed().as_micros() as u32;

        // Compose phase.
        let compose_start = Instant::now();
        self.size_framebuffer(mode);
        let output = compose::compose(&self.store, &mut self.fb);
        for i in 0..self.store.node_count() {
            self.store
                .clear_dirty(i, DirtyMask::VISUAL | DirtyMask::TEXT);
        }
        let compose_us = compose_start.elapsed().as_micros() as u32;

        // Present phase.
        let render_start = Instant::now();
        self.present(mode, &output)?;
        let render_us = render_start.elapsed().as_micros() as u32;

        self.hits.rebuild(&output.hit_regions);

        self.store.write_timings(
            layout_us,
            compose_us,
            render_us,
            frame_start.elapsed().as_micros() as u32,
        );
        self.store.increment_render_count();
        Ok(())
    }

    fn present(&mut self, mode: RenderMode, output: &ComposeOutput) -> Result<()> {
        let mut sink = self.driver.sink();
        match mode {
            RenderMode::Fullscreen => {
                self.diff.render(&mut self.fb, output.caret, &mut sink)?;
            }
            RenderMode::Inline => {
                self.inline.render(&self.fb, &mut sink)?;
            }
        }
        Ok(())
    }

    /// Framebuffer extent: the whole terminal in fullscreen, just the
    /// tree's rows in inline mode.
    fn size_framebuffer(&mut self, mode: RenderMode) {
        let (cols, rows) = self.store.terminal_size();
        let rows = match mode {
            RenderMode::Fullscreen => rows,
            RenderMode::Inline => {
                let mut bottom = 1.0f32;
                for i in 0..self.store.node_count() {
                    if self.store.parent_index(i).is_none()
                        && self.store.component_type(i) != ComponentType::None as u8
                        && self.store.visible(i)
                    {
                        bottom =
                            bottom.max(self.store.computed_y(i) + self.store.computed_h(i));
                    }
                }
                (bottom as u16).clamp(1, rows)
            }
        };
        if self.fb.width() != cols || self.fb.height() != rows {
            self.fb.resize(cols, rows);
            self.diff.invalidate();
        }
    }

    /// Resize: new header size, root relayout, full repaint.
    pub fn apply_resize(&mut self, cols: u16, rows: u16) {
        self.store.set_terminal_size(cols, rows);
        for i in 0..self.store.node_count() {
            if self.store.parent_index(i).is_none()
                && self.store.component_type(i) != ComponentType::None as u8
            {
                self.store.mark_dirty(i, DirtyMask::LAYOUT);
            }
        }
        self.hits.resize(cols, rows);
        self.diff.invalidate();
    }

    // =========================================================================
    // Event dispatch
    // =========================================================================

    fn dispatch(&mut self, event: &EventRecord) {
        let flags = self.store.config_flags();
        match event.kind {
            EventKind::KeyPress => self.dispatch_key(event, flags),
            EventKind::Scroll => {
                if flags.contains(ConfigFlags::WHEEL_SCROLL) {
                    if let Some(node) = self.hits.node_at(event.x, event.y) {
                        scroll::scroll_by(&self.store, node, 0.0, event.delta_y as f32);
                    }
                }
            }
            EventKind::MouseDown => {
                if flags.contains(ConfigFlags::FOCUS_ON_CLICK) {
                    if let Some(node) = self.hits.node_at(event.x, event.y) {
                        if let Some(target) = self.focusable_ancestor(node) {
                            self.focus.focus(&self.store, target);
                            self.store.mark_dirty(target, DirtyMask::VISUAL);
                        }
                    }
                }
            }
            EventKind::Resize => {
                self.apply_resize(event.x, event.y);
            }
            EventKind::Paste => {
                if let Some(node) = self.focused_input() {
                    let text = self.store.pool_str(event.keycode, event.x).to_string();
                    if text_edit::insert_str(&self.store, node, &text) {
                        self.store
                            .mark_dirty(node, DirtyMask::TEXT | DirtyMask::LAYOUT);
                    }
                }
            }
            EventKind::Exit => {
                self.store.request_exit();
            }
            _ => {}
        }
    }

    fn dispatch_key(&mut self, event: &EventRecord, flags: ConfigFlags) {
        // Ctrl+C exits unless opted out.
        if flags.contains(ConfigFlags::EXIT_ON_CTRL_C)
            && event.keycode == 'c' as u32
            && event.modifiers.contains(Modifiers::CTRL)
        {
            self.store.request_exit();
            return;
        }

        // Tab traversal.
        if flags.contains(ConfigFlags::TAB_NAVIGATION) && event.keycode == KEY_TAB {
            let moved = if event.modifiers.contains(Modifiers::SHIFT) {
                self.focus.focus_previous(&self.store)
            } else {
                self.focus.focus_next(&self.store)
            };
            if let Some(node) = moved {
                scroll::scroll_into_view(&self.store, node);
                self.store.mark_dirty(node, DirtyMask::VISUAL);
            }
            return;
        }

        // Focused input consumes editing keys.
        if let Some(node) = self.focused_input() {
            if text_edit::apply_key(&self.store, node, event) {
                return;
            }
        }

        // Arrow keys scroll the focused container's chain.
        if flags.contains(ConfigFlags::ARROW_SCROLL) {
            let (dx, dy) = match event.keycode {
                KEY_UP => (0.0, -1.0),
                KEY_DOWN => (0.0, 1.0),
                KEY_LEFT => (-1.0, 0.0),
                KEY_RIGHT => (1.0, 0.0),
                _ => return,
            };
            let start = self
                .store
                .focused_index()
                .unwrap_or_else(|| self.deepest_scrollable());
            scroll::scroll_by(&self.store, start, dx, dy);
        }
    }

    fn focused_input(&self) -> Option<usize> {
        self.store.focused_index().filter(|&i| {
            self.store.component_type(i) == ComponentType::Input as u8
        })
    }

    fn focusable_ancestor(&self, node: usize) -> Option<usize> {
        let mut current = Some(node);
        while let Some(i) = current {
            if self.store.focusable(i) {
                return Some(i);
            }
            current = self.store.parent_index(i);
        }
        None
    }

    /// Fallback arrow-scroll target: the last scrollable container.
    fn deepest_scrollable(&self) -> usize {
        (0..self.store.node_count())
            .rev()
            .find(|&i| self.store.scrollable(i) != 0)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreConfig;
    use std::io::Write;
    use std::sync::Mutex;

    struct SharedSink(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn engine_with_capture() -> (Engine, Arc<Store>, Arc<Mutex<Vec<u8>>>) {
        let store = Arc::new(
            Store::allocate(StoreConfig {
                capacity: 64,
                text_pool_size: 4096,
                ring_size: 16,
            })
            .unwrap(),
        );
        store.set_terminal_size(40, 10);
        let sink = Arc::new(Mutex::new(Vec::new()));
        let driver = TerminalDriver::with_sink(
            RenderMode::Fullscreen,
            Box::new(SharedSink(sink.clone())),
            false,
        );
        let mode = Arc::new(ModeCell::new(RenderMode::Fullscreen));
        let mut engine = Engine::new(store.clone(), driver, mode);
        // The driver's probed size overwrote the test size; put it back.
        engine.apply_resize(40, 10);
        (engine, store, sink)
    }

    fn add_root(store: &Store) -> usize {
        let i = store.reserve_node().unwrap();
        store.set_component_type(i, ComponentType::Box as u8);
        i
    }

    #[test]
    fn first_tick_paints_then_clean_tick_writes_nothing() {
        let (mut engine, store, sink) = engine_with_capture();
        let root = add_root(&store);
        store.set_width(root, 10.0);
        store.set_height(root, 2.0);
        store.mark_dirty(root, DirtyMask::LAYOUT);

        engine.tick(true).unwrap();
        assert!(!sink.lock().unwrap().is_empty());
        assert_eq!(store.render_count(), 1);

        sink.lock().unwrap().clear();
        engine.tick(false).unwrap();
        assert!(
            sink.lock().unwrap().is_empty(),
            "no dirty bits must mean zero stdout writes"
        );
    }

    #[test]
    fn dirty_bits_cleared_after_phases() {
        let (mut engine, store, _) = engine_with_capture();
        let root = add_root(&store);
        store.mark_dirty(root, DirtyMask::LAYOUT | DirtyMask::VISUAL);
        engine.tick(false).unwrap();
        assert!(store.dirty(root).is_empty());
    }

    #[test]
    fn timings_recorded() {
        let (mut engine, store, _) = engine_with_capture();
        let root = add_root(&store);
        store.mark_dirty(root, DirtyMask::LAYOUT);
        engine.tick(true).unwrap();
        let t = store.snapshot_timing();
        assert_eq!(t.render_count, 1);
    }

    #[test]
    fn resize_event_reflows_and_repaints() {
        let (mut engine, store, sink) = engine_with_capture();
        let root = add_root(&store);
        engine.tick(true).unwrap();
        sink.lock().unwrap().clear();

        store.push_event(&EventRecord::resize(50, 12)).unwrap();
        engine.tick(false).unwrap();
        assert_eq!(store.terminal_size(), (50, 12));
        assert_eq!(store.computed_w(root), 50.0);
        let s = String::from_utf8_lossy(&sink.lock().unwrap()).to_string();
        assert!(s.contains("\x1b[2J"), "resize must force a full repaint");
    }

    #[test]
    fn ctrl_c_requests_exit() {
        let (mut engine, store, _) = engine_with_capture();
        add_root(&store);
        store
            .push_event(&EventRecord::key_press('c' as u32, Modifiers::CTRL))
            .unwrap();
        engine.tick(false).unwrap();
        assert!(store.exit_requested());
    }

    #[test]
    fn tab_moves_focus() {
        let (mut engine, store, _) = engine_with_capture();
        let root = add_root(&store);
        let a = store.reserve_node().unwrap();
        store.set_component_type(a, ComponentType::Box as u8);
        store.set_parent(a, Some(root)).unwrap();
        store.set_focusable(a, true);
        store
            .push_event(&EventRecord::key_press(KEY_TAB, Modifiers::NONE))
            .unwrap();
        engine.tick(false).unwrap();
        assert_eq!(store.focused_index(), Some(a));
    }

    #[test]
    fn keys_route_to_focused_input() {
        let (mut engine, store, _) = engine_with_capture();
        let root = add_root(&store);
        let input = store.reserve_node().unwrap();
        store.set_component_type(input, ComponentType::Input as u8);
        store.set_parent(input, Some(root)).unwrap();
        store.set_focusable(input, true);
        store.set_focused_index(Some(input));

        store
            .push_event(&EventRecord::key_press('h' as u32, Modifiers::NONE))
            .unwrap();
        store
            .push_event(&EventRecord::key_press('i' as u32, Modifiers::NONE))
            .unwrap();
        engine.tick(false).unwrap();
        assert_eq!(store.text(input), "hi");
    }

    #[test]
    fn wheel_scroll_hits_topmost_node() {
        let (mut engine, store, _) = engine_with_capture();
        let root = add_root(&store);
        store.set_overflow(root, crate::types::Overflow::Scroll as u8);
        let tall = store.reserve_node().unwrap();
        store.set_component_type(tall, ComponentType::Box as u8);
        store.set_parent(tall, Some(root)).unwrap();
        store.set_height(tall, 30.0);
        store.mark_dirty(root, DirtyMask::LAYOUT);
        engine.tick(true).unwrap();

        store.push_event(&EventRecord::scroll(5, 5, 0, 3)).unwrap();
        engine.tick(false).unwrap();
        assert_eq!(store.scroll_y(root), 3.0);
    }

    #[test]
    fn paste_lands_in_focused_input() {
        let (mut engine, store, _) = engine_with_capture();
        let root = add_root(&store);
        let input = store.reserve_node().unwrap();
        store.set_component_type(input, ComponentType::Input as u8);
        store.set_parent(input, Some(root)).unwrap();
        store.set_focused_index(Some(input));

        let (offset, len) = store.append_text("pasted").unwrap();
        store.push_event(&EventRecord::paste(offset, len)).unwrap();
        engine.tick(false).unwrap();
        assert_eq!(store.text(input), "pasted");
    }
}
