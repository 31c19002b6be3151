//! Application lifecycle: mount, run, unmount.
//!
//! `mount` allocates the store, spawns the engine thread and the stdin
//! reader, and runs the build function in a root scope on the calling
//! (authoring) thread. The two sides never call each other: the
//! authoring side writes the store and wakes; the engine renders.
//!
//! Unmount tears down in dependency order: authoring scope first (so
//! node releases land in the store), then the engine (which restores the
//! terminal on its way out).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::engine::{Engine, ModeCell};
use crate::error::Result;
use crate::primitives::{binder, sync_clocks};
use crate::reactive::{Scope, effect_scope, flush_sync};
use crate::store::{ConfigFlags, Store, StoreConfig};
use crate::terminal::{RenderMode, StdinReader, TerminalDriver};

pub struct MountOptions {
    pub mode: RenderMode,
    pub store: StoreConfig,
    pub mouse: bool,
}

impl Default for MountOptions {
    fn default() -> Self {
        Self {
            mode: RenderMode::Fullscreen,
            store: StoreConfig::default(),
            mouse: false,
        }
    }
}

pub struct MountHandle {
    store: Arc<Store>,
    scope: Scope,
    running: Arc<AtomicBool>,
    mode: Arc<ModeCell>,
    engine: Option<JoinHandle<()>>,
    _stdin: Option<StdinReader>,
}

/// Mount a tree against the process terminal.
pub fn mount(build: impl FnOnce() + 'static, options: MountOptions) -> Result<MountHandle> {
    let driver = TerminalDriver::stdout(options.mode);
    mount_with_driver(build, options, driver, true)
}

/// Mount against an explicit driver (tests, capture sinks). `read_stdin`
/// controls whether the stdin thread is spawned.
pub fn mount_with_driver(
    build: impl FnOnce() + 'static,
    options: MountOptions,
    driver: TerminalDriver,
    read_stdin: bool,
) -> Result<MountHandle> {
    let store = Arc::new(Store::allocate(options.store)?);
    let mut flags = ConfigFlags::default();
    if options.mouse {
        flags |= ConfigFlags::MOUSE_ENABLED;
    }
    store.set_config_flags(flags);

    let (cols, rows) = driver.size();
    store.set_terminal_size(cols, rows);

    let running = Arc::new(AtomicBool::new(true));
    let mode = Arc::new(ModeCell::new(options.mode));

    // Build first so the engine's initial frame sees the tree.
    let scope = effect_scope();
    let store_for_build = store.clone();
    scope.run(move || {
        binder::with_context(store_for_build, None, build);
    });
    flush_sync();

    let stdin = if read_stdin {
        Some(StdinReader::spawn(store.clone())?)
    } else {
        None
    };

    let engine_store = store.clone();
    let engine_running = running.clone();
    let engine_mode = mode.clone();
    let engine = std::thread::Builder::new()
        .name("ember-engine".to_string())
        .spawn(move || {
            let mut engine = Engine::new(engine_store, driver, engine_mode);
            if let Err(e) = engine.run(engine_running) {
                log::error!("engine stopped: {e}");
            }
        })?;

    Ok(MountHandle {
        store,
        scope,
        running,
        mode,
        engine: Some(engine),
        _stdin: stdin,
    })
}

impl MountHandle {
    /// The shared buffer, for direct inspection or advanced authoring.
    pub fn buffer_handle(&self) -> Arc<Store> {
        self.store.clone()
    }

    pub fn get_mode(&self) -> RenderMode {
        self.mode.get()
    }

    /// Switch fullscreen/inline; the next frame repaints from scratch.
    pub fn set_mode(&self, mode: RenderMode) {
        self.mode.set(mode);
        self.store.wake();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed) && !self.store.exit_requested()
    }

    /// Authoring-side idle loop: pump animation clocks and reactive
    /// effects until the engine exits (Ctrl+C, `request_exit`).
    pub fn run_until_exit(&self) {
        while self.is_running() {
            sync_clocks();
            flush_sync();
            std::thread::sleep(Duration::from_millis(16));
        }
    }

    /// Tear down: dispose the tree, stop the engine, restore the
    /// terminal.
    pub fn unmount(mut self) {
        self.scope.stop();
        flush_sync();
        self.running.store(false, Ordering::Relaxed);
        self.store.wake();
        if let Some(engine) = self.engine.take() {
            let _ = engine.join();
        }
    }
}

impl Drop for MountHandle {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        self.store.wake();
        if let Some(engine) = self.engine.take() {
            let _ = engine.join();
        }
    }
}
