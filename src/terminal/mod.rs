//! Terminal lifecycle and the stdin reader.
//!
//! [`TerminalDriver`] owns the terminal's modes: raw input, the alternate
//! screen, mouse reporting, bracketed paste, cursor visibility, line
//! wrap. `enter` and `leave` are paired; restore is guaranteed on every
//! exit path: explicit `leave`, drop, panic (via a process hook), and
//! SIGINT/SIGTERM (via a flag the engine loop checks plus a best-effort
//! restore in the handler path).
//!
//! Raw-mode toggling goes through crossterm; everything else is written
//! as escape sequences to the driver's sink so tests can capture bytes
//! without a TTY.

use std::io::{self, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Instant;

use crate::input::parser::{Decoded, Parser, to_record};
use crate::renderer::ansi;
use crate::store::Store;
use crate::store::events::EventRecord;

/// How the tree is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    /// Alt screen, full terminal ownership.
    #[default]
    Fullscreen,
    /// Rendered at the prompt, scrollback preserved.
    Inline,
}

// Process-wide flags set by signal handlers, drained by the engine loop.
static RESIZE_PENDING: AtomicBool = AtomicBool::new(false);
static EXIT_PENDING: AtomicBool = AtomicBool::new(false);
/// True while some driver holds the terminal; gates emergency restore.
static TERMINAL_ACTIVE: AtomicBool = AtomicBool::new(false);

pub fn take_resize_pending() -> bool {
    RESIZE_PENDING.swap(false, Ordering::AcqRel)
}

pub fn exit_pending() -> bool {
    EXIT_PENDING.load(Ordering::Acquire)
}

#[cfg(unix)]
extern "C" fn on_sigwinch(_: libc::c_int) {
    RESIZE_PENDING.store(true, Ordering::Release);
}

#[cfg(unix)]
extern "C" fn on_sigint(_: libc::c_int) {
    EXIT_PENDING.store(true, Ordering::Release);
}

#[cfg(unix)]
fn install_signal_handlers() {
    unsafe {
        libc::signal(libc::SIGWINCH, on_sigwinch as libc::sighandler_t);
        libc::signal(libc::SIGINT, on_sigint as libc::sighandler_t);
        libc::signal(libc::SIGTERM, on_sigint as libc::sighandler_t);
    }
}

#[cfg(not(unix))]
fn install_signal_handlers() {}

/// Best-effort terminal restore that needs no driver state. Runs from
/// the panic hook when a driver was active.
fn emergency_restore() {
    if !TERMINAL_ACTIVE.swap(false, Ordering::AcqRel) {
        return;
    }
    let mut out = io::stdout();
    let _ = ansi::reset(&mut out);
    let _ = ansi::disable_mouse(&mut out);
    let _ = ansi::disable_bracketed_paste(&mut out);
    let _ = ansi::enable_line_wrap(&mut out);
    let _ = ansi::cursor_show(&mut out);
    let _ = ansi::exit_alt_screen(&mut out);
    let _ = out.flush();
    let _ = crossterm::terminal::disable_raw_mode();
}

fn install_panic_restore() {
    use std::sync::Once;
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            emergency_restore();
            previous(info);
        }));
    });
}

// =============================================================================
// Driver
// =============================================================================

pub struct TerminalDriver {
    sink: Box<dyn Write + Send>,
    mode: RenderMode,
    raw: bool,
    alt_screen: bool,
    mouse: bool,
    paste: bool,
    entered: bool,
    /// False when stdin/stdout is not a TTY (tests, pipes); mode toggles
    /// are skipped but escape output still flows to the sink.
    is_tty: bool,
}

impl TerminalDriver {
    /// Driver over the process stdout.
    pub fn stdout(mode: RenderMode) -> Self {
        let is_tty = crossterm::tty::IsTty::is_tty(&io::stdout());
        Self::with_sink(mode, Box::new(io::stdout()), is_tty)
    }

    /// Driver over an arbitrary sink (tests, capture).
    pub fn with_sink(mode: RenderMode, sink: Box<dyn Write + Send>, is_tty: bool) -> Self {
        Self {
            sink,
            mode,
            raw: false,
            alt_screen: false,
            mouse: false,
            paste: false,
            entered: false,
            is_tty,
        }
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    /// Current terminal size in cells; a default when not a TTY.
    pub fn size(&self) -> (u16, u16) {
        crossterm::terminal::size().unwrap_or((80, 24))
    }

    /// Acquire the terminal: raw mode, screen mode, input protocols.
    pub fn enter(&mut self, mouse: bool) -> io::Result<()> {
        if self.entered {
            return Ok(());
        }
        install_signal_handlers();
        install_panic_restore();

        if self.is_tty {
            crossterm::terminal::enable_raw_mode()?;
            self.raw = true;
        }

        if self.mode == RenderMode::Fullscreen {
            ansi::enter_alt_screen(&mut self.sink)?;
            self.alt_screen = true;
            ansi::clear_screen(&mut self.sink)?;
            ansi::disable_line_wrap(&mut self.sink)?;
            if mouse {
                ansi::enable_mouse(&mut self.sink)?;
                self.mouse = true;
            }
        }
        ansi::cursor_hide(&mut self.sink)?;
        ansi::enable_bracketed_paste(&mut self.sink)?;
        self.paste = true;

        self.sink.flush()?;
        self.entered = true;
        TERMINAL_ACTIVE.store(true, Ordering::Release);
        Ok(())
    }

    /// Release the terminal, undoing everything `enter` did, in reverse.
    pub fn leave(&mut self) -> io::Result<()> {
        if !self.entered {
            return Ok(());
        }
        self.entered = false;
        TERMINAL_ACTIVE.store(false, Ordering::Release);

        if self.paste {
            ansi::disable_bracketed_paste(&mut self.sink)?;
            self.paste = false;
        }
        if self.mouse {
            ansi::disable_mouse(&mut self.sink)?;
            self.mouse = false;
        }
        ansi::reset(&mut self.sink)?;
        ansi::cursor_show(&mut self.sink)?;
        if self.alt_screen {
            ansi::enable_line_wrap(&mut self.sink)?;
            ansi::exit_alt_screen(&mut self.sink)?;
            self.alt_screen = false;
        }
        self.sink.flush()?;

        if self.raw {
            crossterm::terminal::disable_raw_mode()?;
            self.raw = false;
        }
        Ok(())
    }

    /// Write one frame's bytes in a single call.
    pub fn write_frame(&mut self, bytes: &[u8]) -> io::Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        self.sink.write_all(bytes)?;
        self.sink.flush()
    }

    pub fn sink(&mut self) -> &mut (dyn Write + Send) {
        &mut *self.sink
    }
}

impl Drop for TerminalDriver {
    fn drop(&mut self) {
        if self.entered {
            let _ = self.leave();
        }
    }
}

// =============================================================================
// Stdin reader
// =============================================================================

/// Dedicated stdin thread: decodes bytes into event records, pushes them
/// into the store's ring, and wakes the engine.
pub struct StdinReader {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl StdinReader {
    pub fn spawn(store: Arc<Store>) -> io::Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let running_for_thread = running.clone();

        let handle = std::thread::Builder::new()
            .name("ember-stdin".to_string())
            .spawn(move || {
                let mut parser = Parser::new();
                let mut stdin = io::stdin();
                let mut buf = [0u8; 1024];
                let start = Instant::now();

                while running_for_thread.load(Ordering::Relaxed) {
                    let n = match stdin.read(&mut buf) {
                        Ok(0) => break,
                        Ok(n) => n,
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                        Err(e) => {
                            log::warn!("stdin read failed: {e}");
                            break;
                        }
                    };

                    let ts = start.elapsed().as_millis() as u32;
                    let events = parser.feed(&buf[..n]);
                    deliver(&store, events, ts);
                }
            })?;

        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

impl Drop for StdinReader {
    fn drop(&mut self) {
        self.stop();
        // The thread may be parked in read(); it exits on the next byte
        // or EOF, so it is detached rather than joined.
        drop(self.handle.take());
    }
}

/// Push decoded input into the ring and wake the engine once per batch.
pub fn deliver(store: &Store, events: Vec<Decoded>, timestamp_ms: u32) {
    if events.is_empty() {
        return;
    }
    for event in &events {
        let record = match event {
            Decoded::Paste(text) => match store.append_text(text) {
                Ok((offset, len)) => Some(EventRecord::paste(offset, len)),
                Err(e) => {
                    log::warn!("paste dropped: {e}");
                    None
                }
            },
            other => to_record(other, timestamp_ms),
        };
        if let Some(record) = record {
            if let Err(e) = store.push_event(&record) {
                log::warn!("input event dropped: {e}");
            }
        }
    }
    store.wake();
}
