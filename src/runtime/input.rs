//! input.rs
//! Reference-input path: front-ends push discrete events into a bounded channel, the tick loop
//! drains and applies them at the start of each tick (single writer of the rig state).
//!
//! - `InputHandle`: cloneable producer side, non-blocking (drops when the queue is full)
//! - `InputQueue`: consumer side, owned by the scheduler; dropping it stops accepting input
//! - `spawn_stdin_reader`: the single stdin consumer, shared by the menu and every run
//! - `spawn_console_input`: per-run forwarder turning console lines into events

use crossbeam::channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use log::{debug, info, warn};
use std::{
    io::{self, stdin, BufRead},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use crate::balancer::reference::{Direction, InputEvent};

const CONSOLE_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Queued,
    /// Queue full; event discarded.
    Dropped,
    /// Scheduler stopped; no longer accepting input.
    Closed,
}

#[derive(Clone)]
pub struct InputHandle {
    tx: Sender<InputEvent>,
    dropped: Arc<AtomicU64>,
}

pub struct InputQueue {
    rx: Receiver<InputEvent>,
    dropped: Arc<AtomicU64>,
}

/// Bounded event channel between input front-ends and the tick loop.
pub fn input_channel(capacity: usize) -> (InputHandle, InputQueue) {
    let (tx, rx) = bounded(capacity);
    let dropped = Arc::new(AtomicU64::new(0));
    (
        InputHandle {
            tx,
            dropped: dropped.clone(),
        },
        InputQueue { rx, dropped },
    )
}

impl InputHandle {
    pub fn send(&self, event: InputEvent) -> SendOutcome {
        match self.tx.try_send(event) {
            Ok(()) => SendOutcome::Queued,
            Err(TrySendError::Full(ev)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                debug!("[Input] queue full, dropped {}", ev);
                SendOutcome::Dropped
            }
            Err(TrySendError::Disconnected(_)) => SendOutcome::Closed,
        }
    }

    #[inline]
    pub fn press(&self, direction: Direction) -> SendOutcome {
        self.send(InputEvent::Press(direction))
    }

    #[inline]
    pub fn release(&self, direction: Direction) -> SendOutcome {
        self.send(InputEvent::Release(direction))
    }
}

impl InputQueue {
    /// Events queued since the last drain, in arrival order. Never blocks.
    pub fn drain(&self) -> impl Iterator<Item = InputEvent> + '_ {
        self.rx.try_iter()
    }

    /// Events discarded by producers because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Process-wide stdin reader. One thread owns stdin and forwards each line, so the start-up
/// menu and every run read from the same consumer and no line is lost between them.
pub struct ConsoleLines {
    rx: Receiver<String>,
    reader: thread::JoinHandle<()>,
}

/// Spawns the reader. It ends on EOF, on a read error, or once every `ConsoleLines` receiver
/// is gone (checked after the next line).
pub fn spawn_stdin_reader() -> io::Result<ConsoleLines> {
    let (tx, rx) = unbounded::<String>();
    let reader = thread::Builder::new().name("stdin_reader".into()).spawn(move || {
        for line in stdin().lock().lines() {
            match line {
                Ok(l) => {
                    if tx.send(l).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("[Input] stdin read failed: {}", e);
                    break;
                }
            }
        }
        debug!("[Input] stdin reader stopped.");
    })?;
    Ok(ConsoleLines { rx, reader })
}

impl ConsoleLines {
    /// Wraps an existing line source (tests, scripted sessions).
    pub fn from_receiver(rx: Receiver<String>) -> Self {
        Self {
            rx,
            reader: thread::spawn(|| {}),
        }
    }

    /// Next line, blocking. `None` once input is exhausted.
    pub fn read_line(&self) -> Option<String> {
        self.rx.recv().ok()
    }

    pub fn receiver(&self) -> Receiver<String> {
        self.rx.clone()
    }

    /// Drops the receiver and joins the reader if it already finished (EOF). A reader still
    /// blocked in `read_line` ends with the process.
    pub fn shutdown(self) {
        let ConsoleLines { rx, reader } = self;
        drop(rx);
        if reader.is_finished() {
            let _ = reader.join();
        }
    }
}

/// Applies one console command. Returns `false` when the forwarder should stop.
pub fn handle_console_line(line: &str, handle: &InputHandle, running: &AtomicBool) -> bool {
    let cmd = line.trim();
    if cmd.eq_ignore_ascii_case("q") || cmd.eq_ignore_ascii_case("quit") {
        info!("[Input] quit requested");
        running.store(false, Ordering::Release);
        return false;
    }

    match cmd.parse::<InputEvent>() {
        Ok(event) => handle.send(event) != SendOutcome::Closed,
        Err(e) => {
            debug!("[Input] ignored {:?}: {}", cmd, e);
            true
        }
    }
}

/// Per-run console front-end: turns lines (`up`, `-up`, `release left`, `space`, `q`) into
/// input events until `running` clears, the scheduler stops, or input ends. Polls so it can
/// always be joined within `CONSOLE_POLL`.
pub fn spawn_console_input(
    lines: Receiver<String>,
    handle: InputHandle,
    running: Arc<AtomicBool>,
) -> io::Result<thread::JoinHandle<()>> {
    thread::Builder::new().name("console_input".into()).spawn(move || {
        while running.load(Ordering::Acquire) {
            match lines.recv_timeout(CONSOLE_POLL) {
                Ok(line) => {
                    if !handle_console_line(&line, &handle, &running) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        debug!("[Input] console forwarder stopped.");
    })
}
