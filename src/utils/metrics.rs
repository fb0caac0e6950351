//! Tick timing metrics and event recording for the scheduler.
//!
//! Two independent paths:
//! - **EventRecorder:** Lock-free queue (16K capacity) → background CSV export (nanosecond precision).
//! - **TickMetrics:** Shared mutex counters + wake-jitter statistics (bounded history of 1000 points).
//!
//! Only timing is traced here (wake, emit, resync, input); simulation state is never persisted.

use std::{
    collections::VecDeque,
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use average::{Estimate, Max, Variance};
use crossbeam_queue::ArrayQueue;
use log::error;
use parking_lot::Mutex;
use serde::Serialize;

/// Scheduler timing events, each stamped with the tick sequence number and recorder-relative
/// nanoseconds.
#[derive(Debug, Clone)]
pub enum Event {
    /// Scheduler woke for a tick; `lateness_us` past the due instant.
    TickWake { seq: u64, ts_ns: u64, lateness_us: u64 },
    /// Input event folded into the state at the start of a tick.
    InputApplied { seq: u64, ts_ns: u64, event: String },
    /// Snapshot handed to the sink.
    TickEmitted { seq: u64, ts_ns: u64, published: bool, exec_us: u64 },
    /// Overrun: schedule restarted from now.
    Resync { seq: u64, ts_ns: u64, behind_us: u64 },
}

impl Event {
    /// CSV row: seq,component,event,ts_ns,field1,field2
    pub fn to_csv_row(&self) -> String {
        match self {
            Event::TickWake { seq, ts_ns, lateness_us } => {
                format!("{},scheduler,TickWake,{},{},", seq, ts_ns, lateness_us)
            }
            Event::InputApplied { seq, ts_ns, event } => {
                format!("{},input,InputApplied,{},{},", seq, ts_ns, event)
            }
            Event::TickEmitted { seq, ts_ns, published, exec_us } => {
                format!("{},telemetry,TickEmitted,{},{},{}", seq, ts_ns, published, exec_us)
            }
            Event::Resync { seq, ts_ns, behind_us } => {
                format!("{},scheduler,Resync,{},{},", seq, ts_ns, behind_us)
            }
        }
    }
}

const EVENT_QUEUE_CAPACITY: usize = 16_384;

/// Non-blocking event recorder with background CSV export.
///
/// `record()` pushes onto a lock-free queue and returns immediately; a full queue drops the
/// event silently so the tick loop never waits on disk.
pub struct EventRecorder {
    queue: Arc<ArrayQueue<Event>>,
    run_start: Instant,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self {
            queue: Arc::new(ArrayQueue::new(EVENT_QUEUE_CAPACITY)),
            run_start: Instant::now(),
        }
    }

    #[inline]
    pub fn record(&self, event: Event) {
        let _ = self.queue.push(event);
    }

    /// Nanoseconds since recorder creation.
    #[inline]
    pub fn now_ns(&self) -> u64 {
        self.run_start.elapsed().as_nanos() as u64
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Spawns a thread draining the queue into `output_csv` until `running` clears, then
    /// writes whatever is left and flushes.
    pub fn start_exporter(&self, output_csv: PathBuf, running: Arc<AtomicBool>) -> thread::JoinHandle<()> {
        let queue = self.queue.clone();

        thread::spawn(move || {
            let file = match File::create(&output_csv) {
                Ok(f) => f,
                Err(e) => {
                    error!("Failed to create event CSV {:?}: {}", output_csv, e);
                    return;
                }
            };
            let mut writer = BufWriter::new(file);
            let _ = writeln!(writer, "seq,component,event,ts_ns,field1,field2");

            while running.load(Ordering::Acquire) {
                match queue.pop() {
                    Some(event) => {
                        let _ = writeln!(writer, "{}", event.to_csv_row());
                    }
                    None => thread::sleep(Duration::from_millis(10)),
                }
            }

            // final drain
            while let Some(event) = queue.pop() {
                let _ = writeln!(writer, "{}", event.to_csv_row());
            }
            let _ = writer.flush();
        })
    }
}

impl Default for EventRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EventRecorder {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            run_start: self.run_start,
        }
    }
}

pub const MAX_POINTS: usize = 1_000;

/// Live counters for one run, updated by the scheduler every tick.
pub struct TickMetrics {
    pub ticks: u64,
    /// Ticks that overran their period and forced a resync.
    pub overruns: u64,
    pub publish_failures: u64,
    pub inputs_applied: u64,
    pub inputs_dropped: u64,
    /// Wake lateness history (µs), last 1000 ticks.
    pub jitter_us: VecDeque<u64>,
    jitter: Variance,
    jitter_max: Max,
}

/// Copyable view of `TickMetrics` for export and display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MetricsSummary {
    pub ticks: u64,
    pub overruns: u64,
    pub publish_failures: u64,
    pub inputs_applied: u64,
    pub inputs_dropped: u64,
    pub jitter_mean_us: f64,
    pub jitter_std_us: f64,
    pub jitter_max_us: f64,
}

impl TickMetrics {
    pub fn new() -> Self {
        Self {
            ticks: 0,
            overruns: 0,
            publish_failures: 0,
            inputs_applied: 0,
            inputs_dropped: 0,
            jitter_us: VecDeque::with_capacity(MAX_POINTS),
            jitter: Variance::new(),
            jitter_max: Max::new(),
        }
    }

    pub fn record_jitter(&mut self, lateness_us: u64) {
        push_capped_u64(&mut self.jitter_us, lateness_us);
        self.jitter.add(lateness_us as f64);
        self.jitter_max.add(lateness_us as f64);
    }

    pub fn summary(&self) -> MetricsSummary {
        let samples = self.jitter.len();
        MetricsSummary {
            ticks: self.ticks,
            overruns: self.overruns,
            publish_failures: self.publish_failures,
            inputs_applied: self.inputs_applied,
            inputs_dropped: self.inputs_dropped,
            jitter_mean_us: if samples > 0 { self.jitter.mean() } else { 0.0 },
            jitter_std_us: if samples > 1 { self.jitter.sample_variance().sqrt() } else { 0.0 },
            jitter_max_us: if samples > 0 { self.jitter_max.max() } else { 0.0 },
        }
    }
}

impl Default for TickMetrics {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedMetrics = Arc<Mutex<TickMetrics>>;

pub fn shared_metrics() -> SharedMetrics {
    Arc::new(Mutex::new(TickMetrics::new()))
}

/// Appends value to buffer; removes oldest if at capacity (FIFO).
#[inline]
pub fn push_capped_u64(buf: &mut VecDeque<u64>, val: u64) {
    if buf.len() >= MAX_POINTS {
        buf.pop_front();
    }
    buf.push_back(val);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_of_empty_run_is_zero() {
        assert_eq!(TickMetrics::new().summary(), MetricsSummary::default());
    }

    #[test]
    fn jitter_statistics() {
        let mut m = TickMetrics::new();
        for v in [100, 200, 300] {
            m.record_jitter(v);
        }
        let s = m.summary();
        assert!((s.jitter_mean_us - 200.0).abs() < 1e-9);
        assert!((s.jitter_std_us - 100.0).abs() < 1e-9);
        assert_eq!(s.jitter_max_us, 300.0);
    }

    #[test]
    fn jitter_history_is_capped() {
        let mut m = TickMetrics::new();
        for v in 0..(MAX_POINTS as u64 + 10) {
            m.record_jitter(v);
        }
        assert_eq!(m.jitter_us.len(), MAX_POINTS);
        assert_eq!(m.jitter_us.front(), Some(&10));
    }

    #[test]
    fn csv_rows() {
        let row = Event::TickEmitted { seq: 7, ts_ns: 1_000, published: false, exec_us: 12 }.to_csv_row();
        assert_eq!(row, "7,telemetry,TickEmitted,1000,false,12");
        let row = Event::Resync { seq: 8, ts_ns: 2_000, behind_us: 350 }.to_csv_row();
        assert_eq!(row, "8,scheduler,Resync,2000,350,");
    }
}
