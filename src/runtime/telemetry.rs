//! telemetry.rs
//! Per-tick status record and the sinks that carry it out of the tick loop.
//!
//! Delivery is best-effort: every sink reports failures as `TelemetryError`, the scheduler logs
//! them and keeps ticking. No sink retries.

use std::{
    io::Write,
    sync::Arc,
};

use crossbeam::channel::{Sender, TrySendError};
use log::debug;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::balancer::state::{SimulationState, Tilt, Vec2};

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("telemetry write failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("telemetry queue full, snapshot dropped")]
    Backpressure,
    #[error("telemetry subscriber disconnected")]
    Disconnected,
}

/// Wire record, one per tick. Angles/reference to 2 dp, metres to 4 dp, time unrounded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub platform_pose: Tilt,
    pub joystick_val: Vec2,
    pub real_pose: Vec2,
    pub error: Vec2,
    pub time: f64,
}

impl TelemetrySnapshot {
    /// Builds the record from post-tick state and the error the controller acted on.
    pub fn from_state(state: &SimulationState, error: Vec2) -> Self {
        Self {
            platform_pose: Tilt::new(
                round_to(state.platform_tilt.roll, 2),
                round_to(state.platform_tilt.pitch, 2),
            ),
            joystick_val: Vec2::new(round_to(state.reference.x, 2), round_to(state.reference.y, 2)),
            real_pose: Vec2::new(
                round_to(state.ball.position.x, 4),
                round_to(state.ball.position.y, 4),
            ),
            error: Vec2::new(round_to(error.x, 4), round_to(error.y, 4)),
            time: state.sim_time,
        }
    }

    pub fn to_json(&self) -> Result<String, TelemetryError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[inline]
pub fn round_to(value: f64, places: i32) -> f64 {
    // ties go to even, 0.125 → 0.12
    let factor = 10f64.powi(places);
    (value * factor).round_ties_even() / factor
}

pub trait TelemetrySink {
    fn publish(&mut self, snapshot: &TelemetrySnapshot) -> Result<(), TelemetryError>;

    /// Flush and release the transport. Called once when the scheduler stops.
    fn close(&mut self) -> Result<(), TelemetryError> {
        Ok(())
    }
}

impl<T: TelemetrySink + ?Sized> TelemetrySink for Box<T> {
    fn publish(&mut self, snapshot: &TelemetrySnapshot) -> Result<(), TelemetryError> {
        (**self).publish(snapshot)
    }

    fn close(&mut self) -> Result<(), TelemetryError> {
        (**self).close()
    }
}

/// Non-blocking hand-off to a consumer thread (dashboard collector).
/// Drops on saturation rather than stalling the tick.
#[derive(Clone)]
pub struct ChannelSink {
    tx: Sender<TelemetrySnapshot>,
}

impl ChannelSink {
    /// `tx` should be bounded; its capacity is the backpressure limit.
    pub fn new(tx: Sender<TelemetrySnapshot>) -> Self {
        Self { tx }
    }
}

impl TelemetrySink for ChannelSink {
    fn publish(&mut self, snapshot: &TelemetrySnapshot) -> Result<(), TelemetryError> {
        self.tx.try_send(*snapshot).map_err(|e| {
            debug!("[Telemetry] try_send failed: {:?}", e);
            match e {
                TrySendError::Full(_) => TelemetryError::Backpressure,
                TrySendError::Disconnected(_) => TelemetryError::Disconnected,
            }
        })
    }
}

/// One JSON object per line (stdout echo, pipes into other tools).
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> TelemetrySink for JsonLinesSink<W> {
    fn publish(&mut self, snapshot: &TelemetrySnapshot) -> Result<(), TelemetryError> {
        serde_json::to_writer(&mut self.writer, snapshot)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), TelemetryError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Publishes to every inner sink; one failing transport does not starve the others.
/// Reports the first error seen.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn TelemetrySink + Send>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn with(mut self, sink: impl TelemetrySink + Send + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl TelemetrySink for FanoutSink {
    fn publish(&mut self, snapshot: &TelemetrySnapshot) -> Result<(), TelemetryError> {
        let mut first_err = None;
        for sink in &mut self.sinks {
            if let Err(e) = sink.publish(snapshot) {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    fn close(&mut self) -> Result<(), TelemetryError> {
        let mut first_err = None;
        for sink in &mut self.sinks {
            if let Err(e) = sink.close() {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

/// Keeps every snapshot in memory. Clones share the buffer.
#[derive(Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<TelemetrySnapshot>>>,
    closed: Arc<Mutex<bool>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<TelemetrySnapshot> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock()
    }
}

impl TelemetrySink for MemorySink {
    fn publish(&mut self, snapshot: &TelemetrySnapshot) -> Result<(), TelemetryError> {
        self.records.lock().push(*snapshot);
        Ok(())
    }

    fn close(&mut self) -> Result<(), TelemetryError> {
        *self.closed.lock() = true;
        Ok(())
    }
}
