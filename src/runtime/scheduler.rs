//! scheduler.rs
//! Fixed-rate tick loop: Idle → Running → Stopped.
//!
//! - Real-time pacing: one release per period against a monotonic clock, drift-corrected
//!   (an overrun restarts the schedule from now instead of bursting catch-up ticks)
//! - Per tick: drain input → advance sim clock → target → tilt → ball → snapshot → sink
//! - Telemetry failures are logged and counted; they never stop the loop
//! - Cancellation (`running` cleared) is honoured at tick boundaries, within one period

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use log::{debug, info, warn};

use crate::balancer::Simulation;
use crate::runtime::{
    clock::{next_due_after_tick, Clock, Pacing, SpinClock},
    input::InputQueue,
    telemetry::{TelemetrySink, TelemetrySnapshot},
};
use crate::utils::{
    config::SimConfig,
    metrics::{Event, EventRecorder, SharedMetrics},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    Idle,
    Running,
    Stopped,
}

pub struct Scheduler<S: TelemetrySink, C: Clock = SpinClock> {
    simulation: Simulation,
    sink: S,
    clock: C,
    input: Option<InputQueue>,
    running: Arc<AtomicBool>,
    period: Duration,
    sim_dt: f64,
    phase: SchedulerPhase,
    start_time: Option<Instant>,
    next_due: Option<Instant>,
    seq: u64,
    tick_limit: Option<u64>,
    metrics: SharedMetrics,
    event_recorder: Option<Arc<EventRecorder>>,
}

impl<S: TelemetrySink, C: Clock> Scheduler<S, C> {
    pub fn new(
        config: &SimConfig,
        sink: S,
        clock: C,
        input: InputQueue,
        running: Arc<AtomicBool>,
        metrics: SharedMetrics,
    ) -> Self {
        Self {
            simulation: Simulation::new(config.balancer),
            sink,
            clock,
            input: Some(input),
            running,
            period: config.period(),
            sim_dt: config.sim_dt(),
            phase: SchedulerPhase::Idle,
            start_time: None,
            next_due: None,
            seq: 0,
            tick_limit: None,
            metrics,
            event_recorder: None,
        }
    }

    /// Replaces the freshly-initialised rig (scripted scenarios, replays).
    pub fn with_simulation(mut self, simulation: Simulation) -> Self {
        self.simulation = simulation;
        self
    }

    pub fn with_event_recorder(mut self, recorder: Arc<EventRecorder>) -> Self {
        self.event_recorder = Some(recorder);
        self
    }

    /// Stop on its own after `ticks` ticks.
    pub fn with_tick_limit(mut self, ticks: u64) -> Self {
        self.tick_limit = Some(ticks);
        self
    }

    #[inline]
    pub fn phase(&self) -> SchedulerPhase {
        self.phase
    }

    #[inline]
    pub fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    #[inline]
    pub fn ticks(&self) -> u64 {
        self.seq
    }

    #[inline]
    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn start_time(&self) -> Option<Instant> {
        self.start_time
    }

    /// Release instant of the next tick. `None` before `start`.
    pub fn next_due(&self) -> Option<Instant> {
        self.next_due
    }

    /// Shared cancellation flag; clearing it stops the loop at the next boundary.
    pub fn running(&self) -> &Arc<AtomicBool> {
        &self.running
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Idle → Running. The first tick is due immediately.
    pub fn start(&mut self) {
        if self.phase != SchedulerPhase::Idle {
            return;
        }
        let now = self.clock.now();
        self.start_time = Some(now);
        self.next_due = Some(now);
        self.phase = SchedulerPhase::Running;
        info!(
            "[Scheduler] running: period={:?} sim_dt={}s",
            self.period, self.sim_dt
        );
    }

    fn cancelled(&self) -> bool {
        !self.running.load(Ordering::Acquire)
    }

    /// Running, not cancelled and under the tick limit. Does not wait.
    pub fn ready(&self) -> bool {
        self.phase == SchedulerPhase::Running
            && !self.cancelled()
            && !self.tick_limit.is_some_and(|limit| self.seq >= limit)
    }

    /// Blocks until the next tick is due. Returns `false` if cancellation was observed
    /// before or during the wait, or the tick limit is reached. Never waits longer than one
    /// period past the last release, so a stop request is seen within one period.
    pub fn wait_for_tick(&mut self) -> bool {
        if !self.ready() {
            return false;
        }
        if let Some(due) = self.next_due {
            self.clock.sleep_until(due);
        }
        !self.cancelled()
    }

    /// One steady-state tick. Returns the snapshot that was handed to the sink.
    pub fn tick(&mut self) -> TelemetrySnapshot {
        let wake = self.clock.now();
        let due = match self.next_due {
            Some(d) => d,
            None => {
                // tick() without start(): treat as starting now
                self.start();
                wake
            }
        };
        self.seq += 1;
        let seq = self.seq;

        let lateness_us = wake.saturating_duration_since(due).as_micros() as u64;
        self.record(|ts_ns| Event::TickWake { seq, ts_ns, lateness_us });

        // ====================================================================
        // Input: fold queued events before any stage reads the reference
        // ====================================================================
        let mut applied = 0u64;
        let mut dropped = 0u64;
        if let Some(queue) = &self.input {
            for event in queue.drain() {
                self.simulation.apply_input(event);
                applied += 1;
                if let Some(r) = &self.event_recorder {
                    r.record(Event::InputApplied {
                        seq,
                        ts_ns: r.now_ns(),
                        event: event.to_string(),
                    });
                }
            }
            dropped = queue.dropped();
        }

        // ====================================================================
        // Control + physics: clock → target → tilt → ball
        // ====================================================================
        let error = self.simulation.step(self.sim_dt);

        // snapshot strictly after the integrator
        let snapshot = TelemetrySnapshot::from_state(self.simulation.state(), error);
        let published = match self.sink.publish(&snapshot) {
            Ok(()) => true,
            Err(e) => {
                warn!("[Scheduler] telemetry publish failed (tick {}): {}", seq, e);
                false
            }
        };

        // ====================================================================
        // Pacing: schedule next release, resync on overrun
        // ====================================================================
        let now = self.clock.now();
        let exec_us = now.saturating_duration_since(wake).as_micros() as u64;
        self.record(|ts_ns| Event::TickEmitted { seq, ts_ns, published, exec_us });

        let (next_due, pacing) = next_due_after_tick(now, due, self.period);
        self.next_due = Some(next_due);

        {
            let mut m = self.metrics.lock();
            m.ticks += 1;
            m.inputs_applied += applied;
            m.inputs_dropped = dropped;
            if !published {
                m.publish_failures += 1;
            }
            m.record_jitter(lateness_us);
            if let Pacing::Resynced { .. } = pacing {
                m.overruns += 1;
            }
        }

        if let Pacing::Resynced { behind } = pacing {
            info!("[Scheduler] overrun at tick {}: {:?} behind, resynchronised", seq, behind);
            let behind_us = behind.as_micros() as u64;
            self.record(|ts_ns| Event::Resync { seq, ts_ns, behind_us });
        }

        snapshot
    }

    /// Running → Stopped: stop accepting input and close the sink. Idempotent.
    pub fn stop(&mut self) {
        if self.phase == SchedulerPhase::Stopped {
            return;
        }
        self.phase = SchedulerPhase::Stopped;

        // dropping the receiver disconnects every InputHandle
        self.input = None;

        if let Err(e) = self.sink.close() {
            warn!("[Scheduler] telemetry close failed: {}", e);
        }

        let summary = self.metrics.lock().summary();
        info!(
            "[Scheduler] stopped after {} ticks (sim_time={:.3}s, overruns={}, publish_failures={})",
            self.seq,
            self.simulation.state().sim_time,
            summary.overruns,
            summary.publish_failures
        );
    }

    /// Runs the whole lifecycle on the calling thread and hands back the sink.
    pub fn run(mut self) -> S {
        self.start();
        while self.wait_for_tick() {
            self.tick();
        }
        debug!("[Scheduler] loop exited");
        self.into_sink()
    }

    /// Stops (if still running) and hands back the sink.
    pub fn into_sink(mut self) -> S {
        self.stop();
        self.sink
    }

    #[inline]
    fn record(&self, make: impl FnOnce(u64) -> Event) {
        if let Some(r) = &self.event_recorder {
            r.record(make(r.now_ns()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balancer::{Direction, Vec2};
    use crate::runtime::{
        clock::ManualClock,
        input::input_channel,
        telemetry::{MemorySink, TelemetryError},
    };
    use crate::utils::metrics::shared_metrics;

    fn scheduler_with<S: TelemetrySink>(
        sink: S,
        clock: ManualClock,
    ) -> (Scheduler<S, ManualClock>, crate::runtime::input::InputHandle, Arc<AtomicBool>, SharedMetrics) {
        let (handle, queue) = input_channel(16);
        let running = Arc::new(AtomicBool::new(true));
        let metrics = shared_metrics();
        let s = Scheduler::new(
            &SimConfig::default(),
            sink,
            clock,
            queue,
            running.clone(),
            metrics.clone(),
        );
        (s, handle, running, metrics)
    }

    #[test]
    fn lifecycle_idle_running_stopped() {
        let sink = MemorySink::new();
        let (mut s, _h, _r, _m) = scheduler_with(sink.clone(), ManualClock::new());
        assert_eq!(s.phase(), SchedulerPhase::Idle);
        assert!(!s.wait_for_tick(), "idle scheduler never ticks");

        s.start();
        assert_eq!(s.phase(), SchedulerPhase::Running);
        assert_eq!(s.next_due(), s.start_time());

        s.stop();
        assert_eq!(s.phase(), SchedulerPhase::Stopped);
        assert!(sink.is_closed());
    }

    #[test]
    fn ticks_on_fixed_cadence() {
        let clock = ManualClock::new();
        let sink = MemorySink::new();
        let (s, _h, _r, metrics) = scheduler_with(sink.clone(), clock.clone());
        let t0 = clock.now();

        s.with_tick_limit(10).run();

        let records = sink.records();
        assert_eq!(records.len(), 10);
        // first tick fires at start, the 10th one 9 periods later
        assert_eq!(clock.now(), t0 + Duration::from_millis(450));
        assert!((records[9].time - 0.05).abs() < 1e-12);
        assert!(records.windows(2).all(|w| w[1].time > w[0].time));
        assert_eq!(metrics.lock().overruns, 0);
    }

    #[test]
    fn first_snapshot_is_level_and_at_rest() {
        let sink = MemorySink::new();
        let (s, _h, _r, _m) = scheduler_with(sink.clone(), ManualClock::new());
        s.with_tick_limit(1).run();

        let first = sink.records()[0];
        assert_eq!(first.platform_pose.roll, 0.0);
        assert_eq!(first.platform_pose.pitch, 0.0);
        assert_eq!(first.real_pose, Vec2::ZERO);
        assert_eq!(first.error, Vec2::ZERO);
    }

    #[test]
    fn queued_input_is_applied_before_the_tick() {
        let sink = MemorySink::new();
        let (mut s, handle, _r, metrics) = scheduler_with(sink.clone(), ManualClock::new());
        s.start();

        handle.press(Direction::Right);
        handle.press(Direction::Right);
        handle.press(Direction::Down);
        let snap = s.tick();

        assert_eq!(snap.joystick_val, Vec2::new(0.2, -0.1));
        assert!(s.simulation().state().target.x > 0.0);
        assert_eq!(metrics.lock().inputs_applied, 3);
    }

    #[test]
    fn stop_rejects_further_input() {
        let (mut s, handle, _r, _m) = scheduler_with(MemorySink::new(), ManualClock::new());
        s.start();
        s.stop();
        assert_eq!(
            handle.press(Direction::Up),
            crate::runtime::input::SendOutcome::Closed
        );
    }

    #[test]
    fn absurd_frequency_builds_without_panicking() {
        let cfg = SimConfig {
            frequency_hz: 1e-30,
            ..SimConfig::default()
        };
        assert!(cfg.validate().is_err());

        let (_handle, queue) = input_channel(1);
        let mut s = Scheduler::new(
            &cfg,
            MemorySink::new(),
            ManualClock::new(),
            queue,
            Arc::new(AtomicBool::new(true)),
            shared_metrics(),
        );
        assert_eq!(s.period(), crate::utils::config::MAX_PERIOD);
        s.start();
        s.tick();
        assert!(s.next_due().is_some());
    }

    #[test]
    fn cancellation_is_seen_at_the_next_boundary() {
        let (mut s, _h, running, _m) = scheduler_with(MemorySink::new(), ManualClock::new());
        s.start();
        assert!(s.wait_for_tick());
        s.tick();
        running.store(false, Ordering::Release);
        assert!(!s.wait_for_tick());
    }

    /// Sink that burns simulated wall-clock time on a chosen tick.
    struct StallingSink {
        clock: ManualClock,
        stall_on: usize,
        stall: Duration,
        seen: usize,
    }

    impl TelemetrySink for StallingSink {
        fn publish(&mut self, _: &TelemetrySnapshot) -> Result<(), TelemetryError> {
            self.seen += 1;
            if self.seen == self.stall_on {
                self.clock.advance(self.stall);
            }
            Ok(())
        }
    }

    #[test]
    fn stall_resyncs_to_one_period_from_now() {
        let clock = ManualClock::new();
        let sink = StallingSink {
            clock: clock.clone(),
            stall_on: 3,
            stall: Duration::from_millis(420),
            seen: 0,
        };
        let (mut s, _h, _r, metrics) = scheduler_with(sink, clock.clone());
        s.start();

        for _ in 0..3 {
            assert!(s.wait_for_tick());
            s.tick();
        }

        let now = clock.now();
        let next = s.next_due().unwrap();
        assert!(next >= now);
        assert!(next - now <= s.period());
        assert_eq!(metrics.lock().overruns, 1);

        // exactly one tick per wake afterwards, no burst
        let before = clock.now();
        assert!(s.wait_for_tick());
        s.tick();
        assert_eq!(clock.now() - before, s.period());
    }

    struct BrokenTransport;

    impl TelemetrySink for BrokenTransport {
        fn publish(&mut self, _: &TelemetrySnapshot) -> Result<(), TelemetryError> {
            Err(TelemetryError::Disconnected)
        }
    }

    #[test]
    fn transport_failure_keeps_running() {
        let (s, _h, _r, metrics) = scheduler_with(BrokenTransport, ManualClock::new());
        let s = {
            let mut s = s.with_tick_limit(5);
            s.start();
            while s.wait_for_tick() {
                s.tick();
                assert_eq!(s.phase(), SchedulerPhase::Running);
            }
            s
        };
        assert_eq!(s.ticks(), 5);
        assert_eq!(metrics.lock().publish_failures, 5);
    }
}
