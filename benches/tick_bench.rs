use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::{
    hint::black_box,
    sync::{atomic::AtomicBool, Arc},
};

use ball_balancer::balancer::{BalancerParams, Direction, InputEvent, Simulation};
use ball_balancer::runtime::{
    clock::ManualClock,
    input::input_channel,
    scheduler::Scheduler,
    telemetry::{JsonLinesSink, TelemetryError, TelemetrySink, TelemetrySnapshot},
};
use ball_balancer::utils::{config::SimConfig, metrics::shared_metrics};

const SIM_DT: f64 = 0.005;

struct NullSink;

impl TelemetrySink for NullSink {
    fn publish(&mut self, snapshot: &TelemetrySnapshot) -> Result<(), TelemetryError> {
        black_box(snapshot);
        Ok(())
    }
}

// Pure physics + control: accumulator → controller → integrator
fn bench_simulation_step(c: &mut Criterion) {
    let mut sim = Simulation::new(BalancerParams::default());
    sim.apply_input(InputEvent::Press(Direction::Right));
    sim.apply_input(InputEvent::Press(Direction::Up));

    c.bench_function("simulation_step", |b| {
        b.iter(|| {
            black_box(sim.step(black_box(SIM_DT)));
        })
    });
}

// Full tick: input drain + step + snapshot + publish, virtual clock so no sleeping
fn bench_scheduler_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler_tick");

    group.bench_function(BenchmarkId::new("null_sink", "no_input"), |b| {
        let (_handle, queue) = input_channel(64);
        let mut s = Scheduler::new(
            &SimConfig::default(),
            NullSink,
            ManualClock::new(),
            queue,
            Arc::new(AtomicBool::new(true)),
            shared_metrics(),
        );
        s.start();
        b.iter(|| black_box(s.tick()));
    });

    group.bench_function(BenchmarkId::new("null_sink", "one_input"), |b| {
        let (handle, queue) = input_channel(64);
        let mut s = Scheduler::new(
            &SimConfig::default(),
            NullSink,
            ManualClock::new(),
            queue,
            Arc::new(AtomicBool::new(true)),
            shared_metrics(),
        );
        s.start();
        let mut flip = false;
        b.iter(|| {
            flip = !flip;
            let event = if flip {
                InputEvent::Press(Direction::Left)
            } else {
                InputEvent::Release(Direction::Left)
            };
            let _ = handle.send(event);
            black_box(s.tick())
        });
    });

    group.bench_function(BenchmarkId::new("json_sink", "no_input"), |b| {
        let (_handle, queue) = input_channel(64);
        let mut s = Scheduler::new(
            &SimConfig::default(),
            JsonLinesSink::new(std::io::sink()),
            ManualClock::new(),
            queue,
            Arc::new(AtomicBool::new(true)),
            shared_metrics(),
        );
        s.start();
        b.iter(|| black_box(s.tick()));
    });

    group.finish();
}

criterion_group!(benches, bench_simulation_step, bench_scheduler_tick);
criterion_main!(benches);
