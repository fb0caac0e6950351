/*
Wake accuracy of the tick loop at 200 Hz: OS thread::sleep against the SpinClock the scheduler
uses, both paced by the same drift-corrected `next_due_after_tick` rule. Each iteration
collects per-tick lateness in microseconds.
*/

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use std::{
    hint::black_box,
    thread,
    time::{Duration, Instant},
};

use ball_balancer::runtime::clock::{next_due_after_tick, Clock, SpinClock};

const PERIOD: Duration = Duration::from_millis(5);
const SAMPLES: usize = 200;

fn paced_lateness(mut sleep_until: impl FnMut(Instant)) -> Vec<u64> {
    let mut lateness = Vec::with_capacity(SAMPLES);
    let mut due = Instant::now();
    for _ in 0..SAMPLES {
        sleep_until(due);
        let wake = Instant::now();
        lateness.push(wake.saturating_duration_since(due).as_micros() as u64);
        due = next_due_after_tick(Instant::now(), due, PERIOD).0;
    }
    lateness
}

fn bench_wake_accuracy(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick_wake_accuracy");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(10));

    group.bench_function(BenchmarkId::new("thread_sleep", "5ms"), |b| {
        b.iter(|| {
            black_box(paced_lateness(|due| {
                let now = Instant::now();
                if now < due {
                    thread::sleep(due - now);
                }
            }))
        });
    });

    group.bench_function(BenchmarkId::new("spin_clock", "5ms"), |b| {
        let clock = SpinClock::new();
        b.iter(|| black_box(paced_lateness(|due| clock.sleep_until(due))));
    });

    group.finish();
}

fn bench_drift_rule(c: &mut Criterion) {
    let base = Instant::now();
    let on_time = base + Duration::from_millis(1);
    let overrun = base + Duration::from_millis(30);

    c.bench_function("next_due_after_tick", |b| {
        b.iter(|| {
            black_box(next_due_after_tick(black_box(on_time), base, PERIOD));
            black_box(next_due_after_tick(black_box(overrun), base, PERIOD));
        })
    });
}

criterion_group!(benches, bench_wake_accuracy, bench_drift_rule);
criterion_main!(benches);
