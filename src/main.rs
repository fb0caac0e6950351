//! # Ball Balancer Simulation Entry Point
//!
//! Runs the 20 Hz balancer loop on a dedicated (optionally pinned, max-priority) thread and
//! wires its inputs and outputs:
//!
//! - **Input:** console commands (`up`, `-left`, `space`, `q`) and the dashboard's on-screen pad,
//!   both feeding one bounded channel drained at the start of each tick.
//! - **Telemetry:** one snapshot per tick, fanned out to the dashboard collector and/or a JSON
//!   line on stdout.
//!
//! ## Modes
//! - **Dashboard:** live page at `http://127.0.0.1:<port>` (default 8080).
//! - **Headless:** JSON lines on stdout only.
//!
//! ## Outputs
//! - `data/logs/tick_events.csv`: per-tick timing trace (wake lateness, exec time, resyncs).
//! - `data/logs/run_summary.csv`: one aggregated row per run.
//!
//! Defaults come from `SimConfig::from_env` (`BALANCER_*` variables).

use ball_balancer::{
    advanced::{dashboard::start_dashboard, realtime::spawn_hardened},
    runtime::{
        clock::SpinClock,
        input::{input_channel, spawn_console_input, spawn_stdin_reader, ConsoleLines},
        scheduler::Scheduler,
        telemetry::{ChannelSink, FanoutSink, JsonLinesSink, TelemetrySnapshot},
    },
    utils::{
        config::{SimConfig, DEFAULT_DASHBOARD_PORT},
        metrics::{shared_metrics, EventRecorder},
        metrics_export::export_summary_csv,
    },
};

use crossbeam::channel::bounded;
use log::{error, info, warn};
use std::{
    fs::create_dir_all,
    io::{stdout, Write},
    path::{Path, PathBuf},
    process,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

const DEFAULT_RUN_SECS: u64 = 30;
const LOG_DIR: &str = "data/logs";
const EVENTS_CSV: &str = "data/logs/tick_events.csv";
const SUMMARY_CSV: &str = "data/logs/run_summary.csv";

fn main() {
    env_logger::init();
    info!("=== BALL BALANCER START ===");

    let base = match SimConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("[Main] invalid configuration: {}", e);
            eprintln!("Invalid configuration: {}", e);
            process::exit(2);
        }
    };

    let console = match spawn_stdin_reader() {
        Ok(c) => c,
        Err(e) => {
            error!("[Main] failed to start stdin reader: {}", e);
            process::exit(1);
        }
    };

    loop {
        let Some(choice) = prompt_menu(&console) else {
            println!("Input closed. Exiting.");
            break;
        };
        match choice.as_str() {
            "1" | "" => {
                let port = base.dashboard_port.unwrap_or(DEFAULT_DASHBOARD_PORT);
                let config = SimConfig {
                    dashboard_port: Some(port),
                    duration: prompt_duration(&console, base.duration),
                    ..base.clone()
                };
                println!("check Dashboard live at: http://127.0.0.1:{} ", port);
                run_simulation(config, &console);
                println!("\n Simulation completed. Returning to menu...\n");
            }
            "2" => {
                let config = SimConfig {
                    dashboard_port: None,
                    echo_json: true,
                    duration: prompt_duration(&console, base.duration),
                    ..base.clone()
                };
                run_simulation(config, &console);
                println!("\n Simulation completed. Returning to menu...\n");
            }
            "3" => {
                println!("Exiting. Goodbye!");
                break;
            }
            other => {
                println!("Unrecognized option '{}', please try again.", other);
            }
        }
    }

    console.shutdown();
    info!("=== BALL BALANCER FINISHED ===");
}

fn prompt_menu(console: &ConsoleLines) -> Option<String> {
    println!("\n┌─────────────────────────────────────────────┐");
    println!("│     SELECT SIMULATION MODE                  │");
    println!("├─────────────────────────────────────────────┤");
    println!("│  1) Live dashboard                          │");
    println!("│  2) Headless (JSON lines on stdout)         │");
    println!("│  3) Exit                                    │");
    println!("└─────────────────────────────────────────────┘");
    print!("Select [1/2/3] (default: 1): ");
    read_trimmed_line(console)
}

//0 = run until `q`
fn prompt_duration(console: &ConsoleLines, configured: Option<Duration>) -> Option<Duration> {
    let default_secs = configured.map_or(DEFAULT_RUN_SECS, |d| d.as_secs());
    print!("Run for how many seconds? [default: {}, 0 = until 'q']: ", default_secs);
    let secs = read_trimmed_line(console)
        .and_then(|l| l.parse::<u64>().ok())
        .unwrap_or(default_secs);
    (secs != 0).then(|| Duration::from_secs(secs))
}

fn read_trimmed_line(console: &ConsoleLines) -> Option<String> {
    let _ = stdout().flush();
    console.read_line().map(|l| l.trim().to_string())
}

fn run_simulation(config: SimConfig, console: &ConsoleLines) {
    info!(
        "[Run] starting: {} Hz, time_scale={}, dashboard={:?}, duration={:?}",
        config.frequency_hz, config.time_scale, config.dashboard_port, config.duration
    );
    println!("Controls: up/down/left/right (w/a/s/d) to press, prefix '-' to release, 'space' to reset, 'q' to stop.");

    // ========================================================================
    // Shared state: stop flags, metrics, event trace
    // ========================================================================
    let running = Arc::new(AtomicBool::new(true));
    // outlives `running` so the exporter drains the scheduler's last tick
    let exporter_running = Arc::new(AtomicBool::new(true));
    let metrics = shared_metrics();
    let event_recorder = Arc::new(EventRecorder::new());

    if let Err(e) = create_dir_all(LOG_DIR) {
        error!("Failed to create log directory {:?}: {}", LOG_DIR, e);
        return;
    }
    let exporter_handle = event_recorder.start_exporter(PathBuf::from(EVENTS_CSV), exporter_running.clone());

    // ========================================================================
    // Input channel + telemetry fan-out
    // ========================================================================
    let (input_handle, input_queue) = input_channel(config.input_capacity);
    let mut sink = FanoutSink::new();

    let dashboard = match config.dashboard_port {
        Some(port) => {
            let (tx, rx) = bounded::<TelemetrySnapshot>(config.telemetry_capacity);
            match start_dashboard(port, rx, input_handle.clone(), running.clone()) {
                Ok(handle) => {
                    sink = sink.with(ChannelSink::new(tx));
                    Some(handle)
                }
                Err(e) => {
                    error!("[Run] dashboard unavailable: {}", e);
                    None
                }
            }
        }
        None => None,
    };
    if config.echo_json {
        sink = sink.with(JsonLinesSink::new(stdout()));
    }
    if sink.is_empty() {
        warn!("[Run] no telemetry consumer attached; snapshots are discarded");
    }

    let console_handle = match spawn_console_input(console.receiver(), input_handle, running.clone()) {
        Ok(h) => Some(h),
        Err(e) => {
            warn!("[Run] console input unavailable: {}", e);
            None
        }
    };

    // ========================================================================
    // Scheduler thread
    // ========================================================================
    let scheduler = Scheduler::new(
        &config,
        sink,
        SpinClock::new(),
        input_queue,
        running.clone(),
        metrics.clone(),
    )
    .with_event_recorder(event_recorder.clone());

    let scheduler_handle = match spawn_hardened(
        "scheduler",
        config.scheduler_core,
        config.realtime_priority,
        move || {
            scheduler.run();
        },
    ) {
        Ok(h) => h,
        Err(e) => {
            error!("[Run] failed to spawn scheduler thread: {}", e);
            running.store(false, Ordering::Release);
            exporter_running.store(false, Ordering::Release);
            if let Some(h) = console_handle {
                let _ = h.join();
            }
            return;
        }
    };

    // ========================================================================
    // Wait for timer or quit
    // ========================================================================
    let deadline = config.duration.map(|d| Instant::now() + d);
    while running.load(Ordering::Acquire) && deadline.is_none_or(|d| Instant::now() < d) {
        thread::sleep(Duration::from_millis(100));
    }

    info!("[Run] stopping");
    running.store(false, Ordering::Release);

    match scheduler_handle.join() {
        Ok(_) => info!("[Run] scheduler joined"),
        Err(_) => error!("[Run] scheduler thread panicked"),
    }
    if let Some(d) = dashboard {
        d.join();
    }

    exporter_running.store(false, Ordering::Release);
    if exporter_handle.join().is_err() {
        error!("[Run] event exporter panicked");
    }

    if let Some(h) = console_handle {
        if h.join().is_err() {
            error!("[Run] console input thread panicked");
        }
    }

    let label = format!("{}hz_x{}", config.frequency_hz, config.time_scale);
    match export_summary_csv(&metrics, &label, Path::new(SUMMARY_CSV)) {
        Ok(()) => info!("[Run] summary appended to {}", SUMMARY_CSV),
        Err(e) => error!("[Run] summary export failed: {}", e),
    }

    let summary = metrics.lock().summary();
    info!(
        "[Run] done: ticks={} overruns={} jitter_mean={:.1}us jitter_max={:.1}us",
        summary.ticks, summary.overruns, summary.jitter_mean_us, summary.jitter_max_us
    );
    info!("[Run] events exported to: {}", EVENTS_CSV);
}
