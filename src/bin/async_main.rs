//! Async balancer: alternative to the threaded runner (async_balancer binary).
//!
//! Same scheduler, input channel and dashboard; pacing comes from the tokio timer instead of
//! a spin sleeper. Configured from `BALANCER_*` variables only (no menu); stops on Ctrl-C,
//! `q` on stdin, or after `BALANCER_DURATION_SECS`.
//! For comparison with the threaded runner (ball_balancer binary).

use std::{
    fs::create_dir_all,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use crossbeam::channel::bounded;
use log::{error, info};

use ball_balancer::advanced::{async_runner::run_async, dashboard::start_dashboard};
use ball_balancer::runtime::{
    clock::SpinClock,
    input::{input_channel, spawn_console_input, spawn_stdin_reader},
    scheduler::Scheduler,
    telemetry::{ChannelSink, FanoutSink, JsonLinesSink, TelemetrySnapshot},
};
use ball_balancer::utils::{
    config::SimConfig,
    metrics::{shared_metrics, EventRecorder},
    metrics_export::export_summary_csv,
};

const EVENTS_CSV: &str = "data/logs/tick_events_async.csv";
const SUMMARY_CSV: &str = "data/logs/run_summary.csv";

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() {
    env_logger::init();
    println!("=== ASYNC BALANCER START ===");

    let config = match SimConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };

    let running = Arc::new(AtomicBool::new(true));
    let exporter_running = Arc::new(AtomicBool::new(true));
    let metrics = shared_metrics();

    // Event recording: non-blocking queue → background CSV export
    let event_recorder = Arc::new(EventRecorder::new());
    if let Err(e) = create_dir_all("data/logs") {
        error!("Failed to create log directory: {}", e);
    }
    let exporter_handle = event_recorder.start_exporter(PathBuf::from(EVENTS_CSV), exporter_running.clone());

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
                    error!("[AsyncMain] dashboard unavailable: {}", e);
                    None
                }
            }
        }
        None => None,
    };
    if config.echo_json || dashboard.is_none() {
        sink = sink.with(JsonLinesSink::new(std::io::stdout()));
    }

    let console = match spawn_stdin_reader() {
        Ok(c) => Some(c),
        Err(e) => {
            error!("[AsyncMain] stdin reader unavailable: {}", e);
            None
        }
    };
    let console_handle = console
        .as_ref()
        .and_then(|c| spawn_console_input(c.receiver(), input_handle, running.clone()).ok());

    let mut scheduler = Scheduler::new(
        &config,
        sink,
        SpinClock::new(),
        input_queue,
        running.clone(),
        metrics.clone(),
    )
    .with_event_recorder(event_recorder.clone());
    if let Some(d) = config.duration {
        let ticks = (d.as_secs_f64() * config.frequency_hz).round() as u64;
        scheduler = scheduler.with_tick_limit(ticks);
    }

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("[AsyncMain] ctrl_c handler failed: {}", e);
            std::future::pending::<()>().await;
        }
    };

    run_async(scheduler, shutdown).await;
    running.store(false, Ordering::Release);

    // dashboard, console and exporter threads join on a blocking thread
    let _ = tokio::task::spawn_blocking(move || {
        if let Some(d) = dashboard {
            d.join();
        }
        if let Some(h) = console_handle {
            let _ = h.join();
        }
        exporter_running.store(false, Ordering::Release);
        let _ = exporter_handle.join();
    })
    .await;

    let label = format!("async_{}hz_x{}", config.frequency_hz, config.time_scale);
    if let Err(e) = export_summary_csv(&metrics, &label, Path::new(SUMMARY_CSV)) {
        error!("[AsyncMain] summary export failed: {}", e);
    }

    info!("[AsyncMain] {}", serde_json::to_string(&metrics.lock().summary()).unwrap_or_default());
    if let Some(c) = console {
        c.shutdown();
    }
    println!("=== ASYNC BALANCER FINISHED ===");
    // the stdin reader may still be blocked on a line; the runtime will not wait for it
    std::process::exit(0);
}
