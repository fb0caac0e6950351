//! Async tick loop: the same scheduler driven from a tokio task.
//!
//! Pacing comes from `tokio::time::sleep_until` on the scheduler's `next_due` instead of a
//! spin sleeper, so it is coarser (timer wheel resolution) but shares every tick semantic
//! (input drain, drift correction, telemetry) with the threaded runner.

use std::{future::Future, sync::atomic::Ordering};

use log::{debug, info};
use tokio::time::{sleep_until, Instant};

use crate::runtime::{clock::Clock, scheduler::Scheduler, telemetry::TelemetrySink};

/// Runs until `shutdown` resolves, cancellation is observed, or the tick limit is hit.
/// Hands back the sink after `stop`.
pub async fn run_async<S, C, F>(mut scheduler: Scheduler<S, C>, shutdown: F) -> S
where
    S: TelemetrySink,
    C: Clock,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    scheduler.start();

    while scheduler.ready() {
        if let Some(due) = scheduler.next_due() {
            tokio::select! {
                _ = sleep_until(Instant::from_std(due)) => {}
                _ = &mut shutdown => {
                    info!("[AsyncRunner] shutdown requested");
                    scheduler.running().store(false, Ordering::Release);
                    break;
                }
            }
        }
        if !scheduler.ready() {
            break;
        }
        scheduler.tick();
    }

    debug!("[AsyncRunner] loop exited after {} ticks", scheduler.ticks());
    scheduler.into_sink()
}
