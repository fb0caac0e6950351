//! Real-time hardening for the scheduler thread.
//!
//! Optional core pinning (`core_affinity`) and maximum OS priority (`thread_priority`).
//! Both are best effort: failure is logged and the loop runs unhardened.

use std::{io, thread};

use core_affinity::{get_core_ids, set_for_current};
use log::{info, warn};
use thread_priority::{ThreadBuilderExt, ThreadPriority};

/// Pins the calling thread to `core`. An out-of-range index falls back to the first core.
pub fn pin_current_thread(core: usize) -> bool {
    let cores = get_core_ids().unwrap_or_default();
    let Some(core_id) = cores.get(core).cloned().or_else(|| cores.first().cloned()) else {
        warn!("[Realtime] no cores reported, running unpinned");
        return false;
    };
    if set_for_current(core_id) {
        info!("[Realtime] {:?} pinned to core {:?}", thread::current().name(), core_id);
        true
    } else {
        warn!("[Realtime] failed to pin to core {:?}", core_id);
        false
    }
}

/// Spawns a named thread, optionally pinned and at `ThreadPriority::Max`.
pub fn spawn_hardened<F, T>(
    name: &str,
    core: Option<usize>,
    max_priority: bool,
    f: F,
) -> io::Result<thread::JoinHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let builder = thread::Builder::new().name(name.to_string());
    let pin = move || {
        if let Some(core) = core {
            pin_current_thread(core);
        }
    };

    if max_priority {
        builder.spawn_with_priority(ThreadPriority::Max, move |result| {
            if let Err(e) = result {
                warn!("[Realtime] could not raise priority: {:?}", e);
            }
            pin();
            f()
        })
    } else {
        builder.spawn(move || {
            pin();
            f()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_thread_runs_body() {
        let h = spawn_hardened("rt_test", None, false, || 7).unwrap();
        assert_eq!(h.join().unwrap(), 7);
    }

    #[test]
    fn pinning_out_of_range_falls_back() {
        // must not panic on any machine, pinned or not
        let h = spawn_hardened("rt_pin", Some(usize::MAX), false, || thread::current().name().map(String::from))
            .unwrap();
        assert_eq!(h.join().unwrap().as_deref(), Some("rt_pin"));
    }
}
