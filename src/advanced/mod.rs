
// Advanced: optional surfaces around the core loop.
// Live HTTP dashboard, scheduler-thread hardening (pinning, priority)
// and a tokio-driven variant of the tick loop.

pub mod dashboard;
pub mod realtime;
pub mod async_runner;
