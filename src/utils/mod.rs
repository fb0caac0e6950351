
// Utils: run configuration, timing metrics and their CSV exports.

pub mod config;
pub mod metrics;
pub mod metrics_export;
