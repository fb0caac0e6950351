//! CSV export for run results: one aggregated timing row per run.
//!
//! Columns: label, ticks, overruns, publish_failures, inputs_applied, inputs_dropped,
//! jitter_mean_us, jitter_std_us, jitter_max_us. Appends to a persistent file so repeated runs
//! (different frequencies, loaded machines) line up in one table.

use std::{
    fs::{create_dir_all, OpenOptions},
    path::Path,
};

use serde::Serialize;

use crate::utils::metrics::{MetricsSummary, SharedMetrics};

#[derive(Debug, Serialize)]
struct SummaryRow<'a> {
    label: &'a str,
    ticks: u64,
    overruns: u64,
    publish_failures: u64,
    inputs_applied: u64,
    inputs_dropped: u64,
    jitter_mean_us: f64,
    jitter_std_us: f64,
    jitter_max_us: f64,
}

impl<'a> SummaryRow<'a> {
    fn new(label: &'a str, s: MetricsSummary) -> Self {
        Self {
            label,
            ticks: s.ticks,
            overruns: s.overruns,
            publish_failures: s.publish_failures,
            inputs_applied: s.inputs_applied,
            inputs_dropped: s.inputs_dropped,
            jitter_mean_us: s.jitter_mean_us,
            jitter_std_us: s.jitter_std_us,
            jitter_max_us: s.jitter_max_us,
        }
    }
}

/// Appends the current metrics as one row to `csv_path`, writing the header on first use.
pub fn export_summary_csv(metrics: &SharedMetrics, label: &str, csv_path: &Path) -> csv::Result<()> {
    if let Some(dir) = csv_path.parent() {
        if !dir.as_os_str().is_empty() {
            create_dir_all(dir)?;
        }
    }
    let file_exists = csv_path.exists();

    let summary = metrics.lock().summary();

    let file = OpenOptions::new().create(true).append(true).open(csv_path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);

    writer.serialize(SummaryRow::new(label, summary))?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::metrics::shared_metrics;
    use std::fs;

    #[test]
    fn appends_rows_under_one_header() {
        let dir = std::env::temp_dir().join(format!("balancer_export_{}", std::process::id()));
        let path = dir.join("run_summary.csv");
        let _ = fs::remove_file(&path);

        let metrics = shared_metrics();
        {
            let mut m = metrics.lock();
            m.ticks = 40;
            m.overruns = 2;
            m.record_jitter(120);
        }

        export_summary_csv(&metrics, "20hz", &path).unwrap();
        export_summary_csv(&metrics, "20hz-again", &path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("label,ticks,overruns,publish_failures"));
        assert!(lines[1].starts_with("20hz,40,2,0"));
        assert!(lines[2].starts_with("20hz-again,40,2,0"));

        let _ = fs::remove_dir_all(&dir);
    }
}
