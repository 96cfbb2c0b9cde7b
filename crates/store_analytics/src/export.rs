//! CSV/JSON export of run analytics: per-shopper times, per-checkout
//! queue series and utilization, the run summary, and a combined table
//! across several runs.

use std::fs::File;
use std::path::Path;

use store_core::telemetry::AnalyticsBundle;
use thiserror::Error;

use crate::metrics::RunSummary;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write analytics output")]
    Io(#[from] std::io::Error),
    #[error("failed to encode CSV")]
    Csv(#[from] csv::Error),
    #[error("failed to encode JSON")]
    Json(#[from] serde_json::Error),
}

fn opt_string<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// `shopper_times.csv`: one row per shopper with lifecycle timestamps.
pub fn write_shopper_times(bundle: &AnalyticsBundle, path: &Path) -> Result<(), ExportError> {
    let mut writer = csv::Writer::from_writer(File::create(path)?);
    writer.write_record([
        "id",
        "type",
        "speed",
        "patience",
        "items_total",
        "items_left",
        "shopping_done",
        "time_waited",
        "entry_tick",
        "start_tick",
        "finish_tick",
        "total_time",
        "last_checkout_service_time",
    ])?;
    for shopper in &bundle.shoppers {
        writer.write_record([
            shopper.id.0.to_string(),
            format!("{:?}", shopper.client_type).to_lowercase(),
            format!("{:?}", shopper.speed),
            shopper.patience.to_string(),
            shopper.items_total.to_string(),
            shopper.items_left.to_string(),
            shopper.shopping_done.to_string(),
            shopper.time_waited.to_string(),
            shopper.entry_tick.to_string(),
            opt_string(shopper.start_tick),
            opt_string(shopper.finish_tick),
            opt_string(shopper.total_time),
            shopper.last_checkout_service_time.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// `queue_lengths.csv`: the raw (checkout, tick, queue_len) series.
pub fn write_queue_lengths(bundle: &AnalyticsBundle, path: &Path) -> Result<(), ExportError> {
    let mut writer = csv::Writer::from_writer(File::create(path)?);
    writer.write_record(["checkout_row", "checkout_col", "tick", "busy", "queue_len"])?;
    for series in &bundle.checkouts {
        for sample in &series.samples {
            writer.write_record([
                series.pos.row.to_string(),
                series.pos.col.to_string(),
                sample.tick.to_string(),
                sample.busy.to_string(),
                sample.queue_len.to_string(),
            ])?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// `checkout_utilization.csv`: one aggregated row per checkout.
pub fn write_checkout_utilization(
    summary: &RunSummary,
    path: &Path,
) -> Result<(), ExportError> {
    let mut writer = csv::Writer::from_writer(File::create(path)?);
    writer.write_record([
        "checkout_row",
        "checkout_col",
        "busy_fraction",
        "avg_queue_len",
        "peak_queue_len",
        "samples",
    ])?;
    for checkout in &summary.checkouts {
        writer.write_record([
            checkout.row.to_string(),
            checkout.col.to_string(),
            checkout.busy_fraction.to_string(),
            checkout.avg_queue_len.to_string(),
            checkout.peak_queue_len.to_string(),
            checkout.samples.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the full analytics set for one run into `dir` and return its
/// summary. Creates the directory if needed.
pub fn export_run(bundle: &AnalyticsBundle, dir: &Path) -> Result<RunSummary, ExportError> {
    std::fs::create_dir_all(dir)?;
    let summary = RunSummary::from_bundle(bundle);
    write_shopper_times(bundle, &dir.join("shopper_times.csv"))?;
    write_queue_lengths(bundle, &dir.join("queue_lengths.csv"))?;
    write_checkout_utilization(&summary, &dir.join("checkout_utilization.csv"))?;
    serde_json::to_writer_pretty(File::create(dir.join("summary.json"))?, &summary)?;
    Ok(summary)
}

/// One combined CSV over several labeled runs, for cross-run comparison.
pub fn write_combined_summary(
    runs: &[(String, RunSummary)],
    path: &Path,
) -> Result<(), ExportError> {
    let mut writer = csv::Writer::from_writer(File::create(path)?);
    writer.write_record([
        "run",
        "final_tick",
        "total_shoppers",
        "completed",
        "completion_rate",
        "avg_total_time",
        "avg_total_time_solo",
        "avg_total_time_familia",
        "avg_time_waited",
    ])?;
    for (label, summary) in runs {
        writer.write_record([
            label.clone(),
            summary.final_tick.to_string(),
            summary.total_shoppers.to_string(),
            summary.completed.to_string(),
            summary.completion_rate.to_string(),
            opt_string(summary.avg_total_time),
            opt_string(summary.avg_total_time_solo),
            opt_string(summary.avg_total_time_familia),
            opt_string(summary.avg_time_waited),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use store_core::scenario::SessionConfig;
    use store_core::session::{command_channel, MemorySink, Session};

    use super::*;

    fn run_bundle() -> AnalyticsBundle {
        let config = SessionConfig::default()
            .with_seed(11)
            .with_num_clients(3)
            .with_max_ticks(400)
            .with_tick_delay(0.0);
        let mut session = Session::new(&config).expect("valid config");
        let (_sender, receiver) = command_channel();
        let mut sink = MemorySink::default();
        session.run(&receiver, &mut sink)
    }

    #[test]
    fn export_run_writes_every_table() {
        let dir = tempfile::tempdir().expect("temp dir");
        let bundle = run_bundle();
        let summary = export_run(&bundle, dir.path()).expect("export succeeds");

        for file in [
            "shopper_times.csv",
            "queue_lengths.csv",
            "checkout_utilization.csv",
            "summary.json",
        ] {
            assert!(dir.path().join(file).exists(), "{file} must be written");
        }

        let times = std::fs::read_to_string(dir.path().join("shopper_times.csv")).unwrap();
        // header plus one row per shopper
        assert_eq!(times.lines().count(), 1 + bundle.shoppers.len());

        let encoded = std::fs::read_to_string(dir.path().join("summary.json")).unwrap();
        let decoded: RunSummary = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, summary);
    }

    #[test]
    fn queue_series_rows_match_the_bundle() {
        let dir = tempfile::tempdir().expect("temp dir");
        let bundle = run_bundle();
        export_run(&bundle, dir.path()).expect("export succeeds");

        let series = std::fs::read_to_string(dir.path().join("queue_lengths.csv")).unwrap();
        let expected: usize = bundle.checkouts.iter().map(|c| c.samples.len()).sum();
        assert_eq!(series.lines().count(), 1 + expected);
    }

    #[test]
    fn combined_summary_lists_each_run() {
        let dir = tempfile::tempdir().expect("temp dir");
        let bundle = run_bundle();
        let summary = RunSummary::from_bundle(&bundle);
        let runs = vec![
            ("monday_10h".to_string(), summary.clone()),
            ("saturday_18h".to_string(), summary),
        ];
        let path = dir.path().join("combined.csv");
        write_combined_summary(&runs, &path).expect("combined export succeeds");

        let combined = std::fs::read_to_string(path).unwrap();
        assert_eq!(combined.lines().count(), 3);
        assert!(combined.contains("monday_10h"));
        assert!(combined.contains("saturday_18h"));
    }
}
