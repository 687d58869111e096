//! Output formatting and persistence.
//!
//! Estimates are written to stdout as JSON; ingested reports are appended to
//! a CSV file that [`crate::store::CsvReportStore`] can read back.

use anyhow::Result;
use tracing::debug;

use crate::estimate::FusionResult;
use crate::report::Report;
use csv::WriterBuilder;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// Logs an estimate using Rust's debug pretty-print format.
pub fn print_pretty(result: &FusionResult) {
    debug!("{:#?}", result);
}

/// Writes an estimate as JSON to `out`, followed by a newline.
pub fn write_json<W: Write>(mut out: W, result: &FusionResult, pretty: bool) -> Result<()> {
    if pretty {
        serde_json::to_writer_pretty(&mut out, result)?;
    } else {
        serde_json::to_writer(&mut out, result)?;
    }
    writeln!(out)?;
    Ok(())
}

/// Appends reports as rows to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_reports(path: &str, reports: &[Report]) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, count = reports.len(), "Appending reports");

    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);

    for report in reports {
        writer.serialize(report)?;
    }
    writer.flush()?;

    Ok(())
}

/// Appends a single report. See [`append_reports`].
pub fn append_report(path: &str, report: &Report) -> Result<()> {
    append_reports(path, std::slice::from_ref(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confidence::Confidence;
    use crate::fusion::ReportCounts;
    use crate::prior::Prior;
    use crate::report::{PartitionKey, Source};
    use crate::store::CsvReportStore;
    use chrono::{TimeZone, Utc};
    use std::env;
    use std::fs;

    fn temp_path(name: &str) -> String {
        format!("{}/{}", env::temp_dir().display(), name)
    }

    fn sample_result() -> FusionResult {
        FusionResult {
            route: "R1".into(),
            stop: "S1".into(),
            bus_id: None,
            level: 2,
            est_headcount: 21,
            headcount_ci68: [4, 38],
            remaining_capacity: 39,
            confidence: Confidence::Low,
            counts: ReportCounts::default(),
            window_min: 15,
            prior: Prior { mu0: 0.35, k0: 2.0 },
        }
    }

    fn sample_report() -> Report {
        let at = Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap();
        Report::new(&PartitionKey::new("R1", "S1"), Source::Rider, 3, at)
    }

    #[test]
    fn test_print_pretty_does_not_panic() {
        print_pretty(&sample_result());
    }

    #[test]
    fn test_write_json_shape() {
        let mut buf = Vec::new();
        write_json(&mut buf, &sample_result(), false).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value["confidence"], "low");
        assert_eq!(value["headcount_ci68"], serde_json::json!([4, 38]));
        assert_eq!(value["counts"]["reports"], 0);
        assert_eq!(value["prior"]["mu0"], 0.35);
        assert!(value["bus_id"].is_null());
        assert!(buf.ends_with(b"\n"));
    }

    #[test]
    fn test_append_report_writes_header_once() {
        let path = temp_path("crowd_level_test_header.csv");
        let _ = fs::remove_file(&path);

        append_report(&path, &sample_report()).unwrap();
        append_report(&path, &sample_report().with_bus("B7").with_headcount(30)).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let header_count = content.lines().filter(|l| l.contains("timestamp")).count();
        assert_eq!(header_count, 1);
        assert_eq!(content.lines().count(), 3);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_appended_reports_read_back() {
        let path = temp_path("crowd_level_test_read_back.csv");
        let _ = fs::remove_file(&path);

        let reports = vec![sample_report(), sample_report().with_bus("B7")];
        append_reports(&path, &reports).unwrap();

        let store = CsvReportStore::open(&path).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.skipped(), 0);

        fs::remove_file(&path).unwrap();
    }
}
