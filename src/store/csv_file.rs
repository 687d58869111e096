use super::{ReportStore, select_range};
use crate::report::{PartitionKey, Report};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::Path;
use tracing::{debug, warn};

/// Reports loaded once from a CSV file.
///
/// The file is the one [`crate::output::append_report`] writes: a header row
/// followed by `route,stop,bus_id,source,level,headcount,timestamp` records.
/// Rows that fail to deserialize are skipped.
#[derive(Debug, Clone)]
pub struct CsvReportStore {
    reports: Vec<Report>,
    skipped: usize,
}

impl CsvReportStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut rdr = csv::Reader::from_path(path)
            .with_context(|| format!("failed to open report file {}", path.display()))?;

        let mut reports = Vec::new();
        let mut skipped = 0;

        for (row, result) in rdr.deserialize::<Report>().enumerate() {
            match result {
                Ok(report) => reports.push(report),
                Err(e) => {
                    skipped += 1;
                    warn!(path = %path.display(), row = row + 1, error = %e, "Skipping malformed report row");
                }
            }
        }

        debug!(path = %path.display(), loaded = reports.len(), skipped, "Report file loaded");
        Ok(Self { reports, skipped })
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// Number of rows that could not be read.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

#[async_trait::async_trait]
impl ReportStore for CsvReportStore {
    async fn query(
        &self,
        key: &PartitionKey,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Report>> {
        Ok(select_range(&self.reports, key, since, until))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::env;
    use std::fs;

    fn temp_path(name: &str) -> String {
        format!("{}/{}", env::temp_dir().display(), name)
    }

    #[tokio::test]
    async fn test_open_reads_rows_and_skips_malformed_ones() {
        let path = temp_path("crowd_level_test_store.csv");
        fs::write(
            &path,
            "route,stop,bus_id,source,level,headcount,timestamp\n\
             R1,S1,B7,driver,3,40,2026-03-02T08:00:00Z\n\
             R1,S1,,rider,2,,2026-03-02T08:05:00Z\n\
             R1,S1,,conductor,2,,2026-03-02T08:06:00Z\n\
             R1,S1,,rider,two,,2026-03-02T08:07:00Z\n",
        )
        .unwrap();

        let store = CsvReportStore::open(&path).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.skipped(), 2);

        let key = PartitionKey::new("R1", "S1");
        let since = Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap();
        let until = Utc.with_ymd_and_hms(2026, 3, 2, 8, 10, 0).unwrap();
        let hits = store.query(&key, since, until).await.unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].bus_id.as_deref(), Some("B7"));
        assert_eq!(hits[0].headcount, Some(40));
        assert_eq!(hits[1].bus_id, None);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_open_missing_file_is_an_error() {
        let path = temp_path("crowd_level_test_missing.csv");
        let _ = fs::remove_file(&path);
        assert!(CsvReportStore::open(&path).is_err());
    }
}
