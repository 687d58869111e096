//! Read access to the report store.
//!
//! The store itself is owned elsewhere; the engine only ever issues range
//! reads through [`ReportStore`]. Adapters:
//! - [`MemoryReportStore`] keeps reports in a vector (tests, demos).
//! - [`CsvReportStore`] loads a CSV file written by the `ingest` command.
//! - [`HttpReportStore`] queries a PostgREST-style REST endpoint.

mod csv_file;
mod http;
mod memory;

pub use self::csv_file::CsvReportStore;
pub use self::http::HttpReportStore;
pub use self::memory::MemoryReportStore;

use crate::report::{PartitionKey, Report};
use anyhow::Result;
use chrono::{DateTime, Utc};

/// Range reads over reports partitioned by (route, stop).
#[async_trait::async_trait]
pub trait ReportStore: Send + Sync {
    /// Returns every report for `key` with `since <= timestamp <= until`.
    /// No ordering is guaranteed.
    async fn query(
        &self,
        key: &PartitionKey,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Report>>;
}

/// Filters `reports` down to the partition and inclusive time range.
pub(crate) fn select_range<'a, I>(
    reports: I,
    key: &PartitionKey,
    since: DateTime<Utc>,
    until: DateTime<Utc>,
) -> Vec<Report>
where
    I: IntoIterator<Item = &'a Report>,
{
    reports
        .into_iter()
        .filter(|r| r.belongs_to(key) && r.timestamp >= since && r.timestamp <= until)
        .cloned()
        .collect()
}
