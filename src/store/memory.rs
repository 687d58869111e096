use super::{ReportStore, select_range};
use crate::report::{PartitionKey, Report};
use anyhow::Result;
use chrono::{DateTime, Utc};

/// A fixed set of reports held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryReportStore {
    reports: Vec<Report>,
}

impl MemoryReportStore {
    pub fn new(reports: Vec<Report>) -> Self {
        Self { reports }
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}

#[async_trait::async_trait]
impl ReportStore for MemoryReportStore {
    async fn query(
        &self,
        key: &PartitionKey,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Report>> {
        Ok(select_range(&self.reports, key, since, until))
    }
}
