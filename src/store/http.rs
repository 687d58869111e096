use super::ReportStore;
use crate::fetch::{HttpClient, fetch_json};
use crate::report::{PartitionKey, Report};
use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Url;
use tracing::{debug, warn};

/// Reads reports from a PostgREST-style endpoint.
///
/// `base_url` points at the API root; reports are fetched from
/// `{base_url}/reports` with equality filters on route and stop and an
/// inclusive timestamp range.
pub struct HttpReportStore<C> {
    client: C,
    base_url: Url,
}

impl<C: HttpClient> HttpReportStore<C> {
    pub fn new(client: C, base_url: &str) -> Result<Self> {
        let mut base_url: Url = base_url
            .parse()
            .with_context(|| format!("invalid report store URL '{base_url}'"))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { client, base_url })
    }

    /// Builds the range query URL for one partition.
    pub fn query_url(
        &self,
        key: &PartitionKey,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Url> {
        let mut url = self.base_url.join("reports")?;
        url.query_pairs_mut()
            .append_pair("route", &format!("eq.{}", key.route))
            .append_pair("stop", &format!("eq.{}", key.stop))
            .append_pair(
                "timestamp",
                &format!("gte.{}", since.to_rfc3339_opts(SecondsFormat::Millis, true)),
            )
            .append_pair(
                "timestamp",
                &format!("lte.{}", until.to_rfc3339_opts(SecondsFormat::Millis, true)),
            )
            .append_pair("order", "timestamp.asc");
        Ok(url)
    }
}

#[async_trait::async_trait]
impl<C: HttpClient> ReportStore for HttpReportStore<C> {
    #[tracing::instrument(skip_all, fields(key = %key, since = %since, until = %until))]
    async fn query(
        &self,
        key: &PartitionKey,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Report>> {
        let url = self.query_url(key, since, until)?;
        let rows: Vec<serde_json::Value> = fetch_json(&self.client, url)
            .await
            .with_context(|| format!("report query failed for {key}"))?;

        let (reports, skipped) = decode_reports(rows);
        debug!(count = reports.len(), skipped, "Reports fetched");
        Ok(reports)
    }
}

/// Decodes rows one at a time so a single bad row only costs itself.
fn decode_reports(rows: Vec<serde_json::Value>) -> (Vec<Report>, usize) {
    let mut reports = Vec::with_capacity(rows.len());
    let mut skipped = 0;
    for (index, row) in rows.into_iter().enumerate() {
        match serde_json::from_value::<Report>(row) {
            Ok(report) => reports.push(report),
            Err(e) => {
                warn!(row = index, error = %e, "Skipping malformed report row");
                skipped += 1;
            }
        }
    }
    (reports, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::BasicClient;
    use chrono::TimeZone;

    #[test]
    fn test_query_url_encodes_filters() {
        let store =
            HttpReportStore::new(BasicClient::new().unwrap(), "https://example.org/rest/v1").unwrap();
        let key = PartitionKey::new("Route 9", "S&1");
        let since = Utc.with_ymd_and_hms(2026, 3, 2, 7, 45, 0).unwrap();
        let until = Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap();

        let url = store.query_url(&key, since, until).unwrap();

        assert_eq!(url.path(), "/rest/v1/reports");
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("route".into(), "eq.Route 9".into()),
                ("stop".into(), "eq.S&1".into()),
                ("timestamp".into(), "gte.2026-03-02T07:45:00.000Z".into()),
                ("timestamp".into(), "lte.2026-03-02T08:00:00.000Z".into()),
                ("order".into(), "timestamp.asc".into()),
            ]
        );
    }

    #[test]
    fn test_malformed_rows_are_skipped_individually() {
        let rows = serde_json::json!([
            {"route": "R1", "stop": "S1", "source": "driver", "level": 4, "timestamp": "2026-03-02T08:00:00Z"},
            {"route": "R1", "stop": "S1", "source": "rider", "level": 2.5, "timestamp": "2026-03-02T08:01:00Z"},
            {"route": "R1", "stop": "S1", "source": "rider", "level": null, "timestamp": "2026-03-02T08:02:00Z"},
            {"route": "R1", "stop": "S1", "source": "rider", "level": "4", "timestamp": "2026-03-02T08:03:00Z"},
            {"route": "R1", "stop": "S1", "source": "conductor", "level": 2, "timestamp": "2026-03-02T08:04:00Z"}
        ]);
        let serde_json::Value::Array(rows) = rows else {
            panic!("expected an array");
        };

        let (reports, skipped) = decode_reports(rows);

        assert_eq!(skipped, 2);
        let levels: Vec<i64> = reports.iter().map(|r| r.level).collect();
        assert_eq!(levels, vec![4, 3, 4]);
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        assert!(HttpReportStore::new(BasicClient::new().unwrap(), "not a url").is_err());
    }
}
