//! Query facade: prior, fusion and confidence assembled into one result.

use crate::config::{FusionConfig, MAX_WINDOW_MIN};
use crate::confidence::{Confidence, assess};
use crate::fusion::{ReportCounts, fuse};
use crate::prior::{Prior, estimate_prior};
use crate::report::{PartitionKey, Report};
use crate::store::ReportStore;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Parameters of one crowd-level query.
#[derive(Debug, Clone, PartialEq)]
pub struct EstimateRequest {
    pub route: String,
    pub stop: String,
    /// Reference instant; now when unset.
    pub at: Option<DateTime<Utc>>,
    /// Width of the current window in minutes; configured default when unset.
    /// Clamped to `[0, MAX_WINDOW_MIN]`.
    pub window_min: Option<i64>,
    pub bus_id: Option<String>,
}

impl EstimateRequest {
    pub fn new(route: &str, stop: &str) -> Self {
        Self {
            route: route.to_string(),
            stop: stop.to_string(),
            at: None,
            window_min: None,
            bus_id: None,
        }
    }

    pub fn at(mut self, at: DateTime<Utc>) -> Self {
        self.at = Some(at);
        self
    }

    pub fn window_min(mut self, window_min: i64) -> Self {
        self.window_min = Some(window_min);
        self
    }

    pub fn bus(mut self, bus_id: &str) -> Self {
        self.bus_id = Some(bus_id.to_string());
        self
    }
}

/// The answer to "how full is this stop right now?".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FusionResult {
    pub route: String,
    pub stop: String,
    pub bus_id: Option<String>,
    pub level: u8,
    pub est_headcount: u32,
    pub headcount_ci68: [u32; 2],
    pub remaining_capacity: u32,
    pub confidence: Confidence,
    pub counts: ReportCounts,
    pub window_min: i64,
    pub prior: Prior,
}

/// Answers crowd-level queries against a report store.
///
/// Holds no per-request state; one instance can serve concurrent queries.
#[derive(Clone)]
pub struct Estimator {
    config: Arc<FusionConfig>,
    store: Arc<dyn ReportStore>,
}

impl Estimator {
    pub fn new(config: FusionConfig, store: Arc<dyn ReportStore>) -> Self {
        Self {
            config: Arc::new(config),
            store,
        }
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// Estimates the current crowd level for a route/stop.
    ///
    /// The historical and current-window reads run concurrently under the
    /// configured store deadline. Store failures never fail the query: a
    /// failed history read yields the default prior, a failed current read an
    /// empty window, and a missed deadline both.
    #[tracing::instrument(
        skip_all,
        fields(route = %req.route, stop = %req.stop, bus_id = ?req.bus_id)
    )]
    pub async fn estimate(&self, req: &EstimateRequest) -> FusionResult {
        let cfg = &*self.config;
        let at = req.at.unwrap_or_else(Utc::now);
        let window_min = req
            .window_min
            .unwrap_or(cfg.window_min)
            .clamp(0, MAX_WINDOW_MIN);
        let key = PartitionKey::new(&req.route, &req.stop);

        let gather = async {
            tokio::join!(
                estimate_prior(self.store.clone(), &key, at, cfg),
                self.current_window(&key, at, window_min)
            )
        };

        let (prior, reports) = match tokio::time::timeout(cfg.store_timeout, gather).await {
            Ok(gathered) => gathered,
            Err(_) => {
                warn!(
                    timeout_ms = cfg.store_timeout.as_millis() as u64,
                    "Store reads missed the deadline, using defaults"
                );
                (Prior::fallback(cfg), Vec::new())
            }
        };

        let posterior = fuse(reports, at, req.bus_id.as_deref(), prior, &cfg.weights);
        let assessment = assess(posterior.mu, posterior.k_eff, cfg.capacity);

        info!(
            mu = posterior.mu,
            k_eff = posterior.k_eff,
            level = assessment.level,
            reports = posterior.counts.reports,
            "Crowd level estimated"
        );

        FusionResult {
            route: req.route.clone(),
            stop: req.stop.clone(),
            bus_id: req.bus_id.clone(),
            level: assessment.level,
            est_headcount: assessment.est_headcount,
            headcount_ci68: assessment.headcount_ci68,
            remaining_capacity: assessment.remaining_capacity,
            confidence: assessment.confidence,
            counts: posterior.counts,
            window_min,
            prior,
        }
    }

    async fn current_window(
        &self,
        key: &PartitionKey,
        at: DateTime<Utc>,
        window_min: i64,
    ) -> Vec<Report> {
        let Some(since) = at.checked_sub_signed(Duration::minutes(window_min)) else {
            warn!(%at, window_min, "Current window starts out of range, treating it as empty");
            return Vec::new();
        };

        match self.store.query(key, since, at).await {
            Ok(reports) => {
                debug!(count = reports.len(), "Current window fetched");
                reports
            }
            Err(e) => {
                warn!(error = %e, "Current window query failed, treating it as empty");
                Vec::new()
            }
        }
    }
}
