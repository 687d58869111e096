//! Weekday-conditioned historical baseline.
//!
//! The prior looks at the same time slot on the same weekday over the past
//! few weeks and turns those reports into a mean occupancy fraction `mu0`
//! plus a pseudo-count `k0` saying how much that history should weigh
//! against fresh reports.

use crate::config::FusionConfig;
use crate::level::level_to_fraction;
use crate::report::{PartitionKey, Report};
use crate::store::ReportStore;
use chrono::{DateTime, Datelike, Duration, Utc, Weekday};
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Minimum pseudo-count for a prior built from history.
pub const MIN_PRIOR_K: f64 = 2.0;

/// Historical baseline used to seed the fusion fold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prior {
    pub mu0: f64,
    pub k0: f64,
}

impl Prior {
    /// The configured prior used when no usable history exists.
    pub fn fallback(cfg: &FusionConfig) -> Self {
        Self {
            mu0: cfg.prior_mu0_default,
            k0: cfg.prior_k0_default,
        }
    }
}

/// Time windows `[at - i weeks - half, at - i weeks + half]` for `i = 1..=weeks`.
///
/// Windows whose bounds fall outside the representable time range are
/// dropped.
pub fn lookback_windows(
    at: DateTime<Utc>,
    weeks: u32,
    half_window_min: i64,
) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    let Some(half) = Duration::try_minutes(half_window_min) else {
        return Vec::new();
    };
    (1..=i64::from(weeks))
        .filter_map(|i| {
            let center = at.checked_sub_signed(Duration::try_weeks(i)?)?;
            Some((
                center.checked_sub_signed(half)?,
                center.checked_add_signed(half)?,
            ))
        })
        .collect()
}

/// Weekday of `ts` after shifting it by `offset_minutes`.
pub fn local_weekday(ts: DateTime<Utc>, offset_minutes: i32) -> Weekday {
    ts.checked_add_signed(Duration::minutes(i64::from(offset_minutes)))
        .unwrap_or(ts)
        .weekday()
}

/// Builds a prior from already-fetched history.
///
/// Only reports on the same (local) weekday as `at` count. `k0` is the number
/// of such reports clamped to `[2, prior_k_max]`.
pub fn prior_from_history(history: &[Report], at: DateTime<Utc>, cfg: &FusionConfig) -> Prior {
    let weekday = local_weekday(at, cfg.utc_offset_minutes);

    let mut fractions: Vec<f64> = history
        .iter()
        .filter(|r| local_weekday(r.timestamp, cfg.utc_offset_minutes) == weekday)
        .map(|r| level_to_fraction(r.level))
        .collect();

    if fractions.is_empty() {
        return Prior::fallback(cfg);
    }

    // Summation order must not depend on store order.
    fractions.sort_by(f64::total_cmp);
    let mu0 = fractions.iter().sum::<f64>() / fractions.len() as f64;
    let k0 = (fractions.len() as f64).clamp(MIN_PRIOR_K, cfg.prior_k_max);

    Prior { mu0, k0 }
}

/// Queries the lookback windows concurrently and builds the prior.
///
/// Any failed window query makes the whole prior fall back to the configured
/// defaults; a partial history is never used. Dropping the returned future
/// aborts the queries still in flight.
#[tracing::instrument(skip_all, fields(key = %key, at = %at))]
pub async fn estimate_prior(
    store: Arc<dyn ReportStore>,
    key: &PartitionKey,
    at: DateTime<Utc>,
    cfg: &FusionConfig,
) -> Prior {
    let windows = lookback_windows(at, cfg.prior_lookback_weeks, cfg.prior_half_window_min);

    let mut tasks = JoinSet::new();
    for (since, until) in windows {
        let store = store.clone();
        let key = key.clone();
        tasks.spawn(async move { store.query(&key, since, until).await });
    }

    let mut history = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(reports)) => history.extend(reports),
            Ok(Err(e)) => {
                warn!(error = %e, "Historical report query failed");
                return Prior::fallback(cfg);
            }
            Err(e) => {
                warn!(error = %e, "Historical report query task failed");
                return Prior::fallback(cfg);
            }
        }
    }

    let prior = prior_from_history(&history, at, cfg);
    debug!(
        fetched = history.len(),
        mu0 = prior.mu0,
        k0 = prior.k0,
        "Prior estimated"
    );
    prior
}
