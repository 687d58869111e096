//! Time-decayed, outlier-robust fusion of current reports with the prior.
//!
//! Reports are folded into a weighted mean seeded with `k0` pseudo-reports at
//! `mu0`. Each report's weight is its source trust times an exponential
//! recency decay, boosted when it comes from the bus being asked about.
//! Reports far from the mean accumulated so far are softly down-weighted.
//!
//! The outlier test depends on the partial mean, so the fold is order
//! dependent. Reports are always folded in ascending timestamp order, with
//! ties broken on source, level and bus id, so the result does not depend on
//! the order the store returned them in.

use crate::config::Weights;
use crate::level::level_to_fraction;
use crate::prior::Prior;
use crate::report::{Report, Source};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Multiplier applied to the weight of a report flagged as an outlier.
pub const OUTLIER_PENALTY: f64 = 0.6;

/// Number of reports folded in, by source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportCounts {
    pub reports: usize,
    pub driver: usize,
    pub rider: usize,
}

impl ReportCounts {
    fn record(&mut self, source: Source) {
        self.reports += 1;
        match source {
            Source::Driver => self.driver += 1,
            Source::Rider => self.rider += 1,
        }
    }
}

/// Posterior occupancy after folding in the current window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Posterior {
    /// Occupancy fraction in `[0, 1]`.
    pub mu: f64,
    /// Accumulated weight, prior included.
    pub k_eff: f64,
    pub counts: ReportCounts,
}

/// Running state of the fold.
#[derive(Debug, Clone, Copy)]
struct Accumulator {
    num: f64,
    den: f64,
    fallback: f64,
}

impl Accumulator {
    fn seeded(prior: Prior) -> Self {
        let k0 = prior.k0.max(0.0);
        Self {
            num: k0 * prior.mu0,
            den: k0,
            fallback: prior.mu0,
        }
    }

    fn mean(&self) -> f64 {
        if self.den > 0.0 {
            self.num / self.den
        } else {
            self.fallback
        }
    }

    fn add(&mut self, fraction: f64, weight: f64) {
        self.num += weight * fraction;
        self.den += weight;
    }
}

/// Sorts reports into the canonical fold order.
pub fn sort_canonical(reports: &mut [Report]) {
    reports.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.source.cmp(&b.source))
            .then_with(|| a.level.cmp(&b.level))
            .then_with(|| a.bus_id.cmp(&b.bus_id))
    });
}

/// Recency decay `exp(-minutes_ago / tau)`. Reports from the future count as
/// fresh.
pub fn recency_decay(at: DateTime<Utc>, ts: DateTime<Utc>, tau_min: f64) -> f64 {
    let minutes_ago = ((at - ts).num_milliseconds() as f64 / 60_000.0).max(0.0);
    (-minutes_ago / tau_min).exp()
}

/// Weight a report gets before the outlier test.
pub fn base_weight(
    report: &Report,
    at: DateTime<Utc>,
    bus_id: Option<&str>,
    weights: &Weights,
) -> f64 {
    let trust = match report.source {
        Source::Driver => weights.w_driver,
        Source::Rider => weights.w_rider,
    };
    let bonus = match (bus_id, report.bus_id.as_deref()) {
        (Some(wanted), Some(seen)) if wanted == seen => weights.bus_bonus,
        _ => 1.0,
    };

    trust * recency_decay(at, report.timestamp, weights.tau_min) * bonus
}

/// Folds `reports` into `prior`.
///
/// `reports` is sorted into canonical order first.
pub fn fuse(
    mut reports: Vec<Report>,
    at: DateTime<Utc>,
    bus_id: Option<&str>,
    prior: Prior,
    weights: &Weights,
) -> Posterior {
    sort_canonical(&mut reports);

    let mut acc = Accumulator::seeded(prior);
    let mut counts = ReportCounts::default();

    for report in &reports {
        let fraction = level_to_fraction(report.level);
        let mut weight = base_weight(report, at, bus_id, weights);

        if (fraction - acc.mean()).abs() > weights.outlier_delta {
            weight *= OUTLIER_PENALTY;
        }

        acc.add(fraction, weight);
        counts.record(report.source);
    }

    Posterior {
        mu: acc.mean().clamp(0.0, 1.0),
        k_eff: acc.den,
        counts,
    }
}
