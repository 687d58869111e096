//! Deterministic synthetic reports for demos and local testing.
//!
//! Uses `ChaCha8Rng` so a given seed always produces the same reports on
//! every platform.

use crate::level::{MAX_LEVEL, MIN_LEVEL, level_to_fraction};
use crate::report::{PartitionKey, Report, Source};
use chrono::{DateTime, Duration, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const BUS_POOL: &[&str] = &["B1", "B2", "B3", "B4"];

/// Shape of the generated reports.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthParams {
    pub weeks: u32,
    pub per_week: usize,
    pub half_window_min: i64,
    /// Level the reports cluster around; each report is jittered by up to one.
    pub typical_level: i64,
    /// Probability that a report comes from a driver.
    pub driver_share: f64,
    pub capacity: u32,
    pub seed: u64,
}

impl Default for SynthParams {
    fn default() -> Self {
        Self {
            weeks: 4,
            per_week: 6,
            half_window_min: 30,
            typical_level: 3,
            driver_share: 0.3,
            capacity: 60,
            seed: 42,
        }
    }
}

fn draw_report(
    rng: &mut ChaCha8Rng,
    key: &PartitionKey,
    timestamp: DateTime<Utc>,
    params: &SynthParams,
) -> Report {
    let source = if rng.gen_bool(params.driver_share.clamp(0.0, 1.0)) {
        Source::Driver
    } else {
        Source::Rider
    };
    let level = (params.typical_level + rng.gen_range(-1..=1))
        .clamp(MIN_LEVEL as i64, MAX_LEVEL as i64);
    let bus = BUS_POOL[rng.gen_range(0..BUS_POOL.len())];
    let headcount = (level_to_fraction(level) * params.capacity as f64
        + rng.gen_range(-3.0..=3.0))
    .round()
    .clamp(0.0, params.capacity as f64) as u32;

    Report::new(key, source, level, timestamp)
        .with_bus(bus)
        .with_headcount(headcount)
}

/// Reports spread around the same time slot in each of the past
/// `params.weeks` weeks before `anchor`.
pub fn generate_history(
    key: &PartitionKey,
    anchor: DateTime<Utc>,
    params: &SynthParams,
) -> Vec<Report> {
    let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
    let half_secs = params.half_window_min.max(0) * 60;

    let mut reports = Vec::with_capacity(params.weeks as usize * params.per_week);
    for week in 1..=params.weeks as i64 {
        let center = anchor - Duration::weeks(week);
        for _ in 0..params.per_week {
            let ts = center + Duration::seconds(rng.gen_range(-half_secs..=half_secs));
            reports.push(draw_report(&mut rng, key, ts, params));
        }
    }
    reports
}

/// `count` reports spread over the `window_min` minutes before `at`.
pub fn generate_live(
    key: &PartitionKey,
    at: DateTime<Utc>,
    window_min: i64,
    count: usize,
    params: &SynthParams,
) -> Vec<Report> {
    let mut rng = ChaCha8Rng::seed_from_u64(params.seed.wrapping_add(1));
    let window_secs = window_min.max(0) * 60;

    (0..count)
        .map(|_| {
            let ts = at - Duration::seconds(rng.gen_range(0..=window_secs));
            draw_report(&mut rng, key, ts, params)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_same_seed_same_reports() {
        let key = PartitionKey::new("R1", "S1");
        let params = SynthParams::default();

        assert_eq!(
            generate_history(&key, at(), &params),
            generate_history(&key, at(), &params)
        );
    }

    #[test]
    fn test_history_stays_inside_lookback_windows() {
        let key = PartitionKey::new("R1", "S1");
        let params = SynthParams::default();
        let reports = generate_history(&key, at(), &params);

        assert_eq!(reports.len(), 24);
        for r in &reports {
            assert!((1..=4).contains(&r.level));
            assert!(r.headcount.unwrap() <= params.capacity);
            let weeks_back = (at() - r.timestamp + Duration::minutes(30)).num_weeks();
            let center = at() - Duration::weeks(weeks_back);
            assert!((r.timestamp - center).num_minutes().abs() <= 30);
        }
    }

    #[test]
    fn test_live_reports_fall_in_window() {
        let key = PartitionKey::new("R1", "S1");
        let reports = generate_live(&key, at(), 15, 10, &SynthParams::default());

        assert_eq!(reports.len(), 10);
        assert!(
            reports
                .iter()
                .all(|r| r.timestamp <= at() && r.timestamp >= at() - Duration::minutes(15))
        );
    }
}
