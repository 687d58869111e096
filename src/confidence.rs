//! Turns a posterior occupancy fraction into user-facing numbers.

use crate::level::fraction_to_level;
use serde::Serialize;

/// How much evidence backs an estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Med,
    High,
}

impl Confidence {
    /// | k_eff      | Confidence |
    /// |------------|------------|
    /// | < 3        | low        |
    /// | < 6        | med        |
    /// | >= 6       | high       |
    pub fn from_k_eff(k_eff: f64) -> Self {
        match k_eff {
            k if k < 3.0 => Confidence::Low,
            k if k < 6.0 => Confidence::Med,
            _ => Confidence::High,
        }
    }
}

/// Level, headcount and uncertainty derived from a posterior.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Assessment {
    pub level: u8,
    pub est_headcount: u32,
    /// Roughly one standard deviation around `est_headcount`.
    pub headcount_ci68: [u32; 2],
    pub remaining_capacity: u32,
    pub confidence: Confidence,
}

fn headcount(fraction: f64, capacity: u32) -> u32 {
    (fraction.clamp(0.0, 1.0) * capacity as f64).round() as u32
}

/// Standard error of a weighted proportion under a normal approximation.
pub fn sigma(mu: f64, k_eff: f64) -> f64 {
    let mu = mu.clamp(0.0, 1.0);
    (mu * (1.0 - mu) / (k_eff.max(0.0) + 1.0)).sqrt()
}

pub fn assess(mu: f64, k_eff: f64, capacity: u32) -> Assessment {
    let mu = mu.clamp(0.0, 1.0);
    let est_headcount = headcount(mu, capacity);
    let s = sigma(mu, k_eff);

    Assessment {
        level: fraction_to_level(mu),
        est_headcount,
        headcount_ci68: [headcount(mu - s, capacity), headcount(mu + s, capacity)],
        remaining_capacity: capacity.saturating_sub(est_headcount),
        confidence: Confidence::from_k_eff(k_eff),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_boundaries() {
        assert_eq!(Confidence::from_k_eff(0.0), Confidence::Low);
        assert_eq!(Confidence::from_k_eff(2.99), Confidence::Low);
        assert_eq!(Confidence::from_k_eff(3.0), Confidence::Med);
        assert_eq!(Confidence::from_k_eff(5.99), Confidence::Med);
        assert_eq!(Confidence::from_k_eff(6.0), Confidence::High);
    }

    #[test]
    fn test_confidence_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Confidence::Med).unwrap(), "\"med\"");
    }

    #[test]
    fn test_assess_default_prior() {
        let a = assess(0.35, 2.0, 60);

        assert_eq!(a.level, 2);
        assert_eq!(a.est_headcount, 21);
        assert_eq!(a.remaining_capacity, 39);
        assert_eq!(a.confidence, Confidence::Low);
        // sigma = sqrt(0.35 * 0.65 / 3) ~ 0.2754
        assert_eq!(a.headcount_ci68, [4, 38]);
    }

    #[test]
    fn test_interval_shrinks_with_evidence() {
        let weak = assess(0.5, 1.0, 60);
        let strong = assess(0.5, 20.0, 60);

        let width = |a: &Assessment| a.headcount_ci68[1] - a.headcount_ci68[0];
        assert!(width(&strong) < width(&weak));
    }

    #[test]
    fn test_extremes_stay_in_bounds() {
        for mu in [0.0, 1.0, -0.5, 1.5] {
            for k in [0.0, 0.5, 100.0] {
                let a = assess(mu, k, 60);
                assert!(a.est_headcount <= 60);
                assert!(a.headcount_ci68[0] <= a.headcount_ci68[1]);
                assert!(a.headcount_ci68[1] <= 60);
            }
        }
        assert_eq!(assess(1.0, 10.0, 60).remaining_capacity, 0);
    }
}
