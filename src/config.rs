//! Engine tuning knobs.
//!
//! [`FusionConfig`] is built once at startup, usually from the process
//! environment (optionally primed from a `.env` file), and then shared
//! read-only with every estimate.

use anyhow::{Context, Result, bail};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

/// Longest window, in minutes, a current or lookback query may span.
pub const MAX_WINDOW_MIN: i64 = 24 * 60;
/// Longest history the prior may look back over.
pub const MAX_LOOKBACK_WEEKS: u32 = 52;

/// Per-source trust, recency and outlier weights used by the fusion fold.
#[derive(Debug, Clone, PartialEq)]
pub struct Weights {
    pub w_driver: f64,
    pub w_rider: f64,
    /// Recency decay constant in minutes.
    pub tau_min: f64,
    pub outlier_delta: f64,
    pub bus_bonus: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            w_driver: 4.0,
            w_rider: 1.0,
            tau_min: 10.0,
            outlier_delta: 0.35,
            bus_bonus: 1.5,
        }
    }
}

/// Immutable engine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct FusionConfig {
    /// Headcount of a full vehicle.
    pub capacity: u32,
    pub prior_mu0_default: f64,
    pub prior_k0_default: f64,
    pub prior_lookback_weeks: u32,
    pub prior_half_window_min: i64,
    pub prior_k_max: f64,
    /// Default width of the current-report window.
    pub window_min: i64,
    /// Offset applied before comparing weekdays.
    pub utc_offset_minutes: i32,
    /// Deadline for the whole store fan-out of one estimate.
    pub store_timeout: Duration,
    pub weights: Weights,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            capacity: 60,
            prior_mu0_default: 0.35,
            prior_k0_default: 2.0,
            prior_lookback_weeks: 4,
            prior_half_window_min: 30,
            prior_k_max: 10.0,
            window_min: 15,
            utc_offset_minutes: 0,
            store_timeout: Duration::from_millis(2000),
            weights: Weights::default(),
        }
    }
}

impl FusionConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration from a map of variable names to values.
    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self> {
        Self::from_lookup(|name| vars.get(name).cloned())
    }

    /// Builds the configuration from any variable lookup. Unset variables
    /// keep their defaults; set but unparsable ones are an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();
        let dw = Weights::default();

        let cfg = Self {
            capacity: parse_var(&lookup, "CAPACITY", d.capacity)?,
            prior_mu0_default: parse_var(&lookup, "PRIOR_MU0_DEFAULT", d.prior_mu0_default)?,
            prior_k0_default: parse_var(&lookup, "PRIOR_K0_DEFAULT", d.prior_k0_default)?,
            prior_lookback_weeks: parse_var(
                &lookup,
                "PRIOR_LOOKBACK_WEEKS",
                d.prior_lookback_weeks,
            )?,
            prior_half_window_min: parse_var(
                &lookup,
                "PRIOR_HALF_WINDOW_MIN",
                d.prior_half_window_min,
            )?,
            prior_k_max: parse_var(&lookup, "PRIOR_K_MAX", d.prior_k_max)?,
            window_min: parse_var(&lookup, "WINDOW_MIN", d.window_min)?,
            utc_offset_minutes: parse_var(&lookup, "UTC_OFFSET_MINUTES", d.utc_offset_minutes)?,
            store_timeout: Duration::from_millis(parse_var(
                &lookup,
                "STORE_TIMEOUT_MS",
                d.store_timeout.as_millis() as u64,
            )?),
            weights: Weights {
                w_driver: parse_var(&lookup, "W_DRIVER", dw.w_driver)?,
                w_rider: parse_var(&lookup, "W_RIDER", dw.w_rider)?,
                tau_min: parse_var(&lookup, "TAU_MIN", dw.tau_min)?,
                outlier_delta: parse_var(&lookup, "OUTLIER_DELTA", dw.outlier_delta)?,
                bus_bonus: parse_var(&lookup, "BUS_BONUS", dw.bus_bonus)?,
            },
        };

        cfg.validate()?;
        Ok(cfg)
    }

    /// Rejects configurations the engine cannot produce sane estimates with.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            bail!("CAPACITY must be positive");
        }
        if !(0.0..=1.0).contains(&self.prior_mu0_default) {
            bail!(
                "PRIOR_MU0_DEFAULT must lie in [0, 1], got {}",
                self.prior_mu0_default
            );
        }
        non_negative_finite("PRIOR_K0_DEFAULT", self.prior_k0_default)?;
        if self.prior_lookback_weeks == 0 || self.prior_lookback_weeks > MAX_LOOKBACK_WEEKS {
            bail!(
                "PRIOR_LOOKBACK_WEEKS must be between 1 and {MAX_LOOKBACK_WEEKS}, got {}",
                self.prior_lookback_weeks
            );
        }
        for (name, value) in [
            ("PRIOR_HALF_WINDOW_MIN", self.prior_half_window_min),
            ("WINDOW_MIN", self.window_min),
        ] {
            if !(0..=MAX_WINDOW_MIN).contains(&value) {
                bail!("{name} must be between 0 and {MAX_WINDOW_MIN}, got {value}");
            }
        }
        if !self.prior_k_max.is_finite() || self.prior_k_max < 2.0 {
            bail!("PRIOR_K_MAX must be a finite number of at least 2, got {}", self.prior_k_max);
        }
        if self.utc_offset_minutes.unsigned_abs() >= 24 * 60 {
            bail!("UTC_OFFSET_MINUTES must be less than a day");
        }

        let w = &self.weights;
        if !w.tau_min.is_finite() || w.tau_min <= 0.0 {
            bail!("TAU_MIN must be a positive finite number, got {}", w.tau_min);
        }
        non_negative_finite("W_DRIVER", w.w_driver)?;
        non_negative_finite("W_RIDER", w.w_rider)?;
        non_negative_finite("OUTLIER_DELTA", w.outlier_delta)?;
        non_negative_finite("BUS_BONUS", w.bus_bonus)?;

        Ok(())
    }
}

fn non_negative_finite(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        bail!("{name} must be a non-negative finite number, got {value}");
    }
    Ok(())
}

fn parse_var<T, F>(lookup: &F, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {name}: '{raw}'")),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_empty_lookup_yields_defaults() {
        let cfg = FusionConfig::from_map(&HashMap::new()).unwrap();
        assert_eq!(cfg, FusionConfig::default());
    }

    #[test]
    fn test_overrides_are_applied() {
        let cfg = FusionConfig::from_map(&vars(&[
            ("CAPACITY", "80"),
            ("W_RIDER", "0.4"),
            ("TAU_MIN", " 5 "),
            ("STORE_TIMEOUT_MS", "250"),
        ]))
        .unwrap();

        assert_eq!(cfg.capacity, 80);
        assert_eq!(cfg.weights.w_rider, 0.4);
        assert_eq!(cfg.weights.w_driver, 4.0);
        assert_eq!(cfg.weights.tau_min, 5.0);
        assert_eq!(cfg.store_timeout, Duration::from_millis(250));
        assert_eq!(cfg.prior_lookback_weeks, 4);
    }

    #[test]
    fn test_blank_value_keeps_default() {
        let cfg = FusionConfig::from_map(&vars(&[("CAPACITY", "")])).unwrap();
        assert_eq!(cfg.capacity, 60);
    }

    #[test]
    fn test_unparsable_value_is_an_error() {
        let err = FusionConfig::from_map(&vars(&[("CAPACITY", "lots")])).unwrap_err();
        assert!(err.to_string().contains("CAPACITY"));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(FusionConfig::from_map(&vars(&[("CAPACITY", "0")])).is_err());
        assert!(FusionConfig::from_map(&vars(&[("PRIOR_MU0_DEFAULT", "1.5")])).is_err());
        assert!(FusionConfig::from_map(&vars(&[("TAU_MIN", "0")])).is_err());
        assert!(FusionConfig::from_map(&vars(&[("W_DRIVER", "-1")])).is_err());
        assert!(FusionConfig::from_map(&vars(&[("PRIOR_K_MAX", "1")])).is_err());
        assert!(FusionConfig::from_map(&vars(&[("BUS_BONUS", "NaN")])).is_err());
        assert!(FusionConfig::from_map(&vars(&[("PRIOR_K0_DEFAULT", "NaN")])).is_err());
        assert!(FusionConfig::from_map(&vars(&[("UTC_OFFSET_MINUTES", "-2147483648")])).is_err());
    }

    #[test]
    fn test_validation_rejects_infinite_values() {
        for name in ["PRIOR_K0_DEFAULT", "PRIOR_K_MAX", "TAU_MIN", "W_DRIVER", "OUTLIER_DELTA"] {
            let err = FusionConfig::from_map(&vars(&[(name, "inf")])).unwrap_err();
            assert!(err.to_string().contains(name), "{name} accepted inf");
        }
    }

    #[test]
    fn test_validation_bounds_windows() {
        assert!(FusionConfig::from_map(&vars(&[("WINDOW_MIN", "1000000000000")])).is_err());
        assert!(FusionConfig::from_map(&vars(&[("PRIOR_HALF_WINDOW_MIN", "1441")])).is_err());
        assert!(FusionConfig::from_map(&vars(&[("PRIOR_LOOKBACK_WEEKS", "53")])).is_err());
        assert!(FusionConfig::from_map(&vars(&[("WINDOW_MIN", "1440")])).is_ok());
    }
}
