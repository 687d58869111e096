//! Crowd reports and the keys they are stored under.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, de};
use std::fmt;

/// Who filed a report. Drivers are trusted more than riders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Driver,
    Rider,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Driver => f.write_str("driver"),
            Source::Rider => f.write_str("rider"),
        }
    }
}

impl std::str::FromStr for Source {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "driver" => Ok(Source::Driver),
            "rider" => Ok(Source::Rider),
            other => Err(anyhow::anyhow!("unknown report source '{other}'")),
        }
    }
}

/// A single occupancy observation for a route/stop pair.
///
/// `level` is kept as a raw integer: stores may hand back values outside
/// 1..=4 and those are resolved by [`crate::level::level_to_fraction`].
/// Fractional or quoted numeric levels are rounded on decode.
/// `headcount` is informational and never enters the fusion math.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub route: String,
    pub stop: String,
    #[serde(default)]
    pub bus_id: Option<String>,
    pub source: Source,
    #[serde(deserialize_with = "lenient_level")]
    pub level: i64,
    #[serde(default)]
    pub headcount: Option<u32>,
    pub timestamp: DateTime<Utc>,
}

impl Report {
    pub fn new(
        key: &PartitionKey,
        source: Source,
        level: i64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            route: key.route.clone(),
            stop: key.stop.clone(),
            bus_id: None,
            source,
            level,
            headcount: None,
            timestamp,
        }
    }

    pub fn with_bus(mut self, bus_id: &str) -> Self {
        self.bus_id = Some(bus_id.to_string());
        self
    }

    pub fn with_headcount(mut self, headcount: u32) -> Self {
        self.headcount = Some(headcount);
        self
    }

    pub fn key(&self) -> PartitionKey {
        PartitionKey::new(&self.route, &self.stop)
    }

    pub fn belongs_to(&self, key: &PartitionKey) -> bool {
        self.route == key.route && self.stop == key.stop
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawLevel {
    Int(i64),
    Float(f64),
    Text(String),
}

/// Accepts `3`, `2.5` and `"4"`; anything non-numeric is an error.
fn lenient_level<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = match RawLevel::deserialize(deserializer)? {
        RawLevel::Int(level) => return Ok(level),
        RawLevel::Float(level) => level,
        RawLevel::Text(raw) => raw
            .trim()
            .parse::<f64>()
            .map_err(|_| <D::Error as de::Error>::custom(format!("invalid level '{raw}'")))?,
    };
    if !value.is_finite() {
        return Err(<D::Error as de::Error>::custom(format!("invalid level '{value}'")));
    }
    Ok(value.round() as i64)
}

/// The (route, stop) pair reports are partitioned by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartitionKey {
    pub route: String,
    pub stop: String,
}

impl PartitionKey {
    pub fn new(route: &str, stop: &str) -> Self {
        Self {
            route: route.to_string(),
            stop: stop.to_string(),
        }
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.route, self.stop)
    }
}
