// Site metric domain models
use super::error::MetricsError;
use super::period::PeriodKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Metric a dashboard chart can be built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Visits,
    Dispatches,
    Mass,
    Volume,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::Visits,
        Metric::Dispatches,
        Metric::Mass,
        Metric::Volume,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Metric::Visits => "visits",
            Metric::Dispatches => "dispatches",
            Metric::Mass => "mass",
            Metric::Volume => "volume",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = MetricsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                MetricsError::InvalidRequest(format!(
                    "unknown metric '{}', expected one of visits, dispatches, mass, volume",
                    s
                ))
            })
    }
}

/// Validated per-site, per-month metric row
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRecord {
    pub site_id: String,
    pub site_name: String,
    pub month: u32,
    pub visits: Option<f64>,
    pub dispatches: Option<f64>,
    pub mass: Option<f64>,
    pub volume: Option<f64>,
}

impl MetricRecord {
    pub fn value(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Visits => self.visits,
            Metric::Dispatches => self.dispatches,
            Metric::Mass => self.mass,
            Metric::Volume => self.volume,
        }
    }

    /// True when this record shows activity for the metric
    pub fn is_active_for(&self, metric: Metric) -> bool {
        self.value(metric).is_some_and(|v| v > 0.0)
    }
}

#[cfg(test)]
impl MetricRecord {
    pub fn new(site_id: impl Into<String>, site_name: impl Into<String>, month: u32) -> Self {
        Self {
            site_id: site_id.into(),
            site_name: site_name.into(),
            month,
            visits: None,
            dispatches: None,
            mass: None,
            volume: None,
        }
    }

    pub fn with(mut self, metric: Metric, value: f64) -> Self {
        match metric {
            Metric::Visits => self.visits = Some(value),
            Metric::Dispatches => self.dispatches = Some(value),
            Metric::Mass => self.mass = Some(value),
            Metric::Volume => self.volume = Some(value),
        }
        self
    }
}

/// Everything the backend returned for one period, after validation
#[derive(Debug, Clone)]
pub struct RecordSet {
    pub period: PeriodKey,
    pub records: Vec<MetricRecord>,
    /// Records dropped at the backend boundary
    pub quarantined: usize,
    pub fetched_at: DateTime<Utc>,
}

impl RecordSet {
    pub fn new(period: PeriodKey, records: Vec<MetricRecord>) -> Self {
        Self {
            period,
            records,
            quarantined: 0,
            fetched_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_metric() {
        assert_eq!("mass".parse::<Metric>().unwrap(), Metric::Mass);
        assert_eq!(" Visits ".parse::<Metric>().unwrap(), Metric::Visits);
        assert!(matches!(
            "weight".parse::<Metric>(),
            Err(MetricsError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_activity_requires_positive_value() {
        let record = MetricRecord::new("1", "North", 3)
            .with(Metric::Mass, 5.0)
            .with(Metric::Visits, 0.0);

        assert!(record.is_active_for(Metric::Mass));
        assert!(!record.is_active_for(Metric::Visits));
        assert!(!record.is_active_for(Metric::Volume));
    }
}
