// Chart-ready grouped series
use super::metric::Metric;
use super::period::PeriodKey;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Column name reserved for the month label in every row
pub const MONTH_KEY: &str = "month";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveSite {
    pub id: String,
    pub name: String,
    pub color: String,
}

/// One month of the chart: the label plus one value per active site, keyed by site name
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyRow {
    pub month: String,
    #[serde(flatten)]
    pub values: BTreeMap<String, f64>,
}

#[cfg(test)]
impl MonthlyRow {
    pub fn value(&self, site_name: &str) -> Option<f64> {
        self.values.get(site_name).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedSeries {
    pub data: Vec<MonthlyRow>,
    pub sedes: Vec<ActiveSite>,
    pub months: Vec<String>,
}

#[cfg(test)]
impl GroupedSeries {
    pub fn row(&self, month: &str) -> Option<&MonthlyRow> {
        self.data.iter().find(|r| r.month == month)
    }

    pub fn site_ids(&self) -> Vec<&str> {
        self.sedes.iter().map(|s| s.id.as_str()).collect()
    }
}

/// Response body for a dashboard chart request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesReport {
    pub metric: Metric,
    pub period: PeriodKey,
    #[serde(flatten)]
    pub series: GroupedSeries,
    pub quarantined: usize,
    pub fetched_at: DateTime<Utc>,
}
