// Boundary validation of backend metric rows
use crate::application::metrics_repository::RawMetricRecord;
use crate::domain::error::MetricsError;
use crate::domain::metric::{MetricRecord, RecordSet};
use crate::domain::period::PeriodKey;
use serde::Deserialize;
use serde_json::Value;

/// What to do with rows that fail validation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedPolicy {
    /// Fail the whole fetch
    #[default]
    Reject,
    /// Drop the bad rows and count them
    Quarantine,
}

pub fn validate_records(
    period: PeriodKey,
    raw: Vec<RawMetricRecord>,
    policy: MalformedPolicy,
) -> Result<RecordSet, MetricsError> {
    let total = raw.len();
    let mut records = Vec::with_capacity(total);
    let mut rejected: Vec<(usize, String)> = Vec::new();

    for (index, row) in raw.into_iter().enumerate() {
        match validate_record(period, row) {
            Ok(record) => records.push(record),
            Err(reason) => rejected.push((index, reason)),
        }
    }

    if let Some((index, reason)) = rejected.first() {
        match policy {
            MalformedPolicy::Reject => {
                tracing::error!(
                    %period,
                    malformed = rejected.len(),
                    total,
                    "Rejecting backend response with malformed records"
                );
                return Err(MetricsError::malformed(format!(
                    "{} of {} records for {} are malformed; first at index {}: {}",
                    rejected.len(),
                    total,
                    period,
                    index,
                    reason
                )));
            }
            MalformedPolicy::Quarantine => {
                for (index, reason) in &rejected {
                    tracing::warn!(%period, index, reason = %reason, "Quarantined malformed record");
                }
            }
        }
    }

    let mut set = RecordSet::new(period, records);
    set.quarantined = rejected.len();
    Ok(set)
}

fn validate_record(period: PeriodKey, row: RawMetricRecord) -> Result<MetricRecord, String> {
    let site_id = match row.site_id {
        Some(Value::String(id)) if !id.trim().is_empty() => id.trim().to_string(),
        Some(Value::Number(n)) if n.is_i64() || n.is_u64() => n.to_string(),
        Some(Value::Null) | None => return Err("missing siteId".to_string()),
        Some(other) => return Err(format!("invalid siteId {}", other)),
    };

    let month = match row.month_number {
        Some(Value::Number(n)) => n
            .as_u64()
            .filter(|m| (1..=12).contains(m))
            .ok_or_else(|| format!("monthNumber {} out of range", n))? as u32,
        Some(Value::Null) | None => return Err("missing monthNumber".to_string()),
        Some(other) => return Err(format!("invalid monthNumber {}", other)),
    };

    if !period.half.contains(month) {
        return Err(format!("month {} is outside {}", month, period));
    }

    let site_name = row
        .site_name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| site_id.clone());

    Ok(MetricRecord {
        site_id,
        site_name,
        month,
        visits: metric_value("visits", row.visits)?,
        dispatches: metric_value("dispatches", row.dispatches)?,
        mass: metric_value("mass", row.mass)?,
        volume: metric_value("volume", row.volume)?,
    })
}

fn metric_value(field: &str, value: Option<Value>) -> Result<Option<f64>, String> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| format!("{} is not representable as a number", field)),
        Some(other) => Err(format!("{} has non-numeric value {}", field, other)),
    }
}
