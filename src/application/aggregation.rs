// Aggregation pipeline - Pivots per-site, per-month records into a chart series
use crate::domain::metric::{Metric, MetricRecord};
use crate::domain::palette::{ColorRegistry, ColorStrategy, Palette};
use crate::domain::period::{MonthLocale, PeriodKey};
use crate::domain::series::{ActiveSite, GroupedSeries, MonthlyRow, MONTH_KEY};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// Presentation knobs for a pipeline run
#[derive(Debug, Clone, Default)]
pub struct AggregationOptions {
    pub palette: Palette,
    pub color_strategy: ColorStrategy,
    pub month_locale: MonthLocale,
    /// Shared by every run when `color_strategy` is `Registry`
    pub registry: Arc<ColorRegistry>,
}

pub fn build_grouped_series(
    records: &[MetricRecord],
    metric: Metric,
    period: PeriodKey,
    options: &AggregationOptions,
) -> GroupedSeries {
    let sedes = active_sites(records, metric, options);
    let axis = month_axis(period, options.month_locale);
    let data = pivot(records, metric, &sedes, &axis);

    GroupedSeries {
        data,
        sedes,
        months: axis.into_iter().map(|(_, label)| label).collect(),
    }
}

/// Sites with at least one positive value for the metric, in first-seen order,
/// with unique display names and assigned colors
pub fn active_sites(
    records: &[MetricRecord],
    metric: Metric,
    options: &AggregationOptions,
) -> Vec<ActiveSite> {
    let active: HashSet<&str> = records
        .iter()
        .filter(|r| r.is_active_for(metric))
        .map(|r| r.site_id.as_str())
        .collect();

    let mut seen = HashSet::new();
    let ordered: Vec<&MetricRecord> = records
        .iter()
        .filter(|r| active.contains(r.site_id.as_str()) && seen.insert(r.site_id.as_str()))
        .collect();

    let colors = options.palette.assign(
        options.color_strategy,
        &options.registry,
        ordered.iter().map(|r| r.site_id.as_str()),
    );

    let mut taken: HashSet<String> = HashSet::from([MONTH_KEY.to_string()]);
    ordered
        .into_iter()
        .zip(colors)
        .map(|(record, color)| ActiveSite {
            id: record.site_id.clone(),
            name: unique_name(&mut taken, record),
            color,
        })
        .collect()
}

/// Display name for the record's site that no earlier site already uses:
/// the plain name, then `"<name> (<id>)"`, then that with a `#n` counter
fn unique_name(taken: &mut HashSet<String>, record: &MetricRecord) -> String {
    if taken.insert(record.site_name.clone()) {
        return record.site_name.clone();
    }

    let qualified = format!("{} ({})", record.site_name, record.site_id);
    let mut name = qualified.clone();
    let mut counter = 2;
    while !taken.insert(name.clone()) {
        name = format!("{} #{}", qualified, counter);
        counter += 1;
    }
    name
}

/// Month numbers and labels of the period's half-year, in calendar order
pub fn month_axis(period: PeriodKey, locale: MonthLocale) -> Vec<(u32, String)> {
    period
        .months()
        .into_iter()
        .map(|m| (m.number_from_month(), locale.label(m).to_string()))
        .collect()
}

/// One row per axis month with a value for every active site, 0 when no record exists
pub fn pivot(
    records: &[MetricRecord],
    metric: Metric,
    sites: &[ActiveSite],
    axis: &[(u32, String)],
) -> Vec<MonthlyRow> {
    // First record wins when the backend repeats a site-month pair
    let mut lookup: HashMap<(&str, u32), f64> = HashMap::new();
    for record in records {
        lookup
            .entry((record.site_id.as_str(), record.month))
            .or_insert_with(|| record.value(metric).unwrap_or(0.0));
    }

    axis.iter()
        .map(|(month, label)| {
            let values: BTreeMap<String, f64> = sites
                .iter()
                .map(|site| {
                    let value = lookup
                        .get(&(site.id.as_str(), *month))
                        .copied()
                        .unwrap_or(0.0);
                    (site.name.clone(), value)
                })
                .collect();
            MonthlyRow {
                month: label.clone(),
                values,
            }
        })
        .collect()
}
