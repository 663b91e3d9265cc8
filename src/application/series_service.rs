// Series service - Use case for building grouped dashboard series
use crate::application::aggregation::{build_grouped_series, AggregationOptions};
use crate::application::period_cache::PeriodCache;
use crate::domain::error::MetricsError;
use crate::domain::metric::{Metric, RecordSet};
use crate::domain::period::PeriodKey;
use crate::domain::series::SeriesReport;
use std::sync::Arc;

#[derive(Clone)]
pub struct SeriesService {
    cache: PeriodCache,
    options: AggregationOptions,
}

impl SeriesService {
    pub fn new(cache: PeriodCache, options: AggregationOptions) -> Self {
        Self { cache, options }
    }

    pub async fn get_grouped_series(
        &self,
        metric: Metric,
        period: PeriodKey,
        force_refresh: bool,
    ) -> Result<SeriesReport, MetricsError> {
        let record_set = self.cache.fetch(period, force_refresh).await?;
        let series = build_grouped_series(&record_set.records, metric, period, &self.options);

        tracing::debug!(
            %period,
            %metric,
            force_refresh,
            sites = series.sedes.len(),
            "Built grouped series"
        );

        Ok(SeriesReport {
            metric,
            period,
            series,
            quarantined: record_set.quarantined,
            fetched_at: record_set.fetched_at,
        })
    }

    /// Forget the cached records for a period. Returns whether anything was cached.
    pub fn invalidate(&self, period: PeriodKey) -> bool {
        self.cache.invalidate(period)
    }

    /// Cached records for a period, without touching the backend
    pub fn cached(&self, period: PeriodKey) -> Option<Arc<RecordSet>> {
        self.cache.get(period)
    }

    pub fn cached_periods(&self) -> usize {
        self.cache.len()
    }

    /// Forget every cached period. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        self.cache.clear()
    }
}
