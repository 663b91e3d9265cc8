// Repository trait for backend site metrics
use crate::domain::period::PeriodKey;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

/// One row as the backend sends it, before validation.
/// Fields stay loosely typed so malformed rows can be reported instead of failing the decode.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMetricRecord {
    #[serde(default)]
    pub site_id: Option<Value>,
    #[serde(default)]
    pub site_name: Option<String>,
    #[serde(default)]
    pub month_number: Option<Value>,
    #[serde(default)]
    pub visits: Option<Value>,
    #[serde(default)]
    pub dispatches: Option<Value>,
    #[serde(default)]
    pub mass: Option<Value>,
    #[serde(default)]
    pub volume: Option<Value>,
}

#[async_trait]
pub trait SiteMetricsRepository: Send + Sync {
    /// Per-site, per-month metric rows for a reporting period
    async fn fetch_site_metrics(&self, period: PeriodKey) -> anyhow::Result<Vec<RawMetricRecord>>;
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use anyhow::Context;
    use serde_json::json;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::oneshot;

    /// Builds a raw row the way the backend encodes it
    pub fn raw(site_id: &str, site_name: &str, month: u32, metrics: &[(&str, f64)]) -> RawMetricRecord {
        let mut record = RawMetricRecord {
            site_id: Some(json!(site_id)),
            site_name: Some(site_name.to_string()),
            month_number: Some(json!(month)),
            ..Default::default()
        };
        for (name, value) in metrics {
            let value = Some(json!(value));
            match *name {
                "visits" => record.visits = value,
                "dispatches" => record.dispatches = value,
                "mass" => record.mass = value,
                "volume" => record.volume = value,
                other => panic!("unknown metric {}", other),
            }
        }
        record
    }

    /// In-memory backend that counts calls
    #[derive(Default)]
    pub struct FakeRepository {
        records: Mutex<HashMap<PeriodKey, Vec<RawMetricRecord>>>,
        calls: AtomicUsize,
        failing: AtomicBool,
    }

    impl FakeRepository {
        pub fn with_records(period: PeriodKey, records: Vec<RawMetricRecord>) -> Self {
            let repo = Self::default();
            repo.set_records(period, records);
            repo
        }

        pub fn set_records(&self, period: PeriodKey, records: Vec<RawMetricRecord>) {
            self.records.lock().unwrap().insert(period, records);
        }

        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SiteMetricsRepository for FakeRepository {
        async fn fetch_site_metrics(&self, period: PeriodKey) -> anyhow::Result<Vec<RawMetricRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                anyhow::bail!("backend returned status 503");
            }
            Ok(self
                .records
                .lock()
                .unwrap()
                .get(&period)
                .cloned()
                .unwrap_or_default())
        }
    }

    /// Backend whose responses are released by the test, one per call, in call order
    #[derive(Default)]
    pub struct ScriptedRepository {
        pending: Mutex<VecDeque<oneshot::Receiver<Vec<RawMetricRecord>>>>,
        calls: AtomicUsize,
    }

    impl ScriptedRepository {
        /// Queues the response for the next call and returns the handle that releases it
        pub fn script(&self) -> oneshot::Sender<Vec<RawMetricRecord>> {
            let (tx, rx) = oneshot::channel();
            self.pending.lock().unwrap().push_back(rx);
            tx
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SiteMetricsRepository for ScriptedRepository {
        async fn fetch_site_metrics(&self, _period: PeriodKey) -> anyhow::Result<Vec<RawMetricRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let rx = self
                .pending
                .lock()
                .unwrap()
                .pop_front()
                .context("no scripted response left")?;
            Ok(rx.await?)
        }
    }
}
