// Period cache - Single-flight store of validated record sets per reporting period
use crate::application::metrics_repository::SiteMetricsRepository;
use crate::application::validation::{validate_records, MalformedPolicy};
use crate::domain::error::MetricsError;
use crate::domain::metric::RecordSet;
use crate::domain::period::PeriodKey;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub type FetchResult = Result<Arc<RecordSet>, MetricsError>;

type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

struct CachedEntry {
    ticket: u64,
    records: Arc<RecordSet>,
}

struct InFlight {
    ticket: u64,
    fetch: SharedFetch,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<PeriodKey, CachedEntry>,
    in_flight: HashMap<PeriodKey, InFlight>,
    /// Highest ticket issued when the period was last invalidated
    fences: HashMap<PeriodKey, u64>,
}

impl CacheState {
    /// A result may be stored unless a newer one is already cached
    /// or the period was invalidated after its fetch started
    fn accepts(&self, period: PeriodKey, ticket: u64) -> bool {
        let fenced = self.fences.get(&period).is_some_and(|fence| ticket <= *fence);
        let superseded = self
            .entries
            .get(&period)
            .is_some_and(|entry| entry.ticket > ticket);
        !fenced && !superseded
    }
}

struct Inner {
    repository: Arc<dyn SiteMetricsRepository>,
    policy: MalformedPolicy,
    state: Mutex<CacheState>,
    last_ticket: AtomicU64,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn issue_ticket(&self) -> u64 {
        self.last_ticket.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn load(self: Arc<Self>, period: PeriodKey, ticket: u64) -> FetchResult {
        tracing::debug!(%period, ticket, "Fetching site metrics from backend");

        let outcome = match self.repository.fetch_site_metrics(period).await {
            Ok(raw) => validate_records(period, raw, self.policy).map(Arc::new),
            Err(e) => {
                tracing::error!(%period, ticket, error = %format!("{:#}", e), "Backend fetch failed");
                Err(MetricsError::data_unavailable())
            }
        };

        let mut state = self.state();
        if state
            .in_flight
            .get(&period)
            .is_some_and(|flight| flight.ticket == ticket)
        {
            state.in_flight.remove(&period);
        }

        if let Ok(records) = &outcome {
            if state.accepts(period, ticket) {
                state.entries.insert(
                    period,
                    CachedEntry {
                        ticket,
                        records: Arc::clone(records),
                    },
                );
                tracing::debug!(
                    %period,
                    ticket,
                    records = records.records.len(),
                    quarantined = records.quarantined,
                    "Cached site metrics"
                );
            } else {
                tracing::debug!(%period, ticket, "Discarding superseded fetch result");
            }
        }

        outcome
    }
}

/// In-process cache of backend record sets keyed by reporting period.
///
/// Entries never expire. Callers that know the backend changed pass
/// `force_refresh` or call [`PeriodCache::invalidate`].
#[derive(Clone)]
pub struct PeriodCache {
    inner: Arc<Inner>,
}

impl PeriodCache {
    pub fn new(repository: Arc<dyn SiteMetricsRepository>, policy: MalformedPolicy) -> Self {
        Self {
            inner: Arc::new(Inner {
                repository,
                policy,
                state: Mutex::new(CacheState::default()),
                last_ticket: AtomicU64::new(0),
            }),
        }
    }

    /// Cached record set for the period. Never performs I/O.
    pub fn get(&self, period: PeriodKey) -> Option<Arc<RecordSet>> {
        self.inner
            .state()
            .entries
            .get(&period)
            .map(|entry| Arc::clone(&entry.records))
    }

    /// Stores a record set under its own period, superseding in-flight fetches
    #[cfg(test)]
    pub fn put(&self, records: RecordSet) -> Arc<RecordSet> {
        let period = records.period;
        let records = Arc::new(records);
        let mut state = self.inner.state();
        let ticket = self.inner.issue_ticket();
        state.entries.insert(
            period,
            CachedEntry {
                ticket,
                records: Arc::clone(&records),
            },
        );
        records
    }

    /// Drops the entry for the period. Fetches already in flight will not repopulate it.
    /// Returns whether an entry was present.
    pub fn invalidate(&self, period: PeriodKey) -> bool {
        let mut state = self.inner.state();
        let fence = self.inner.last_ticket.load(Ordering::SeqCst);
        state.fences.insert(period, fence);
        state.in_flight.remove(&period);
        let removed = state.entries.remove(&period).is_some();
        tracing::debug!(%period, fence, removed, "Invalidated period");
        removed
    }

    /// Drops every entry. Returns how many were cached.
    pub fn clear(&self) -> usize {
        let mut state = self.inner.state();
        let fence = self.inner.last_ticket.load(Ordering::SeqCst);
        let periods: Vec<PeriodKey> = state
            .entries
            .keys()
            .chain(state.in_flight.keys())
            .copied()
            .collect();
        for period in periods {
            state.fences.insert(period, fence);
        }
        let cleared = state.entries.len();
        state.entries.clear();
        state.in_flight.clear();
        cleared
    }

    pub fn len(&self) -> usize {
        self.inner.state().entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record set for the period.
    ///
    /// Without `force_refresh` a cached entry is returned as is, and a caller
    /// that misses while a fetch for the same period is running shares that
    /// fetch. With `force_refresh` a new backend call is always made.
    pub async fn fetch(&self, period: PeriodKey, force_refresh: bool) -> FetchResult {
        let fetch = {
            let mut state = self.inner.state();

            if !force_refresh {
                if let Some(entry) = state.entries.get(&period) {
                    tracing::trace!(%period, "Period cache hit");
                    return Ok(Arc::clone(&entry.records));
                }
            }

            let joined = if force_refresh {
                None
            } else {
                state.in_flight.get(&period).map(|flight| {
                    tracing::debug!(%period, ticket = flight.ticket, "Joining in-flight fetch");
                    flight.fetch.clone()
                })
            };

            match joined {
                Some(fetch) => fetch,
                None => self.start_fetch(&mut state, period),
            }
        };

        fetch.await
    }

    fn start_fetch(&self, state: &mut CacheState, period: PeriodKey) -> SharedFetch {
        let ticket = self.inner.issue_ticket();
        let fetch = Arc::clone(&self.inner).load(period, ticket).boxed().shared();
        state.in_flight.insert(
            period,
            InFlight {
                ticket,
                fetch: fetch.clone(),
            },
        );
        fetch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::metrics_repository::testing::{raw, FakeRepository, ScriptedRepository};
    use crate::domain::metric::Metric;
    use crate::domain::period::HalfYear;

    fn h1() -> PeriodKey {
        PeriodKey::new(2024, HalfYear::First)
    }

    fn mass_of_first(set: &RecordSet) -> Option<f64> {
        set.records.first().and_then(|r| r.value(Metric::Mass))
    }

    #[tokio::test]
    async fn test_get_never_fetches() {
        let repo = Arc::new(FakeRepository::default());
        let cache = PeriodCache::new(repo.clone(), MalformedPolicy::Reject);

        assert!(cache.get(h1()).is_none());
        assert_eq!(repo.calls(), 0);
    }

    #[tokio::test]
    async fn test_second_fetch_hits_cache() {
        let repo = Arc::new(FakeRepository::with_records(
            h1(),
            vec![raw("A", "North", 3, &[("mass", 5.0)])],
        ));
        let cache = PeriodCache::new(repo.clone(), MalformedPolicy::Reject);

        let first = cache.fetch(h1(), false).await.unwrap();
        let second = cache.fetch(h1(), false).await.unwrap();

        assert_eq!(repo.calls(), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(cache.get(h1()).is_some());
    }

    #[tokio::test]
    async fn test_force_refresh_overwrites_entry() {
        let repo = Arc::new(FakeRepository::with_records(
            h1(),
            vec![raw("A", "North", 3, &[("mass", 5.0)])],
        ));
        let cache = PeriodCache::new(repo.clone(), MalformedPolicy::Reject);
        cache.fetch(h1(), false).await.unwrap();

        repo.set_records(h1(), vec![raw("A", "North", 3, &[("mass", 9.0)])]);
        let stale = cache.fetch(h1(), false).await.unwrap();
        assert_eq!(mass_of_first(&stale), Some(5.0));

        let refreshed = cache.fetch(h1(), true).await.unwrap();
        assert_eq!(repo.calls(), 2);
        assert_eq!(mass_of_first(&refreshed), Some(9.0));
        assert_eq!(mass_of_first(&cache.get(h1()).unwrap()), Some(9.0));
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let repo = Arc::new(FakeRepository::default());
        repo.set_failing(true);
        let cache = PeriodCache::new(repo.clone(), MalformedPolicy::Reject);

        let err = cache.fetch(h1(), false).await.unwrap_err();
        assert_eq!(err, MetricsError::data_unavailable());
        assert!(cache.get(h1()).is_none());

        repo.set_failing(false);
        cache.fetch(h1(), false).await.unwrap();
        assert_eq!(repo.calls(), 2);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_entry() {
        let repo = Arc::new(FakeRepository::with_records(
            h1(),
            vec![raw("A", "North", 3, &[("mass", 5.0)])],
        ));
        let cache = PeriodCache::new(repo.clone(), MalformedPolicy::Reject);
        cache.fetch(h1(), false).await.unwrap();

        repo.set_failing(true);
        assert!(cache.fetch(h1(), true).await.is_err());
        assert_eq!(mass_of_first(&cache.get(h1()).unwrap()), Some(5.0));
    }

    #[tokio::test]
    async fn test_concurrent_misses_share_one_fetch() {
        let repo = Arc::new(ScriptedRepository::default());
        let release = repo.script();
        let cache = PeriodCache::new(repo.clone(), MalformedPolicy::Reject);

        let mut first = Box::pin(cache.fetch(h1(), false));
        let mut second = Box::pin(cache.fetch(h1(), false));
        assert!(futures::poll!(&mut first).is_pending());
        assert!(futures::poll!(&mut second).is_pending());

        release
            .send(vec![raw("A", "North", 3, &[("mass", 5.0)])])
            .unwrap();
        let (first, second) = tokio::join!(first, second);

        assert_eq!(repo.calls(), 1);
        assert!(Arc::ptr_eq(&first.unwrap(), &second.unwrap()));
    }

    #[tokio::test]
    async fn test_miss_joins_in_flight_forced_refresh() {
        let repo = Arc::new(ScriptedRepository::default());
        let release = repo.script();
        let cache = PeriodCache::new(repo.clone(), MalformedPolicy::Reject);

        let mut forced = Box::pin(cache.fetch(h1(), true));
        assert!(futures::poll!(&mut forced).is_pending());
        let mut joined = Box::pin(cache.fetch(h1(), false));
        assert!(futures::poll!(&mut joined).is_pending());

        release
            .send(vec![raw("A", "North", 3, &[("mass", 5.0)])])
            .unwrap();
        let (forced, joined) = tokio::join!(forced, joined);

        assert_eq!(repo.calls(), 1);
        assert!(Arc::ptr_eq(&forced.unwrap(), &joined.unwrap()));
        assert_eq!(mass_of_first(&cache.get(h1()).unwrap()), Some(5.0));
    }

    #[tokio::test]
    async fn test_stale_fetch_does_not_overwrite_newer_result() {
        let repo = Arc::new(ScriptedRepository::default());
        let old_response = repo.script();
        let new_response = repo.script();
        let cache = PeriodCache::new(repo.clone(), MalformedPolicy::Reject);

        let mut stale = Box::pin(cache.fetch(h1(), false));
        assert!(futures::poll!(&mut stale).is_pending());

        new_response
            .send(vec![raw("A", "North", 3, &[("mass", 9.0)])])
            .unwrap();
        let fresh = cache.fetch(h1(), true).await.unwrap();
        assert_eq!(mass_of_first(&fresh), Some(9.0));

        old_response
            .send(vec![raw("A", "North", 3, &[("mass", 5.0)])])
            .unwrap();
        let stale = stale.await.unwrap();
        assert_eq!(mass_of_first(&stale), Some(5.0));

        assert_eq!(repo.calls(), 2);
        assert_eq!(mass_of_first(&cache.get(h1()).unwrap()), Some(9.0));
    }

    #[tokio::test]
    async fn test_invalidate_blocks_in_flight_repopulation() {
        let repo = Arc::new(ScriptedRepository::default());
        let response = repo.script();
        let cache = PeriodCache::new(repo.clone(), MalformedPolicy::Reject);

        let mut pending = Box::pin(cache.fetch(h1(), false));
        assert!(futures::poll!(&mut pending).is_pending());

        assert!(!cache.invalidate(h1()));
        response
            .send(vec![raw("A", "North", 3, &[("mass", 5.0)])])
            .unwrap();
        assert!(pending.await.is_ok());

        assert!(cache.get(h1()).is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_put_and_invalidate() {
        let repo = Arc::new(FakeRepository::default());
        let cache = PeriodCache::new(repo.clone(), MalformedPolicy::Reject);

        cache.put(RecordSet::new(h1(), Vec::new()));
        assert_eq!(cache.len(), 1);
        cache.fetch(h1(), false).await.unwrap();
        assert_eq!(repo.calls(), 0);

        assert!(cache.invalidate(h1()));
        cache.fetch(h1(), false).await.unwrap();
        assert_eq!(repo.calls(), 1);

        assert_eq!(cache.clear(), 1);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_response_not_cached() {
        let mut bad = raw("A", "North", 3, &[("mass", 5.0)]);
        bad.month_number = None;
        let repo = Arc::new(FakeRepository::with_records(h1(), vec![bad]));
        let cache = PeriodCache::new(repo.clone(), MalformedPolicy::Reject);

        let err = cache.fetch(h1(), false).await.unwrap_err();
        assert!(matches!(err, MetricsError::MalformedData { .. }));
        assert!(cache.get(h1()).is_none());
    }
}
