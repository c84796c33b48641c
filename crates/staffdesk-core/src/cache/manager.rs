use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::api::{ApiError, RequestOutcome};

/// Requests for the same key issued this close together share one round trip.
pub const DEFAULT_DEDUP_INTERVAL: Duration = Duration::from_secs(2);

type CachedValue = Arc<dyn Any + Send + Sync>;
type Fetcher = Arc<dyn Fn() -> BoxFuture<'static, RequestOutcome<CachedValue>> + Send + Sync>;
type InFlight = Shared<BoxFuture<'static, RequestOutcome<CachedValue>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevalidationPolicy {
    pub dedup_interval: Duration,
    pub revalidate_on_reconnect: bool,
    pub revalidate_on_focus: bool,
}

impl Default for RevalidationPolicy {
    fn default() -> Self {
        Self {
            dedup_interval: DEFAULT_DEDUP_INTERVAL,
            revalidate_on_reconnect: true,
            revalidate_on_focus: false,
        }
    }
}

/// Environment changes that may trigger revalidation of subscribed keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEvent {
    Reconnected,
    Focused,
}

/// What subscribers of a key see. A failed revalidation keeps the last good
/// data alongside the error.
#[derive(Clone, Default)]
struct Snapshot {
    data: Option<CachedValue>,
    error: Option<ApiError>,
    validating: bool,
}

impl Snapshot {
    fn outcome(&self) -> Option<RequestOutcome<CachedValue>> {
        match (&self.error, &self.data) {
            (Some(e), _) => Some(Err(e.clone())),
            (None, Some(data)) => Some(Ok(data.clone())),
            (None, None) => None,
        }
    }
}

struct Entry {
    fetcher: Fetcher,
    /// Bumped on every issued request; a result is applied only if its
    /// generation is still current.
    generation: u64,
    in_flight: Option<InFlight>,
    settled_at: Option<Instant>,
    state: watch::Sender<Snapshot>,
}

impl Entry {
    fn new(fetcher: Fetcher) -> Self {
        let (state, _) = watch::channel(Snapshot::default());
        Self {
            fetcher,
            generation: 0,
            in_flight: None,
            settled_at: None,
            state,
        }
    }

    fn is_fresh(&self, dedup_interval: Duration) -> bool {
        self.settled_at
            .is_some_and(|at| at.elapsed() < dedup_interval)
    }
}

enum Reuse {
    Pending(InFlight),
    Settled(RequestOutcome<CachedValue>),
}

struct Inner {
    entries: Mutex<HashMap<String, Entry>>,
    policy: RevalidationPolicy,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn complete(&self, key: &str, generation: u64, outcome: RequestOutcome<CachedValue>) {
        let mut entries = self.lock();
        let Some(entry) = entries.get_mut(key) else {
            return;
        };
        if entry.generation != generation {
            debug!(key, generation, current = entry.generation, "Discarding superseded result");
            return;
        }

        entry.in_flight = None;
        entry.settled_at = Some(Instant::now());
        entry.state.send_modify(|snapshot| {
            snapshot.validating = false;
            match outcome {
                Ok(data) => {
                    snapshot.data = Some(data);
                    snapshot.error = None;
                }
                Err(e) => snapshot.error = Some(e),
            }
        });
    }
}

/// Keyed, deduplicating request cache.
///
/// Each key remembers the fetcher it was last registered with, so it can be
/// revalidated later without the caller. Clone is cheap and shares entries.
#[derive(Clone)]
pub struct FetchCache {
    inner: Arc<Inner>,
}

impl Default for FetchCache {
    fn default() -> Self {
        Self::new(RevalidationPolicy::default())
    }
}

impl FetchCache {
    pub fn new(policy: RevalidationPolicy) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(HashMap::new()),
                policy,
            }),
        }
    }

    pub fn policy(&self) -> RevalidationPolicy {
        self.inner.policy
    }

    /// Fetch `key`, sharing the in-flight request or a result that settled
    /// within the dedup interval.
    pub async fn fetch<T, F, Fut>(&self, key: &str, fetcher: F) -> RequestOutcome<Arc<T>>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RequestOutcome<T>> + Send + 'static,
    {
        let pending = {
            let mut entries = self.inner.lock();
            let entry = Self::register(&mut entries, key, erase(fetcher));
            match self.reusable(entry) {
                Some(Reuse::Pending(pending)) => {
                    debug!(key, "Joining in-flight request");
                    pending
                }
                Some(Reuse::Settled(outcome)) => {
                    debug!(key, "Serving deduplicated result");
                    return downcast(key, outcome);
                }
                None => self.start(key, entry),
            }
        };
        downcast(key, pending.await)
    }

    /// Subscribe to `key`, registering `fetcher` for it. A request is started
    /// in the background unless one is in flight or a result is still fresh.
    ///
    /// Must be called from within a tokio runtime.
    pub fn subscribe<T, F, Fut>(&self, key: &str, fetcher: F) -> Subscription<T>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RequestOutcome<T>> + Send + 'static,
    {
        let mut entries = self.inner.lock();
        let entry = Self::register(&mut entries, key, erase(fetcher));
        let state = entry.state.subscribe();
        if self.reusable(entry).is_none() {
            let _ = self.start(key, entry);
        }
        Subscription {
            key: key.to_string(),
            state,
            _type: PhantomData,
        }
    }

    /// Force a fresh request for `key` with its registered fetcher and
    /// broadcast the result. Returns `None` for a key never fetched.
    pub async fn revalidate(&self, key: &str) -> Option<RequestOutcome<()>> {
        let pending = {
            let mut entries = self.inner.lock();
            let entry = entries.get_mut(key)?;
            self.start(key, entry)
        };
        Some(pending.await.map(|_| ()))
    }

    /// Revalidate every subscribed key the policy allows for `event`.
    /// Returns how many requests were started.
    pub fn handle_event(&self, event: CacheEvent) -> usize {
        let enabled = match event {
            CacheEvent::Reconnected => self.inner.policy.revalidate_on_reconnect,
            CacheEvent::Focused => self.inner.policy.revalidate_on_focus,
        };
        if !enabled {
            debug!(?event, "Revalidation disabled for event");
            return 0;
        }

        let mut entries = self.inner.lock();
        let mut started = 0;
        for (key, entry) in entries.iter_mut() {
            if entry.state.receiver_count() == 0 || entry.in_flight.is_some() {
                continue;
            }
            let _ = self.start(key, entry);
            started += 1;
        }
        info!(?event, started, "Revalidating subscribed keys");
        started
    }

    /// Mark every key starting with `prefix` stale and revalidate the ones
    /// with subscribers. A request already in flight for such a key is
    /// superseded, since it may have read data from before the change.
    /// Returns how many requests were started.
    pub fn invalidate(&self, prefix: &str) -> usize {
        let mut entries = self.inner.lock();
        let mut started = 0;
        for (key, entry) in entries.iter_mut() {
            if !key.starts_with(prefix) {
                continue;
            }
            entry.generation += 1;
            entry.in_flight = None;
            entry.settled_at = None;
            if entry.state.receiver_count() > 0 {
                let _ = self.start(key, entry);
                started += 1;
            } else {
                entry.state.send_modify(|snapshot| snapshot.validating = false);
            }
        }
        debug!(prefix, started, "Invalidated cache keys");
        started
    }

    /// Forget all cached results. Requests still in flight complete for their
    /// callers but are not applied. Subscribers stay attached.
    pub fn clear(&self) {
        let mut entries = self.inner.lock();
        for entry in entries.values_mut() {
            entry.generation += 1;
            entry.in_flight = None;
            entry.settled_at = None;
            entry.state.send_replace(Snapshot::default());
        }
        debug!(keys = entries.len(), "Cleared fetch cache");
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn register<'a>(
        entries: &'a mut HashMap<String, Entry>,
        key: &str,
        fetcher: Fetcher,
    ) -> &'a mut Entry {
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::new(fetcher.clone()));
        entry.fetcher = fetcher;
        entry
    }

    fn reusable(&self, entry: &Entry) -> Option<Reuse> {
        if let Some(ref pending) = entry.in_flight {
            return Some(Reuse::Pending(pending.clone()));
        }
        if entry.is_fresh(self.inner.policy.dedup_interval) {
            return entry.state.borrow().outcome().map(Reuse::Settled);
        }
        None
    }

    /// Issue a request on a spawned task so it completes even when every
    /// caller stops waiting.
    fn start(&self, key: &str, entry: &mut Entry) -> InFlight {
        entry.generation += 1;
        let generation = entry.generation;
        debug!(key, generation, "Issuing request");

        let request = (entry.fetcher)();
        let inner = Arc::clone(&self.inner);
        let owned_key = key.to_string();
        let handle = tokio::spawn(async move {
            let outcome = match AssertUnwindSafe(request).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(_) => Err(ApiError::NetworkError("Request task panicked".to_string())),
            };
            inner.complete(&owned_key, generation, outcome.clone());
            outcome
        });

        let pending: InFlight = async move {
            handle
                .await
                .unwrap_or_else(|e| Err(ApiError::NetworkError(format!("Request task failed: {}", e))))
        }
        .boxed()
        .shared();

        entry.in_flight = Some(pending.clone());
        entry.state.send_modify(|snapshot| snapshot.validating = true);
        pending
    }
}

fn erase<T, F, Fut>(fetcher: F) -> Fetcher
where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = RequestOutcome<T>> + Send + 'static,
{
    Arc::new(move || {
        let request = fetcher();
        async move { request.await.map(|value| Arc::new(value) as CachedValue) }.boxed()
    })
}

fn downcast<T: Send + Sync + 'static>(
    key: &str,
    outcome: RequestOutcome<CachedValue>,
) -> RequestOutcome<Arc<T>> {
    outcome?.downcast::<T>().map_err(|_| {
        ApiError::MalformedResponse(format!("Cached value for {} has an unexpected type", key))
    })
}

/// Typed view of one cache key. Dropping it unsubscribes.
pub struct Subscription<T> {
    key: String,
    state: watch::Receiver<Snapshot>,
    _type: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> Subscription<T> {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Last successfully fetched value, kept across failed revalidations.
    pub fn data(&self) -> Option<Arc<T>> {
        let data = self.state.borrow().data.clone()?;
        data.downcast::<T>().ok()
    }

    pub fn error(&self) -> Option<ApiError> {
        self.state.borrow().error.clone()
    }

    pub fn is_validating(&self) -> bool {
        self.state.borrow().validating
    }

    /// The latest outcome, or `None` before the first request settles.
    pub fn outcome(&self) -> Option<RequestOutcome<Arc<T>>> {
        let outcome = self.state.borrow().outcome()?;
        Some(downcast(&self.key, outcome))
    }

    /// Wait for the next change. Returns `false` once the cache is gone.
    pub async fn changed(&mut self) -> bool {
        self.state.changed().await.is_ok()
    }

    /// Wait until no request is in flight for this key.
    pub async fn settled(&mut self) -> bool {
        loop {
            if !self.state.borrow_and_update().validating {
                return true;
            }
            if self.state.changed().await.is_err() {
                return false;
            }
        }
    }
}
