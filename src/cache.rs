//! Session-scoped query cache.
//!
//! Reads are addressed by a [`QueryKey`]. For each key the cache keeps the
//! last result, whether it is stale, the fetch currently in flight, and how
//! many consumers are mounted. The rules:
//!
//! - Identical keys share one in-flight request and one cached result. A
//!   second fetch for a key that is already loading joins the running
//!   request instead of issuing another.
//! - A read moves through three observable states, see [`QueryState`].
//! - Writes never touch cached data. They call [`QueryCache::invalidate`],
//!   which marks matching entries stale and refetches every entry that has
//!   a mounted consumer. An invalidation that lands while a fetch for that
//!   key is running is satisfied by that fetch, so concurrent invalidations
//!   coalesce into one request.
//! - Results always land in the cache. A consumer that unmounted before its
//!   response arrived is simply not notified.
//!
//! The cache is an explicit service object: create it at application start,
//! call [`QueryCache::shutdown`] at stop. Nothing survives a process restart.
//!
//! Fetches run in spawned tokio tasks. The in-flight slot is cleared when
//! the task settles, whether or not anyone is still waiting on it.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use crate::error::RequestFailed;

type AnyData = Arc<dyn Any + Send + Sync>;
type FetchResult = Result<AnyData, RequestFailed>;
type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;
type Fetcher = Arc<dyn Fn() -> BoxFuture<'static, FetchResult> + Send + Sync>;

/// Structural identifier for a cached read, e.g. `["documents", "<id>"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    pub fn sources() -> Self {
        Self::new(["sources"])
    }

    pub fn jobs() -> Self {
        Self::new(["jobs"])
    }

    pub fn job(id: &str) -> Self {
        Self::new(["jobs", id])
    }

    /// `["documents"]` unfiltered, `["documents", <source_id>]` filtered.
    pub fn documents(source_id: Option<&str>) -> Self {
        match source_id {
            Some(id) => Self::new(["documents", id]),
            None => Self::new(["documents"]),
        }
    }

    pub fn document(id: &str) -> Self {
        Self::new(["document", id])
    }

    pub fn document_chunks(id: &str) -> Self {
        Self::new(["document", id, "chunks"])
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }

    /// True when `prefix` matches the leading parts of this key.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

/// What a consumer sees for a key.
#[derive(Debug)]
pub enum QueryState<T> {
    /// No data yet.
    Loading,
    /// Data present. `stale` means a newer version may be on its way.
    Success { data: Arc<T>, stale: bool },
    /// Every fetch so far failed; this is the latest failure.
    Error(RequestFailed),
}

impl<T> Clone for QueryState<T> {
    fn clone(&self) -> Self {
        match self {
            QueryState::Loading => QueryState::Loading,
            QueryState::Success { data, stale } => QueryState::Success {
                data: Arc::clone(data),
                stale: *stale,
            },
            QueryState::Error(e) => QueryState::Error(e.clone()),
        }
    }
}

impl<T> QueryState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, QueryState::Loading)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, QueryState::Error(_))
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            QueryState::Success { data, .. } => Some(data.as_ref()),
            _ => None,
        }
    }
}

struct InFlight {
    id: u64,
    fut: SharedFetch,
    abort: AbortHandle,
}

struct Entry {
    data: Option<AnyData>,
    error: Option<RequestFailed>,
    updated_at: Option<Instant>,
    invalidated: bool,
    in_flight: Option<InFlight>,
    fetcher: Option<Fetcher>,
    observers: usize,
    version: watch::Sender<u64>,
}

impl Entry {
    fn new() -> Self {
        let (version, _) = watch::channel(0);
        Self {
            data: None,
            error: None,
            updated_at: None,
            invalidated: false,
            in_flight: None,
            fetcher: None,
            observers: 0,
            version,
        }
    }

    fn is_stale(&self, stale_time: Duration) -> bool {
        self.invalidated
            || self
                .updated_at
                .map_or(true, |at| at.elapsed() >= stale_time)
    }

    fn notify(&self) {
        self.version.send_modify(|v| *v += 1);
    }
}

struct Inner {
    entries: Mutex<HashMap<QueryKey, Entry>>,
    stale_time: Duration,
    next_fetch_id: AtomicU64,
    closed: AtomicBool,
}

/// Process-wide store of query results. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<Inner>,
}

impl QueryCache {
    /// `stale_time` is how long a result counts as fresh after it lands.
    pub fn new(stale_time: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(HashMap::new()),
                stale_time,
                next_fetch_id: AtomicU64::new(1),
                closed: AtomicBool::new(false),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<QueryKey, Entry>> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current state for `key` without triggering any fetch. Data from an
    /// earlier success outlives later failures; `Error` means no fetch has
    /// succeeded yet.
    ///
    /// Use [`QueryCache::last_error`] to see why a refetch failed.
    pub fn get<T: Any + Send + Sync>(&self, key: &QueryKey) -> QueryState<T> {
        let entries = self.lock();
        let Some(entry) = entries.get(key) else {
            return QueryState::Loading;
        };

        match (&entry.data, &entry.error) {
            (Some(data), _) => match Arc::clone(data).downcast::<T>() {
                Ok(data) => QueryState::Success {
                    data,
                    stale: entry.error.is_some() || entry.is_stale(self.inner.stale_time),
                },
                Err(_) => {
                    warn!(key = %key, "cached value has a different type than requested");
                    QueryState::Loading
                }
            },
            (None, Some(err)) => QueryState::Error(err.clone()),
            (None, None) => QueryState::Loading,
        }
    }

    /// Error of the most recent fetch of `key`, cleared by the next success.
    pub fn last_error(&self, key: &QueryKey) -> Option<RequestFailed> {
        self.lock().get(key).and_then(|entry| entry.error.clone())
    }

    pub fn is_fetching(&self, key: &QueryKey) -> bool {
        self.lock()
            .get(key)
            .is_some_and(|entry| entry.in_flight.is_some())
    }

    /// Returns fresh cached data, or fetches (joining any in-flight request).
    ///
    /// `fetcher` becomes the key's refetch function for later invalidations.
    pub async fn fetch<T, F, Fut>(&self, key: QueryKey, fetcher: F) -> Result<Arc<T>, RequestFailed>
    where
        T: Any + Send + Sync,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, RequestFailed>> + Send + 'static,
    {
        let pending = {
            let mut entries = self.lock();
            let entry = entries.entry(key.clone()).or_insert_with(Entry::new);
            entry.fetcher = Some(erase(fetcher));

            if !entry.is_stale(self.inner.stale_time) && entry.in_flight.is_none() {
                if let Some(data) = &entry.data {
                    return downcast(&key, Arc::clone(data));
                }
            }

            self.start_or_join(&mut entries, &key)
        };

        match pending {
            Some(fut) => downcast(&key, fut.await?),
            None => Err(RequestFailed::cancelled()),
        }
    }

    /// Starts a fetch with the key's registered fetcher, or joins the one
    /// already running. Returns false when there is nothing to fetch with.
    pub fn refetch(&self, key: &QueryKey) -> bool {
        let mut entries = self.lock();
        self.start_or_join(&mut entries, key).is_some()
    }

    /// Marks every entry whose key starts with `key` stale and refetches
    /// those with a mounted consumer. Returns how many entries matched.
    pub fn invalidate(&self, key: &QueryKey) -> usize {
        let mut entries = self.lock();
        let matched: Vec<QueryKey> = entries
            .keys()
            .filter(|k| k.starts_with(key))
            .cloned()
            .collect();

        for k in &matched {
            let mounted = match entries.get_mut(k) {
                Some(entry) => {
                    entry.invalidated = true;
                    entry.notify();
                    entry.observers > 0
                }
                None => false,
            };
            if mounted {
                self.start_or_join(&mut entries, k);
            }
        }

        debug!(key = %key, matched = matched.len(), "invalidated");
        matched.len()
    }

    /// Registers a mounted consumer for `key`. Dropping the subscription
    /// unmounts it.
    pub fn subscribe(&self, key: QueryKey) -> Subscription {
        let rx = {
            let mut entries = self.lock();
            let entry = entries.entry(key.clone()).or_insert_with(Entry::new);
            entry.observers += 1;
            entry.version.subscribe()
        };
        Subscription {
            cache: self.clone(),
            key,
            rx,
        }
    }

    /// Mounts a consumer of `key` backed by `fetcher`: registers the
    /// fetcher, subscribes, and starts a fetch when there is no fresh data.
    pub fn observe<T, F, Fut>(&self, key: QueryKey, fetcher: F) -> QueryObserver<T>
    where
        T: Any + Send + Sync,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, RequestFailed>> + Send + 'static,
    {
        let subscription = self.subscribe(key.clone());
        {
            let mut entries = self.lock();
            if let Some(entry) = entries.get_mut(&key) {
                entry.fetcher = Some(erase(fetcher));
                let needs_fetch = entry.data.is_none() || entry.is_stale(self.inner.stale_time);
                if needs_fetch {
                    self.start_or_join(&mut entries, &key);
                }
            }
        }
        QueryObserver {
            subscription,
            _marker: PhantomData,
        }
    }

    /// Number of mounted consumers of `key`.
    pub fn observer_count(&self, key: &QueryKey) -> usize {
        self.lock().get(key).map_or(0, |entry| entry.observers)
    }

    /// Cancels every in-flight fetch and drops all cached state. Later
    /// fetches fail with a cancelled [`RequestFailed`].
    pub fn shutdown(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        let mut entries = self.lock();
        for entry in entries.values() {
            if let Some(in_flight) = &entry.in_flight {
                in_flight.abort.abort();
            }
        }
        let count = entries.len();
        entries.clear();
        debug!(entries = count, "query cache shut down");
    }

    fn start_or_join(
        &self,
        entries: &mut HashMap<QueryKey, Entry>,
        key: &QueryKey,
    ) -> Option<SharedFetch> {
        let entry = entries.get_mut(key)?;
        if let Some(in_flight) = &entry.in_flight {
            debug!(key = %key, fetch = in_flight.id, "joining in-flight fetch");
            return Some(in_flight.fut.clone());
        }
        if self.inner.closed.load(Ordering::SeqCst) {
            return None;
        }
        let fetcher = entry.fetcher.clone()?;

        let id = self.inner.next_fetch_id.fetch_add(1, Ordering::Relaxed);
        let cache = self.clone();
        let task_key = key.clone();
        debug!(key = %key, fetch = id, "fetch started");

        let handle = tokio::spawn(async move {
            let result = fetcher().await;
            cache.settle(&task_key, id, &result);
            result
        });
        let abort = handle.abort_handle();
        let fut = async move {
            handle
                .await
                .unwrap_or_else(|_| Err(RequestFailed::cancelled()))
        }
        .boxed()
        .shared();

        entry.in_flight = Some(InFlight {
            id,
            fut: fut.clone(),
            abort,
        });
        Some(fut)
    }

    fn settle(&self, key: &QueryKey, id: u64, result: &FetchResult) {
        let mut entries = self.lock();
        let Some(entry) = entries.get_mut(key) else {
            return;
        };
        if entry.in_flight.as_ref().map(|f| f.id) != Some(id) {
            return;
        }
        entry.in_flight = None;

        match result {
            Ok(data) => {
                entry.data = Some(Arc::clone(data));
                entry.error = None;
                entry.updated_at = Some(Instant::now());
                entry.invalidated = false;
                debug!(key = %key, fetch = id, observers = entry.observers, "fetch settled");
            }
            Err(err) => {
                entry.error = Some(err.clone());
                warn!(key = %key, fetch = id, error = %err, "fetch failed");
            }
        }
        entry.notify();
    }

    fn release(&self, key: &QueryKey) {
        let mut entries = self.lock();
        if let Some(entry) = entries.get_mut(key) {
            entry.observers = entry.observers.saturating_sub(1);
        }
    }
}

fn erase<T, F, Fut>(fetcher: F) -> Fetcher
where
    T: Any + Send + Sync,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, RequestFailed>> + Send + 'static,
{
    Arc::new(move || {
        let fut = fetcher();
        async move { fut.await.map(|value| Arc::new(value) as AnyData) }.boxed()
    })
}

fn downcast<T: Any + Send + Sync>(key: &QueryKey, data: AnyData) -> Result<Arc<T>, RequestFailed> {
    data.downcast::<T>().map_err(|_| RequestFailed {
        status: None,
        body: None,
        message: format!("cached value for {} has a different type", key),
    })
}

/// A mounted consumer of a key. Dropping it unmounts.
pub struct Subscription {
    cache: QueryCache,
    key: QueryKey,
    rx: watch::Receiver<u64>,
}

impl Subscription {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Waits for the next change to the key. Returns false once the cache
    /// has shut down.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    fn mark_seen(&mut self) {
        self.rx.borrow_and_update();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cache.release(&self.key);
    }
}

/// Typed view of one key for a mounted consumer.
pub struct QueryObserver<T> {
    subscription: Subscription,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> QueryObserver<T> {
    pub fn key(&self) -> &QueryKey {
        self.subscription.key()
    }

    pub fn state(&self) -> QueryState<T> {
        self.subscription.cache.get(self.key())
    }

    pub async fn changed(&mut self) -> bool {
        self.subscription.changed().await
    }

    pub fn refetch(&self) -> bool {
        self.subscription.cache.refetch(self.key())
    }

    /// Waits until no fetch is running and the state is no longer
    /// `Loading`, then returns it.
    pub async fn settled(&mut self) -> QueryState<T> {
        loop {
            self.subscription.mark_seen();
            let state = self.state();
            let fetching = self.subscription.cache.is_fetching(self.key());
            if !fetching && !state.is_loading() {
                return state;
            }
            if !fetching && !self.refetch() {
                return state;
            }
            if !self.changed().await {
                return self.state();
            }
        }
    }
}
