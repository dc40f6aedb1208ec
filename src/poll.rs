//! Fixed-interval refetching for views that must stay fresh on their own.
//!
//! A [`PolledQuery`] is a mounted [`QueryObserver`] plus a timer task. The
//! mount always issues a fetch at t=0, whatever `stale_time` says, then the timer refetches at every interval
//! boundary. Refetches go through the cache, so a tick that lands while a
//! fetch is still running joins it. There is no backoff and no stop
//! condition on the data: polling ends only when the `PolledQuery` is
//! dropped or [`PolledQuery::stop`] is called, which aborts the timer task.

use std::any::Any;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, trace};

use crate::cache::{QueryCache, QueryKey, QueryObserver, QueryState};
use crate::error::RequestFailed;

/// Handle to a running poll timer. Dropping it cancels the timer.
pub struct PollHandle {
    task: JoinHandle<()>,
}

impl PollHandle {
    /// Starts refetching `key` every `period`, beginning one period from now.
    pub fn start(cache: &QueryCache, key: QueryKey, period: Duration) -> Self {
        let cache = cache.clone();
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                trace!(key = %key, "poll tick");
                cache.refetch(&key);
            }
        });
        Self { task }
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// A query that stays mounted and refetches on a fixed interval.
pub struct PolledQuery<T> {
    observer: QueryObserver<T>,
    handle: PollHandle,
}

impl<T: Any + Send + Sync> PolledQuery<T> {
    pub fn mount<F, Fut>(cache: &QueryCache, key: QueryKey, fetcher: F, period: Duration) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, RequestFailed>> + Send + 'static,
    {
        debug!(key = %key, period_ms = period.as_millis() as u64, "polling started");
        let observer = cache.observe(key.clone(), fetcher);
        // The t=0 fetch happens on every mount, fresh data or not.
        cache.refetch(&key);
        let handle = PollHandle::start(cache, key, period);
        Self { observer, handle }
    }

    pub fn state(&self) -> QueryState<T> {
        self.observer.state()
    }

    pub async fn changed(&mut self) -> bool {
        self.observer.changed().await
    }

    pub async fn settled(&mut self) -> QueryState<T> {
        self.observer.settled().await
    }

    pub fn is_polling(&self) -> bool {
        self.handle.is_running()
    }

    /// Unmounts: cancels the timer and releases the observer.
    pub fn stop(self) {
        debug!(key = %self.observer.key(), "polling stopped");
    }
}
