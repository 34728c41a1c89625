//! Deduplicating, interval-aware event cache.
//!
//! [`EventCache`] remembers which time spans it has already fetched in an
//! [`IntervalCoverageSet`]. A request for a window only goes to the network
//! for the parts of it that were never fetched, one call per gap, and all
//! results are merged into a single collection keyed by event id.
//!
//! ### Dedup protocol
//!
//! - Before a gap is fetched it is optimistically added to the coverage set
//!   and registered as in flight. This happens synchronously inside
//!   `fetch_events`, before anything is awaited, so a concurrent request for
//!   the same span sees it as covered and issues no second call.
//! - Every `fetch_events` call also waits for the fetches that were already
//!   in flight when it started. Its return value therefore reflects
//!   everything requested before it began. A failure of one of those
//!   fetches is also returned to every waiter whose window overlaps its gap.
//! - A failed gap is removed from the coverage set again so that the next
//!   overlapping request retries it.
//!
//! The state lock is never held across an await or while subscribers run.
//! Subscriber dispatch is serialized by a separate lock, so callbacks never
//! run concurrently and the last one delivered always carries the latest
//! collection.

mod builder;
mod store;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chrono::{DateTime, Utc};
use futures::FutureExt;
use tokio::runtime::Handle;
use futures::future::{BoxFuture, Shared, join_all};

use crate::coverage::IntervalCoverageSet;
use crate::error::{CalFetchError, CalFetchResult};
use crate::event::RemoteEvent;
use crate::interval::Interval;
use crate::remote::{Fetcher, ListEvents};

pub use builder::EventCacheBuilder;
use store::EventStore;

type Transform<T> = Arc<dyn Fn(RemoteEvent) -> T + Send + Sync>;
type Subscriber<T> = Arc<dyn Fn(&[T]) + Send + Sync>;
type InFlight = Shared<BoxFuture<'static, CalFetchResult<()>>>;

/// Client-side cache of the events of one remote calendar.
///
/// Cloning is cheap and every clone shares the same state.
///
/// Gap fetches are spawned onto the current Tokio runtime, so
/// `fetch_events` must be polled from within one. Outside a runtime it
/// fails with [`CalFetchError::Runtime`] instead of fetching.
pub struct EventCache<T = RemoteEvent> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for EventCache<T> {
    fn clone(&self) -> Self {
        EventCache {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<T> {
    api_key: String,
    calendar_id: String,
    always_refetch: bool,
    fetcher: Arc<dyn Fetcher>,
    transform: Transform<T>,
    state: Mutex<State<T>>,
    /// Held from taking a subscriber snapshot until its callbacks return.
    notify: Mutex<()>,
}

struct PendingFetch {
    gap: Interval,
    fetch: InFlight,
}

struct State<T> {
    /// Spans that were fetched successfully or are being fetched right now.
    covered: IntervalCoverageSet,
    in_flight: HashMap<u64, PendingFetch>,
    events: EventStore<T>,
    subscribers: Vec<(u64, Subscriber<T>)>,
    next_id: u64,
}

impl<T> State<T> {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl EventCache<RemoteEvent> {
    pub fn builder(
        api_key: impl Into<String>,
        calendar_id: impl Into<String>,
    ) -> EventCacheBuilder<RemoteEvent> {
        EventCacheBuilder::new(api_key, calendar_id)
    }
}

impl<T> EventCache<T>
where
    T: Clone + Send + 'static,
{
    fn new(
        api_key: String,
        calendar_id: String,
        always_refetch: bool,
        fetcher: Arc<dyn Fetcher>,
        transform: Transform<T>,
    ) -> Self {
        let state = State {
            covered: IntervalCoverageSet::new(),
            in_flight: HashMap::new(),
            events: EventStore::new(),
            subscribers: Vec::new(),
            next_id: 0,
        };

        EventCache {
            inner: Arc::new(Inner {
                api_key,
                calendar_id,
                always_refetch,
                fetcher,
                transform,
                state: Mutex::new(state),
                notify: Mutex::new(()),
            }),
        }
    }

    pub fn calendar_id(&self) -> &str {
        &self.inner.calendar_id
    }

    /// Fetch the events in `[from, to)` and return every event accumulated
    /// so far, in the order they were first seen.
    ///
    /// Only the parts of the window that were never fetched hit the network.
    /// If any of those calls fails, or a fetch already in flight for an
    /// overlapping span fails, the error is returned once everything awaited
    /// has settled. Failed spans stay uncovered and are retried by the next
    /// overlapping call.
    ///
    /// Bounds are truncated to whole milliseconds, both for coverage and for
    /// the windows sent to the remote source. A window that is empty after
    /// truncation is an [`CalFetchError::InvalidRange`].
    pub async fn fetch_events(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> CalFetchResult<Vec<T>> {
        let requested = Interval::from_times(from, to);
        if from >= to || !requested.is_valid() {
            return Err(CalFetchError::InvalidRange {
                from: from.to_rfc3339(),
                to: to.to_rfc3339(),
            });
        }

        if self.inner.always_refetch {
            tracing::debug!(%from, %to, "refetching window");
            self.inner.load_window(from, to).await?;
            return Ok(self.events());
        }

        let runtime =
            Handle::try_current().map_err(|e| CalFetchError::Runtime(e.to_string()))?;

        let (overlapping, unrelated, issued) = {
            let mut state = self.inner.lock();
            let (overlapping, unrelated): (Vec<_>, Vec<_>) = state
                .in_flight
                .values()
                .partition(|pending| pending.gap.overlaps(&requested));
            let overlapping: Vec<InFlight> =
                overlapping.into_iter().map(|p| p.fetch.clone()).collect();
            let unrelated: Vec<InFlight> =
                unrelated.into_iter().map(|p| p.fetch.clone()).collect();

            let gaps = state
                .covered
                .inverse()
                .intersection(&IntervalCoverageSet::from_intervals([requested])?);

            let windows = gaps
                .iter()
                .map(|gap| gap.to_times().map(|window| (gap, window)))
                .collect::<CalFetchResult<Vec<_>>>()?;

            tracing::debug!(
                %requested,
                %gaps,
                overlapping = overlapping.len(),
                unrelated = unrelated.len(),
                "computed uncovered gaps"
            );

            let issued = windows
                .into_iter()
                .map(|(gap, window)| self.inner.issue_gap(&runtime, &mut state, gap, window))
                .collect::<CalFetchResult<Vec<_>>>()?;

            (overlapping, unrelated, issued)
        };

        // Failures of in-flight fetches outside this window belong to the
        // callers that issued them.
        let (issued, overlapping, _) = futures::join!(
            join_all(issued),
            join_all(overlapping),
            join_all(unrelated)
        );
        for outcome in issued.into_iter().chain(overlapping) {
            outcome?;
        }

        Ok(self.events())
    }

    /// Snapshot of all accumulated events in first-insertion order.
    pub fn events(&self) -> Vec<T> {
        self.inner.lock().events.values().to_vec()
    }

    /// Snapshot of the spans currently counted as fetched, in epoch
    /// milliseconds. Includes spans whose fetch is still in flight.
    pub fn covered_ranges(&self) -> Vec<Interval> {
        self.inner.lock().covered.iter().collect()
    }

    /// Number of gap fetches that have not settled yet.
    pub fn in_flight(&self) -> usize {
        self.inner.lock().in_flight.len()
    }

    /// Register `callback` to receive the full event collection after every
    /// successful fetch. It is called once right away with the current
    /// collection, which may be empty.
    ///
    /// Callbacks are invoked one at a time and must not call `subscribe`
    /// themselves.
    pub fn subscribe<F>(&self, callback: F) -> Subscription<T>
    where
        F: Fn(&[T]) + Send + Sync + 'static,
    {
        let callback: Subscriber<T> = Arc::new(callback);

        let _notify = self.inner.lock_notify();
        let (id, snapshot) = {
            let mut state = self.inner.lock();
            let id = state.next_id();
            state.subscribers.push((id, Arc::clone(&callback)));
            (id, state.events.values().to_vec())
        };

        callback(&snapshot);

        Subscription {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl<T> Inner<T>
where
    T: Clone + Send + 'static,
{
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_notify(&self) -> MutexGuard<'_, ()> {
        self.notify.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim `gap` in the coverage set and start fetching it.
    fn issue_gap(
        self: &Arc<Self>,
        runtime: &Handle,
        state: &mut State<T>,
        gap: Interval,
        (from, to): (DateTime<Utc>, DateTime<Utc>),
    ) -> CalFetchResult<InFlight> {
        state.covered.add_range(gap)?;
        let id = state.next_id();

        tracing::debug!(%gap, id, "issuing gap fetch");

        // Spawned so the fetch runs to completion even if the caller that
        // issued it goes away.
        let inner = Arc::clone(self);
        let task = runtime.spawn(async move {
            let outcome = inner.load_window(from, to).await;
            inner.settle(id, gap, outcome.is_err());
            outcome
        });

        let inner = Arc::clone(self);
        let fetch = async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    inner.settle(id, gap, true);
                    Err(CalFetchError::TaskFailed(e.to_string()))
                }
            }
        }
        .boxed()
        .shared();

        state.in_flight.insert(
            id,
            PendingFetch {
                gap,
                fetch: fetch.clone(),
            },
        );
        Ok(fetch)
    }

    /// Deregister a finished gap fetch, releasing its coverage claim if it
    /// failed.
    fn settle(&self, id: u64, gap: Interval, failed: bool) {
        let mut state = self.lock();
        if failed && state.covered.remove_range(gap).is_ok() {
            tracing::debug!(%gap, id, "rolled back coverage of failed fetch");
        }
        state.in_flight.remove(&id);
    }

    /// One remote call for exactly `[from, to)`, merged into the store.
    async fn load_window(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> CalFetchResult<()> {
        let request = ListEvents::new(&self.calendar_id, &self.api_key, from, to);
        let list = self.fetcher.list_events(&request).await?.into_events()?;

        let fetched: Vec<(String, T)> = list
            .items
            .into_iter()
            .map(|event| (event.id.clone(), (self.transform)(event)))
            .collect();

        let count = fetched.len();
        {
            let mut state = self.lock();
            for (id, value) in fetched {
                state.events.upsert(id, value);
            }
        }

        // Snapshot under the notify lock so a later dispatch never carries
        // an older collection than an earlier one.
        let _notify = self.lock_notify();
        let (snapshot, subscribers) = {
            let state = self.lock();
            let subscribers: Vec<Subscriber<T>> = state
                .subscribers
                .iter()
                .map(|(_, callback)| Arc::clone(callback))
                .collect();
            (state.events.values().to_vec(), subscribers)
        };

        tracing::trace!(%from, %to, count, total = snapshot.len(), "merged fetched events");

        for callback in subscribers {
            callback(&snapshot);
        }

        Ok(())
    }
}

/// Handle returned by [`EventCache::subscribe`].
///
/// Dropping the handle leaves the callback registered; call
/// [`Subscription::unsubscribe`] to remove it.
pub struct Subscription<T> {
    id: u64,
    inner: Weak<Inner<T>>,
}

impl<T> Subscription<T> {
    pub fn unsubscribe(self) {
        if let Some(inner) = self.inner.upgrade() {
            let mut state = inner.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.subscribers.retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventBoundary, EventList};
    use crate::remote::RemoteResponse;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn jan(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    fn event(id: &str, summary: &str) -> RemoteEvent {
        RemoteEvent {
            id: id.to_string(),
            status: None,
            summary: Some(summary.to_string()),
            description: None,
            location: None,
            html_link: None,
            recurring_event_id: None,
            start: EventBoundary::default(),
            end: EventBoundary::default(),
        }
    }

    fn counting_cache(calls: Arc<AtomicUsize>) -> EventCache<String> {
        EventCache::builder("key", "calendar")
            .fetcher(move |_request: ListEvents| {
                let calls = Arc::clone(&calls);
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    RemoteResponse::ok(&EventList {
                        items: vec![event(&format!("e{n}"), "x")],
                    })
                }
            })
            .transform(|event| event.id)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_rejects_non_increasing_range() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = counting_cache(Arc::clone(&calls));

        let result = cache.fetch_events(jan(5), jan(5)).await;
        assert!(matches!(result, Err(CalFetchError::InvalidRange { .. })));
        let result = cache.fetch_events(jan(6), jan(5)).await;
        assert!(matches!(result, Err(CalFetchError::InvalidRange { .. })));

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(cache.covered_ranges().is_empty());
    }

    #[tokio::test]
    async fn test_sub_millisecond_window_is_invalid() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = counting_cache(Arc::clone(&calls));

        let to = jan(1) + chrono::Duration::microseconds(500);
        let result = cache.fetch_events(jan(1), to).await;
        assert!(matches!(result, Err(CalFetchError::InvalidRange { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_fetch_outside_runtime_fails_without_claiming_coverage() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = counting_cache(Arc::clone(&calls));

        let result = futures::executor::block_on(cache.fetch_events(jan(1), jan(2)));
        assert!(matches!(result, Err(CalFetchError::Runtime(_))));
        assert!(cache.covered_ranges().is_empty());
        assert_eq!(cache.in_flight(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_transform_is_applied_to_every_event() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = counting_cache(Arc::clone(&calls));

        let events = cache.fetch_events(jan(1), jan(2)).await.unwrap();
        assert_eq!(events, ["e0"]);
        assert_eq!(cache.in_flight(), 0);
        assert_eq!(
            cache.covered_ranges(),
            [Interval::from_times(jan(1), jan(2))]
        );
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_notifications() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = counting_cache(Arc::clone(&calls));
        let notified = Arc::new(AtomicUsize::new(0));

        let subscription = cache.subscribe({
            let notified = Arc::clone(&notified);
            move |_events: &[String]| {
                notified.fetch_add(1, Ordering::SeqCst);
            }
        });
        assert_eq!(notified.load(Ordering::SeqCst), 1);

        cache.fetch_events(jan(1), jan(2)).await.unwrap();
        assert_eq!(notified.load(Ordering::SeqCst), 2);

        subscription.unsubscribe();
        cache.fetch_events(jan(3), jan(4)).await.unwrap();
        assert_eq!(notified.load(Ordering::SeqCst), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
