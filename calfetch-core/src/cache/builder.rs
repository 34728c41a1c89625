use std::sync::Arc;

use crate::cache::{EventCache, Transform};
use crate::error::{CalFetchError, CalFetchResult};
use crate::event::RemoteEvent;
use crate::remote::{Fetcher, HttpFetcher};

/// Validated construction of an [`EventCache`].
///
/// The type parameter is the item type produced by the transform; without a
/// transform the cache stores [`RemoteEvent`]s as received.
pub struct EventCacheBuilder<T = RemoteEvent> {
    api_key: String,
    calendar_id: String,
    always_refetch: bool,
    fetcher: Option<Arc<dyn Fetcher>>,
    api_base_url: Option<String>,
    transform: Transform<T>,
}

impl EventCacheBuilder<RemoteEvent> {
    pub fn new(api_key: impl Into<String>, calendar_id: impl Into<String>) -> Self {
        EventCacheBuilder {
            api_key: api_key.into(),
            calendar_id: calendar_id.into(),
            always_refetch: false,
            fetcher: None,
            api_base_url: None,
            transform: Arc::new(|event: RemoteEvent| event),
        }
    }
}

impl<T> EventCacheBuilder<T> {
    /// Issue one call per `fetch_events`, for exactly the requested window.
    ///
    /// In this mode the cache keeps no coverage at all, so repeated calls
    /// always go to the network. Coverage is not backfilled either: a cache
    /// built with this flag never learns which spans it has seen.
    pub fn always_refetch(mut self, enabled: bool) -> Self {
        self.always_refetch = enabled;
        self
    }

    /// Replace the default HTTP fetcher.
    pub fn fetcher(mut self, fetcher: impl Fetcher + 'static) -> Self {
        self.fetcher = Some(Arc::new(fetcher));
        self
    }

    /// Base URL for the default HTTP fetcher.
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    /// Map every fetched event before it is stored.
    pub fn transform<U, F>(self, transform: F) -> EventCacheBuilder<U>
    where
        F: Fn(RemoteEvent) -> U + Send + Sync + 'static,
    {
        EventCacheBuilder {
            api_key: self.api_key,
            calendar_id: self.calendar_id,
            always_refetch: self.always_refetch,
            fetcher: self.fetcher,
            api_base_url: self.api_base_url,
            transform: Arc::new(transform),
        }
    }

    pub fn build(self) -> CalFetchResult<EventCache<T>>
    where
        T: Clone + Send + 'static,
    {
        require_non_empty("api_key", &self.api_key)?;
        require_non_empty("calendar_id", &self.calendar_id)?;

        let fetcher: Arc<dyn Fetcher> = match (self.fetcher, self.api_base_url) {
            (Some(_), Some(_)) => {
                return Err(CalFetchError::Config(
                    "api_base_url only applies to the default fetcher".into(),
                ));
            }
            (Some(fetcher), None) => fetcher,
            (None, Some(url)) => Arc::new(HttpFetcher::with_base_url(&url)?),
            (None, None) => Arc::new(HttpFetcher::new()?),
        };

        Ok(EventCache::new(
            self.api_key,
            self.calendar_id,
            self.always_refetch,
            fetcher,
            self.transform,
        ))
    }
}

fn require_non_empty(name: &str, value: &str) -> CalFetchResult<()> {
    if value.trim().is_empty() {
        return Err(CalFetchError::Config(format!("{name} must not be empty")));
    }
    Ok(())
}
