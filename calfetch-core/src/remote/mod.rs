//! The remote event source the cache fetches through.
//!
//! The cache only depends on the [`Fetcher`] capability. [`HttpFetcher`]
//! talks to the Google Calendar REST API; tests and embedders can pass any
//! async closure taking a [`ListEvents`] instead.

mod http;
pub mod protocol;

use std::future::Future;

use futures::future::BoxFuture;

use crate::error::CalFetchResult;

pub use http::{DEFAULT_API_BASE_URL, HttpFetcher, parse_base_url};
pub use protocol::{ListEvents, RemoteResponse};

/// Capability to perform one remote `events.list` call.
///
/// Implementations report transport failures as errors and everything that
/// produced a response (including non-success statuses) as a
/// [`RemoteResponse`].
pub trait Fetcher: Send + Sync {
    fn list_events<'a>(
        &'a self,
        request: &'a ListEvents,
    ) -> BoxFuture<'a, CalFetchResult<RemoteResponse>>;
}

impl<F, Fut> Fetcher for F
where
    F: Fn(ListEvents) -> Fut + Send + Sync,
    Fut: Future<Output = CalFetchResult<RemoteResponse>> + Send + 'static,
{
    fn list_events<'a>(
        &'a self,
        request: &'a ListEvents,
    ) -> BoxFuture<'a, CalFetchResult<RemoteResponse>> {
        Box::pin(self(request.clone()))
    }
}
