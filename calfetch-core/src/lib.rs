//! Core of calfetch: a client-side cache for remote calendar events.
//!
//! - `coverage` tracks which time spans have been fetched as a canonical set
//!   of disjoint intervals
//! - `cache` turns arbitrary, possibly overlapping window requests into the
//!   minimal set of remote calls and merges their results
//! - `remote` is the fetch capability the cache calls through, with an HTTP
//!   implementation for the Google Calendar API

pub mod cache;
pub mod config;
pub mod coverage;
pub mod error;
pub mod event;
pub mod interval;
pub mod remote;

pub use cache::{EventCache, EventCacheBuilder, Subscription};
pub use coverage::IntervalCoverageSet;
pub use error::{CalFetchError, CalFetchResult};
pub use event::{EventBoundary, EventList, EventTime, RemoteEvent};
pub use interval::Interval;
