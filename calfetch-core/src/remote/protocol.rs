//! Request and response types exchanged with the remote event source.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{CalFetchError, CalFetchResult};
use crate::event::EventList;

/// List events within a time window.
#[derive(Debug, Clone, PartialEq)]
pub struct ListEvents {
    pub calendar_id: String,
    pub api_key: String,
    pub time_min: DateTime<Utc>,
    pub time_max: DateTime<Utc>,
    /// Ask the source to expand recurring series into single occurrences.
    pub single_events: bool,
}

impl ListEvents {
    pub fn new(
        calendar_id: &str,
        api_key: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> Self {
        ListEvents {
            calendar_id: calendar_id.to_string(),
            api_key: api_key.to_string(),
            time_min,
            time_max,
            single_events: true,
        }
    }

    /// `{base}/calendars/{calendar_id}/events` with the window as query
    /// parameters.
    pub fn url(&self, base: &Url) -> CalFetchResult<Url> {
        let mut url = base.clone();

        url.path_segments_mut()
            .map_err(|_| CalFetchError::Config(format!("Cannot use '{base}' as API base URL")))?
            .pop_if_empty()
            .extend(["calendars", self.calendar_id.as_str(), "events"]);

        url.query_pairs_mut()
            .append_pair("key", &self.api_key)
            .append_pair("timeMin", &rfc3339(self.time_min))
            .append_pair("timeMax", &rfc3339(self.time_max))
            .append_pair("singleEvents", if self.single_events { "true" } else { "false" });

        Ok(url)
    }
}

fn rfc3339(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Raw outcome of one remote call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteResponse {
    pub status: u16,
    pub body: String,
}

impl RemoteResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        RemoteResponse {
            status,
            body: body.into(),
        }
    }

    /// A `200 OK` carrying `list` as its JSON body.
    pub fn ok(list: &EventList) -> CalFetchResult<Self> {
        let body = serde_json::to_string(list).map_err(|e| CalFetchError::Decode(e.to_string()))?;
        Ok(Self::new(200, body))
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode a successful response, or turn a failed one into
    /// [`CalFetchError::Remote`] carrying this response.
    pub fn into_events(self) -> CalFetchResult<EventList> {
        if !self.is_success() {
            return Err(CalFetchError::Remote {
                status: self.status,
                response: self,
            });
        }

        serde_json::from_str(&self.body).map_err(|e| CalFetchError::Decode(e.to_string()))
    }
}
