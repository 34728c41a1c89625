use futures::future::BoxFuture;
use url::Url;

use crate::error::{CalFetchError, CalFetchResult};
use crate::remote::Fetcher;
use crate::remote::protocol::{ListEvents, RemoteResponse};

pub const DEFAULT_API_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";

/// Fetches events over HTTP from a Google Calendar compatible endpoint.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpFetcher {
    pub fn new() -> CalFetchResult<Self> {
        Self::with_base_url(DEFAULT_API_BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> CalFetchResult<Self> {
        let base_url = parse_base_url(base_url)?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| CalFetchError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(HttpFetcher { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn get(&self, request: &ListEvents) -> CalFetchResult<RemoteResponse> {
        let url = request.url(&self.base_url)?;

        // Strip the URL from errors, it carries the API key.
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CalFetchError::Transport(e.without_url().to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| CalFetchError::Transport(e.without_url().to_string()))?;

        Ok(RemoteResponse { status, body })
    }
}

impl Fetcher for HttpFetcher {
    fn list_events<'a>(
        &'a self,
        request: &'a ListEvents,
    ) -> BoxFuture<'a, CalFetchResult<RemoteResponse>> {
        Box::pin(self.get(request))
    }
}

/// Parse an absolute `http`/`https` URL usable as an API base.
pub fn parse_base_url(s: &str) -> CalFetchResult<Url> {
    let url = Url::parse(s).map_err(|e| CalFetchError::Config(format!("Invalid API base URL '{s}': {e}")))?;

    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(CalFetchError::Config(format!(
            "API base URL must be an http(s) URL, got '{s}'"
        )));
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_base_url_rejects_non_http() {
        assert!(parse_base_url("https://www.googleapis.com/calendar/v3").is_ok());
        assert!(parse_base_url("http://127.0.0.1:9000").is_ok());
        assert!(matches!(parse_base_url("ftp://example.com"), Err(CalFetchError::Config(_))));
        assert!(matches!(parse_base_url("mailto:me@example.com"), Err(CalFetchError::Config(_))));
        assert!(matches!(parse_base_url("not a url"), Err(CalFetchError::Config(_))));
    }

    #[test]
    fn test_default_fetcher_targets_google() {
        let fetcher = HttpFetcher::new().unwrap();
        assert_eq!(fetcher.base_url().host_str(), Some("www.googleapis.com"));
    }
}
