//! Cheap reachability check run before a URL is handed to the browser.
//!
//! Every input yields exactly one [`UrlResult`]; nothing here returns an
//! error to the caller.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

const TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Statuses that count as reachable. Redirects are reported, not followed.
pub const VALID_STATUSES: &[u16] = &[200, 301, 302, 307, 308];

pub const INVALID_FORMAT: &str = "Invalid URL format";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UrlResult {
    pub requested_url: String,
    pub destination_url: String,
    /// 0 when no response was received.
    pub status_code: u16,
    pub domain: String,
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Status line of a single, non-following request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedStatus {
    pub status: u16,
    /// `Location` header of a redirect response.
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct FetchError(pub String);

pub trait StatusFetcher {
    fn fetch(&self, url: &str) -> Result<FetchedStatus, FetchError>;
}

// ── ureq ──

pub struct UreqFetcher {
    agent: ureq::Agent,
}

impl UreqFetcher {
    pub fn new() -> Self {
        Self::with_timeout(TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .max_redirects(0)
            .http_status_as_error(false)
            .user_agent(USER_AGENT)
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Default for UreqFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusFetcher for UreqFetcher {
    fn fetch(&self, url: &str) -> Result<FetchedStatus, FetchError> {
        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|e| FetchError(e.to_string()))?;
        let location = response
            .headers()
            .get("location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Ok(FetchedStatus {
            status: response.status().as_u16(),
            location,
        })
    }
}

// ── Processing ──

/// `http`/`https` with a host.
pub fn validate_url(raw: &str) -> Option<Url> {
    let url = Url::parse(raw.trim()).ok()?;
    let host_ok = url.host_str().is_some_and(|h| !h.is_empty());
    (matches!(url.scheme(), "http" | "https") && host_ok).then_some(url)
}

/// Lowercased host, with the port when one is given.
fn domain(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host,
    }
}

fn destination(url: &Url, fetched: &FetchedStatus) -> String {
    let target = fetched
        .location
        .as_deref()
        .and_then(|loc| url.join(loc).ok())
        .unwrap_or_else(|| url.clone());
    target.as_str().trim_end_matches('/').to_string()
}

pub struct UrlProcessor<F = UreqFetcher> {
    fetcher: F,
}

impl UrlProcessor<UreqFetcher> {
    pub fn new() -> Self {
        Self {
            fetcher: UreqFetcher::new(),
        }
    }
}

impl Default for UrlProcessor<UreqFetcher> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: StatusFetcher> UrlProcessor<F> {
    pub fn with_fetcher(fetcher: F) -> Self {
        Self { fetcher }
    }

    pub fn process_urls(&self, urls: &[String]) -> Vec<UrlResult> {
        urls.iter().map(|u| self.process_url(u)).collect()
    }

    pub fn process_url(&self, raw: &str) -> UrlResult {
        let mut result = UrlResult {
            requested_url: raw.to_string(),
            ..Default::default()
        };
        let Some(url) = validate_url(raw) else {
            result.error_message = Some(INVALID_FORMAT.to_string());
            return result;
        };

        let fetched = match self.fetcher.fetch(url.as_str()) {
            Ok(f) => f,
            Err(e) => {
                tracing::debug!(url = raw, error = %e, "precheck request failed");
                result.error_message = Some(format!("Request failed: {e}"));
                return result;
            }
        };
        result.domain = domain(&url);
        result.destination_url = destination(&url, &fetched);
        result.status_code = fetched.status;
        result.is_valid = VALID_STATUSES.contains(&fetched.status);
        if !result.is_valid {
            result.error_message = Some(format!("HTTP {} response", fetched.status));
        }
        result
    }
}
