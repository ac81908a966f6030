//! Blocking HTTP client with configurable politeness (delay between requests).
//!
//! Single-shot: retry policy lives in the assembler, which decides what is worth
//! another attempt. The client only maps transport and status failures to
//! [AdapterError] kinds.

use crate::adapter::error::AdapterError;
use std::time::{Duration, Instant};

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; ficfetch/0.1; +https://github.com/ficfetch)";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_DELAY_SECS: u64 = 2;
const MAX_REDIRECTS: usize = 10;

/// Blocking HTTP client that enforces a delay between requests.
#[derive(Debug)]
pub struct FetchClient {
    inner: reqwest::blocking::Client,
    delay: Duration,
    last_request: Option<Instant>,
}

impl Clone for FetchClient {
    /// Clones share the underlying connection pool but keep their own
    /// politeness clock, so each worker paces its own requests.
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            delay: self.delay,
            last_request: None,
        }
    }
}

impl FetchClient {
    /// Build a client with default User-Agent, timeout, and delay.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::builder().build()
    }

    /// Builder for custom User-Agent, delay, and timeout.
    pub fn builder() -> FetchClientBuilder {
        FetchClientBuilder::default()
    }

    /// GET a page and return its body as text.
    ///
    /// Sleeps until the configured delay has passed since the last request.
    /// Transport failures map to [AdapterError::Network]; see [status_error]
    /// for the status-code mapping.
    pub fn get_text(&mut self, url: &str) -> Result<String, AdapterError> {
        self.wait_delay();
        let response = self
            .inner
            .get(url)
            .send()
            .map_err(|e| AdapterError::network(url, e))?;
        self.last_request = Some(Instant::now());

        if let Some(e) = status_error(response.status().as_u16(), url) {
            return Err(e);
        }
        response
            .text()
            .map_err(|e| AdapterError::network(url, format!("failed to read body: {}", e)))
    }

    fn wait_delay(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.delay {
                std::thread::sleep(self.delay - elapsed);
            }
        }
    }
}

/// Map an HTTP status to the error it should raise, if any.
///
/// 404/410 mean the story is gone ([AdapterError::NotFound]). 5xx and 429 are
/// worth retrying ([AdapterError::Network], transient). Any other non-success
/// status is a definitive server answer ([AdapterError::Http], terminal);
/// retrying a 403 only burns the politeness delay.
pub(crate) fn status_error(status: u16, url: &str) -> Option<AdapterError> {
    match status {
        200..=299 => None,
        404 | 410 => Some(AdapterError::not_found(url)),
        429 | 500..=599 => Some(AdapterError::network(url, format!("HTTP {}", status))),
        _ => Some(AdapterError::http(status, url)),
    }
}

/// Builder for [FetchClient] with optional User-Agent, delay, and timeout.
#[derive(Debug)]
pub struct FetchClientBuilder {
    user_agent: Option<String>,
    delay_secs: u64,
    timeout_secs: u64,
}

impl Default for FetchClientBuilder {
    fn default() -> Self {
        Self {
            user_agent: None,
            delay_secs: DEFAULT_DELAY_SECS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl FetchClientBuilder {
    /// Set a custom User-Agent. If not set, a browser-like default is used.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Set delay between requests in seconds. Default 2.
    pub fn delay_secs(mut self, secs: u64) -> Self {
        self.delay_secs = secs;
        self
    }

    /// Set request timeout in seconds. Default 30.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Build the blocking client and polite wrapper.
    pub fn build(self) -> Result<FetchClient, reqwest::Error> {
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let inner = reqwest::blocking::Client::builder()
            .cookie_store(true)
            .user_agent(user_agent)
            .timeout(Duration::from_secs(self.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;
        Ok(FetchClient {
            inner,
            delay: Duration::from_secs(self.delay_secs),
            last_request: None,
        })
    }
}
