//! Blocking HTTP plumbing shared by every provider client

use chrono::DateTime;
use reqwest::blocking::{Client, RequestBuilder};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Default User-Agent, per the Wikimedia robot policy: tool name, version
/// and a contact URL.
pub const USER_AGENT: &str = concat!(
    "wikitools/",
    env!("CARGO_PKG_VERSION"),
    " (https://github.com/wikitools-rs/wikitools)"
);

#[derive(Error, Debug)]
pub enum HttpError {
    #[error("Request failed: {message}")]
    RequestFailed { message: String },
    #[error("Invalid URL: {url}")]
    InvalidUrl { url: String },
    #[error("Timeout")]
    Timeout,
    #[error("Rate limited")]
    RateLimited { retry_after: Option<u64> },
    #[error("Parse error: {message}")]
    ParseError { message: String },
}

#[derive(Clone, Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
    pub headers: HashMap<String, String>,
}

pub struct HttpClient {
    client: Client,
    user_agent: String,
}

impl HttpClient {
    /// The cookie store holds MediaWiki login sessions for the lifetime of
    /// the client; all other providers ignore it.
    pub fn new(user_agent: &str) -> Self {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            user_agent: user_agent.to_string(),
        }
    }

    pub fn get(&self, url: &str) -> Result<HttpResponse, HttpError> {
        self.execute(self.client.get(url))
    }

    pub fn get_with_params(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<HttpResponse, HttpError> {
        let url = with_params(url, params)?;
        self.execute(self.client.get(url))
    }

    pub fn get_with_accept(
        &self,
        url: &str,
        params: &[(&str, &str)],
        accept: &str,
    ) -> Result<HttpResponse, HttpError> {
        let url = with_params(url, params)?;
        self.execute(self.client.get(url).header("Accept", accept))
    }

    pub fn post_form(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<HttpResponse, HttpError> {
        self.execute(self.client.post(url).form(params))
    }

    pub fn post_form_with_accept(
        &self,
        url: &str,
        params: &[(&str, &str)],
        accept: &str,
    ) -> Result<HttpResponse, HttpError> {
        self.execute(self.client.post(url).form(params).header("Accept", accept))
    }

    fn execute(&self, request: RequestBuilder) -> Result<HttpResponse, HttpError> {
        let response = request
            .header("User-Agent", &self.user_agent)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    HttpError::Timeout
                } else {
                    HttpError::RequestFailed {
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            return Err(HttpError::RateLimited { retry_after });
        }

        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();

        let body = response.text().map_err(|e| HttpError::ParseError {
            message: e.to_string(),
        })?;

        Ok(HttpResponse {
            status,
            body,
            headers,
        })
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new(USER_AGENT)
    }
}

fn with_params(url: &str, params: &[(&str, &str)]) -> Result<reqwest::Url, HttpError> {
    reqwest::Url::parse_with_params(url, params).map_err(|_| HttpError::InvalidUrl {
        url: url.to_string(),
    })
}

/// Seconds to wait taken from a Retry-After header, which carries either
/// delta-seconds or an HTTP-date. Dates in the past yield None.
fn parse_retry_after(value: &str) -> Option<u64> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(secs);
    }
    let when = DateTime::parse_from_rfc2822(value).ok()?;
    let delta = when.signed_duration_since(chrono::Utc::now()).num_seconds();
    u64::try_from(delta).ok()
}
