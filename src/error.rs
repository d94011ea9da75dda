//! Crate-level error type shared by all provider modules

use crate::http::HttpError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(HttpError),
    #[error("HTTP status {status} from {url}")]
    Status { status: u16, url: String },
    /// HTTP 429. `retry_after` holds the parsed Retry-After header in
    /// seconds when the server sent one; nothing is retried here.
    #[error("Rate limited")]
    RateLimited { retry_after: Option<u64> },
    #[error("Parse error: {0}")]
    Parse(String),
    /// An error object returned by a MediaWiki Action API endpoint.
    #[error("API error {code}: {info}")]
    Api { code: String, info: String },
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<HttpError> for Error {
    fn from(e: HttpError) -> Self {
        match e {
            HttpError::RateLimited { retry_after } => Error::RateLimited { retry_after },
            other => Error::Http(other),
        }
    }
}
