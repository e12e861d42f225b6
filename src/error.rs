//! Public error taxonomy surfaced by [`crate::collector::Collector`] and
//! [`crate::crawler::Crawler`].

use thiserror::Error;

/// Every failure kind named in the crawl contract.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("host {0} is forbidden by DisallowedDomains/AllowedDomains")]
    ForbiddenDomain(String),

    #[error("url {0} rejected by DisallowedURLFilters")]
    ForbiddenUrl(String),

    #[error("url {0} matched no entry in URLFilters")]
    NoUrlFiltersMatch(String),

    #[error("url {0} blocked by robots.txt")]
    RobotsTxtBlocked(String),

    #[error("max depth exceeded for {0}")]
    MaxDepth(String),

    #[error("max request count reached, dropping {0}")]
    MaxRequests(String),

    #[error("already visited, destination: {destination}")]
    AlreadyVisited { destination: String },

    #[error("request aborted by OnRequest callback")]
    AbortedBeforeRequest,

    #[error("request aborted by OnResponseHeaders callback")]
    AbortedAfterHeaders,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("crawl cancelled")]
    Cancelled,

    #[error("cannot retry a request whose body is not re-readable")]
    RetryBodyUnseekable,

    #[error("too many redirects ({0}) starting at {1}")]
    TooManyRedirects(usize, String),

    #[error("failed to fetch robots.txt for {0}: {1}")]
    RobotsTxtFetchFailed(String, String),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout
        } else {
            Error::Transport(e.to_string())
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Error::InvalidUrl(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
