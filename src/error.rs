use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("timeout waiting for {what} after {} ms", after.as_millis())]
    Timeout { what: &'static str, after: Duration },

    #[error("could not find bid listing keyword input")]
    KeywordInputNotFound,

    #[error("webdriver session could not be created: {0}")]
    Session(#[from] fantoccini::error::NewSessionError),

    #[error("browser command failed: {0}")]
    Browser(#[from] fantoccini::error::CmdError),

    #[error("robots.txt disallows {0}")]
    RobotsDisallowed(String),

    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("store io error: {0}")]
    Store(#[from] std::io::Error),

    #[error("store json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl ScrapeError {
    pub fn timeout(what: &'static str, after: Duration) -> Self {
        Self::Timeout { what, after }
    }
}
