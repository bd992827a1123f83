use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP client setup failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid pattern: {0}")]
    PatternError(#[from] regex::Error),

    #[error("Invalid selector '{0}'")]
    SelectorError(String),

    #[error("Unknown text encoding '{0}'")]
    UnknownEncoding(String),

    #[error("Keyword search needs an application id")]
    MissingApplicationId,
}

pub type Result<T> = std::result::Result<T, ScanError>;

/// Outcome of a single page or API fetch that did not produce a usable response.
///
/// None of these abort a crawl. The caller decides whether to skip the page,
/// fall back to another URL or stop (only `Cancelled` stops a run).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Timeout, connection reset, 5xx or 429. Retried by the fetcher.
    #[error("transient failure fetching {url}: {reason}")]
    Transient { url: String, reason: String },

    #[error("giving up on {url} after {attempts} attempts: {reason}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        reason: String,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("{url} is not HTML ({content_type})")]
    NotHtml { url: String, content_type: String },

    #[error("malformed response from {url}: {reason}")]
    Malformed { url: String, reason: String },

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("cancelled")]
    Cancelled,
}

impl FetchError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }
}
