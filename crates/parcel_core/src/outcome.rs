use std::fmt;

use serde_json::Value;

/// Result of a single HTTP attempt against the attribute API.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// 200 with a non-empty `data` list.
    Success(Vec<Value>),
    /// 200 with an empty or absent `data` list.
    NoData,
    NotFound,
    RateLimited,
    HttpError(u16),
    JsonError(String),
    /// Timeout, refused connection, reset, or any transport fault.
    ConnectionError(String),
}

impl FetchOutcome {
    /// Classify a completed HTTP exchange.
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        match status {
            200 => match serde_json::from_slice::<Value>(body) {
                Ok(payload) => match payload.get("data") {
                    Some(Value::Array(items)) if !items.is_empty() => Self::Success(items.clone()),
                    _ => Self::NoData,
                },
                Err(err) => Self::JsonError(err.to_string()),
            },
            404 => Self::NotFound,
            429 => Self::RateLimited,
            code => Self::HttpError(code),
        }
    }

    /// Whether another attempt could produce a different answer.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::HttpError(_) | Self::ConnectionError(_)
        )
    }
}

impl fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchOutcome::Success(items) => write!(f, "success ({} results)", items.len()),
            FetchOutcome::NoData => write!(f, "no data"),
            FetchOutcome::NotFound => write!(f, "not found"),
            FetchOutcome::RateLimited => write!(f, "rate limited"),
            FetchOutcome::HttpError(code) => write!(f, "http status {code}"),
            FetchOutcome::JsonError(message) => write!(f, "invalid json: {message}"),
            FetchOutcome::ConnectionError(message) => write!(f, "connection error: {message}"),
        }
    }
}

/// Terminal per-entity status persisted in the `api_status` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ApiStatus {
    Success,
    NoData,
    NotFound,
    JsonError,
    FailedAfterRetries,
}

impl ApiStatus {
    pub const ALL: [ApiStatus; 5] = [
        ApiStatus::Success,
        ApiStatus::NoData,
        ApiStatus::NotFound,
        ApiStatus::JsonError,
        ApiStatus::FailedAfterRetries,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ApiStatus::Success => "SUCCESS",
            ApiStatus::NoData => "NO_DATA_IN_LIST",
            ApiStatus::NotFound => "NOT_FOUND",
            ApiStatus::JsonError => "JSON_ERROR",
            ApiStatus::FailedAfterRetries => "FAILED_AFTER_RETRIES",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == text)
    }
}

impl fmt::Display for ApiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
