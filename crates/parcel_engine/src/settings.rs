use std::time::Duration;

use parcel_core::{RetryPolicy, DEFAULT_EXTENT};

pub const DEFAULT_API_BASE: &str = "https://api2.suhail.ai";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
pub const DEFAULT_REFERER: &str = "https://suhail.ai/";

/// Transport settings shared by the attribute and tile clients.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub user_agent: String,
    pub referer: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            referer: DEFAULT_REFERER.to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(20),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// Scheme and host of the attribute API, without a trailing path.
    pub base_url: String,
    pub http: HttpSettings,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE.to_string(),
            http: HttpSettings::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TileSettings {
    /// Prefix of `{base}/{z}/{x}/{y}.vector.pbf`.
    pub base_url: String,
    pub http: HttpSettings,
    pub extent: u32,
    pub concurrency: usize,
    pub max_bytes: u64,
}

impl TileSettings {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: HttpSettings {
                request_timeout: Duration::from_secs(15),
                ..HttpSettings::default()
            },
            extent: DEFAULT_EXTENT,
            concurrency: 8,
            max_bytes: 8 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HarvestSettings {
    /// Maximum number of entities in flight.
    pub concurrency: usize,
    /// Rows buffered before a flush.
    pub chunk_size: usize,
    pub retry: RetryPolicy,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            concurrency: 40,
            chunk_size: 1000,
            retry: RetryPolicy::default(),
        }
    }
}
