use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context};
use parcel_engine::{ApiSettings, HarvestSettings, HttpSettings, TileSettings};
use serde::Deserialize;

use crate::cli::{HarvestArgs, TilesArgs};

pub const DEFAULT_ZOOM: u8 = 15;

/// Optional settings file. Every field may be left out; command-line flags
/// take precedence over whatever is set here.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub log_file: Option<PathBuf>,
    pub verbose: Option<bool>,
    pub http: HttpConfig,
    pub api: ApiConfig,
    pub tiles: TilesConfig,
    pub harvest: HarvestConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
    pub user_agent: Option<String>,
    pub referer: Option<String>,
    pub connect_timeout_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TilesConfig {
    pub base_url: Option<String>,
    pub zoom: Option<u8>,
    pub extent: Option<u32>,
    pub concurrency: Option<usize>,
    pub max_bytes: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarvestConfig {
    pub concurrency: Option<usize>,
    pub chunk_size: Option<usize>,
    pub max_retries: Option<u32>,
    pub rate_limit_base_ms: Option<u64>,
    pub transient_delay_ms: Option<u64>,
}

impl AppConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("failed to parse config {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(ron::from_str(content)?)
    }

    fn http_settings(&self, defaults: HttpSettings, timeout_secs: Option<u64>) -> HttpSettings {
        let http = &self.http;
        HttpSettings {
            user_agent: http.user_agent.clone().unwrap_or(defaults.user_agent),
            referer: http.referer.clone().unwrap_or(defaults.referer),
            connect_timeout: http
                .connect_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.connect_timeout),
            request_timeout: timeout_secs
                .or(http.request_timeout_secs)
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
        }
    }

    pub fn api_settings(&self, args: &HarvestArgs) -> ApiSettings {
        let defaults = ApiSettings::default();
        ApiSettings {
            base_url: args
                .api_url
                .clone()
                .or_else(|| self.api.base_url.clone())
                .unwrap_or(defaults.base_url),
            http: self.http_settings(defaults.http, args.timeout_secs),
        }
    }

    pub fn harvest_settings(&self, args: &HarvestArgs) -> HarvestSettings {
        let defaults = HarvestSettings::default();
        let file = &self.harvest;
        let mut retry = defaults.retry;
        retry.max_retries = args
            .max_retries
            .or(file.max_retries)
            .unwrap_or(retry.max_retries);
        if let Some(ms) = file.rate_limit_base_ms {
            retry.rate_limit_base = Duration::from_millis(ms);
        }
        if let Some(ms) = file.transient_delay_ms {
            retry.transient_delay = Duration::from_millis(ms);
        }

        HarvestSettings {
            concurrency: args
                .concurrency
                .or(file.concurrency)
                .unwrap_or(defaults.concurrency),
            chunk_size: args
                .chunk_size
                .or(file.chunk_size)
                .unwrap_or(defaults.chunk_size),
            retry,
        }
    }

    /// Fails when neither the flag nor the file names a tile server.
    pub fn tile_settings(&self, args: &TilesArgs) -> anyhow::Result<TileSettings> {
        let base_url = args
            .tiles_url
            .clone()
            .or_else(|| self.tiles.base_url.clone())
            .ok_or_else(|| anyhow!("no tile server: pass --tiles-url or set tiles.base_url"))?;
        let defaults = TileSettings::new(base_url);
        let file = &self.tiles;

        Ok(TileSettings {
            http: self.http_settings(defaults.http.clone(), None),
            extent: args.extent.or(file.extent).unwrap_or(defaults.extent),
            concurrency: args
                .concurrency
                .or(file.concurrency)
                .unwrap_or(defaults.concurrency),
            max_bytes: file.max_bytes.unwrap_or(defaults.max_bytes),
            ..defaults
        })
    }

    pub fn zoom(&self, args: &TilesArgs) -> u8 {
        args.zoom.or(self.tiles.zoom).unwrap_or(DEFAULT_ZOOM)
    }

    pub fn log_file(&self, flag: Option<PathBuf>) -> Option<PathBuf> {
        flag.or_else(|| self.log_file.clone())
    }

    pub fn verbose(&self, flag: bool) -> bool {
        flag || self.verbose.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn harvest_args() -> HarvestArgs {
        HarvestArgs {
            input: PathBuf::from("in.csv"),
            output: PathBuf::from("out.csv"),
            api_url: None,
            concurrency: None,
            chunk_size: None,
            max_retries: None,
            timeout_secs: None,
        }
    }

    fn tiles_args() -> TilesArgs {
        TilesArgs {
            north: 24.9,
            south: 24.5,
            east: 46.9,
            west: 46.5,
            zoom: None,
            tiles_url: None,
            output: PathBuf::from("parcels.csv"),
            extent: None,
            concurrency: None,
        }
    }

    const SAMPLE: &str = r#"(
        verbose: Some(true),
        http: (referer: Some("https://example.test/"), request_timeout_secs: Some(7)),
        api: (base_url: Some("http://localhost:9000")),
        tiles: (base_url: Some("http://tiles.test/maps"), zoom: Some(14)),
        harvest: (concurrency: Some(12), chunk_size: Some(250), rate_limit_base_ms: Some(500)),
    )"#;

    #[test]
    fn empty_file_means_defaults() {
        let config = AppConfig::parse("()").unwrap();
        assert_eq!(config, AppConfig::default());

        let settings = config.harvest_settings(&harvest_args());
        assert_eq!(settings.concurrency, 40);
        assert_eq!(settings.chunk_size, 1000);
        assert_eq!(settings.retry.max_retries, 5);
        assert_eq!(config.zoom(&tiles_args()), DEFAULT_ZOOM);
    }

    #[test]
    fn file_values_replace_defaults() {
        let config = AppConfig::parse(SAMPLE).unwrap();

        let api = config.api_settings(&harvest_args());
        assert_eq!(api.base_url, "http://localhost:9000");
        assert_eq!(api.http.referer, "https://example.test/");
        assert_eq!(api.http.request_timeout, Duration::from_secs(7));

        let harvest = config.harvest_settings(&harvest_args());
        assert_eq!(harvest.concurrency, 12);
        assert_eq!(harvest.chunk_size, 250);
        assert_eq!(harvest.retry.rate_limit_base, Duration::from_millis(500));
        assert!(config.verbose(false));
    }

    #[test]
    fn flags_override_the_file() {
        let config = AppConfig::parse(SAMPLE).unwrap();
        let args = HarvestArgs {
            api_url: Some("http://flag.test".to_string()),
            concurrency: Some(3),
            max_retries: Some(2),
            timeout_secs: Some(1),
            ..harvest_args()
        };

        let api = config.api_settings(&args);
        assert_eq!(api.base_url, "http://flag.test");
        assert_eq!(api.http.request_timeout, Duration::from_secs(1));

        let harvest = config.harvest_settings(&args);
        assert_eq!(harvest.concurrency, 3);
        assert_eq!(harvest.chunk_size, 250);
        assert_eq!(harvest.retry.max_retries, 2);

        let tiles = TilesArgs {
            zoom: Some(16),
            ..tiles_args()
        };
        assert_eq!(config.zoom(&tiles), 16);
    }

    #[test]
    fn tile_server_comes_from_flag_or_file() {
        assert!(AppConfig::default().tile_settings(&tiles_args()).is_err());

        let config = AppConfig::parse(SAMPLE).unwrap();
        let settings = config.tile_settings(&tiles_args()).unwrap();
        assert_eq!(settings.base_url, "http://tiles.test/maps");
        assert_eq!(settings.extent, 4096);
        assert_eq!(settings.http.request_timeout, Duration::from_secs(7));

        let flagged = TilesArgs {
            tiles_url: Some("http://flag.test/tiles".to_string()),
            extent: Some(512),
            ..tiles_args()
        };
        let settings = config.tile_settings(&flagged).unwrap();
        assert_eq!(settings.base_url, "http://flag.test/tiles");
        assert_eq!(settings.extent, 512);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(AppConfig::parse("(harvest: (threads: Some(4)))").is_err());
    }

    #[test]
    fn load_reports_missing_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let err = AppConfig::load(&temp.path().join("missing.ron")).unwrap_err();
        assert!(err.to_string().contains("failed to read config"));
    }
}
