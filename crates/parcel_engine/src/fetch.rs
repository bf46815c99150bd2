use futures_util::StreamExt;
use parcel_core::{FetchOutcome, TileCoordinate};
use reqwest::header::{HeaderMap, HeaderValue, CONNECTION, REFERER};
use reqwest::StatusCode;
use url::Url;

use crate::settings::{ApiSettings, HttpSettings, TileSettings};
use crate::{FailureKind, FetchError};

/// One attribute lookup per call; never fails, every fault is an outcome.
#[async_trait::async_trait]
pub trait AttributeClient: Send + Sync {
    async fn fetch_attributes(&self, object_id: &str) -> FetchOutcome;
}

/// Raw vector-tile payload for one tile.
#[async_trait::async_trait]
pub trait TileSource: Send + Sync {
    async fn fetch_tile(&self, tile: TileCoordinate) -> Result<Vec<u8>, FetchError>;
}

fn build_client(settings: &HttpSettings) -> Result<reqwest::Client, FetchError> {
    let mut headers = HeaderMap::new();
    let referer = HeaderValue::from_str(&settings.referer)
        .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
    headers.insert(REFERER, referer);
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));

    reqwest::Client::builder()
        .user_agent(settings.user_agent.clone())
        .default_headers(headers)
        .connect_timeout(settings.connect_timeout)
        .timeout(settings.request_timeout)
        .build()
        .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))
}

#[derive(Debug, Clone)]
pub struct ReqwestAttributeClient {
    client: reqwest::Client,
    endpoint: Url,
}

impl ReqwestAttributeClient {
    pub fn new(settings: &ApiSettings) -> Result<Self, FetchError> {
        let base = settings.base_url.trim_end_matches('/');
        let endpoint = Url::parse(&format!("{base}/parcel/buildingRules"))
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
        Ok(Self {
            client: build_client(&settings.http)?,
            endpoint,
        })
    }

    pub fn request_url(&self, object_id: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("parcelObjectId", object_id);
        url
    }
}

#[async_trait::async_trait]
impl AttributeClient for ReqwestAttributeClient {
    async fn fetch_attributes(&self, object_id: &str) -> FetchOutcome {
        let response = match self.client.get(self.request_url(object_id)).send().await {
            Ok(response) => response,
            Err(err) => return FetchOutcome::ConnectionError(map_reqwest_error(err).to_string()),
        };

        let status = response.status();
        if status != StatusCode::OK {
            return FetchOutcome::from_response(status.as_u16(), &[]);
        }

        match response.bytes().await {
            Ok(body) => FetchOutcome::from_response(status.as_u16(), &body),
            Err(err) => FetchOutcome::ConnectionError(map_reqwest_error(err).to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReqwestTileSource {
    client: reqwest::Client,
    base_url: String,
    max_bytes: u64,
}

impl ReqwestTileSource {
    pub fn new(settings: &TileSettings) -> Result<Self, FetchError> {
        Ok(Self {
            client: build_client(&settings.http)?,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            max_bytes: settings.max_bytes,
        })
    }

    pub fn tile_url(&self, tile: TileCoordinate) -> String {
        format!(
            "{}/{}/{}/{}.vector.pbf",
            self.base_url, tile.zoom, tile.x, tile.y
        )
    }
}

#[async_trait::async_trait]
impl TileSource for ReqwestTileSource {
    async fn fetch_tile(&self, tile: TileCoordinate) -> Result<Vec<u8>, FetchError> {
        let url = Url::parse(&self.tile_url(tile))
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        if let Some(content_len) = response.content_length() {
            if content_len > self.max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes: self.max_bytes,
                        actual: Some(content_len),
                    },
                    "tile too large",
                ));
            }
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > self.max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes: self.max_bytes,
                        actual: Some(next_len),
                    },
                    "tile too large",
                ));
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok(bytes)
    }
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}
