//! Terrarium elevation tiles from a URL template.
//!
//! ```text
//! address ──► resolve_url ──► fetch_raw ──► PNG decode ──► ElevationDecoder
//!               │ None            │ Err                       │
//!               ▼                 ▼                           ▼
//!         ConfigMissing   FetchFailed / Cancelled     Raster (greyscale)
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use image::RgbaImage;
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use super::address::TileAddress;
use super::decoder::ElevationDecoder;
use super::encoder::PNG_CONTENT_TYPE;
use super::info::{Extent, TileInfo};
use super::source::{with_cancel, SourceKind, SourceMetadata, TilePayload, TileSource};
use crate::error::{LoadError, TileError};
use crate::io::TileFetcher;

/// Placeholder replaced by the configured API key.
pub const API_KEY_PLACEHOLDER: &str = "{apiKey}";

/// Configuration of a Terrarium layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TerrariumConfig {
    /// Template with `{level}`, `{row}`, `{col}` and optionally `{apiKey}`
    pub url_template: Option<String>,
    pub api_key: Option<String>,
    pub min_elevation: Option<f64>,
    pub max_elevation: Option<f64>,
}

impl TerrariumConfig {
    pub fn new(url_template: impl Into<String>) -> Self {
        Self {
            url_template: Some(url_template.into()),
            ..Self::default()
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_elevation_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min_elevation = min;
        self.max_elevation = max;
        self
    }
}

/// Terrarium PNG tiles rendered as greyscale elevation.
pub struct TerrariumSource {
    config: TerrariumConfig,
    decoder: ElevationDecoder,
    fetcher: Arc<dyn TileFetcher>,
    tile_info: TileInfo,
    warned_missing_config: AtomicBool,
}

impl TerrariumSource {
    pub fn new(config: TerrariumConfig, fetcher: Arc<dyn TileFetcher>) -> Self {
        let decoder = ElevationDecoder::new(config.min_elevation, config.max_elevation);
        Self {
            config,
            decoder,
            fetcher,
            tile_info: TileInfo::terrarium(),
            warned_missing_config: AtomicBool::new(false),
        }
    }

    /// Replace the default levels 0..=15 scheme.
    pub fn with_tile_info(mut self, tile_info: TileInfo) -> Self {
        self.tile_info = tile_info;
        self
    }

    pub fn config(&self) -> &TerrariumConfig {
        &self.config
    }

    /// Build the request URL for `address`.
    ///
    /// Without an API key, query parameters whose value is the key
    /// placeholder are dropped along with their delimiter. Returns `None`
    /// when no template is configured.
    pub fn resolve_url(&self, address: TileAddress) -> Option<String> {
        let template = self.config.url_template.as_deref().filter(|t| !t.is_empty())?;

        let url = template
            .replace("{level}", &address.level.to_string())
            .replace("{row}", &address.row.to_string())
            .replace("{col}", &address.col.to_string());

        match self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            Some(key) => Some(url.replace(API_KEY_PLACEHOLDER, key)),
            None => Some(strip_api_key_param(&url)),
        }
    }

    /// Fetch the undecoded tile bytes.
    pub async fn fetch_raw(
        &self,
        address: TileAddress,
        cancel: &CancellationToken,
    ) -> Result<Bytes, TileError> {
        let Some(url) = self.resolve_url(address) else {
            if !self.warned_missing_config.swap(true, Ordering::Relaxed) {
                warn!("terrarium source has no URL template; serving empty tiles");
            }
            return Err(TileError::ConfigMissing);
        };

        trace!(%address, url = %url, "fetching terrarium tile");
        with_cancel(cancel, async {
            self.fetcher.fetch(&url).await.map_err(TileError::from)
        })
        .await
    }

    /// Decode PNG bytes and render them as greyscale.
    pub fn decode(&self, bytes: &[u8]) -> Result<RgbaImage, TileError> {
        let image = image::load_from_memory(bytes)
            .map_err(|e| TileError::DecodeFailed(e.to_string()))?
            .to_rgba8();
        Ok(self.decoder.visualize(&image))
    }
}

#[async_trait]
impl TileSource for TerrariumSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Terrarium
    }

    async fn load(&self) -> Result<SourceMetadata, LoadError> {
        Ok(SourceMetadata {
            tile_info: self.tile_info.clone(),
            full_extent: Extent::web_mercator_world(),
            content_type: PNG_CONTENT_TYPE.to_string(),
        })
    }

    async fn fetch_tile(
        &self,
        address: TileAddress,
        cancel: &CancellationToken,
    ) -> Result<TilePayload, TileError> {
        let bytes = self.fetch_raw(address, cancel).await?;
        self.decode(&bytes).map(TilePayload::Raster)
    }

    fn tile_info(&self) -> TileInfo {
        self.tile_info.clone()
    }
}

/// Drop query parameters carrying the API key placeholder.
fn strip_api_key_param(url: &str) -> String {
    let Some((base, query)) = url.split_once('?') else {
        return url.to_string();
    };
    let kept: Vec<&str> = query
        .split('&')
        .filter(|param| !param.contains(API_KEY_PLACEHOLDER))
        .collect();
    if kept.is_empty() {
        base.to_string()
    } else {
        format!("{}?{}", base, kept.join("&"))
    }
}
