//! Tile Service for orchestrating tile delivery.
//!
//! The TileService is the main entry point for tile requests. It owns the
//! named layers and the tile cache, and turns source payloads into bytes an
//! HTTP response can carry.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         TileService                              │
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │                    get_tile()                           │    │
//! │  │  1. Find layer        4. Fetch from source              │    │
//! │  │  2. Check load state  5. Encode rasters as PNG          │    │
//! │  │  3. Check cache       6. Cache & return                 │    │
//! │  └─────────────────────────────────────────────────────────┘    │
//! │           │                    │                    │            │
//! │           ▼                    ▼                    ▼            │
//! │    ┌───────────┐      ┌──────────────┐    ┌──────────────────┐  │
//! │    │ TileCache │      │  TileSource  │    │   PNG encoder    │  │
//! │    └───────────┘      │   (layers)   │    └──────────────────┘  │
//! │                       └──────────────┘                          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use futures::future::join_all;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{LoadError, ServiceError};

use super::address::TileAddress;
use super::cache::{TileCache, TileCacheKey};
use super::encoder::{encode_png, encode_transparent_png};
use super::source::{fetch_tile_or_empty, SourceKind, SourceMetadata, TilePayload, TileSource};

// =============================================================================
// Layer State
// =============================================================================

/// Outcome of a layer's load lifecycle.
#[derive(Debug, Clone)]
pub enum LayerState {
    Loaded(SourceMetadata),
    Failed(LoadError),
}

impl LayerState {
    fn from_result(result: Result<SourceMetadata, LoadError>) -> Self {
        match result {
            Ok(metadata) => LayerState::Loaded(metadata),
            Err(err) => LayerState::Failed(err),
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, LayerState::Loaded(_))
    }

    pub fn metadata(&self) -> Option<&SourceMetadata> {
        match self {
            LayerState::Loaded(metadata) => Some(metadata),
            LayerState::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&LoadError> {
        match self {
            LayerState::Loaded(_) => None,
            LayerState::Failed(err) => Some(err),
        }
    }
}

/// One entry of the layer listing.
#[derive(Debug, Clone, Serialize)]
pub struct LayerSummary {
    pub name: String,
    pub kind: SourceKind,
    pub loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// =============================================================================
// Tile Response
// =============================================================================

/// Response from the tile service.
#[derive(Debug, Clone)]
pub struct TileResponse {
    /// Encoded tile, or `None` when the layer has no tile at this address
    pub data: Option<Bytes>,

    /// MIME type of `data`
    pub content_type: String,

    /// Whether this tile was served from cache
    pub cache_hit: bool,

    /// Whether this is the layer's empty tile; such responses may reflect a
    /// transient upstream failure and must not be cached downstream
    pub empty: bool,
}

// =============================================================================
// Tile Service
// =============================================================================

/// Service for serving and caching tiles of named layers.
///
/// Raster payloads are PNG-encoded; raw payloads pass through unchanged.
/// Per-tile failures never surface as errors: they render as the layer's
/// empty tile, which is a transparent PNG for raster layers and no content
/// for archive layers. Only an unknown layer, a failed layer load, or an
/// address outside the grid fail the request.
///
/// # Example
///
/// ```ignore
/// use terra_streamer::tile::{TileAddress, TileService};
///
/// let mut service = TileService::new();
/// service.add_layer("elevation", Arc::new(terrarium_source));
/// service.load_all().await;
///
/// let response = service
///     .get_tile("elevation", TileAddress::new(3, 2, 5), &CancellationToken::new())
///     .await?;
/// ```
pub struct TileService {
    /// Layers by name
    layers: BTreeMap<String, Arc<dyn TileSource>>,

    /// Cache for encoded tiles
    cache: TileCache,
}

impl TileService {
    /// Create a new tile service with default cache settings.
    pub fn new() -> Self {
        Self::with_cache(TileCache::new())
    }

    /// Create a new tile service with custom cache capacity in bytes.
    pub fn with_cache_capacity(cache_capacity: usize) -> Self {
        Self::with_cache(TileCache::with_capacity(cache_capacity))
    }

    pub fn with_cache(cache: TileCache) -> Self {
        Self {
            layers: BTreeMap::new(),
            cache,
        }
    }

    /// Register a layer, replacing any layer of the same name.
    pub fn add_layer(&mut self, name: impl Into<String>, source: Arc<dyn TileSource>) {
        self.layers.insert(name.into(), source);
    }

    pub fn layer(&self, name: &str) -> Option<&Arc<dyn TileSource>> {
        self.layers.get(name)
    }

    pub fn layer_names(&self) -> impl Iterator<Item = &str> {
        self.layers.keys().map(String::as_str)
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Run every layer's load lifecycle concurrently.
    ///
    /// Returns the state of each layer in name order. Failures are logged
    /// here once; later requests see the same state without re-logging.
    pub async fn load_all(&self) -> Vec<(String, LayerState)> {
        let loads = self.layers.iter().map(|(name, source)| async move {
            let state = LayerState::from_result(source.load().await);
            match &state {
                LayerState::Loaded(metadata) => info!(
                    layer = %name,
                    kind = %source.kind(),
                    levels = metadata.tile_info.lods.len(),
                    content_type = %metadata.content_type,
                    "layer ready"
                ),
                LayerState::Failed(err) => warn!(
                    layer = %name,
                    kind = %source.kind(),
                    error = %err,
                    "layer failed to load; its tiles will be unavailable"
                ),
            }
            (name.clone(), state)
        });
        join_all(loads).await
    }

    /// Current state of one layer, completing its load if needed.
    pub async fn layer_state(&self, name: &str) -> Result<LayerState, ServiceError> {
        let source = self.find_layer(name)?;
        Ok(LayerState::from_result(source.load().await))
    }

    /// Listing of every layer in name order.
    pub async fn layers(&self) -> Vec<LayerSummary> {
        let mut out = Vec::with_capacity(self.layers.len());
        for (name, source) in &self.layers {
            let result = source.load().await;
            out.push(LayerSummary {
                name: name.clone(),
                kind: source.kind(),
                loaded: result.is_ok(),
                error: result.err().map(|e| e.to_string()),
            });
        }
        out
    }

    /// Get a tile, using cache when available.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::LayerNotFound`] for an unknown layer
    /// - [`ServiceError::LayerUnavailable`] when the layer failed to load
    /// - [`ServiceError::InvalidAddress`] for a row or column outside the grid
    /// - [`ServiceError::Encode`] when a raster cannot be PNG-encoded
    pub async fn get_tile(
        &self,
        layer: &str,
        address: TileAddress,
        cancel: &CancellationToken,
    ) -> Result<TileResponse, ServiceError> {
        let source = self.find_layer(layer)?;
        let metadata = source
            .load()
            .await
            .map_err(|source| ServiceError::LayerUnavailable {
                layer: layer.to_string(),
                source,
            })?;

        if !address.in_grid() {
            return Err(ServiceError::InvalidAddress {
                level: address.level,
                row: address.row,
                col: address.col,
            });
        }

        let cache_key = TileCacheKey::new(layer, address);
        if let Some(cached) = self.cache.get(&cache_key).await {
            return Ok(TileResponse {
                data: Some(cached),
                content_type: metadata.content_type,
                cache_hit: true,
                empty: false,
            });
        }

        let payload = fetch_tile_or_empty(source.as_ref(), address, cancel).await;
        let empty = payload.is_empty();
        let data = match payload {
            TilePayload::Raster(image) => {
                let png = encode_png(&image).map_err(|e| ServiceError::Encode(e.to_string()))?;
                self.cache.put(cache_key, png.clone()).await;
                Some(png)
            }
            TilePayload::Data(bytes) => {
                self.cache.put(cache_key, bytes.clone()).await;
                Some(bytes)
            }
            TilePayload::Empty { width, height } => {
                debug!(layer, %address, "serving empty tile");
                if source.kind() == SourceKind::Terrarium {
                    Some(
                        encode_transparent_png(width, height)
                            .map_err(|e| ServiceError::Encode(e.to_string()))?,
                    )
                } else {
                    None
                }
            }
        };

        Ok(TileResponse {
            data,
            content_type: metadata.content_type,
            cache_hit: false,
            empty,
        })
    }

    /// Get tile cache statistics.
    ///
    /// Returns `(current_size, capacity, entry_count)`.
    pub async fn cache_stats(&self) -> (usize, usize, usize) {
        let size = self.cache.size().await;
        let capacity = self.cache.capacity();
        let count = self.cache.len().await;
        (size, capacity, count)
    }

    /// Clear the tile cache.
    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    fn find_layer(&self, name: &str) -> Result<&Arc<dyn TileSource>, ServiceError> {
        self.layers
            .get(name)
            .ok_or_else(|| ServiceError::LayerNotFound(name.to_string()))
    }
}

impl Default for TileService {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
