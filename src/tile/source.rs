//! The tile source abstraction.
//!
//! A [`TileSource`] turns a [`TileAddress`] into tile content. Three
//! implementations exist:
//!
//! ```text
//!                    ┌──────────────────┐
//!                    │    TileSource    │
//!                    └────────┬─────────┘
//!          ┌──────────────────┼───────────────────┐
//!          ▼                  ▼                   ▼
//!   TerrariumSource    ArchiveTileSource    ArchiveTileSource
//!   (URL template,     (Vector: MVT bytes)  (Terrain: raster
//!    decode to grey)                         bytes)
//! ```
//!
//! Sources report every per-tile failure as a [`TileError`]. Rendering
//! hosts that must never stall on one tile use [`fetch_tile_or_empty`],
//! which turns any failure into the same empty payload.

use async_trait::async_trait;
use bytes::Bytes;
use image::RgbaImage;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::address::TileAddress;
use super::info::{Extent, TileInfo};
use crate::error::{LoadError, TileError};

/// Which kind of source a layer is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// URL-template Terrarium elevation tiles rendered as greyscale
    Terrarium,
    /// Vector tiles from an archive
    Vector,
    /// Elevation tiles from an archive, passed through undecoded
    Terrain,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Terrarium => "terrarium",
            SourceKind::Vector => "vector",
            SourceKind::Terrain => "terrain",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "terrarium" => Ok(SourceKind::Terrarium),
            "vector" => Ok(SourceKind::Vector),
            "terrain" => Ok(SourceKind::Terrain),
            other => Err(format!(
                "unknown source kind '{}' (expected terrarium, vector or terrain)",
                other
            )),
        }
    }
}

/// What a loaded source tells its host about itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceMetadata {
    pub tile_info: TileInfo,
    pub full_extent: Extent,
    /// MIME type of [`TilePayload::Data`] tiles, or of encoded rasters
    pub content_type: String,
}

/// Tile content returned by a source.
#[derive(Debug, Clone, PartialEq)]
pub enum TilePayload {
    /// Decoded, fully opaque RGBA raster
    Raster(RgbaImage),
    /// Raw tile bytes in the source's content type
    Data(Bytes),
    /// No content; rendered as a transparent tile of the given size
    Empty { width: u32, height: u32 },
}

impl TilePayload {
    /// The empty payload for a scheme's tile size.
    pub fn empty_for(tile_info: &TileInfo) -> Self {
        TilePayload::Empty {
            width: tile_info.size.0,
            height: tile_info.size.1,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, TilePayload::Empty { .. })
    }
}

/// A per-layer tile source.
#[async_trait]
pub trait TileSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Complete the layer's load lifecycle.
    ///
    /// Safe to call repeatedly and concurrently; the outcome is computed
    /// once and every caller observes the same result. An error here means
    /// the layer serves no tiles at all.
    async fn load(&self) -> Result<SourceMetadata, LoadError>;

    /// Fetch one tile.
    ///
    /// A tile the source legitimately lacks is `Ok(TilePayload::Empty)`.
    /// Cancelling `cancel` aborts in-flight I/O and yields
    /// [`TileError::Cancelled`].
    async fn fetch_tile(
        &self,
        address: TileAddress,
        cancel: &CancellationToken,
    ) -> Result<TilePayload, TileError>;

    /// Current tiling scheme: the loaded one, or the source's default
    /// before (or without) a successful load.
    fn tile_info(&self) -> TileInfo;
}

/// Fetch a tile, rendering every failure as an empty tile.
///
/// Configuration gaps are logged by the source itself; cancellations are
/// only traced, routine fetch failures logged at debug, and decode
/// failures at warn.
pub async fn fetch_tile_or_empty(
    source: &dyn TileSource,
    address: TileAddress,
    cancel: &CancellationToken,
) -> TilePayload {
    match source.fetch_tile(address, cancel).await {
        Ok(payload) => payload,
        Err(err) => {
            match &err {
                TileError::Cancelled => trace!(%address, "tile request cancelled"),
                TileError::ConfigMissing => {}
                TileError::FetchFailed(_) | TileError::Unavailable(_) => {
                    debug!(%address, kind = %source.kind(), error = %err, "tile unavailable")
                }
                TileError::DecodeFailed(_) => {
                    warn!(%address, kind = %source.kind(), error = %err, "tile decode failed")
                }
            }
            TilePayload::empty_for(&source.tile_info())
        }
    }
}

/// Run `work` unless `cancel` fires first.
pub(crate) async fn with_cancel<T, F>(cancel: &CancellationToken, work: F) -> Result<T, TileError>
where
    F: std::future::Future<Output = Result<T, TileError>>,
{
    if cancel.is_cancelled() {
        return Err(TileError::Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(TileError::Cancelled),
        result = work => result,
    }
}
