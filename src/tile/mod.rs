//! Tile sources and the tile service.
//!
//! Layers are [`TileSource`]s: either a Terrarium URL template decoded to
//! greyscale, or a PMTiles archive served as-is. The [`TileService`] sits
//! between the HTTP layer and the sources:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              HTTP Handlers              │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │              Tile Service               │
//! │  ┌──────────────┐  ┌─────────────────┐  │
//! │  │  TileCache   │  │   PNG encoder   │  │
//! │  │  (encoded    │  │   (rasters)     │  │
//! │  │   tiles)     │  │                 │  │
//! │  └──────────────┘  └─────────────────┘  │
//! └────────────────────┬────────────────────┘
//!                      │
//!          ┌───────────┴────────────┐
//!          ▼                        ▼
//! ┌──────────────────┐    ┌───────────────────┐
//! │ TerrariumSource  │    │ ArchiveTileSource │
//! │ fetch → decode → │    │   ArchiveCache    │
//! │ ElevationDecoder │    │   (shared)        │
//! └──────────────────┘    └───────────────────┘
//! ```
//!
//! # Components
//!
//! - [`TileService`]: named layers, load state, cache and encoding
//! - [`TileCache`]: LRU cache for encoded tiles with size-based eviction
//! - [`TerrariumSource`]: Terrarium PNG tiles from a URL template
//! - [`ArchiveTileSource`]: vector or terrain tiles from a PMTiles archive
//! - [`ElevationDecoder`]: Terrarium RGB to normalized greyscale
//! - [`TileInfo`]: tiling scheme reported by a loaded source

mod address;
mod archive_source;
mod cache;
mod decoder;
mod encoder;
mod info;
mod service;
mod source;
mod terrarium;

pub use address::TileAddress;
pub use archive_source::{ArchiveKind, ArchiveTileSource};
pub use cache::{TileCache, TileCacheKey, DEFAULT_TILE_CACHE_CAPACITY, DEFAULT_TILE_CACHE_ENTRIES};
pub use decoder::{decode_terrarium, ElevationDecoder, ElevationRaster, FLAT_TILE_GREY};
pub use encoder::{encode_png, encode_transparent_png, PNG_CONTENT_TYPE};
pub use info::{
    load_header_derived_info, Extent, HeaderDerivedInfo, LevelOfDetail, Point, TileInfo,
    DEFAULT_TILE_SIZE, TERRARIUM_MAX_LEVEL, WEB_MERCATOR_WKID, WGS84_WKID,
};
pub use service::{LayerState, LayerSummary, TileResponse, TileService};
pub use source::{fetch_tile_or_empty, SourceKind, SourceMetadata, TilePayload, TileSource};
pub use terrarium::{TerrariumConfig, TerrariumSource, API_KEY_PLACEHOLDER};
