//! # Terra Streamer
//!
//! A tile server for elevation and vector tiles.
//!
//! Terrarium elevation tiles are fetched from a URL template and decoded into
//! greyscale PNGs. Vector and terrain tiles are read from PMTiles archives on
//! HTTP, S3 or local storage using range requests, without downloading whole
//! archives.
//!
//! ## Features
//!
//! - **Terrarium decoding**: RGB-packed elevation to normalized greyscale, with
//!   a global or per-tile range
//! - **Range-based archives**: PMTiles v3 header and directory parsing over
//!   HTTP, S3 or file range reads
//! - **Shared archive cache**: one open per archive URL, even under concurrent
//!   first requests
//! - **Multi-level caching**: archives, leaf directories and encoded tiles
//!
//! ## Architecture
//!
//! - [`io`] - Range readers, upstream authentication and the tile fetcher
//! - [`archive`] - PMTiles parsing and the single-flight archive cache
//! - [`tile`] - Tile sources, elevation decoding and the tile service
//! - [`layers`] - Building tile sources from layer definitions
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use terra_streamer::{
//!     create_http_client, create_router, ArchiveCache, HttpFetcher, LayerDefinition,
//!     LayerFactory, RouterConfig, SourceAuth, TileCache, UrlArchiveSource,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let http = create_http_client(std::time::Duration::from_secs(30))?;
//!     let fetcher = Arc::new(HttpFetcher::new(http.clone(), SourceAuth::None));
//!     let archives = Arc::new(ArchiveCache::new(Arc::new(UrlArchiveSource::new(
//!         http,
//!         SourceAuth::None,
//!     ))));
//!
//!     let layers: Vec<LayerDefinition> = vec!["elevation=terrarium:https://tiles.example.com/{level}/{col}/{row}.png"
//!         .parse()?];
//!     let service = LayerFactory::new(fetcher, archives).build_service(&layers, TileCache::new());
//!     service.load_all().await;
//!
//!     let router = create_router(service, RouterConfig::new());
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, router).await?;
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod config;
pub mod error;
pub mod io;
pub mod layers;
pub mod server;
pub mod tile;

// Re-export commonly used types
pub use archive::{ArchiveCache, ArchiveHandle, ArchiveHeader, ArchiveSource, UrlArchiveSource};
pub use config::{Cli, Command, Config, LayerDefinition};
pub use error::{ArchiveError, ConfigError, IoError, LoadError, ServiceError, TileError};
pub use io::{
    create_http_client, create_s3_client, HttpFetcher, RangeReader, SourceAuth, TileFetcher,
};
pub use layers::LayerFactory;
pub use server::{create_router, AppState, RouterConfig};
pub use tile::{
    ArchiveKind, ArchiveTileSource, ElevationDecoder, LayerState, SourceKind, SourceMetadata,
    TerrariumConfig, TerrariumSource, TileAddress, TileCache, TileInfo, TilePayload,
    TileResponse, TileService, TileSource,
};
