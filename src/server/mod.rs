//! HTTP server layer for Terra Streamer.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │        GET /tiles/{layer}/{level}/{col}/{row}[.ext]             │
//! │                                                                 │
//! │  ┌──────────────────────────┐  ┌─────────────────────────────┐  │
//! │  │        handlers          │  │           routes            │  │
//! │  │ (tiles, layers, health)  │  │  (router, CORS, tracing)    │  │
//! │  └──────────────────────────┘  └─────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod routes;

pub use handlers::{
    health_handler, layer_metadata_handler, layers_handler, tile_handler, AppState,
    ErrorResponse, HandlerError, HealthResponse, LayerMetadataResponse, LayersResponse,
    TilePathParams,
};
pub use routes::{create_router, RouterConfig};
