//! HTTP request handlers for the Terra Streamer tile API.
//!
//! # Endpoints
//!
//! - `GET /tiles/{layer}/{level}/{col}/{row}[.ext]` - Serve a tile
//! - `GET /layers` - List layers and their load state
//! - `GET /layers/{layer}` - Layer metadata
//! - `GET /health` - Health check endpoint

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::error::ServiceError;
use crate::tile::{Extent, LayerState, LayerSummary, SourceKind, TileAddress, TileInfo, TileService};

// =============================================================================
// Application State
// =============================================================================

/// Shared application state containing the tile service.
///
/// This is passed to all handlers via Axum's State extractor.
#[derive(Clone)]
pub struct AppState {
    /// The tile service for processing tile requests
    pub tile_service: Arc<TileService>,

    /// Cache-Control max-age in seconds for tile responses
    pub cache_max_age: u32,
}

impl AppState {
    /// Create a new application state with the default max-age (1 hour).
    pub fn new(tile_service: TileService) -> Self {
        Self::with_cache_max_age(tile_service, 3600)
    }

    /// Create a new application state with custom cache max-age.
    pub fn with_cache_max_age(tile_service: TileService, cache_max_age: u32) -> Self {
        Self {
            tile_service: Arc::new(tile_service),
            cache_max_age,
        }
    }
}

// =============================================================================
// Request Parameters
// =============================================================================

/// Path parameters for tile requests.
///
/// Extracted from: `/tiles/{layer}/{level}/{col}/{filename}`
/// where filename is `{row}` or `{row}.{ext}`. The order is XYZ: `col` is
/// x and `row` is y. Numeric segments stay strings here so malformed values
/// are reported through [`HandlerError`] rather than the extractor.
#[derive(Debug, Deserialize)]
pub struct TilePathParams {
    /// Layer name
    pub layer: String,

    /// Zoom level
    pub level: String,

    /// Tile column (x)
    pub col: String,

    /// Tile row (y) with an optional extension, e.g. "5" or "5.png"
    pub filename: String,
}

impl TilePathParams {
    /// Parse the row from the filename, ignoring any extension.
    pub fn row(&self) -> Result<u32, std::num::ParseIntError> {
        let row = match self.filename.split_once('.') {
            Some((row, _ext)) => row,
            None => &self.filename,
        };
        row.parse()
    }

    /// Parse every numeric segment into a tile address.
    pub fn address(&self) -> Result<TileAddress, HandlerError> {
        let level = self
            .level
            .parse::<u8>()
            .map_err(|_| HandlerError::BadRequest(format!("Invalid tile level: {}", self.level)))?;
        let col = self
            .col
            .parse::<u32>()
            .map_err(|_| HandlerError::BadRequest(format!("Invalid tile column: {}", self.col)))?;
        let row = self
            .row()
            .map_err(|_| HandlerError::BadRequest(format!("Invalid tile row: {}", self.filename)))?;
        Ok(TileAddress::new(level, row, col))
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "layer_unavailable")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    /// Create a new error response.
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    /// Create a new error response with status code.
    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,

    /// Number of configured layers
    pub layers: usize,
}

/// Response from the layers list endpoint.
#[derive(Debug, Serialize)]
pub struct LayersResponse {
    pub layers: Vec<LayerSummary>,
}

/// Response from the layer metadata endpoint.
#[derive(Debug, Serialize)]
pub struct LayerMetadataResponse {
    pub name: String,
    pub kind: SourceKind,
    pub loaded: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tile_info: Option<TileInfo>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_extent: Option<Extent>,

    /// MIME type of the layer's tiles
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    /// Load failure, when the layer is unavailable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LayerMetadataResponse {
    fn new(name: String, kind: SourceKind, state: LayerState) -> Self {
        match state {
            LayerState::Loaded(metadata) => Self {
                name,
                kind,
                loaded: true,
                tile_info: Some(metadata.tile_info),
                full_extent: Some(metadata.full_extent),
                content_type: Some(metadata.content_type),
                error: None,
            },
            LayerState::Failed(err) => Self {
                name,
                kind,
                loaded: false,
                tile_info: None,
                full_extent: None,
                content_type: None,
                error: Some(err.to_string()),
            },
        }
    }
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Errors a handler can answer with.
#[derive(Debug)]
pub enum HandlerError {
    Service(ServiceError),
    BadRequest(String),
}

impl From<ServiceError> for HandlerError {
    fn from(err: ServiceError) -> Self {
        HandlerError::Service(err)
    }
}

/// Convert handler errors to HTTP responses.
///
/// Logging follows severity: 5xx at ERROR, 503 at WARN, 404 at DEBUG and
/// other 4xx at WARN.
impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            HandlerError::BadRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            HandlerError::Service(err) => match err {
                ServiceError::LayerNotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
                ServiceError::LayerUnavailable { .. } => {
                    (StatusCode::SERVICE_UNAVAILABLE, "layer_unavailable")
                }
                ServiceError::InvalidAddress { .. } => {
                    (StatusCode::BAD_REQUEST, "tile_out_of_bounds")
                }
                ServiceError::Encode(_) => (StatusCode::INTERNAL_SERVER_ERROR, "encode_error"),
            },
        };
        let message = match self {
            HandlerError::BadRequest(message) => message,
            HandlerError::Service(err) => err.to_string(),
        };

        if status == StatusCode::SERVICE_UNAVAILABLE {
            warn!(error_type, status = status.as_u16(), "Layer unavailable: {}", message);
        } else if status.is_server_error() {
            error!(error_type, status = status.as_u16(), "Server error: {}", message);
        } else if status == StatusCode::NOT_FOUND {
            debug!(error_type, status = status.as_u16(), "Resource not found: {}", message);
        } else {
            warn!(error_type, status = status.as_u16(), "Client error: {}", message);
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);
        (status, Json(error_response)).into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle tile requests.
///
/// # Endpoint
///
/// `GET /tiles/{layer}/{level}/{col}/{row}[.ext]`
///
/// # Response
///
/// - `200 OK`: tile bytes; PNG for Terrarium layers, the archive's tile
///   type otherwise
/// - `204 No Content`: the archive has no tile at this address
/// - `400 Bad Request`: malformed level, column or row, or an address
///   outside the grid
/// - `404 Not Found`: unknown layer
/// - `503 Service Unavailable`: the layer failed to load
///
/// # Headers
///
/// - `Content-Type` from the layer
/// - `Cache-Control: public, max-age={cache_max_age}`, or `no-store` for
///   empty tiles
/// - `X-Tile-Cache-Hit: true|false`
pub async fn tile_handler(
    State(state): State<AppState>,
    Path(params): Path<TilePathParams>,
) -> Result<Response, HandlerError> {
    let address = params.address()?;

    // Cancelled when the client goes away and this future is dropped.
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let response = state
        .tile_service
        .get_tile(&params.layer, address, &cancel)
        .await?;

    // Empty tiles may stand in for a transient upstream failure.
    let cache_control = if response.empty {
        "no-store".to_string()
    } else {
        format!("public, max-age={}", state.cache_max_age)
    };
    let http_response = match response.data {
        Some(data) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, response.content_type),
                (header::CACHE_CONTROL, cache_control),
                (
                    header::HeaderName::from_static("x-tile-cache-hit"),
                    response.cache_hit.to_string(),
                ),
            ],
            data,
        )
            .into_response(),
        None => (StatusCode::NO_CONTENT, [(header::CACHE_CONTROL, cache_control)]).into_response(),
    };

    Ok(http_response)
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        layers: state.tile_service.layer_count(),
    })
}

/// Handle layer list requests.
///
/// # Endpoint
///
/// `GET /layers`
///
/// `200 OK` with every layer's name, kind and whether it loaded.
pub async fn layers_handler(State(state): State<AppState>) -> Json<LayersResponse> {
    Json(LayersResponse {
        layers: state.tile_service.layers().await,
    })
}

/// Handle layer metadata requests.
///
/// # Endpoint
///
/// `GET /layers/{layer}`
///
/// `200 OK` with the tiling scheme, extent and content type of a loaded
/// layer, or the load error of a failed one. `404 Not Found` for an unknown
/// layer.
pub async fn layer_metadata_handler(
    State(state): State<AppState>,
    Path(layer): Path<String>,
) -> Result<Json<LayerMetadataResponse>, HandlerError> {
    let layer_state = state.tile_service.layer_state(&layer).await?;
    let kind = state
        .tile_service
        .layer(&layer)
        .map(|source| source.kind())
        .ok_or_else(|| ServiceError::LayerNotFound(layer.clone()))?;

    Ok(Json(LayerMetadataResponse::new(layer, kind, layer_state)))
}

// =============================================================================
// Tests
// =============================================================================
