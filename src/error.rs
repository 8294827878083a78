use thiserror::Error;

/// I/O errors that can occur when reading from remote or local storage
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// Error from S3 or S3-compatible storage
    #[error("S3 error: {0}")]
    S3(String),

    /// Upstream answered with a non-success HTTP status
    #[error("HTTP status {status} for {url}")]
    Status { url: String, status: u16 },

    /// Requested range exceeds resource bounds
    #[error("Range out of bounds: requested {requested} bytes at offset {offset}, size is {size}")]
    RangeOutOfBounds {
        offset: u64,
        requested: u64,
        size: u64,
    },

    /// Network or connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Object not found
    #[error("Object not found: {0}")]
    NotFound(String),

    /// Location string could not be interpreted as an archive location
    #[error("Invalid location: {0}")]
    InvalidLocation(String),
}

/// Errors that can occur when reading a PMTiles archive
#[derive(Debug, Clone, Error)]
pub enum ArchiveError {
    /// I/O error while reading the archive
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// First bytes are not the PMTiles magic
    #[error("Invalid archive magic: expected \"PMTiles\"")]
    InvalidMagic,

    /// Archive format version other than 3
    #[error("Unsupported archive version: expected 3, got {0}")]
    UnsupportedVersion(u8),

    /// Archive is too small to contain a valid header
    #[error("Archive header truncated: need at least {required} bytes, got {actual}")]
    HeaderTooShort { required: usize, actual: usize },

    /// Compression scheme this reader cannot undo
    #[error("Unsupported compression: {0}")]
    UnsupportedCompression(String),

    /// Directory bytes could not be decoded
    #[error("Invalid directory: {0}")]
    InvalidDirectory(String),

    /// Leaf directories nest deeper than the format allows
    #[error("Directory nesting exceeds {max_depth} levels")]
    DirectoryTooDeep { max_depth: usize },

    /// Decompression failed
    #[error("Decompression failed: {0}")]
    Decompression(String),
}

/// Terminal errors of a layer's load lifecycle.
///
/// A load error makes the whole layer unusable; it is reported once and
/// then exposed through the layer's state instead of failing each tile.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    /// No URL was configured for the layer
    #[error("No archive URL configured")]
    ConfigMissing,

    /// The archive could not be opened or its header was unreadable
    #[error("Failed to open archive {url}: {source}")]
    Archive { url: String, source: ArchiveError },

    /// A vector layer was pointed at an archive holding another tile type
    #[error("Archive {url} holds {actual} tiles, expected {expected}")]
    TileTypeMismatch {
        url: String,
        expected: String,
        actual: String,
    },
}

/// Per-tile errors returned by tile sources.
///
/// Callers choose whether to render an empty tile or to propagate; see
/// [`crate::tile::fetch_tile_or_empty`] for the rendering policy.
#[derive(Debug, Clone, Error)]
pub enum TileError {
    /// No URL or URL template is configured for the source
    #[error("Tile source has no URL configured")]
    ConfigMissing,

    /// Network error, non-success status, or unreadable archive range
    #[error("Tile fetch failed: {0}")]
    FetchFailed(String),

    /// The request was cancelled before it completed
    #[error("Tile request cancelled")]
    Cancelled,

    /// Fetched bytes could not be decoded into an image
    #[error("Tile decode failed: {0}")]
    DecodeFailed(String),

    /// The layer failed to load and serves no tiles
    #[error("Layer unavailable: {0}")]
    Unavailable(#[from] LoadError),
}

impl From<IoError> for TileError {
    fn from(err: IoError) -> Self {
        TileError::FetchFailed(err.to_string())
    }
}

impl From<ArchiveError> for TileError {
    fn from(err: ArchiveError) -> Self {
        TileError::FetchFailed(err.to_string())
    }
}

/// Errors surfaced by the tile service to its HTTP adapter.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    /// No layer is registered under the requested name
    #[error("Layer not found: {0}")]
    LayerNotFound(String),

    /// The layer exists but its load lifecycle failed
    #[error("Layer {layer} is unavailable: {source}")]
    LayerUnavailable { layer: String, source: LoadError },

    /// Row or column lies outside the level's grid
    #[error("Tile {level}/{row}/{col} is outside the tile grid")]
    InvalidAddress { level: u8, row: u32, col: u32 },

    /// A raster tile could not be encoded for delivery
    #[error("Tile encoding failed: {0}")]
    Encode(String),
}

/// Errors in command-line or environment configuration
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// A `--layer` value did not have the `name=kind[:location]` shape
    #[error("Invalid layer definition '{0}': expected name=kind[:location]")]
    InvalidLayer(String),

    /// The layer kind is not one of the supported kinds
    #[error("Invalid layer definition '{definition}': {reason}")]
    InvalidLayerKind { definition: String, reason: String },
}
