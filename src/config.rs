//! Configuration management for Terra Streamer.
//!
//! This module provides a flexible configuration system that supports:
//! - Command-line arguments via clap
//! - Environment variables with `TERRA_` prefix
//! - Sensible defaults for all optional settings
//!
//! # Layers
//!
//! Layers are declared with repeated `--layer name=kind:location` values:
//!
//! ```text
//! --layer elevation=terrarium:https://tiles.example.com/{level}/{col}/{row}.png?key={apiKey}
//! --layer roads=vector:s3://maps/roads.pmtiles
//! --layer dem=terrain:/data/dem.pmtiles
//! ```
//!
//! For `terrarium` the location is a URL template; for `vector` and
//! `terrain` it is an archive URL (`http(s)://`, `s3://`, `file://` or a
//! path). An empty location is accepted; such a layer reports a missing
//! configuration instead of serving tiles.
//!
//! # Environment Variables
//!
//! - `TERRA_HOST` - Server bind address (default: 0.0.0.0)
//! - `TERRA_PORT` - Server port (default: 3000)
//! - `TERRA_LAYERS` - Comma-separated layer definitions
//! - `TERRA_API_KEY` - Value substituted for `{apiKey}` in URL templates
//! - `TERRA_MIN_ELEVATION` / `TERRA_MAX_ELEVATION` - Global greyscale range
//! - `TERRA_AUTH_TOKEN` - Bearer token for upstream requests
//! - `TERRA_AUTH_USERNAME` / `TERRA_AUTH_PASSWORD` - Basic credentials
//! - `TERRA_S3_ENDPOINT` - Custom S3 endpoint for S3-compatible services
//! - `TERRA_CACHE_ARCHIVES` - Max open archives to cache (default: 64)
//! - `TERRA_CACHE_LEAVES` - Max leaf directories per archive (default: 64)
//! - `TERRA_CACHE_TILES` - Tile cache size in bytes (default: 100MB)
//! - `TERRA_REQUEST_TIMEOUT` - Upstream request timeout seconds (default: 30)
//! - `TERRA_CACHE_MAX_AGE` - HTTP cache max-age seconds (default: 3600)
//! - `TERRA_CORS_ORIGINS` - Allowed CORS origins (comma-separated)

use std::str::FromStr;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::archive::{DEFAULT_ARCHIVE_CACHE_CAPACITY, DEFAULT_LEAF_CACHE_ENTRIES};
use crate::error::ConfigError;
use crate::io::SourceAuth;
use crate::tile::{SourceKind, DEFAULT_TILE_CACHE_CAPACITY};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default upstream request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default HTTP cache max-age in seconds (1 hour).
pub const DEFAULT_CACHE_MAX_AGE: u32 = 3600;

// =============================================================================
// Layer Definitions
// =============================================================================

/// One `name=kind:location` layer declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerDefinition {
    pub name: String,
    pub kind: SourceKind,
    /// URL template (terrarium) or archive URL; `None` when left empty
    pub location: Option<String>,
}

impl LayerDefinition {
    /// True when the layer reads an archive from S3.
    pub fn uses_s3(&self) -> bool {
        self.kind != SourceKind::Terrarium
            && self
                .location
                .as_deref()
                .is_some_and(|l| l.starts_with("s3://"))
    }
}

impl FromStr for LayerDefinition {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, rest) = s
            .split_once('=')
            .ok_or_else(|| ConfigError::InvalidLayer(s.to_string()))?;
        let name = name.trim();
        if name.is_empty() || name.contains('/') {
            return Err(ConfigError::InvalidLayer(s.to_string()));
        }

        let (kind, location) = match rest.split_once(':') {
            Some((kind, location)) => (kind, location.trim()),
            None => (rest, ""),
        };
        let kind = kind
            .trim()
            .parse::<SourceKind>()
            .map_err(|reason| ConfigError::InvalidLayerKind {
                definition: s.to_string(),
                reason,
            })?;

        Ok(Self {
            name: name.to_string(),
            kind,
            location: (!location.is_empty()).then(|| location.to_string()),
        })
    }
}

// =============================================================================
// CLI Arguments
// =============================================================================

/// Terra Streamer - A tile server for elevation and vector tiles.
///
/// Serves Terrarium elevation tiles as greyscale PNGs and vector or terrain
/// tiles from PMTiles archives on HTTP, S3 or local storage.
#[derive(Parser, Debug, Clone)]
#[command(name = "terra-streamer")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the tile server
    Serve(Config),

    /// Load every layer once, report its state and exit
    Check(Config),
}

/// Server and layer configuration shared by every command.
#[derive(Args, Debug, Clone)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "TERRA_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "TERRA_PORT")]
    pub port: u16,

    // =========================================================================
    // Layer Configuration
    // =========================================================================
    /// Layer definition as name=kind:location (repeatable).
    ///
    /// kind is terrarium, vector or terrain.
    #[arg(long = "layer", env = "TERRA_LAYERS", value_delimiter = ',')]
    pub layers: Vec<LayerDefinition>,

    /// API key substituted for {apiKey} in URL templates.
    #[arg(long, env = "TERRA_API_KEY")]
    pub api_key: Option<String>,

    /// Lower bound of the global greyscale range, in meters.
    ///
    /// With both bounds set every Terrarium tile shares one colour scale;
    /// otherwise each tile is stretched over its own range.
    #[arg(long, env = "TERRA_MIN_ELEVATION", allow_hyphen_values = true)]
    pub min_elevation: Option<f64>,

    /// Upper bound of the global greyscale range, in meters.
    #[arg(long, env = "TERRA_MAX_ELEVATION", allow_hyphen_values = true)]
    pub max_elevation: Option<f64>,

    // =========================================================================
    // Upstream Authentication
    // =========================================================================
    /// Bearer token sent with upstream requests.
    #[arg(long, env = "TERRA_AUTH_TOKEN")]
    pub auth_token: Option<String>,

    /// Username for HTTP Basic upstream authentication.
    #[arg(long, env = "TERRA_AUTH_USERNAME")]
    pub auth_username: Option<String>,

    /// Password for HTTP Basic upstream authentication.
    #[arg(long, env = "TERRA_AUTH_PASSWORD")]
    pub auth_password: Option<String>,

    // =========================================================================
    // S3 Configuration
    // =========================================================================
    /// Custom S3 endpoint URL for S3-compatible services (MinIO, etc.).
    #[arg(long, env = "TERRA_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    // =========================================================================
    // Cache Configuration
    // =========================================================================
    /// Maximum number of open archives to keep in cache.
    #[arg(long, default_value_t = DEFAULT_ARCHIVE_CACHE_CAPACITY, env = "TERRA_CACHE_ARCHIVES")]
    pub cache_archives: usize,

    /// Maximum number of leaf directories cached per archive.
    #[arg(long, default_value_t = DEFAULT_LEAF_CACHE_ENTRIES, env = "TERRA_CACHE_LEAVES")]
    pub cache_leaves: usize,

    /// Tile cache size in bytes.
    #[arg(long, default_value_t = DEFAULT_TILE_CACHE_CAPACITY, env = "TERRA_CACHE_TILES")]
    pub cache_tiles: usize,

    // =========================================================================
    // HTTP Configuration
    // =========================================================================
    /// Upstream request timeout in seconds (0 disables the timeout).
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS, env = "TERRA_REQUEST_TIMEOUT")]
    pub request_timeout: u64,

    /// HTTP Cache-Control max-age in seconds.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "TERRA_CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "TERRA_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.layers.is_empty() {
            return Err(
                "At least one layer is required. Set --layer name=kind:location or TERRA_LAYERS"
                    .to_string(),
            );
        }

        for (i, layer) in self.layers.iter().enumerate() {
            if self.layers[..i].iter().any(|other| other.name == layer.name) {
                return Err(format!("Layer name '{}' is used more than once", layer.name));
            }
        }

        for (label, value) in [
            ("min_elevation", self.min_elevation),
            ("max_elevation", self.max_elevation),
        ] {
            if value.is_some_and(|v| !v.is_finite()) {
                return Err(format!("{} must be a finite number", label));
            }
        }
        if let (Some(min), Some(max)) = (self.min_elevation, self.max_elevation) {
            if min > max {
                return Err(format!(
                    "min_elevation ({}) must not exceed max_elevation ({})",
                    min, max
                ));
            }
        }

        if self.auth_password.is_some() && self.auth_username.is_none() {
            return Err("auth_password requires auth_username".to_string());
        }

        if self.cache_archives == 0 {
            return Err("cache_archives must be greater than 0".to_string());
        }
        if self.cache_leaves == 0 {
            return Err("cache_leaves must be greater than 0".to_string());
        }
        if self.cache_tiles == 0 {
            return Err("cache_tiles must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Credentials for upstream requests.
    pub fn source_auth(&self) -> SourceAuth {
        SourceAuth::from_parts(
            self.auth_token.clone(),
            self.auth_username.clone(),
            self.auth_password.clone(),
        )
    }

    /// Upstream request timeout; zero means no timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    /// True when any archive layer lives in S3.
    pub fn needs_s3(&self) -> bool {
        self.layers.iter().any(LayerDefinition::uses_s3)
    }
}

// =============================================================================
// Tests
// =============================================================================
