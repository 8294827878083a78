//! PMTiles v3 header.
//!
//! The header is a fixed 127-byte little-endian record at offset 0:
//!
//! ```text
//! 0   magic "PMTiles"            7 bytes
//! 7   version (3)                u8
//! 8   root dir   offset, length  u64, u64
//! 24  metadata   offset, length  u64, u64
//! 40  leaf dirs  offset, length  u64, u64
//! 56  tile data  offset, length  u64, u64
//! 72  addressed / entries / contents counts   3 x u64
//! 96  clustered, internal compression, tile compression, tile type,
//!     min zoom, max zoom         6 x u8
//! 102 min lon, min lat, max lon, max lat      4 x i32 (degrees * 1e7)
//! 118 center zoom                u8
//! 119 center lon, center lat     2 x i32 (degrees * 1e7)
//! ```

use serde::Serialize;

use crate::error::ArchiveError;
use crate::io::{read_i32_le, read_u64_le};

/// Size of the fixed header in bytes.
pub const HEADER_SIZE: usize = 127;

const MAGIC: &[u8; 7] = b"PMTiles";
const VERSION: u8 = 3;
const E7: f64 = 10_000_000.0;

/// Compression codec for directories or tile payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    Unknown,
    None,
    Gzip,
    Brotli,
    Zstd,
}

impl Compression {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Compression::None,
            2 => Compression::Gzip,
            3 => Compression::Brotli,
            4 => Compression::Zstd,
            _ => Compression::Unknown,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Compression::Unknown => 0,
            Compression::None => 1,
            Compression::Gzip => 2,
            Compression::Brotli => 3,
            Compression::Zstd => 4,
        }
    }
}

/// Kind of content stored in each tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TileType {
    Unknown,
    Mvt,
    Png,
    Jpeg,
    Webp,
    Avif,
}

impl TileType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => TileType::Mvt,
            2 => TileType::Png,
            3 => TileType::Jpeg,
            4 => TileType::Webp,
            5 => TileType::Avif,
            _ => TileType::Unknown,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            TileType::Unknown => 0,
            TileType::Mvt => 1,
            TileType::Png => 2,
            TileType::Jpeg => 3,
            TileType::Webp => 4,
            TileType::Avif => 5,
        }
    }

    /// MIME type for HTTP responses.
    pub fn content_type(self) -> &'static str {
        match self {
            TileType::Mvt => "application/vnd.mapbox-vector-tile",
            TileType::Png => "image/png",
            TileType::Jpeg => "image/jpeg",
            TileType::Webp => "image/webp",
            TileType::Avif => "image/avif",
            TileType::Unknown => "application/octet-stream",
        }
    }
}

impl std::fmt::Display for TileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TileType::Unknown => "unknown",
            TileType::Mvt => "mvt",
            TileType::Png => "png",
            TileType::Jpeg => "jpeg",
            TileType::Webp => "webp",
            TileType::Avif => "avif",
        };
        f.write_str(name)
    }
}

/// Byte range within the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Section {
    pub offset: u64,
    pub length: u64,
}

/// Parsed archive header.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveHeader {
    pub root_directory: Section,
    pub metadata: Section,
    pub leaf_directories: Section,
    pub tile_data: Section,
    pub addressed_tiles: u64,
    pub tile_entries: u64,
    pub tile_contents: u64,
    pub clustered: bool,
    pub internal_compression: Compression,
    pub tile_compression: Compression,
    pub tile_type: TileType,
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
    pub center_zoom: u8,
    pub center_lon: f64,
    pub center_lat: f64,
}

impl ArchiveHeader {
    /// Parse the fixed header from the first bytes of an archive.
    pub fn parse(bytes: &[u8]) -> Result<Self, ArchiveError> {
        if bytes.len() < HEADER_SIZE {
            return Err(ArchiveError::HeaderTooShort {
                required: HEADER_SIZE,
                actual: bytes.len(),
            });
        }
        if &bytes[0..7] != MAGIC {
            return Err(ArchiveError::InvalidMagic);
        }
        if bytes[7] != VERSION {
            return Err(ArchiveError::UnsupportedVersion(bytes[7]));
        }

        let u64_at = |pos: usize| read_u64_le(&bytes[pos..]);
        let deg_at = |pos: usize| read_i32_le(&bytes[pos..]) as f64 / E7;
        let section_at = |pos: usize| Section {
            offset: u64_at(pos),
            length: u64_at(pos + 8),
        };

        Ok(Self {
            root_directory: section_at(8),
            metadata: section_at(24),
            leaf_directories: section_at(40),
            tile_data: section_at(56),
            addressed_tiles: u64_at(72),
            tile_entries: u64_at(80),
            tile_contents: u64_at(88),
            clustered: bytes[96] == 1,
            internal_compression: Compression::from_u8(bytes[97]),
            tile_compression: Compression::from_u8(bytes[98]),
            tile_type: TileType::from_u8(bytes[99]),
            min_zoom: bytes[100],
            max_zoom: bytes[101],
            min_lon: deg_at(102),
            min_lat: deg_at(106),
            max_lon: deg_at(110),
            max_lat: deg_at(114),
            center_zoom: bytes[118],
            center_lon: deg_at(119),
            center_lat: deg_at(123),
        })
    }

    /// Serialize back into the 127-byte on-disk form.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..7].copy_from_slice(MAGIC);
        out[7] = VERSION;

        let mut put_u64 = |pos: usize, value: u64| {
            out[pos..pos + 8].copy_from_slice(&value.to_le_bytes());
        };
        for (pos, section) in [
            (8, self.root_directory),
            (24, self.metadata),
            (40, self.leaf_directories),
            (56, self.tile_data),
        ] {
            put_u64(pos, section.offset);
            put_u64(pos + 8, section.length);
        }
        put_u64(72, self.addressed_tiles);
        put_u64(80, self.tile_entries);
        put_u64(88, self.tile_contents);

        out[96] = self.clustered as u8;
        out[97] = self.internal_compression.as_u8();
        out[98] = self.tile_compression.as_u8();
        out[99] = self.tile_type.as_u8();
        out[100] = self.min_zoom;
        out[101] = self.max_zoom;

        let mut put_deg = |pos: usize, value: f64| {
            let e7 = (value * E7).round() as i32;
            out[pos..pos + 4].copy_from_slice(&e7.to_le_bytes());
        };
        put_deg(102, self.min_lon);
        put_deg(106, self.min_lat);
        put_deg(110, self.max_lon);
        put_deg(114, self.max_lat);
        put_deg(119, self.center_lon);
        put_deg(123, self.center_lat);
        out[118] = self.center_zoom;

        out
    }
}

impl Default for ArchiveHeader {
    fn default() -> Self {
        Self {
            root_directory: Section::default(),
            metadata: Section::default(),
            leaf_directories: Section::default(),
            tile_data: Section::default(),
            addressed_tiles: 0,
            tile_entries: 0,
            tile_contents: 0,
            clustered: true,
            internal_compression: Compression::None,
            tile_compression: Compression::None,
            tile_type: TileType::Unknown,
            min_zoom: 0,
            max_zoom: 0,
            min_lon: -180.0,
            min_lat: -85.0511287,
            max_lon: 180.0,
            max_lat: 85.0511287,
            center_zoom: 0,
            center_lon: 0.0,
            center_lat: 0.0,
        }
    }
}
