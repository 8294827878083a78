//! Tiling scheme descriptions.
//!
//! Every source describes its tiles with a [`TileInfo`]: a Web Mercator
//! grid anchored at the top-left corner of the world, one level of detail per
//! zoom level. The extent a source covers is reported separately and may use
//! a different spatial reference; reprojection is the consumer's job.

use serde::Serialize;

use crate::archive::ArchiveHeader;

/// Web Mercator (EPSG:3857).
pub const WEB_MERCATOR_WKID: u32 = 3857;

/// WGS 84 longitude/latitude (EPSG:4326).
pub const WGS84_WKID: u32 = 4326;

/// Ground resolution at level 0, meters per pixel.
pub const BASE_RESOLUTION: f64 = 156543.03392800014;

/// Map scale denominator at level 0.
pub const BASE_SCALE: f64 = 591657527.591555;

/// Half the width of the Web Mercator world, meters.
pub const WEB_MERCATOR_HALF_WORLD: f64 = 20037508.342787;

/// Default tile edge length in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Deepest level in the default Terrarium scheme.
pub const TERRARIUM_MAX_LEVEL: u8 = 15;

/// One zoom level of a tiling scheme.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LevelOfDetail {
    pub level: u8,
    pub resolution: f64,
    pub scale: f64,
}

impl LevelOfDetail {
    /// Web Mercator resolution and scale for `level`.
    pub fn web_mercator(level: u8) -> Self {
        let factor = 2f64.powi(level as i32);
        Self {
            level,
            resolution: BASE_RESOLUTION / factor,
            scale: BASE_SCALE / factor,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Tiling scheme of a source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TileInfo {
    /// Tile width and height in pixels
    pub size: (u32, u32),
    /// Short name of the tile encoding ("png", "mvt", ...)
    pub format: String,
    pub dpi: u32,
    /// Top-left corner of the grid
    pub origin: Point,
    /// WKID of the grid's spatial reference
    pub wkid: u32,
    /// Levels of detail, strictly increasing in level
    pub lods: Vec<LevelOfDetail>,
}

impl TileInfo {
    /// Web Mercator scheme covering `min_level..=max_level`.
    ///
    /// An inverted range yields a scheme without levels.
    pub fn web_mercator(min_level: u8, max_level: u8, format: impl Into<String>) -> Self {
        Self {
            size: (DEFAULT_TILE_SIZE, DEFAULT_TILE_SIZE),
            format: format.into(),
            dpi: 96,
            origin: Point {
                x: -WEB_MERCATOR_HALF_WORLD,
                y: WEB_MERCATOR_HALF_WORLD,
            },
            wkid: WEB_MERCATOR_WKID,
            lods: (min_level..=max_level)
                .map(LevelOfDetail::web_mercator)
                .collect(),
        }
    }

    /// The fixed Terrarium scheme: levels 0 through 15, 256px PNG tiles.
    pub fn terrarium() -> Self {
        Self::web_mercator(0, TERRARIUM_MAX_LEVEL, "png")
    }

    pub fn lod(&self, level: u8) -> Option<&LevelOfDetail> {
        self.lods.iter().find(|lod| lod.level == level)
    }

    pub fn min_level(&self) -> Option<u8> {
        self.lods.first().map(|lod| lod.level)
    }

    pub fn max_level(&self) -> Option<u8> {
        self.lods.last().map(|lod| lod.level)
    }
}

/// Axis-aligned bounding box in a given spatial reference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Extent {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
    pub wkid: u32,
}

impl Extent {
    /// The whole Web Mercator world.
    pub fn web_mercator_world() -> Self {
        Self {
            xmin: -WEB_MERCATOR_HALF_WORLD,
            ymin: -WEB_MERCATOR_HALF_WORLD,
            xmax: WEB_MERCATOR_HALF_WORLD,
            ymax: WEB_MERCATOR_HALF_WORLD,
            wkid: WEB_MERCATOR_WKID,
        }
    }

    /// Longitude/latitude bounds.
    pub fn geographic(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            xmin: min_lon,
            ymin: min_lat,
            xmax: max_lon,
            ymax: max_lat,
            wkid: WGS84_WKID,
        }
    }
}

/// Tiling scheme and extent derived from an archive header.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeaderDerivedInfo {
    pub tile_info: TileInfo,
    pub full_extent: Extent,
}

/// Derive the tiling scheme and full extent of an archive.
///
/// Levels run from the header's minimum to maximum zoom with the fixed Web
/// Mercator resolutions; the extent is the header's geographic bounds,
/// left in longitude/latitude.
pub fn load_header_derived_info(header: &ArchiveHeader) -> HeaderDerivedInfo {
    HeaderDerivedInfo {
        tile_info: TileInfo::web_mercator(
            header.min_zoom,
            header.max_zoom,
            header.tile_type.to_string(),
        ),
        full_extent: Extent::geographic(
            header.min_lon,
            header.min_lat,
            header.max_lon,
            header.max_lat,
        ),
    }
}
