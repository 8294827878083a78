//! Terrarium elevation decoding and greyscale visualization.
//!
//! Terrarium tiles pack elevation into the colour channels of a PNG:
//!
//! ```text
//! elevation (m) = r * 256 + g + b / 256 - 32768
//! ```
//!
//! which covers roughly ±32 km at 1/256 m precision. The decoder turns such
//! a raster into a greyscale rendering, stretching either a configured
//! global elevation range or the range found in the tile itself to 0..=255.

use image::{Rgba, RgbaImage};

/// Grey level for tiles whose elevations are all identical.
pub const FLAT_TILE_GREY: u8 = 128;

/// Decode one Terrarium pixel to meters.
#[inline]
pub fn decode_terrarium(r: u8, g: u8, b: u8) -> f32 {
    // Every value is a multiple of 1/256 below 2^16, exact in an f32.
    r as f32 * 256.0 + g as f32 + b as f32 / 256.0 - 32768.0
}

/// Elevations decoded from a Terrarium raster, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct ElevationRaster {
    width: u32,
    height: u32,
    values: Vec<f32>,
}

impl ElevationRaster {
    /// Decode every pixel of `image`; the alpha channel is ignored.
    pub fn from_terrarium(image: &RgbaImage) -> Self {
        let values = image
            .pixels()
            .map(|Rgba([r, g, b, _])| decode_terrarium(*r, *g, *b))
            .collect();
        Self {
            width: image.width(),
            height: image.height(),
            values,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Minimum and maximum elevation, starting from the given seeds.
    ///
    /// Returns the seeds unchanged for an empty raster.
    fn scan_range(&self, min_seed: f64, max_seed: f64) -> (f64, f64) {
        self.values
            .iter()
            .fold((min_seed, max_seed), |(min, max), &v| {
                let v = v as f64;
                (min.min(v), max.max(v))
            })
    }
}

/// Terrarium to greyscale converter.
///
/// With both bounds configured every tile is stretched over the same global
/// range, so neighbouring tiles share one colour scale. Otherwise each tile
/// is stretched over its own range; a single configured bound still seeds
/// the per-tile scan.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ElevationDecoder {
    min_elevation: Option<f64>,
    max_elevation: Option<f64>,
}

impl ElevationDecoder {
    pub fn new(min_elevation: Option<f64>, max_elevation: Option<f64>) -> Self {
        Self {
            min_elevation,
            max_elevation,
        }
    }

    /// Decoder that always normalizes over `min..=max`.
    pub fn global(min: f64, max: f64) -> Self {
        Self::new(Some(min), Some(max))
    }

    /// Decoder that normalizes each tile over its own range.
    pub fn per_tile() -> Self {
        Self::default()
    }

    /// The configured global range, if both bounds are set.
    pub fn global_range(&self) -> Option<(f64, f64)> {
        self.min_elevation.zip(self.max_elevation)
    }

    /// Range used for `raster`: the global range, or a scan of the tile.
    pub fn range_for(&self, raster: &ElevationRaster) -> (f64, f64) {
        match self.global_range() {
            Some(range) => range,
            None => raster.scan_range(
                self.min_elevation.unwrap_or(f64::INFINITY),
                self.max_elevation.unwrap_or(f64::NEG_INFINITY),
            ),
        }
    }

    /// Render a decoded raster as opaque greyscale.
    pub fn normalize(&self, raster: &ElevationRaster) -> RgbaImage {
        let (min, max) = self.range_for(raster);
        let range = max - min;

        let mut out = RgbaImage::new(raster.width, raster.height);
        for (pixel, &elevation) in out.pixels_mut().zip(&raster.values) {
            let grey = grey_level(elevation as f64, min, range);
            *pixel = Rgba([grey, grey, grey, 255]);
        }
        out
    }

    /// Decode a Terrarium image and render it in one step.
    pub fn visualize(&self, image: &RgbaImage) -> RgbaImage {
        self.normalize(&ElevationRaster::from_terrarium(image))
    }
}

/// Map one elevation to a grey level.
///
/// A positive range stretches linearly with `f64::round` (half away from
/// zero) and clamps. A flat range renders values at or above the minimum as
/// [`FLAT_TILE_GREY`]; everything else is 0.
fn grey_level(elevation: f64, min: f64, range: f64) -> u8 {
    if range > 0.0 {
        ((elevation - min) / range * 255.0).round().clamp(0.0, 255.0) as u8
    } else if elevation >= min {
        FLAT_TILE_GREY
    } else {
        0
    }
}
