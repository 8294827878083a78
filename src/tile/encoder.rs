use bytes::Bytes;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageError, RgbaImage};

/// MIME type of encoded raster tiles.
pub const PNG_CONTENT_TYPE: &str = "image/png";

/// Encode an RGBA raster as PNG.
pub fn encode_png(image: &RgbaImage) -> Result<Bytes, ImageError> {
    let mut out = Vec::new();
    PngEncoder::new(&mut out).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        ExtendedColorType::Rgba8,
    )?;
    Ok(Bytes::from(out))
}

/// Fully transparent PNG of the given size.
pub fn encode_transparent_png(width: u32, height: u32) -> Result<Bytes, ImageError> {
    encode_png(&RgbaImage::new(width, height))
}
