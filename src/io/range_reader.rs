use async_trait::async_trait;
use bytes::Bytes;

use crate::error::IoError;

/// Trait for reading byte ranges from a remote or local resource.
///
/// Archive readers only ever touch the header, the directories, and the
/// individual tiles they are asked for, so every backend exposes random
/// access instead of a stream. Implementations must be thread-safe.
#[async_trait]
pub trait RangeReader: Send + Sync {
    /// Read exactly `len` bytes starting at `offset`.
    ///
    /// Returns an error if the range is out of bounds or if the read fails.
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError>;

    /// Total size of the resource in bytes, when the backend knows it
    /// without an extra round-trip.
    fn size(&self) -> Option<u64>;

    /// Get a unique identifier for this resource (for logging).
    ///
    /// For S3 this is `s3://bucket/key`, for HTTP the request URL.
    fn identifier(&self) -> &str;
}

/// Check a read against a known resource size.
pub(crate) fn check_bounds(offset: u64, len: usize, size: u64) -> Result<(), IoError> {
    match offset.checked_add(len as u64) {
        Some(end) if end <= size => Ok(()),
        _ => Err(IoError::RangeOutOfBounds {
            offset,
            requested: len as u64,
            size,
        }),
    }
}

/// Build an inclusive HTTP `Range` header value for `len` bytes at `offset`.
///
/// `len` must be non-zero. A range ending past `u64::MAX` is out of bounds
/// for any resource.
pub(crate) fn range_header(offset: u64, len: usize) -> Result<String, IoError> {
    let last = (len as u64)
        .checked_sub(1)
        .and_then(|tail| offset.checked_add(tail))
        .ok_or(IoError::RangeOutOfBounds {
            offset,
            requested: len as u64,
            size: u64::MAX,
        })?;
    Ok(format!("bytes={}-{}", offset, last))
}

// =============================================================================
// Little-Endian Helpers
// =============================================================================
//
// PMTiles stores every fixed-width header field little-endian.

/// Read a little-endian u32 from a byte slice.
///
/// # Panics
/// Panics if the slice has fewer than 4 bytes.
#[inline]
pub fn read_u32_le(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Read a little-endian i32 from a byte slice.
///
/// # Panics
/// Panics if the slice has fewer than 4 bytes.
#[inline]
pub fn read_i32_le(bytes: &[u8]) -> i32 {
    i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Read a little-endian u64 from a byte slice.
///
/// # Panics
/// Panics if the slice has fewer than 8 bytes.
#[inline]
pub fn read_u64_le(bytes: &[u8]) -> u64 {
    u64::from_le_bytes([
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
    ])
}
