//! Tile cache for encoded tiles.
//!
//! An LRU cache of the bytes served for a tile, so repeated requests skip
//! the fetch, decode and encode steps.
//!
//! # Cache Key
//!
//! Tiles are cached by a composite key of:
//! - Layer name
//! - Zoom level
//! - Tile row
//! - Tile column
//!
//! Empty tiles are never cached: an absent tile may be a transient upstream
//! failure, and the next request should try again.
//!
//! # Size-Based Eviction
//!
//! The cache tracks the total size of cached tiles in bytes and evicts
//! least-recently-used entries when the capacity is exceeded.

use std::num::NonZeroUsize;
use std::sync::Arc;

use bytes::Bytes;
use lru::LruCache;
use tokio::sync::Mutex;

use super::address::TileAddress;

/// Default cache capacity: 100MB
pub const DEFAULT_TILE_CACHE_CAPACITY: usize = 100 * 1024 * 1024;

/// Default maximum number of entries (to bound LRU overhead)
pub const DEFAULT_TILE_CACHE_ENTRIES: usize = 10_000;

// =============================================================================
// Cache Key
// =============================================================================

/// Cache key for encoded tiles.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileCacheKey {
    /// Layer name
    pub layer: Arc<str>,

    /// Zoom level
    pub level: u8,

    /// Tile row (0 at the top)
    pub row: u32,

    /// Tile column (0 at the left)
    pub col: u32,
}

impl TileCacheKey {
    pub fn new(layer: impl Into<Arc<str>>, address: TileAddress) -> Self {
        Self {
            layer: layer.into(),
            level: address.level,
            row: address.row,
            col: address.col,
        }
    }
}

// =============================================================================
// Tile Cache
// =============================================================================

struct CacheState {
    entries: LruCache<TileCacheKey, Bytes>,
    size: usize,
}

/// LRU cache for encoded tiles with size-based capacity.
///
/// The cache is thread-safe and can be shared across async tasks via `Arc`.
///
/// # Example
///
/// ```
/// use terra_streamer::tile::{TileAddress, TileCache, TileCacheKey};
/// use bytes::Bytes;
///
/// #[tokio::main]
/// async fn main() {
///     let cache = TileCache::new();
///
///     let key = TileCacheKey::new("elevation", TileAddress::new(3, 5, 2));
///     let png = Bytes::from_static(b"\x89PNG");
///
///     cache.put(key.clone(), png.clone()).await;
///     assert_eq!(cache.get(&key).await, Some(png));
/// }
/// ```
pub struct TileCache {
    state: Mutex<CacheState>,

    /// Maximum total size in bytes
    max_size: usize,
}

impl TileCache {
    /// Create a new tile cache with default capacity (100MB).
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TILE_CACHE_CAPACITY)
    }

    /// Create a new tile cache with the specified capacity in bytes.
    pub fn with_capacity(max_size: usize) -> Self {
        Self::with_capacity_and_entries(max_size, DEFAULT_TILE_CACHE_ENTRIES)
    }

    /// Create a new tile cache with specified capacity and maximum entries.
    ///
    /// A `max_entries` of zero is treated as one.
    pub fn with_capacity_and_entries(max_size: usize, max_entries: usize) -> Self {
        let max_entries = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            state: Mutex::new(CacheState {
                entries: LruCache::new(max_entries),
                size: 0,
            }),
            max_size,
        }
    }

    /// Get a tile from the cache, marking it as recently used.
    pub async fn get(&self, key: &TileCacheKey) -> Option<Bytes> {
        self.state.lock().await.entries.get(key).cloned()
    }

    /// Check if a tile is in the cache without updating LRU order.
    pub async fn contains(&self, key: &TileCacheKey) -> bool {
        self.state.lock().await.entries.contains(key)
    }

    /// Store a tile in the cache.
    ///
    /// Empty data is ignored. Least-recently-used entries are evicted until
    /// the cache is within capacity again.
    pub async fn put(&self, key: TileCacheKey, data: Bytes) {
        if data.is_empty() {
            return;
        }

        let mut state = self.state.lock().await;
        let data_size = data.len();

        // `push` hands back the replaced entry, or the one evicted for room.
        if let Some((_, old)) = state.entries.push(key, data) {
            state.size = state.size.saturating_sub(old.len());
        }
        state.size += data_size;

        while state.size > self.max_size {
            match state.entries.pop_lru() {
                Some((_, evicted)) => state.size = state.size.saturating_sub(evicted.len()),
                None => break,
            }
        }
    }

    /// Remove a tile from the cache.
    pub async fn remove(&self, key: &TileCacheKey) -> Option<Bytes> {
        let mut state = self.state.lock().await;
        let data = state.entries.pop(key)?;
        state.size = state.size.saturating_sub(data.len());
        Some(data)
    }

    /// Clear all entries from the cache.
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        state.entries.clear();
        state.size = 0;
    }

    /// Get the current number of cached tiles.
    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    /// Check if the cache is empty.
    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.entries.is_empty()
    }

    /// Get the current total size of cached tiles in bytes.
    pub async fn size(&self) -> usize {
        self.state.lock().await.size
    }

    /// Get the maximum capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.max_size
    }
}

impl Default for TileCache {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
