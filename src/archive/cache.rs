//! Process-wide archive index cache.
//!
//! Every layer pointed at the same archive URL shares one opened
//! [`ArchiveHandle`], so the header and root directory are fetched once.
//!
//! # Single-flight opens
//!
//! The first lookup for a URL inserts an empty cell before opening, so
//! concurrent lookups find the cell and wait on the same open:
//!
//! ```text
//! get(url) ──► lock map ──► cell present? ──no──► insert empty cell
//!                  │                                   │
//!                  └──────────── unlock ◄──────────────┘
//!                                  │
//!                      cell.get_or_try_init(open)
//!                   (one opener, everyone else waits)
//! ```
//!
//! A failed open leaves the cell empty and drops it, so the next lookup
//! retries instead of caching the failure.
//!
//! Cells wait in a pending map until their open finishes and only then
//! enter the LRU. Eviction therefore only ever drops opened handles, and
//! a burst of other URLs cannot orphan an open that callers are waiting on.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use lru::LruCache;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, warn};

use super::handle::{ArchiveHandle, DEFAULT_LEAF_CACHE_ENTRIES};
use super::source::ArchiveSource;
use crate::error::ArchiveError;

/// Default number of open archives kept in the cache.
pub const DEFAULT_ARCHIVE_CACHE_CAPACITY: usize = 64;

type HandleCell = Arc<OnceCell<Arc<ArchiveHandle>>>;

/// Opened handles under LRU eviction, plus opens still in flight.
struct Handles {
    ready: LruCache<String, HandleCell>,
    pending: HashMap<String, HandleCell>,
}

impl Handles {
    fn lookup(&mut self, url: &str) -> Option<HandleCell> {
        self.ready
            .get(url)
            .or_else(|| self.pending.get(url))
            .map(Arc::clone)
    }

    /// Remove `cell` from the pending map if it is still the entry for `url`.
    fn take_pending(&mut self, url: &str, cell: &HandleCell) -> bool {
        let current = self
            .pending
            .get(url)
            .map(|current| Arc::ptr_eq(current, cell))
            .unwrap_or(false);
        if current {
            self.pending.remove(url);
        }
        current
    }
}

/// Shared mapping from exact archive URL to opened handle.
///
/// Construct one per process (or per test) and hand it to every archive
/// tile source; dropping it or calling [`ArchiveCache::clear`] releases the
/// cached handles. Handles already held by sources stay valid.
pub struct ArchiveCache {
    source: Arc<dyn ArchiveSource>,
    handles: Mutex<Handles>,
    leaf_cache_entries: usize,
    opens: AtomicUsize,
}

impl ArchiveCache {
    /// Create a cache with the default capacity.
    pub fn new(source: Arc<dyn ArchiveSource>) -> Self {
        Self::with_capacity(source, DEFAULT_ARCHIVE_CACHE_CAPACITY)
    }

    /// Create a cache holding at most `capacity` archives (minimum 1).
    pub fn with_capacity(source: Arc<dyn ArchiveSource>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            source,
            handles: Mutex::new(Handles {
                ready: LruCache::new(capacity),
                pending: HashMap::new(),
            }),
            leaf_cache_entries: DEFAULT_LEAF_CACHE_ENTRIES,
            opens: AtomicUsize::new(0),
        }
    }

    /// Size of the leaf directory cache of each handle opened from now on.
    pub fn with_leaf_cache_entries(mut self, entries: usize) -> Self {
        self.leaf_cache_entries = entries;
        self
    }

    /// Get the handle for `url`, opening the archive on first use.
    ///
    /// The key is the URL string as given; two spellings of the same
    /// location are two entries.
    pub async fn get(&self, url: &str) -> Result<Arc<ArchiveHandle>, ArchiveError> {
        let cell = {
            let mut handles = self.handles.lock().await;
            match handles.lookup(url) {
                Some(cell) => cell,
                None => {
                    let cell: HandleCell = Arc::new(OnceCell::new());
                    handles.pending.insert(url.to_string(), Arc::clone(&cell));
                    cell
                }
            }
        };

        let result = cell.get_or_try_init(|| self.open(url)).await.map(Arc::clone);

        let mut handles = self.handles.lock().await;
        // Waiters on one cell all pass here; the first one moves it.
        if handles.take_pending(url, &cell) && result.is_ok() {
            handles.ready.put(url.to_string(), cell);
        }
        result
    }

    async fn open(&self, url: &str) -> Result<Arc<ArchiveHandle>, ArchiveError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        debug!(url, "opening archive");

        let reader = self.source.open_reader(url).await?;
        match ArchiveHandle::open_with_leaf_cache(url, reader, self.leaf_cache_entries).await {
            Ok(handle) => Ok(Arc::new(handle)),
            Err(err) => {
                warn!(url, error = %err, "failed to open archive");
                Err(err)
            }
        }
    }

    /// Drop the cached handle for `url`; the next lookup reopens it.
    pub async fn invalidate(&self, url: &str) {
        let mut handles = self.handles.lock().await;
        handles.ready.pop(url);
        handles.pending.remove(url);
    }

    /// Drop every cached handle.
    pub async fn clear(&self) {
        let mut handles = self.handles.lock().await;
        handles.ready.clear();
        handles.pending.clear();
    }

    /// Number of URLs currently cached (including opens in flight).
    pub async fn cached_count(&self) -> usize {
        let handles = self.handles.lock().await;
        handles.ready.len() + handles.pending.len()
    }

    /// Total number of archive opens attempted by this cache.
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

// =============================================================================
// Tests
// =============================================================================
