//! Opened archive handle.
//!
//! Opening an archive reads the fixed header and the root directory. Tile
//! lookups then walk at most three levels of leaf directories:
//!
//! ```text
//! (level, col, row) ──► tile id ──► root directory
//!                                        │
//!                         run_length > 0 │ run_length == 0
//!                   ┌────────────────────┴───────────────┐
//!                   ▼                                    ▼
//!        tile_data.offset + entry.offset      leaf_dirs.offset + entry.offset
//!        (read + decompress tile)             (read, cache, search again)
//! ```

use std::num::NonZeroUsize;
use std::sync::Arc;

use bytes::Bytes;
use lru::LruCache;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use super::compression::decompress;
use super::directory::Directory;
use super::header::{ArchiveHeader, HEADER_SIZE};
use super::tile_id::zxy_to_tile_id;
use crate::error::ArchiveError;
use crate::io::RangeReader;

/// Directory reads allowed per lookup: the root plus three leaf levels.
pub const MAX_DIRECTORY_DEPTH: usize = 4;

/// Default number of leaf directories kept per handle.
pub const DEFAULT_LEAF_CACHE_ENTRIES: usize = 64;

/// An opened archive: parsed header, root directory and a reader for the rest.
pub struct ArchiveHandle {
    source_url: String,
    header: ArchiveHeader,
    reader: Arc<dyn RangeReader>,
    root: Arc<Directory>,
    leaves: Mutex<LruCache<u64, Arc<Directory>>>,
}

impl ArchiveHandle {
    /// Read the header and root directory of the archive behind `reader`.
    pub async fn open(
        source_url: impl Into<String>,
        reader: Arc<dyn RangeReader>,
    ) -> Result<Self, ArchiveError> {
        Self::open_with_leaf_cache(source_url, reader, DEFAULT_LEAF_CACHE_ENTRIES).await
    }

    /// Like [`ArchiveHandle::open`] with an explicit leaf directory cache size.
    pub async fn open_with_leaf_cache(
        source_url: impl Into<String>,
        reader: Arc<dyn RangeReader>,
        leaf_cache_entries: usize,
    ) -> Result<Self, ArchiveError> {
        let source_url = source_url.into();

        let header_bytes = reader.read_exact_at(0, HEADER_SIZE).await?;
        let header = ArchiveHeader::parse(&header_bytes)?;

        let root = read_directory(
            reader.as_ref(),
            &header,
            header.root_directory.offset,
            header.root_directory.length,
        )
        .await?;

        debug!(
            url = %source_url,
            tile_type = %header.tile_type,
            min_zoom = header.min_zoom,
            max_zoom = header.max_zoom,
            root_entries = root.len(),
            "opened archive"
        );

        let capacity = NonZeroUsize::new(leaf_cache_entries).unwrap_or(NonZeroUsize::MIN);

        Ok(Self {
            source_url,
            header,
            reader,
            root: Arc::new(root),
            leaves: Mutex::new(LruCache::new(capacity)),
        })
    }

    /// URL the handle was opened from (its cache key).
    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn header(&self) -> &ArchiveHeader {
        &self.header
    }

    /// Fetch the tile at `(level, col, row)`.
    ///
    /// Returns `Ok(None)` when the archive has no tile at that address,
    /// including addresses outside the level's grid. Tile payloads are
    /// returned with the archive's tile compression removed.
    pub async fn get_tile(
        &self,
        level: u8,
        col: u32,
        row: u32,
    ) -> Result<Option<Bytes>, ArchiveError> {
        let Some(tile_id) = zxy_to_tile_id(level, col, row) else {
            return Ok(None);
        };

        let mut directory = Arc::clone(&self.root);
        for _ in 0..MAX_DIRECTORY_DEPTH {
            let Some(entry) = directory.find_tile(tile_id).copied() else {
                return Ok(None);
            };

            if entry.is_leaf_pointer() {
                let offset = section_offset(self.header.leaf_directories.offset, entry.offset)?;
                directory = self.leaf_directory(offset, entry.length as u64).await?;
                continue;
            }

            trace!(url = %self.source_url, level, col, row, tile_id, "archive tile hit");
            let data = self
                .reader
                .read_exact_at(
                    section_offset(self.header.tile_data.offset, entry.offset)?,
                    entry.length as usize,
                )
                .await?;
            return decompress(data, self.header.tile_compression).map(Some);
        }

        Err(ArchiveError::DirectoryTooDeep {
            max_depth: MAX_DIRECTORY_DEPTH,
        })
    }

    /// Number of leaf directories currently cached.
    pub async fn cached_leaf_count(&self) -> usize {
        self.leaves.lock().await.len()
    }

    async fn leaf_directory(&self, offset: u64, length: u64) -> Result<Arc<Directory>, ArchiveError> {
        if let Some(dir) = self.leaves.lock().await.get(&offset) {
            return Ok(Arc::clone(dir));
        }

        // Two lookups may read the same leaf concurrently; both results are
        // identical so the second insert is harmless.
        let dir = Arc::new(read_directory(self.reader.as_ref(), &self.header, offset, length).await?);
        self.leaves.lock().await.put(offset, Arc::clone(&dir));
        Ok(dir)
    }
}

/// Absolute position of an entry stored relative to its section.
fn section_offset(section: u64, relative: u64) -> Result<u64, ArchiveError> {
    section.checked_add(relative).ok_or_else(|| {
        ArchiveError::InvalidDirectory(format!(
            "entry offset {} overflows section at {}",
            relative, section
        ))
    })
}

impl std::fmt::Debug for ArchiveHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveHandle")
            .field("source_url", &self.source_url)
            .field("header", &self.header)
            .field("root_entries", &self.root.len())
            .finish()
    }
}

async fn read_directory(
    reader: &dyn RangeReader,
    header: &ArchiveHeader,
    offset: u64,
    length: u64,
) -> Result<Directory, ArchiveError> {
    if length == 0 {
        return Ok(Directory::default());
    }
    let raw = reader.read_exact_at(offset, length as usize).await?;
    let bytes = decompress(raw, header.internal_compression)?;
    Directory::parse(&bytes)
}
