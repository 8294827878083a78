//! PMTiles v3 archive reading.
//!
//! An archive is a single file holding every tile of a tileset plus a
//! clustered index:
//!
//! ```text
//! ┌────────┬────────────┬──────────┬─────────────┬───────────┐
//! │ header │ root dir   │ metadata │ leaf dirs   │ tile data │
//! │ 127 B  │ (≤16 KiB)  │ JSON     │             │           │
//! └────────┴────────────┴──────────┴─────────────┴───────────┘
//! ```
//!
//! Only the header and root directory are read when an archive is opened;
//! leaf directories and tiles are fetched with range reads on demand.
//! Opened archives are shared through [`ArchiveCache`].

mod cache;
mod compression;
mod directory;
mod handle;
mod header;
mod source;
mod tile_id;

pub use cache::{ArchiveCache, DEFAULT_ARCHIVE_CACHE_CAPACITY};
pub use compression::decompress;
pub use directory::{Directory, Entry};
pub use handle::{ArchiveHandle, DEFAULT_LEAF_CACHE_ENTRIES, MAX_DIRECTORY_DEPTH};
pub use header::{ArchiveHeader, Compression, Section, TileType, HEADER_SIZE};
pub use source::{ArchiveLocation, ArchiveSource, UrlArchiveSource};
pub use tile_id::{zxy_to_tile_id, MAX_ZOOM};
