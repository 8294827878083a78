//! Tiles read from a PMTiles archive.
//!
//! The archive is opened through the shared [`ArchiveCache`] on first
//! `load` (or first tile request). Tiles are returned as raw bytes; a
//! missing tile is an empty payload, not an error.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, trace};

use super::address::TileAddress;
use super::info::{load_header_derived_info, TileInfo, TERRARIUM_MAX_LEVEL};
use super::source::{with_cancel, SourceKind, SourceMetadata, TilePayload, TileSource};
use crate::archive::{ArchiveCache, ArchiveHandle, TileType};
use crate::error::{LoadError, TileError};

/// Which archive flavour a source serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    /// Mapbox vector tiles; the archive must declare the MVT tile type
    Vector,
    /// Elevation rasters, passed through in the archive's encoding
    Terrain,
}

struct LoadedArchive {
    handle: Arc<ArchiveHandle>,
    metadata: SourceMetadata,
}

/// Archive-backed tile source.
pub struct ArchiveTileSource {
    kind: ArchiveKind,
    url: Option<String>,
    cache: Arc<ArchiveCache>,
    loaded: OnceCell<Result<LoadedArchive, LoadError>>,
}

impl ArchiveTileSource {
    pub fn new(kind: ArchiveKind, url: Option<String>, cache: Arc<ArchiveCache>) -> Self {
        Self {
            kind,
            url: url.filter(|u| !u.is_empty()),
            cache,
            loaded: OnceCell::new(),
        }
    }

    pub fn vector(url: impl Into<String>, cache: Arc<ArchiveCache>) -> Self {
        Self::new(ArchiveKind::Vector, Some(url.into()), cache)
    }

    pub fn terrain(url: impl Into<String>, cache: Arc<ArchiveCache>) -> Self {
        Self::new(ArchiveKind::Terrain, Some(url.into()), cache)
    }

    pub fn archive_kind(&self) -> ArchiveKind {
        self.kind
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// The opened archive, loading the layer if needed.
    pub async fn archive_handle(&self) -> Result<Arc<ArchiveHandle>, LoadError> {
        self.loaded()
            .await
            .as_ref()
            .map(|loaded| Arc::clone(&loaded.handle))
            .map_err(Clone::clone)
    }

    /// Fetch the raw tile bytes; `None` when the archive has no such tile.
    pub async fn fetch_raw(
        &self,
        address: TileAddress,
        cancel: &CancellationToken,
    ) -> Result<Option<Bytes>, TileError> {
        with_cancel(cancel, async {
            let loaded = self.loaded().await.as_ref().map_err(|err| match err {
                LoadError::ConfigMissing => TileError::ConfigMissing,
                other => TileError::Unavailable(other.clone()),
            })?;

            trace!(%address, url = %loaded.handle.source_url(), "reading archive tile");
            let tile = loaded
                .handle
                .get_tile(address.level, address.col, address.row)
                .await?;
            Ok(tile)
        })
        .await
    }

    async fn loaded(&self) -> &Result<LoadedArchive, LoadError> {
        self.loaded.get_or_init(|| self.open()).await
    }

    async fn open(&self) -> Result<LoadedArchive, LoadError> {
        let result = self.open_inner().await;
        match &result {
            Ok(loaded) => info!(
                url = %loaded.handle.source_url(),
                kind = %self.kind(),
                tile_type = %loaded.handle.header().tile_type,
                min_zoom = loaded.handle.header().min_zoom,
                max_zoom = loaded.handle.header().max_zoom,
                "archive layer loaded"
            ),
            Err(err) => error!(kind = %self.kind(), error = %err, "archive layer failed to load"),
        }
        result
    }

    async fn open_inner(&self) -> Result<LoadedArchive, LoadError> {
        let url = self.url.as_deref().ok_or(LoadError::ConfigMissing)?;

        let handle = self
            .cache
            .get(url)
            .await
            .map_err(|source| LoadError::Archive {
                url: url.to_string(),
                source,
            })?;

        let tile_type = handle.header().tile_type;
        if self.kind == ArchiveKind::Vector && tile_type != TileType::Mvt {
            return Err(LoadError::TileTypeMismatch {
                url: url.to_string(),
                expected: TileType::Mvt.to_string(),
                actual: tile_type.to_string(),
            });
        }

        let derived = load_header_derived_info(handle.header());
        let metadata = SourceMetadata {
            tile_info: derived.tile_info,
            full_extent: derived.full_extent,
            content_type: tile_type.content_type().to_string(),
        };

        Ok(LoadedArchive { handle, metadata })
    }
}

#[async_trait]
impl TileSource for ArchiveTileSource {
    fn kind(&self) -> SourceKind {
        match self.kind {
            ArchiveKind::Vector => SourceKind::Vector,
            ArchiveKind::Terrain => SourceKind::Terrain,
        }
    }

    async fn load(&self) -> Result<SourceMetadata, LoadError> {
        self.loaded()
            .await
            .as_ref()
            .map(|loaded| loaded.metadata.clone())
            .map_err(Clone::clone)
    }

    async fn fetch_tile(
        &self,
        address: TileAddress,
        cancel: &CancellationToken,
    ) -> Result<TilePayload, TileError> {
        Ok(match self.fetch_raw(address, cancel).await? {
            Some(bytes) => TilePayload::Data(bytes),
            None => TilePayload::empty_for(&self.tile_info()),
        })
    }

    fn tile_info(&self) -> TileInfo {
        match self.loaded.get() {
            Some(Ok(loaded)) => loaded.metadata.tile_info.clone(),
            _ => {
                let format = match self.kind {
                    ArchiveKind::Vector => TileType::Mvt,
                    ArchiveKind::Terrain => TileType::Unknown,
                };
                TileInfo::web_mercator(0, TERRARIUM_MAX_LEVEL, format.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{
        zxy_to_tile_id, ArchiveHeader, ArchiveSource, Directory, Entry, Section, HEADER_SIZE,
    };
    use crate::error::{ArchiveError, IoError};
    use crate::io::RangeReader;
    use crate::tile::fetch_tile_or_empty;
    use std::collections::HashMap;

    struct MemoryReader(Bytes);

    #[async_trait]
    impl RangeReader for MemoryReader {
        async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
            let start = offset as usize;
            if start + len > self.0.len() {
                return Err(IoError::RangeOutOfBounds {
                    offset,
                    requested: len as u64,
                    size: self.0.len() as u64,
                });
            }
            Ok(self.0.slice(start..start + len))
        }

        fn size(&self) -> Option<u64> {
            Some(self.0.len() as u64)
        }

        fn identifier(&self) -> &str {
            "memory"
        }
    }

    #[derive(Default)]
    struct MemorySource {
        archives: HashMap<String, Bytes>,
    }

    #[async_trait]
    impl ArchiveSource for MemorySource {
        async fn open_reader(&self, url: &str) -> Result<Arc<dyn RangeReader>, IoError> {
            match self.archives.get(url) {
                Some(data) => Ok(Arc::new(MemoryReader(data.clone()))),
                None => Err(IoError::NotFound(url.to_string())),
            }
        }
    }

    /// Root-directory-only archive holding `tiles` as (z, x, y, bytes).
    fn build_archive(tile_type: TileType, max_zoom: u8, tiles: &[(u8, u32, u32, &[u8])]) -> Bytes {
        let mut sorted: Vec<(u64, &[u8])> = tiles
            .iter()
            .map(|&(z, x, y, data)| (zxy_to_tile_id(z, x, y).unwrap(), data))
            .collect();
        sorted.sort_by_key(|(id, _)| *id);

        let mut data = Vec::new();
        let mut entries = Vec::new();
        for (tile_id, bytes) in sorted {
            entries.push(Entry {
                tile_id,
                offset: data.len() as u64,
                length: bytes.len() as u32,
                run_length: 1,
            });
            data.extend_from_slice(bytes);
        }
        let root = Directory::from_entries(entries).to_bytes();

        let header = ArchiveHeader {
            root_directory: Section {
                offset: HEADER_SIZE as u64,
                length: root.len() as u64,
            },
            tile_data: Section {
                offset: (HEADER_SIZE + root.len()) as u64,
                length: data.len() as u64,
            },
            tile_type,
            min_zoom: 0,
            max_zoom,
            min_lon: -20.0,
            min_lat: -10.0,
            max_lon: 20.0,
            max_lat: 10.0,
            ..ArchiveHeader::default()
        };

        let mut out = header.to_bytes().to_vec();
        out.extend_from_slice(&root);
        out.extend_from_slice(&data);
        Bytes::from(out)
    }

    fn cache_with(archives: &[(&str, Bytes)]) -> Arc<ArchiveCache> {
        let source = MemorySource {
            archives: archives
                .iter()
                .map(|(url, data)| (url.to_string(), data.clone()))
                .collect(),
        };
        Arc::new(ArchiveCache::new(Arc::new(source)))
    }

    #[tokio::test]
    async fn test_vector_load_metadata() {
        let cache = cache_with(&[(
            "mem://v.pmtiles",
            build_archive(TileType::Mvt, 2, &[(0, 0, 0, b"mvt")]),
        )]);
        let source = ArchiveTileSource::vector("mem://v.pmtiles", cache);

        let metadata = source.load().await.unwrap();
        assert_eq!(metadata.tile_info.lods.len(), 3);
        assert_eq!(metadata.full_extent.wkid, 4326);
        assert_eq!(metadata.full_extent.xmin, -20.0);
        assert_eq!(metadata.content_type, "application/vnd.mapbox-vector-tile");
        assert_eq!(source.tile_info().max_level(), Some(2));
    }

    #[tokio::test]
    async fn test_vector_rejects_raster_archive() {
        let cache = cache_with(&[("mem://png.pmtiles", build_archive(TileType::Png, 1, &[]))]);
        let source = ArchiveTileSource::vector("mem://png.pmtiles", cache);

        let err = source.load().await.unwrap_err();
        assert!(matches!(err, LoadError::TileTypeMismatch { ref actual, .. } if actual == "png"));

        // Every tile request reports the same load failure.
        let tile = source
            .fetch_tile(TileAddress::new(0, 0, 0), &CancellationToken::new())
            .await;
        assert!(matches!(
            tile,
            Err(TileError::Unavailable(LoadError::TileTypeMismatch { .. }))
        ));
    }

    #[tokio::test]
    async fn test_terrain_accepts_any_tile_type() {
        let cache = cache_with(&[(
            "mem://t.pmtiles",
            build_archive(TileType::Webp, 0, &[(0, 0, 0, b"webp")]),
        )]);
        let source = ArchiveTileSource::terrain("mem://t.pmtiles", cache);

        let metadata = source.load().await.unwrap();
        assert_eq!(metadata.content_type, "image/webp");
        let tile = source
            .fetch_tile(TileAddress::new(0, 0, 0), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(tile, TilePayload::Data(Bytes::from_static(b"webp")));
    }

    #[tokio::test]
    async fn test_fetch_present_and_absent() {
        let cache = cache_with(&[(
            "mem://v.pmtiles",
            build_archive(TileType::Mvt, 1, &[(1, 1, 0, b"east"), (1, 0, 0, b"west")]),
        )]);
        let source = ArchiveTileSource::vector("mem://v.pmtiles", cache);
        let token = CancellationToken::new();

        // row 0, col 1 is (z=1, x=1, y=0)
        assert_eq!(
            source.fetch_raw(TileAddress::new(1, 0, 1), &token).await.unwrap(),
            Some(Bytes::from_static(b"east"))
        );
        assert_eq!(
            source.fetch_raw(TileAddress::new(1, 0, 0), &token).await.unwrap(),
            Some(Bytes::from_static(b"west"))
        );
        assert_eq!(source.fetch_raw(TileAddress::new(1, 1, 1), &token).await.unwrap(), None);

        let empty = source.fetch_tile(TileAddress::new(1, 1, 1), &token).await.unwrap();
        assert_eq!(empty, TilePayload::Empty { width: 256, height: 256 });
    }

    #[tokio::test]
    async fn test_missing_url() {
        let source = ArchiveTileSource::new(ArchiveKind::Terrain, None, cache_with(&[]));
        assert!(matches!(source.load().await, Err(LoadError::ConfigMissing)));
        assert!(matches!(
            source
                .fetch_tile(TileAddress::new(0, 0, 0), &CancellationToken::new())
                .await,
            Err(TileError::ConfigMissing)
        ));
    }

    #[tokio::test]
    async fn test_unreachable_archive() {
        let source = ArchiveTileSource::terrain("mem://missing.pmtiles", cache_with(&[]));
        let err = source.load().await.unwrap_err();
        assert!(matches!(
            err,
            LoadError::Archive {
                source: ArchiveError::Io(IoError::NotFound(_)),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_sources_share_cached_handle() {
        let cache = cache_with(&[(
            "mem://shared.pmtiles",
            build_archive(TileType::Mvt, 0, &[]),
        )]);
        let a = ArchiveTileSource::vector("mem://shared.pmtiles", cache.clone());
        let b = ArchiveTileSource::terrain("mem://shared.pmtiles", cache.clone());

        let ha = a.archive_handle().await.unwrap();
        let hb = b.archive_handle().await.unwrap();
        assert!(Arc::ptr_eq(&ha, &hb));
        assert_eq!(cache.open_count(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_request() {
        let cache = cache_with(&[("mem://v.pmtiles", build_archive(TileType::Mvt, 0, &[]))]);
        let source = ArchiveTileSource::vector("mem://v.pmtiles", cache);
        let token = CancellationToken::new();
        token.cancel();

        assert!(matches!(
            source.fetch_tile(TileAddress::new(0, 0, 0), &token).await,
            Err(TileError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn test_failed_load_renders_as_empty_tile() {
        let empty = TilePayload::Empty {
            width: 256,
            height: 256,
        };
        let token = CancellationToken::new();

        let mismatched = ArchiveTileSource::vector(
            "mem://png.pmtiles",
            cache_with(&[("mem://png.pmtiles", build_archive(TileType::Png, 1, &[]))]),
        );
        let unreachable = ArchiveTileSource::terrain("mem://missing.pmtiles", cache_with(&[]));
        let unconfigured = ArchiveTileSource::new(ArchiveKind::Vector, None, cache_with(&[]));

        for source in [&mismatched, &unreachable, &unconfigured] {
            let payload = fetch_tile_or_empty(source, TileAddress::new(0, 0, 0), &token).await;
            assert_eq!(payload, empty);
        }

        let present = ArchiveTileSource::vector(
            "mem://v.pmtiles",
            cache_with(&[(
                "mem://v.pmtiles",
                build_archive(TileType::Mvt, 0, &[(0, 0, 0, b"mvt")]),
            )]),
        );
        let cancelled = CancellationToken::new();
        cancelled.cancel();
        let payload = fetch_tile_or_empty(&present, TileAddress::new(0, 0, 0), &cancelled).await;
        assert_eq!(payload, empty);
    }
}
