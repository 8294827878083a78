//! Test utilities for integration tests.
//!
//! Mock tile fetchers and archive sources plus helpers for building
//! Terrarium PNGs and in-memory PMTiles archives.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use bytes::Bytes;
use http_body_util::BodyExt;
use image::{Rgba, RgbaImage};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use terra_streamer::archive::{
    zxy_to_tile_id, ArchiveCache, ArchiveHeader, ArchiveSource, Directory, Entry, Section,
    TileType, HEADER_SIZE,
};
use terra_streamer::error::IoError;
use terra_streamer::io::{RangeReader, TileFetcher};
use terra_streamer::tile::{encode_png, TileCache, TileService};
use terra_streamer::{create_router, LayerDefinition, LayerFactory, RouterConfig};

// =============================================================================
// Mock Tile Fetcher
// =============================================================================

/// A fetcher serving canned responses by URL and recording every request.
#[derive(Default)]
pub struct MockFetcher {
    responses: HashMap<String, Bytes>,
    requests: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tile(mut self, url: impl Into<String>, data: Bytes) -> Self {
        self.responses.insert(url.into(), data);
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TileFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, IoError> {
        self.requests.lock().unwrap().push(url.to_string());
        self.responses
            .get(url)
            .cloned()
            .ok_or_else(|| IoError::NotFound(url.to_string()))
    }
}

// =============================================================================
// In-Memory Archives
// =============================================================================

struct MemoryReader {
    data: Bytes,
    reads: Arc<AtomicUsize>,
}

#[async_trait]
impl RangeReader for MemoryReader {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let start = offset as usize;
        if start + len > self.data.len() {
            return Err(IoError::RangeOutOfBounds {
                offset,
                requested: len as u64,
                size: self.data.len() as u64,
            });
        }
        Ok(self.data.slice(start..start + len))
    }

    fn size(&self) -> Option<u64> {
        Some(self.data.len() as u64)
    }

    fn identifier(&self) -> &str {
        "memory"
    }
}

/// An archive source holding archives in memory, keyed by URL.
#[derive(Default)]
pub struct MemoryArchives {
    archives: HashMap<String, Bytes>,
    opens: AtomicUsize,
    reads: Arc<AtomicUsize>,
}

impl MemoryArchives {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_archive(mut self, url: impl Into<String>, data: Bytes) -> Self {
        self.archives.insert(url.into(), data);
        self
    }

    /// Number of readers opened so far.
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Number of range reads across all readers.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArchiveSource for MemoryArchives {
    async fn open_reader(&self, url: &str) -> Result<Arc<dyn RangeReader>, IoError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        match self.archives.get(url) {
            Some(data) => Ok(Arc::new(MemoryReader {
                data: data.clone(),
                reads: Arc::clone(&self.reads),
            })),
            None => Err(IoError::NotFound(url.to_string())),
        }
    }
}

/// Build a root-directory-only archive holding `tiles` as (z, x, y, bytes).
pub fn build_archive(tile_type: TileType, max_zoom: u8, tiles: &[(u8, u32, u32, &[u8])]) -> Bytes {
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
        min_lon: -180.0,
        min_lat: -85.0,
        max_lon: 180.0,
        max_lat: 85.0,
        ..ArchiveHeader::default()
    };

    let mut out = header.to_bytes().to_vec();
    out.extend_from_slice(&root);
    out.extend_from_slice(&data);
    Bytes::from(out)
}

// =============================================================================
// Terrarium Images
// =============================================================================

/// Encode an elevation in meters as a Terrarium pixel.
pub fn terrarium_pixel(elevation: f64) -> Rgba<u8> {
    let v = elevation + 32768.0;
    let r = (v / 256.0).floor();
    let g = (v - r * 256.0).floor();
    let b = ((v - r * 256.0 - g) * 256.0).round();
    Rgba([r as u8, g as u8, b as u8, 255])
}

/// A 256x256 Terrarium PNG whose left half sits at `low` and right half at
/// `high` meters.
pub fn terrarium_png(low: f64, high: f64) -> Bytes {
    let image = RgbaImage::from_fn(256, 256, |x, _| {
        if x < 128 {
            terrarium_pixel(low)
        } else {
            terrarium_pixel(high)
        }
    });
    encode_png(&image).unwrap()
}

/// Decode a PNG response body.
pub fn decode_png(bytes: &[u8]) -> RgbaImage {
    image::load_from_memory(bytes).unwrap().to_rgba8()
}

// =============================================================================
// Router Helpers
// =============================================================================

/// Build a router over `layers` with tracing disabled.
pub fn build_router(
    layers: &[&str],
    fetcher: Arc<MockFetcher>,
    archives: Arc<MemoryArchives>,
) -> Router {
    build_router_with(layers, LayerFactory::new(fetcher, archive_cache(archives)))
}

pub fn build_router_with(layers: &[&str], factory: LayerFactory) -> Router {
    let service = build_service(layers, &factory);
    create_router(service, RouterConfig::new().with_tracing(false))
}

pub fn build_service(layers: &[&str], factory: &LayerFactory) -> TileService {
    let layers: Vec<LayerDefinition> = layers.iter().map(|l| l.parse().unwrap()).collect();
    factory.build_service(&layers, TileCache::new())
}

pub fn archive_cache(archives: Arc<MemoryArchives>) -> Arc<ArchiveCache> {
    Arc::new(ArchiveCache::new(archives))
}

/// Issue a GET request and collect the response.
pub async fn get(router: &Router, uri: &str) -> (StatusCode, HeaderMap, Bytes) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, body)
}

/// Issue a GET request and parse the JSON body.
pub async fn get_json(router: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let (status, _, body) = get(router, uri).await;
    (status, serde_json::from_slice(&body).unwrap())
}
