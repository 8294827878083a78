//! Integration tests for Terrarium elevation layers.
//!
//! These tests verify:
//! - Greyscale rendering with global and per-tile elevation ranges
//! - URL template expansion and API key handling
//! - Transparent tiles for missing, corrupt or unconfigured upstream tiles
//! - Tile caching of rendered tiles only

use std::sync::Arc;

use axum::http::{header, StatusCode};
use bytes::Bytes;
use image::Rgba;

use terra_streamer::LayerFactory;

use super::test_utils::{
    archive_cache, build_router, build_router_with, decode_png, get, terrarium_png, MemoryArchives,
    MockFetcher,
};

const TILE_URL: &str = "https://t.test/3/5/2.png";
const TILE_PATH: &str = "/tiles/elevation/3/5/2.png";

const TERRARIUM_LAYER: &str = "elevation=terrarium:https://t.test/{level}/{col}/{row}.png";

fn factory(fetcher: Arc<MockFetcher>) -> LayerFactory {
    LayerFactory::new(fetcher, archive_cache(Arc::new(MemoryArchives::new())))
}

// =============================================================================
// Greyscale Rendering
// =============================================================================

#[tokio::test]
async fn test_global_range_rendering() {
    let fetcher = Arc::new(MockFetcher::new().with_tile(TILE_URL, terrarium_png(0.0, 1000.0)));
    let router = build_router_with(
        &[TERRARIUM_LAYER],
        factory(fetcher).with_elevation_range(Some(0.0), Some(1000.0)),
    );

    let (status, headers, body) = get(&router, TILE_PATH).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "image/png");

    let image = decode_png(&body);
    assert_eq!(image.dimensions(), (256, 256));
    assert_eq!(*image.get_pixel(0, 0), Rgba([0, 0, 0, 255]));
    assert_eq!(*image.get_pixel(255, 255), Rgba([255, 255, 255, 255]));
}

#[tokio::test]
async fn test_global_range_clamps() {
    let fetcher = Arc::new(MockFetcher::new().with_tile(TILE_URL, terrarium_png(-50.0, 500.0)));
    let router = build_router_with(
        &[TERRARIUM_LAYER],
        factory(fetcher).with_elevation_range(Some(0.0), Some(100.0)),
    );

    let (_, _, body) = get(&router, TILE_PATH).await;
    let image = decode_png(&body);
    assert_eq!(*image.get_pixel(10, 10), Rgba([0, 0, 0, 255]));
    assert_eq!(*image.get_pixel(200, 10), Rgba([255, 255, 255, 255]));
}

#[tokio::test]
async fn test_per_tile_range_stretches() {
    let fetcher = Arc::new(MockFetcher::new().with_tile(TILE_URL, terrarium_png(100.0, 200.0)));
    let router = build_router(
        &[TERRARIUM_LAYER],
        fetcher,
        Arc::new(MemoryArchives::new()),
    );

    let (status, _, body) = get(&router, TILE_PATH).await;
    assert_eq!(status, StatusCode::OK);

    let image = decode_png(&body);
    assert_eq!(*image.get_pixel(0, 128), Rgba([0, 0, 0, 255]));
    assert_eq!(*image.get_pixel(255, 128), Rgba([255, 255, 255, 255]));
}

#[tokio::test]
async fn test_flat_tile_is_mid_grey() {
    let fetcher = Arc::new(MockFetcher::new().with_tile(TILE_URL, terrarium_png(420.0, 420.0)));
    let router = build_router(
        &[TERRARIUM_LAYER],
        fetcher,
        Arc::new(MemoryArchives::new()),
    );

    let (_, _, body) = get(&router, TILE_PATH).await;
    let image = decode_png(&body);
    assert!(image.pixels().all(|p| *p == Rgba([128, 128, 128, 255])));
}

// =============================================================================
// URL Templates
// =============================================================================

#[tokio::test]
async fn test_api_key_substituted() {
    let fetcher = Arc::new(MockFetcher::new());
    let router = build_router_with(
        &["elevation=terrarium:https://t.test/{level}/{col}/{row}.png?key={apiKey}"],
        factory(Arc::clone(&fetcher)).with_api_key("abc"),
    );

    get(&router, "/tiles/elevation/4/7/9").await;
    assert_eq!(fetcher.requests(), vec!["https://t.test/4/7/9.png?key=abc"]);
}

#[tokio::test]
async fn test_api_key_param_dropped_without_key() {
    let fetcher = Arc::new(MockFetcher::new());
    let router = build_router(
        &["elevation=terrarium:https://t.test/{level}/{col}/{row}.png?key={apiKey}&v=2"],
        Arc::clone(&fetcher),
        Arc::new(MemoryArchives::new()),
    );

    get(&router, "/tiles/elevation/4/7/9").await;
    assert_eq!(fetcher.requests(), vec!["https://t.test/4/7/9.png?v=2"]);
}

// =============================================================================
// Empty Tiles
// =============================================================================

fn assert_transparent(body: &Bytes) {
    let image = decode_png(body);
    assert_eq!(image.dimensions(), (256, 256));
    assert!(image.pixels().all(|p| p.0[3] == 0));
}

#[tokio::test]
async fn test_missing_upstream_tile_is_transparent() {
    let fetcher = Arc::new(MockFetcher::new());
    let router = build_router(
        &[TERRARIUM_LAYER],
        Arc::clone(&fetcher),
        Arc::new(MemoryArchives::new()),
    );

    let (status, headers, body) = get(&router, TILE_PATH).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "image/png");
    assert_eq!(headers.get(header::CACHE_CONTROL).unwrap(), "no-store");
    assert_transparent(&body);

    // Empty tiles are not cached; the next request tries upstream again.
    let (_, headers, _) = get(&router, TILE_PATH).await;
    assert_eq!(headers.get("x-tile-cache-hit").unwrap(), "false");
    assert_eq!(fetcher.requests().len(), 2);
}

#[tokio::test]
async fn test_corrupt_upstream_tile_is_transparent() {
    let fetcher = Arc::new(
        MockFetcher::new().with_tile(TILE_URL, Bytes::from_static(b"definitely not a png")),
    );
    let router = build_router(
        &[TERRARIUM_LAYER],
        fetcher,
        Arc::new(MemoryArchives::new()),
    );

    let (status, _, body) = get(&router, TILE_PATH).await;
    assert_eq!(status, StatusCode::OK);
    assert_transparent(&body);
}

#[tokio::test]
async fn test_unconfigured_template_is_transparent() {
    let fetcher = Arc::new(MockFetcher::new());
    let router = build_router(
        &["elevation=terrarium"],
        Arc::clone(&fetcher),
        Arc::new(MemoryArchives::new()),
    );

    let (status, _, body) = get(&router, TILE_PATH).await;
    assert_eq!(status, StatusCode::OK);
    assert_transparent(&body);
    assert!(fetcher.requests().is_empty());
}

// =============================================================================
// Caching
// =============================================================================

#[tokio::test]
async fn test_rendered_tile_is_cached() {
    let fetcher = Arc::new(MockFetcher::new().with_tile(TILE_URL, terrarium_png(0.0, 10.0)));
    let router = build_router(
        &[TERRARIUM_LAYER],
        Arc::clone(&fetcher),
        Arc::new(MemoryArchives::new()),
    );

    let (_, first_headers, first) = get(&router, TILE_PATH).await;
    let (_, second_headers, second) = get(&router, "/tiles/elevation/3/5/2").await;

    assert_eq!(first_headers.get("x-tile-cache-hit").unwrap(), "false");
    assert_eq!(
        first_headers.get(header::CACHE_CONTROL).unwrap(),
        "public, max-age=3600"
    );
    assert_eq!(second_headers.get("x-tile-cache-hit").unwrap(), "true");
    assert_eq!(first, second);
    assert_eq!(fetcher.requests().len(), 1);
}
