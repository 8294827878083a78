//! Integration tests for archive-backed vector and terrain layers.
//!
//! These tests verify:
//! - Tile bytes pass through unchanged with the archive's content type
//! - Absent tiles answer 204 No Content
//! - Unreachable, unconfigured or mismatched archives answer 503
//! - Layers naming the same archive share one open
//! - Archive tiles are served from cache on repeat requests

use std::sync::Arc;

use axum::http::{header, StatusCode};

use terra_streamer::archive::TileType;

use super::test_utils::{build_archive, build_router, get, get_json, MemoryArchives, MockFetcher};

const ROADS_URL: &str = "mem://roads.pmtiles";
const DEM_URL: &str = "mem://dem.pmtiles";

fn roads_archive() -> MemoryArchives {
    MemoryArchives::new().with_archive(
        ROADS_URL,
        build_archive(
            TileType::Mvt,
            2,
            &[(0, 0, 0, b"world"), (1, 1, 0, b"north-east")],
        ),
    )
}

// =============================================================================
// Vector Layers
// =============================================================================

#[tokio::test]
async fn test_vector_tile_passthrough() {
    let archives = Arc::new(roads_archive());
    let router = build_router(
        &["roads=vector:mem://roads.pmtiles"],
        Arc::new(MockFetcher::new()),
        archives,
    );

    // Path order is level/col/row; col 1 row 0 is tile x=1, y=0.
    let (status, headers, body) = get(&router, "/tiles/roads/1/1/0.pbf").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers.get(header::CONTENT_TYPE).unwrap(),
        "application/vnd.mapbox-vector-tile"
    );
    assert_eq!(&body[..], b"north-east");

    let (status, _, body) = get(&router, "/tiles/roads/0/0/0").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"world");
}

#[tokio::test]
async fn test_absent_tile_is_no_content() {
    let router = build_router(
        &["roads=vector:mem://roads.pmtiles"],
        Arc::new(MockFetcher::new()),
        Arc::new(roads_archive()),
    );

    let (status, headers, body) = get(&router, "/tiles/roads/1/0/1").await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_empty());
    assert_eq!(headers.get(header::CACHE_CONTROL).unwrap(), "no-store");
}

#[tokio::test]
async fn test_vector_layer_rejects_raster_archive() {
    let archives = Arc::new(
        MemoryArchives::new().with_archive(ROADS_URL, build_archive(TileType::Png, 1, &[])),
    );
    let router = build_router(
        &["roads=vector:mem://roads.pmtiles"],
        Arc::new(MockFetcher::new()),
        archives,
    );

    let (status, body) = get_json(&router, "/tiles/roads/0/0/0").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "layer_unavailable");
}

// =============================================================================
// Terrain Layers
// =============================================================================

#[tokio::test]
async fn test_terrain_tile_passthrough() {
    let archives = Arc::new(MemoryArchives::new().with_archive(
        DEM_URL,
        build_archive(TileType::Webp, 3, &[(3, 4, 2, b"webp-bytes")]),
    ));
    let router = build_router(
        &["dem=terrain:mem://dem.pmtiles"],
        Arc::new(MockFetcher::new()),
        archives,
    );

    let (status, headers, body) = get(&router, "/tiles/dem/3/4/2.webp").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "image/webp");
    assert_eq!(&body[..], b"webp-bytes");
}

#[tokio::test]
async fn test_missing_archive_is_unavailable() {
    let router = build_router(
        &["dem=terrain:mem://nowhere.pmtiles"],
        Arc::new(MockFetcher::new()),
        Arc::new(MemoryArchives::new()),
    );

    let (status, body) = get_json(&router, "/tiles/dem/0/0/0").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], 503);
    assert!(body["message"].as_str().unwrap().contains("dem"));
}

#[tokio::test]
async fn test_unconfigured_archive_is_unavailable() {
    let archives = Arc::new(MemoryArchives::new());
    let router = build_router(
        &["dem=terrain"],
        Arc::new(MockFetcher::new()),
        Arc::clone(&archives),
    );

    let (status, _, _) = get(&router, "/tiles/dem/0/0/0").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(archives.open_count(), 0);
}

// =============================================================================
// Shared Archives and Caching
// =============================================================================

#[tokio::test]
async fn test_layers_share_one_archive_open() {
    let archives = Arc::new(MemoryArchives::new().with_archive(
        DEM_URL,
        build_archive(TileType::Png, 1, &[(0, 0, 0, b"dem-root")]),
    ));
    let router = build_router(
        &[
            "dem=terrain:mem://dem.pmtiles",
            "dem-copy=terrain:mem://dem.pmtiles",
        ],
        Arc::new(MockFetcher::new()),
        Arc::clone(&archives),
    );

    let (a, b) = tokio::join!(
        get(&router, "/tiles/dem/0/0/0"),
        get(&router, "/tiles/dem-copy/0/0/0"),
    );
    assert_eq!(a.0, StatusCode::OK);
    assert_eq!(b.0, StatusCode::OK);
    assert_eq!(a.2, b.2);
    assert_eq!(archives.open_count(), 1);
}

#[tokio::test]
async fn test_archive_tile_cached() {
    let archives = Arc::new(roads_archive());
    let router = build_router(
        &["roads=vector:mem://roads.pmtiles"],
        Arc::new(MockFetcher::new()),
        Arc::clone(&archives),
    );

    let (_, first, _) = get(&router, "/tiles/roads/0/0/0").await;
    let reads = archives.read_count();
    let (_, second, body) = get(&router, "/tiles/roads/0/0/0").await;

    assert_eq!(first.get("x-tile-cache-hit").unwrap(), "false");
    assert_eq!(second.get("x-tile-cache-hit").unwrap(), "true");
    assert_eq!(&body[..], b"world");
    assert_eq!(archives.read_count(), reads);
}
