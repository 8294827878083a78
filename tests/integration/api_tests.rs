//! Integration tests for the HTTP API surface.
//!
//! These tests verify:
//! - Health and layer listing endpoints
//! - Layer metadata for loaded and failed layers
//! - Error mapping for unknown layers and malformed tile addresses
//! - Cache-Control headers on tile responses

use std::sync::Arc;

use axum::http::{header, StatusCode};

use terra_streamer::archive::TileType;
use terra_streamer::{create_router, RouterConfig};

use super::test_utils::{
    archive_cache, build_archive, build_router, build_service, get, get_json, MemoryArchives,
    MockFetcher,
};
use terra_streamer::LayerFactory;

const LAYERS: &[&str] = &[
    "elevation=terrarium:https://t.test/{level}/{col}/{row}.png",
    "roads=vector:mem://roads.pmtiles",
    "broken=terrain:mem://missing.pmtiles",
];

fn archives() -> Arc<MemoryArchives> {
    Arc::new(MemoryArchives::new().with_archive(
        "mem://roads.pmtiles",
        build_archive(TileType::Mvt, 4, &[(0, 0, 0, b"world")]),
    ))
}

fn router() -> axum::Router {
    build_router(LAYERS, Arc::new(MockFetcher::new()), archives())
}

// =============================================================================
// Health and Listing
// =============================================================================

#[tokio::test]
async fn test_health() {
    let (status, body) = get_json(&router(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["layers"], 3);
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_layers_listing() {
    let (status, body) = get_json(&router(), "/layers").await;
    assert_eq!(status, StatusCode::OK);

    let layers = body["layers"].as_array().unwrap();
    let names: Vec<&str> = layers.iter().map(|l| l["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["broken", "elevation", "roads"]);

    assert_eq!(layers[0]["kind"], "terrain");
    assert_eq!(layers[0]["loaded"], false);
    assert!(layers[0]["error"].as_str().unwrap().contains("missing.pmtiles"));

    assert_eq!(layers[1]["kind"], "terrarium");
    assert_eq!(layers[1]["loaded"], true);
    assert!(layers[1].get("error").is_none());

    assert_eq!(layers[2]["kind"], "vector");
    assert_eq!(layers[2]["loaded"], true);
}

// =============================================================================
// Layer Metadata
// =============================================================================

#[tokio::test]
async fn test_terrarium_metadata() {
    let (status, body) = get_json(&router(), "/layers/elevation").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["loaded"], true);
    assert_eq!(body["content_type"], "image/png");
    assert_eq!(body["tile_info"]["wkid"], 3857);
    assert_eq!(body["tile_info"]["lods"].as_array().unwrap().len(), 16);
    assert_eq!(body["full_extent"]["wkid"], 3857);
}

#[tokio::test]
async fn test_archive_metadata() {
    let (status, body) = get_json(&router(), "/layers/roads").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["kind"], "vector");
    assert_eq!(body["content_type"], "application/vnd.mapbox-vector-tile");
    assert_eq!(body["tile_info"]["lods"].as_array().unwrap().len(), 5);
    assert_eq!(body["full_extent"]["wkid"], 4326);
    assert_eq!(body["full_extent"]["xmin"], -180.0);
}

#[tokio::test]
async fn test_failed_layer_metadata() {
    let (status, body) = get_json(&router(), "/layers/broken").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["loaded"], false);
    assert!(body.get("tile_info").is_none());
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_unknown_layer_metadata() {
    let (status, body) = get_json(&router(), "/layers/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

// =============================================================================
// Tile Errors
// =============================================================================

#[tokio::test]
async fn test_unknown_layer_tile() {
    let (status, body) = get_json(&router(), "/tiles/nope/0/0/0").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], 404);
}

#[tokio::test]
async fn test_invalid_row() {
    let (status, body) = get_json(&router(), "/tiles/roads/0/0/abc.pbf").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn test_invalid_level_and_column() {
    let router = router();

    let (status, body) = get_json(&router, "/tiles/roads/zoom/0/0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");
    assert!(body["message"].as_str().unwrap().contains("level"));

    // Out of range for a level, not just non-numeric.
    let (status, body) = get_json(&router, "/tiles/roads/300/0/0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);

    let (status, body) = get_json(&router, "/tiles/roads/0/-1/0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("column"));
}

#[tokio::test]
async fn test_address_outside_grid() {
    let router = router();

    let (status, body) = get_json(&router, "/tiles/roads/1/2/0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "tile_out_of_bounds");

    let (status, _) = get_json(&router, "/tiles/elevation/0/0/1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_failed_layer_tile() {
    let (status, body) = get_json(&router(), "/tiles/broken/0/0/0").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "layer_unavailable");
}

// =============================================================================
// Headers
// =============================================================================

#[tokio::test]
async fn test_cache_control_max_age() {
    let factory = LayerFactory::new(Arc::new(MockFetcher::new()), archive_cache(archives()));
    let service = build_service(LAYERS, &factory);
    let router = create_router(
        service,
        RouterConfig::new()
            .with_cache_max_age(60)
            .with_tracing(false),
    );

    let (status, headers, _) = get(&router, "/tiles/roads/0/0/0").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers.get(header::CACHE_CONTROL).unwrap(),
        "public, max-age=60"
    );
}

#[tokio::test]
async fn test_load_all_reports_states() {
    let factory = LayerFactory::new(Arc::new(MockFetcher::new()), archive_cache(archives()));
    let service = build_service(LAYERS, &factory);

    let states = service.load_all().await;
    let loaded: Vec<(&str, bool)> = states
        .iter()
        .map(|(name, state)| (name.as_str(), state.is_loaded()))
        .collect();
    assert_eq!(
        loaded,
        vec![("broken", false), ("elevation", true), ("roads", true)]
    );
}
