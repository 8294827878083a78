//! Terra Streamer - A tile server for elevation and vector tiles.
//!
//! This binary starts the HTTP server and configures all components.

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use terra_streamer::{
    archive::{ArchiveCache, UrlArchiveSource},
    config::{Cli, Command, Config},
    io::{create_http_client, create_s3_client, HttpFetcher},
    layers::LayerFactory,
    server::{create_router, RouterConfig},
    tile::{LayerState, TileCache, TileService},
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve(config) => run_serve(config).await,
        Command::Check(config) => run_check(config).await,
    }
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: Config) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    print_banner();

    info!("Configuration:");
    for layer in &config.layers {
        info!(
            "  Layer {}: {} {}",
            layer.name,
            layer.kind,
            layer.location.as_deref().unwrap_or("(no location)")
        );
    }
    match (config.min_elevation, config.max_elevation) {
        (Some(min), Some(max)) => info!("  Elevation range: {} .. {} m", min, max),
        _ => info!("  Elevation range: per tile"),
    }
    if let Some(ref endpoint) = config.s3_endpoint {
        info!("  S3 endpoint: {}", endpoint);
    }
    info!(
        "  Cache: {} archives, {} leaves/archive, {}MB tiles",
        config.cache_archives,
        config.cache_leaves,
        config.cache_tiles / (1024 * 1024)
    );

    let tile_service = match build_tile_service(&config).await {
        Ok(service) => service,
        Err(e) => {
            error!("Failed to initialize: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Load eagerly so archive errors surface at startup; failed layers stay
    // registered and answer 503.
    info!("");
    info!("Loading layers...");
    let states = tile_service.load_all().await;
    let failed = states.iter().filter(|(_, s)| !s.is_loaded()).count();
    if failed > 0 {
        warn!("  {} of {} layer(s) failed to load", failed, states.len());
    } else {
        info!("  All {} layer(s) loaded", states.len());
    }

    let router = create_router(tile_service, build_router_config(&config));

    let addr = config.bind_address();

    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Try these endpoints:");
    info!("    curl http://{}/health", addr);
    info!("    curl http://{}/layers", addr);
    if let Some(layer) = config.layers.first() {
        info!("");
        info!("  Fetch a tile directly:");
        info!("    curl http://{}/tiles/{}/0/0/0", addr, layer.name);
    }
    info!("────────────────────────────────────────────────────────────────");
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Print the startup banner.
fn print_banner() {
    let version = env!("CARGO_PKG_VERSION");
    info!("");
    info!("╔══════════════════════════════════════╗");
    info!("║            TERRA STREAMER            ║");
    info!("║   elevation and vector tile server   ║");
    info!("╚══════════════════════════════════════╝");
    info!("  v{}", version);
    info!("");
}

/// Wire clients, caches and layers into a tile service.
async fn build_tile_service(config: &Config) -> Result<TileService, terra_streamer::IoError> {
    let auth = config.source_auth();
    let http = create_http_client(config.request_timeout())?;

    let mut archive_source = UrlArchiveSource::new(http.clone(), auth.clone());
    if config.needs_s3() {
        archive_source =
            archive_source.with_s3_client(create_s3_client(config.s3_endpoint.as_deref()).await);
    }

    let archives = ArchiveCache::with_capacity(Arc::new(archive_source), config.cache_archives)
        .with_leaf_cache_entries(config.cache_leaves);
    let fetcher = HttpFetcher::new(http, auth);

    let factory = LayerFactory::from_config(config, Arc::new(fetcher), Arc::new(archives));
    Ok(factory.build_service(&config.layers, TileCache::with_capacity(config.cache_tiles)))
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "terra_streamer=debug,tower_http=debug"
    } else {
        "terra_streamer=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application Config.
fn build_router_config(config: &Config) -> RouterConfig {
    let mut router_config = RouterConfig::new().with_cache_max_age(config.cache_max_age);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config.with_tracing(!config.no_tracing)
}

// =============================================================================
// Check Command
// =============================================================================

async fn run_check(config: Config) -> ExitCode {
    if config.verbose {
        init_logging(true);
    }

    println!("Terra Streamer Configuration Check");
    println!("═══════════════════════════════════");
    println!();

    if let Err(e) = config.validate() {
        println!("✗ Configuration: {}", e);
        return ExitCode::FAILURE;
    }
    println!("✓ Configuration: {} layer(s)", config.layers.len());
    println!();

    let tile_service = match build_tile_service(&config).await {
        Ok(service) => service,
        Err(e) => {
            println!("✗ Initialization: {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!("Layers:");
    println!("───────");

    let mut failed = 0;
    for (name, state) in tile_service.load_all().await {
        match state {
            LayerState::Loaded(metadata) => {
                let levels = match (
                    metadata.tile_info.min_level(),
                    metadata.tile_info.max_level(),
                ) {
                    (Some(min), Some(max)) => format!("levels {}-{}", min, max),
                    _ => "no levels".to_string(),
                };
                println!("  ✓ {} ({}, {})", name, metadata.content_type, levels);
            }
            LayerState::Failed(e) => {
                failed += 1;
                println!("  ✗ {}: {}", name, e);
            }
        }
    }

    println!();
    println!("═══════════════════════════════════");
    if failed > 0 {
        println!("✗ {} layer(s) failed to load", failed);
        return ExitCode::FAILURE;
    }
    println!("✓ All checks passed!");

    ExitCode::SUCCESS
}
