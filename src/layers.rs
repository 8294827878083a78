//! Layer construction from configuration.
//!
//! Turns `name=kind:location` definitions into tile sources. Terrarium
//! layers share one HTTP fetcher; archive layers share one
//! [`ArchiveCache`], so layers naming the same archive URL read one index.

use std::sync::Arc;

use tracing::debug;

use crate::archive::ArchiveCache;
use crate::config::{Config, LayerDefinition};
use crate::io::TileFetcher;
use crate::tile::{
    ArchiveKind, ArchiveTileSource, SourceKind, TerrariumConfig, TerrariumSource, TileCache,
    TileService, TileSource,
};

/// Builds tile sources that share fetcher and archive cache.
pub struct LayerFactory {
    fetcher: Arc<dyn TileFetcher>,
    archives: Arc<ArchiveCache>,
    api_key: Option<String>,
    min_elevation: Option<f64>,
    max_elevation: Option<f64>,
}

impl LayerFactory {
    pub fn new(fetcher: Arc<dyn TileFetcher>, archives: Arc<ArchiveCache>) -> Self {
        Self {
            fetcher,
            archives,
            api_key: None,
            min_elevation: None,
            max_elevation: None,
        }
    }

    /// Factory carrying the API key and elevation range of `config`.
    pub fn from_config(
        config: &Config,
        fetcher: Arc<dyn TileFetcher>,
        archives: Arc<ArchiveCache>,
    ) -> Self {
        Self {
            api_key: config.api_key.clone(),
            min_elevation: config.min_elevation,
            max_elevation: config.max_elevation,
            ..Self::new(fetcher, archives)
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_elevation_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min_elevation = min;
        self.max_elevation = max;
        self
    }

    /// Build the source for one layer definition.
    pub fn build(&self, layer: &LayerDefinition) -> Arc<dyn TileSource> {
        debug!(layer = %layer.name, kind = %layer.kind, "building layer");
        match layer.kind {
            SourceKind::Terrarium => {
                let config = TerrariumConfig {
                    url_template: layer.location.clone(),
                    api_key: self.api_key.clone(),
                    min_elevation: self.min_elevation,
                    max_elevation: self.max_elevation,
                };
                Arc::new(TerrariumSource::new(config, Arc::clone(&self.fetcher)))
            }
            SourceKind::Vector => Arc::new(ArchiveTileSource::new(
                ArchiveKind::Vector,
                layer.location.clone(),
                Arc::clone(&self.archives),
            )),
            SourceKind::Terrain => Arc::new(ArchiveTileSource::new(
                ArchiveKind::Terrain,
                layer.location.clone(),
                Arc::clone(&self.archives),
            )),
        }
    }

    /// Build a tile service holding every layer in `layers`.
    pub fn build_service(&self, layers: &[LayerDefinition], cache: TileCache) -> TileService {
        let mut service = TileService::with_cache(cache);
        for layer in layers {
            service.add_layer(layer.name.clone(), self.build(layer));
        }
        service
    }
}
