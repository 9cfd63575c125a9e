//! Manifest emitters
//!
//! Generated files are added under fixed names at the output root. They
//! run after every file-producing plugin so they see the final tree.

use crate::config::{CacheConfig, ManifestConfig, PrecacheConfig};
use crate::error::AssetCacheResult;
use crate::fingerprint::{Artifact, ArtifactOrigin, OutputTree};
use crate::manifest::{
    AssetMap, PrecacheManifest, WebManifest, ASSET_MANIFEST_FILE, PRECACHE_MANIFEST_FILE,
    WEB_MANIFEST_FILE,
};
use crate::pipeline::BuildPlugin;
use tracing::info;

fn generated(contents: Vec<u8>, plugin: &str) -> Artifact {
    Artifact::new(
        contents,
        ArtifactOrigin::Generated {
            plugin: plugin.to_string(),
        },
    )
}

/// Writes `manifest.webmanifest`
#[derive(Debug, Clone)]
pub struct WebManifestEmitter {
    manifest: WebManifest,
}

impl WebManifestEmitter {
    pub fn new(config: &ManifestConfig) -> Self {
        Self {
            manifest: WebManifest::from(config),
        }
    }
}

impl BuildPlugin for WebManifestEmitter {
    fn name(&self) -> &'static str {
        "web-manifest"
    }

    fn apply(&self, tree: &mut OutputTree) -> AssetCacheResult<()> {
        let json = self.manifest.to_json()?;
        tree.insert(WEB_MANIFEST_FILE, generated(json, self.name()), self.name())
    }
}

/// Writes `asset-manifest.json`
#[derive(Debug, Clone, Default)]
pub struct AssetMapEmitter;

impl BuildPlugin for AssetMapEmitter {
    fn name(&self) -> &'static str {
        "asset-map"
    }

    fn apply(&self, tree: &mut OutputTree) -> AssetCacheResult<()> {
        let json = AssetMap::from_tree(tree).to_json()?;
        tree.insert(ASSET_MANIFEST_FILE, generated(json, self.name()), self.name())
    }
}

/// Writes `precache-manifest.json` from a glob over the finished tree
#[derive(Debug, Clone)]
pub struct PrecacheEmitter {
    precache: PrecacheConfig,
    cache: CacheConfig,
}

impl PrecacheEmitter {
    pub fn new(precache: &PrecacheConfig, cache: &CacheConfig) -> Self {
        Self {
            precache: precache.clone(),
            cache: cache.clone(),
        }
    }
}

impl BuildPlugin for PrecacheEmitter {
    fn name(&self) -> &'static str {
        "precache"
    }

    fn apply(&self, tree: &mut OutputTree) -> AssetCacheResult<()> {
        let manifest = PrecacheManifest::generate(tree, &self.precache, &self.cache)?;
        info!(
            "Precache list: {} urls into {}",
            manifest.urls.len(),
            manifest.store_name()
        );
        tree.insert(
            PRECACHE_MANIFEST_FILE,
            generated(manifest.to_json()?, self.name()),
            self.name(),
        )
    }
}
