//! Build pipeline
//!
//! Fingerprints the source tree, then runs a fixed chain of plugins over
//! the resulting output tree. Plugin order is declared once here:
//!
//! | # | Plugin | Effect |
//! |---|--------|--------|
//! | 1 | gzip | `.gz` siblings of eligible assets |
//! | 2 | brotli | `.br` siblings of eligible assets |
//! | 3 | static-copy | external files under fixed prefixes |
//! | 4 | web-manifest | `manifest.webmanifest` |
//! | 5 | asset-map | `asset-manifest.json` |
//! | 6 | precache | `precache-manifest.json` |
//!
//! Plugins only add paths. A name assigned by fingerprinting or an earlier
//! plugin is never changed, so the fingerprinted name of an asset does not
//! depend on which plugins run or in what order.

pub mod compress;
pub mod emit;
pub mod static_copy;

pub use compress::{Algorithm, Compress};
pub use emit::{AssetMapEmitter, PrecacheEmitter, WebManifestEmitter};
pub use static_copy::StaticCopy;

use crate::config::Config;
use crate::error::{AssetCacheError, AssetCacheResult};
use crate::fingerprint::{fingerprint_dir, AssetRecord, OutputTree};
use crate::manifest::{PrecacheManifest, PRECACHE_MANIFEST_FILE};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

/// A transformation over the output tree
pub trait BuildPlugin: Send + Sync {
    /// Stable plugin name, used in logs and conflict errors
    fn name(&self) -> &'static str;

    /// Add artifacts to the tree
    fn apply(&self, tree: &mut OutputTree) -> AssetCacheResult<()>;
}

/// Ordered plugin chain
pub struct Pipeline {
    plugins: Vec<Box<dyn BuildPlugin>>,
}

impl Pipeline {
    pub fn new(plugins: Vec<Box<dyn BuildPlugin>>) -> Self {
        Self { plugins }
    }

    /// The standard chain for a configuration.
    ///
    /// `root` is the project directory static copy sources resolve against.
    pub fn from_config(config: &Config, root: &Path) -> Self {
        let mut plugins: Vec<Box<dyn BuildPlugin>> = Vec::new();
        let compression = &config.compression;

        if compression.gzip {
            plugins.push(Box::new(Compress::new(
                Algorithm::Gzip,
                compression.threshold,
                compression.extensions.clone(),
            )));
        }
        if compression.brotli {
            plugins.push(Box::new(Compress::new(
                Algorithm::Brotli,
                compression.threshold,
                compression.extensions.clone(),
            )));
        }
        if !config.static_copy.is_empty() {
            plugins.push(Box::new(StaticCopy::new(root, config.static_copy.clone())));
        }
        plugins.push(Box::new(WebManifestEmitter::new(&config.manifest)));
        plugins.push(Box::new(AssetMapEmitter));
        plugins.push(Box::new(PrecacheEmitter::new(&config.precache, &config.cache)));

        Self::new(plugins)
    }

    /// Plugin names in execution order
    pub fn plugin_names(&self) -> Vec<&'static str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    /// Run every plugin in order. The first failure halts the build.
    pub fn run(&self, tree: &mut OutputTree) -> AssetCacheResult<()> {
        for plugin in &self.plugins {
            let before = tree.len();
            plugin.apply(tree)?;
            debug!(
                "Plugin {} added {} file(s)",
                plugin.name(),
                tree.len() - before
            );
        }
        Ok(())
    }
}

/// Outcome of a build
#[derive(Debug)]
pub struct BuildReport {
    /// Fingerprinted source assets
    pub records: Vec<AssetRecord>,
    /// Total files written, including derived and generated ones
    pub files: usize,
    /// Total bytes written
    pub bytes: u64,
    /// Digest over the whole output tree
    pub digest: String,
    /// The precache list the worker will install
    pub precache: PrecacheManifest,
    /// Where the tree was written
    pub out_dir: PathBuf,
}

/// Fingerprint and transform without touching the output directory
pub fn build_tree(config: &Config, root: &Path) -> AssetCacheResult<(Vec<AssetRecord>, OutputTree)> {
    let source_dir = root.join(&config.build.source_dir);
    let assets = fingerprint_dir(&source_dir, config.build.naming, config.build.hash_length)?;
    let records: Vec<AssetRecord> = assets.iter().map(|a| a.record.clone()).collect();

    let mut tree = OutputTree::from_assets(assets)?;
    let pipeline = Pipeline::from_config(config, root);
    debug!("Pipeline: {}", pipeline.plugin_names().join(" -> "));
    pipeline.run(&mut tree)?;

    Ok((records, tree))
}

/// Run a full build and write the output tree
pub fn build(config: &Config, root: &Path) -> AssetCacheResult<BuildReport> {
    check_out_dir(config, root)?;
    let (records, tree) = build_tree(config, root)?;

    let precache = tree
        .get(PRECACHE_MANIFEST_FILE)
        .ok_or_else(|| AssetCacheError::Internal("precache manifest was not emitted".into()))?;
    let precache: PrecacheManifest = serde_json::from_slice(&precache.contents)?;

    let out_dir = root.join(&config.build.out_dir);
    tree.write_to(&out_dir, config.build.clean)?;

    info!(
        "Built {} assets ({} files) into {}",
        records.len(),
        tree.len(),
        out_dir.display()
    );

    Ok(BuildReport {
        records,
        files: tree.len(),
        bytes: tree.total_bytes(),
        digest: tree.digest(),
        precache,
        out_dir,
    })
}

/// Reject an output directory that equals or contains anything the build
/// reads. Cleaning it would delete the inputs.
pub fn check_out_dir(config: &Config, root: &Path) -> AssetCacheResult<()> {
    let out_dir = lexical_absolute(&root.join(&config.build.out_dir))?;

    let inputs = [root.to_path_buf(), root.join(&config.build.source_dir)]
        .into_iter()
        .chain(config.static_copy.iter().map(|entry| root.join(&entry.from)));

    for input in inputs {
        if lexical_absolute(&input)?.starts_with(&out_dir) {
            return Err(AssetCacheError::OutDirOverlap {
                out_dir: root.join(&config.build.out_dir),
                input,
            });
        }
    }
    Ok(())
}

/// Absolute path with `.` and `..` resolved without touching the filesystem
fn lexical_absolute(path: &Path) -> AssetCacheResult<PathBuf> {
    let absolute = std::path::absolute(path)
        .map_err(|e| AssetCacheError::io(format!("resolving {}", path.display()), e))?;

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    Ok(normalized)
}
