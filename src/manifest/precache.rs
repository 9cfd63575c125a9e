//! Precache list generation and store versioning
//!
//! The precache list is the ordered set of URLs the worker fetches and
//! stores atomically at install. Its version tag names the cache store,
//! so a new build with different contents installs into a fresh store
//! and the old one is reclaimed on activation.

use crate::config::{CacheConfig, PrecacheConfig};
use crate::error::{AssetCacheError, AssetCacheResult};
use crate::fingerprint::OutputTree;
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::debug;

/// File name of the generated precache manifest
pub const PRECACHE_MANIFEST_FILE: &str = "precache-manifest.json";

/// Length of a derived version tag
const VERSION_LENGTH: usize = 12;

/// URLs to precache and the store they belong to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrecacheManifest {
    /// Store name prefix shared by every version
    pub cache_name: String,
    /// Version tag of this build
    pub version: String,
    /// Ordered URLs fetched at install
    pub urls: Vec<String>,
}

impl PrecacheManifest {
    pub fn new(
        cache_name: impl Into<String>,
        version: impl Into<String>,
        urls: Vec<String>,
    ) -> Self {
        Self {
            cache_name: cache_name.into(),
            version: version.into(),
            urls,
        }
    }

    /// Build the precache list from a finalized tree.
    ///
    /// Globbed tree paths come first in path order, followed by the
    /// configured literal URLs that are not already listed.
    pub fn generate(
        tree: &OutputTree,
        precache: &PrecacheConfig,
        cache: &CacheConfig,
    ) -> AssetCacheResult<Self> {
        let globs = build_globset(&precache.globs)?;

        let mut urls: Vec<String> = tree
            .paths()
            .filter(|path| globs.is_match(path))
            .map(asset_url)
            .collect();

        for extra in &precache.extra_urls {
            let url = normalize_url(extra);
            if !urls.contains(&url) {
                urls.push(url);
            }
        }

        let version = match cache.version {
            Some(ref version) => {
                validate_version(version)?;
                version.clone()
            }
            None => derive_version(tree, &urls),
        };

        debug!(
            "Precache manifest {}-{} with {} urls",
            cache.name,
            version,
            urls.len()
        );

        Ok(Self::new(cache.name.clone(), version, urls))
    }

    /// Name of the cache store this manifest installs into
    pub fn store_name(&self) -> String {
        format!("{}-{}", self.cache_name, self.version)
    }

    /// Serialize as pretty JSON
    pub fn to_json(&self) -> AssetCacheResult<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Load a manifest written by a previous build
    pub async fn load(path: &Path) -> AssetCacheResult<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AssetCacheError::ManifestNotFound(path.to_path_buf())
            } else {
                AssetCacheError::io(format!("reading precache manifest {}", path.display()), e)
            }
        })?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// URL a page requests for a path of the output tree.
///
/// Precache entries and layout tags both go through here so that the
/// worker caches exactly what pages ask for.
pub fn asset_url(path: &str) -> String {
    format!("/{}", path.trim_start_matches('/'))
}

/// Whether `store` is a previous generation of `cache_name` that should be
/// deleted once `current` activates.
pub fn is_stale_store(store: &str, cache_name: &str, current: &str) -> bool {
    if store == current {
        return false;
    }
    // Versions never contain '-', so the tail after the last one is the
    // version and everything before it must be exactly our cache name
    store == cache_name
        || store
            .rsplit_once('-')
            .is_some_and(|(name, version)| name == cache_name && validate_version(version).is_ok())
}

/// Version tags name stores after the last `-`, so they may not contain one
pub fn validate_version(version: &str) -> AssetCacheResult<()> {
    let valid = !version.is_empty()
        && version
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(AssetCacheError::InvalidCacheVersion(version.to_string()))
    }
}

/// Compile glob patterns into a matcher
pub fn build_globset(patterns: &[String]) -> AssetCacheResult<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| AssetCacheError::GlobPattern {
            pattern: pattern.clone(),
            reason: e.to_string(),
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| AssetCacheError::GlobPattern {
        pattern: patterns.join(", "),
        reason: e.to_string(),
    })
}

/// Literal URLs are scope-relative; make them absolute paths
fn normalize_url(url: &str) -> String {
    if url.starts_with('/') || url.contains("://") {
        url.to_string()
    } else {
        format!("/{}", url)
    }
}

/// Hash every URL with the contents it points at in the tree
fn derive_version(tree: &OutputTree, urls: &[String]) -> String {
    let mut hasher = Sha256::new();
    for url in urls {
        hasher.update(url.as_bytes());
        hasher.update([0u8]);
        if let Some(artifact) = tree.get(url.trim_start_matches('/')) {
            hasher.update(&artifact.contents);
        }
    }
    let mut version = hex::encode(hasher.finalize());
    version.truncate(VERSION_LENGTH);
    version
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::{Artifact, ArtifactOrigin};

    fn tree(files: &[(&str, &str)]) -> OutputTree {
        let mut tree = OutputTree::new();
        for (path, contents) in files {
            tree.insert(
                *path,
                Artifact::new(
                    contents.as_bytes().to_vec(),
                    ArtifactOrigin::Asset {
                        logical_name: path.to_string(),
                    },
                ),
                "test",
            )
            .unwrap();
        }
        tree
    }

    #[test]
    fn generate_globs_and_appends_extras() {
        let tree = tree(&[
            ("index.js", "js"),
            ("index.js.gz", "gz"),
            ("index.css", "css"),
            ("icons/tsdproxy.svg", "svg"),
            ("favicon.ico", "ico"),
        ]);
        let precache = PrecacheConfig {
            globs: vec!["**/*.{js,css,html,ico}".to_string()],
            extra_urls: vec![
                "/icons/tsdproxy.svg".to_string(),
                "icons/icon-512x512.png".to_string(),
                "/index.css".to_string(),
            ],
        };

        let manifest = PrecacheManifest::generate(&tree, &precache, &CacheConfig::default()).unwrap();

        assert_eq!(
            manifest.urls,
            vec![
                "/favicon.ico",
                "/index.css",
                "/index.js",
                "/icons/tsdproxy.svg",
                "/icons/icon-512x512.png",
            ]
        );
        assert_eq!(manifest.version.len(), VERSION_LENGTH);
    }

    #[test]
    fn version_changes_with_content() {
        let precache = PrecacheConfig::default();
        let cache = CacheConfig::default();

        let v1 = PrecacheManifest::generate(&tree(&[("a.js", "1")]), &precache, &cache).unwrap();
        let v1_again = PrecacheManifest::generate(&tree(&[("a.js", "1")]), &precache, &cache).unwrap();
        let v2 = PrecacheManifest::generate(&tree(&[("a.js", "2")]), &precache, &cache).unwrap();

        assert_eq!(v1.version, v1_again.version);
        assert_ne!(v1.version, v2.version);
        assert_ne!(v1.store_name(), v2.store_name());
    }

    #[test]
    fn fixed_version_overrides_derived() {
        let cache = CacheConfig {
            name: "app-cache".to_string(),
            version: Some("v3".to_string()),
        };
        let manifest =
            PrecacheManifest::generate(&tree(&[("a.js", "1")]), &PrecacheConfig::default(), &cache)
                .unwrap();
        assert_eq!(manifest.store_name(), "app-cache-v3");
    }

    #[test]
    fn bad_glob_is_reported() {
        let precache = PrecacheConfig {
            globs: vec!["**/*.{js".to_string()],
            extra_urls: vec![],
        };
        let err = PrecacheManifest::generate(&OutputTree::new(), &precache, &CacheConfig::default())
            .unwrap_err();
        assert!(matches!(err, AssetCacheError::GlobPattern { .. }));
    }

    #[test]
    fn stale_store_detection() {
        assert!(is_stale_store("app-cache-v1", "app-cache", "app-cache-v2"));
        assert!(is_stale_store("app-cache", "app-cache", "app-cache-v2"));
        assert!(!is_stale_store("app-cache-v2", "app-cache", "app-cache-v2"));
        assert!(!is_stale_store("other-cache-v1", "app-cache", "app-cache-v2"));
        assert!(!is_stale_store("app-cachex", "app-cache", "app-cache-v2"));
    }

    #[test]
    fn stale_detection_ignores_longer_cache_names() {
        // Another app sharing the storage dir under a name that extends ours
        assert!(!is_stale_store("app-cache-v1", "app", "app-v2"));
        assert!(!is_stale_store("app-cache-3f9a1c0b2d4e", "app", "app-v2"));
        assert!(is_stale_store("app-v1", "app", "app-v2"));
    }

    #[test]
    fn version_override_may_not_contain_dash() {
        let cache = CacheConfig {
            name: "app-cache".to_string(),
            version: Some("v3-beta".to_string()),
        };
        let err =
            PrecacheManifest::generate(&tree(&[("a.js", "1")]), &PrecacheConfig::default(), &cache)
                .unwrap_err();
        assert!(matches!(err, AssetCacheError::InvalidCacheVersion(ref v) if v == "v3-beta"));
        assert!(validate_version("3f9a1c0b2d4e").is_ok());
        assert!(validate_version("v1.2").is_ok());
    }

    #[tokio::test]
    async fn load_missing_manifest() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = PrecacheManifest::load(&dir.path().join(PRECACHE_MANIFEST_FILE))
            .await
            .unwrap_err();
        assert!(matches!(err, AssetCacheError::ManifestNotFound(_)));
    }
}
