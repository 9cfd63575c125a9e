//! In-memory output tree
//!
//! The tree is an ordered map from output path to artifact. A path, once
//! assigned, is never replaced: later plugins may only add new paths.

use crate::error::{AssetCacheError, AssetCacheResult};
use crate::fingerprint::naming::SourceAsset;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Where an artifact in the output tree came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactOrigin {
    /// A fingerprinted source asset
    Asset { logical_name: String },
    /// A sibling derived from another artifact (e.g. a compressed copy)
    Derived { from: String, plugin: String },
    /// A file staged from outside the source tree
    Copied { source: PathBuf },
    /// A file generated by a plugin (manifests)
    Generated { plugin: String },
}

/// A file in the output tree
#[derive(Debug, Clone)]
pub struct Artifact {
    pub contents: Vec<u8>,
    pub origin: ArtifactOrigin,
}

impl Artifact {
    pub fn new(contents: Vec<u8>, origin: ArtifactOrigin) -> Self {
        Self { contents, origin }
    }

    /// Whether this artifact is an original fingerprinted asset
    pub fn is_asset(&self) -> bool {
        matches!(self.origin, ArtifactOrigin::Asset { .. })
    }
}

/// Ordered set of output files
#[derive(Debug, Clone, Default)]
pub struct OutputTree {
    files: BTreeMap<String, Artifact>,
}

impl OutputTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a tree with fingerprinted source assets
    pub fn from_assets(assets: Vec<SourceAsset>) -> AssetCacheResult<Self> {
        let mut tree = Self::new();
        for asset in assets {
            let origin = ArtifactOrigin::Asset {
                logical_name: asset.record.logical_name,
            };
            tree.insert(
                asset.record.output_path,
                Artifact::new(asset.contents, origin),
                "fingerprint",
            )?;
        }
        Ok(tree)
    }

    /// Add a new file. Fails if the path is already assigned.
    pub fn insert(
        &mut self,
        path: impl Into<String>,
        artifact: Artifact,
        plugin: &str,
    ) -> AssetCacheResult<()> {
        let path = path.into();
        if self.files.contains_key(&path) {
            return Err(AssetCacheError::NameConflict {
                path,
                plugin: plugin.to_string(),
            });
        }
        self.files.insert(path, artifact);
        Ok(())
    }

    pub fn get(&self, path: &str) -> Option<&Artifact> {
        self.files.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// All output paths in lexicographic order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Artifact)> {
        self.files.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Original fingerprinted assets only
    pub fn assets(&self) -> impl Iterator<Item = (&str, &Artifact)> {
        self.iter().filter(|(_, artifact)| artifact.is_asset())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.files.values().map(|a| a.contents.len() as u64).sum()
    }

    /// SHA256 over every (path, contents) pair, in path order
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for (path, artifact) in &self.files {
            hasher.update(path.as_bytes());
            hasher.update([0u8]);
            hasher.update(&artifact.contents);
        }
        hex::encode(hasher.finalize())
    }

    /// Write the tree under `out_dir`, optionally removing it first
    pub fn write_to(&self, out_dir: &Path, clean: bool) -> AssetCacheResult<()> {
        if clean && out_dir.exists() {
            fs::remove_dir_all(out_dir).map_err(|e| {
                AssetCacheError::io(format!("cleaning {}", out_dir.display()), e)
            })?;
        }

        for (path, artifact) in &self.files {
            let dest = out_dir.join(path);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).map_err(|e| {
                    AssetCacheError::io(format!("creating {}", parent.display()), e)
                })?;
            }
            fs::write(&dest, &artifact.contents)
                .map_err(|e| AssetCacheError::io(format!("writing {}", dest.display()), e))?;
        }

        debug!("Wrote {} files to {}", self.files.len(), out_dir.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn generated(bytes: &[u8]) -> Artifact {
        Artifact::new(
            bytes.to_vec(),
            ArtifactOrigin::Generated {
                plugin: "test".into(),
            },
        )
    }

    #[test]
    fn insert_rejects_reassignment() {
        let mut tree = OutputTree::new();
        tree.insert("index.js", generated(b"a"), "first").unwrap();

        let err = tree.insert("index.js", generated(b"b"), "second").unwrap_err();
        assert!(matches!(err, AssetCacheError::NameConflict { ref plugin, .. } if plugin == "second"));
        assert_eq!(tree.get("index.js").unwrap().contents, b"a");
    }

    #[test]
    fn paths_are_ordered() {
        let mut tree = OutputTree::new();
        tree.insert("z.js", generated(b""), "t").unwrap();
        tree.insert("a/b.css", generated(b""), "t").unwrap();
        tree.insert("m.html", generated(b""), "t").unwrap();

        let paths: Vec<_> = tree.paths().collect();
        assert_eq!(paths, vec!["a/b.css", "m.html", "z.js"]);
    }

    #[test]
    fn digest_tracks_contents() {
        let mut a = OutputTree::new();
        a.insert("x.js", generated(b"1"), "t").unwrap();
        let mut b = OutputTree::new();
        b.insert("x.js", generated(b"1"), "t").unwrap();
        let mut c = OutputTree::new();
        c.insert("x.js", generated(b"2"), "t").unwrap();

        assert_eq!(a.digest(), b.digest());
        assert_ne!(a.digest(), c.digest());
    }

    #[test]
    fn write_to_creates_nested_dirs_and_cleans() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("dist");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("stale.js"), "old").unwrap();

        let mut tree = OutputTree::new();
        tree.insert("icons/sh/github.svg", generated(b"<svg/>"), "t").unwrap();
        tree.write_to(&out, true).unwrap();

        assert!(!out.join("stale.js").exists());
        assert_eq!(fs::read(out.join("icons/sh/github.svg")).unwrap(), b"<svg/>");
    }
}
