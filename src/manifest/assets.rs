//! Logical name to output path lookup

use crate::error::{AssetCacheError, AssetCacheResult};
use crate::fingerprint::{ArtifactOrigin, OutputTree};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// File name of the generated asset map
pub const ASSET_MANIFEST_FILE: &str = "asset-manifest.json";

/// Maps each source asset's logical name to its emitted path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetMap(BTreeMap<String, String>);

impl AssetMap {
    /// Collect the fingerprinted assets of a tree
    pub fn from_tree(tree: &OutputTree) -> Self {
        let map = tree
            .iter()
            .filter_map(|(path, artifact)| match artifact.origin {
                ArtifactOrigin::Asset { ref logical_name } => {
                    Some((logical_name.clone(), path.to_string()))
                }
                _ => None,
            })
            .collect();
        Self(map)
    }

    /// Output path for a logical name
    pub fn resolve(&self, logical_name: &str) -> Option<&str> {
        self.0.get(logical_name).map(String::as_str)
    }

    pub fn insert(&mut self, logical_name: impl Into<String>, output_path: impl Into<String>) {
        self.0.insert(logical_name.into(), output_path.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Serialize as pretty JSON
    pub fn to_json(&self) -> AssetCacheResult<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Load the asset map written by a previous build
    pub async fn load(path: &Path) -> AssetCacheResult<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AssetCacheError::ManifestNotFound(path.to_path_buf())
            } else {
                AssetCacheError::io(format!("reading asset map {}", path.display()), e)
            }
        })?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::Artifact;

    #[test]
    fn only_assets_are_mapped() {
        let mut tree = OutputTree::new();
        tree.insert(
            "index-1a2b3c4d.js",
            Artifact::new(
                b"js".to_vec(),
                ArtifactOrigin::Asset {
                    logical_name: "index.js".into(),
                },
            ),
            "t",
        )
        .unwrap();
        tree.insert(
            "index-1a2b3c4d.js.gz",
            Artifact::new(
                vec![],
                ArtifactOrigin::Derived {
                    from: "index-1a2b3c4d.js".into(),
                    plugin: "gzip".into(),
                },
            ),
            "t",
        )
        .unwrap();

        let map = AssetMap::from_tree(&tree);
        assert_eq!(map.len(), 1);
        assert_eq!(map.resolve("index.js"), Some("index-1a2b3c4d.js"));
    }

    #[test]
    fn json_is_a_flat_object() {
        let mut map = AssetMap::default();
        map.insert("index.css", "index-deadbeef.css");
        let json = String::from_utf8(map.to_json().unwrap()).unwrap();
        assert!(json.contains("\"index.css\": \"index-deadbeef.css\""));
    }
}
