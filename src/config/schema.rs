//! Configuration schema for assetcache
//!
//! Configuration is read from `assetcache.toml` in the project root.

use crate::fingerprint::NamingTemplate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Build pipeline settings
    pub build: BuildConfig,

    /// Precompressed sibling settings
    pub compression: CompressionConfig,

    /// Auxiliary files copied into the output tree
    pub static_copy: Vec<StaticCopyEntry>,

    /// PWA manifest fields
    pub manifest: ManifestConfig,

    /// Precache list settings
    pub precache: PrecacheConfig,

    /// Cache store naming
    pub cache: CacheConfig,

    /// Background worker settings
    pub worker: WorkerConfig,

    /// Development-only settings
    pub dev: DevConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Build settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Directory holding the compiled source assets
    pub source_dir: PathBuf,

    /// Directory the output tree is written to
    pub out_dir: PathBuf,

    /// Output naming template
    pub naming: NamingTemplate,

    /// Number of hex characters kept from the content hash
    pub hash_length: usize,

    /// Remove the output directory before writing
    pub clean: bool,

    /// Entry script referenced by page layouts
    pub entry_script: String,

    /// Entry stylesheet referenced by page layouts
    pub entry_style: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("web/src"),
            out_dir: PathBuf::from("web/dist"),
            naming: NamingTemplate::Static,
            hash_length: 8,
            clean: true,
            entry_script: "scripts.js".to_string(),
            entry_style: "styles.css".to_string(),
        }
    }
}

/// Compression settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// Emit `.gz` siblings
    pub gzip: bool,

    /// Emit `.br` siblings
    pub brotli: bool,

    /// Minimum size in bytes before a file is compressed
    pub threshold: usize,

    /// File extensions eligible for compression
    pub extensions: Vec<String>,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            gzip: true,
            brotli: true,
            threshold: 0,
            extensions: ["html", "xml", "css", "json", "js", "mjs", "svg", "yaml", "yml", "toml"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// A single static copy instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticCopyEntry {
    /// File or directory to copy (relative to the project root)
    pub from: PathBuf,

    /// Destination prefix inside the output tree
    pub to: String,
}

/// PWA manifest configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestConfig {
    /// Application name shown by the install prompt
    pub name: String,

    /// Short name for launchers
    pub short_name: String,

    /// Human-readable description
    pub description: String,

    /// Theme color
    pub theme_color: String,

    /// Splash background color
    pub background_color: String,

    /// Start URL
    pub start_url: String,

    /// Display mode
    pub display: String,

    /// Icon set
    pub icons: Vec<IconConfig>,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            name: "App".to_string(),
            short_name: "App".to_string(),
            description: String::new(),
            theme_color: "#ffffff".to_string(),
            background_color: "#ffffff".to_string(),
            start_url: "/".to_string(),
            display: "standalone".to_string(),
            icons: vec![
                IconConfig {
                    src: "/icons/icon-192x192.png".to_string(),
                    sizes: "192x192".to_string(),
                    mime_type: "image/png".to_string(),
                },
                IconConfig {
                    src: "/icons/icon-512x512.png".to_string(),
                    sizes: "512x512".to_string(),
                    mime_type: "image/png".to_string(),
                },
            ],
        }
    }
}

/// A manifest icon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IconConfig {
    /// Icon URL
    pub src: String,

    /// Icon sizes (e.g. "192x192")
    pub sizes: String,

    /// MIME type
    #[serde(rename = "type")]
    pub mime_type: String,
}

/// Precache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrecacheConfig {
    /// Glob patterns matched against the finalized output tree
    pub globs: Vec<String>,

    /// Literal URLs appended after the globbed ones
    pub extra_urls: Vec<String>,
}

impl Default for PrecacheConfig {
    fn default() -> Self {
        Self {
            globs: vec!["**/*.{js,css,html,ico}".to_string()],
            extra_urls: vec![],
        }
    }
}

/// Cache store naming
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Store name prefix; changing it invalidates every previous generation
    pub name: String,

    /// Fixed version tag (derived from content when unset)
    pub version: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            name: "app-cache".to_string(),
            version: None,
        }
    }
}

/// Background worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Origin precache and passthrough requests are fetched from
    pub origin: String,

    /// Worker scope path
    pub scope: String,

    /// Worker script URL passed to registration
    pub script_url: String,

    /// Cache storage directory (defaults to the state dir)
    pub storage_dir: Option<PathBuf>,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Serve requests from the build output directory instead of the network
    pub offline_dir: Option<PathBuf>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:8080".to_string(),
            scope: "/".to_string(),
            script_url: "/sw.js".to_string(),
            storage_dir: None,
            timeout_secs: 30,
            offline_dir: None,
        }
    }
}

/// Development-only configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DevConfig {
    /// Dev server serving unbundled assets
    pub server: String,

    /// Path prefixes forwarded to a local backend
    pub proxy: BTreeMap<String, String>,
}

impl Default for DevConfig {
    fn default() -> Self {
        let mut proxy = BTreeMap::new();
        proxy.insert("/r".to_string(), "http://localhost:8080".to_string());
        Self {
            server: "http://127.0.0.1:5173".to_string(),
            proxy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("[build]"));
        assert!(toml.contains("[cache]"));
    }

    #[test]
    fn config_deserializes_empty() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.cache.name, "app-cache");
        assert_eq!(config.build.naming, NamingTemplate::Static);
        assert!(config.static_copy.is_empty());
    }

    #[test]
    fn config_deserializes_partial() {
        let toml = r#"
            [build]
            naming = "hashed"

            [[static_copy]]
            from = "node_modules/simple-icons/icons"
            to = "icons/sh"

            [manifest]
            name = "TSDProxy"
            short_name = "TSDProxy"

            [[manifest.icons]]
            src = "/icons/icon-192x192.png"
            sizes = "192x192"
            type = "image/png"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.build.naming, NamingTemplate::Hashed);
        assert_eq!(config.build.hash_length, 8); // default preserved
        assert_eq!(config.static_copy[0].to, "icons/sh");
        assert_eq!(config.manifest.icons.len(), 1);
        assert_eq!(config.manifest.icons[0].mime_type, "image/png");
        assert_eq!(config.manifest.theme_color, "#ffffff");
    }
}
