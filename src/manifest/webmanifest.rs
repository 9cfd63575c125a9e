//! PWA manifest
//!
//! Describes the installable app to the browser's install prompt. The
//! worker itself never reads it.

use crate::config::{IconConfig, ManifestConfig};
use crate::error::AssetCacheResult;
use serde::{Deserialize, Serialize};

/// File name of the generated web manifest
pub const WEB_MANIFEST_FILE: &str = "manifest.webmanifest";

/// Web app manifest document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebManifest {
    pub name: String,
    pub short_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub theme_color: String,
    pub background_color: String,
    pub start_url: String,
    pub display: String,
    #[serde(default)]
    pub icons: Vec<IconConfig>,
}

impl From<&ManifestConfig> for WebManifest {
    fn from(config: &ManifestConfig) -> Self {
        Self {
            name: config.name.clone(),
            short_name: config.short_name.clone(),
            description: config.description.clone(),
            theme_color: config.theme_color.clone(),
            background_color: config.background_color.clone(),
            start_url: config.start_url.clone(),
            display: config.display.clone(),
            icons: config.icons.clone(),
        }
    }
}

impl WebManifest {
    /// Serialize as pretty JSON
    pub fn to_json(&self) -> AssetCacheResult<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }
}
