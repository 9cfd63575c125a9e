//! Script and stylesheet tags for page layouts
//!
//! In development the page loads modules from the dev server, which also
//! injects styles through its client script. In production it loads the
//! built files resolved through the asset manifest, at the same URLs the
//! precache list stores them under.

use crate::error::{AssetCacheError, AssetCacheResult};
use crate::manifest::{asset_url, AssetMap};
use clap::ValueEnum;
use std::fmt;

/// Dev server client script path
const DEV_CLIENT: &str = "@vite/client";

/// Which asset source the page should use
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BuildMode {
    Dev,
    Prod,
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dev => write!(f, "dev"),
            Self::Prod => write!(f, "prod"),
        }
    }
}

/// Logical names of the page entry points
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entrypoints {
    pub script: String,
    pub style: String,
}

/// Rendered head tags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetTags {
    pub scripts: String,
    pub styles: String,
}

impl AssetTags {
    /// Render tags for a mode.
    ///
    /// Prod mode requires both entry points in `assets`; dev mode ignores it.
    pub fn render(
        mode: BuildMode,
        entries: &Entrypoints,
        assets: &AssetMap,
        dev_server: &str,
    ) -> AssetCacheResult<Self> {
        match mode {
            BuildMode::Dev => Ok(Self::dev(entries, dev_server)),
            BuildMode::Prod => Self::prod(entries, assets),
        }
    }

    fn dev(entries: &Entrypoints, dev_server: &str) -> Self {
        let server = dev_server.trim_end_matches('/');
        Self {
            scripts: module_script(&format!("{}/{}", server, entries.script), false),
            styles: module_script(&format!("{}/{}", server, DEV_CLIENT), false),
        }
    }

    fn prod(entries: &Entrypoints, assets: &AssetMap) -> AssetCacheResult<Self> {
        let resolve = |name: &str| {
            assets
                .resolve(name)
                .map(asset_url)
                .ok_or_else(|| AssetCacheError::EntryNotBuilt(name.to_string()))
        };

        Ok(Self {
            scripts: module_script(&resolve(&entries.script)?, true),
            styles: format!(r#"<link rel="stylesheet" href="{}"/>"#, resolve(&entries.style)?),
        })
    }
}

fn module_script(src: &str, crossorigin: bool) -> String {
    if crossorigin {
        format!(r#"<script type="module" crossorigin src="{}"></script>"#, src)
    } else {
        format!(r#"<script type="module" src="{}"></script>"#, src)
    }
}

/// Inline script registering the worker when the browser supports it.
///
/// Failures are swallowed so the page keeps working without offline support.
pub fn registration_snippet(script_url: &str, scope: &str) -> String {
    format!(
        concat!(
            "<script>\n",
            "if (\"serviceWorker\" in navigator) {{\n",
            "  navigator.serviceWorker.register({}, {{ scope: {} }}).catch(() => {{}});\n",
            "}}\n",
            "</script>"
        ),
        js_string(script_url),
        js_string(scope)
    )
}

fn js_string(value: &str) -> String {
    // JSON string literals are valid JS string literals
    serde_json::Value::String(value.to_string()).to_string()
}
