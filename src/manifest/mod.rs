//! Build manifests
//!
//! Everything the runtime side reads from a finished build:
//! - `manifest.webmanifest`: PWA identity for the install prompt
//! - `precache-manifest.json`: URLs the worker stores at install
//! - `asset-manifest.json`: logical name to output path lookup

pub mod assets;
pub mod precache;
pub mod webmanifest;

pub use assets::{AssetMap, ASSET_MANIFEST_FILE};
pub use precache::{
    asset_url, build_globset, is_stale_store, validate_version, PrecacheManifest,
    PRECACHE_MANIFEST_FILE,
};
pub use webmanifest::{WebManifest, WEB_MANIFEST_FILE};
