//! assetcache - versioned asset builds with an offline cache worker
//!
//! Fingerprints a web app's assets, generates the precache list for the
//! build, and installs it into a versioned cache store that answers
//! requests cache-first.

pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod devproxy;
pub mod error;
pub mod fingerprint;
pub mod manifest;
pub mod pipeline;
pub mod ui;
pub mod worker;

pub use error::{AssetCacheError, AssetCacheResult};
