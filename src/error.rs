//! Error types for assetcache
//!
//! All modules use `AssetCacheResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for assetcache operations
pub type AssetCacheResult<T> = Result<T, AssetCacheError>;

/// All errors that can occur in assetcache
#[derive(Error, Debug)]
pub enum AssetCacheError {
    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Build errors
    #[error("Source directory not found: {0}")]
    SourceDirMissing(PathBuf),

    #[error("Output path {path} already assigned, {plugin} may not overwrite it")]
    NameConflict { path: String, plugin: String },

    #[error("Invalid glob pattern {pattern}: {reason}")]
    GlobPattern { pattern: String, reason: String },

    #[error("Static copy source not found: {0}")]
    StaticCopyMissing(PathBuf),

    #[error("Invalid static copy destination {dest}: {reason}")]
    StaticCopyDest { dest: String, reason: String },

    #[error("Entry asset {0} is not in the asset manifest")]
    EntryNotBuilt(String),

    #[error("Output directory {out_dir} would overwrite {input}")]
    OutDirOverlap { out_dir: PathBuf, input: PathBuf },

    #[error("Invalid cache version '{0}': use letters, digits, '_' or '.'")]
    InvalidCacheVersion(String),

    // Worker errors
    #[error("Precache failed for {url}: {reason}")]
    PrecacheFailed { url: String, reason: String },

    #[error("Network request failed for {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Worker registration failed: {0}")]
    RegistrationFailed(String),

    #[error("Worker install failed: {0}")]
    InstallFailed(String),

    #[error("Worker is no longer running")]
    WorkerGone,

    #[error("Precache manifest not found: {0}")]
    ManifestNotFound(PathBuf),

    // Cache storage errors
    #[error("Invalid cache store name '{0}'")]
    InvalidStoreName(String),

    #[error("Cache index at {path} is corrupt: {reason}")]
    CacheIndexCorrupt { path: PathBuf, reason: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl AssetCacheError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a network error for a request URL
    pub fn network(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create a precache failure for a single URL of the batch
    pub fn precache(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PrecacheFailed {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Check if error is retryable
    ///
    /// A failed install is retried on the next registration; a failed
    /// passthrough fetch may succeed once the network is back.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::PrecacheFailed { .. } | Self::InstallFailed(_) | Self::Network { .. }
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::ManifestNotFound(_) => Some("Run: assetcache build"),
            Self::SourceDirMissing(_) => Some("Set build.source_dir in assetcache.toml"),
            Self::ConfigNotFound(_) => Some("Run: assetcache config init"),
            Self::PrecacheFailed { .. } | Self::InstallFailed(_) => {
                Some("Check that every precache URL is served by worker.origin")
            }
            Self::NameConflict { .. } => Some("Check [[static_copy]] destinations for overlaps"),
            Self::OutDirOverlap { .. } => {
                Some("Point build.out_dir at a directory outside the sources")
            }
            Self::InvalidCacheVersion(_) => Some("Fix cache.version in assetcache.toml"),
            Self::EntryNotBuilt(_) => {
                Some("Check build.entry_script and build.entry_style, then rebuild")
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = AssetCacheError::precache("/b.js", "HTTP 404");
        assert_eq!(err.to_string(), "Precache failed for /b.js: HTTP 404");
    }

    #[test]
    fn error_hint() {
        let err = AssetCacheError::ManifestNotFound(PathBuf::from("dist/precache-manifest.json"));
        assert_eq!(err.hint(), Some("Run: assetcache build"));
        assert!(AssetCacheError::WorkerGone.hint().is_none());
    }

    #[test]
    fn error_retryable() {
        assert!(AssetCacheError::network("/a.css", "connection refused").is_retryable());
        assert!(AssetCacheError::precache("/a.css", "HTTP 500").is_retryable());
        assert!(!AssetCacheError::InvalidStoreName("..".into()).is_retryable());
    }
}
