//! Output naming and content hashing
//!
//! Output names are a pure function of the logical name, the content hash
//! and the active template. Same bytes + same template = same name.

use crate::error::{AssetCacheError, AssetCacheResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

/// Output filename template
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum NamingTemplate {
    /// `name.ext`, cache-busting is left to the precache manifest
    #[default]
    Static,
    /// `name-hash.ext`, safe for far-future expiry
    Hashed,
}

impl NamingTemplate {
    /// Whether output names embed a content hash
    pub fn uses_hash(&self) -> bool {
        matches!(self, Self::Hashed)
    }
}

impl fmt::Display for NamingTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static => write!(f, "static"),
            Self::Hashed => write!(f, "hashed"),
        }
    }
}

/// A compiled asset and the name it is emitted under
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    /// Path relative to the source root, `/`-separated
    pub logical_name: String,
    /// Truncated SHA256 of the contents (hashed template only)
    pub content_hash: Option<String>,
    /// Path relative to the output root
    pub output_path: String,
}

impl AssetRecord {
    /// Fingerprint an asset's bytes under the given template
    pub fn new(
        logical_name: impl Into<String>,
        contents: &[u8],
        template: NamingTemplate,
        hash_length: usize,
    ) -> Self {
        let logical_name = logical_name.into();
        let content_hash = template
            .uses_hash()
            .then(|| content_hash(contents, hash_length));
        let output_path = output_path(&logical_name, content_hash.as_deref(), template);

        Self {
            logical_name,
            content_hash,
            output_path,
        }
    }

    /// File extension of the logical name, without the dot
    pub fn extension(&self) -> Option<&str> {
        extension_of(&self.logical_name)
    }
}

/// A source file read from disk together with its record
#[derive(Debug, Clone)]
pub struct SourceAsset {
    pub record: AssetRecord,
    pub contents: Vec<u8>,
}

/// Hash contents using SHA256, returning the first `len` hex chars
pub fn content_hash(contents: &[u8], len: usize) -> String {
    let digest = Sha256::digest(contents);
    let mut hash = hex::encode(digest);
    hash.truncate(len.clamp(1, 64));
    hash
}

/// Compute the output path for a logical name.
///
/// `Hashed` inserts `-{hash}` before the last extension of the file name;
/// directory components are kept as-is.
pub fn output_path(logical_name: &str, hash: Option<&str>, template: NamingTemplate) -> String {
    let Some(hash) = hash.filter(|_| template.uses_hash()) else {
        return logical_name.to_string();
    };

    let (dir, file) = match logical_name.rfind('/') {
        Some(idx) => logical_name.split_at(idx + 1),
        None => ("", logical_name),
    };

    match file.rfind('.') {
        Some(dot) if dot > 0 => {
            let (stem, ext) = file.split_at(dot);
            format!("{dir}{stem}-{hash}{ext}")
        }
        _ => format!("{dir}{file}-{hash}"),
    }
}

/// Extension of a `/`-separated path, without the dot
pub fn extension_of(path: &str) -> Option<&str> {
    let file = path.rsplit('/').next().unwrap_or(path);
    match file.rfind('.') {
        Some(dot) if dot > 0 && dot + 1 < file.len() => Some(&file[dot + 1..]),
        _ => None,
    }
}

/// Fingerprint every file under `source_dir`.
///
/// The walk is sorted by file name so two builds of the same tree visit
/// files in the same order.
pub fn fingerprint_dir(
    source_dir: &Path,
    template: NamingTemplate,
    hash_length: usize,
) -> AssetCacheResult<Vec<SourceAsset>> {
    if !source_dir.is_dir() {
        return Err(AssetCacheError::SourceDirMissing(source_dir.to_path_buf()));
    }

    let mut assets = Vec::new();

    for entry in WalkDir::new(source_dir).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            AssetCacheError::io(
                format!("walking {}", source_dir.display()),
                e.into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("filesystem loop")),
            )
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let logical_name = relative_name(source_dir, entry.path())?;
        let contents = fs::read(entry.path()).map_err(|e| {
            AssetCacheError::io(format!("reading asset {}", entry.path().display()), e)
        })?;

        let record = AssetRecord::new(logical_name, &contents, template, hash_length);
        debug!("{} -> {}", record.logical_name, record.output_path);
        assets.push(SourceAsset { record, contents });
    }

    debug!("Fingerprinted {} assets", assets.len());
    Ok(assets)
}

/// `/`-separated path of `path` relative to `root`
pub(crate) fn relative_name(root: &Path, path: &Path) -> AssetCacheResult<String> {
    let relative = path.strip_prefix(root).map_err(|_| {
        AssetCacheError::Internal(format!(
            "{} is not under {}",
            path.display(),
            root.display()
        ))
    })?;

    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}
