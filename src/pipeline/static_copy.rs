//! Static copy staging
//!
//! Copies auxiliary files (icon sets, logos) from outside the source tree
//! into fixed destination prefixes of the output tree. Runtime code links
//! to these paths directly, so destinations never carry a hash.

use crate::config::StaticCopyEntry;
use crate::error::{AssetCacheError, AssetCacheResult};
use crate::fingerprint::naming::relative_name;
use crate::fingerprint::{Artifact, ArtifactOrigin, OutputTree};
use crate::pipeline::BuildPlugin;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Plugin copying configured files and directories
#[derive(Debug, Clone)]
pub struct StaticCopy {
    root: PathBuf,
    entries: Vec<StaticCopyEntry>,
}

impl StaticCopy {
    /// `root` is the directory `from` paths are resolved against
    pub fn new(root: impl Into<PathBuf>, entries: Vec<StaticCopyEntry>) -> Self {
        Self {
            root: root.into(),
            entries,
        }
    }

    /// Resolve every file an entry stages, as (source, output path) pairs
    pub fn resolve(&self, entry: &StaticCopyEntry) -> AssetCacheResult<Vec<(PathBuf, String)>> {
        let dest = validate_destination(&entry.to)?;
        let source = self.root.join(&entry.from);

        if source.is_file() {
            let file_name = source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| AssetCacheError::StaticCopyMissing(source.clone()))?;
            return Ok(vec![(source, join_dest(&dest, &file_name))]);
        }

        if !source.is_dir() {
            return Err(AssetCacheError::StaticCopyMissing(source));
        }

        let mut files = Vec::new();
        for item in WalkDir::new(&source).sort_by_file_name() {
            let item = item.map_err(|e| {
                AssetCacheError::io(
                    format!("walking {}", source.display()),
                    e.into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("filesystem loop")),
                )
            })?;
            if !item.file_type().is_file() {
                continue;
            }
            let relative = relative_name(&source, item.path())?;
            files.push((item.path().to_path_buf(), join_dest(&dest, &relative)));
        }
        Ok(files)
    }
}

impl BuildPlugin for StaticCopy {
    fn name(&self) -> &'static str {
        "static-copy"
    }

    fn apply(&self, tree: &mut OutputTree) -> AssetCacheResult<()> {
        for entry in &self.entries {
            let files = self.resolve(entry)?;
            debug!(
                "Staging {} file(s) from {} under {}",
                files.len(),
                entry.from.display(),
                entry.to
            );

            for (source, output) in files {
                let contents = read(&source)?;
                let origin = ArtifactOrigin::Copied { source };
                tree.insert(output, Artifact::new(contents, origin), self.name())?;
            }
        }
        Ok(())
    }
}

/// Normalize a destination prefix, rejecting escapes from the output root
fn validate_destination(dest: &str) -> AssetCacheResult<String> {
    let trimmed = dest.trim_matches('/');
    let invalid = |reason: &str| AssetCacheError::StaticCopyDest {
        dest: dest.to_string(),
        reason: reason.to_string(),
    };

    if trimmed.contains('\\') || trimmed.contains('\0') {
        return Err(invalid("must use '/' separators"));
    }
    if trimmed.split('/').any(|part| part == ".." || part == ".") {
        return Err(invalid("must not contain '.' or '..' segments"));
    }
    Ok(trimmed.to_string())
}

fn join_dest(dest: &str, relative: &str) -> String {
    if dest.is_empty() {
        relative.to_string()
    } else {
        format!("{}/{}", dest, relative)
    }
}

fn read(path: &Path) -> AssetCacheResult<Vec<u8>> {
    fs::read(path).map_err(|e| AssetCacheError::io(format!("reading {}", path.display()), e))
}
