//! Precompressed siblings
//!
//! Adds `name.ext.gz` / `name.ext.br` next to eligible assets so a static
//! file server can pick an encoding without compressing per request. The
//! original file is never touched.

use crate::error::{AssetCacheError, AssetCacheResult};
use crate::fingerprint::{extension_of, Artifact, ArtifactOrigin, OutputTree};
use crate::pipeline::BuildPlugin;
use flate2::write::GzEncoder;
use std::io::Write;
use tracing::debug;

/// Gzip level (maximum, like the usual bundler defaults)
const GZIP_LEVEL: u32 = 9;
/// Brotli quality and window
const BROTLI_QUALITY: u32 = 11;
const BROTLI_LG_WINDOW: u32 = 22;

/// Compression algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Gzip,
    Brotli,
}

impl Algorithm {
    /// Suffix appended to the original path
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Gzip => ".gz",
            Self::Brotli => ".br",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Gzip => "gzip",
            Self::Brotli => "brotli",
        }
    }

    /// Compress bytes. Output depends only on the input: no timestamps
    /// or file names end up in the stream.
    pub fn compress(&self, data: &[u8]) -> std::io::Result<Vec<u8>> {
        match self {
            Self::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::new(GZIP_LEVEL));
                encoder.write_all(data)?;
                encoder.finish()
            }
            Self::Brotli => {
                let mut out = Vec::new();
                {
                    let mut writer = brotli::CompressorWriter::new(
                        &mut out,
                        4096,
                        BROTLI_QUALITY,
                        BROTLI_LG_WINDOW,
                    );
                    writer.write_all(data)?;
                    writer.flush()?;
                }
                Ok(out)
            }
        }
    }
}

/// Plugin emitting compressed siblings for one algorithm
#[derive(Debug, Clone)]
pub struct Compress {
    algorithm: Algorithm,
    threshold: usize,
    extensions: Vec<String>,
}

impl Compress {
    pub fn new(algorithm: Algorithm, threshold: usize, extensions: Vec<String>) -> Self {
        Self {
            algorithm,
            threshold,
            extensions,
        }
    }

    fn is_eligible(&self, path: &str, artifact: &Artifact) -> bool {
        artifact.contents.len() >= self.threshold
            && extension_of(path).is_some_and(|ext| {
                self.extensions
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(ext))
            })
    }
}

impl BuildPlugin for Compress {
    fn name(&self) -> &'static str {
        self.algorithm.name()
    }

    fn apply(&self, tree: &mut OutputTree) -> AssetCacheResult<()> {
        // Collect first: siblings are inserted into the same tree
        let candidates: Vec<(String, Vec<u8>)> = tree
            .assets()
            .filter(|(path, artifact)| self.is_eligible(path, artifact))
            .map(|(path, artifact)| (path.to_string(), artifact.contents.clone()))
            .collect();

        let mut added = 0;
        for (path, contents) in candidates {
            let compressed = self
                .algorithm
                .compress(&contents)
                .map_err(|e| AssetCacheError::io(format!("compressing {}", path), e))?;

            // Not worth serving
            if compressed.len() >= contents.len() {
                debug!("Skipping {} for {}: no size gain", self.name(), path);
                continue;
            }

            let sibling = format!("{}{}", path, self.algorithm.suffix());
            let origin = ArtifactOrigin::Derived {
                from: path,
                plugin: self.name().to_string(),
            };
            tree.insert(sibling, Artifact::new(compressed, origin), self.name())?;
            added += 1;
        }

        debug!("{}: added {} siblings", self.name(), added);
        Ok(())
    }
}
