//! Asset fingerprinting
//!
//! Assigns deterministic output names to compiled assets. With the
//! `Hashed` template the name embeds a truncated SHA256 of the contents,
//! so a name changes if and only if the bytes change.

pub mod naming;
pub mod tree;

pub use naming::{
    content_hash, extension_of, fingerprint_dir, output_path, AssetRecord, NamingTemplate,
    SourceAsset,
};
pub use tree::{Artifact, ArtifactOrigin, OutputTree};
