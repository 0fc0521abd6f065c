#![forbid(unsafe_code)]
//! Release packaging for Spoolman: a two-stage, sequential filesystem
//! pipeline that reproduces the container image build as a deterministic
//! OCI image layout. A builder stage installs dependencies and collects
//! sources; a runtime stage assembles the final rootfs from scratch, so
//! no builder toolchain ever reaches the image.

mod builder;
mod image;
mod recipe;
mod runtime;

pub use builder::{run_builder_stage, BuilderArtifacts, BuilderConfig};
pub use image::{write_image_layout, ImageDigests};
pub use recipe::{BuildArgs, ImageRecipe, RuntimeUser, DEFAULT_BUILD_DATE, DEFAULT_GIT_COMMIT};
pub use runtime::assemble_rootfs;

use sha2::{Digest, Sha256};
use std::path::Path;

/// Every pipeline failure names the step that raised it; there is no
/// retry or partial-failure recovery.
#[derive(Debug)]
pub struct DistError {
    pub step: &'static str,
    pub message: String,
}

impl DistError {
    #[must_use]
    pub fn new(step: &'static str, message: impl Into<String>) -> Self {
        Self {
            step,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for DistError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.step, self.message)
    }
}

impl std::error::Error for DistError {}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex_encode(&hasher.finalize())
}

pub(crate) fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

/// Recursive copy preserving file permissions (fs::copy keeps the mode).
pub(crate) fn copy_tree(step: &'static str, from: &Path, to: &Path) -> Result<(), DistError> {
    if !from.is_dir() {
        return Err(DistError::new(
            step,
            format!("missing input directory {}", from.display()),
        ));
    }
    for entry in walkdir::WalkDir::new(from).sort_by_file_name() {
        let entry = entry.map_err(|e| DistError::new(step, e.to_string()))?;
        let rel = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| DistError::new(step, e.to_string()))?;
        let target = to.join(rel);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| {
                DistError::new(step, format!("create {}: {e}", target.display()))
            })?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    DistError::new(step, format!("create {}: {e}", parent.display()))
                })?;
            }
            std::fs::copy(entry.path(), &target).map_err(|e| {
                DistError::new(step, format!("copy {}: {e}", entry.path().display()))
            })?;
        }
    }
    Ok(())
}
