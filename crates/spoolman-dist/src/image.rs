// SPDX-License-Identifier: Apache-2.0
//! OCI image layout writer. One gzip-compressed layer per image, built
//! from the assembled rootfs with pinned timestamps and runtime-user
//! ownership so the output is reproducible byte for byte.

use crate::{sha256_hex, BuildArgs, DistError, ImageRecipe};
use flate2::write::GzEncoder;
use flate2::Compression;
use oci_spec::image::{
    Arch, ConfigBuilder, DescriptorBuilder, Digest, ImageConfigurationBuilder, ImageIndexBuilder,
    ImageManifestBuilder, MediaType, Os, RootFsBuilder,
};
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tracing::info;

const STEP: &str = "image-layout";

/// Content addresses of the written image, `sha256:<hex>` form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDigests {
    pub layer_diff_id: String,
    pub layer_digest: String,
    pub config_digest: String,
    pub manifest_digest: String,
}

pub fn write_image_layout(
    layout_dir: &Path,
    rootfs: &Path,
    recipe: &ImageRecipe,
    args: &BuildArgs,
) -> Result<ImageDigests, DistError> {
    let blobs = layout_dir.join("blobs/sha256");
    std::fs::create_dir_all(&blobs)
        .map_err(|e| DistError::new(STEP, format!("create {}: {e}", blobs.display())))?;

    let tar_bytes = build_layer_tar(rootfs, recipe)?;
    let layer_diff_id = format!("sha256:{}", sha256_hex(&tar_bytes));

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&tar_bytes)
        .map_err(|e| DistError::new(STEP, format!("compress layer: {e}")))?;
    let gz_bytes = encoder
        .finish()
        .map_err(|e| DistError::new(STEP, format!("compress layer: {e}")))?;
    let layer_digest = write_blob(&blobs, &gz_bytes)?;

    let config_bytes = render_image_config(recipe, args, &layer_diff_id)?;
    let config_digest = write_blob(&blobs, &config_bytes)?;

    let config_descriptor = DescriptorBuilder::default()
        .media_type(MediaType::ImageConfig)
        .digest(parse_digest(&config_digest)?)
        .size(config_bytes.len() as u64)
        .build()
        .map_err(|e| DistError::new(STEP, e.to_string()))?;
    let layer_descriptor = DescriptorBuilder::default()
        .media_type(MediaType::ImageLayerGzip)
        .digest(parse_digest(&layer_digest)?)
        .size(gz_bytes.len() as u64)
        .build()
        .map_err(|e| DistError::new(STEP, e.to_string()))?;
    let manifest = ImageManifestBuilder::default()
        .schema_version(2u32)
        .media_type(MediaType::ImageManifest)
        .config(config_descriptor)
        .layers(vec![layer_descriptor])
        .build()
        .map_err(|e| DistError::new(STEP, e.to_string()))?;
    let manifest_bytes =
        serde_json::to_vec(&manifest).map_err(|e| DistError::new(STEP, e.to_string()))?;
    let manifest_digest = write_blob(&blobs, &manifest_bytes)?;

    let manifest_descriptor = DescriptorBuilder::default()
        .media_type(MediaType::ImageManifest)
        .digest(parse_digest(&manifest_digest)?)
        .size(manifest_bytes.len() as u64)
        .build()
        .map_err(|e| DistError::new(STEP, e.to_string()))?;
    let index = ImageIndexBuilder::default()
        .schema_version(2u32)
        .media_type(MediaType::ImageIndex)
        .manifests(vec![manifest_descriptor])
        .build()
        .map_err(|e| DistError::new(STEP, e.to_string()))?;
    let index_bytes =
        serde_json::to_vec(&index).map_err(|e| DistError::new(STEP, e.to_string()))?;
    std::fs::write(layout_dir.join("index.json"), index_bytes)
        .map_err(|e| DistError::new(STEP, format!("write index.json: {e}")))?;
    std::fs::write(
        layout_dir.join("oci-layout"),
        b"{\"imageLayoutVersion\":\"1.0.0\"}\n",
    )
    .map_err(|e| DistError::new(STEP, format!("write oci-layout: {e}")))?;

    info!(manifest = %manifest_digest, "image layout written");
    Ok(ImageDigests {
        layer_diff_id,
        layer_digest,
        config_digest,
        manifest_digest,
    })
}

fn parse_digest(value: &str) -> Result<Digest, DistError> {
    value
        .parse::<Digest>()
        .map_err(|e| DistError::new(STEP, format!("digest {value}: {e}")))
}

fn render_image_config(
    recipe: &ImageRecipe,
    args: &BuildArgs,
    layer_diff_id: &str,
) -> Result<Vec<u8>, DistError> {
    let mut env = vec![
        recipe.path_env(),
        format!("GIT_COMMIT={}", args.git_commit),
        format!("BUILD_DATE={}", args.build_date),
    ];
    env.extend(recipe.extra_env.iter().cloned());
    let config = ConfigBuilder::default()
        .user(format!("{}:{}", recipe.user.uid, recipe.user.gid))
        .exposed_ports(vec![format!("{}/tcp", recipe.exposed_port)])
        .env(env)
        .entrypoint(vec![format!("/{}", recipe.entrypoint.display())])
        .working_dir(format!("/{}", recipe.app_root.display()))
        .build()
        .map_err(|e| DistError::new(STEP, e.to_string()))?;
    let rootfs = RootFsBuilder::default()
        .typ("layers".to_string())
        .diff_ids(vec![parse_digest(layer_diff_id)?.to_string()])
        .build()
        .map_err(|e| DistError::new(STEP, e.to_string()))?;
    let configuration = ImageConfigurationBuilder::default()
        .architecture(Arch::Amd64)
        .os(Os::Linux)
        .config(config)
        .rootfs(rootfs)
        .build()
        .map_err(|e| DistError::new(STEP, e.to_string()))?;
    serde_json::to_vec(&configuration).map_err(|e| DistError::new(STEP, e.to_string()))
}

fn write_blob(blobs_dir: &Path, bytes: &[u8]) -> Result<String, DistError> {
    let hex = sha256_hex(bytes);
    let path = blobs_dir.join(&hex);
    std::fs::write(&path, bytes)
        .map_err(|e| DistError::new(STEP, format!("write blob {hex}: {e}")))?;
    Ok(format!("sha256:{hex}"))
}

/// Deterministic tar of the rootfs: entries in sorted walk order, mtime
/// pinned to zero, ownership mapped to the runtime user under its home
/// directory and root elsewhere.
fn build_layer_tar(rootfs: &Path, recipe: &ImageRecipe) -> Result<Vec<u8>, DistError> {
    if !rootfs.is_dir() {
        return Err(DistError::new(
            STEP,
            format!("missing rootfs {}", rootfs.display()),
        ));
    }
    let mut builder = tar::Builder::new(Vec::new());
    for entry in walkdir::WalkDir::new(rootfs)
        .min_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| DistError::new(STEP, e.to_string()))?;
        let rel = entry
            .path()
            .strip_prefix(rootfs)
            .map_err(|e| DistError::new(STEP, e.to_string()))?;
        let (uid, gid) = if rel.starts_with(&recipe.user.home) {
            (u64::from(recipe.user.uid), u64::from(recipe.user.gid))
        } else {
            (0, 0)
        };
        let mut header = tar::Header::new_gnu();
        header.set_mtime(0);
        header.set_uid(uid);
        header.set_gid(gid);
        if entry.file_type().is_dir() {
            header.set_entry_type(tar::EntryType::Directory);
            header.set_size(0);
            header.set_mode(0o755);
            let name = format!("{}/", rel.display());
            builder
                .append_data(&mut header, &name, std::io::empty())
                .map_err(|e| DistError::new(STEP, format!("tar {name}: {e}")))?;
        } else if entry.file_type().is_file() {
            let metadata = entry
                .metadata()
                .map_err(|e| DistError::new(STEP, e.to_string()))?;
            header.set_entry_type(tar::EntryType::Regular);
            header.set_size(metadata.len());
            header.set_mode(metadata.permissions().mode() & 0o7777);
            let file = std::fs::File::open(entry.path())
                .map_err(|e| DistError::new(STEP, format!("open {}: {e}", rel.display())))?;
            builder
                .append_data(&mut header, rel, file)
                .map_err(|e| DistError::new(STEP, format!("tar {}: {e}", rel.display())))?;
        }
    }
    builder
        .into_inner()
        .map_err(|e| DistError::new(STEP, e.to_string()))
}
