// SPDX-License-Identifier: Apache-2.0
//! Runtime stage: assembles the final rootfs from scratch. Nothing from
//! the builder scratch directory reaches it except the application
//! directory handed over in `BuilderArtifacts`.

use crate::{copy_tree, BuildArgs, BuilderArtifacts, DistError, ImageRecipe};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tracing::info;

pub fn assemble_rootfs(
    rootfs: &Path,
    recipe: &ImageRecipe,
    args: &BuildArgs,
    builder: &BuilderArtifacts,
    frontend_dist: &Path,
    entrypoint: &Path,
) -> Result<(), DistError> {
    let app_root = rootfs.join(&recipe.app_root);

    copy_tree("asset-assembly", &builder.app_dir, &app_root)?;
    copy_tree(
        "asset-assembly",
        frontend_dist,
        &app_root.join("client/dist"),
    )?;
    info!(app_root = %recipe.app_root.display(), "assets assembled");

    provision_user(rootfs, recipe)?;
    write_build_metadata(&app_root, args)?;
    install_entrypoint(rootfs, recipe, entrypoint)?;
    Ok(())
}

/// Writes the account database entries directly and creates the data
/// directory; ownership is carried by the tar entries at layer build time.
fn provision_user(rootfs: &Path, recipe: &ImageRecipe) -> Result<(), DistError> {
    let etc = rootfs.join("etc");
    std::fs::create_dir_all(&etc)
        .map_err(|e| DistError::new("user-provisioning", format!("create etc: {e}")))?;
    let user = &recipe.user;
    let passwd = format!(
        "root:x:0:0:root:/root:/bin/sh\n{}:x:{}:{}:{}:/{}:/bin/sh\n",
        user.name,
        user.uid,
        user.gid,
        user.name,
        user.home.display()
    );
    let group = format!("root:x:0:\n{}:x:{}:\n", user.name, user.gid);
    std::fs::write(etc.join("passwd"), passwd)
        .map_err(|e| DistError::new("user-provisioning", format!("write passwd: {e}")))?;
    std::fs::write(etc.join("group"), group)
        .map_err(|e| DistError::new("user-provisioning", format!("write group: {e}")))?;
    std::fs::create_dir_all(rootfs.join(&recipe.data_dir)).map_err(|e| {
        DistError::new(
            "user-provisioning",
            format!("create data dir {}: {e}", recipe.data_dir.display()),
        )
    })?;
    Ok(())
}

fn write_build_metadata(app_root: &Path, args: &BuildArgs) -> Result<(), DistError> {
    std::fs::write(app_root.join("build.txt"), args.render_build_txt())
        .map_err(|e| DistError::new("build-metadata", format!("write build.txt: {e}")))
}

/// The entrypoint is external; the pipeline validates only its contract:
/// present and executable, installed 0755 at the application root.
fn install_entrypoint(
    rootfs: &Path,
    recipe: &ImageRecipe,
    entrypoint: &Path,
) -> Result<(), DistError> {
    if !entrypoint.is_file() {
        return Err(DistError::new(
            "entrypoint-delegation",
            format!("missing entrypoint script {}", entrypoint.display()),
        ));
    }
    let target = rootfs.join(&recipe.entrypoint);
    std::fs::copy(entrypoint, &target).map_err(|e| {
        DistError::new(
            "entrypoint-delegation",
            format!("install {}: {e}", target.display()),
        )
    })?;
    std::fs::set_permissions(&target, std::fs::Permissions::from_mode(0o755)).map_err(|e| {
        DistError::new("entrypoint-delegation", format!("chmod entrypoint: {e}"))
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{run_builder_stage, BuilderConfig};

    fn fixture_artifacts(dir: &Path) -> BuilderArtifacts {
        let manifest = dir.join("deps.toml");
        let lock = dir.join("deps.lock");
        std::fs::write(&manifest, "dep = \"1\"\n").expect("manifest");
        std::fs::write(&lock, "dep 1.0.0\n").expect("lock");
        let source = dir.join("src");
        std::fs::create_dir_all(&source).expect("source");
        std::fs::write(source.join("app.py"), "").expect("file");
        run_builder_stage(
            &dir.join("scratch"),
            &BuilderConfig {
                manifest,
                lock_file: lock,
                installer: vec!["true".to_string()],
                source_dir: source,
                migrations_dir: None,
                config_files: Vec::new(),
            },
        )
        .expect("builder stage")
    }

    #[test]
    fn rootfs_carries_account_metadata_and_build_txt() {
        let dir = tempfile::tempdir().expect("tempdir");
        let artifacts = fixture_artifacts(dir.path());
        let frontend = dir.path().join("dist");
        std::fs::create_dir_all(&frontend).expect("frontend");
        std::fs::write(frontend.join("index.html"), "<html></html>").expect("index");
        let entrypoint = dir.path().join("entrypoint.sh");
        std::fs::write(&entrypoint, "#!/bin/sh\nexec spoolman\n").expect("entrypoint");

        let rootfs = dir.path().join("rootfs");
        let recipe = ImageRecipe::spoolman();
        assemble_rootfs(
            &rootfs,
            &recipe,
            &BuildArgs::default(),
            &artifacts,
            &frontend,
            &entrypoint,
        )
        .expect("assemble");

        let passwd = std::fs::read_to_string(rootfs.join("etc/passwd")).expect("passwd");
        assert!(passwd.contains("app:x:1000:1000:app:/home/app:/bin/sh"));
        let build_txt = std::fs::read(rootfs.join("home/app/spoolman/build.txt")).expect("build");
        assert_eq!(build_txt, b"GIT_COMMIT=13\nBUILD_DATE=08-02-2024\n");
        assert!(rootfs.join("home/app/.local/share/spoolman").is_dir());
        assert!(rootfs.join("home/app/spoolman/client/dist/index.html").is_file());
        let mode = std::fs::metadata(rootfs.join("home/app/spoolman/entrypoint.sh"))
            .expect("entrypoint meta")
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn missing_entrypoint_aborts_naming_the_step() {
        let dir = tempfile::tempdir().expect("tempdir");
        let artifacts = fixture_artifacts(dir.path());
        let frontend = dir.path().join("dist");
        std::fs::create_dir_all(&frontend).expect("frontend");
        let err = assemble_rootfs(
            &dir.path().join("rootfs"),
            &ImageRecipe::spoolman(),
            &BuildArgs::default(),
            &artifacts,
            &frontend,
            &dir.path().join("absent.sh"),
        )
        .expect_err("missing entrypoint");
        assert_eq!(err.step, "entrypoint-delegation");
    }
}
