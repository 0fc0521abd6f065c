// SPDX-License-Identifier: Apache-2.0
//! Builder stage: dependency installation and source collection in a
//! scratch directory. Only the application directory it produces is
//! carried into the runtime stage.

use crate::{copy_tree, sha256_hex, DistError};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::info;

#[derive(Debug, Clone)]
pub struct BuilderConfig {
    /// Dependency manifest consumed by the installer.
    pub manifest: PathBuf,
    /// Exact dependency resolution; its SHA-256 ties the image to it.
    pub lock_file: PathBuf,
    /// External installer command and arguments. The target prefix and
    /// input files are handed over in `DIST_ENV_DIR`, `DIST_MANIFEST`
    /// and `DIST_LOCK`.
    pub installer: Vec<String>,
    pub source_dir: PathBuf,
    pub migrations_dir: Option<PathBuf>,
    pub config_files: Vec<PathBuf>,
}

/// What survives the builder stage.
#[derive(Debug)]
pub struct BuilderArtifacts {
    /// Application directory: sources, migrations, config, and the
    /// installed `env/` prefix.
    pub app_dir: PathBuf,
    pub env_dir: PathBuf,
    pub lock_sha256: String,
}

pub fn run_builder_stage(
    scratch: &Path,
    config: &BuilderConfig,
) -> Result<BuilderArtifacts, DistError> {
    let app_dir = scratch.join("app");
    let env_dir = app_dir.join("env");
    std::fs::create_dir_all(&env_dir).map_err(|e| {
        DistError::new(
            "dependency-install",
            format!("create {}: {e}", env_dir.display()),
        )
    })?;

    let lock_sha256 = install_dependencies(config, &env_dir)?;
    info!(lock_sha256 = %lock_sha256, "dependency installation complete");

    copy_tree("source-copy", &config.source_dir, &app_dir)?;
    if let Some(migrations) = &config.migrations_dir {
        copy_tree("source-copy", migrations, &app_dir.join("migrations"))?;
    }
    for file in &config.config_files {
        let name = file.file_name().ok_or_else(|| {
            DistError::new("source-copy", format!("config path {} has no file name", file.display()))
        })?;
        std::fs::copy(file, app_dir.join(name)).map_err(|e| {
            DistError::new("source-copy", format!("copy {}: {e}", file.display()))
        })?;
    }

    Ok(BuilderArtifacts {
        app_dir,
        env_dir,
        lock_sha256,
    })
}

/// Runs the external installer. A non-zero exit aborts the build; there
/// is no retry.
fn install_dependencies(config: &BuilderConfig, env_dir: &Path) -> Result<String, DistError> {
    for input in [&config.manifest, &config.lock_file] {
        if !input.is_file() {
            return Err(DistError::new(
                "dependency-install",
                format!("missing input file {}", input.display()),
            ));
        }
    }
    let lock_bytes = std::fs::read(&config.lock_file).map_err(|e| {
        DistError::new(
            "dependency-install",
            format!("read {}: {e}", config.lock_file.display()),
        )
    })?;
    let lock_sha256 = sha256_hex(&lock_bytes);

    let program = config.installer.first().ok_or_else(|| {
        DistError::new("dependency-install", "installer command is empty")
    })?;
    let status = Command::new(program)
        .args(&config.installer[1..])
        .env("DIST_ENV_DIR", env_dir)
        .env("DIST_MANIFEST", &config.manifest)
        .env("DIST_LOCK", &config.lock_file)
        .status()
        .map_err(|e| {
            DistError::new("dependency-install", format!("spawn {program}: {e}"))
        })?;
    if !status.success() {
        return Err(DistError::new(
            "dependency-install",
            format!("installer {program} exited with {status}"),
        ));
    }
    Ok(lock_sha256)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_config(dir: &Path, installer: Vec<String>) -> BuilderConfig {
        let manifest = dir.join("deps.toml");
        let lock = dir.join("deps.lock");
        std::fs::write(&manifest, "dep = \"1\"\n").expect("manifest");
        std::fs::write(&lock, "dep 1.0.0 abc123\n").expect("lock");
        let source = dir.join("src");
        std::fs::create_dir_all(&source).expect("source dir");
        std::fs::write(source.join("app.py"), "print('hi')\n").expect("source file");
        BuilderConfig {
            manifest,
            lock_file: lock,
            installer,
            source_dir: source,
            migrations_dir: None,
            config_files: Vec::new(),
        }
    }

    #[test]
    fn installer_success_produces_env_and_lock_digest() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = fixture_config(
            dir.path(),
            vec![
                "sh".to_string(),
                "-c".to_string(),
                "touch \"$DIST_ENV_DIR/installed\"".to_string(),
            ],
        );
        let scratch = dir.path().join("scratch");
        let artifacts = run_builder_stage(&scratch, &config).expect("builder stage");
        assert!(artifacts.env_dir.join("installed").is_file());
        assert!(artifacts.app_dir.join("app.py").is_file());
        assert_eq!(artifacts.lock_sha256.len(), 64);
    }

    #[test]
    fn installer_failure_aborts_naming_the_step() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = fixture_config(
            dir.path(),
            vec!["sh".to_string(), "-c".to_string(), "exit 3".to_string()],
        );
        let err = run_builder_stage(&dir.path().join("scratch"), &config)
            .expect_err("installer failure");
        assert_eq!(err.step, "dependency-install");
    }

    #[test]
    fn missing_lock_file_aborts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = fixture_config(
            dir.path(),
            vec!["true".to_string()],
        );
        config.lock_file = dir.path().join("absent.lock");
        let err = run_builder_stage(&dir.path().join("scratch"), &config)
            .expect_err("missing lock");
        assert_eq!(err.step, "dependency-install");
        assert!(err.to_string().contains("absent.lock"));
    }
}
