// SPDX-License-Identifier: Apache-2.0
//! End-to-end packaging runs against a throwaway source tree: builder
//! stage, rootfs assembly, OCI layout, and the determinism guarantees.

use flate2::read::GzDecoder;
use spoolman_dist::{
    assemble_rootfs, run_builder_stage, write_image_layout, BuildArgs, BuilderConfig, ImageDigests,
    ImageRecipe,
};
use std::io::Read;
use std::path::{Path, PathBuf};

struct Fixture {
    #[allow(dead_code)]
    dir: tempfile::TempDir,
    config: BuilderConfig,
    frontend: PathBuf,
    entrypoint: PathBuf,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path();

    let source = root.join("source");
    std::fs::create_dir_all(source.join("spoolman")).expect("source");
    std::fs::write(source.join("spoolman/main.py"), "print('spoolman')\n").expect("write");

    let migrations = root.join("migrations");
    std::fs::create_dir_all(&migrations).expect("migrations");
    std::fs::write(migrations.join("0001_init.sql"), "-- init\n").expect("write");

    let frontend = root.join("frontend");
    std::fs::create_dir_all(&frontend).expect("frontend");
    std::fs::write(frontend.join("index.html"), "<html></html>\n").expect("write");

    let entrypoint = root.join("entrypoint.sh");
    std::fs::write(&entrypoint, "#!/bin/sh\nexec spoolman\n").expect("write");

    let manifest = root.join("pyproject.toml");
    std::fs::write(&manifest, "[project]\nname = \"spoolman\"\n").expect("write");
    let lock_file = root.join("pdm.lock");
    std::fs::write(&lock_file, "lock-contents\n").expect("write");

    let config = BuilderConfig {
        manifest,
        lock_file,
        installer: vec![
            "sh".to_string(),
            "-c".to_string(),
            "mkdir -p \"$DIST_ENV_DIR/bin\" && echo tool > \"$DIST_ENV_DIR/bin/spoolman\""
                .to_string(),
        ],
        source_dir: source,
        migrations_dir: Some(migrations),
        config_files: Vec::new(),
    };
    Fixture {
        dir,
        config,
        frontend,
        entrypoint,
    }
}

fn build_once(fixture: &Fixture, scratch: &Path, layout: &Path) -> ImageDigests {
    let recipe = ImageRecipe::spoolman();
    let args = BuildArgs::default();
    let artifacts = run_builder_stage(scratch, &fixture.config).expect("builder stage");
    let rootfs = scratch.join("rootfs");
    assemble_rootfs(
        &rootfs,
        &recipe,
        &args,
        &artifacts,
        &fixture.frontend,
        &fixture.entrypoint,
    )
    .expect("rootfs");
    std::fs::create_dir_all(layout).expect("layout dir");
    write_image_layout(layout, &rootfs, &recipe, &args).expect("image layout")
}

fn read_blob(layout: &Path, digest: &str) -> Vec<u8> {
    let hex = digest.strip_prefix("sha256:").expect("digest form");
    std::fs::read(layout.join("blobs/sha256").join(hex)).expect("blob")
}

fn layer_entries(layout: &Path, digests: &ImageDigests) -> Vec<(String, u64, u64, u32, u64, Vec<u8>)> {
    let blob = read_blob(layout, &digests.layer_digest);
    let mut tar_bytes = Vec::new();
    GzDecoder::new(blob.as_slice())
        .read_to_end(&mut tar_bytes)
        .expect("gunzip");
    let mut archive = tar::Archive::new(tar_bytes.as_slice());
    let mut entries = Vec::new();
    for entry in archive.entries().expect("entries") {
        let mut entry = entry.expect("entry");
        let path = entry.path().expect("path").display().to_string();
        let header = entry.header();
        let uid = header.uid().expect("uid");
        let gid = header.gid().expect("gid");
        let mode = header.mode().expect("mode");
        let mtime = header.mtime().expect("mtime");
        let mut body = Vec::new();
        entry.read_to_end(&mut body).expect("body");
        entries.push((path, uid, gid, mode, mtime, body));
    }
    entries
}

#[test]
fn builds_a_complete_layout() {
    let fixture = fixture();
    let work = tempfile::tempdir().expect("work");
    let layout = work.path().join("layout");
    let digests = build_once(&fixture, work.path(), &layout);

    assert!(layout.join("oci-layout").exists());
    let index: serde_json::Value =
        serde_json::from_slice(&std::fs::read(layout.join("index.json")).expect("index"))
            .expect("index json");
    assert_eq!(
        index["manifests"][0]["digest"].as_str(),
        Some(digests.manifest_digest.as_str())
    );

    let manifest: serde_json::Value =
        serde_json::from_slice(&read_blob(&layout, &digests.manifest_digest)).expect("manifest");
    assert_eq!(
        manifest["config"]["digest"].as_str(),
        Some(digests.config_digest.as_str())
    );
    assert_eq!(
        manifest["layers"][0]["digest"].as_str(),
        Some(digests.layer_digest.as_str())
    );
}

#[test]
fn image_config_pins_port_user_and_build_args() {
    let fixture = fixture();
    let work = tempfile::tempdir().expect("work");
    let layout = work.path().join("layout");
    let digests = build_once(&fixture, work.path(), &layout);

    let config: serde_json::Value =
        serde_json::from_slice(&read_blob(&layout, &digests.config_digest)).expect("config");
    assert_eq!(config["config"]["User"].as_str(), Some("1000:1000"));
    assert!(config["config"]["ExposedPorts"]
        .as_object()
        .expect("ports")
        .contains_key("8000/tcp"));
    let env: Vec<&str> = config["config"]["Env"]
        .as_array()
        .expect("env")
        .iter()
        .filter_map(|v| v.as_str())
        .collect();
    assert!(env.contains(&"GIT_COMMIT=13"));
    assert!(env.contains(&"BUILD_DATE=08-02-2024"));
    assert!(env
        .iter()
        .any(|e| e.starts_with("PATH=/home/app/spoolman/env/bin:")));
    assert_eq!(
        config["config"]["Entrypoint"][0].as_str(),
        Some("/home/app/spoolman/entrypoint.sh")
    );
    assert_eq!(
        config["rootfs"]["diff_ids"][0].as_str(),
        Some(digests.layer_diff_id.as_str())
    );
}

#[test]
fn layer_entries_carry_runtime_ownership_and_zero_mtime() {
    let fixture = fixture();
    let work = tempfile::tempdir().expect("work");
    let layout = work.path().join("layout");
    let digests = build_once(&fixture, work.path(), &layout);
    let entries = layer_entries(&layout, &digests);

    let data_dir = entries
        .iter()
        .find(|(path, ..)| path == "home/app/.local/share/spoolman/")
        .expect("data dir entry");
    assert_eq!((data_dir.1, data_dir.2), (1000, 1000));

    let passwd = entries
        .iter()
        .find(|(path, ..)| path == "etc/passwd")
        .expect("passwd entry");
    assert_eq!((passwd.1, passwd.2), (0, 0));
    assert!(String::from_utf8_lossy(&passwd.5).contains("app:x:1000:1000:"));

    let entrypoint = entries
        .iter()
        .find(|(path, ..)| path == "home/app/spoolman/entrypoint.sh")
        .expect("entrypoint entry");
    assert_eq!(entrypoint.3 & 0o777, 0o755);

    let build_txt = entries
        .iter()
        .find(|(path, ..)| path == "home/app/spoolman/build.txt")
        .expect("build.txt entry");
    assert_eq!(build_txt.5, b"GIT_COMMIT=13\nBUILD_DATE=08-02-2024\n");

    assert!(entries.iter().all(|(_, _, _, _, mtime, _)| *mtime == 0));
    assert!(entries
        .iter()
        .any(|(path, ..)| path == "home/app/spoolman/client/dist/index.html"));
    assert!(entries
        .iter()
        .any(|(path, ..)| path == "home/app/spoolman/migrations/0001_init.sql"));
    // Builder inputs never reach the layer.
    assert!(entries
        .iter()
        .all(|(path, ..)| !path.ends_with("pdm.lock") && !path.ends_with("pyproject.toml")));
}

#[test]
fn repeated_builds_are_byte_identical() {
    let fixture = fixture();
    let first_work = tempfile::tempdir().expect("work");
    let first_layout = first_work.path().join("layout");
    let first = build_once(&fixture, first_work.path(), &first_layout);

    let second_work = tempfile::tempdir().expect("work");
    let second_layout = second_work.path().join("layout");
    let second = build_once(&fixture, second_work.path(), &second_layout);

    assert_eq!(first, second);
    assert_eq!(
        read_blob(&first_layout, &first.layer_digest),
        read_blob(&second_layout, &second.layer_digest)
    );
}

#[test]
fn installer_failure_names_the_step() {
    let fixture = fixture();
    let mut config = fixture.config;
    config.installer = vec!["sh".to_string(), "-c".to_string(), "exit 7".to_string()];
    let work = tempfile::tempdir().expect("work");
    let err = run_builder_stage(work.path(), &config).expect_err("installer failure");
    assert_eq!(err.step, "dependency-install");
}
