// SPDX-License-Identifier: Apache-2.0
//! What the finished image looks like: paths, account, port, entrypoint.

use std::path::PathBuf;

pub const DEFAULT_GIT_COMMIT: &str = "13";
pub const DEFAULT_BUILD_DATE: &str = "08-02-2024";

/// Build arguments persisted into the image config environment and into
/// `build.txt` at the application root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArgs {
    pub git_commit: String,
    pub build_date: String,
}

impl Default for BuildArgs {
    fn default() -> Self {
        Self {
            git_commit: DEFAULT_GIT_COMMIT.to_string(),
            build_date: DEFAULT_BUILD_DATE.to_string(),
        }
    }
}

impl BuildArgs {
    /// Exactly two `KEY=value` lines, in this order, with a trailing
    /// newline. Byte-identical across runs for fixed arguments.
    #[must_use]
    pub fn render_build_txt(&self) -> String {
        format!(
            "GIT_COMMIT={}\nBUILD_DATE={}\n",
            self.git_commit, self.build_date
        )
    }
}

/// The fixed non-root account the image runs as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeUser {
    pub name: String,
    pub uid: u32,
    pub gid: u32,
    /// Home directory, relative inside the rootfs (no leading slash).
    pub home: PathBuf,
}

/// Rootfs-relative layout of the runtime image. All paths are relative;
/// they double as tar entry names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecipe {
    pub app_root: PathBuf,
    pub data_dir: PathBuf,
    pub user: RuntimeUser,
    pub exposed_port: u16,
    /// Executable directory of the installed dependency prefix, prepended
    /// to PATH in the image config.
    pub env_bin_dir: PathBuf,
    /// Additional `KEY=value` entries appended to the image config
    /// environment after PATH and the build arguments.
    pub extra_env: Vec<String>,
    /// Entrypoint script location inside the rootfs.
    pub entrypoint: PathBuf,
}

impl ImageRecipe {
    /// The Spoolman release layout.
    #[must_use]
    pub fn spoolman() -> Self {
        let app_root = PathBuf::from("home/app/spoolman");
        Self {
            data_dir: PathBuf::from("home/app/.local/share/spoolman"),
            user: RuntimeUser {
                name: "app".to_string(),
                uid: 1000,
                gid: 1000,
                home: PathBuf::from("home/app"),
            },
            exposed_port: 8000,
            env_bin_dir: app_root.join("env/bin"),
            extra_env: Vec::new(),
            entrypoint: app_root.join("entrypoint.sh"),
            app_root,
        }
    }

    #[must_use]
    pub fn path_env(&self) -> String {
        format!(
            "PATH=/{}:/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin",
            self.env_bin_dir.display()
        )
    }
}
