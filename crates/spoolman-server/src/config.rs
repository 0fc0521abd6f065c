// SPDX-License-Identifier: Apache-2.0
//! Environment-driven server configuration.

use std::env;
use std::path::{Path, PathBuf};

pub(crate) fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| match v.as_str() {
            "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
            "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

pub(crate) fn env_u16(name: &str, default: u16) -> u16 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<u16>().ok())
        .unwrap_or(default)
}

pub(crate) fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub client_dist: PathBuf,
    pub log_json: bool,
    pub max_find_limit: usize,
    pub git_commit: String,
    pub build_date: String,
}

impl ServerConfig {
    /// Reads `SPOOLMAN_*` variables, falling back to the defaults the
    /// packaged image runs with. `GIT_COMMIT` and `BUILD_DATE` come from
    /// the environment or from the `build.txt` the image build writes next
    /// to the binary.
    pub fn from_env() -> Self {
        let data_dir = env::var("SPOOLMAN_DIR_DATA").map(PathBuf::from).unwrap_or_else(|_| {
            let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".local/share/spoolman")
        });
        let db_path = env::var("SPOOLMAN_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("spoolman.db"));
        let build_info = read_build_info(Path::new("build.txt"));
        let (file_commit, file_date) = build_info.unwrap_or_default();
        Self {
            host: env::var("SPOOLMAN_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_u16("SPOOLMAN_PORT", 8000),
            data_dir,
            db_path,
            client_dist: env::var("SPOOLMAN_CLIENT_DIST")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("client/dist")),
            log_json: env_bool("SPOOLMAN_LOG_JSON", false),
            max_find_limit: env_usize("SPOOLMAN_MAX_FIND_LIMIT", spoolman_api::MAX_FIND_LIMIT),
            git_commit: env::var("GIT_COMMIT").ok().filter(|v| !v.is_empty()).unwrap_or(
                if file_commit.is_empty() { "unknown".to_string() } else { file_commit },
            ),
            build_date: env::var("BUILD_DATE").ok().filter(|v| !v.is_empty()).unwrap_or(
                if file_date.is_empty() { "unknown".to_string() } else { file_date },
            ),
        }
    }

    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Parses the two `KEY=value` lines of a packaged `build.txt`.
pub(crate) fn read_build_info(path: &Path) -> Option<(String, String)> {
    let text = std::fs::read_to_string(path).ok()?;
    let mut commit = None;
    let mut date = None;
    for line in text.lines() {
        if let Some(value) = line.strip_prefix("GIT_COMMIT=") {
            commit = Some(value.to_string());
        } else if let Some(value) = line.strip_prefix("BUILD_DATE=") {
            date = Some(value.to_string());
        }
    }
    Some((commit?, date?))
}

/// Refuses to start on configurations that cannot serve requests.
pub fn validate_startup_config_contract(config: &ServerConfig) -> Result<(), String> {
    if config.host.trim().is_empty() {
        return Err("SPOOLMAN_HOST must not be empty".to_string());
    }
    if config.port == 0 {
        return Err("SPOOLMAN_PORT must be nonzero".to_string());
    }
    if config.data_dir.as_os_str().is_empty() {
        return Err("SPOOLMAN_DIR_DATA must not be empty".to_string());
    }
    if config.max_find_limit == 0 {
        return Err("SPOOLMAN_MAX_FIND_LIMIT must be nonzero".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn build_info_parses_both_lines() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("build.txt");
        let mut file = std::fs::File::create(&path).expect("create");
        writeln!(file, "GIT_COMMIT=13").expect("write");
        writeln!(file, "BUILD_DATE=08-02-2024").expect("write");
        let (commit, date) = read_build_info(&path).expect("parse");
        assert_eq!(commit, "13");
        assert_eq!(date, "08-02-2024");
    }

    #[test]
    fn build_info_requires_both_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("build.txt");
        std::fs::write(&path, "GIT_COMMIT=13\n").expect("write");
        assert!(read_build_info(&path).is_none());
    }

    #[test]
    fn startup_contract_rejects_nonsense() {
        let config = ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 8000,
            data_dir: PathBuf::from("/data"),
            db_path: PathBuf::from("/data/spoolman.db"),
            client_dist: PathBuf::from("client/dist"),
            log_json: false,
            max_find_limit: 1000,
            git_commit: "13".to_string(),
            build_date: "08-02-2024".to_string(),
        };
        assert!(validate_startup_config_contract(&config).is_ok());
        let bad = ServerConfig {
            port: 0,
            ..config.clone()
        };
        assert!(validate_startup_config_contract(&bad).is_err());
        let bad = ServerConfig {
            host: "  ".to_string(),
            ..config.clone()
        };
        assert!(validate_startup_config_contract(&bad).is_err());
        let bad = ServerConfig {
            max_find_limit: 0,
            ..config
        };
        assert!(validate_startup_config_contract(&bad).is_err());
    }
}
