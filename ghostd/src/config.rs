use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use ghost_core::DownloadOptions;

use crate::sync::backoff::{Backoff, DEFAULT_BASE, DEFAULT_MULTIPLIER, DEFAULT_RETRY_CAP};

pub const DEFAULT_FILE_CONCURRENCY: usize = 3;
pub const DEFAULT_MAX_CONNECTIONS: usize = 6;
pub const DEFAULT_API_BASE_URL: &str = "https://cloud-api.yandex.net";
pub const DEFAULT_PLUGINS_LOCATOR: &str = "https://disk.yandex.ru/d/ghost-bot-plugins";
pub const DEFAULT_LIB_LOCATOR: &str = "https://disk.yandex.ru/d/ghost-bot-lib";
pub const DEFAULT_COOKIES_LOCATOR: &str = "https://disk.yandex.ru/d/ghost-bot-cookies";
pub const SESSION_DIR: &str = "auth_info_baileys";
pub const SESSION_FILE: &str = "creds.json";
pub const TEMP_DIR: &str = "temp";

/// Knobs for one synchronization run.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Files fetched at once across all folders.
    pub concurrency: usize,
    pub max_connections_per_file: usize,
    pub secure_transport: bool,
    pub retry_cap: u32,
    pub backoff_base: Duration,
    pub backoff_multiplier: f64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_FILE_CONCURRENCY,
            max_connections_per_file: DEFAULT_MAX_CONNECTIONS,
            secure_transport: false,
            retry_cap: DEFAULT_RETRY_CAP,
            backoff_base: DEFAULT_BASE,
            backoff_multiplier: DEFAULT_MULTIPLIER,
        }
    }
}

impl SyncConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            concurrency: read_usize_env("GHOST_FILE_CONCURRENCY", defaults.concurrency),
            max_connections_per_file: read_usize_env(
                "GHOST_MAX_CONNECTIONS",
                defaults.max_connections_per_file,
            ),
            secure_transport: read_bool_env("GHOST_FORCE_HTTPS", defaults.secure_transport),
            retry_cap: read_u32_env("GHOST_RETRY_CAP", defaults.retry_cap),
            backoff_base: Duration::from_millis(read_u64_env(
                "GHOST_BACKOFF_BASE_MS",
                defaults.backoff_base.as_millis() as u64,
            )),
            backoff_multiplier: read_f64_env(
                "GHOST_BACKOFF_MULTIPLIER",
                defaults.backoff_multiplier,
            ),
        }
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::new(self.backoff_base, self.backoff_multiplier, self.retry_cap)
    }

    pub fn download_options(&self) -> DownloadOptions {
        DownloadOptions {
            max_connections: self.max_connections_per_file.max(1),
            force_secure_transport: self.secure_transport,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderSource {
    /// Populated from a remote share when missing or empty.
    Remote { locator: String },
    /// Only ever created locally.
    LocalOnly,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderSpec {
    pub name: String,
    pub source: FolderSource,
}

impl FolderSpec {
    pub fn remote(name: impl Into<String>, locator: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: FolderSource::Remote {
                locator: locator.into(),
            },
        }
    }

    pub fn local(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: FolderSource::LocalOnly,
        }
    }

    pub fn locator(&self) -> Option<&str> {
        match &self.source {
            FolderSource::Remote { locator } => Some(locator),
            FolderSource::LocalOnly => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub workspace: PathBuf,
    pub api_base_url: String,
    pub folders: Vec<FolderSpec>,
    pub session_locator: Option<String>,
    pub sync: SyncConfig,
    pub json_logs: bool,
}

impl DaemonConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let workspace = match std::env::var("GHOST_WORKSPACE_DIR") {
            Ok(value) if !value.trim().is_empty() => PathBuf::from(value),
            _ => std::env::current_dir().context("current directory is unavailable")?,
        };
        let api_base_url = std::env::var("GHOST_API_BASE_URL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());

        let mut folders = Vec::new();
        for (name, var, default) in [
            ("plugins", "GHOST_PLUGINS_URL", DEFAULT_PLUGINS_LOCATOR),
            ("lib", "GHOST_LIB_URL", DEFAULT_LIB_LOCATOR),
            ("cookies", "GHOST_COOKIES_URL", DEFAULT_COOKIES_LOCATOR),
        ] {
            let locator = read_string_env(var).unwrap_or_else(|| default.to_string());
            // `none` keeps the folder local-only.
            folders.push(if locator.eq_ignore_ascii_case("none") {
                FolderSpec::local(name)
            } else {
                FolderSpec::remote(name, locator)
            });
        }
        folders.push(FolderSpec::local(TEMP_DIR));
        folders.push(FolderSpec::local(SESSION_DIR));

        Ok(Self {
            workspace,
            api_base_url,
            folders,
            session_locator: read_string_env("SESSION_ID"),
            sync: SyncConfig::from_env(),
            json_logs: read_bool_env("GHOST_LOG_JSON", false),
        })
    }

    pub fn session_file(&self) -> PathBuf {
        session_file_in(&self.workspace)
    }
}

pub fn session_file_in(workspace: &Path) -> PathBuf {
    workspace.join(SESSION_DIR).join(SESSION_FILE)
}

/// Loads `config.env` and then `.env` from the working directory, if present.
/// Variables already set in the environment win.
pub fn load_env_files() {
    dotenvy::from_filename("config.env").ok();
    dotenvy::dotenv().ok();
}

fn read_string_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn read_u64_env(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

fn read_usize_env(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<usize>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

fn read_u32_env(name: &str, default: u32) -> u32 {
    std::env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<u32>().ok())
        .unwrap_or(default)
}

fn read_f64_env(name: &str, default: f64) -> f64 {
    std::env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite() && *value >= 1.0)
        .unwrap_or(default)
}

fn read_bool_env(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .map(|value| {
            matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
        .unwrap_or(default)
}
