//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory
//! (or the path in `NODECRED_CONFIG`), then applies `NODECRED_DATA_DIR`,
//! `NODECRED_LOG_LEVEL`, `NODECRED_NODE_PUBLIC` and `NODECRED_NODE_PRIVATE`.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::error::AppError;
use crate::identity::IdentityOverride;
use crate::logger;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Fully-resolved node configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub node_name: String,
    /// Directory for all persistent data (already expanded, no `~`).
    pub data_dir: PathBuf,
    pub log_level: String,
    /// Suppress the `NodeIdentity: …` status lines on stderr.
    pub quiet: bool,
    /// Override credentials; validated later by the identity manager.
    pub identity_override: IdentityOverride,
    /// Identity database (absolute, or already joined onto `data_dir`).
    pub wallet_db: PathBuf,
    /// Key-value database.
    pub rpc_db: PathBuf,
}

/// Values taken from the environment that win over the TOML file.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub data_dir: Option<String>,
    pub log_level: Option<String>,
    pub node_public: Option<String>,
    pub node_private: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self {
            data_dir: env::var("NODECRED_DATA_DIR").ok(),
            log_level: env::var("NODECRED_LOG_LEVEL").ok(),
            node_public: env::var("NODECRED_NODE_PUBLIC").ok(),
            node_private: env::var("NODECRED_NODE_PRIVATE").ok(),
        }
    }
}

/// Raw TOML shape — `serde` target before resolution.
#[derive(Deserialize)]
struct RawConfig {
    node: RawNode,
    #[serde(default)]
    database: RawDatabase,
}

#[derive(Deserialize)]
struct RawNode {
    name: String,
    data_dir: String,
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default)]
    quiet: bool,
    #[serde(default)]
    node_public: Option<String>,
    #[serde(default)]
    node_private: Option<String>,
}

#[derive(Deserialize)]
struct RawDatabase {
    #[serde(default = "default_wallet_db")]
    wallet: String,
    #[serde(default = "default_rpc_db")]
    rpc: String,
}

impl Default for RawDatabase {
    fn default() -> Self {
        Self {
            wallet: default_wallet_db(),
            rpc: default_rpc_db(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_wallet_db() -> String { "wallet.db".to_string() }
fn default_rpc_db() -> String { "rpc.db".to_string() }

/// Load config from `NODECRED_CONFIG` or `config/default.toml`, then apply
/// env-var overrides.
pub fn load() -> Result<Config, AppError> {
    let path = env::var("NODECRED_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    load_from(Path::new(&path), &EnvOverrides::from_env())
}

/// Internal loader — accepts an explicit path and overrides.
/// Tests pass overrides directly instead of mutating env vars.
pub fn load_from(path: &Path, overrides: &EnvOverrides) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let parsed: RawConfig = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    let n = parsed.node;

    let data_dir_str = overrides.data_dir.as_deref().unwrap_or(&n.data_dir);
    let data_dir = expand_home(data_dir_str);
    let log_level = overrides.log_level.clone().unwrap_or(n.log_level);
    logger::parse_level(&log_level)
        .map_err(|e| AppError::Config(format!("{}: {e}", path.display())))?;

    let identity_override = IdentityOverride {
        node_public: non_blank(overrides.node_public.clone().or(n.node_public)),
        node_private: non_blank(overrides.node_private.clone().or(n.node_private)),
    };

    let wallet_db = resolve_under(&data_dir, &parsed.database.wallet);
    let rpc_db = resolve_under(&data_dir, &parsed.database.rpc);

    Ok(Config {
        node_name: n.name,
        data_dir,
        log_level,
        quiet: n.quiet,
        identity_override,
        wallet_db,
        rpc_db,
    })
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

fn resolve_under(data_dir: &Path, file: &str) -> PathBuf {
    let path = expand_home(file);
    if path.is_absolute() { path } else { data_dir.join(path) }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ── test helpers ──────────────────────────────────────────────────────────────

#[cfg(test)]
impl Config {
    pub fn test_default(data_dir: &Path) -> Self {
        Self {
            node_name: "test".into(),
            data_dir: data_dir.to_path_buf(),
            log_level: "info".into(),
            quiet: true,
            identity_override: IdentityOverride::default(),
            wallet_db: data_dir.join("wallet.db"),
            rpc_db: data_dir.join("rpc.db"),
        }
    }
}
