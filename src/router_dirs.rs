//! Default filesystem locations for the router.
//!
//! Uses the [`dirs`] crate for platform-appropriate resolution.
//!
//! | Purpose | macOS | Linux |
//! |---------|-------|-------|
//! | State (cache, ledger) | `~/Library/Application Support/websearch-router/` | `~/.local/share/websearch-router/` |
//! | Config | `~/Library/Application Support/websearch-router/` | `~/.config/websearch-router/` |
//!
//! # Environment Overrides
//!
//! - `WEBSEARCH_ROUTER_STATE_DIR` overrides [`state_dir`]
//! - `WEBSEARCH_ROUTER_CONFIG` overrides [`config_file`]

use std::path::PathBuf;

const APP_DIR: &str = "websearch-router";

/// Environment variable overriding [`state_dir`].
pub const STATE_DIR_ENV: &str = "WEBSEARCH_ROUTER_STATE_DIR";
/// Environment variable overriding [`config_file`].
pub const CONFIG_FILE_ENV: &str = "WEBSEARCH_ROUTER_CONFIG";

/// Root of the cache and the usage ledger.
#[must_use]
pub fn state_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(STATE_DIR_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::data_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("/tmp/websearch-router-state"))
}

/// Config directory holding `config.toml`.
#[must_use]
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("/tmp/websearch-router-config"))
}

/// Settings file path (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_FILE_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(path);
    }
    config_dir().join("config.toml")
}
