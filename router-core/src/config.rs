//! Engine configuration with sensible defaults.
//!
//! [`RoutingEngineConfig`] is built once by the host and handed to
//! [`crate::RoutingEngine::new`]. It replaces any ambient, environment-derived
//! state: every path and limit the engine uses comes from this value.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::RouterError;
use crate::provider::LimitPolicy;

/// Default cache lifetime: one day.
pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 86_400;

/// Call-log destination and privacy toggles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallLogConfig {
    /// Append-only NDJSON file. `None` disables the log. Relative paths are
    /// resolved against the state directory.
    pub path: Option<PathBuf>,
    /// Write the raw query text next to its hash.
    pub include_query: bool,
    /// Write provider answer text, when a provider reports one.
    pub include_answer: bool,
}

/// Configuration for a [`crate::RoutingEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingEngineConfig {
    /// Root of the on-disk state: `cache/` and `usage.json` live here.
    pub state_dir: PathBuf,
    /// Cache entries older than this are ignored.
    pub cache_ttl_seconds: u64,
    /// `allow_paid` used when a request leaves it unset.
    pub allow_paid_default: bool,
    /// Whether quota-tier providers may be called at all.
    pub allow_quota: bool,
    /// Per-provider limit overrides, keyed by provider name.
    pub limits: BTreeMap<String, LimitPolicy>,
    /// Per-provider extra knobs. Passed to the adapter and folded into that
    /// provider's cache fingerprint only.
    pub knobs: BTreeMap<String, BTreeMap<String, String>>,
    pub call_log: CallLogConfig,
}

impl Default for RoutingEngineConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from("state").join("websearch_router"),
            cache_ttl_seconds: DEFAULT_CACHE_TTL_SECONDS,
            allow_paid_default: false,
            allow_quota: true,
            limits: BTreeMap::new(),
            knobs: default_knobs(),
            call_log: CallLogConfig::default(),
        }
    }
}

impl RoutingEngineConfig {
    /// Default configuration rooted at `state_dir`.
    pub fn with_state_dir(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
            ..Default::default()
        }
    }

    /// Validates this configuration, returning an error if any field is invalid.
    ///
    /// Checks:
    /// - `state_dir` must not be empty
    /// - knob keys must not be empty
    /// - `call_log.path`, when set, must not be empty
    pub fn validate(&self) -> Result<(), RouterError> {
        if self.state_dir.as_os_str().is_empty() {
            return Err(RouterError::Config("state_dir must not be empty".into()));
        }
        for (provider, knobs) in &self.knobs {
            if knobs.keys().any(|k| k.trim().is_empty()) {
                return Err(RouterError::Config(format!(
                    "knob names for provider '{provider}' must not be empty"
                )));
            }
        }
        if let Some(path) = &self.call_log.path {
            if path.as_os_str().is_empty() {
                return Err(RouterError::Config(
                    "call_log.path must not be empty when set".into(),
                ));
            }
        }
        Ok(())
    }

    /// Directory holding `<provider>/<fingerprint>.json` cache files.
    pub fn cache_dir(&self) -> PathBuf {
        self.state_dir.join("cache")
    }

    /// Path of the shared usage ledger.
    pub fn usage_path(&self) -> PathBuf {
        self.state_dir.join("usage.json")
    }

    /// Resolved call-log path, if the log is enabled.
    pub fn call_log_path(&self) -> Option<PathBuf> {
        self.call_log
            .path
            .as_deref()
            .map(|p| resolve_against(&self.state_dir, p))
    }

    /// Knobs configured for `provider` (empty when none).
    pub fn knobs_for(&self, provider: &str) -> BTreeMap<String, String> {
        self.knobs.get(provider).cloned().unwrap_or_default()
    }
}

fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Knobs the built-in adapters read, with their default values.
pub fn default_knobs() -> BTreeMap<String, BTreeMap<String, String>> {
    let mut knobs = BTreeMap::new();
    knobs.insert(
        "tavily".to_string(),
        BTreeMap::from([("search_depth".to_string(), "basic".to_string())]),
    );
    knobs.insert(
        "bigmodel_web_search".to_string(),
        BTreeMap::from([("content_size".to_string(), "medium".to_string())]),
    );
    knobs.insert(
        "dashscope_web".to_string(),
        BTreeMap::from([("model".to_string(), "qwen-turbo".to_string())]),
    );
    knobs
}
