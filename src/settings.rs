//! Host settings: a TOML file plus `WEBSEARCH_ROUTER_*` environment
//! overrides, turned into a [`RoutingEngineConfig`].
//!
//! ```toml
//! state_dir = "/var/lib/websearch-router"
//! cache_ttl_seconds = 3600
//! allow_paid_default = false
//!
//! [limits.brave]
//! per_day = 400
//!
//! [limits.tongxiao_iqs]
//! total = 800
//!
//! [knobs.tavily]
//! search_depth = "advanced"
//!
//! [call_log]
//! path = "calls.jsonl"
//! include_query = false
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use router_core::config::{default_knobs, CallLogConfig, DEFAULT_CACHE_TTL_SECONDS};
use router_core::{builtin_provider_specs, LimitPolicy, RouterError, RoutingEngineConfig};
use serde::{Deserialize, Serialize};

use crate::router_dirs;

/// Prefix shared by every environment override.
pub const ENV_PREFIX: &str = "WEBSEARCH_ROUTER_";

/// Limit override for one provider. Exactly one field may be set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitSetting {
    pub per_day: Option<u64>,
    pub total: Option<u64>,
}

impl LimitSetting {
    fn to_policy(self, provider: &str) -> Result<Option<LimitPolicy>, RouterError> {
        match (self.per_day, self.total) {
            (Some(_), Some(_)) => Err(RouterError::Config(format!(
                "limits.{provider}: set either per_day or total, not both"
            ))),
            (Some(n), None) => Ok(Some(LimitPolicy::PerDay(n))),
            (None, Some(n)) => Ok(Some(LimitPolicy::Total(n))),
            (None, None) => Ok(None),
        }
    }
}

/// `[call_log]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallLogSettings {
    pub path: Option<PathBuf>,
    pub include_query: bool,
    pub include_answer: bool,
}

/// The settings document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterSettings {
    /// Defaults to [`router_dirs::state_dir`].
    pub state_dir: Option<PathBuf>,
    pub cache_ttl_seconds: u64,
    pub allow_paid_default: bool,
    pub allow_quota: bool,
    pub limits: BTreeMap<String, LimitSetting>,
    /// Layered over the built-in knob defaults.
    pub knobs: BTreeMap<String, BTreeMap<String, String>>,
    pub call_log: CallLogSettings,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            state_dir: None,
            cache_ttl_seconds: DEFAULT_CACHE_TTL_SECONDS,
            allow_paid_default: false,
            allow_quota: true,
            limits: BTreeMap::new(),
            knobs: BTreeMap::new(),
            call_log: CallLogSettings::default(),
        }
    }
}

impl RouterSettings {
    /// Load settings from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, RouterError> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| RouterError::Config(format!("{}: {e}", path.display())))
    }

    /// Settings for a host process: `path` if given, else the default config
    /// file when it exists, else defaults; then process environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly named or existing file is unreadable
    /// or malformed.
    pub fn load(path: Option<&Path>) -> Result<Self, RouterError> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = router_dirs::config_file();
                if default_path.is_file() {
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };
        settings.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Apply `WEBSEARCH_ROUTER_*` overrides read through `lookup`.
    ///
    /// Booleans treat `0`, `false`, `no` and `off` as false and anything else
    /// as true. Malformed integers are ignored with a warning.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |suffix: &str| {
            lookup(&format!("{ENV_PREFIX}{suffix}"))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(dir) = get("STATE_DIR") {
            self.state_dir = Some(PathBuf::from(dir));
        }
        if let Some(ttl) = get("CACHE_TTL_SECONDS").and_then(|v| parse_u64("CACHE_TTL_SECONDS", &v)) {
            self.cache_ttl_seconds = ttl;
        }
        if let Some(v) = get("ALLOW_PAID_DEFAULT") {
            self.allow_paid_default = parse_bool(&v);
        }
        if let Some(v) = get("ALLOW_QUOTA") {
            self.allow_quota = parse_bool(&v);
        }
        if let Some(path) = get("CALL_LOG") {
            self.call_log.path = Some(PathBuf::from(path));
        }
        if let Some(v) = get("CALL_LOG_INCLUDE_QUERY") {
            self.call_log.include_query = parse_bool(&v);
        }
        if let Some(v) = get("CALL_LOG_INCLUDE_ANSWER") {
            self.call_log.include_answer = parse_bool(&v);
        }

        for (provider, knob, suffix) in [
            ("tavily", "search_depth", "TAVILY_DEPTH"),
            ("bigmodel_web_search", "content_size", "BIGMODEL_CONTENT_SIZE"),
            ("dashscope_web", "model", "DASHSCOPE_MODEL"),
        ] {
            if let Some(value) = get(suffix) {
                self.knobs
                    .entry(provider.to_string())
                    .or_default()
                    .insert(knob.to_string(), value);
            }
        }

        let mut providers: Vec<String> = builtin_provider_specs()
            .into_iter()
            .map(|spec| spec.name)
            .collect();
        providers.extend(self.limits.keys().cloned());
        providers.sort();
        providers.dedup();

        for provider in providers {
            for stem in env_stems(&provider) {
                let per_day_key = format!("LIMIT_{stem}_PER_DAY");
                if let Some(n) = get(&per_day_key).and_then(|v| parse_u64(&per_day_key, &v)) {
                    self.limits.insert(provider.clone(), LimitSetting { per_day: Some(n), total: None });
                }
                let total_key = format!("LIMIT_{stem}_TOTAL");
                if let Some(n) = get(&total_key).and_then(|v| parse_u64(&total_key, &v)) {
                    self.limits.insert(provider.clone(), LimitSetting { per_day: None, total: Some(n) });
                }
            }
        }
    }

    /// Build the engine configuration these settings describe.
    ///
    /// # Errors
    ///
    /// [`RouterError::Config`] for a limit with both `per_day` and `total`,
    /// or when the resulting config fails validation.
    pub fn into_engine_config(self) -> Result<RoutingEngineConfig, RouterError> {
        let mut limits = BTreeMap::new();
        for (provider, setting) in &self.limits {
            if let Some(policy) = setting.to_policy(provider)? {
                limits.insert(provider.clone(), policy);
            }
        }

        let mut knobs = default_knobs();
        for (provider, overrides) in self.knobs {
            knobs.entry(provider).or_default().extend(overrides);
        }

        let config = RoutingEngineConfig {
            state_dir: self.state_dir.unwrap_or_else(router_dirs::state_dir),
            cache_ttl_seconds: self.cache_ttl_seconds,
            allow_paid_default: self.allow_paid_default,
            allow_quota: self.allow_quota,
            limits,
            knobs,
            call_log: CallLogConfig {
                path: self.call_log.path,
                include_query: self.call_log.include_query,
                include_answer: self.call_log.include_answer,
            },
        };
        config.validate()?;
        Ok(config)
    }
}

/// Env-var stems for a provider: its upper-cased name plus a short alias
/// for the vendor-named providers.
fn env_stems(provider: &str) -> Vec<String> {
    let mut stems = vec![provider.to_ascii_uppercase()];
    let alias = match provider {
        "bigmodel_web_search" => Some("BIGMODEL"),
        "dashscope_web" => Some("DASHSCOPE"),
        "tongxiao_iqs" => Some("TONGXIAO"),
        _ => None,
    };
    stems.extend(alias.map(str::to_string));
    stems
}

fn parse_bool(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}

fn parse_u64(key: &str, value: &str) -> Option<u64> {
    match value.trim().parse() {
        Ok(n) => Some(n),
        Err(_) => {
            tracing::warn!(key = %format!("{ENV_PREFIX}{key}"), value, "ignoring non-integer override");
            None
        }
    }
}
