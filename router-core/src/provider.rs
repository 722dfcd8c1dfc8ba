//! The provider seam: how the router sees a search backend.
//!
//! A backend (Brave, Tavily, a vendor LLM search endpoint...) implements
//! [`SearchProvider`]. Everything backend-specific, including auth, request
//! shaping and response parsing, lives behind that trait. The router only
//! sees a [`ProviderOutcome`].
//!
//! Adapters never fail with an error value: every failure is reported as
//! `ok = false` plus a message, so one broken backend cannot abort a cascade.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{Language, Recency, SearchResult, Tier};

/// Daily limit applied to providers missing from the built-in catalogue.
pub const DEFAULT_DAILY_LIMIT: u64 = 10_000;

/// How a provider's live calls are budgeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitPolicy {
    /// At most this many live calls per local calendar day.
    PerDay(u64),
    /// At most this many live calls, ever.
    Total(u64),
}

impl fmt::Display for LimitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PerDay(n) => write!(f, "{n}/day"),
            Self::Total(n) => write!(f, "{n} total"),
        }
    }
}

/// Static description of a provider's place in the cascade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSpec {
    /// Base name. Keys the ledger, the cache directory and the knobs map.
    pub name: String,
    pub tier: Tier,
    /// Order within the tier; lower runs first.
    pub position: u32,
    pub limit: LimitPolicy,
}

impl ProviderSpec {
    pub fn new(name: impl Into<String>, tier: Tier, position: u32, limit: LimitPolicy) -> Self {
        Self {
            name: name.into(),
            tier,
            position,
            limit,
        }
    }

    /// Catalogue entry for `name`, or a free daily-limited entry when unknown.
    pub fn for_name(name: &str) -> Self {
        builtin_provider_specs()
            .into_iter()
            .find(|spec| spec.name == name)
            .unwrap_or_else(|| {
                Self::new(name, Tier::Free, u32::MAX, LimitPolicy::PerDay(DEFAULT_DAILY_LIMIT))
            })
    }
}

/// The router's default provider catalogue, in cascade order.
pub fn builtin_provider_specs() -> Vec<ProviderSpec> {
    vec![
        ProviderSpec::new("brave", Tier::Free, 0, LimitPolicy::PerDay(500)),
        ProviderSpec::new("tavily", Tier::Free, 1, LimitPolicy::PerDay(200)),
        ProviderSpec::new("tongxiao_iqs", Tier::Quota, 2, LimitPolicy::Total(1_000)),
        ProviderSpec::new("bigmodel_web_search", Tier::Paid, 3, LimitPolicy::PerDay(50)),
        ProviderSpec::new("dashscope_web", Tier::Paid, 4, LimitPolicy::PerDay(50)),
    ]
}

/// What an adapter is asked for on one call.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderQuery {
    pub query: String,
    /// Number of results wanted (the request's `max_results`).
    pub count: usize,
    /// Resolved language, never `auto`.
    pub language: Language,
    pub recency: Recency,
    pub domain_filter: Option<String>,
    /// Budget for this call. The router enforces it independently.
    pub timeout: Duration,
    /// Provider-specific knobs, e.g. `search_depth` or `model`.
    pub knobs: BTreeMap<String, String>,
}

/// Result of one adapter call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProviderOutcome {
    pub ok: bool,
    pub error: Option<String>,
    pub results: Vec<SearchResult>,
    /// The backend's payload as received, kept in the cache entry.
    pub raw: serde_json::Value,
    /// Refined label such as `dashscope_web/qwen-turbo`; defaults to the base name.
    pub label: Option<String>,
    /// Free-text answer some LLM-backed providers return alongside results.
    pub answer: Option<String>,
}

impl ProviderOutcome {
    /// A successful call.
    pub fn success(results: Vec<SearchResult>, raw: serde_json::Value) -> Self {
        Self {
            ok: true,
            results,
            raw,
            ..Default::default()
        }
    }

    /// A failed call.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_answer(mut self, answer: impl Into<String>) -> Self {
        self.answer = Some(answer.into());
        self
    }
}

/// A pluggable search backend.
///
/// Implementations must be `Send + Sync`; the engine shares them behind an
/// [`Arc`]. They should respect `query.timeout`, but the engine also wraps
/// every call in its own timeout.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Run one search. Must not panic; report failures through the outcome.
    async fn call(&self, query: &ProviderQuery) -> ProviderOutcome;
}

/// A provider adapter paired with its cascade metadata.
#[derive(Clone)]
pub struct RegisteredProvider {
    pub spec: ProviderSpec,
    pub provider: Arc<dyn SearchProvider>,
}

impl RegisteredProvider {
    pub fn new(spec: ProviderSpec, provider: Arc<dyn SearchProvider>) -> Self {
        Self { spec, provider }
    }
}

impl fmt::Debug for RegisteredProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredProvider")
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}
