//! The per-call search request and its validation rules.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::RouterError;
use crate::types::{Language, Recency};

/// Default number of results returned.
pub const DEFAULT_MAX_RESULTS: usize = 5;
/// Upper bound accepted for `max_results`.
pub const MAX_RESULTS_CAP: usize = 20;
/// Default per-provider timeout.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
/// Upper bound accepted for the per-provider timeout.
pub const MAX_TIMEOUT_SECONDS: u64 = 120;

/// One routed search call. Immutable once handed to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchRequest {
    pub query: String,
    /// Maximum number of results in the response.
    pub max_results: usize,
    /// Sufficiency threshold. Defaults to `max_results` when unset.
    pub min_results: Option<usize>,
    pub language: Language,
    /// Whether paid-tier providers may be called. Unset means "use the
    /// engine's configured default".
    pub allow_paid: Option<bool>,
    pub recency: Recency,
    /// Keep only results whose host equals this domain or is a subdomain of it.
    pub domain_filter: Option<String>,
    /// Bound on each individual provider call.
    #[serde(rename = "timeout_sec", with = "duration_secs")]
    pub timeout: Duration,
    pub use_cache: bool,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            query: String::new(),
            max_results: DEFAULT_MAX_RESULTS,
            min_results: None,
            language: Language::Auto,
            allow_paid: None,
            recency: Recency::NoLimit,
            domain_filter: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
            use_cache: true,
        }
    }
}

impl SearchRequest {
    /// A request for `query` with default settings.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_min_results(mut self, min_results: usize) -> Self {
        self.min_results = Some(min_results);
        self
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    pub fn with_allow_paid(mut self, allow_paid: bool) -> Self {
        self.allow_paid = Some(allow_paid);
        self
    }

    pub fn with_recency(mut self, recency: Recency) -> Self {
        self.recency = recency;
        self
    }

    pub fn with_domain_filter(mut self, domain: impl Into<String>) -> Self {
        self.domain_filter = Some(domain.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    /// The sufficiency threshold actually applied.
    pub fn effective_min_results(&self) -> usize {
        self.min_results.unwrap_or(self.max_results)
    }

    /// Trimmed domain filter, or `None` when unset or blank.
    pub fn effective_domain_filter(&self) -> Option<&str> {
        self.domain_filter
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }

    /// Validates this request, returning a config error if any field is invalid.
    ///
    /// Checks:
    /// - `query` must not be blank
    /// - `max_results` must be in `1..=20`
    /// - `min_results` must be in `1..=max_results`
    /// - `timeout` must be between 1 and 120 seconds
    pub fn validate(&self) -> Result<(), RouterError> {
        if self.query.trim().is_empty() {
            return Err(RouterError::Config("query must not be empty".into()));
        }
        if self.max_results == 0 || self.max_results > MAX_RESULTS_CAP {
            return Err(RouterError::Config(format!(
                "max_results must be between 1 and {MAX_RESULTS_CAP}"
            )));
        }
        let min_results = self.effective_min_results();
        if min_results == 0 {
            return Err(RouterError::Config(
                "min_results must be greater than 0".into(),
            ));
        }
        if min_results > self.max_results {
            return Err(RouterError::Config(format!(
                "min_results ({min_results}) must be <= max_results ({})",
                self.max_results
            )));
        }
        if self.timeout < Duration::from_secs(1)
            || self.timeout > Duration::from_secs(MAX_TIMEOUT_SECONDS)
        {
            return Err(RouterError::Config(format!(
                "timeout must be between 1 and {MAX_TIMEOUT_SECONDS} seconds"
            )));
        }
        Ok(())
    }
}

/// Serialises a [`Duration`] as fractional seconds (`timeout_sec` on the wire).
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        if !secs.is_finite() || !(0.0..=1e9).contains(&secs) {
            return Err(serde::de::Error::custom("timeout must be a non-negative number"));
        }
        Ok(Duration::from_secs_f64(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_router_conventions() {
        let req = SearchRequest::new("rust");
        assert_eq!(req.max_results, 5);
        assert_eq!(req.effective_min_results(), 5);
        assert_eq!(req.language, Language::Auto);
        assert_eq!(req.recency, Recency::NoLimit);
        assert_eq!(req.timeout, Duration::from_secs(30));
        assert!(req.use_cache);
        assert!(req.allow_paid.is_none());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn min_results_follows_max_results_when_unset() {
        let req = SearchRequest::new("rust").with_max_results(8);
        assert_eq!(req.effective_min_results(), 8);
    }

    #[test]
    fn min_greater_than_max_rejected() {
        let req = SearchRequest::new("rust")
            .with_max_results(3)
            .with_min_results(4);
        let err = req.validate().unwrap_err();
        assert!(matches!(err, RouterError::Config(_)));
        assert!(err.to_string().contains("min_results"));
    }

    #[test]
    fn blank_query_rejected() {
        let err = SearchRequest::new("   ").validate().unwrap_err();
        assert!(err.to_string().contains("query"));
    }

    #[test]
    fn zero_and_oversized_max_results_rejected() {
        assert!(SearchRequest::new("q").with_max_results(0).validate().is_err());
        assert!(SearchRequest::new("q").with_max_results(21).validate().is_err());
        assert!(SearchRequest::new("q")
            .with_max_results(20)
            .with_min_results(1)
            .validate()
            .is_ok());
    }

    #[test]
    fn zero_min_results_rejected() {
        let err = SearchRequest::new("q").with_min_results(0).validate().unwrap_err();
        assert!(err.to_string().contains("min_results"));
    }

    #[test]
    fn timeout_bounds_enforced() {
        let short = SearchRequest::new("q").with_timeout(Duration::from_millis(200));
        assert!(short.validate().is_err());
        let long = SearchRequest::new("q").with_timeout(Duration::from_secs(121));
        assert!(long.validate().is_err());
    }

    #[test]
    fn blank_domain_filter_treated_as_absent() {
        let req = SearchRequest::new("q").with_domain_filter("  ");
        assert!(req.effective_domain_filter().is_none());
        let req = SearchRequest::new("q").with_domain_filter(" ashrae.org ");
        assert_eq!(req.effective_domain_filter(), Some("ashrae.org"));
    }

    #[test]
    fn deserialises_partial_json_with_defaults() {
        let json = r#"{"query":"液冷","language":"zh-hans","timeout_sec":12.5,"recency":"oneMonth"}"#;
        let req: SearchRequest = serde_json::from_str(json).expect("deserialize");
        assert_eq!(req.language, Language::ZhHans);
        assert_eq!(req.recency, Recency::OneMonth);
        assert_eq!(req.timeout, Duration::from_millis(12_500));
        assert_eq!(req.max_results, 5);
        assert!(req.use_cache);
    }

    #[test]
    fn unknown_language_in_json_rejected() {
        let json = r#"{"query":"q","language":"klingon"}"#;
        assert!(serde_json::from_str::<SearchRequest>(json).is_err());
    }
}
