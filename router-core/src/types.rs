//! Core types for routed search results, attempts and responses.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::RouterError;

/// A single normalised search result returned by a provider.
///
/// Two results are duplicates when their URLs normalise to the same string
/// (see [`crate::orchestrator::url_normalize::normalize_url`]); no other
/// field takes part in that comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// The title of the result page.
    pub title: String,
    /// The URL of the result.
    pub url: String,
    /// A text snippet summarising the page content.
    pub snippet: String,
    /// Publication timestamp as reported by the provider, if any.
    #[serde(default)]
    pub published_at: Option<String>,
    /// Provider-supplied relevance score, passed through untouched.
    #[serde(default)]
    pub score: Option<f64>,
    /// Label of the provider that produced this result.
    pub source: String,
}

impl SearchResult {
    /// Convenience constructor for a result with no date or score.
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        snippet: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            snippet: snippet.into(),
            published_at: None,
            score: None,
            source: source.into(),
        }
    }
}

/// Cost classification of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// No marginal cost; tried first and merged across providers.
    Free,
    /// Limited non-monetary budget (e.g. a lifetime trial allowance).
    Quota,
    /// Billed per call; only tried when the caller allows paid search.
    Paid,
}

impl Tier {
    /// Returns the wire name of this tier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Quota => "quota",
            Self::Paid => "paid",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requested or resolved query language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Language {
    /// Detect from the query text.
    #[default]
    Auto,
    /// English.
    En,
    /// Simplified Chinese.
    ZhHans,
    /// Traditional Chinese.
    ZhHant,
}

impl Language {
    /// Returns the wire name of this language.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::En => "en",
            Self::ZhHans => "zh-hans",
            Self::ZhHant => "zh-hant",
        }
    }

    /// Whether this is one of the Chinese variants.
    pub fn is_cjk(&self) -> bool {
        matches!(self, Self::ZhHans | Self::ZhHant)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = RouterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "en" => Ok(Self::En),
            "zh-hans" => Ok(Self::ZhHans),
            "zh-hant" => Ok(Self::ZhHant),
            other => Err(RouterError::Config(format!(
                "unknown language '{other}' (expected auto|en|zh-hans|zh-hant)"
            ))),
        }
    }
}

/// Recency filter forwarded to providers that support one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Recency {
    #[default]
    NoLimit,
    OneDay,
    OneWeek,
    OneMonth,
    OneYear,
}

impl Recency {
    /// Returns the wire name of this filter.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoLimit => "noLimit",
            Self::OneDay => "oneDay",
            Self::OneWeek => "oneWeek",
            Self::OneMonth => "oneMonth",
            Self::OneYear => "oneYear",
        }
    }
}

impl fmt::Display for Recency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Recency {
    type Err = RouterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "noLimit" => Ok(Self::NoLimit),
            "oneDay" => Ok(Self::OneDay),
            "oneWeek" => Ok(Self::OneWeek),
            "oneMonth" => Ok(Self::OneMonth),
            "oneYear" => Ok(Self::OneYear),
            other => Err(RouterError::Config(format!(
                "unknown recency '{other}' (expected noLimit|oneDay|oneWeek|oneMonth|oneYear)"
            ))),
        }
    }
}

/// Record of one provider touched during a request.
///
/// Attempts are appended in cascade order and never rewritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchAttempt {
    /// Provider label (may carry a sub-variant, e.g. `dashscope_web/qwen-turbo`).
    pub provider: String,
    pub tier: Tier,
    pub ok: bool,
    pub cache_hit: bool,
    /// Wall-clock seconds spent on a live call; absent for skips and cache hits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_seconds: Option<f64>,
    /// Number of results after the domain filter.
    pub result_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub skipped: bool,
    /// Machine-readable skip reason, e.g. `rate_limited(today>=500)`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Path of the cache file holding this attempt's raw payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_path: Option<String>,
}

impl SearchAttempt {
    /// An attempt that was gated out before any cache lookup or call.
    pub fn skipped(provider: &str, tier: Tier, reason: impl Into<String>) -> Self {
        Self {
            provider: provider.to_string(),
            tier,
            ok: false,
            cache_hit: false,
            elapsed_seconds: None,
            result_count: 0,
            error: None,
            skipped: true,
            reason: Some(reason.into()),
            raw_path: None,
        }
    }
}

/// Per-provider counters echoed in every response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    /// Lifetime live calls.
    pub total: u64,
    /// Live calls on the current local day.
    pub today: u64,
}

/// Outcome of one routed search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    /// Resolved language (never `auto`).
    pub language: Language,
    /// A provider label, `combined_free(A+B)`, or `none`.
    pub provider_used: String,
    pub cache_hit: bool,
    pub attempts: Vec<SearchAttempt>,
    /// At most `max_results` entries.
    pub results: Vec<SearchResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_path: Option<String>,
    pub usage: BTreeMap<String, UsageSnapshot>,
    /// True whenever fewer than `min_results` results are returned.
    pub needs_followup: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_result_construction() {
        let result = SearchResult::new("Example", "https://example.com", "snippet", "brave");
        assert_eq!(result.title, "Example");
        assert_eq!(result.source, "brave");
        assert!(result.published_at.is_none());
        assert!(result.score.is_none());
    }

    #[test]
    fn search_result_tolerates_missing_optional_fields() {
        let json = r#"{"title":"T","url":"https://t.com","snippet":"s","source":"tavily"}"#;
        let decoded: SearchResult = serde_json::from_str(json).expect("deserialize");
        assert_eq!(decoded.url, "https://t.com");
        assert!(decoded.score.is_none());
    }

    #[test]
    fn tier_wire_names() {
        assert_eq!(serde_json::to_string(&Tier::Quota).expect("ser"), "\"quota\"");
        assert_eq!(Tier::Paid.to_string(), "paid");
    }

    #[test]
    fn language_parse_and_display() {
        assert_eq!("zh-hans".parse::<Language>().expect("parse"), Language::ZhHans);
        assert_eq!(" EN ".parse::<Language>().expect("parse"), Language::En);
        assert_eq!(Language::ZhHant.to_string(), "zh-hant");
        assert!(Language::ZhHant.is_cjk());
        assert!(!Language::En.is_cjk());
    }

    #[test]
    fn unknown_language_is_config_error() {
        let err = "fr".parse::<Language>().expect_err("unknown language");
        assert!(matches!(err, RouterError::Config(_)));
        assert!(err.to_string().contains("fr"));
    }

    #[test]
    fn recency_serde_uses_camel_case() {
        let json = serde_json::to_string(&Recency::OneWeek).expect("ser");
        assert_eq!(json, "\"oneWeek\"");
        let decoded: Recency = serde_json::from_str("\"noLimit\"").expect("de");
        assert_eq!(decoded, Recency::NoLimit);
    }

    #[test]
    fn unknown_recency_is_config_error() {
        let err = "oneDecade".parse::<Recency>().expect_err("unknown recency");
        assert!(matches!(err, RouterError::Config(_)));
    }

    #[test]
    fn skipped_attempt_shape() {
        let attempt = SearchAttempt::skipped("brave", Tier::Free, "rate_limited(today>=500)");
        assert!(attempt.skipped);
        assert!(!attempt.ok);
        assert_eq!(attempt.result_count, 0);
        let json = serde_json::to_value(&attempt).expect("ser");
        assert!(json.get("elapsed_seconds").is_none());
        assert_eq!(json["reason"], "rate_limited(today>=500)");
    }
}
