//! On-disk response cache.
//!
//! One JSON file per `(provider, fingerprint)` under
//! `<state_dir>/cache/<provider>/<fingerprint>.json`. Entries are written
//! once via an atomic rename and never mutated. Expired entries are ignored
//! rather than deleted; there is no eviction sweep.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::persist::write_atomic;
use crate::request::SearchRequest;
use crate::types::{Language, Recency, SearchResult, Tier};

/// Hex characters kept from the SHA-256 digest.
const FINGERPRINT_LEN: usize = 32;

/// Request fields recorded alongside a cached response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMeta {
    pub language: Language,
    pub recency: Recency,
    #[serde(default)]
    pub domain_filter: Option<String>,
}

/// One cached provider response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// RFC 3339 UTC timestamp, e.g. `2026-03-01T08:00:00Z`.
    pub created_at: String,
    /// Provider label reported by the call that produced the entry.
    pub provider: String,
    pub tier: Tier,
    /// Results as returned by the provider, before domain filtering.
    pub results: Vec<SearchResult>,
    #[serde(default)]
    pub raw: serde_json::Value,
    pub meta: CacheMeta,
}

impl CacheEntry {
    /// An entry stamped with the current time.
    pub fn new(
        provider: impl Into<String>,
        tier: Tier,
        results: Vec<SearchResult>,
        raw: serde_json::Value,
        meta: CacheMeta,
    ) -> Self {
        Self {
            created_at: format_timestamp(Utc::now()),
            provider: provider.into(),
            tier,
            results,
            raw,
            meta,
        }
    }
}

/// RFC 3339 with whole seconds and a `Z` suffix.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Deterministic cache key for `provider` and the provider-relevant request
/// fields.
///
/// `language` must already be resolved. Knobs are folded in under
/// `knob.<name>`, so a knob change for one provider never touches another
/// provider's cache lines.
pub fn fingerprint(
    provider: &str,
    request: &SearchRequest,
    language: Language,
    knobs: &BTreeMap<String, String>,
) -> String {
    let mut fields: BTreeMap<String, serde_json::Value> = BTreeMap::new();
    fields.insert("provider".into(), provider.into());
    fields.insert("query".into(), request.query.trim().into());
    fields.insert("max_results".into(), request.max_results.into());
    fields.insert("language".into(), language.as_str().into());
    fields.insert("recency".into(), request.recency.as_str().into());
    fields.insert(
        "domain_filter".into(),
        request.effective_domain_filter().into(),
    );
    for (name, value) in knobs {
        fields.insert(format!("knob.{name}"), value.as_str().into());
    }

    // BTreeMap serialises with sorted keys, which makes this canonical.
    let canonical = serde_json::to_string(&fields).unwrap_or_default();
    let digest = Sha256::digest(canonical.as_bytes());
    let mut hex = format!("{digest:x}");
    hex.truncate(FINGERPRINT_LEN);
    hex
}

/// Directory-safe form of a provider name: `[a-z0-9_-]` only.
pub fn sanitize_provider(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .to_ascii_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

/// TTL-bound file cache rooted at one directory.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    dir: PathBuf,
    ttl_seconds: u64,
}

impl ResponseCache {
    pub fn new(dir: impl Into<PathBuf>, ttl_seconds: u64) -> Self {
        Self {
            dir: dir.into(),
            ttl_seconds,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File that holds (or would hold) the entry for this key.
    pub fn entry_path(&self, provider: &str, fingerprint: &str) -> PathBuf {
        self.dir
            .join(sanitize_provider(provider))
            .join(format!("{fingerprint}.json"))
    }

    /// Load a fresh entry, or `None` on any kind of miss.
    pub fn load(&self, provider: &str, fingerprint: &str) -> Option<CacheEntry> {
        self.load_at(provider, fingerprint, Utc::now())
    }

    /// [`Self::load`] evaluated against an explicit clock.
    ///
    /// Misses on: missing file, unreadable or unparsable JSON, missing or
    /// unparsable `created_at`, and `now - created_at > ttl`.
    pub fn load_at(
        &self,
        provider: &str,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> Option<CacheEntry> {
        let path = self.entry_path(provider, fingerprint);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %path.display(), "cache read failed: {e}");
                return None;
            }
        };
        let entry: CacheEntry = match serde_json::from_str(&text) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!(path = %path.display(), "ignoring unparsable cache entry: {e}");
                return None;
            }
        };
        let created = DateTime::parse_from_rfc3339(&entry.created_at)
            .ok()?
            .with_timezone(&Utc);
        let age = now.signed_duration_since(created).num_seconds();
        if age > i64::try_from(self.ttl_seconds).unwrap_or(i64::MAX) {
            tracing::trace!(provider, fingerprint, age, "cache entry expired");
            return None;
        }
        Some(entry)
    }

    /// Atomically write `entry`, returning the file path.
    pub fn store(&self, provider: &str, fingerprint: &str, entry: &CacheEntry) -> Result<PathBuf> {
        let path = self.entry_path(provider, fingerprint);
        let mut body = serde_json::to_string_pretty(entry)?;
        body.push('\n');
        write_atomic(&path, body.as_bytes())?;
        Ok(path)
    }
}
