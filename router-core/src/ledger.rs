//! Persistent per-provider usage counters.
//!
//! A single `usage.json` is shared by every process that routes searches
//! from the same state directory. Each decision and each increment is one
//! read-mutate-write cycle under an exclusive advisory lock on
//! `usage.json.lock`. The lock is never held across a provider call.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::format_timestamp;
use crate::error::Result;
use crate::persist::{write_atomic, FileLock};
use crate::provider::LimitPolicy;
use crate::types::UsageSnapshot;

/// Counters for one provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderUsage {
    #[serde(default)]
    pub total: u64,
    /// Local date (`YYYY-MM-DD`) to live calls made that day.
    #[serde(default)]
    pub by_day: BTreeMap<String, u64>,
}

/// The whole ledger document as stored in `usage.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageLedger {
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderUsage>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl UsageLedger {
    /// `{total, today}` for `provider` on `day`.
    pub fn snapshot_on(&self, provider: &str, day: &str) -> UsageSnapshot {
        self.providers
            .get(provider)
            .map(|p| UsageSnapshot {
                total: p.total,
                today: p.by_day.get(day).copied().unwrap_or(0),
            })
            .unwrap_or_default()
    }

    /// Whether one more call fits under `limit`; on refusal, the reason.
    pub fn check_on(&self, provider: &str, limit: LimitPolicy, day: &str) -> (bool, Option<String>) {
        let snap = self.snapshot_on(provider, day);
        match limit {
            LimitPolicy::Total(max) if snap.total >= max => {
                (false, Some(format!("quota_exhausted(total>={max})")))
            }
            LimitPolicy::PerDay(max) if snap.today >= max => {
                (false, Some(format!("rate_limited(today>={max})")))
            }
            _ => (true, None),
        }
    }

    /// Record one live call on `day`, creating nested entries as needed.
    pub fn bump_on(&mut self, provider: &str, day: &str) {
        let usage = self.providers.entry(provider.to_string()).or_default();
        usage.total += 1;
        *usage.by_day.entry(day.to_string()).or_insert(0) += 1;
    }
}

/// Current local date in ledger key form.
pub fn today_key() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

/// Lock-guarded access to a `usage.json` file.
#[derive(Debug, Clone)]
pub struct QuotaLedger {
    path: PathBuf,
}

impl QuotaLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the ledger without locking or touching the filesystem.
    ///
    /// Writers replace `usage.json` by rename, so a lock-free reader sees
    /// either the old or the new document, never a partial one. A missing
    /// or unparsable file reads as an empty ledger; I/O failures are logged
    /// and also read as empty.
    pub fn read(&self) -> UsageLedger {
        self.read_unlocked().unwrap_or_else(|e| {
            tracing::warn!(path = %self.path.display(), "usage ledger unreadable, treating as empty: {e}");
            UsageLedger::default()
        })
    }

    /// Read the ledger under the lock, falling back to [`Self::read`] when
    /// the lock cannot be taken. Quota checks fail open.
    fn read_locked(&self) -> UsageLedger {
        match FileLock::acquire(&self.path) {
            Ok(_lock) => self.read(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "usage ledger lock unavailable, reading unlocked: {e}");
                self.read()
            }
        }
    }

    /// `(allowed, reason)` for one more live call to `provider`.
    pub fn within_limits(&self, provider: &str, limit: LimitPolicy) -> (bool, Option<String>) {
        self.read_locked().check_on(provider, limit, &today_key())
    }

    /// Increment `total` and today's count for `provider`.
    pub fn bump_usage(&self, provider: &str) -> Result<()> {
        self.bump_usage_on(provider, &today_key())
    }

    /// [`Self::bump_usage`] for an explicit day key.
    pub fn bump_usage_on(&self, provider: &str, day: &str) -> Result<()> {
        let _lock = FileLock::acquire(&self.path)?;
        let mut ledger = self.read_unlocked()?;
        ledger.bump_on(provider, day);
        ledger.updated_at = Some(format_timestamp(Utc::now()));
        let mut body = serde_json::to_string_pretty(&ledger)?;
        body.push('\n');
        write_atomic(&self.path, body.as_bytes())?;
        tracing::debug!(provider, day, total = ledger.snapshot_on(provider, day).total, "usage bumped");
        Ok(())
    }

    /// `{total, today}` for each of `providers`.
    pub fn snapshot<'a>(
        &self,
        providers: impl IntoIterator<Item = &'a str>,
    ) -> BTreeMap<String, UsageSnapshot> {
        let ledger = self.read();
        let day = today_key();
        providers
            .into_iter()
            .map(|name| (name.to_string(), ledger.snapshot_on(name, &day)))
            .collect()
    }

    /// Only I/O errors other than "not found" propagate; bad JSON yields an empty ledger that the next write repairs.
    fn read_unlocked(&self) -> Result<UsageLedger> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(UsageLedger::default())
            }
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&text) {
            Ok(ledger) => Ok(ledger),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "usage ledger unparsable, starting empty: {e}");
                Ok(UsageLedger::default())
            }
        }
    }
}
