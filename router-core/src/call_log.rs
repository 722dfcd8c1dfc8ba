//! Append-only NDJSON log of live provider calls.
//!
//! Cache hits and skipped providers never reach the log. The query is
//! recorded as a short hash unless `include_query` is set; provider answers
//! are written only when `include_answer` is set.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::cache::format_timestamp;
use crate::error::Result;
use crate::persist::FileLock;
use crate::types::Tier;

/// Hex characters kept from the query's SHA-256 digest.
const QUERY_HASH_LEN: usize = 16;

/// One line of the call log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallLogEntry {
    pub ts: String,
    pub provider: String,
    pub tier: Tier,
    pub ok: bool,
    pub result_count: usize,
    pub elapsed_seconds: f64,
    pub query_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
}

/// Short, stable hash of a query for correlating log lines.
pub fn query_hash(query: &str) -> String {
    let mut hex = format!("{:x}", Sha256::digest(query.as_bytes()));
    hex.truncate(QUERY_HASH_LEN);
    hex
}

/// Fields describing one finished live call.
#[derive(Debug, Clone, Copy)]
pub struct LiveCall<'a> {
    pub provider: &'a str,
    pub tier: Tier,
    pub ok: bool,
    pub result_count: usize,
    pub elapsed_seconds: f64,
    pub query: &'a str,
    pub answer: Option<&'a str>,
}

/// Writer for the call log file.
#[derive(Debug, Clone)]
pub struct CallLog {
    path: PathBuf,
    include_query: bool,
    include_answer: bool,
}

impl CallLog {
    pub fn new(path: impl Into<PathBuf>, include_query: bool, include_answer: bool) -> Self {
        Self {
            path: path.into(),
            include_query,
            include_answer,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Build the entry that would be written for `call`, honouring the
    /// privacy toggles.
    pub fn entry_for(&self, call: &LiveCall<'_>) -> CallLogEntry {
        CallLogEntry {
            ts: format_timestamp(Utc::now()),
            provider: call.provider.to_string(),
            tier: call.tier,
            ok: call.ok,
            result_count: call.result_count,
            elapsed_seconds: call.elapsed_seconds,
            query_hash: query_hash(call.query),
            query: self.include_query.then(|| call.query.to_string()),
            answer: if self.include_answer {
                call.answer.map(str::to_string)
            } else {
                None
            },
        }
    }

    /// Append one line for `call` under the `<log>.lock` lock.
    pub fn append(&self, call: &LiveCall<'_>) -> Result<()> {
        let mut line = serde_json::to_string(&self.entry_for(call))?;
        line.push('\n');

        let _lock = FileLock::acquire(&self.path)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}
