//! Request-scoped merging of free-tier results.
//!
//! Free providers cost nothing, so their results are pooled across the
//! cascade: each new batch is domain-filtered and appended minus any URL
//! already seen. Nothing here outlives a single `search` call.

use std::collections::HashSet;

use crate::types::SearchResult;

use super::url_normalize::{host_of, normalize_url};

/// Keep only results whose host is `domain` or a subdomain of it.
///
/// `None` keeps everything. Results with no parseable host are dropped
/// whenever a filter is set.
pub fn filter_by_domain(results: Vec<SearchResult>, domain: Option<&str>) -> Vec<SearchResult> {
    let Some(domain) = domain.map(normalize_domain).filter(|d| !d.is_empty()) else {
        return results;
    };
    let suffix = format!(".{domain}");
    results
        .into_iter()
        .filter(|r| match host_of(&r.url) {
            Some(host) => host == domain || host.ends_with(&suffix),
            None => false,
        })
        .collect()
}

fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_start_matches('.').to_ascii_lowercase()
}

/// Accumulator for the free tier of one cascade pass.
#[derive(Debug, Default)]
pub struct FreeMerger {
    seen: HashSet<String>,
    results: Vec<SearchResult>,
    contributors: Vec<String>,
}

impl FreeMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold `results` from provider `base` into the accumulator.
    ///
    /// Applies the domain filter, then appends each result whose normalised
    /// URL has not been seen yet. `base` is recorded as a contributor even
    /// when every result was a duplicate. Returns how many results were added.
    pub fn merge(
        &mut self,
        base: &str,
        results: Vec<SearchResult>,
        domain_filter: Option<&str>,
    ) -> usize {
        if !self.contributors.iter().any(|c| c == base) {
            self.contributors.push(base.to_string());
        }
        let before = self.results.len();
        for result in filter_by_domain(results, domain_filter) {
            if self.seen.insert(normalize_url(&result.url)) {
                self.results.push(result);
            }
        }
        self.results.len() - before
    }

    /// Unique results accumulated so far.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Providers that have been merged, in merge order.
    pub fn contributors(&self) -> &[String] {
        &self.contributors
    }

    /// `A` for a single contributor, `combined_free(A+B)` for several.
    pub fn label(&self) -> String {
        match self.contributors.as_slice() {
            [] => "none".to_string(),
            [only] => only.clone(),
            many => format!("combined_free({})", many.join("+")),
        }
    }

    pub fn results(&self) -> &[SearchResult] {
        &self.results
    }

    pub fn into_results(self) -> Vec<SearchResult> {
        self.results
    }
}
