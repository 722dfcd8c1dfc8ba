//! The routing engine: a sequential, cost-ordered provider cascade.
//!
//! Providers are tried one at a time, cheapest first. Free providers are
//! pooled into one deduplicated accumulator; quota and paid providers are
//! judged on their own result count. The pass stops as soon as either
//! reaches `min_results`, and otherwise returns the best outcome seen.

use std::collections::HashSet;
use std::time::Instant;

use crate::cache::{fingerprint, CacheEntry, CacheMeta, ResponseCache};
use crate::call_log::{CallLog, LiveCall};
use crate::config::RoutingEngineConfig;
use crate::error::{Result, RouterError};
use crate::language::resolve_language;
use crate::ledger::{QuotaLedger, UsageLedger};
use crate::provider::{ProviderOutcome, ProviderQuery, RegisteredProvider};
use crate::request::SearchRequest;
use crate::types::{Language, SearchAttempt, SearchResponse, SearchResult, Tier};

use super::merge::{filter_by_domain, FreeMerger};

/// `provider_used` when nothing produced a result.
pub const NO_PROVIDER: &str = "none";

/// A candidate response body: what would be returned if the pass ended now.
#[derive(Debug, Clone)]
struct Candidate {
    label: String,
    results: Vec<SearchResult>,
    raw_path: Option<String>,
    cache_hit: bool,
}

/// Results that came back from one provider, live or from cache.
struct Produced {
    label: String,
    /// Domain-filtered results.
    results: Vec<SearchResult>,
    raw_path: Option<String>,
    cache_hit: bool,
}

/// State of one cascade pass.
#[derive(Default)]
struct Pass {
    attempts: Vec<SearchAttempt>,
    free: FreeMerger,
    /// Raw pointer of the first free contributor.
    free_raw_path: Option<String>,
    /// Whether every successful free attempt so far was a cache hit.
    free_all_cached: bool,
    best: Option<Candidate>,
}

impl Pass {
    fn new() -> Self {
        Self {
            free_all_cached: true,
            ..Default::default()
        }
    }

    fn best_count(&self) -> usize {
        self.best.as_ref().map_or(0, |b| b.results.len())
    }

    fn consider(&mut self, candidate: Candidate) {
        if candidate.results.len() > self.best_count() {
            self.best = Some(candidate);
        }
    }

    fn free_candidate(&self) -> Candidate {
        Candidate {
            label: self.free.label(),
            results: self.free.results().to_vec(),
            raw_path: if self.free.contributors().len() == 1 {
                self.free_raw_path.clone()
            } else {
                None
            },
            cache_hit: self.free_all_cached,
        }
    }

    /// Fold a successful provider result into the pass. Returns the
    /// candidate to return immediately when it satisfies `min_results`.
    fn absorb(
        &mut self,
        base: &str,
        tier: Tier,
        produced: Produced,
        min_results: usize,
    ) -> Option<Candidate> {
        if tier == Tier::Free {
            self.free_all_cached &= produced.cache_hit;
            if produced.results.is_empty() {
                return None;
            }
            if self.free.contributors().is_empty() {
                self.free_raw_path = produced.raw_path.clone();
            }
            self.free.merge(base, produced.results, None);
            let candidate = self.free_candidate();
            let sufficient = candidate.results.len() >= min_results;
            self.consider(candidate.clone());
            return sufficient.then_some(candidate);
        }

        let candidate = Candidate {
            label: produced.label,
            results: produced.results,
            raw_path: produced.raw_path,
            cache_hit: produced.cache_hit,
        };
        let sufficient = candidate.results.len() >= min_results;
        self.consider(candidate.clone());
        sufficient.then_some(candidate)
    }
}

/// Routes searches across registered providers.
///
/// Holds no per-request state; one engine can serve concurrent `search`
/// calls, and several engines (or processes) may share a state directory.
#[derive(Debug)]
pub struct RoutingEngine {
    config: RoutingEngineConfig,
    providers: Vec<RegisteredProvider>,
    cache: ResponseCache,
    ledger: QuotaLedger,
    call_log: Option<CallLog>,
}

fn tier_rank(tier: Tier) -> u8 {
    match tier {
        Tier::Free => 0,
        Tier::Quota => 1,
        Tier::Paid => 2,
    }
}

impl RoutingEngine {
    /// Build an engine over `providers`.
    ///
    /// Limit overrides from `config.limits` replace the matching provider's
    /// policy. Providers are ordered by tier (free, quota, paid), then by
    /// position.
    ///
    /// # Errors
    ///
    /// [`RouterError::Config`] when the config is invalid, a provider name is
    /// blank, or two providers share a name.
    pub fn new(config: RoutingEngineConfig, mut providers: Vec<RegisteredProvider>) -> Result<Self> {
        config.validate()?;

        let mut names = HashSet::new();
        for registered in &mut providers {
            let name = registered.spec.name.trim();
            if name.is_empty() {
                return Err(RouterError::Config("provider name must not be empty".into()));
            }
            if !names.insert(name.to_string()) {
                return Err(RouterError::Config(format!(
                    "provider '{name}' registered more than once"
                )));
            }
            if let Some(limit) = config.limits.get(name) {
                registered.spec.limit = *limit;
            }
        }
        providers.sort_by_key(|p| (tier_rank(p.spec.tier), p.spec.position));

        let call_log = config.call_log_path().map(|path| {
            CallLog::new(path, config.call_log.include_query, config.call_log.include_answer)
        });

        tracing::debug!(
            providers = providers.len(),
            state_dir = %config.state_dir.display(),
            "routing engine ready"
        );

        Ok(Self {
            cache: ResponseCache::new(config.cache_dir(), config.cache_ttl_seconds),
            ledger: QuotaLedger::new(config.usage_path()),
            call_log,
            config,
            providers,
        })
    }

    pub fn config(&self) -> &RoutingEngineConfig {
        &self.config
    }

    /// Registered providers in cascade order.
    pub fn providers(&self) -> &[RegisteredProvider] {
        &self.providers
    }

    /// Read-only view of the usage ledger.
    pub fn get_usage(&self) -> UsageLedger {
        self.ledger.read()
    }

    /// Run one routed search.
    ///
    /// # Errors
    ///
    /// Only [`RouterError::Config`] for an invalid request. Provider failures,
    /// timeouts and state-directory I/O problems are reported through the
    /// response's attempts or logged.
    pub async fn search(&self, request: SearchRequest) -> Result<SearchResponse> {
        request.validate()?;

        let language = resolve_language(request.language, &request.query);
        let allow_paid = request.allow_paid.unwrap_or(self.config.allow_paid_default);
        let min_results = request.effective_min_results();
        let domain = request.effective_domain_filter().map(str::to_string);

        tracing::trace!(query = %request.query, "routing search");
        tracing::debug!(%language, allow_paid, min_results, "cascade start");

        let mut pass = Pass::new();

        for registered in &self.providers {
            let spec = &registered.spec;
            match spec.tier {
                Tier::Quota if !language.is_cjk() => continue,
                Tier::Quota if !self.config.allow_quota => {
                    pass.attempts
                        .push(SearchAttempt::skipped(&spec.name, spec.tier, "quota_disabled"));
                    continue;
                }
                Tier::Paid if !allow_paid => continue,
                _ => {}
            }

            let (allowed, reason) = self.ledger.within_limits(&spec.name, spec.limit);
            if !allowed {
                let reason = reason.unwrap_or_else(|| "limit_reached".to_string());
                tracing::info!(provider = %spec.name, tier = %spec.tier, %reason, "provider skipped");
                pass.attempts
                    .push(SearchAttempt::skipped(&spec.name, spec.tier, reason));
                continue;
            }

            let produced = self
                .run_provider(registered, &request, language, domain.as_deref(), &mut pass.attempts)
                .await;
            let Some(produced) = produced else {
                continue;
            };

            if let Some(done) = pass.absorb(&spec.name, spec.tier, produced, min_results) {
                return Ok(self.respond(&request, language, done, pass.attempts));
            }
        }

        let attempts = pass.attempts;
        let response = match pass.best {
            Some(best) => {
                tracing::info!(
                    provider = %best.label,
                    count = best.results.len(),
                    min_results,
                    "cascade exhausted, returning best effort"
                );
                self.respond(&request, language, best, attempts)
            }
            None => {
                tracing::info!(attempts = attempts.len(), "cascade exhausted with no results");
                self.respond(
                    &request,
                    language,
                    Candidate {
                        label: NO_PROVIDER.to_string(),
                        results: Vec::new(),
                        raw_path: None,
                        cache_hit: false,
                    },
                    attempts,
                )
            }
        };
        Ok(response)
    }

    /// Cache lookup, then live call on miss. Records exactly one attempt and
    /// returns the domain-filtered results of a successful step.
    async fn run_provider(
        &self,
        registered: &RegisteredProvider,
        request: &SearchRequest,
        language: Language,
        domain: Option<&str>,
        attempts: &mut Vec<SearchAttempt>,
    ) -> Option<Produced> {
        let spec = &registered.spec;
        let knobs = self.config.knobs_for(&spec.name);
        let fp = fingerprint(&spec.name, request, language, &knobs);

        if request.use_cache {
            if let Some(entry) = self.cache.load(&spec.name, &fp) {
                let raw_path = self.cache.entry_path(&spec.name, &fp).display().to_string();
                let results = filter_by_domain(entry.results, domain);
                tracing::debug!(
                    provider = %entry.provider,
                    tier = %spec.tier,
                    count = results.len(),
                    "cache hit"
                );
                attempts.push(SearchAttempt {
                    provider: entry.provider.clone(),
                    tier: spec.tier,
                    ok: true,
                    cache_hit: true,
                    elapsed_seconds: None,
                    result_count: results.len(),
                    error: None,
                    skipped: false,
                    reason: None,
                    raw_path: Some(raw_path.clone()),
                });
                return Some(Produced {
                    label: entry.provider,
                    results,
                    raw_path: Some(raw_path),
                    cache_hit: true,
                });
            }
        }

        let query = ProviderQuery {
            query: request.query.trim().to_string(),
            count: request.max_results,
            language,
            recency: request.recency,
            domain_filter: domain.map(str::to_string),
            timeout: request.timeout,
            knobs,
        };

        let started = Instant::now();
        let mut outcome =
            match tokio::time::timeout(request.timeout, registered.provider.call(&query)).await {
                Ok(outcome) => outcome,
                Err(_) => ProviderOutcome::failure(format!(
                    "timeout after {:.1}s",
                    request.timeout.as_secs_f64()
                )),
            };
        let elapsed = round_millis(started.elapsed().as_secs_f64());

        if outcome.ok && outcome.results.is_empty() {
            outcome.ok = false;
            outcome.error = Some("no_results".to_string());
        }
        let label = outcome.label.clone().unwrap_or_else(|| spec.name.clone());

        if !outcome.ok {
            let error = outcome
                .error
                .clone()
                .unwrap_or_else(|| "provider_error".to_string());
            tracing::warn!(provider = %label, tier = %spec.tier, elapsed_ms = (elapsed * 1000.0) as u64, %error, "provider call failed");
            attempts.push(SearchAttempt {
                provider: label.clone(),
                tier: spec.tier,
                ok: false,
                cache_hit: false,
                elapsed_seconds: Some(elapsed),
                result_count: 0,
                error: Some(error),
                skipped: false,
                reason: None,
                raw_path: None,
            });
            self.log_call(&label, spec.tier, false, 0, elapsed, &query.query, None);
            return None;
        }

        let entry = CacheEntry::new(
            label.clone(),
            spec.tier,
            outcome.results,
            outcome.raw,
            CacheMeta {
                language,
                recency: request.recency,
                domain_filter: domain.map(str::to_string),
            },
        );
        let raw_path = match self.cache.store(&spec.name, &fp, &entry) {
            Ok(path) => Some(path.display().to_string()),
            Err(e) => {
                tracing::warn!(provider = %spec.name, "cache write failed: {e}");
                None
            }
        };
        if let Err(e) = self.ledger.bump_usage(&spec.name) {
            tracing::warn!(provider = %spec.name, "usage bump failed: {e}");
        }

        let results = filter_by_domain(entry.results, domain);
        tracing::debug!(
            provider = %label,
            tier = %spec.tier,
            count = results.len(),
            elapsed_ms = (elapsed * 1000.0) as u64,
            "provider call succeeded"
        );
        attempts.push(SearchAttempt {
            provider: label.clone(),
            tier: spec.tier,
            ok: true,
            cache_hit: false,
            elapsed_seconds: Some(elapsed),
            result_count: results.len(),
            error: None,
            skipped: false,
            reason: None,
            raw_path: raw_path.clone(),
        });
        self.log_call(
            &label,
            spec.tier,
            true,
            results.len(),
            elapsed,
            &query.query,
            outcome.answer.as_deref(),
        );

        Some(Produced {
            label,
            results,
            raw_path,
            cache_hit: false,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn log_call(
        &self,
        provider: &str,
        tier: Tier,
        ok: bool,
        result_count: usize,
        elapsed_seconds: f64,
        query: &str,
        answer: Option<&str>,
    ) {
        let Some(log) = &self.call_log else {
            return;
        };
        let call = LiveCall {
            provider,
            tier,
            ok,
            result_count,
            elapsed_seconds,
            query,
            answer,
        };
        if let Err(e) = log.append(&call) {
            tracing::warn!(path = %log.path().display(), "call log append failed: {e}");
        }
    }

    fn respond(
        &self,
        request: &SearchRequest,
        language: Language,
        chosen: Candidate,
        attempts: Vec<SearchAttempt>,
    ) -> SearchResponse {
        let mut results = chosen.results;
        results.truncate(request.max_results);
        let needs_followup = results.len() < request.effective_min_results();
        let usage = self
            .ledger
            .snapshot(self.providers.iter().map(|p| p.spec.name.as_str()));

        tracing::info!(
            provider = %chosen.label,
            count = results.len(),
            cache_hit = chosen.cache_hit,
            needs_followup,
            "search routed"
        );

        SearchResponse {
            query: request.query.clone(),
            language,
            provider_used: chosen.label,
            cache_hit: chosen.cache_hit,
            attempts,
            results,
            raw_path: chosen.raw_path,
            usage,
            needs_followup,
        }
    }
}

fn round_millis(secs: f64) -> f64 {
    (secs * 1000.0).round() / 1000.0
}
