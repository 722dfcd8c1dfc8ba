//! # router-core
//!
//! Cost- and quota-aware routing of web searches across several search
//! providers.
//!
//! A [`RoutingEngine`] owns a list of [`SearchProvider`] adapters, each
//! tagged with a cost tier. For every request it walks a cascade ordered
//! cheapest first, stopping as soon as enough unique results are in hand.
//!
//! ## Design
//!
//! - Free providers are merged and deduplicated by normalised URL
//! - Quota-tier providers join the cascade only for Chinese queries
//! - Paid providers are tried only when the caller allows it
//! - Successful responses are cached on disk with a TTL, keyed by a
//!   per-provider fingerprint of the request
//! - Live calls are counted in a lock-guarded usage ledger shared by all
//!   processes using the same state directory
//! - One provider failing or timing out never fails the search
//!
//! ## Privacy
//!
//! - Query text is logged only at trace level
//! - The optional call log stores a query hash unless explicitly told
//!   otherwise

pub mod cache;
pub mod call_log;
pub mod config;
pub mod error;
pub mod language;
pub mod ledger;
pub mod orchestrator;
pub mod persist;
pub mod provider;
pub mod request;
pub mod types;

pub use config::{CallLogConfig, RoutingEngineConfig};
pub use error::{Result, RouterError};
pub use ledger::{ProviderUsage, UsageLedger};
pub use orchestrator::cascade::RoutingEngine;
pub use provider::{
    builtin_provider_specs, LimitPolicy, ProviderOutcome, ProviderQuery, ProviderSpec,
    RegisteredProvider, SearchProvider,
};
pub use request::SearchRequest;
pub use types::{
    Language, Recency, SearchAttempt, SearchResponse, SearchResult, Tier, UsageSnapshot,
};

/// Run one routed search on `engine`.
///
/// # Errors
///
/// Returns [`RouterError::Config`] when the request is invalid. Provider
/// failures never surface here; they are recorded in
/// [`SearchResponse::attempts`].
///
/// # Examples
///
/// ```no_run
/// # async fn example(engine: router_core::RoutingEngine) -> router_core::Result<()> {
/// let request = router_core::SearchRequest::new("ASHRAE TC9.9 liquid cooling whitepaper")
///     .with_min_results(3);
/// let response = router_core::search(&engine, request).await?;
/// println!("{} via {}", response.results.len(), response.provider_used);
/// # Ok(())
/// # }
/// ```
pub async fn search(engine: &RoutingEngine, request: SearchRequest) -> Result<SearchResponse> {
    engine.search(request).await
}

/// Snapshot of the usage ledger behind `engine`.
pub fn get_usage(engine: &RoutingEngine) -> UsageLedger {
    engine.get_usage()
}
