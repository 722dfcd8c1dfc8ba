//! End-to-end tests for the routing cascade.
//!
//! Every provider here is a scripted in-process mock that counts its calls;
//! state lives in a temporary directory. No network access.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use router_core::{
    Language, LimitPolicy, ProviderOutcome, ProviderQuery, ProviderSpec, RegisteredProvider,
    RoutingEngine, RoutingEngineConfig, SearchProvider, SearchRequest, SearchResult, Tier,
};

/// What a scripted provider does when called.
enum Script {
    Results(Vec<String>),
    Fail(&'static str),
    Hang(Duration),
}

struct Scripted {
    name: String,
    script: Script,
    label: Option<String>,
    answer: Option<String>,
    calls: AtomicUsize,
}

impl Scripted {
    fn new(name: &str, script: Script) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            script,
            label: None,
            answer: None,
            calls: AtomicUsize::new(0),
        })
    }

    fn returning(name: &str, urls: &[&str]) -> Arc<Self> {
        Self::new(
            name,
            Script::Results(urls.iter().map(|u| u.to_string()).collect()),
        )
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchProvider for Scripted {
    async fn call(&self, query: &ProviderQuery) -> ProviderOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let outcome = match &self.script {
            Script::Results(urls) => {
                let results: Vec<SearchResult> = urls
                    .iter()
                    .map(|u| {
                        SearchResult::new(
                            format!("{} result", self.name),
                            u.clone(),
                            format!("about {}", query.query),
                            self.name.clone(),
                        )
                    })
                    .collect();
                ProviderOutcome::success(results, serde_json::json!({ "provider": self.name }))
            }
            Script::Fail(error) => ProviderOutcome::failure(*error),
            Script::Hang(delay) => {
                tokio::time::sleep(*delay).await;
                ProviderOutcome::failure("should have timed out")
            }
        };
        let outcome = match &self.label {
            Some(label) => outcome.with_label(label.clone()),
            None => outcome,
        };
        match &self.answer {
            Some(answer) => outcome.with_answer(answer.clone()),
            None => outcome,
        }
    }
}

fn register(
    provider: &Arc<Scripted>,
    tier: Tier,
    position: u32,
    limit: LimitPolicy,
) -> RegisteredProvider {
    RegisteredProvider::new(
        ProviderSpec::new(provider.name.clone(), tier, position, limit),
        Arc::clone(provider) as Arc<dyn SearchProvider>,
    )
}

fn free(provider: &Arc<Scripted>, position: u32) -> RegisteredProvider {
    register(provider, Tier::Free, position, LimitPolicy::PerDay(500))
}

fn config(dir: &Path) -> RoutingEngineConfig {
    RoutingEngineConfig::with_state_dir(dir)
}

fn urls(prefix: &str, n: usize) -> Vec<String> {
    (0..n).map(|i| format!("https://{prefix}.example.com/{i}")).collect()
}

fn returning_owned(name: &str, urls: Vec<String>) -> Arc<Scripted> {
    Scripted::new(name, Script::Results(urls))
}

#[tokio::test]
async fn identical_requests_hit_cache_second_time() {
    let dir = tempfile::tempdir().expect("tempdir");
    let brave = returning_owned("brave", urls("a", 5));
    let engine = RoutingEngine::new(config(dir.path()), vec![free(&brave, 0)]).expect("engine");

    let first = engine
        .search(SearchRequest::new("rust tracing"))
        .await
        .expect("first");
    let second = engine
        .search(SearchRequest::new("rust tracing"))
        .await
        .expect("second");

    assert!(!first.cache_hit);
    assert!(second.cache_hit);
    assert_eq!(first.results, second.results);
    assert_eq!(brave.calls(), 1);
    assert!(second.attempts[0].cache_hit);
    assert!(second.attempts[0].elapsed_seconds.is_none());
    assert_eq!(second.raw_path, first.raw_path);
    assert_eq!(second.usage["brave"].total, 1, "cache hits never bump usage");
}

#[tokio::test]
async fn use_cache_false_always_calls_live() {
    let dir = tempfile::tempdir().expect("tempdir");
    let brave = returning_owned("brave", urls("a", 5));
    let engine = RoutingEngine::new(config(dir.path()), vec![free(&brave, 0)]).expect("engine");

    for _ in 0..2 {
        let response = engine
            .search(SearchRequest::new("rust").with_use_cache(false))
            .await
            .expect("search");
        assert!(!response.cache_hit);
    }
    assert_eq!(brave.calls(), 2);
    assert_eq!(engine.get_usage().providers["brave"].total, 2);
}

#[tokio::test]
async fn expired_cache_entry_is_ignored() {
    let dir = tempfile::tempdir().expect("tempdir");
    let brave = returning_owned("brave", urls("a", 5));
    let engine = RoutingEngine::new(config(dir.path()), vec![free(&brave, 0)]).expect("engine");

    let first = engine.search(SearchRequest::new("rust")).await.expect("first");
    let raw_path = first.raw_path.expect("raw path");
    let mut entry: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&raw_path).expect("read")).expect("json");
    entry["created_at"] = serde_json::json!("2000-01-01T00:00:00Z");
    fs::write(&raw_path, entry.to_string()).expect("age entry");

    let second = engine.search(SearchRequest::new("rust")).await.expect("second");
    assert!(!second.cache_hit);
    assert_eq!(brave.calls(), 2);
}

#[tokio::test]
async fn daily_limit_skips_provider() {
    let dir = tempfile::tempdir().expect("tempdir");
    let brave = returning_owned("brave", urls("a", 5));
    let tavily = returning_owned("tavily", urls("b", 5));
    let mut cfg = config(dir.path());
    cfg.limits.insert("brave".into(), LimitPolicy::PerDay(1));
    let engine = RoutingEngine::new(cfg, vec![free(&brave, 0), free(&tavily, 1)]).expect("engine");

    let first = engine
        .search(SearchRequest::new("q").with_use_cache(false))
        .await
        .expect("first");
    assert_eq!(first.provider_used, "brave");

    let second = engine
        .search(SearchRequest::new("q").with_use_cache(false))
        .await
        .expect("second");
    assert_eq!(brave.calls(), 1);
    assert_eq!(second.provider_used, "tavily");
    let skipped = &second.attempts[0];
    assert!(skipped.skipped);
    assert_eq!(skipped.provider, "brave");
    assert_eq!(skipped.reason.as_deref(), Some("rate_limited(today>=1)"));
    assert_eq!(second.usage["brave"].today, 1);
    assert_eq!(second.usage["tavily"].today, 1);
}

#[tokio::test]
async fn lifetime_quota_skips_quota_provider() {
    let dir = tempfile::tempdir().expect("tempdir");
    let iqs = returning_owned("tongxiao_iqs", urls("cn", 5));
    let engine = RoutingEngine::new(
        config(dir.path()),
        vec![register(&iqs, Tier::Quota, 0, LimitPolicy::Total(1))],
    )
    .expect("engine");

    let request = SearchRequest::new("液冷 数据中心").with_use_cache(false);
    engine.search(request.clone()).await.expect("first");
    let second = engine.search(request).await.expect("second");

    assert_eq!(iqs.calls(), 1);
    assert_eq!(
        second.attempts[0].reason.as_deref(),
        Some("quota_exhausted(total>=1)")
    );
    assert_eq!(second.provider_used, "none");
    assert!(second.needs_followup);
}

#[tokio::test]
async fn free_results_merge_until_sufficient() {
    let dir = tempfile::tempdir().expect("tempdir");
    let a = Scripted::returning("a", &["https://x.com/1", "https://x.com/2"]);
    let b = Scripted::returning(
        "b",
        &["https://x.com/2?utm_source=b", "https://x.com/3", "https://x.com/4"],
    );
    let paid = returning_owned("paid", urls("p", 5));
    let engine = RoutingEngine::new(
        config(dir.path()),
        vec![
            free(&a, 0),
            free(&b, 1),
            register(&paid, Tier::Paid, 2, LimitPolicy::PerDay(50)),
        ],
    )
    .expect("engine");

    let response = engine
        .search(
            SearchRequest::new("q")
                .with_max_results(5)
                .with_min_results(4)
                .with_allow_paid(true),
        )
        .await
        .expect("search");

    assert_eq!(response.provider_used, "combined_free(a+b)");
    assert_eq!(response.results.len(), 4);
    assert!(!response.needs_followup);
    assert!(response.raw_path.is_none());
    assert_eq!(paid.calls(), 0);
}

#[tokio::test]
async fn ashrae_query_resolves_to_english_free_merge() {
    let dir = tempfile::tempdir().expect("tempdir");
    let a = Scripted::returning(
        "providerA",
        &[
            "https://www.ashrae.org/tc99",
            "https://datacenters.example.com/liquid",
            "https://blog.example.org/cooling",
        ],
    );
    let b = Scripted::returning(
        "providerB",
        &[
            "https://www.ashrae.org/tc99#top",
            "https://datacenters.example.com/liquid?fbclid=zzz",
            "https://vendor.example.net/whitepaper",
            "https://news.example.com/tc99",
        ],
    );
    let quota = returning_owned("quotaP", urls("q", 5));
    let paid = returning_owned("paidP", urls("p", 5));
    let engine = RoutingEngine::new(
        config(dir.path()),
        vec![
            free(&a, 0),
            free(&b, 1),
            register(&quota, Tier::Quota, 2, LimitPolicy::Total(1000)),
            register(&paid, Tier::Paid, 3, LimitPolicy::PerDay(50)),
        ],
    )
    .expect("engine");

    let response = engine
        .search(
            SearchRequest::new("ASHRAE TC9.9 liquid cooling whitepaper")
                .with_max_results(5)
                .with_min_results(5)
                .with_allow_paid(false),
        )
        .await
        .expect("search");

    assert_eq!(response.language, Language::En);
    assert_eq!(response.provider_used, "combined_free(providerA+providerB)");
    assert_eq!(response.results.len(), 5);
    assert!(!response.cache_hit);
    assert!(!response.needs_followup);
    assert_eq!(quota.calls(), 0);
    assert_eq!(paid.calls(), 0);
    assert_eq!(response.attempts.len(), 2);
}

#[tokio::test]
async fn combined_cache_hit_only_when_every_free_step_hit() {
    let dir = tempfile::tempdir().expect("tempdir");
    let a = Scripted::returning("a", &["https://x.com/1", "https://x.com/2"]);
    let b = Scripted::returning("b", &["https://x.com/3", "https://x.com/4"]);
    let engine =
        RoutingEngine::new(config(dir.path()), vec![free(&a, 0), free(&b, 1)]).expect("engine");
    let request = SearchRequest::new("q").with_max_results(4);

    let first = engine.search(request.clone()).await.expect("first");
    let second = engine.search(request).await.expect("second");
    assert!(!first.cache_hit);
    assert!(second.cache_hit);
    assert_eq!(second.provider_used, "combined_free(a+b)");
    assert_eq!(a.calls() + b.calls(), 2);
}

#[tokio::test]
async fn best_effort_returns_largest_outcome() {
    let dir = tempfile::tempdir().expect("tempdir");
    let a = Scripted::returning("a", &["https://x.com/1"]);
    let broken = Scripted::new("broken", Script::Fail("http 503"));
    let paid = Scripted::returning("paid", &["https://p.com/1", "https://p.com/2"]);
    let engine = RoutingEngine::new(
        config(dir.path()),
        vec![
            free(&a, 0),
            free(&broken, 1),
            register(&paid, Tier::Paid, 2, LimitPolicy::PerDay(50)),
        ],
    )
    .expect("engine");

    let response = engine
        .search(SearchRequest::new("q").with_allow_paid(true))
        .await
        .expect("search");

    assert_eq!(response.provider_used, "paid");
    assert_eq!(response.results.len(), 2);
    assert!(response.needs_followup);
    let failed = &response.attempts[1];
    assert!(!failed.ok);
    assert_eq!(failed.error.as_deref(), Some("http 503"));
    assert_eq!(response.attempts.len(), 3);
    assert!(engine.get_usage().providers.get("broken").is_none());
}

#[tokio::test]
async fn best_effort_prefers_larger_free_accumulator_over_later_paid() {
    let dir = tempfile::tempdir().expect("tempdir");
    let a = Scripted::returning("a", &["https://x.com/1", "https://x.com/2"]);
    let b = Scripted::returning("b", &["https://x.com/2#dup", "https://x.com/3", "https://x.com/4"]);
    let paid = returning_owned("paid", urls("p", 3));
    let engine = RoutingEngine::new(
        config(dir.path()),
        vec![
            free(&a, 0),
            free(&b, 1),
            register(&paid, Tier::Paid, 2, LimitPolicy::PerDay(50)),
        ],
    )
    .expect("engine");

    let response = engine
        .search(SearchRequest::new("q").with_min_results(5).with_allow_paid(true))
        .await
        .expect("search");

    assert_eq!(paid.calls(), 1);
    assert_eq!(response.provider_used, "combined_free(a+b)");
    assert_eq!(response.results.len(), 4);
    assert!(response.needs_followup);
    assert!(response.raw_path.is_none());
}

#[tokio::test]
async fn best_effort_tie_keeps_earliest_outcome() {
    let dir = tempfile::tempdir().expect("tempdir");
    let a = returning_owned("a", urls("a", 2));
    let paid = returning_owned("paid", urls("p", 2));
    let engine = RoutingEngine::new(
        config(dir.path()),
        vec![
            free(&a, 0),
            register(&paid, Tier::Paid, 1, LimitPolicy::PerDay(50)),
        ],
    )
    .expect("engine");

    let response = engine
        .search(SearchRequest::new("q").with_min_results(5).with_allow_paid(true))
        .await
        .expect("search");

    assert_eq!(paid.calls(), 1);
    assert_eq!(response.provider_used, "a");
    assert_eq!(response.results.len(), 2);
    assert!(response.results.iter().all(|r| r.source == "a"));
    assert!(response.needs_followup);
}

#[tokio::test]
async fn best_effort_cache_hit_follows_chosen_outcome() {
    let dir = tempfile::tempdir().expect("tempdir");
    let a = returning_owned("a", urls("a", 3));
    let paid = returning_owned("paid", urls("p", 1));
    let engine = RoutingEngine::new(
        config(dir.path()),
        vec![
            free(&a, 0),
            register(&paid, Tier::Paid, 1, LimitPolicy::PerDay(50)),
        ],
    )
    .expect("engine");
    let request = SearchRequest::new("q").with_min_results(5);

    // Warm the free provider's cache without touching the paid one.
    let warm = engine
        .search(request.clone().with_allow_paid(false))
        .await
        .expect("warm");
    assert!(!warm.cache_hit);
    assert_eq!(paid.calls(), 0);

    let response = engine
        .search(request.with_allow_paid(true))
        .await
        .expect("search");
    assert_eq!(a.calls(), 1);
    assert_eq!(paid.calls(), 1);
    assert_eq!(response.provider_used, "a");
    assert!(response.cache_hit);
    assert!(!response.attempts[1].cache_hit);
}

#[tokio::test]
async fn best_effort_live_winner_is_not_a_cache_hit() {
    let dir = tempfile::tempdir().expect("tempdir");
    let a = returning_owned("a", urls("a", 1));
    let paid = returning_owned("paid", urls("p", 3));
    let engine = RoutingEngine::new(
        config(dir.path()),
        vec![
            free(&a, 0),
            register(&paid, Tier::Paid, 1, LimitPolicy::PerDay(50)),
        ],
    )
    .expect("engine");
    let request = SearchRequest::new("q").with_min_results(5);

    engine
        .search(request.clone().with_allow_paid(false))
        .await
        .expect("warm");
    let response = engine
        .search(request.with_allow_paid(true))
        .await
        .expect("search");

    assert!(response.attempts[0].cache_hit);
    assert_eq!(response.provider_used, "paid");
    assert!(!response.cache_hit);
}

#[tokio::test]
async fn all_failures_return_none() {
    let dir = tempfile::tempdir().expect("tempdir");
    let broken = Scripted::new("broken", Script::Fail("connection refused"));
    let engine = RoutingEngine::new(config(dir.path()), vec![free(&broken, 0)]).expect("engine");
    let response = engine.search(SearchRequest::new("q")).await.expect("search");
    assert_eq!(response.provider_used, "none");
    assert!(response.results.is_empty());
    assert!(response.needs_followup);
    assert!(!response.cache_hit);
}

#[tokio::test]
async fn slow_provider_times_out_and_cascade_continues() {
    let dir = tempfile::tempdir().expect("tempdir");
    let slow = Scripted::new("slow", Script::Hang(Duration::from_secs(30)));
    let fast = returning_owned("fast", urls("f", 5));
    let engine =
        RoutingEngine::new(config(dir.path()), vec![free(&slow, 0), free(&fast, 1)]).expect("engine");

    let response = engine
        .search(SearchRequest::new("q").with_timeout(Duration::from_secs(1)))
        .await
        .expect("search");

    let timed_out = &response.attempts[0];
    assert!(!timed_out.ok);
    assert!(timed_out
        .error
        .as_deref()
        .is_some_and(|e| e.contains("timeout")));
    assert_eq!(response.provider_used, "fast");
    assert!(engine.get_usage().providers.get("slow").is_none());
}

#[tokio::test]
async fn empty_payload_is_failure_without_side_effects() {
    let dir = tempfile::tempdir().expect("tempdir");
    let empty = Scripted::returning("empty", &[]);
    let engine = RoutingEngine::new(config(dir.path()), vec![free(&empty, 0)]).expect("engine");

    let response = engine.search(SearchRequest::new("q")).await.expect("search");
    let attempt = &response.attempts[0];
    assert!(!attempt.ok);
    assert_eq!(attempt.error.as_deref(), Some("no_results"));
    assert!(attempt.raw_path.is_none());
    assert!(!dir.path().join("cache").join("empty").exists());
    assert!(engine.get_usage().providers.is_empty());
}

#[tokio::test]
async fn domain_filter_applies_to_live_and_cached_results() {
    let dir = tempfile::tempdir().expect("tempdir");
    let brave = Scripted::returning(
        "brave",
        &[
            "https://docs.ashrae.org/a",
            "https://example.com/b",
            "https://ashrae.org/c",
            "https://fakeashrae.org/d",
        ],
    );
    let engine = RoutingEngine::new(config(dir.path()), vec![free(&brave, 0)]).expect("engine");
    let request = SearchRequest::new("tc9.9")
        .with_max_results(2)
        .with_domain_filter("ashrae.org");

    let live = engine.search(request.clone()).await.expect("live");
    assert_eq!(live.results.len(), 2);
    assert!(live.results.iter().all(|r| r.url.contains("ashrae.org/")));
    assert_eq!(live.attempts[0].result_count, 2);

    let cached = engine.search(request).await.expect("cached");
    assert!(cached.cache_hit);
    assert_eq!(cached.results, live.results);
}

#[tokio::test]
async fn chinese_query_brings_in_quota_provider() {
    let dir = tempfile::tempdir().expect("tempdir");
    let brave = Scripted::new("brave", Script::Fail("http 422"));
    let tavily = Scripted::returning("tavily", &["https://t.example.com/1"]);
    let iqs = returning_owned("tongxiao_iqs", urls("cn", 5));
    let engine = RoutingEngine::new(
        config(dir.path()),
        vec![
            free(&brave, 0),
            free(&tavily, 1),
            register(&iqs, Tier::Quota, 2, LimitPolicy::Total(1000)),
        ],
    )
    .expect("engine");

    let zh = engine
        .search(SearchRequest::new("液冷 数据中心 标准"))
        .await
        .expect("zh");
    assert_eq!(zh.language, Language::ZhHans);
    assert_eq!(zh.provider_used, "tongxiao_iqs");
    assert_eq!(zh.attempts.len(), 3);
    assert_eq!(zh.usage["tongxiao_iqs"].total, 1);

    let en = engine
        .search(SearchRequest::new("liquid cooling standard"))
        .await
        .expect("en");
    assert_eq!(en.language, Language::En);
    assert_eq!(iqs.calls(), 1, "quota tier is reserved for Chinese queries");
    assert_eq!(en.provider_used, "tavily");
}

#[tokio::test]
async fn quota_tier_can_be_disabled() {
    let dir = tempfile::tempdir().expect("tempdir");
    let iqs = returning_owned("tongxiao_iqs", urls("cn", 5));
    let mut cfg = config(dir.path());
    cfg.allow_quota = false;
    let engine = RoutingEngine::new(
        cfg,
        vec![register(&iqs, Tier::Quota, 0, LimitPolicy::Total(1000))],
    )
    .expect("engine");

    let response = engine.search(SearchRequest::new("液冷")).await.expect("search");
    assert_eq!(iqs.calls(), 0);
    assert!(response.attempts[0].skipped);
    assert_eq!(response.attempts[0].reason.as_deref(), Some("quota_disabled"));
}

#[tokio::test]
async fn paid_default_comes_from_config() {
    let dir = tempfile::tempdir().expect("tempdir");
    let paid = returning_owned("paid", urls("p", 5));
    let mut cfg = config(dir.path());
    cfg.allow_paid_default = true;
    let engine = RoutingEngine::new(
        cfg,
        vec![register(&paid, Tier::Paid, 0, LimitPolicy::PerDay(50))],
    )
    .expect("engine");

    let unset = engine.search(SearchRequest::new("q")).await.expect("unset");
    assert_eq!(unset.provider_used, "paid");

    let denied = engine
        .search(SearchRequest::new("q2").with_allow_paid(false))
        .await
        .expect("denied");
    assert_eq!(denied.provider_used, "none");
    assert!(denied.attempts.is_empty());
    assert_eq!(paid.calls(), 1);
}

#[tokio::test]
async fn refined_label_used_but_usage_bumped_on_base_name() {
    let dir = tempfile::tempdir().expect("tempdir");
    let dashscope = Arc::new(Scripted {
        name: "dashscope_web".into(),
        script: Script::Results(urls("d", 5)),
        label: Some("dashscope_web/qwen-turbo".into()),
        answer: Some("an LLM answer".into()),
        calls: AtomicUsize::new(0),
    });
    let engine = RoutingEngine::new(
        config(dir.path()),
        vec![register(&dashscope, Tier::Paid, 0, LimitPolicy::PerDay(50))],
    )
    .expect("engine");

    let request = SearchRequest::new("q").with_allow_paid(true);
    let live = engine.search(request.clone()).await.expect("live");
    assert_eq!(live.provider_used, "dashscope_web/qwen-turbo");
    assert_eq!(live.attempts[0].provider, "dashscope_web/qwen-turbo");
    assert_eq!(live.usage["dashscope_web"].total, 1);
    assert!(live
        .raw_path
        .as_deref()
        .is_some_and(|p| p.contains("dashscope_web")));

    let cached = engine.search(request).await.expect("cached");
    assert!(cached.cache_hit);
    assert_eq!(cached.provider_used, "dashscope_web/qwen-turbo");
}

#[tokio::test]
async fn knob_change_misses_cache_for_that_provider_only() {
    let dir = tempfile::tempdir().expect("tempdir");
    let tavily = returning_owned("tavily", urls("t", 5));
    let request = SearchRequest::new("q");

    let engine = RoutingEngine::new(config(dir.path()), vec![free(&tavily, 0)]).expect("engine");
    engine.search(request.clone()).await.expect("basic");

    let mut cfg = config(dir.path());
    cfg.knobs
        .entry("tavily".into())
        .or_default()
        .insert("search_depth".into(), "advanced".into());
    let advanced = RoutingEngine::new(cfg, vec![free(&tavily, 0)]).expect("engine");
    let response = advanced.search(request).await.expect("advanced");
    assert!(!response.cache_hit);
    assert_eq!(tavily.calls(), 2);
}

#[tokio::test]
async fn call_log_records_live_attempts_privately() {
    let dir = tempfile::tempdir().expect("tempdir");
    let broken = Scripted::new("broken", Script::Fail("boom"));
    let brave = returning_owned("brave", urls("a", 5));
    let mut cfg = config(dir.path());
    cfg.call_log.path = Some("calls.jsonl".into());
    let engine =
        RoutingEngine::new(cfg, vec![free(&broken, 0), free(&brave, 1)]).expect("engine");

    engine
        .search(SearchRequest::new("private words"))
        .await
        .expect("live");
    engine
        .search(SearchRequest::new("private words"))
        .await
        .expect("cached");

    let text = fs::read_to_string(dir.path().join("calls.jsonl")).expect("log");
    let lines: Vec<serde_json::Value> = text
        .lines()
        .map(|l| serde_json::from_str(l).expect("json"))
        .collect();
    // broken twice (failures are never cached), brave once (then a cache hit).
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0]["provider"], "broken");
    assert_eq!(lines[0]["ok"], false);
    assert_eq!(lines[1]["provider"], "brave");
    assert_eq!(lines[1]["result_count"], 5);
    assert!(!text.contains("private words"));
    assert!(lines.iter().all(|l| l.get("query").is_none()));
}

#[tokio::test]
async fn call_log_includes_query_when_enabled() {
    let dir = tempfile::tempdir().expect("tempdir");
    let brave = returning_owned("brave", urls("a", 5));
    let log_path = dir.path().join("logs").join("calls.jsonl");
    let mut cfg = config(dir.path());
    cfg.call_log.path = Some(log_path.clone());
    cfg.call_log.include_query = true;
    let engine = RoutingEngine::new(cfg, vec![free(&brave, 0)]).expect("engine");

    engine.search(SearchRequest::new("visible words")).await.expect("live");

    let line: serde_json::Value = serde_json::from_str(
        fs::read_to_string(&log_path)
            .expect("log")
            .lines()
            .next()
            .expect("one line"),
    )
    .expect("json");
    assert_eq!(line["query"], "visible words");
    assert!(line.get("answer").is_none());
}

#[tokio::test]
async fn response_usage_lists_every_registered_provider() {
    let dir = tempfile::tempdir().expect("tempdir");
    let brave = returning_owned("brave", urls("a", 5));
    let paid = returning_owned("paid", urls("p", 5));
    let engine = RoutingEngine::new(
        config(dir.path()),
        vec![
            free(&brave, 0),
            register(&paid, Tier::Paid, 1, LimitPolicy::PerDay(50)),
        ],
    )
    .expect("engine");

    let response = engine.search(SearchRequest::new("q")).await.expect("search");
    assert_eq!(response.usage.len(), 2);
    assert_eq!(response.usage["brave"].total, 1);
    assert_eq!(response.usage["paid"].total, 0);
}

#[tokio::test]
async fn results_truncated_to_max_results() {
    let dir = tempfile::tempdir().expect("tempdir");
    let brave = returning_owned("brave", urls("a", 10));
    let engine = RoutingEngine::new(config(dir.path()), vec![free(&brave, 0)]).expect("engine");
    let response = engine
        .search(SearchRequest::new("q").with_max_results(3))
        .await
        .expect("search");
    assert_eq!(response.results.len(), 3);
    assert!(!response.needs_followup);
}

#[tokio::test]
async fn get_usage_leaves_missing_state_dir_untouched() {
    let dir = tempfile::tempdir().expect("tempdir");
    let state = dir.path().join("state");
    let brave = returning_owned("brave", urls("a", 5));
    let engine = RoutingEngine::new(config(&state), vec![free(&brave, 0)]).expect("engine");

    let usage = engine.get_usage();
    assert!(usage.providers.is_empty());
    assert!(!state.exists());
}
