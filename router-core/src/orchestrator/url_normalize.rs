//! URL normalisation for cross-provider deduplication.
//!
//! Canonicalises URLs so that equivalent pages (differing only in
//! query-parameter order, tracking parameters, fragments, or scheme/host
//! capitalisation) compare as equal. The path is kept verbatim: no dot
//! segment resolution, no percent re-encoding, no implied `/`.

use url::form_urlencoded;
use url::Url;

/// Tracking query keys stripped during normalisation, besides any `utm_*` key.
const TRACKING_PARAMS: &[&str] = &[
    "fbclid", "gclid", "igshid", "mc_cid", "mc_eid", "mkt_tok", "ref", "ref_src",
];

/// Normalise a URL for deduplication comparison.
///
/// Applies the following transformations:
///
/// 1. Lowercase scheme and authority (path is preserved as-is).
/// 2. Drop `utm_*` and other known tracking parameters (case-insensitive key
///    match) as well as parameters with an empty key.
/// 3. Sort remaining query pairs by key, then value, and re-encode them.
/// 4. Remove the fragment (`#…`).
///
/// Never fails: input that is not an absolute `scheme://authority` URL is
/// returned unchanged and acts as its own unique key.
///
/// # Examples
///
/// ```
/// use router_core::orchestrator::url_normalize::normalize_url;
///
/// let a = normalize_url("https://a.com/x?utm_source=foo&b=2");
/// let b = normalize_url("https://a.com/x?b=2");
/// assert_eq!(a, b);
/// ```
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if Url::parse(trimmed).is_err() {
        return raw.to_string();
    }
    let Some((scheme, rest)) = trimmed.split_once("://") else {
        return raw.to_string();
    };

    // The url crate would rewrite the path, so slice the raw text instead.
    let rest = rest.split_once('#').map_or(rest, |(before, _)| before);
    let (before_query, query) = match rest.split_once('?') {
        Some((before, query)) => (before, Some(query)),
        None => (rest, None),
    };
    let authority_end = before_query.find('/').unwrap_or(before_query.len());
    let (authority, path) = before_query.split_at(authority_end);

    let mut normalized = format!(
        "{}://{}{}",
        scheme.to_ascii_lowercase(),
        authority.to_ascii_lowercase(),
        path
    );

    if let Some(query) = query {
        let mut params: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
            .filter(|(key, _)| !is_tracking_key(key))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        params.sort();

        if !params.is_empty() {
            let encoded = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(params.iter())
                .finish();
            normalized.push('?');
            normalized.push_str(&encoded);
        }
    }

    normalized
}

/// Lower-cased host of `raw`, or `None` if it has no parseable host.
pub fn host_of(raw: &str) -> Option<String> {
    Url::parse(raw.trim())
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
}

fn is_tracking_key(key: &str) -> bool {
    let k = key.trim().to_ascii_lowercase();
    k.is_empty() || k.starts_with("utm_") || TRACKING_PARAMS.contains(&k.as_str())
}
