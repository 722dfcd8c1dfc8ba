//! Query language detection.
//!
//! Only used when a request asks for [`Language::Auto`]. The resolved
//! language decides whether the quota-tier provider joins the cascade.

use crate::types::Language;

/// Detect the language of a query.
///
/// Any Han ideograph (CJK Unified Ideographs, Extension A, or the
/// compatibility block) selects [`Language::ZhHans`]; otherwise
/// [`Language::En`].
pub fn detect_language(query: &str) -> Language {
    if query.chars().any(is_han) {
        Language::ZhHans
    } else {
        Language::En
    }
}

/// Resolve a requested language, detecting from `query` when it is `auto`.
pub fn resolve_language(requested: Language, query: &str) -> Language {
    match requested {
        Language::Auto => detect_language(query),
        explicit => explicit,
    }
}

fn is_han(c: char) -> bool {
    matches!(c, '\u{4e00}'..='\u{9fff}' | '\u{3400}'..='\u{4dbf}' | '\u{f900}'..='\u{faff}')
}
