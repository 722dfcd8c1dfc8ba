//! Search orchestration: the provider cascade, free-tier merging and URL
//! normalisation used for deduplication.

pub mod cascade;
pub mod merge;
pub mod url_normalize;
