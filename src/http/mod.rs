//! HTTP backend: single-request execution with no automatic redirect
//! following, plus charset detection, an optional on-disk GET cache, and
//! optional request tracing.

pub mod backend;
pub mod cache;

pub use backend::{decode_body, FetchOutcome, HttpBackend, RequestTiming};
pub use cache::CachePolicy;
