//! `bluesnake` — a site-scoped web crawler library.
//!
//! Given a seed URL, [`Crawler`] discovers reachable URLs via HTML link
//! extraction, sitemap parsing, and CSS-asset extraction; fetches each
//! discovered URL through a concurrency-controlled HTTP pipeline; applies
//! crawl policy (domain filters, URL filters, robots.txt, nofollow,
//! noindex); and emits per-page and per-resource results through callbacks.
//!
//! The two-layer design separates concerns: [`Collector`] performs one HTTP
//! request end to end (redirect following, body decoding, callback
//! dispatch); [`Crawler`] owns the discovery queue, the worker pool, and
//! crawl-wide policy built on top of a single `Collector`.

pub mod callbacks;
pub mod collector;
pub mod config;
pub mod error;
pub mod extract;
pub mod fingerprint;
pub mod http;
pub mod policy;
pub mod rate_limiter;
pub mod robots;
pub mod types;
pub mod visited;

mod crawler;

pub use callbacks::{ErrorCtx, HtmlMatch, RequestCtx, ResponseCtx, ResponseHeadersCtx, XmlMatch};
pub use collector::{Collector, CollectorOptions};
pub use config::{
    CrawlerConfig, CrawlerConfigBuilder, DiscoveryMechanism, ResourceKind, ResourceValidationConfig,
};
pub use crawler::{CrawlSummary, Crawler};
pub use error::{Error, Result};
pub use rate_limiter::RateLimitRule;
pub use robots::RobotsTxtMode;
pub use types::{
    HeaderMap, LinkMetadata, LinkRecord, LinkType, PageEvent, PageResult, Position, RedirectHop,
    ResourceResult, UrlAction,
};
