//! Crawl configuration and its builder.

use crate::rate_limiter::RateLimitRule;
use anyhow::{anyhow, Result};
use regex::Regex;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::time::Duration;

pub use crate::robots::RobotsTxtMode;

/// Which discovery mechanisms feed the crawl queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryMechanism {
    Spider,
    Sitemap,
}

/// Resource types eligible for fetching under `ResourceValidation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Image,
    Script,
    Stylesheet,
    Font,
    Video,
    Audio,
}

#[derive(Debug, Clone, Default)]
pub struct ResourceValidationConfig {
    pub enabled: bool,
    pub resource_types: Vec<ResourceKind>,
    pub check_external: bool,
}

/// All options recognized by the crawler, per spec §6.1. Constructed via
/// [`CrawlerConfig::builder`]; only `start_url` is mandatory.
#[derive(Clone)]
pub struct CrawlerConfig {
    pub start_url: String,
    pub user_agent: String,
    pub headers: HashMap<String, String>,
    pub max_depth: u32,
    pub max_requests: u64,
    pub allowed_domains: Vec<String>,
    pub disallowed_domains: Vec<String>,
    pub url_filters: Vec<Regex>,
    pub disallowed_url_filters: Vec<Regex>,
    pub allow_url_revisit: bool,
    pub max_body_size: usize,
    pub cache_dir: Option<PathBuf>,
    pub cache_expiration: Duration,
    pub robots_txt_mode: RobotsTxtMode,
    /// Accepted for API compatibility; never changes scheduling behavior.
    pub legacy_async: bool,
    pub parse_http_error_response: bool,
    pub detect_charset: bool,
    pub check_head: bool,
    pub trace_http: bool,
    pub follow_internal_nofollow: bool,
    pub follow_external_nofollow: bool,
    pub respect_noindex: bool,
    pub resource_validation: ResourceValidationConfig,
    pub discovery_mechanisms: Vec<DiscoveryMechanism>,
    pub sitemap_urls: Vec<String>,
    pub rate_limit_rules: Vec<RateLimitRule>,
    pub max_redirects: usize,
    pub request_timeout: Duration,
    pub worker_count: usize,
}

impl CrawlerConfig {
    #[must_use]
    pub fn builder() -> CrawlerConfigBuilder<Unstarted> {
        CrawlerConfigBuilder::default()
    }
}

fn default_user_agent() -> String {
    std::env::var("BLUESNAKE_USER_AGENT")
        .unwrap_or_else(|_| "bluesnake/1.0 (+https://github.com/cyrup-ai/bluesnake)".to_string())
}

/// Typestate markers, mirroring the reference codebase's config builder:
/// `start_url` is the only field construction cannot proceed without.
pub struct Unstarted;
pub struct WithStartUrl;

pub struct CrawlerConfigBuilder<State = Unstarted> {
    start_url: Option<String>,
    user_agent: String,
    headers: HashMap<String, String>,
    max_depth: u32,
    max_requests: u64,
    allowed_domains: Vec<String>,
    disallowed_domains: Vec<String>,
    url_filters: Vec<String>,
    disallowed_url_filters: Vec<String>,
    allow_url_revisit: bool,
    max_body_size: usize,
    cache_dir: Option<PathBuf>,
    cache_expiration: Duration,
    robots_txt_mode: RobotsTxtMode,
    legacy_async: bool,
    parse_http_error_response: bool,
    detect_charset: bool,
    check_head: bool,
    trace_http: bool,
    follow_internal_nofollow: bool,
    follow_external_nofollow: bool,
    respect_noindex: bool,
    resource_validation: ResourceValidationConfig,
    discovery_mechanisms: Vec<DiscoveryMechanism>,
    sitemap_urls: Vec<String>,
    rate_limit_rules: Vec<RateLimitRule>,
    max_redirects: usize,
    request_timeout: Duration,
    worker_count: usize,
    _phantom: PhantomData<State>,
}

impl Default for CrawlerConfigBuilder<Unstarted> {
    fn default() -> Self {
        Self {
            start_url: None,
            user_agent: default_user_agent(),
            headers: HashMap::new(),
            max_depth: 0,
            max_requests: 0,
            allowed_domains: Vec::new(),
            disallowed_domains: Vec::new(),
            url_filters: Vec::new(),
            disallowed_url_filters: Vec::new(),
            allow_url_revisit: false,
            max_body_size: 0,
            cache_dir: None,
            cache_expiration: Duration::from_secs(24 * 60 * 60),
            robots_txt_mode: RobotsTxtMode::Respect,
            legacy_async: false,
            parse_http_error_response: false,
            detect_charset: false,
            check_head: false,
            trace_http: false,
            follow_internal_nofollow: false,
            follow_external_nofollow: false,
            respect_noindex: true,
            resource_validation: ResourceValidationConfig::default(),
            discovery_mechanisms: vec![DiscoveryMechanism::Spider],
            sitemap_urls: Vec::new(),
            rate_limit_rules: Vec::new(),
            max_redirects: 10,
            request_timeout: Duration::from_secs(30),
            worker_count: num_cpus::get().max(1),
            _phantom: PhantomData,
        }
    }
}

impl CrawlerConfigBuilder<Unstarted> {
    pub fn start_url(self, url: impl Into<String>) -> CrawlerConfigBuilder<WithStartUrl> {
        CrawlerConfigBuilder {
            start_url: Some(url.into()),
            user_agent: self.user_agent,
            headers: self.headers,
            max_depth: self.max_depth,
            max_requests: self.max_requests,
            allowed_domains: self.allowed_domains,
            disallowed_domains: self.disallowed_domains,
            url_filters: self.url_filters,
            disallowed_url_filters: self.disallowed_url_filters,
            allow_url_revisit: self.allow_url_revisit,
            max_body_size: self.max_body_size,
            cache_dir: self.cache_dir,
            cache_expiration: self.cache_expiration,
            robots_txt_mode: self.robots_txt_mode,
            legacy_async: self.legacy_async,
            parse_http_error_response: self.parse_http_error_response,
            detect_charset: self.detect_charset,
            check_head: self.check_head,
            trace_http: self.trace_http,
            follow_internal_nofollow: self.follow_internal_nofollow,
            follow_external_nofollow: self.follow_external_nofollow,
            respect_noindex: self.respect_noindex,
            resource_validation: self.resource_validation,
            discovery_mechanisms: self.discovery_mechanisms,
            sitemap_urls: self.sitemap_urls,
            rate_limit_rules: self.rate_limit_rules,
            max_redirects: self.max_redirects,
            request_timeout: self.request_timeout,
            worker_count: self.worker_count,
            _phantom: PhantomData,
        }
    }
}

// Fields settable at any builder state.
impl<State> CrawlerConfigBuilder<State> {
    #[must_use]
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = ua.into();
        self
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn max_depth(mut self, depth: u32) -> Self {
        self.max_depth = depth;
        self
    }

    #[must_use]
    pub fn max_requests(mut self, max: u64) -> Self {
        self.max_requests = max;
        self
    }

    #[must_use]
    pub fn allowed_domains(mut self, domains: Vec<String>) -> Self {
        self.allowed_domains = domains;
        self
    }

    #[must_use]
    pub fn disallowed_domains(mut self, domains: Vec<String>) -> Self {
        self.disallowed_domains = domains;
        self
    }

    #[must_use]
    pub fn url_filters(mut self, patterns: Vec<String>) -> Self {
        self.url_filters = patterns;
        self
    }

    #[must_use]
    pub fn disallowed_url_filters(mut self, patterns: Vec<String>) -> Self {
        self.disallowed_url_filters = patterns;
        self
    }

    #[must_use]
    pub fn allow_url_revisit(mut self, allow: bool) -> Self {
        self.allow_url_revisit = allow;
        self
    }

    #[must_use]
    pub fn max_body_size(mut self, bytes: usize) -> Self {
        self.max_body_size = bytes;
        self
    }

    /// Enables the on-disk GET cache at `dir`. Disabled (the default) when never called.
    #[must_use]
    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn cache_expiration(mut self, ttl: Duration) -> Self {
        self.cache_expiration = ttl;
        self
    }

    #[must_use]
    pub fn robots_txt_mode(mut self, mode: RobotsTxtMode) -> Self {
        self.robots_txt_mode = mode;
        self
    }

    /// Legacy no-op, accepted for API compatibility with the source this
    /// crate's design descends from. Concurrency is always via the worker pool.
    #[must_use]
    pub fn r#async(mut self, value: bool) -> Self {
        self.legacy_async = value;
        self
    }

    #[must_use]
    pub fn parse_http_error_response(mut self, value: bool) -> Self {
        self.parse_http_error_response = value;
        self
    }

    #[must_use]
    pub fn detect_charset(mut self, value: bool) -> Self {
        self.detect_charset = value;
        self
    }

    #[must_use]
    pub fn check_head(mut self, value: bool) -> Self {
        self.check_head = value;
        self
    }

    #[must_use]
    pub fn trace_http(mut self, value: bool) -> Self {
        self.trace_http = value;
        self
    }

    #[must_use]
    pub fn follow_internal_nofollow(mut self, value: bool) -> Self {
        self.follow_internal_nofollow = value;
        self
    }

    #[must_use]
    pub fn follow_external_nofollow(mut self, value: bool) -> Self {
        self.follow_external_nofollow = value;
        self
    }

    #[must_use]
    pub fn respect_noindex(mut self, value: bool) -> Self {
        self.respect_noindex = value;
        self
    }

    #[must_use]
    pub fn resource_validation(mut self, config: ResourceValidationConfig) -> Self {
        self.resource_validation = config;
        self
    }

    #[must_use]
    pub fn discovery_mechanisms(mut self, mechanisms: Vec<DiscoveryMechanism>) -> Self {
        self.discovery_mechanisms = mechanisms;
        self
    }

    #[must_use]
    pub fn sitemap_urls(mut self, urls: Vec<String>) -> Self {
        self.sitemap_urls = urls;
        self
    }

    #[must_use]
    pub fn rate_limit_rules(mut self, rules: Vec<RateLimitRule>) -> Self {
        self.rate_limit_rules = rules;
        self
    }

    #[must_use]
    pub fn max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = max;
        self
    }

    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn worker_count(mut self, count: usize) -> Self {
        self.worker_count = count.max(1);
        self
    }
}

impl CrawlerConfigBuilder<WithStartUrl> {
    pub fn build(self) -> Result<CrawlerConfig> {
        let url_filters = compile_all(&self.url_filters)?;
        let disallowed_url_filters = compile_all(&self.disallowed_url_filters)?;

        Ok(CrawlerConfig {
            start_url: self
                .start_url
                .ok_or_else(|| anyhow!("start_url is required"))?,
            user_agent: self.user_agent,
            headers: self.headers,
            max_depth: self.max_depth,
            max_requests: self.max_requests,
            allowed_domains: self.allowed_domains,
            disallowed_domains: self.disallowed_domains,
            url_filters,
            disallowed_url_filters,
            allow_url_revisit: self.allow_url_revisit,
            max_body_size: self.max_body_size,
            cache_dir: self.cache_dir,
            cache_expiration: self.cache_expiration,
            robots_txt_mode: self.robots_txt_mode,
            legacy_async: self.legacy_async,
            parse_http_error_response: self.parse_http_error_response,
            detect_charset: self.detect_charset,
            check_head: self.check_head,
            trace_http: self.trace_http,
            follow_internal_nofollow: self.follow_internal_nofollow,
            follow_external_nofollow: self.follow_external_nofollow,
            respect_noindex: self.respect_noindex,
            resource_validation: self.resource_validation,
            discovery_mechanisms: self.discovery_mechanisms,
            sitemap_urls: self.sitemap_urls,
            rate_limit_rules: self.rate_limit_rules,
            max_redirects: self.max_redirects,
            request_timeout: self.request_timeout,
            worker_count: self.worker_count,
        })
    }
}

fn compile_all(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| Regex::new(p).map_err(|e| anyhow!("invalid filter pattern '{p}': {e}")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_requires_start_url() {
        let config = CrawlerConfig::builder()
            .start_url("https://example.com")
            .build()
            .unwrap();
        assert_eq!(config.start_url, "https://example.com");
        assert_eq!(config.max_depth, 0);
        assert!(config.respect_noindex);
        assert!(!config.follow_internal_nofollow);
    }

    #[test]
    fn invalid_filter_pattern_rejected() {
        let result = CrawlerConfig::builder()
            .start_url("https://example.com")
            .url_filters(vec!["(".to_string()])
            .build();
        assert!(result.is_err());
    }
}
