//! The Crawler: multi-URL orchestration on top of a single [`Collector`].
//! Owns the discovery queue, the worker pool, and the once-per-URL action
//! memo — see spec §5.

use crate::callbacks::{CollectorCallbacks, CrawlerCallbacks};
use crate::collector::{Collector, CollectorOptions};
use crate::config::{CrawlerConfig, DiscoveryMechanism, ResourceKind};
use crate::error::Error;
use crate::extract::html::is_internal;
use crate::extract::{default_sitemap_url, fetch_sitemap_urls, sitemap_directives};
use crate::http::{CachePolicy, HttpBackend};
use crate::policy;
use crate::rate_limiter::RateLimiter;
use crate::robots::RobotsCache;
use crate::types::{LinkRecord, LinkType, PageEvent, PageResult};
use crate::visited::VisitedStore;
use dashmap::DashSet;
use futures::stream::{FuturesUnordered, StreamExt};
use reqwest::Method;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use url::Url;

/// Counters reported once a [`Crawler::run`] call finishes draining the
/// discovery queue.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrawlSummary {
    pub total_pages: u64,
    pub total_discovered: u64,
    pub was_stopped: bool,
}

/// Orchestrates a full crawl: seeds the discovery queue from `start_url`
/// (and, when configured, sitemaps), runs a bounded pool of workers pulling
/// from that queue, and dispatches the crawler-level callbacks exactly once
/// per event.
pub struct Crawler {
    config: CrawlerConfig,
    collector: Collector,
    robots: RobotsCache,
    system_client: reqwest::Client,
    crawler_callbacks: CrawlerCallbacks,
    stop_requested: AtomicBool,
}

impl Crawler {
    pub fn new(config: CrawlerConfig) -> anyhow::Result<Self> {
        let visited = Arc::new(VisitedStore::new());
        let cache = CachePolicy::new(config.cache_dir.clone(), config.cache_expiration);
        let backend = HttpBackend::with_cache(
            &config.user_agent,
            visited.cookie_jar(),
            config.request_timeout,
            cache,
        )?;
        let rate_limiter = Arc::new(RateLimiter::new(&config.rate_limit_rules)?);

        let options = CollectorOptions {
            default_headers: config.headers.clone(),
            max_depth: config.max_depth,
            max_requests: config.max_requests,
            max_redirects: config.max_redirects,
            max_body_size: config.max_body_size,
            detect_charset: config.detect_charset,
            parse_http_error_response: config.parse_http_error_response,
            check_head: config.check_head,
            trace_http: config.trace_http,
        };
        let collector = Collector::new(backend, visited, rate_limiter, CollectorCallbacks::default(), options);

        let system_client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout)
            .build()?;
        let robots = RobotsCache::new(system_client.clone());

        Ok(Self {
            config,
            collector,
            robots,
            system_client,
            crawler_callbacks: CrawlerCallbacks::default(),
            stop_requested: AtomicBool::new(false),
        })
    }

    pub fn on_url_discovered(&mut self, cb: impl Fn(&Url) -> crate::types::UrlAction + Send + Sync + 'static) {
        self.crawler_callbacks.set_on_url_discovered(cb);
    }

    pub fn on_page_crawled(&mut self, cb: impl Fn(&PageResult) + Send + Sync + 'static) {
        self.crawler_callbacks.set_on_page_crawled(cb);
    }

    pub fn on_resource_visit(&mut self, cb: impl Fn(&crate::types::ResourceResult) + Send + Sync + 'static) {
        self.crawler_callbacks.set_on_resource_visit(cb);
    }

    pub fn on_crawl_complete(&mut self, cb: impl Fn(bool, u64, u64) + Send + Sync + 'static) {
        self.crawler_callbacks.set_on_crawl_complete(cb);
    }

    pub fn on_request(&mut self, cb: impl Fn(&mut crate::callbacks::RequestCtx<'_>) + Send + Sync + 'static) {
        self.collector.callbacks_mut().on_request(cb);
    }

    pub fn on_response_headers(
        &mut self,
        cb: impl Fn(&mut crate::callbacks::ResponseHeadersCtx<'_>) + Send + Sync + 'static,
    ) {
        self.collector.callbacks_mut().on_response_headers(cb);
    }

    pub fn on_response(&mut self, cb: impl Fn(&crate::callbacks::ResponseCtx<'_>) + Send + Sync + 'static) {
        self.collector.callbacks_mut().on_response(cb);
    }

    pub fn on_html(
        &mut self,
        selector: impl Into<String>,
        cb: impl Fn(&crate::callbacks::HtmlMatch<'_>) + Send + Sync + 'static,
    ) {
        self.collector.callbacks_mut().on_html(selector, cb);
    }

    pub fn on_xml(
        &mut self,
        xpath: impl Into<String>,
        cb: impl Fn(&crate::callbacks::XmlMatch<'_>) + Send + Sync + 'static,
    ) {
        self.collector.callbacks_mut().on_xml(xpath, cb);
    }

    pub fn on_html_detach(&mut self, selector: &str) {
        self.collector.callbacks_mut().on_html_detach(selector);
    }

    pub fn on_error(&mut self, cb: impl Fn(&crate::callbacks::ErrorCtx<'_>) + Send + Sync + 'static) {
        self.collector.callbacks_mut().on_error(cb);
    }

    pub fn on_scraped(&mut self, cb: impl Fn(&crate::callbacks::ResponseCtx<'_>) + Send + Sync + 'static) {
        self.collector.callbacks_mut().on_scraped(cb);
    }

    /// Requests a graceful stop: workers finish the fetch they are already
    /// running, then decline to pull further work from the queue. Combine
    /// with `tokio::time::timeout` around [`Crawler::run`] for a hard
    /// deadline — this crate does not impose one on its own.
    pub fn stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    /// Runs the crawl to completion: seeds the queue, drains it with
    /// `worker_count` concurrent workers, and fires `OnCrawlComplete` once.
    pub async fn run(&self) -> Result<CrawlSummary, Error> {
        log::info!("crawl starting at {}", self.config.start_url);
        let (tx, rx) = mpsc::unbounded_channel::<(Url, u32)>();
        let rx = AsyncMutex::new(rx);

        let discovered: DashSet<String> = DashSet::new();
        let total_pages = AtomicU64::new(0);
        let total_discovered = AtomicU64::new(0);
        let in_flight = AtomicI64::new(0);

        let start = Url::parse(&self.config.start_url)?;
        self.try_enqueue(
            start.clone(),
            0,
            LinkType::Anchor,
            true,
            &tx,
            &discovered,
            &total_discovered,
            &in_flight,
        )
        .await;

        if self.config.discovery_mechanisms.contains(&DiscoveryMechanism::Sitemap) {
            for seed in self.sitemap_seed_urls(&start).await {
                self.try_enqueue(
                    seed,
                    0,
                    LinkType::Anchor,
                    true,
                    &tx,
                    &discovered,
                    &total_discovered,
                    &in_flight,
                )
                .await;
            }
        }

        let worker_count = self.config.worker_count.max(1);
        let mut workers = FuturesUnordered::new();
        for _ in 0..worker_count {
            workers.push(self.worker_loop(&tx, &rx, &discovered, &total_pages, &total_discovered, &in_flight));
        }
        while workers.next().await.is_some() {}

        let summary = CrawlSummary {
            total_pages: total_pages.load(Ordering::SeqCst),
            total_discovered: total_discovered.load(Ordering::SeqCst),
            was_stopped: self.stop_requested.load(Ordering::SeqCst),
        };
        log::info!(
            "crawl finished: {} pages, {} discovered, stopped={}",
            summary.total_pages,
            summary.total_discovered,
            summary.was_stopped
        );
        self.crawler_callbacks
            .crawl_complete(summary.was_stopped, summary.total_pages, summary.total_discovered);
        Ok(summary)
    }

    /// Pulls from the shared discovery queue until the crawl quiesces
    /// (`in_flight` reaches zero with the queue empty) or a stop is
    /// requested. Re-checks `in_flight` on a short poll interval rather than
    /// relying on the channel closing — the queue's sender stays alive for
    /// the whole `run()` call, so closing it isn't a usable shutdown signal.
    #[allow(clippy::too_many_arguments)]
    async fn worker_loop(
        &self,
        tx: &mpsc::UnboundedSender<(Url, u32)>,
        rx: &AsyncMutex<mpsc::UnboundedReceiver<(Url, u32)>>,
        discovered: &DashSet<String>,
        total_pages: &AtomicU64,
        total_discovered: &AtomicU64,
        in_flight: &AtomicI64,
    ) {
        loop {
            if self.stop_requested.load(Ordering::SeqCst) {
                return;
            }

            let next = loop {
                if self.stop_requested.load(Ordering::SeqCst) {
                    break None;
                }
                let mut guard = rx.lock().await;
                if in_flight.load(Ordering::SeqCst) == 0 {
                    break None;
                }
                tokio::select! {
                    biased;
                    item = guard.recv() => break item,
                    _ = tokio::time::sleep(Duration::from_millis(25)) => continue,
                }
            };

            let Some((url, depth)) = next else {
                return;
            };

            self.process_one(url, depth, tx, discovered, total_pages, total_discovered, in_flight)
                .await;
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn process_one(
        &self,
        url: Url,
        depth: u32,
        tx: &mpsc::UnboundedSender<(Url, u32)>,
        discovered: &DashSet<String>,
        total_pages: &AtomicU64,
        total_discovered: &AtomicU64,
        in_flight: &AtomicI64,
    ) {
        let check_revisit = !self.config.allow_url_revisit;
        let outcome = self
            .collector
            .fetch_url(url.clone(), Method::GET, depth, None, HashMap::new(), check_revisit)
            .await;

        match outcome {
            Ok(events) => {
                for event in events {
                    match event {
                        PageEvent::Page(page) => {
                            total_pages.fetch_add(1, Ordering::SeqCst);
                            for link in page.internal_links.iter().chain(page.external_links.iter()) {
                                self.try_enqueue_link(link, depth, tx, discovered, total_discovered, in_flight)
                                    .await;
                            }
                            self.crawler_callbacks.page_crawled(&page);
                        }
                        PageEvent::Resource(res) => {
                            self.crawler_callbacks.resource_visit(&res);
                        }
                        PageEvent::CssAssets(assets) => {
                            for asset in assets {
                                self.try_enqueue_css_asset(
                                    &asset,
                                    &url,
                                    depth,
                                    tx,
                                    discovered,
                                    total_discovered,
                                    in_flight,
                                )
                                .await;
                            }
                        }
                    }
                }
            }
            Err(e) => {
                log::debug!("fetch_url({url}) failed: {e}");
                total_pages.fetch_add(1, Ordering::SeqCst);
                self.crawler_callbacks
                    .page_crawled(&PageResult::error_result(url.to_string(), &e.to_string()));
            }
        }

        in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    #[allow(clippy::too_many_arguments)]
    async fn try_enqueue_link(
        &self,
        link: &LinkRecord,
        depth: u32,
        tx: &mpsc::UnboundedSender<(Url, u32)>,
        discovered: &DashSet<String>,
        total_discovered: &AtomicU64,
        in_flight: &AtomicI64,
    ) {
        if !policy::should_enqueue_nofollow(&self.config, link.nofollow, link.internal) {
            return;
        }
        let Ok(url) = Url::parse(&link.url) else {
            return;
        };
        self.try_enqueue(
            url,
            depth + 1,
            link.link_type,
            link.internal,
            tx,
            discovered,
            total_discovered,
            in_flight,
        )
        .await;
    }

    /// Enqueues one asset URL discovered via CSS `url(...)` extraction
    /// (spec §4.5 / §2's "CSS-asset extraction" discovery mechanism).
    /// Classified the same way an HTML link would be, with its resource
    /// kind guessed from the file extension since CSS carries no `as` or
    /// element-tag hint the way HTML link tags do.
    #[allow(clippy::too_many_arguments)]
    async fn try_enqueue_css_asset(
        &self,
        asset_url: &str,
        css_url: &Url,
        depth: u32,
        tx: &mpsc::UnboundedSender<(Url, u32)>,
        discovered: &DashSet<String>,
        total_discovered: &AtomicU64,
        in_flight: &AtomicI64,
    ) {
        let Ok(url) = Url::parse(asset_url) else {
            return;
        };
        let internal = is_internal(&url, css_url);
        let link_type = resource_kind_from_extension(&url);
        if !policy::should_enqueue_nofollow(&self.config, false, internal) {
            return;
        }
        self.try_enqueue(url, depth + 1, link_type, internal, tx, discovered, total_discovered, in_flight)
            .await;
    }

    /// The single gate every URL — seed, sitemap entry, or discovered link —
    /// passes through. `discovered.insert` is the exactly-once test-and-set
    /// that guarantees `OnURLDiscovered` fires at most once per URL.
    #[allow(clippy::too_many_arguments)]
    async fn try_enqueue(
        &self,
        url: Url,
        depth: u32,
        link_type: LinkType,
        internal: bool,
        tx: &mpsc::UnboundedSender<(Url, u32)>,
        discovered: &DashSet<String>,
        total_discovered: &AtomicU64,
        in_flight: &AtomicI64,
    ) {
        if !discovered.insert(url.to_string()) {
            return;
        }
        total_discovered.fetch_add(1, Ordering::SeqCst);

        let mut action = self.crawler_callbacks.discover(&url);
        if action == crate::types::UrlAction::Crawl {
            if let Some(kind) = resource_kind_for(link_type) {
                let rv = &self.config.resource_validation;
                let eligible = rv.enabled
                    && rv.resource_types.contains(&kind)
                    && (internal || rv.check_external);
                if !eligible {
                    action = crate::types::UrlAction::RecordOnly;
                }
            }
        }
        if action != crate::types::UrlAction::Crawl {
            return;
        }

        if policy::is_url_crawlable(&self.config, &self.robots, &url).await.is_err() {
            return;
        }

        in_flight.fetch_add(1, Ordering::SeqCst);
        let _ = tx.send((url, depth));
    }

    async fn sitemap_seed_urls(&self, start: &Url) -> Vec<Url> {
        let mut seeds = self.config.sitemap_urls.clone();
        if seeds.is_empty() {
            let authority = crate::robots::authority(start);
            if let Ok(Some(body)) = self.robots.body_for_host(start.scheme(), &authority).await {
                seeds = sitemap_directives(&body);
            }
        }
        if seeds.is_empty() {
            seeds.push(default_sitemap_url(start));
        }

        let mut urls = Vec::new();
        for seed in seeds {
            for found in fetch_sitemap_urls(&self.system_client, &seed).await {
                if let Ok(u) = Url::parse(&found) {
                    urls.push(u);
                }
            }
        }
        urls
    }
}

/// Guesses a link type from a CSS asset URL's file extension. CSS `url(...)`
/// references carry no type hint of their own, unlike HTML's element tags
/// or `as` attribute.
fn resource_kind_from_extension(url: &Url) -> LinkType {
    let ext = url
        .path()
        .rsplit('.')
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "png" | "jpg" | "jpeg" | "gif" | "svg" | "webp" | "avif" | "ico" => LinkType::Image,
        "woff" | "woff2" | "ttf" | "otf" | "eot" => LinkType::Font,
        "mp4" | "webm" | "ogv" => LinkType::Video,
        "mp3" | "wav" | "oga" => LinkType::Audio,
        _ => LinkType::Other,
    }
}

fn resource_kind_for(link_type: LinkType) -> Option<ResourceKind> {
    match link_type {
        LinkType::Image => Some(ResourceKind::Image),
        LinkType::Script => Some(ResourceKind::Script),
        LinkType::Stylesheet => Some(ResourceKind::Stylesheet),
        LinkType::Font => Some(ResourceKind::Font),
        LinkType::Video => Some(ResourceKind::Video),
        LinkType::Audio => Some(ResourceKind::Audio),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[tokio::test]
    async fn crawls_three_linked_pages() {
        let mut server = mockito::Server::new_async().await;
        let base = server.url();
        let _home = server
            .mock("GET", "/")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(format!(
                "<html><body><a href=\"{base}/a\">A</a><a href=\"{base}/b\">B</a></body></html>"
            ))
            .create_async()
            .await;
        let _a = server
            .mock("GET", "/a")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<html><body>A page</body></html>")
            .create_async()
            .await;
        let _b = server
            .mock("GET", "/b")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<html><body>B page</body></html>")
            .create_async()
            .await;

        let config = CrawlerConfig::builder().start_url(base.clone()).build().unwrap();
        let mut crawler = Crawler::new(config).unwrap();

        let pages: Arc<StdMutex<Vec<String>>> = Arc::new(StdMutex::new(Vec::new()));
        let pages_cb = pages.clone();
        crawler.on_page_crawled(move |p| pages_cb.lock().unwrap().push(p.url.clone()));

        let summary = crawler.run().await.unwrap();
        assert_eq!(summary.total_pages, 3);
        assert_eq!(pages.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn url_discovered_fires_exactly_once_per_url() {
        let mut server = mockito::Server::new_async().await;
        let base = server.url();
        let _home = server
            .mock("GET", "/")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(format!(
                "<html><body><a href=\"{base}/shared\">x</a><a href=\"{base}/shared\">y</a></body></html>"
            ))
            .create_async()
            .await;
        let _shared = server
            .mock("GET", "/shared")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<html></html>")
            .create_async()
            .await;

        let config = CrawlerConfig::builder().start_url(base).build().unwrap();
        let mut crawler = Crawler::new(config).unwrap();

        // Tracks every URL passed to the callback; a `Vec` (rather than a
        // count) lets the assertion below distinguish "called once per
        // unique URL" from "called once overall" (the seed and `/shared`
        // are both unique URLs, so two calls are expected — but `/shared`
        // itself, linked to twice from the home page, must appear only once).
        let seen: Arc<StdMutex<Vec<String>>> = Arc::new(StdMutex::new(Vec::new()));
        let seen_cb = seen.clone();
        crawler.on_url_discovered(move |url| {
            seen_cb.lock().unwrap().push(url.to_string());
            crate::types::UrlAction::Crawl
        });

        crawler.run().await.unwrap();
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2, "expected one discovery call for the seed and one for /shared, got {seen:?}");
        let shared_calls = seen.iter().filter(|u| u.ends_with("/shared")).count();
        assert_eq!(shared_calls, 1, "OnURLDiscovered must fire exactly once for /shared despite two links to it");
    }

    #[tokio::test]
    async fn robots_txt_disallow_prevents_fetch() {
        let mut server = mockito::Server::new_async().await;
        let base = server.url();
        let _robots = server
            .mock("GET", "/robots.txt")
            .with_status(200)
            .with_body("User-agent: *\nDisallow: /blocked")
            .create_async()
            .await;
        let _home = server
            .mock("GET", "/")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(format!("<html><body><a href=\"{base}/blocked\">no</a></body></html>"))
            .create_async()
            .await;

        let config = CrawlerConfig::builder().start_url(base).build().unwrap();
        let crawler = Crawler::new(config).unwrap();
        let summary = crawler.run().await.unwrap();
        assert_eq!(summary.total_pages, 1);
    }
}
