//! Callback registries: the Collector's low-level HTTP lifecycle hooks and
//! the Crawler's page-level hooks. Ordered `Vec<Box<dyn Fn>>` registries
//! rather than a broadcast bus, since spec §5 requires strict in-order
//! synchronous dispatch and exactly-once semantics per event.

use crate::extract::html::extract_links;
use crate::types::{PageResult, ResourceResult, UrlAction};
use scraper::ElementRef;
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

/// Request about to be sent. Callbacks may call [`RequestCtx::abort`] to stop
/// the fetch before it goes out (spec §4.6 step 5).
pub struct RequestCtx<'a> {
    pub url: &'a Url,
    pub headers: &'a HashMap<String, String>,
    aborted: bool,
}

impl<'a> RequestCtx<'a> {
    pub fn new(url: &'a Url, headers: &'a HashMap<String, String>) -> Self {
        Self { url, headers, aborted: false }
    }
    pub fn abort(&mut self) {
        self.aborted = true;
    }
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }
}

/// Response headers received, body not yet read. Callbacks may call
/// [`ResponseHeadersCtx::abort`] to discard the body (spec §4.6 step 10).
pub struct ResponseHeadersCtx<'a> {
    pub url: &'a Url,
    pub status: u16,
    pub headers: &'a reqwest::header::HeaderMap,
    aborted: bool,
}

impl<'a> ResponseHeadersCtx<'a> {
    pub fn new(url: &'a Url, status: u16, headers: &'a reqwest::header::HeaderMap) -> Self {
        Self { url, status, headers, aborted: false }
    }
    pub fn abort(&mut self) {
        self.aborted = true;
    }
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }
}

/// Full response, including the decoded body. Fired once per hop (including
/// redirect hops) and once for the terminal response.
pub struct ResponseCtx<'a> {
    pub url: &'a Url,
    pub status: u16,
    pub headers: &'a reqwest::header::HeaderMap,
    pub body: &'a str,
}

/// A single `OnHTML(selector, cb)` match: one DOM element satisfying one
/// registered selector.
pub struct HtmlMatch<'a> {
    pub selector: &'a str,
    pub url: &'a Url,
    pub element: ElementRef<'a>,
}

/// A single `OnXML(xpath, cb)` match.
pub struct XmlMatch<'a> {
    pub xpath: &'a str,
    pub url: &'a Url,
    pub text: &'a str,
}

/// Fired instead of the success suffix on any post-`OnRequest` failure.
pub struct ErrorCtx<'a> {
    pub url: &'a Url,
    pub status: Option<u16>,
    pub error: &'a crate::error::Error,
}

type OnRequestFn = Box<dyn Fn(&mut RequestCtx<'_>) + Send + Sync>;
type OnResponseHeadersFn = Box<dyn Fn(&mut ResponseHeadersCtx<'_>) + Send + Sync>;
type OnResponseFn = Box<dyn Fn(&ResponseCtx<'_>) + Send + Sync>;
type OnHtmlFn = Box<dyn Fn(&HtmlMatch<'_>) + Send + Sync>;
type OnXmlFn = Box<dyn Fn(&XmlMatch<'_>) + Send + Sync>;
type OnErrorFn = Box<dyn Fn(&ErrorCtx<'_>) + Send + Sync>;
type OnScrapedFn = Box<dyn Fn(&ResponseCtx<'_>) + Send + Sync>;

/// Collector-level hooks: immutable once the crawl starts (spec §4.6/§5).
#[derive(Default)]
pub struct CollectorCallbacks {
    on_request: Vec<OnRequestFn>,
    on_response_headers: Vec<OnResponseHeadersFn>,
    on_response: Vec<OnResponseFn>,
    on_html: Vec<(scraper::Selector, String, OnHtmlFn)>,
    on_xml: Vec<(String, OnXmlFn)>,
    on_error: Vec<OnErrorFn>,
    on_scraped: Vec<OnScrapedFn>,
}

impl CollectorCallbacks {
    pub fn on_request(&mut self, cb: impl Fn(&mut RequestCtx<'_>) + Send + Sync + 'static) {
        self.on_request.push(Box::new(cb));
    }

    pub fn on_response_headers(
        &mut self,
        cb: impl Fn(&mut ResponseHeadersCtx<'_>) + Send + Sync + 'static,
    ) {
        self.on_response_headers.push(Box::new(cb));
    }

    pub fn on_response(&mut self, cb: impl Fn(&ResponseCtx<'_>) + Send + Sync + 'static) {
        self.on_response.push(Box::new(cb));
    }

    /// Registers a CSS-selector-scoped HTML callback. Invalid selectors are
    /// silently dropped, matching a registry that never surfaces a
    /// registration-time error to the caller of `Start`.
    pub fn on_html(
        &mut self,
        selector: impl Into<String>,
        cb: impl Fn(&HtmlMatch<'_>) + Send + Sync + 'static,
    ) {
        let selector = selector.into();
        if let Ok(parsed) = scraper::Selector::parse(&selector) {
            self.on_html.push((parsed, selector, Box::new(cb)));
        }
    }

    pub fn on_xml(&mut self, xpath: impl Into<String>, cb: impl Fn(&XmlMatch<'_>) + Send + Sync + 'static) {
        self.on_xml.push((xpath.into(), Box::new(cb)));
    }

    /// `OnHTMLDetach(selector)`: removes every `OnHTML` callback registered
    /// under `selector`. A no-op if none are registered. Like registration,
    /// this is only meaningful before `Crawler::run` starts dispatching.
    pub fn on_html_detach(&mut self, selector: &str) {
        self.on_html.retain(|(_, raw, _)| raw != selector);
    }

    pub fn on_error(&mut self, cb: impl Fn(&ErrorCtx<'_>) + Send + Sync + 'static) {
        self.on_error.push(Box::new(cb));
    }

    pub fn on_scraped(&mut self, cb: impl Fn(&ResponseCtx<'_>) + Send + Sync + 'static) {
        self.on_scraped.push(Box::new(cb));
    }

    pub(crate) fn fire_request(&self, ctx: &mut RequestCtx<'_>) {
        for cb in &self.on_request {
            cb(ctx);
            if ctx.is_aborted() {
                return;
            }
        }
    }

    pub(crate) fn fire_response_headers(&self, ctx: &mut ResponseHeadersCtx<'_>) {
        for cb in &self.on_response_headers {
            cb(ctx);
            if ctx.is_aborted() {
                return;
            }
        }
    }

    /// Runs every registered `OnHTML(selector, cb)` over `body`, in
    /// registration order, for every matching element.
    pub(crate) fn fire_html(&self, body: &str, url: &Url) {
        if self.on_html.is_empty() {
            return;
        }
        let doc = scraper::Html::parse_document(body);
        for (selector, raw_selector, cb) in &self.on_html {
            for element in doc.select(selector) {
                cb(&HtmlMatch { selector: raw_selector, url, element });
            }
        }
    }

    pub(crate) fn fire_xml(&self, matches: &[(String, String)], url: &Url) {
        for (xpath, text) in matches {
            for (registered_path, cb) in &self.on_xml {
                if registered_path == xpath {
                    cb(&XmlMatch { xpath, url, text });
                }
            }
        }
    }

    pub(crate) fn fire_response(&self, ctx: &ResponseCtx<'_>) {
        for cb in &self.on_response {
            cb(ctx);
        }
    }

    pub(crate) fn fire_error(&self, ctx: &ErrorCtx<'_>) {
        for cb in &self.on_error {
            cb(ctx);
        }
    }

    pub(crate) fn fire_scraped(&self, ctx: &ResponseCtx<'_>) {
        for cb in &self.on_scraped {
            cb(ctx);
        }
    }

    pub(crate) fn registered_xpaths(&self) -> Vec<String> {
        self.on_xml.iter().map(|(path, _)| path.clone()).collect()
    }
}

/// Crawler-level hooks: each fires at most the cardinality the spec
/// promises (`OnURLDiscovered` exactly once per URL, `OnCrawlComplete`
/// exactly once per `Wait()`).
#[derive(Default)]
pub struct CrawlerCallbacks {
    on_url_discovered: Option<Arc<dyn Fn(&Url) -> UrlAction + Send + Sync>>,
    on_page_crawled: Option<Arc<dyn Fn(&PageResult) + Send + Sync>>,
    on_resource_visit: Option<Arc<dyn Fn(&ResourceResult) + Send + Sync>>,
    on_crawl_complete: Option<Arc<dyn Fn(bool, u64, u64) + Send + Sync>>,
}

impl CrawlerCallbacks {
    pub fn set_on_url_discovered(&mut self, cb: impl Fn(&Url) -> UrlAction + Send + Sync + 'static) {
        self.on_url_discovered = Some(Arc::new(cb));
    }

    pub fn set_on_page_crawled(&mut self, cb: impl Fn(&PageResult) + Send + Sync + 'static) {
        self.on_page_crawled = Some(Arc::new(cb));
    }

    pub fn set_on_resource_visit(&mut self, cb: impl Fn(&ResourceResult) + Send + Sync + 'static) {
        self.on_resource_visit = Some(Arc::new(cb));
    }

    pub fn set_on_crawl_complete(&mut self, cb: impl Fn(bool, u64, u64) + Send + Sync + 'static) {
        self.on_crawl_complete = Some(Arc::new(cb));
    }

    /// Defaults to `Crawl` when no callback is registered.
    pub(crate) fn discover(&self, url: &Url) -> UrlAction {
        match &self.on_url_discovered {
            Some(cb) => cb(url),
            None => UrlAction::Crawl,
        }
    }

    pub(crate) fn page_crawled(&self, result: &PageResult) {
        if let Some(cb) = &self.on_page_crawled {
            cb(result);
        }
    }

    pub(crate) fn resource_visit(&self, result: &ResourceResult) {
        if let Some(cb) = &self.on_resource_visit {
            cb(result);
        }
    }

    pub(crate) fn crawl_complete(&self, was_stopped: bool, total_pages: u64, total_discovered: u64) {
        if let Some(cb) = &self.on_crawl_complete {
            cb(was_stopped, total_pages, total_discovered);
        }
    }
}

/// Re-extracts links for a fetched page. Kept here (rather than in
/// `collector.rs`) since it is purely a function of the already-decoded body
/// the `OnHTML` dispatch also needs.
pub(crate) fn links_for_page(body: &str, url: &Url) -> Vec<crate::types::LinkRecord> {
    extract_links(body, url)
}
