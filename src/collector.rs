//! The Collector: performs one HTTP request (following redirects manually)
//! and runs the low-level callback pipeline. Knows nothing about
//! multi-URL orchestration — see spec §4.6.

use crate::callbacks::{
    links_for_page, CollectorCallbacks, ErrorCtx, RequestCtx, ResponseCtx, ResponseHeadersCtx,
};
use crate::error::Error;
use crate::extract::css::extract_css_urls;
use crate::extract::xml::extract_xml_text;
use crate::fingerprint::fingerprint;
use crate::http::{decode_body, HttpBackend};
use crate::rate_limiter::RateLimiter;
use crate::types::{PageEvent, PageResult, RedirectHop, ResourceResult};
use crate::visited::VisitedStore;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::Method;
use scraper::{Html, Selector};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use url::Url;

/// Options that shape `FetchURL`'s behavior, split out of `CrawlerConfig` so
/// `Collector` depends only on the handful of fields it actually needs.
#[derive(Clone)]
pub struct CollectorOptions {
    pub default_headers: HashMap<String, String>,
    pub max_depth: u32,
    pub max_requests: u64,
    pub max_redirects: usize,
    pub max_body_size: usize,
    pub detect_charset: bool,
    pub parse_http_error_response: bool,
    pub check_head: bool,
    pub trace_http: bool,
}

pub struct Collector {
    backend: HttpBackend,
    visited: Arc<VisitedStore>,
    rate_limiter: Arc<RateLimiter>,
    callbacks: CollectorCallbacks,
    options: CollectorOptions,
    request_count: AtomicU64,
}

impl Collector {
    pub fn new(
        backend: HttpBackend,
        visited: Arc<VisitedStore>,
        rate_limiter: Arc<RateLimiter>,
        callbacks: CollectorCallbacks,
        options: CollectorOptions,
    ) -> Self {
        Self {
            backend,
            visited,
            rate_limiter,
            callbacks,
            options,
            request_count: AtomicU64::new(0),
        }
    }

    pub fn callbacks_mut(&mut self) -> &mut CollectorCallbacks {
        &mut self.callbacks
    }

    /// `FetchURL(url, method, depth, body, headers, checkRevisit)`, spec §4.6.
    pub async fn fetch_url(
        &self,
        url: Url,
        method: Method,
        depth: u32,
        body: Option<Vec<u8>>,
        caller_headers: HashMap<String, String>,
        check_revisit: bool,
    ) -> Result<Vec<PageEvent>, Error> {
        if url.host_str().is_none() {
            return Err(Error::InvalidUrl(url.to_string()));
        }
        if self.options.max_depth > 0 && depth > self.options.max_depth {
            return Err(Error::MaxDepth(url.to_string()));
        }
        if self.options.max_requests > 0 {
            let seen = self.request_count.fetch_add(1, Ordering::SeqCst) + 1;
            if seen > self.options.max_requests {
                return Err(Error::MaxRequests(url.to_string()));
            }
        }
        if check_revisit {
            let fp = fingerprint(method.as_str(), url.as_str(), body.as_deref());
            if !self.visited.visit_if_not_visited(fp) {
                return Err(Error::AlreadyVisited {
                    destination: url.to_string(),
                });
            }
        }

        match self.run_request_loop(url.clone(), method, body, caller_headers).await {
            Ok(events) => Ok(events),
            Err(e) => {
                let ctx = ErrorCtx {
                    url: &url,
                    status: None,
                    error: &e,
                };
                self.callbacks.fire_error(&ctx);
                Err(e)
            }
        }
    }

    async fn run_request_loop(
        &self,
        start_url: Url,
        method: Method,
        body: Option<Vec<u8>>,
        caller_headers: HashMap<String, String>,
    ) -> Result<Vec<PageEvent>, Error> {
        let mut current_url = start_url.clone();
        let mut current_method = method;
        let mut current_body = body;
        let mut redirect_chain: Vec<RedirectHop> = Vec::new();
        let mut events: Vec<PageEvent> = Vec::new();

        for _ in 0..=self.options.max_redirects {
            let _permit = self.rate_limiter.acquire(&current_url).await;

            let mut headers = self.options.default_headers.clone();
            headers.extend(caller_headers.clone());

            let mut req_ctx = RequestCtx::new(&current_url, &headers);
            self.callbacks.fire_request(&mut req_ctx);
            if req_ctx.is_aborted() {
                return Err(Error::AbortedBeforeRequest);
            }

            if self.options.check_head {
                self.backend.head(&current_url).await?;
            }

            let outcome = self
                .backend
                .send(
                    current_method.clone(),
                    &current_url,
                    &headers,
                    current_body.clone(),
                    self.options.max_body_size,
                    self.options.trace_http,
                )
                .await?;

            if let Some(timing) = outcome.timing {
                log::debug!(
                    "{current_url}: first_byte={:?} total={:?}",
                    timing.first_byte,
                    timing.total
                );
            }

            if matches!(outcome.status, 301 | 302 | 303 | 307 | 308) {
                redirect_chain.push(RedirectHop {
                    url: current_url.to_string(),
                    status: outcome.status,
                });
                events.push(PageEvent::Page(PageResult::redirect_hop(
                    current_url.to_string(),
                    outcome.status,
                )));

                let mut hdr_ctx =
                    ResponseHeadersCtx::new(&current_url, outcome.status, &outcome.headers);
                self.callbacks.fire_response_headers(&mut hdr_ctx);
                if hdr_ctx.is_aborted() {
                    return Err(Error::AbortedAfterHeaders);
                }

                let resp_ctx = ResponseCtx {
                    url: &current_url,
                    status: outcome.status,
                    headers: &outcome.headers,
                    body: "",
                };
                self.callbacks.fire_response(&resp_ctx);

                let location = outcome
                    .headers
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| {
                        Error::Transport(format!("redirect from {current_url} missing Location"))
                    })?;
                let next = current_url.join(location)?;

                match outcome.status {
                    303 => {
                        current_method = Method::GET;
                        current_body = None;
                    }
                    301 | 302 if current_method != Method::GET && current_method != Method::HEAD => {
                        current_method = Method::GET;
                        current_body = None;
                    }
                    // 307/308 (and GET 301/302) preserve method and body.
                    _ => {}
                }

                current_url = next;
                continue;
            }

            return Ok(self.finish_terminal_response(
                events,
                current_url,
                outcome.status,
                outcome.headers,
                outcome.body,
                redirect_chain,
            )?);
        }

        Err(Error::TooManyRedirects(
            self.options.max_redirects,
            start_url.to_string(),
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn finish_terminal_response(
        &self,
        mut events: Vec<PageEvent>,
        url: Url,
        status: u16,
        headers: reqwest::header::HeaderMap,
        raw_body: bytes::Bytes,
        redirect_chain: Vec<RedirectHop>,
    ) -> Result<Vec<PageEvent>, Error> {
        let mut hdr_ctx = ResponseHeadersCtx::new(&url, status, &headers);
        self.callbacks.fire_response_headers(&mut hdr_ctx);
        if hdr_ctx.is_aborted() {
            return Err(Error::AbortedAfterHeaders);
        }

        let mut content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if content_type.is_empty() {
            if let Some(kind) = infer::get(&raw_body) {
                content_type = kind.mime_type().to_string();
            }
        }

        let parse_body = status < 400 || self.options.parse_http_error_response;
        let decoded = decode_body(&raw_body, Some(&content_type), self.options.detect_charset);

        let parsed_mime: Option<mime::Mime> = content_type.parse().ok();
        let is_html = parsed_mime
            .as_ref()
            .map(|m| m.type_() == mime::TEXT && m.subtype() == mime::HTML)
            .unwrap_or(false)
            || (content_type.is_empty() && looks_like_html(&decoded));
        let is_xml = parsed_mime
            .as_ref()
            .map(|m| m.subtype() == mime::XML || m.suffix() == Some(mime::XML))
            .unwrap_or(false);

        if parse_body && is_html {
            self.callbacks.fire_html(&decoded, &url);
        }
        if parse_body && is_xml {
            let xpaths = self.callbacks.registered_xpaths();
            let matches: Vec<(String, String)> = xpaths
                .iter()
                .flat_map(|xp| {
                    extract_xml_text(&decoded, xp)
                        .into_iter()
                        .map(move |text| (xp.clone(), text))
                })
                .collect();
            self.callbacks.fire_xml(&matches, &url);
        }

        let resp_ctx = ResponseCtx {
            url: &url,
            status,
            headers: &headers,
            body: &decoded,
        };
        self.callbacks.fire_response(&resp_ctx);
        self.callbacks.fire_scraped(&resp_ctx);

        if parse_body && is_html {
            let links = links_for_page(&decoded, &url);
            let (internal_links, external_links) =
                links.into_iter().partition(|l| l.internal);
            events.push(PageEvent::Page(PageResult {
                url: url.to_string(),
                status,
                title: extract_title(&decoded),
                meta_description: extract_meta_description(&decoded),
                indexable: indexable_flag(&decoded, &headers),
                content_type,
                error: None,
                internal_links,
                external_links,
                content_hash: Some(fingerprint("HASH", &decoded, None)),
                duplicate_content: false,
                redirect_chain,
            }));
        } else {
            let is_css = parsed_mime
                .as_ref()
                .map(|m| m.type_() == mime::TEXT && m.subtype() == mime::CSS)
                .unwrap_or(false);
            if is_css {
                let assets = extract_css_urls(&decoded, &url);
                if !assets.is_empty() {
                    events.push(PageEvent::CssAssets(
                        assets.into_iter().map(|u| u.to_string()).collect(),
                    ));
                }
            }
            events.push(PageEvent::Resource(ResourceResult {
                url: url.to_string(),
                status,
                content_type,
                error: None,
            }));
        }

        Ok(events)
    }
}

fn looks_like_html(text: &str) -> bool {
    let head = &text[..text.len().min(512)];
    let lower = head.to_ascii_lowercase();
    lower.contains("<html") || lower.contains("<!doctype html")
}

fn extract_title(html: &str) -> String {
    let doc = Html::parse_document(html);
    let Ok(selector) = Selector::parse("title") else {
        return String::new();
    };
    doc.select(&selector)
        .next()
        .map(|e| e.text().collect::<Vec<_>>().join("").trim().to_string())
        .unwrap_or_default()
}

fn extract_meta_description(html: &str) -> String {
    let doc = Html::parse_document(html);
    let Ok(selector) = Selector::parse(r#"meta[name="description"]"#) else {
        return String::new();
    };
    doc.select(&selector)
        .next()
        .and_then(|e| e.value().attr("content"))
        .unwrap_or("")
        .to_string()
}

fn indexable_flag(html: &str, headers: &reqwest::header::HeaderMap) -> String {
    let header_noindex = headers
        .get("x-robots-tag")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_ascii_lowercase().contains("noindex"))
        .unwrap_or(false);
    if header_noindex {
        return "No".to_string();
    }

    let doc = Html::parse_document(html);
    let Ok(selector) = Selector::parse(r#"meta[name="robots"]"#) else {
        return "Yes".to_string();
    };
    let meta_noindex = doc
        .select(&selector)
        .next()
        .and_then(|e| e.value().attr("content"))
        .map(|c| c.to_ascii_lowercase().contains("noindex"))
        .unwrap_or(false);
    if meta_noindex {
        "No".to_string()
    } else {
        "Yes".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limiter::RateLimiter;

    fn test_collector(server_url: &str) -> Collector {
        let visited = Arc::new(VisitedStore::new());
        let rate_limiter = Arc::new(RateLimiter::empty());
        let backend = HttpBackend::new(
            "bluesnake-test",
            visited.cookie_jar(),
            std::time::Duration::from_secs(5),
        )
        .unwrap();
        let _ = server_url;
        Collector::new(
            backend,
            visited,
            rate_limiter,
            CollectorCallbacks::default(),
            CollectorOptions {
                default_headers: HashMap::new(),
                max_depth: 0,
                max_requests: 0,
                max_redirects: 10,
                max_body_size: 0,
                detect_charset: false,
                parse_http_error_response: false,
                check_head: false,
                trace_http: false,
            },
        )
    }

    #[tokio::test]
    async fn fetches_simple_html_page() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<html><head><title>Home</title></head><body><a href=\"/page1\">One</a></body></html>")
            .create_async()
            .await;

        let collector = test_collector(&server.url());
        let url = Url::parse(&server.url()).unwrap();
        let events = collector
            .fetch_url(url, Method::GET, 0, None, HashMap::new(), true)
            .await
            .unwrap();

        assert_eq!(events.len(), 1);
        match &events[0] {
            PageEvent::Page(p) => {
                assert_eq!(p.status, 200);
                assert_eq!(p.title, "Home");
                assert_eq!(p.internal_links.len(), 1);
            }
            PageEvent::Resource(_) => panic!("expected a page event"),
            PageEvent::CssAssets(_) => panic!("expected a page event, not css assets"),
        }
    }

    #[tokio::test]
    async fn revisit_is_rejected_by_default() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<html></html>")
            .expect(1)
            .create_async()
            .await;

        let collector = test_collector(&server.url());
        let url = Url::parse(&server.url()).unwrap();

        collector
            .fetch_url(url.clone(), Method::GET, 0, None, HashMap::new(), true)
            .await
            .unwrap();
        let second = collector
            .fetch_url(url, Method::GET, 0, None, HashMap::new(), true)
            .await;
        assert!(matches!(second, Err(Error::AlreadyVisited { .. })));
    }

    #[tokio::test]
    async fn redirect_chain_emits_one_page_per_hop() {
        let mut server = mockito::Server::new_async().await;
        let base = server.url();
        let _m1 = server
            .mock("GET", "/start")
            .with_status(301)
            .with_header("location", &format!("{base}/mid"))
            .create_async()
            .await;
        let _m2 = server
            .mock("GET", "/mid")
            .with_status(302)
            .with_header("location", &format!("{base}/final"))
            .create_async()
            .await;
        let _m3 = server
            .mock("GET", "/final")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<html><head><title>Final</title></head></html>")
            .create_async()
            .await;

        let collector = test_collector(&base);
        let url = Url::parse(&format!("{base}/start")).unwrap();
        let events = collector
            .fetch_url(url, Method::GET, 0, None, HashMap::new(), true)
            .await
            .unwrap();

        assert_eq!(events.len(), 3);
        let statuses: Vec<u16> = events
            .iter()
            .map(|e| match e {
                PageEvent::Page(p) => p.status,
                PageEvent::Resource(r) => r.status,
                PageEvent::CssAssets(_) => panic!("redirect chain should not yield css assets"),
            })
            .collect();
        assert_eq!(statuses, vec![301, 302, 200]);
    }

    #[tokio::test]
    async fn max_depth_zero_is_unlimited_but_nonzero_enforced() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<html></html>")
            .create_async()
            .await;

        let mut collector = test_collector(&server.url());
        collector.options.max_depth = 2;
        let url = Url::parse(&server.url()).unwrap();
        let result = collector
            .fetch_url(url, Method::GET, 3, None, HashMap::new(), true)
            .await;
        assert!(matches!(result, Err(Error::MaxDepth(_))));
    }
}
