//! Single-request HTTP execution: the thing the Collector's manual redirect
//! loop calls once per hop.

use crate::error::Error;
use crate::http::cache::{self, CachePolicy};
use bytes::Bytes;
use reqwest::cookie::Jar;
use reqwest::{Client, Method};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// Wall-clock timing for one request, captured when `TraceHTTP` is enabled.
///
/// `reqwest`'s public API does not expose TCP-connect timing separately from
/// the rest of the request, so `first_byte` measures time from request
/// dispatch to response-headers-received (an approximation of
/// connect+time-to-first-byte combined), and `total` covers the full body read.
#[derive(Debug, Clone, Copy)]
pub struct RequestTiming {
    pub first_byte: Duration,
    pub total: Duration,
}

/// The outcome of exactly one HTTP request (no redirect following).
pub struct FetchOutcome {
    pub status: u16,
    pub headers: reqwest::header::HeaderMap,
    pub body: Bytes,
    pub truncated: bool,
    pub from_cache: bool,
    pub timing: Option<RequestTiming>,
}

/// Thin wrapper around a `reqwest::Client` configured to never auto-follow
/// redirects — the Collector owns redirect semantics so it can surface every
/// hop to callbacks with its real status code (spec §4.6 step 7).
pub struct HttpBackend {
    client: Client,
    cache: CachePolicy,
}

impl HttpBackend {
    pub fn new(user_agent: &str, cookie_jar: Arc<Jar>, timeout: Duration) -> Result<Self, Error> {
        Self::with_cache(user_agent, cookie_jar, timeout, CachePolicy::Disabled)
    }

    pub fn with_cache(
        user_agent: &str,
        cookie_jar: Arc<Jar>,
        timeout: Duration,
        cache: CachePolicy,
    ) -> Result<Self, Error> {
        let client = Client::builder()
            .user_agent(user_agent)
            .cookie_provider(cookie_jar)
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()
            .map_err(Error::from)?;
        Ok(Self { client, cache })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Perform one request. `max_body_size == 0` means unlimited. GET
    /// requests consult the on-disk cache first (spec §4.1 "optional
    /// cache") and, on a miss, write the response back to it.
    pub async fn send(
        &self,
        method: Method,
        url: &Url,
        headers: &HashMap<String, String>,
        body: Option<Vec<u8>>,
        max_body_size: usize,
        trace: bool,
    ) -> Result<FetchOutcome, Error> {
        let cache_key = (method == Method::GET)
            .then(|| crate::fingerprint::fingerprint(method.as_str(), url.as_str(), None));

        if let Some(key) = cache_key {
            if let Some(cached) = cache::read(&self.cache, key) {
                log::debug!("cache hit for {url}");
                let mut resp_headers = reqwest::header::HeaderMap::new();
                if let Ok(value) = cached.content_type.parse() {
                    resp_headers.insert(reqwest::header::CONTENT_TYPE, value);
                }
                return Ok(FetchOutcome {
                    status: cached.status,
                    headers: resp_headers,
                    body: Bytes::from(cached.body),
                    truncated: false,
                    from_cache: true,
                    timing: None,
                });
            }
        }

        let mut req = self.client.request(method, url.clone());
        for (name, value) in headers {
            req = req.header(name, value);
        }
        if let Some(bytes) = body {
            req = req.body(bytes);
        }

        let start = Instant::now();
        let resp = req.send().await?;
        let first_byte = start.elapsed();
        let status = resp.status().as_u16();
        let headers = resp.headers().clone();
        let raw = resp.bytes().await?;
        let total = start.elapsed();

        let (body, truncated) = if max_body_size > 0 && raw.len() > max_body_size {
            (raw.slice(0..max_body_size), true)
        } else {
            (raw, false)
        };

        if let Some(key) = cache_key {
            if !truncated {
                let content_type = headers
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("");
                cache::write(&self.cache, key, status, content_type, &body);
            }
        }

        Ok(FetchOutcome {
            status,
            headers,
            body,
            truncated,
            from_cache: false,
            timing: trace.then_some(RequestTiming { first_byte, total }),
        })
    }

    /// HEAD request used for `CheckHead`; failure means the caller should
    /// abandon the fetch entirely.
    pub async fn head(&self, url: &Url) -> Result<u16, Error> {
        let resp = self.client.head(url.clone()).send().await?;
        Ok(resp.status().as_u16())
    }
}

/// Decode a response body to UTF-8, sniffing the charset from the
/// `Content-Type` header (and falling back to a `<meta charset>`-style
/// scan of the first few KB for text/html bodies without one) when
/// `DetectCharset` is enabled. Non-text-like bodies are returned unchanged
/// via a lossy UTF-8 conversion.
pub fn decode_body(body: &[u8], content_type: Option<&str>, detect_charset: bool) -> String {
    if !detect_charset {
        return String::from_utf8_lossy(body).into_owned();
    }

    let label_from_header = content_type.and_then(|ct| {
        ct.split(';')
            .find_map(|part| part.trim().strip_prefix("charset="))
            .map(|s| s.trim_matches('"').to_string())
    });

    let label = label_from_header.or_else(|| sniff_meta_charset(body));

    let encoding = label
        .and_then(|l| encoding_rs::Encoding::for_label(l.as_bytes()))
        .unwrap_or(encoding_rs::UTF_8);

    let (decoded, _, _) = encoding.decode(body);
    decoded.into_owned()
}

fn sniff_meta_charset(body: &[u8]) -> Option<String> {
    let head = &body[..body.len().min(2048)];
    let text = String::from_utf8_lossy(head);
    let lower = text.to_ascii_lowercase();
    let idx = lower.find("charset=")?;
    let rest = &text[idx + "charset=".len()..];
    let value: String = rest
        .trim_start_matches(['"', '\''])
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_respects_header_charset() {
        let (encoded, _, _) = encoding_rs::WINDOWS_1252.encode("caf\u{e9}");
        let decoded = decode_body(&encoded, Some("text/html; charset=windows-1252"), true);
        assert_eq!(decoded, "café");
    }

    #[test]
    fn decode_defaults_to_utf8_without_detection() {
        let decoded = decode_body("hello".as_bytes(), None, false);
        assert_eq!(decoded, "hello");
    }

    #[test]
    fn sniffs_meta_charset_when_header_absent() {
        let html = b"<html><head><meta charset=\"iso-8859-1\"></head></html>";
        let decoded = decode_body(html, None, true);
        assert!(decoded.contains("meta charset"));
    }
}
