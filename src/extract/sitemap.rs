//! Sitemap fetching and recursive parsing of `<urlset>` / `<sitemapindex>`.

use reqwest::Client;
use serde::Deserialize;
use std::collections::{HashSet, VecDeque};
use url::Url;

/// Hard cap on the number of sitemap documents fetched in one discovery
/// pass, guarding against a cyclic or adversarial sitemap index.
const MAX_SITEMAPS: usize = 256;

#[derive(Debug, Default, Deserialize)]
#[serde(rename = "urlset")]
struct UrlSet {
    #[serde(rename = "url", default)]
    urls: Vec<UrlEntry>,
}

#[derive(Debug, Deserialize)]
struct UrlEntry {
    loc: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename = "sitemapindex")]
struct SitemapIndex {
    #[serde(rename = "sitemap", default)]
    sitemaps: Vec<SitemapEntry>,
}

#[derive(Debug, Deserialize)]
struct SitemapEntry {
    loc: String,
}

/// Fetch `start_url` and, if it's a sitemap index, recursively fetch every
/// nested sitemap, returning the flattened list of `<loc>` URLs from every
/// `<urlset>` encountered. Iterative (not recursive) to sidestep both stack
/// depth and `Future` self-recursion lifetime issues.
pub async fn fetch_sitemap_urls(client: &Client, start_url: &str) -> Vec<String> {
    let mut queue = VecDeque::from([start_url.to_string()]);
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    while let Some(url) = queue.pop_front() {
        if !seen.insert(url.clone()) || seen.len() > MAX_SITEMAPS {
            continue;
        }

        let body = match client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => match resp.text().await {
                Ok(body) => body,
                Err(e) => {
                    log::warn!("failed to read sitemap body for {url}: {e}");
                    continue;
                }
            },
            Ok(resp) => {
                log::warn!("sitemap fetch for {url} returned {}", resp.status());
                continue;
            }
            Err(e) => {
                log::warn!("failed to fetch sitemap {url}: {e}");
                continue;
            }
        };

        if let Ok(urlset) = quick_xml::de::from_str::<UrlSet>(&body) {
            if !urlset.urls.is_empty() {
                out.extend(urlset.urls.into_iter().map(|e| e.loc));
                continue;
            }
        }

        match quick_xml::de::from_str::<SitemapIndex>(&body) {
            Ok(index) if !index.sitemaps.is_empty() => {
                for entry in index.sitemaps {
                    queue.push_back(entry.loc);
                }
            }
            _ => log::warn!("sitemap at {url} parsed as neither urlset nor sitemapindex"),
        }
    }

    out
}

/// Scan a robots.txt body for `Sitemap:` directives (case-insensitive key).
pub fn sitemap_directives(robots_body: &str) -> Vec<String> {
    robots_body
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let (key, value) = line.split_once(':')?;
            if key.trim().eq_ignore_ascii_case("sitemap") {
                Some(value.trim().to_string())
            } else {
                None
            }
        })
        .collect()
}

/// Default `/sitemap.xml` location for a site, used when no explicit
/// `SitemapURLs` are configured and robots.txt declares none.
pub fn default_sitemap_url(site: &Url) -> String {
    format!("{}://{}/sitemap.xml", site.scheme(), crate::robots::authority(site))
}
