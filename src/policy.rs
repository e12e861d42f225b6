//! Crawler-side policy enforcement: domain/url filters and robots.txt,
//! evaluated before a URL is ever handed to the collector.

use crate::config::CrawlerConfig;
use crate::error::Error;
use crate::robots::{RobotsCache, RobotsTxtMode};
use url::Url;

/// `isURLCrawlable` per spec §4.7: domains, then URL filters, then robots.txt.
pub async fn is_url_crawlable(
    config: &CrawlerConfig,
    robots: &RobotsCache,
    url: &Url,
) -> Result<(), Error> {
    let host = url
        .host_str()
        .ok_or_else(|| Error::InvalidUrl(url.to_string()))?;

    if config.disallowed_domains.iter().any(|d| d == host) {
        return Err(Error::ForbiddenDomain(host.to_string()));
    }
    if !config.allowed_domains.is_empty() && !config.allowed_domains.iter().any(|d| d == host) {
        return Err(Error::ForbiddenDomain(host.to_string()));
    }
    if config
        .disallowed_url_filters
        .iter()
        .any(|r| r.is_match(url.as_str()))
    {
        return Err(Error::ForbiddenUrl(url.to_string()));
    }
    if !config.url_filters.is_empty()
        && !config.url_filters.iter().any(|r| r.is_match(url.as_str()))
    {
        return Err(Error::NoUrlFiltersMatch(url.to_string()));
    }

    if config.robots_txt_mode != RobotsTxtMode::Ignore {
        let robots_authority = crate::robots::authority(url);
        let allowed = robots
            .is_allowed(
                url.scheme(),
                &robots_authority,
                url.path(),
                &config.user_agent,
                config.robots_txt_mode,
            )
            .await?;
        if !allowed {
            return Err(Error::RobotsTxtBlocked(url.to_string()));
        }
    }

    Ok(())
}

/// A link's `rel` attribute is nofollow when it contains any of
/// `nofollow | sponsored | ugc`, per spec §4.7.
pub fn is_nofollow_rel(rel: &str) -> bool {
    rel.split_ascii_whitespace()
        .any(|tok| matches!(tok.to_ascii_lowercase().as_str(), "nofollow" | "sponsored" | "ugc"))
}

/// Whether a classified link should be suppressed from enqueueing, given the
/// follow-nofollow config flags. Links are still recorded in the page's link
/// list regardless of this result.
pub fn should_enqueue_nofollow(
    config: &CrawlerConfig,
    nofollow: bool,
    internal: bool,
) -> bool {
    if !nofollow {
        return true;
    }
    if internal {
        config.follow_internal_nofollow
    } else {
        config.follow_external_nofollow
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_nofollow_token() {
        assert!(is_nofollow_rel("nofollow"));
        assert!(is_nofollow_rel("external nofollow noopener"));
        assert!(is_nofollow_rel("UGC"));
        assert!(!is_nofollow_rel("noopener"));
        assert!(!is_nofollow_rel(""));
    }

    #[test]
    fn nofollow_suppressed_by_default() {
        let config = CrawlerConfig::builder()
            .start_url("https://example.com")
            .build()
            .unwrap();
        assert!(!should_enqueue_nofollow(&config, true, true));
        assert!(!should_enqueue_nofollow(&config, true, false));
        assert!(should_enqueue_nofollow(&config, false, true));
    }

    #[test]
    fn follow_internal_nofollow_overrides() {
        let config = CrawlerConfig::builder()
            .start_url("https://example.com")
            .follow_internal_nofollow(true)
            .build()
            .unwrap();
        assert!(should_enqueue_nofollow(&config, true, true));
        assert!(!should_enqueue_nofollow(&config, true, false));
    }
}
