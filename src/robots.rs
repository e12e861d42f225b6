//! Per-host robots.txt cache: lazy-loaded, memoized, and coalesced across
//! concurrent callers.

use crate::error::Error;
use dashmap::DashMap;
use reqwest::Client;
use robotstxt::DefaultMatcher;
use std::sync::Arc;
use tokio::sync::OnceCell;
use url::Url;

/// The authority a robots.txt fetch and its cache entry are keyed on:
/// `host` for a default-port origin, `host:port` otherwise. Using the bare
/// host for a non-default-port origin would fetch (and cache) the wrong
/// origin's robots.txt entirely.
pub(crate) fn authority(url: &Url) -> String {
    match url.port() {
        Some(port) => format!("{}:{}", url.host_str().unwrap_or_default(), port),
        None => url.host_str().unwrap_or_default().to_string(),
    }
}

/// How strictly robots.txt directives are enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RobotsTxtMode {
    #[default]
    Respect,
    Ignore,
    /// Evaluate the directive, log a warning on disallow, but still permit the fetch.
    IgnoreReport,
}

/// Body of a host's robots.txt, or `None` when the host has none (404).
type Fetch = OnceCell<Result<Option<String>, String>>;

/// Fetches and parses `robots.txt` per host, via the collector's own HTTP
/// client, and reuses the parsed body for every subsequent query against
/// that host. Concurrent first-queries for the same host share a single
/// in-flight fetch through `OnceCell::get_or_init`.
pub struct RobotsCache {
    client: Client,
    cache: DashMap<String, Arc<Fetch>>,
}

impl RobotsCache {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            cache: DashMap::new(),
        }
    }

    /// Raw robots.txt body for `authority` (`host` or `host:port` — see
    /// [`authority`]), if any. Exposed so sitemap discovery can read
    /// `Sitemap:` directives from the same cached fetch.
    pub(crate) async fn body_for_host(&self, scheme: &str, authority: &str) -> Result<Option<String>, String> {
        let cell = self
            .cache
            .entry(authority.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        cell.get_or_init(|| async {
            let url = format!("{scheme}://{authority}/robots.txt");
            match self.client.get(&url).send().await {
                Ok(resp) if resp.status().as_u16() == 404 => Ok(None),
                Ok(resp) if resp.status().is_success() => resp
                    .text()
                    .await
                    .map(Some)
                    .map_err(|e| e.to_string()),
                // Any other non-connection-error status is treated permissively;
                // only a transport failure is fatal under Respect mode.
                Ok(_) => Ok(None),
                Err(e) => Err(e.to_string()),
            }
        })
        .await
        .clone()
    }

    /// `IsAllowed(authority, path, user_agent)` per spec §4.3. `authority` is
    /// `host` or `host:port` (see [`authority`]) — it must match what the
    /// request will actually be sent to, or a non-default-port origin's
    /// robots.txt fetch silently targets the wrong origin.
    pub async fn is_allowed(
        &self,
        scheme: &str,
        authority: &str,
        path: &str,
        user_agent: &str,
        mode: RobotsTxtMode,
    ) -> Result<bool, Error> {
        if mode == RobotsTxtMode::Ignore {
            return Ok(true);
        }

        match self.body_for_host(scheme, authority).await {
            Ok(None) => Ok(true),
            Ok(Some(body)) => {
                let url = format!("{scheme}://{authority}{path}");
                let allowed =
                    DefaultMatcher::default().one_agent_allowed_by_robots(&body, user_agent, &url);
                if !allowed && mode == RobotsTxtMode::IgnoreReport {
                    log::warn!("robots.txt disallows {url} but RobotsTxtMode=ignore-report, allowing");
                    return Ok(true);
                }
                Ok(allowed)
            }
            Err(e) => match mode {
                RobotsTxtMode::Respect => {
                    Err(Error::RobotsTxtFetchFailed(authority.to_string(), e))
                }
                _ => Ok(true),
            },
        }
    }
}
