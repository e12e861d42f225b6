//! Per-domain-glob rate limiting: parallelism tokens plus fixed/random delay.

use rand::Rng;
use regex::Regex;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use std::sync::Arc;
use url::Url;

/// One configured rule: `domain_glob="*"` is the catch-all. Rules are matched
/// in configuration order, first match wins.
#[derive(Debug, Clone)]
pub struct RateLimitRule {
    pub domain_glob: String,
    pub parallelism: usize,
    pub delay: Duration,
    pub random_delay: Duration,
}

impl RateLimitRule {
    pub fn new(domain_glob: impl Into<String>, parallelism: usize) -> Self {
        Self {
            domain_glob: domain_glob.into(),
            parallelism,
            delay: Duration::ZERO,
            random_delay: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    #[must_use]
    pub fn with_random_delay(mut self, random_delay: Duration) -> Self {
        self.random_delay = random_delay;
        self
    }
}

/// Convert a `*`-glob into an anchored regex, the same compilation the
/// reference codebase's config builder performs for excluded-path patterns.
pub(crate) fn compile_glob(pattern: &str) -> Result<Regex, regex::Error> {
    let escaped = regex::escape(pattern).replace(r"\*", ".*");
    Regex::new(&format!("^{escaped}$"))
}

struct CompiledRule {
    matcher: Regex,
    semaphore: Arc<Semaphore>,
    delay: Duration,
    random_delay: Duration,
}

/// A permit held for the duration of one in-flight request. Dropping it
/// releases the domain-glob's parallelism token.
pub struct RateLimitGuard {
    _permit: OwnedSemaphorePermit,
}

/// Matches request hosts against configured glob rules and enforces the
/// resulting parallelism cap and delay. Missing rules mean unlimited
/// parallelism for that host.
pub struct RateLimiter {
    rules: Vec<CompiledRule>,
}

impl RateLimiter {
    pub fn new(rules: &[RateLimitRule]) -> Result<Self, regex::Error> {
        let compiled = rules
            .iter()
            .map(|r| {
                Ok(CompiledRule {
                    matcher: compile_glob(&r.domain_glob)?,
                    semaphore: Arc::new(Semaphore::new(r.parallelism.max(1))),
                    delay: r.delay,
                    random_delay: r.random_delay,
                })
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;
        Ok(Self { rules: compiled })
    }

    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    fn matching_rule(&self, host: &str) -> Option<&CompiledRule> {
        self.rules.iter().find(|r| r.matcher.is_match(host))
    }

    /// Acquire a token for `url`'s host, sleeping `delay + uniform(0, random_delay)`
    /// first. Returns `None` when no rule matches (unlimited parallelism).
    pub async fn acquire(&self, url: &Url) -> Option<RateLimitGuard> {
        let host = url.host_str()?;
        let rule = self.matching_rule(host)?;

        let jitter = if rule.random_delay.is_zero() {
            Duration::ZERO
        } else {
            let millis = rand::rng().random_range(0..=rule.random_delay.as_millis() as u64);
            Duration::from_millis(millis)
        };
        let sleep_for = rule.delay + jitter;
        if !sleep_for.is_zero() {
            tokio::time::sleep(sleep_for).await;
        }

        let permit = rule
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("semaphore never closed");
        Some(RateLimitGuard { _permit: permit })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_star_matches_anything() {
        let re = compile_glob("*").unwrap();
        assert!(re.is_match("example.com"));
        assert!(re.is_match("sub.example.com"));
    }

    #[test]
    fn glob_suffix_matches_subdomains_only() {
        let re = compile_glob("*.example.com").unwrap();
        assert!(re.is_match("cdn.example.com"));
        assert!(!re.is_match("example.com"));
    }

    #[tokio::test]
    async fn no_rule_means_unlimited() {
        let limiter = RateLimiter::empty();
        let url = Url::parse("https://example.com/").unwrap();
        assert!(limiter.acquire(&url).await.is_none());
    }

    #[tokio::test]
    async fn first_matching_rule_wins() {
        let rules = vec![
            RateLimitRule::new("*.example.com", 1),
            RateLimitRule::new("*", 5),
        ];
        let limiter = RateLimiter::new(&rules).unwrap();
        let url = Url::parse("https://cdn.example.com/").unwrap();
        let guard = limiter.acquire(&url).await;
        assert!(guard.is_some());
    }

    #[tokio::test]
    async fn parallelism_cap_serializes_excess_acquires() {
        let rules = vec![RateLimitRule::new("*", 1)];
        let limiter = Arc::new(RateLimiter::new(&rules).unwrap());
        let url = Url::parse("https://example.com/").unwrap();

        let first = limiter.acquire(&url).await.unwrap();
        let limiter2 = limiter.clone();
        let url2 = url.clone();
        let handle = tokio::spawn(async move { limiter2.acquire(&url2).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished());

        drop(first);
        let second = handle.await.unwrap();
        assert!(second.is_some());
    }
}
