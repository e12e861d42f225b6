//! Visited store: atomic test-and-set over request fingerprints, plus the
//! shared cookie jar.

use dashmap::DashSet;
use reqwest::cookie::Jar;
use std::sync::Arc;
use url::Url;

/// Mutex-free (lock-free) in-memory visited set, keyed by request fingerprint.
///
/// `DashSet::insert` returns `true` the first time a value is inserted and
/// `false` on every subsequent attempt, which is exactly the test-and-set
/// semantics `VisitIfNotVisited` needs: whichever caller's `insert` call
/// returns `true` is the sole winner, everyone else observes `already_visited`.
#[derive(Debug, Default)]
pub struct VisitedStore {
    seen: DashSet<u64>,
    cookie_jar: Arc<Jar>,
}

impl VisitedStore {
    pub fn new() -> Self {
        Self {
            seen: DashSet::new(),
            cookie_jar: Arc::new(Jar::default()),
        }
    }

    /// Read-only check; does not mutate the set.
    pub fn is_visited(&self, fp: u64) -> bool {
        self.seen.contains(&fp)
    }

    /// Atomic test-and-set. Returns `true` if this call is the one that marks
    /// `fp` visited, `false` if some other caller (or an earlier call) already
    /// claimed it.
    pub fn visit_if_not_visited(&self, fp: u64) -> bool {
        self.seen.insert(fp)
    }

    /// Shared cookie jar, applied to every request the backend issues.
    pub fn cookie_jar(&self) -> Arc<Jar> {
        self.cookie_jar.clone()
    }

    /// Seed the jar with a `Set-Cookie` header value observed for `url`.
    pub fn store_cookie(&self, url: &Url, set_cookie_header: &str) {
        self.cookie_jar
            .add_cookie_str(set_cookie_header, url);
    }
}
