//! On-disk GET cache: `CacheDir`/`CacheExpiration` from spec §6.1.
//!
//! Keyed by the GET fingerprint (method+url, no body), each entry is two
//! sibling files under `cache_dir`: `<key>.meta.json` (status + content-type,
//! via `serde_json`) and `<key>.body` (raw response bytes). A miss is
//! anything absent, unreadable, or older than `ttl`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

#[derive(Debug, Clone)]
pub enum CachePolicy {
    Disabled,
    Enabled { dir: PathBuf, ttl: Duration },
}

impl CachePolicy {
    pub fn new(dir: Option<PathBuf>, ttl: Duration) -> Self {
        match dir {
            Some(dir) => CachePolicy::Enabled { dir, ttl },
            None => CachePolicy::Disabled,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheMeta {
    status: u16,
    content_type: String,
}

fn paths(dir: &Path, key: u64) -> (PathBuf, PathBuf) {
    (dir.join(format!("{key:016x}.meta.json")), dir.join(format!("{key:016x}.body")))
}

pub struct CachedResponse {
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
}

/// Reads a cache entry for `key`, returning `None` on any miss: absent,
/// corrupt, or expired relative to `ttl`.
pub fn read(policy: &CachePolicy, key: u64) -> Option<CachedResponse> {
    let CachePolicy::Enabled { dir, ttl } = policy else {
        return None;
    };
    let (meta_path, body_path) = paths(dir, key);

    let metadata = std::fs::metadata(&meta_path).ok()?;
    let modified = metadata.modified().ok()?;
    if SystemTime::now().duration_since(modified).unwrap_or(Duration::MAX) > *ttl {
        return None;
    }

    let meta_raw = std::fs::read(&meta_path).ok()?;
    let meta: CacheMeta = serde_json::from_slice(&meta_raw).ok()?;
    let body = std::fs::read(&body_path).ok()?;

    Some(CachedResponse {
        status: meta.status,
        content_type: meta.content_type,
        body,
    })
}

/// Best-effort write-through; cache write failures never fail the fetch
/// itself (the caller already has a perfectly good response to return).
pub fn write(policy: &CachePolicy, key: u64, status: u16, content_type: &str, body: &[u8]) {
    let CachePolicy::Enabled { dir, .. } = policy else {
        return;
    };
    if std::fs::create_dir_all(dir).is_err() {
        return;
    }
    let (meta_path, body_path) = paths(dir, key);
    let meta = CacheMeta {
        status,
        content_type: content_type.to_string(),
    };
    let Ok(meta_json) = serde_json::to_vec(&meta) else {
        return;
    };
    if std::fs::write(&meta_path, meta_json).is_err() {
        log::warn!("failed to write cache metadata for key {key:016x}");
        return;
    }
    if std::fs::write(&body_path, body).is_err() {
        log::warn!("failed to write cache body for key {key:016x}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_policy_never_hits() {
        let policy = CachePolicy::Disabled;
        write(&policy, 1, 200, "text/html", b"hello");
        assert!(read(&policy, 1).is_none());
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let policy = CachePolicy::new(Some(dir.path().to_path_buf()), Duration::from_secs(60));
        write(&policy, 42, 200, "text/plain", b"cached body");

        let hit = read(&policy, 42).unwrap();
        assert_eq!(hit.status, 200);
        assert_eq!(hit.content_type, "text/plain");
        assert_eq!(hit.body, b"cached body");
    }

    #[test]
    fn expired_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let policy = CachePolicy::new(Some(dir.path().to_path_buf()), Duration::from_millis(1));
        write(&policy, 7, 200, "text/plain", b"stale");
        std::thread::sleep(Duration::from_millis(20));
        assert!(read(&policy, 7).is_none());
    }

    #[test]
    fn missing_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let policy = CachePolicy::new(Some(dir.path().to_path_buf()), Duration::from_secs(60));
        assert!(read(&policy, 999).is_none());
    }
}
