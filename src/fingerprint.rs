//! Request fingerprinting — the identity key of the visited set.

use xxhash_rust::xxh3::Xxh3;
use std::hash::Hasher;

/// 64-bit hash of `method | absolute_url | optional_body_bytes`.
///
/// GET fingerprints omit the body; POST (and any other method carrying a
/// body) fold the body bytes in so that two POSTs to the same URL with
/// different payloads are tracked as distinct requests.
pub fn fingerprint(method: &str, url: &str, body: Option<&[u8]>) -> u64 {
    let mut hasher = Xxh3::new();
    hasher.write(method.as_bytes());
    hasher.write_u8(b'|');
    hasher.write(url.as_bytes());
    if let Some(body) = body {
        hasher.write_u8(b'|');
        hasher.write(body);
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_inputs_produce_same_fingerprint() {
        let a = fingerprint("GET", "https://example.com/", None);
        let b = fingerprint("GET", "https://example.com/", None);
        assert_eq!(a, b);
    }

    #[test]
    fn different_methods_produce_different_fingerprints() {
        let get = fingerprint("GET", "https://example.com/", None);
        let post = fingerprint("POST", "https://example.com/", None);
        assert_ne!(get, post);
    }

    #[test]
    fn different_bodies_produce_different_fingerprints() {
        let a = fingerprint("POST", "https://example.com/form", Some(b"a=1"));
        let b = fingerprint("POST", "https://example.com/form", Some(b"a=2"));
        assert_ne!(a, b);
    }

    #[test]
    fn body_presence_changes_fingerprint() {
        let without = fingerprint("POST", "https://example.com/form", None);
        let with = fingerprint("POST", "https://example.com/form", Some(b""));
        assert_ne!(without, with);
    }
}
