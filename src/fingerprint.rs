//! fingerprint.rs: stable article identity used as the dedup key.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 over the length-prefixed title followed by the url
/// (64 lowercase chars).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub const LEN: usize = 64;

    /// Wrap an already-computed hex digest (e.g. a value read back from the store).
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex chars, enough to tell records apart in logs.
    /// Values read back from storage are not validated, so stay on char boundaries.
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(12) {
            Some((end, _)) => &self.0[..end],
            None => &self.0,
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the fingerprint of an article. Total over any input, including empty strings.
pub fn fingerprint(title: &str, url: &str) -> Fingerprint {
    let mut hasher = Sha256::new();
    // Length prefix keeps ("ab", "c") and ("a", "bc") apart.
    hasher.update((title.len() as u64).to_le_bytes());
    hasher.update(title.as_bytes());
    hasher.update(url.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(Fingerprint::LEN);
    for b in digest.iter() {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    Fingerprint(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_prefix_never_splits_a_char() {
        let fp = fingerprint("Bitcoin", "https://news.test/1");
        assert_eq!(fp.short(), &fp.as_str()[..12]);

        let odd = Fingerprint::from_hex("ab€cdefghijklmnop");
        assert_eq!(odd.short(), "ab€cdefghijk");
        assert_eq!(Fingerprint::from_hex("a€").short(), "a€");
        assert_eq!(Fingerprint::from_hex("").short(), "");
    }

    #[test]
    fn same_input_same_fingerprint() {
        let a = fingerprint("Bitcoin hits new high", "https://example.test/a");
        let b = fingerprint("Bitcoin hits new high", "https://example.test/a");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), Fingerprint::LEN);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn near_duplicates_differ() {
        let base = fingerprint("Bitcoin hits new high", "https://example.test/a");
        let variants = [
            fingerprint("Bitcoin hits new high.", "https://example.test/a"),
            fingerprint("bitcoin hits new high", "https://example.test/a"),
            fingerprint("Bitcoin hits new high", "https://example.test/a/"),
            fingerprint("Bitcoin hits new high", "http://example.test/a"),
            fingerprint("Bitcoin hits new high ", "https://example.test/a"),
            fingerprint("Bitcoin hits new high h", "ttps://example.test/a"),
        ];
        for v in variants.iter() {
            assert_ne!(&base, v);
        }
    }

    #[test]
    fn empty_input_is_fine() {
        let fp = fingerprint("", "");
        assert_eq!(fp.as_str().len(), Fingerprint::LEN);
        assert_eq!(fp.short().len(), 12);
    }
}
