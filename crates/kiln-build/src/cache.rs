//! Content-addressed cache keys.
//!
//! A layer's key is a pure function of the previous layer's key and the
//! step's declared inputs — nothing else. Two builds that feed the same
//! bytes through the same chain produce the same keys on any machine.

use std::fmt;
use std::path::Path;

use sha2::{Digest, Sha256};

/// A layer cache key: 64 lowercase hex characters of SHA-256.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for a step from its parent key, its step kind, and
    /// its input bytes. Inputs are length-prefixed so adjacent fields can
    /// never collide by concatenation.
    pub fn chain(parent: Option<&CacheKey>, kind: &str, inputs: &[&[u8]]) -> Self {
        let mut hasher = Sha256::new();
        match parent {
            Some(parent) => {
                hasher.update(b"parent:");
                hasher.update(parent.0.as_bytes());
            }
            None => hasher.update(b"root"),
        }
        hasher.update(b"|");
        hasher.update(kind.as_bytes());
        for input in inputs {
            hasher.update((input.len() as u64).to_le_bytes());
            hasher.update(input);
        }
        Self(hex::encode(hasher.finalize()))
    }

    /// Parse a recorded key, with or without the `sha256:` prefix.
    pub fn parse(input: &str) -> Option<Self> {
        // arch-lint: allow(no-silent-result-drop) reason="strip_prefix returns Option — a bare digest without the prefix is valid input"
        let digest = input.strip_prefix("sha256:").unwrap_or(input);
        let valid = digest.len() == 64
            && digest
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        valid.then(|| Self(digest.to_owned()))
    }

    /// The bare hex digest (used as the on-disk directory name).
    pub fn digest(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, for logs and progress lines.
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sha256:{}", self.0)
    }
}

/// Hash a file's contents without loading it whole.
pub fn hash_file(path: &Path) -> std::io::Result<[u8; 32]> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(parent: Option<&CacheKey>, kind: &str, inputs: &[&[u8]]) -> CacheKey {
        CacheKey::chain(parent, kind, inputs)
    }

    #[test]
    fn same_inputs_same_key() {
        let a = chain(None, "base", &[b"python:3.12-slim"]);
        let b = chain(None, "base", &[b"python:3.12-slim"]);
        assert_eq!(a, b);
    }

    #[test]
    fn any_input_change_changes_the_key() {
        let a = chain(None, "base", &[b"python:3.12-slim"]);
        let b = chain(None, "base", &[b"python:3.13-slim"]);
        assert_ne!(a, b);
    }

    #[test]
    fn parent_change_propagates() {
        let p1 = chain(None, "base", &[b"a"]);
        let p2 = chain(None, "base", &[b"b"]);
        assert_ne!(
            chain(Some(&p1), "tool", &[b"uv"]),
            chain(Some(&p2), "tool", &[b"uv"])
        );
    }

    #[test]
    fn kind_distinguishes_identical_inputs() {
        assert_ne!(chain(None, "tool", &[b"x"]), chain(None, "manifest", &[b"x"]));
    }

    #[test]
    fn length_prefixing_prevents_field_bleed() {
        // ("ab", "c") must not collide with ("a", "bc").
        assert_ne!(
            chain(None, "k", &[b"ab", b"c"]),
            chain(None, "k", &[b"a", b"bc"])
        );
    }

    #[test]
    fn display_and_parse_roundtrip() {
        let key = chain(None, "base", &[b"x"]);
        let parsed = CacheKey::parse(&key.to_string()).unwrap();
        assert_eq!(parsed, key);
        assert_eq!(CacheKey::parse(key.digest()).unwrap(), key);
    }

    #[test]
    fn parse_rejects_malformed_digests() {
        assert!(CacheKey::parse("sha256:short").is_none());
        assert!(CacheKey::parse(&"G".repeat(64)).is_none());
        assert!(CacheKey::parse(&"A".repeat(64)).is_none(), "uppercase hex");
    }

    #[test]
    fn hash_file_matches_content() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("f");
        std::fs::write(&path, b"hello").unwrap();
        let direct: [u8; 32] = Sha256::digest(b"hello").into();
        assert_eq!(hash_file(&path).unwrap(), direct);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn keys_are_stable_across_calls(
                kind in "[a-z]{1,10}",
                inputs in proptest::collection::vec(
                    proptest::collection::vec(any::<u8>(), 0..64),
                    0..5,
                ),
            ) {
                let refs: Vec<&[u8]> = inputs.iter().map(Vec::as_slice).collect();
                let a = CacheKey::chain(None, &kind, &refs);
                let b = CacheKey::chain(None, &kind, &refs);
                prop_assert_eq!(a, b);
            }

            #[test]
            fn digest_is_always_64_lowercase_hex(
                kind in "[a-z]{1,10}",
                input in proptest::collection::vec(any::<u8>(), 0..64),
            ) {
                let key = CacheKey::chain(None, &kind, &[&input]);
                prop_assert_eq!(key.digest().len(), 64);
                prop_assert!(CacheKey::parse(key.digest()).is_some());
            }
        }
    }
}
