//! Cache key derivation and request paths

use std::fmt;
use url::form_urlencoded;
use xxhash_rust::xxh3::xxh3_128;

/// Segment used when a key and its composite parts are all empty
pub const NO_KEY_SENTINEL: &str = "no-key-defined";

const FRAGMENT_SEPARATOR: &str = "_";

/// Address of one cache entry: collection id, optional primary key and
/// ordered composite fragments
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    collection: String,
    key: Option<String>,
    composite: Vec<String>,
}

/// Last path segment of an entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySegment {
    Sentinel,
    Hashed(String),
}

impl KeySegment {
    pub fn as_str(&self) -> &str {
        match self {
            KeySegment::Sentinel => NO_KEY_SENTINEL,
            KeySegment::Hashed(hash) => hash.as_str(),
        }
    }
}

impl CacheKey {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            key: None,
            composite: Vec::new(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Append composite fragments, in order
    pub fn with_composite<I, S>(mut self, parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.composite.extend(parts.into_iter().map(Into::into));
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn composite(&self) -> &[String] {
        &self.composite
    }

    /// Key and composite fragments joined before hashing.
    ///
    /// `42` with `["v2", "eu"]` gives `42_v2_eu`; without fragments the key
    /// stands alone. A missing key counts as empty.
    pub fn raw(&self) -> String {
        let mut raw = self.key.clone().unwrap_or_default();
        if !self.composite.is_empty() {
            raw.push_str(FRAGMENT_SEPARATOR);
            raw.push_str(&self.composite.join(FRAGMENT_SEPARATOR));
        }
        raw
    }

    pub fn segment(&self) -> KeySegment {
        let raw = self.raw();
        if raw.is_empty() {
            KeySegment::Sentinel
        } else {
            KeySegment::Hashed(hash_key(&raw))
        }
    }

    /// `/{prefix}{collection}/{segment}`, used for reads and writes
    pub fn entry_path(&self, prefix: &str) -> String {
        format!(
            "{}/{}",
            self.collection_path(prefix),
            self.segment().as_str()
        )
    }

    /// Delete target. The sentinel segment is omitted, so a key-less delete
    /// addresses the collection rather than the sentinel entry.
    pub fn delete_path(&self, prefix: &str) -> String {
        match self.segment() {
            KeySegment::Sentinel => self.collection_path(prefix),
            KeySegment::Hashed(hash) => format!("{}/{}", self.collection_path(prefix), hash),
        }
    }

    fn collection_path(&self, prefix: &str) -> String {
        format!("/{}{}", prefix, url_encode(&self.collection))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.collection, self.raw())
    }
}

/// 128-bit xxh3 digest as 32 lowercase hex characters, URL-encoded
pub fn hash_key(raw: &str) -> String {
    url_encode(&format!("{:032x}", xxh3_128(raw.as_bytes())))
}

fn url_encode(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_concatenation() {
        assert_eq!(CacheKey::new("users").with_key("42").raw(), "42");
        assert_eq!(
            CacheKey::new("users")
                .with_key("42")
                .with_composite(["v2", "eu"])
                .raw(),
            "42_v2_eu"
        );
        assert_eq!(CacheKey::new("users").with_composite(["v2"]).raw(), "_v2");
    }

    #[test]
    fn test_sentinel() {
        assert_eq!(CacheKey::new("users").segment(), KeySegment::Sentinel);
        assert_eq!(
            CacheKey::new("users").with_key("").segment(),
            KeySegment::Sentinel
        );
        assert_eq!(
            CacheKey::new("users").entry_path("rest/"),
            "/rest/users/no-key-defined"
        );
    }

    #[test]
    fn test_hash_is_stable() {
        let a = CacheKey::new("users").with_key("42").with_composite(["v2"]);
        let b = CacheKey::new("other").with_key("42").with_composite(["v2"]);

        let KeySegment::Hashed(hash) = a.segment() else {
            panic!("expected hashed segment");
        };
        assert_eq!(hash.len(), 32);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(hash, "ffa6d1782dd40b07e0efc82cd503c6a0");
        assert_eq!(hash_key("42_v2"), hash);
        assert_eq!(a.segment(), b.segment());
    }

    #[test]
    fn test_distinct_inputs() {
        let base = CacheKey::new("users").with_key("42");
        assert_ne!(base.segment(), base.clone().with_composite(["v2"]).segment());
        assert_ne!(
            CacheKey::new("users").with_key("1").segment(),
            CacheKey::new("users").with_key("2").segment()
        );
    }

    #[test]
    fn test_paths() {
        let key = CacheKey::new("user profiles").with_key("42");
        let hash = hash_key("42");

        assert_eq!(key.entry_path("rest/"), format!("/rest/user+profiles/{hash}"));
        assert_eq!(key.delete_path("rest/"), format!("/rest/user+profiles/{hash}"));
        assert_eq!(CacheKey::new("users").delete_path("rest/"), "/rest/users");
    }
}
