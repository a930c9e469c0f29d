//! Cache key type.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of an image request: the full URL string.
///
/// Keys are compared byte for byte. No normalization is applied, so
/// `https://x/A.jpg` and `https://x/a.jpg` are different keys, as are
/// URLs that differ only by a trailing slash or query order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UrlKey(String);

impl UrlKey {
    /// Creates a key from a URL string.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    /// Returns the URL string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the key, returning the URL string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for UrlKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for UrlKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UrlKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for UrlKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&UrlKey> for UrlKey {
    fn from(key: &UrlKey) -> Self {
        key.clone()
    }
}

impl From<reqwest::Url> for UrlKey {
    fn from(url: reqwest::Url) -> Self {
        Self(url.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_key_is_case_sensitive() {
        let lower = UrlKey::from("https://x/a.jpg");
        let upper = UrlKey::from("https://x/A.jpg");
        assert_ne!(lower, upper);
    }

    #[test]
    fn test_key_is_not_normalized() {
        let plain = UrlKey::from("https://x/1.jpg");
        let slash = UrlKey::from("https://x/1.jpg/");
        assert_ne!(plain, slash);
        assert_eq!(slash.as_str(), "https://x/1.jpg/");
    }

    #[test]
    fn test_key_serializes_as_plain_string() {
        let key = UrlKey::from("https://x/1.jpg");
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"https://x/1.jpg\"");
    }

    #[test]
    fn test_into_string_returns_original_url() {
        let key = UrlKey::from(String::from("https://x/Avatar.PNG?size=64"));
        assert_eq!(key.into_string(), "https://x/Avatar.PNG?size=64");
    }

    proptest! {
        #[test]
        fn key_preserves_input(url in ".*") {
            let key = UrlKey::new(url.clone());
            prop_assert_eq!(key.as_str(), url.as_str());
            prop_assert_eq!(key.to_string(), url);
        }
    }
}
