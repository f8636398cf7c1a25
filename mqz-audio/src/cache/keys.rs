//! Cache key and static asset path resolution
//!
//! Pure functions: the same inputs always give the same key, and nothing here
//! touches the filesystem or network.

use mqz_common::config::AssetLocation;
use std::fmt;
use std::path::PathBuf;

/// Canonical identifier of one speakable resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Wrap an already-resolved key string.
    pub fn from_raw(key: &str) -> Self {
        CacheKey(key.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Key derived from language and literal text: `"{lang}:{text}"`
pub fn text_key(text: &str, lang: &str) -> CacheKey {
    CacheKey(format!("{}:{}", lang, text))
}

/// Resolve the cache key for a request.
///
/// A non-empty static id is used verbatim; otherwise the key is text-derived.
pub fn resolve_key(text: &str, lang: &str, static_id: Option<&str>) -> CacheKey {
    match static_id {
        Some(id) if !id.is_empty() => CacheKey(id.to_string()),
        _ => text_key(text, lang),
    }
}

/// Where one packaged asset lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetPath {
    File(PathBuf),
    Url(String),
}

impl fmt::Display for AssetPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetPath::File(path) => write!(f, "{}", path.display()),
            AssetPath::Url(url) => f.write_str(url),
        }
    }
}

/// `<asset-root>/<static_id>`
pub fn static_asset_path(root: &AssetLocation, static_id: &str) -> AssetPath {
    match root {
        AssetLocation::Directory(dir) => AssetPath::File(dir.join(static_id)),
        AssetLocation::Url(base) => AssetPath::Url(format!("{}/{}", base, static_id)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_id_used_verbatim() {
        let key = resolve_key("three times four equals ?", "ar-SA", Some("math_mul_3_4.mp3"));
        assert_eq!(key.as_str(), "math_mul_3_4.mp3");
    }

    #[test]
    fn test_text_key_without_static_id() {
        assert_eq!(resolve_key("hello", "ar-SA", None).as_str(), "ar-SA:hello");
        assert_eq!(resolve_key("hello", "ar-SA", Some("")).as_str(), "ar-SA:hello");
    }

    #[test]
    fn test_language_distinguishes_keys() {
        assert_ne!(
            resolve_key("Bravo", "en-US", None),
            resolve_key("Bravo", "ar-SA", None)
        );
    }

    #[test]
    fn test_static_asset_path() {
        let dir = AssetLocation::Directory(PathBuf::from("/srv/audio"));
        assert_eq!(
            static_asset_path(&dir, "math_mul_3_4.mp3"),
            AssetPath::File(PathBuf::from("/srv/audio/math_mul_3_4.mp3"))
        );

        let url = AssetLocation::Url("https://cdn.example.org/audio".to_string());
        assert_eq!(
            static_asset_path(&url, "intro_generic.mp3").to_string(),
            "https://cdn.example.org/audio/intro_generic.mp3"
        );
    }
}
