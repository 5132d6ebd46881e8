//! Cache key canonicalization.
//!
//! A request path becomes a single file name: one trailing slash is
//! stripped, remaining slashes become [`SEPARATOR`], and [`SENTINEL`] is
//! prepended so cache files never collide with anything else living in the
//! cache directory.

use std::fmt;

/// Prefix carried by every file the cache owns.
pub const SENTINEL: char = '@';
/// Replacement for `/` inside a key.
pub const SEPARATOR: char = '.';

// Path keys are either `@` or start with `@.`, so `@!` can never be produced
// by a request path.
const NOT_FOUND_KEY: &str = "@!404";

/// Canonical cache key; doubles as the on-disk file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Canonicalize a request path. Already-canonical keys are returned unchanged.
    pub fn from_path(path: &str) -> Self {
        if is_canonical(path) {
            return Self(path.to_string());
        }

        let trimmed = path.strip_suffix('/').unwrap_or(path);
        let mut key = String::with_capacity(trimmed.len() + 1);
        key.push(SENTINEL);
        // Relative paths are treated as rooted.
        if !trimmed.is_empty() && !trimmed.starts_with('/') {
            key.push(SEPARATOR);
        }
        key.extend(
            trimmed
                .chars()
                .map(|ch| if ch == '/' { SEPARATOR } else { ch }),
        );
        Self(key)
    }

    /// Reserved entry holding the rendered not-found page.
    pub fn not_found() -> Self {
        Self(NOT_FOUND_KEY.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `path` is the one spelling of its key a route is expected to
    /// accept: rooted, no trailing slash (except `/` itself), and no
    /// [`SEPARATOR`]. Other spellings are aliases that share the key.
    pub fn is_canonical_path(path: &str) -> bool {
        path.starts_with('/') && (path == "/" || !path.ends_with('/')) && !path.contains(SEPARATOR)
    }

    /// Whether a directory entry name belongs to the cache.
    pub fn is_cache_file(name: &str) -> bool {
        name.starts_with(SENTINEL)
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

// Only shapes a path can produce; reserved keys such as `@!404` are not.
fn is_canonical(value: &str) -> bool {
    let Some(rest) = value.strip_prefix(SENTINEL) else {
        return false;
    };
    (rest.is_empty() || rest.starts_with(SEPARATOR)) && !value.contains('/')
}
