//! Rendered page cache.
//!
//! Pages are stored one file per canonical path in a flat directory. There
//! is no eviction or expiry; reload clears the directory wholesale.

mod keys;
mod store;

pub use keys::{CacheKey, SENTINEL, SEPARATOR};
pub use store::{CacheError, PageCache};
