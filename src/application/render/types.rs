use bytes::Bytes;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::{
    cache::CacheError,
    domain::{identity::Identity, routes::RouteMatch},
};

use super::templates::RenderError;

/// Result of serving one live request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    /// Bytes came straight from the page cache.
    Cached { mime: String, body: Bytes },
    /// Bytes were rendered for this request; `stored` is true when they were
    /// also written to the cache.
    Rendered {
        mime: String,
        body: Bytes,
        stored: bool,
    },
    /// No route accepts the path. `body` holds the cached not-found page
    /// when one was rendered during the last reload.
    NotFound { body: Option<Bytes> },
}

impl RenderOutcome {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn mime(&self) -> Option<&str> {
        match self {
            Self::Cached { mime, .. } | Self::Rendered { mime, .. } => Some(mime),
            Self::NotFound { .. } => None,
        }
    }

    pub fn body(&self) -> Option<&Bytes> {
        match self {
            Self::Cached { body, .. } | Self::Rendered { body, .. } => Some(body),
            Self::NotFound { body } => body.as_ref(),
        }
    }
}

/// Why a prerender request produced nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NotCacheable,
    Restricted,
    NoRoute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrerenderOutcome {
    Stored,
    Skipped(SkipReason),
}

#[derive(Debug, Error)]
pub enum PrerenderError {
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Store(#[from] CacheError),
}

/// Values handed to a template.
///
/// Route flags and the request path are always present. Route defaults come
/// next and captured params override them.
#[derive(Debug, Clone, Serialize)]
pub struct PageContext {
    pub path: String,
    pub page: String,
    pub mime: String,
    pub cache: bool,
    pub single: bool,
    pub restricted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<Identity>,
    #[serde(flatten)]
    pub values: Map<String, Value>,
}

impl PageContext {
    pub fn from_match(path: &str, matched: &RouteMatch<'_>, user: Option<&Identity>) -> Self {
        let route = matched.route();
        let mut values = Map::new();
        for (name, value) in route.defaults() {
            values.insert(name.clone(), value.clone());
        }
        for (name, value) in matched.params() {
            values.insert(name.to_string(), Value::String(value.to_string()));
        }

        Self {
            path: path.to_string(),
            page: route.page().to_string(),
            mime: route.mime().to_string(),
            cache: route.is_cacheable(),
            single: route.is_single(),
            restricted: route.is_restricted(),
            user: user.cloned(),
            values,
        }
    }

    /// Context for the site's not-found page, which has no route.
    pub fn not_found(page: &str) -> Self {
        Self {
            path: String::new(),
            page: page.to_string(),
            mime: crate::domain::routes::DEFAULT_MIME.to_string(),
            cache: true,
            single: false,
            restricted: false,
            user: None,
            values: Map::new(),
        }
    }
}
