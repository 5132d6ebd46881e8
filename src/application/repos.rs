//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::prerender::DistinctQuery;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Backing store consulted while expanding prerender specs.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Distinct values of the query's field under its filter, as strings.
    async fn distinct_values(&self, query: &DistinctQuery) -> Result<Vec<String>, RepoError>;
}
