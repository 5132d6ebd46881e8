//! In-memory content source used when no database is configured.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::application::repos::{ContentSource, RepoError};
use crate::domain::prerender::DistinctQuery;

/// Fixed answers keyed by query; unknown queries yield no values.
#[derive(Debug, Clone, Default)]
pub struct StaticContentSource {
    values: HashMap<DistinctQuery, Vec<String>>,
}

impl StaticContentSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values<I, S>(mut self, query: DistinctQuery, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values
            .insert(query, values.into_iter().map(Into::into).collect());
        self
    }
}

#[async_trait]
impl ContentSource for StaticContentSource {
    async fn distinct_values(&self, query: &DistinctQuery) -> Result<Vec<String>, RepoError> {
        Ok(self.values.get(query).cloned().unwrap_or_default())
    }
}
