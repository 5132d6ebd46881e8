//! Postgres-backed content source.

mod util;

pub use util::map_sqlx_error;

use std::{num::NonZeroU32, time::Duration};

use async_trait::async_trait;
use sqlx::{
    migrate::Migrator,
    postgres::{PgPool, PgPoolOptions},
    query, query_scalar,
};
use tracing::debug;

use crate::application::repos::{ContentSource, RepoError};
use crate::domain::prerender::{ContentFilter, DistinctField, DistinctQuery};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// The post store: a `posts` table queried for prerender values.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(url: &str, max_connections: NonZeroU32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.get())
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(url)
            .await?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply pending schema migrations.
    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        MIGRATOR.run(&self.pool).await?;
        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// SQL answering a distinct query; every column is cast to text.
fn distinct_sql(query: &DistinctQuery) -> &'static str {
    match (query.field, query.filter) {
        (DistinctField::Tags, ContentFilter::All) => {
            "SELECT DISTINCT tag FROM posts, unnest(tags) AS tag ORDER BY tag"
        }
        (DistinctField::Tags, ContentFilter::VisibleOnly) => {
            "SELECT DISTINCT tag FROM posts, unnest(tags) AS tag WHERE visible ORDER BY tag"
        }
        (DistinctField::Timestamp, ContentFilter::All) => {
            "SELECT DISTINCT timestamp::TEXT FROM posts ORDER BY 1"
        }
        (DistinctField::Timestamp, ContentFilter::VisibleOnly) => {
            "SELECT DISTINCT timestamp::TEXT FROM posts WHERE visible ORDER BY 1"
        }
    }
}

#[async_trait]
impl ContentSource for PostgresStore {
    async fn distinct_values(&self, query: &DistinctQuery) -> Result<Vec<String>, RepoError> {
        let sql = distinct_sql(query);
        debug!(target = "vellum::db", ?query, "querying distinct values");
        query_scalar::<_, String>(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_sql_filters_visible_posts() {
        assert!(distinct_sql(&DistinctQuery::post_ids(true)).contains("WHERE visible"));
        assert!(!distinct_sql(&DistinctQuery::post_ids(false)).contains("WHERE"));
        assert!(distinct_sql(&DistinctQuery::tags()).contains("unnest(tags)"));
    }
}
