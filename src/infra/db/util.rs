use crate::application::repos::RepoError;

/// SQLSTATE `query_canceled`, raised for statement timeouts and cancellations.
const QUERY_CANCELED: &str = "57014";

pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::PoolTimedOut => RepoError::Timeout,
        sqlx::Error::Database(db) if db.code().as_deref() == Some(QUERY_CANCELED) => {
            RepoError::Timeout
        }
        other => RepoError::from_persistence(other),
    }
}
