use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};

use crate::{
    application::{error::HttpError, reload::Reloader},
    infra::db::PostgresStore,
};

use super::middleware::{log_responses, set_request_context};

#[derive(Clone)]
pub struct AdminState {
    pub reloader: Arc<Reloader>,
    pub db: Option<Arc<PostgresStore>>,
}

pub fn build_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/reload", post(reload))
        .route("/_health", get(health))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn reload(State(state): State<AdminState>) -> Response {
    match state.reloader.reload().await {
        Ok(report) => Json(report).into_response(),
        Err(err) => HttpError::from(err).into_response(),
    }
}

/// 204 while the backing store (if any) answers; 503 otherwise.
async fn health(State(state): State<AdminState>) -> Response {
    let Some(db) = state.db.as_ref() else {
        return StatusCode::NO_CONTENT.into_response();
    };

    match db.health_check().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => HttpError::from_error(
            "infra::http::admin::health",
            StatusCode::SERVICE_UNAVAILABLE,
            "Database unavailable",
            &err,
        )
        .into_response(),
    }
}
