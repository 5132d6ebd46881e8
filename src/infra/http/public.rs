use axum::{
    Router,
    body::Body,
    extract::State,
    http::{
        HeaderValue, Method, Request, StatusCode,
        header::{ALLOW, CONTENT_TYPE},
    },
    middleware,
    response::{IntoResponse, Response},
};
use bytes::Bytes;

use crate::{
    application::{
        error::{ErrorReport, HttpError},
        render::{RenderOutcome, RenderPipeline},
    },
    domain::{identity::Identity, routes::DEFAULT_MIME},
};

use super::middleware::{log_responses, set_request_context};

#[derive(Clone)]
pub struct HttpState {
    pub pipeline: RenderPipeline,
}

/// Every path is handed to the render pipeline; the route table decides.
pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .fallback(render_page)
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn render_page(State(state): State<HttpState>, request: Request<Body>) -> Response {
    if request.method() != Method::GET {
        let mut response = HttpError::new(
            "infra::http::public::render_page",
            StatusCode::METHOD_NOT_ALLOWED,
            "Method not allowed",
            format!("`{}` is not served", request.method()),
        )
        .into_response();
        response
            .headers_mut()
            .insert(ALLOW, HeaderValue::from_static("GET"));
        return response;
    }

    let path = request.uri().path().to_string();
    let identity = request.extensions().get::<Identity>().cloned();

    match state.pipeline.handle(&path, identity.as_ref()).await {
        Ok(RenderOutcome::Cached { mime, body }) | Ok(RenderOutcome::Rendered { mime, body, .. }) => {
            content_response(StatusCode::OK, &mime, body)
        }
        Ok(RenderOutcome::NotFound { body: Some(body) }) => {
            let mut response = content_response(StatusCode::NOT_FOUND, DEFAULT_MIME, body);
            ErrorReport::from_message(
                "infra::http::public::render_page",
                StatusCode::NOT_FOUND,
                format!("no route for `{path}`"),
            )
            .attach(&mut response);
            response
        }
        Ok(RenderOutcome::NotFound { body: None }) => HttpError::new(
            "infra::http::public::render_page",
            StatusCode::NOT_FOUND,
            "Not found",
            format!("no route for `{path}`"),
        )
        .into_response(),
        Err(err) => HttpError::from(err).into_response(),
    }
}

fn content_response(status: StatusCode, mime: &str, body: Bytes) -> Response {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, format!("{mime}; charset=utf-8"))
        .body(Body::from(body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
