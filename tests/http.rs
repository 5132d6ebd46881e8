mod common;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{
        Method, Request, StatusCode,
        header::{ALLOW, CONTENT_TYPE},
    },
    response::Response,
};
use common::{Fixture, POST_ID};
use tower::ServiceExt;
use vellum::{
    domain::identity::Identity,
    infra::http::{AdminState, HttpState, build_admin_router, build_router},
};

fn public_router(fixture: &Fixture) -> Router {
    build_router(HttpState {
        pipeline: fixture.pipeline().clone(),
    })
}

fn admin_router(fixture: &Fixture) -> Router {
    build_admin_router(AdminState {
        reloader: fixture.reloader.clone(),
        db: None,
    })
}

async fn send(router: Router, request: Request<Body>) -> Response {
    router
        .oneshot(request)
        .await
        .expect("router should respond")
}

fn request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request should build")
}

async fn body_string(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should collect");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

fn content_type(response: &Response) -> &str {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

#[tokio::test]
async fn serves_rendered_pages_with_route_mime() {
    let fixture = Fixture::blog().await;

    let response = send(public_router(&fixture), request(Method::GET, "/page/1")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(content_type(&response), "text/html; charset=utf-8");
    assert_eq!(
        body_string(response).await,
        "<html>index=1 tag= post= single=false</html>"
    );

    let response = send(public_router(&fixture), request(Method::GET, "/rss/")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(content_type(&response), "text/xml; charset=utf-8");
    assert_eq!(
        body_string(response).await,
        "<rss><channel>text/xml</channel></rss>"
    );
}

#[tokio::test]
async fn serves_prerendered_pages_from_cache() {
    let fixture = Fixture::blog().await;
    fixture.reloader.reload().await.unwrap();
    fixture
        .cache()
        .write(&format!("/raw/{POST_ID}"), b"served from disk")
        .await
        .unwrap();

    let uri = format!("/raw/{POST_ID}");
    let response = send(public_router(&fixture), request(Method::GET, &uri)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "served from disk");
}

#[tokio::test]
async fn unknown_path_without_not_found_page_is_plain_404() {
    let fixture = Fixture::blog().await;

    let response = send(public_router(&fixture), request(Method::GET, "/nonexistent")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_string(response).await, "Not found");
}

#[tokio::test]
async fn unknown_path_serves_rendered_not_found_page() {
    let fixture = Fixture::blog().await;
    fixture.reloader.reload().await.unwrap();

    let response = send(public_router(&fixture), request(Method::GET, "/nonexistent")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(content_type(&response), "text/html; charset=utf-8");
    assert_eq!(body_string(response).await, "nothing here");
}

#[tokio::test]
async fn non_get_methods_are_rejected() {
    let fixture = Fixture::blog().await;

    let response = send(public_router(&fixture), request(Method::POST, "/")).await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(
        response.headers().get(ALLOW).and_then(|v| v.to_str().ok()),
        Some("GET")
    );
    assert!(fixture.cache().entries().await.unwrap().is_empty());
}

#[tokio::test]
async fn identity_extension_reaches_the_admin_shell() {
    let fixture = Fixture::blog().await;

    let mut req = request(Method::GET, "/admin/");
    req.extensions_mut().insert(Identity::new("u-3"));
    let response = send(public_router(&fixture), req).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "admin u-3");
}

#[tokio::test]
async fn render_failure_is_a_500() {
    let fixture = Fixture::blog().await;
    fixture.write_template("rss.xml", "{% include 'gone.xml' %}");
    fixture.pipeline().templates().compile_all().await.unwrap();

    let response = send(public_router(&fixture), request(Method::GET, "/rss")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(fixture.cache().read("/rss").await.unwrap().is_none());
}

#[tokio::test]
async fn admin_reload_returns_the_report() {
    let fixture = Fixture::blog().await;

    let response = send(admin_router(&fixture), request(Method::POST, "/reload")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let report: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(report["stored"], 13);
    assert_eq!(report["paths"], 13);
    assert!(fixture.cache().read("/").await.unwrap().is_some());
}

#[tokio::test]
async fn admin_reload_reports_compile_failure() {
    let fixture = Fixture::blog().await;
    fixture.write_template("layout.html", "{% block body %}");

    let response = send(admin_router(&fixture), request(Method::POST, "/reload")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_string(response).await, "Reload failed");
}

#[tokio::test]
async fn admin_health_without_database_is_no_content() {
    let fixture = Fixture::blog().await;

    let response = send(admin_router(&fixture), request(Method::GET, "/_health")).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(admin_router(&fixture), request(Method::GET, "/reload")).await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn request_id_is_echoed_or_minted() {
    let fixture = Fixture::blog().await;

    let mut req = request(Method::GET, "/");
    req.headers_mut()
        .insert("x-request-id", "trace-42".parse().unwrap());
    let response = send(public_router(&fixture), req).await;
    assert_eq!(
        response
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok()),
        Some("trace-42")
    );

    let response = send(public_router(&fixture), request(Method::GET, "/")).await;
    let minted = response
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert_eq!(minted.len(), 36, "expected a uuid, got {minted:?}");
}
