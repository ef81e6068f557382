use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use formbody::{Cors, CorsConfig};
use http::header::{
    HeaderName, HeaderValue, ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE, VARY,
};
use http::Response;

mod common;
use common::TestRequest;

fn counting_handler(
    counter: Arc<AtomicUsize>,
) -> impl FnOnce(TestRequest) -> std::future::Ready<formbody::Result<Response<Bytes>>> {
    move |_req| {
        counter.fetch_add(1, Ordering::SeqCst);
        let response = Response::builder()
            .status(200)
            .header("x-handler", "yes")
            .body(Bytes::from_static(b"hello"))
            .unwrap();
        std::future::ready(Ok(response))
    }
}

#[tokio::test]
async fn test_rejected_origin_passes_through_unmodified() {
    let cors = Cors::new().allow_origin(|origin| origin == "http://b.test");
    let counter = Arc::new(AtomicUsize::new(0));

    let req = TestRequest::new("GET").with_header("Origin", "http://a.test");
    let response = cors.handle(req, counting_handler(counter.clone())).await.unwrap();

    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    assert_eq!(response.headers().get("x-handler").unwrap(), "yes");
}

#[tokio::test]
async fn test_missing_origin_passes_through_unmodified() {
    let cors = Cors::new();
    let counter = Arc::new(AtomicUsize::new(0));

    let req = TestRequest::new("GET");
    let response = cors.handle(req, counting_handler(counter.clone())).await.unwrap();

    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
}

#[tokio::test]
async fn test_preflight_short_circuits() {
    let cors = Cors::new();
    let counter = Arc::new(AtomicUsize::new(0));

    let req = TestRequest::new("OPTIONS").with_header("Origin", "http://a.test");
    let response = cors.handle(req, counting_handler(counter.clone())).await.unwrap();

    // The downstream handler is never invoked for preflights.
    assert_eq!(counter.load(Ordering::SeqCst), 0);
    assert_eq!(response.status(), 200);
    assert!(response.body().is_empty());
    assert_eq!(
        response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://a.test"
    );
    assert_eq!(response.headers().get(ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(), "true");
    assert_eq!(response.headers().get(ACCESS_CONTROL_MAX_AGE).unwrap(), "86400");
    assert_eq!(
        response.headers().get(ACCESS_CONTROL_ALLOW_METHODS).unwrap(),
        "GET, POST, PUT, PATCH, DELETE, OPTIONS, HEAD"
    );
}

#[tokio::test]
async fn test_preflight_method_is_case_insensitive() {
    let cors = Cors::new();
    let counter = Arc::new(AtomicUsize::new(0));

    let req = TestRequest::new("options").with_header("Origin", "http://a.test");
    let response = cors.handle(req, counting_handler(counter.clone())).await.unwrap();

    assert_eq!(counter.load(Ordering::SeqCst), 0);
    assert!(response.body().is_empty());
}

#[tokio::test]
async fn test_echoed_origin_on_simple_request() {
    let cors = Cors::new();
    let counter = Arc::new(AtomicUsize::new(0));

    let req = TestRequest::new("GET").with_header("Origin", "http://a.test");
    let response = cors.handle(req, counting_handler(counter.clone())).await.unwrap();

    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert_eq!(
        response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://a.test"
    );
    // Echoing the origin back does not add Vary; only a fixed value does.
    assert!(response.headers().get(VARY).is_none());
    assert_eq!(&response.body()[..], &b"hello"[..]);
    assert_eq!(response.headers().get("x-handler").unwrap(), "yes");
}

#[tokio::test]
async fn test_fixed_allow_origin_adds_vary() {
    let cors = Cors::new().header(
        ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("https://fixed.test"),
    );
    let counter = Arc::new(AtomicUsize::new(0));

    let req = TestRequest::new("GET").with_header("Origin", "http://a.test");
    let response = cors.handle(req, counting_handler(counter.clone())).await.unwrap();

    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert_eq!(
        response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "https://fixed.test"
    );
    assert_eq!(response.headers().get(VARY).unwrap(), "Origin");
    assert_eq!(&response.body()[..], &b"hello"[..]);
    assert_eq!(response.headers().get("x-handler").unwrap(), "yes");
}

#[tokio::test]
async fn test_handler_headers_win_over_defaults() {
    let cors = Cors::new();

    let req = TestRequest::new("GET").with_header("Origin", "http://a.test");
    let response = cors
        .handle(req, |_req| {
            std::future::ready(Ok(Response::builder()
                .status(200)
                .header(ACCESS_CONTROL_ALLOW_METHODS, "GET")
                .body(Bytes::new())
                .unwrap()))
        })
        .await
        .unwrap();

    // The downstream's explicit choice is not overridden by the default.
    assert_eq!(response.headers().get(ACCESS_CONTROL_ALLOW_METHODS).unwrap(), "GET");
    // The allow-origin decision is applied regardless.
    assert_eq!(
        response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://a.test"
    );
}

#[tokio::test]
async fn test_added_header_overrides_default() {
    let cors = Cors::new().header(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST"),
    );
    let counter = Arc::new(AtomicUsize::new(0));

    let req = TestRequest::new("OPTIONS").with_header("Origin", "http://a.test");
    let response = cors.handle(req, counting_handler(counter.clone())).await.unwrap();

    assert_eq!(response.headers().get(ACCESS_CONTROL_ALLOW_METHODS).unwrap(), "GET, POST");
}

#[tokio::test]
async fn test_extra_added_header_reaches_response() {
    let extra = HeaderName::from_static("x-request-tag");
    let cors = Cors::new().header(extra.clone(), HeaderValue::from_static("form"));
    let counter = Arc::new(AtomicUsize::new(0));

    let req = TestRequest::new("GET").with_header("Origin", "http://a.test");
    let response = cors.handle(req, counting_handler(counter.clone())).await.unwrap();

    assert_eq!(response.headers().get(extra).unwrap(), "form");
}

#[tokio::test]
async fn test_credentials_disabled_by_config() {
    let config = CorsConfig {
        allow_credentials: false,
        ..CorsConfig::default()
    };
    let cors = Cors::with_config(config);
    let counter = Arc::new(AtomicUsize::new(0));

    let req = TestRequest::new("OPTIONS").with_header("Origin", "http://a.test");
    let response = cors.handle(req, counting_handler(counter.clone())).await.unwrap();

    assert!(response.headers().get(ACCESS_CONTROL_ALLOW_CREDENTIALS).is_none());
}
