mod common;

use std::sync::Arc;

use axum::{
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use common::*;
use image_webhook::{
    fetcher::{mock::MockImageFetcher, HttpImageFetcher},
    media_storage::mock::MockObjectStore,
    serving_url::{mock::MockServingUrlGenerator, ImageServingClient},
};
use serde_json::{json, Value};

const SOURCE_URL: &str = "https://crm.example.com/ViewImage?fileId=/2024/logo.png";

// Happy path tests

#[tokio::test]
async fn test_upload_happy_path_form_body() {
    let setup = TestSetup::new(
        MockImageFetcher::responding(200, tiny_gif()),
        MockObjectStore::new(TEST_BUCKET),
    );

    let form = format!("url={}", "https%3A%2F%2Fcrm.example.com%2FViewImage%3FfileId%3D%2F2024%2Flogo.png");
    let response = setup
        .send_form_request("/upload", &form)
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::OK);

    let body = parse_response_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["urls"]["original"], SOURCE_URL);
    assert_eq!(
        body["location"],
        format!("/gs/{TEST_BUCKET}/2024/logo.png")
    );
    assert!(body["key"].as_str().unwrap().starts_with("encoded_gs_file:"));
    assert!(body["urls"]["resize_url"]
        .as_str()
        .unwrap()
        .starts_with("https://serving.test/"));
    assert!(body.get("degraded").is_none());

    let objects = setup.store.objects();
    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0].filename, "2024/logo.png");
    assert_eq!(objects[0].bytes, tiny_gif());
}

#[tokio::test]
async fn test_upload_happy_path_json_body() {
    let setup = TestSetup::new(
        MockImageFetcher::responding(200, tiny_gif()),
        MockObjectStore::new(TEST_BUCKET),
    );

    let response = setup
        .send_post_request("/upload", json!({ "url": SOURCE_URL }))
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::OK);

    let body = parse_response_body(response).await;
    let keys: Vec<&str> = body
        .as_object()
        .unwrap()
        .keys()
        .map(String::as_str)
        .collect();
    assert_eq!(keys.len(), 4, "unexpected keys: {keys:?}");
    for key in ["key", "success", "urls", "location"] {
        assert!(keys.contains(&key), "missing {key}");
    }
}

#[tokio::test]
async fn test_upload_url_in_query_string() {
    let setup = TestSetup::new(
        MockImageFetcher::responding(200, tiny_gif()),
        MockObjectStore::new(TEST_BUCKET),
    );

    let response = setup
        .send_form_request("/upload?url=https%3A%2F%2Fexample.com%2Fcat.gif", "")
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        setup.store.objects()[0].filename,
        "https://example.com/cat.gif"
    );
}

// Upstream failure tests

#[tokio::test]
async fn test_upload_upstream_404_is_forwarded() {
    let setup = TestSetup::new(
        MockImageFetcher::responding(404, b"Not Found".to_vec()),
        MockObjectStore::new(TEST_BUCKET),
    );

    let response = setup
        .send_post_request("/upload", json!({ "url": SOURCE_URL }))
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = parse_response_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], 404);
    assert_eq!(body["request_url"], SOURCE_URL);
    assert!(body["message"].is_string());

    assert!(setup.store.objects().is_empty());
}

#[tokio::test]
async fn test_upload_upstream_500_is_forwarded() {
    let setup = TestSetup::new(
        MockImageFetcher::responding(503, Vec::new()),
        MockObjectStore::new(TEST_BUCKET),
    );

    let response = setup
        .send_post_request("/upload", json!({ "url": SOURCE_URL }))
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = parse_response_body(response).await;
    assert_eq!(body["error"], 503);
    assert!(setup.store.objects().is_empty());
}

#[tokio::test]
async fn test_upload_network_failure() {
    let setup = TestSetup::new(
        MockImageFetcher::failing("connection refused"),
        MockObjectStore::new(TEST_BUCKET),
    );

    let response = setup
        .send_post_request("/upload", json!({ "url": "https://nowhere.invalid/a.png" }))
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = parse_response_body(response).await;
    assert_eq!(
        body,
        json!({
            "success": false,
            "error": 400,
            "message": "The passed image url was invalid.",
            "url": "https://nowhere.invalid/a.png"
        })
    );
}

// Storage and serving failure tests

#[tokio::test]
async fn test_upload_storage_failure() {
    let setup = TestSetup::new(
        MockImageFetcher::responding(200, tiny_gif()),
        MockObjectStore::failing(TEST_BUCKET, "retry budget exhausted"),
    );

    let response = setup
        .send_post_request("/upload", json!({ "url": SOURCE_URL }))
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = parse_response_body(response).await;
    assert_eq!(
        body,
        json!({
            "success": false,
            "error": 400,
            "message": "Upstream service error: retry budget exhausted"
        })
    );
}

#[tokio::test]
async fn test_upload_serving_failure_is_degraded() {
    let setup = TestSetup::with_collaborators(
        Arc::new(MockImageFetcher::responding(200, tiny_gif())),
        MockObjectStore::new(TEST_BUCKET),
        Arc::new(MockServingUrlGenerator::failing("images backend unavailable")),
    );

    let response = setup
        .send_post_request("/upload", json!({ "url": SOURCE_URL }))
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::OK);

    let body = parse_response_body(response).await;
    assert_eq!(body["key"], "error: Generic");
    assert_eq!(body["success"], true);
    assert_eq!(body["degraded"], true);
    assert_eq!(body["urls"]["resize_url"], "images backend unavailable");
    assert_eq!(setup.store.objects().len(), 1);
}

// Malformed request tests

#[tokio::test]
async fn test_upload_missing_url() {
    let setup = TestSetup::new(
        MockImageFetcher::responding(200, tiny_gif()),
        MockObjectStore::new(TEST_BUCKET),
    );

    let response = setup
        .send_post_request("/upload", json!({}))
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = parse_response_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], 400);
    assert!(body.get("url").is_none());
    assert!(setup.store.objects().is_empty());
}

#[tokio::test]
async fn test_upload_invalid_json() {
    let setup = TestSetup::new(
        MockImageFetcher::responding(200, tiny_gif()),
        MockObjectStore::new(TEST_BUCKET),
    );

    let response = setup
        .send_post_request("/upload", json!({ "url": 12345 }))
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = parse_response_body(response).await;
    assert_eq!(body["success"], false);
}

// Service endpoints

#[tokio::test]
async fn test_health() {
    let setup = TestSetup::new(
        MockImageFetcher::responding(200, Vec::new()),
        MockObjectStore::new(TEST_BUCKET),
    );

    let response = setup
        .send_get_request("/health")
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_response_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["environment"], "development");
    assert_eq!(body["semver"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_openapi_lists_upload_route() {
    let setup = TestSetup::new(
        MockImageFetcher::responding(200, Vec::new()),
        MockObjectStore::new(TEST_BUCKET),
    );

    let response = setup
        .send_get_request("/openapi.json")
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_response_body(response).await;
    assert!(body["paths"]["/upload"]["post"].is_object());
}

// End-to-end with real HTTP clients against local servers

async fn register(Json(payload): Json<Value>) -> Json<Value> {
    let key = payload["blob_key"].as_str().unwrap_or_default();
    Json(json!({ "serving_url": format!("https://lh3.example.com/{key}") }))
}

#[tokio::test]
async fn test_upload_end_to_end_with_http_clients() {
    let image_host = spawn_server(
        Router::new()
            .route("/files=/banner.gif", get(|| async { tiny_gif() }))
            .route("/gone", get(|| async { StatusCode::GONE })),
    )
    .await;
    let serving_host =
        spawn_server(Router::new().route("/v1/serving-urls", post(register))).await;

    let setup = TestSetup::with_collaborators(
        Arc::new(HttpImageFetcher::new().unwrap()),
        MockObjectStore::new(TEST_BUCKET),
        Arc::new(ImageServingClient::new(&format!("http://{serving_host}")).unwrap()),
    );

    let source = format!("http://{image_host}/files=/banner.gif");
    let response = setup
        .send_post_request("/upload", json!({ "url": source }))
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_response_body(response).await;
    assert_eq!(body["location"], format!("/gs/{TEST_BUCKET}/banner.gif"));
    let key = body["key"].as_str().unwrap();
    assert_eq!(
        body["urls"]["resize_url"],
        format!("https://lh3.example.com/{key}")
    );
    assert_eq!(setup.store.objects()[0].bytes, tiny_gif());

    let gone = format!("http://{image_host}/gone");
    let response = setup
        .send_post_request("/upload", json!({ "url": gone }))
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::GONE);
    assert_eq!(setup.store.objects().len(), 1);
}

#[tokio::test]
async fn test_upload_end_to_end_connection_refused() {
    let closed = closed_port().await;

    let setup = TestSetup::with_collaborators(
        Arc::new(HttpImageFetcher::new().unwrap()),
        MockObjectStore::new(TEST_BUCKET),
        Arc::new(MockServingUrlGenerator::new()),
    );

    let source = format!("http://{closed}/photo.png");
    let response = setup
        .send_post_request("/upload", json!({ "url": source }))
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = parse_response_body(response).await;
    assert_eq!(body["message"], "The passed image url was invalid.");
    assert_eq!(body["url"], source);
}
