//! Server API tests

use super::*;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use tower::ServiceExt;

use harmon_core::classify::{ClassifierClient, MockClassifier};
use harmon_core::duty::{DutyClient, MockDutyBackend};
use harmon_core::models::ProviderId;
use harmon_core::{AppConfig, MemoryStore, Orchestrator};

fn setup_test_app() -> Router {
    let store = Arc::new(MemoryStore::new());
    let orchestrator = Orchestrator::new(
        ClassifierClient::Mock(
            MockClassifier::new(ProviderId::Reasoning)
                .with_code("64039910")
                .with_confidence(0.9),
        ),
        ClassifierClient::Mock(
            MockClassifier::new(ProviderId::Structured)
                .with_code("64039990")
                .with_confidence(0.85),
        ),
        DutyClient::Mock(MockDutyBackend::new()),
        store.clone(),
        AppConfig::default(),
    );
    create_router(Arc::new(AppState {
        orchestrator,
        store,
    }))
}

async fn get_body_json(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body();
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn compare_request_body() -> Body {
    Body::from(
        serde_json::json!({
            "product_name": "leather boots",
            "origin_country": "CN",
            "destination_country": "DE",
            "product_value": 250.0
        })
        .to_string(),
    )
}

async fn run_comparison(app: &Router) -> serde_json::Value {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/comparisons")
                .header("content-type", "application/json")
                .body(compare_request_body())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    get_body_json(response).await
}

#[tokio::test]
async fn test_health() {
    let app = setup_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["reasoning"]["healthy"], true);
}

#[tokio::test]
async fn test_create_comparison() {
    let app = setup_test_app();
    let json = run_comparison(&app).await;

    assert_eq!(json["classifications"]["reasoning"]["code"], "64039910");
    assert_eq!(json["classifications"]["structured"]["code"], "64039990");
    // Family match at differing full precision
    assert_eq!(json["analysis"]["matches"][0]["exact"], false);
    assert_eq!(json["analysis"]["matches"][0]["family"], true);
    assert!(json["duties"]["reasoning"]["total_landed_cost"].as_f64().unwrap() > 250.0);
    assert!(json["analysis"]["notes"].as_str().unwrap().contains("6-digit family"));
}

#[tokio::test]
async fn test_create_comparison_rejects_empty_request() {
    let app = setup_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/comparisons")
                .header("content-type", "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = get_body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("required"));
}

#[tokio::test]
async fn test_get_comparison_by_id() {
    let app = setup_test_app();
    let created = run_comparison(&app).await;
    let id = created["id"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/comparisons/{}", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["id"], created["id"]);

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/comparisons/{}", uuid::Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_comparisons() {
    let app = setup_test_app();
    run_comparison(&app).await;
    run_comparison(&app).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/comparisons")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json.as_array().unwrap().len(), 2);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/comparisons?limit=1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_comparison_stats() {
    let app = setup_test_app();
    run_comparison(&app).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/comparisons/stats")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["total_comparisons"], 1);
    // The structured provider is the reference: it takes the exact-match
    // bonus against itself (3.85) while reasoning only family-matches (2.9).
    assert_eq!(json["wins"]["structured"], 1);
}
