//! End-to-end submissions against a mock CRPT endpoint.

use std::time::Duration;

use crpt_client::{ClientError, Config, CrptClient, Document, TimeUnit};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CREATE_PATH: &str = "/api/v3/lk/documents/create";

fn config_for(server: &MockServer, request_limit: usize) -> Config {
    Config {
        api_url: format!("{}{}", server.uri(), CREATE_PATH),
        request_limit,
        time_unit: TimeUnit::Minutes,
        request_timeout_secs: 5,
        ..Config::default()
    }
}

#[tokio::test]
async fn test_posts_signed_json_document() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CREATE_PATH))
        .and(header("Signature", "sig-123"))
        .and(header("Content-Type", "application/json;charset=UTF-8"))
        .and(body_partial_json(json!({
            "doc_type": "LP_INTRODUCE_GOODS",
            "importRequest": true,
            "reg_date": "2020-01-23",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"value\":\"ok\"}"))
        .expect(1)
        .mount(&server)
        .await;

    let client = CrptClient::new(&config_for(&server, 5)).unwrap();
    let submission = client
        .create_document(&Document::placeholder(), "sig-123")
        .await
        .unwrap();

    assert_eq!(submission.status, 200);
    assert!(submission.is_success());
    assert_eq!(submission.body, "{\"value\":\"ok\"}");
}

#[tokio::test]
async fn test_error_status_is_reported_not_raised() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let client = CrptClient::new(&config_for(&server, 5)).unwrap();
    let submission = client
        .create_document(&Document::placeholder(), "bad-signature")
        .await
        .unwrap();

    assert_eq!(submission.status, 401);
    assert!(!submission.is_success());
}

#[tokio::test]
async fn test_exhausted_limit_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let client = CrptClient::new(&config_for(&server, 2)).unwrap();
    let document = Document::placeholder();
    for _ in 0..2 {
        client.create_document(&document, "sig").await.unwrap();
    }

    let err = client
        .create_document_within(&document, "sig", Duration::from_millis(100))
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert!(matches!(err, ClientError::Limiter(_)));
    assert_eq!(client.limiter().in_window(), 2);
}

#[tokio::test]
async fn test_connection_failure_is_not_a_limiter_error() {
    let config = Config {
        api_url: "http://127.0.0.1:1/api/v3/lk/documents/create".to_string(),
        request_timeout_secs: 2,
        ..Config::default()
    };

    let client = CrptClient::new(&config).unwrap();
    let err = client
        .create_document(&Document::placeholder(), "sig")
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Request(_)));
    assert!(!err.is_cancelled());
    // The slot was still spent: the request left the client.
    assert_eq!(client.limiter().in_window(), 1);
}
