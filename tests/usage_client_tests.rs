use reqwest::StatusCode;
use serde_json::json;
use smtp2go_usage::client::{UsageClient, API_KEY_HEADER, PRIMARY_ACCOUNT_ID};
use smtp2go_usage::error::AppError;
use smtp2go_usage::period::ReportingPeriod;
use smtp2go_usage::retry::RetryPolicy;
use std::time::Duration;
use wiremock::{
    matchers::{body_partial_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
    }
}

fn client(server: &MockServer, max_attempts: u32) -> UsageClient {
    UsageClient::new(
        server.uri(),
        "api-test-key-1234",
        Duration::from_secs(5),
        fast_retry(max_attempts),
    )
    .unwrap()
}

fn march() -> ReportingPeriod {
    ReportingPeriod::month(2024, 3).unwrap()
}

fn history_body() -> serde_json::Value {
    json!({
        "request_id": "abc",
        "data": {
            "history": [
                { "subaccount_id": "sub1", "sent": 100, "delivered": 95, "bounces": 5 },
                { "subaccount_id": "sub2", "sent": 50, "delivered": 50 }
            ]
        }
    })
}

#[tokio::test]
async fn test_retries_transient_failures_then_succeeds() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/stats/email_history"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/stats/email_history"))
        .respond_with(ResponseTemplate::new(200).set_body_json(history_body()))
        .mount(&server)
        .await;

    let ids = vec!["sub1".to_string(), "sub2".to_string()];
    let usage = client(&server, 4)
        .fetch_usage(&march(), Some(&ids))
        .await
        .unwrap();

    assert_eq!(usage.len(), 2);
    assert!(usage.contains_key("sub1"));
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);
}

#[tokio::test]
async fn test_exhausted_retries_are_transient_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/stats/email_history"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let ids = vec!["sub1".to_string()];
    let err = client(&server, 3)
        .fetch_usage(&march(), Some(&ids))
        .await
        .unwrap_err();

    match err {
        AppError::TransientApi { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("Expected TransientApi, got {:?}", other),
    }
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_unauthorized_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "data": { "error": "Invalid API key" }
        })))
        .mount(&server)
        .await;

    let err = client(&server, 4)
        .fetch_usage(&march(), None)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Authentication(_)));
    assert_eq!(err.exit_code(), 3);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_bad_request_is_request_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/stats/email_history"))
        .respond_with(ResponseTemplate::new(400).set_body_string("x".repeat(2000)))
        .mount(&server)
        .await;

    let ids = vec!["sub1".to_string()];
    let err = client(&server, 4)
        .fetch_usage(&march(), Some(&ids))
        .await
        .unwrap_err();

    match err {
        AppError::Request { status, body } => {
            assert_eq!(status, StatusCode::BAD_REQUEST);
            // truncated for logs
            assert!(body.len() < 600);
            assert!(body.ends_with("..."));
        }
        other => panic!("Expected Request error, got {:?}", other),
    }
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_malformed_json_is_request_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/stats/email_history"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
        .mount(&server)
        .await;

    let ids = vec!["sub1".to_string()];
    let err = client(&server, 4)
        .fetch_usage(&march(), Some(&ids))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Request { .. }));
}

#[tokio::test]
async fn test_request_carries_key_and_period() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/stats/email_history"))
        .and(header(API_KEY_HEADER, "api-test-key-1234"))
        .and(body_partial_json(json!({
            "group_by": "subaccount",
            "start_date": "2024-03-01T00:00:00Z",
            "end_date": "2024-04-01T00:00:00Z",
            "subaccounts": ["sub1", "sub2"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(history_body()))
        .expect(1)
        .mount(&server)
        .await;

    let ids = vec!["sub1".to_string(), "sub2".to_string()];
    let usage = client(&server, 1)
        .fetch_usage(&march(), Some(&ids))
        .await
        .unwrap();
    assert_eq!(usage["sub2"].fields["sent"], json!(50));
}

#[tokio::test]
async fn test_search_pagination_and_labels() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/subaccounts/search"))
        .and(body_partial_json(json!({ "continue_token": "page2" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "subaccounts": [{ "id": "sub2", "name": "Support" }] }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/subaccounts/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "subaccounts": [{ "id": "sub1", "name": "Marketing" }],
                "continue_token": "page2"
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/stats/email_history"))
        .respond_with(ResponseTemplate::new(200).set_body_json(history_body()))
        .mount(&server)
        .await;

    let usage = client(&server, 1).fetch_usage(&march(), None).await.unwrap();

    assert_eq!(usage["sub1"].label.as_deref(), Some("Marketing"));
    assert_eq!(usage["sub2"].label.as_deref(), Some("Support"));

    let requests = server.received_requests().await.unwrap();
    let history: serde_json::Value = requests
        .iter()
        .find(|r| r.url.path() == "/stats/email_history")
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .unwrap();
    assert_eq!(history["subaccounts"], json!(["sub1", "sub2"]));
}

#[tokio::test]
async fn test_account_without_subaccounts_reports_primary() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/subaccounts/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "subaccounts": [] }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/stats/email_history"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "history": [{ "used": 42, "bounces": 2, "rejects": 0 }] }
        })))
        .mount(&server)
        .await;

    let usage = client(&server, 1).fetch_usage(&march(), None).await.unwrap();

    assert_eq!(usage.len(), 1);
    assert_eq!(usage[PRIMARY_ACCOUNT_ID].fields["used"], json!(42));

    let requests = server.received_requests().await.unwrap();
    let history: serde_json::Value = requests
        .iter()
        .find(|r| r.url.path() == "/stats/email_history")
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .unwrap();
    assert!(history.get("subaccounts").is_none());
}

#[tokio::test]
async fn test_invalid_base_url_fails_without_retry() {
    let client = UsageClient::new(
        "not a url",
        "api-test-key-1234",
        Duration::from_secs(2),
        fast_retry(3),
    )
    .unwrap();

    let ids = vec!["sub1".to_string()];
    let err = client.fetch_usage(&march(), Some(&ids)).await.unwrap_err();
    match &err {
        AppError::Request { status, .. } => assert_eq!(*status, StatusCode::BAD_REQUEST),
        other => panic!("Expected Request error, got {:?}", other),
    }
    assert_eq!(err.exit_code(), 4);
}

#[tokio::test]
async fn test_connection_refused_is_transient() {
    // grab a free port, then release it so nothing is listening
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let client = UsageClient::new(
        format!("http://127.0.0.1:{}", port),
        "api-test-key-1234",
        Duration::from_secs(2),
        fast_retry(2),
    )
    .unwrap();

    let ids = vec!["sub1".to_string()];
    let err = client.fetch_usage(&march(), Some(&ids)).await.unwrap_err();
    assert!(matches!(err, AppError::TransientApi { attempts: 2, .. }));
    assert_eq!(err.exit_code(), 5);
}
