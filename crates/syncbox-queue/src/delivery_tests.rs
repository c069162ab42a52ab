use super::*;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> HttpDeliveryClient {
    let config = DeliveryConfig {
        base_url: server.uri(),
        ..Default::default()
    };
    HttpDeliveryClient::from_config(&config).unwrap()
}

#[test]
fn test_from_config_url() {
    let config = DeliveryConfig {
        base_url: "https://api.example.com/".to_string(),
        ..Default::default()
    };
    let client = HttpDeliveryClient::from_config(&config).unwrap();
    assert_eq!(client.url(), "https://api.example.com/api/features");
}

#[tokio::test]
async fn test_deliver_posts_payload() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/features"))
        .and(body_json(json!("dark-mode")))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.deliver(&json!("dark-mode")).await.unwrap();
}

#[tokio::test]
async fn test_deliver_rejected_status() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/features"))
        .respond_with(ResponseTemplate::new(422).set_body_string("invalid feature"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.deliver(&json!("x")).await.unwrap_err();
    match err {
        DeliveryError::Rejected { status, body } => {
            assert_eq!(status, 422);
            assert_eq!(body, "invalid feature");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_deliver_server_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.deliver(&json!("x")).await.unwrap_err();
    assert!(matches!(err, DeliveryError::Rejected { status: 503, .. }));
}

#[tokio::test]
async fn test_deliver_timeout() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let client = HttpDeliveryClient::new(
        format!("{}/api/features", server.uri()),
        Duration::from_millis(50),
    )
    .unwrap();
    let err = client.deliver(&json!("x")).await.unwrap_err();
    assert!(matches!(err, DeliveryError::Timeout));
}

#[tokio::test]
async fn test_deliver_unreachable() {
    let client =
        HttpDeliveryClient::new("http://127.0.0.1:1/api/features", Duration::from_secs(2)).unwrap();
    let err = client.deliver(&json!("x")).await.unwrap_err();
    assert!(matches!(err, DeliveryError::Transport(_)));
}
