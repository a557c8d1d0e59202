use super::*;
use serde::Deserialize;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Deserialize, PartialEq)]
struct Doc {
    name: String,
}

#[test]
fn test_http_client_builds() {
    let _client = http_client(Duration::from_secs(5));
}

async fn get_response(server: &MockServer) -> Response {
    Client::new().get(server.uri()).send().await.unwrap()
}

#[tokio::test]
async fn test_limited_body_under_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello world"))
        .mount(&server)
        .await;
    let body = limited_body(get_response(&server).await, 1024).await.unwrap();
    assert_eq!(body, b"hello world");
}

#[tokio::test]
async fn test_limited_body_exact_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'x'; 100]))
        .mount(&server)
        .await;
    let body = limited_body(get_response(&server).await, 100).await.unwrap();
    assert_eq!(body.len(), 100);
}

#[tokio::test]
async fn test_limited_body_rejects_large_content_length() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'x'; 200]))
        .mount(&server)
        .await;
    let err = limited_body(get_response(&server).await, 100)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("too large"));
}

#[tokio::test]
async fn test_read_json_decodes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"name":"Ann"}"#))
        .mount(&server)
        .await;
    let doc: Doc = read_json(get_response(&server).await, 1024).await.unwrap();
    assert_eq!(doc.name, "Ann");
}

#[tokio::test]
async fn test_read_json_rejects_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let err = read_json::<Doc>(get_response(&server).await, 1024)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("503"));
}
