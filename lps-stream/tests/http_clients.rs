//! reqwest-backed collaborators against a mock HTTP server.

use lps_stream::{
    ApiClient, ApiConfig, ApiError, CancellationToken, Cursor, HttpPollTransport, LongPollEvent,
    LongPollService, PollTransport, ServerDescriptor, TerminationReason, TransportError,
    VkApiClient,
};
use mockito::{Matcher, Server};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn poll_query(key: &str, ts: u64) -> Matcher {
    Matcher::AllOf(vec![
        Matcher::UrlEncoded("act".into(), "a_check".into()),
        Matcher::UrlEncoded("key".into(), key.into()),
        Matcher::UrlEncoded("ts".into(), ts.to_string()),
        Matcher::UrlEncoded("wait".into(), "25".into()),
        Matcher::UrlEncoded("mode".into(), "2".into()),
    ])
}

fn api_client(server: &Server) -> VkApiClient {
    VkApiClient::new(ApiConfig::new("secret").with_base_url(format!("{}/method/", server.url())))
}

#[tokio::test]
async fn test_transport_returns_parsed_body() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/lp")
        .match_query(poll_query("k", 10))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"ts": 11, "updates": [[4, 1, 0]]}"#)
        .create_async()
        .await;

    let host = format!("{}/lp", server.host_with_port());
    let url = ServerDescriptor::new(host, "k", Cursor(10))
        .poll_url(Duration::from_secs(25))
        .unwrap();

    let body = HttpPollTransport::new()
        .poll(&url, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(body, json!({"ts": 11, "updates": [[4, 1, 0]]}));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_transport_maps_http_status() {
    let mut server = Server::new_async().await;
    let _unauthorized = server
        .mock("GET", "/revoked")
        .match_query(Matcher::Any)
        .with_status(401)
        .create_async()
        .await;
    let _unavailable = server
        .mock("GET", "/busy")
        .match_query(Matcher::Any)
        .with_status(503)
        .create_async()
        .await;

    let transport = HttpPollTransport::new();
    let cancel = CancellationToken::new();

    let url = ServerDescriptor::new(format!("{}/revoked", server.host_with_port()), "k", Cursor(1))
        .poll_url(Duration::from_secs(25))
        .unwrap();
    assert!(matches!(
        transport.poll(&url, &cancel).await,
        Err(TransportError::Unauthorized(_))
    ));

    let url = ServerDescriptor::new(format!("{}/busy", server.host_with_port()), "k", Cursor(1))
        .poll_url(Duration::from_secs(25))
        .unwrap();
    assert!(matches!(
        transport.poll(&url, &cancel).await,
        Err(TransportError::Http { status: 503 })
    ));
}

#[tokio::test]
async fn test_transport_rejects_malformed_body() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/lp")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("<html>gateway</html>")
        .create_async()
        .await;

    let url = ServerDescriptor::new(format!("{}/lp", server.host_with_port()), "k", Cursor(1))
        .poll_url(Duration::from_secs(25))
        .unwrap();

    let result = HttpPollTransport::new()
        .poll(&url, &CancellationToken::new())
        .await;
    assert!(matches!(result, Err(TransportError::Decode(_))));
}

#[tokio::test]
async fn test_transport_honours_cancellation() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/lp")
        .match_query(Matcher::Any)
        .with_body("{}")
        .expect(0)
        .create_async()
        .await;

    let url = ServerDescriptor::new(format!("{}/lp", server.host_with_port()), "k", Cursor(1))
        .poll_url(Duration::from_secs(25))
        .unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = HttpPollTransport::new().poll(&url, &cancel).await;
    assert!(matches!(result, Err(TransportError::Cancelled)));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_api_client_unwraps_response() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/method/messages.getLongPollServer")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("use_ssl".into(), "1".into()),
            Matcher::UrlEncoded("access_token".into(), "secret".into()),
            Matcher::UrlEncoded("v".into(), "5.131".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"response": {"server": "lp.vk.com/im", "key": "k", "ts": 10}}"#)
        .create_async()
        .await;

    let response = api_client(&server)
        .call("messages.getLongPollServer", &[("use_ssl", "1".to_string())])
        .await
        .unwrap();

    assert_eq!(response, json!({"server": "lp.vk.com/im", "key": "k", "ts": 10}));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_api_client_maps_errors() {
    let mut server = Server::new_async().await;
    let _expired = server
        .mock("GET", "/method/users.get")
        .match_query(Matcher::Any)
        .with_body(r#"{"error": {"error_code": 5, "error_msg": "User authorization failed"}}"#)
        .create_async()
        .await;
    let _flood = server
        .mock("GET", "/method/messages.get")
        .match_query(Matcher::Any)
        .with_body(r#"{"error": {"error_code": 9, "error_msg": "Flood control"}}"#)
        .create_async()
        .await;
    let _empty = server
        .mock("GET", "/method/account.get")
        .match_query(Matcher::Any)
        .with_body("{}")
        .create_async()
        .await;

    let client = api_client(&server);

    match client.call("users.get", &[]).await {
        Err(ApiError::Unauthorized(message)) => assert_eq!(message, "User authorization failed"),
        other => panic!("Expected Unauthorized, got {other:?}"),
    }
    match client.call("messages.get", &[]).await {
        Err(ApiError::Api { code, message }) => {
            assert_eq!(code, 9);
            assert_eq!(message, "Flood control");
        }
        other => panic!("Expected Api error, got {other:?}"),
    }
    assert!(matches!(
        client.call("account.get", &[]).await,
        Err(ApiError::Decode(_))
    ));
}

#[tokio::test]
async fn test_service_over_http() {
    let mut server = Server::new_async().await;
    let host = format!("{}/lp", server.host_with_port());

    let directory = server
        .mock("GET", "/method/messages.getLongPollServer")
        .match_query(Matcher::Any)
        .with_body(json!({"response": {"server": host, "key": "k", "ts": 10}}).to_string())
        .create_async()
        .await;
    let first = server
        .mock("GET", "/lp")
        .match_query(poll_query("k", 10))
        .with_body(r#"{"ts": 11, "updates": [[4, 1, 0], [8, -42, 7]]}"#)
        .create_async()
        .await;
    let second = server
        .mock("GET", "/lp")
        .match_query(poll_query("k", 11))
        .with_status(401)
        .create_async()
        .await;

    let mut service = LongPollService::builder()
        .with_api_client(Arc::new(api_client(&server)))
        .build()
        .unwrap();
    let mut events = service.subscribe();

    service.init().await;
    let reason = service.wait().await.unwrap();

    assert_eq!(reason, TerminationReason::Unauthorized);
    assert_eq!(events.recv().await, Some(LongPollEvent::MessageChanged));
    match events.recv().await {
        Some(LongPollEvent::PresenceChanged { user_ids }) => {
            assert_eq!(user_ids.into_iter().collect::<Vec<_>>(), vec![42]);
        }
        other => panic!("Expected PresenceChanged, got {other:?}"),
    }

    directory.assert_async().await;
    first.assert_async().await;
    second.assert_async().await;
}
