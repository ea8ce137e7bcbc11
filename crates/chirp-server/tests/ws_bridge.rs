//! WebSocket bridge end-to-end: mock upstream → relay → subscriber.

use std::time::Duration;

use futures::StreamExt;
use tokio::time::timeout;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use chirp_server::{RelayConfig, RelayServer};

#[tokio::test]
async fn websocket_subscriber_receives_stream_frames() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/2/tweets/search/stream"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "{\"data\":{\"id\":\"1\",\"text\":\"hello\"}}\r\n",
            "application/json",
        ))
        .mount(&upstream)
        .await;

    let server = RelayServer::new(RelayConfig {
        api_token: "test-token".into(),
        upstream_base_url: upstream.uri(),
        ..RelayConfig::default()
    });
    let router = server.router();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    }));

    let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/stream"))
        .await
        .expect("websocket upgrade");

    let frame = timeout(Duration::from_secs(10), socket.next())
        .await
        .expect("timed out waiting for a frame")
        .expect("socket closed early")
        .expect("websocket error");
    let value: serde_json::Value = serde_json::from_str(frame.to_text().unwrap()).unwrap();
    assert_eq!(value["tag"], "tweet");
    assert_eq!(value["data"]["data"]["text"], "hello");

    // Closing the socket unregisters the listener.
    socket.close(None).await.unwrap();
    for _ in 0..50 {
        if server.relay().listener_count() == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("listener was not unregistered after close");
}
