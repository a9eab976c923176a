use futures_util::{SinkExt, StreamExt};
use pdf_colab::{routes::create_routes, ws::CloseReason, AppState, Config};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const QUIET: Duration = Duration::from_millis(300);

async fn start_server(config: Config) -> (String, Arc<AppState>) {
    let state = Arc::new(AppState::in_memory(config));
    let app = create_routes(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let addr = listener.local_addr().expect("listener should have an address");
    tokio::spawn(async move {
        axum::serve(listener, app)
            .await
            .expect("server should run for the test");
    });
    (format!("ws://{addr}/realtime/ws"), state)
}

fn quiet_config() -> Config {
    Config {
        heartbeat_interval_secs: 0,
        ..Config::default()
    }
}

async fn connect(base: &str, document_id: &str) -> Client {
    let (socket, _) = connect_async(format!("{base}/{document_id}"))
        .await
        .expect("websocket should connect");
    socket
}

async fn wait_for_viewers(state: &AppState, document_id: &str, expected: usize) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while state.registry.connection_count(document_id) != expected {
        assert!(
            Instant::now() < deadline,
            "timed out waiting for {expected} viewers on {document_id}, have {}",
            state.registry.connection_count(document_id)
        );
        sleep(Duration::from_millis(10)).await;
    }
}

/// Next text frame, or `None` if nothing arrives within `wait` or the
/// connection ends.
async fn next_text(client: &mut Client, wait: Duration) -> Option<String> {
    let deadline = Instant::now() + wait;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match timeout(remaining, client.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => return Some(text.as_str().to_string()),
            Ok(Some(Ok(Message::Close(_)))) | Ok(Some(Err(_))) | Ok(None) | Err(_) => return None,
            Ok(Some(Ok(_))) => continue,
        }
    }
}

/// Close code the server sent, if the connection ends with a close frame.
async fn close_code(client: &mut Client, wait: Duration) -> Option<u16> {
    let deadline = Instant::now() + wait;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match timeout(remaining, client.next()).await {
            Ok(Some(Ok(Message::Close(frame)))) => return frame.map(|f| u16::from(f.code)),
            Ok(Some(Ok(_))) => continue,
            Ok(Some(Err(_))) | Ok(None) | Err(_) => return None,
        }
    }
}

#[tokio::test]
async fn highlight_reaches_peer_once_and_not_the_sender() {
    let (base, state) = start_server(quiet_config()).await;
    let mut a = connect(&base, "doc1").await;
    let mut b = connect(&base, "doc1").await;
    wait_for_viewers(&state, "doc1", 2).await;

    let payload = r#"{"type":"highlight","text":"hello"}"#;
    a.send(Message::text(payload)).await.unwrap();

    assert_eq!(next_text(&mut b, Duration::from_secs(2)).await.as_deref(), Some(payload));
    assert_eq!(next_text(&mut b, QUIET).await, None);
    assert_eq!(next_text(&mut a, QUIET).await, None);

    b.close(None).await.unwrap();
    wait_for_viewers(&state, "doc1", 1).await;

    a.send(Message::text(r#"{"type":"highlight","text":"again"}"#))
        .await
        .unwrap();
    assert_eq!(next_text(&mut a, QUIET).await, None);
    assert_eq!(state.registry.connection_count("doc1"), 1);
}

#[tokio::test]
async fn fan_out_reaches_every_other_viewer() {
    let (base, state) = start_server(quiet_config()).await;
    let mut a = connect(&base, "doc1").await;
    let mut b = connect(&base, "doc1").await;
    let mut c = connect(&base, "doc1").await;
    wait_for_viewers(&state, "doc1", 3).await;

    let payload = r#"{"type":"highlight","color":"yellow"}"#;
    a.send(Message::text(payload)).await.unwrap();

    assert_eq!(next_text(&mut b, Duration::from_secs(2)).await.as_deref(), Some(payload));
    assert_eq!(next_text(&mut c, Duration::from_secs(2)).await.as_deref(), Some(payload));
    assert_eq!(next_text(&mut a, QUIET).await, None);
}

#[tokio::test]
async fn closed_viewer_is_dropped_and_others_keep_receiving() {
    let (base, state) = start_server(quiet_config()).await;
    let mut a = connect(&base, "doc1").await;
    let mut b = connect(&base, "doc1").await;
    let mut c = connect(&base, "doc1").await;
    wait_for_viewers(&state, "doc1", 3).await;

    a.close(None).await.unwrap();
    wait_for_viewers(&state, "doc1", 2).await;

    let payload = r#"{"type":"highlight","text":"after a left"}"#;
    b.send(Message::text(payload)).await.unwrap();
    assert_eq!(next_text(&mut c, Duration::from_secs(2)).await.as_deref(), Some(payload));
    assert_eq!(next_text(&mut b, QUIET).await, None);
}

#[tokio::test]
async fn documents_do_not_leak_into_each_other() {
    let (base, state) = start_server(quiet_config()).await;
    let mut a = connect(&base, "doc1").await;
    let mut b = connect(&base, "doc1").await;
    let mut other = connect(&base, "doc2").await;
    wait_for_viewers(&state, "doc1", 2).await;
    wait_for_viewers(&state, "doc2", 1).await;

    a.send(Message::text(r#"{"type":"highlight"}"#)).await.unwrap();

    assert!(next_text(&mut b, Duration::from_secs(2)).await.is_some());
    assert_eq!(next_text(&mut other, QUIET).await, None);
}

#[tokio::test]
async fn events_arrive_in_send_order() {
    let (base, state) = start_server(quiet_config()).await;
    let mut a = connect(&base, "doc1").await;
    let mut b = connect(&base, "doc1").await;
    wait_for_viewers(&state, "doc1", 2).await;

    for i in 0..20 {
        a.send(Message::text(format!(r#"{{"seq":{i}}}"#))).await.unwrap();
    }
    for i in 0..20 {
        let text = next_text(&mut b, Duration::from_secs(2))
            .await
            .expect("every event should arrive");
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["seq"], i);
    }
}

#[tokio::test]
async fn malformed_payload_is_answered_not_relayed() {
    let (base, state) = start_server(quiet_config()).await;
    let mut a = connect(&base, "doc1").await;
    let mut b = connect(&base, "doc1").await;
    wait_for_viewers(&state, "doc1", 2).await;

    a.send(Message::text("this is not json")).await.unwrap();

    let reply = next_text(&mut a, Duration::from_secs(2))
        .await
        .expect("sender should get an error frame");
    let reply: Value = serde_json::from_str(&reply).unwrap();
    assert_eq!(reply["type"], "error");
    assert_eq!(next_text(&mut b, QUIET).await, None);

    // The sender's channel stays usable.
    a.send(Message::text(r#"{"ok":true}"#)).await.unwrap();
    assert_eq!(
        next_text(&mut b, Duration::from_secs(2)).await.as_deref(),
        Some(r#"{"ok":true}"#)
    );
}

#[tokio::test]
async fn shutdown_closes_every_viewer() {
    let (base, state) = start_server(quiet_config()).await;
    let mut a = connect(&base, "doc1").await;
    let mut b = connect(&base, "doc2").await;
    wait_for_viewers(&state, "doc1", 1).await;
    wait_for_viewers(&state, "doc2", 1).await;

    assert_eq!(state.registry.close_all(CloseReason::ServerShutdown), 2);

    assert_eq!(close_code(&mut a, Duration::from_secs(2)).await, Some(1001));
    assert_eq!(close_code(&mut b, Duration::from_secs(2)).await, Some(1001));
    wait_for_viewers(&state, "doc1", 0).await;
    wait_for_viewers(&state, "doc2", 0).await;
}

#[tokio::test]
async fn silent_viewer_is_timed_out() {
    let config = Config {
        heartbeat_interval_secs: 1,
        ..Config::default()
    };
    let (base, state) = start_server(config).await;
    let mut idle = connect(&base, "doc1").await;
    wait_for_viewers(&state, "doc1", 1).await;

    // Not polling the socket means no pong ever goes back.
    sleep(Duration::from_millis(3500)).await;
    wait_for_viewers(&state, "doc1", 0).await;
    assert_eq!(close_code(&mut idle, Duration::from_secs(2)).await, Some(1011));
}
