use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::connection::{AnnotationEvent, CloseReason, Connection};
use crate::models::ServerMessage;
use crate::state::AppState;

/// Frames the reader side asks the writer to send (pings, error replies).
const CONTROL_CHANNEL_CAPACITY: usize = 16;

/// Time the writer gets to flush its close frame once the connection closed.
const WRITER_GRACE: Duration = Duration::from_secs(1);

/// Service one realtime channel for `document_id` until it closes.
///
/// The connection is registered for the whole call. A writer task drains the
/// connection's outbound queue onto the socket while this task reads inbound
/// frames and hands annotation events to the relay.
pub async fn run_session(socket: WebSocket, document_id: String, state: Arc<AppState>) {
    let (registration, outbox) = state
        .registry
        .open(&document_id, state.config.peer_queue_capacity);
    let connection = registration.connection().clone();
    info!(
        document_id = %document_id,
        connection_id = %connection.id(),
        viewers = state.registry.connection_count(&document_id),
        "realtime connection opened"
    );

    let (sink, mut stream) = socket.split();
    let (control_tx, control_rx) = mpsc::channel::<Message>(CONTROL_CHANNEL_CAPACITY);
    let mut writer = tokio::spawn(write_loop(sink, outbox, control_rx, connection.clone()));

    let heartbeat_period = state.config.heartbeat_interval();
    let mut heartbeat = heartbeat_period.map(|period| {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    });
    let mut last_seen = Instant::now();

    let reason = loop {
        tokio::select! {
            biased;

            reason = connection.closed() => break reason,

            _ = next_heartbeat(&mut heartbeat) => {
                let Some(period) = heartbeat_period else { continue };
                if last_seen.elapsed() > period * 2 {
                    connection.close(CloseReason::HeartbeatTimeout);
                } else if control_tx.try_send(Message::Ping(Vec::new())).is_err() {
                    debug!(connection_id = %connection.id(), "control queue full, skipping ping");
                }
            }

            inbound = stream.next() => match inbound {
                Some(Ok(message)) => {
                    last_seen = Instant::now();
                    handle_frame(message, &document_id, &connection, &control_tx, &state);
                }
                Some(Err(e)) => {
                    warn!(connection_id = %connection.id(), "websocket receive error: {}", e);
                    connection.close(CloseReason::TransportError);
                }
                None => {
                    connection.close(CloseReason::ClientDisconnect);
                }
            },
        }
    };

    // Unregister before waiting on the writer so peers stop targeting us.
    drop(registration);
    info!(
        document_id = %document_id,
        connection_id = %connection.id(),
        %reason,
        "realtime connection closed"
    );

    if tokio::time::timeout(WRITER_GRACE, &mut writer).await.is_err() {
        writer.abort();
    }
}

fn handle_frame(
    message: Message,
    document_id: &str,
    connection: &Connection,
    control_tx: &mpsc::Sender<Message>,
    state: &AppState,
) {
    match message {
        Message::Text(text) => {
            // Payloads are relayed verbatim; only well-formed JSON gets through.
            if let Err(e) = serde_json::from_str::<serde::de::IgnoredAny>(&text) {
                warn!(
                    document_id,
                    connection_id = %connection.id(),
                    "rejecting malformed annotation event: {}", e
                );
                let reply = ServerMessage::Error {
                    message: format!("invalid JSON payload: {}", e),
                };
                if let Ok(frame) = serde_json::to_string(&reply) {
                    let _ = control_tx.try_send(Message::Text(frame));
                }
                return;
            }
            state
                .relay
                .on_event(document_id, connection.id(), &AnnotationEvent::from(text));
        }
        Message::Binary(_) => {
            debug!(connection_id = %connection.id(), "ignoring binary frame");
        }
        Message::Close(_) => {
            connection.close(CloseReason::ClientDisconnect);
        }
        Message::Ping(_) | Message::Pong(_) => {}
    }
}

async fn write_loop(
    mut sink: futures_util::stream::SplitSink<WebSocket, Message>,
    mut outbox: mpsc::Receiver<AnnotationEvent>,
    mut control_rx: mpsc::Receiver<Message>,
    connection: Arc<Connection>,
) {
    let reason = loop {
        let frame = tokio::select! {
            biased;

            reason = connection.closed() => break reason,
            Some(frame) = control_rx.recv() => frame,
            event = outbox.recv() => match event {
                Some(event) => Message::Text(event.as_str().to_owned()),
                None => break connection.closed().await,
            },
        };

        if let Err(e) = sink.send(frame).await {
            debug!(connection_id = %connection.id(), "websocket send failed: {}", e);
            connection.close(CloseReason::TransportError);
        }
    };

    if reason != CloseReason::TransportError && reason != CloseReason::ClientDisconnect {
        let frame = CloseFrame {
            code: close_code(reason),
            reason: Cow::Borrowed(reason.as_str()),
        };
        let _ = sink.send(Message::Close(Some(frame))).await;
    }
    let _ = sink.close().await;
}

async fn next_heartbeat(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// WebSocket close code sent to a client the server disconnects.
fn close_code(reason: CloseReason) -> u16 {
    match reason {
        CloseReason::ServerShutdown => 1001,
        CloseReason::SlowConsumer | CloseReason::DeliveryFailed => 1008,
        CloseReason::HeartbeatTimeout => 1011,
        CloseReason::ClientDisconnect | CloseReason::TransportError => 1000,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_initiated_closes_use_distinct_codes() {
        assert_eq!(close_code(CloseReason::ServerShutdown), 1001);
        assert_eq!(close_code(CloseReason::SlowConsumer), 1008);
        assert_eq!(close_code(CloseReason::HeartbeatTimeout), 1011);
    }

    #[tokio::test]
    async fn disabled_heartbeat_never_fires() {
        let mut heartbeat = None;
        let fired = tokio::time::timeout(Duration::from_millis(20), next_heartbeat(&mut heartbeat)).await;
        assert!(fired.is_err());
    }
}
