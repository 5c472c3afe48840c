use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::Response;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::Instant;

use crate::state::AppState;

/// Ping intervals a client may stay silent for before it is dropped.
const MISSED_PINGS_ALLOWED: u32 = 3;

#[derive(Deserialize)]
pub struct NotificationsQuery {
    token: Option<String>,
}

/// `GET /ws/?token=...`: server→client notification channel.
///
/// The handshake is always accepted; authentication happens afterwards so
/// a rejected client gets a policy-violation close frame instead of a bare
/// HTTP error.
pub async fn notifications_handler(
    State(state): State<AppState>,
    Query(query): Query<NotificationsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| run_channel(socket, state, query.token))
}

async fn run_channel(mut socket: WebSocket, state: AppState, token: Option<String>) {
    let (admission, events) = match state.gate.admit(token.as_deref()) {
        Ok(admitted) => admitted,
        Err(_) => {
            let frame = CloseFrame {
                code: close_code::POLICY,
                reason: "authentication failed".into(),
            };
            let _ = socket.send(Message::Close(Some(frame))).await;
            return;
        }
    };

    let ping_every = state.config.live.ping_interval();
    let silence_limit = ping_every * MISSED_PINGS_ALLOWED;

    let (sink, mut stream) = socket.split();
    let mut writer = tokio::spawn(write_events(sink, events, ping_every));

    let mut liveness = tokio::time::interval(ping_every);
    let mut last_seen = Instant::now();

    // Inbound frames only signal liveness; their content is ignored.
    loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    tracing::debug!(user = admission.subject(), "live channel read error: {e}");
                    break;
                }
                Some(Ok(_)) => last_seen = Instant::now(),
            },
            _ = liveness.tick() => {
                if last_seen.elapsed() > silence_limit {
                    tracing::info!(user = admission.subject(), "live channel timed out");
                    break;
                }
            }
            _ = &mut writer => break,
        }
    }

    writer.abort();
    drop(admission);
}

/// Drains the connection's event queue in order and keeps the socket warm
/// with periodic pings. Ends when the queue closes or a write fails.
async fn write_events(
    mut sink: SplitSink<WebSocket, Message>,
    mut events: UnboundedReceiver<String>,
    ping_every: Duration,
) {
    let mut ping = tokio::time::interval(ping_every);
    // Skip the first immediate tick
    ping.tick().await;

    loop {
        let frame = tokio::select! {
            payload = events.recv() => match payload {
                Some(json) => Message::Text(json.into()),
                None => break,
            },
            _ = ping.tick() => Message::Ping(Bytes::new()),
        };

        if sink.send(frame).await.is_err() {
            break;
        }
    }

    let _ = sink.close().await;
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::http::{Method, StatusCode};
    use futures::{SinkExt, StreamExt};
    use postline_core::InMemoryStore;
    use serde_json::{json, Value};
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
    use tokio_tungstenite::tungstenite::Message as WsMessage;

    use crate::api::tests::{call, login, register, sign_up, test_state};
    use crate::config::ServerConfig;
    use crate::state::AppState;

    async fn serve(state: &AppState) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = crate::app(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn fast_ping_state() -> AppState {
        let mut config = ServerConfig::default();
        config.auth.jwt_secret = "test-secret-test-secret-test-secret".to_string();
        config.live.ping_interval_secs = 1;
        AppState::new(config, Arc::new(InMemoryStore::new()))
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(10), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    async fn next_text<S>(stream: &mut S) -> Value
    where
        S: futures::Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>> + Unpin,
    {
        loop {
            let msg = tokio::time::timeout(Duration::from_secs(5), stream.next())
                .await
                .expect("no frame in time")
                .expect("stream ended")
                .expect("read error");
            if let WsMessage::Text(_) = msg {
                return serde_json::from_str(msg.to_text().unwrap()).unwrap();
            }
        }
    }

    async fn expect_policy_close(url: String) {
        let (mut socket, _) = tokio_tungstenite::connect_async(url).await.unwrap();
        let msg = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("no frame in time")
            .expect("stream ended")
            .expect("read error");

        match msg {
            WsMessage::Close(Some(frame)) => assert_eq!(frame.code, CloseCode::Policy),
            other => panic!("expected policy close, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_token_closes_with_policy_violation() {
        let state = test_state();
        let addr = serve(&state).await;

        expect_policy_close(format!("ws://{addr}/ws/")).await;
        assert_eq!(state.registry().connection_count(), 0);
    }

    #[tokio::test]
    async fn invalid_token_closes_with_policy_violation() {
        let state = test_state();
        let addr = serve(&state).await;

        expect_policy_close(format!("ws://{addr}/ws/?token=forged")).await;
        assert_eq!(state.registry().connection_count(), 0);
    }

    #[tokio::test]
    async fn end_to_end_message_and_read_notifications() {
        let state = test_state();
        let addr = serve(&state).await;

        let (status, _) = register(&state, "alice", "password123").await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = register(&state, "alice", "password123").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = login(&state, "alice", "wrong-password").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, body) = login(&state, "alice", "password123").await;
        assert_eq!(status, StatusCode::OK);
        let alice = body["access_token"].as_str().unwrap().to_string();
        let alice_id = 1;

        let (_, bob) = sign_up(&state, "bob").await;

        let url = format!("ws://{addr}/ws/?token={alice}");
        let (mut socket, _) = tokio_tungstenite::connect_async(url).await.unwrap();
        let registry = state.registry().clone();
        wait_until(|| registry.is_connected("alice")).await;

        // Inbound payloads are ignored and do not close the channel.
        socket.send(WsMessage::Text("hello?".into())).await.unwrap();

        let (status, message) = call(
            &state,
            Method::POST,
            "/messages/",
            Some(&bob),
            Some(json!({ "title": "Hi", "body": "hello", "recipient_id": alice_id })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let event = next_text(&mut socket).await;
        assert_eq!(event["event"], "new_message");
        assert_eq!(event["message"]["title"], "Hi");
        assert_eq!(event["message"]["unread_count"], 1);

        let uri = format!("/messages/{}/read", message["id"]);
        let (status, _) = call(&state, Method::PUT, &uri, Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK);

        let event = next_text(&mut socket).await;
        assert_eq!(event, json!({ "event": "unread_count_updated", "unread_count": 0 }));

        socket.close(None).await.unwrap();
        wait_until(|| !registry.is_connected("alice")).await;
    }

    #[tokio::test]
    async fn every_device_of_a_user_is_notified() {
        let state = test_state();
        let addr = serve(&state).await;
        let (alice_id, alice) = sign_up(&state, "alice").await;
        let (_, bob) = sign_up(&state, "bob").await;

        let url = format!("ws://{addr}/ws/?token={alice}");
        let (mut phone, _) = tokio_tungstenite::connect_async(url.clone()).await.unwrap();
        let (mut laptop, _) = tokio_tungstenite::connect_async(url).await.unwrap();
        let registry = state.registry().clone();
        wait_until(|| registry.connections_for("alice").len() == 2).await;

        call(
            &state,
            Method::POST,
            "/messages/",
            Some(&bob),
            Some(json!({ "title": "Both", "body": "x", "recipient_id": alice_id })),
        )
        .await;

        assert_eq!(next_text(&mut phone).await["message"]["title"], "Both");
        assert_eq!(next_text(&mut laptop).await["message"]["title"], "Both");

        drop(phone);
        wait_until(|| registry.connections_for("alice").len() == 1).await;
    }

    #[tokio::test]
    async fn silent_client_is_dropped_after_missed_pings() {
        let state = fast_ping_state();
        let addr = serve(&state).await;
        let (_, alice) = sign_up(&state, "alice").await;

        // Pongs are only written while the client polls its socket.
        let url = format!("ws://{addr}/ws/?token={alice}");
        let (_silent, _) = tokio_tungstenite::connect_async(url).await.unwrap();
        let registry = state.registry().clone();
        wait_until(|| registry.is_connected("alice")).await;

        wait_until(|| !registry.is_connected("alice")).await;
    }

    #[tokio::test]
    async fn responsive_client_outlives_the_silence_limit() {
        let state = fast_ping_state();
        let addr = serve(&state).await;
        let (_, alice) = sign_up(&state, "alice").await;

        let url = format!("ws://{addr}/ws/?token={alice}");
        let (mut socket, _) = tokio_tungstenite::connect_async(url).await.unwrap();
        let reader = tokio::spawn(async move { while socket.next().await.is_some() {} });
        let registry = state.registry().clone();
        wait_until(|| registry.is_connected("alice")).await;

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(registry.is_connected("alice"));
        reader.abort();
    }
}
