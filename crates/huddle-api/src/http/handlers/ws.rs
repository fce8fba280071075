//! WebSocket handler for live subscriptions.
//!
//! The `/api/v1/subscriptions` endpoint upgrades an HTTP connection to a
//! WebSocket speaking a small graphql-ws style protocol:
//!
//! - client `connection_init { payload: { session } }` -> server `connection_ack`
//! - client `subscribe { id, topic, conversation_id? }` -> server `next { id, payload }` per event
//! - client `complete { id }` stops one subscription
//! - client `ping` -> server `pong`
//!
//! Failures tied to a subscription are reported as `error { id, message }`.
//! Each subscription runs in its own task feeding a shared outbound channel;
//! all of them are cancelled when the socket closes. A task that stops on its
//! own reports back so its id can be reused.

use std::collections::HashMap;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use huddle_core::session::resolve_handshake;
use huddle_core::subscription::SubscriptionGateway;
use huddle_types::conversation::ConversationId;
use huddle_types::session::SessionContext;

use crate::state::AppState;

/// Outbound frames buffered per connection before subscription tasks wait.
const OUTBOUND_BUFFER: usize = 64;

/// Incoming frame from a WebSocket client.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientFrame {
    ConnectionInit {
        #[serde(default)]
        payload: Option<serde_json::Value>,
    },
    Subscribe {
        id: String,
        topic: String,
        #[serde(default)]
        conversation_id: Option<ConversationId>,
    },
    Complete {
        id: String,
    },
    Ping,
}

/// Outgoing frame to a WebSocket client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerFrame {
    ConnectionAck,
    Next {
        id: String,
        payload: serde_json::Value,
    },
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        message: String,
    },
    Complete {
        id: String,
    },
    Pong,
}

impl ServerFrame {
    fn error(id: Option<&str>, message: impl Into<String>) -> Self {
        ServerFrame::Error {
            id: id.map(str::to_string),
            message: message.into(),
        }
    }
}

/// Upgrade an HTTP request to a subscription WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state.gateway.clone()))
}

/// Core WebSocket connection handler.
///
/// A single `tokio::select!` loop multiplexes frames produced by subscription
/// tasks with frames arriving from the client.
async fn handle_ws_connection(socket: WebSocket, gateway: SubscriptionGateway) {
    let (ws_sender, ws_receiver) = socket.split();
    run_connection(ws_sender, ws_receiver, gateway).await;
}

/// Drive the protocol over any split socket until the client goes away.
async fn run_connection<W, R>(mut ws_sender: W, mut ws_receiver: R, gateway: SubscriptionGateway)
where
    W: SinkExt<Message, Error = axum::Error> + Unpin,
    R: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let (tx, mut rx) = mpsc::channel::<ServerFrame>(OUTBOUND_BUFFER);
    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<(String, u64)>();
    let mut connection = Connection::new(gateway, tx, done_tx);

    loop {
        tokio::select! {
            Some(frame) = rx.recv() => {
                if !send_frame(&mut ws_sender, &frame).await {
                    break;
                }
            }

            Some((id, generation)) = done_rx.recv() => {
                connection.forwarder_finished(&id, generation);
            }

            msg_result = ws_receiver.next() => {
                match msg_result {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = connection.handle_text(&text) {
                            if !send_frame(&mut ws_sender, &reply).await {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        tracing::debug!("WebSocket receive error: {err}");
                        break;
                    }
                    // Binary and protocol-level ping/pong frames are handled by axum.
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    connection.close();
    tracing::debug!("subscription WebSocket closed");
}

/// Serialize and send one frame. Returns `false` once the client is gone.
async fn send_frame(
    ws_sender: &mut (impl SinkExt<Message, Error = axum::Error> + Unpin),
    frame: &ServerFrame,
) -> bool {
    match serde_json::to_string(frame) {
        Ok(json) => ws_sender.send(Message::Text(json.into())).await.is_ok(),
        Err(err) => {
            tracing::warn!("Failed to serialize server frame: {err}");
            true
        }
    }
}

/// A running subscription. `generation` tells a re-used id apart from the
/// task that previously held it.
struct ActiveSubscription {
    generation: u64,
    token: CancellationToken,
}

/// Protocol state of one WebSocket connection.
struct Connection {
    gateway: SubscriptionGateway,
    outbound: mpsc::Sender<ServerFrame>,
    finished: mpsc::UnboundedSender<(String, u64)>,
    ctx: Option<SessionContext>,
    subscriptions: HashMap<String, ActiveSubscription>,
    next_generation: u64,
    shutdown: CancellationToken,
}

impl Connection {
    fn new(
        gateway: SubscriptionGateway,
        outbound: mpsc::Sender<ServerFrame>,
        finished: mpsc::UnboundedSender<(String, u64)>,
    ) -> Self {
        Self {
            gateway,
            outbound,
            finished,
            ctx: None,
            subscriptions: HashMap::new(),
            next_generation: 0,
            shutdown: CancellationToken::new(),
        }
    }

    /// Apply one client text frame. Returns the immediate reply, if any.
    fn handle_text(&mut self, text: &str) -> Option<ServerFrame> {
        let frame: ClientFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(err) => {
                tracing::warn!(raw = %text, error = %err, "Ignoring malformed WebSocket frame");
                return Some(ServerFrame::error(None, format!("malformed frame: {err}")));
            }
        };

        match frame {
            ClientFrame::ConnectionInit { payload } => {
                if self.ctx.is_some() {
                    return Some(ServerFrame::error(None, "connection already initialised"));
                }
                let ctx = resolve_handshake(payload.as_ref());
                tracing::debug!(authenticated = ctx.is_authenticated(), "subscription connection initialised");
                self.ctx = Some(ctx);
                Some(ServerFrame::ConnectionAck)
            }
            ClientFrame::Subscribe {
                id,
                topic,
                conversation_id,
            } => self.subscribe(id, &topic, conversation_id),
            ClientFrame::Complete { id } => {
                if let Some(active) = self.subscriptions.remove(&id) {
                    active.token.cancel();
                    tracing::debug!(%id, "subscription completed by client");
                }
                None
            }
            ClientFrame::Ping => Some(ServerFrame::Pong),
        }
    }

    fn subscribe(
        &mut self,
        id: String,
        topic: &str,
        conversation_id: Option<ConversationId>,
    ) -> Option<ServerFrame> {
        let Some(ctx) = self.ctx.as_ref() else {
            return Some(ServerFrame::error(Some(&id), "connection not initialised"));
        };
        if self.subscriptions.contains_key(&id) {
            return Some(ServerFrame::error(
                Some(&id),
                format!("subscriber for {id} already exists"),
            ));
        }

        let token = self.shutdown.child_token();
        let generation = self.next_generation;
        let started = match (topic, conversation_id) {
            ("conversation_created", _) => self
                .gateway
                .conversation_created(ctx)
                .map(|stream| self.spawn_forwarder(id.clone(), generation, stream, token.clone())),
            ("message_created", Some(conversation_id)) => self
                .gateway
                .message_created(ctx, conversation_id)
                .map(|stream| self.spawn_forwarder(id.clone(), generation, stream, token.clone())),
            ("message_created", None) => {
                return Some(ServerFrame::error(
                    Some(&id),
                    "message_created requires conversation_id",
                ));
            }
            (other, _) => {
                return Some(ServerFrame::error(Some(&id), format!("unknown topic '{other}'")));
            }
        };

        match started {
            Ok(()) => {
                tracing::debug!(%id, topic, "subscription started");
                self.next_generation += 1;
                self.subscriptions
                    .insert(id, ActiveSubscription { generation, token });
                None
            }
            Err(err) => Some(ServerFrame::error(Some(&id), err.to_string())),
        }
    }

    /// Forward every stream item as a `next` frame until cancelled.
    ///
    /// On exit the task reports `(id, generation)` on the `finished` channel.
    fn spawn_forwarder<S, T>(&self, id: String, generation: u64, stream: S, token: CancellationToken)
    where
        S: Stream<Item = T> + Send + 'static,
        T: Serialize + Send,
    {
        let outbound = self.outbound.clone();
        let finished = self.finished.clone();
        tokio::spawn(async move {
            let mut stream = Box::pin(stream);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    item = stream.next() => {
                        let Some(item) = item else {
                            let _ = outbound.send(ServerFrame::Complete { id: id.clone() }).await;
                            break;
                        };
                        let payload = match serde_json::to_value(&item) {
                            Ok(payload) => payload,
                            Err(err) => {
                                tracing::warn!(%id, "Failed to serialize subscription payload: {err}");
                                continue;
                            }
                        };
                        if outbound.send(ServerFrame::Next { id: id.clone(), payload }).await.is_err() {
                            break;
                        }
                    }
                }
            }
            drop(stream);
            let _ = finished.send((id, generation));
        });
    }

    /// Forget a subscription whose task has stopped, unless the id has since
    /// been taken by a newer subscription.
    fn forwarder_finished(&mut self, id: &str, generation: u64) {
        if self
            .subscriptions
            .get(id)
            .is_some_and(|active| active.generation == generation)
        {
            self.subscriptions.remove(id);
            tracing::debug!(%id, "subscription ended");
        }
    }

    /// Cancel every running subscription.
    fn close(&mut self) {
        self.shutdown.cancel();
        self.subscriptions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::Utc;
    use huddle_core::event::EventBus;
    use huddle_types::config::FanoutPolicy;
    use huddle_types::conversation::{Conversation, Participant, ParticipantUser};
    use huddle_types::event::{CONVERSATION_CREATED, DomainEvent, MESSAGE_CREATED};
    use huddle_types::message::{Message as ChatMessage, MessageId, MessageSender};
    use huddle_types::user::UserId;
    use serde_json::json;

    fn connection(policy: FanoutPolicy) -> (Connection, mpsc::Receiver<ServerFrame>, Arc<EventBus>) {
        let (conn, rx, _done, bus) = connection_with_done(policy);
        (conn, rx, bus)
    }

    fn connection_with_done(
        policy: FanoutPolicy,
    ) -> (
        Connection,
        mpsc::Receiver<ServerFrame>,
        mpsc::UnboundedReceiver<(String, u64)>,
        Arc<EventBus>,
    ) {
        let bus = Arc::new(EventBus::default());
        let (tx, rx) = mpsc::channel(16);
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        let gateway = SubscriptionGateway::new(bus.clone(), policy);
        (Connection::new(gateway, tx, done_tx), rx, done_rx, bus)
    }

    fn init_frame(user: Option<UserId>) -> String {
        let session = user.map(|id| json!({ "user": { "id": id, "username": "ada" } }));
        json!({ "type": "connection_init", "payload": { "session": session } }).to_string()
    }

    fn conversation_with(user: UserId) -> Conversation {
        let id = ConversationId::new();
        Conversation {
            id,
            participants: vec![Participant {
                user: ParticipantUser {
                    id: user,
                    username: None,
                },
                conversation_id: id,
                has_seen_latest_message: true,
            }],
            latest_message: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    async fn next_frame(rx: &mut mpsc::Receiver<ServerFrame>) -> ServerFrame {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for frame")
            .expect("channel closed")
    }

    async fn wait_for_subscribers(bus: &EventBus, topic: &str, count: usize) {
        for _ in 0..100 {
            if bus.subscriber_count(topic) == count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("expected {count} subscribers on {topic}");
    }

    #[tokio::test]
    async fn test_init_ack_and_ping() {
        let (mut conn, _rx, _bus) = connection(FanoutPolicy::Broadcast);
        assert_eq!(conn.handle_text(&init_frame(None)), Some(ServerFrame::ConnectionAck));
        assert_eq!(conn.handle_text(r#"{"type":"ping"}"#), Some(ServerFrame::Pong));
        assert!(matches!(
            conn.handle_text(&init_frame(None)),
            Some(ServerFrame::Error { id: None, .. })
        ));
    }

    #[tokio::test]
    async fn test_subscribe_before_init_is_rejected() {
        let (mut conn, _rx, bus) = connection(FanoutPolicy::Broadcast);
        let reply = conn.handle_text(r#"{"type":"subscribe","id":"1","topic":"conversation_created"}"#);
        assert!(matches!(reply, Some(ServerFrame::Error { id: Some(ref id), .. }) if id == "1"));
        assert_eq!(bus.subscriber_count(CONVERSATION_CREATED), 0);
    }

    #[tokio::test]
    async fn test_malformed_frame_reports_error() {
        let (mut conn, _rx, _bus) = connection(FanoutPolicy::Broadcast);
        assert!(matches!(
            conn.handle_text("not json"),
            Some(ServerFrame::Error { id: None, .. })
        ));
    }

    #[tokio::test]
    async fn test_conversation_created_is_forwarded() {
        let me = UserId::new();
        let (mut conn, mut rx, bus) = connection(FanoutPolicy::ParticipantsOnly);
        conn.handle_text(&init_frame(Some(me)));

        let reply = conn.handle_text(r#"{"type":"subscribe","id":"s1","topic":"conversation_created"}"#);
        assert_eq!(reply, None);
        assert_eq!(bus.subscriber_count(CONVERSATION_CREATED), 1);

        let conversation = conversation_with(me);
        bus.publish(
            CONVERSATION_CREATED,
            DomainEvent::ConversationCreated {
                conversation: conversation.clone(),
            },
        );

        match next_frame(&mut rx).await {
            ServerFrame::Next { id, payload } => {
                assert_eq!(id, "s1");
                assert_eq!(payload["id"], json!(conversation.id));
            }
            other => panic!("unexpected frame {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_anonymous_subscription_rejected_under_participants_only() {
        let (mut conn, _rx, bus) = connection(FanoutPolicy::ParticipantsOnly);
        conn.handle_text(&init_frame(None));

        let reply = conn.handle_text(r#"{"type":"subscribe","id":"s1","topic":"conversation_created"}"#);
        assert_eq!(
            reply,
            Some(ServerFrame::Error {
                id: Some("s1".to_string()),
                message: "Not Authorized".to_string(),
            })
        );
        assert_eq!(bus.subscriber_count(CONVERSATION_CREATED), 0);
    }

    #[tokio::test]
    async fn test_message_created_requires_conversation_id() {
        let (mut conn, _rx, _bus) = connection(FanoutPolicy::Broadcast);
        conn.handle_text(&init_frame(None));
        let reply = conn.handle_text(r#"{"type":"subscribe","id":"m","topic":"message_created"}"#);
        assert!(matches!(reply, Some(ServerFrame::Error { .. })));
    }

    #[tokio::test]
    async fn test_message_created_is_forwarded_for_its_conversation() {
        let me = UserId::new();
        let conversation_id = ConversationId::new();
        let (mut conn, mut rx, bus) = connection(FanoutPolicy::ParticipantsOnly);
        conn.handle_text(&init_frame(Some(me)));
        conn.handle_text(
            &json!({
                "type": "subscribe",
                "id": "m1",
                "topic": "message_created",
                "conversation_id": conversation_id,
            })
            .to_string(),
        );

        let message = ChatMessage {
            id: MessageId::new(),
            conversation_id,
            sender: MessageSender {
                id: me,
                username: Some("ada".to_string()),
            },
            body: "hello".to_string(),
            created_at: Utc::now(),
        };
        bus.publish(
            MESSAGE_CREATED,
            DomainEvent::MessageCreated {
                message,
                participant_ids: vec![me],
            },
        );

        match next_frame(&mut rx).await {
            ServerFrame::Next { id, payload } => {
                assert_eq!(id, "m1");
                assert_eq!(payload["body"], "hello");
            }
            other => panic!("unexpected frame {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_duplicate_subscription_id_rejected() {
        let (mut conn, _rx, _bus) = connection(FanoutPolicy::Broadcast);
        conn.handle_text(&init_frame(None));
        let frame = r#"{"type":"subscribe","id":"dup","topic":"conversation_created"}"#;
        assert_eq!(conn.handle_text(frame), None);
        assert!(matches!(conn.handle_text(frame), Some(ServerFrame::Error { .. })));
    }

    #[tokio::test]
    async fn test_complete_and_close_deregister_subscribers() {
        let (mut conn, _rx, bus) = connection(FanoutPolicy::Broadcast);
        conn.handle_text(&init_frame(None));
        conn.handle_text(r#"{"type":"subscribe","id":"a","topic":"conversation_created"}"#);
        conn.handle_text(r#"{"type":"subscribe","id":"b","topic":"conversation_created"}"#);
        assert_eq!(bus.subscriber_count(CONVERSATION_CREATED), 2);

        conn.handle_text(r#"{"type":"complete","id":"a"}"#);
        wait_for_subscribers(&bus, CONVERSATION_CREATED, 1).await;

        conn.close();
        wait_for_subscribers(&bus, CONVERSATION_CREATED, 0).await;
    }

    #[tokio::test]
    async fn test_finished_forwarder_frees_its_id() {
        let (mut conn, rx, mut done_rx, bus) = connection_with_done(FanoutPolicy::Broadcast);
        conn.handle_text(&init_frame(None));
        let frame = r#"{"type":"subscribe","id":"s1","topic":"conversation_created"}"#;
        assert_eq!(conn.handle_text(frame), None);

        // With the outbound side gone the forwarder stops on the next event.
        drop(rx);
        bus.publish(
            CONVERSATION_CREATED,
            DomainEvent::ConversationCreated {
                conversation: conversation_with(UserId::new()),
            },
        );

        let (id, generation) = tokio::time::timeout(Duration::from_secs(1), done_rx.recv())
            .await
            .expect("timed out waiting for forwarder")
            .expect("done channel closed");
        assert_eq!(id, "s1");
        conn.forwarder_finished(&id, generation);
        wait_for_subscribers(&bus, CONVERSATION_CREATED, 0).await;

        assert_eq!(conn.handle_text(frame), None);
        assert_eq!(bus.subscriber_count(CONVERSATION_CREATED), 1);
    }

    #[tokio::test]
    async fn test_stale_finish_keeps_reused_id() {
        let (mut conn, _rx, _done_rx, bus) = connection_with_done(FanoutPolicy::Broadcast);
        conn.handle_text(&init_frame(None));
        let subscribe = r#"{"type":"subscribe","id":"s1","topic":"conversation_created"}"#;
        conn.handle_text(subscribe);
        conn.handle_text(r#"{"type":"complete","id":"s1"}"#);
        conn.handle_text(subscribe);
        wait_for_subscribers(&bus, CONVERSATION_CREATED, 1).await;

        // The first task's report must not evict the second subscription.
        conn.forwarder_finished("s1", 0);
        assert!(matches!(conn.handle_text(subscribe), Some(ServerFrame::Error { .. })));
    }

    #[tokio::test]
    async fn test_client_disconnect_deregisters_subscribers() {
        let bus = Arc::new(EventBus::default());
        let gateway = SubscriptionGateway::new(bus.clone(), FanoutPolicy::Broadcast);

        let (client_tx, server_rx) = mpsc::unbounded_channel::<Result<Message, axum::Error>>();
        let (server_tx, mut client_rx) = mpsc::unbounded_channel::<Message>();
        let incoming = Box::pin(futures_util::stream::unfold(server_rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        }));
        let outgoing = Box::pin(futures_util::sink::unfold(
            server_tx,
            |tx, msg: Message| async move {
                tx.send(msg).map_err(axum::Error::new)?;
                Ok::<_, axum::Error>(tx)
            },
        ));
        let server = tokio::spawn(run_connection(outgoing, incoming, gateway));

        client_tx
            .send(Ok(Message::Text(init_frame(None).into())))
            .unwrap();
        client_tx
            .send(Ok(Message::Text(
                r#"{"type":"subscribe","id":"s1","topic":"conversation_created"}"#.into(),
            )))
            .unwrap();

        let ack = tokio::time::timeout(Duration::from_secs(1), client_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ack, Message::Text(r#"{"type":"connection_ack"}"#.into()));
        wait_for_subscribers(&bus, CONVERSATION_CREATED, 1).await;

        drop(client_tx);
        tokio::time::timeout(Duration::from_secs(1), server)
            .await
            .unwrap()
            .unwrap();
        wait_for_subscribers(&bus, CONVERSATION_CREATED, 0).await;
    }

    #[test]
    fn test_server_frame_wire_format() {
        assert_eq!(
            serde_json::to_value(ServerFrame::ConnectionAck).unwrap(),
            json!({ "type": "connection_ack" })
        );
        assert_eq!(
            serde_json::to_value(ServerFrame::error(Some("x"), "boom")).unwrap(),
            json!({ "type": "error", "id": "x", "message": "boom" })
        );
    }
}
