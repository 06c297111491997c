//! Realtime change feed.
//!
//! Each subscription opens its own websocket, joins one Phoenix channel with a
//! `postgres_changes` binding and forwards matching row changes. Heartbeats
//! keep the socket open; on each one a refreshed access token, if any, is
//! handed to the channel. A lost socket is not reconnected: the event
//! receiver simply closes.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bookmarks_core::change_feed::{
    ChangeEvent, ChangeFeed, ChangeFilter, ChangeKind, Subscription, SubscriptionHandle,
};
use bookmarks_core::config::SyncConfig;
use bookmarks_core::{BookmarkError, Result};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::AccessTokenSource;
use super::client::SupabaseClient;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const JOIN_REF: &str = "1";

/// Phoenix wire message (serializer `vsn=1.0.0`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct PhoenixMessage {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_ref: Option<String>,
}

impl PhoenixMessage {
    pub(crate) fn join(topic: &str, filter: &ChangeFilter, access_token: Option<&str>) -> Self {
        let mut payload = json!({
            "config": {
                "broadcast": { "self": false, "ack": false },
                "presence": { "key": "" },
                "postgres_changes": bindings(filter),
                "private": false,
            }
        });
        if let Some(token) = access_token {
            payload["access_token"] = Value::String(token.to_string());
        }
        Self {
            topic: topic.to_string(),
            event: "phx_join".to_string(),
            payload,
            reference: Some(JOIN_REF.to_string()),
            join_ref: Some(JOIN_REF.to_string()),
        }
    }

    pub(crate) fn heartbeat(reference: u64) -> Self {
        Self {
            topic: "phoenix".to_string(),
            event: "heartbeat".to_string(),
            payload: json!({}),
            reference: Some(reference.to_string()),
            join_ref: None,
        }
    }

    pub(crate) fn leave(topic: &str, reference: u64) -> Self {
        Self {
            topic: topic.to_string(),
            event: "phx_leave".to_string(),
            payload: json!({}),
            reference: Some(reference.to_string()),
            join_ref: Some(JOIN_REF.to_string()),
        }
    }

    /// Hands a refreshed user token to the joined channel.
    pub(crate) fn access_token(topic: &str, token: &str, reference: u64) -> Self {
        Self {
            topic: topic.to_string(),
            event: "access_token".to_string(),
            payload: json!({ "access_token": token }),
            reference: Some(reference.to_string()),
            join_ref: Some(JOIN_REF.to_string()),
        }
    }

    fn to_frame(&self) -> Result<Message> {
        Ok(Message::Text(serde_json::to_string(self)?.into()))
    }
}

/// One `postgres_changes` binding per event name the filter needs.
fn bindings(filter: &ChangeFilter) -> Vec<Value> {
    let events: Vec<&str> = match filter.events.channel_event() {
        Some(event) => vec![event],
        None => [
            (ChangeKind::Insert, "INSERT"),
            (ChangeKind::Update, "UPDATE"),
            (ChangeKind::Delete, "DELETE"),
        ]
        .into_iter()
        .filter(|(kind, _)| filter.events.contains(*kind))
        .map(|(_, name)| name)
        .collect(),
    };

    events
        .into_iter()
        .map(|event| {
            let mut binding = json!({
                "event": event,
                "schema": filter.schema,
                "table": filter.table,
            });
            if let Some(owner) = &filter.owner_id {
                binding["filter"] = Value::String(format!("user_id=eq.{}", owner));
            }
            binding
        })
        .collect()
}

/// Extracts the row change from a `postgres_changes` payload.
pub(crate) fn decode_change(payload: &Value) -> Option<ChangeEvent> {
    let data = payload.get("data")?;
    let kind: ChangeKind = serde_json::from_value(data.get("type")?.clone()).ok()?;
    let table = data.get("table")?.as_str()?.to_string();
    // Deletes only carry the old row, and only its key unless the table has
    // full replica identity.
    let owner_id = ["record", "old_record"].iter().find_map(|key| {
        data.get(*key)?
            .get("user_id")?
            .as_str()
            .map(str::to_string)
    });
    Some(ChangeEvent {
        kind,
        table,
        owner_id,
    })
}

/// Client-side check on top of the server-side binding.
///
/// Events without an owner are let through: the server already applied the
/// owner filter where it could.
pub(crate) fn accepts(filter: &ChangeFilter, event: &ChangeEvent) -> bool {
    if event.table != filter.table || !filter.events.contains(event.kind) {
        return false;
    }
    match (&filter.owner_id, &event.owner_id) {
        (Some(wanted), Some(owner)) => wanted == owner,
        _ => true,
    }
}

struct ChannelTask {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// [`ChangeFeed`] over the Realtime websocket.
pub struct RealtimeFeed {
    socket_url: Url,
    channel: String,
    heartbeat: Duration,
    tokens: Arc<dyn AccessTokenSource>,
    next_id: AtomicU64,
    channels: Mutex<HashMap<u64, ChannelTask>>,
}

impl RealtimeFeed {
    pub fn new(client: &SupabaseClient, sync: &SyncConfig, tokens: Arc<dyn AccessTokenSource>) -> Result<Self> {
        Ok(Self {
            socket_url: socket_url(client.base_url(), client.anon_key())?,
            channel: sync.channel.clone(),
            heartbeat: Duration::from_secs(sync.heartbeat_interval_secs.max(1)),
            tokens,
            next_id: AtomicU64::new(0),
            channels: Mutex::new(HashMap::new()),
        })
    }

    fn topic(&self) -> String {
        format!("realtime:{}", self.channel)
    }
}

/// `wss://<host>/realtime/v1/websocket?apikey=<key>&vsn=1.0.0`
pub(crate) fn socket_url(base: &Url, anon_key: &str) -> Result<Url> {
    let mut url = base
        .join("realtime/v1/websocket")
        .map_err(|e| BookmarkError::config(format!("Invalid realtime endpoint: {}", e)))?;
    let scheme = match url.scheme() {
        "https" => "wss",
        "http" => "ws",
        other => {
            return Err(BookmarkError::config(format!(
                "Unsupported backend URL scheme '{}'",
                other
            )));
        }
    };
    url.set_scheme(scheme)
        .map_err(|()| BookmarkError::config("Cannot derive websocket URL"))?;
    url.query_pairs_mut()
        .append_pair("apikey", anon_key)
        .append_pair("vsn", "1.0.0");
    Ok(url)
}

#[async_trait]
impl ChangeFeed for RealtimeFeed {
    async fn subscribe(&self, filter: ChangeFilter) -> Result<Subscription> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let topic = self.topic();

        let (socket, _response) = connect_async(self.socket_url.as_str())
            .await
            .map_err(|e| BookmarkError::subscription(format!("Realtime connect failed: {}", e)))?;
        let (mut sink, stream) = socket.split();

        let access_token = self.tokens.access_token().await;
        let join = PhoenixMessage::join(&topic, &filter, access_token.as_deref());
        sink.send(join.to_frame()?)
            .await
            .map_err(|e| BookmarkError::subscription(format!("Channel join failed: {}", e)))?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_channel(ChannelLoop {
            id,
            topic,
            filter,
            heartbeat: self.heartbeat,
            tokens: self.tokens.clone(),
            access_token,
            sink,
            stream,
            events: events_tx,
            cancel: cancel.clone(),
        }));

        self.channels
            .lock()
            .await
            .insert(id, ChannelTask { cancel, task });
        tracing::info!("[Realtime] Subscription {} joined realtime:{}", id, self.channel);

        Ok(Subscription {
            handle: SubscriptionHandle::new(id),
            events: events_rx,
        })
    }

    async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<()> {
        let id = handle.id();
        let channel = self
            .channels
            .lock()
            .await
            .remove(&id)
            .ok_or_else(|| BookmarkError::not_found("subscription", id.to_string()))?;

        channel.cancel.cancel();
        if let Err(e) = channel.task.await {
            tracing::warn!("[Realtime] Channel task {} ended abnormally: {}", id, e);
        }
        tracing::info!("[Realtime] Subscription {} left", id);
        Ok(())
    }
}

struct ChannelLoop {
    id: u64,
    topic: String,
    filter: ChangeFilter,
    heartbeat: Duration,
    tokens: Arc<dyn AccessTokenSource>,
    /// Token the server currently holds for this channel
    access_token: Option<String>,
    sink: SplitSink<Socket, Message>,
    stream: SplitStream<Socket>,
    events: mpsc::UnboundedSender<ChangeEvent>,
    cancel: CancellationToken,
}

impl ChannelLoop {
    async fn push(&mut self, message: PhoenixMessage) -> Result<()> {
        self.sink
            .send(message.to_frame()?)
            .await
            .map_err(|e| BookmarkError::subscription(format!("{} failed: {}", message.event, e)))
    }

    /// Sends the current access token if it changed since the join.
    ///
    /// The server closes channels whose token expired, so a refreshed token
    /// has to reach it before the old one runs out.
    async fn renew_token(&mut self, reference: u64) -> Result<bool> {
        let Some(token) = self.tokens.access_token().await else {
            return Ok(false);
        };
        if self.access_token.as_deref() == Some(token.as_str()) {
            return Ok(false);
        }
        self.push(PhoenixMessage::access_token(&self.topic, &token, reference))
            .await?;
        self.access_token = Some(token);
        Ok(true)
    }
}

/// What the loop does after handling one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

async fn run_channel(mut channel: ChannelLoop) {
    let start = tokio::time::Instant::now() + channel.heartbeat;
    let mut ticker = tokio::time::interval_at(start, channel.heartbeat);
    let mut next_ref: u64 = 2;

    loop {
        tokio::select! {
            biased;
            _ = channel.cancel.cancelled() => {
                let leave = PhoenixMessage::leave(&channel.topic, next_ref);
                if let Err(e) = channel.push(leave).await {
                    tracing::debug!("[Realtime] Subscription {}: {}", channel.id, e);
                }
                let _ = channel.sink.close().await;
                break;
            }
            _ = ticker.tick() => {
                let heartbeat = PhoenixMessage::heartbeat(next_ref);
                next_ref += 1;
                if let Err(e) = channel.push(heartbeat).await {
                    tracing::warn!("[Realtime] Heartbeat on subscription {} failed, stopping: {}", channel.id, e);
                    break;
                }
                match channel.renew_token(next_ref).await {
                    Ok(true) => {
                        next_ref += 1;
                        tracing::debug!("[Realtime] Sent refreshed token on subscription {}", channel.id);
                    }
                    Ok(false) => {}
                    Err(e) => {
                        tracing::warn!("[Realtime] Token renewal on subscription {} failed, stopping: {}", channel.id, e);
                        break;
                    }
                }
            }
            frame = channel.stream.next() => {
                let flow = match frame {
                    Some(Ok(Message::Text(text))) => {
                        handle_text(channel.id, &channel.filter, &channel.events, text.as_str())
                    }
                    Some(Ok(Message::Close(frame))) => {
                        tracing::warn!("[Realtime] Server closed subscription {}: {:?}", channel.id, frame);
                        Flow::Stop
                    }
                    Some(Ok(_)) => Flow::Continue,
                    Some(Err(e)) => {
                        tracing::warn!("[Realtime] Socket error on subscription {}: {}", channel.id, e);
                        Flow::Stop
                    }
                    None => {
                        tracing::warn!("[Realtime] Socket for subscription {} closed", channel.id);
                        Flow::Stop
                    }
                };
                if flow == Flow::Stop {
                    break;
                }
            }
        }
    }
    // Dropping the sender closes the subscriber's receiver.
}

fn handle_text(
    id: u64,
    filter: &ChangeFilter,
    events: &mpsc::UnboundedSender<ChangeEvent>,
    text: &str,
) -> Flow {
    let message: PhoenixMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!("[Realtime] Ignoring undecodable frame: {}", e);
            return Flow::Continue;
        }
    };

    match message.event.as_str() {
        "postgres_changes" => {
            let Some(event) = decode_change(&message.payload) else {
                tracing::debug!("[Realtime] Ignoring postgres_changes without row data");
                return Flow::Continue;
            };
            if !accepts(filter, &event) {
                return Flow::Continue;
            }
            tracing::debug!("[Realtime] {:?} on {} for subscription {}", event.kind, event.table, id);
            if events.send(event).is_err() {
                // Subscriber is gone
                return Flow::Stop;
            }
            Flow::Continue
        }
        "phx_reply" => {
            let status = message.payload.get("status").and_then(Value::as_str);
            if status == Some("ok") {
                return Flow::Continue;
            }
            tracing::warn!(
                "[Realtime] {} rejected on subscription {}: {}",
                if message.reference.as_deref() == Some(JOIN_REF) { "Join" } else { "Request" },
                id,
                message.payload
            );
            Flow::Stop
        }
        "phx_error" | "phx_close" => {
            tracing::warn!("[Realtime] Channel {} on subscription {}", message.event, id);
            Flow::Stop
        }
        "system" => {
            if message.payload.get("status").and_then(Value::as_str) == Some("error") {
                tracing::warn!("[Realtime] System error on subscription {}: {}", id, message.payload);
            }
            Flow::Continue
        }
        _ => Flow::Continue,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookmarks_core::change_feed::EventMask;
    use bookmarks_core::config::BackendConfig;
    use std::sync::Mutex as StdMutex;
    use tokio::net::TcpListener;

    #[test]
    fn test_socket_url() {
        let base = Url::parse("https://abcd.supabase.co/").unwrap();
        let url = socket_url(&base, "anon").unwrap();
        assert_eq!(
            url.as_str(),
            "wss://abcd.supabase.co/realtime/v1/websocket?apikey=anon&vsn=1.0.0"
        );

        let local = Url::parse("http://127.0.0.1:54321/").unwrap();
        assert_eq!(socket_url(&local, "k").unwrap().scheme(), "ws");
    }

    #[test]
    fn test_join_message_unscoped() {
        let filter = ChangeFilter::table("public", "bookmarks");
        let join = PhoenixMessage::join("realtime:realtime-bookmarks", &filter, Some("jwt"));
        let value = serde_json::to_value(&join).unwrap();

        assert_eq!(value["event"], "phx_join");
        assert_eq!(value["ref"], "1");
        assert_eq!(value["join_ref"], "1");
        assert_eq!(value["payload"]["access_token"], "jwt");
        let bindings = value["payload"]["config"]["postgres_changes"].as_array().unwrap();
        assert_eq!(bindings.len(), 1);
        assert_eq!(
            bindings[0],
            json!({ "event": "*", "schema": "public", "table": "bookmarks" })
        );
    }

    #[test]
    fn test_join_message_scoped_and_split_events() {
        let mut filter = ChangeFilter::table("public", "bookmarks").scoped_to("u1");
        filter.events = EventMask {
            insert: true,
            update: false,
            delete: true,
        };
        let join = PhoenixMessage::join("realtime:x", &filter, None);

        assert!(join.payload.get("access_token").is_none());
        let bindings = join.payload["config"]["postgres_changes"].as_array().unwrap();
        let events: Vec<&str> = bindings.iter().map(|b| b["event"].as_str().unwrap()).collect();
        assert_eq!(events, vec!["INSERT", "DELETE"]);
        assert!(bindings.iter().all(|b| b["filter"] == "user_id=eq.u1"));
    }

    #[test]
    fn test_heartbeat_and_leave() {
        let heartbeat = serde_json::to_value(PhoenixMessage::heartbeat(7)).unwrap();
        assert_eq!(
            heartbeat,
            json!({ "topic": "phoenix", "event": "heartbeat", "payload": {}, "ref": "7" })
        );
        let leave = PhoenixMessage::leave("realtime:x", 8);
        assert_eq!(leave.event, "phx_leave");
        assert_eq!(leave.join_ref.as_deref(), Some("1"));
    }

    #[test]
    fn test_access_token_message() {
        let message = serde_json::to_value(PhoenixMessage::access_token("realtime:x", "jwt-2", 9)).unwrap();
        assert_eq!(
            message,
            json!({
                "topic": "realtime:x",
                "event": "access_token",
                "payload": { "access_token": "jwt-2" },
                "ref": "9",
                "join_ref": "1",
            })
        );
    }

    #[test]
    fn test_decode_insert_frame() {
        let frame = r#"{
            "topic": "realtime:realtime-bookmarks",
            "event": "postgres_changes",
            "ref": null,
            "payload": {
                "ids": [123],
                "data": {
                    "schema": "public",
                    "table": "bookmarks",
                    "commit_timestamp": "2024-05-01T10:00:00Z",
                    "type": "INSERT",
                    "record": { "id": "b1", "title": "Docs", "user_id": "u1" },
                    "errors": null
                }
            }
        }"#;
        let message: PhoenixMessage = serde_json::from_str(frame).unwrap();
        assert_eq!(message.reference, None);

        let event = decode_change(&message.payload).unwrap();
        assert_eq!(event.kind, ChangeKind::Insert);
        assert_eq!(event.table, "bookmarks");
        assert_eq!(event.owner_id.as_deref(), Some("u1"));
    }

    #[test]
    fn test_decode_delete_without_owner() {
        let payload = json!({
            "data": {
                "table": "bookmarks",
                "type": "DELETE",
                "old_record": { "id": "b1" }
            }
        });
        let event = decode_change(&payload).unwrap();
        assert_eq!(event.kind, ChangeKind::Delete);
        assert_eq!(event.owner_id, None);

        assert!(decode_change(&json!({ "data": { "table": "bookmarks", "type": "TRUNCATE" } })).is_none());
    }

    #[test]
    fn test_accepts() {
        let scoped = ChangeFilter::table("public", "bookmarks").scoped_to("u1");
        let event = |owner: Option<&str>| ChangeEvent {
            kind: ChangeKind::Delete,
            table: "bookmarks".to_string(),
            owner_id: owner.map(str::to_string),
        };
        assert!(accepts(&scoped, &event(Some("u1"))));
        assert!(!accepts(&scoped, &event(Some("u2"))));
        assert!(accepts(&scoped, &event(None)));
    }

    // ============================================================================
    // Inbound frames
    // ============================================================================

    fn frame(event: &str, payload: Value) -> String {
        json!({ "topic": "realtime:x", "event": event, "payload": payload, "ref": "1" }).to_string()
    }

    fn insert_by(owner: &str) -> String {
        frame(
            "postgres_changes",
            json!({
                "data": {
                    "table": "bookmarks",
                    "type": "INSERT",
                    "record": { "id": "b1", "user_id": owner }
                }
            }),
        )
    }

    #[test]
    fn test_handle_text_forwards_own_changes_only() {
        let filter = ChangeFilter::table("public", "bookmarks").scoped_to("u1");
        let (tx, mut rx) = mpsc::unbounded_channel();

        assert_eq!(handle_text(1, &filter, &tx, &insert_by("u2")), Flow::Continue);
        assert!(rx.try_recv().is_err());

        assert_eq!(handle_text(1, &filter, &tx, &insert_by("u1")), Flow::Continue);
        assert_eq!(rx.try_recv().unwrap().owner_id.as_deref(), Some("u1"));

        assert_eq!(handle_text(1, &filter, &tx, "not json"), Flow::Continue);
    }

    #[test]
    fn test_handle_text_stops_when_subscriber_is_gone() {
        let filter = ChangeFilter::table("public", "bookmarks");
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        assert_eq!(handle_text(1, &filter, &tx, &insert_by("u1")), Flow::Stop);
    }

    #[test]
    fn test_handle_text_channel_lifecycle() {
        let filter = ChangeFilter::table("public", "bookmarks");
        let (tx, _rx) = mpsc::unbounded_channel();

        let ok = frame("phx_reply", json!({ "status": "ok", "response": {} }));
        assert_eq!(handle_text(1, &filter, &tx, &ok), Flow::Continue);

        let rejected = frame(
            "phx_reply",
            json!({ "status": "error", "response": { "reason": "unauthorized" } }),
        );
        assert_eq!(handle_text(1, &filter, &tx, &rejected), Flow::Stop);
        assert_eq!(handle_text(1, &filter, &tx, &frame("phx_error", json!({}))), Flow::Stop);
        assert_eq!(handle_text(1, &filter, &tx, &frame("phx_close", json!({}))), Flow::Stop);

        let system = frame("system", json!({ "status": "error", "message": "rls" }));
        assert_eq!(handle_text(1, &filter, &tx, &system), Flow::Continue);
    }

    // ============================================================================
    // Channel over a loopback websocket
    // ============================================================================

    type ServerSocket = WebSocketStream<TcpStream>;

    struct SwappableToken(StdMutex<Option<String>>);

    impl SwappableToken {
        fn new(token: &str) -> Arc<Self> {
            Arc::new(Self(StdMutex::new(Some(token.to_string()))))
        }

        fn set(&self, token: &str) {
            *self.0.lock().unwrap() = Some(token.to_string());
        }
    }

    #[async_trait]
    impl AccessTokenSource for SwappableToken {
        async fn access_token(&self) -> Option<String> {
            self.0.lock().unwrap().clone()
        }
    }

    async fn loopback_feed(heartbeat_secs: u64, tokens: Arc<SwappableToken>) -> (RealtimeFeed, TcpListener) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let client = SupabaseClient::new(&BackendConfig {
            url: format!("http://{}", listener.local_addr().unwrap()),
            anon_key: "anon".to_string(),
            ..Default::default()
        })
        .unwrap();
        let sync = SyncConfig {
            heartbeat_interval_secs: heartbeat_secs,
            ..Default::default()
        };
        (RealtimeFeed::new(&client, &sync, tokens).unwrap(), listener)
    }

    async fn accept(listener: TcpListener) -> ServerSocket {
        let (stream, _) = listener.accept().await.unwrap();
        tokio_tungstenite::accept_async(stream).await.unwrap()
    }

    async fn next_message(socket: &mut ServerSocket) -> Option<PhoenixMessage> {
        while let Some(frame) = socket.next().await {
            match frame {
                Ok(Message::Text(text)) => return Some(serde_json::from_str(text.as_str()).unwrap()),
                Ok(Message::Close(_)) | Err(_) => return None,
                Ok(_) => {}
            }
        }
        None
    }

    /// Reads until a message with `event` arrives.
    async fn expect_event(socket: &mut ServerSocket, event: &str) -> PhoenixMessage {
        loop {
            let message = next_message(socket).await.unwrap();
            if message.event == event {
                return message;
            }
        }
    }

    async fn push(socket: &mut ServerSocket, text: String) {
        socket.send(Message::Text(text.into())).await.unwrap();
    }

    #[tokio::test]
    async fn test_scoped_channel_forwards_and_leaves_on_unsubscribe() {
        let (feed, listener) = loopback_feed(60, SwappableToken::new("jwt-1")).await;
        let server = tokio::spawn(async move {
            let mut socket = accept(listener).await;
            let join = expect_event(&mut socket, "phx_join").await;
            assert_eq!(join.topic, "realtime:realtime-bookmarks");
            assert_eq!(join.payload["access_token"], "jwt-1");

            push(&mut socket, frame("phx_reply", json!({ "status": "ok", "response": {} }))).await;
            push(&mut socket, insert_by("u2")).await;
            push(&mut socket, insert_by("u1")).await;

            expect_event(&mut socket, "phx_leave").await
        });

        let filter = ChangeFilter::table("public", "bookmarks").scoped_to("u1");
        let Subscription { handle, mut events } = feed.subscribe(filter).await.unwrap();

        let event = tokio::time::timeout(Duration::from_secs(3), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.owner_id.as_deref(), Some("u1"));

        feed.unsubscribe(handle).await.unwrap();
        let leave = tokio::time::timeout(Duration::from_secs(3), server)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(leave.topic, "realtime:realtime-bookmarks");
        assert_eq!(events.recv().await, None);
    }

    #[tokio::test]
    async fn test_rejected_join_closes_events() {
        let (feed, listener) = loopback_feed(60, SwappableToken::new("jwt-1")).await;
        let server = tokio::spawn(async move {
            let mut socket = accept(listener).await;
            expect_event(&mut socket, "phx_join").await;
            push(
                &mut socket,
                frame("phx_reply", json!({ "status": "error", "response": { "reason": "unauthorized" } })),
            )
            .await;
            // Client hangs up.
            while next_message(&mut socket).await.is_some() {}
        });

        let Subscription { handle, mut events } = feed
            .subscribe(ChangeFilter::table("public", "bookmarks"))
            .await
            .unwrap();
        let closed = tokio::time::timeout(Duration::from_secs(3), events.recv())
            .await
            .unwrap();
        assert_eq!(closed, None);

        feed.unsubscribe(handle).await.unwrap();
        tokio::time::timeout(Duration::from_secs(3), server)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_refreshed_token_is_sent_to_channel() {
        let tokens = SwappableToken::new("jwt-1");
        let (feed, listener) = loopback_feed(1, tokens.clone()).await;
        let server = tokio::spawn(async move {
            let mut socket = accept(listener).await;
            expect_event(&mut socket, "phx_join").await;
            push(&mut socket, frame("phx_reply", json!({ "status": "ok", "response": {} }))).await;
            expect_event(&mut socket, "access_token").await
        });

        let Subscription { handle, events: _events } = feed
            .subscribe(ChangeFilter::table("public", "bookmarks"))
            .await
            .unwrap();
        tokens.set("jwt-2");

        let renewal = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(renewal.topic, "realtime:realtime-bookmarks");
        assert_eq!(renewal.payload["access_token"], "jwt-2");
        assert_eq!(renewal.join_ref.as_deref(), Some("1"));

        feed.unsubscribe(handle).await.unwrap();
    }
}
