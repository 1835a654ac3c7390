//! Supabase Realtime feed over the Phoenix channel protocol.
//!
//! Each subscription runs one websocket task that joins
//! `realtime:{table}_{thread}` with a `postgres_changes` filter on
//! `video_id`, forwards row changes into the subscription channel and
//! reconnects with capped backoff. A rejected join also counts as a lost
//! connection. Changes committed while disconnected are not replayed by the
//! server, so every rejoin after the first is announced as
//! [`FeedEvent::Resync`]. Unsubscribing aborts the task.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use url::Url;

use super::SupabaseEndpoint;
use crate::error::RemoteError;
use crate::models::{Comment, CommentId, ThreadId};
use crate::remote::{ChangeEvent, ChangeKind, CommentFeed, FeedEvent, Subscription};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct RealtimeCommentFeed {
    endpoint: SupabaseEndpoint,
    access_token: Option<String>,
}

impl RealtimeCommentFeed {
    pub const fn new(endpoint: SupabaseEndpoint) -> Self {
        Self {
            endpoint,
            access_token: None,
        }
    }

    /// Join channels as a signed-in user instead of the anon role.
    #[must_use]
    pub fn with_access_token(mut self, access_token: Option<String>) -> Self {
        self.access_token = access_token;
        self
    }
}

impl CommentFeed for RealtimeCommentFeed {
    fn subscribe(&self, thread_id: &ThreadId) -> Result<Subscription, RemoteError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|error| RemoteError::transport(format!("Realtime needs a Tokio runtime: {error}")))?;
        let url = self
            .endpoint
            .realtime_url()
            .map_err(|error| RemoteError::transport(error.to_string()))?;

        let channel = ChannelSpec {
            url,
            topic: channel_topic(self.endpoint.table(), thread_id),
            table: self.endpoint.table().to_string(),
            thread_id: thread_id.clone(),
            access_token: self
                .access_token
                .clone()
                .unwrap_or_else(|| self.endpoint.anon_key().to_string()),
        };

        let (sender, receiver) = mpsc::unbounded_channel();
        let task = runtime.spawn(run_channel(channel, sender));
        Ok(Subscription::new(thread_id.clone(), receiver, move || {
            task.abort();
        }))
    }
}

struct ChannelSpec {
    url: Url,
    topic: String,
    table: String,
    thread_id: ThreadId,
    access_token: String,
}

#[derive(Debug, PartialEq, Eq)]
enum SessionEnd {
    /// Subscriber went away.
    Closed,
    /// Connection dropped or the join was refused; reconnect.
    Lost(String),
}

/// Reconnect bookkeeping shared by successive sessions of one channel.
#[derive(Debug)]
struct ChannelState {
    backoff: Duration,
    joined_once: bool,
}

impl Default for ChannelState {
    fn default() -> Self {
        Self {
            backoff: INITIAL_BACKOFF,
            joined_once: false,
        }
    }
}

async fn run_channel(channel: ChannelSpec, sender: mpsc::UnboundedSender<FeedEvent>) {
    let mut state = ChannelState::default();
    loop {
        match run_session(&channel, &sender, &mut state).await {
            SessionEnd::Closed => break,
            SessionEnd::Lost(reason) => {
                tracing::warn!(
                    topic = %channel.topic,
                    "Realtime connection lost: {reason}; retrying in {}s",
                    state.backoff.as_secs()
                );
            }
        }
        if sender.is_closed() {
            break;
        }
        tokio::time::sleep(state.backoff).await;
        state.backoff = (state.backoff * 2).min(MAX_BACKOFF);
    }
    tracing::debug!(topic = %channel.topic, "Realtime channel task finished");
}

async fn run_session(
    channel: &ChannelSpec,
    sender: &mpsc::UnboundedSender<FeedEvent>,
    state: &mut ChannelState,
) -> SessionEnd {
    let (socket, _) = match connect_async(channel.url.as_str()).await {
        Ok(connected) => connected,
        Err(error) => return SessionEnd::Lost(error.to_string()),
    };
    let (mut sink, mut stream) = socket.split();

    let mut next_ref = 1_u64;
    let join = join_message(channel, next_ref);
    if let Err(error) = sink.send(WsMessage::Text(join.to_string())).await {
        return SessionEnd::Lost(error.to_string());
    }
    tracing::debug!(topic = %channel.topic, "Joined realtime channel");

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await;

    loop {
        tokio::select! {
            () = sender.closed() => return SessionEnd::Closed,
            _ = heartbeat.tick() => {
                next_ref += 1;
                let beat = heartbeat_message(next_ref);
                if let Err(error) = sink.send(WsMessage::Text(beat.to_string())).await {
                    return SessionEnd::Lost(error.to_string());
                }
            }
            message = stream.next() => {
                let text = match message {
                    Some(Ok(WsMessage::Text(text))) => text,
                    Some(Ok(WsMessage::Close(_))) | None => {
                        return SessionEnd::Lost("socket closed".to_string());
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(error)) => return SessionEnd::Lost(error.to_string()),
                };
                match parse_message(&text, &channel.topic, &channel.thread_id) {
                    Ok(inbound) => {
                        if let Some(end) = handle_inbound(inbound, sender, state) {
                            return end;
                        }
                    }
                    Err(error) => {
                        tracing::warn!(topic = %channel.topic, "Dropping realtime message: {error}");
                    }
                }
            }
        }
    }
}

/// Apply one parsed message. `Some` ends the session.
fn handle_inbound(
    inbound: Inbound,
    sender: &mpsc::UnboundedSender<FeedEvent>,
    state: &mut ChannelState,
) -> Option<SessionEnd> {
    match inbound {
        Inbound::Change(event) => sender
            .send(FeedEvent::Change(*event))
            .is_err()
            .then_some(SessionEnd::Closed),
        Inbound::Joined => {
            state.backoff = INITIAL_BACKOFF;
            if state.joined_once && sender.send(FeedEvent::Resync).is_err() {
                return Some(SessionEnd::Closed);
            }
            state.joined_once = true;
            None
        }
        Inbound::Rejected(reason) => Some(SessionEnd::Lost(format!("join rejected: {reason}"))),
        Inbound::Ignored => None,
    }
}

fn channel_topic(table: &str, thread_id: &ThreadId) -> String {
    format!("realtime:{table}_{thread_id}")
}

fn join_message(channel: &ChannelSpec, reference: u64) -> Value {
    json!({
        "topic": channel.topic,
        "event": "phx_join",
        "payload": {
            "config": {
                "broadcast": { "self": false },
                "presence": { "key": "" },
                "postgres_changes": [{
                    "event": "*",
                    "schema": "public",
                    "table": channel.table,
                    "filter": format!("video_id=eq.{}", channel.thread_id),
                }],
            },
            "access_token": channel.access_token,
        },
        "ref": reference.to_string(),
        "join_ref": reference.to_string(),
    })
}

fn heartbeat_message(reference: u64) -> Value {
    json!({
        "topic": "phoenix",
        "event": "heartbeat",
        "payload": {},
        "ref": reference.to_string(),
    })
}

#[derive(Debug, PartialEq, Eq)]
enum Inbound {
    Change(Box<ChangeEvent>),
    Joined,
    Rejected(String),
    Ignored,
}

#[derive(Debug, Deserialize)]
struct PhoenixMessage {
    topic: String,
    event: String,
    #[serde(default)]
    payload: Value,
}

#[derive(Debug, Deserialize)]
struct PostgresChangesPayload {
    data: PostgresChange,
}

#[derive(Debug, Deserialize)]
struct PostgresChange {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    record: Option<Value>,
    #[serde(default)]
    old_record: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RecordKey {
    id: CommentId,
}

fn parse_message(text: &str, topic: &str, thread_id: &ThreadId) -> Result<Inbound, RemoteError> {
    let message: PhoenixMessage = serde_json::from_str(text).map_err(invalid_payload)?;
    if message.topic != topic {
        return Ok(Inbound::Ignored);
    }

    match message.event.as_str() {
        "postgres_changes" => {
            let payload: PostgresChangesPayload =
                serde_json::from_value(message.payload).map_err(invalid_payload)?;
            change_event(payload.data, thread_id).map(|event| Inbound::Change(Box::new(event)))
        }
        "phx_reply" => {
            let status = message.payload.get("status").and_then(Value::as_str);
            if status == Some("ok") {
                Ok(Inbound::Joined)
            } else {
                let reason = message
                    .payload
                    .pointer("/response/reason")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown reason");
                Ok(Inbound::Rejected(reason.to_string()))
            }
        }
        "phx_error" => Ok(Inbound::Rejected("channel error".to_string())),
        _ => Ok(Inbound::Ignored),
    }
}

fn change_event(change: PostgresChange, thread_id: &ThreadId) -> Result<ChangeEvent, RemoteError> {
    let kind = change.kind.parse::<ChangeKind>()?;
    match kind {
        ChangeKind::Insert | ChangeKind::Update => {
            let record = change
                .record
                .ok_or_else(|| RemoteError::transport(format!("{kind} event without record")))?;
            let comment: Comment = serde_json::from_value(record).map_err(invalid_payload)?;
            Ok(if kind == ChangeKind::Insert {
                ChangeEvent::insert(comment)
            } else {
                ChangeEvent::update(comment)
            })
        }
        ChangeKind::Delete => {
            let record = change
                .old_record
                .ok_or_else(|| RemoteError::transport("DELETE event without old_record"))?;
            let key: RecordKey = serde_json::from_value(record).map_err(invalid_payload)?;
            Ok(ChangeEvent::delete(thread_id.clone(), key.id))
        }
    }
}

#[allow(clippy::needless_pass_by_value)]
fn invalid_payload(error: serde_json::Error) -> RemoteError {
    RemoteError::transport(format!("Invalid realtime payload: {error}"))
}
