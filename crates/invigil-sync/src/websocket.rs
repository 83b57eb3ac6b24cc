//! WebSocket sync-channel client using `tokio-tungstenite`.
//!
//! Connects to the platform's push service, sends a subscribe op per
//! channel, and fans incoming [`EventFrame`]s out to the matching
//! subscriptions. One read task owns the socket; subscriptions talk to
//! it through a command channel, so the socket never needs a lock on
//! the hot path.

use std::collections::HashMap;

use futures_util::{SinkExt, StreamExt};
use invigil_protocol::EventFrame;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use crate::{Subscription, SyncChannel, SyncError};

/// Client → push-service operations.
#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum ClientOp<'a> {
    Subscribe { channel: &'a str },
    Unsubscribe { channel: &'a str },
}

enum Command {
    Subscribe {
        channel: String,
        reply: oneshot::Sender<Result<Subscription, SyncError>>,
    },
}

/// A [`SyncChannel`] over a WebSocket connection.
///
/// Cheap to clone — all clones share the connection task. Dropping the
/// last clone *and* all subscriptions ends the task.
#[derive(Clone)]
pub struct WebSocketSync {
    commands: mpsc::UnboundedSender<Command>,
}

impl WebSocketSync {
    /// Connects to the push service at `url` (e.g.
    /// `wss://push.example.edu/live`).
    pub async fn connect(url: &str) -> Result<Self, SyncError> {
        let (ws, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| SyncError::ConnectFailed(e.to_string()))?;
        debug!(url, "sync channel connected");

        let (commands, command_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_connection(ws, command_rx));

        Ok(Self { commands })
    }
}

impl SyncChannel for WebSocketSync {
    type Error = SyncError;

    async fn subscribe(&self, channel: &str) -> Result<Subscription, SyncError> {
        let (reply, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::Subscribe {
                channel: channel.to_string(),
                reply,
            })
            .map_err(|_| SyncError::SubscribeFailed(channel.to_string()))?;
        reply_rx
            .await
            .map_err(|_| SyncError::SubscribeFailed(channel.to_string()))?
    }
}

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// The connection task: routes incoming frames to subscribers and
/// services subscribe requests. Exits when the socket closes or every
/// handle and subscription is gone.
async fn run_connection(
    mut ws: WsStream,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    let mut subscribers: HashMap<String, Vec<mpsc::UnboundedSender<EventFrame>>> =
        HashMap::new();
    let mut handles_open = true;

    loop {
        tokio::select! {
            cmd = commands.recv(), if handles_open => match cmd {
                Some(Command::Subscribe { channel, reply }) => {
                    let op = ClientOp::Subscribe { channel: &channel };
                    let result = send_op(&mut ws, &op).await.map(|()| {
                        let (tx, rx) = mpsc::unbounded_channel();
                        subscribers.entry(channel.clone()).or_default().push(tx);
                        Subscription::new(channel.clone(), rx)
                    });
                    let _ = reply.send(result);
                }
                // All handles dropped; keep serving live subscriptions
                // until the socket closes.
                None => handles_open = false,
            },
            msg = ws.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    dispatch(&mut subscribers, &mut ws, text.as_bytes()).await;
                }
                Some(Ok(Message::Binary(data))) => {
                    dispatch(&mut subscribers, &mut ws, &data).await;
                }
                Some(Ok(Message::Close(_))) | None => {
                    debug!("sync connection closed");
                    break;
                }
                Some(Ok(_)) => {} // ping/pong/frame
                Some(Err(e)) => {
                    warn!(error = %e, "sync connection error");
                    break;
                }
            },
        }
    }
}

/// Decodes a frame and delivers it to the channel's live subscribers.
/// Channels whose last subscriber has gone away are unsubscribed.
async fn dispatch(
    subscribers: &mut HashMap<String, Vec<mpsc::UnboundedSender<EventFrame>>>,
    ws: &mut WsStream,
    data: &[u8],
) {
    let frame: EventFrame = match serde_json::from_slice(data) {
        Ok(frame) => frame,
        Err(e) => {
            // The service may add event kinds before every client
            // updates; anything undecodable is skipped, not fatal.
            debug!(error = %e, "ignoring undecodable sync frame");
            return;
        }
    };

    let Some(subs) = subscribers.get_mut(&frame.channel) else {
        return;
    };
    subs.retain(|sender| sender.send(frame.clone()).is_ok());

    if subs.is_empty() {
        let channel = frame.channel.clone();
        subscribers.remove(&channel);
        let op = ClientOp::Unsubscribe { channel: &channel };
        if let Err(e) = send_op(ws, &op).await {
            debug!(error = %e, channel, "unsubscribe failed");
        }
    }
}

async fn send_op(ws: &mut WsStream, op: &ClientOp<'_>) -> Result<(), SyncError> {
    let text = serde_json::to_string(op)
        .map_err(|e| SyncError::ConnectFailed(e.to_string()))?;
    ws.send(Message::Text(text.into()))
        .await
        .map_err(|_| SyncError::ChannelClosed)
}
