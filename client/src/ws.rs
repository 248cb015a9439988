//! WebSocket push channel.
//!
//! Connects to the server root, sends the authorization handshake, then turns
//! every text frame into a [`PushMessage`]. Frames that do not parse are
//! logged and dropped.

use crate::Result;
use futures::{SinkExt, StreamExt};
use tether_engine::{AuthorizationMessage, PushMessage};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// An open push channel.
///
/// Messages are buffered until read with [`PushSubscription::next`]. Dropping
/// the subscription stops the reader task without waiting for it.
#[derive(Debug)]
pub struct PushSubscription {
    /// Unique identifier for this connection, for log correlation
    pub connection_id: String,
    messages: mpsc::UnboundedReceiver<PushMessage>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl PushSubscription {
    /// Wait for the next push message. `None` once the connection is gone.
    pub async fn next(&mut self) -> Option<PushMessage> {
        self.messages.recv().await
    }

    /// Close the connection and wait for the reader task to finish.
    pub async fn close(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Err(e) = (&mut self.task).await {
            tracing::warn!(conn_id = %self.connection_id, error = %e, "Push reader task failed");
        }
    }
}

/// Open the push channel at `url` and authenticate with `token`.
pub async fn connect(url: &str, token: &str) -> Result<PushSubscription> {
    let (stream, _) = connect_async(url).await?;
    let (mut write, mut read) = stream.split();

    let handshake = serde_json::to_string(&AuthorizationMessage::new(token))?;
    write.send(Message::Text(handshake)).await?;

    let connection_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %connection_id, url = %url, "Push channel connected");

    let (tx, messages) = mpsc::unbounded_channel();
    let (shutdown, mut shutdown_rx) = oneshot::channel();
    let conn_id = connection_id.clone();

    let task = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    let _ = write.send(Message::Close(None)).await;
                    break;
                }
                frame = read.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(message) = parse_frame(&text) {
                            if tx.send(message).is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = write.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!(conn_id = %conn_id, error = %e, "Push channel error");
                        break;
                    }
                },
            }
        }
        tracing::info!(conn_id = %conn_id, "Push channel closed");
    });

    Ok(PushSubscription {
        connection_id,
        messages,
        shutdown: Some(shutdown),
        task,
    })
}

/// Parse one text frame.
pub fn parse_frame(text: &str) -> Option<PushMessage> {
    match serde_json::from_str(text) {
        Ok(message) => Some(message),
        Err(e) => {
            tracing::warn!(error = %e, frame = %text, "Ignoring malformed push frame");
            None
        }
    }
}
