//! Per-connection read loop.
//!
//! Each inbound frame is decoded, parsed, evaluated and formatted, and the
//! resulting line is pushed onto the broadcast queue. The first frame that
//! fails any of these steps ends the session; there is no retry.

use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use serde::Deserialize;
use thiserror::Error;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, warn};

use super::connection::{Connection, OutboundPayload};
use super::queue::{BroadcastQueue, PushOutcome, QueueClosed};
use super::registry::ConnectionRegistry;
use crate::expression::{self, ExpressionError};

/// A request as sent by a client: `{"name": "...", "expression": "..."}`.
///
/// Capitalised keys are accepted as well; a missing key decodes as an empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct InboundMessage {
    #[serde(default, alias = "Name")]
    pub name: String,
    #[serde(default, alias = "Expression")]
    pub expression: String,
}

/// Reasons a session ends abnormally.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to decode request: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Expression(#[from] ExpressionError),

    #[error("transport error: {0}")]
    Transport(#[from] tungstenite::Error),

    #[error("no frame received within {0:?}")]
    IdleTimeout(Duration),

    #[error(transparent)]
    QueueClosed(#[from] QueueClosed),
}

/// Parses, evaluates and formats one request into its broadcast line.
///
/// # Examples
///
/// ```
/// use calcrelay::realtime::session::{InboundMessage, compute};
///
/// let msg = InboundMessage { name: "alice".into(), expression: "3+4".into() };
/// assert_eq!(compute(&msg).unwrap().as_str(), "alice: 3.00 + 4.00 = 7.00");
/// ```
pub fn compute(message: &InboundMessage) -> Result<OutboundPayload, ExpressionError> {
    let parsed = expression::parse(&message.expression)?;
    let result = expression::evaluate(parsed.operand1, parsed.operator, parsed.operand2)?;
    Ok(expression::format_result(&message.name, &parsed, result).into())
}

/// Drives one client connection from registration to close.
pub struct ConnectionSession<R> {
    conn: Arc<Connection>,
    frames: R,
    registry: Arc<ConnectionRegistry>,
    queue: Arc<BroadcastQueue>,
    idle_timeout: Option<Duration>,
}

impl<R> ConnectionSession<R>
where
    R: Stream<Item = Result<Message, tungstenite::Error>> + Unpin + Send,
{
    /// Creates a session reading from `frames` on behalf of `conn`.
    ///
    /// The connection is expected to be registered already; the session
    /// unregisters it when it ends.
    pub fn new(
        conn: Arc<Connection>,
        frames: R,
        registry: Arc<ConnectionRegistry>,
        queue: Arc<BroadcastQueue>,
    ) -> Self {
        Self {
            conn,
            frames,
            registry,
            queue,
            idle_timeout: None,
        }
    }

    /// Ends the session if no frame arrives within `timeout`.
    #[must_use]
    pub fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Runs the read loop, then unregisters and closes the connection.
    ///
    /// Returns `Ok(())` when the client closes the stream or the connection
    /// is closed from elsewhere.
    pub async fn run(mut self) -> Result<(), SessionError> {
        let result = self.read_loop().await;
        self.registry.unregister(self.conn.id());
        self.conn.close().await;
        result
    }

    async fn read_loop(&mut self) -> Result<(), SessionError> {
        loop {
            let frame = tokio::select! {
                () = self.conn.closed() => return Ok(()),
                frame = next_frame(&mut self.frames, self.idle_timeout) => frame?,
            };

            let message: InboundMessage = match frame {
                None | Some(Message::Close(_)) => return Ok(()),
                Some(Message::Text(text)) => serde_json::from_str(text.as_str())?,
                Some(Message::Binary(bytes)) => serde_json::from_slice(&bytes)?,
                Some(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => continue,
            };

            let payload = compute(&message)?;
            debug!(conn_id = %self.conn.id(), line = %payload, "enqueueing result");

            match self.queue.push(payload).await? {
                PushOutcome::Enqueued => {}
                PushOutcome::DroppedNewest => {
                    warn!(conn_id = %self.conn.id(), "broadcast queue full, result dropped");
                }
                PushOutcome::DroppedOldest(evicted) => {
                    warn!(
                        conn_id = %self.conn.id(),
                        evicted = %evicted,
                        "broadcast queue full, oldest result dropped"
                    );
                }
            }
        }
    }
}

async fn next_frame<R>(
    frames: &mut R,
    idle_timeout: Option<Duration>,
) -> Result<Option<Message>, SessionError>
where
    R: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    let next = match idle_timeout {
        Some(limit) => tokio::time::timeout(limit, frames.next())
            .await
            .map_err(|_| SessionError::IdleTimeout(limit))?,
        None => frames.next().await,
    };
    Ok(next.transpose()?)
}
