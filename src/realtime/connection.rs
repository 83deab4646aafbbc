//! Connection handles shared between a session and the broadcast hub.
//!
//! A [`Connection`] owns the outbound half of a client stream behind the
//! [`FrameSink`] trait. Sessions only read; the hub is the only writer.

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::SinkExt;
use futures::stream::SplitSink;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{Mutex, watch};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::debug;

/// Upper bound on how long closing a sink may take.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw numeric id.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A formatted result line waiting to be broadcast.
///
/// Immutable once built; clones share the same allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundPayload(Arc<str>);

impl OutboundPayload {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for OutboundPayload {
    fn from(value: String) -> Self {
        Self(value.into())
    }
}

impl From<&str> for OutboundPayload {
    fn from(value: &str) -> Self {
        Self(value.into())
    }
}

impl fmt::Display for OutboundPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors raised while writing to a single connection.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("transport error: {0}")]
    Transport(#[from] tungstenite::Error),

    #[error("write timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection already closed")]
    Closed,
}

/// Boxed future returned by [`FrameSink`] methods.
pub type SinkFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The outbound half of a client stream.
///
/// Implemented for WebSocket write halves by [`WebSocketSink`]; tests use
/// in-memory implementations to drive the hub without sockets.
pub trait FrameSink: Send + Sync {
    /// Writes one text frame and flushes it.
    fn send_text<'a>(
        &'a self,
        payload: &'a OutboundPayload,
    ) -> SinkFuture<'a, Result<(), SinkError>>;

    /// Starts the closing handshake and releases the transport.
    fn close(&self) -> SinkFuture<'_, ()>;
}

/// [`FrameSink`] over the write half of a split [`WebSocketStream`].
pub struct WebSocketSink<S> {
    inner: Mutex<SplitSink<WebSocketStream<S>, Message>>,
}

impl<S> WebSocketSink<S> {
    pub fn new(inner: SplitSink<WebSocketStream<S>, Message>) -> Self {
        Self {
            inner: Mutex::new(inner),
        }
    }
}

impl<S> FrameSink for WebSocketSink<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    fn send_text<'a>(
        &'a self,
        payload: &'a OutboundPayload,
    ) -> SinkFuture<'a, Result<(), SinkError>> {
        Box::pin(async move {
            let mut sink = self.inner.lock().await;
            sink.send(Message::text(payload.as_str().to_owned())).await?;
            Ok(())
        })
    }

    fn close(&self) -> SinkFuture<'_, ()> {
        Box::pin(async move {
            let mut sink = self.inner.lock().await;
            if let Err(e) = sink.close().await {
                debug!(error = %e, "websocket close failed");
            }
        })
    }
}

/// A registered client connection.
///
/// Shared as `Arc<Connection>` between the registry, the hub and the
/// session that reads from the client.
pub struct Connection {
    id: ConnectionId,
    peer: SocketAddr,
    sink: Box<dyn FrameSink>,
    closed: watch::Sender<bool>,
}

impl Connection {
    /// Wraps `sink` in a new connection with a fresh id.
    pub fn new(peer: SocketAddr, sink: impl FrameSink + 'static) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            id: ConnectionId::next(),
            peer,
            sink: Box::new(sink),
            closed,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Writes `payload`, failing if it does not complete within `timeout`.
    ///
    /// # Errors
    ///
    /// - [`SinkError::Closed`]: [`close`](Self::close) was already called.
    /// - [`SinkError::Timeout`]: the write did not finish in time.
    /// - [`SinkError::Transport`]: the underlying stream failed.
    pub async fn send(
        &self,
        payload: &OutboundPayload,
        timeout: Duration,
    ) -> Result<(), SinkError> {
        if self.is_closed() {
            return Err(SinkError::Closed);
        }
        tokio::time::timeout(timeout, self.sink.send_text(payload))
            .await
            .map_err(|_| SinkError::Timeout(timeout))?
    }

    /// Closes the connection. Only the first call does any work.
    pub async fn close(&self) {
        if self.closed.send_replace(true) {
            return;
        }
        debug!(conn_id = %self.id, peer = %self.peer, "closing connection");
        if tokio::time::timeout(CLOSE_TIMEOUT, self.sink.close())
            .await
            .is_err()
        {
            debug!(conn_id = %self.id, "close handshake timed out");
        }
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Resolves once [`close`](Self::close) has been called.
    pub async fn closed(&self) {
        let mut rx = self.closed.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|closed| *closed).await;
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// In-memory sinks shared by the realtime unit tests.
#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    /// Records every payload it receives; optionally fails every write.
    #[derive(Clone, Default)]
    pub struct RecordingSink {
        pub received: Arc<Mutex<Vec<String>>>,
        pub closed: Arc<Mutex<bool>>,
        pub fail: bool,
        pub on_send: Option<Arc<dyn Fn() + Send + Sync>>,
    }

    impl RecordingSink {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn received(&self) -> Vec<String> {
            self.received.lock().clone()
        }

        pub fn was_closed(&self) -> bool {
            *self.closed.lock()
        }
    }

    impl FrameSink for RecordingSink {
        fn send_text<'a>(
            &'a self,
            payload: &'a OutboundPayload,
        ) -> SinkFuture<'a, Result<(), SinkError>> {
            Box::pin(async move {
                if self.fail {
                    return Err(SinkError::Transport(tungstenite::Error::ConnectionClosed));
                }
                self.received.lock().push(payload.as_str().to_owned());
                if let Some(hook) = &self.on_send {
                    hook();
                }
                Ok(())
            })
        }

        fn close(&self) -> SinkFuture<'_, ()> {
            Box::pin(async move {
                *self.closed.lock() = true;
            })
        }
    }

    /// Never completes a write.
    pub struct StalledSink;

    impl FrameSink for StalledSink {
        fn send_text<'a>(
            &'a self,
            _payload: &'a OutboundPayload,
        ) -> SinkFuture<'a, Result<(), SinkError>> {
            Box::pin(std::future::pending())
        }

        fn close(&self) -> SinkFuture<'_, ()> {
            Box::pin(async {})
        }
    }

    pub fn peer() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 40000))
    }

    pub fn connection(sink: impl FrameSink + 'static) -> Arc<Connection> {
        Arc::new(Connection::new(peer(), sink))
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn ids_are_unique() {
        let a = connection(RecordingSink::default());
        let b = connection(RecordingSink::default());
        assert_ne!(a.id(), b.id());
    }

    #[tokio::test]
    async fn send_reaches_sink() {
        let sink = RecordingSink::default();
        let conn = connection(sink.clone());
        conn.send(&"hello".into(), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(sink.received(), vec!["hello"]);
    }

    #[tokio::test]
    async fn send_after_close_fails() {
        let sink = RecordingSink::default();
        let conn = connection(sink.clone());
        conn.close().await;
        assert!(sink.was_closed());
        assert!(matches!(
            conn.send(&"late".into(), Duration::from_secs(1)).await,
            Err(SinkError::Closed)
        ));
        assert!(sink.received().is_empty());
    }

    #[tokio::test]
    async fn stalled_write_times_out() {
        let conn = connection(StalledSink);
        let result = conn.send(&"x".into(), Duration::from_millis(20)).await;
        assert!(matches!(result, Err(SinkError::Timeout(_))));
    }

    #[tokio::test]
    async fn closed_resolves_after_close() {
        let conn = connection(RecordingSink::default());
        let waiter = {
            let conn = Arc::clone(&conn);
            tokio::spawn(async move { conn.closed().await })
        };
        conn.close().await;
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(conn.is_closed());
    }
}
