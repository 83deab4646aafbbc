//! Wiring of registry, queue, hub and sessions into one relay.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use futures::future::join_all;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;
use tokio_tungstenite::WebSocketStream;
use tracing::{error, info, warn};

use super::connection::{Connection, WebSocketSink};
use super::hub::BroadcastHub;
use super::queue::{BackpressurePolicy, BroadcastQueue, DEFAULT_QUEUE_CAPACITY};
use super::registry::ConnectionRegistry;
use super::session::ConnectionSession;

/// Tunables for a [`Relay`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelaySettings {
    pub queue_capacity: usize,
    pub backpressure: BackpressurePolicy,
    /// Upper bound on a single broadcast write to one client.
    pub write_timeout: Duration,
    /// Close clients that send nothing for this long. `None` disables it.
    pub idle_timeout: Option<Duration>,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            backpressure: BackpressurePolicy::default(),
            write_timeout: Duration::from_secs(10),
            idle_timeout: None,
        }
    }
}

/// Shared state of the relay: the connection registry and the broadcast queue.
///
/// Cloning is cheap; every clone refers to the same registry and queue.
///
/// # Examples
///
/// ```rust,no_run
/// use calcrelay::realtime::{Relay, RelaySettings};
///
/// # async fn example() {
/// let relay = Relay::new(RelaySettings::default());
/// let hub = relay.spawn_hub();
/// // ... accept clients with `relay.serve(ws, peer)` ...
/// relay.shutdown(hub).await;
/// # }
/// ```
#[derive(Clone)]
pub struct Relay {
    registry: Arc<ConnectionRegistry>,
    queue: Arc<BroadcastQueue>,
    settings: RelaySettings,
}

impl Relay {
    pub fn new(settings: RelaySettings) -> Self {
        Self {
            registry: Arc::new(ConnectionRegistry::new()),
            queue: Arc::new(BroadcastQueue::new(
                settings.queue_capacity,
                settings.backpressure,
            )),
            settings,
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn queue(&self) -> &Arc<BroadcastQueue> {
        &self.queue
    }

    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }

    /// Builds the hub that drains this relay's queue.
    pub fn hub(&self) -> BroadcastHub {
        BroadcastHub::new(
            Arc::clone(&self.queue),
            Arc::clone(&self.registry),
            self.settings.write_timeout,
        )
    }

    /// Spawns the hub onto the current runtime.
    pub fn spawn_hub(&self) -> JoinHandle<()> {
        tokio::spawn(self.hub().run())
    }

    /// Registers an upgraded client and runs its session until it ends.
    pub async fn serve<S>(&self, ws: WebSocketStream<S>, peer: SocketAddr)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (sink, frames) = ws.split();
        let conn = Arc::new(Connection::new(peer, WebSocketSink::new(sink)));
        let conn_id = conn.id();
        self.registry.register(Arc::clone(&conn));
        info!(%conn_id, %peer, clients = self.registry.len(), "client connected");

        let session = ConnectionSession::new(
            conn,
            frames,
            Arc::clone(&self.registry),
            Arc::clone(&self.queue),
        )
        .idle_timeout(self.settings.idle_timeout);

        match session.run().await {
            Ok(()) => info!(%conn_id, %peer, "client disconnected"),
            Err(e) => warn!(%conn_id, %peer, error = %e, "session terminated"),
        }
    }

    /// Stops accepting payloads, lets the hub drain the queue, then closes every client.
    pub async fn shutdown(&self, hub: JoinHandle<()>) {
        self.queue.close();
        if let Err(e) = hub.await {
            error!(error = %e, "broadcast hub task failed");
        }

        let remaining = self.registry.snapshot();
        info!(clients = remaining.len(), "closing remaining connections");
        join_all(remaining.iter().map(|conn| conn.close())).await;
    }
}
