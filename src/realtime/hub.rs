//! The single consumer that fans payloads out to every connection.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info, warn};

use super::connection::{OutboundPayload, SinkError};
use super::queue::BroadcastQueue;
use super::registry::ConnectionRegistry;

/// Outcome of one broadcast round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Drains the [`BroadcastQueue`] and writes each payload to every registered connection.
///
/// The hub is the only writer to each connection. Every write is bounded by
/// `write_timeout`; a connection whose write fails or times out is
/// unregistered and closed without affecting the rest of the round.
pub struct BroadcastHub {
    queue: Arc<BroadcastQueue>,
    registry: Arc<ConnectionRegistry>,
    write_timeout: Duration,
}

impl BroadcastHub {
    pub fn new(
        queue: Arc<BroadcastQueue>,
        registry: Arc<ConnectionRegistry>,
        write_timeout: Duration,
    ) -> Self {
        Self {
            queue,
            registry,
            write_timeout,
        }
    }

    /// Runs until the queue is closed and every queued payload has been delivered.
    pub async fn run(self) {
        info!("broadcast hub started");
        let mut rounds: u64 = 0;
        while let Some(payload) = self.queue.pop().await {
            let report = self.broadcast(&payload).await;
            rounds += 1;
            debug!(
                delivered = report.delivered,
                failed = report.failed,
                queued = self.queue.len(),
                "broadcast round complete"
            );
        }
        info!(rounds, "broadcast hub stopped");
    }

    /// Writes `payload` to the connections registered right now.
    ///
    /// Connections registered after this call starts are not included.
    pub async fn broadcast(&self, payload: &OutboundPayload) -> RoundReport {
        let targets = self.registry.snapshot();
        let timeout = self.write_timeout;

        let writes = targets.iter().map(|conn| conn.send(payload, timeout));
        let results = join_all(writes).await;

        let mut report = RoundReport::default();
        let mut failed = Vec::new();
        for (conn, result) in targets.iter().zip(results) {
            match result {
                Ok(()) => {
                    report.delivered += 1;
                    continue;
                }
                // Its session ended between the snapshot and the write.
                Err(SinkError::Closed) => {
                    debug!(conn_id = %conn.id(), "skipping connection closed mid-round");
                }
                Err(e) => {
                    warn!(
                        conn_id = %conn.id(),
                        peer = %conn.peer(),
                        error = %e,
                        "write failed, dropping connection"
                    );
                }
            }
            self.registry.unregister(conn.id());
            failed.push(conn);
            report.failed += 1;
        }

        join_all(failed.into_iter().map(|conn| conn.close())).await;
        report
    }
}
