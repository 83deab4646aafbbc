//! Bounded FIFO between session producers and the broadcast hub.
//!
//! When the queue is full, producers follow the configured
//! [`BackpressurePolicy`]. Closing the queue rejects new payloads but lets
//! the consumer drain everything already queued.

use std::collections::VecDeque;
use std::fmt;
use std::pin::pin;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::Notify;

use super::connection::OutboundPayload;

/// Default number of payloads the queue holds before backpressure applies.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// What a producer does when the queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackpressurePolicy {
    /// Wait until the consumer frees a slot.
    #[default]
    Block,
    /// Evict the oldest queued payload to make room.
    DropOldest,
    /// Discard the payload being pushed.
    DropNewest,
}

impl BackpressurePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Block => "block",
            Self::DropOldest => "drop-oldest",
            Self::DropNewest => "drop-newest",
        }
    }
}

impl fmt::Display for BackpressurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown backpressure policy {0:?} (expected block, drop-oldest or drop-newest)")]
pub struct UnknownPolicy(String);

impl std::str::FromStr for BackpressurePolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "block" => Ok(Self::Block),
            "drop-oldest" | "drop_oldest" => Ok(Self::DropOldest),
            "drop-newest" | "drop_newest" => Ok(Self::DropNewest),
            _ => Err(UnknownPolicy(s.to_owned())),
        }
    }
}

/// Result of a successful [`BroadcastQueue::push`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    Enqueued,
    /// The queue was full and the pushed payload was discarded.
    DroppedNewest,
    /// The queue was full and this (oldest) payload was evicted instead.
    DroppedOldest(OutboundPayload),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("broadcast queue is closed")]
pub struct QueueClosed;

struct QueueState {
    items: VecDeque<OutboundPayload>,
    closed: bool,
}

/// Bounded multi-producer, single-consumer payload queue.
pub struct BroadcastQueue {
    state: Mutex<QueueState>,
    capacity: usize,
    policy: BackpressurePolicy,
    // Signalled when an item is pushed or the queue closes.
    readable: Notify,
    // Signalled when an item is popped or the queue closes.
    writable: Notify,
}

impl BroadcastQueue {
    /// Creates a queue holding at most `capacity` payloads (minimum 1).
    pub fn new(capacity: usize, policy: BackpressurePolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            capacity,
            policy,
            readable: Notify::new(),
            writable: Notify::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> BackpressurePolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Appends `payload`, applying the backpressure policy if the queue is full.
    ///
    /// With [`BackpressurePolicy::Block`] this suspends until a slot frees up.
    ///
    /// # Errors
    ///
    /// Returns [`QueueClosed`] if the queue was closed before the payload
    /// could be accepted.
    pub async fn push(&self, payload: OutboundPayload) -> Result<PushOutcome, QueueClosed> {
        loop {
            let mut writable = pin!(self.writable.notified());
            {
                let mut state = self.state.lock();
                if state.closed {
                    return Err(QueueClosed);
                }
                if state.items.len() < self.capacity {
                    state.items.push_back(payload);
                    self.readable.notify_one();
                    return Ok(PushOutcome::Enqueued);
                }
                match self.policy {
                    BackpressurePolicy::DropNewest => return Ok(PushOutcome::DroppedNewest),
                    BackpressurePolicy::DropOldest => {
                        let evicted = state.items.pop_front();
                        state.items.push_back(payload);
                        self.readable.notify_one();
                        return Ok(match evicted {
                            Some(evicted) => PushOutcome::DroppedOldest(evicted),
                            None => PushOutcome::Enqueued,
                        });
                    }
                    // Register interest before releasing the lock so a
                    // concurrent pop or close cannot be missed.
                    BackpressurePolicy::Block => {
                        writable.as_mut().enable();
                    }
                }
            }
            writable.await;
        }
    }

    /// Removes the oldest payload, suspending while the queue is empty.
    ///
    /// Returns `None` once the queue is closed and fully drained.
    pub async fn pop(&self) -> Option<OutboundPayload> {
        loop {
            let mut readable = pin!(self.readable.notified());
            {
                let mut state = self.state.lock();
                if let Some(payload) = state.items.pop_front() {
                    self.writable.notify_one();
                    return Some(payload);
                }
                if state.closed {
                    return None;
                }
                readable.as_mut().enable();
            }
            readable.await;
        }
    }

    /// Rejects further pushes and wakes every waiter.
    ///
    /// Payloads already queued remain available to [`pop`](Self::pop).
    pub fn close(&self) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        drop(state);
        self.readable.notify_waiters();
        self.writable.notify_waiters();
    }
}

impl fmt::Debug for BroadcastQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BroadcastQueue")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .field("policy", &self.policy)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    fn payload(s: &str) -> OutboundPayload {
        OutboundPayload::from(s)
    }

    #[tokio::test]
    async fn fifo_order() {
        let queue = BroadcastQueue::new(8, BackpressurePolicy::Block);
        for s in ["a", "b", "c"] {
            assert_eq!(queue.push(payload(s)).await, Ok(PushOutcome::Enqueued));
        }
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.pop().await, Some(payload("a")));
        assert_eq!(queue.pop().await, Some(payload("b")));
        assert_eq!(queue.pop().await, Some(payload("c")));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn drop_newest_rejects_when_full() {
        let queue = BroadcastQueue::new(2, BackpressurePolicy::DropNewest);
        queue.push(payload("a")).await.unwrap();
        queue.push(payload("b")).await.unwrap();
        assert_eq!(
            queue.push(payload("c")).await,
            Ok(PushOutcome::DroppedNewest)
        );
        assert_eq!(queue.pop().await, Some(payload("a")));
        assert_eq!(queue.pop().await, Some(payload("b")));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn drop_oldest_evicts_head() {
        let queue = BroadcastQueue::new(2, BackpressurePolicy::DropOldest);
        queue.push(payload("a")).await.unwrap();
        queue.push(payload("b")).await.unwrap();
        assert_eq!(
            queue.push(payload("c")).await,
            Ok(PushOutcome::DroppedOldest(payload("a")))
        );
        assert_eq!(queue.pop().await, Some(payload("b")));
        assert_eq!(queue.pop().await, Some(payload("c")));
    }

    #[tokio::test]
    async fn block_waits_for_space() {
        let queue = Arc::new(BroadcastQueue::new(1, BackpressurePolicy::Block));
        queue.push(payload("a")).await.unwrap();

        let producer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.push(payload("b")).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!producer.is_finished());
        assert_eq!(queue.len(), 1);

        assert_eq!(queue.pop().await, Some(payload("a")));
        let outcome = tokio::time::timeout(Duration::from_secs(1), producer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome, Ok(PushOutcome::Enqueued));
        assert_eq!(queue.pop().await, Some(payload("b")));
    }

    #[tokio::test]
    async fn pop_waits_for_push() {
        let queue = Arc::new(BroadcastQueue::new(4, BackpressurePolicy::Block));
        let consumer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.pop().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.push(payload("late")).await.unwrap();
        let popped = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(popped, Some(payload("late")));
    }

    #[tokio::test]
    async fn close_drains_then_ends() {
        let queue = BroadcastQueue::new(4, BackpressurePolicy::Block);
        queue.push(payload("a")).await.unwrap();
        queue.close();
        assert!(queue.is_closed());
        assert_eq!(queue.push(payload("b")).await, Err(QueueClosed));
        assert_eq!(queue.pop().await, Some(payload("a")));
        assert_eq!(queue.pop().await, None);
    }

    #[tokio::test]
    async fn close_wakes_blocked_producer_and_consumer() {
        let full = Arc::new(BroadcastQueue::new(1, BackpressurePolicy::Block));
        full.push(payload("a")).await.unwrap();
        let producer = {
            let queue = Arc::clone(&full);
            tokio::spawn(async move { queue.push(payload("b")).await })
        };

        let empty = Arc::new(BroadcastQueue::new(1, BackpressurePolicy::Block));
        let consumer = {
            let queue = Arc::clone(&empty);
            tokio::spawn(async move { queue.pop().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        full.close();
        empty.close();

        let pushed = tokio::time::timeout(Duration::from_secs(1), producer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pushed, Err(QueueClosed));
        let popped = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(popped, None);
    }

    #[test]
    fn capacity_has_floor_of_one() {
        let queue = BroadcastQueue::new(0, BackpressurePolicy::Block);
        assert_eq!(queue.capacity(), 1);
    }

    #[test]
    fn policy_from_str() {
        assert_eq!(
            "block".parse::<BackpressurePolicy>().unwrap(),
            BackpressurePolicy::Block
        );
        assert_eq!(
            "drop-oldest".parse::<BackpressurePolicy>().unwrap(),
            BackpressurePolicy::DropOldest
        );
        assert_eq!(
            "DROP_NEWEST".parse::<BackpressurePolicy>().unwrap(),
            BackpressurePolicy::DropNewest
        );
        assert!("lossy".parse::<BackpressurePolicy>().is_err());
    }
}
