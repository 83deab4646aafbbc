//! Real-time fan-out over WebSocket.
//!
//! Sessions read client requests and push result lines onto a bounded
//! [`BroadcastQueue`]; a single [`BroadcastHub`] drains it and writes each
//! line to every connection in the [`ConnectionRegistry`].
//!
//! ```text
//! client ──▶ ConnectionSession ──▶ BroadcastQueue ──▶ BroadcastHub ──▶ every Connection
//! ```

use tokio::net::TcpStream;
use tokio_tungstenite::WebSocketStream;

pub mod connection;
pub mod handshake;
pub mod hub;
pub mod queue;
pub mod registry;
pub mod relay;
pub mod session;

pub use connection::{Connection, ConnectionId, FrameSink, OutboundPayload, SinkError};
pub use hub::{BroadcastHub, RoundReport};
pub use queue::{BackpressurePolicy, BroadcastQueue, PushOutcome, QueueClosed};
pub use registry::ConnectionRegistry;
pub use relay::{Relay, RelaySettings};
pub use session::{ConnectionSession, InboundMessage, SessionError};

/// A WebSocket running over an upgraded server-side TCP connection.
pub type WebSocket = WebSocketStream<TcpStream>;
