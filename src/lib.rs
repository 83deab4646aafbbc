//! # calcrelay
//!
//! A WebSocket relay that evaluates single-operator arithmetic expressions sent by
//! any client and broadcasts the formatted result to every connected client.
//!
//! The crate is layered bottom-up:
//!
//! - [`expression`] parses and evaluates `a <op> b`.
//! - [`http`], [`router`] and [`server`] form a small HTTP/1.1 server with
//!   WebSocket upgrade support.
//! - [`realtime`] holds the connection registry, the bounded broadcast queue,
//!   the hub that fans results out, and the per-client session.
//! - [`app`] wires the relay into a router; [`config`] and [`logging`] serve the binary.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use calcrelay::{Relay, RelaySettings, Server, app};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let relay = Relay::new(RelaySettings::default());
//!     let hub = relay.spawn_hub();
//!
//!     let server = Server::bind("127.0.0.1:8080").await?;
//!     server
//!         .run_until(app::build_router(&relay), async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await?;
//!
//!     relay.shutdown(hub).await;
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod config;
pub mod expression;
pub mod http;
pub mod logging;
pub mod realtime;
pub mod router;
pub mod server;

pub use http::{Headers, Method, Request, Response, StatusCode};
pub use realtime::{Relay, RelaySettings};
pub use router::Router;
pub use server::{Server, ServerError};
