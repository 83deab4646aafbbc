//! Async TCP server using Tokio.
//!
//! Accepts TCP connections and dispatches HTTP/1.1 requests through a [`Router`].
//! Plain requests are answered on a persistent (keep-alive) connection; requests to a
//! WebSocket endpoint go through the upgrade handshake, after which the socket is
//! handed to the endpoint's handler for the rest of its life.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::protocol::Role;
use tracing::{debug, error, info, warn};

use crate::http::{
    StatusCode,
    request::{Request, RequestError},
    response::Response,
};
use crate::realtime::handshake;
use crate::router::{Resolved, Router};

/// Errors produced by the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Maximum size of a complete HTTP request we will buffer before rejecting it (8 MiB).
const MAX_REQUEST_SIZE: usize = 8 * 1024 * 1024;

/// Initial read buffer capacity per connection.
const INITIAL_BUF_SIZE: usize = 4096;

/// The relay's HTTP/WebSocket server.
///
/// # Examples
///
/// ```rust,no_run
/// use calcrelay::{Request, Response, Router, Server, StatusCode};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut router = Router::new();
///     router.get("/", |_req: Request| async { Response::new(StatusCode::Ok).body("hi") });
///
///     let server = Server::bind("127.0.0.1:8080").await?;
///     server.run(router).await?;
///     Ok(())
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Server {
    /// Binds the server to the given TCP address.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound
    /// (e.g. port already in use, insufficient permissions).
    pub async fn bind(addr: impl AsRef<str>) -> Result<Self, ServerError> {
        let addr = addr.as_ref();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.to_owned(),
                source: e,
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accepts connections forever.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the TCP listener itself fails.
    pub async fn run(self, router: Router) -> Result<(), ServerError> {
        self.run_until(router, std::future::pending()).await
    }

    /// Accepts connections until `shutdown` resolves.
    ///
    /// Connections already accepted keep running; stopping them is up to the
    /// handlers (see [`Relay::shutdown`](crate::realtime::Relay::shutdown)).
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the TCP listener itself fails.
    pub async fn run_until(
        self,
        router: Router,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), ServerError> {
        let router = Arc::new(router);
        info!(address = %self.local_addr, "calcrelay listening");
        tokio::pin!(shutdown);

        loop {
            let accepted = tokio::select! {
                () = &mut shutdown => {
                    info!("shutdown requested, no longer accepting connections");
                    return Ok(());
                }
                accepted = self.listener.accept() => accepted,
            };

            let (stream, peer_addr) = match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                    continue;
                }
            };

            debug!(peer = %peer_addr, "connection accepted");
            let router = Arc::clone(&router);

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, peer_addr, router).await {
                    warn!(peer = %peer_addr, error = %e, "connection closed with error");
                }
            });
        }
    }
}

/// Handles a single TCP connection over its lifetime.
///
/// HTTP/1.1 connections are persistent by default: we loop, reading one
/// request per iteration, until the peer closes the connection, signals
/// `Connection: close`, or upgrades to WebSocket.
async fn handle_connection(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    router: Arc<Router>,
) -> Result<(), std::io::Error> {
    let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);

    loop {
        let bytes_read = stream.read_buf(&mut buf).await?;

        if bytes_read == 0 {
            debug!(peer = %peer_addr, "connection closed by peer");
            break;
        }

        if buf.len() > MAX_REQUEST_SIZE {
            warn!(peer = %peer_addr, "request too large, sending 413");
            let response = Response::new(StatusCode::PayloadTooLarge)
                .body("Request entity too large")
                .keep_alive(false);
            stream.write_all(&response.into_bytes()).await?;
            break;
        }

        let (request, body_offset) = match Request::parse(&buf) {
            Ok(pair) => pair,
            Err(RequestError::Incomplete) => continue,
            Err(e) => {
                warn!(peer = %peer_addr, error = %e, "bad request, sending 400");
                let response = Response::new(StatusCode::BadRequest)
                    .body(format!("Bad Request: {e}"))
                    .keep_alive(false);
                stream.write_all(&response.into_bytes()).await?;
                break;
            }
        };

        let handler = match router.resolve(request.method(), request.path()) {
            Resolved::Upgrade(handler) => {
                // The client sends frames only after our 101, so anything
                // past the header block is already WebSocket data.
                let _ = buf.split_to(body_offset);
                return upgrade(stream, peer_addr, &request, buf, handler).await;
            }
            Resolved::Http(handler) => Some(handler),
            Resolved::NotFound => None,
        };

        let content_length = request.content_length().unwrap_or(0);
        let total_needed = body_offset + content_length;
        if buf.len() < total_needed {
            continue;
        }

        let keep_alive = request.is_keep_alive();

        debug!(
            peer = %peer_addr,
            method = %request.method(),
            path = %request.path(),
            "dispatching request"
        );

        let response = match handler {
            Some(handler) => handler(request).await,
            None => Response::new(StatusCode::NotFound).body("Not Found"),
        }
        .keep_alive(keep_alive);
        stream.write_all(&response.into_bytes()).await?;
        stream.flush().await?;

        let _ = buf.split_to(total_needed);

        if !keep_alive {
            debug!(peer = %peer_addr, "Connection: close, shutting down");
            break;
        }
    }

    Ok(())
}

/// Completes (or refuses) the WebSocket handshake and runs the endpoint handler.
async fn upgrade(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    request: &Request,
    leftover: BytesMut,
    handler: crate::router::UpgradeHandler,
) -> Result<(), std::io::Error> {
    let accept = match handshake::validate(request) {
        Ok(accept) => accept,
        Err(e) => {
            warn!(peer = %peer_addr, error = %e, "websocket upgrade refused");
            stream.write_all(&e.into_response().into_bytes()).await?;
            stream.flush().await?;
            return Ok(());
        }
    };

    stream
        .write_all(&handshake::switching_protocols(&accept).into_bytes())
        .await?;
    stream.flush().await?;
    debug!(peer = %peer_addr, path = %request.path(), "websocket upgrade complete");

    let ws = WebSocketStream::from_partially_read(stream, leftover.to_vec(), Role::Server, None)
        .await;
    handler(ws, peer_addr).await;
    Ok(())
}
