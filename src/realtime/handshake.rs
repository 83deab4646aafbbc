//! WebSocket opening handshake (RFC 6455 §4.2).
//!
//! [`validate`] checks the client's upgrade request and derives the
//! `Sec-WebSocket-Accept` value; [`switching_protocols`] builds the `101`
//! response that completes the handshake.

use thiserror::Error;
use tokio_tungstenite::tungstenite::handshake::derive_accept_key;

use crate::http::{Method, Request, Response, StatusCode};

/// The only protocol version this server speaks.
pub const WEBSOCKET_VERSION: &str = "13";

/// Reasons an upgrade request is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpgradeError {
    #[error("websocket upgrade requires GET, got {0}")]
    MethodNotAllowed(String),

    #[error("the client is not using the websocket protocol")]
    NotUpgrade,

    #[error("unsupported websocket version {0:?}")]
    UnsupportedVersion(Option<String>),

    #[error("missing Sec-WebSocket-Key header")]
    MissingKey,
}

impl UpgradeError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed(_) => StatusCode::MethodNotAllowed,
            Self::NotUpgrade | Self::MissingKey => StatusCode::BadRequest,
            Self::UnsupportedVersion(_) => StatusCode::UpgradeRequired,
        }
    }

    /// Builds the error response sent before the connection is closed.
    pub fn into_response(self) -> Response {
        let mut response = Response::new(self.status())
            .body(self.to_string())
            .keep_alive(false);
        match self {
            Self::MethodNotAllowed(_) => response = response.header("Allow", "GET"),
            Self::UnsupportedVersion(_) => {
                response = response.header("Sec-WebSocket-Version", WEBSOCKET_VERSION)
            }
            Self::NotUpgrade | Self::MissingKey => {}
        }
        response
    }
}

/// Validates an upgrade request and returns the `Sec-WebSocket-Accept` value.
///
/// # Errors
///
/// Returns the first [`UpgradeError`] that applies, in the order: method,
/// `Connection`/`Upgrade` headers, version, key.
pub fn validate(request: &Request) -> Result<String, UpgradeError> {
    if request.method() != &Method::Get {
        return Err(UpgradeError::MethodNotAllowed(request.method().to_string()));
    }
    if !request.is_websocket_upgrade() {
        return Err(UpgradeError::NotUpgrade);
    }

    let headers = request.headers();
    let version = headers.get("sec-websocket-version").map(str::trim);
    if version != Some(WEBSOCKET_VERSION) {
        return Err(UpgradeError::UnsupportedVersion(version.map(str::to_owned)));
    }

    let key = headers
        .get("sec-websocket-key")
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .ok_or(UpgradeError::MissingKey)?;

    Ok(derive_accept_key(key.as_bytes()))
}

/// Builds the `101 Switching Protocols` response for an accepted handshake.
pub fn switching_protocols(accept: &str) -> Response {
    Response::new(StatusCode::SwitchingProtocols)
        .header("Upgrade", "websocket")
        .header("Connection", "Upgrade")
        .header("Sec-WebSocket-Accept", accept)
}
