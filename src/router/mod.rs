//! Request routing: map URL paths to HTTP handlers or WebSocket endpoints.
//!
//! [`Router`] holds two kinds of routes:
//!
//! | Registration          | Serves                                             |
//! |-----------------------|----------------------------------------------------|
//! | [`Router::get`]       | a plain HTTP response for `GET` requests           |
//! | [`Router::websocket`] | a WebSocket session after a successful upgrade     |
//!
//! Paths are matched exactly. Trailing slashes are normalized on both patterns and
//! incoming paths, so `/compute/` and `/compute` are treated as equivalent.
//! Routes are matched in registration order; the first match wins.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

use crate::realtime::WebSocket;
use crate::{Method, Request, Response, StatusCode};

/// Type-erased async handler that turns a [`Request`] into a [`Response`].
pub type Handler =
    Arc<dyn Fn(Request) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync + 'static>;

/// Type-erased async handler that owns an upgraded WebSocket until the session ends.
pub type UpgradeHandler = Arc<
    dyn Fn(WebSocket, SocketAddr) -> Pin<Box<dyn Future<Output = ()> + Send>>
        + Send
        + Sync
        + 'static,
>;

/// Conversion trait for async HTTP handler functions.
///
/// Any `Fn(Request) -> impl Future<Output = Response> + Send` that is also
/// `Send + Sync + 'static` implements this trait automatically via the blanket impl
/// below.
pub trait IntoHandler: Send + Sync + 'static {
    /// Call the handler with the given request, boxing the returned future.
    fn call(&self, request: Request) -> Pin<Box<dyn Future<Output = Response> + Send>>;
}

impl<T, F> IntoHandler for T
where
    T: Fn(Request) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    fn call(&self, request: Request) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        Box::pin((self)(request))
    }
}

/// Conversion trait for async WebSocket session functions.
pub trait IntoUpgradeHandler: Send + Sync + 'static {
    /// Call the handler with the upgraded socket, boxing the returned future.
    fn call(&self, ws: WebSocket, peer: SocketAddr) -> Pin<Box<dyn Future<Output = ()> + Send>>;
}

impl<T, F> IntoUpgradeHandler for T
where
    T: Fn(WebSocket, SocketAddr) -> F + Send + Sync + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    fn call(&self, ws: WebSocket, peer: SocketAddr) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin((self)(ws, peer))
    }
}

const UPGRADE_REQUIRED: &str = "WebSocket endpoint requires an upgrade";

// Strip a trailing slash, except on the root path.
fn normalize(path: &str) -> &str {
    if path != "/" && path.ends_with('/') {
        &path[..path.len() - 1]
    } else {
        path
    }
}

enum Endpoint {
    Http { method: Method, handler: Handler },
    WebSocket(UpgradeHandler),
}

struct Route {
    path: String,
    endpoint: Endpoint,
}

/// Outcome of looking up a request in the [`Router`].
pub enum Resolved {
    /// Respond with this handler.
    Http(Handler),
    /// Perform the WebSocket handshake, then hand the socket to this handler.
    Upgrade(UpgradeHandler),
    /// Nothing is registered for this method and path.
    NotFound,
}

/// Dispatches requests to registered HTTP handlers and WebSocket endpoints.
///
/// # Examples
///
/// ```rust,no_run
/// use std::net::SocketAddr;
///
/// use calcrelay::realtime::WebSocket;
/// use calcrelay::{Request, Response, Router, StatusCode};
///
/// let mut router = Router::new();
/// router.get("/ping", |_req: Request| async { Response::new(StatusCode::Ok) });
/// router.websocket("/compute", |_ws: WebSocket, _peer: SocketAddr| async {});
/// ```
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    /// Create a new, empty `Router` with no registered routes.
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Register a handler for `GET` requests to `path`.
    pub fn get(&mut self, path: &str, handler: impl IntoHandler) {
        let handler: Handler = Arc::new(move |req| handler.call(req));
        self.push(
            path,
            Endpoint::Http {
                method: Method::Get,
                handler,
            },
        );
    }

    /// Register a WebSocket endpoint at `path`.
    ///
    /// Any request to `path` goes through the upgrade handshake; requests
    /// that are not valid upgrades are rejected by the server.
    pub fn websocket(&mut self, path: &str, handler: impl IntoUpgradeHandler) {
        let handler: UpgradeHandler = Arc::new(move |ws, peer| handler.call(ws, peer));
        self.push(path, Endpoint::WebSocket(handler));
    }

    fn push(&mut self, path: &str, endpoint: Endpoint) {
        self.routes.push(Route {
            path: normalize(path).to_owned(),
            endpoint,
        });
    }

    /// Return the number of routes registered in this router.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Return `true` if no routes have been registered.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Find the endpoint for `method` and `path`.
    ///
    /// WebSocket endpoints match on path alone so that a wrong method can be
    /// answered by the handshake with `405`.
    pub fn resolve(&self, method: &Method, path: &str) -> Resolved {
        let path = normalize(path);
        for route in self.routes.iter().filter(|r| r.path == path) {
            match &route.endpoint {
                Endpoint::WebSocket(handler) => return Resolved::Upgrade(Arc::clone(handler)),
                Endpoint::Http {
                    method: expected,
                    handler,
                } if expected == method => return Resolved::Http(Arc::clone(handler)),
                Endpoint::Http { .. } => {}
            }
        }
        Resolved::NotFound
    }

    /// Dispatch `request` to the first matching HTTP route and return its response.
    ///
    /// Returns `404 Not Found` when nothing matches, and `400 Bad Request` when the
    /// path belongs to a WebSocket endpoint (those are handled by the server).
    pub async fn route(&self, request: Request) -> Response {
        match self.resolve(request.method(), request.path()) {
            Resolved::Http(handler) => handler(request).await,
            Resolved::Upgrade(_) => Response::new(StatusCode::BadRequest).body(UPGRADE_REQUIRED),
            Resolved::NotFound => Response::new(StatusCode::NotFound).body("Not Found"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_request(method: &str, path: &str) -> Request {
        let raw = format!("{method} {path} HTTP/1.1\r\nHost: localhost\r\n\r\n");
        let (req, _) = Request::parse(raw.as_bytes()).unwrap();
        req
    }

    #[test]
    fn normalize_trailing_slash() {
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize("/compute/"), "/compute");
        assert_eq!(normalize("/compute"), "/compute");
    }

    #[test]
    fn router_starts_empty() {
        let router = Router::new();
        assert!(router.is_empty());
        assert_eq!(router.len(), 0);
    }

    #[test]
    fn websocket_route_resolves_for_any_method() {
        let mut router = Router::new();
        router.websocket("/compute", |_ws: WebSocket, _peer: SocketAddr| async {});
        assert!(matches!(
            router.resolve(&Method::Get, "/compute"),
            Resolved::Upgrade(_)
        ));
        assert!(matches!(
            router.resolve(&Method::Post, "/compute/"),
            Resolved::Upgrade(_)
        ));
        assert!(matches!(
            router.resolve(&Method::Get, "/"),
            Resolved::NotFound
        ));
    }

    #[tokio::test]
    async fn router_empty_returns_404() {
        let router = Router::new();
        let res = router.route(make_request("GET", "/")).await;
        assert_eq!(res.status(), StatusCode::NotFound);
    }

    #[tokio::test]
    async fn router_get_matches() {
        let mut router = Router::new();
        router.get("/", |_req: Request| async { Response::new(StatusCode::Ok) });
        let res = router.route(make_request("GET", "/")).await;
        assert_eq!(res.status(), StatusCode::Ok);
    }

    #[tokio::test]
    async fn router_get_does_not_match_post() {
        let mut router = Router::new();
        router.get("/", |_req: Request| async { Response::new(StatusCode::Ok) });
        let res = router.route(make_request("POST", "/")).await;
        assert_eq!(res.status(), StatusCode::NotFound);
    }

    #[tokio::test]
    async fn router_first_matching_route_wins() {
        let mut router = Router::new();
        router.get("/path", |_req: Request| async { Response::new(StatusCode::Ok) });
        router.get("/path", |_req: Request| async {
            Response::new(StatusCode::InternalServerError)
        });
        let res = router.route(make_request("GET", "/path/")).await;
        assert_eq!(res.status(), StatusCode::Ok);
    }

    #[tokio::test]
    async fn websocket_path_without_upgrade_is_bad_request() {
        let mut router = Router::new();
        router.websocket("/compute", |_ws: WebSocket, _peer: SocketAddr| async {});
        let res = router.route(make_request("GET", "/compute")).await;
        assert_eq!(res.status(), StatusCode::BadRequest);
    }
}
