//! The calcrelay HTTP surface: a landing page and the `/compute` WebSocket endpoint.

use std::net::SocketAddr;

use crate::realtime::{Relay, WebSocket};
use crate::router::Router;
use crate::{Request, Response, StatusCode};

/// Path of the WebSocket endpoint clients connect to.
pub const COMPUTE_PATH: &str = "/compute";

const LANDING_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>calcrelay</title>
</head>
<body data-ws-url="{{WS_URL}}">
<form id="form">
  <input id="name" placeholder="name" value="anonymous">
  <input id="expression" placeholder="3+4">
  <button>Send</button>
</form>
<pre id="output"></pre>
<script>
  const output = document.getElementById("output");
  const ws = new WebSocket(document.body.dataset.wsUrl);
  const print = (line) => { output.textContent += line + "\n"; };
  ws.onopen = () => print("OPEN");
  ws.onclose = () => print("CLOSE");
  ws.onmessage = (ev) => print(ev.data);
  document.getElementById("form").onsubmit = (ev) => {
    ev.preventDefault();
    ws.send(JSON.stringify({
      name: document.getElementById("name").value,
      expression: document.getElementById("expression").value,
    }));
  };
</script>
</body>
</html>
"#;

/// Builds the router serving the landing page at `/` and the relay at [`COMPUTE_PATH`].
pub fn build_router(relay: &Relay) -> Router {
    let mut router = Router::new();
    router.get("/", |req: Request| async move { landing_page(&req) });

    let relay = relay.clone();
    router.websocket(COMPUTE_PATH, move |ws: WebSocket, peer: SocketAddr| {
        let relay = relay.clone();
        async move { relay.serve(ws, peer).await }
    });
    router
}

/// Renders the landing page pointing at this server's `/compute` endpoint.
pub fn landing_page(req: &Request) -> Response {
    let host = req.host().unwrap_or("localhost");
    let url = format!("ws://{host}{COMPUTE_PATH}");
    Response::new(StatusCode::Ok)
        .header("Content-Type", "text/html; charset=utf-8")
        .body(LANDING_PAGE.replace("{{WS_URL}}", &escape_html(&url)))
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
