//! Development Server for WOS
//!
//! Serves the built supervisor and process scripts with cross-origin
//! isolation headers, and provides the worker loader script that process
//! paths without a URL are started through.

use axum::{
    body::Body,
    http::{header, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, get_service},
    Router,
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use tower_http::services::ServeDir;

/// Worker bootstrap for `loader.js?path=<process path>`.
///
/// Reads the process code from the kernel with a READ request, evaluates it,
/// then replays anything the kernel sent while the code was loading.
const LOADER_JS: &str = r#"const path = new URLSearchParams(self.location.search).get("path");
const held = [];
const boot = (event) => {
  const msg = event.data;
  if (msg && msg.id === "__loader" && msg.type === "DATA") {
    self.removeEventListener("message", boot);
    (0, eval)(msg.payload);
    for (const e of held) self.dispatchEvent(new MessageEvent("message", { data: e }));
  } else if (msg && msg.id === "__loader" && msg.type === "ERROR") {
    throw new Error("loader: cannot read " + path + ": " + msg.payload.type);
  } else {
    held.push(msg);
  }
};
self.addEventListener("message", boot);
self.postMessage({ type: "READ", id: "__loader", path });
"#;

struct ServerConfig {
    addr: SocketAddr,
    web_root: PathBuf,
}

impl ServerConfig {
    /// `PORT` (default 8080), `WOS_BIND` (default 127.0.0.1) and
    /// `WOS_WEB_ROOT` (default `dist`).
    fn from_env() -> Self {
        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);
        let ip: IpAddr = std::env::var("WOS_BIND")
            .ok()
            .and_then(|ip| ip.parse().ok())
            .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
        let web_root = std::env::var("WOS_WEB_ROOT").unwrap_or_else(|_| String::from("dist"));

        Self {
            addr: SocketAddr::new(ip, port),
            web_root: PathBuf::from(web_root),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::from_env();

    let serve_dir = ServeDir::new(&config.web_root).precompressed_gzip();
    let app = Router::new()
        .route("/loader.js", get(loader))
        .fallback_service(get_service(serve_dir).handle_error(|_| async {
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }))
        .layer(axum::middleware::from_fn(add_headers));

    println!("WOS development server");
    println!("  serving {} on http://{}", config.web_root.display(), config.addr);
    println!("  press Ctrl+C to stop");

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn loader() -> impl IntoResponse {
    LOADER_JS
}

/// Content type for a request path, when the default guess is wrong for
/// module workers and wasm streaming.
fn content_type(path: &str) -> Option<&'static str> {
    let ext = path.rsplit_once('.').map(|(_, ext)| ext)?;
    match ext {
        "js" | "mjs" => Some("application/javascript; charset=utf-8"),
        "wasm" => Some("application/wasm"),
        "html" => Some("text/html; charset=utf-8"),
        "css" => Some("text/css; charset=utf-8"),
        "json" => Some("application/json; charset=utf-8"),
        _ => None,
    }
}

/// Add isolation headers and fix MIME types
async fn add_headers(request: Request<Body>, next: axum::middleware::Next) -> Response<Body> {
    let path = request.uri().path().to_string();

    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(
        "Cross-Origin-Opener-Policy",
        HeaderValue::from_static("same-origin"),
    );
    headers.insert(
        "Cross-Origin-Embedder-Policy",
        HeaderValue::from_static("require-corp"),
    );

    if let Some(mime) = content_type(&path) {
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(mime));
    }

    response
}
