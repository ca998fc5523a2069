//! Configuration web server.
//!
//! Runs `tiny_http` on its own thread, which makes it the network context:
//! it reads a [`ConfigSnapshot`](crate::state::ConfigSnapshot) to render
//! pages and hands form submissions to [`ConfigIngestHandler`]. It never
//! touches the radio or a peripheral.
//!
//! | route        | response                                   |
//! |--------------|--------------------------------------------|
//! | `GET /`      | configuration page                         |
//! | `POST /`     | ingest the form, then the page             |
//! | `GET /status`| JSON status                                |
//! | anything else| `404 Not Found`                            |

mod form;
mod page;

pub use form::{decode_component, parse_form, read_form, MAX_FIELD_LEN};
pub use page::{escape_html, render_page, StatusReport};

use crate::ingest::ConfigIngestHandler;
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::io::Read;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tiny_http::{Header, Method, Request, Response, Server};

/// Largest request body accepted. Longer bodies get `413`; within the limit
/// the form is read as a stream, so memory use is set by
/// [`MAX_FIELD_LEN`] rather than by this.
pub const MAX_BODY_LEN: u64 = 256 * 1024;

/// Server thread stack.
const HTTP_STACK_SIZE: usize = 32 * 1024;

/// How often the server thread checks for shutdown.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

const CONTENT_HTML: &str = "text/html; charset=utf-8";
const CONTENT_JSON: &str = "application/json";
const CONTENT_TEXT: &str = "text/plain; charset=utf-8";

fn body_fits(declared_len: usize) -> bool {
    declared_len as u64 <= MAX_BODY_LEN
}

/// A response before it is put on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl Reply {
    fn new(status: u16, content_type: &'static str, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type,
            body: body.into(),
        }
    }

    fn not_found() -> Self {
        Self::new(404, CONTENT_TEXT, "Not Found")
    }
}

/// Request routing, independent of the HTTP transport.
#[derive(Clone)]
pub struct ConfigApp {
    ingest: ConfigIngestHandler,
}

impl ConfigApp {
    pub fn new(ingest: ConfigIngestHandler) -> Self {
        Self { ingest }
    }

    /// Route one request with a form body given as a string.
    pub fn handle(&self, method: &Method, url: &str, body: &str) -> Reply {
        self.handle_form(method, url, &parse_form(body))
    }

    /// Route one request with an already decoded form. `url` may carry a
    /// query string, which is ignored.
    pub fn handle_form(&self, method: &Method, url: &str, form: &HashMap<String, String>) -> Reply {
        let path = url.split('?').next().unwrap_or(url);
        match (method, path) {
            (Method::Get, "/") => self.page(),
            (Method::Post, "/") => {
                let report = self.ingest.ingest(form);
                debug!("Ingest: {:?}", report);
                self.page()
            }
            (Method::Get, "/status") => self.status(),
            _ => Reply::not_found(),
        }
    }

    fn page(&self) -> Reply {
        match render_page(&self.ingest.state().snapshot()) {
            Ok(html) => Reply::new(200, CONTENT_HTML, html),
            Err(e) => {
                error!("Page buffer allocation failed: {}", e);
                Reply::new(503, CONTENT_TEXT, "Service Unavailable")
            }
        }
    }

    fn status(&self) -> Reply {
        let state = self.ingest.state();
        let snapshot = state.snapshot();
        match serde_json::to_string(&StatusReport::new(&snapshot, state.uptime())) {
            Ok(json) => Reply::new(200, CONTENT_JSON, json),
            Err(e) => {
                error!("Status serialization failed: {}", e);
                Reply::new(500, CONTENT_TEXT, "Internal Server Error")
            }
        }
    }
}

/// HTTP server thread.
///
/// Drop it to stop the server.
pub struct ConfigServer {
    handle: Option<thread::JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    local_addr: Option<SocketAddr>,
}

impl ConfigServer {
    /// Bind `bind_addr:port` (all interfaces when `None`) and start serving.
    pub fn start(bind_addr: Option<IpAddr>, port: u16, app: ConfigApp) -> Result<Self, std::io::Error> {
        let addr = match bind_addr {
            Some(ip) => format!("{}:{}", ip, port),
            None => format!("0.0.0.0:{}", port),
        };

        let server = Server::http(&addr)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::AddrInUse, format!("{}", e)))?;
        let local_addr = server.server_addr().to_ip();
        info!(
            "Configuration page on http://{}/",
            local_addr.map(|a| a.to_string()).unwrap_or(addr)
        );

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let handle = thread::Builder::new()
            .name("http".into())
            .stack_size(HTTP_STACK_SIZE)
            .spawn(move || Self::run_server(server, app, shutdown_clone))?;

        Ok(Self {
            handle: Some(handle),
            shutdown,
            local_addr,
        })
    }

    /// Address actually bound, useful with port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    fn run_server(server: Server, app: ConfigApp, shutdown: Arc<AtomicBool>) {
        loop {
            if shutdown.load(Ordering::Acquire) {
                info!("Configuration server shutting down");
                break;
            }

            match server.recv_timeout(POLL_INTERVAL) {
                Ok(Some(request)) => Self::serve(&app, request),
                Ok(None) => {}
                Err(e) => {
                    error!("Server error: {}", e);
                    break;
                }
            }
        }
    }

    fn serve(app: &ConfigApp, mut request: Request) {
        debug!("{} {}", request.method(), request.url());
        for header in request.headers() {
            debug!("  {}", header);
        }

        let reply = match request.body_length() {
            Some(len) if !body_fits(len) => {
                warn!("Rejecting {} byte body (limit {})", len, MAX_BODY_LEN);
                Reply::new(413, CONTENT_TEXT, "Payload Too Large")
            }
            _ => {
                let form = match read_form(request.as_reader().take(MAX_BODY_LEN)) {
                    Ok(form) => form,
                    Err(e) => {
                        warn!("Failed to read request body: {}", e);
                        HashMap::new()
                    }
                };
                app.handle_form(request.method(), request.url(), &form)
            }
        };
        let content_type = Header::from_bytes(&b"Content-Type"[..], reply.content_type.as_bytes())
            .expect("static header");
        let response = Response::from_string(reply.body)
            .with_status_code(reply.status)
            .with_header(content_type);

        if let Err(e) = request.respond(response) {
            warn!("Failed to send response: {}", e);
        }
    }

    /// Stop the server. Takes up to one poll interval.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ConfigServer {
    fn drop(&mut self) {
        self.stop();
    }
}
