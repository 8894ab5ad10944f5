//! `tiny_http` adapter.
//!
//! A fixed pool of worker threads shares one listener; each worker blocks in
//! `recv()`, converts the request, and dispatches it to
//! [`handle_request`](super::handle_request).

use super::routes::{handle_request, HttpRequest, HttpResponse};
use super::AppState;
use st_common::Error;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tiny_http::{Header, Request, Response, Server, StatusCode};
use tracing::{debug, info, info_span, warn};

/// Requests with a larger body are answered with 413.
pub const MAX_BODY_BYTES: u64 = 4 * 1024 * 1024;

const CORS_HEADERS: &[(&str, &str)] = &[
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Methods", "GET, POST, OPTIONS, HEAD"),
    ("Access-Control-Allow-Headers", "*"),
];

/// Handle to a server running on background workers.
pub struct RunningServer {
    addr: SocketAddr,
    server: Arc<Server>,
    shutdown: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl RunningServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Block until every worker exits.
    pub fn wait(self) {
        for worker in self.workers {
            if worker.join().is_err() {
                warn!("request worker panicked");
            }
        }
    }

    /// Stop accepting requests and join the workers.
    pub fn shutdown(self) {
        self.shutdown.store(true, Ordering::SeqCst);
        for _ in &self.workers {
            self.server.unblock();
        }
        info!(addr = %self.addr, "server shutting down");
        self.wait();
    }
}

/// Bind `bind` and start `workers` request threads.
pub fn spawn(state: Arc<AppState>, bind: &str, workers: usize) -> Result<RunningServer, Error> {
    let server = Server::http(bind).map_err(|e| Error::Server(format!("bind {bind}: {e}")))?;
    let addr = server
        .server_addr()
        .to_ip()
        .ok_or_else(|| Error::Server(format!("{bind} is not an IP listener")))?;
    let server = Arc::new(server);
    let shutdown = Arc::new(AtomicBool::new(false));

    let mut handles = Vec::with_capacity(workers);
    for n in 0..workers.max(1) {
        let server = Arc::clone(&server);
        let state = Arc::clone(&state);
        let shutdown = Arc::clone(&shutdown);
        let handle = thread::Builder::new()
            .name(format!("http-worker-{n}"))
            .spawn(move || worker_loop(&server, &state, &shutdown))?;
        handles.push(handle);
    }

    info!(%addr, workers = handles.len(), "listening");
    Ok(RunningServer {
        addr,
        server,
        shutdown,
        workers: handles,
    })
}

/// Serve with the configured bind address and worker count until the
/// workers exit.
pub fn serve(state: Arc<AppState>) -> Result<(), Error> {
    let bind = state.config.server.bind_address();
    let workers = state.config.server.workers;
    spawn(state, &bind, workers)?.wait();
    Ok(())
}

fn worker_loop(server: &Server, state: &AppState, shutdown: &AtomicBool) {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match server.recv() {
            Ok(request) => dispatch(state, request),
            Err(e) => {
                if shutdown.load(Ordering::SeqCst) {
                    break;
                }
                warn!(error = %e, "failed to receive request");
            }
        }
    }
}

fn dispatch(state: &AppState, mut request: Request) {
    let request_id = uuid::Uuid::new_v4().simple().to_string();
    let span = info_span!(
        "request",
        id = &request_id[..8],
        method = %request.method(),
        url = %request.url()
    );
    let _guard = span.enter();

    let response = match read_request(&mut request) {
        Ok(parsed) => handle_request(state, &parsed),
        Err(ReadError::TooLarge) => {
            warn!(limit = MAX_BODY_BYTES, "request body too large");
            HttpResponse {
                status: 413,
                content_type: "application/json",
                body: r#"{"error":"Payload Too Large"}"#.to_string(),
            }
        }
        Err(ReadError::Io(e)) => {
            warn!(error = %e, "failed to read request body");
            HttpResponse {
                status: 400,
                content_type: "text/plain; charset=utf-8",
                body: "Bad Request".to_string(),
            }
        }
    };

    let status = response.status;
    if let Err(e) = request.respond(into_tiny(response)) {
        warn!(error = %e, "failed to write response");
        return;
    }
    debug!(status, "request handled");
}

#[derive(Debug)]
enum ReadError {
    TooLarge,
    Io(std::io::Error),
}

impl From<std::io::Error> for ReadError {
    fn from(e: std::io::Error) -> Self {
        ReadError::Io(e)
    }
}

fn read_request(request: &mut Request) -> Result<HttpRequest, ReadError> {
    if request
        .body_length()
        .is_some_and(|len| len as u64 > MAX_BODY_BYTES)
    {
        return Err(ReadError::TooLarge);
    }
    let body = read_body(request.as_reader(), MAX_BODY_BYTES)?;

    let headers: HashMap<String, String> = request
        .headers()
        .iter()
        .map(|h| {
            (
                h.field.as_str().as_str().to_ascii_lowercase(),
                h.value.as_str().to_string(),
            )
        })
        .collect();

    Ok(HttpRequest {
        method: request.method().as_str().to_string(),
        target: request.url().to_string(),
        headers,
        body,
        peer: request.remote_addr().map(|addr| addr.ip()),
    })
}

/// Read at most `limit` bytes; one byte more means the body is too large.
fn read_body(reader: impl Read, limit: u64) -> Result<Vec<u8>, ReadError> {
    let mut body = Vec::new();
    reader.take(limit.saturating_add(1)).read_to_end(&mut body)?;
    if body.len() as u64 > limit {
        return Err(ReadError::TooLarge);
    }
    Ok(body)
}

fn into_tiny(response: HttpResponse) -> Response<Cursor<Vec<u8>>> {
    let mut headers = Vec::with_capacity(CORS_HEADERS.len() + 1);
    let pairs = CORS_HEADERS
        .iter()
        .copied()
        .chain(std::iter::once(("Content-Type", response.content_type)));
    for (name, value) in pairs {
        match Header::from_bytes(name.as_bytes(), value.as_bytes()) {
            Ok(header) => headers.push(header),
            Err(()) => warn!(name, "invalid response header"),
        }
    }

    let body = response.body.into_bytes();
    let len = body.len();
    Response::new(StatusCode(response.status), headers, Cursor::new(body), Some(len), None)
}
