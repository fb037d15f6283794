//! Scripted HTTP stub server
//!
//! An axum router with one route per canned response. Every request is
//! recorded, including ones that fall through to the 404 fallback.

use anyhow::Result;
use axum::Router;
use axum::body::to_bytes;
use axum::extract::{Request, State};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::debug;

/// A canned response
#[derive(Debug, Clone)]
pub struct StubResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub delay: Duration,
}

impl StubResponse {
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".to_string(), "text/plain".to_string())],
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn json(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    async fn respond(&self) -> Response {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, self.body.clone()).into_response();
        for (name, value) in &self.headers {
            match (
                HeaderName::try_from(name.as_str()),
                HeaderValue::try_from(value.as_str()),
            ) {
                (Ok(name), Ok(value)) => {
                    response.headers_mut().insert(name, value);
                }
                _ => debug!(%name, %value, "Skipping invalid stub header"),
            }
        }
        response
    }
}

/// A received request. `path` excludes the query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

type Recorder = Arc<Mutex<Vec<StubRequest>>>;

/// Local HTTP server answering from a fixed route table
pub struct StubServer {
    addr: SocketAddr,
    requests: Recorder,
    handle: JoinHandle<()>,
}

impl StubServer {
    /// Bind an ephemeral port on localhost and start serving
    pub async fn start<P: Into<String>>(routes: impl IntoIterator<Item = (P, StubResponse)>) -> Result<Self> {
        let requests: Recorder = Arc::new(Mutex::new(Vec::new()));

        let mut router = Router::<Recorder>::new();
        for (path, canned) in routes {
            let path: String = path.into();
            let canned = Arc::new(canned);
            router = router.route(
                &path,
                any(move |State(seen): State<Recorder>, request: Request| {
                    let canned = Arc::clone(&canned);
                    async move {
                        record(&seen, request).await;
                        canned.respond().await
                    }
                }),
            );
        }
        let router = router.fallback(not_found).with_state(Arc::clone(&requests));

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                debug!(error = %e, "Stub server stopped");
            }
        });

        Ok(Self {
            addr,
            requests,
            handle,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// `host:port`, for substituting into request URLs
    pub fn host(&self) -> String {
        self.addr.to_string()
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Requests received so far, in arrival order
    pub fn requests(&self) -> Vec<StubRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn record(seen: &Recorder, request: Request) {
    let (parts, body) = request.into_parts();
    let body = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            debug!(error = %e, "Failed to read stub request body");
            String::new()
        }
    };
    let headers = parts
        .headers
        .iter()
        .map(|(k, v)| (k.to_string(), String::from_utf8_lossy(v.as_bytes()).into_owned()))
        .collect();

    seen.lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(StubRequest {
            method: parts.method.to_string(),
            path: parts.uri.path().to_string(),
            query: parts.uri.query().map(str::to_string),
            headers,
            body,
        });
}

async fn not_found(State(seen): State<Recorder>, request: Request) -> Response {
    record(&seen, request).await;
    (StatusCode::NOT_FOUND, "not found").into_response()
}
