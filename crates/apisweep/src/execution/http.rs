//! reqwest-backed execution service

use super::{Completion, Dispatch, ExecutionService, assertions};
use crate::config::HttpConfig;
use crate::environment::{EnvironmentStore, ResolvedRequest};
use crate::orchestrator::LoopMessage;
use crate::request::{Assertion, Exchange, ExecutionOutcome, HttpResponse};
use anyhow::{Context, Result};
use reqwest::redirect::Policy;
use reqwest::{Client, Method};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, warn};

const MAX_REDIRECTS: usize = 10;

/// Executes HTTP requests on tokio tasks and posts completions to the loop
pub struct HttpExecutor {
    client: Client,
    tx: mpsc::Sender<LoopMessage>,
}

impl HttpExecutor {
    pub fn new(config: &HttpConfig, tx: mpsc::Sender<LoopMessage>) -> Result<Self> {
        let redirect = if config.follow_redirects {
            Policy::limited(MAX_REDIRECTS)
        } else {
            Policy::none()
        };
        let client = Client::builder()
            .redirect(redirect)
            .danger_accept_invalid_certs(config.insecure)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, tx })
    }
}

impl ExecutionService for HttpExecutor {
    fn dispatch(&self, dispatch: Dispatch, environments: &EnvironmentStore) {
        let resolved = environments.resolve_request(&dispatch.request);
        let client = self.client.clone();
        let tx = self.tx.clone();
        let dispatch_id = dispatch.id;
        let timeout = dispatch.options.timeout;
        let assertions = dispatch.request.assertions;

        debug!(dispatch_id = %dispatch_id, method = %resolved.method, url = %resolved.url, "Dispatching request");

        tokio::spawn(async move {
            let outcome = execute(&client, resolved, &assertions, timeout).await;
            let completion = Completion {
                dispatch_id,
                outcome,
            };
            if tx.send(LoopMessage::Completion(completion)).await.is_err() {
                warn!(dispatch_id = %dispatch_id, "Event loop closed before completion was delivered");
            }
        });
    }
}

async fn execute(
    client: &Client,
    request: ResolvedRequest,
    assertions: &[Assertion],
    timeout: Duration,
) -> ExecutionOutcome {
    let request_text = request.to_text();
    let start = Instant::now();
    let exchange = send(client, request, timeout).await;
    let duration = start.elapsed();

    let (test_results, script_error) = match &exchange {
        Exchange::Http(response) => match assertions::evaluate(assertions, response) {
            Ok(results) => (results, None),
            Err(error) => (Vec::new(), Some(error)),
        },
        _ => (Vec::new(), None),
    };

    ExecutionOutcome {
        exchange,
        test_results,
        script_error,
        duration,
        request_text,
    }
}

async fn send(client: &Client, request: ResolvedRequest, timeout: Duration) -> Exchange {
    let method = match Method::from_bytes(request.method.as_bytes()) {
        Ok(method) => method,
        Err(_) => return failed(format!("invalid method {:?}", request.method)),
    };

    let mut builder = client.request(method, &request.url).timeout(timeout);
    for (name, value) in &request.headers {
        builder = builder.header(name, value);
    }
    if let Some(body) = request.body {
        builder = builder.body(body);
    }

    let response = match builder.send().await {
        Ok(response) => response,
        Err(e) => return failed(describe_error(&e, timeout)),
    };

    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();

    match response.bytes().await {
        Ok(body) => Exchange::Http(HttpResponse {
            status,
            headers,
            body: body.to_vec(),
        }),
        Err(e) => failed(describe_error(&e, timeout)),
    }
}

fn failed(message: String) -> Exchange {
    Exchange::Failed {
        message,
        canceled: false,
    }
}

fn describe_error(error: &reqwest::Error, timeout: Duration) -> String {
    if error.is_timeout() {
        format!("request timed out after {}s", timeout.as_secs_f64())
    } else if error.is_connect() {
        format!("connection failed: {error}")
    } else if error.is_builder() {
        format!("invalid request: {error}")
    } else {
        error.to_string()
    }
}
