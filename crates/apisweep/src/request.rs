//! Request templates, exchanges and per-iteration outcomes
//!
//! A [`RequestSpec`] is the immutable template a run replays. Every dispatch
//! produces an [`ExecutionOutcome`], which the controller records as an
//! [`IterationOutcome`] and classifies into a [`Verdict`].

use crate::error::FailureKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

fn default_method() -> String {
    "GET".to_string()
}

/// A named request template with `{{var}}` placeholders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSpec {
    /// Request name as it appears in the workspace
    #[serde(default)]
    pub name: String,
    /// HTTP method
    #[serde(default = "default_method")]
    pub method: String,
    /// URL template
    pub url: String,
    /// Header templates
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Body template
    #[serde(default)]
    pub body: Option<String>,
    /// Assertions evaluated against the response
    #[serde(default)]
    pub assertions: Vec<Assertion>,
}

impl RequestSpec {
    /// Create a bodiless request with no headers or assertions
    pub fn new(name: impl Into<String>, method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            method: method.into(),
            url: url.into(),
            headers: BTreeMap::new(),
            body: None,
            assertions: Vec::new(),
        }
    }
}

/// A response check attached to a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Assertion {
    /// Response status equals the given code
    Status { equals: u16 },
    /// Response body contains the given text
    BodyContains { text: String },
    /// A header is present, optionally with an exact value
    Header {
        name: String,
        #[serde(default)]
        equals: Option<String>,
    },
    /// A JSON pointer into the body resolves, optionally to an exact value
    JsonPointer {
        pointer: String,
        #[serde(default)]
        equals: Option<serde_json::Value>,
    },
}

impl Assertion {
    /// Human-readable name used for the test result
    pub fn describe(&self) -> String {
        match self {
            Self::Status { equals } => format!("status == {equals}"),
            Self::BodyContains { text } => format!("body contains {text:?}"),
            Self::Header { name, equals: None } => format!("header {name} present"),
            Self::Header {
                name,
                equals: Some(value),
            } => format!("header {name} == {value:?}"),
            Self::JsonPointer {
                pointer,
                equals: None,
            } => format!("json {pointer} present"),
            Self::JsonPointer {
                pointer,
                equals: Some(value),
            } => format!("json {pointer} == {value}"),
        }
    }
}

/// Result of one assertion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    pub message: Option<String>,
}

impl TestResult {
    pub fn pass(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            message: None,
        }
    }

    pub fn fail(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            message: Some(message.into()),
        }
    }
}

/// A received HTTP response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// First header value with the given name (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A received gRPC response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrpcResponse {
    /// Numeric status code (0 = OK)
    pub code: i32,
    /// Canonical status name, e.g. `UNAVAILABLE`
    pub code_name: String,
    pub message: String,
    pub body: String,
}

/// What came back from one dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exchange {
    Http(HttpResponse),
    Grpc(GrpcResponse),
    /// The exchange failed before a response was received
    Failed { message: String, canceled: bool },
}

impl Exchange {
    /// Status label shown in reports, if a response was received
    pub fn status_label(&self) -> Option<String> {
        match self {
            Self::Http(response) => Some(response.status.to_string()),
            Self::Grpc(response) => Some(response.code_name.clone()),
            Self::Failed { .. } => None,
        }
    }

    /// Whether the response status is classified as an error
    pub fn is_error_status(&self) -> bool {
        match self {
            Self::Http(response) => response.status >= 400,
            Self::Grpc(response) => response.code != 0,
            Self::Failed { .. } => false,
        }
    }

    pub fn transport_error(&self) -> Option<&str> {
        match self {
            Self::Failed { message, .. } => Some(message),
            _ => None,
        }
    }
}

/// Everything the execution service reports for one dispatch
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutcome {
    pub exchange: Exchange,
    pub test_results: Vec<TestResult>,
    pub script_error: Option<String>,
    pub duration: Duration,
    /// The request as it was actually sent, placeholders resolved
    pub request_text: String,
}

impl ExecutionOutcome {
    /// Whether the execution service itself observed cancellation
    pub fn is_canceled(&self) -> bool {
        matches!(self.exchange, Exchange::Failed { canceled: true, .. })
    }
}

/// One recorded iteration of a run
///
/// Canceled iterations carry no exchange and no script error.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationOutcome {
    pub index: usize,
    pub environment: Option<String>,
    pub exchange: Option<Exchange>,
    pub test_results: Vec<TestResult>,
    pub script_error: Option<String>,
    pub canceled: bool,
    pub request_text: String,
    pub duration: Duration,
}

impl IterationOutcome {
    /// Record an execution outcome, stripping the payload if canceled
    pub fn record(
        index: usize,
        environment: Option<String>,
        outcome: ExecutionOutcome,
        canceled: bool,
    ) -> Self {
        let canceled = canceled || outcome.is_canceled();
        if canceled {
            return Self {
                index,
                environment,
                exchange: None,
                test_results: Vec::new(),
                script_error: None,
                canceled: true,
                request_text: outcome.request_text,
                duration: outcome.duration,
            };
        }
        Self {
            index,
            environment,
            exchange: Some(outcome.exchange),
            test_results: outcome.test_results,
            script_error: outcome.script_error,
            canceled: false,
            request_text: outcome.request_text,
            duration: outcome.duration,
        }
    }

    pub fn failed_tests(&self) -> usize {
        self.test_results.iter().filter(|t| !t.passed).count()
    }

    pub fn status_label(&self) -> Option<String> {
        self.exchange.as_ref().and_then(Exchange::status_label)
    }

    /// Ordered success check: first applicable failure reason wins
    pub fn verdict(&self) -> Verdict {
        if self.canceled {
            return Verdict::Canceled;
        }
        if let Some(message) = self.exchange.as_ref().and_then(Exchange::transport_error) {
            return Verdict::failure(FailureKind::Transport, message);
        }
        if let Some(error) = &self.script_error {
            return Verdict::failure(FailureKind::Evaluation, format!("tests error: {error}"));
        }
        if let Some(exchange) = self.exchange.as_ref().filter(|e| e.is_error_status()) {
            let label = exchange.status_label().unwrap_or_default();
            return Verdict::failure(FailureKind::Status, format!("status {label}"));
        }
        match self.failed_tests() {
            0 => Verdict::Success,
            n => Verdict::failure(FailureKind::Assertion, format!("{n} test(s) failed")),
        }
    }
}

/// Classification of a recorded iteration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Success,
    Failure { kind: FailureKind, reason: String },
    Canceled,
}

impl Verdict {
    pub fn failure(kind: FailureKind, reason: impl Into<String>) -> Self {
        Self::Failure {
            kind,
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            Self::Success => None,
            Self::Failure { kind, .. } => Some(*kind),
            Self::Canceled => Some(FailureKind::Cancellation),
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Success => None,
            Self::Failure { reason, .. } => Some(reason),
            Self::Canceled => Some("canceled"),
        }
    }
}
