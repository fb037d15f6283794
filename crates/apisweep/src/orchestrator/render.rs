//! Response staleness guard
//!
//! Response formatting happens off the loop and may finish after a newer
//! dispatch was issued. Each dispatch issues a [`RenderToken`]; only the
//! payload carrying the currently active token may reach the display.

use crate::request::{Exchange, IterationOutcome};

/// Opaque, never-reused render token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderToken(u64);

/// Tracks the one render token whose payload may be displayed
#[derive(Debug)]
pub struct RenderTokenGuard<T> {
    next: u64,
    active: Option<RenderToken>,
    applied: Option<T>,
}

impl<T> Default for RenderTokenGuard<T> {
    fn default() -> Self {
        Self {
            next: 0,
            active: None,
            applied: None,
        }
    }
}

impl<T> RenderTokenGuard<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh token, making every earlier token stale
    pub fn issue(&mut self) -> RenderToken {
        self.next += 1;
        let token = RenderToken(self.next);
        self.active = Some(token);
        token
    }

    /// Apply `payload` if `token` is the active token
    pub fn accept(&mut self, token: RenderToken, payload: T) -> bool {
        if self.active != Some(token) {
            return false;
        }
        self.active = None;
        self.applied = Some(payload);
        true
    }

    pub fn active(&self) -> Option<RenderToken> {
        self.active
    }

    /// Whether a render is still outstanding
    pub fn is_pending(&self) -> bool {
        self.active.is_some()
    }

    /// The most recently applied payload
    pub fn current(&self) -> Option<&T> {
        self.applied.as_ref()
    }
}

/// Display-ready response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedResponse {
    pub title: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// A formatting job for one recorded iteration
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub token: RenderToken,
    pub outcome: IterationOutcome,
}

/// Format an iteration outcome for display
///
/// JSON bodies are pretty-printed; anything else is shown as lossy UTF-8.
pub fn format_outcome(outcome: &IterationOutcome) -> RenderedResponse {
    let millis = outcome.duration.as_secs_f64() * 1000.0;
    match &outcome.exchange {
        None => RenderedResponse {
            title: "canceled".to_string(),
            headers: Vec::new(),
            body: String::new(),
        },
        Some(Exchange::Failed { message, .. }) => RenderedResponse {
            title: format!("error: {message}"),
            headers: Vec::new(),
            body: String::new(),
        },
        Some(Exchange::Http(response)) => RenderedResponse {
            title: format!("{} · {millis:.1} ms", response.status),
            headers: response.headers.clone(),
            body: pretty_body(&response.body),
        },
        Some(Exchange::Grpc(response)) => RenderedResponse {
            title: format!("{} {} · {millis:.1} ms", response.code_name, response.message),
            headers: Vec::new(),
            body: pretty_body(response.body.as_bytes()),
        },
    }
}

fn pretty_body(body: &[u8]) -> String {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|value| serde_json::to_string_pretty(&value).ok())
        .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{ExecutionOutcome, HttpResponse};
    use std::time::Duration;

    #[test]
    fn test_stale_token_rejected() {
        let mut guard = RenderTokenGuard::new();
        let t1 = guard.issue();
        let t2 = guard.issue();
        assert_ne!(t1, t2);

        assert!(!guard.accept(t1, "first"));
        assert!(guard.current().is_none());

        assert!(guard.accept(t2, "second"));
        assert_eq!(guard.current(), Some(&"second"));
        assert!(!guard.is_pending());

        // A token is accepted at most once
        assert!(!guard.accept(t2, "again"));
        assert_eq!(guard.current(), Some(&"second"));
    }

    #[test]
    fn test_tokens_never_repeat() {
        let mut guard = RenderTokenGuard::<()>::new();
        let tokens: Vec<_> = (0..5).map(|_| guard.issue()).collect();
        for (i, a) in tokens.iter().enumerate() {
            assert!(tokens[i + 1..].iter().all(|b| a != b));
        }
    }

    #[test]
    fn test_format_pretty_json() {
        let outcome = IterationOutcome::record(
            0,
            None,
            ExecutionOutcome {
                exchange: Exchange::Http(HttpResponse {
                    status: 200,
                    headers: vec![],
                    body: br#"{"id":1}"#.to_vec(),
                }),
                test_results: vec![],
                script_error: None,
                duration: Duration::from_millis(12),
                request_text: String::new(),
            },
            false,
        );
        let rendered = format_outcome(&outcome);
        assert_eq!(rendered.title, "200 · 12.0 ms");
        assert_eq!(rendered.body, "{\n  \"id\": 1\n}");
    }

    #[test]
    fn test_format_non_json_body() {
        assert_eq!(pretty_body(b"plain text"), "plain text");
    }
}
