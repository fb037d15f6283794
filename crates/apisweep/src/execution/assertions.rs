//! Request assertion evaluation
//!
//! Failed assertions become failing [`TestResult`]s. Assertions that cannot
//! be evaluated at all (a malformed JSON pointer, a non-JSON body) abort
//! evaluation with a script error.

use crate::request::{Assertion, HttpResponse, TestResult};

/// Evaluate every assertion against a response
pub fn evaluate(assertions: &[Assertion], response: &HttpResponse) -> Result<Vec<TestResult>, String> {
    let mut parsed_body: Option<serde_json::Value> = None;
    let mut results = Vec::with_capacity(assertions.len());

    for assertion in assertions {
        let name = assertion.describe();
        let result = match assertion {
            Assertion::Status { equals } => {
                if response.status == *equals {
                    TestResult::pass(name)
                } else {
                    TestResult::fail(name, format!("got {}", response.status))
                }
            }
            Assertion::BodyContains { text } => {
                let body = String::from_utf8_lossy(&response.body);
                if body.contains(text.as_str()) {
                    TestResult::pass(name)
                } else {
                    TestResult::fail(name, "text not found in body")
                }
            }
            Assertion::Header { name: header, equals } => match (response.header(header), equals) {
                (None, _) => TestResult::fail(name, "header missing"),
                (Some(actual), Some(expected)) if actual != expected => {
                    TestResult::fail(name, format!("got {actual:?}"))
                }
                (Some(_), _) => TestResult::pass(name),
            },
            Assertion::JsonPointer { pointer, equals } => {
                if !pointer.is_empty() && !pointer.starts_with('/') {
                    return Err(format!("invalid JSON pointer {pointer:?}"));
                }
                if parsed_body.is_none() {
                    let value = serde_json::from_slice(&response.body)
                        .map_err(|e| format!("body is not JSON: {e}"))?;
                    parsed_body = Some(value);
                }
                let found = parsed_body.as_ref().and_then(|body| body.pointer(pointer));
                match (found, equals) {
                    (None, _) => TestResult::fail(name, "pointer did not resolve"),
                    (Some(actual), Some(expected)) if actual != expected => {
                        TestResult::fail(name, format!("got {actual}"))
                    }
                    (Some(_), _) => TestResult::pass(name),
                }
            }
        };
        results.push(result);
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(body: &str) -> HttpResponse {
        HttpResponse {
            status: 200,
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_passing_and_failing_assertions() {
        let assertions = vec![
            Assertion::Status { equals: 200 },
            Assertion::Status { equals: 201 },
            Assertion::BodyContains { text: "alice".into() },
            Assertion::Header {
                name: "content-type".into(),
                equals: Some("application/json".into()),
            },
            Assertion::Header {
                name: "x-missing".into(),
                equals: None,
            },
            Assertion::JsonPointer {
                pointer: "/users/0/name".into(),
                equals: Some(serde_json::json!("alice")),
            },
        ];
        let results = evaluate(&assertions, &response(r#"{"users":[{"name":"alice"}]}"#)).unwrap();
        let passed: Vec<bool> = results.iter().map(|r| r.passed).collect();
        assert_eq!(passed, vec![true, false, true, true, false, true]);
        assert_eq!(results[1].message.as_deref(), Some("got 200"));
    }

    #[test]
    fn test_json_pointer_on_non_json_body_is_script_error() {
        let assertions = vec![Assertion::JsonPointer {
            pointer: "/id".into(),
            equals: None,
        }];
        let err = evaluate(&assertions, &response("<html>")).unwrap_err();
        assert!(err.starts_with("body is not JSON"));
    }

    #[test]
    fn test_malformed_pointer_is_script_error() {
        let assertions = vec![Assertion::JsonPointer {
            pointer: "id".into(),
            equals: None,
        }];
        assert!(evaluate(&assertions, &response("{}")).is_err());
    }

    #[test]
    fn test_no_assertions() {
        assert!(evaluate(&[], &response("")).unwrap().is_empty());
    }
}
