//! Named environments and the ambient selection
//!
//! The store holds one ambient "active environment" selection. Comparison
//! sweeps override it for the duration of a single dispatch call through
//! [`EnvironmentStore::scoped`], which restores the previous selection when
//! the guard is dropped.

use crate::request::RequestSpec;
use std::collections::BTreeMap;
use std::ops::Deref;

/// A named set of variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub name: String,
    pub variables: BTreeMap<String, String>,
}

impl Environment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variables: BTreeMap::new(),
        }
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }
}

/// Environments plus the ambient selection
#[derive(Debug, Clone, Default)]
pub struct EnvironmentStore {
    environments: Vec<Environment>,
    active: Option<String>,
}

impl EnvironmentStore {
    pub fn new(environments: Vec<Environment>, active: Option<String>) -> Self {
        Self {
            environments,
            active,
        }
    }

    pub fn active_name(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn active(&self) -> Option<&Environment> {
        let name = self.active.as_deref()?;
        self.get(name)
    }

    pub fn get(&self, name: &str) -> Option<&Environment> {
        self.environments.iter().find(|e| e.name == name)
    }

    /// Replace the ambient selection, returning the previous one
    pub fn select(&mut self, name: Option<String>) -> Option<String> {
        std::mem::replace(&mut self.active, name)
    }

    /// Select `name` until the returned guard is dropped
    pub fn scoped(&mut self, name: &str) -> ScopedSelection<'_> {
        let previous = self.select(Some(name.to_string()));
        ScopedSelection {
            store: self,
            previous: Some(previous),
        }
    }

    /// Substitute `{{var}}` placeholders from the active environment
    ///
    /// Unknown variables are left in place.
    pub fn resolve(&self, template: &str) -> String {
        let Some(env) = self.active() else {
            return template.to_string();
        };
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find("}}") else {
                out.push_str(&rest[start..]);
                return out;
            };
            let key = after[..end].trim();
            match env.variables.get(key) {
                Some(value) => out.push_str(value),
                None => out.push_str(&rest[start..start + 2 + end + 2]),
            }
            rest = &after[end + 2..];
        }
        out.push_str(rest);
        out
    }

    /// Resolve every template field of a request against the active environment
    pub fn resolve_request(&self, request: &RequestSpec) -> ResolvedRequest {
        ResolvedRequest {
            method: request.method.trim().to_ascii_uppercase(),
            url: self.resolve(&request.url),
            headers: request
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), self.resolve(v)))
                .collect(),
            body: request.body.as_deref().map(|b| self.resolve(b)),
        }
    }
}

/// RAII guard for a temporary environment selection
pub struct ScopedSelection<'a> {
    store: &'a mut EnvironmentStore,
    previous: Option<Option<String>>,
}

impl Deref for ScopedSelection<'_> {
    type Target = EnvironmentStore;

    fn deref(&self) -> &EnvironmentStore {
        self.store
    }
}

impl Drop for ScopedSelection<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            self.store.active = previous;
        }
    }
}

/// A request with all placeholders resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl ResolvedRequest {
    /// Plain-text snapshot of the request as sent
    pub fn to_text(&self) -> String {
        let mut text = format!("{} {}", self.method, self.url);
        for (name, value) in &self.headers {
            text.push_str(&format!("\n{name}: {value}"));
        }
        if let Some(body) = &self.body {
            text.push_str("\n\n");
            text.push_str(body);
        }
        text
    }
}
