//! Configuration types and the workspace file loader

use crate::environment::{Environment, EnvironmentStore};
use crate::error::ConfigError;
use crate::request::RequestSpec;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// HTTP client settings
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Follow 3xx redirects
    pub follow_redirects: bool,
    /// Accept invalid TLS certificates
    pub insecure: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: apisweep_common::defaults::DEFAULT_REQUEST_TIMEOUT_SECS,
            follow_redirects: true,
            insecure: false,
        }
    }
}

/// Runtime behavior flags
#[derive(Debug, Clone, Default)]
pub struct RuntimeFlags {
    /// Skip writing the run summary to the history database
    pub no_history: bool,
    /// Suppress live progress lines
    pub quiet: bool,
    /// Output JSON file path
    pub output: Option<String>,
}

/// Configuration for a run
///
/// Composed of focused sub-configs. Fields are accessible both through the
/// sub-configs and through flat accessor methods.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub workspace: PathBuf,
    pub http: HttpConfig,
    pub flags: RuntimeFlags,
}

impl RunConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs)
    }

    pub fn no_history(&self) -> bool {
        self.flags.no_history
    }
    pub fn quiet(&self) -> bool {
        self.flags.quiet
    }
    pub fn output(&self) -> Option<&str> {
        self.flags.output.as_deref()
    }
}

/// The on-disk workspace: environments and request definitions
///
/// ```json
/// {
///   "default_environment": "dev",
///   "environments": { "dev": { "host": "localhost:8080" } },
///   "requests": { "users": { "method": "GET", "url": "http://{{host}}/users" } }
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkspaceFile {
    #[serde(default)]
    pub default_environment: Option<String>,
    #[serde(default)]
    pub environments: BTreeMap<String, BTreeMap<String, String>>,
    #[serde(default)]
    pub requests: BTreeMap<String, RequestSpec>,
}

impl WorkspaceFile {
    /// Load and validate a workspace file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::io(path.display().to_string(), e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut workspace: Self = serde_json::from_str(content)?;
        for (name, request) in workspace.requests.iter_mut() {
            if request.name.is_empty() {
                request.name = name.clone();
            }
            if request.url.trim().is_empty() {
                return Err(ConfigError::EmptyUrl(name.clone()));
            }
            if request.method.trim().is_empty() {
                return Err(ConfigError::EmptyMethod(name.clone()));
            }
        }
        if let Some(default) = &workspace.default_environment
            && !workspace.environments.contains_key(default)
        {
            return Err(ConfigError::UnknownEnvironment(default.clone()));
        }
        Ok(workspace)
    }

    /// Look up a request definition by name
    pub fn request(&self, name: &str) -> Result<RequestSpec, ConfigError> {
        self.requests
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownRequest(name.to_string()))
    }

    /// Check that every name refers to a defined environment
    pub fn check_environments<'a>(
        &self,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), ConfigError> {
        for name in names {
            if !self.environments.contains_key(name) {
                return Err(ConfigError::UnknownEnvironment(name.to_string()));
            }
        }
        Ok(())
    }

    /// Build the environment store, optionally overriding the default selection
    pub fn environment_store(&self, active: Option<&str>) -> EnvironmentStore {
        let environments = self
            .environments
            .iter()
            .map(|(name, variables)| Environment {
                name: name.clone(),
                variables: variables.clone(),
            })
            .collect();
        let active = active
            .map(str::to_string)
            .or_else(|| self.default_environment.clone());
        EnvironmentStore::new(environments, active)
    }
}
