//! Run identity and per-run state

use super::plan::IterationPlan;
use super::render::RenderToken;
use crate::execution::{DispatchId, DispatchOptions};
use crate::request::{IterationOutcome, RequestSpec};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use uuid::Uuid;

/// Unique, time-ordered run identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Kind of run
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RunKind {
    Send,
    Compare,
    Profile,
}

/// The dispatch a run is currently waiting on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InFlight {
    pub dispatch_id: DispatchId,
    pub render_token: RenderToken,
    /// Environment the request was resolved against
    pub environment: Option<String>,
}

/// State shared by every run kind
#[derive(Debug)]
pub struct RunCore {
    pub id: RunId,
    pub kind: RunKind,
    /// Progress label, fixed at start
    pub label: String,
    /// Immutable request template; each dispatch gets a fresh clone
    pub base: RequestSpec,
    pub options: DispatchOptions,
    pub current: Option<InFlight>,
    /// Index of the next iteration to record
    pub index: usize,
    /// Set once, first reason wins
    pub cancel_reason: Option<String>,
    /// Append-only; element i belongs to planned iteration i
    pub results: Vec<IterationOutcome>,
    /// A delayed dispatch is scheduled for `index`
    pub awaiting_delay: bool,
    pub started_at: DateTime<Utc>,
    pub started: Instant,
}

impl RunCore {
    pub fn new(
        id: RunId,
        kind: RunKind,
        label: impl Into<String>,
        base: RequestSpec,
        options: DispatchOptions,
    ) -> Self {
        Self {
            id,
            kind,
            label: label.into(),
            base,
            options,
            current: None,
            index: 0,
            cancel_reason: None,
            results: Vec::new(),
            awaiting_delay: false,
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    pub fn is_canceled(&self) -> bool {
        self.cancel_reason.is_some()
    }

    pub fn is_in_flight(&self) -> bool {
        self.current.is_some()
    }
}

/// An active run: shared state plus its kind-specific plan
pub struct RunState {
    pub core: RunCore,
    pub plan: Box<dyn IterationPlan>,
}

impl fmt::Debug for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunState")
            .field("run_id", &self.core.id)
            .field("kind", &self.core.kind)
            .field("index", &self.core.index)
            .field("plan_length", &self.plan.plan_length())
            .finish()
    }
}
