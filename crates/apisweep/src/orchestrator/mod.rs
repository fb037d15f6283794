//! Run orchestration
//!
//! `RunController` owns the single active run and drives it one
//! [`LoopMessage`] at a time. The per-kind behaviour (comparison sweep,
//! profile, plain send) lives behind the [`IterationPlan`] trait; the
//! controller handles dispatch, correlation, cancellation and finalization
//! identically for all of them.

pub mod cancel;
pub mod compare;
pub mod controller;
pub mod events;
pub mod plan;
pub mod profile;
pub mod progress;
pub mod render;
pub mod results;
pub mod runtime;
pub mod send;
pub mod types;

pub use cancel::{CancelRequest, CancellationRegistry};
pub use compare::ComparisonPlan;
pub use controller::{
    CompareRequest, ProfileRequest, RunController, SendRequest, Services, StartRequest,
};
pub use events::{LoopMessage, RunEvent};
pub use plan::IterationPlan;
pub use profile::ProfilePlan;
pub use progress::{LogNotifier, StatusNotifier};
pub use render::{RenderJob, RenderToken, RenderTokenGuard, RenderedResponse};
pub use runtime::{LoopRuntime, TokioRuntime};
pub use send::SendPlan;
pub use types::{InFlight, RunCore, RunId, RunKind, RunState};
