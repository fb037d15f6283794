//! Notification severities and progress cell states
//!
//! `Severity` tags every status notification emitted by a run. `CellState`
//! is the per-iteration state rendered in the live progress label.

use serde::{Deserialize, Serialize};

/// Severity of a status notification
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Warn,
    Success,
}

/// State of one planned iteration, as shown in the progress label
///
/// - `Pending`: not yet dispatched (`?`)
/// - `InFlight`: dispatched, waiting for its completion (`…`)
/// - `Succeeded`: completed successfully (`✓`)
/// - `Failed`: completed with a failure or canceled (`✗`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum CellState {
    #[default]
    Pending,
    InFlight,
    Succeeded,
    Failed,
}

impl CellState {
    /// Glyph used in the progress label
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Pending => "?",
            Self::InFlight => "…",
            Self::Succeeded => "✓",
            Self::Failed => "✗",
        }
    }
}
