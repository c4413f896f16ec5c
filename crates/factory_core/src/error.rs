//! Error taxonomy for the engine.
//!
//! Gate failures during scheduling are never errors; they become
//! `BlockReason` statuses on the task. Everything here is either fatal
//! pre-run (config), fatal mid-run (invariant breach, wall-clock timeout),
//! or a structured expansion failure surfaced to the caller.

use thiserror::Error;

/// Invalid runtime configuration. Fatal before the run starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("config `{key}` = {value} is out of range: {reason}")]
    OutOfRange {
        key: &'static str,
        value: f64,
        reason: &'static str,
    },
}

/// Why storage refused an admission.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum StorageRejection {
    #[error("volume cap exceeded: {projected_m3:.1} m3 of {cap_m3:.1} m3")]
    Volume { projected_m3: f32, cap_m3: f32 },
    #[error("weight cap exceeded: {projected_t:.1} t of {cap_t:.1} t")]
    Weight { projected_t: f32, cap_t: f32 },
    #[error(
        "storage temperature conflict: incoming {incoming_c:.0} C vs stored {stored_c:.0} C"
    )]
    Temperature { incoming_c: f32, stored_c: f32 },
}

/// Recipe expansion failure. The task queue is left exactly as it was before
/// the failed expansion call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpansionError {
    #[error("circular recipe dependency: {}", format_path(path))]
    Cycle { path: Vec<String> },
    #[error("no recipe produces `{kind_name}`")]
    NoRecipe { kind_name: String },
    #[error("cannot admit {quantity:.1} t of `{kind_name}`: {rejection}")]
    Storage {
        kind_name: String,
        quantity: f32,
        rejection: StorageRejection,
    },
}

/// Top-level simulation failure.
#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Expansion(#[from] ExpansionError),
    /// An internal invariant broke (e.g. inventory went negative). A code
    /// defect, never a recoverable condition.
    #[error("simulation state invariant violated: {detail}")]
    State { detail: String },
    #[error(
        "wall-clock budget exhausted after {wall_seconds:.0} s at sim t={sim_hours:.1} h"
    )]
    Timeout { sim_hours: f32, wall_seconds: f32 },
}

fn format_path(path: &[String]) -> String {
    path.join(" -> ")
}
