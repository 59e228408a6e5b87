//! Error types for faultprop.
//!
//! All errors are strongly typed using thiserror. Configuration problems
//! (bad names, unknown fault modes, conflicting run flags) are reported as
//! [`ValidationError`] before any simulation work starts, and are kept
//! distinct from [`ExecutionError`], which covers conditions that arise while
//! a model is being advanced.

use thiserror::Error;

use crate::model::Time;

/// Configuration errors detected before or outside of simulation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Invalid {kind} name '{name}': names must match [A-Za-z_][A-Za-z0-9_-]*")]
    InvalidName {
        kind: &'static str,
        name: String,
    },

    #[error("Duplicate {kind} name '{name}'")]
    DuplicateName {
        kind: &'static str,
        name: String,
    },

    #[error("Function '{function}' port '{port}' references unknown flow '{flow}'")]
    UnknownPortFlow {
        function: String,
        port: String,
        flow: String,
    },

    #[error("Unknown function '{name}'")]
    UnknownFunction {
        name: String,
    },

    #[error("Unknown flow '{name}'")]
    UnknownFlow {
        name: String,
    },

    #[error("Function '{function}' has no fault mode '{mode}'")]
    UnknownFaultMode {
        function: String,
        mode: String,
    },

    #[error("Fault mode '{mode}' of function '{function}' is invalid: {reason}")]
    InvalidFaultMode {
        function: String,
        mode: String,
        reason: String,
    },

    #[error("Invalid timeline: {reason}")]
    InvalidTimeline {
        reason: String,
    },

    #[error("Time {time} is not a point of the timeline {start}..={end} step {step}")]
    TimeOutsideTimeline {
        time: Time,
        start: Time,
        end: Time,
        step: Time,
    },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        reason: String,
    },

    #[error("Reuse and staged execution cannot be requested together")]
    ConflictingRunModes,

    #[error("Checkpoint entered at t={checkpoint} cannot resume a scenario injected at t={scenario}")]
    CheckpointMismatch {
        checkpoint: Time,
        scenario: Time,
    },

    #[error("Histories cannot be compared: {reason}")]
    HistoryMismatch {
        reason: String,
    },
}

/// Errors raised while a model is being simulated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    #[error("Function '{function}' failed at t={time}: {message}")]
    Behavior {
        function: String,
        time: Time,
        message: String,
    },

    #[error(
        "No fixed point at t={time} after {rounds} rounds (injections: {injections:?}, last function: {last_function:?})"
    )]
    NonConvergence {
        time: Time,
        rounds: usize,
        injections: Vec<String>,
        last_function: Option<String>,
    },

    #[error("Batch worker could not be started: {message}")]
    WorkerSpawn {
        message: String,
    },

    #[error("Batch worker disconnected before replying")]
    Disconnected,
}

/// Top-level error type for faultprop.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FaultPropError {
    #[error("Configuration error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl FaultPropError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is a simulation-runtime error.
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    /// Returns true if the round cap was hit under a failing convergence policy.
    #[must_use]
    pub const fn is_non_convergence(&self) -> bool {
        matches!(self, Self::Execution(ExecutionError::NonConvergence { .. }))
    }
}

/// Result type alias for faultprop operations.
pub type FaultPropResult<T> = Result<T, FaultPropError>;
