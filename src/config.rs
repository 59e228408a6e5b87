//! Simulation configuration.
//!
//! Plain serde structs with defaults and explicit validation. Configs can be
//! built in code or loaded from JSON with [`SimulationConfig::from_json`].

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::history::TrackSpec;

/// What to do when a tick hits the round cap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvergencePolicy {
    /// Keep the best available snapshot and attach a diagnostic.
    #[default]
    Report,
    /// Abort the run with `ExecutionError::NonConvergence`.
    Fail,
}

/// Bounds on the per-tick fixed-point iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropagationConfig {
    /// Maximum relaxation rounds per tick.
    pub max_rounds: usize,
    /// Behavior when `max_rounds` is exceeded.
    pub on_nonconvergence: ConvergencePolicy,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            max_rounds: 1000,
            on_nonconvergence: ConvergencePolicy::Report,
        }
    }
}

impl PropagationConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_rounds == 0 {
            return Err(ValidationError::InvalidConfig {
                reason: "max_rounds must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

/// How each scenario of a batch gets its model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Every scenario runs on a fresh copy of the pristine model.
    Fresh,
    /// One working model is reset between scenarios.
    Reuse,
    /// Scenarios resume from nominal checkpoints taken at their injection time.
    Staged,
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fresh => write!(f, "fresh"),
            Self::Reuse => write!(f, "reuse"),
            Self::Staged => write!(f, "staged"),
        }
    }
}

/// Options for a batch of scenarios.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchOptions {
    /// Reuse one model instance, resetting it between scenarios.
    pub reuse: bool,
    /// Resume each scenario from a nominal checkpoint.
    pub staged: bool,
    /// What each scenario records in its history.
    pub track: TrackSpec,
}

impl BatchOptions {
    /// Resolves the flags to a single execution mode.
    ///
    /// # Errors
    ///
    /// `ValidationError::ConflictingRunModes` when both `reuse` and `staged`
    /// are set.
    pub fn mode(&self) -> Result<ExecutionMode, ValidationError> {
        match (self.reuse, self.staged) {
            (true, true) => Err(ValidationError::ConflictingRunModes),
            (true, false) => Ok(ExecutionMode::Reuse),
            (false, true) => Ok(ExecutionMode::Staged),
            (false, false) => Ok(ExecutionMode::Fresh),
        }
    }
}

/// Worker pool settings for parallel batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Number of worker threads.
    pub workers: usize,
    /// Maximum queued scenarios.
    pub queue_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            queue_capacity: 1024,
        }
    }
}

impl RuntimeConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.workers == 0 {
            return Err(ValidationError::InvalidConfig {
                reason: "workers must be > 0".to_string(),
            });
        }
        if self.queue_capacity == 0 {
            return Err(ValidationError::InvalidConfig {
                reason: "queue_capacity must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

/// Top-level configuration of a [`crate::Simulator`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Fixed-point bounds.
    pub propagation: PropagationConfig,
    /// Parallel batch worker pool.
    pub runtime: RuntimeConfig,
}

impl SimulationConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.propagation.validate()?;
        self.runtime.validate()
    }

    /// Parses and validates a JSON configuration. Missing fields take their
    /// defaults.
    pub fn from_json(json: &str) -> Result<Self, ValidationError> {
        let config: Self = serde_json::from_str(json).map_err(|e| ValidationError::InvalidConfig {
            reason: format!("failed to parse configuration: {e}"),
        })?;
        config.validate()?;
        Ok(config)
    }
}
