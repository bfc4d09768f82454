//! Scenario error types.

use uartbench_agents::AgentError;
use uartbench_models::ModelError;
use uartbench_sim::{SimError, SimTime};

use crate::report::Mismatch;

/// Why a case failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScenarioError {
    /// A bounded wait on the device elapsed.
    #[error("timed out after {after} waiting for {waiting_for}")]
    Timeout {
        /// What the case was waiting for.
        waiting_for: String,
        /// The bound that elapsed.
        after: SimTime,
    },

    /// The captured bytes differ from the expected ones.
    #[error(transparent)]
    Mismatch(#[from] Mismatch),

    /// An agent reported a protocol violation or failed to start.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// The device model could not be built.
    #[error("device model: {0}")]
    Model(#[from] ModelError),

    /// The kernel failed.
    #[error(transparent)]
    Sim(#[from] SimError),
}
