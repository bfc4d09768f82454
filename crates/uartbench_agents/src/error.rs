//! Agent error types.

use uartbench_sim::{SimError, SimTime};

/// A frame whose stop bit was sampled low.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramingError {
    /// Time of the frame's start edge.
    pub time: SimTime,
    /// The data bits assembled before the bad stop bit.
    pub data: u8,
}

/// Errors surfaced by verification agents.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AgentError {
    /// The line violated UART framing; the assembled bits are not a byte.
    #[error("framing error in frame starting at {}: stop bit low after data {:#04x}", .0.time, .0.data)]
    Framing(FramingError),

    /// The kernel refused an operation.
    #[error(transparent)]
    Sim(#[from] SimError),
}

impl From<FramingError> for AgentError {
    fn from(err: FramingError) -> Self {
        AgentError::Framing(err)
    }
}
