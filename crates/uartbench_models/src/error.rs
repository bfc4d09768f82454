//! Model construction errors.

/// Errors raised when building a behavioral device.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// The clock is too slow to time the requested baud rate.
    #[error("cannot time {baud} baud from a {clock_hz} Hz clock (need at least 4 clocks per bit)")]
    InvalidTiming {
        /// Requested clock frequency in hertz.
        clock_hz: u64,
        /// Requested baud rate.
        baud: u64,
    },
}
