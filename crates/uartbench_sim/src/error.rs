//! Simulation error types.
//!
//! All errors that can occur while building a simulation or running it are
//! represented as variants of [`SimError`].

use crate::time::SimTime;

/// Errors that can occur during simulation setup or execution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimError {
    /// No signal with the given name exists.
    #[error("unknown signal '{0}'")]
    UnknownSignal(String),

    /// The device does not declare the named parameter.
    #[error("unknown device parameter '{0}'")]
    UnknownParameter(String),

    /// A signal with the given name was already declared.
    #[error("signal '{0}' is already declared")]
    DuplicateSignal(String),

    /// The device names a clock port it does not declare.
    #[error("device clock port '{0}' is not among its ports")]
    MissingClock(String),

    /// A task could not be spawned onto the executor.
    #[error("failed to spawn simulation task: {reason}")]
    Spawn {
        /// Why the executor refused the task.
        reason: String,
    },

    /// An awaited operation did not complete within its bound.
    #[error("timed out after {after} of simulated time")]
    Timeout {
        /// The bound that elapsed.
        after: SimTime,
    },

    /// The run reached its configured time limit before the main task finished.
    #[error("time limit exceeded: {limit}")]
    TimeLimitExceeded {
        /// The configured limit.
        limit: SimTime,
    },

    /// Every task is suspended and nothing is scheduled to wake any of them.
    #[error("simulation stalled at {time}: no pending timers and the main task is suspended")]
    Stalled {
        /// Time at which the kernel ran out of events.
        time: SimTime,
    },

    /// Too many delta cycles at a single time step.
    #[error("delta cycle limit exceeded at {time} (max {max_deltas} deltas)")]
    DeltaCycleLimit {
        /// Time step at which the limit was hit.
        time: SimTime,
        /// The maximum number of delta cycles allowed.
        max_deltas: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_signal_display() {
        let e = SimError::UnknownSignal("uart_rx_i".into());
        assert_eq!(e.to_string(), "unknown signal 'uart_rx_i'");
    }

    #[test]
    fn unknown_parameter_display() {
        let e = SimError::UnknownParameter("BAUD_RATE".into());
        assert_eq!(e.to_string(), "unknown device parameter 'BAUD_RATE'");
    }

    #[test]
    fn timeout_display() {
        let e = SimError::Timeout {
            after: SimTime::from_ms(5),
        };
        assert_eq!(e.to_string(), "timed out after 5 ms of simulated time");
    }

    #[test]
    fn time_limit_display() {
        let e = SimError::TimeLimitExceeded {
            limit: SimTime::from_us(100),
        };
        assert_eq!(e.to_string(), "time limit exceeded: 100 us");
    }

    #[test]
    fn stalled_display() {
        let e = SimError::Stalled {
            time: SimTime::from_ns(20),
        };
        assert!(e.to_string().starts_with("simulation stalled at 20 ns"));
    }

    #[test]
    fn delta_cycle_limit_display() {
        let e = SimError::DeltaCycleLimit {
            time: SimTime::from_ns(1),
            max_deltas: 10000,
        };
        assert_eq!(
            e.to_string(),
            "delta cycle limit exceeded at 1 ns (max 10000 deltas)"
        );
    }
}
