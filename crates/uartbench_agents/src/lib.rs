//! Verification agents for UART devices.
//!
//! Agents emulate the two interfaces a UART exposes, at the timing the
//! device sees on its pins:
//!
//! - [`UartSource`] / [`UartSink`] drive and sample an asynchronous serial
//!   line, one start bit, eight data bits LSB first and one stop bit per byte.
//! - [`StreamSource`] / [`StreamMonitor`] push and observe bytes on a
//!   ready/valid streaming bus, one transfer per qualifying clock edge.
//! - [`Clock`] and [`ResetDriver`] provide the clock and synchronous reset.
//!
//! Every agent owns its queue or capture buffer and its phase exclusively.
//! [`restart`](UartSource::restart) is the only way to abandon in-flight
//! work: it cancels the agent's task at its current suspension point.

#![warn(missing_docs)]

pub mod clock;
pub mod error;
mod queue;
pub mod serial;
pub mod stream;

pub use clock::{Clock, ResetDriver, ResetPolarity};
pub use error::{AgentError, FramingError};
pub use serial::{UartSink, UartSource, BITS_PER_FRAME};
pub use stream::{StreamBus, StreamMonitor, StreamSource};

/// Where an agent is within the unit of transfer it handles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum AgentPhase {
    /// Nothing in flight.
    #[default]
    Idle,
    /// A frame (or bus beat) has started and not yet finished.
    MidFrame,
    /// The last frame finished and the next has not started.
    FrameComplete,
}
