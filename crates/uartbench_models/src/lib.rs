//! Behavioral stand-ins for the UART devices under test.
//!
//! [`UartCore`] exposes the bare core's pins and `CLK_FREQ`/`BAUD_RATE`
//! parameters; [`TopWrapper`] exposes the board-level wrapper's four pins.
//! Both implement [`uartbench_sim::Device`] and share one cycle-level
//! receiver/transmitter in [`engine`].

#![warn(missing_docs)]

pub mod engine;
pub mod error;
pub mod top;
pub mod uart_core;

pub use engine::{BitTiming, UartEngine};
pub use error::ModelError;
pub use top::{TopWrapper, NAK, TOP_BAUD, TOP_CLOCK_HZ};
pub use uart_core::UartCore;
