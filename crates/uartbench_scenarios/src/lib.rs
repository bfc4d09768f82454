//! UART verification scenarios and the suite runner.
//!
//! A scenario ("case") wires agents to a device model through an
//! environment ([`UartEnv`] for the bare core, [`TopEnv`] for the
//! board-level wrapper), drives bytes in, and compares what comes out.
//! [`run_suite`] runs the selected cases of one variant, each on its own
//! simulator with its own seeded random stream, and collects a
//! [`SuiteReport`].

#![warn(missing_docs)]

pub mod cases;
pub mod env;
pub mod error;
pub mod report;
pub mod runner;

pub use cases::{catalogue, Case, CaseKind, ResetPoint, TopCase, UartCase, RESET_POINTS};
pub use env::{within, DeviceTiming, TopEnv, UartEnv};
pub use error::ScenarioError;
pub use report::{CaseOutcome, CaseReport, Mismatch, SuiteReport};
pub use runner::{build_device, run_case, run_suite, select_cases, RunSettings, TIME_LIMIT_FACTOR};
