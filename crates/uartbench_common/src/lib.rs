//! Shared foundational types used across the uartbench workspace.
//!
//! This crate provides frequency values with unit parsing and a display
//! wrapper that renders byte strings the way test reports print them.

#![warn(missing_docs)]

pub mod bytes;
pub mod frequency;

pub use bytes::ByteStr;
pub use frequency::{Frequency, ParseFrequencyError};
