//! Parsing and validation of `uartbench.toml` suite configuration.
//!
//! This crate reads the suite configuration file and produces a strongly-typed
//! [`BenchConfig`], then resolves one device variant, with command-line
//! overrides applied, into the concrete [`ResolvedVariant`] a run needs.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod resolve;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, load_config_or_default, CONFIG_FILE};
pub use resolve::{resolve_variant, Overrides, ResolvedVariant};
pub use types::*;
