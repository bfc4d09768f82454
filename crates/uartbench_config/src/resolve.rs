//! Variant resolution: merging file settings with command-line overrides.

use crate::error::ConfigError;
use crate::types::{BenchConfig, VariantKind};
use uartbench_common::Frequency;
use uartbench_sim::SimTime;

/// Values given on the command line, each replacing its file counterpart.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// Clock frequency.
    pub clock: Option<Frequency>,
    /// Baud rate.
    pub baud: Option<u64>,
    /// Random seed.
    pub seed: Option<u64>,
    /// Per-case simulated-time budget.
    pub timeout: Option<SimTime>,
}

/// Everything a run needs for one variant, parsed and merged.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedVariant {
    /// Suite name from the configuration.
    pub suite: String,
    /// The device variant.
    pub kind: VariantKind,
    /// Device clock.
    pub clock: Frequency,
    /// Serial bit rate.
    pub baud: u64,
    /// Seed, if one was configured; callers draw one otherwise.
    pub seed: Option<u64>,
    /// Simulated-time budget per case.
    pub timeout: SimTime,
}

/// Resolves variant `kind`, applying `overrides` on top of the file settings.
pub fn resolve_variant(
    config: &BenchConfig,
    kind: VariantKind,
    overrides: &Overrides,
) -> Result<ResolvedVariant, ConfigError> {
    let variant = config
        .variants
        .get(kind.name())
        .ok_or_else(|| ConfigError::UnknownVariant(kind.name().to_string()))?;

    let clock = match overrides.clock {
        Some(clock) => clock,
        None => variant.clock.parse().map_err(|e| {
            ConfigError::ValidationError(format!("variants.{kind}.clock: {e}"))
        })?,
    };
    if !clock.is_valid() {
        return Err(ConfigError::ValidationError(format!(
            "clock frequency {clock} must be positive"
        )));
    }

    let baud = overrides.baud.unwrap_or(variant.baud);
    if baud == 0 {
        return Err(ConfigError::ValidationError(
            "baud rate must be positive".to_string(),
        ));
    }

    let timeout = match overrides.timeout {
        Some(timeout) => timeout,
        None => config
            .suite
            .timeout
            .parse()
            .map_err(|e| ConfigError::ValidationError(format!("suite.timeout: {e}")))?,
    };

    Ok(ResolvedVariant {
        suite: config.suite.name.clone(),
        kind,
        clock,
        baud,
        seed: overrides.seed.or(config.suite.seed),
        timeout,
    })
}
