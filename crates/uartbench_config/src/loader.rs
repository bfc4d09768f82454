//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::{BenchConfig, VariantKind};
use std::path::Path;
use uartbench_common::Frequency;
use uartbench_sim::SimTime;

/// File name looked up in the suite directory.
pub const CONFIG_FILE: &str = "uartbench.toml";

/// Loads and validates a `uartbench.toml` configuration from a directory.
///
/// Reads `<dir>/uartbench.toml`, parses it, and validates every value.
pub fn load_config(dir: &Path) -> Result<BenchConfig, ConfigError> {
    let content = std::fs::read_to_string(dir.join(CONFIG_FILE))?;
    load_config_from_str(&content)
}

/// Like [`load_config`], but falls back to the built-in defaults when the
/// directory has no `uartbench.toml`.
pub fn load_config_or_default(dir: &Path) -> Result<BenchConfig, ConfigError> {
    match std::fs::read_to_string(dir.join(CONFIG_FILE)) {
        Ok(content) => load_config_from_str(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BenchConfig::default()),
        Err(e) => Err(e.into()),
    }
}

/// Parses and validates a `uartbench.toml` configuration from a string.
///
/// Variants the file does not mention get their built-in settings.
pub fn load_config_from_str(content: &str) -> Result<BenchConfig, ConfigError> {
    let mut config: BenchConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    config.fill_builtin_variants();
    validate_config(&config)?;
    Ok(config)
}

/// Validates that required fields are present and every value parses.
fn validate_config(config: &BenchConfig) -> Result<(), ConfigError> {
    if config.suite.name.is_empty() {
        return Err(ConfigError::MissingField("suite.name".to_string()));
    }
    let timeout: SimTime = config
        .suite
        .timeout
        .parse()
        .map_err(|e| ConfigError::ValidationError(format!("suite.timeout: {e}")))?;
    if timeout == SimTime::ZERO {
        return Err(ConfigError::ValidationError(
            "suite.timeout must be positive".to_string(),
        ));
    }
    for (name, variant) in &config.variants {
        name.parse::<VariantKind>()?;
        variant.clock.parse::<Frequency>().map_err(|e| {
            ConfigError::ValidationError(format!("variants.{name}.clock: {e}"))
        })?;
        if variant.baud == 0 {
            return Err(ConfigError::ValidationError(format!(
                "variants.{name}.baud must be positive"
            )));
        }
    }
    Ok(())
}
