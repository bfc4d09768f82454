//! Configuration types deserialized from `uartbench.toml`.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Default suite name.
pub const DEFAULT_SUITE_NAME: &str = "uart";
/// Default per-case simulated-time budget.
pub const DEFAULT_TIMEOUT: &str = "50ms";

/// The top-level suite configuration parsed from `uartbench.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct BenchConfig {
    /// Suite-wide settings.
    #[serde(default)]
    pub suite: SuiteConfig,
    /// Per-variant clock and baud settings, keyed by variant name.
    #[serde(default)]
    pub variants: BTreeMap<String, VariantConfig>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        let mut config = Self {
            suite: SuiteConfig::default(),
            variants: BTreeMap::new(),
        };
        config.fill_builtin_variants();
        config
    }
}

impl BenchConfig {
    /// Adds the built-in settings for every variant the file does not mention.
    pub fn fill_builtin_variants(&mut self) {
        for kind in VariantKind::ALL {
            self.variants
                .entry(kind.name().to_string())
                .or_insert_with(|| kind.builtin());
        }
    }
}

/// Suite-wide settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SuiteConfig {
    /// Name shown in the run summary.
    #[serde(default = "default_suite_name")]
    pub name: String,
    /// Seed for every case's random stream; drawn at random when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Simulated-time budget per case (e.g. `"50ms"`).
    #[serde(default = "default_timeout")]
    pub timeout: String,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            name: default_suite_name(),
            seed: None,
            timeout: default_timeout(),
        }
    }
}

fn default_suite_name() -> String {
    DEFAULT_SUITE_NAME.to_string()
}

fn default_timeout() -> String {
    DEFAULT_TIMEOUT.to_string()
}

/// Clock and baud settings of one device variant.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VariantConfig {
    /// Clock frequency as a string (e.g. `"10MHz"`), parsed to
    /// [`Frequency`](uartbench_common::Frequency).
    pub clock: String,
    /// Serial bit rate in bits per second.
    pub baud: u64,
}

/// The devices a suite can run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantKind {
    /// The bare UART core with streaming-bus ports.
    Uart,
    /// The board-level wrapper with only serial pins.
    Top,
}

impl VariantKind {
    /// Every variant, in listing order.
    pub const ALL: [VariantKind; 2] = [VariantKind::Uart, VariantKind::Top];

    /// The name used in configuration files and on the command line.
    pub fn name(self) -> &'static str {
        match self {
            VariantKind::Uart => "uart",
            VariantKind::Top => "top",
        }
    }

    /// Settings used when the configuration file does not mention the variant.
    pub fn builtin(self) -> VariantConfig {
        match self {
            VariantKind::Uart => VariantConfig {
                clock: "10MHz".to_string(),
                baud: 115_200,
            },
            VariantKind::Top => VariantConfig {
                clock: "27MHz".to_string(),
                baud: 250_000,
            },
        }
    }
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VariantKind {
    type Err = crate::error::ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VariantKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| crate::error::ConfigError::UnknownVariant(s.to_string()))
    }
}
