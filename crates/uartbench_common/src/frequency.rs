//! Frequency values with unit parsing and display.
//!
//! Clock frequencies and baud rates both end up here: a clock is configured
//! as `"27MHz"`, a baud rate as a bare number of bits per second, and both are
//! converted to a period on the simulator's femtosecond grid.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Femtoseconds in one second.
const FS_PER_SECOND: f64 = 1e15;

/// A frequency value stored in Hertz.
///
/// Parses strings like `"50MHz"`, `"250KHz"`, `"1GHz"`, `"115200Hz"` and bare
/// numbers (interpreted as Hz). Displays with the largest unit that keeps the
/// value readable.
#[derive(Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Frequency(f64);

impl Frequency {
    /// Creates a new frequency from a value in Hertz.
    pub fn new(hz: f64) -> Self {
        Self(hz)
    }

    /// Creates a frequency from an integer Hertz value, e.g. a baud rate.
    pub fn from_hz(hz: u64) -> Self {
        Self(hz as f64)
    }

    /// Returns the frequency in Hertz.
    pub fn hz(&self) -> f64 {
        self.0
    }

    /// Returns the frequency in megahertz.
    pub fn mhz(&self) -> f64 {
        self.0 / 1_000_000.0
    }

    /// Returns the period in seconds.
    pub fn period_secs(&self) -> f64 {
        1.0 / self.0
    }

    /// Returns the period rounded to the nearest femtosecond.
    pub fn period_fs(&self) -> u64 {
        (FS_PER_SECOND / self.0).round() as u64
    }

    /// Returns `n` periods measured from zero, rounded once at the end.
    ///
    /// Rounding the product rather than summing rounded periods keeps the
    /// `n`-th edge within half a femtosecond of its ideal position.
    pub fn periods_fs(&self, n: f64) -> u64 {
        (n * FS_PER_SECOND / self.0).round() as u64
    }

    /// Whether the value is a finite, strictly positive frequency.
    pub fn is_valid(&self) -> bool {
        self.0.is_finite() && self.0 > 0.0
    }
}

impl fmt::Debug for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frequency({self})")
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hz = self.0;
        if hz >= 1_000_000_000.0 {
            write!(f, "{}GHz", hz / 1_000_000_000.0)
        } else if hz >= 1_000_000.0 {
            write!(f, "{}MHz", hz / 1_000_000.0)
        } else if hz >= 1_000.0 {
            write!(f, "{}KHz", hz / 1_000.0)
        } else {
            write!(f, "{hz}Hz")
        }
    }
}

/// Error type for parsing frequency strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid frequency: '{input}'")]
pub struct ParseFrequencyError {
    /// The input string that failed to parse.
    pub input: String,
}

impl FromStr for Frequency {
    type Err = ParseFrequencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let err = || ParseFrequencyError {
            input: s.to_string(),
        };

        let lower = s.to_ascii_lowercase();
        let (num, scale) = if let Some(num) = lower.strip_suffix("ghz") {
            (num, 1_000_000_000.0)
        } else if let Some(num) = lower.strip_suffix("mhz") {
            (num, 1_000_000.0)
        } else if let Some(num) = lower.strip_suffix("khz") {
            (num, 1_000.0)
        } else if let Some(num) = lower.strip_suffix("hz") {
            (num, 1.0)
        } else {
            (lower.as_str(), 1.0)
        };

        let val: f64 = num.trim().replace('_', "").parse().map_err(|_| err())?;
        let freq = Frequency(val * scale);
        if !freq.is_valid() {
            return Err(err());
        }
        Ok(freq)
    }
}
