//! Simulation time with femtosecond precision.
//!
//! [`SimTime`] is used both as an absolute point on the simulated timeline and
//! as a duration. Every conversion from real-valued seconds rounds to the
//! nearest femtosecond, which is the kernel's time resolution.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub};
use std::str::FromStr;

/// Femtoseconds per picosecond.
pub const FS_PER_PS: u64 = 1_000;
/// Femtoseconds per nanosecond.
pub const FS_PER_NS: u64 = 1_000_000;
/// Femtoseconds per microsecond.
pub const FS_PER_US: u64 = 1_000_000_000;
/// Femtoseconds per millisecond.
pub const FS_PER_MS: u64 = 1_000_000_000_000;
/// Femtoseconds per second.
pub const FS_PER_S: u64 = 1_000_000_000_000_000;

/// A point in (or span of) simulated time, in femtoseconds.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SimTime {
    /// Simulated time in femtoseconds.
    pub fs: u64,
}

impl SimTime {
    /// Time zero.
    pub const ZERO: SimTime = SimTime { fs: 0 };

    /// Creates a time from a femtosecond value.
    pub const fn from_fs(fs: u64) -> Self {
        Self { fs }
    }

    /// Creates a time from a picosecond value.
    pub const fn from_ps(ps: u64) -> Self {
        Self { fs: ps * FS_PER_PS }
    }

    /// Creates a time from a nanosecond value.
    pub const fn from_ns(ns: u64) -> Self {
        Self { fs: ns * FS_PER_NS }
    }

    /// Creates a time from a microsecond value.
    pub const fn from_us(us: u64) -> Self {
        Self { fs: us * FS_PER_US }
    }

    /// Creates a time from a millisecond value.
    pub const fn from_ms(ms: u64) -> Self {
        Self { fs: ms * FS_PER_MS }
    }

    /// Creates a time from seconds, rounded to the nearest femtosecond.
    ///
    /// Negative and non-finite inputs clamp to zero.
    pub fn from_secs_f64(secs: f64) -> Self {
        if !secs.is_finite() || secs <= 0.0 {
            return Self::ZERO;
        }
        Self {
            fs: (secs * FS_PER_S as f64).round() as u64,
        }
    }

    /// Returns the time in seconds.
    pub fn as_secs_f64(&self) -> f64 {
        self.fs as f64 / FS_PER_S as f64
    }

    /// Converts to nanoseconds (truncated).
    pub fn to_ns(&self) -> u64 {
        self.fs / FS_PER_NS
    }

    /// Scales a duration by a real factor, rounding to the nearest femtosecond.
    pub fn mul_f64(&self, factor: f64) -> Self {
        Self::from_secs_f64(self.as_secs_f64() * factor)
    }

    /// Adds two times, returning `None` on overflow.
    pub fn checked_add(self, rhs: SimTime) -> Option<SimTime> {
        self.fs.checked_add(rhs.fs).map(SimTime::from_fs)
    }

    /// Adds two times, clamping at the end of the representable timeline.
    pub fn saturating_add(self, rhs: SimTime) -> SimTime {
        SimTime::from_fs(self.fs.saturating_add(rhs.fs))
    }

    /// Subtracts, clamping at zero.
    pub fn saturating_sub(self, rhs: SimTime) -> SimTime {
        SimTime::from_fs(self.fs.saturating_sub(rhs.fs))
    }
}

impl Add for SimTime {
    type Output = SimTime;

    fn add(self, rhs: SimTime) -> SimTime {
        SimTime::from_fs(self.fs + rhs.fs)
    }
}

impl AddAssign for SimTime {
    fn add_assign(&mut self, rhs: SimTime) {
        self.fs += rhs.fs;
    }
}

impl Sub for SimTime {
    type Output = SimTime;

    fn sub(self, rhs: SimTime) -> SimTime {
        SimTime::from_fs(self.fs - rhs.fs)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fs = self.fs;
        if fs == 0 {
            write!(f, "0 fs")
        } else if fs >= FS_PER_MS && fs.is_multiple_of(FS_PER_MS) {
            write!(f, "{} ms", fs / FS_PER_MS)
        } else if fs >= FS_PER_US && fs.is_multiple_of(FS_PER_US) {
            write!(f, "{} us", fs / FS_PER_US)
        } else if fs >= FS_PER_NS && fs.is_multiple_of(FS_PER_NS) {
            write!(f, "{} ns", fs / FS_PER_NS)
        } else if fs >= FS_PER_PS && fs.is_multiple_of(FS_PER_PS) {
            write!(f, "{} ps", fs / FS_PER_PS)
        } else if fs >= FS_PER_NS {
            write!(f, "{:.3} ns", fs as f64 / FS_PER_NS as f64)
        } else {
            write!(f, "{fs} fs")
        }
    }
}

/// Error returned when a duration string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseTimeError {
    /// The input was empty.
    #[error("empty duration string")]
    Empty,
    /// The input did not start with a number.
    #[error("invalid number in duration '{0}'")]
    InvalidNumber(String),
    /// No unit was given.
    #[error("missing unit in duration '{0}' (use fs, ps, ns, us, ms, or s)")]
    MissingUnit(String),
    /// The unit is not one of the supported suffixes.
    #[error("unknown duration unit '{0}' (use fs, ps, ns, us, ms, or s)")]
    UnknownUnit(String),
    /// The duration does not fit in 64 bits of femtoseconds (about 5 hours).
    #[error("duration '{0}' is out of range")]
    OutOfRange(String),
}

/// Parses durations such as `"100ns"`, `"50ms"` or `"1.5us"`.
impl FromStr for SimTime {
    type Err = ParseTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseTimeError::Empty);
        }

        let digit_end = s
            .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '_'))
            .unwrap_or(s.len());
        let number: f64 = s[..digit_end]
            .replace('_', "")
            .parse()
            .map_err(|_| ParseTimeError::InvalidNumber(s.to_string()))?;

        let multiplier = match s[digit_end..].trim() {
            "fs" => 1,
            "ps" => FS_PER_PS,
            "ns" => FS_PER_NS,
            "us" => FS_PER_US,
            "ms" => FS_PER_MS,
            "s" => FS_PER_S,
            "" => return Err(ParseTimeError::MissingUnit(s.to_string())),
            unit => return Err(ParseTimeError::UnknownUnit(unit.to_string())),
        };

        let fs = (number * multiplier as f64).round();
        // u64::MAX as f64 rounds up to 2^64; everything below it casts exactly.
        if fs >= u64::MAX as f64 {
            return Err(ParseTimeError::OutOfRange(s.to_string()));
        }
        Ok(SimTime::from_fs(fs as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors() {
        assert_eq!(SimTime::from_ns(10).fs, 10_000_000);
        assert_eq!(SimTime::from_ps(500).fs, 500_000);
        assert_eq!(SimTime::from_us(3).fs, 3 * FS_PER_US);
        assert_eq!(SimTime::from_ms(2).fs, 2 * FS_PER_MS);
    }

    #[test]
    fn from_secs_rounds_to_nearest_fs() {
        // one 250 kbaud frame: 10 / 250000 s = 40 us
        assert_eq!(SimTime::from_secs_f64(10.0 / 250_000.0), SimTime::from_us(40));
        assert_eq!(SimTime::from_secs_f64(1.0 / 27e6).fs, 37_037_037);
    }

    #[test]
    fn from_secs_clamps_negative() {
        assert_eq!(SimTime::from_secs_f64(-1.0), SimTime::ZERO);
        assert_eq!(SimTime::from_secs_f64(f64::NAN), SimTime::ZERO);
    }

    #[test]
    fn mul_f64_scales() {
        let frame = SimTime::from_us(40);
        assert_eq!(frame.mul_f64(0.5), SimTime::from_us(20));
        assert_eq!(frame.mul_f64(0.1), SimTime::from_us(4));
    }

    #[test]
    fn arithmetic() {
        let a = SimTime::from_ns(5);
        let b = SimTime::from_ns(3);
        assert_eq!(a + b, SimTime::from_ns(8));
        assert_eq!(a - b, SimTime::from_ns(2));
        assert_eq!(b.saturating_sub(a), SimTime::ZERO);
        assert_eq!(SimTime::from_fs(u64::MAX).checked_add(a), None);
        assert_eq!(
            SimTime::from_fs(u64::MAX).saturating_add(a),
            SimTime::from_fs(u64::MAX)
        );
    }

    #[test]
    fn ordering() {
        assert!(SimTime::from_ns(1) < SimTime::from_ns(2));
    }

    #[test]
    fn display_units() {
        assert_eq!(SimTime::ZERO.to_string(), "0 fs");
        assert_eq!(SimTime::from_ns(10).to_string(), "10 ns");
        assert_eq!(SimTime::from_ps(500).to_string(), "500 ps");
        assert_eq!(SimTime::from_us(5).to_string(), "5 us");
        assert_eq!(SimTime::from_ms(2).to_string(), "2 ms");
        assert_eq!(SimTime::from_fs(1500).to_string(), "1500 fs");
        assert_eq!(SimTime::from_fs(37_037_037).to_string(), "37.037 ns");
    }

    #[test]
    fn parse_units() {
        assert_eq!("100ns".parse::<SimTime>().unwrap(), SimTime::from_ns(100));
        assert_eq!("50ms".parse::<SimTime>().unwrap(), SimTime::from_ms(50));
        assert_eq!("1.5us".parse::<SimTime>().unwrap(), SimTime::from_ns(1500));
        assert_eq!("0fs".parse::<SimTime>().unwrap(), SimTime::ZERO);
        assert_eq!("2 s".parse::<SimTime>().unwrap().fs, 2 * FS_PER_S);
    }

    #[test]
    fn parse_errors() {
        assert_eq!("".parse::<SimTime>(), Err(ParseTimeError::Empty));
        assert!(matches!(
            "ns".parse::<SimTime>(),
            Err(ParseTimeError::InvalidNumber(_))
        ));
        assert!(matches!(
            "100".parse::<SimTime>(),
            Err(ParseTimeError::MissingUnit(_))
        ));
        assert!(matches!(
            "100min".parse::<SimTime>(),
            Err(ParseTimeError::UnknownUnit(_))
        ));
    }

    #[test]
    fn parse_rejects_times_past_the_timeline() {
        assert_eq!(
            "20000s".parse::<SimTime>(),
            Err(ParseTimeError::OutOfRange("20000s".to_string()))
        );
        assert!("18446744073709551616fs".parse::<SimTime>().is_err());
        // Just over five hours still fits.
        assert_eq!(
            "18000s".parse::<SimTime>().unwrap().fs,
            18_000 * FS_PER_S
        );
    }

    #[test]
    fn serde_roundtrip() {
        let t = SimTime::from_fs(12345);
        let json = serde_json::to_string(&t).unwrap();
        let back: SimTime = serde_json::from_str(&json).unwrap();
        assert_eq!(t, back);
    }
}
