//! Case and suite reports.

use serde::Serialize;
use uartbench_common::ByteStr;
use uartbench_sim::SimTime;

/// Expected and received byte sequences that differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error(
    "expected {} but received {} (first difference at index {first_difference})",
    ByteStr(.expected.as_slice()),
    ByteStr(.received.as_slice())
)]
pub struct Mismatch {
    /// What the case required.
    pub expected: Vec<u8>,
    /// What the agents captured.
    pub received: Vec<u8>,
    /// Index of the first differing byte, or the shorter length when one
    /// sequence is a prefix of the other.
    pub first_difference: usize,
}

impl Mismatch {
    /// Compares two sequences, returning the mismatch if they differ.
    pub fn check(expected: &[u8], received: &[u8]) -> Result<(), Mismatch> {
        if expected == received {
            return Ok(());
        }
        let first_difference = expected
            .iter()
            .zip(received)
            .position(|(e, r)| e != r)
            .unwrap_or_else(|| expected.len().min(received.len()));
        Err(Mismatch {
            expected: expected.to_vec(),
            received: received.to_vec(),
            first_difference,
        })
    }
}

/// How a case ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum CaseOutcome {
    /// Every check held.
    Passed,
    /// The case failed; the reason is the rendered error.
    Failed(String),
}

/// The result of one case.
#[derive(Debug, Clone, Serialize)]
pub struct CaseReport {
    /// Case name, e.g. `reset_rx[1/3]`.
    pub name: String,
    /// Pass or fail with reason.
    pub outcome: CaseOutcome,
    /// Simulated time when the case ended.
    pub sim_time: SimTime,
}

impl CaseReport {
    /// Whether the case passed.
    pub fn passed(&self) -> bool {
        self.outcome == CaseOutcome::Passed
    }
}

/// The results of a whole suite run.
#[derive(Debug, Clone, Serialize)]
pub struct SuiteReport {
    /// Suite name from the configuration.
    pub suite: String,
    /// Variant the cases ran against.
    pub variant: String,
    /// Seed every case's random stream started from.
    pub seed: u64,
    /// One report per case, in run order.
    pub cases: Vec<CaseReport>,
}

impl SuiteReport {
    /// Number of cases that passed.
    pub fn passed(&self) -> usize {
        self.cases.iter().filter(|c| c.passed()).count()
    }

    /// Number of cases that failed.
    pub fn failed(&self) -> usize {
        self.cases.len() - self.passed()
    }

    /// Whether every case passed.
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}
