//! Suite runner: case selection, one fresh simulation per case, reports.

use rand::rngs::StdRng;
use rand::SeedableRng;
use uartbench_common::Frequency;
use uartbench_config::{ResolvedVariant, VariantKind};
use uartbench_models::{TopWrapper, UartCore, TOP_BAUD, TOP_CLOCK_HZ};
use uartbench_sim::{Device, SimTime, Simulator};

use crate::cases::{catalogue, run_top_case, run_uart_case, Case, CaseKind};
use crate::env::{TopEnv, UartEnv};
use crate::error::ScenarioError;
use crate::report::{CaseOutcome, CaseReport, SuiteReport};

/// The kernel abandons a case after this many per-wait timeouts of
/// simulated time in total.
pub const TIME_LIMIT_FACTOR: u64 = 20;

/// Everything one case run needs.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    /// Device variant.
    pub variant: VariantKind,
    /// Device clock.
    pub clock: Frequency,
    /// Serial bit rate.
    pub baud: u64,
    /// Seed of each case's random stream.
    pub seed: u64,
    /// Bound on each wait for the device.
    pub timeout: SimTime,
}

impl RunSettings {
    /// Settings for `resolved`, with `seed` standing in when the
    /// configuration has none.
    pub fn from_resolved(resolved: &ResolvedVariant, seed: u64) -> Self {
        Self {
            variant: resolved.kind,
            clock: resolved.clock,
            baud: resolved.baud,
            seed: resolved.seed.unwrap_or(seed),
            timeout: resolved.timeout,
        }
    }

    /// Absolute simulated time past which a case is abandoned.
    pub fn time_limit(&self) -> SimTime {
        SimTime::from_fs(self.timeout.fs.saturating_mul(TIME_LIMIT_FACTOR))
    }
}

/// Filters cases by exact name or by substring.
///
/// If `name` is given, only the case with that exact name is kept. If
/// `filter` is given, only cases whose name contains it are kept. If both
/// are `None`, every case is kept.
pub fn select_cases(cases: Vec<Case>, name: Option<&str>, filter: Option<&str>) -> Vec<Case> {
    cases
        .into_iter()
        .filter(|case| {
            if let Some(n) = name {
                return case.name == n;
            }
            if let Some(f) = filter {
                return case.name.contains(f);
            }
            true
        })
        .collect()
}

/// Builds the device a variant runs against.
pub fn build_device(settings: &RunSettings) -> Result<Box<dyn Device>, ScenarioError> {
    match settings.variant {
        VariantKind::Uart => {
            let clock_hz = settings.clock.hz().round() as u64;
            Ok(Box::new(UartCore::new(clock_hz, settings.baud)?))
        }
        VariantKind::Top => {
            if settings.clock != Frequency::from_hz(TOP_CLOCK_HZ) || settings.baud != TOP_BAUD {
                tracing::warn!(
                    clock = %settings.clock,
                    baud = settings.baud,
                    "the wrapper is fixed at {TOP_CLOCK_HZ} Hz / {TOP_BAUD} baud; agents follow the device"
                );
            }
            Ok(Box::new(TopWrapper::new()?))
        }
    }
}

/// Runs one case on a fresh simulator.
///
/// Never fails: every error, including kernel errors, becomes a failed
/// report.
pub fn run_case(case: &Case, settings: &RunSettings) -> CaseReport {
    let span = tracing::info_span!("case", name = %case.name);
    let _enter = span.enter();

    let mut sim_time = SimTime::ZERO;
    let outcome = match simulate(case, settings, &mut sim_time) {
        Ok(()) => CaseOutcome::Passed,
        Err(err) => {
            tracing::debug!(%err, "case failed");
            CaseOutcome::Failed(err.to_string())
        }
    };
    CaseReport {
        name: case.name.clone(),
        outcome,
        sim_time,
    }
}

fn simulate(
    case: &Case,
    settings: &RunSettings,
    sim_time: &mut SimTime,
) -> Result<(), ScenarioError> {
    let mut sim = Simulator::with_device(build_device(settings)?)?;
    sim.set_time_limit(settings.time_limit());
    let h = sim.handle();
    let clock = sim.handle();
    let timeout = settings.timeout;
    let mut rng = StdRng::seed_from_u64(settings.seed);
    let kind = case.kind;

    let result = sim.run(async move {
        match kind {
            CaseKind::Uart(case) => {
                let mut env = UartEnv::new(&h, timeout)?;
                run_uart_case(case, &mut env, &mut rng).await
            }
            CaseKind::Top(case) => {
                let mut env = TopEnv::new(&h, timeout)?;
                run_top_case(case, &mut env).await
            }
        }
    });
    *sim_time = clock.now();
    result?.output
}

/// Runs every case of `settings.variant` selected by `name` and `filter`.
///
/// `on_case` is called with each report as soon as its case finishes.
pub fn run_suite(
    suite: &str,
    settings: &RunSettings,
    name: Option<&str>,
    filter: Option<&str>,
    mut on_case: impl FnMut(&CaseReport),
) -> SuiteReport {
    let cases = select_cases(catalogue(settings.variant), name, filter);
    tracing::info!(
        suite,
        variant = %settings.variant,
        seed = settings.seed,
        cases = cases.len(),
        "running suite"
    );

    let mut reports = Vec::with_capacity(cases.len());
    for case in &cases {
        let report = run_case(case, settings);
        on_case(&report);
        reports.push(report);
    }
    SuiteReport {
        suite: suite.to_string(),
        variant: settings.variant.to_string(),
        seed: settings.seed,
        cases: reports,
    }
}
