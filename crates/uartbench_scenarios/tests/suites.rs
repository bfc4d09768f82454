//! End-to-end runs of the scenario catalogue against the device models.

use proptest::prelude::*;
use uartbench_config::{resolve_variant, BenchConfig, Overrides, VariantKind};
use uartbench_scenarios::{
    catalogue, run_case, run_suite, select_cases, Case, CaseKind, CaseOutcome, ResetPoint,
    RunSettings, TopCase, UartCase,
};
use uartbench_sim::SimTime;

fn settings(variant: VariantKind) -> RunSettings {
    let resolved =
        resolve_variant(&BenchConfig::default(), variant, &Overrides::default()).unwrap();
    RunSettings::from_resolved(&resolved, 12345)
}

fn run_named(variant: VariantKind, name: &str) -> CaseOutcome {
    let cases = select_cases(catalogue(variant), Some(name), None);
    assert_eq!(cases.len(), 1, "no case named {name}");
    run_case(&cases[0], &settings(variant)).outcome
}

#[test]
fn top_suite_passes() {
    let mut seen = Vec::new();
    let report = run_suite("uart", &settings(VariantKind::Top), None, None, |r| {
        seen.push(r.name.clone())
    });
    for case in &report.cases {
        assert_eq!(case.outcome, CaseOutcome::Passed, "{}", case.name);
    }
    assert_eq!(report.passed(), 5);
    assert!(report.is_success());
    assert_eq!(seen.len(), 5);
    assert_eq!(report.variant, "top");
    assert_eq!(report.seed, 12345);
}

#[test]
fn greeting_round_trips_both_directions() {
    assert_eq!(run_named(VariantKind::Uart, "basic_rx"), CaseOutcome::Passed);
    assert_eq!(run_named(VariantKind::Uart, "basic_tx"), CaseOutcome::Passed);
}

#[test]
fn reset_cases_pass_at_every_point() {
    let s = settings(VariantKind::Uart);
    for case in select_cases(catalogue(VariantKind::Uart), None, Some("reset_")) {
        let report = run_case(&case, &s);
        assert_eq!(report.outcome, CaseOutcome::Passed, "{}", case.name);
    }
}

#[test]
fn jittered_receive_loses_nothing() {
    assert_eq!(
        run_named(VariantKind::Uart, "random_delay_rx"),
        CaseOutcome::Passed
    );
}

#[test]
fn jittered_transmit_loses_nothing() {
    assert_eq!(
        run_named(VariantKind::Uart, "random_delay_tx"),
        CaseOutcome::Passed
    );
}

#[test]
fn short_budget_times_out() {
    let mut s = settings(VariantKind::Top);
    s.timeout = SimTime::from_us(20);
    let cases = select_cases(catalogue(VariantKind::Top), Some("basic_loopback"), None);
    let report = run_case(&cases[0], &s);
    match report.outcome {
        CaseOutcome::Failed(reason) => assert!(reason.contains("timed out"), "{reason}"),
        CaseOutcome::Passed => panic!("a 20 us budget cannot cover four frames"),
    }
}

#[test]
fn empty_selection_is_an_empty_success() {
    let report = run_suite(
        "uart",
        &settings(VariantKind::Uart),
        None,
        Some("no_such_case"),
        |_| {},
    );
    assert!(report.cases.is_empty());
    assert!(report.is_success());
}

fn reset_at(fraction: f64) -> ResetPoint {
    ResetPoint {
        label: "f",
        divisor: 1.0 / fraction,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn reset_anywhere_in_the_frame_recovers(fraction in 0.02f64..0.98) {
        let point = reset_at(fraction);
        let kinds = [
            CaseKind::Uart(UartCase::ResetRx(point)),
            CaseKind::Uart(UartCase::ResetTx(point)),
            CaseKind::Top(TopCase::ResetLoopback(point)),
        ];
        for kind in kinds {
            let case = Case {
                name: format!("{}@{fraction}", kind.name()),
                kind,
            };
            let report = run_case(&case, &settings(kind.variant()));
            prop_assert_eq!(&report.outcome, &CaseOutcome::Passed, "{}", case.name);
        }
    }

    #[test]
    fn jitter_with_any_seed_loses_nothing(seed in any::<u64>()) {
        for name in ["random_delay_rx", "random_delay_tx"] {
            let mut s = settings(VariantKind::Uart);
            s.seed = seed;
            let cases = select_cases(catalogue(VariantKind::Uart), Some(name), None);
            let report = run_case(&cases[0], &s);
            prop_assert_eq!(&report.outcome, &CaseOutcome::Passed, "{} seed {}", name, seed);
        }
    }
}
