//! `uartbench run`: run the scenario cases of one or every variant.
//!
//! Loads the configuration, applies command-line overrides, then runs each
//! selected case on a fresh simulator. Reports per-case status and a summary
//! line; with `--format json` the full reports go to stdout as well.

use uartbench_common::Frequency;
use uartbench_config::{resolve_variant, Overrides};
use uartbench_scenarios::{run_suite, CaseOutcome, CaseReport, RunSettings, SuiteReport};
use uartbench_sim::SimTime;

use crate::{project, GlobalArgs, ReportFormat, RunArgs, VariantArg};

/// Runs the `uartbench run` command.
///
/// Returns exit code 0 if every case passes, 1 if any fails.
pub fn run(args: &RunArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let config = project::load(global)?;
    let overrides = overrides(args)?;

    // One seed for the whole invocation so a failing run can be replayed.
    let drawn_seed = rand::random::<u64>();

    let mut reports = Vec::new();
    for kind in VariantArg::kinds(args.variant) {
        let resolved = resolve_variant(&config, kind, &overrides)?;
        let settings = RunSettings::from_resolved(&resolved, drawn_seed);
        if resolved.seed.is_none() {
            tracing::info!(seed = settings.seed, "no seed configured, drew one");
        }

        if !global.quiet {
            eprintln!(
                "   Running {} [{}] at {} / {} baud (seed {})",
                resolved.suite, kind, settings.clock, settings.baud, settings.seed
            );
        }

        let report = run_suite(
            &resolved.suite,
            &settings,
            args.name.as_deref(),
            args.filter.as_deref(),
            |case| {
                if !global.quiet {
                    print_case_report(case);
                }
            },
        );
        reports.push(report);
    }

    let total: usize = reports.iter().map(|r| r.cases.len()).sum();
    if total == 0 {
        if !global.quiet {
            eprintln!("warning: no cases match the given filter");
        }
        return Ok(0);
    }

    let passed: usize = reports.iter().map(SuiteReport::passed).sum();
    let failed = total - passed;

    if !global.quiet {
        eprintln!();
        eprintln!("   Result: {passed} passed, {failed} failed out of {total} case(s)");
    }

    if args.format == ReportFormat::Json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    }

    if failed > 0 {
        Ok(1)
    } else {
        Ok(0)
    }
}

/// Parses the command-line overrides.
fn overrides(args: &RunArgs) -> Result<Overrides, Box<dyn std::error::Error>> {
    let clock = match args.clock {
        Some(ref s) => Some(
            s.parse::<Frequency>()
                .map_err(|e| format!("invalid --clock '{s}': {e}"))?,
        ),
        None => None,
    };
    let timeout = match args.timeout {
        Some(ref s) => Some(
            s.parse::<SimTime>()
                .map_err(|e| format!("invalid --timeout '{s}': {e}"))?,
        ),
        None => None,
    };
    Ok(Overrides {
        clock,
        baud: args.baud,
        seed: args.seed,
        timeout,
    })
}

/// Prints a single case result.
fn print_case_report(report: &CaseReport) {
    match report.outcome {
        CaseOutcome::Passed => eprintln!("   PASS  {} ({})", report.name, report.sim_time),
        CaseOutcome::Failed(ref reason) => eprintln!("   FAIL  {}: {reason}", report.name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn run_args(argv: &[&str]) -> RunArgs {
        let mut full = vec!["uartbench", "run"];
        full.extend_from_slice(argv);
        match crate::Cli::parse_from(full).command {
            crate::Command::Run(args) => args,
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn overrides_parse_units() {
        let o = overrides(&run_args(&[
            "--variant", "uart", "--clock", "50MHz", "--timeout", "2ms", "--seed", "5",
        ]))
        .unwrap();
        assert_eq!(o.clock.map(|c| c.hz()), Some(50_000_000.0));
        assert_eq!(o.timeout, Some(SimTime::from_ms(2)));
        assert_eq!(o.seed, Some(5));
        assert!(o.baud.is_none());
    }

    #[test]
    fn bad_clock_is_reported() {
        let err = overrides(&run_args(&["--variant", "uart", "--clock", "fast"])).unwrap_err();
        assert!(err.to_string().starts_with("invalid --clock 'fast'"));
    }

    #[test]
    fn bad_timeout_is_reported() {
        let err = overrides(&run_args(&["--timeout", "soon"])).unwrap_err();
        assert!(err.to_string().starts_with("invalid --timeout 'soon'"));
        let err = overrides(&run_args(&["--timeout", "20000s"])).unwrap_err();
        assert!(err.to_string().contains("out of range"), "{err}");
    }

    #[test]
    fn no_overrides_by_default() {
        let o = overrides(&run_args(&[])).unwrap();
        assert!(o.clock.is_none() && o.baud.is_none() && o.seed.is_none() && o.timeout.is_none());
    }

    #[test]
    fn single_top_case_passes() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("uartbench.toml"), "[suite]\nseed = 1\n").unwrap();
        let global = GlobalArgs {
            quiet: true,
            verbose: false,
            config: Some(tmp.path().to_str().unwrap().to_string()),
        };
        let args = run_args(&["basic_loopback", "--variant", "top"]);
        assert_eq!(run(&args, &global).unwrap(), 0);
    }

    #[test]
    fn unmatched_filter_is_not_a_failure() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("uartbench.toml"), "").unwrap();
        let global = GlobalArgs {
            quiet: true,
            verbose: false,
            config: Some(tmp.path().to_str().unwrap().to_string()),
        };
        let args = run_args(&["--filter", "no_such_case"]);
        assert_eq!(run(&args, &global).unwrap(), 0);
    }
}
