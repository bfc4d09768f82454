//! `uartbench list`: show the cases each variant runs.

use uartbench_config::resolve_variant;
use uartbench_config::Overrides;
use uartbench_scenarios::catalogue;

use crate::{project, GlobalArgs, ListArgs, VariantArg};

/// Runs the `uartbench list` command. Case names go to stdout, one per line.
pub fn run(args: &ListArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let config = project::load(global)?;
    for kind in VariantArg::kinds(args.variant) {
        let resolved = resolve_variant(&config, kind, &Overrides::default())?;
        if !global.quiet {
            eprintln!(
                "   {} [{}] at {} / {} baud",
                resolved.suite, kind, resolved.clock, resolved.baud
            );
        }
        for case in catalogue(kind) {
            println!("{}", case.name);
        }
    }
    Ok(0)
}
