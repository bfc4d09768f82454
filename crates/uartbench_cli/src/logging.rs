//! Diagnostic log output.

use tracing_subscriber::EnvFilter;

use crate::GlobalArgs;

/// Level used when `RUST_LOG` is unset.
fn default_level(global: &GlobalArgs) -> &'static str {
    if global.quiet {
        "error"
    } else if global.verbose {
        "debug"
    } else {
        "warn"
    }
}

/// Installs the log subscriber, writing to stderr. `RUST_LOG` wins over
/// `--quiet`/`--verbose`.
pub fn init(global: &GlobalArgs) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level(global)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn global(quiet: bool, verbose: bool) -> GlobalArgs {
        GlobalArgs {
            quiet,
            verbose,
            config: None,
        }
    }

    #[test]
    fn levels_follow_flags() {
        assert_eq!(default_level(&global(false, false)), "warn");
        assert_eq!(default_level(&global(false, true)), "debug");
        assert_eq!(default_level(&global(true, true)), "error");
    }
}
