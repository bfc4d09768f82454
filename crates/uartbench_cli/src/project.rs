//! Locating and loading the suite configuration.

use std::path::PathBuf;

use uartbench_config::{
    load_config, load_config_from_str, load_config_or_default, BenchConfig, CONFIG_FILE,
};

use crate::GlobalArgs;

/// Loads the configuration named by `--config`, or the one in the current
/// directory.
///
/// An explicit `--config` must exist: a file is read as-is, a directory must
/// hold a `uartbench.toml`. Without `--config`, a missing file means the
/// built-in defaults.
pub fn load(global: &GlobalArgs) -> Result<BenchConfig, Box<dyn std::error::Error>> {
    match global.config {
        Some(ref path) => {
            let p = PathBuf::from(path);
            if p.is_file() {
                let content = std::fs::read_to_string(&p)?;
                Ok(load_config_from_str(&content)?)
            } else if p.is_dir() {
                Ok(load_config(&p)?)
            } else {
                Err(format!("config path '{path}' does not exist").into())
            }
        }
        None => {
            let dir = std::env::current_dir()?;
            tracing::debug!(dir = %dir.display(), file = CONFIG_FILE, "looking for configuration");
            Ok(load_config_or_default(&dir)?)
        }
    }
}
