//! Shared plumbing for the `uiq-*` binaries: logging, input files, config.

use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use uiq_core::config::{self, Config, ConfigureOptions};
use uiq_core::Tree;

/// Log to stderr.  `verbose` forces `debug`; otherwise `RUST_LOG`, default `warn`.
pub fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

/// Read `path`, or stdin when it is `-`.
pub fn read_source(path: &str) -> io::Result<String> {
    if path == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        fs::read_to_string(path)
    }
}

pub fn load_tree(path: &str) -> Result<Arc<Tree>, String> {
    let json = read_source(path).map_err(|e| format!("{path}: {e}"))?;
    Tree::from_json(&json).map_err(|e| format!("{path}: {e}"))
}

/// Apply a JSON `ConfigureOptions` file (if any) and return the resulting config.
pub fn load_config(path: Option<&Path>) -> Result<Config, String> {
    if let Some(path) = path {
        let raw = fs::read_to_string(path).map_err(|e| format!("{}: {e}", path.display()))?;
        let options: ConfigureOptions =
            serde_json::from_str(&raw).map_err(|e| format!("{}: {e}", path.display()))?;
        config::configure(options);
    }
    Ok(config::get_config())
}

/// Pretty or compact JSON.
pub fn to_json<T: serde::Serialize>(value: &T, compact: bool) -> Result<String, String> {
    let out = if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    };
    out.map_err(|e| e.to_string())
}
