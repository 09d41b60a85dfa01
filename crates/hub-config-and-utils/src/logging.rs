//! Logging initialization for hub binaries.

use crate::{CoreResult, Paths};

pub use observability::{parse_level, LogConfig};

/// Install tracing for `service_name`.
///
/// Structured JSONL goes to `~/.agent-hub/logs/hub.jsonl`. With `verbose`,
/// compact logs are mirrored to stderr as well. `RUST_LOG` overrides `level`.
pub fn init_logging(service_name: &str, level: &str, paths: &Paths, verbose: bool) -> CoreResult<()> {
    paths.ensure_dirs()?;
    observability::init_with_config(LogConfig {
        service_name: service_name.into(),
        default_level: level.into(),
        log_path: Some(paths.log_file()),
        also_stderr: verbose,
    })?;
    Ok(())
}
