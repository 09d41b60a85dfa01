//! Configuration, file system layout, and logging setup for the agent hub.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    Config, DEFAULT_DISCOVERY_URL, DEFAULT_LOG_LEVEL, DEFAULT_REQUEST_TIMEOUT_SECS,
    ENV_DISCOVERY_URL, ENV_LOG_LEVEL, ENV_REQUEST_TIMEOUT_SECS,
};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, parse_level, LogConfig};
pub use paths::Paths;
