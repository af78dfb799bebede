//! Logging initialisation for Stampede
//!
//! Every crate in the workspace logs through `tracing`; binaries call one of
//! the functions here once at startup to install a subscriber.

pub mod init;

pub use init::{build_env_filter, init_logging, init_simple_tracing};
pub use stampede_config::{LogFormat, LogLevel, LoggingConfig};
