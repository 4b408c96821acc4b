//! Infrastructure layer: filesystem persistence, process coordination,
//! configuration loading, and agent backends.

pub mod agents;
pub mod config;
pub mod daemon;
pub mod logging;
pub mod project;

pub use config::{ConfigError, ConfigLoader};
pub use daemon::{check_daemon_health, send_signal, Daemon, DaemonHealth};
pub use project::ProjectStore;
