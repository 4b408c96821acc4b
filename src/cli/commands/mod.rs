//! Subcommand implementations.

pub mod answer;
pub mod approve;
pub mod attempts;
pub mod build;
pub mod daemon;
pub mod init;
pub mod log;
pub mod resume;
pub mod run;
pub mod signal;
pub mod status;
pub mod stop;
pub mod tree;
pub mod validate;
