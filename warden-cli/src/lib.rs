//! Library side of the `warden` operator binary: configuration loading and
//! the subcommand flows.

pub mod commands;
pub mod config;

pub use config::Config;
