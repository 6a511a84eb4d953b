//! Service host for the tournament director.
//!
//! Runs the tournament, player, table and timer services in one process
//! over shared infrastructure and exposes them over HTTP.

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod services;

pub use config::{CliOverrides, ConfigError, ServerConfig};
pub use services::Services;
