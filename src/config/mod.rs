//! Configuration module for sqlreport.
//!
//! Handles named connections, report definitions and environment variables.

mod connection;
mod settings;

pub use connection::Driver;
pub use settings::{
    expand_env_vars, ConnectionSettings, ReportDefinition, Settings, SettingsError,
    CONFIG_ENV_VAR, CONFIG_FILE_NAME,
};
