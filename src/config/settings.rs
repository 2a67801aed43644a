//! TOML-based configuration for sqlreport.
//!
//! Supports a config file (sqlreport.toml) with environment variable
//! expansion in database locations.
//!
//! Example configuration:
//! ```toml
//! [connections.shop]
//! driver = "sqlite"
//! database = "${SHOP_DATA}/shop.db"
//! table_prefix = "shop_"
//!
//! [reports.customers]
//! description = "Customer list per region"
//! connection = "shop"
//! sql = "customers.sql"
//! template = "customers.tpl"
//! output = "out/customers-${?region}.txt"
//! defines = "region:=north"
//! locale = "de_DE"
//! timestamp = false
//! append = false
//! utf8 = true
//! xml = false
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the config file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "sqlreport.toml";

/// Environment variable naming a config file.
pub const CONFIG_ENV_VAR: &str = "SQLREPORT_CONFIG";

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Connection not found: {0}")]
    ConnectionNotFound(String),

    #[error("Report not found: {0}")]
    ReportNotFound(String),

    #[error("Unsupported driver: {0}")]
    UnsupportedDriver(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Named database connections.
    pub connections: HashMap<String, ConnectionSettings>,

    /// Named report definitions.
    pub reports: BTreeMap<String, ReportDefinition>,

    /// File the settings were read from, if any.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// Connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConnectionSettings {
    /// Database driver (sqlite).
    pub driver: String,

    /// Database file, or `:memory:` (supports ${ENV_VAR} expansion).
    pub database: String,

    /// Prefix for table names, bound as `${_tableprefix}`.
    #[serde(default)]
    pub table_prefix: String,

    /// Open the database read-only.
    #[serde(default)]
    pub read_only: bool,

    /// Statements executed right after connecting.
    #[serde(default)]
    pub init_sql: Option<String>,
}

/// One report: its definition files and output policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReportDefinition {
    pub description: String,

    /// Name of the connection in `[connections]`.
    pub connection: String,

    /// Query definition file, relative to the base path. Optional.
    pub sql: Option<String>,

    /// Template definition file, relative to the base path.
    pub template: String,

    /// Output file name; placeholders are expanded.
    pub output: String,

    /// Input values seeded before the command line input
    /// (`name:=value|name2:=value2`).
    pub defines: String,

    /// Locale for `__DATE` and `__TIME`.
    pub locale: String,

    /// The output is a list of `!!report!!args` lines to run afterwards.
    pub batch: bool,

    /// Decorate the output file name with date and time.
    pub timestamp: bool,

    /// Append to the output file instead of replacing it.
    pub append: bool,

    /// Write UTF-8; otherwise ISO-8859-1.
    pub utf8: bool,

    /// Escape column values for XML output.
    pub xml: bool,

    /// Prepare every query once per run.
    pub prepare: bool,

    /// Output file written by the last run.
    #[serde(skip)]
    pub last_output_file: Option<PathBuf>,
}

impl Default for ReportDefinition {
    fn default() -> Self {
        Self {
            description: String::new(),
            connection: "default".to_string(),
            sql: None,
            template: String::new(),
            output: String::new(),
            defines: String::new(),
            locale: "de_DE".to_string(),
            batch: false,
            timestamp: false,
            append: false,
            utf8: true,
            xml: false,
            prepare: false,
            last_output_file: None,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let mut settings: Settings = toml::from_str(&content)?;
        settings.source = Some(path.to_path_buf());
        log::debug!("loaded settings from '{}'", path.display());
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. `./sqlreport.toml`
    /// 2. Environment variable `SQLREPORT_CONFIG`
    /// 3. `~/.config/sqlreport/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        let local_config = PathBuf::from(CONFIG_FILE_NAME);
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Ok(path) = env::var(CONFIG_ENV_VAR) {
            return Self::from_file(&path);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("sqlreport").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        // Return defaults if no config file found
        Ok(Settings::default())
    }

    /// Get a connection by name.
    pub fn get_connection(&self, name: &str) -> Result<&ConnectionSettings, SettingsError> {
        self.connections
            .get(name)
            .ok_or_else(|| SettingsError::ConnectionNotFound(name.to_string()))
    }

    /// Get a report by name.
    pub fn get_report(&self, name: &str) -> Result<&ReportDefinition, SettingsError> {
        self.reports
            .get(name)
            .ok_or_else(|| SettingsError::ReportNotFound(name.to_string()))
    }

    /// Directory relative definition files are resolved against when no
    /// base path is given: the directory of the config file.
    pub fn base_path(&self) -> PathBuf {
        self.source
            .as_deref()
            .and_then(Path::parent)
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let mut var_name = String::new();
        if chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            for ch in chars.by_ref() {
                if ch == '}' {
                    break;
                }
                var_name.push(ch);
            }
        } else {
            // $VAR ends at non-alphanumeric/underscore
            while let Some(&ch) = chars.peek() {
                if !(ch.is_alphanumeric() || ch == '_') {
                    break;
                }
                var_name.push(ch);
                chars.next();
            }
            if var_name.is_empty() {
                // Just a lone $, keep it
                result.push('$');
                continue;
            }
        }

        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
