//! Database drivers and connectors built from connection settings.
//!
//! Example:
//! ```toml
//! [connections.shop]
//! driver = "sqlite"
//! database = "${SHOP_DATA}/shop.db"
//! table_prefix = "shop_"
//! read_only = true
//! ```

use crate::db::{Connector, SqliteConnector};

use super::settings::{expand_env_vars, ConnectionSettings, SettingsError};

/// Supported database drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    /// SQLite (file or in-memory)
    Sqlite,
}

impl Driver {
    /// Parse driver from string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, SettingsError> {
        match s.to_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Driver::Sqlite),
            other => Err(SettingsError::UnsupportedDriver(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Driver::Sqlite => "sqlite",
        }
    }
}

impl ConnectionSettings {
    /// Get the driver type.
    pub fn driver_type(&self) -> Result<Driver, SettingsError> {
        Driver::from_str(&self.driver)
    }

    /// Get the database location with environment variables expanded.
    pub fn resolved_database(&self) -> Result<String, SettingsError> {
        expand_env_vars(&self.database)
    }

    /// Build an unconnected connector for these settings.
    pub fn connector(&self) -> Result<Box<dyn Connector>, SettingsError> {
        match self.driver_type()? {
            Driver::Sqlite => {
                let mut connector = SqliteConnector::new(self.resolved_database()?)
                    .with_table_prefix(self.table_prefix.clone())
                    .with_read_only(self.read_only);
                if let Some(sql) = &self.init_sql {
                    connector = connector.with_init_sql(sql.clone());
                }
                Ok(Box::new(connector))
            }
        }
    }
}
