// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! File-based configuration.
//!
//! # Configuration File
//!
//! ```toml
//! role = "client"
//! server = "4030"          # team number or address, clients only
//! log_level = "info"
//!
//! [[tables]]
//! name = "FromServer"
//! direction = "subscribe"
//!
//! [[tables]]
//! name = "FromClient"
//! direction = "publish"
//! interval_secs = 1
//! ```

use crate::registry::TableRegistry;
use crate::role::{Role, ServerAddress};
use crate::table::Table;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Which side of the connection this process is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleKind {
    #[default]
    Server,
    Client,
}

/// Direction of a configured table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Publish,
    Subscribe,
}

/// A table to create at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConfig {
    pub name: String,

    pub direction: Direction,

    /// Update interval in seconds for published tables (`<= 0`: none).
    #[serde(default)]
    pub interval_secs: i32,
}

/// Process configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DntConfig {
    #[serde(default)]
    pub role: RoleKind,

    /// Server team number or address (client role only).
    #[serde(default)]
    pub server: Option<String>,

    /// Log filter used by binaries when no command-line level is given.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub tables: Vec<TableConfig>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DntConfig {
    fn default() -> Self {
        Self {
            role: RoleKind::Server,
            server: None,
            log_level: default_log_level(),
            tables: Vec::new(),
        }
    }
}

impl DntConfig {
    /// Load and validate a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Example configuration mirroring the demo: one published table.
    pub fn example() -> Self {
        Self {
            tables: vec![TableConfig {
                name: "FromServer".to_string(),
                direction: Direction::Publish,
                interval_secs: 1,
            }],
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match (self.role, &self.server) {
            (RoleKind::Client, None) => {
                return Err(ConfigError::Invalid(
                    "client role requires a server address or team number".into(),
                ));
            }
            (RoleKind::Client, Some(server)) => {
                ServerAddress::parse(server)
                    .map_err(|e| ConfigError::Invalid(e.to_string()))?;
            }
            (RoleKind::Server, _) => {}
        }

        let mut seen = HashSet::new();
        for (i, table) in self.tables.iter().enumerate() {
            if table.name.is_empty() {
                return Err(ConfigError::Invalid(format!("Table {} has an empty name", i)));
            }
            if !seen.insert(table.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "Table {} is configured more than once",
                    table.name
                )));
            }
            if table.direction == Direction::Subscribe && table.interval_secs > 0 {
                return Err(ConfigError::Invalid(format!(
                    "Table {} is subscribed; only publishers declare an interval",
                    table.name
                )));
            }
        }

        Ok(())
    }

    /// Role described by this configuration.
    pub fn role(&self) -> crate::Result<Role> {
        match (self.role, &self.server) {
            (RoleKind::Server, _) => Ok(Role::Server),
            (RoleKind::Client, Some(server)) => Role::client(server),
            (RoleKind::Client, None) => Err(ConfigError::Invalid(
                "client role requires a server address or team number".into(),
            )
            .into()),
        }
    }

    /// Initialize `registry` and create every configured table.
    ///
    /// Publishers with an interval are sent once more so subscribers learn
    /// it right away.
    pub fn apply(&self, registry: &TableRegistry) -> crate::Result<Vec<Arc<Table>>> {
        registry.initialize(self.role()?)?;

        let mut tables = Vec::with_capacity(self.tables.len());
        for cfg in &self.tables {
            let table = match cfg.direction {
                Direction::Publish => {
                    let table = registry.publish(&cfg.name)?;
                    if cfg.interval_secs > 0 {
                        table.set_interval(cfg.interval_secs)?;
                        table.send()?;
                    }
                    table
                }
                Direction::Subscribe => registry.subscribe(&cfg.name)?,
            };
            tables.push(table);
        }
        Ok(tables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::substrate::LoopbackSubstrate;
    use std::io::Write;

    const CLIENT_TOML: &str = r#"
role = "client"
server = "4030"

[[tables]]
name = "FromServer"
direction = "subscribe"

[[tables]]
name = "FromClient"
direction = "publish"
interval_secs = 2
"#;

    #[test]
    fn test_defaults() {
        let config = DntConfig::from_toml("").unwrap();
        assert_eq!(config, DntConfig::default());
        assert_eq!(config.role().unwrap(), Role::Server);
    }

    #[test]
    fn test_parse_client_config() {
        let config = DntConfig::from_toml(CLIENT_TOML).unwrap();
        assert_eq!(config.role, RoleKind::Client);
        assert_eq!(config.tables.len(), 2);
        assert_eq!(config.tables[1].interval_secs, 2);
        assert_eq!(
            config.role().unwrap(),
            Role::Client(ServerAddress::Team(4030))
        );
    }

    #[test]
    fn test_client_without_server_rejected() {
        let err = DntConfig::from_toml("role = \"client\"").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_client_with_bad_server_rejected() {
        let err = DntConfig::from_toml("role = \"client\"\nserver = \"robot\"").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_duplicate_table_rejected() {
        let text = r#"
[[tables]]
name = "t"
direction = "publish"

[[tables]]
name = "t"
direction = "subscribe"
"#;
        assert!(matches!(DntConfig::from_toml(text), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_subscriber_interval_rejected() {
        let text = r#"
[[tables]]
name = "t"
direction = "subscribe"
interval_secs = 1
"#;
        assert!(matches!(DntConfig::from_toml(text), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_unknown_direction_is_parse_error() {
        let text = "[[tables]]\nname = \"t\"\ndirection = \"both\"\n";
        assert!(matches!(DntConfig::from_toml(text), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn test_example_survives_toml() {
        let example = DntConfig::example();
        let text = example.to_toml().unwrap();
        assert_eq!(DntConfig::from_toml(&text).unwrap(), example);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CLIENT_TOML.as_bytes()).unwrap();
        let config = DntConfig::from_file(file.path()).unwrap();
        assert_eq!(config.server.as_deref(), Some("4030"));

        assert!(matches!(
            DntConfig::from_file("/nonexistent/dnt.toml"),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_apply_creates_tables() {
        let registry = TableRegistry::new(Arc::new(LoopbackSubstrate::new()));
        let config = DntConfig::from_toml(CLIENT_TOML).unwrap();
        let tables = config.apply(&registry).unwrap();

        assert!(registry.is_client());
        assert_eq!(tables.len(), 2);
        assert!(!tables[0].is_writable());
        assert!(tables[1].is_writable());
        assert_eq!(tables[1].interval(), Some(2));
    }
}
