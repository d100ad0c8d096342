//! Configuration management for Delta components

use config::{Config, ConfigError, Environment, File};
use delta_core::{TableRegistry, TableSpec};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for Delta
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeltaConfig {
    /// Source and table selection
    pub source: SourceConfig,

    /// Event queue towards the replication writer
    pub emitter: EmitterConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Source database name; connector records do not carry it
    pub database: String,

    /// Logical server name, the first segment of every record topic
    pub server_name: String,

    /// Drop each table downstream before its first snapshot
    pub replicate_existing_data: bool,

    /// Seed the DDL gate from the latest acknowledged offset on restart
    pub restore_ddl_state: bool,

    /// Tables to replicate (empty = all tables, all columns, all operations)
    #[serde(default)]
    pub tables: Vec<TableSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmitterConfig {
    /// Events buffered before `emit` blocks
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Metrics configuration
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json or pretty)
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable metrics collection
    pub enabled: bool,

    /// Prometheus metrics bind address
    pub bind_address: String,
}

impl Default for DeltaConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig {
                database: "delta".to_string(),
                server_name: "delta-server".to_string(),
                replicate_existing_data: true,
                restore_ddl_state: false,
                tables: Vec::new(),
            },
            emitter: EmitterConfig {
                queue_capacity: 1000,
            },
            observability: ObservabilityConfig {
                logging: LoggingConfig {
                    level: "info".to_string(),
                    format: "json".to_string(),
                },
                metrics: MetricsConfig {
                    enabled: false,
                    bind_address: "0.0.0.0:9090".to_string(),
                },
            },
        }
    }
}

impl SourceConfig {
    pub fn table_registry(&self) -> TableRegistry {
        TableRegistry::new(self.tables.iter().cloned())
    }
}

impl DeltaConfig {
    /// Load configuration from a specific file. Environment variables win over the file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut builder = Config::builder().add_source(Config::try_from(&DeltaConfig::default())?);

        if path.as_ref().exists() {
            builder = builder.add_source(File::from(path.as_ref()));
        }

        builder
            .add_source(Environment::with_prefix("DELTA").separator("__"))
            .build()?
            .try_deserialize()
    }
}
