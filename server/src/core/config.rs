use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::utils::file::expand_path;

use super::cli::CliConfig;
use super::constants::{
    APP_DOT_FOLDER, CONFIG_FILE_NAME, DEFAULT_HOST, DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_PORT,
    DEFAULT_REQUEST_TIMEOUT_SECS, ENV_POSTGRES_URL, LEGACY_WAREHOUSE_ENVS,
    POSTGRES_DEFAULT_ACQUIRE_TIMEOUT_SECS, POSTGRES_DEFAULT_IDLE_TIMEOUT_SECS,
    POSTGRES_DEFAULT_MAX_CONNECTIONS, POSTGRES_DEFAULT_MAX_LIFETIME_SECS,
    POSTGRES_DEFAULT_MIN_CONNECTIONS, POSTGRES_DEFAULT_STATEMENT_TIMEOUT_SECS,
};

// =============================================================================
// Transactional Backend Enum (SQLite or PostgreSQL)
// =============================================================================

/// Registry database backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionalBackend {
    #[default]
    Sqlite,
    Postgres,
}

impl fmt::Display for TransactionalBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionalBackend::Sqlite => write!(f, "sqlite"),
            TransactionalBackend::Postgres => write!(f, "postgres"),
        }
    }
}

// =============================================================================
// File Config Structs (JSON, every field optional)
// =============================================================================

/// Server configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ServerFileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Maximum accepted request body in bytes
    pub max_upload_bytes: Option<usize>,
    /// Deadline for a single upload in seconds
    pub request_timeout_secs: Option<u64>,
}

/// Content store configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct WarehouseFileConfig {
    pub path: Option<String>,
}

/// PostgreSQL configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct PostgresFileConfig {
    /// PostgreSQL connection URL (or use WEISS_POSTGRES_URL env var)
    pub url: Option<String>,
    /// Maximum number of connections in the pool (default: 20)
    pub max_connections: Option<u32>,
    /// Minimum number of connections to keep warm (default: 2)
    pub min_connections: Option<u32>,
    /// Connection acquire timeout in seconds (default: 30)
    pub acquire_timeout_secs: Option<u64>,
    /// Idle connection timeout in seconds (default: 600)
    pub idle_timeout_secs: Option<u64>,
    /// Max connection lifetime in seconds (default: 1800)
    pub max_lifetime_secs: Option<u64>,
    /// Statement timeout in seconds, 0 to disable (default: 60)
    pub statement_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct DatabaseFileConfig {
    /// Registry backend: sqlite (default) or postgres
    pub transactional: Option<TransactionalBackend>,
    pub postgres: Option<PostgresFileConfig>,
}

/// File-based configuration (JSON)
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub server: Option<ServerFileConfig>,
    pub warehouse: Option<WarehouseFileConfig>,
    pub database: Option<DatabaseFileConfig>,
    pub debug: Option<bool>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        tracing::trace!(config = ?config, "Parsed config file");
        Ok(config)
    }

    /// Warn about unknown top-level fields
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra
            && !map.is_empty()
        {
            let keys_str: String = map
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                fields = %keys_str,
                "Unknown fields in config file (possible typos)"
            );
        }
    }

    /// Merge another FileConfig into this one (other takes precedence)
    fn merge(&mut self, other: FileConfig) {
        if let Some(server) = other.server {
            let current = self.server.get_or_insert_with(ServerFileConfig::default);
            merge_field(&mut current.host, server.host, "server.host");
            merge_field(&mut current.port, server.port, "server.port");
            merge_field(
                &mut current.max_upload_bytes,
                server.max_upload_bytes,
                "server.max_upload_bytes",
            );
            merge_field(
                &mut current.request_timeout_secs,
                server.request_timeout_secs,
                "server.request_timeout_secs",
            );
        }

        if let Some(warehouse) = other.warehouse {
            let current = self
                .warehouse
                .get_or_insert_with(WarehouseFileConfig::default);
            merge_field(&mut current.path, warehouse.path, "warehouse.path");
        }

        if let Some(database) = other.database {
            let current = self.database.get_or_insert_with(DatabaseFileConfig::default);
            merge_field(
                &mut current.transactional,
                database.transactional,
                "database.transactional",
            );
            if let Some(postgres) = database.postgres {
                let current_pg = current
                    .postgres
                    .get_or_insert_with(PostgresFileConfig::default);
                if postgres.url.is_some() {
                    tracing::trace!(url = "***", "Merging database.postgres.url");
                    current_pg.url = postgres.url;
                }
                merge_field(
                    &mut current_pg.max_connections,
                    postgres.max_connections,
                    "database.postgres.max_connections",
                );
                merge_field(
                    &mut current_pg.min_connections,
                    postgres.min_connections,
                    "database.postgres.min_connections",
                );
                merge_field(
                    &mut current_pg.acquire_timeout_secs,
                    postgres.acquire_timeout_secs,
                    "database.postgres.acquire_timeout_secs",
                );
                merge_field(
                    &mut current_pg.idle_timeout_secs,
                    postgres.idle_timeout_secs,
                    "database.postgres.idle_timeout_secs",
                );
                merge_field(
                    &mut current_pg.max_lifetime_secs,
                    postgres.max_lifetime_secs,
                    "database.postgres.max_lifetime_secs",
                );
                merge_field(
                    &mut current_pg.statement_timeout_secs,
                    postgres.statement_timeout_secs,
                    "database.postgres.statement_timeout_secs",
                );
            }
        }

        merge_field(&mut self.debug, other.debug, "debug");
    }
}

fn merge_field<T: fmt::Debug>(current: &mut Option<T>, incoming: Option<T>, key: &str) {
    if incoming.is_some() {
        tracing::trace!(value = ?incoming, "Merging {}", key);
        *current = incoming;
    }
}

// =============================================================================
// Runtime Config Structs (final merged configuration)
// =============================================================================

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
    pub request_timeout_secs: u64,
}

/// Content store configuration
///
/// `path` is None when no source named a warehouse; storage then falls back
/// to a directory under the data dir.
#[derive(Debug, Clone, Default)]
pub struct WarehouseConfig {
    pub path: Option<PathBuf>,
}

/// PostgreSQL configuration (final/runtime)
#[derive(Debug, Clone, Default)]
pub struct PostgresConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of connections to keep warm
    pub min_connections: u32,
    /// Connection acquire timeout in seconds
    pub acquire_timeout_secs: u64,
    /// Idle connection timeout in seconds
    pub idle_timeout_secs: u64,
    /// Max connection lifetime in seconds
    pub max_lifetime_secs: u64,
    /// Statement timeout in seconds (0 = disabled)
    pub statement_timeout_secs: u64,
}

/// Database configuration (final/runtime)
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub transactional: TransactionalBackend,
    /// Only populated if transactional = postgres
    pub postgres: Option<PostgresConfig>,
}

/// Final merged application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub warehouse: WarehouseConfig,
    pub database: DatabaseConfig,
    pub debug: bool,
}

impl AppConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. Profile directory config (~/.weiss/weiss.json)
    /// 3. Local directory config OR CLI-specified config path
    /// 4. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::debug!("Loading application configuration");
        tracing::trace!(cli = ?cli, "CLI config");

        let mut file_config = FileConfig::default();
        let mut found_configs: Vec<String> = Vec::new();

        if let Some(profile_path) = get_profile_config_path()
            && profile_path.exists()
        {
            let profile_config = FileConfig::load_from_file(&profile_path)?;
            profile_config.warn_unknown_fields();
            file_config.merge(profile_config);
            found_configs.push(profile_path.display().to_string());
        }

        let overlay_path = if let Some(ref path) = cli.config {
            let expanded = expand_path(&path.to_string_lossy());
            if !expanded.exists() {
                anyhow::bail!("Config file not found: {}", expanded.display());
            }
            Some(expanded)
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        if let Some(path) = overlay_path {
            let overlay_config = FileConfig::load_from_file(&path)?;
            overlay_config.warn_unknown_fields();
            file_config.merge(overlay_config);
            found_configs.push(path.display().to_string());
        }

        tracing::debug!(configs = ?found_configs, "Config files loaded");

        let config = Self::from_layers(cli, file_config, |key| std::env::var(key).ok())?;

        tracing::debug!(
            host = %config.server.host,
            port = config.server.port,
            max_upload_bytes = config.server.max_upload_bytes,
            request_timeout_secs = config.server.request_timeout_secs,
            warehouse = ?config.warehouse.path,
            transactional_backend = %config.database.transactional,
            debug = config.debug,
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Layer defaults, merged file config and CLI values, then validate
    ///
    /// `env` looks up variables clap does not cover (legacy warehouse names).
    fn from_layers(
        cli: &CliConfig,
        file_config: FileConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let file_server = file_config.server.unwrap_or_default();
        let file_warehouse = file_config.warehouse.unwrap_or_default();
        let file_database = file_config.database.unwrap_or_default();

        let server = ServerConfig {
            host: cli
                .host
                .clone()
                .or(file_server.host)
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: cli.port.or(file_server.port).unwrap_or(DEFAULT_PORT),
            max_upload_bytes: file_server
                .max_upload_bytes
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            request_timeout_secs: file_server
                .request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        };

        // warehouse: CLI/env -> config file -> legacy env names
        let warehouse_path = cli
            .warehouse
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
            .or(file_warehouse.path)
            .or_else(|| {
                LEGACY_WAREHOUSE_ENVS.iter().find_map(|&key| {
                    let value = env(key).filter(|v| !v.trim().is_empty())?;
                    tracing::debug!(var = key, "Warehouse taken from legacy environment variable");
                    Some(value)
                })
            })
            .map(|p| expand_path(&p));

        let transactional = cli
            .transactional_backend
            .or(file_database.transactional)
            .unwrap_or_default();

        let postgres = if transactional == TransactionalBackend::Postgres {
            let file_pg = file_database.postgres.unwrap_or_default();
            let url = cli
                .postgres_url
                .clone()
                .or_else(|| env(ENV_POSTGRES_URL))
                .or(file_pg.url)
                .unwrap_or_default();
            Some(PostgresConfig {
                url,
                max_connections: file_pg
                    .max_connections
                    .unwrap_or(POSTGRES_DEFAULT_MAX_CONNECTIONS),
                min_connections: file_pg
                    .min_connections
                    .unwrap_or(POSTGRES_DEFAULT_MIN_CONNECTIONS),
                acquire_timeout_secs: file_pg
                    .acquire_timeout_secs
                    .unwrap_or(POSTGRES_DEFAULT_ACQUIRE_TIMEOUT_SECS),
                idle_timeout_secs: file_pg
                    .idle_timeout_secs
                    .unwrap_or(POSTGRES_DEFAULT_IDLE_TIMEOUT_SECS),
                max_lifetime_secs: file_pg
                    .max_lifetime_secs
                    .unwrap_or(POSTGRES_DEFAULT_MAX_LIFETIME_SECS),
                statement_timeout_secs: file_pg
                    .statement_timeout_secs
                    .unwrap_or(POSTGRES_DEFAULT_STATEMENT_TIMEOUT_SECS),
            })
        } else {
            None
        };

        let config = Self {
            server,
            warehouse: WarehouseConfig {
                path: warehouse_path,
            },
            database: DatabaseConfig {
                transactional,
                postgres,
            },
            debug: cli.debug || file_config.debug.unwrap_or(false),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration for consistency and correctness
    fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            anyhow::bail!("Configuration error: server.host must not be empty");
        }

        // Port 0 would bind a random port nobody can find
        if self.server.port == 0 {
            anyhow::bail!("Configuration error: server.port must be greater than 0");
        }

        if self.server.max_upload_bytes == 0 {
            anyhow::bail!("Configuration error: server.max_upload_bytes must be greater than 0");
        }

        if self.server.request_timeout_secs == 0 {
            anyhow::bail!(
                "Configuration error: server.request_timeout_secs must be greater than 0"
            );
        }

        if self.database.transactional == TransactionalBackend::Postgres {
            if let Some(ref pg) = self.database.postgres {
                if pg.url.is_empty() {
                    anyhow::bail!(
                        "Configuration error: database.postgres.url is required when database.transactional is 'postgres'. \
                         Set via {} env var or database.postgres.url in config file.",
                        ENV_POSTGRES_URL
                    );
                }
            } else {
                anyhow::bail!(
                    "Configuration error: PostgreSQL configuration missing when database.transactional is 'postgres'"
                );
            }
        }

        Ok(())
    }
}

/// Get the profile config path (~/.weiss/weiss.json)
fn get_profile_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(APP_DOT_FOLDER).join(CONFIG_FILE_NAME))
}
