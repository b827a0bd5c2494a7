// =============================================================================
// Application Identity
// =============================================================================

/// Application name (for display, platform directories and paths)
pub const APP_NAME: &str = "weiss";

/// Unix-style dotfile folder name
pub const APP_DOT_FOLDER: &str = ".weiss";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name
pub const CONFIG_FILE_NAME: &str = "weiss.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "WEISS_CONFIG";

/// Environment variable for debug mode
pub const ENV_DEBUG: &str = "WEISS_DEBUG";

// =============================================================================
// Environment Variables - Server
// =============================================================================

/// Environment variable for server host
pub const ENV_HOST: &str = "WEISS_HOST";

/// Environment variable for server port
pub const ENV_PORT: &str = "WEISS_PORT";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "WEISS_LOG";

// =============================================================================
// Server Defaults
// =============================================================================

/// Default server host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default server port
pub const DEFAULT_PORT: u16 = 9009;

/// Default maximum upload body size (512 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

/// Default per-upload deadline in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// HTTP Routes
// =============================================================================

/// Upload endpoint
pub const UPLOAD_PATH: &str = "/u";

/// Multipart field carrying the upload
pub const UPLOAD_FIELD: &str = "file";

/// Prefix of retrieval URLs (`/f/<identifier><extension>`)
pub const RETRIEVAL_PREFIX: &str = "/f/";

/// API prefix for JSON endpoints
pub const API_PREFIX: &str = "/api/v1";

// =============================================================================
// Environment Variables - Storage
// =============================================================================

/// Environment variable to override data directory
pub const ENV_DATA_DIR: &str = "WEISS_DATA_DIR";

/// Environment variable for the content store directory
pub const ENV_WAREHOUSE: &str = "WEISS_WAREHOUSE";

/// Warehouse variables honoured from earlier deployments, in priority order
pub const LEGACY_WAREHOUSE_ENVS: &[&str] = &["WAREHOUSE", "VIRTUALENV"];

/// Content store subdirectory of the data directory when nothing else is set
pub const DEFAULT_WAREHOUSE_SUBDIR: &str = "warehouse";

/// Longest file extension kept on stored objects (including the dot)
pub const MAX_EXTENSION_LEN: usize = 32;

// =============================================================================
// SQLite Database
// =============================================================================

/// SQLite database filename
pub const SQLITE_DB_FILENAME: &str = "weiss.db";

/// SQLite connection pool max connections
pub const SQLITE_MAX_CONNECTIONS: u32 = 8;

/// SQLite busy timeout in seconds
pub const SQLITE_BUSY_TIMEOUT_SECS: u64 = 30;

/// SQLite cache size (negative = KB, so -16000 = 16MB)
pub const SQLITE_CACHE_SIZE: &str = "-16000";

/// SQLite WAL auto-checkpoint threshold (pages, ~4MB at 1000)
pub const SQLITE_WAL_AUTOCHECKPOINT: &str = "1000";

/// WAL checkpoint interval in seconds (5 minutes)
pub const SQLITE_CHECKPOINT_INTERVAL_SECS: u64 = 300;

// =============================================================================
// PostgreSQL Database
// =============================================================================

/// Environment variable for transactional backend selection
pub const ENV_TRANSACTIONAL_BACKEND: &str = "WEISS_TRANSACTIONAL_BACKEND";

/// Environment variable for PostgreSQL connection URL
pub const ENV_POSTGRES_URL: &str = "WEISS_POSTGRES_URL";

/// Default max connections in the PostgreSQL pool
pub const POSTGRES_DEFAULT_MAX_CONNECTIONS: u32 = 20;

/// Default min (warm) connections in the PostgreSQL pool
pub const POSTGRES_DEFAULT_MIN_CONNECTIONS: u32 = 2;

/// Default pool acquire timeout in seconds
pub const POSTGRES_DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Default idle connection timeout in seconds
pub const POSTGRES_DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;

/// Default max connection lifetime in seconds
pub const POSTGRES_DEFAULT_MAX_LIFETIME_SECS: u64 = 1800;

/// Default statement timeout in seconds
pub const POSTGRES_DEFAULT_STATEMENT_TIMEOUT_SECS: u64 = 60;

// =============================================================================
// Shutdown
// =============================================================================

/// Graceful shutdown timeout in seconds
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 60;
