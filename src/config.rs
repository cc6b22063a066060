//! Configuration module for the data room service.

use serde::Deserialize;
use std::path::Path;

use crate::{DataRoomError, Result};

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origins.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Maximum request body size for a single chunk, in megabytes.
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size_mb: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5001
}

fn default_max_chunk_size() -> u64 {
    64
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
            max_chunk_size_mb: default_max_chunk_size(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/dataroom.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// On-disk storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory holding staged chunks.
    #[serde(default = "default_staging_path")]
    pub staging_path: String,
    /// Directory holding assembled files.
    #[serde(default = "default_files_path")]
    pub files_path: String,
}

fn default_staging_path() -> String {
    "data/tmp".to_string()
}

fn default_files_path() -> String {
    "data/files".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            staging_path: default_staging_path(),
            files_path: default_files_path(),
        }
    }
}

/// Upload session configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Lifetime of a new upload session in days.
    #[serde(default = "default_session_ttl")]
    pub session_ttl_days: i64,
    /// Upper bound for writing a single chunk to staging, in seconds.
    #[serde(default = "default_chunk_write_timeout")]
    pub chunk_write_timeout_secs: u64,
    /// Interval of the background completion sweep, in seconds.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    /// Largest `totalChunks` a session may declare.
    #[serde(default = "default_max_chunks")]
    pub max_chunks: u32,
}

fn default_session_ttl() -> i64 {
    10
}

fn default_chunk_write_timeout() -> u64 {
    300 // 5 minutes
}

fn default_sweep_interval() -> u64 {
    300 // 5 minutes
}

fn default_max_chunks() -> u32 {
    10_000
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            session_ttl_days: default_session_ttl(),
            chunk_write_timeout_secs: default_chunk_write_timeout(),
            sweep_interval_secs: default_sweep_interval(),
            max_chunks: default_max_chunks(),
        }
    }
}

/// Room configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RoomsConfig {
    /// Lifetime of a new room in days.
    #[serde(default = "default_room_ttl")]
    pub ttl_days: i64,
}

fn default_room_ttl() -> i64 {
    30
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            ttl_days: default_room_ttl(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/dataroom.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Storage directories.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Upload sessions.
    #[serde(default)]
    pub upload: UploadConfig,
    /// Rooms.
    #[serde(default)]
    pub rooms: RoomsConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(DataRoomError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| DataRoomError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `DATAROOM_DATABASE_PATH`: Override the database file path
    /// - `DATAROOM_STORAGE_PATH`: Place `tmp/` and `files/` under this directory
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("DATAROOM_DATABASE_PATH") {
            if !path.is_empty() {
                self.database.path = path;
            }
        }
        if let Ok(root) = std::env::var("DATAROOM_STORAGE_PATH") {
            if !root.is_empty() {
                let root = Path::new(&root);
                self.storage.staging_path = root.join("tmp").to_string_lossy().into_owned();
                self.storage.files_path = root.join("files").to_string_lossy().into_owned();
            }
        }
    }

    /// Validate the configuration.
    ///
    /// Returns an error if:
    /// - the chunk size limit, a TTL, or an interval is zero
    /// - staging and files directories are the same
    pub fn validate(&self) -> Result<()> {
        if self.server.max_chunk_size_mb == 0 {
            return Err(DataRoomError::Config(
                "server.max_chunk_size_mb must be greater than zero".to_string(),
            ));
        }
        if self.upload.session_ttl_days <= 0 || self.rooms.ttl_days <= 0 {
            return Err(DataRoomError::Config(
                "upload.session_ttl_days and rooms.ttl_days must be positive".to_string(),
            ));
        }
        if self.upload.max_chunks == 0 {
            return Err(DataRoomError::Config(
                "upload.max_chunks must be greater than zero".to_string(),
            ));
        }
        if self.upload.chunk_write_timeout_secs == 0 || self.upload.sweep_interval_secs == 0 {
            return Err(DataRoomError::Config(
                "upload timeouts and intervals must be greater than zero".to_string(),
            ));
        }
        if Path::new(&self.storage.staging_path) == Path::new(&self.storage.files_path) {
            return Err(DataRoomError::Config(
                "storage.staging_path and storage.files_path must differ".to_string(),
            ));
        }
        Ok(())
    }

    /// Maximum chunk request body size in bytes.
    pub fn max_chunk_bytes(&self) -> usize {
        (self.server.max_chunk_size_mb as usize).saturating_mul(1024 * 1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 5001);
        assert!(config.server.cors_origins.is_empty());
        assert_eq!(config.server.max_chunk_size_mb, 64);

        assert_eq!(config.database.path, "data/dataroom.db");

        assert_eq!(config.storage.staging_path, "data/tmp");
        assert_eq!(config.storage.files_path, "data/files");

        assert_eq!(config.upload.session_ttl_days, 10);
        assert_eq!(config.upload.chunk_write_timeout_secs, 300);
        assert_eq!(config.upload.sweep_interval_secs, 300);
        assert_eq!(config.upload.max_chunks, 10_000);

        assert_eq!(config.rooms.ttl_days, 30);

        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.file, "logs/dataroom.log");
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[server]
host = "0.0.0.0"
port = 8080
cors_origins = ["http://localhost:3000"]
max_chunk_size_mb = 8

[database]
path = "custom/db.sqlite"

[storage]
staging_path = "custom/tmp"
files_path = "custom/files"

[upload]
session_ttl_days = 3
chunk_write_timeout_secs = 60
sweep_interval_secs = 30
max_chunks = 500

[rooms]
ttl_days = 7

[logging]
level = "debug"
file = "custom/logs/app.log"
"#;

        let config = Config::parse(toml).unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.cors_origins, vec!["http://localhost:3000"]);
        assert_eq!(config.server.max_chunk_size_mb, 8);
        assert_eq!(config.max_chunk_bytes(), 8 * 1024 * 1024);

        assert_eq!(config.database.path, "custom/db.sqlite");
        assert_eq!(config.storage.staging_path, "custom/tmp");
        assert_eq!(config.storage.files_path, "custom/files");

        assert_eq!(config.upload.session_ttl_days, 3);
        assert_eq!(config.upload.chunk_write_timeout_secs, 60);
        assert_eq!(config.upload.sweep_interval_secs, 30);
        assert_eq!(config.upload.max_chunks, 500);
        assert_eq!(config.rooms.ttl_days, 7);

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.file, "custom/logs/app.log");
    }

    #[test]
    fn test_parse_partial_config() {
        let toml = r#"
[server]
port = 3000

[upload]
session_ttl_days = 1
"#;

        let config = Config::parse(toml).unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.upload.session_ttl_days, 1);

        // Defaults
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.upload.sweep_interval_secs, 300);
        assert_eq!(config.database.path, "data/dataroom.db");
    }

    #[test]
    fn test_parse_empty_config() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.server.port, 5001);
        assert_eq!(config.storage.files_path, "data/files");
    }

    #[test]
    fn test_parse_invalid_config() {
        let result = Config::parse("this is not valid toml [[[");

        if let Err(DataRoomError::Config(msg)) = result {
            assert!(msg.contains("config parse error"));
        } else {
            panic!("Expected Config error");
        }
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = Config::load("nonexistent.toml");
        assert!(matches!(result, Err(DataRoomError::Io(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[database]\npath = \"x.db\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.database.path, "x.db");
    }

    #[test]
    fn test_apply_env_overrides() {
        let original_db = std::env::var("DATAROOM_DATABASE_PATH").ok();
        let original_storage = std::env::var("DATAROOM_STORAGE_PATH").ok();

        std::env::set_var("DATAROOM_DATABASE_PATH", "/srv/rooms.db");
        std::env::set_var("DATAROOM_STORAGE_PATH", "/srv/rooms");

        let mut config = Config::default();
        config.apply_env_overrides();

        assert_eq!(config.database.path, "/srv/rooms.db");
        assert_eq!(config.storage.staging_path, "/srv/rooms/tmp");
        assert_eq!(config.storage.files_path, "/srv/rooms/files");

        match original_db {
            Some(val) => std::env::set_var("DATAROOM_DATABASE_PATH", val),
            None => std::env::remove_var("DATAROOM_DATABASE_PATH"),
        }
        match original_storage {
            Some(val) => std::env::set_var("DATAROOM_STORAGE_PATH", val),
            None => std::env::remove_var("DATAROOM_STORAGE_PATH"),
        }
    }

    #[test]
    fn test_validate_default() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_zero_max_chunks() {
        let mut config = Config::default();
        config.upload.max_chunks = 0;

        let result = config.validate();
        assert!(matches!(result, Err(DataRoomError::Config(msg)) if msg.contains("max_chunks")));
    }

    #[test]
    fn test_validate_zero_chunk_size() {
        let mut config = Config::default();
        config.server.max_chunk_size_mb = 0;

        let result = config.validate();
        if let Err(DataRoomError::Config(msg)) = result {
            assert!(msg.contains("max_chunk_size_mb"));
        } else {
            panic!("Expected Config error");
        }
    }

    #[test]
    fn test_validate_non_positive_ttl() {
        let mut config = Config::default();
        config.upload.session_ttl_days = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.rooms.ttl_days = -1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_same_directories() {
        let mut config = Config::default();
        config.storage.files_path = config.storage.staging_path.clone();
        assert!(config.validate().is_err());
    }
}
