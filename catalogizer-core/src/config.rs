use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable that overrides the config file location
pub const CONFIG_PATH_ENV: &str = "CATALOG_CONFIG_PATH";

/// Default config file, resolved against the working directory
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Application configuration
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub smb: SmbConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
    pub catalog: CatalogConfig,
    pub recognition: RecognitionConfig,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("server", &self.server)
            .field("database", &"<redacted>")
            .field("smb", &self.smb)
            .field("auth", &"<redacted>")
            .field("logging", &self.logging)
            .field("catalog", &self.catalog)
            .field("recognition", &self.recognition)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub read_timeout_seconds: u64,
    pub write_timeout_seconds: u64,
    pub idle_timeout_seconds: u64,
    pub enable_cors: bool,
    pub enable_https: bool,
    pub cert_file: Option<String>,
    pub key_file: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8080,
            read_timeout_seconds: 30,
            write_timeout_seconds: 30,
            idle_timeout_seconds: 60,
            enable_cors: false,
            enable_https: false,
            cert_file: None,
            key_file: None,
        }
    }
}

impl ServerConfig {
    /// Base URL used when deriving share links for public bookmarks,
    /// highlights and annotations
    #[must_use]
    pub fn share_base_url(&self) -> String {
        let scheme = if self.enable_https { "https" } else { "http" };
        format!("{scheme}://{}:{}", self.host, self.port)
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub driver: String,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub ssl_mode: String,
    pub max_connections: u32,
    pub connect_timeout_seconds: u64,
    pub idle_timeout_seconds: u64,
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("driver", &self.driver)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"****")
            .field("ssl_mode", &self.ssl_mode)
            .field("max_connections", &self.max_connections)
            .field("connect_timeout_seconds", &self.connect_timeout_seconds)
            .field("idle_timeout_seconds", &self.idle_timeout_seconds)
            .finish()
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: "postgres".to_string(),
            host: "localhost".to_string(),
            port: 5432,
            database: "catalogizer".to_string(),
            username: "catalogizer".to_string(),
            password: String::new(),
            ssl_mode: "disable".to_string(),
            max_connections: 20,
            connect_timeout_seconds: 10,
            idle_timeout_seconds: 600,
        }
    }
}

impl DatabaseConfig {
    /// Connection URL for the pool builder
    #[must_use]
    pub fn url(&self) -> String {
        format!(
            "{}://{}:{}@{}:{}/{}?sslmode={}",
            self.driver, self.username, self.password, self.host, self.port, self.database,
            self.ssl_mode
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmbConfig {
    pub hosts: Vec<String>,
    pub timeout_seconds: u64,
    pub chunk_size: usize,
}

impl Default for SmbConfig {
    fn default() -> Self {
        Self {
            hosts: Vec::new(),
            timeout_seconds: 30,
            // 1 MiB
            chunk_size: 1024 * 1024,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub enable_auth: bool,
    pub jwt_secret: String,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("enable_auth", &self.enable_auth)
            .field("jwt_secret", &"****")
            .finish()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enable_auth: false,
            jwt_secret: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// "json" for production, anything else selects the pretty format
    pub format: String,
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub temp_dir: String,
    pub max_archive_size: u64,
    pub download_chunk_size: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            temp_dir: "/tmp".to_string(),
            // 1 GiB
            max_archive_size: 1024 * 1024 * 1024,
            // 1 MiB
            download_chunk_size: 1024 * 1024,
        }
    }
}

/// Recognition-provider settings. Every provider is optional: an empty
/// base URL disables the corresponding external lookup and the provider
/// falls back to filename parsing.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    pub movie_api_url: String,
    pub movie_api_key: String,
    pub movie_fallback_url: String,
    pub movie_fallback_key: String,
    pub music_api_url: String,
    pub fingerprint_api_url: String,
    pub book_api_url: String,
    pub book_fallback_url: String,
    pub game_api_url: String,
    pub game_api_key: String,
    pub translation_api_url: String,
    pub request_timeout_seconds: u64,
    /// Concurrent recognitions admitted before `Transient` overflow
    pub worker_pool_size: usize,
    pub cache_ttl_hours: u64,
    /// Sustained external requests per second, per provider domain
    pub rate_limit_per_second: u32,
}

impl std::fmt::Debug for RecognitionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecognitionConfig")
            .field("movie_api_url", &self.movie_api_url)
            .field("movie_api_key", &"****")
            .field("movie_fallback_url", &self.movie_fallback_url)
            .field("movie_fallback_key", &"****")
            .field("music_api_url", &self.music_api_url)
            .field("fingerprint_api_url", &self.fingerprint_api_url)
            .field("book_api_url", &self.book_api_url)
            .field("book_fallback_url", &self.book_fallback_url)
            .field("game_api_url", &self.game_api_url)
            .field("game_api_key", &"****")
            .field("translation_api_url", &self.translation_api_url)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .field("worker_pool_size", &self.worker_pool_size)
            .field("cache_ttl_hours", &self.cache_ttl_hours)
            .field("rate_limit_per_second", &self.rate_limit_per_second)
            .finish()
    }
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            movie_api_url: String::new(),
            movie_api_key: String::new(),
            movie_fallback_url: String::new(),
            movie_fallback_key: String::new(),
            music_api_url: String::new(),
            fingerprint_api_url: String::new(),
            book_api_url: String::new(),
            book_fallback_url: String::new(),
            game_api_url: String::new(),
            game_api_key: String::new(),
            translation_api_url: String::new(),
            request_timeout_seconds: 10,
            worker_pool_size: 8,
            cache_ttl_hours: 24,
            rate_limit_per_second: 5,
        }
    }
}

impl Config {
    /// Load configuration with priority:
    /// 1. Environment variables (highest)
    /// 2. Config file
    /// 3. Defaults (lowest)
    ///
    /// The file path comes from `CATALOG_CONFIG_PATH`, falling back to
    /// `config.json` in the working directory. A missing file is not an
    /// error; malformed content is fatal.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::from_file(&path)
    }

    /// Load from an explicit file path plus environment overrides
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if Path::new(path).exists() {
            builder = builder.add_source(File::new(path, config::FileFormat::Json));
        }

        // Override with environment variables (CATALOGIZER_SERVER_PORT, ...)
        builder = builder.add_source(
            Environment::with_prefix("CATALOGIZER")
                .separator("_")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Load from environment variables only
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();
        builder = builder.add_source(
            Environment::with_prefix("CATALOGIZER")
                .separator("_")
                .try_parsing(true),
        );
        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Write the effective (default-filled) configuration back to disk.
    /// `write(load(p))` followed by `load(p)` is a fixed point.
    pub fn write(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }

    /// Listen address for the surface layer
    #[must_use]
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========== Defaults ==========

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.server.host, "localhost");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.read_timeout_seconds, 30);
        assert_eq!(config.server.write_timeout_seconds, 30);
        assert_eq!(config.server.idle_timeout_seconds, 60);
        assert_eq!(config.catalog.temp_dir, "/tmp");
        assert_eq!(config.catalog.max_archive_size, 1024 * 1024 * 1024);
        assert_eq!(config.catalog.download_chunk_size, 1024 * 1024);
        assert_eq!(config.smb.timeout_seconds, 30);
        assert_eq!(config.smb.chunk_size, 1024 * 1024);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"server": {"port": 9090}}"#).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "localhost");
        assert_eq!(config.catalog.temp_dir, "/tmp");
    }

    // ========== Round Trip ==========

    #[test]
    fn test_write_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let path_str = path.to_str().unwrap();

        std::fs::write(&path, r#"{"server": {"port": 9191}, "logging": {"level": "debug"}}"#)
            .unwrap();

        let loaded = Config::from_file(path_str).unwrap();
        assert_eq!(loaded.server.port, 9191);
        assert_eq!(loaded.logging.level, "debug");

        loaded.write(path_str).unwrap();
        let reloaded = Config::from_file(path_str).unwrap();
        assert_eq!(reloaded.server.port, loaded.server.port);
        assert_eq!(reloaded.logging.level, loaded.logging.level);
        assert_eq!(reloaded.catalog.temp_dir, loaded.catalog.temp_dir);
    }

    // ========== Redaction ==========

    #[test]
    fn test_debug_redacts_credentials() {
        let mut config = Config::default();
        config.database.password = "hunter2".to_string();
        config.auth.jwt_secret = "secret".to_string();
        config.recognition.movie_api_key = "movie-key".to_string();
        config.recognition.movie_fallback_key = "fallback-key".to_string();
        config.recognition.game_api_key = "game-key".to_string();

        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("secret"));
        assert!(!debug.contains("movie-key"));
        assert!(!debug.contains("fallback-key"));
        assert!(!debug.contains("game-key"));
    }

    #[test]
    fn test_database_url_shape() {
        let config = DatabaseConfig::default();
        let url = config.url();
        assert!(url.starts_with("postgres://"));
        assert!(url.contains("localhost:5432/catalogizer"));
    }

    #[test]
    fn test_share_base_url_scheme() {
        let mut server = ServerConfig::default();
        assert_eq!(server.share_base_url(), "http://localhost:8080");
        server.enable_https = true;
        assert_eq!(server.share_base_url(), "https://localhost:8080");
    }
}
