use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// HTTP server configuration.
///
/// The categorization core has its own YAML file, pointed to by
/// `titlecat_config`; this struct only covers the HTTP surface.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Server bind address
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum request body size in MB
    #[serde(default = "default_max_body_size_mb")]
    pub max_body_size_mb: usize,

    /// Rate limit: requests per minute per API key
    #[serde(default = "default_rate_limit_per_minute")]
    pub rate_limit_per_minute: u32,

    /// API keys accepted by the protected routes
    #[serde(default)]
    pub api_keys: HashSet<String>,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub enable_cors: bool,

    /// Log level, as an env-filter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Path to the titlecat YAML config; defaults apply when unset
    #[serde(default)]
    pub titlecat_config: Option<PathBuf>,

    /// Run the periodic catalog refresh loop
    #[serde(default = "default_true")]
    pub refresh_loop_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            port: default_port(),
            timeout_secs: default_timeout_secs(),
            max_body_size_mb: default_max_body_size_mb(),
            rate_limit_per_minute: default_rate_limit_per_minute(),
            api_keys: HashSet::new(),
            enable_cors: default_true(),
            log_level: default_log_level(),
            titlecat_config: None,
            refresh_loop_enabled: default_true(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from an optional `server.*` file and
    /// `TITLECAT_SERVER__*` environment variables.
    pub fn load() -> anyhow::Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("server").required(false))
            .add_source(
                config::Environment::with_prefix("TITLECAT_SERVER")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("api_keys")
                    .try_parsing(true),
            );

        let mut config: ServerConfig = builder.build()?.try_deserialize()?;

        if config.api_keys.is_empty() {
            tracing::warn!("no API keys configured, using demo key 'demo-key-12345'");
            config.api_keys.insert("demo-key-12345".to_string());
        }

        Ok(config)
    }

    /// Load the core configuration, falling back to defaults when no path is set.
    pub fn load_titlecat(&self) -> Result<titlecat::TitlecatConfig, titlecat::ConfigLoadError> {
        match &self.titlecat_config {
            Some(path) => titlecat::TitlecatConfig::from_file(path),
            None => Ok(titlecat::TitlecatConfig::default()),
        }
    }

    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr_str = format!("{}:{}", self.bind_addr, self.port);
        Ok(addr_str.parse()?)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Max body size in bytes
    pub fn max_body_size(&self) -> usize {
        self.max_body_size_mb * 1024 * 1024
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_body_size_mb() -> usize {
    1
}

fn default_rate_limit_per_minute() -> u32 {
    100
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.timeout_secs, 30);
        assert_eq!(cfg.max_body_size(), 1024 * 1024);
        assert_eq!(cfg.rate_limit_per_minute, 100);
        assert!(cfg.enable_cors);
        assert!(cfg.refresh_loop_enabled);
        assert!(cfg.titlecat_config.is_none());
    }

    #[test]
    fn test_socket_addr() {
        let cfg = ServerConfig::default();
        let addr = cfg.socket_addr().unwrap();
        assert_eq!(addr.port(), 8080);
    }

    #[test]
    fn test_core_config_defaults_without_path() {
        let cfg = ServerConfig::default();
        let core = cfg.load_titlecat().unwrap();
        assert_eq!(core.categorize.default_top_n, 5);
    }

    #[test]
    fn test_core_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("titlecat.yaml");
        std::fs::write(&path, "version: \"1\"\ncategorize:\n  default_top_n: 3\n").unwrap();

        let cfg = ServerConfig {
            titlecat_config: Some(path),
            ..ServerConfig::default()
        };
        assert_eq!(cfg.load_titlecat().unwrap().categorize.default_top_n, 3);
    }
}
