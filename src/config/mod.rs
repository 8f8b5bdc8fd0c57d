//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Port used when neither `PORT` nor `SERVER_ADDR` is set
pub const DEFAULT_PORT: u16 = 3000;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS, `*` means any
    pub client_origin: String,
    /// Directory with the browser client assets
    pub static_dir: PathBuf,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_vars<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // PORT wins over SERVER_ADDR, like most PaaS hosts expect
        let server_addr = match (var("PORT"), var("SERVER_ADDR")) {
            (Some(port), _) => {
                let port: u16 = port.trim().parse().map_err(|_| ConfigError::InvalidAddress)?;
                SocketAddr::from(([0, 0, 0, 0], port))
            }
            (None, Some(addr)) => addr.parse().map_err(|_| ConfigError::InvalidAddress)?,
            (None, None) => SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
        };

        Ok(Self {
            server_addr,
            log_level: var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            client_origin: var("CLIENT_ORIGIN").unwrap_or_else(|| "*".to_string()),
            static_dir: var("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("public")),
        })
    }

    /// Whether CORS should accept any origin
    pub fn allows_any_origin(&self) -> bool {
        self.client_origin.split(',').any(|o| o.trim() == "*")
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid server address or port")]
    InvalidAddress,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_vars(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_to_port_3000() {
        let config = load(&[]).unwrap();
        assert_eq!(config.server_addr.port(), DEFAULT_PORT);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.static_dir, PathBuf::from("public"));
        assert!(config.allows_any_origin());
    }

    #[test]
    fn port_overrides_server_addr() {
        let config = load(&[("PORT", "8081"), ("SERVER_ADDR", "127.0.0.1:9000")]).unwrap();
        assert_eq!(config.server_addr, "0.0.0.0:8081".parse().unwrap());

        let config = load(&[("SERVER_ADDR", "127.0.0.1:9000")]).unwrap();
        assert_eq!(config.server_addr, "127.0.0.1:9000".parse().unwrap());
    }

    #[test]
    fn rejects_bad_port() {
        assert!(matches!(
            load(&[("PORT", "not-a-port")]),
            Err(ConfigError::InvalidAddress)
        ));
        assert!(matches!(
            load(&[("SERVER_ADDR", "nowhere")]),
            Err(ConfigError::InvalidAddress)
        ));
    }

    #[test]
    fn explicit_origins_disable_wildcard() {
        let config = load(&[("CLIENT_ORIGIN", "http://a.test, http://b.test")]).unwrap();
        assert!(!config.allows_any_origin());
    }
}
