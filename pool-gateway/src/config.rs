use config::{ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GatewayConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct LedgerConfig {
    /// TOML file for the pool ledger core; falls back to its own env handling
    pub config_file: Option<String>,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let mut builder = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 1317)?;

        if let Ok(config_file) = env::var("CONFIG_FILE") {
            builder = builder.add_source(File::with_name(&config_file).required(false));
        } else {
            builder = builder.add_source(
                File::with_name(&format!("config/{}", environment)).required(false),
            );
        }

        // Override with environment variables
        builder = builder.add_source(Environment::with_prefix("POOL_GATEWAY").separator("__"));

        if let Ok(port) = env::var("PORT") {
            builder = builder.set_override("server.port", port)?;
        }

        builder.build()?.try_deserialize()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("Server port cannot be 0".to_string());
        }
        if self.server.host.trim().is_empty() {
            return Err("Server host cannot be empty".to_string());
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Core configuration, from the configured file or the core's own env vars
    pub fn ledger_config(&self) -> pool_ledger::Result<pool_ledger::Config> {
        match &self.ledger.config_file {
            Some(path) => pool_ledger::Config::from_file(path),
            None => pool_ledger::Config::from_env(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 1317,
            },
            ledger: LedgerConfig::default(),
        }
    }
}
