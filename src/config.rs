use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageKind,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub logger: LoggerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 7071,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: default_max_connections(),
        }
    }
}

/// Which repository backs the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Postgres,
    Memory,
}

impl std::str::FromStr for StorageKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => Err(AppError::ConfigError(format!("未知的存储类型: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub operation_timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            operation_timeout_secs: 3,
        }
    }
}

impl ServiceConfig {
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggerConfig {
    pub level: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Reads `CONFIG_PATH` (default `config.toml`) and applies environment overrides.
    /// A missing file is not an error; every key then comes from the environment or defaults.
    pub fn from_toml() -> AppResult<Self> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        let file = match std::fs::read_to_string(&config_path) {
            Ok(config_str) => Some(config_str),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                return Err(AppError::ConfigError(format!(
                    "无法读取配置文件 {config_path}: {e}"
                )));
            }
        };

        Self::from_sources(file.as_deref(), |name| env::var(name).ok())
    }

    pub fn from_sources(
        file: Option<&str>,
        get_env: impl Fn(&str) -> Option<String>,
    ) -> AppResult<Self> {
        let mut config: Config = match file {
            Some(config_str) => toml::from_str(config_str)
                .map_err(|e| AppError::ConfigError(format!("解析配置文件失败: {e}")))?,
            None => Config {
                server: ServerConfig::default(),
                database: DatabaseConfig::default(),
                storage: StorageKind::default(),
                service: ServiceConfig::default(),
                logger: LoggerConfig::default(),
            },
        };

        // 环境变量覆盖（即便文件存在时也覆盖）
        if let Some(v) = get_env("SERVER_HOST") {
            config.server.host = v;
        }
        if let Some(v) = get_env("SERVER_PORT")
            && let Ok(p) = v.parse()
        {
            config.server.port = p;
        }
        if let Some(v) = get_env("DATABASE_URL") {
            config.database.url = v;
        }
        if let Some(v) = get_env("DB_MAX_CONNECTIONS")
            && let Ok(mc) = v.parse()
        {
            config.database.max_connections = mc;
        }
        if let Some(v) = get_env("STORAGE") {
            config.storage = v.parse()?;
        }
        if let Some(v) = get_env("OPERATION_TIMEOUT_SECS")
            && let Ok(secs) = v.parse()
        {
            config.service.operation_timeout_secs = secs;
        }
        if let Some(v) = get_env("LOG_LEVEL") {
            config.logger.level = v;
        }

        config.check()?;
        Ok(config)
    }

    fn check(&self) -> AppResult<()> {
        if self.storage == StorageKind::Postgres && self.database.url.trim().is_empty() {
            return Err(AppError::ConfigError(
                "缺少 DATABASE_URL 环境变量，且配置文件中未设置 database.url".to_string(),
            ));
        }
        if self.service.operation_timeout_secs == 0 {
            return Err(AppError::ConfigError(
                "service.operation_timeout_secs 必须大于 0".to_string(),
            ));
        }
        Ok(())
    }
}
