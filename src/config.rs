use crate::poller::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_api_path")]
    pub api_path: String,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default)]
    pub auth_key: Option<String>,
    #[serde(default = "default_auth_key_env")]
    pub auth_key_env: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub listen: Option<String>,
    #[serde(default = "default_console")]
    pub console: bool,
    #[serde(default)]
    pub telegram: TelegramConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_bot_token_env")]
    pub bot_token_env: String,
    #[serde(default)]
    pub bot_token: Option<String>,
    #[serde(default)]
    pub chat_ids: Vec<i64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_path: default_api_path(),
            interval_ms: default_interval_ms(),
            auth_key: None,
            auth_key_env: default_auth_key_env(),
            request_timeout_ms: default_request_timeout_ms(),
            retry: RetryConfig::default(),
            listen: None,
            console: default_console(),
            telegram: TelegramConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_failures: default_max_failures(),
            delay_ms: default_retry_delay_ms(),
        }
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bot_token_env: default_bot_token_env(),
            bot_token: None,
            chat_ids: Vec::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("не удалось прочитать файл конфигурации {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("не удалось разобрать YAML в {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("ошибка валидации конфигурации: {0}")]
    Validation(String),
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let path_display = path_ref.display().to_string();
        let text = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_display.clone(),
            source,
        })?;

        let cfg: Config = serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path_display,
            source,
        })?;

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let endpoint = self.endpoint.trim();
        if endpoint.is_empty() {
            return Err(ConfigError::Validation(
                "поле endpoint обязательно".to_string(),
            ));
        }
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(ConfigError::Validation(
                "endpoint должен начинаться с http:// или https://".to_string(),
            ));
        }
        if self.api_path.trim().is_empty() {
            return Err(ConfigError::Validation(
                "поле api_path не должно быть пустым".to_string(),
            ));
        }
        if self.interval_ms < 1 {
            return Err(ConfigError::Validation(
                "interval_ms должно быть >= 1".to_string(),
            ));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "request_timeout_ms должен быть > 0".to_string(),
            ));
        }
        if self.retry.max_failures < 1 {
            return Err(ConfigError::Validation(
                "retry.max_failures должно быть >= 1".to_string(),
            ));
        }
        if self.retry.delay_ms == 0 {
            return Err(ConfigError::Validation(
                "retry.delay_ms должен быть > 0".to_string(),
            ));
        }
        if let Some(listen) = &self.listen {
            if SocketAddr::from_str(listen).is_err() {
                return Err(ConfigError::Validation(
                    "поле listen должно быть корректным адресом host:port".to_string(),
                ));
            }
        }

        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_failures: self.retry.max_failures,
            delay: Duration::from_millis(self.retry.delay_ms),
        }
    }

    // Precedence: explicit key, then the env var named by auth_key_env, then the file.
    pub fn resolve_auth_key(&self, explicit: Option<&str>) -> Option<String> {
        let env_key = std::env::var(&self.auth_key_env).ok();
        let key = [explicit, env_key.as_deref(), self.auth_key.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|v| !v.is_empty())
            .map(str::to_string);
        key
    }

    pub fn example_yaml() -> &'static str {
        include_str!("../config.yaml.example")
    }
}

fn default_endpoint() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_api_path() -> String {
    "/api/monitor".to_string()
}

const fn default_interval_ms() -> u64 {
    3000
}

fn default_auth_key_env() -> String {
    "PROBER_AUTH_KEY".to_string()
}

const fn default_request_timeout_ms() -> u64 {
    10_000
}

const fn default_max_failures() -> u32 {
    10
}

const fn default_retry_delay_ms() -> u64 {
    1000
}

const fn default_console() -> bool {
    true
}

fn default_bot_token_env() -> String {
    "TELEGRAM_BOT_TOKEN".to_string()
}
