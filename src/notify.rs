use crate::config::TelegramConfig;
use std::future::Future;
use teloxide::prelude::*;
use teloxide::types::ChatId;
use tracing::{error, info, warn};

pub trait Notifier: Send + Sync {
    fn terminal_failure(&self, message: &str) -> impl Future<Output = ()> + Send;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    async fn terminal_failure(&self, message: &str) {
        error!(reason = message, "опрос monitor API остановлен");
    }
}

#[derive(Clone)]
pub struct TelegramNotifier {
    bot: Bot,
    chat_ids: Vec<i64>,
}

impl TelegramNotifier {
    pub fn from_config(cfg: &TelegramConfig) -> Result<Self, String> {
        let token = resolve_telegram_token(cfg)?;
        Ok(Self {
            bot: Bot::new(token),
            chat_ids: cfg.chat_ids.clone(),
        })
    }
}

impl Notifier for TelegramNotifier {
    async fn terminal_failure(&self, message: &str) {
        error!(reason = message, "опрос monitor API остановлен");
        for chat_id in &self.chat_ids {
            let text = format!("⚠ prober-client\n{message}");
            match self.bot.send_message(ChatId(*chat_id), text).await {
                Ok(_) => info!(chat_id, "уведомление отправлено в Telegram"),
                Err(err) => {
                    warn!(chat_id, error = %err, "не удалось отправить уведомление в Telegram")
                }
            }
        }
    }
}

pub enum TerminalNotifier {
    Log(LogNotifier),
    Telegram(TelegramNotifier),
}

impl Notifier for TerminalNotifier {
    async fn terminal_failure(&self, message: &str) {
        match self {
            Self::Log(n) => n.terminal_failure(message).await,
            Self::Telegram(n) => n.terminal_failure(message).await,
        }
    }
}

fn resolve_telegram_token_from_env(env_name: &str) -> Option<String> {
    std::env::var(env_name)
        .ok()
        .filter(|v| !v.trim().is_empty())
}

pub fn resolve_telegram_token(cfg: &TelegramConfig) -> Result<String, String> {
    if cfg.chat_ids.is_empty() {
        return Err(
            "telegram.chat_ids пуст: укажите хотя бы один chat id в config".to_string(),
        );
    }

    if let Some(v) = resolve_telegram_token_from_env(&cfg.bot_token_env) {
        return Ok(v);
    }
    if let Some(v) = cfg
        .bot_token
        .as_ref()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
    {
        return Ok(v);
    }

    Err(format!(
        "не найден токен Telegram: задайте '{}' в окружении или telegram.bot_token в config",
        cfg.bot_token_env
    ))
}
