//! Operator notifications. Best-effort: delivery failures are logged at
//! debug level and never propagate.

use reqwest::blocking::Client;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

pub const ENV_TELEGRAM_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
pub const ENV_TELEGRAM_CHAT_ID: &str = "TELEGRAM_CHAT_ID";

pub trait Notifier: Send + Sync {
    fn notify(&self, text: &str);
}

/// Telegram bot `sendMessage` notifier.
pub struct TelegramNotifier {
    client: Client,
    url: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(token: &str, chat_id: &str, timeout: Duration) -> Option<Self> {
        let client = match Client::builder().timeout(timeout).build() {
            Ok(c) => c,
            Err(e) => {
                debug!(error = %e, "telegram client build failed");
                return None;
            }
        };
        Some(Self {
            client,
            url: format!("https://api.telegram.org/bot{token}/sendMessage"),
            chat_id: chat_id.to_string(),
        })
    }
}

impl Notifier for TelegramNotifier {
    fn notify(&self, text: &str) {
        let body = json!({ "chat_id": self.chat_id, "text": text });
        match self.client.post(&self.url).json(&body).send() {
            Ok(resp) if resp.status().is_success() => {}
            Ok(resp) => debug!(status = resp.status().as_u16(), "telegram rejected message"),
            Err(e) => debug!(error = %e, "telegram send failed"),
        }
    }
}

/// Writes notifications to the log. Used when no bot is configured.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, text: &str) {
        info!(target: "perpsig::notify", "{text}");
    }
}

/// Telegram when both env vars are set, otherwise the log notifier.
pub fn notifier_from_env(timeout: Duration) -> Box<dyn Notifier> {
    let token = std::env::var(ENV_TELEGRAM_TOKEN).ok().filter(|v| !v.is_empty());
    let chat = std::env::var(ENV_TELEGRAM_CHAT_ID).ok().filter(|v| !v.is_empty());
    if let (Some(token), Some(chat)) = (token, chat) {
        if let Some(telegram) = TelegramNotifier::new(&token, &chat, timeout) {
            return Box::new(telegram);
        }
    }
    info!("telegram not configured, notifications go to the log");
    Box::new(LogNotifier)
}
