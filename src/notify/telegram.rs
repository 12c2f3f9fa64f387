use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{ChatTransport, Destination};
use crate::config::settings::TelegramSettings;

/// Minimal Telegram Bot API client: `sendMessage` plus long-polling `getUpdates`.
#[derive(Clone)]
pub struct TelegramClient {
    base: String,
    client: Client,
    send_timeout: Duration,
    poll_timeout: Duration,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'a str,
}

#[derive(Serialize)]
struct GetUpdates<'a> {
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: &'a [&'a str],
}

#[derive(Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

impl TelegramClient {
    pub fn new(api_base: &str, token: &str) -> Self {
        Self {
            base: format!("{}/bot{}", api_base.trim_end_matches('/'), token),
            client: Client::new(),
            send_timeout: Duration::from_secs(10),
            poll_timeout: Duration::from_secs(30),
        }
    }

    pub fn from_settings(cfg: &TelegramSettings, token: &str) -> Self {
        Self::new(&cfg.api_base, token)
            .with_send_timeout(cfg.send_timeout_secs)
            .with_poll_timeout(cfg.poll_timeout_secs)
    }

    pub fn with_send_timeout(mut self, secs: u64) -> Self {
        self.send_timeout = Duration::from_secs(secs.max(1));
        self
    }

    pub fn with_poll_timeout(mut self, secs: u64) -> Self {
        self.poll_timeout = Duration::from_secs(secs);
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.base, method)
    }

    async fn call<B, T>(&self, method: &str, body: &B, timeout: Duration) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: for<'de> Deserialize<'de>,
    {
        // Errors carry the request URL, which embeds the bot token: strip it.
        let rsp = self
            .client
            .post(self.method_url(method))
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| anyhow!("telegram {method} request failed: {}", e.without_url()))?;

        let status = rsp.status();
        let parsed: ApiResponse<T> = rsp
            .json()
            .await
            .map_err(|e| anyhow!("telegram {method} bad response ({status}): {}", e.without_url()))?;

        if !parsed.ok {
            return Err(anyhow!(
                "telegram {method} rejected ({status}): {}",
                parsed.description.unwrap_or_default()
            ));
        }
        parsed
            .result
            .ok_or_else(|| anyhow!("telegram {method}: missing result"))
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let body = SendMessage {
            chat_id,
            text,
            parse_mode: "HTML",
        };
        let _: serde_json::Value = self
            .call("sendMessage", &body, self.send_timeout)
            .await
            .context("send message")?;
        Ok(())
    }

    /// Long-poll for new messages after `offset`.
    pub async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<Update>> {
        let body = GetUpdates {
            offset,
            timeout: self.poll_timeout.as_secs(),
            allowed_updates: &["message"],
        };
        // The HTTP timeout must outlast the server-side long-poll.
        let http_timeout = self.poll_timeout + Duration::from_secs(10);
        self.call("getUpdates", &body, http_timeout)
            .await
            .context("get updates")
    }
}

#[async_trait::async_trait]
impl ChatTransport for TelegramClient {
    async fn deliver(&self, dest: Destination, text: &str) -> Result<()> {
        self.send_message(dest.0, text).await
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_url_trims_slash() {
        let t = TelegramClient::new("https://api.telegram.org/", "123:abc");
        assert_eq!(t.method_url("sendMessage"), "https://api.telegram.org/bot123:abc/sendMessage");
    }

    #[test]
    fn updates_deserialize_without_text() {
        let raw = r#"{"ok":true,"result":[
            {"update_id":7,"message":{"message_id":1,"chat":{"id":-100,"type":"group"},"text":"/latest"}},
            {"update_id":8,"message":{"message_id":2,"chat":{"id":5,"type":"private"},"sticker":{}}},
            {"update_id":9,"edited_message":{}}
        ]}"#;
        let parsed: ApiResponse<Vec<Update>> = serde_json::from_str(raw).unwrap();
        let ups = parsed.result.unwrap();
        assert_eq!(ups.len(), 3);
        assert_eq!(ups[0].message.as_ref().unwrap().chat.id, -100);
        assert!(ups[1].message.as_ref().unwrap().text.is_none());
        assert!(ups[2].message.is_none());
    }

    #[tokio::test]
    async fn unreachable_api_is_an_error_without_token() {
        let t = TelegramClient::new("http://127.0.0.1:9", "123:secret").with_send_timeout(1);
        let err = t.deliver(Destination(1), "hi").await.unwrap_err();
        assert!(!format!("{err:#}").contains("secret"));
    }
}
