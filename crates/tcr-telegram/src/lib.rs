//! Telegram Bot API adapter.
//!
//! Implements the `tcr-core` [`PhotoRelay`] port with plain `reqwest` calls to
//! `sendPhoto` (multipart) and `getMe`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use tcr_core::{
    config::Config,
    domain::{BotIdentity, ChatId, MessageId, NormalizedPhoto, RelayResult, UserId},
    errors::Error,
    ports::PhotoRelay,
    Result,
};

/// Content type of the uploaded part, whatever the source image was.
const PHOTO_PART_MIME: &str = "image/jpeg";

#[derive(Clone, Debug)]
pub struct TelegramSettings {
    pub api_url: String,
    pub bot_token: String,
    pub send_photo_timeout: Duration,
    pub bot_info_timeout: Duration,
}

impl TelegramSettings {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let bot_token = cfg
            .bot_token
            .clone()
            .ok_or_else(|| Error::Config("BOT_TOKEN not configured".to_string()))?;
        Ok(Self {
            api_url: cfg.telegram_api_url.clone(),
            bot_token,
            send_photo_timeout: cfg.send_photo_timeout,
            bot_info_timeout: cfg.bot_info_timeout,
        })
    }
}

#[derive(Clone, Debug)]
pub struct TelegramClient {
    settings: TelegramSettings,
    http: reqwest::Client,
}

// ============== Bot API wire types ==============

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    #[serde(default)]
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
    chat: Chat,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct User {
    id: i64,
    first_name: String,
    username: Option<String>,
}

impl TelegramClient {
    pub fn new(settings: TelegramSettings) -> Result<Self> {
        // Timeouts are set per request: sendPhoto and getMe use different ones.
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Config(format!("reqwest client build: {e}")))?;
        Ok(Self { settings, http })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Self::new(TelegramSettings::from_config(cfg)?)
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{method}",
            self.settings.api_url.trim_end_matches('/'),
            self.settings.bot_token
        )
    }
}

/// Human-readable transport error that never leaks the token-bearing URL.
fn transport_error(e: reqwest::Error) -> String {
    e.without_url().to_string()
}

fn fallback_description(status: StatusCode) -> String {
    if status.is_success() {
        "malformed response from Telegram API".to_string()
    } else {
        format!("Telegram API returned HTTP {status}")
    }
}

/// Map a `sendPhoto` HTTP response onto a [`RelayResult`].
fn parse_send_response(status: StatusCode, body: &str) -> RelayResult {
    let parsed = serde_json::from_str::<ApiResponse<SentMessage>>(body).ok();

    match parsed {
        Some(ApiResponse {
            ok: true,
            result: Some(msg),
            ..
        }) if status.is_success() => {
            RelayResult::delivered(MessageId(msg.message_id), ChatId(msg.chat.id))
        }
        Some(ApiResponse {
            description: Some(d),
            ..
        }) if !d.trim().is_empty() => RelayResult::failed(d),
        _ => RelayResult::failed(fallback_description(status)),
    }
}

/// Map a `getMe` HTTP response onto a [`BotIdentity`].
fn parse_identity_response(status: StatusCode, body: &str) -> Result<BotIdentity> {
    let parsed = serde_json::from_str::<ApiResponse<User>>(body).ok();

    match parsed {
        Some(ApiResponse {
            ok: true,
            result: Some(user),
            ..
        }) if status.is_success() => Ok(BotIdentity {
            id: user.id,
            name: user.first_name,
            username: user.username.unwrap_or_default(),
        }),
        Some(ApiResponse {
            description: Some(d),
            ..
        }) if !d.trim().is_empty() => Err(Error::Upstream(d)),
        _ => Err(Error::Upstream(fallback_description(status))),
    }
}

#[async_trait]
impl PhotoRelay for TelegramClient {
    async fn send_photo(
        &self,
        recipient: UserId,
        photo: NormalizedPhoto,
        caption: &str,
    ) -> RelayResult {
        let size = photo.bytes.len();
        let part = match reqwest::multipart::Part::bytes(photo.bytes)
            .file_name(photo.file_name)
            .mime_str(PHOTO_PART_MIME)
        {
            Ok(p) => p,
            Err(e) => return RelayResult::failed(format!("telegram multipart error: {e}")),
        };

        let mut form = reqwest::multipart::Form::new()
            .text("chat_id", recipient.0.to_string())
            .part("photo", part);
        if !caption.trim().is_empty() {
            form = form.text("caption", caption.to_string());
        }

        let resp = match self
            .http
            .post(self.method_url("sendPhoto"))
            .timeout(self.settings.send_photo_timeout)
            .multipart(form)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                let description = transport_error(e);
                tracing::warn!(chat_id = recipient.0, error = %description, "sendPhoto transport error");
                return RelayResult::failed(description);
            }
        };

        let status = resp.status();
        let body = match resp.text().await {
            Ok(b) => b,
            Err(e) => return RelayResult::failed(transport_error(e)),
        };

        let result = parse_send_response(status, &body);
        if result.delivered {
            tracing::info!(
                chat_id = recipient.0,
                bytes = size,
                message_id = result.message_id.map(|m| m.0),
                "photo delivered"
            );
        } else {
            tracing::warn!(
                chat_id = recipient.0,
                %status,
                error = result.error_description.as_deref().unwrap_or(""),
                "sendPhoto failed"
            );
        }
        result
    }

    async fn bot_identity(&self) -> Result<BotIdentity> {
        let resp = self
            .http
            .get(self.method_url("getMe"))
            .timeout(self.settings.bot_info_timeout)
            .send()
            .await
            .map_err(|e| Error::Upstream(transport_error(e)))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::Upstream(transport_error(e)))?;

        parse_identity_response(status, &body)
    }
}
