/// Telegram user id (numeric). Also the recipient of relayed photos.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub i64);

/// Telegram chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// Telegram message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i64);

/// A decoded photo ready to be relayed.
///
/// Lives only for the duration of one request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NormalizedPhoto {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub file_name: String,
}

/// Outcome of a single send-photo call to the provider.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RelayResult {
    pub delivered: bool,
    pub message_id: Option<MessageId>,
    pub chat_id: Option<ChatId>,
    pub error_description: Option<String>,
}

impl RelayResult {
    pub fn delivered(message_id: MessageId, chat_id: ChatId) -> Self {
        Self {
            delivered: true,
            message_id: Some(message_id),
            chat_id: Some(chat_id),
            error_description: None,
        }
    }

    pub fn failed(description: impl Into<String>) -> Self {
        Self {
            delivered: false,
            message_id: None,
            chat_id: None,
            error_description: Some(description.into()),
        }
    }
}

/// Identity of the bot behind the configured credential (`getMe`).
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct BotIdentity {
    pub id: i64,
    pub name: String,
    pub username: String,
}

impl BotIdentity {
    pub fn url(&self) -> String {
        format!("https://t.me/{}", self.username)
    }
}
