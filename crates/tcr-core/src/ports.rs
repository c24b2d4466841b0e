use async_trait::async_trait;

use crate::{
    domain::{BotIdentity, NormalizedPhoto, RelayResult, UserId},
    utils::{LogHealth, RequestLogEntry},
    Result,
};

/// Hexagonal port for the messaging provider that delivers photos.
///
/// One call is one delivery attempt: implementations must not retry or
/// deduplicate, so two identical calls produce two messages.
#[async_trait]
pub trait PhotoRelay: Send + Sync {
    async fn send_photo(
        &self,
        recipient: UserId,
        photo: NormalizedPhoto,
        caption: &str,
    ) -> RelayResult;

    async fn bot_identity(&self) -> Result<BotIdentity>;
}

/// Append-only sink for per-request log entries.
///
/// Recording never fails from the caller's point of view; sinks report their
/// own trouble through [`RequestLog::health`].
pub trait RequestLog: Send + Sync {
    fn record(&self, entry: RequestLogEntry);

    fn health(&self) -> LogHealth;
}
