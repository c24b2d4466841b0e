use std::sync::Mutex;

use async_trait::async_trait;

use tcr_core::{
    config::Config,
    domain::{BotIdentity, ChatId, MessageId, NormalizedPhoto, RelayResult, UserId},
    errors::Error,
    ports::PhotoRelay,
    security::AllowList,
    Result,
};

pub const OWNER: i64 = 1189539923;

pub fn test_config() -> Config {
    let mut cfg = Config::with_defaults(Some("123456:TEST".to_string()), AllowList::single(OWNER));
    cfg.static_dir = std::env::temp_dir().join("tcr-no-static-dir");
    cfg
}

#[derive(Clone, Debug)]
pub struct RelayCall {
    pub recipient: UserId,
    pub photo: NormalizedPhoto,
    pub caption: String,
}

/// Relay double that records every call and answers with a canned result.
pub struct FakeRelay {
    result: RelayResult,
    identity: std::result::Result<BotIdentity, String>,
    calls: Mutex<Vec<RelayCall>>,
}

impl FakeRelay {
    pub fn with_result(result: RelayResult) -> Self {
        Self {
            result,
            identity: Ok(BotIdentity {
                id: 8344281396,
                name: "Camera Bot".to_string(),
                username: "camera_webapp_bot".to_string(),
            }),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn delivering() -> Self {
        Self::with_result(RelayResult::delivered(MessageId(100), ChatId(OWNER)))
    }

    pub fn failing(description: &str) -> Self {
        Self::with_result(RelayResult::failed(description))
    }

    pub fn without_identity(mut self, description: &str) -> Self {
        self.identity = Err(description.to_string());
        self
    }

    pub fn calls(&self) -> Vec<RelayCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PhotoRelay for FakeRelay {
    async fn send_photo(
        &self,
        recipient: UserId,
        photo: NormalizedPhoto,
        caption: &str,
    ) -> RelayResult {
        self.calls.lock().unwrap().push(RelayCall {
            recipient,
            photo,
            caption: caption.to_string(),
        });
        self.result.clone()
    }

    async fn bot_identity(&self) -> Result<BotIdentity> {
        self.identity.clone().map_err(Error::Upstream)
    }
}
