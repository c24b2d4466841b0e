use std::time::Instant;

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use tcr_core::{
    domain::{NormalizedPhoto, UserId},
    media,
    security::{coerce_user_id, Access},
    utils::RequestLogEntry,
};

use crate::{
    errors::ApiError,
    extract::{PhotoPayload, PhotoSendRequest},
    router::AppState,
};

pub const SUCCESS_MESSAGE: &str = "Photo sent successfully! 📸";

#[derive(Clone, Debug, Serialize)]
pub struct SendPhotoResponse {
    pub success: bool,
    pub message: &'static str,
    pub message_id: Option<i64>,
    pub chat_id: Option<i64>,
}

/// A completed delivery, with what the request log needs to know about it.
#[derive(Clone, Debug)]
struct Delivery {
    recipient: UserId,
    caption: String,
    payload_bytes: usize,
    mime_type: String,
    message_id: Option<i64>,
    chat_id: Option<i64>,
}

/// A failed request, plus the decoded size when it got that far.
#[derive(Debug)]
struct Refusal {
    error: ApiError,
    payload_bytes: Option<usize>,
}

impl From<ApiError> for Refusal {
    fn from(error: ApiError) -> Self {
        Self {
            error,
            payload_bytes: None,
        }
    }
}

/// `POST /api/send-photo`.
pub async fn send_photo(State(state): State<AppState>, req: PhotoSendRequest) -> Response {
    let started = Instant::now();
    state.stats.record_request();
    let user_id = req.user_id.as_ref().and_then(coerce_user_id).map(|u| u.0);

    tracing::info!(user_id, "send-photo request received");

    match relay_photo(&state, req).await {
        Ok(d) => {
            state.stats.record_delivered();
            state.request_log.record(
                RequestLogEntry::delivered(
                    d.recipient.0,
                    &d.caption,
                    d.payload_bytes,
                    &d.mime_type,
                    d.message_id,
                    d.chat_id,
                )
                .with_duration_ms(elapsed_ms(started)),
            );
            Json(SendPhotoResponse {
                success: true,
                message: SUCCESS_MESSAGE,
                message_id: d.message_id,
                chat_id: d.chat_id,
            })
            .into_response()
        }
        Err(Refusal {
            error: e,
            payload_bytes,
        }) => {
            let status = e.status_code().as_u16();
            let message = e.to_string();
            let entry = if e.is_client_error() {
                state.stats.record_rejected();
                tracing::info!(user_id, status, error = %message, "send-photo rejected");
                RequestLogEntry::rejected(user_id, status, &message)
            } else {
                state.stats.record_failed();
                tracing::warn!(user_id, status, error = %message, "send-photo failed");
                RequestLogEntry::failed(user_id, status, payload_bytes, &message)
            };
            state
                .request_log
                .record(entry.with_duration_ms(elapsed_ms(started)));
            e.into_response()
        }
    }
}

/// The linear pipeline: presence, access, credential, decode, relay.
async fn relay_photo(state: &AppState, req: PhotoSendRequest) -> Result<Delivery, Refusal> {
    let (Some(raw_user_id), Some(payload)) = (req.user_id, req.photo) else {
        return Err(ApiError::MissingFields.into());
    };

    let recipient = match state.cfg.allowed_users.authorize_value(&raw_user_id) {
        Access::Authorized(id) => id,
        Access::Denied => return Err(ApiError::AccessDenied.into()),
    };

    if state.cfg.bot_token.is_none() {
        return Err(ApiError::BotTokenMissing.into());
    }

    let photo = normalize_payload(payload, state.cfg.max_payload_bytes)?;
    let caption = state
        .cfg
        .caption_or_default(req.caption.as_deref())
        .to_string();
    let payload_bytes = photo.bytes.len();
    let mime_type = photo.mime_type.clone();

    let result = state.relay.send_photo(recipient, photo, &caption).await;
    if !result.delivered {
        let description = result
            .error_description
            .unwrap_or_else(|| "Failed to send photo to Telegram".to_string());
        return Err(Refusal {
            error: ApiError::Upstream(description),
            payload_bytes: Some(payload_bytes),
        });
    }

    Ok(Delivery {
        recipient,
        caption,
        payload_bytes,
        mime_type,
        message_id: result.message_id.map(|m| m.0),
        chat_id: result.chat_id.map(|c| c.0),
    })
}

fn normalize_payload(payload: PhotoPayload, max_bytes: usize) -> Result<NormalizedPhoto, ApiError> {
    let photo = match payload {
        PhotoPayload::Base64(raw) => media::normalize(&raw, max_bytes)?,
        PhotoPayload::Upload {
            bytes,
            content_type,
        } => media::from_upload(bytes, content_type.as_deref(), max_bytes)?,
    };
    Ok(photo)
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use axum_test::{
        multipart::{MultipartForm, Part},
        TestServer,
    };
    use serde_json::{json, Value};
    use tcr_core::{domain::RelayResult, utils::MemoryLog};

    use crate::{
        router::{build_router, AppState},
        test_support::{test_config, FakeRelay, OWNER},
    };

    const PNG_DATA_URL: &str = "data:image/png;base64,iVBORw0KGgo=";

    struct Harness {
        server: TestServer,
        relay: Arc<FakeRelay>,
        log: Arc<MemoryLog>,
        state: AppState,
    }

    fn harness_with(cfg: tcr_core::config::Config, relay: FakeRelay) -> Harness {
        let relay = Arc::new(relay);
        let log = Arc::new(MemoryLog::new());
        let state = AppState::new(Arc::new(cfg), relay.clone(), log.clone());
        Harness {
            server: TestServer::new(build_router(state.clone())).unwrap(),
            relay,
            log,
            state,
        }
    }

    fn harness() -> Harness {
        harness_with(test_config(), FakeRelay::delivering())
    }

    #[tokio::test]
    async fn authorized_json_request_is_delivered() {
        let h = harness();
        let response = h
            .server
            .post("/api/send-photo")
            .json(&json!({ "user_id": OWNER, "photo_data": PNG_DATA_URL, "caption": "look" }))
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], super::SUCCESS_MESSAGE);
        assert_eq!(body["message_id"], 100);
        assert_eq!(body["chat_id"], OWNER);

        let calls = h.relay.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].recipient.0, OWNER);
        assert_eq!(calls[0].photo.bytes, [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]);
        assert_eq!(calls[0].caption, "look");
    }

    #[tokio::test]
    async fn string_user_id_is_coerced() {
        let h = harness();
        h.server
            .post("/api/send-photo")
            .json(&json!({ "user_id": OWNER.to_string(), "photo_data": PNG_DATA_URL }))
            .await
            .assert_status_ok();
        assert_eq!(h.relay.calls().len(), 1);
    }

    #[tokio::test]
    async fn missing_caption_uses_default() {
        let h = harness();
        h.server
            .post("/api/send-photo")
            .json(&json!({ "user_id": OWNER, "photo_data": PNG_DATA_URL }))
            .await
            .assert_status_ok();
        assert_eq!(h.relay.calls()[0].caption, h.state.cfg.default_caption);
    }

    #[tokio::test]
    async fn wrong_user_is_denied_without_relay() {
        let h = harness();
        let response = h
            .server
            .post("/api/send-photo")
            .json(&json!({ "user_id": 42, "photo_data": PNG_DATA_URL }))
            .await;

        response.assert_status(StatusCode::FORBIDDEN);
        assert_eq!(
            response.json::<Value>(),
            json!({ "success": false, "error": "Access denied. Wrong user ID." })
        );
        assert!(h.relay.calls().is_empty());
    }

    #[tokio::test]
    async fn non_numeric_user_is_denied() {
        let h = harness();
        h.server
            .post("/api/send-photo")
            .json(&json!({ "user_id": "admin", "photo_data": PNG_DATA_URL }))
            .await
            .assert_status(StatusCode::FORBIDDEN);
        assert!(h.relay.calls().is_empty());
    }

    #[tokio::test]
    async fn missing_fields_are_rejected() {
        let h = harness();
        for body in [
            json!({ "user_id": OWNER }),
            json!({ "photo_data": PNG_DATA_URL }),
            json!({ "user_id": OWNER, "photo_data": "" }),
            json!({}),
        ] {
            let response = h.server.post("/api/send-photo").json(&body).await;
            response.assert_status(StatusCode::BAD_REQUEST);
            assert_eq!(
                response.json::<Value>(),
                json!({ "success": false, "error": "Missing user_id or photo_data" })
            );
        }
        assert!(h.relay.calls().is_empty());
    }

    #[tokio::test]
    async fn non_object_json_is_a_bad_request() {
        let h = harness();
        for body in [json!("x"), json!([OWNER, PNG_DATA_URL]), json!(7)] {
            let response = h.server.post("/api/send-photo").json(&body).await;
            response.assert_status(StatusCode::BAD_REQUEST);
            assert_eq!(
                response.json::<Value>(),
                json!({ "success": false, "error": "Missing user_id or photo_data" })
            );
        }
        assert!(h.relay.calls().is_empty());
    }

    #[tokio::test]
    async fn malformed_json_is_a_bad_request() {
        let h = harness();
        let response = h
            .server
            .post("/api/send-photo")
            .text(r#"{"user_id":"#)
            .content_type("application/json")
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["success"], false);
    }

    #[tokio::test]
    async fn missing_fields_are_checked_before_access() {
        let h = harness();
        h.server
            .post("/api/send-photo")
            .json(&json!({ "user_id": 42 }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_token_fails_without_network() {
        let mut cfg = test_config();
        cfg.bot_token = None;
        let h = harness_with(cfg, FakeRelay::delivering());

        let response = h
            .server
            .post("/api/send-photo")
            .json(&json!({ "user_id": OWNER, "photo_data": PNG_DATA_URL }))
            .await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.json::<Value>(),
            json!({ "success": false, "error": "BOT_TOKEN not configured on server" })
        );
        assert!(h.relay.calls().is_empty());
    }

    #[tokio::test]
    async fn access_is_checked_before_credential() {
        let mut cfg = test_config();
        cfg.bot_token = None;
        let h = harness_with(cfg, FakeRelay::delivering());
        h.server
            .post("/api/send-photo")
            .json(&json!({ "user_id": 42, "photo_data": PNG_DATA_URL }))
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn invalid_base64_is_a_client_error() {
        let h = harness();
        let response = h
            .server
            .post("/api/send-photo")
            .json(&json!({ "user_id": OWNER, "photo_data": "data:image/png;base64,%%%" }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Invalid photo_data: not valid base64");
        assert!(h.relay.calls().is_empty());
    }

    #[tokio::test]
    async fn oversized_photo_is_rejected() {
        let mut cfg = test_config();
        cfg.max_payload_bytes = 4;
        let h = harness_with(cfg, FakeRelay::delivering());

        let response = h
            .server
            .post("/api/send-photo")
            .json(&json!({ "user_id": OWNER, "photo_data": PNG_DATA_URL }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(
            body["error"],
            "Invalid photo_data: image is 8 bytes, limit is 4 bytes"
        );
    }

    #[tokio::test]
    async fn relay_failure_maps_to_500_with_description() {
        let h = harness_with(test_config(), FakeRelay::failing("chat not found"));
        let response = h
            .server
            .post("/api/send-photo")
            .json(&json!({ "user_id": OWNER, "photo_data": PNG_DATA_URL }))
            .await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.json::<Value>(),
            json!({ "success": false, "error": "chat not found" })
        );
    }

    #[tokio::test]
    async fn relay_failure_is_logged_with_payload_size() {
        let h = harness_with(test_config(), FakeRelay::failing("chat not found"));
        h.server
            .post("/api/send-photo")
            .json(&json!({ "user_id": OWNER, "photo_data": PNG_DATA_URL }))
            .await
            .assert_status(StatusCode::INTERNAL_SERVER_ERROR);

        let entries = h.log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].outcome.as_deref(), Some("failed"));
        assert_eq!(entries[0].status, Some(500));
        assert_eq!(entries[0].payload_bytes, Some(8));
        assert_eq!(entries[0].error.as_deref(), Some("chat not found"));
        assert_eq!(h.state.stats.snapshot().failed, 1);
    }

    #[tokio::test]
    async fn relay_failure_without_description_has_generic_message() {
        let h = harness_with(
            test_config(),
            FakeRelay::with_result(RelayResult {
                delivered: false,
                ..Default::default()
            }),
        );
        let response = h
            .server
            .post("/api/send-photo")
            .json(&json!({ "user_id": OWNER, "photo_data": PNG_DATA_URL }))
            .await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.json::<Value>()["error"],
            "Failed to send photo to Telegram"
        );
    }

    #[tokio::test]
    async fn repeated_requests_are_relayed_each_time() {
        let h = harness();
        for _ in 0..2 {
            h.server
                .post("/api/send-photo")
                .json(&json!({ "user_id": OWNER, "photo_data": PNG_DATA_URL }))
                .await
                .assert_status_ok();
        }
        assert_eq!(h.relay.calls().len(), 2);
    }

    #[tokio::test]
    async fn multipart_upload_is_relayed() {
        let h = harness();
        let jpeg = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
        let form = MultipartForm::new()
            .add_text("user_id", OWNER.to_string())
            .add_text("caption", "from the camera")
            .add_part(
                "photo",
                Part::bytes(jpeg.clone())
                    .file_name("capture.jpg")
                    .mime_type("image/jpeg"),
            );

        let response = h.server.post("/api/send-photo").multipart(form).await;
        response.assert_status_ok();

        let calls = h.relay.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].photo.bytes, jpeg);
        assert_eq!(calls[0].photo.mime_type, "image/jpeg");
        assert_eq!(calls[0].caption, "from the camera");
    }

    #[tokio::test]
    async fn multipart_base64_field_is_accepted() {
        let h = harness();
        let form = MultipartForm::new()
            .add_text("user_id", OWNER.to_string())
            .add_text("photo_data", PNG_DATA_URL);

        h.server
            .post("/api/send-photo")
            .multipart(form)
            .await
            .assert_status_ok();
        assert_eq!(h.relay.calls()[0].photo.mime_type, "image/png");
    }

    #[tokio::test]
    async fn multipart_without_photo_is_rejected() {
        let h = harness();
        let form = MultipartForm::new().add_text("user_id", OWNER.to_string());
        h.server
            .post("/api/send-photo")
            .multipart(form)
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_content_type_counts_as_missing_fields() {
        let h = harness();
        let response = h.server.post("/api/send-photo").text("hello").await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(
            response.json::<Value>()["error"],
            "Missing user_id or photo_data"
        );
    }

    #[tokio::test]
    async fn outcomes_are_logged_and_counted() {
        let h = harness();
        h.server
            .post("/api/send-photo")
            .json(&json!({ "user_id": OWNER, "photo_data": PNG_DATA_URL }))
            .await
            .assert_status_ok();
        h.server
            .post("/api/send-photo")
            .json(&json!({ "user_id": 42, "photo_data": PNG_DATA_URL }))
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let entries = h.log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].outcome.as_deref(), Some("delivered"));
        assert_eq!(entries[0].user_id, Some(OWNER));
        assert_eq!(entries[0].message_id, Some(100));
        assert_eq!(entries[1].outcome.as_deref(), Some("rejected"));
        assert_eq!(entries[1].user_id, Some(42));
        assert_eq!(entries[1].status, Some(403));

        let stats = h.state.stats.snapshot();
        assert_eq!(stats.requests, 2);
        assert_eq!(stats.delivered, 1);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.failed, 0);
    }
}
