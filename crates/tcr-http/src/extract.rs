//! Inbound send-photo payload, from JSON, urlencoded or multipart bodies.

use axum::{
    extract::{FromRequest, Multipart, Request},
    http::header,
    Form, Json,
};
use serde::Deserialize;
use serde_json::Value;

use crate::errors::ApiError;

/// The photo as the client sent it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PhotoPayload {
    /// Base64 text, optionally with a `data:image/...;base64,` prefix.
    Base64(String),
    /// Raw file part from a multipart upload.
    Upload {
        bytes: Vec<u8>,
        content_type: Option<String>,
    },
}

/// Fields of a send-photo request. Presence is validated by the handler.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PhotoSendRequest {
    pub user_id: Option<Value>,
    pub photo: Option<PhotoPayload>,
    pub caption: Option<String>,
}

#[derive(Debug, Default)]
struct JsonBody {
    user_id: Option<Value>,
    photo_data: Option<Value>,
    caption: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct FormBody {
    user_id: Option<String>,
    photo_data: Option<String>,
    caption: Option<String>,
}

impl JsonBody {
    /// Only an object carries fields; any other JSON value is an empty request.
    fn from_value(value: Value) -> Self {
        match value {
            Value::Object(mut map) => Self {
                user_id: map.remove("user_id"),
                photo_data: map.remove("photo_data"),
                caption: map.remove("caption"),
            },
            _ => Self::default(),
        }
    }
}

impl PhotoSendRequest {
    fn from_json(body: JsonBody) -> Self {
        Self {
            user_id: body.user_id.filter(is_present),
            photo: body
                .photo_data
                .and_then(|v| v.as_str().map(str::to_string))
                .filter(|s| !s.is_empty())
                .map(PhotoPayload::Base64),
            caption: body.caption.and_then(|v| v.as_str().map(str::to_string)),
        }
    }

    fn from_form(body: FormBody) -> Self {
        Self {
            user_id: body.user_id.map(Value::String).filter(is_present),
            photo: body
                .photo_data
                .filter(|s| !s.is_empty())
                .map(PhotoPayload::Base64),
            caption: body.caption,
        }
    }

    async fn from_multipart(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut out = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "photo" => {
                    let content_type = field.content_type().map(str::to_string);
                    let bytes = field.bytes().await?;
                    // An empty file part still counts as present; size checks reject it later.
                    out.photo = Some(PhotoPayload::Upload {
                        bytes: bytes.to_vec(),
                        content_type,
                    });
                }
                "photo_data" => {
                    let text = field.text().await?;
                    if !text.is_empty() && out.photo.is_none() {
                        out.photo = Some(PhotoPayload::Base64(text));
                    }
                }
                "user_id" => {
                    out.user_id = Some(Value::String(field.text().await?)).filter(is_present);
                }
                "caption" => {
                    out.caption = Some(field.text().await?);
                }
                other => {
                    tracing::debug!(field = other, "ignoring unknown multipart field");
                }
            }
        }

        Ok(out)
    }
}

fn is_present(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    }
}

impl<S> FromRequest<S> for PhotoSendRequest
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state).await?;
            return Self::from_multipart(multipart).await;
        }

        if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(body) = Form::<FormBody>::from_request(req, state).await?;
            return Ok(Self::from_form(body));
        }

        if content_type.starts_with("application/json") {
            let Json(value) = Json::<Value>::from_request(req, state).await?;
            return Ok(Self::from_json(JsonBody::from_value(value)));
        }

        // Anything else carries no usable fields.
        Ok(Self::default())
    }
}
