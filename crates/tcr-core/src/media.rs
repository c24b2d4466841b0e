//! Inbound photo payload normalisation.
//!
//! Browsers hand us either a base64 string (usually a `data:` URL produced by
//! `canvas.toDataURL()`) or a raw file upload. Both end up as a
//! [`NormalizedPhoto`] or a [`DecodeError`].

use std::sync::OnceLock;

use base64::{
    alphabet,
    engine::{GeneralPurpose, GeneralPurposeConfig},
    Engine,
};
use regex::Regex;

use crate::domain::NormalizedPhoto;

/// Matches the Bot API's own attachment ceiling.
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 50 * 1024 * 1024;

const DEFAULT_SUBTYPE: &str = "jpeg";
const KNOWN_SUBTYPES: &[&str] = &["jpeg", "png", "gif", "webp", "bmp", "heic", "heif"];

// Canvas encoders are not always canonical about the unused low bits of the
// last quantum; accept them like most decoders do.
const LENIENT_STANDARD: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
);

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Invalid photo_data: not valid base64")]
    InvalidEncoding,

    #[error("Invalid photo_data: image is empty")]
    EmptyPayload,

    #[error("Invalid photo_data: image is {size} bytes, limit is {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },
}

fn data_url_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^data:image/(\w+);base64,").expect("valid regex"))
}

/// Split an optional `data:image/<subtype>;base64,` prefix off `raw`.
///
/// Returns the mime subtype hint (if a prefix was present) and the remaining
/// base64 body.
pub fn strip_data_url(raw: &str) -> (Option<&str>, &str) {
    match data_url_prefix().captures(raw) {
        Some(caps) => {
            let prefix_len = caps.get(0).map(|m| m.end()).unwrap_or(0);
            (caps.get(1).map(|m| m.as_str()), &raw[prefix_len..])
        }
        None => (None, raw),
    }
}

/// Append `=` until the length is a multiple of four (at most three added).
pub fn repair_padding(body: &str) -> String {
    let missing = (4 - body.len() % 4) % 4;
    let mut out = String::with_capacity(body.len() + missing);
    out.push_str(body);
    out.extend(std::iter::repeat('=').take(missing));
    out
}

/// Decode a base64 photo payload, with or without a data-URL prefix.
pub fn normalize(raw: &str, max_bytes: usize) -> Result<NormalizedPhoto, DecodeError> {
    let (subtype, body) = strip_data_url(raw.trim());
    let padded = repair_padding(body.trim());

    let bytes = LENIENT_STANDARD
        .decode(padded.as_bytes())
        .map_err(|_| DecodeError::InvalidEncoding)?;
    check_size(bytes.len(), max_bytes)?;

    Ok(NormalizedPhoto {
        bytes,
        mime_type: format!("image/{}", mime_subtype(subtype)),
        file_name: synthesize_file_name(),
    })
}

/// Wrap an already-binary upload, applying the same size rules as [`normalize`].
pub fn from_upload(
    bytes: Vec<u8>,
    content_type: Option<&str>,
    max_bytes: usize,
) -> Result<NormalizedPhoto, DecodeError> {
    check_size(bytes.len(), max_bytes)?;

    let mime_type = match content_type {
        Some(ct) if ct.starts_with("image/") => ct.to_string(),
        _ => guess_image_media_type(&bytes),
    };

    Ok(NormalizedPhoto {
        bytes,
        mime_type,
        file_name: synthesize_file_name(),
    })
}

fn check_size(size: usize, limit: usize) -> Result<(), DecodeError> {
    if size == 0 {
        return Err(DecodeError::EmptyPayload);
    }
    if size > limit {
        return Err(DecodeError::PayloadTooLarge { size, limit });
    }
    Ok(())
}

fn mime_subtype(hint: Option<&str>) -> &'static str {
    let Some(hint) = hint else {
        return DEFAULT_SUBTYPE;
    };
    let hint = hint.to_ascii_lowercase();
    if hint == "jpg" {
        return DEFAULT_SUBTYPE;
    }
    KNOWN_SUBTYPES
        .iter()
        .copied()
        .find(|s| *s == hint)
        .unwrap_or(DEFAULT_SUBTYPE)
}

fn synthesize_file_name() -> String {
    format!("photo-{}.jpg", chrono::Utc::now().timestamp_millis())
}

/// Guess the MIME type of an image from its magic bytes.
pub fn guess_image_media_type(data: &[u8]) -> String {
    if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        "image/png".into()
    } else if data.starts_with(&[0xFF, 0xD8]) {
        "image/jpeg".into()
    } else if data.starts_with(b"GIF") {
        "image/gif".into()
    } else if data.starts_with(b"RIFF") && data.len() >= 12 && &data[8..12] == b"WEBP" {
        "image/webp".into()
    } else {
        "image/jpeg".into()
    }
}
