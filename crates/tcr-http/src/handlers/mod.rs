//! HTTP request handlers.
//!
//! `send_photo` is the only handler with business logic: it validates the
//! payload, checks access and hands the photo to the relay port. Everything
//! in `status` is informational.

pub mod send_photo;
pub mod status;
