//! Core domain logic for the Telegram camera relay.
//!
//! This crate is framework-agnostic. The Telegram Bot API client and the HTTP
//! surface live behind ports (traits) implemented in adapter crates.

pub mod config;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod media;
pub mod ports;
pub mod security;
pub mod utils;

pub use errors::{Error, Result};
