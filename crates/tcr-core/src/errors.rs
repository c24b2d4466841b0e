/// Core error type for the relay.
///
/// Adapter crates map their specific failures into this type so the HTTP
/// layer can turn them into a consistent response.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failure reported by the messaging provider. The payload is the
    /// provider's own description when one was available.
    #[error("{0}")]
    Upstream(String),
}

pub type Result<T> = std::result::Result<T, Error>;
