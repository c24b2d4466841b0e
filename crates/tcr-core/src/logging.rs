use crate::{errors::Error, Result};

/// Initialize logging/tracing for the process.
///
/// Default: info for our crates and HTTP tracing. Can be overridden with `RUST_LOG`.
pub fn init(service_name: &str) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "info,tcr_core=info,tcr_http=info,tcr_telegram=info,tower_http=info,{service_name}=info"
        ))
    });

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(true)
        .try_init()
        .map_err(|e| Error::Config(format!("failed to initialize logging: {e}")))
}
