use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use tcr_core::{config::Config, utils::DailyFileLog};
use tcr_http::AppState;
use tcr_telegram::TelegramClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tcr_core::logging::init("tcr")?;

    // Refuse to start without a credential and an allow-list.
    let cfg = Arc::new(Config::load()?);

    let relay = Arc::new(TelegramClient::from_config(&cfg)?);
    let request_log = Arc::new(DailyFileLog::new(cfg.log_dir.clone(), "requests"));
    tracing::info!(dir = %request_log.dir().display(), "request log ready");

    let state = AppState::new(cfg, relay, request_log);

    let shutdown = CancellationToken::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            return;
        }
        tracing::info!("shutdown requested");
        on_signal.cancel();
    });

    tcr_http::serve(state, shutdown).await
}
