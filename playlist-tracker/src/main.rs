use anyhow::Context;
use tracing::{error, info, warn};

use playlist_tracker::api::{ApiServer, ApiServerConfig, AppState};
use playlist_tracker::config::AppConfig;
use playlist_tracker::context::AppContext;
use playlist_tracker::logging;
use playlist_tracker::utils::install_rustls_provider;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env().context("invalid configuration")?;

    // Keep the guard alive or buffered file output is lost on exit
    let (logging_config, _log_guard) = logging::init_logging(&config.log_dir, config.log_buffer_lines)
        .context("failed to initialize logging")?;

    install_rustls_provider();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        playlist_id = %config.playlist_id,
        timezone = %config.timezone,
        "Starting playlist-tracker"
    );

    let context = AppContext::build(config, logging_config.buffer().clone())
        .await
        .context("failed to initialize application context")?;

    let cancel = context.cancel_token();
    let retention = logging_config.start_retention_cleanup(cancel.child_token());
    let scheduler = context.start_scheduler();

    let server = ApiServer::with_state(
        ApiServerConfig::from_env_or_default(),
        AppState::from_context(&context),
    )
    .with_cancel_token(cancel.child_token());

    let shutdown_signal = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        info!("Received shutdown signal");
        shutdown_signal.cancel();
    });

    let served = server.run().await;
    if let Err(e) = &served {
        error!(error = %e, "API server stopped with an error");
    }

    context.shutdown(scheduler).await;
    if let Err(e) = retention.await {
        warn!(error = %e, "Log retention task ended abnormally");
    }

    info!("playlist-tracker stopped");
    served.context("API server failed")
}
