//! transcribe-service — transcription job service.
//!
//! Clients submit a media URL or an uploaded file and receive, asynchronously,
//! a transcript rendered in four formats. See `SPEC_FULL.md` for the full
//! design; this binary only wires the pieces together and manages the
//! process lifecycle.

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use transcribe_service::api::server::{self, AppState};
use transcribe_service::app::AppContext;
use transcribe_service::config::Settings;
use transcribe_service::logging::init_logging;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let log_dir = std::env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string());
    let _logging_guard = init_logging(&log_dir)?;
    transcribe_service::panic_hook::install(&log_dir);

    info!("starting transcribe-service v{}", env!("CARGO_PKG_VERSION"));

    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    info!(data_dir = %settings.data_dir.display(), "loaded configuration");

    let ctx = AppContext::init(settings).await?;
    let state = AppState::from_context(&ctx);
    let router = server::build_router(state);

    let worker_handle = ctx.spawn_worker();

    let shutdown = CancellationToken::new();
    let server_shutdown = shutdown.clone();
    let settings_for_server = ctx.settings.clone();
    let server_handle =
        tokio::spawn(async move { server::serve(&settings_for_server, router, server_shutdown).await });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received SIGINT, shutting down");
        }
        _ = wait_for_sigterm() => {
            info!("received SIGTERM, shutting down");
        }
    }

    shutdown.cancel();
    ctx.shutdown();

    if let Err(e) = server_handle.await {
        error!(error = %e, "HTTP server task panicked");
    }
    if let Err(e) = worker_handle.await {
        warn!(error = %e, "job processor task panicked");
    }

    info!("transcribe-service shutdown complete");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_sigterm() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");
    sigterm.recv().await;
}

#[cfg(not(unix))]
async fn wait_for_sigterm() {
    std::future::pending::<()>().await;
}
