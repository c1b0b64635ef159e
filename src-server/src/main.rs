use std::process::ExitCode;

use tokio::net::TcpListener;
use tracing::{error, info};

use controlmap::load_settings_from_env;
use controlmap_server::telemetry::{self, LogFormat};
use controlmap_server::{router, AppState};

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = telemetry::init(LogFormat::from_env()) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    info!("Starting controlmap server v{}", env!("CARGO_PKG_VERSION"));

    let settings = match load_settings_from_env() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Failed to load settings: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let address = settings.server.bind_address();
    let state = AppState::from_settings(settings);

    let listener = match TcpListener::bind(&address).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", address, e);
            return ExitCode::FAILURE;
        }
    };
    info!(address = %address, "Listening");

    let served = axum::serve(listener, router(state.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    info!("Cancelling running batches");
    state.service.shutdown().await;

    match served {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Server failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
