use std::process::ExitCode;
use std::sync::Arc;

use mediagate_server::{
    build_service, init_tracing, router, spawn_sweeper, LogFormat, ServerConfig,
};

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing(LogFormat::from_env());
    let config = ServerConfig::from_env();

    let service = match build_service(&config) {
        Ok(service) => Arc::new(service),
        Err(e) => {
            tracing::error!(error = %e, "startup failed");
            return ExitCode::FAILURE;
        }
    };

    if let Some(every) = config.sweep_interval {
        spawn_sweeper(service.clone(), every);
    }

    let addr = config.listen_addr();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, %addr, "bind failed");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(%addr, require_auth = config.require_auth, "starting MediaGate server");
    if let Err(e) = axum::serve(listener, router(service)).await {
        tracing::error!(error = %e, "server stopped");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
