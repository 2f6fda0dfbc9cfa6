use std::{sync::Arc, time::Duration};

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};

use menu_board::{
    infrastructure::{config::EnvironmentInputs, logger::Logger},
    router, AdminScreen, MemoryBackend, ResolvedConfig, Screens, ServerConfig, ViewerScreen,
};

/// 环境注入的登录令牌在进程内后端中对应的 uid
const TOKEN_SUBJECT: &str = "menu-operator";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::load().context("failed to load server configuration")?;
    let _guard = Logger::init(&config.log)?;

    let resolved = ResolvedConfig::resolve(&EnvironmentInputs::from_env());
    let backend = (!resolved.is_fallback).then(|| MemoryBackend::new(&resolved.backend.project_id));
    if let (Some(backend), Some(token)) = (&backend, &resolved.initial_auth_token) {
        backend.accept_custom_token(token.clone(), TOKEN_SUBJECT);
        info!(uid = TOKEN_SUBJECT, "initial auth token registered");
    }

    let screens = Screens {
        viewer: Arc::new(ViewerScreen::mount(
            &resolved,
            backend.as_ref().map(MemoryBackend::client),
        )),
        admin: Arc::new(AdminScreen::mount(
            &resolved,
            backend.as_ref().map(MemoryBackend::client),
        )),
    };

    let app = router(
        screens.clone(),
        &config.admin_url,
        Duration::from_secs(config.timeout_seconds),
    );

    let addr = config.socket_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, app_id = %resolved.app_id, fallback = resolved.is_fallback, "menu server listening");
    info!("   GET  /menu               - digital menu");
    info!("   GET  /admin              - admin panel");
    info!("   GET  /health             - health check");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    screens.viewer.unmount();
    screens.admin.unmount();
    info!("menu server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
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
    info!("shutdown signal received");
}
