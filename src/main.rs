use mimalloc::MiMalloc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = netprobe::config::Config::load()?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        listen = %cfg.listen,
        sql_server = %cfg.sql_server.as_deref().unwrap_or("<unset>"),
        sql_database = %cfg.sql_database.as_deref().unwrap_or("<unset>"),
        auth_mode = %cfg.sql_auth_mode,
        "starting diagnostic service"
    );
    if cfg.sql_server.is_none() || cfg.sql_database.is_none() {
        warn!("SQL_SERVER/SQL_DATABASE not configured; database probes will report failures");
    }

    let listen = cfg.listen.clone();
    let state = netprobe::router::ProbeState::new(cfg)?;
    let app = netprobe::router::probe_router(state);

    let listener = TcpListener::bind(&listen).await?;
    info!("HTTP server listening on {}", listen);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
