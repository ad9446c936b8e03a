use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use auth_service::audit_store::PgAuditStore;
use auth_service::config::ServiceConfig;
use auth_service::metrics::AuthMetrics;
use auth_service::rate_limiter::InMemoryRateLimiter;
use auth_service::tokens::TokenSigner;
use auth_service::{build_router, AppState};
use common_auth::JwtVerifier;
use common_security::PermissionTable;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServiceConfig::from_env()?;

    let db = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.database_url)
        .await
        .context("Failed to connect to DATABASE_URL")?;
    sqlx::migrate!("./migrations")
        .run(&db)
        .await
        .context("Failed to run database migrations")?;

    let token_signer = TokenSigner::new(&config.jwt)?;
    let jwt_verifier = JwtVerifier::new(config.jwt.clone());
    let metrics = AuthMetrics::new(&config.http_buckets)?;
    let rate_limiter = InMemoryRateLimiter::new(config.rate_limit.window);
    let addr = SocketAddr::from((config.host, config.port));
    let environment = config.environment.clone();

    let state = AppState {
        audit: Arc::new(PgAuditStore::new(db.clone())),
        db,
        jwt_verifier: Arc::new(jwt_verifier),
        token_signer: Arc::new(token_signer),
        permissions: Arc::new(PermissionTable::standard()),
        config: Arc::new(config),
        rate_limiter: Arc::new(rate_limiter),
        metrics: Arc::new(metrics),
    };

    let app = build_router(state);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, %environment, "starting auth-service");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("auth-service stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
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
