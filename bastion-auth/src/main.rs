use std::net::SocketAddr;
use std::sync::Arc;

use bastion_auth::config::AuthConfig;
use bastion_auth::services::{
    AuthService, AuthStore, Database, RateLimiter, RedisService, SmtpEmailService, TeamService,
    TokenDenyList, TokenService, TotpService,
};
use bastion_auth::{build_router, db, AppState};
use bastion_core::observability::logging::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AuthConfig::from_env().map_err(|e| anyhow::anyhow!(e.to_string()))?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        "starting"
    );

    let pool = db::init_pool(&config.database)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let database = Database::new(pool);

    let redis = RedisService::connect(&config.redis.url)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let smtp =
        SmtpEmailService::new(&config.smtp).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let store: Arc<dyn AuthStore> = Arc::new(database.clone());
    let deny_list: Arc<dyn TokenDenyList> = Arc::new(redis.clone());
    let limiter = RateLimiter::new(Arc::new(redis.clone()), config.rate_limit.clone());

    let auth = Arc::new(AuthService::new(
        store.clone(),
        deny_list.clone(),
        Arc::new(smtp),
        TokenService::new(&config.jwt),
        TotpService::new(config.totp.issuer.clone()),
        limiter,
        config.rate_limit.otp_ttl_minutes,
    ));
    let teams = Arc::new(TeamService::new(store.clone()));

    let state = AppState {
        auth,
        teams,
        store,
        deny_list,
        db: Some(database),
        cache: Some(redis),
    };

    let app = build_router(state, &config);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
    tracing::info!(%addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
