use std::sync::Arc;
use std::net::SocketAddr;
use fleetshare_api::{app, worker, AppState, AuthConfig};
use fleetshare_store::{app_config::Config, BroadcastNotifier, DbClient, PgClaimRepository};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fleetshare_api=debug,fleetshare_core=info,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    tracing::info!("Starting fleetshare API on port {}", config.server.port);

    let db = DbClient::new(&config.database).await?;
    db.migrate().await?;

    let repo = Arc::new(PgClaimRepository::new(db.pool.clone()));
    let events = BroadcastNotifier::new(config.events.capacity);

    if config.cron.configured_secret().is_none() {
        tracing::warn!("CRON_SECRET is not set; the claim sweep endpoint is unauthenticated");
    }

    let app_state = AppState::new(
        repo,
        events,
        AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
            cookie_names: config.auth.cookie_names.clone(),
        },
        config.cron.configured_secret().map(str::to_owned),
    );

    let _sweeper =
        worker::start_sweep_worker(app_state.sweeper.clone(), config.sweeper.interval_seconds);

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
