use anyhow::Context;
use dotenvy::dotenv;
use log::{info, warn};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crmserver::campaigns::configure_campaign_routes;
use crmserver::config::AppConfig;
use crmserver::shared::state::AppState;
use crmserver::shared::utils::{create_conn, DbPool};
use crmserver::webhooks::configure_webhook_routes;

fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
    const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");
    let mut conn = pool.get().context("failed to get migration connection")?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow::anyhow!("failed to run migrations: {e}"))?;
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install ctrl-c handler");
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .write_style(env_logger::WriteStyle::Always)
        .init();

    let config = AppConfig::from_env().context("failed to load configuration")?;

    let pool = create_conn(&config.database_url())?;
    run_migrations(&pool)?;

    if config.orchestrator.secret.is_none() {
        // Fail closed per request rather than at startup; the CRUD surface
        // stays usable while the webhook path returns 500.
        warn!("ORCHESTRATOR_WEBHOOK_SECRET is not set; step-result webhooks will be rejected");
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(AppState {
        conn: pool,
        config,
        http: reqwest::Client::new(),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = axum::Router::new()
        .merge(configure_campaign_routes())
        .merge(configure_webhook_routes())
        .with_state(state)
        .layer(cors);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("HTTP server listening on {addr}");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}
