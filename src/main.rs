use std::time::Duration;

use anyhow::Context;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use keyward::config::Config;
use keyward::db::{self, AppState};
use keyward::handlers;
use keyward::service::LicenseService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("keyward=info,tower_http=info")),
        )
        .init();

    let pool = db::open_pool(&config.database_path)
        .with_context(|| format!("opening database at {}", config.database_path))?;
    {
        let conn = pool.get()?;
        db::init_db(&conn)?;
    }

    if config.admin_token.is_none() {
        tracing::warn!("ADMIN_TOKEN is not set; admin endpoints will reject all requests");
    }

    let service =
        LicenseService::new(pool).with_lock_wait(Duration::from_millis(config.lock_wait_ms));
    let state = AppState {
        service,
        admin_token: config.admin_token.clone(),
    };

    let app = handlers::router(state).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.addr())
        .await
        .with_context(|| format!("binding {}", config.addr()))?;
    tracing::info!("listening on {}", config.addr());
    axum::serve(listener, app).await?;

    Ok(())
}
