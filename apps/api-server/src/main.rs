//! # NichoFy API Server
//!
//! HTTP surface over the post repository and its live feed.

use actix_web::{App, HttpServer, web};
use tracing_actix_web::TracingLogger;

#[cfg(feature = "scheduler")]
mod background;
mod config;
mod handlers;
mod middleware;
mod state;
mod telemetry;

use config::AppConfig;
use state::AppState;
use telemetry::{TelemetryConfig, init_telemetry};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_telemetry(&TelemetryConfig::from_env());

    let config = AppConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = config.port,
        cache_ttl_secs = config.cache.ttl.as_secs(),
        "Starting NichoFy API server"
    );

    let state = AppState::new(&config);

    #[cfg(feature = "scheduler")]
    let mut scheduler = {
        use background::{Scheduler, SchedulerConfig, register_cache_sweep};

        let scheduler = Scheduler::new(SchedulerConfig::from_env())
            .await
            .map_err(|e| anyhow::anyhow!("scheduler init failed: {e:?}"))?;
        register_cache_sweep(&scheduler, state.cache.clone())
            .await
            .map_err(|e| anyhow::anyhow!("cache sweep registration failed: {e:?}"))?;
        scheduler
            .start()
            .await
            .map_err(|e| anyhow::anyhow!("scheduler start failed: {e:?}"))?;
        scheduler
    };

    HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .app_data(web::Data::new(state.clone()))
            .configure(handlers::configure_routes)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    #[cfg(feature = "scheduler")]
    if let Err(e) = scheduler.shutdown().await {
        tracing::warn!(error = ?e, "Scheduler shutdown failed");
    }

    tracing::info!("Server stopped");
    Ok(())
}
