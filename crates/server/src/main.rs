mod api;
mod bootstrap;
mod health;

use anyhow::Result;
use axum::Router;
use pricepromo_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use pricepromo_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // logging needs the loaded config, so config errors surface on stderr only
    let app = bootstrap::bootstrap(LoadOptions::default())?;
    init_logging(&app.config);
    tracing::info!(
        event_name = "system.bootstrap.completed",
        correlation_id = "bootstrap",
        reference_date = %app.config.pipeline.reference_date,
        default_region = %app.config.pipeline.default_region,
        "configuration loaded"
    );

    let router: Router = api::router(app.state.clone()).merge(health::router(app.state.clone()));

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        recommendations = if app.config.llm.credential().is_some() { "llm" } else { "rule_based" },
        "pricepromo-server started"
    );

    axum::serve(listener, router).with_graceful_shutdown(wait_for_shutdown()).await?;

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "pricepromo-server stopping"
    );

    Ok(())
}

async fn wait_for_shutdown() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(
            event_name = "system.server.signal_error",
            correlation_id = "shutdown",
            error = %error,
            "failed to listen for shutdown signal"
        );
    }
}
