use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use timesheet_engine::api::{AppState, create_router};
use timesheet_engine::config::ConfigLoader;
use timesheet_engine::recalc::run_finalize_schedule;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ConfigLoader::from_env()?;
    let server = config.engine().server.clone();
    info!(
        employees = config.engine().employees.len(),
        finalize_at = %server.finalize_at,
        "Configuration loaded"
    );

    let (state, worker) = AppState::from_config(&config, None);
    let scheduler = tokio::spawn(run_finalize_schedule(
        state.recalculator().clone(),
        server.finalize_at,
    ));

    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(&server.bind_address).await?;
    info!("Listening on http://{}", server.bind_address);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await?;

    // The router held the last queue handle; the worker now drains and exits.
    scheduler.abort();
    worker.await?;
    info!("Shutdown complete");
    Ok(())
}
