use anyhow::Context;
use covid_predictor_backend::{
    chart::canvas, router, telemetry, AppState, ChartEngine, RegressionModel, ServiceConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing();

    let cfg = ServiceConfig::from_env().context("failed to load service configuration")?;

    let model = RegressionModel::load(&cfg.model_path)?;
    // Warmup to surface shape problems before taking traffic
    let _ = model.predict(&vec![0.0; model.n_features])?;
    tracing::info!(
        "loaded {} model from {}; n_features={} {:?}",
        model.kind(),
        cfg.model_path.display(),
        model.n_features,
        &model.feature_names
    );

    match &cfg.font_path {
        Some(path) => {
            if let Err(e) = canvas::register_font_file(path) {
                tracing::warn!("{:#}; charts will be drawn without text", e);
            }
        }
        None => tracing::warn!("no chart font configured; charts will be drawn without text"),
    }

    let charts = ChartEngine::from_config(&cfg);
    let app = router(AppState::new(model, charts));

    let addr = cfg.socket_addr()?;
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
