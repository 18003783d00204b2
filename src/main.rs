use anyhow::Context;
use tracing_subscriber::EnvFilter;

use trip_forecaster::{
    build_feature_vector, predict, router, AppState, ModelLoader, Predictor, RawInputs, ServerConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = ServerConfig::resolve()?;

    // Startup-fatal: no model, no dashboard.
    let loader = ModelLoader::new(&cfg.model_path);
    let predictor = loader
        .load()
        .with_context(|| format!("cannot serve forecasts without a model ({})", cfg.model_path.display()))?;

    // Warmup on the form defaults so a broken artifact fails here, not on the first user
    let warm = build_feature_vector(&RawInputs::default())?;
    let value = predict(&warm, predictor.as_ref()).context("warmup prediction failed")?;
    tracing::info!(model = predictor.name(), value, "warmup forward ok");

    let addr = cfg.socket_addr()?;
    let app = router(AppState::new(predictor, cfg));

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app).await?;
    Ok(())
}
