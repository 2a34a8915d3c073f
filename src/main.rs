//! Main entry point for the fashion generation orchestrator

use fashion_gen_orchestrator::{
    api,
    backend::GeneratorRegistry,
    config::Settings,
    orchestrator::Orchestrator,
    AppState,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_logging(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));

    let registry = tracing_subscriber::registry().with(filter);
    if settings.logging.format.eq_ignore_ascii_case("json") {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    init_logging(&settings);
    settings.validate()?;

    info!(
        "Loaded configuration: server={}:{}, default_model={}",
        settings.server.host, settings.server.port, settings.generation.default_model
    );

    let registry = Arc::new(GeneratorRegistry::new(settings.generation.default_model.clone()));
    registry.initialize_from_config(&settings.models, &settings.safety.harm_block_threshold)?;
    info!("Registered {} model variants", registry.len());

    let orchestrator = Arc::new(Orchestrator::from_settings(&settings, registry.clone())?);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let app_state = Arc::new(AppState {
        settings: Arc::new(RwLock::new(settings)),
        registry,
        orchestrator,
    });

    let app = api::routes::create_router(app_state);

    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
