use anyhow::{Context, Result};
use rhythmix_flow::{CheckpointStore, InMemoryCheckpointStore, PostgresCheckpointStore};
use rhythmix_service::{
    config::{LogFormat, ServiceConfig},
    controller::SessionController,
    genres::GenreCatalog,
    index::PgVectorSongIndex,
    llm::OpenRouterModel,
    service::{build_router, AppState},
    workflow::{build_recommendation_workflow, create_executor},
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

fn init_tracing(config: &ServiceConfig) {
    let fmt_layer = match config.log_format {
        LogFormat::Pretty => tracing_subscriber::fmt::layer().pretty().boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_level(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(&config.log_filter))
        .with(fmt_layer)
        .init();
}

async fn create_checkpoint_store(database_url: Option<&str>) -> Arc<dyn CheckpointStore> {
    match database_url {
        Some(url) => {
            info!("Using PostgreSQL checkpoint storage");
            match PostgresCheckpointStore::connect(url).await {
                Ok(store) => Arc::new(store),
                Err(e) => {
                    error!(
                        "Failed to connect to PostgreSQL: {}. Falling back to in-memory storage.",
                        e
                    );
                    Arc::new(InMemoryCheckpointStore::new())
                }
            }
        }
        None => {
            info!("Using in-memory checkpoint storage (set DATABASE_URL to use PostgreSQL)");
            Arc::new(InMemoryCheckpointStore::new())
        }
    }
}

/// Drops checkpoints nobody resumed in time
fn spawn_checkpoint_purge(store: Arc<dyn CheckpointStore>, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            match store.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => info!(purged, "Purged expired checkpoints"),
                Err(e) => warn!("Checkpoint purge failed: {}", e),
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServiceConfig::from_env()?;
    init_tracing(&config);
    info!(config = ?config, "Starting song recommendation service");

    let genres = match &config.genres_path {
        Some(path) => GenreCatalog::from_file(path)?,
        None => GenreCatalog::builtin(),
    };
    info!("Loaded {} genres", genres.len());

    let model = Arc::new(OpenRouterModel::new(
        &config.openrouter_api_key,
        config.model.clone(),
    ));
    let index = Arc::new(PgVectorSongIndex::connect(&config.songs_database_url).await?);
    let store = create_checkpoint_store(config.database_url.as_deref()).await;
    spawn_checkpoint_purge(store.clone(), config.purge_interval);

    let workflow = build_recommendation_workflow(model, index, genres)?;
    let executor = create_executor(workflow, store, config.checkpoint_ttl);
    let app = build_router(AppState {
        controller: SessionController::new(Arc::new(executor)),
    });

    let address = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {address}"))?;
    info!("Server running on http://{}", address);

    info!("Available endpoints:");
    info!("  GET  /health");
    info!("  GET  /api/v1/model/version");
    info!("  POST /api/v1/model/predict-attributes?prompt=...");
    info!("  POST /api/v1/model/song-recommender?session_id=...");

    axum::serve(listener, app).await?;

    Ok(())
}
