//! Service entrypoint

use anyhow::Context;
use liveops_insight::api::{self, AppState};
use liveops_insight::catalog::Catalogs;
use liveops_insight::config::{Config, LoggingConfig};
use liveops_insight::domain::DomainKnowledge;
use liveops_insight::engine::InsightEngine;
use liveops_insight::generation::{GenerationService, HttpGenerationClient};
use liveops_insight::providers::lexical::LexicalSimilarity;
use liveops_insight::repo::{seed_repository, MemoryRepository};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::load().context("loading configuration")?;
    init_tracing(&config.logging);

    // Catalog problems are fatal: the process must not start on a partial
    // or inconsistent load.
    let catalogs =
        Arc::new(Catalogs::load(&config.catalog.dir).context("loading catalogs")?);

    let repository = Arc::new(MemoryRepository::new());
    if config.sample_data.enabled {
        seed_repository(
            &repository,
            config.sample_data.changes,
            config.sample_data.seed,
            chrono::Utc::now(),
        );
    }

    let similarity = Arc::new(LexicalSimilarity::new(
        repository.clone(),
        DomainKnowledge::new().all_notes(),
    ));

    let generation: Option<Arc<dyn GenerationService>> = if config.generation.enabled {
        let client = HttpGenerationClient::from_config(&config.generation)
            .context("configuring generation client")?;
        Some(Arc::new(client))
    } else {
        None
    };

    let engine = Arc::new(
        InsightEngine::new(catalogs, repository, similarity, generation)
            .context("building engine")?,
    );

    let app = api::router(AppState { engine }, config.server.max_body_bytes);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    info!(%addr, "liveops-insight listening");
    axum::serve(listener, app).await.context("serving")?;

    Ok(())
}

fn init_tracing(config: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.level));

    if config.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
