//! Test harness for the recommendation orchestrator.
//!
//! Loads a dataset, trains the configured algorithm and prints
//! recommendations for one user.
//!
//! Usage: server [DATA_DIR] [USER_ID] [CONFIG]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use data_loader::JsonDirSource;
use server::{EngineConfig, RecommendationOrchestrator};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let data_dir = PathBuf::from(args.next().unwrap_or_else(|| "data/companions".to_string()));
    let user_id: u64 = match args.next() {
        Some(raw) => raw.parse().context("USER_ID must be a number")?,
        None => 1,
    };
    let config_path = args.next().map(PathBuf::from);

    info!("Starting companion recommendation test harness");
    let config = EngineConfig::load(config_path.as_deref())?;
    let orchestrator =
        RecommendationOrchestrator::load(Arc::new(JsonDirSource::new(data_dir)), config).await?;

    let report = orchestrator.train_model().await?;
    info!(
        "Trained {} (generation {}, {} similarity pairs)",
        report.algorithm, report.generation, report.similarity_pairs
    );

    let limit = 20;
    info!("Getting recommendations for user {} (limit: {})", user_id, limit);
    let recommendations = orchestrator.recommend(user_id, None, limit).await?;

    info!("Received {} recommendations:", recommendations.len());
    for (i, rec) in recommendations.iter().enumerate() {
        info!(
            "{}. {} [{}] - Score: {:.3} ({:?})",
            i + 1,
            rec.nickname,
            rec.game_types.join(", "),
            rec.score,
            rec.source
        );
        info!("   {}", rec.explanation);
    }

    Ok(())
}
