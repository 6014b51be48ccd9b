use algorithms::AlgorithmKind;
use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use data_loader::{BehaviorKind, DataIndex, GameId, JsonDirSource, UserId};
use rand::seq::IndexedRandom;
use server::{EngineConfig, MasterRecommendation, RecommendationOrchestrator, SimilarityQuery};
use sources::user_context::build_user_context;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Companion recommendation engine
#[derive(Parser)]
#[command(name = "companion-recs")]
#[command(about = "Game-companion recommendations: recall, ranking, filtering and offline evaluation", long_about = None)]
struct Cli {
    /// Path to the dataset directory (users.json, masters.json, games.json, ...)
    #[arg(short, long, default_value = "data/companions")]
    data_dir: PathBuf,

    /// Engine config file (TOML); defaults apply when absent
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured algorithm (collaborative, content_based, hybrid)
    #[arg(short, long)]
    algorithm: Option<AlgorithmKind>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Get master recommendations for a user
    Recommend {
        #[arg(long)]
        user_id: UserId,

        /// Only masters offering this game
        #[arg(long)]
        game_id: Option<GameId>,

        /// Number of recommendations per page
        #[arg(long, default_value = "20")]
        limit: usize,

        /// 1-based page number
        #[arg(long, default_value = "1")]
        page: usize,

        /// Show the explanation for each recommendation
        #[arg(long)]
        explain: bool,

        /// Train the model before recommending
        #[arg(long)]
        train: bool,
    },

    /// Get game recommendations for a user
    Games {
        #[arg(long)]
        user_id: UserId,

        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Show the most popular masters
    Hot {
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Similarity between two entities, in [0, 1]
    Similarity {
        #[arg(value_enum)]
        kind: SimilarityKind,

        /// First ID (the user for user-master and user-game)
        a: u64,

        b: u64,
    },

    /// Train the configured algorithm and print the report
    Train,

    /// Train, then evaluate offline and print the metrics report
    Evaluate,

    /// Show a user's profile and interaction history
    User {
        #[arg(long)]
        user_id: UserId,
    },

    /// Run benchmark to test performance
    Benchmark {
        /// Number of requests to make
        #[arg(long, default_value = "100")]
        requests: usize,

        /// Number of concurrent requests
        #[arg(long, default_value = "10")]
        concurrent: usize,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SimilarityKind {
    UserMaster,
    UserGame,
    Masters,
    Games,
}

impl SimilarityKind {
    fn query(self, a: u64, b: u64) -> SimilarityQuery {
        match self {
            SimilarityKind::UserMaster => SimilarityQuery::UserMaster {
                user_id: a,
                master_id: b,
            },
            SimilarityKind::UserGame => SimilarityQuery::UserGame {
                user_id: a,
                game_id: b,
            },
            SimilarityKind::Masters => SimilarityQuery::Masters(a, b),
            SimilarityKind::Games => SimilarityQuery::Games(a, b),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = EngineConfig::load(cli.config.as_deref()).context("Failed to load config")?;
    if let Some(kind) = cli.algorithm {
        config.algorithm = kind;
    }

    // Load the dataset (this may take a moment)
    println!("Loading dataset from {}...", cli.data_dir.display());
    let start = Instant::now();
    let orchestrator =
        RecommendationOrchestrator::load(Arc::new(JsonDirSource::new(&cli.data_dir)), config)
            .await
            .context("Failed to load dataset")?;
    println!("{} Loaded dataset in {:?}", "✓".green(), start.elapsed());

    // Dispatch to appropriate command handler
    match cli.command {
        Commands::Recommend {
            user_id,
            game_id,
            limit,
            page,
            explain,
            train,
        } => handle_recommend(&orchestrator, user_id, game_id, page, limit, explain, train).await?,
        Commands::Games { user_id, limit } => handle_games(&orchestrator, user_id, limit).await?,
        Commands::Hot { limit } => {
            let hot = orchestrator.hot_masters(limit).await?;
            println!("{}", "Popular masters:".bold().blue());
            print_recommendations(&hot, false);
        }
        Commands::Similarity { kind, a, b } => {
            let similarity = orchestrator.similarity(kind.query(a, b)).await?;
            println!("Similarity: {}", format!("{:.4}", similarity).bold());
        }
        Commands::Train => handle_train(&orchestrator).await?,
        Commands::Evaluate => {
            handle_train(&orchestrator).await?;
            let metrics = orchestrator.evaluate_model().await?;
            println!("{}", metrics);
            let verdict = if metrics.is_good_quality() {
                "good".green()
            } else {
                "needs work".yellow()
            };
            println!("Quality: {:.4} ({})", metrics.quality_score(), verdict);
        }
        Commands::User { user_id } => handle_user(orchestrator.data_index(), user_id)?,
        Commands::Benchmark {
            requests,
            concurrent,
        } => handle_benchmark(&orchestrator, requests, concurrent).await?,
    }

    Ok(())
}

/// Handle the 'recommend' command
async fn handle_recommend(
    orchestrator: &RecommendationOrchestrator,
    user_id: UserId,
    game_id: Option<GameId>,
    page: usize,
    limit: usize,
    explain: bool,
    train: bool,
) -> Result<()> {
    if orchestrator.data_index().get_user(user_id).is_none() {
        println!(
            "{} User {} not found, showing popular masters",
            "!".yellow(),
            user_id
        );
    }
    if train {
        handle_train(orchestrator).await?;
    }

    let page = orchestrator
        .recommend_page(user_id, game_id, page, limit)
        .await?;

    println!(
        "{}",
        format!(
            "Recommendations for user {} (page {}, {} total):",
            user_id, page.page, page.total
        )
        .bold()
        .blue()
    );
    print_recommendations(&page.items, explain);
    Ok(())
}

async fn handle_games(
    orchestrator: &RecommendationOrchestrator,
    user_id: UserId,
    limit: usize,
) -> Result<()> {
    let games = orchestrator.recommend_games(user_id, limit).await?;
    println!("{}", format!("Games for user {}:", user_id).bold().blue());
    if games.is_empty() {
        println!("  (no game history to work from)");
    }
    for (i, game) in games.iter().enumerate() {
        println!(
            "{}. {} [{}] - Score: {:.3}",
            (i + 1).to_string().green(),
            game.name,
            game.game_type,
            game.score
        );
    }
    Ok(())
}

async fn handle_train(orchestrator: &RecommendationOrchestrator) -> Result<()> {
    let report = orchestrator.train_model().await?;
    println!(
        "{} Trained {} generation {} in {} ms ({} similarity pairs)",
        "✓".green(),
        report.algorithm,
        report.generation,
        report.elapsed_ms,
        report.similarity_pairs
    );
    if let Some(weights) = report.hybrid_weights {
        println!(
            "  Hybrid weights v{}: collaborative {:.3}, content {:.3}",
            weights.version, weights.collaborative, weights.content
        );
    }
    Ok(())
}

/// Handle the 'user' command
fn handle_user(data_index: &DataIndex, user_id: UserId) -> Result<()> {
    let user = data_index
        .get_user(user_id)
        .ok_or_else(|| anyhow!("User {} not found", user_id))?;
    let context = build_user_context(data_index, user_id);

    println!("{}", format!("User ID: {}", user_id).bold().blue());
    println!("{}Nickname: {}", "• ".green(), user.nickname);
    println!("{}Age: {:?}", "• ".green(), context.age);
    println!("{}Region: {}", "• ".green(), context.region.as_deref().unwrap_or("-"));
    println!("{}Game types: {}", "• ".green(), context.game_types.join(", "));
    println!("{}Tags: {}", "• ".green(), context.tags.join(", "));
    if let Some(range) = context.price_range {
        println!("{}Price range: {:?} - {:?}", "• ".green(), range.min, range.max);
    }

    let behaviors = data_index.get_user_behaviors(user_id);
    let count = |kind: BehaviorKind| behaviors.iter().filter(|b| b.kind == kind).count();
    println!(
        "{}Behaviors: {} ({} views, {} favorites, {} orders)",
        "• ".cyan(),
        behaviors.len(),
        count(BehaviorKind::View),
        count(BehaviorKind::Favorite),
        count(BehaviorKind::Order)
    );

    let orders = data_index.get_user_orders(user_id);
    let rated: Vec<f64> = orders.iter().filter_map(|o| o.rating).collect();
    let avg_rating = if rated.is_empty() {
        0.0
    } else {
        rated.iter().sum::<f64>() / rated.len() as f64
    };
    println!("{}Orders: {}", "• ".cyan(), orders.len());
    println!("{}Average rating given: {:.2}", "• ".cyan(), avg_rating);

    println!("Masters ordered from:");
    for master_id in context.ordered_masters.iter().take(10) {
        if let Some(master) = data_index.get_master(*master_id) {
            println!(
                "  - {} [{}] (score {:.1})",
                master.nickname,
                master.game_types.join(", "),
                master.score.unwrap_or(0.0)
            );
        }
    }
    Ok(())
}

/// Handle the 'benchmark' command
async fn handle_benchmark(
    orchestrator: &RecommendationOrchestrator,
    requests: usize,
    concurrent: usize,
) -> Result<()> {
    let all_users = orchestrator.data_index().all_user_ids();
    if all_users.is_empty() || requests == 0 {
        return Err(anyhow!("Nothing to benchmark: no users or zero requests"));
    }

    let mut rng = rand::rng();
    let user_ids: Vec<UserId> = (0..requests)
        .filter_map(|_| all_users.choose(&mut rng).copied())
        .collect();

    info!(requests, concurrent, "Starting benchmark");

    // Run in waves of `concurrent` requests
    let wall = Instant::now();
    let mut timings: Vec<Duration> = Vec::with_capacity(requests);
    for wave in user_ids.chunks(concurrent.max(1)) {
        let mut handles = vec![];
        for &user in wave {
            let orchestrator = orchestrator.clone();
            handles.push(tokio::spawn(async move {
                let start = Instant::now();
                orchestrator.recommend(user, None, 20).await?;
                Ok::<_, anyhow::Error>(start.elapsed())
            }));
        }
        for handle in handles {
            timings.push(handle.await??);
        }
    }
    let total_time = wall.elapsed();

    timings.sort();
    let percentile = |p: f64| timings[((timings.len() as f64 * p) as usize).min(timings.len() - 1)];
    let avg_latency = timings.iter().sum::<Duration>() / timings.len() as u32;
    let throughput = timings.len() as f64 / total_time.as_secs_f64();

    println!("{}", "Benchmark results:".bold().blue());
    println!("Total time: {:?}", total_time);
    println!("Average latency: {:?}", avg_latency);
    println!("P50 latency: {:?}", percentile(0.50));
    println!("P95 latency: {:?}", percentile(0.95));
    println!("P99 latency: {:?}", percentile(0.99));
    println!("Throughput: {:.2} requests/second", throughput);

    Ok(())
}

/// Format and print recommendations
fn print_recommendations(recommendations: &[MasterRecommendation], explain: bool) {
    if recommendations.is_empty() {
        println!("  (nothing to show)");
    }
    for (i, rec) in recommendations.iter().enumerate() {
        let price = rec
            .price
            .map(|p| format!("{:.0}", p))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}. {} [{}] rating {:.1}, price {} - Score: {:.3}",
            (i + 1).to_string().green(),
            rec.nickname,
            rec.game_types.join(", "),
            rec.rating.unwrap_or(0.0),
            price,
            rec.score
        );
        if explain {
            println!("   {:?}: {}", rec.source, rec.explanation);
        }
    }
}
