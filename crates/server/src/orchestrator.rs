//! # Recommendation Orchestrator
//!
//! This module coordinates the online pipeline:
//! 1. Build the user context
//! 2. Recall candidates (preference, similar users, algorithm, popularity)
//! 3. Rank them by relevance, diversity and popularity
//! 4. Filter (validity, game, preference, business rules) and rerank for
//!    category diversity
//! 5. Cache the full list and serve it page by page
//!
//! Offline operations (training and evaluation) go to the configured
//! algorithm. Training clears the response cache. Feature refreshes evict the
//! cached lists they can affect.
//!
//! CPU-bound stages run under `spawn_blocking` so the async runtime never
//! stalls on rayon work.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use algorithms::{RecommendAlgorithm, RecommendMetrics, TrainingReport, create_algorithm};
use data_loader::{DataIndex, DataSource, GameId, MasterId, UserId};
use pipeline::filters::BusinessRules;
use pipeline::{FilterService, RankService};
use sources::user_context::build_user_context;
use sources::{
    Candidate, CandidateSource, PopularityRecall, PreferenceRecall, RecallService, RecallStrategy,
    SimilarUserRecall, UserContext,
};

use crate::algorithm_recall::AlgorithmRecall;
use crate::cache::{InMemoryCache, NoopCache, RecommendCache};
use crate::config::EngineConfig;
use crate::error::Result;

/// One recommended master, as returned to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterRecommendation {
    pub master_id: MasterId,
    pub nickname: String,
    pub game_types: Vec<String>,
    pub rating: Option<f64>,
    pub price: Option<f64>,
    pub score: f64,
    pub source: CandidateSource,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecommendation {
    pub game_id: GameId,
    pub name: String,
    pub game_type: String,
    pub score: f64,
}

/// One page of a cached recommendation list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationPage {
    pub items: Vec<MasterRecommendation>,
    /// 1-based page number
    pub page: usize,
    pub limit: usize,
    /// Length of the full list
    pub total: usize,
}

/// What to compare in a similarity request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityQuery {
    UserMaster { user_id: UserId, master_id: MasterId },
    UserGame { user_id: UserId, game_id: GameId },
    Masters(MasterId, MasterId),
    Games(GameId, GameId),
}

/// Main orchestrator that coordinates the recommendation pipeline
#[derive(Clone)]
pub struct RecommendationOrchestrator {
    data_index: Arc<DataIndex>,
    config: Arc<EngineConfig>,
    algorithm: Arc<dyn RecommendAlgorithm>,
    recall: Arc<RecallService>,
    rank: RankService,
    filter: Arc<FilterService>,
    cache: Arc<dyn RecommendCache>,
}

impl RecommendationOrchestrator {
    /// Wire every component from the config.
    ///
    /// The algorithm starts untrained; its caches fill on first use until
    /// `train_model` builds a full generation.
    pub fn new(data_index: Arc<DataIndex>, config: EngineConfig) -> Self {
        let algorithm = create_algorithm(
            config.algorithm,
            data_index.clone(),
            config.evaluation.clone(),
        );

        let recall_config = &config.recall;
        let recall = RecallService::new()
            .add_strategy(PreferenceRecall::new(
                data_index.clone(),
                recall_config.preference_limit,
            ))
            .add_strategy(
                SimilarUserRecall::new(data_index.clone())
                    .with_threshold(recall_config.similar_user_threshold)
                    .with_max_users(recall_config.similar_user_limit)
                    .with_masters_per_user(recall_config.masters_per_similar_user),
            )
            .add_strategy(AlgorithmRecall::new(
                algorithm.clone(),
                recall_config.algorithm_limit,
            ))
            .add_strategy(PopularityRecall::new(
                data_index.clone(),
                recall_config.popularity_limit,
            ));

        let rank = RankService::with_weights(data_index.clone(), config.rank.clone());
        let filter = FilterService::new(data_index.clone(), &config.filter);
        let cache: Arc<dyn RecommendCache> = if config.cache.enabled {
            Arc::new(InMemoryCache::new())
        } else {
            Arc::new(NoopCache)
        };

        info!(
            algorithm = %config.algorithm,
            recall = ?recall.strategy_names(),
            filters = ?filter.stage_names(),
            "Orchestrator ready"
        );

        Self {
            data_index,
            config: Arc::new(config),
            algorithm,
            recall: Arc::new(recall),
            rank,
            filter: Arc::new(filter),
            cache,
        }
    }

    /// Load the entity store from `source` and wire the engine on top of it
    pub async fn load(source: Arc<dyn DataSource>, config: EngineConfig) -> Result<Self> {
        let start_time = Instant::now();
        info!("Loading entity store from {}", source.describe());

        let data_index = tokio::task::spawn_blocking(move || source.load()).await??;
        let counts = data_index.counts();
        info!(
            users = counts.users,
            masters = counts.masters,
            games = counts.games,
            orders = counts.orders,
            "Entity store loaded in {:.2?}",
            start_time.elapsed()
        );

        Ok(Self::new(Arc::new(data_index), config))
    }

    /// Replace the response cache (builder pattern)
    pub fn with_cache(mut self, cache: Arc<dyn RecommendCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn data_index(&self) -> &Arc<DataIndex> {
        &self.data_index
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn algorithm(&self) -> &Arc<dyn RecommendAlgorithm> {
        &self.algorithm
    }

    /// Run a CPU-bound closure on the blocking pool
    async fn blocking<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce(Self) -> T + Send + 'static,
        T: Send + 'static,
    {
        let this = self.clone();
        Ok(tokio::task::spawn_blocking(move || work(this)).await?)
    }

    /// Main entry point: the best `limit` masters for a user.
    ///
    /// Ordered best first, distinct, at most `limit` long. Unknown users
    /// still get popular masters.
    pub async fn recommend(
        &self,
        user_id: UserId,
        game_id: Option<GameId>,
        limit: usize,
    ) -> Result<Vec<MasterRecommendation>> {
        Ok(self.recommend_page(user_id, game_id, 1, limit).await?.items)
    }

    /// One page of the full recommendation list; `page` is 1-based
    pub async fn recommend_page(
        &self,
        user_id: UserId,
        game_id: Option<GameId>,
        page: usize,
        limit: usize,
    ) -> Result<RecommendationPage> {
        let page = page.max(1);
        if limit == 0 {
            return Ok(RecommendationPage {
                items: Vec::new(),
                page,
                limit,
                total: 0,
            });
        }

        let full = self.full_list(user_id, game_id).await?;
        let total = full.len();
        let items = full
            .into_iter()
            .skip((page - 1).saturating_mul(limit))
            .take(limit)
            .collect();

        Ok(RecommendationPage {
            items,
            page,
            limit,
            total,
        })
    }

    /// The whole filtered list, from the cache when fresh
    async fn full_list(
        &self,
        user_id: UserId,
        game_id: Option<GameId>,
    ) -> Result<Vec<MasterRecommendation>> {
        let key = cache_key(user_id, game_id);

        match self.cache.get(&key) {
            Ok(Some(cached)) => match serde_json::from_str(&cached) {
                Ok(list) => {
                    info!("Cache hit for {}", key);
                    return Ok(list);
                }
                Err(e) => warn!(key = %key, error = %e, "Unreadable cache entry, recomputing"),
            },
            Ok(None) => {}
            Err(e) => warn!(key = %key, error = %e, "Cache read failed, recomputing"),
        }

        let list = self
            .blocking(move |this| this.run_pipeline(user_id, game_id))
            .await?;

        match serde_json::to_string(&list) {
            Ok(json) => {
                if let Err(e) = self.cache.set(&key, json, self.config.cache.ttl()) {
                    warn!(key = %key, error = %e, "Cache write failed");
                }
            }
            Err(e) => warn!(key = %key, error = %e, "Could not serialize recommendations"),
        }

        Ok(list)
    }

    /// Recall → rank → filter for one request
    #[instrument(skip(self))]
    fn run_pipeline(&self, user_id: UserId, game_id: Option<GameId>) -> Vec<MasterRecommendation> {
        let start_time = Instant::now();

        let context = build_user_context(&self.data_index, user_id).with_game(game_id);
        info!(
            has_history = context.has_history(),
            "Built user context for user {}", user_id
        );

        let candidates = self.recall.recall(&context);
        info!("Recalled {} candidates", candidates.len());

        let ranked = self.rank.rank(candidates, &context);
        info!("Ranked {} candidates", ranked.len());

        let filtered = self.filter.filter(ranked, &context);
        info!("Filtering complete, {} candidates remain", filtered.len());

        let recommendations = self.enrich(filtered, &context);
        info!(
            "Total time to recommend for user {}: {:.2?}",
            user_id,
            start_time.elapsed()
        );
        recommendations
    }

    fn enrich(&self, candidates: Vec<Candidate>, context: &UserContext) -> Vec<MasterRecommendation> {
        candidates
            .into_iter()
            .filter_map(|candidate| {
                let master = self.data_index.get_master(candidate.master_id)?;
                Some(MasterRecommendation {
                    master_id: master.id,
                    nickname: master.nickname.clone(),
                    game_types: master.game_types.clone(),
                    rating: master.score,
                    price: master.price,
                    score: candidate.score,
                    source: candidate.source,
                    explanation: explain(&candidate, master.primary_category(), context),
                })
            })
            .collect()
    }

    /// Games the configured algorithm rates highest for a user
    pub async fn recommend_games(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<GameRecommendation>> {
        self.blocking(move |this| {
            this.algorithm
                .recommend_games(user_id, limit)
                .into_iter()
                .filter_map(|item| {
                    let game = this.data_index.get_game(item.id)?;
                    Some(GameRecommendation {
                        game_id: game.id,
                        name: game.name.clone(),
                        game_type: game.game_type.clone(),
                        score: item.score,
                    })
                })
                .collect()
        })
        .await
    }

    /// Popular masters for everyone: popularity recall, ranked, business rules applied
    pub async fn hot_masters(&self, limit: usize) -> Result<Vec<MasterRecommendation>> {
        self.blocking(move |this| {
            let context = UserContext::default();
            let popularity =
                PopularityRecall::new(this.data_index.clone(), this.config.recall.popularity_limit);
            let candidates = popularity.recall(&context).unwrap_or_else(|e| {
                warn!(error = %e, "Popularity recall failed");
                Vec::new()
            });

            let rules: &BusinessRules = &this.config.filter.business;
            let mut ranked: Vec<Candidate> = this
                .rank
                .rank(candidates, &context)
                .into_iter()
                .filter(|c| {
                    this.data_index
                        .get_master(c.master_id)
                        .is_some_and(|m| rules.allows(m))
                })
                .collect();
            ranked.truncate(limit);
            this.enrich(ranked, &context)
        })
        .await
    }

    /// Similarity in [0, 1] from the configured algorithm
    pub async fn similarity(&self, query: SimilarityQuery) -> Result<f64> {
        self.blocking(move |this| match query {
            SimilarityQuery::UserMaster { user_id, master_id } => {
                this.algorithm.user_master_similarity(user_id, master_id)
            }
            SimilarityQuery::UserGame { user_id, game_id } => {
                this.algorithm.user_game_similarity(user_id, game_id)
            }
            SimilarityQuery::Masters(a, b) => this.algorithm.master_similarity(a, b),
            SimilarityQuery::Games(a, b) => this.algorithm.game_similarity(a, b),
        })
        .await
    }

    /// Build and install a new model generation, then drop cached responses
    pub async fn train_model(&self) -> Result<TrainingReport> {
        let report = self.blocking(|this| this.algorithm.train_model()).await??;

        self.clear_cache("training");
        info!(
            algorithm = %report.algorithm,
            generation = report.generation,
            "Training complete in {} ms",
            report.elapsed_ms
        );
        Ok(report)
    }

    /// Recompute one user's features and drop that user's cached lists
    pub async fn refresh_user_features(&self, user_id: UserId) -> Result<()> {
        self.blocking(move |this| this.algorithm.update_user_features(user_id))
            .await?;

        let keys = std::iter::once(None)
            .chain(self.data_index.all_game_ids().into_iter().map(Some))
            .map(|game_id| cache_key(user_id, game_id));
        for key in keys {
            if let Err(e) = self.cache.remove(&key) {
                warn!(key = %key, error = %e, "Failed to evict cached recommendations");
            }
        }
        info!("Refreshed features for user {}", user_id);
        Ok(())
    }

    /// Recompute one master's features.
    ///
    /// Any cached list may hold the master, so the whole cache goes.
    pub async fn refresh_master_features(&self, master_id: MasterId) -> Result<()> {
        self.blocking(move |this| this.algorithm.update_master_features(master_id))
            .await?;
        self.clear_cache("master refresh");
        info!("Refreshed features for master {}", master_id);
        Ok(())
    }

    pub async fn refresh_game_features(&self, game_id: GameId) -> Result<()> {
        self.blocking(move |this| this.algorithm.update_game_features(game_id))
            .await?;
        self.clear_cache("game refresh");
        info!("Refreshed features for game {}", game_id);
        Ok(())
    }

    fn clear_cache(&self, reason: &str) {
        if let Err(e) = self.cache.clear() {
            warn!(error = %e, "Failed to clear response cache after {}", reason);
        }
    }

    pub async fn evaluate_model(&self) -> Result<RecommendMetrics> {
        let metrics = self.blocking(|this| this.algorithm.evaluate_model()).await??;
        info!(
            overall = metrics.overall_score(),
            quality = metrics.quality_score(),
            "Evaluation complete"
        );
        Ok(metrics)
    }
}

pub fn cache_key(user_id: UserId, game_id: Option<GameId>) -> String {
    match game_id {
        Some(game_id) => format!("recommend:{}:{}", user_id, game_id),
        None => format!("recommend:{}", user_id),
    }
}

fn explain(candidate: &Candidate, category: Option<&str>, context: &UserContext) -> String {
    let reason = match candidate.source {
        CandidateSource::Preference => "matches the games you play",
        CandidateSource::SimilarUsers => "chosen by players like you",
        CandidateSource::Popularity => "popular right now",
        CandidateSource::Algorithm => "fits your history",
    };
    let repeat = if context.ordered_masters.contains(&candidate.master_id) {
        ", ordered before"
    } else {
        ""
    };
    match category {
        Some(category) => format!("{} ({}{}), score {:.2}", reason, category, repeat, candidate.score),
        None => format!("{}{}, score {:.2}", reason, repeat, candidate.score),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use data_loader::{
        Game, GameMaster, JsonDirSource, MasterGame, MasterStatus, Order, User, UserProfile,
    };
    use std::collections::HashSet;
    use std::fs;
    use std::time::Duration;

    // ============================================================================
    // Test Fixtures
    // ============================================================================

    fn master(id: MasterId, game_type: &str, game_id: GameId, score: f64, orders: u32) -> GameMaster {
        GameMaster {
            id,
            nickname: format!("master{}", id),
            gender: None,
            age: None,
            region: Some("north".to_string()),
            level: None,
            score: Some(score),
            order_count: orders,
            status: MasterStatus::Online,
            price: Some(60.0),
            game_types: vec![game_type.to_string()],
            games: vec![MasterGame {
                game_id,
                game_type: Some(game_type.to_string()),
                proficiency: None,
            }],
            tags: vec![],
            created_at: None,
            updated_at: None,
        }
    }

    fn user(id: UserId) -> User {
        User {
            id,
            nickname: format!("user{}", id),
            gender: None,
            age: None,
            region: None,
            registered_at: None,
        }
    }

    fn moba_player(index: &mut DataIndex, id: UserId) {
        index.insert_user(user(id));
        index.insert_profile(UserProfile {
            user_id: id,
            age: Some(25),
            region: Some("north".to_string()),
            game_types: vec!["moba".to_string()],
            ..Default::default()
        });
    }

    fn order(index: &mut DataIndex, id: u64, user_id: UserId, master_id: MasterId, day: u32) {
        index.insert_order(Order {
            id,
            user_id,
            master_id,
            game_id: Some(100),
            amount: 60.0,
            rating: Some(5.0),
            created_at: Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap(),
        });
    }

    /// Two moba players, an anonymous user, five masters:
    /// 10/11 moba, 12 fps, 13 suspended, 14 below the business rules
    fn build_test_data_index() -> Arc<DataIndex> {
        let mut index = DataIndex::new();
        moba_player(&mut index, 1);
        moba_player(&mut index, 2);
        index.insert_user(user(3));

        index.insert_game(Game {
            id: 100,
            name: "Arena".to_string(),
            game_type: "moba".to_string(),
            created_at: None,
            updated_at: None,
        });
        index.insert_game(Game {
            id: 200,
            name: "Sights".to_string(),
            game_type: "fps".to_string(),
            created_at: None,
            updated_at: None,
        });

        index.insert_master(master(10, "moba", 100, 4.8, 120));
        index.insert_master(master(11, "moba", 100, 4.6, 80));
        index.insert_master(master(12, "fps", 200, 4.9, 200));
        let mut suspended = master(13, "moba", 100, 4.7, 50);
        suspended.status = MasterStatus::Suspended;
        index.insert_master(suspended);
        index.insert_master(master(14, "moba", 100, 3.0, 5));

        order(&mut index, 1, 2, 10, 1);
        order(&mut index, 2, 2, 11, 2);
        order(&mut index, 3, 1, 10, 3);
        index.build_secondary_indices();
        Arc::new(index)
    }

    fn build_test_orchestrator() -> RecommendationOrchestrator {
        RecommendationOrchestrator::new(build_test_data_index(), EngineConfig::default())
    }

    fn ids(recommendations: &[MasterRecommendation]) -> Vec<MasterId> {
        recommendations.iter().map(|r| r.master_id).collect()
    }

    // ============================================================================
    // Online pipeline
    // ============================================================================

    #[tokio::test]
    async fn test_recommend_applies_preferences_and_business_rules() {
        let orchestrator = build_test_orchestrator();
        let recommendations = orchestrator.recommend(1, None, 10).await.unwrap();

        let found: HashSet<_> = ids(&recommendations).into_iter().collect();
        assert_eq!(found, HashSet::from([10, 11]));
        assert!(recommendations.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[tokio::test]
    async fn test_recommend_respects_limit_and_is_distinct() {
        let orchestrator = build_test_orchestrator();
        let recommendations = orchestrator.recommend(99, None, 2).await.unwrap();
        assert_eq!(recommendations.len(), 2);

        let ids = ids(&recommendations);
        let unique: HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());

        assert!(orchestrator.recommend(1, None, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_user_gets_popular_masters() {
        let orchestrator = build_test_orchestrator();
        let recommendations = orchestrator.recommend(9999, None, 10).await.unwrap();

        let found: HashSet<_> = ids(&recommendations).into_iter().collect();
        assert_eq!(found, HashSet::from([10, 11, 12]));
    }

    #[tokio::test]
    async fn test_game_restriction() {
        let orchestrator = build_test_orchestrator();
        let recommendations = orchestrator.recommend(3, Some(200), 10).await.unwrap();
        assert_eq!(ids(&recommendations), vec![12]);
    }

    #[tokio::test]
    async fn test_pages_share_one_list() {
        let orchestrator = build_test_orchestrator();
        let first = orchestrator.recommend_page(9999, None, 1, 2).await.unwrap();
        let second = orchestrator.recommend_page(9999, None, 2, 2).await.unwrap();

        assert_eq!(first.total, 3);
        assert_eq!(first.items.len(), 2);
        assert_eq!(second.items.len(), 1);
        assert!(!ids(&first.items).contains(&second.items[0].master_id));

        let beyond = orchestrator.recommend_page(9999, None, 5, 2).await.unwrap();
        assert!(beyond.items.is_empty());
        assert_eq!(beyond.total, 3);
    }

    #[tokio::test]
    async fn test_cache_is_filled_and_cleared_by_training() {
        let cache = Arc::new(InMemoryCache::new());
        let orchestrator = build_test_orchestrator().with_cache(cache.clone());

        let first = orchestrator.recommend(1, None, 10).await.unwrap();
        assert!(cache.get("recommend:1").unwrap().is_some());
        let second = orchestrator.recommend(1, None, 10).await.unwrap();
        assert_eq!(ids(&first), ids(&second));

        orchestrator.train_model().await.unwrap();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_user_refresh_recomputes_cached_list() {
        let cache = Arc::new(InMemoryCache::new());
        let orchestrator = build_test_orchestrator().with_cache(cache.clone());
        let ttl = Duration::from_secs(60);

        // Stale lists left over from before the user's profile changed
        cache.set("recommend:1", "[]".to_string(), ttl).unwrap();
        cache.set("recommend:1:100", "[]".to_string(), ttl).unwrap();
        cache.set("recommend:2", "[]".to_string(), ttl).unwrap();
        assert!(orchestrator.recommend(1, None, 10).await.unwrap().is_empty());

        orchestrator.refresh_user_features(1).await.unwrap();
        assert!(cache.get("recommend:1").unwrap().is_none());
        assert!(cache.get("recommend:1:100").unwrap().is_none());
        assert!(cache.get("recommend:2").unwrap().is_some());

        let fresh: HashSet<_> = ids(&orchestrator.recommend(1, None, 10).await.unwrap())
            .into_iter()
            .collect();
        assert_eq!(fresh, HashSet::from([10, 11]));
        assert!(cache.get("recommend:1").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_master_and_game_refresh_clear_cache() {
        let cache = Arc::new(InMemoryCache::new());
        let orchestrator = build_test_orchestrator().with_cache(cache.clone());

        orchestrator.recommend(1, None, 10).await.unwrap();
        orchestrator.recommend(2, None, 10).await.unwrap();
        assert_eq!(cache.len(), 2);

        orchestrator.refresh_master_features(10).await.unwrap();
        assert!(cache.is_empty());

        orchestrator.recommend(1, None, 10).await.unwrap();
        orchestrator.refresh_game_features(100).await.unwrap();
        assert!(cache.is_empty());

        // Unknown IDs are a no-op for the model
        orchestrator.refresh_master_features(9999).await.unwrap();
    }

    #[tokio::test]
    async fn test_hot_masters_pass_business_rules() {
        let orchestrator = build_test_orchestrator();
        let hot = orchestrator.hot_masters(10).await.unwrap();

        let found: HashSet<_> = ids(&hot).into_iter().collect();
        assert_eq!(found, HashSet::from([10, 11, 12]));
        assert!(hot.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(orchestrator.hot_masters(1).await.unwrap().len(), 1);
    }

    // ============================================================================
    // Algorithm operations
    // ============================================================================

    #[tokio::test]
    async fn test_similarity_is_bounded_and_symmetric() {
        let orchestrator = build_test_orchestrator();
        let ab = orchestrator
            .similarity(SimilarityQuery::Masters(10, 11))
            .await
            .unwrap();
        let ba = orchestrator
            .similarity(SimilarityQuery::Masters(11, 10))
            .await
            .unwrap();
        assert_eq!(ab, ba);
        assert!((0.0..=1.0).contains(&ab));

        let unknown = orchestrator
            .similarity(SimilarityQuery::UserMaster {
                user_id: 9999,
                master_id: 10,
            })
            .await
            .unwrap();
        assert_eq!(unknown, 0.0);
    }

    #[tokio::test]
    async fn test_train_and_evaluate() {
        let orchestrator = build_test_orchestrator();
        let report = orchestrator.train_model().await.unwrap();
        assert_eq!(report.generation, 1);
        assert!(report.hybrid_weights.is_some());

        let metrics = orchestrator.evaluate_model().await.unwrap();
        assert!((0.0..=1.0).contains(&metrics.precision()));
        assert!(metrics.overall_score().is_finite());
    }

    #[tokio::test]
    async fn test_game_recommendations_only_known_games() {
        let orchestrator = build_test_orchestrator();
        let games = orchestrator.recommend_games(1, 10).await.unwrap();
        assert!(games.iter().all(|g| g.game_id == 100 || g.game_id == 200));
        assert!(games.len() <= 2);
    }

    #[test]
    fn test_cache_keys() {
        assert_eq!(cache_key(7, None), "recommend:7");
        assert_eq!(cache_key(7, Some(3)), "recommend:7:3");
    }

    // ============================================================================
    // Loading
    // ============================================================================

    #[tokio::test]
    async fn test_load_from_json_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("users.json"), r#"[{"id": 1}]"#).unwrap();
        fs::write(
            dir.path().join("masters.json"),
            r#"[{"id": 10, "nickname": "ace", "score": 4.8, "order_count": 40,
                 "status": "online", "price": 50.0, "game_types": ["moba"],
                 "games": [{"game_id": 100}]}]"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("games.json"),
            r#"[{"id": 100, "name": "Arena", "game_type": "moba"}]"#,
        )
        .unwrap();

        let source = Arc::new(JsonDirSource::new(dir.path()));
        let orchestrator = RecommendationOrchestrator::load(source, EngineConfig::default())
            .await
            .unwrap();

        let recommendations = orchestrator.recommend(1, None, 5).await.unwrap();
        assert_eq!(ids(&recommendations), vec![10]);
    }

    #[tokio::test]
    async fn test_missing_dataset_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(JsonDirSource::new(dir.path().join("absent")));
        let result = RecommendationOrchestrator::load(source, EngineConfig::default()).await;
        assert!(matches!(result, Err(crate::error::RecommendError::Storage(_))));
    }
}
