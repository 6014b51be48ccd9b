//! Cosine similarity with symmetric, lazily populated caches.
//!
//! ## Caching
//! Pairs are keyed by `(min, max)`, so `(a, b)` and `(b, a)` share one slot
//! and symmetry holds structurally. `get_or_compute` goes through the DashMap
//! entry API: the shard lock is held while computing, so a key is computed
//! at most once even under concurrent callers.

use dashmap::DashMap;
use data_loader::TagId;
use std::collections::BTreeMap;
use std::hash::Hash;
use tracing::warn;

/// Cosine of two dense vectors, clamped into [0, 1].
///
/// Zero-norm input, mismatched lengths and non-finite results give 0.0.
/// Identical non-zero vectors give exactly 1.0.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    if a == b && a.iter().all(|v| v.is_finite()) && a.iter().any(|v| *v != 0.0) {
        return 1.0;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0, 0.0, 0.0);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    finish(dot, norm_a, norm_b)
}

/// Cosine of two sparse tag-weight maps, clamped into [0, 1].
///
/// Iterates the smaller map; BTreeMap keeps the summation order fixed.
pub fn sparse_cosine(a: &BTreeMap<TagId, f64>, b: &BTreeMap<TagId, f64>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b && a.values().all(|v| v.is_finite()) && a.values().any(|v| *v != 0.0) {
        return 1.0;
    }

    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let dot: f64 = small
        .iter()
        .filter_map(|(tag, w)| large.get(tag).map(|v| w * v))
        .sum();
    let norm_a: f64 = a.values().map(|w| w * w).sum();
    let norm_b: f64 = b.values().map(|w| w * w).sum();

    finish(dot, norm_a, norm_b)
}

fn finish(dot: f64, norm_a: f64, norm_b: f64) -> f64 {
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let cosine = dot / (norm_a.sqrt() * norm_b.sqrt());
    if !cosine.is_finite() {
        warn!(cosine, "Non-finite cosine similarity, using 0.0");
        return 0.0;
    }
    cosine.clamp(0.0, 1.0)
}

// =============================================================================
// Caches
// =============================================================================

/// Symmetric pair cache: unordered pair of IDs → similarity
#[derive(Debug)]
pub struct SimilarityCache<K: Eq + Hash> {
    pairs: DashMap<(K, K), f64>,
}

impl<K> SimilarityCache<K>
where
    K: Copy + Ord + Hash,
{
    pub fn new() -> Self {
        Self {
            pairs: DashMap::new(),
        }
    }

    fn key(a: K, b: K) -> (K, K) {
        if a <= b { (a, b) } else { (b, a) }
    }

    pub fn get(&self, a: K, b: K) -> Option<f64> {
        self.pairs.get(&Self::key(a, b)).map(|v| *v)
    }

    /// Return the cached value, computing and storing it on a miss.
    pub fn get_or_compute(&self, a: K, b: K, compute: impl FnOnce() -> f64) -> f64 {
        *self.pairs.entry(Self::key(a, b)).or_insert_with(compute)
    }

    /// Drop every pair that touches `id`
    pub fn invalidate(&self, id: K) {
        self.pairs.retain(|(a, b), _| *a != id && *b != id);
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Snapshot of every cached value (order unspecified)
    pub fn values(&self) -> Vec<f64> {
        self.pairs.iter().map(|entry| *entry.value()).collect()
    }
}

impl<K: Copy + Ord + Hash> Default for SimilarityCache<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-entity feature vector cache
#[derive(Debug)]
pub struct VectorCache<K: Eq + Hash> {
    vectors: DashMap<K, Vec<f64>>,
}

impl<K> VectorCache<K>
where
    K: Copy + Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            vectors: DashMap::new(),
        }
    }

    pub fn get_or_compute(&self, id: K, compute: impl FnOnce() -> Vec<f64>) -> Vec<f64> {
        self.vectors.entry(id).or_insert_with(compute).clone()
    }

    pub fn invalidate(&self, id: K) {
        self.vectors.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

impl<K: Copy + Eq + Hash> Default for VectorCache<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Vector cache plus pair cache for one entity kind.
///
/// Vectors come from the `extract` callback on first use and stay cached
/// until invalidated.
#[derive(Debug)]
pub struct SimilarityEngine<K: Eq + Hash> {
    vectors: VectorCache<K>,
    pairs: SimilarityCache<K>,
}

impl<K> SimilarityEngine<K>
where
    K: Copy + Ord + Hash,
{
    pub fn new() -> Self {
        Self {
            vectors: VectorCache::new(),
            pairs: SimilarityCache::new(),
        }
    }

    pub fn vector(&self, id: K, extract: &dyn Fn(K) -> Vec<f64>) -> Vec<f64> {
        self.vectors.get_or_compute(id, || extract(id))
    }

    pub fn similarity(&self, a: K, b: K, extract: &dyn Fn(K) -> Vec<f64>) -> f64 {
        self.pairs.get_or_compute(a, b, || {
            let va = self.vector(a, extract);
            let vb = self.vector(b, extract);
            cosine_similarity(&va, &vb)
        })
    }

    /// Forget the vector of `id` and every pair that involves it
    pub fn invalidate(&self, id: K) {
        self.vectors.invalidate(id);
        self.pairs.invalidate(id);
    }

    pub fn vectors(&self) -> &VectorCache<K> {
        &self.vectors
    }

    pub fn pairs(&self) -> &SimilarityCache<K> {
        &self.pairs
    }
}

impl<K: Copy + Ord + Hash> Default for SimilarityEngine<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_cosine_identity_and_symmetry() {
        let a = [0.2, 0.8, 0.0, 1.0];
        let b = [0.9, 0.1, 0.5, 0.3];

        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-12);
        assert_eq!(cosine_similarity(&a, &b), cosine_similarity(&b, &a));
    }

    #[test]
    fn test_identical_vectors_are_exactly_one() {
        let a = [0.1, 0.7, 0.3, 0.9, 0.0, 0.4, 0.2, 0.6];
        let b = a;
        assert_eq!(cosine_similarity(&a, &b), 1.0);
    }

    #[test]
    fn test_cosine_zero_vector() {
        let zero = [0.0; 4];
        assert_eq!(cosine_similarity(&zero, &[1.0, 0.0, 0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&zero, &zero), 0.0);
    }

    #[test]
    fn test_cosine_clamps_negative_and_nan() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[f64::NAN, 1.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_sparse_cosine() {
        let a = BTreeMap::from([(1, 0.5), (2, 0.5)]);
        let b = BTreeMap::from([(2, 0.5), (3, 0.5)]);

        assert!((sparse_cosine(&a, &b) - 0.5).abs() < 1e-12);
        assert!((sparse_cosine(&a, &a) - 1.0).abs() < 1e-12);
        assert_eq!(sparse_cosine(&a, &BTreeMap::new()), 0.0);
    }

    #[test]
    fn test_cache_is_symmetric_and_computes_once() {
        let cache = SimilarityCache::new();
        let calls = AtomicUsize::new(0);

        let first = cache.get_or_compute(2u64, 1, || {
            calls.fetch_add(1, Ordering::SeqCst);
            0.7
        });
        let second = cache.get_or_compute(1u64, 2, || {
            calls.fetch_add(1, Ordering::SeqCst);
            0.1
        });

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_invalidate_drops_touching_pairs() {
        let cache = SimilarityCache::new();
        for (a, b) in [(1u64, 2), (1, 3), (2, 3)] {
            cache.get_or_compute(a, b, || 0.5);
        }

        cache.invalidate(1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(3, 2), Some(0.5));
    }

    #[test]
    fn test_engine_concurrent_access() {
        let engine = Arc::new(SimilarityEngine::<u64>::new());
        let extract = |id: u64| vec![id as f64, 1.0];

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let engine = engine.clone();
                std::thread::spawn(move || engine.similarity(1, 2, &extract))
            })
            .collect();
        let results: Vec<f64> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(results.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(engine.pairs().len(), 1);
        assert_eq!(engine.vectors().len(), 2);

        engine.invalidate(2);
        assert!(engine.pairs().is_empty());
        assert_eq!(engine.vectors().len(), 1);
    }
}
