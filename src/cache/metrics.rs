//! Atomic counters for the cache engine. §5: "Global metrics: integer
//! counters, atomic-increment semantics required; may be read without lock."

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::category::{Category, ALL_CATEGORIES};

#[derive(Debug, Default)]
struct CategoryCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    evictions: AtomicU64,
}

#[derive(Debug)]
pub struct CacheMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    evictions: AtomicU64,
    cleanups: AtomicU64,
    preloads_success: AtomicU64,
    preloads_wasted: AtomicU64,
    prediction_correct: AtomicU64,
    per_category: HashMap<Category, CategoryCounters>,
}

impl Default for CacheMetrics {
    fn default() -> Self {
        let mut per_category = HashMap::new();
        for c in ALL_CATEGORIES {
            per_category.insert(c, CategoryCounters::default());
        }
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            sets: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            cleanups: AtomicU64::new(0),
            preloads_success: AtomicU64::new(0),
            preloads_wasted: AtomicU64::new(0),
            prediction_correct: AtomicU64::new(0),
            per_category,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CategorySnapshot {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub evictions: u64,
    pub size: u64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub evictions: u64,
    pub cleanups: u64,
    pub preloads_success: u64,
    pub preloads_wasted: u64,
    pub prediction_correct: u64,
    pub hit_rate: f64,
    pub per_category: HashMap<String, CategorySnapshot>,
}

impl CacheMetrics {
    pub fn record_hit(&self, category: Category) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        self.per_category[&category].hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self, category: Category) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        self.per_category[&category].misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_set(&self, category: Category) {
        self.sets.fetch_add(1, Ordering::Relaxed);
        self.per_category[&category].sets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self, category: Category) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
        self.per_category[&category].evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cleanup(&self) {
        self.cleanups.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_preload_success(&self) {
        self.preloads_success.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_preload_wasted(&self) {
        self.preloads_wasted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_prediction_correct(&self) {
        self.prediction_correct.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, sizes: &HashMap<Category, u64>) -> MetricsSnapshot {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let hit_rate = if hits + misses == 0 {
            0.0
        } else {
            hits as f64 / (hits + misses) as f64
        };
        let per_category = ALL_CATEGORIES
            .iter()
            .map(|c| {
                let counters = &self.per_category[c];
                (
                    c.as_str().to_string(),
                    CategorySnapshot {
                        hits: counters.hits.load(Ordering::Relaxed),
                        misses: counters.misses.load(Ordering::Relaxed),
                        sets: counters.sets.load(Ordering::Relaxed),
                        evictions: counters.evictions.load(Ordering::Relaxed),
                        size: *sizes.get(c).unwrap_or(&0),
                    },
                )
            })
            .collect();
        MetricsSnapshot {
            hits,
            misses,
            sets: self.sets.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            cleanups: self.cleanups.load(Ordering::Relaxed),
            preloads_success: self.preloads_success.load(Ordering::Relaxed),
            preloads_wasted: self.preloads_wasted.load(Ordering::Relaxed),
            prediction_correct: self.prediction_correct.load(Ordering::Relaxed),
            hit_rate,
            per_category,
        }
    }
}
