//! The Cache Engine (§4.A): a category-partitioned, TTL-bound, predictive
//! key/value store. Keys are serialized through `DashMap`'s per-shard
//! locking, which gives the per-key serialization the concurrency contract
//! requires while leaving distinct keys free to proceed in parallel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use super::category::{Category, ALL_CATEGORIES};
use super::entry::CacheEntry;
use super::metrics::{CacheMetrics, MetricsSnapshot};

/// Implemented by the cache loader so the engine can issue a targeted
/// refresh for a single key without depending on the loader's types
/// (§4.A: "invoking the appropriate bulk-loader hook, selected by key
/// prefix").
#[async_trait]
pub trait PreloadSource: Send + Sync {
    async fn refresh_key(&self, category: Category, key: &str) -> bool;
}

pub struct CacheEngine {
    map: DashMap<String, CacheEntry>,
    sizes: [AtomicI64; 7],
    metrics: CacheMetrics,
    active_preloads: DashMap<String, ()>,
}

impl Default for CacheEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn category_index(c: Category) -> usize {
    ALL_CATEGORIES.iter().position(|x| *x == c).expect("closed enum")
}

/// Canonical key construction of §4.A: category, then colon-joined
/// positional args, skipping nulls so equal arguments yield equal keys.
pub fn build_key(category: Category, args: &[Option<String>]) -> String {
    let mut parts = vec![category.as_str().to_string()];
    parts.extend(args.iter().filter_map(|a| a.clone()));
    parts.join(":")
}

impl CacheEngine {
    pub fn new() -> Self {
        Self {
            map: DashMap::new(),
            sizes: Default::default(),
            metrics: CacheMetrics::default(),
            active_preloads: DashMap::new(),
        }
    }

    fn bump_size(&self, category: Category, delta: i64) {
        self.sizes[category_index(category)].fetch_add(delta, Ordering::Relaxed);
    }

    fn size_of(&self, category: Category) -> i64 {
        self.sizes[category_index(category)].load(Ordering::Relaxed)
    }

    pub fn get<T: DeserializeOwned>(&self, category: Category, args: &[Option<String>]) -> Option<T> {
        let key = build_key(category, args);
        let mut remove_expired = false;
        let result = match self.map.get_mut(&key) {
            Some(mut entry) => {
                if entry.is_expired() {
                    remove_expired = true;
                    None
                } else {
                    entry.record_access();
                    serde_json::from_value(entry.value.clone()).ok()
                }
            }
            None => None,
        };
        if remove_expired {
            self.map.remove(&key);
            self.bump_size(category, -1);
            self.metrics.record_miss(category);
            self.metrics.record_eviction(category);
            return None;
        }
        match &result {
            Some(_) => self.metrics.record_hit(category),
            None => self.metrics.record_miss(category),
        }
        result
    }

    pub fn set<T: Serialize>(
        &self,
        category: Category,
        value: &T,
        args: &[Option<String>],
        ttl: Option<Duration>,
    ) {
        let key = build_key(category, args);
        let ttl = ttl.unwrap_or_else(|| category.default_ttl());
        let json = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, %key, "failed to serialize cache value, skipping set");
                return;
            }
        };
        let is_new = !self.map.contains_key(&key);
        self.map.insert(key, CacheEntry::new(json, category, ttl));
        if is_new {
            self.bump_size(category, 1);
        }
        self.metrics.record_set(category);
    }

    pub fn delete(&self, category: Category, args: &[Option<String>]) {
        let key = build_key(category, args);
        if self.map.remove(&key).is_some() {
            self.bump_size(category, -1);
        }
    }

    /// Removes every entry tagged with `category`; resets that category's
    /// size to zero (§4.A, §8 property 3).
    pub fn invalidate_category(&self, category: Category) -> usize {
        let keys: Vec<String> = self
            .map
            .iter()
            .filter(|kv| kv.value().category == category)
            .map(|kv| kv.key().clone())
            .collect();
        let mut removed = 0;
        for key in &keys {
            if self.map.remove(key).is_some() {
                removed += 1;
            }
        }
        self.sizes[category_index(category)].store(0, Ordering::Relaxed);
        removed
    }

    /// One-hop invalidation across the rule graph edges of `category`
    /// (§3, §8 property 4). Non-transitive by design.
    pub fn invalidate_related(&self, category: Category) -> usize {
        category
            .related()
            .iter()
            .map(|&related| self.invalidate_category(related))
            .sum()
    }

    /// Sweeps the whole map for expired entries; intended for periodic
    /// background use (§4.A).
    pub fn cleanup_expired(&self) -> usize {
        let expired: Vec<(String, Category)> = self
            .map
            .iter()
            .filter(|kv| kv.value().is_expired())
            .map(|kv| (kv.key().clone(), kv.value().category))
            .collect();
        for (key, category) in &expired {
            if self.map.remove(key).is_some() {
                self.bump_size(*category, -1);
                self.metrics.record_eviction(*category);
            }
        }
        self.metrics.record_cleanup();
        expired.len()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        let sizes: HashMap<Category, u64> = ALL_CATEGORIES
            .iter()
            .map(|c| (*c, self.size_of(*c).max(0) as u64))
            .collect();
        self.metrics.snapshot(&sizes)
    }

    /// Keys currently eligible for predictive preload and not already
    /// in-flight (§4.A maintenance loop).
    pub fn preload_candidates(&self) -> Vec<(String, Category, Instant)> {
        self.map
            .iter()
            .filter(|kv| kv.value().should_preload())
            .filter(|kv| !self.active_preloads.contains_key(kv.key()))
            .filter_map(|kv| {
                kv.value()
                    .predicted_next_access
                    .map(|p| (kv.key().clone(), kv.value().category, p))
            })
            .collect()
    }

    /// Runs the preload task for one candidate key: sleeps until
    /// `prediction - 0.1*ttl` (capped at `ttl - 1s` per §5), then refreshes
    /// through `source`, recording success or waste.
    pub async fn run_preload(&self, key: String, category: Category, predicted: Instant, source: &dyn PreloadSource) {
        self.active_preloads.insert(key.clone(), ());
        let ttl = self
            .map
            .get(&key)
            .map(|e| e.ttl)
            .unwrap_or_else(|| category.default_ttl());
        let wake_at = predicted
            .checked_sub(ttl.mul_f64(0.1))
            .unwrap_or_else(Instant::now);
        let cap = Instant::now() + ttl.saturating_sub(Duration::from_secs(1));
        let wake_at = wake_at.min(cap);
        if let Some(delay) = wake_at.checked_duration_since(Instant::now()) {
            tokio::time::sleep(delay).await;
        }
        let had_entry_before_expiry = self.map.get(&key).map(|e| !e.is_expired()).unwrap_or(false);
        let refreshed = source.refresh_key(category, &key).await;
        self.active_preloads.remove(&key);
        if refreshed && had_entry_before_expiry {
            self.metrics.record_preload_success();
        } else {
            self.metrics.record_preload_wasted();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_then_get_returns_the_same_value() {
        let engine = CacheEngine::new();
        engine.set(Category::Temporary, &json!({"v": 1}), &[Some("a".into())], None);
        let got: Option<serde_json::Value> = engine.get(Category::Temporary, &[Some("a".into())]);
        assert_eq!(got, Some(json!({"v": 1})));
    }

    #[test]
    fn expired_entry_is_a_miss_and_decrements_size() {
        let engine = CacheEngine::new();
        engine.set(
            Category::Temporary,
            &json!(1),
            &[Some("k".into())],
            Some(Duration::from_millis(5)),
        );
        std::thread::sleep(Duration::from_millis(15));
        let got: Option<serde_json::Value> = engine.get(Category::Temporary, &[Some("k".into())]);
        assert!(got.is_none());
        assert_eq!(engine.size_of(Category::Temporary), 0);
    }

    #[test]
    fn invalidate_category_empties_only_that_category() {
        let engine = CacheEngine::new();
        engine.set(Category::UserData, &json!(1), &[Some("u1".into())], None);
        engine.set(Category::RosterData, &json!(1), &[Some("r1".into())], None);
        let removed = engine.invalidate_category(Category::UserData);
        assert_eq!(removed, 1);
        assert_eq!(engine.size_of(Category::UserData), 0);
        assert_eq!(engine.size_of(Category::RosterData), 1);
    }

    #[test]
    fn invalidate_related_follows_one_hop_edges_only() {
        let engine = CacheEngine::new();
        engine.set(Category::UserData, &json!(1), &[Some("u".into())], None);
        engine.set(Category::RosterData, &json!(1), &[Some("r".into())], None);
        engine.set(Category::EventsData, &json!(1), &[Some("e".into())], None);
        engine.set(Category::GuildData, &json!(1), &[Some("g".into())], None);
        let removed = engine.invalidate_related(Category::GuildData);
        assert_eq!(removed, 2);
        assert_eq!(engine.size_of(Category::RosterData), 0);
        assert_eq!(engine.size_of(Category::EventsData), 0);
        assert_eq!(engine.size_of(Category::GuildData), 1);
    }

    #[test]
    fn build_key_skips_null_arguments() {
        let key = build_key(Category::RosterData, &[Some("7".into()), None, Some("9".into())]);
        assert_eq!(key, "roster_data:7:9");
    }
}
