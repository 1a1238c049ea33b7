//! The cache entry model of §3: TTL expiry, hot-key stickiness, and the
//! moving-average prediction derived from the bounded access ring.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use super::category::Category;

const ACCESS_RING_CAPACITY: usize = 20;
const HOT_THRESHOLD: u32 = 5;
const PREDICTION_MIN_SAMPLES: usize = 3;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: serde_json::Value,
    pub category: Category,
    pub created_at: Instant,
    pub ttl: Duration,
    pub access_count: u32,
    pub last_accessed: Instant,
    access_times: VecDeque<Instant>,
    pub predicted_next_access: Option<Instant>,
    pub hot: bool,
}

impl CacheEntry {
    pub fn new(value: serde_json::Value, category: Category, ttl: Duration) -> Self {
        let now = Instant::now();
        Self {
            value,
            category,
            created_at: now,
            ttl,
            access_count: 0,
            last_accessed: now,
            access_times: VecDeque::with_capacity(ACCESS_RING_CAPACITY),
            predicted_next_access: None,
            hot: false,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.created_at.elapsed() >= self.ttl
    }

    /// Records a hit: appends to the access ring, recomputes prediction and
    /// hot status. `hot` is sticky once set (§3: "remains sticky for the
    /// entry's life").
    pub fn record_access(&mut self) {
        let now = Instant::now();
        if self.access_times.len() == ACCESS_RING_CAPACITY {
            self.access_times.pop_front();
        }
        self.access_times.push_back(now);
        self.last_accessed = now;
        self.access_count += 1;
        if self.access_count > HOT_THRESHOLD {
            self.hot = true;
        }
        self.update_prediction();
    }

    fn update_prediction(&mut self) {
        if self.access_times.len() < PREDICTION_MIN_SAMPLES {
            self.predicted_next_access = None;
            return;
        }
        let intervals: Vec<Duration> = self
            .access_times
            .iter()
            .zip(self.access_times.iter().skip(1))
            .map(|(a, b)| b.duration_since(*a))
            .collect();
        let total: Duration = intervals.iter().sum();
        let mean = total / (intervals.len() as u32);
        self.predicted_next_access = Some(self.last_accessed + mean);
    }

    /// §3: preload-eligible iff hot and the prediction falls inside the
    /// next `0.2 * ttl` window.
    pub fn should_preload(&self) -> bool {
        if !self.hot {
            return false;
        }
        let Some(predicted) = self.predicted_next_access else {
            return false;
        };
        let now = Instant::now();
        if predicted <= now {
            return false;
        }
        let until = predicted.duration_since(now);
        until < self.ttl.mul_f64(0.2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn becomes_hot_after_six_accesses() {
        let mut e = CacheEntry::new(serde_json::json!(1), Category::Temporary, Duration::from_secs(60));
        for _ in 0..5 {
            e.record_access();
        }
        assert!(!e.hot);
        e.record_access();
        assert!(e.hot);
    }

    #[test]
    fn hot_flag_is_sticky() {
        let mut e = CacheEntry::new(serde_json::json!(1), Category::Temporary, Duration::from_secs(60));
        for _ in 0..6 {
            e.record_access();
        }
        assert!(e.hot);
        e.record_access();
        assert!(e.hot);
    }

    #[test]
    fn prediction_requires_three_samples() {
        let mut e = CacheEntry::new(serde_json::json!(1), Category::Temporary, Duration::from_secs(60));
        e.record_access();
        assert!(e.predicted_next_access.is_none());
        e.record_access();
        assert!(e.predicted_next_access.is_none());
        e.record_access();
        assert!(e.predicted_next_access.is_some());
    }

    #[test]
    fn expires_after_ttl_elapses() {
        let e = CacheEntry::new(serde_json::json!(1), Category::Temporary, Duration::from_millis(10));
        assert!(!e.is_expired());
        sleep(Duration::from_millis(15));
        assert!(e.is_expired());
    }
}
