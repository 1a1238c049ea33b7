//! The Scheduler (§4.H): a coarse periodic driver that fires registered
//! callbacks with per-period deduplication and a per-callback mutex
//! against overlapping runs. Grounded on `monitor.rs`
//! (`tokio::time::interval` + single periodic loop), generalized here to
//! many independently-periodic, independently-locked callbacks instead of
//! one.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

/// The closed set of callbacks the scheduler drives into the Event
/// Lifecycle and Roster Reconciler (§4.H).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchedulerCallback {
    Close,
    Remind,
    Delete,
    RosterMaintenance,
    CacheMaintenance,
    CreateDailyEvents,
}

impl SchedulerCallback {
    pub fn as_str(self) -> &'static str {
        match self {
            SchedulerCallback::Close => "close",
            SchedulerCallback::Remind => "remind",
            SchedulerCallback::Delete => "delete",
            SchedulerCallback::RosterMaintenance => "roster_maintenance",
            SchedulerCallback::CacheMaintenance => "cache_maintenance",
            SchedulerCallback::CreateDailyEvents => "create_daily_events",
        }
    }
}

/// A unit of scheduled work. Implementors own whatever state
/// (store gateway, cache engine, guild list) their procedure needs; the
/// scheduler itself is agnostic to what a callback does.
#[async_trait]
pub trait ScheduledTask: Send + Sync {
    async fn run(&self);
}

struct Slot {
    callback: SchedulerCallback,
    period: Duration,
    guard: Mutex<()>,
    last_period_index: AtomicI64,
    task: Arc<dyn ScheduledTask>,
}

/// Coarse time-wheel firing at second granularity (§4.H). Each registered
/// callback tracks its own period-index so a callback whose period is,
/// say, 60s only fires once per minute boundary regardless of how often
/// the driving tick runs; a callback that missed more than one period
/// (the process was blocked, or the tick itself drifted) skips straight
/// to the current period rather than queuing a catch-up burst.
pub struct Scheduler {
    slots: Vec<Slot>,
    tick: Duration,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            tick: Duration::from_secs(1),
        }
    }

    pub fn register(&mut self, callback: SchedulerCallback, period: Duration, task: Arc<dyn ScheduledTask>) {
        self.slots.push(Slot {
            callback,
            period,
            guard: Mutex::new(()),
            last_period_index: AtomicI64::new(-1),
            task,
        });
    }

    /// Runs the driving loop forever; cancel by aborting the task that
    /// owns this future (§5 "Background tasks... are cancellable at any
    /// suspension point").
    pub async fn run(self: Arc<Self>) {
        let mut ticker = interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let now_secs = chrono::Utc::now().timestamp();
            for slot in &self.slots {
                let period_secs = slot.period.as_secs().max(1) as i64;
                let current_index = now_secs / period_secs;
                let last = slot.last_period_index.load(Ordering::Relaxed);
                if current_index == last {
                    continue;
                }
                if slot
                    .last_period_index
                    .compare_exchange(last, current_index, Ordering::Relaxed, Ordering::Relaxed)
                    .is_err()
                {
                    continue;
                }
                self.fire(slot).await;
            }
        }
    }

    async fn fire(self: &Arc<Self>, slot: &Slot) {
        let Ok(_permit) = slot.guard.try_lock() else {
            warn!(callback = slot.callback.as_str(), "skipped tick, previous run still in flight");
            return;
        };
        debug!(callback = slot.callback.as_str(), "firing scheduled callback");
        slot.task.run().await;
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingTask(Arc<AtomicUsize>);

    #[async_trait]
    impl ScheduledTask for CountingTask {
        async fn run(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn fire_invokes_the_task() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut scheduler = Scheduler::new();
        scheduler.register(
            SchedulerCallback::CacheMaintenance,
            Duration::from_secs(60),
            Arc::new(CountingTask(counter.clone())),
        );
        let scheduler = Arc::new(scheduler);
        scheduler.fire(&scheduler.slots[0]).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn overlapping_fire_is_skipped_while_a_run_holds_the_guard() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut scheduler = Scheduler::new();
        scheduler.register(
            SchedulerCallback::CacheMaintenance,
            Duration::from_secs(60),
            Arc::new(CountingTask(counter.clone())),
        );
        let scheduler = Arc::new(scheduler);
        let _held = scheduler.slots[0].guard.lock().await;
        scheduler.fire(&scheduler.slots[0]).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
