//! Hand-cranked test doubles
//!
//! Deterministic stand-ins for the gate's seams: a clock that only moves
//! when told, a scheduler fired by the test, sources that emit on demand,
//! a map-backed parameter provider, and a notifier that records verdicts.
//! Used by this crate's tests and available to downstream crates testing
//! against the gate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

use pharos_types::{ApplicationState, ConnectionState};

use crate::clock::Clock;
use crate::config::ParamProvider;
use crate::gate::Notifier;
use crate::scheduler::{Scheduler, Task, TaskHandle};
use crate::source::{
    ConnectivityObserver, ConnectivitySource, LifecycleObserver, LifecycleSource, SubscriberSet,
    SubscriptionId,
};

/// Clock that advances only when told to.
pub struct ManualClock {
    origin: Instant,
    elapsed_ms: AtomicU64,
}

impl ManualClock {
    /// Create a clock frozen at an arbitrary origin.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed_ms: AtomicU64::new(0),
        }
    }

    /// Move time forward by `by`.
    pub fn advance(&self, by: Duration) {
        self.elapsed_ms
            .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    /// Jump to an absolute offset from the origin.
    pub fn set_elapsed(&self, elapsed: Duration) {
        self.elapsed_ms
            .store(elapsed.as_millis() as u64, Ordering::SeqCst);
    }

    /// Time elapsed since the origin.
    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms.load(Ordering::SeqCst))
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }
}

struct ManualTask {
    id: u64,
    delay: Duration,
    task: Task,
}

struct ManualSchedulerInner {
    next_id: u64,
    schedule_count: u64,
    pending: Vec<ManualTask>,
}

/// Scheduler that holds tasks until the test fires them.
///
/// Delays are recorded, not waited on: pair this with [`ManualClock`] and
/// advance the clock before firing to simulate the delay elapsing.
pub struct ManualScheduler {
    inner: Mutex<ManualSchedulerInner>,
}

impl ManualScheduler {
    /// Create an empty scheduler.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(ManualSchedulerInner {
                next_id: 1,
                schedule_count: 0,
                pending: Vec::new(),
            }),
        }
    }

    /// Number of tasks currently scheduled.
    pub fn pending_count(&self) -> usize {
        self.inner.lock().unwrap().pending.len()
    }

    /// Delays of all pending tasks, in scheduling order.
    pub fn pending_delays(&self) -> Vec<Duration> {
        self.inner
            .lock()
            .unwrap()
            .pending
            .iter()
            .map(|task| task.delay)
            .collect()
    }

    /// Total number of schedule calls ever made.
    pub fn schedule_count(&self) -> u64 {
        self.inner.lock().unwrap().schedule_count
    }

    /// Run the oldest pending task. Returns false if nothing is pending.
    ///
    /// The internal lock is released before the task runs, so the task may
    /// schedule or cancel freely.
    pub fn fire_next(&self) -> bool {
        let task = {
            let mut inner = self.inner.lock().unwrap();
            if inner.pending.is_empty() {
                return false;
            }
            inner.pending.remove(0)
        };
        (task.task)();
        true
    }
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> TaskHandle {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.schedule_count += 1;
        inner.pending.push(ManualTask { id, delay, task });
        TaskHandle(id)
    }

    fn cancel(&self, handle: TaskHandle) {
        self.inner
            .lock()
            .unwrap()
            .pending
            .retain(|task| task.id != handle.0);
    }
}

/// Connectivity source that emits whatever the test tells it to.
#[derive(Default)]
pub struct MockConnectivitySource {
    subscribers: SubscriberSet<dyn ConnectivityObserver>,
}

impl MockConnectivitySource {
    /// Create a source with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a probe verdict to every live subscriber.
    pub fn emit(&self, state: ConnectionState) {
        for observer in self.subscribers.snapshot() {
            observer.on_connection_state_changed(state);
        }
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl ConnectivitySource for MockConnectivitySource {
    fn subscribe(&self, observer: Weak<dyn ConnectivityObserver>) -> SubscriptionId {
        self.subscribers.insert(observer)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.remove(id);
    }
}

/// Lifecycle source with a settable current state.
pub struct MockLifecycleSource {
    subscribers: SubscriberSet<dyn LifecycleObserver>,
    current: Mutex<ApplicationState>,
}

impl MockLifecycleSource {
    /// Create a source reporting `initial` as the current state.
    pub fn new(initial: ApplicationState) -> Self {
        Self {
            subscribers: SubscriberSet::new(),
            current: Mutex::new(initial),
        }
    }

    /// Record a transition and push it to every live subscriber.
    pub fn set_state(&self, state: ApplicationState) {
        *self.current.lock().unwrap() = state;
        for observer in self.subscribers.snapshot() {
            observer.on_application_state_changed(state);
        }
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl LifecycleSource for MockLifecycleSource {
    fn current_state(&self) -> ApplicationState {
        *self.current.lock().unwrap()
    }

    fn subscribe(&self, observer: Weak<dyn LifecycleObserver>) -> SubscriptionId {
        self.subscribers.insert(observer)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.remove(id);
    }
}

/// Parameter provider backed by a plain map.
#[derive(Debug, Default, Clone)]
pub struct MapParams {
    values: HashMap<String, u64>,
}

impl MapParams {
    /// Create an empty provider; every lookup falls back to its default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an override for `name`.
    pub fn set(mut self, name: &str, value_ms: u64) -> Self {
        self.values.insert(name.to_string(), value_ms);
        self
    }
}

impl ParamProvider for MapParams {
    fn duration_ms(&self, name: &str, default_ms: u64) -> u64 {
        self.values.get(name).copied().unwrap_or(default_ms)
    }
}

/// Notifier that records every committed verdict.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    calls: Arc<Mutex<Vec<bool>>>,
}

impl RecordingNotifier {
    /// Create a recorder with no calls.
    pub fn new() -> Self {
        Self::default()
    }

    /// Boxed callback that appends every verdict to this recorder.
    pub fn callback(&self) -> Notifier {
        let calls = Arc::clone(&self.calls);
        Box::new(move |offline| calls.lock().unwrap().push(offline))
    }

    /// All verdicts received so far, oldest first.
    pub fn calls(&self) -> Vec<bool> {
        self.calls.lock().unwrap().clone()
    }

    /// Most recent verdict, if any.
    pub fn last(&self) -> Option<bool> {
        self.calls.lock().unwrap().last().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances_on_demand() {
        let clock = ManualClock::new();
        let start = clock.now();

        clock.advance(Duration::from_millis(250));
        assert_eq!(clock.now() - start, Duration::from_millis(250));
        assert_eq!(clock.elapsed(), Duration::from_millis(250));
    }

    #[test]
    fn test_manual_scheduler_fires_in_order() {
        let scheduler = ManualScheduler::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in [1, 2] {
            let order = Arc::clone(&order);
            scheduler.schedule(
                Duration::from_millis(tag as u64),
                Box::new(move || order.lock().unwrap().push(tag)),
            );
        }
        assert_eq!(scheduler.pending_count(), 2);

        assert!(scheduler.fire_next());
        assert!(scheduler.fire_next());
        assert!(!scheduler.fire_next());
        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_manual_scheduler_cancel_removes_task() {
        let scheduler = ManualScheduler::new();
        let handle = scheduler.schedule(Duration::from_secs(1), Box::new(|| {}));
        assert_eq!(scheduler.pending_delays(), vec![Duration::from_secs(1)]);

        scheduler.cancel(handle);
        assert_eq!(scheduler.pending_count(), 0);
        assert!(!scheduler.fire_next());
        assert_eq!(scheduler.schedule_count(), 1);
    }

    #[test]
    fn test_map_params_overrides_and_falls_back() {
        let params = MapParams::new().set("settle_wait_ms", 100);
        assert_eq!(params.duration_ms("settle_wait_ms", 2_000), 100);
        assert_eq!(params.duration_ms("online_to_offline_wait_ms", 10_000), 10_000);
    }

    #[test]
    fn test_recording_notifier_keeps_order() {
        let notifier = RecordingNotifier::new();
        let callback = notifier.callback();

        callback(true);
        callback(false);
        assert_eq!(notifier.calls(), vec![true, false]);
        assert_eq!(notifier.last(), Some(false));
    }
}
