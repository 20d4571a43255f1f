//! Debounced offline gating
//!
//! Turns the raw probe feed into a stable verdict. Raw verdicts flap while
//! radios renegotiate and links revalidate, so an offline report is held back
//! until it has survived the configured waits; an online report passes
//! through immediately.

use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

use pharos_types::{ApplicationState, ConnectionState};
use tracing::{debug, info, instrument};

use crate::clock::Clock;
use crate::config::GateConfig;
use crate::scheduler::{Scheduler, TaskHandle};
use crate::source::{
    ConnectivityObserver, ConnectivitySource, LifecycleObserver, LifecycleSource, SubscriptionId,
};

/// Callback receiving each committed verdict. `true` means effectively
/// offline.
pub type Notifier = Box<dyn Fn(bool) + Send + Sync>;

/// Mutable gate state. One mutex serializes signal handling, timer fires,
/// accessor reads, and teardown.
struct GateState {
    /// Last verdict committed through the notifier.
    effectively_offline: bool,

    /// Last raw verdict reported by the connectivity probe.
    raw_offline: bool,

    /// Whether any probe verdict has arrived yet. Until then the device is
    /// assumed online by default, which is not the same as observed online.
    probe_initialized: bool,

    /// Current application lifecycle state.
    application_state: ApplicationState,

    /// When the application last entered the foreground. Holds construction
    /// time until a foreground transition is observed; the value is only
    /// consulted while foregrounded, and entering the foreground refreshes
    /// it.
    last_foregrounded_at: Instant,

    /// When the probe last reported offline. Holds construction time until
    /// the first offline signal, and that signal always refreshes it before
    /// it is read.
    last_offline_signal_at: Instant,

    /// When the device was last known online. `None` until an online episode
    /// is confirmed; a device that has never been online skips the long
    /// wait.
    last_online_at: Option<Instant>,

    /// Timer armed for a deferred verdict, if any.
    pending: Option<TaskHandle>,

    /// Subscriptions held with the two sources, released on destroy.
    subscriptions: Option<(SubscriptionId, SubscriptionId)>,

    /// Set once by `destroy`. Signals and timer fires arriving afterwards
    /// are ignored.
    destroyed: bool,
}

/// Debounces noisy connectivity signals into a stable offline verdict.
///
/// The gate subscribes to a connectivity probe feed and an application
/// lifecycle feed. An offline verdict is committed only after the device has
/// been foregrounded, offline, and signal-stable for the settle wait, and,
/// if an online episode was ever observed, only after the longer
/// online-to-offline wait has passed since the device was last known online.
/// An online verdict is committed immediately.
///
/// At most one timer is armed at a time. Every signal cancels it and either
/// commits, re-arms with the remaining wait, or goes quiet until the next
/// signal. Nothing is committed while the application is backgrounded.
pub struct OfflineGate {
    /// Debounce windows.
    config: GateConfig,

    /// Monotonic time source.
    clock: Arc<dyn Clock>,

    /// Timer backend for deferred verdicts.
    scheduler: Arc<dyn Scheduler>,

    /// Probe feed the gate is subscribed to.
    connectivity: Arc<dyn ConnectivitySource>,

    /// Lifecycle feed the gate is subscribed to.
    lifecycle: Arc<dyn LifecycleSource>,

    /// Receives committed verdicts.
    notifier: Notifier,

    /// Weak self-reference captured by scheduled timer tasks.
    self_weak: Weak<OfflineGate>,

    /// Serialized mutable state.
    state: Mutex<GateState>,
}

impl OfflineGate {
    /// Create a gate and subscribe it to both sources.
    ///
    /// The initial lifecycle state is snapshotted from `lifecycle`; the
    /// probe is trusted-online by default until its first signal.
    ///
    /// The notifier runs on whichever thread delivers the triggering signal
    /// or timer fire, while the gate's internal lock is held. It must not
    /// call back into the gate.
    pub fn new(
        config: GateConfig,
        clock: Arc<dyn Clock>,
        scheduler: Arc<dyn Scheduler>,
        connectivity: Arc<dyn ConnectivitySource>,
        lifecycle: Arc<dyn LifecycleSource>,
        notifier: Notifier,
    ) -> Arc<Self> {
        let now = clock.now();
        let application_state = lifecycle.current_state();

        let gate = Arc::new_cyclic(|self_weak| Self {
            config,
            clock,
            scheduler,
            connectivity: Arc::clone(&connectivity),
            lifecycle: Arc::clone(&lifecycle),
            notifier,
            self_weak: self_weak.clone(),
            state: Mutex::new(GateState {
                effectively_offline: false,
                raw_offline: false,
                probe_initialized: false,
                application_state,
                last_foregrounded_at: now,
                last_offline_signal_at: now,
                last_online_at: None,
                pending: None,
                subscriptions: None,
                destroyed: false,
            }),
        });

        let connectivity_observer: Arc<dyn ConnectivityObserver> = gate.clone();
        let lifecycle_observer: Arc<dyn LifecycleObserver> = gate.clone();
        let subscriptions = (
            connectivity.subscribe(Arc::downgrade(&connectivity_observer)),
            lifecycle.subscribe(Arc::downgrade(&lifecycle_observer)),
        );
        gate.state.lock().unwrap().subscriptions = Some(subscriptions);

        debug!(application_state = %application_state, "Offline gate created");
        gate
    }

    /// Last committed verdict. `true` once offline has settled, `false`
    /// again as soon as the probe reports online.
    pub fn is_effectively_offline(&self) -> bool {
        self.state.lock().unwrap().effectively_offline
    }

    /// Debounce windows the gate was built with.
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Unsubscribe from both sources and cancel any armed timer.
    ///
    /// Idempotent. Signals already in flight when destroy runs are ignored
    /// once it has completed; the notifier is never invoked again.
    #[instrument(skip(self))]
    pub fn destroy(&self) {
        let (pending, subscriptions) = {
            let mut state = self.state.lock().unwrap();
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            (state.pending.take(), state.subscriptions.take())
        };

        // Out of the lock: the sources take their own locks to unsubscribe,
        // and they may be mid-delivery on another thread.
        if let Some(handle) = pending {
            self.scheduler.cancel(handle);
        }
        if let Some((connectivity_sub, lifecycle_sub)) = subscriptions {
            self.connectivity.unsubscribe(connectivity_sub);
            self.lifecycle.unsubscribe(lifecycle_sub);
        }
        info!("Offline gate destroyed");
    }

    /// Recompute the verdict after a signal, lifecycle change, or timer
    /// fire. Cancels any armed timer first, so at most one is outstanding.
    fn evaluate(&self, state: &mut GateState, now: Instant) {
        if let Some(handle) = state.pending.take() {
            self.scheduler.cancel(handle);
        }

        // Verdicts wait for the foreground. Returning to the foreground
        // re-runs this evaluation.
        if !state.application_state.is_foreground() {
            return;
        }

        // Recovery is never debounced.
        if !state.raw_offline {
            self.commit(state, false);
            return;
        }

        let needed_for_foreground = self
            .config
            .settle_wait
            .saturating_sub(now.saturating_duration_since(state.last_foregrounded_at));
        let needed_for_offline = self
            .config
            .settle_wait
            .saturating_sub(now.saturating_duration_since(state.last_offline_signal_at));
        let needed_since_online = match state.last_online_at {
            Some(last_online_at) => self
                .config
                .online_to_offline_wait
                .saturating_sub(now.saturating_duration_since(last_online_at)),
            None => Duration::ZERO,
        };

        let wait = needed_for_foreground
            .max(needed_for_offline)
            .max(needed_since_online);
        if wait.is_zero() {
            self.commit(state, true);
            return;
        }

        let weak = self.self_weak.clone();
        let handle = self.scheduler.schedule(
            wait,
            Box::new(move || {
                if let Some(gate) = weak.upgrade() {
                    gate.timer_fired();
                }
            }),
        );
        state.pending = Some(handle);
        debug!(wait_ms = wait.as_millis() as u64, "Offline verdict deferred");
    }

    /// Commit a verdict if it differs from the last one committed.
    fn commit(&self, state: &mut GateState, offline: bool) {
        if state.effectively_offline == offline {
            return;
        }
        state.effectively_offline = offline;
        info!(offline, "Stable connectivity verdict changed");
        (self.notifier)(offline);
    }

    /// An armed timer elapsed. Re-evaluates instead of committing blindly,
    /// so a timer that fired early re-arms with the remaining wait.
    ///
    /// `pending` is left for `evaluate` to cancel: it may hold a fresh
    /// timer armed by a signal that beat this fire to the lock, and
    /// canceling the fired handle itself is a no-op.
    fn timer_fired(&self) {
        let now = self.clock.now();
        let mut state = self.state.lock().unwrap();
        if state.destroyed {
            return;
        }
        self.evaluate(&mut state, now);
    }
}

impl ConnectivityObserver for OfflineGate {
    fn on_connection_state_changed(&self, connection_state: ConnectionState) {
        let now = self.clock.now();
        let mut state = self.state.lock().unwrap();
        if state.destroyed {
            return;
        }

        let offline = connection_state.is_offline();
        let was_offline = state.raw_offline;
        state.raw_offline = offline;
        if was_offline == offline {
            // Repeats confirm the probe is alive but never restart a wait.
            state.probe_initialized = true;
            debug!(state = %connection_state, "Duplicate connectivity signal");
            return;
        }

        debug!(state = %connection_state, offline, "Connectivity signal");
        if offline {
            state.last_offline_signal_at = now;
        }

        // Last-known-online is stamped on both edges: when a confirmed
        // online device flips offline, and when any device flips back
        // online. A first signal that reports offline stamps nothing, so
        // the device still counts as never-online.
        if (state.probe_initialized && !was_offline) || !offline {
            state.last_online_at = Some(now);
        }
        state.probe_initialized = true;

        self.evaluate(&mut state, now);
    }
}

impl LifecycleObserver for OfflineGate {
    fn on_application_state_changed(&self, application_state: ApplicationState) {
        let now = self.clock.now();
        let mut state = self.state.lock().unwrap();
        if state.destroyed {
            return;
        }
        if state.application_state == application_state {
            return;
        }

        debug!(state = %application_state, "Application state changed");
        state.application_state = application_state;
        if application_state.is_foreground() {
            state.last_foregrounded_at = now;
        }

        self.evaluate(&mut state, now);
    }
}

impl Drop for OfflineGate {
    fn drop(&mut self) {
        // Sources hold subscribers weakly, so only the timer needs cleanup.
        if let Ok(mut state) = self.state.lock() {
            if let Some(handle) = state.pending.take() {
                self.scheduler.cancel(handle);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{
        ManualClock, ManualScheduler, MockConnectivitySource, MockLifecycleSource,
        RecordingNotifier,
    };
    use crate::scheduler::Task;

    struct TestGate {
        clock: Arc<ManualClock>,
        scheduler: Arc<ManualScheduler>,
        connectivity: Arc<MockConnectivitySource>,
        lifecycle: Arc<MockLifecycleSource>,
        notifier: RecordingNotifier,
        gate: Arc<OfflineGate>,
    }

    fn test_gate(initial: ApplicationState) -> TestGate {
        let clock = Arc::new(ManualClock::new());
        let scheduler = Arc::new(ManualScheduler::new());
        let connectivity = Arc::new(MockConnectivitySource::new());
        let lifecycle = Arc::new(MockLifecycleSource::new(initial));
        let notifier = RecordingNotifier::new();
        let gate = OfflineGate::new(
            GateConfig::default(),
            clock.clone(),
            scheduler.clone(),
            connectivity.clone(),
            lifecycle.clone(),
            notifier.callback(),
        );
        TestGate {
            clock,
            scheduler,
            connectivity,
            lifecycle,
            notifier,
            gate,
        }
    }

    fn foregrounded() -> TestGate {
        test_gate(ApplicationState::HasRunningActivities)
    }

    #[test]
    fn test_starts_online() {
        let t = foregrounded();
        assert!(!t.gate.is_effectively_offline());
        assert!(t.notifier.calls().is_empty());
        assert_eq!(t.scheduler.pending_count(), 0);
    }

    #[test]
    fn test_subscribes_to_both_sources() {
        let t = foregrounded();
        assert_eq!(t.connectivity.subscriber_count(), 1);
        assert_eq!(t.lifecycle.subscriber_count(), 1);
        drop(t.gate);
        assert_eq!(t.connectivity.subscriber_count(), 0);
        assert_eq!(t.lifecycle.subscriber_count(), 0);
    }

    #[test]
    fn test_first_online_signal_commits_nothing() {
        let t = foregrounded();
        t.connectivity.emit(ConnectionState::Validated);
        assert!(t.notifier.calls().is_empty());
        assert_eq!(t.scheduler.schedule_count(), 0);
    }

    #[test]
    fn test_offline_settles_then_commits() {
        let t = foregrounded();
        t.connectivity.emit(ConnectionState::Disconnected);
        assert!(!t.gate.is_effectively_offline());
        assert_eq!(t.scheduler.pending_count(), 1);

        t.clock.advance(Duration::from_secs(2));
        assert!(t.scheduler.fire_next());
        assert!(t.gate.is_effectively_offline());
        assert_eq!(t.notifier.calls(), vec![true]);
    }

    #[test]
    fn test_duplicate_offline_signals_do_not_reschedule() {
        let t = foregrounded();
        t.connectivity.emit(ConnectionState::Disconnected);
        assert_eq!(t.scheduler.schedule_count(), 1);

        t.clock.advance(Duration::from_millis(1_500));
        t.connectivity.emit(ConnectionState::NoInternet);
        assert_eq!(t.scheduler.schedule_count(), 1);
        assert_eq!(t.scheduler.pending_count(), 1);

        t.clock.advance(Duration::from_millis(500));
        assert!(t.scheduler.fire_next());
        assert_eq!(t.notifier.calls(), vec![true]);
    }

    #[test]
    fn test_online_recovery_is_immediate() {
        let t = foregrounded();
        t.connectivity.emit(ConnectionState::Disconnected);
        t.clock.advance(Duration::from_secs(2));
        t.scheduler.fire_next();
        assert_eq!(t.notifier.calls(), vec![true]);

        t.connectivity.emit(ConnectionState::Validated);
        assert!(!t.gate.is_effectively_offline());
        assert_eq!(t.notifier.calls(), vec![true, false]);
        assert_eq!(t.scheduler.pending_count(), 0);
    }

    #[test]
    fn test_lifecycle_churn_while_online_commits_nothing() {
        let t = foregrounded();
        t.connectivity.emit(ConnectionState::Validated);
        t.lifecycle.set_state(ApplicationState::HasPausedActivities);
        t.lifecycle.set_state(ApplicationState::HasStoppedActivities);
        t.lifecycle.set_state(ApplicationState::HasRunningActivities);
        assert!(t.notifier.calls().is_empty());
        assert_eq!(t.scheduler.pending_count(), 0);
    }

    #[test]
    fn test_duplicate_lifecycle_report_keeps_timer() {
        let t = foregrounded();
        t.connectivity.emit(ConnectionState::Disconnected);
        assert_eq!(t.scheduler.pending_count(), 1);

        t.lifecycle.set_state(ApplicationState::HasRunningActivities);
        assert_eq!(t.scheduler.schedule_count(), 1);
        assert_eq!(t.scheduler.pending_count(), 1);
    }

    #[test]
    fn test_destroy_cancels_pending_timer() {
        let t = foregrounded();
        t.connectivity.emit(ConnectionState::Disconnected);
        assert_eq!(t.scheduler.pending_count(), 1);

        t.gate.destroy();
        assert_eq!(t.scheduler.pending_count(), 0);
        assert!(!t.scheduler.fire_next());
        assert!(t.notifier.calls().is_empty());
    }

    #[test]
    fn test_destroy_is_idempotent_and_detaches() {
        let t = foregrounded();
        t.gate.destroy();
        t.gate.destroy();
        assert_eq!(t.connectivity.subscriber_count(), 0);
        assert_eq!(t.lifecycle.subscriber_count(), 0);

        t.connectivity.emit(ConnectionState::Disconnected);
        t.lifecycle.set_state(ApplicationState::HasStoppedActivities);
        assert!(t.notifier.calls().is_empty());
        assert_eq!(t.scheduler.schedule_count(), 0);
    }

    #[test]
    fn test_verdict_sticks_after_destroy() {
        let t = foregrounded();
        t.connectivity.emit(ConnectionState::Disconnected);
        t.clock.advance(Duration::from_secs(2));
        t.scheduler.fire_next();
        assert!(t.gate.is_effectively_offline());

        t.gate.destroy();
        assert!(t.gate.is_effectively_offline());
    }

    /// Scheduler double for fire-versus-cancel races: a task taken in
    /// flight can no longer be canceled, like a tokio task whose sleep
    /// already elapsed.
    struct InFlightScheduler {
        inner: Mutex<InFlightInner>,
    }

    struct InFlightInner {
        next_id: u64,
        armed: Vec<(u64, Task)>,
    }

    impl InFlightScheduler {
        fn new() -> Self {
            Self {
                inner: Mutex::new(InFlightInner {
                    next_id: 1,
                    armed: Vec::new(),
                }),
            }
        }

        fn armed_count(&self) -> usize {
            self.inner.lock().unwrap().armed.len()
        }

        /// Pull the oldest armed task out, as if its delay just elapsed.
        fn take_in_flight(&self) -> Task {
            self.inner.lock().unwrap().armed.remove(0).1
        }
    }

    impl Scheduler for InFlightScheduler {
        fn schedule(&self, _delay: Duration, task: Task) -> TaskHandle {
            let mut inner = self.inner.lock().unwrap();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.armed.push((id, task));
            TaskHandle(id)
        }

        fn cancel(&self, handle: TaskHandle) {
            self.inner
                .lock()
                .unwrap()
                .armed
                .retain(|(id, _)| *id != handle.0);
        }
    }

    #[test]
    fn test_stale_fire_cancels_a_rearmed_timer() {
        let clock = Arc::new(ManualClock::new());
        let scheduler = Arc::new(InFlightScheduler::new());
        let connectivity = Arc::new(MockConnectivitySource::new());
        let lifecycle = Arc::new(MockLifecycleSource::new(
            ApplicationState::HasRunningActivities,
        ));
        let notifier = RecordingNotifier::new();
        let gate = OfflineGate::new(
            GateConfig::default(),
            clock.clone(),
            scheduler.clone(),
            connectivity.clone(),
            lifecycle.clone(),
            notifier.callback(),
        );

        connectivity.emit(ConnectionState::Disconnected);
        assert_eq!(scheduler.armed_count(), 1);

        // The settle timer elapses, but its fire has not taken the gate
        // lock yet when a lifecycle round trip re-arms a fresh timer.
        clock.advance(Duration::from_secs(2));
        let stale_fire = scheduler.take_in_flight();
        lifecycle.set_state(ApplicationState::HasPausedActivities);
        lifecycle.set_state(ApplicationState::HasRunningActivities);
        assert_eq!(scheduler.armed_count(), 1);

        // The stale fire must cancel the fresh timer before re-arming, so
        // exactly one timer stays live.
        stale_fire();
        assert_eq!(scheduler.armed_count(), 1);
        assert!(!gate.is_effectively_offline());
        assert!(notifier.calls().is_empty());
    }
}
