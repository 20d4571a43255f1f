//! # Pharos Gate - Debounced Connectivity Gating
//!
//! This crate turns noisy connectivity signals into a single stable
//! "effectively offline" verdict suitable for driving user-visible offline
//! indicators.
//!
//! ## Overview
//!
//! Connectivity probes flap: radios renegotiate, links revalidate, captive
//! portals appear and disappear. Surfacing every flap produces an indicator
//! that flickers. The gate debounces instead:
//!
//! - **Offline is earned**: an offline verdict must survive a settle wait
//!   while the application is foregrounded and the probe stays offline.
//! - **Recently online waits longer**: if the device was observed online,
//!   the hold stretches, because those transitions usually resolve.
//! - **Recovery is instant**: the first online verdict passes through
//!   immediately.
//! - **Background is silent**: verdicts wait for the application to return
//!   to the foreground.
//!
//! ## Key Components
//!
//! - [`OfflineGate`]: The debouncing state machine
//! - [`Clock`] / [`Scheduler`]: Injected time and timer seams
//! - [`ConnectivitySource`] / [`LifecycleSource`]: Signal feeds the gate
//!   subscribes to
//! - [`GateConfig`]: The two debounce windows, overridable via
//!   [`ParamProvider`]
//! - [`mocks`]: Manual clocks, schedulers, and sources for tests
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use pharos_gate::mocks::{
//!     ManualClock, ManualScheduler, MockConnectivitySource, MockLifecycleSource,
//!     RecordingNotifier,
//! };
//! use pharos_gate::{GateConfig, OfflineGate};
//! use pharos_types::{ApplicationState, ConnectionState};
//!
//! let clock = Arc::new(ManualClock::new());
//! let scheduler = Arc::new(ManualScheduler::new());
//! let connectivity = Arc::new(MockConnectivitySource::new());
//! let lifecycle = Arc::new(MockLifecycleSource::new(
//!     ApplicationState::HasRunningActivities,
//! ));
//! let notifier = RecordingNotifier::new();
//!
//! let gate = OfflineGate::new(
//!     GateConfig::default(),
//!     clock.clone(),
//!     scheduler.clone(),
//!     connectivity.clone(),
//!     lifecycle.clone(),
//!     notifier.callback(),
//! );
//!
//! // A lone offline flap is not enough; the verdict has to settle first.
//! connectivity.emit(ConnectionState::Disconnected);
//! assert!(!gate.is_effectively_offline());
//!
//! clock.advance(Duration::from_secs(2));
//! scheduler.fire_next();
//! assert!(gate.is_effectively_offline());
//! assert_eq!(notifier.calls(), vec![true]);
//! ```
//!
//! ## Integration Points
//!
//! - `pharos-types`: `ConnectionState` and `ApplicationState` vocabulary
//! - Platform bridges implement [`ConnectivitySource`] and
//!   [`LifecycleSource`] over the host's probe and lifecycle reporting
//! - Indicator surfaces consume verdicts through the notifier callback or
//!   poll [`OfflineGate::is_effectively_offline`]

pub mod clock;
pub mod config;
pub mod gate;
pub mod mocks;
pub mod scheduler;
pub mod source;

// Re-export main types
pub use clock::{Clock, SystemClock};
pub use config::{
    DefaultParams, GateConfig, ParamProvider, DEFAULT_ONLINE_TO_OFFLINE_WAIT_MS,
    DEFAULT_SETTLE_WAIT_MS, ONLINE_TO_OFFLINE_WAIT_MS_PARAM, SETTLE_WAIT_MS_PARAM,
};
pub use gate::{Notifier, OfflineGate};
pub use scheduler::{Scheduler, Task, TaskHandle, TokioScheduler};
pub use source::{
    ConnectivityObserver, ConnectivitySource, LifecycleObserver, LifecycleSource, SubscriberSet,
    SubscriptionId,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{
        ManualClock, ManualScheduler, MockConnectivitySource, MockLifecycleSource,
        RecordingNotifier,
    };
    use pharos_types::{ApplicationState, ConnectionState};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_gate_integration() {
        let clock = Arc::new(ManualClock::new());
        let scheduler = Arc::new(ManualScheduler::new());
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

        // One full flap cycle: offline settles, recovery is immediate.
        connectivity.emit(ConnectionState::Disconnected);
        clock.advance(Duration::from_secs(2));
        scheduler.fire_next();
        assert!(gate.is_effectively_offline());

        connectivity.emit(ConnectionState::Validated);
        assert!(!gate.is_effectively_offline());
        assert_eq!(notifier.calls(), vec![true, false]);

        gate.destroy();
        assert_eq!(connectivity.subscriber_count(), 0);
        assert_eq!(lifecycle.subscriber_count(), 0);
    }
}
