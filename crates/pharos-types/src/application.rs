//! Application lifecycle states
//!
//! Mirrors the host platform's activity-based lifecycle reporting. The gate
//! only distinguishes foreground from everything else, but the full state is
//! kept so observers can log and reason about transitions precisely.

use serde::{Deserialize, Serialize};

use crate::error::{StateCodeError, TypesResult};

/// Aggregate lifecycle state of the embedding application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ApplicationState {
    /// Lifecycle has not been reported yet.
    #[default]
    Unknown,

    /// At least one activity is running in the foreground.
    HasRunningActivities,

    /// All activities are paused; the app is visible but not interactive.
    HasPausedActivities,

    /// All activities are stopped; the app is fully backgrounded.
    HasStoppedActivities,

    /// All activities are destroyed.
    HasDestroyedActivities,
}

impl ApplicationState {
    /// Is the application in the foreground?
    ///
    /// Only `HasRunningActivities` counts. Paused still draws frames but the
    /// user is not interacting, so verdicts are held back until resume.
    pub fn is_foreground(&self) -> bool {
        matches!(self, ApplicationState::HasRunningActivities)
    }

    /// Numeric code used by platform bridges and serialized snapshots.
    pub fn code(&self) -> u8 {
        match self {
            ApplicationState::Unknown => 0,
            ApplicationState::HasRunningActivities => 1,
            ApplicationState::HasPausedActivities => 2,
            ApplicationState::HasStoppedActivities => 3,
            ApplicationState::HasDestroyedActivities => 4,
        }
    }

    /// Parse a platform state code back into an `ApplicationState`.
    pub fn from_code(code: u8) -> TypesResult<Self> {
        match code {
            0 => Ok(ApplicationState::Unknown),
            1 => Ok(ApplicationState::HasRunningActivities),
            2 => Ok(ApplicationState::HasPausedActivities),
            3 => Ok(ApplicationState::HasStoppedActivities),
            4 => Ok(ApplicationState::HasDestroyedActivities),
            other => Err(StateCodeError::UnknownApplicationState(other)),
        }
    }
}

impl std::fmt::Display for ApplicationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApplicationState::Unknown => write!(f, "unknown"),
            ApplicationState::HasRunningActivities => write!(f, "running"),
            ApplicationState::HasPausedActivities => write!(f, "paused"),
            ApplicationState::HasStoppedActivities => write!(f, "stopped"),
            ApplicationState::HasDestroyedActivities => write!(f, "destroyed"),
        }
    }
}
