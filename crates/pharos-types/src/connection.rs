//! Connection states reported by a connectivity probe
//!
//! A probe classifies the network into one of five states. Only `Validated`
//! means the device has working internet; captive portals and dead access
//! points look connected at the link layer but cannot reach anything.

use serde::{Deserialize, Serialize};

use crate::error::{StateCodeError, TypesResult};

/// Result of the most recent connectivity probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ConnectionState {
    /// No probe has run yet.
    #[default]
    None,

    /// No network interface is connected.
    Disconnected,

    /// Connected to a network that has no route to the internet.
    NoInternet,

    /// Connected but trapped behind a captive portal sign-in page.
    CaptivePortal,

    /// Connected with validated end-to-end internet access.
    Validated,
}

impl ConnectionState {
    /// Is this state offline for gating purposes?
    ///
    /// Everything short of `Validated` counts as offline, including
    /// `CaptivePortal`. A portal page is not usable internet.
    pub fn is_offline(&self) -> bool {
        !matches!(self, ConnectionState::Validated)
    }

    /// Numeric code used by platform bridges and serialized snapshots.
    pub fn code(&self) -> u8 {
        match self {
            ConnectionState::None => 0,
            ConnectionState::Disconnected => 1,
            ConnectionState::NoInternet => 2,
            ConnectionState::CaptivePortal => 3,
            ConnectionState::Validated => 4,
        }
    }

    /// Parse a platform state code back into a `ConnectionState`.
    pub fn from_code(code: u8) -> TypesResult<Self> {
        match code {
            0 => Ok(ConnectionState::None),
            1 => Ok(ConnectionState::Disconnected),
            2 => Ok(ConnectionState::NoInternet),
            3 => Ok(ConnectionState::CaptivePortal),
            4 => Ok(ConnectionState::Validated),
            other => Err(StateCodeError::UnknownConnectionState(other)),
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::None => write!(f, "none"),
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::NoInternet => write!(f, "no-internet"),
            ConnectionState::CaptivePortal => write!(f, "captive-portal"),
            ConnectionState::Validated => write!(f, "validated"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_validated_is_online() {
        assert!(ConnectionState::None.is_offline());
        assert!(ConnectionState::Disconnected.is_offline());
        assert!(ConnectionState::NoInternet.is_offline());
        assert!(ConnectionState::CaptivePortal.is_offline());
        assert!(!ConnectionState::Validated.is_offline());
    }

    #[test]
    fn test_code_round_trip() {
        for state in [
            ConnectionState::None,
            ConnectionState::Disconnected,
            ConnectionState::NoInternet,
            ConnectionState::CaptivePortal,
            ConnectionState::Validated,
        ] {
            assert_eq!(ConnectionState::from_code(state.code()).unwrap(), state);
        }
    }

    #[test]
    fn test_unknown_code_is_rejected() {
        let err = ConnectionState::from_code(9).unwrap_err();
        assert_eq!(err, StateCodeError::UnknownConnectionState(9));
    }

    #[test]
    fn test_serde_round_trip() {
        let json = serde_json::to_string(&ConnectionState::CaptivePortal).unwrap();
        assert_eq!(json, r#""CaptivePortal""#);

        for state in [
            ConnectionState::None,
            ConnectionState::Disconnected,
            ConnectionState::NoInternet,
            ConnectionState::CaptivePortal,
            ConnectionState::Validated,
        ] {
            let json = serde_json::to_string(&state).unwrap();
            let parsed: ConnectionState = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed, state);
        }
    }
}
