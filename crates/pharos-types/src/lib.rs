//! # Pharos Types - Core Types for Connectivity Gating
//!
//! Shared vocabulary for the Pharos stability gate: the connection states a
//! connectivity probe can report, the lifecycle states the embedding
//! application moves through, and the errors raised when raw platform codes
//! do not decode.
//!
//! ## Key Components
//!
//! - [`ConnectionState`]: Probe verdicts from `None` through `Validated`
//! - [`ApplicationState`]: Activity-based application lifecycle
//! - [`StateCodeError`]: Decode failures for raw platform codes

pub mod application;
pub mod connection;
pub mod error;

// Re-export main types
pub use application::ApplicationState;
pub use connection::ConnectionState;
pub use error::{StateCodeError, TypesResult};
