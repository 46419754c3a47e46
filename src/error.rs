//! Closed error taxonomy for the bridge core.
//!
//! Each variant carries a human message with the offending context folded
//! in (path, attribute id, port name, ...). Policy for how the supervisor
//! reacts to each kind lives in `supervisor.rs`, not here.

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("transport closed: {0}")]
    TransportClosed(String),

    #[error("transport timed out after {0:?}")]
    TransportTimeout(Duration),

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("api request failed: {0}")]
    ApiFailed(String),

    #[error("serial i/o error: {0}")]
    SerialIo(String),

    #[error("invalid rule: {0}")]
    BadRule(String),

    #[error("invalid profile: {0}")]
    BadProfile(String),

    #[error("storage error: {0}")]
    IoStorage(String),
}

pub type BridgeResult<T> = Result<T, BridgeError>;
