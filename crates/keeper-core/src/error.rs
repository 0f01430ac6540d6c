//! Error types for coordination-service sessions and the client framework.
//!
//! One enum covers both the outcomes a coordination service reports for a
//! request (missing node, version conflict, ...) and the lifecycle errors of
//! the client itself. Errors are `Clone` so programmed replies in test doubles
//! can be handed out more than once.

use thiserror::Error;

/// Errors returned by sessions, providers and the client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeeperError {
    /// Target node does not exist
    #[error("node does not exist")]
    NoNode,

    /// Node already exists
    #[error("node already exists")]
    NodeExists,

    /// Node still has children
    #[error("node has children")]
    NotEmpty,

    /// Expected version did not match the node's version
    #[error("version conflict")]
    BadVersion,

    /// Caller is not authorized for the operation
    #[error("not authenticated")]
    NoAuth,

    /// ACL list was rejected
    #[error("invalid ACL specified")]
    InvalidAcl,

    /// Request arguments were rejected
    #[error("bad arguments: {0}")]
    BadArguments(String),

    /// Connection to the ensemble was lost mid-request
    #[error("connection loss")]
    ConnectionLoss,

    /// Request did not complete in time
    #[error("operation timeout")]
    OperationTimeout,

    /// Session expired on the server side
    #[error("session expired")]
    SessionExpired,

    /// Session or channel was closed locally
    #[error("connection closed")]
    ConnectionClosed,

    /// Client has not been started
    #[error("client not started")]
    NotStarted,

    /// Client was already started
    #[error("client already started")]
    AlreadyStarted,

    /// Payload transform failed
    #[error("compression error: {0}")]
    Compression(String),

    /// Session could not be established
    #[error("dial failed: {0}")]
    Dial(String),
}

impl KeeperError {
    /// Returns true if the request may succeed when retried on the same
    /// client.
    ///
    /// Only connection-level failures qualify. Outcomes describing node state
    /// (`NoNode`, `BadVersion`, ...) are answers, not failures, and retrying
    /// them would return the same answer.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConnectionLoss | Self::OperationTimeout | Self::SessionExpired)
    }
}
