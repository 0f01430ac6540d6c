//! Session contract of the coordination service.
//!
//! [`Connection`] is one established session; [`Dialer`] establishes them.
//! The client framework only ever talks to the service through these two
//! traits, which is what lets tests swap in programmable doubles.

use std::{fmt, sync::Arc, time::Duration};

use bytes::Bytes;

use crate::{
    error::KeeperError,
    event::EventReceiver,
    node::{Acl, Stat},
    op::{MultiOp, MultiResponse},
};

/// An established session.
///
/// Paths are absolute (`/a/b`). Versions are 32-bit; [`crate::ANY_VERSION`]
/// disables the version check. Watched variants additionally return a channel
/// that receives exactly one event when the path changes.
///
/// # Invariants
///
/// - `close` is called at most once per session
pub trait Connection: Send + Sync {
    /// Add authentication credentials to the session.
    fn add_auth(&self, scheme: &str, credential: &[u8]) -> Result<(), KeeperError>;

    /// Create a node. Returns the created path (which carries the sequence
    /// suffix for sequential modes).
    fn create(&self, path: &str, data: &[u8], flags: i32, acl: &[Acl])
    -> Result<String, KeeperError>;

    /// Whether a node exists, with its stat when it does.
    fn exists(&self, path: &str) -> Result<(bool, Option<Stat>), KeeperError>;

    /// [`Connection::exists`] plus a watch armed for `path`.
    fn exists_w(&self, path: &str) -> Result<(bool, Option<Stat>, EventReceiver), KeeperError>;

    /// Node payload and stat.
    fn get(&self, path: &str) -> Result<(Bytes, Option<Stat>), KeeperError>;

    /// [`Connection::get`] plus a watch armed for `path`.
    fn get_w(&self, path: &str) -> Result<(Bytes, Option<Stat>, EventReceiver), KeeperError>;

    /// Replace a node's payload if its version matches.
    fn set(&self, path: &str, data: &[u8], version: i32) -> Result<Option<Stat>, KeeperError>;

    /// Child names (not full paths) and the parent's stat.
    fn children(&self, path: &str) -> Result<(Vec<String>, Option<Stat>), KeeperError>;

    /// [`Connection::children`] plus a watch armed for `path`.
    fn children_w(
        &self,
        path: &str,
    ) -> Result<(Vec<String>, Option<Stat>, EventReceiver), KeeperError>;

    /// Node ACL and stat.
    fn get_acl(&self, path: &str) -> Result<(Vec<Acl>, Option<Stat>), KeeperError>;

    /// Replace a node's ACL if its ACL version matches.
    fn set_acl(&self, path: &str, acl: &[Acl], version: i32)
    -> Result<Option<Stat>, KeeperError>;

    /// Delete a node if its version matches.
    fn delete(&self, path: &str, version: i32) -> Result<(), KeeperError>;

    /// Apply sub-operations atomically.
    fn multi(&self, ops: &[MultiOp]) -> Result<Vec<MultiResponse>, KeeperError>;

    /// Flush the leader channel for `path`.
    fn sync(&self, path: &str) -> Result<String, KeeperError>;

    /// End the session.
    fn close(&self);
}

/// Result of a successful dial.
#[derive(Clone)]
pub struct Session {
    /// The established session
    pub connection: Arc<dyn Connection>,
    /// Session event channel, closed when the session ends
    pub events: EventReceiver,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("connection", &Arc::as_ptr(&self.connection).cast::<()>())
            .field("events", &self.events)
            .finish()
    }
}

/// Session factory.
pub trait Dialer: Send + Sync {
    /// Establish a session with the ensemble.
    ///
    /// # Errors
    ///
    /// - `KeeperError::Dial` if no session could be established
    fn dial(
        &self,
        connect_string: &str,
        session_timeout: Duration,
        can_be_read_only: bool,
    ) -> Result<Session, KeeperError>;
}
