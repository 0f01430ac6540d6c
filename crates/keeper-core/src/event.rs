//! Session and watch notifications.
//!
//! Every session owns one event channel created at dial time, and each watched
//! read hands back another channel armed for one path. Both are rendezvous
//! channels: a send blocks until a consumer takes the event, so a test that
//! injects an event only proceeds once the client has observed it.

#![allow(clippy::disallowed_types, reason = "Channel endpoints shared between threads")]

use std::{
    sync::{
        Arc, Mutex, PoisonError,
        mpsc::{self, Receiver, RecvTimeoutError, SyncSender},
    },
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::error::KeeperError;

/// Connection state of a session as reported by session events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    /// Nothing observed yet
    #[default]
    Unknown,
    /// Connection to the ensemble lost; the session may still be alive
    Disconnected,
    /// Attempting to (re)connect
    Connecting,
    /// Connected with full read/write access
    SyncConnected,
    /// Connected to a read-only server
    ConnectedReadOnly,
    /// Session expired; ephemeral nodes and watches are gone
    Expired,
    /// Authentication was rejected
    AuthFailed,
    /// Session closed locally
    Closed,
}

impl SessionState {
    /// Whether requests can currently be served.
    pub fn is_connected(self) -> bool {
        matches!(self, Self::SyncConnected | Self::ConnectedReadOnly)
    }
}

/// What an event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    /// Session state change
    Session,
    /// Watched node was created
    NodeCreated,
    /// Watched node was deleted
    NodeDeleted,
    /// Watched node's data changed
    NodeDataChanged,
    /// Watched node's children changed
    NodeChildrenChanged,
    /// Watch was removed server-side
    NotWatching,
}

/// A session or watch notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Kind of notification
    pub kind: EventType,
    /// Session state at the time of the event
    pub state: SessionState,
    /// Affected path for node events
    pub path: Option<String>,
}

impl Event {
    /// Session established.
    pub fn connected() -> Self {
        Self::session(SessionState::SyncConnected)
    }

    /// Connection lost.
    pub fn disconnected() -> Self {
        Self::session(SessionState::Disconnected)
    }

    /// Session expired.
    pub fn expired() -> Self {
        Self::session(SessionState::Expired)
    }

    /// Session state change.
    pub fn session(state: SessionState) -> Self {
        Self { kind: EventType::Session, state, path: None }
    }

    /// Per-path notification on a connected session.
    pub fn node(kind: EventType, path: impl Into<String>) -> Self {
        Self { kind, state: SessionState::SyncConnected, path: Some(path.into()) }
    }
}

/// Create a rendezvous event channel.
pub fn event_channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::sync_channel(0);
    (
        EventSender { inner: Arc::new(Mutex::new(Some(tx))) },
        EventReceiver { inner: Arc::new(Mutex::new(rx)) },
    )
}

/// Producing end of an event channel.
///
/// Clones share the same underlying channel; [`EventSender::close`] closes it
/// for all of them.
#[derive(Debug, Clone)]
pub struct EventSender {
    inner: Arc<Mutex<Option<SyncSender<Event>>>>,
}

impl EventSender {
    /// Deliver an event, blocking until a consumer receives it.
    ///
    /// # Errors
    ///
    /// - `KeeperError::ConnectionClosed` if the channel was closed or every
    ///   receiver is gone
    pub fn send(&self, event: Event) -> Result<(), KeeperError> {
        // Clone out of the lock so a blocked send never stalls `close`.
        let tx = self.inner.lock().unwrap_or_else(PoisonError::into_inner).clone();
        match tx {
            Some(tx) => tx.send(event).map_err(|_| KeeperError::ConnectionClosed),
            None => Err(KeeperError::ConnectionClosed),
        }
    }

    /// Close the channel. Returns `false` if it was already closed.
    ///
    /// Receivers observe the close once every in-flight send has completed.
    pub fn close(&self) -> bool {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).take().is_some()
    }

    /// Whether [`EventSender::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).is_none()
    }
}

/// Consuming end of an event channel.
///
/// Clones share the same queue: each event is received by exactly one of
/// them.
#[derive(Debug, Clone)]
pub struct EventReceiver {
    inner: Arc<Mutex<Receiver<Event>>>,
}

impl EventReceiver {
    /// Block until an event arrives. `None` once the channel is closed.
    pub fn recv(&self) -> Option<Event> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).recv().ok()
    }

    /// Next event if a sender is currently offering one.
    pub fn try_recv(&self) -> Option<Event> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).try_recv().ok()
    }

    /// Block for at most `timeout`. `None` on timeout or close.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Event> {
        match self.inner.lock().unwrap_or_else(PoisonError::into_inner).recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }
}
