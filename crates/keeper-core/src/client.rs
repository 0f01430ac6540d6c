//! Client lifecycle and session tracking.
//!
//! # Lifecycle
//!
//! ```text
//! ┌────────┐  start (dial)  ┌─────────┐  close  ┌─────────┐
//! │ Latent │───────────────>│ Started │────────>│ Stopped │
//! └────────┘                └─────────┘         └─────────┘
//!      │                                             ↑
//!      └─────────────────────── close ───────────────┘
//! ```
//!
//! Building a client never dials. `start` dials exactly once and spawns a
//! session-watcher thread that drains the session event channel until it is
//! closed. `close` ends the session exactly once; later calls are no-ops.
//! Request builders live in [`crate::ops`].

#![allow(clippy::disallowed_types, reason = "Lifecycle state shared with the watcher thread")]

use std::{
    fmt,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    thread,
};

use crate::{
    config::ClientConfig,
    connection::Connection,
    error::KeeperError,
    event::{Event, EventReceiver, EventType, SessionState},
    path,
    retry::call_with_retry,
};

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a client instance. Clones of a client share it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// Observable lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Built, not started
    Latent,
    /// Session established
    Started,
    /// Closed
    Stopped,
}

/// Callback invoked for every event on the session channel.
pub type SessionListener = Arc<dyn Fn(&Event) + Send + Sync>;

enum Lifecycle {
    Latent,
    Started(Arc<dyn Connection>),
    Stopped,
}

struct ClientInner {
    id: ClientId,
    config: ClientConfig,
    lifecycle: Mutex<Lifecycle>,
    session_state: Mutex<SessionState>,
    listeners: Mutex<Vec<SessionListener>>,
    namespace_ready: AtomicBool,
}

/// Client for a hierarchical coordination service.
///
/// Cheap to clone; clones share the session.
#[derive(Clone)]
pub struct KeeperClient {
    inner: Arc<ClientInner>,
}

impl KeeperClient {
    pub(crate) fn new(config: ClientConfig) -> Self {
        let id = ClientId(NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed));
        Self {
            inner: Arc::new(ClientInner {
                id,
                config,
                lifecycle: Mutex::new(Lifecycle::Latent),
                session_state: Mutex::new(SessionState::Unknown),
                listeners: Mutex::new(Vec::new()),
                namespace_ready: AtomicBool::new(false),
            }),
        }
    }

    /// Identity shared by all clones of this client.
    pub fn id(&self) -> ClientId {
        self.inner.id
    }

    /// Configuration the client was built from.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Namespace prefix. Empty when unset.
    pub fn namespace(&self) -> &str {
        self.inner.config.namespace()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ClientState {
        match *self.lifecycle() {
            Lifecycle::Latent => ClientState::Latent,
            Lifecycle::Started(_) => ClientState::Started,
            Lifecycle::Stopped => ClientState::Stopped,
        }
    }

    /// Last session state reported on the session channel.
    pub fn session_state(&self) -> SessionState {
        *self.inner.session_state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a callback for session channel events.
    pub fn add_session_listener(&self, listener: impl Fn(&Event) + Send + Sync + 'static) {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(listener));
    }

    /// Establish the session.
    ///
    /// Dials once with the resolved connect string, the configured session
    /// timeout and read-only flag, then registers configured credentials.
    ///
    /// # Errors
    ///
    /// - `KeeperError::AlreadyStarted` if the client is running
    /// - `KeeperError::ConnectionClosed` if the client was closed
    /// - Any dial or `add_auth` failure; the client stays latent
    pub fn start(&self) -> Result<(), KeeperError> {
        let mut lifecycle = self.lifecycle();
        match *lifecycle {
            Lifecycle::Latent => {},
            Lifecycle::Started(_) => return Err(KeeperError::AlreadyStarted),
            Lifecycle::Stopped => return Err(KeeperError::ConnectionClosed),
        }

        let config = &self.inner.config;
        let connect_string = config.ensemble_provider().connection_string();
        let session = config.dialer().dial(
            &connect_string,
            config.session_timeout(),
            config.can_be_read_only(),
        )?;

        for auth in config.auth_infos() {
            if let Err(err) = session.connection.add_auth(&auth.scheme, &auth.credential) {
                session.connection.close();
                return Err(err);
            }
        }

        if let Err(err) = self.spawn_session_watcher(session.events) {
            session.connection.close();
            return Err(err);
        }

        *lifecycle = Lifecycle::Started(session.connection);
        tracing::info!(client = %self.id(), connect_string = %connect_string, "client started");
        Ok(())
    }

    /// End the session. Idempotent.
    ///
    /// Closing a client that never started only marks it stopped.
    pub fn close(&self) -> Result<(), KeeperError> {
        let previous = std::mem::replace(&mut *self.lifecycle(), Lifecycle::Stopped);

        match previous {
            Lifecycle::Started(connection) => {
                connection.close();
                tracing::info!(client = %self.id(), "client closed");
            },
            Lifecycle::Latent => tracing::debug!(client = %self.id(), "closing latent client"),
            Lifecycle::Stopped => {},
        }
        Ok(())
    }

    /// Established session.
    ///
    /// # Errors
    ///
    /// - `KeeperError::NotStarted` before `start`
    /// - `KeeperError::ConnectionClosed` after `close`
    pub fn connection(&self) -> Result<Arc<dyn Connection>, KeeperError> {
        match &*self.lifecycle() {
            Lifecycle::Started(connection) => Ok(Arc::clone(connection)),
            Lifecycle::Latent => Err(KeeperError::NotStarted),
            Lifecycle::Stopped => Err(KeeperError::ConnectionClosed),
        }
    }

    /// Run `op` under the configured retry policy.
    pub fn retrying<T>(
        &self,
        op: impl FnMut() -> Result<T, KeeperError>,
    ) -> Result<T, KeeperError> {
        let config = &self.inner.config;
        call_with_retry(
            config.retry_policy().as_ref(),
            config.retry_sleeper().as_ref(),
            config.tracer_driver().as_ref(),
            op,
        )
    }

    /// Validate `path` and prefix it with the namespace, making sure the
    /// namespace root exists first.
    pub(crate) fn fix_path(&self, path: &str) -> Result<String, KeeperError> {
        path::validate_path(path)?;
        self.ensure_namespace()?;
        Ok(path::fix_for_namespace(self.namespace(), path))
    }

    /// Strip the namespace from a path returned by the service.
    pub(crate) fn unfix_path(&self, path: &str) -> String {
        path::unfix_for_namespace(self.namespace(), path)
    }

    fn ensure_namespace(&self) -> Result<(), KeeperError> {
        let Some(root) = path::namespace_root(self.namespace()) else {
            return Ok(());
        };
        if self.inner.namespace_ready.load(Ordering::Acquire) {
            return Ok(());
        }

        self.inner.config.ensure_path_helper().ensure(self, &root, true)?;
        self.inner.namespace_ready.store(true, Ordering::Release);
        Ok(())
    }

    fn spawn_session_watcher(&self, events: EventReceiver) -> Result<(), KeeperError> {
        let inner = Arc::clone(&self.inner);

        thread::Builder::new()
            .name(format!("keeper-session-{}", self.inner.id.0))
            .spawn(move || {
                while let Some(event) = events.recv() {
                    inner.observe(&event);
                }
                inner.observe(&Event::session(SessionState::Closed));
                tracing::debug!(client = %inner.id, "session channel closed");
            })
            .map(drop)
            .map_err(|err| KeeperError::Dial(format!("cannot spawn session watcher: {err}")))
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.inner.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ClientInner {
    fn observe(&self, event: &Event) {
        if event.kind == EventType::Session {
            let mut state = self.session_state.lock().unwrap_or_else(PoisonError::into_inner);
            let previous = *state;
            if previous != event.state {
                tracing::info!(
                    client = %self.id,
                    from = ?previous,
                    to = ?event.state,
                    "session state changed"
                );
            }
            *state = event.state;
        } else {
            tracing::debug!(
                client = %self.id,
                kind = ?event.kind,
                path = ?event.path,
                "node event"
            );
        }

        let listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner).clone();
        for listener in listeners {
            listener(event);
        }
    }
}

impl fmt::Debug for KeeperClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeeperClient")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("namespace", &self.namespace())
            .finish_non_exhaustive()
    }
}
