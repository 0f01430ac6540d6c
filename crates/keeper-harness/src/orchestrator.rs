//! Test orchestrator: one client, fully doubled, driven through its lifecycle.
//!
//! [`TestClient`] wires every double into a [`ClientConfig`], builds the
//! client, programs and performs exactly one dial, runs the test callback with
//! its parameters injected, waits for background work if the callback asked
//! for a [`CompletionSignal`], then programs and performs exactly one close
//! and verifies every double.
//!
//! The dial is programmed with the harness's own session timeout
//! ([`DEFAULT_SESSION_TIMEOUT`] unless [`TestClient::with_session_timeout`]
//! changes it), so a client that computes a different timeout fails the dial.
//! Every double is linked to the completion signal: a hard failure on any
//! thread ends the wait and falls through to teardown and verification.
//!
//! ```ignore
//! with_client(|conn: ConnectionDouble, client: KeeperClient| {
//!     let _ = conn.expect_get("/a", Ok((Bytes::from_static(b"v"), None)));
//!     assert_eq!(client.get_data().for_path("/a").unwrap().0, "v");
//! });
//! ```

use std::{fmt, sync::Arc, time::Duration};

use bytes::Bytes;
use keeper_core::{
    ClientConfig, ClientConfigBuilder, CompressionProvider, Connection, DEFAULT_SESSION_TIMEOUT,
    Dialer, EventReceiver, EventSender, KeeperClient, RetryOneTime, Session, event_channel,
};

use crate::{
    connection::ConnectionDouble,
    deps::{Callback, Dependencies},
    dialer::DialerDouble,
    error::HarnessError,
    providers::{
        AclProviderDouble, CompressionDouble, EnsurePathHelperDouble, RetrySleeperDouble,
        TracerDriverDouble,
    },
    signal::CompletionSignal,
};

/// Connect string the default configuration resolves to.
pub const DEFAULT_CONNECT_STRING: &str = "connectString";

/// Default payload for creates without data.
pub const DEFAULT_DATA: &[u8] = b"default";

/// Lifecycle of one harness run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarnessState {
    /// Doubles and configuration exist; nothing built yet
    Configured,
    /// Client built, dial programmed
    Built,
    /// Client started, callback running
    Running,
    /// Client closed, doubles verified
    TornDown,
}

/// Fully doubled client under test.
pub struct TestClient {
    state: HarnessState,
    connection: ConnectionDouble,
    dialer: DialerDouble,
    compression: CompressionDouble,
    acl_provider: Option<AclProviderDouble>,
    ensure_path_helper: Option<EnsurePathHelperDouble>,
    retry_sleeper: Option<RetrySleeperDouble>,
    tracer_driver: Option<TracerDriverDouble>,
    session_timeout: Duration,
    sender: EventSender,
    receiver: EventReceiver,
    builder: ClientConfigBuilder,
}

impl Default for TestClient {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TestClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestClient")
            .field("state", &self.state)
            .field("acl_provider", &self.acl_provider.is_some())
            .field("ensure_path_helper", &self.ensure_path_helper.is_some())
            .field("retry_sleeper", &self.retry_sleeper.is_some())
            .field("tracer_driver", &self.tracer_driver.is_some())
            .field("session_timeout", &self.session_timeout)
            .finish_non_exhaustive()
    }
}

impl TestClient {
    /// Fresh doubles, a rendezvous event channel and the default
    /// configuration: fixed connect string, [`DEFAULT_SESSION_TIMEOUT`], a
    /// single retry without backoff, `b"default"` as default data and no
    /// namespace.
    pub fn new() -> Self {
        let connection = ConnectionDouble::new();
        let dialer = DialerDouble::new();
        let compression = CompressionDouble::new();
        let (sender, receiver) = event_channel();

        let builder = ClientConfig::builder()
            .dialer(Arc::new(dialer.clone()))
            .connect_string(DEFAULT_CONNECT_STRING)
            .compression_provider(Arc::new(compression.clone()))
            .session_timeout(DEFAULT_SESSION_TIMEOUT)
            .retry_policy(Arc::new(RetryOneTime::new(Duration::ZERO)))
            .default_data(Bytes::from_static(DEFAULT_DATA));

        Self {
            state: HarnessState::Configured,
            connection,
            dialer,
            compression,
            acl_provider: None,
            ensure_path_helper: None,
            retry_sleeper: None,
            tracer_driver: None,
            session_timeout: DEFAULT_SESSION_TIMEOUT,
            sender,
            receiver,
            builder,
        }
    }

    /// Prefix every client path with `/<namespace>`.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.builder = self.builder.namespace(namespace);
        self
    }

    /// Replace the default ACL provider with an [`AclProviderDouble`].
    #[must_use]
    pub fn with_acl_provider(mut self) -> Self {
        let double = AclProviderDouble::new();
        self.builder = self.builder.acl_provider(Arc::new(double.clone()));
        self.acl_provider = Some(double);
        self
    }

    /// Replace the default ensure-path helper with an
    /// [`EnsurePathHelperDouble`].
    #[must_use]
    pub fn with_ensure_path_helper(mut self) -> Self {
        let double = EnsurePathHelperDouble::new();
        self.builder = self.builder.ensure_path_helper(Arc::new(double.clone()));
        self.ensure_path_helper = Some(double);
        self
    }

    /// Replace the thread sleeper with a [`RetrySleeperDouble`]. Every pause
    /// the retry policy takes must then be programmed.
    #[must_use]
    pub fn with_retry_sleeper(mut self) -> Self {
        let double = RetrySleeperDouble::new();
        self.builder = self.builder.retry_sleeper(Arc::new(double.clone()));
        self.retry_sleeper = Some(double);
        self
    }

    /// Replace the logging tracer with a [`TracerDriverDouble`].
    #[must_use]
    pub fn with_tracer_driver(mut self) -> Self {
        let double = TracerDriverDouble::new();
        self.builder = self.builder.tracer_driver(Arc::new(double.clone()));
        self.tracer_driver = Some(double);
        self
    }

    /// Session timeout both configured and expected at dial time.
    #[must_use]
    pub fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.builder = self.builder.session_timeout(timeout);
        self.session_timeout = timeout;
        self
    }

    /// Adjust the configuration beyond the harness defaults.
    ///
    /// The dial expectation does not follow these changes: a session timeout
    /// set here without [`TestClient::with_session_timeout`] fails the dial.
    #[must_use]
    pub fn configure(
        mut self,
        adjust: impl FnOnce(ClientConfigBuilder) -> ClientConfigBuilder,
    ) -> Self {
        self.builder = adjust(self.builder);
        self
    }

    /// Current lifecycle state.
    pub fn state(&self) -> HarnessState {
        self.state
    }

    /// Connection double, for programming before the run.
    pub fn connection(&self) -> &ConnectionDouble {
        &self.connection
    }

    /// Dialer double.
    pub fn dialer(&self) -> &DialerDouble {
        &self.dialer
    }

    /// Compression double.
    pub fn compression(&self) -> &CompressionDouble {
        &self.compression
    }

    /// ACL provider double, if installed.
    pub fn acl_provider(&self) -> Option<&AclProviderDouble> {
        self.acl_provider.as_ref()
    }

    /// Ensure-path helper double, if installed.
    pub fn ensure_path_helper(&self) -> Option<&EnsurePathHelperDouble> {
        self.ensure_path_helper.as_ref()
    }

    /// Retry sleeper double, if installed.
    pub fn retry_sleeper(&self) -> Option<&RetrySleeperDouble> {
        self.retry_sleeper.as_ref()
    }

    /// Tracer driver double, if installed.
    pub fn tracer_driver(&self) -> Option<&TracerDriverDouble> {
        self.tracer_driver.as_ref()
    }

    /// Sending side of the session event channel.
    pub fn events(&self) -> &EventSender {
        &self.sender
    }

    /// Run `callback` against a started client and verify every double.
    ///
    /// # Errors
    ///
    /// - `HarnessError::Client` if the configuration is invalid or the client
    ///   fails to start
    /// - Any parameter resolution failure; the callback does not run
    /// - `HarnessError::Verification` listing every unmet expectation
    pub fn try_run<Args>(mut self, callback: impl Callback<Args>) -> Result<(), HarnessError> {
        let config = self.builder.clone().build_config()?;
        let client = config.build_client();
        self.transition(HarnessState::Built);

        let session = Session {
            connection: Arc::new(self.connection.clone()),
            events: self.receiver.clone(),
        };
        let _ = self.dialer.expect_dial(
            config.ensemble_provider().connection_string(),
            self.session_timeout,
            config.can_be_read_only(),
            Ok(session),
        );

        client.start()?;
        self.transition(HarnessState::Running);

        let signal = CompletionSignal::new();
        self.abort_on_failure(&signal);
        let mut deps = self.dependencies(&config, &client, &signal);
        let outcome = callback.invoke(&mut deps);
        if outcome.is_ok() && deps.signal_claimed() {
            tracing::debug!(pending = signal.pending(), "waiting for completion signal");
            signal.wait();
            if signal.is_aborted() {
                tracing::warn!(pending = signal.pending(), "double failed while waiting");
            }
        }

        let _ = self.connection.expect_close();
        let closed = client.close();
        self.sender.close();
        self.transition(HarnessState::TornDown);

        closed?;
        outcome?;
        self.verify()
    }

    /// [`TestClient::try_run`], panicking with the failure description.
    ///
    /// # Panics
    ///
    /// On any failure `try_run` reports.
    #[allow(clippy::panic, reason = "Harness failures fail the test")]
    pub fn run<Args>(self, callback: impl Callback<Args>) {
        if let Err(err) = self.try_run(callback) {
            panic!("{err}");
        }
    }

    fn dependencies(
        &self,
        config: &ClientConfig,
        client: &KeeperClient,
        signal: &CompletionSignal,
    ) -> Dependencies {
        let mut deps = Dependencies::new();
        deps.insert(config.clone());
        deps.insert(client.clone());
        deps.insert(self.connection.clone());
        deps.insert::<Arc<dyn Connection>>(Arc::new(self.connection.clone()));
        deps.insert(self.dialer.clone());
        deps.insert::<Arc<dyn Dialer>>(Arc::new(self.dialer.clone()));
        deps.insert(self.compression.clone());
        deps.insert::<Arc<dyn CompressionProvider>>(Arc::new(self.compression.clone()));
        deps.insert(self.sender.clone());
        if let Some(acl_provider) = &self.acl_provider {
            deps.insert(acl_provider.clone());
        }
        if let Some(helper) = &self.ensure_path_helper {
            deps.insert(helper.clone());
        }
        if let Some(sleeper) = &self.retry_sleeper {
            deps.insert(sleeper.clone());
        }
        if let Some(tracer) = &self.tracer_driver {
            deps.insert(tracer.clone());
        }
        deps.with_signal(signal.clone());
        deps
    }

    fn verify(&self) -> Result<(), HarnessError> {
        let mut problems = Vec::new();
        problems.extend(self.connection.calls().verify().err().unwrap_or_default());
        problems.extend(self.dialer.calls().verify().err().unwrap_or_default());
        problems.extend(self.compression.calls().verify().err().unwrap_or_default());
        if let Some(acl_provider) = &self.acl_provider {
            problems.extend(acl_provider.calls().verify().err().unwrap_or_default());
        }
        if let Some(helper) = &self.ensure_path_helper {
            problems.extend(helper.calls().verify().err().unwrap_or_default());
        }
        if let Some(sleeper) = &self.retry_sleeper {
            problems.extend(sleeper.calls().verify().err().unwrap_or_default());
        }
        if let Some(tracer) = &self.tracer_driver {
            problems.extend(tracer.calls().verify().err().unwrap_or_default());
        }

        if problems.is_empty() { Ok(()) } else { Err(HarnessError::Verification(problems)) }
    }

    fn abort_on_failure(&self, signal: &CompletionSignal) {
        self.connection.calls().abort_on_failure(signal.clone());
        self.dialer.calls().abort_on_failure(signal.clone());
        self.compression.calls().abort_on_failure(signal.clone());
        if let Some(acl_provider) = &self.acl_provider {
            acl_provider.calls().abort_on_failure(signal.clone());
        }
        if let Some(helper) = &self.ensure_path_helper {
            helper.calls().abort_on_failure(signal.clone());
        }
        if let Some(sleeper) = &self.retry_sleeper {
            sleeper.calls().abort_on_failure(signal.clone());
        }
        if let Some(tracer) = &self.tracer_driver {
            tracer.calls().abort_on_failure(signal.clone());
        }
    }

    fn transition(&mut self, next: HarnessState) {
        tracing::debug!(from = ?self.state, to = ?next, "harness transition");
        self.state = next;
    }
}

/// Run `callback` against a default [`TestClient`].
pub fn with_client<Args>(callback: impl Callback<Args>) {
    TestClient::new().run(callback);
}

/// Run `callback` against a [`TestClient`] confined to `namespace`.
pub fn with_client_and_namespace<Args>(namespace: &str, callback: impl Callback<Args>) {
    TestClient::new().with_namespace(namespace).run(callback);
}
