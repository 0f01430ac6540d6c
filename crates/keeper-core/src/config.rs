//! Client configuration.
//!
//! [`ClientConfigBuilder`] collects the collaborators and settings a client
//! needs; [`ClientConfig`] is the immutable result. A config is consumed once
//! to build a [`KeeperClient`] and never changes afterwards; clones share the
//! same collaborators.

use std::{fmt, sync::Arc, time::Duration};

use bytes::Bytes;

use crate::{
    client::KeeperClient,
    connection::Dialer,
    ensemble::{EnsembleProvider, FixedEnsembleProvider},
    error::KeeperError,
    provider::{
        AclProvider, CompressionProvider, DefaultAclProvider, DefaultEnsurePathHelper,
        EnsurePathHelper, NoCompression,
    },
    retry::{RetryNTimes, RetryPolicy, RetrySleeper, ThreadSleeper},
    tracer::{LogTracerDriver, TracerDriver},
};

/// Session timeout requested when dialing.
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(60);

/// Time allowed to establish a connection.
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(15);

/// Credentials registered on every new session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthInfo {
    /// Authentication scheme
    pub scheme: String,
    /// Scheme-specific credential
    pub credential: Bytes,
}

/// Immutable client configuration.
#[derive(Clone)]
pub struct ClientConfig {
    dialer: Arc<dyn Dialer>,
    ensemble_provider: Arc<dyn EnsembleProvider>,
    compression_provider: Arc<dyn CompressionProvider>,
    acl_provider: Arc<dyn AclProvider>,
    ensure_path_helper: Arc<dyn EnsurePathHelper>,
    retry_policy: Arc<dyn RetryPolicy>,
    retry_sleeper: Arc<dyn RetrySleeper>,
    tracer_driver: Arc<dyn TracerDriver>,
    default_data: Bytes,
    namespace: String,
    can_be_read_only: bool,
    session_timeout: Duration,
    connection_timeout: Duration,
    auth_infos: Vec<AuthInfo>,
}

impl ClientConfig {
    /// Start building a configuration.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Build a client. Does not dial; see [`KeeperClient::start`].
    pub fn build_client(&self) -> KeeperClient {
        KeeperClient::new(self.clone())
    }

    /// Session factory.
    pub fn dialer(&self) -> &Arc<dyn Dialer> {
        &self.dialer
    }

    /// Connect string resolver.
    pub fn ensemble_provider(&self) -> &Arc<dyn EnsembleProvider> {
        &self.ensemble_provider
    }

    /// Payload transform.
    pub fn compression_provider(&self) -> &Arc<dyn CompressionProvider> {
        &self.compression_provider
    }

    /// ACL selection for created nodes.
    pub fn acl_provider(&self) -> &Arc<dyn AclProvider> {
        &self.acl_provider
    }

    /// Worker used for path-ensuring.
    pub fn ensure_path_helper(&self) -> &Arc<dyn EnsurePathHelper> {
        &self.ensure_path_helper
    }

    /// Retry policy for connection-level failures.
    pub fn retry_policy(&self) -> &Arc<dyn RetryPolicy> {
        &self.retry_policy
    }

    /// Sleeper used between retries.
    pub fn retry_sleeper(&self) -> &Arc<dyn RetrySleeper> {
        &self.retry_sleeper
    }

    /// Sink for retry counters.
    pub fn tracer_driver(&self) -> &Arc<dyn TracerDriver> {
        &self.tracer_driver
    }

    /// Payload used when a node is created without data.
    pub fn default_data(&self) -> &Bytes {
        &self.default_data
    }

    /// Namespace prefix. Empty when unset.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Whether read-only servers are acceptable.
    pub fn can_be_read_only(&self) -> bool {
        self.can_be_read_only
    }

    /// Session timeout requested at dial time.
    pub fn session_timeout(&self) -> Duration {
        self.session_timeout
    }

    /// Connection establishment timeout.
    pub fn connection_timeout(&self) -> Duration {
        self.connection_timeout
    }

    /// Credentials added to each new session.
    pub fn auth_infos(&self) -> &[AuthInfo] {
        &self.auth_infos
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("connect_string", &self.ensemble_provider.connection_string())
            .field("namespace", &self.namespace)
            .field("default_data", &self.default_data)
            .field("can_be_read_only", &self.can_be_read_only)
            .field("session_timeout", &self.session_timeout)
            .field("connection_timeout", &self.connection_timeout)
            .field("auth_schemes", &self.auth_infos.iter().map(|a| &a.scheme).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Builder for [`ClientConfig`].
///
/// A dialer and an ensemble provider are required; everything else has a
/// default (identity compression, open ACL, top-down path ensuring, three
/// retries one second apart, empty default data, no namespace).
#[derive(Clone)]
pub struct ClientConfigBuilder {
    dialer: Option<Arc<dyn Dialer>>,
    ensemble_provider: Option<Arc<dyn EnsembleProvider>>,
    compression_provider: Arc<dyn CompressionProvider>,
    acl_provider: Arc<dyn AclProvider>,
    ensure_path_helper: Arc<dyn EnsurePathHelper>,
    retry_policy: Arc<dyn RetryPolicy>,
    retry_sleeper: Arc<dyn RetrySleeper>,
    tracer_driver: Arc<dyn TracerDriver>,
    default_data: Bytes,
    namespace: String,
    can_be_read_only: bool,
    session_timeout: Duration,
    connection_timeout: Duration,
    auth_infos: Vec<AuthInfo>,
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientConfigBuilder {
    /// Builder with defaults and no dialer or ensemble.
    pub fn new() -> Self {
        Self {
            dialer: None,
            ensemble_provider: None,
            compression_provider: Arc::new(NoCompression),
            acl_provider: Arc::new(DefaultAclProvider::default()),
            ensure_path_helper: Arc::new(DefaultEnsurePathHelper),
            retry_policy: Arc::new(RetryNTimes::new(3, Duration::from_secs(1))),
            retry_sleeper: Arc::new(ThreadSleeper),
            tracer_driver: Arc::new(LogTracerDriver),
            default_data: Bytes::new(),
            namespace: String::new(),
            can_be_read_only: false,
            session_timeout: DEFAULT_SESSION_TIMEOUT,
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
            auth_infos: Vec::new(),
        }
    }

    /// Session factory.
    #[must_use]
    pub fn dialer(mut self, dialer: Arc<dyn Dialer>) -> Self {
        self.dialer = Some(dialer);
        self
    }

    /// Connect string resolver.
    #[must_use]
    pub fn ensemble_provider(mut self, provider: Arc<dyn EnsembleProvider>) -> Self {
        self.ensemble_provider = Some(provider);
        self
    }

    /// Shorthand for a [`FixedEnsembleProvider`].
    #[must_use]
    pub fn connect_string(self, connect_string: impl Into<String>) -> Self {
        self.ensemble_provider(Arc::new(FixedEnsembleProvider::new(connect_string)))
    }

    /// Payload transform.
    #[must_use]
    pub fn compression_provider(mut self, provider: Arc<dyn CompressionProvider>) -> Self {
        self.compression_provider = provider;
        self
    }

    /// ACL selection.
    #[must_use]
    pub fn acl_provider(mut self, provider: Arc<dyn AclProvider>) -> Self {
        self.acl_provider = provider;
        self
    }

    /// Path-ensuring worker.
    #[must_use]
    pub fn ensure_path_helper(mut self, helper: Arc<dyn EnsurePathHelper>) -> Self {
        self.ensure_path_helper = helper;
        self
    }

    /// Retry policy.
    #[must_use]
    pub fn retry_policy(mut self, policy: Arc<dyn RetryPolicy>) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Sleeper used between retries.
    #[must_use]
    pub fn retry_sleeper(mut self, sleeper: Arc<dyn RetrySleeper>) -> Self {
        self.retry_sleeper = sleeper;
        self
    }

    /// Sink for retry counters.
    #[must_use]
    pub fn tracer_driver(mut self, driver: Arc<dyn TracerDriver>) -> Self {
        self.tracer_driver = driver;
        self
    }

    /// Payload for nodes created without data.
    #[must_use]
    pub fn default_data(mut self, data: impl Into<Bytes>) -> Self {
        self.default_data = data.into();
        self
    }

    /// Namespace prefix for every path.
    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Accept read-only servers.
    #[must_use]
    pub fn can_be_read_only(mut self, can_be_read_only: bool) -> Self {
        self.can_be_read_only = can_be_read_only;
        self
    }

    /// Session timeout requested at dial time.
    #[must_use]
    pub fn session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = timeout;
        self
    }

    /// Connection establishment timeout.
    #[must_use]
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Register credentials on every new session.
    #[must_use]
    pub fn authorization(
        mut self,
        scheme: impl Into<String>,
        credential: impl Into<Bytes>,
    ) -> Self {
        self.auth_infos.push(AuthInfo { scheme: scheme.into(), credential: credential.into() });
        self
    }

    /// Connect string the configured ensemble provider resolves to.
    pub fn resolved_connect_string(&self) -> Option<String> {
        self.ensemble_provider.as_ref().map(|provider| provider.connection_string())
    }

    /// Finish the configuration.
    ///
    /// # Errors
    ///
    /// - `KeeperError::BadArguments` if no dialer or ensemble provider is set
    pub fn build_config(self) -> Result<ClientConfig, KeeperError> {
        let dialer =
            self.dialer.ok_or_else(|| KeeperError::BadArguments("dialer is required".into()))?;
        let ensemble_provider = self
            .ensemble_provider
            .ok_or_else(|| KeeperError::BadArguments("ensemble provider is required".into()))?;

        Ok(ClientConfig {
            dialer,
            ensemble_provider,
            compression_provider: self.compression_provider,
            acl_provider: self.acl_provider,
            ensure_path_helper: self.ensure_path_helper,
            retry_policy: self.retry_policy,
            retry_sleeper: self.retry_sleeper,
            tracer_driver: self.tracer_driver,
            default_data: self.default_data,
            namespace: self.namespace,
            can_be_read_only: self.can_be_read_only,
            session_timeout: self.session_timeout,
            connection_timeout: self.connection_timeout,
            auth_infos: self.auth_infos,
        })
    }

    /// Finish the configuration and build a client. Does not dial.
    ///
    /// # Errors
    ///
    /// See [`ClientConfigBuilder::build_config`].
    pub fn build(self) -> Result<KeeperClient, KeeperError> {
        Ok(self.build_config()?.build_client())
    }
}
