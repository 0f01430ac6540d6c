//! Doubles for the client's pluggable strategies.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use bytes::Bytes;
use keeper_core::{
    Acl, AclProvider, ClientId, Closeable, CompressionProvider, EnsurePath, EnsurePathHelper,
    KeeperClient, KeeperError, RetrySleeper, TracerDriver,
};

use crate::expectation::{CallTable, ExpectationHandle};

/// A call received by [`CompressionDouble`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompressionCall {
    /// `compress(path, data)`
    Compress {
        /// Node path
        path: String,
        /// Uncompressed payload
        data: Bytes,
    },
    /// `decompress(path, data)`
    Decompress {
        /// Node path
        path: String,
        /// Compressed payload
        data: Bytes,
    },
}

/// Stub [`CompressionProvider`].
#[derive(Debug, Clone)]
pub struct CompressionDouble {
    calls: CallTable<CompressionCall, Result<Bytes, KeeperError>>,
}

impl Default for CompressionDouble {
    fn default() -> Self {
        Self::new()
    }
}

impl CompressionDouble {
    /// Double with nothing programmed.
    pub fn new() -> Self {
        Self { calls: CallTable::new("compression") }
    }

    /// Expectation table, for verification.
    pub fn calls(&self) -> &CallTable<CompressionCall, Result<Bytes, KeeperError>> {
        &self.calls
    }

    /// Program `compress`.
    pub fn expect_compress(
        &self,
        path: impl Into<String>,
        data: impl Into<Bytes>,
        reply: Result<Bytes, KeeperError>,
    ) -> ExpectationHandle<CompressionCall, Result<Bytes, KeeperError>> {
        self.calls
            .program(CompressionCall::Compress { path: path.into(), data: data.into() }, reply)
    }

    /// Program `decompress`.
    pub fn expect_decompress(
        &self,
        path: impl Into<String>,
        data: impl Into<Bytes>,
        reply: Result<Bytes, KeeperError>,
    ) -> ExpectationHandle<CompressionCall, Result<Bytes, KeeperError>> {
        self.calls
            .program(CompressionCall::Decompress { path: path.into(), data: data.into() }, reply)
    }
}

impl CompressionProvider for CompressionDouble {
    fn compress(&self, path: &str, data: &[u8]) -> Result<Bytes, KeeperError> {
        self.calls.invoke(CompressionCall::Compress {
            path: path.to_string(),
            data: Bytes::copy_from_slice(data),
        })
    }

    fn decompress(&self, path: &str, data: &[u8]) -> Result<Bytes, KeeperError> {
        self.calls.invoke(CompressionCall::Decompress {
            path: path.to_string(),
            data: Bytes::copy_from_slice(data),
        })
    }
}

/// A call received by [`AclProviderDouble`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AclCall {
    /// `default_acl()`
    DefaultAcl,
    /// `acl_for_path(path)`
    AclForPath {
        /// Node path
        path: String,
    },
}

/// Stub [`AclProvider`]. ACL lookups cannot fail, so replies are plain lists.
#[derive(Debug, Clone)]
pub struct AclProviderDouble {
    calls: CallTable<AclCall, Vec<Acl>>,
}

impl Default for AclProviderDouble {
    fn default() -> Self {
        Self::new()
    }
}

impl AclProviderDouble {
    /// Double with nothing programmed.
    pub fn new() -> Self {
        Self { calls: CallTable::new("acl provider") }
    }

    /// Expectation table, for verification.
    pub fn calls(&self) -> &CallTable<AclCall, Vec<Acl>> {
        &self.calls
    }

    /// Program `default_acl`.
    pub fn expect_default_acl(&self, reply: Vec<Acl>) -> ExpectationHandle<AclCall, Vec<Acl>> {
        self.calls.program(AclCall::DefaultAcl, reply)
    }

    /// Program `acl_for_path`.
    pub fn expect_acl_for_path(
        &self,
        path: impl Into<String>,
        reply: Vec<Acl>,
    ) -> ExpectationHandle<AclCall, Vec<Acl>> {
        self.calls.program(AclCall::AclForPath { path: path.into() }, reply)
    }
}

impl AclProvider for AclProviderDouble {
    fn default_acl(&self) -> Vec<Acl> {
        self.calls.invoke(AclCall::DefaultAcl)
    }

    fn acl_for_path(&self, path: &str) -> Vec<Acl> {
        self.calls.invoke(AclCall::AclForPath { path: path.to_string() })
    }
}

/// A call received by [`EnsurePathDouble`]. Clients are matched by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnsurePathCall {
    /// `ensure(client)`
    Ensure {
        /// Id of the calling client
        client: ClientId,
    },
    /// `excluding_last()`
    ExcludingLast,
}

/// Canned reply paired with an [`EnsurePathCall`].
#[derive(Clone)]
pub enum EnsurePathReply {
    /// Reply to `ensure`
    Ensure(Result<(), KeeperError>),
    /// Reply to `excluding_last`
    ExcludingLast(Arc<dyn EnsurePath>),
}

impl fmt::Debug for EnsurePathReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ensure(reply) => f.debug_tuple("Ensure").field(reply).finish(),
            Self::ExcludingLast(_) => f.write_str("ExcludingLast(..)"),
        }
    }
}

/// Stub [`EnsurePath`].
#[derive(Debug, Clone)]
pub struct EnsurePathDouble {
    calls: CallTable<EnsurePathCall, EnsurePathReply>,
}

impl Default for EnsurePathDouble {
    fn default() -> Self {
        Self::new()
    }
}

impl EnsurePathDouble {
    /// Double with nothing programmed.
    pub fn new() -> Self {
        Self { calls: CallTable::new("ensure path") }
    }

    /// Expectation table, for verification.
    pub fn calls(&self) -> &CallTable<EnsurePathCall, EnsurePathReply> {
        &self.calls
    }

    /// Program `ensure` for `client`.
    pub fn expect_ensure(
        &self,
        client: &KeeperClient,
        reply: Result<(), KeeperError>,
    ) -> ExpectationHandle<EnsurePathCall, EnsurePathReply> {
        self.calls
            .program(EnsurePathCall::Ensure { client: client.id() }, EnsurePathReply::Ensure(reply))
    }

    /// Program `excluding_last`.
    pub fn expect_excluding_last(
        &self,
        reply: Arc<dyn EnsurePath>,
    ) -> ExpectationHandle<EnsurePathCall, EnsurePathReply> {
        self.calls.program(EnsurePathCall::ExcludingLast, EnsurePathReply::ExcludingLast(reply))
    }
}

#[allow(clippy::panic, reason = "Misprogrammed double aborts the test")]
fn mismatched(call: &'static str, reply: &EnsurePathReply) -> ! {
    panic!("ensure path: {call} programmed with mismatched reply {reply:?}")
}

impl EnsurePath for EnsurePathDouble {
    fn ensure(&self, client: &KeeperClient) -> Result<(), KeeperError> {
        match self.calls.invoke(EnsurePathCall::Ensure { client: client.id() }) {
            EnsurePathReply::Ensure(reply) => reply,
            other => mismatched("Ensure", &other),
        }
    }

    fn excluding_last(&self) -> Arc<dyn EnsurePath> {
        match self.calls.invoke(EnsurePathCall::ExcludingLast) {
            EnsurePathReply::ExcludingLast(reply) => reply,
            other => mismatched("ExcludingLast", &other),
        }
    }
}

/// A call received by [`EnsurePathHelperDouble`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnsurePathHelperCall {
    /// Id of the calling client
    pub client: ClientId,
    /// Path to ensure
    pub path: String,
    /// Whether the last segment is created too
    pub make_last_node: bool,
}

/// Stub [`EnsurePathHelper`].
#[derive(Debug, Clone)]
pub struct EnsurePathHelperDouble {
    calls: CallTable<EnsurePathHelperCall, Result<(), KeeperError>>,
}

impl Default for EnsurePathHelperDouble {
    fn default() -> Self {
        Self::new()
    }
}

impl EnsurePathHelperDouble {
    /// Double with nothing programmed.
    pub fn new() -> Self {
        Self { calls: CallTable::new("ensure path helper") }
    }

    /// Expectation table, for verification.
    pub fn calls(&self) -> &CallTable<EnsurePathHelperCall, Result<(), KeeperError>> {
        &self.calls
    }

    /// Program `ensure(client, path, make_last_node)`.
    pub fn expect_ensure(
        &self,
        client: &KeeperClient,
        path: impl Into<String>,
        make_last_node: bool,
        reply: Result<(), KeeperError>,
    ) -> ExpectationHandle<EnsurePathHelperCall, Result<(), KeeperError>> {
        let call = EnsurePathHelperCall { client: client.id(), path: path.into(), make_last_node };
        self.calls.program(call, reply)
    }
}

impl EnsurePathHelper for EnsurePathHelperDouble {
    fn ensure(
        &self,
        client: &KeeperClient,
        path: &str,
        make_last_node: bool,
    ) -> Result<(), KeeperError> {
        self.calls.invoke(EnsurePathHelperCall {
            client: client.id(),
            path: path.to_string(),
            make_last_node,
        })
    }
}

/// Stub [`RetrySleeper`]. Matches on the exact pause the policy asks for and
/// never actually sleeps.
#[derive(Debug, Clone)]
pub struct RetrySleeperDouble {
    calls: CallTable<Duration, Result<(), KeeperError>>,
}

impl Default for RetrySleeperDouble {
    fn default() -> Self {
        Self::new()
    }
}

impl RetrySleeperDouble {
    /// Double with nothing programmed.
    pub fn new() -> Self {
        Self { calls: CallTable::new("retry sleeper") }
    }

    /// Expectation table, for verification.
    pub fn calls(&self) -> &CallTable<Duration, Result<(), KeeperError>> {
        &self.calls
    }

    /// Program `sleep_for(duration)`. An error reply stops the retry loop.
    pub fn expect_sleep(
        &self,
        duration: Duration,
        reply: Result<(), KeeperError>,
    ) -> ExpectationHandle<Duration, Result<(), KeeperError>> {
        self.calls.program(duration, reply)
    }
}

impl RetrySleeper for RetrySleeperDouble {
    fn sleep_for(&self, duration: Duration) -> Result<(), KeeperError> {
        self.calls.invoke(duration)
    }
}

/// A call received by [`TracerDriverDouble`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TracerCall {
    /// `add_time(name, elapsed)`
    AddTime {
        /// Measurement name
        name: String,
        /// Measured duration
        elapsed: Duration,
    },
    /// `add_count(name, increment)`
    AddCount {
        /// Counter name
        name: String,
        /// Amount added
        increment: i32,
    },
}

/// Stub [`TracerDriver`].
#[derive(Debug, Clone)]
pub struct TracerDriverDouble {
    calls: CallTable<TracerCall, ()>,
}

impl Default for TracerDriverDouble {
    fn default() -> Self {
        Self::new()
    }
}

impl TracerDriverDouble {
    /// Double with nothing programmed.
    pub fn new() -> Self {
        Self { calls: CallTable::new("tracer driver") }
    }

    /// Expectation table, for verification.
    pub fn calls(&self) -> &CallTable<TracerCall, ()> {
        &self.calls
    }

    /// Program `add_time`.
    pub fn expect_add_time(
        &self,
        name: impl Into<String>,
        elapsed: Duration,
    ) -> ExpectationHandle<TracerCall, ()> {
        self.calls.program(TracerCall::AddTime { name: name.into(), elapsed }, ())
    }

    /// Program `add_count`.
    pub fn expect_add_count(
        &self,
        name: impl Into<String>,
        increment: i32,
    ) -> ExpectationHandle<TracerCall, ()> {
        self.calls.program(TracerCall::AddCount { name: name.into(), increment }, ())
    }
}

impl TracerDriver for TracerDriverDouble {
    fn add_time(&self, name: &str, elapsed: Duration) {
        self.calls.invoke(TracerCall::AddTime { name: name.to_string(), elapsed });
    }

    fn add_count(&self, name: &str, increment: i32) {
        self.calls.invoke(TracerCall::AddCount { name: name.to_string(), increment });
    }
}

/// The only call a [`CloseableDouble`] receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloseCall;

/// Stub [`Closeable`] with a crash switch.
#[derive(Debug, Clone)]
pub struct CloseableDouble {
    calls: CallTable<CloseCall, Result<(), KeeperError>>,
    crash: Arc<AtomicBool>,
}

impl Default for CloseableDouble {
    fn default() -> Self {
        Self::new()
    }
}

impl CloseableDouble {
    /// Double with nothing programmed.
    pub fn new() -> Self {
        Self { calls: CallTable::new("closeable"), crash: Arc::new(AtomicBool::new(false)) }
    }

    /// Expectation table, for verification.
    pub fn calls(&self) -> &CallTable<CloseCall, Result<(), KeeperError>> {
        &self.calls
    }

    /// Program `close`.
    pub fn expect_close(
        &self,
        reply: Result<(), KeeperError>,
    ) -> ExpectationHandle<CloseCall, Result<(), KeeperError>> {
        self.calls.program(CloseCall, reply)
    }

    /// Make `close` panic instead of matching.
    pub fn crash_on_close(&self) {
        self.crash.store(true, Ordering::SeqCst);
    }
}

impl Closeable for CloseableDouble {
    #[allow(clippy::panic, reason = "Fault injection")]
    fn close(&self) -> Result<(), KeeperError> {
        if self.crash.load(Ordering::SeqCst) {
            panic!("closeable: close aborted abnormally");
        }
        self.calls.invoke(CloseCall)
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use keeper_core::{ClientConfig, close_quietly, open_acl_unsafe};

    use super::*;
    use crate::dialer::DialerDouble;

    fn latent_client() -> KeeperClient {
        ClientConfig::builder()
            .dialer(Arc::new(DialerDouble::new()))
            .connect_string("localhost:2181")
            .build()
            .unwrap()
    }

    #[test]
    fn compression_replies_per_direction() {
        let compression = CompressionDouble::new();
        let _ = compression.expect_compress("/a", "plain", Ok(Bytes::from_static(b"packed")));
        let _ = compression.expect_decompress("/a", "packed", Ok(Bytes::from_static(b"plain")));

        assert_eq!(compression.compress("/a", b"plain"), Ok(Bytes::from_static(b"packed")));
        assert_eq!(compression.decompress("/a", b"packed"), Ok(Bytes::from_static(b"plain")));
        assert!(compression.calls().verify().is_ok());
    }

    #[test]
    fn compression_failure_is_returned() {
        let compression = CompressionDouble::new();
        let _ = compression.expect_compress(
            "/a",
            "x",
            Err(KeeperError::Compression("corrupt".to_string())),
        );

        assert_eq!(
            compression.compress("/a", b"x"),
            Err(KeeperError::Compression("corrupt".to_string()))
        );
    }

    #[test]
    fn acl_provider_answers_per_path() {
        let acl = AclProviderDouble::new();
        let _ = acl.expect_acl_for_path("/a", open_acl_unsafe()).unlimited();

        assert_eq!(acl.acl_for_path("/a"), open_acl_unsafe());
        assert_eq!(acl.acl_for_path("/a"), open_acl_unsafe());
        assert!(acl.calls().verify().is_ok());
    }

    #[test]
    fn unused_default_acl_is_unsatisfied() {
        let acl = AclProviderDouble::new();
        let _ = acl.expect_default_acl(Vec::new());

        assert!(acl.calls().verify().is_err());
    }

    #[test]
    fn ensure_path_reply_debug_hides_handle() {
        let reply = EnsurePathReply::ExcludingLast(Arc::new(EnsurePathDouble::new()));
        assert_eq!(format!("{reply:?}"), "ExcludingLast(..)");
    }

    #[test]
    fn ensure_path_matches_calling_client() {
        let client = latent_client();
        let other = latent_client();
        let ensure = EnsurePathDouble::new();
        let _ = ensure.expect_ensure(&client, Ok(()));

        let wrong_client = catch_unwind(AssertUnwindSafe(|| ensure.ensure(&other)));

        assert!(wrong_client.is_err());
        assert_eq!(ensure.ensure(&client), Ok(()));
    }

    #[test]
    fn excluding_last_hands_out_programmed_ensurer() {
        let client = latent_client();
        let parent = EnsurePathDouble::new();
        let _ = parent.expect_ensure(&client, Err(KeeperError::NoAuth));
        let ensure = EnsurePathDouble::new();
        let _ = ensure.expect_excluding_last(Arc::new(parent.clone()));

        assert_eq!(ensure.excluding_last().ensure(&client), Err(KeeperError::NoAuth));
        assert!(ensure.calls().verify().is_ok());
        assert!(parent.calls().verify().is_ok());
    }

    #[test]
    fn helper_matches_path_and_flag() {
        let client = latent_client();
        let helper = EnsurePathHelperDouble::new();
        let _ = helper.expect_ensure(&client, "/a/b", false, Ok(()));

        assert_eq!(helper.ensure(&client, "/a/b", false), Ok(()));
        assert!(helper.calls().verify().is_ok());
    }

    #[test]
    fn sleeper_matches_requested_pause() {
        let sleeper = RetrySleeperDouble::new();
        let _ = sleeper.expect_sleep(Duration::from_millis(250), Ok(()));

        let wrong = catch_unwind(AssertUnwindSafe(|| sleeper.sleep_for(Duration::from_secs(1))));

        assert!(wrong.is_err());
        assert_eq!(sleeper.sleep_for(Duration::from_millis(250)), Ok(()));
        assert_eq!(sleeper.calls().verify().err().map(|problems| problems.len()), Some(1));
    }

    #[test]
    fn tracer_records_times_and_counts() {
        let tracer = TracerDriverDouble::new();
        let _ = tracer.expect_add_time("get", Duration::from_millis(3));
        let _ = tracer.expect_add_count("retries-allowed", 1).times(2);

        tracer.add_count("retries-allowed", 1);
        tracer.add_time("get", Duration::from_millis(3));
        tracer.add_count("retries-allowed", 1);

        assert!(tracer.calls().verify().is_ok());
    }

    #[test]
    fn close_quietly_swallows_failure() {
        let closeable = CloseableDouble::new();
        let _ = closeable.expect_close(Err(KeeperError::ConnectionLoss));

        assert!(!close_quietly(&closeable));
        assert!(closeable.calls().verify().is_ok());
    }

    #[test]
    fn crashing_closeable_panics_without_matching() {
        let closeable = CloseableDouble::new();
        let _ = closeable.expect_close(Ok(()));
        closeable.crash_on_close();

        let result = catch_unwind(AssertUnwindSafe(|| close_quietly(&closeable)));

        assert!(result.is_err());
        assert!(closeable.calls().invocations().is_empty());
    }
}
