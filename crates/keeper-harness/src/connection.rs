//! Programmable stand-in for an established session.

#![allow(clippy::disallowed_types, reason = "Recorded operations are shared with client threads")]

use std::{
    fmt,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

use bytes::Bytes;
use keeper_core::{Acl, Connection, EventReceiver, KeeperError, MultiOp, MultiResponse, Stat};

use crate::expectation::{CallTable, ExpectationHandle};

/// A call received by [`ConnectionDouble`], matched by structural equality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionCall {
    /// `add_auth(scheme, credential)`
    AddAuth {
        /// Authentication scheme
        scheme: String,
        /// Credential bytes
        credential: Bytes,
    },
    /// `create(path, data, flags, acl)`
    Create {
        /// Node path
        path: String,
        /// Payload
        data: Bytes,
        /// Wire creation flags
        flags: i32,
        /// ACL
        acl: Vec<Acl>,
    },
    /// `exists(path)`
    Exists {
        /// Node path
        path: String,
    },
    /// `exists_w(path)`
    ExistsW {
        /// Node path
        path: String,
    },
    /// `get(path)`
    Get {
        /// Node path
        path: String,
    },
    /// `get_w(path)`
    GetW {
        /// Node path
        path: String,
    },
    /// `set(path, data, version)`
    Set {
        /// Node path
        path: String,
        /// Payload
        data: Bytes,
        /// Expected version
        version: i32,
    },
    /// `children(path)`
    Children {
        /// Node path
        path: String,
    },
    /// `children_w(path)`
    ChildrenW {
        /// Node path
        path: String,
    },
    /// `get_acl(path)`
    GetAcl {
        /// Node path
        path: String,
    },
    /// `set_acl(path, acl, version)`
    SetAcl {
        /// Node path
        path: String,
        /// New ACL
        acl: Vec<Acl>,
        /// Expected ACL version
        version: i32,
    },
    /// `delete(path, version)`
    Delete {
        /// Node path
        path: String,
        /// Expected version
        version: i32,
    },
    /// `multi(ops)`
    Multi {
        /// Sub-operations
        ops: Vec<MultiOp>,
    },
    /// `sync(path)`
    Sync {
        /// Node path
        path: String,
    },
    /// `close()`
    Close,
}

impl ConnectionCall {
    /// Operation name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AddAuth { .. } => "AddAuth",
            Self::Create { .. } => "Create",
            Self::Exists { .. } => "Exists",
            Self::ExistsW { .. } => "ExistsW",
            Self::Get { .. } => "Get",
            Self::GetW { .. } => "GetW",
            Self::Set { .. } => "Set",
            Self::Children { .. } => "Children",
            Self::ChildrenW { .. } => "ChildrenW",
            Self::GetAcl { .. } => "GetACL",
            Self::SetAcl { .. } => "SetACL",
            Self::Delete { .. } => "Delete",
            Self::Multi { .. } => "Multi",
            Self::Sync { .. } => "Sync",
            Self::Close => "Close",
        }
    }
}

/// Canned reply paired with a [`ConnectionCall`].
#[derive(Debug, Clone)]
pub enum ConnectionReply {
    /// Reply to `add_auth`
    AddAuth(Result<(), KeeperError>),
    /// Reply to `create`
    Create(Result<String, KeeperError>),
    /// Reply to `exists`
    Exists(Result<(bool, Option<Stat>), KeeperError>),
    /// Reply to `exists_w`
    ExistsW(Result<(bool, Option<Stat>, EventReceiver), KeeperError>),
    /// Reply to `get`
    Get(Result<(Bytes, Option<Stat>), KeeperError>),
    /// Reply to `get_w`
    GetW(Result<(Bytes, Option<Stat>, EventReceiver), KeeperError>),
    /// Reply to `set`
    Set(Result<Option<Stat>, KeeperError>),
    /// Reply to `children`
    Children(Result<(Vec<String>, Option<Stat>), KeeperError>),
    /// Reply to `children_w`
    ChildrenW(Result<(Vec<String>, Option<Stat>, EventReceiver), KeeperError>),
    /// Reply to `get_acl`
    GetAcl(Result<(Vec<Acl>, Option<Stat>), KeeperError>),
    /// Reply to `set_acl`
    SetAcl(Result<Option<Stat>, KeeperError>),
    /// Reply to `delete`
    Delete(Result<(), KeeperError>),
    /// Reply to `multi`
    Multi(Result<Vec<MultiResponse>, KeeperError>),
    /// Reply to `sync`
    Sync(Result<String, KeeperError>),
    /// Reply to `close`
    Close,
}

/// Stub session.
///
/// Every method looks up a programmed expectation and returns its canned
/// reply; an unprogrammed or exhausted call panics. `multi` records its
/// sub-operations before matching, so tests can inspect what a transaction
/// attempted whatever the stubbed outcome. Clones share all state.
#[derive(Clone)]
pub struct ConnectionDouble {
    calls: CallTable<ConnectionCall, ConnectionReply>,
    recorded: Arc<Mutex<Vec<MultiOp>>>,
    crash_on_close: Arc<AtomicBool>,
}

impl Default for ConnectionDouble {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConnectionDouble {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDouble")
            .field("calls", &self.calls)
            .field("recorded_operations", &self.recorded_operations().len())
            .finish_non_exhaustive()
    }
}

impl ConnectionDouble {
    /// Double with nothing programmed.
    pub fn new() -> Self {
        Self {
            calls: CallTable::new("connection"),
            recorded: Arc::new(Mutex::new(Vec::new())),
            crash_on_close: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Expectation table, for verification.
    pub fn calls(&self) -> &CallTable<ConnectionCall, ConnectionReply> {
        &self.calls
    }

    /// Every call received so far, in order.
    pub fn invocations(&self) -> Vec<ConnectionCall> {
        self.calls.invocations()
    }

    /// How many calls named `name` (see [`ConnectionCall::name`]) were
    /// received.
    pub fn invocation_count(&self, name: &str) -> usize {
        self.calls.invocations().iter().filter(|call| call.name() == name).count()
    }

    /// Every sub-operation passed to `multi`, across all batches.
    pub fn recorded_operations(&self) -> Vec<MultiOp> {
        self.recorded.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Make `close` abort abnormally instead of matching an expectation.
    pub fn crash_on_close(&self) {
        self.crash_on_close.store(true, Ordering::SeqCst);
    }

    /// Program `add_auth`.
    pub fn expect_add_auth(
        &self,
        scheme: impl Into<String>,
        credential: impl Into<Bytes>,
        reply: Result<(), KeeperError>,
    ) -> ExpectationHandle<ConnectionCall, ConnectionReply> {
        self.calls.program(
            ConnectionCall::AddAuth { scheme: scheme.into(), credential: credential.into() },
            ConnectionReply::AddAuth(reply),
        )
    }

    /// Program `create`.
    pub fn expect_create(
        &self,
        path: impl Into<String>,
        data: impl Into<Bytes>,
        flags: i32,
        acl: Vec<Acl>,
        reply: Result<String, KeeperError>,
    ) -> ExpectationHandle<ConnectionCall, ConnectionReply> {
        self.calls.program(
            ConnectionCall::Create { path: path.into(), data: data.into(), flags, acl },
            ConnectionReply::Create(reply),
        )
    }

    /// Program `exists`.
    pub fn expect_exists(
        &self,
        path: impl Into<String>,
        reply: Result<(bool, Option<Stat>), KeeperError>,
    ) -> ExpectationHandle<ConnectionCall, ConnectionReply> {
        self.calls
            .program(ConnectionCall::Exists { path: path.into() }, ConnectionReply::Exists(reply))
    }

    /// Program `exists_w`.
    pub fn expect_exists_w(
        &self,
        path: impl Into<String>,
        reply: Result<(bool, Option<Stat>, EventReceiver), KeeperError>,
    ) -> ExpectationHandle<ConnectionCall, ConnectionReply> {
        self.calls
            .program(ConnectionCall::ExistsW { path: path.into() }, ConnectionReply::ExistsW(reply))
    }

    /// Program `get`.
    pub fn expect_get(
        &self,
        path: impl Into<String>,
        reply: Result<(Bytes, Option<Stat>), KeeperError>,
    ) -> ExpectationHandle<ConnectionCall, ConnectionReply> {
        self.calls.program(ConnectionCall::Get { path: path.into() }, ConnectionReply::Get(reply))
    }

    /// Program `get_w`.
    pub fn expect_get_w(
        &self,
        path: impl Into<String>,
        reply: Result<(Bytes, Option<Stat>, EventReceiver), KeeperError>,
    ) -> ExpectationHandle<ConnectionCall, ConnectionReply> {
        self.calls.program(ConnectionCall::GetW { path: path.into() }, ConnectionReply::GetW(reply))
    }

    /// Program `set`.
    pub fn expect_set(
        &self,
        path: impl Into<String>,
        data: impl Into<Bytes>,
        version: i32,
        reply: Result<Option<Stat>, KeeperError>,
    ) -> ExpectationHandle<ConnectionCall, ConnectionReply> {
        self.calls.program(
            ConnectionCall::Set { path: path.into(), data: data.into(), version },
            ConnectionReply::Set(reply),
        )
    }

    /// Program `children`.
    pub fn expect_children(
        &self,
        path: impl Into<String>,
        reply: Result<(Vec<String>, Option<Stat>), KeeperError>,
    ) -> ExpectationHandle<ConnectionCall, ConnectionReply> {
        self.calls.program(
            ConnectionCall::Children { path: path.into() },
            ConnectionReply::Children(reply),
        )
    }

    /// Program `children_w`.
    pub fn expect_children_w(
        &self,
        path: impl Into<String>,
        reply: Result<(Vec<String>, Option<Stat>, EventReceiver), KeeperError>,
    ) -> ExpectationHandle<ConnectionCall, ConnectionReply> {
        self.calls.program(
            ConnectionCall::ChildrenW { path: path.into() },
            ConnectionReply::ChildrenW(reply),
        )
    }

    /// Program `get_acl`.
    pub fn expect_get_acl(
        &self,
        path: impl Into<String>,
        reply: Result<(Vec<Acl>, Option<Stat>), KeeperError>,
    ) -> ExpectationHandle<ConnectionCall, ConnectionReply> {
        self.calls
            .program(ConnectionCall::GetAcl { path: path.into() }, ConnectionReply::GetAcl(reply))
    }

    /// Program `set_acl`.
    pub fn expect_set_acl(
        &self,
        path: impl Into<String>,
        acl: Vec<Acl>,
        version: i32,
        reply: Result<Option<Stat>, KeeperError>,
    ) -> ExpectationHandle<ConnectionCall, ConnectionReply> {
        self.calls.program(
            ConnectionCall::SetAcl { path: path.into(), acl, version },
            ConnectionReply::SetAcl(reply),
        )
    }

    /// Program `delete`.
    pub fn expect_delete(
        &self,
        path: impl Into<String>,
        version: i32,
        reply: Result<(), KeeperError>,
    ) -> ExpectationHandle<ConnectionCall, ConnectionReply> {
        self.calls.program(
            ConnectionCall::Delete { path: path.into(), version },
            ConnectionReply::Delete(reply),
        )
    }

    /// Program `multi`.
    pub fn expect_multi(
        &self,
        ops: Vec<MultiOp>,
        reply: Result<Vec<MultiResponse>, KeeperError>,
    ) -> ExpectationHandle<ConnectionCall, ConnectionReply> {
        self.calls.program(ConnectionCall::Multi { ops }, ConnectionReply::Multi(reply))
    }

    /// Program `sync`.
    pub fn expect_sync(
        &self,
        path: impl Into<String>,
        reply: Result<String, KeeperError>,
    ) -> ExpectationHandle<ConnectionCall, ConnectionReply> {
        self.calls.program(ConnectionCall::Sync { path: path.into() }, ConnectionReply::Sync(reply))
    }

    /// Program `close`.
    pub fn expect_close(&self) -> ExpectationHandle<ConnectionCall, ConnectionReply> {
        self.calls.program(ConnectionCall::Close, ConnectionReply::Close)
    }
}

/// Reply variant did not match the call. Only reachable when a table is
/// programmed by hand through [`ConnectionDouble::calls`].
#[allow(clippy::panic, reason = "Misprogrammed double aborts the test")]
fn mismatched(call: &'static str, reply: &ConnectionReply) -> ! {
    panic!("connection: {call} programmed with mismatched reply {reply:?}")
}

impl Connection for ConnectionDouble {
    fn add_auth(&self, scheme: &str, credential: &[u8]) -> Result<(), KeeperError> {
        let call = ConnectionCall::AddAuth {
            scheme: scheme.to_string(),
            credential: Bytes::copy_from_slice(credential),
        };
        match self.calls.invoke(call) {
            ConnectionReply::AddAuth(reply) => reply,
            other => mismatched("AddAuth", &other),
        }
    }

    fn create(
        &self,
        path: &str,
        data: &[u8],
        flags: i32,
        acl: &[Acl],
    ) -> Result<String, KeeperError> {
        let call = ConnectionCall::Create {
            path: path.to_string(),
            data: Bytes::copy_from_slice(data),
            flags,
            acl: acl.to_vec(),
        };
        match self.calls.invoke(call) {
            ConnectionReply::Create(reply) => reply,
            other => mismatched("Create", &other),
        }
    }

    fn exists(&self, path: &str) -> Result<(bool, Option<Stat>), KeeperError> {
        match self.calls.invoke(ConnectionCall::Exists { path: path.to_string() }) {
            ConnectionReply::Exists(reply) => reply,
            other => mismatched("Exists", &other),
        }
    }

    fn exists_w(&self, path: &str) -> Result<(bool, Option<Stat>, EventReceiver), KeeperError> {
        match self.calls.invoke(ConnectionCall::ExistsW { path: path.to_string() }) {
            ConnectionReply::ExistsW(reply) => reply,
            other => mismatched("ExistsW", &other),
        }
    }

    fn get(&self, path: &str) -> Result<(Bytes, Option<Stat>), KeeperError> {
        match self.calls.invoke(ConnectionCall::Get { path: path.to_string() }) {
            ConnectionReply::Get(reply) => reply,
            other => mismatched("Get", &other),
        }
    }

    fn get_w(&self, path: &str) -> Result<(Bytes, Option<Stat>, EventReceiver), KeeperError> {
        match self.calls.invoke(ConnectionCall::GetW { path: path.to_string() }) {
            ConnectionReply::GetW(reply) => reply,
            other => mismatched("GetW", &other),
        }
    }

    fn set(&self, path: &str, data: &[u8], version: i32) -> Result<Option<Stat>, KeeperError> {
        let call = ConnectionCall::Set {
            path: path.to_string(),
            data: Bytes::copy_from_slice(data),
            version,
        };
        match self.calls.invoke(call) {
            ConnectionReply::Set(reply) => reply,
            other => mismatched("Set", &other),
        }
    }

    fn children(&self, path: &str) -> Result<(Vec<String>, Option<Stat>), KeeperError> {
        match self.calls.invoke(ConnectionCall::Children { path: path.to_string() }) {
            ConnectionReply::Children(reply) => reply,
            other => mismatched("Children", &other),
        }
    }

    fn children_w(
        &self,
        path: &str,
    ) -> Result<(Vec<String>, Option<Stat>, EventReceiver), KeeperError> {
        match self.calls.invoke(ConnectionCall::ChildrenW { path: path.to_string() }) {
            ConnectionReply::ChildrenW(reply) => reply,
            other => mismatched("ChildrenW", &other),
        }
    }

    fn get_acl(&self, path: &str) -> Result<(Vec<Acl>, Option<Stat>), KeeperError> {
        match self.calls.invoke(ConnectionCall::GetAcl { path: path.to_string() }) {
            ConnectionReply::GetAcl(reply) => reply,
            other => mismatched("GetACL", &other),
        }
    }

    fn set_acl(&self, path: &str, acl: &[Acl], version: i32) -> Result<Option<Stat>, KeeperError> {
        let call = ConnectionCall::SetAcl { path: path.to_string(), acl: acl.to_vec(), version };
        match self.calls.invoke(call) {
            ConnectionReply::SetAcl(reply) => reply,
            other => mismatched("SetACL", &other),
        }
    }

    fn delete(&self, path: &str, version: i32) -> Result<(), KeeperError> {
        match self.calls.invoke(ConnectionCall::Delete { path: path.to_string(), version }) {
            ConnectionReply::Delete(reply) => reply,
            other => mismatched("Delete", &other),
        }
    }

    fn multi(&self, ops: &[MultiOp]) -> Result<Vec<MultiResponse>, KeeperError> {
        // Recorded before matching: an unprogrammed batch still shows up.
        self.recorded.lock().unwrap_or_else(PoisonError::into_inner).extend_from_slice(ops);

        match self.calls.invoke(ConnectionCall::Multi { ops: ops.to_vec() }) {
            ConnectionReply::Multi(reply) => reply,
            other => mismatched("Multi", &other),
        }
    }

    fn sync(&self, path: &str) -> Result<String, KeeperError> {
        match self.calls.invoke(ConnectionCall::Sync { path: path.to_string() }) {
            ConnectionReply::Sync(reply) => reply,
            other => mismatched("Sync", &other),
        }
    }

    #[allow(clippy::panic, reason = "Fault injection")]
    fn close(&self) {
        if self.crash_on_close.load(Ordering::SeqCst) {
            panic!("connection: close aborted abnormally");
        }

        match self.calls.invoke(ConnectionCall::Close) {
            ConnectionReply::Close => {},
            other => mismatched("Close", &other),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use keeper_core::{ANY_VERSION, open_acl_unsafe};

    use super::*;

    #[test]
    fn returns_programmed_triple() {
        let conn = ConnectionDouble::new();
        let _ = conn.expect_get("/a", Ok((Bytes::from_static(b"v"), Some(Stat::with_version(1)))));

        let (data, stat) = conn.get("/a").unwrap_or_default();

        assert_eq!(data, Bytes::from_static(b"v"));
        assert_eq!(stat, Some(Stat::with_version(1)));
        assert!(conn.calls().verify().is_ok());
    }

    #[test]
    fn domain_errors_are_plain_replies() {
        let conn = ConnectionDouble::new();
        let _ = conn.expect_create("/a", "x", 0, open_acl_unsafe(), Err(KeeperError::NodeExists));

        assert_eq!(conn.create("/a", b"x", 0, &open_acl_unsafe()), Err(KeeperError::NodeExists));
        assert!(conn.calls().verify().is_ok());
    }

    #[test]
    fn arguments_must_match_structurally() {
        let conn = ConnectionDouble::new();
        let _ = conn.expect_delete("/a", 3, Ok(()));

        let wrong_version = catch_unwind(AssertUnwindSafe(|| conn.delete("/a", ANY_VERSION)));
        assert!(wrong_version.is_err());
        assert_eq!(conn.delete("/a", 3), Ok(()));
    }

    #[test]
    fn multi_records_before_matching() {
        let conn = ConnectionDouble::new();
        let ops = vec![
            MultiOp::Check { path: "/a".to_string(), version: 1 },
            MultiOp::Delete { path: "/b".to_string(), version: 2 },
        ];

        let result = catch_unwind(AssertUnwindSafe(|| conn.multi(&ops)));

        assert!(result.is_err());
        assert_eq!(conn.recorded_operations(), ops);
    }

    #[test]
    fn second_close_is_over_invocation() {
        let conn = ConnectionDouble::new();
        let _ = conn.expect_close();

        conn.close();
        let second = catch_unwind(AssertUnwindSafe(|| conn.close()));

        assert!(second.is_err());
        let problems = conn.calls().verify().err().unwrap_or_default();
        assert!(problems.iter().any(|p| p.to_string().contains("over-invocation")));
    }

    #[test]
    fn crash_on_close_aborts() {
        let conn = ConnectionDouble::new();
        conn.crash_on_close();

        assert!(catch_unwind(AssertUnwindSafe(|| conn.close())).is_err());
        assert_eq!(conn.invocation_count("Close"), 0);
    }

    #[test]
    fn clones_share_state() {
        let conn = ConnectionDouble::new();
        let clone = conn.clone();
        let _ = conn.expect_sync("/a", Ok("/a".to_string()));

        assert_eq!(clone.sync("/a"), Ok("/a".to_string()));
        assert_eq!(conn.invocation_count("Sync"), 1);
    }
}
