//! Programmable dialer.

use std::time::Duration;

use keeper_core::{Dialer, KeeperError, Session};

use crate::expectation::{CallTable, ExpectationHandle};

/// Arguments of one `dial`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialerCall {
    /// Resolved connect string
    pub connect_string: String,
    /// Requested session timeout
    pub session_timeout: Duration,
    /// Whether a read-only session is acceptable
    pub can_be_read_only: bool,
}

/// Stub [`Dialer`] handing out a programmed [`Session`].
#[derive(Debug, Clone)]
pub struct DialerDouble {
    calls: CallTable<DialerCall, Result<Session, KeeperError>>,
}

impl Default for DialerDouble {
    fn default() -> Self {
        Self::new()
    }
}

impl DialerDouble {
    /// Double with nothing programmed.
    pub fn new() -> Self {
        Self { calls: CallTable::new("dialer") }
    }

    /// Expectation table, for verification.
    pub fn calls(&self) -> &CallTable<DialerCall, Result<Session, KeeperError>> {
        &self.calls
    }

    /// Every dial received so far.
    pub fn invocations(&self) -> Vec<DialerCall> {
        self.calls.invocations()
    }

    /// Program `dial`.
    pub fn expect_dial(
        &self,
        connect_string: impl Into<String>,
        session_timeout: Duration,
        can_be_read_only: bool,
        reply: Result<Session, KeeperError>,
    ) -> ExpectationHandle<DialerCall, Result<Session, KeeperError>> {
        let call = DialerCall {
            connect_string: connect_string.into(),
            session_timeout,
            can_be_read_only,
        };
        self.calls.program(call, reply)
    }
}

impl Dialer for DialerDouble {
    fn dial(
        &self,
        connect_string: &str,
        session_timeout: Duration,
        can_be_read_only: bool,
    ) -> Result<Session, KeeperError> {
        self.calls.invoke(DialerCall {
            connect_string: connect_string.to_string(),
            session_timeout,
            can_be_read_only,
        })
    }
}
