//! Test doubles and orchestration for `keeper-core` clients.
//!
//! Every collaborator of a [`keeper_core::KeeperClient`] has a programmable
//! double here. A double holds an ordered table of expected calls, each with a
//! canned reply and a repetition policy. Calls that were never programmed, or
//! that exceed their policy, fail the test at the call site; expectations left
//! unconsumed fail it at teardown.
//!
//! [`TestClient`] ties the doubles together: it builds a client from a default
//! configuration, dials and closes exactly once, and hands the test callback
//! whichever doubles and handles its parameter types ask for.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod connection;
pub mod deps;
pub mod dialer;
pub mod error;
pub mod expectation;
pub mod orchestrator;
pub mod providers;
pub mod signal;
pub mod tracing_config;

pub use connection::{ConnectionCall, ConnectionDouble, ConnectionReply};
pub use deps::{Callback, Dependencies};
pub use dialer::{DialerCall, DialerDouble};
pub use error::HarnessError;
pub use expectation::{CallTable, ExpectationHandle, ExpectedCall, Times};
pub use orchestrator::{
    DEFAULT_CONNECT_STRING, DEFAULT_DATA, HarnessState, TestClient, with_client,
    with_client_and_namespace,
};
pub use providers::{
    AclCall, AclProviderDouble, CloseCall, CloseableDouble, CompressionCall, CompressionDouble,
    EnsurePathCall, EnsurePathDouble, EnsurePathHelperCall, EnsurePathHelperDouble,
    EnsurePathReply, RetrySleeperDouble, TracerCall, TracerDriverDouble,
};
pub use signal::CompletionSignal;
pub use tracing_config::{init_test_tracing, init_test_tracing_with_filter};
