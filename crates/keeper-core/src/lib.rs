//! Client core for a hierarchical coordination service.
//!
//! The service is reached only through two traits: [`Dialer`] establishes a
//! session and [`Connection`] is that session's path-based API (CRUD,
//! watches, ACLs, atomic batches). [`KeeperClient`] is a thin framework on top:
//! it dials on start, applies a namespace prefix, runs payloads through a
//! [`CompressionProvider`], picks ACLs through an [`AclProvider`], retries
//! connection-level failures and closes the session exactly once.
//!
//! Because every collaborator is a trait object supplied through
//! [`ClientConfig`], tests can substitute programmable doubles for all of
//! them (see the `keeper-harness` crate).

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod closeable;
pub mod config;
pub mod connection;
pub mod ensemble;
pub mod error;
pub mod event;
pub mod node;
pub mod op;
pub mod ops;
pub mod path;
pub mod provider;
pub mod retry;
pub mod tracer;

pub use client::{ClientId, ClientState, KeeperClient, SessionListener};
pub use closeable::{Closeable, close_quietly};
pub use config::{
    AuthInfo, ClientConfig, ClientConfigBuilder, DEFAULT_CONNECTION_TIMEOUT,
    DEFAULT_SESSION_TIMEOUT,
};
pub use connection::{Connection, Dialer, Session};
pub use ensemble::{EnsembleProvider, FixedEnsembleProvider};
pub use error::KeeperError;
pub use event::{Event, EventReceiver, EventSender, EventType, SessionState, event_channel};
pub use node::{
    ANY_VERSION, Acl, CreateMode, Perms, Stat, creator_all_acl, open_acl_unsafe, read_acl_unsafe,
};
pub use op::{MultiOp, MultiResponse};
pub use ops::{
    ChildrenBuilder, CreateBuilder, DeleteBuilder, ExistsBuilder, GetDataBuilder, SetDataBuilder,
    Transaction,
};
pub use provider::{
    AclProvider, CompressionProvider, DefaultAclProvider, DefaultEnsurePathHelper, EnsurePath,
    EnsurePathHandle, EnsurePathHelper, NoCompression,
};
pub use retry::{
    RetryNTimes, RetryOneTime, RetryPolicy, RetrySleeper, ThreadSleeper, call_with_retry,
};
pub use tracer::{LogTracerDriver, RETRIES_ALLOWED, RETRIES_DISALLOWED, TracerDriver};
