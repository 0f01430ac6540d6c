//! Harness failures.
//!
//! These describe misuse of, or unmet expectations on, the harness itself.
//! Simulated service errors (a programmed `NodeExists`, say) are ordinary
//! [`KeeperError`] values handed to the client under test and never show up
//! here, except when the client's own lifecycle fails during a run.

use keeper_core::KeeperError;
use thiserror::Error;

/// Failure detected by a double or the orchestrator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HarnessError {
    /// A double received a call nothing was programmed for
    #[error("{double}: unprogrammed call {call}")]
    UnprogrammedCall {
        /// Name of the double
        double: &'static str,
        /// The call as received
        call: String,
    },

    /// A programmed call was invoked more often than its repetition policy
    /// allows
    #[error("{double}: over-invocation of {call}, allowed {allowed}")]
    OverInvocation {
        /// Name of the double
        double: &'static str,
        /// The call as received
        call: String,
        /// Repetition policy of the exhausted expectation
        allowed: String,
    },

    /// A programmed call was not invoked as often as expected by teardown
    #[error("{double}: unsatisfied expectation {call}, expected {expected}, invoked {invoked}")]
    Unsatisfied {
        /// Name of the double
        double: &'static str,
        /// The programmed call
        call: String,
        /// Repetition policy
        expected: String,
        /// Actual invocation count
        invoked: usize,
    },

    /// Callback declared a parameter type outside the injectable set
    #[error("unsupported callback parameter type: {0}")]
    UnsupportedParameter(&'static str),

    /// Callback asked for an optional double that was not installed
    #[error("callback parameter {0} requires a double that is not installed")]
    DoubleNotInstalled(&'static str),

    /// Callback declared more than one completion signal
    #[error("completion signal requested more than once")]
    DuplicateCompletionSignal,

    /// Client lifecycle failed during the run
    #[error("client error: {0}")]
    Client(#[from] KeeperError),

    /// Teardown verification found unmet expectations
    #[error("{} unmet expectation(s):\n  {}", .0.len(), join_failures(.0))]
    Verification(Vec<HarnessError>),
}

fn join_failures(failures: &[HarnessError]) -> String {
    failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n  ")
}
