//! Programmed-call tables shared by every double.
//!
//! A [`CallTable`] holds an ordered list of [`ExpectedCall`]s. An invocation
//! consumes the first expectation whose call is structurally equal to the
//! received one and still has invocations left. Failures (nothing programmed,
//! or every match exhausted) panic at the call site and are also kept in the
//! table, so teardown still reports them when the panic happened on a thread
//! the harness does not own. A table linked to a [`CompletionSignal`] also
//! aborts it on failure, which releases a teardown waiting on that thread.

#![allow(clippy::disallowed_types, reason = "Tables are shared with client threads")]

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use crate::{error::HarnessError, signal::CompletionSignal};

/// Repetition policy of an expectation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Times {
    /// Exactly one invocation
    Once,
    /// Exactly `n` invocations
    Exactly(usize),
    /// Any positive number of invocations
    Unlimited,
}

impl Times {
    /// Whether one more invocation is allowed after `invocations`.
    pub fn allows(self, invocations: usize) -> bool {
        match self {
            Self::Once => invocations < 1,
            Self::Exactly(n) => invocations < n,
            Self::Unlimited => true,
        }
    }

    /// Whether `invocations` meets the policy at teardown.
    pub fn is_satisfied(self, invocations: usize) -> bool {
        match self {
            Self::Once => invocations == 1,
            Self::Exactly(n) => invocations == n,
            Self::Unlimited => invocations > 0,
        }
    }
}

impl fmt::Display for Times {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Once => write!(f, "once"),
            Self::Exactly(n) => write!(f, "{n} times"),
            Self::Unlimited => write!(f, "at least once"),
        }
    }
}

/// One programmed call: what to match, what to return, how often.
#[derive(Debug, Clone)]
pub struct ExpectedCall<C, R> {
    /// Operation and arguments to match
    pub call: C,
    /// Canned reply
    pub reply: R,
    /// Repetition policy
    pub times: Times,
    /// Invocations consumed so far
    pub invocations: usize,
}

struct TableInner<C, R> {
    expected: Vec<ExpectedCall<C, R>>,
    invoked: Vec<C>,
    failures: Vec<HarnessError>,
    abort_on_failure: Option<CompletionSignal>,
}

/// Ordered expectation table of one double.
///
/// Clones share the same table.
pub struct CallTable<C, R> {
    double: &'static str,
    inner: Arc<Mutex<TableInner<C, R>>>,
}

impl<C, R> Clone for CallTable<C, R> {
    fn clone(&self) -> Self {
        Self { double: self.double, inner: Arc::clone(&self.inner) }
    }
}

impl<C, R> fmt::Debug for CallTable<C, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("CallTable")
            .field("double", &self.double)
            .field("expected", &inner.expected.len())
            .field("invoked", &inner.invoked.len())
            .field("failures", &inner.failures.len())
            .finish()
    }
}

impl<C, R> CallTable<C, R>
where
    C: PartialEq + Clone + fmt::Debug,
    R: Clone + fmt::Debug,
{
    /// Empty table for the double called `double`.
    pub fn new(double: &'static str) -> Self {
        Self {
            double,
            inner: Arc::new(Mutex::new(TableInner {
                expected: Vec::new(),
                invoked: Vec::new(),
                failures: Vec::new(),
                abort_on_failure: None,
            })),
        }
    }

    /// Name used in failure reports.
    pub fn double(&self) -> &'static str {
        self.double
    }

    /// Append an expectation, exactly-once by default.
    pub fn program(&self, call: C, reply: R) -> ExpectationHandle<C, R> {
        let mut inner = self.lock();
        inner.expected.push(ExpectedCall { call, reply, times: Times::Once, invocations: 0 });
        ExpectationHandle { inner: Arc::clone(&self.inner), index: inner.expected.len() - 1 }
    }

    /// Consume the first matching expectation.
    ///
    /// # Errors
    ///
    /// - `HarnessError::UnprogrammedCall` if no expectation matches `call`
    /// - `HarnessError::OverInvocation` if every match is exhausted
    ///
    /// Either failure is also recorded for [`CallTable::verify`].
    pub fn try_invoke(&self, call: C) -> Result<R, HarnessError> {
        let mut inner = self.lock();
        inner.invoked.push(call.clone());

        let mut exhausted = None;
        for expected in &mut inner.expected {
            if expected.call != call {
                continue;
            }
            if expected.times.allows(expected.invocations) {
                expected.invocations += 1;
                let reply = expected.reply.clone();
                tracing::debug!(double = self.double, call = ?call, reply = ?reply, "call");
                return Ok(reply);
            }
            exhausted.get_or_insert(expected.times);
        }

        let failure = match exhausted {
            Some(times) => HarnessError::OverInvocation {
                double: self.double,
                call: format!("{call:?}"),
                allowed: times.to_string(),
            },
            None => {
                HarnessError::UnprogrammedCall { double: self.double, call: format!("{call:?}") }
            },
        };
        tracing::warn!(double = self.double, error = %failure, "call failed");
        inner.failures.push(failure.clone());
        let signal = inner.abort_on_failure.clone();
        drop(inner);

        if let Some(signal) = signal {
            signal.abort();
        }
        Err(failure)
    }

    /// Abort `signal` on every failure from now on, and right away if one is
    /// already recorded.
    pub fn abort_on_failure(&self, signal: CompletionSignal) {
        let mut inner = self.lock();
        let failed = !inner.failures.is_empty();
        inner.abort_on_failure = Some(signal.clone());
        drop(inner);

        if failed {
            signal.abort();
        }
    }

    /// Consume the first matching expectation, panicking when there is none.
    ///
    /// # Panics
    ///
    /// On any failure [`CallTable::try_invoke`] reports.
    #[allow(clippy::panic, reason = "Unmatched calls abort the test")]
    pub fn invoke(&self, call: C) -> R {
        match self.try_invoke(call) {
            Ok(reply) => reply,
            Err(failure) => panic!("{failure}"),
        }
    }

    /// Every call received so far, in order, matched or not.
    pub fn invocations(&self) -> Vec<C> {
        self.lock().invoked.clone()
    }

    /// Snapshot of the programmed expectations.
    pub fn expectations(&self) -> Vec<ExpectedCall<C, R>> {
        self.lock().expected.clone()
    }

    /// Recorded failures plus every expectation whose policy is not met.
    ///
    /// # Errors
    ///
    /// All problems found, failures first.
    pub fn verify(&self) -> Result<(), Vec<HarnessError>> {
        let inner = self.lock();
        let mut problems = inner.failures.clone();
        problems.extend(
            inner
                .expected
                .iter()
                .filter(|expected| !expected.times.is_satisfied(expected.invocations))
                .map(|expected| HarnessError::Unsatisfied {
                    double: self.double,
                    call: format!("{:?}", expected.call),
                    expected: expected.times.to_string(),
                    invoked: expected.invocations,
                }),
        );

        if problems.is_empty() { Ok(()) } else { Err(problems) }
    }
}

impl<C, R> CallTable<C, R> {
    fn lock(&self) -> MutexGuard<'_, TableInner<C, R>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Adjusts the repetition policy of a freshly programmed expectation.
#[must_use = "the expectation is exactly-once unless adjusted"]
pub struct ExpectationHandle<C, R> {
    inner: Arc<Mutex<TableInner<C, R>>>,
    index: usize,
}

impl<C, R> ExpectationHandle<C, R> {
    /// Expect exactly one invocation (the default).
    pub fn once(self) -> Self {
        self.set_times(Times::Once)
    }

    /// Expect exactly `n` invocations.
    pub fn times(self, n: usize) -> Self {
        self.set_times(Times::Exactly(n))
    }

    /// Allow any positive number of invocations.
    pub fn unlimited(self) -> Self {
        self.set_times(Times::Unlimited)
    }

    fn set_times(self, times: Times) -> Self {
        if let Some(expected) =
            self.inner.lock().unwrap_or_else(PoisonError::into_inner).expected.get_mut(self.index)
        {
            expected.times = times;
        }
        self
    }
}
