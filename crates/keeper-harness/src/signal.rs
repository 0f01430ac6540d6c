//! Counting wait used to defer teardown until background work finishes.

#![allow(clippy::disallowed_types, reason = "Blocking wait on the calling thread")]

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

/// Shared pending-work counter.
///
/// The orchestrator adds one unit before handing the signal to a callback and
/// blocks in [`CompletionSignal::wait`] after the callback returns. Work
/// running elsewhere calls [`CompletionSignal::done`] when finished. Clones
/// share the counter.
///
/// A double that records a failure aborts the signal it is linked to, so a
/// background thread that panics inside a double before reaching `done` ends
/// the wait instead of hanging teardown.
#[derive(Debug, Clone, Default)]
pub struct CompletionSignal {
    inner: Arc<(Mutex<SignalState>, Condvar)>,
}

#[derive(Debug, Default)]
struct SignalState {
    pending: usize,
    aborted: bool,
}

impl CompletionSignal {
    /// Signal with nothing pending.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `n` more units of pending work.
    pub fn add(&self, n: usize) {
        self.state().pending += n;
    }

    /// Mark one unit done, waking waiters when none remain.
    pub fn done(&self) {
        let mut state = self.state();
        if state.pending == 0 {
            tracing::warn!("completion signal marked done with nothing pending");
            return;
        }
        state.pending -= 1;
        if state.pending == 0 {
            self.inner.1.notify_all();
        }
    }

    /// Release every waiter regardless of pending work. Sticky.
    pub fn abort(&self) {
        let mut state = self.state();
        if !state.aborted {
            tracing::debug!(pending = state.pending, "completion signal aborted");
        }
        state.aborted = true;
        self.inner.1.notify_all();
    }

    /// Whether [`CompletionSignal::abort`] was called.
    pub fn is_aborted(&self) -> bool {
        self.state().aborted
    }

    /// Block until nothing is pending or the signal is aborted.
    pub fn wait(&self) {
        let state = self.state();
        let _unused = self
            .inner
            .1
            .wait_while(state, |state| state.pending > 0 && !state.aborted)
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Units still pending.
    pub fn pending(&self) -> usize {
        self.state().pending
    }

    fn state(&self) -> MutexGuard<'_, SignalState> {
        self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::{thread, time::Duration};

    use super::*;

    #[test]
    fn wait_returns_immediately_when_idle() {
        let signal = CompletionSignal::new();
        signal.wait();
        assert_eq!(signal.pending(), 0);
    }

    #[test]
    fn wait_blocks_until_done() {
        let signal = CompletionSignal::new();
        signal.add(1);

        let worker = signal.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            worker.done();
        });

        signal.wait();
        assert_eq!(signal.pending(), 0);
        handle.join().unwrap();
    }

    #[test]
    fn abort_releases_waiter_with_work_pending() {
        let signal = CompletionSignal::new();
        signal.add(1);

        let aborter = signal.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            aborter.abort();
        });

        signal.wait();
        assert!(signal.is_aborted());
        assert_eq!(signal.pending(), 1);
        handle.join().unwrap();
    }

    #[test]
    fn extra_done_is_ignored() {
        let signal = CompletionSignal::new();
        signal.add(1);
        signal.done();
        signal.done();

        assert_eq!(signal.pending(), 0);
        signal.add(2);
        assert_eq!(signal.pending(), 2);
    }
}
