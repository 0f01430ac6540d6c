//! Parameter injection for test callbacks.
//!
//! A callback declares what it needs through its parameter types. Every
//! parameter is looked up by [`TypeId`] in a [`Dependencies`] bag before the
//! callback runs; a type outside the bag fails resolution and the callback is
//! never invoked.

use std::{
    any::{Any, TypeId, type_name},
    collections::HashMap,
    fmt,
};

use crate::{
    error::HarnessError,
    providers::{
        AclProviderDouble, EnsurePathHelperDouble, RetrySleeperDouble, TracerDriverDouble,
    },
    signal::CompletionSignal,
};

/// Closed set of handles a callback may ask for.
#[derive(Default)]
pub struct Dependencies {
    handles: HashMap<TypeId, Box<dyn Any>>,
    signal: Option<CompletionSignal>,
    signal_claimed: bool,
}

impl fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dependencies")
            .field("handles", &self.handles.len())
            .field("signal_claimed", &self.signal_claimed)
            .finish()
    }
}

impl Dependencies {
    /// Empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `value` injectable as `T`, replacing any previous `T`.
    pub fn insert<T: Any + Clone>(&mut self, value: T) {
        self.handles.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Make `signal` injectable. Resolving it registers one unit of pending
    /// work.
    pub fn with_signal(&mut self, signal: CompletionSignal) {
        self.signal = Some(signal);
    }

    /// Whether a callback claimed the completion signal.
    pub fn signal_claimed(&self) -> bool {
        self.signal_claimed
    }

    /// Resolve one parameter slot.
    ///
    /// # Errors
    ///
    /// - `HarnessError::DuplicateCompletionSignal` on a second signal request
    /// - `HarnessError::DoubleNotInstalled` for an optional double left out
    /// - `HarnessError::UnsupportedParameter` for any other unknown type
    pub fn resolve<T: Any + Clone>(&mut self) -> Result<T, HarnessError> {
        let id = TypeId::of::<T>();

        if id == TypeId::of::<CompletionSignal>()
            && let Some(signal) = &self.signal
        {
            if self.signal_claimed {
                return Err(HarnessError::DuplicateCompletionSignal);
            }
            let resolved = (signal as &dyn Any).downcast_ref::<T>().cloned();
            if let Some(resolved) = resolved {
                self.signal_claimed = true;
                signal.add(1);
                return Ok(resolved);
            }
        }

        if let Some(handle) = self.handles.get(&id).and_then(|h| h.downcast_ref::<T>()) {
            return Ok(handle.clone());
        }

        let optional = [
            TypeId::of::<AclProviderDouble>(),
            TypeId::of::<EnsurePathHelperDouble>(),
            TypeId::of::<RetrySleeperDouble>(),
            TypeId::of::<TracerDriverDouble>(),
        ];
        if optional.contains(&id) {
            return Err(HarnessError::DoubleNotInstalled(type_name::<T>()));
        }

        tracing::warn!(parameter = type_name::<T>(), "unsupported callback parameter");
        Err(HarnessError::UnsupportedParameter(type_name::<T>()))
    }
}

/// A test body whose parameters are resolved from [`Dependencies`].
///
/// Implemented for every `FnOnce` closure of up to eight parameters whose
/// types are `Any + Clone`. Parameters are annotated in the closure:
/// `|conn: ConnectionDouble, client: KeeperClient| { .. }`.
pub trait Callback<Args> {
    /// Resolve every parameter, then call. Nothing runs unless all resolve.
    fn invoke(self, deps: &mut Dependencies) -> Result<(), HarnessError>;
}

macro_rules! impl_callback {
    ($(($ty:ident $arg:ident)),*) => {
        impl<F, $($ty,)*> Callback<($($ty,)*)> for F
        where
            F: FnOnce($($ty),*),
            $($ty: Any + Clone,)*
        {
            fn invoke(self, deps: &mut Dependencies) -> Result<(), HarnessError> {
                let _ = &deps;
                $(let $arg = deps.resolve::<$ty>()?;)*
                self($($arg),*);
                Ok(())
            }
        }
    };
}

impl_callback!();
impl_callback!((A a));
impl_callback!((A a), (B b));
impl_callback!((A a), (B b), (C c));
impl_callback!((A a), (B b), (C c), (D d));
impl_callback!((A a), (B b), (C c), (D d), (E e));
impl_callback!((A a), (B b), (C c), (D d), (E e), (G g));
impl_callback!((A a), (B b), (C c), (D d), (E e), (G g), (H h));
impl_callback!((A a), (B b), (C c), (D d), (E e), (G g), (H h), (I i));

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Marker(u32);

    fn call<Args>(
        deps: &mut Dependencies,
        callback: impl Callback<Args>,
    ) -> Result<(), HarnessError> {
        callback.invoke(deps)
    }

    #[test]
    fn resolves_registered_types() {
        let mut deps = Dependencies::new();
        deps.insert(Marker(7));
        deps.insert(String::from("text"));

        let seen = Cell::new(None);
        let result = call(&mut deps, |text: String, marker: Marker| {
            seen.set(Some((text, marker)));
        });

        assert_eq!(result, Ok(()));
        assert_eq!(seen.take(), Some(("text".to_string(), Marker(7))));
    }

    #[test]
    fn zero_parameters_always_resolve() {
        let mut deps = Dependencies::new();
        let ran = Cell::new(false);

        assert_eq!(call(&mut deps, || ran.set(true)), Ok(()));
        assert!(ran.get());
    }

    #[test]
    fn unknown_type_fails_before_invocation() {
        let mut deps = Dependencies::new();
        deps.insert(Marker(1));
        let ran = Cell::new(false);

        let result = call(&mut deps, |_: Marker, _: u64| ran.set(true));

        assert_eq!(result, Err(HarnessError::UnsupportedParameter("u64")));
        assert!(!ran.get());
    }

    #[test]
    fn signal_registers_pending_work_once() {
        let signal = CompletionSignal::new();
        let mut deps = Dependencies::new();
        deps.with_signal(signal.clone());

        let result = call(&mut deps, |done: CompletionSignal| done.done());

        assert_eq!(result, Ok(()));
        assert!(deps.signal_claimed());
        assert_eq!(signal.pending(), 0);
    }

    #[test]
    fn second_signal_is_rejected() {
        let mut deps = Dependencies::new();
        deps.with_signal(CompletionSignal::new());

        let result = call(&mut deps, |_: CompletionSignal, _: CompletionSignal| {});

        assert_eq!(result, Err(HarnessError::DuplicateCompletionSignal));
    }

    #[test]
    fn optional_double_reports_not_installed() {
        let mut deps = Dependencies::new();

        let result = call(&mut deps, |_: EnsurePathHelperDouble| {});

        assert!(matches!(result, Err(HarnessError::DoubleNotInstalled(_))));
    }
}
