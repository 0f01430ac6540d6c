//! Ensemble address resolution.

/// Supplies the connect string handed to the dialer.
pub trait EnsembleProvider: Send + Sync {
    /// Comma-separated `host:port` list.
    fn connection_string(&self) -> String;
}

/// Provider returning a fixed connect string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedEnsembleProvider {
    connect_string: String,
}

impl FixedEnsembleProvider {
    /// Provider for `connect_string`.
    pub fn new(connect_string: impl Into<String>) -> Self {
        Self { connect_string: connect_string.into() }
    }
}

impl EnsembleProvider for FixedEnsembleProvider {
    fn connection_string(&self) -> String {
        self.connect_string.clone()
    }
}
