//! Resources with a fallible close.

use crate::{client::KeeperClient, error::KeeperError};

/// Something that can be shut down once.
pub trait Closeable {
    /// Release the resource.
    ///
    /// # Errors
    ///
    /// Implementation-specific; the resource counts as closed either way.
    fn close(&self) -> Result<(), KeeperError>;
}

impl Closeable for KeeperClient {
    fn close(&self) -> Result<(), KeeperError> {
        KeeperClient::close(self)
    }
}

/// Close `closeable`, logging instead of returning a failure.
///
/// Returns whether the close succeeded.
pub fn close_quietly(closeable: &dyn Closeable) -> bool {
    match closeable.close() {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(error = %err, "error while closing");
            false
        },
    }
}
