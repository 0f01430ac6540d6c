//! Pluggable strategies: payload compression, ACL selection and
//! path-ensuring.

use std::sync::Arc;

use bytes::Bytes;

use crate::{
    client::KeeperClient,
    error::KeeperError,
    node::{Acl, CreateMode, open_acl_unsafe},
    path,
};

/// Transforms payloads on their way to and from the service.
pub trait CompressionProvider: Send + Sync {
    /// Compress `data` written to `path`.
    fn compress(&self, path: &str, data: &[u8]) -> Result<Bytes, KeeperError>;

    /// Decompress `data` read from `path`.
    fn decompress(&self, path: &str, data: &[u8]) -> Result<Bytes, KeeperError>;
}

/// Identity transform.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCompression;

impl CompressionProvider for NoCompression {
    fn compress(&self, _path: &str, data: &[u8]) -> Result<Bytes, KeeperError> {
        Ok(Bytes::copy_from_slice(data))
    }

    fn decompress(&self, _path: &str, data: &[u8]) -> Result<Bytes, KeeperError> {
        Ok(Bytes::copy_from_slice(data))
    }
}

/// Chooses the ACL for nodes the client creates.
pub trait AclProvider: Send + Sync {
    /// ACL used when nothing more specific applies.
    fn default_acl(&self) -> Vec<Acl>;

    /// ACL for a node created at `path`.
    fn acl_for_path(&self, path: &str) -> Vec<Acl>;
}

/// Provider handing out the same ACL for every path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultAclProvider {
    acl: Vec<Acl>,
}

impl DefaultAclProvider {
    /// Provider returning `acl` for every path.
    pub fn new(acl: Vec<Acl>) -> Self {
        Self { acl }
    }
}

impl Default for DefaultAclProvider {
    fn default() -> Self {
        Self::new(open_acl_unsafe())
    }
}

impl AclProvider for DefaultAclProvider {
    fn default_acl(&self) -> Vec<Acl> {
        self.acl.clone()
    }

    fn acl_for_path(&self, _path: &str) -> Vec<Acl> {
        self.acl.clone()
    }
}

/// Idempotently makes sure a fixed path exists.
pub trait EnsurePath: Send + Sync {
    /// Create every missing segment of the path.
    fn ensure(&self, client: &KeeperClient) -> Result<(), KeeperError>;

    /// Variant that ensures everything except the final segment.
    fn excluding_last(&self) -> Arc<dyn EnsurePath>;
}

/// Path-parameterized worker behind [`EnsurePath`].
pub trait EnsurePathHelper: Send + Sync {
    /// Create every missing segment of `path`; the final segment only when
    /// `make_last_node` is set. `path` is absolute and already namespaced.
    fn ensure(&self, client: &KeeperClient, path: &str, make_last_node: bool)
    -> Result<(), KeeperError>;
}

/// [`EnsurePath`] bound to one absolute path, delegating to the client's
/// configured helper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnsurePathHandle {
    path: String,
    make_last: bool,
}

impl EnsurePathHandle {
    /// Ensure `path` including its final segment.
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into(), make_last: true }
    }

    /// Absolute path this handle ensures.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether the final segment is created too.
    pub fn makes_last(&self) -> bool {
        self.make_last
    }
}

impl EnsurePath for EnsurePathHandle {
    fn ensure(&self, client: &KeeperClient) -> Result<(), KeeperError> {
        client.config().ensure_path_helper().ensure(client, &self.path, self.make_last)
    }

    fn excluding_last(&self) -> Arc<dyn EnsurePath> {
        Arc::new(Self { path: self.path.clone(), make_last: false })
    }
}

/// Helper that walks the path top-down, creating missing persistent nodes
/// with empty payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultEnsurePathHelper;

impl EnsurePathHelper for DefaultEnsurePathHelper {
    fn ensure(
        &self,
        client: &KeeperClient,
        path: &str,
        make_last_node: bool,
    ) -> Result<(), KeeperError> {
        path::validate_path(path)?;
        let connection = client.connection()?;
        let acl_provider = client.config().acl_provider();

        for segment in path::prefixes(path, make_last_node) {
            let (exists, _) = client.retrying(|| connection.exists(&segment))?;
            if exists {
                continue;
            }

            let acl = acl_provider.acl_for_path(&segment);
            let created = client.retrying(|| {
                connection.create(&segment, &[], CreateMode::Persistent.flags(), &acl)
            });
            match created {
                Ok(_) | Err(KeeperError::NodeExists) => {},
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_compression_is_identity() {
        let data = b"payload";
        assert_eq!(NoCompression.compress("/a", data).ok(), Some(Bytes::from_static(data)));
        assert_eq!(NoCompression.decompress("/a", data).ok(), Some(Bytes::from_static(data)));
    }

    #[test]
    fn default_acl_provider_is_open() {
        let provider = DefaultAclProvider::default();
        assert_eq!(provider.default_acl(), open_acl_unsafe());
        assert_eq!(provider.acl_for_path("/any"), open_acl_unsafe());
    }

    #[test]
    fn handle_makes_last_by_default() {
        let handle = EnsurePathHandle::new("/a/b");
        assert!(handle.makes_last());
        assert_eq!(handle.path(), "/a/b");
    }
}
