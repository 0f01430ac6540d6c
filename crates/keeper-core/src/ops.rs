//! Request builders.
//!
//! Every request validates its path, applies the namespace, forwards to the
//! established [`Connection`](crate::Connection) under the retry policy and
//! strips the namespace from any path handed back.

use std::sync::Arc;

use bytes::Bytes;

use crate::{
    client::KeeperClient,
    connection::Connection,
    error::KeeperError,
    event::EventReceiver,
    node::{ANY_VERSION, Acl, CreateMode, Stat},
    op::{MultiOp, MultiResponse},
    path,
    provider::{EnsurePath, EnsurePathHandle},
};

impl KeeperClient {
    /// Start a create request.
    pub fn create(&self) -> CreateBuilder<'_> {
        CreateBuilder {
            client: self,
            mode: CreateMode::Persistent,
            acl: None,
            compressed: false,
            creating_parents: false,
        }
    }

    /// Start a read request.
    pub fn get_data(&self) -> GetDataBuilder<'_> {
        GetDataBuilder { client: self, decompressed: false }
    }

    /// Start a write request.
    pub fn set_data(&self) -> SetDataBuilder<'_> {
        SetDataBuilder { client: self, version: ANY_VERSION, compressed: false }
    }

    /// Start a delete request.
    pub fn delete(&self) -> DeleteBuilder<'_> {
        DeleteBuilder { client: self, version: ANY_VERSION, deleting_children: false }
    }

    /// Start an existence check.
    pub fn check_exists(&self) -> ExistsBuilder<'_> {
        ExistsBuilder { client: self }
    }

    /// Start a children listing.
    pub fn get_children(&self) -> ChildrenBuilder<'_> {
        ChildrenBuilder { client: self }
    }

    /// ACL and stat of a node.
    pub fn get_acl(&self, path: &str) -> Result<(Vec<Acl>, Option<Stat>), KeeperError> {
        let full = self.fix_path(path)?;
        let connection = self.connection()?;
        self.retrying(|| connection.get_acl(&full))
    }

    /// Replace a node's ACL if its ACL version matches.
    pub fn set_acl(
        &self,
        path: &str,
        acl: &[Acl],
        version: i32,
    ) -> Result<Option<Stat>, KeeperError> {
        let full = self.fix_path(path)?;
        let connection = self.connection()?;
        self.retrying(|| connection.set_acl(&full, acl, version))
    }

    /// Flush the leader channel for `path`. Returns the synced path.
    pub fn sync(&self, path: &str) -> Result<String, KeeperError> {
        let full = self.fix_path(path)?;
        let connection = self.connection()?;
        let synced = self.retrying(|| connection.sync(&full))?;
        Ok(self.unfix_path(&synced))
    }

    /// Start an atomic batch.
    pub fn in_transaction(&self) -> Transaction<'_> {
        Transaction { client: self, ops: Vec::new() }
    }

    /// Path-ensurer for `path` (namespace applied).
    pub fn new_ensure_path(&self, path: &str) -> Result<EnsurePathHandle, KeeperError> {
        path::validate_path(path)?;
        Ok(EnsurePathHandle::new(path::fix_for_namespace(self.namespace(), path)))
    }
}

/// Create request. See [`KeeperClient::create`].
#[must_use]
pub struct CreateBuilder<'a> {
    client: &'a KeeperClient,
    mode: CreateMode,
    acl: Option<Vec<Acl>>,
    compressed: bool,
    creating_parents: bool,
}

impl CreateBuilder<'_> {
    /// Creation mode. Defaults to persistent.
    pub fn with_mode(mut self, mode: CreateMode) -> Self {
        self.mode = mode;
        self
    }

    /// Explicit ACL instead of the ACL provider's choice.
    pub fn with_acl(mut self, acl: Vec<Acl>) -> Self {
        self.acl = Some(acl);
        self
    }

    /// Run the payload through the compression provider.
    pub fn compressed(mut self) -> Self {
        self.compressed = true;
        self
    }

    /// Create missing ancestors first.
    pub fn creating_parents_if_needed(mut self) -> Self {
        self.creating_parents = true;
        self
    }

    /// Create `path` with the configured default payload.
    pub fn for_path(self, path: &str) -> Result<String, KeeperError> {
        let data = self.client.config().default_data().clone();
        self.for_path_with_data(path, &data)
    }

    /// Create `path` with `data`. Returns the created path.
    pub fn for_path_with_data(self, path: &str, data: &[u8]) -> Result<String, KeeperError> {
        let client = self.client;
        let full = client.fix_path(path)?;
        let config = client.config();

        let data = if self.compressed {
            config.compression_provider().compress(&full, data)?
        } else {
            Bytes::copy_from_slice(data)
        };
        let acl = self.acl.unwrap_or_else(|| config.acl_provider().acl_for_path(&full));

        if self.creating_parents {
            EnsurePathHandle::new(full.as_str()).excluding_last().ensure(client)?;
        }

        let connection = client.connection()?;
        let flags = self.mode.flags();
        let created = client.retrying(|| connection.create(&full, &data, flags, &acl))?;
        Ok(client.unfix_path(&created))
    }
}

/// Read request. See [`KeeperClient::get_data`].
#[must_use]
pub struct GetDataBuilder<'a> {
    client: &'a KeeperClient,
    decompressed: bool,
}

impl GetDataBuilder<'_> {
    /// Run the payload through the compression provider.
    pub fn decompressed(mut self) -> Self {
        self.decompressed = true;
        self
    }

    /// Payload and stat of `path`.
    pub fn for_path(self, path: &str) -> Result<(Bytes, Option<Stat>), KeeperError> {
        let full = self.client.fix_path(path)?;
        let connection = self.client.connection()?;
        let (data, stat) = self.client.retrying(|| connection.get(&full))?;
        Ok((self.decode(&full, data)?, stat))
    }

    /// Payload and stat of `path`, plus a watch on it.
    pub fn watch_path(
        self,
        path: &str,
    ) -> Result<(Bytes, Option<Stat>, EventReceiver), KeeperError> {
        let full = self.client.fix_path(path)?;
        let connection = self.client.connection()?;
        let (data, stat, watch) = self.client.retrying(|| connection.get_w(&full))?;
        Ok((self.decode(&full, data)?, stat, watch))
    }

    fn decode(&self, full: &str, data: Bytes) -> Result<Bytes, KeeperError> {
        if self.decompressed {
            self.client.config().compression_provider().decompress(full, &data)
        } else {
            Ok(data)
        }
    }
}

/// Write request. See [`KeeperClient::set_data`].
#[must_use]
pub struct SetDataBuilder<'a> {
    client: &'a KeeperClient,
    version: i32,
    compressed: bool,
}

impl SetDataBuilder<'_> {
    /// Only write if the node is at `version`.
    pub fn with_version(mut self, version: i32) -> Self {
        self.version = version;
        self
    }

    /// Run the payload through the compression provider.
    pub fn compressed(mut self) -> Self {
        self.compressed = true;
        self
    }

    /// Replace the payload of `path`.
    pub fn for_path(self, path: &str, data: &[u8]) -> Result<Option<Stat>, KeeperError> {
        let client = self.client;
        let full = client.fix_path(path)?;
        let data = if self.compressed {
            client.config().compression_provider().compress(&full, data)?
        } else {
            Bytes::copy_from_slice(data)
        };

        let connection = client.connection()?;
        client.retrying(|| connection.set(&full, &data, self.version))
    }
}

/// Delete request. See [`KeeperClient::delete`].
#[must_use]
pub struct DeleteBuilder<'a> {
    client: &'a KeeperClient,
    version: i32,
    deleting_children: bool,
}

impl DeleteBuilder<'_> {
    /// Only delete if the node is at `version`.
    pub fn with_version(mut self, version: i32) -> Self {
        self.version = version;
        self
    }

    /// Delete descendants first when the node has children.
    pub fn deleting_children_if_needed(mut self) -> Self {
        self.deleting_children = true;
        self
    }

    /// Delete `path`.
    pub fn for_path(self, path: &str) -> Result<(), KeeperError> {
        let full = self.client.fix_path(path)?;
        let connection = self.client.connection()?;
        self.delete_tree(connection.as_ref(), &full, self.version)
    }

    fn delete_tree(
        &self,
        connection: &dyn Connection,
        full: &str,
        version: i32,
    ) -> Result<(), KeeperError> {
        match self.client.retrying(|| connection.delete(full, version)) {
            Err(KeeperError::NotEmpty) if self.deleting_children => {
                let (children, _) = self.client.retrying(|| connection.children(full))?;
                for child in children {
                    match self.delete_tree(connection, &path::join(full, &child), ANY_VERSION) {
                        Ok(()) | Err(KeeperError::NoNode) => {},
                        Err(err) => return Err(err),
                    }
                }
                self.client.retrying(|| connection.delete(full, version))
            },
            result => result,
        }
    }
}

/// Existence check. See [`KeeperClient::check_exists`].
#[must_use]
pub struct ExistsBuilder<'a> {
    client: &'a KeeperClient,
}

impl ExistsBuilder<'_> {
    /// Stat of `path`, `None` if it does not exist.
    pub fn for_path(self, path: &str) -> Result<Option<Stat>, KeeperError> {
        let full = self.client.fix_path(path)?;
        let connection = self.client.connection()?;
        let (exists, stat) = self.client.retrying(|| connection.exists(&full))?;
        Ok(exists.then(|| stat.unwrap_or_default()))
    }

    /// Stat of `path` plus a watch that fires on creation, deletion or
    /// change.
    pub fn watch_path(self, path: &str) -> Result<(Option<Stat>, EventReceiver), KeeperError> {
        let full = self.client.fix_path(path)?;
        let connection = self.client.connection()?;
        let (exists, stat, watch) = self.client.retrying(|| connection.exists_w(&full))?;
        Ok((exists.then(|| stat.unwrap_or_default()), watch))
    }
}

/// Children listing. See [`KeeperClient::get_children`].
#[must_use]
pub struct ChildrenBuilder<'a> {
    client: &'a KeeperClient,
}

impl ChildrenBuilder<'_> {
    /// Child names of `path`.
    pub fn for_path(self, path: &str) -> Result<Vec<String>, KeeperError> {
        let full = self.client.fix_path(path)?;
        let connection = self.client.connection()?;
        let (children, _) = self.client.retrying(|| connection.children(&full))?;
        Ok(children)
    }

    /// Child names of `path` plus a watch on its child list.
    pub fn watch_path(self, path: &str) -> Result<(Vec<String>, EventReceiver), KeeperError> {
        let full = self.client.fix_path(path)?;
        let connection = self.client.connection()?;
        let (children, _, watch) = self.client.retrying(|| connection.children_w(&full))?;
        Ok((children, watch))
    }
}

/// Atomic batch. See [`KeeperClient::in_transaction`].
///
/// Paths are relative to the namespace; nothing is sent until
/// [`Transaction::commit`].
#[must_use]
pub struct Transaction<'a> {
    client: &'a KeeperClient,
    ops: Vec<MultiOp>,
}

impl Transaction<'_> {
    /// Add a persistent create. The ACL comes from the ACL provider.
    pub fn create(self, path: &str, data: &[u8]) -> Self {
        self.create_with_mode(path, data, CreateMode::Persistent)
    }

    /// Add a create with an explicit mode.
    pub fn create_with_mode(mut self, path: &str, data: &[u8], mode: CreateMode) -> Self {
        self.ops.push(MultiOp::Create {
            path: path.to_string(),
            data: Bytes::copy_from_slice(data),
            flags: mode.flags(),
            acl: Vec::new(),
        });
        self
    }

    /// Add a versioned delete.
    pub fn delete(mut self, path: &str, version: i32) -> Self {
        self.ops.push(MultiOp::Delete { path: path.to_string(), version });
        self
    }

    /// Add a versioned write.
    pub fn set_data(mut self, path: &str, data: &[u8], version: i32) -> Self {
        self.ops.push(MultiOp::SetData {
            path: path.to_string(),
            data: Bytes::copy_from_slice(data),
            version,
        });
        self
    }

    /// Add a version assertion.
    pub fn check(mut self, path: &str, version: i32) -> Self {
        self.ops.push(MultiOp::Check { path: path.to_string(), version });
        self
    }

    /// Number of queued sub-operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Send the batch. Created paths in the results have the namespace
    /// stripped.
    pub fn commit(self) -> Result<Vec<MultiResponse>, KeeperError> {
        let client = self.client;
        let acl_provider = Arc::clone(client.config().acl_provider());

        let ops = self
            .ops
            .into_iter()
            .map(|op| -> Result<MultiOp, KeeperError> {
                let full = client.fix_path(op.path())?;
                Ok(match op {
                    MultiOp::Create { data, flags, .. } => {
                        let acl = acl_provider.acl_for_path(&full);
                        MultiOp::Create { path: full, data, flags, acl }
                    },
                    other => other.with_path(full),
                })
            })
            .collect::<Result<Vec<_>, KeeperError>>()?;

        let connection = client.connection()?;
        let responses = client.retrying(|| connection.multi(&ops))?;

        Ok(responses
            .into_iter()
            .map(|mut response| {
                response.created_path = response.created_path.map(|p| client.unfix_path(&p));
                response
            })
            .collect())
    }
}
