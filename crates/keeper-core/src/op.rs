//! Sub-operations of an atomic multi-operation batch.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{
    error::KeeperError,
    node::{Acl, Stat},
};

/// One sub-operation of a batch. The batch is applied atomically: either
/// every sub-operation succeeds or none does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MultiOp {
    /// Create a node
    Create {
        /// Node path
        path: String,
        /// Initial payload
        data: Bytes,
        /// Wire creation flags (see [`crate::CreateMode::flags`])
        flags: i32,
        /// ACL for the new node
        acl: Vec<Acl>,
    },
    /// Delete a node at an expected version
    Delete {
        /// Node path
        path: String,
        /// Expected version, or [`crate::ANY_VERSION`]
        version: i32,
    },
    /// Replace a node's payload at an expected version
    SetData {
        /// Node path
        path: String,
        /// New payload
        data: Bytes,
        /// Expected version, or [`crate::ANY_VERSION`]
        version: i32,
    },
    /// Assert a node's version without modifying it
    Check {
        /// Node path
        path: String,
        /// Expected version
        version: i32,
    },
}

impl MultiOp {
    /// Path the sub-operation targets.
    pub fn path(&self) -> &str {
        match self {
            Self::Create { path, .. }
            | Self::Delete { path, .. }
            | Self::SetData { path, .. }
            | Self::Check { path, .. } => path,
        }
    }

    /// Same sub-operation against a different path.
    #[must_use]
    pub fn with_path(self, new_path: String) -> Self {
        match self {
            Self::Create { data, flags, acl, .. } => {
                Self::Create { path: new_path, data, flags, acl }
            },
            Self::Delete { version, .. } => Self::Delete { path: new_path, version },
            Self::SetData { data, version, .. } => Self::SetData { path: new_path, data, version },
            Self::Check { version, .. } => Self::Check { path: new_path, version },
        }
    }
}

/// Per-sub-operation outcome of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiResponse {
    /// Resulting stat for `SetData`
    pub stat: Option<Stat>,
    /// Created path for `Create`
    pub created_path: Option<String>,
    /// Failure of this sub-operation
    pub error: Option<KeeperError>,
}

impl MultiResponse {
    /// Successful `Create` result.
    pub fn created(path: impl Into<String>) -> Self {
        Self { created_path: Some(path.into()), ..Self::default() }
    }

    /// Successful `SetData` result.
    pub fn set(stat: Stat) -> Self {
        Self { stat: Some(stat), ..Self::default() }
    }

    /// Successful `Delete` or `Check` result.
    pub fn ok() -> Self {
        Self::default()
    }

    /// Failed sub-operation.
    pub fn failed(error: KeeperError) -> Self {
        Self { error: Some(error), ..Self::default() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_path_keeps_arguments() {
        let op =
            MultiOp::SetData { path: "/a".to_string(), data: Bytes::from_static(b"x"), version: 4 };

        let moved = op.with_path("/ns/a".to_string());

        assert_eq!(moved.path(), "/ns/a");
        assert_eq!(
            moved,
            MultiOp::SetData {
                path: "/ns/a".to_string(),
                data: Bytes::from_static(b"x"),
                version: 4,
            }
        );
    }

    #[test]
    fn response_constructors() {
        assert_eq!(MultiResponse::created("/a").created_path.as_deref(), Some("/a"));
        assert_eq!(MultiResponse::set(Stat::with_version(2)).stat.map(|s| s.version), Some(2));
        assert_eq!(
            MultiResponse::failed(KeeperError::BadVersion).error,
            Some(KeeperError::BadVersion)
        );
        assert_eq!(MultiResponse::ok(), MultiResponse::default());
    }
}
