//! Node metadata, access control lists and creation modes.

use serde::{Deserialize, Serialize};

/// Version wildcard accepted by mutations that take an expected version.
pub const ANY_VERSION: i32 = -1;

/// Version and bookkeeping metadata attached to a node.
///
/// Mutations that take an expected version compare it against
/// [`Stat::version`] (optimistic concurrency). Operations return
/// `Option<Stat>`; `None` means the node does not exist, or that the caller
/// gets no metadata back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stat {
    /// Transaction id that created the node
    pub czxid: i64,
    /// Transaction id that last modified the node
    pub mzxid: i64,
    /// Creation time (ms since epoch)
    pub ctime: i64,
    /// Last modification time (ms since epoch)
    pub mtime: i64,
    /// Data version
    pub version: i32,
    /// Children version
    pub cversion: i32,
    /// ACL version
    pub aversion: i32,
    /// Owning session id for ephemeral nodes, 0 otherwise
    pub ephemeral_owner: i64,
    /// Payload length in bytes
    pub data_length: i32,
    /// Number of children
    pub num_children: i32,
    /// Transaction id that last modified the children
    pub pzxid: i64,
}

impl Stat {
    /// Stat carrying only a data version.
    pub fn with_version(version: i32) -> Self {
        Self { version, ..Self::default() }
    }
}

/// Permission bit set of an ACL entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Perms(pub u32);

impl Perms {
    /// Read node data and list children
    pub const READ: Self = Self(1);
    /// Set node data
    pub const WRITE: Self = Self(1 << 1);
    /// Create children
    pub const CREATE: Self = Self(1 << 2);
    /// Delete children
    pub const DELETE: Self = Self(1 << 3);
    /// Set the ACL
    pub const ADMIN: Self = Self(1 << 4);
    /// Every permission
    pub const ALL: Self = Self(0x1f);

    /// Whether every bit of `other` is set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for Perms {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// One access-control entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Acl {
    /// Granted permissions
    pub perms: Perms,
    /// Authentication scheme (`world`, `auth`, `digest`, ...)
    pub scheme: String,
    /// Scheme-specific identity
    pub id: String,
}

impl Acl {
    /// Create an entry.
    pub fn new(perms: Perms, scheme: impl Into<String>, id: impl Into<String>) -> Self {
        Self { perms, scheme: scheme.into(), id: id.into() }
    }
}

/// Completely open ACL: anyone may do anything.
pub fn open_acl_unsafe() -> Vec<Acl> {
    vec![Acl::new(Perms::ALL, "world", "anyone")]
}

/// Read-only ACL for anyone.
pub fn read_acl_unsafe() -> Vec<Acl> {
    vec![Acl::new(Perms::READ, "world", "anyone")]
}

/// All permissions for the creator's authenticated identities.
pub fn creator_all_acl() -> Vec<Acl> {
    vec![Acl::new(Perms::ALL, "auth", "")]
}

/// How a node is created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CreateMode {
    /// Survives the creating session
    #[default]
    Persistent,
    /// Removed when the creating session ends
    Ephemeral,
    /// Persistent, with a monotonically increasing suffix appended to the name
    PersistentSequential,
    /// Ephemeral, with a monotonically increasing suffix appended to the name
    EphemeralSequential,
}

impl CreateMode {
    /// Wire flags for this mode.
    pub fn flags(self) -> i32 {
        match self {
            Self::Persistent => 0,
            Self::Ephemeral => 1,
            Self::PersistentSequential => 2,
            Self::EphemeralSequential => 3,
        }
    }

    /// Mode for wire flags. `None` for unknown flags.
    pub fn from_flags(flags: i32) -> Option<Self> {
        match flags {
            0 => Some(Self::Persistent),
            1 => Some(Self::Ephemeral),
            2 => Some(Self::PersistentSequential),
            3 => Some(Self::EphemeralSequential),
            _ => None,
        }
    }

    /// Whether the node goes away with its session.
    pub fn is_ephemeral(self) -> bool {
        matches!(self, Self::Ephemeral | Self::EphemeralSequential)
    }

    /// Whether the server appends a sequence suffix.
    pub fn is_sequential(self) -> bool {
        matches!(self, Self::PersistentSequential | Self::EphemeralSequential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_mode_flags_are_stable() {
        for mode in [
            CreateMode::Persistent,
            CreateMode::Ephemeral,
            CreateMode::PersistentSequential,
            CreateMode::EphemeralSequential,
        ] {
            assert_eq!(CreateMode::from_flags(mode.flags()), Some(mode));
        }
        assert_eq!(CreateMode::from_flags(7), None);
    }

    #[test]
    fn all_contains_each_permission() {
        for perm in [Perms::READ, Perms::WRITE, Perms::CREATE, Perms::DELETE, Perms::ADMIN] {
            assert!(Perms::ALL.contains(perm));
        }
        assert_eq!(Perms::READ | Perms::WRITE, Perms(3));
        assert!(!Perms::READ.contains(Perms::WRITE));
    }

    #[test]
    fn open_acl_is_world_anyone() {
        let acl = open_acl_unsafe();
        assert_eq!(acl, vec![Acl::new(Perms::ALL, "world", "anyone")]);
    }
}
