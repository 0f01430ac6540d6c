//! Path utilities: validation, namespace prefixing and parent enumeration.

use crate::error::KeeperError;

/// Path separator.
pub const SEPARATOR: char = '/';

/// Check that `path` is absolute, has no empty segments and no trailing
/// separator (except the root itself).
///
/// # Errors
///
/// - `KeeperError::BadArguments` describing the first problem found
pub fn validate_path(path: &str) -> Result<(), KeeperError> {
    if !path.starts_with(SEPARATOR) {
        return Err(KeeperError::BadArguments(format!("path must start with /: {path:?}")));
    }
    if path == "/" {
        return Ok(());
    }
    if path.ends_with(SEPARATOR) {
        return Err(KeeperError::BadArguments(format!("path must not end with /: {path:?}")));
    }
    if path[1..].split(SEPARATOR).any(str::is_empty) {
        return Err(KeeperError::BadArguments(format!("empty path segment: {path:?}")));
    }
    if path.contains('\0') {
        return Err(KeeperError::BadArguments(format!("null character in path: {path:?}")));
    }
    Ok(())
}

/// Join a parent path and a child name.
pub fn join(parent: &str, child: &str) -> String {
    let child = child.trim_start_matches(SEPARATOR);
    if parent.ends_with(SEPARATOR) {
        format!("{parent}{child}")
    } else {
        format!("{parent}/{child}")
    }
}

/// Absolute path of the namespace root. `None` for the empty namespace.
pub fn namespace_root(namespace: &str) -> Option<String> {
    let trimmed = namespace.trim_matches(SEPARATOR);
    if trimmed.is_empty() { None } else { Some(format!("/{trimmed}")) }
}

/// Prefix `path` with the namespace root.
pub fn fix_for_namespace(namespace: &str, path: &str) -> String {
    match namespace_root(namespace) {
        None => path.to_string(),
        Some(root) if path == "/" => root,
        Some(root) => format!("{root}{path}"),
    }
}

/// Strip the namespace root from a path returned by the service.
///
/// Paths outside the namespace are returned unchanged.
pub fn unfix_for_namespace(namespace: &str, path: &str) -> String {
    let Some(root) = namespace_root(namespace) else {
        return path.to_string();
    };
    match path.strip_prefix(&root) {
        Some("") => "/".to_string(),
        Some(rest) if rest.starts_with(SEPARATOR) => rest.to_string(),
        _ => path.to_string(),
    }
}

/// Every ancestor of `path` from the top down, plus `path` itself when
/// `include_last` is set. The root is never included.
pub fn prefixes(path: &str, include_last: bool) -> Vec<String> {
    let segments: Vec<&str> =
        path.split(SEPARATOR).filter(|segment| !segment.is_empty()).collect();
    let take = if include_last { segments.len() } else { segments.len().saturating_sub(1) };

    let mut current = String::new();
    segments[..take]
        .iter()
        .map(|segment| {
            current.push(SEPARATOR);
            current.push_str(segment);
            current.clone()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn validate_accepts_well_formed_paths() {
        assert!(validate_path("/").is_ok());
        assert!(validate_path("/a").is_ok());
        assert!(validate_path("/a/b-c/d_0").is_ok());
    }

    #[test]
    fn validate_rejects_malformed_paths() {
        assert!(validate_path("").is_err());
        assert!(validate_path("a/b").is_err());
        assert!(validate_path("/a/").is_err());
        assert!(validate_path("/a//b").is_err());
    }

    #[test]
    fn namespace_fixing() {
        assert_eq!(fix_for_namespace("", "/a"), "/a");
        assert_eq!(fix_for_namespace("ns", "/a/b"), "/ns/a/b");
        assert_eq!(fix_for_namespace("/ns/", "/"), "/ns");
        assert_eq!(unfix_for_namespace("ns", "/ns/a"), "/a");
        assert_eq!(unfix_for_namespace("ns", "/ns"), "/");
        assert_eq!(unfix_for_namespace("ns", "/nsx/a"), "/nsx/a");
        assert_eq!(unfix_for_namespace("", "/a"), "/a");
    }

    #[test]
    fn prefixes_exclude_root() {
        assert_eq!(prefixes("/a/b/c", false), vec!["/a", "/a/b"]);
        assert_eq!(prefixes("/a/b/c", true), vec!["/a", "/a/b", "/a/b/c"]);
        assert!(prefixes("/", true).is_empty());
        assert!(prefixes("/a", false).is_empty());
    }

    #[test]
    fn join_handles_root() {
        assert_eq!(join("/", "a"), "/a");
        assert_eq!(join("/a", "b"), "/a/b");
    }

    fn segment() -> impl Strategy<Value = String> {
        "[a-z0-9_-]{1,8}"
    }

    proptest! {
        /// Fixing then unfixing a valid path returns it unchanged.
        #[test]
        fn prop_namespace_round_trip(
            namespace in segment(),
            segments in prop::collection::vec(segment(), 0..5),
        ) {
            let path = format!("/{}", segments.join("/"));
            let fixed = fix_for_namespace(&namespace, &path);

            prop_assert!(validate_path(&fixed).is_ok());
            prop_assert_eq!(unfix_for_namespace(&namespace, &fixed), path);
        }
    }
}
