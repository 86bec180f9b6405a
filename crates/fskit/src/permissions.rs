//! Per-request permissions for outward-facing adapters.
//!
//! An HTTP surface over a filesystem asks its [`Authorizer`] what the caller
//! may do with a path and maps the answer onto operations: `Read` gates
//! downloads, `Write` gates uploads, `MaxSize` additionally caps an upload by
//! wrapping its stream with
//! [`StreamExt::write_limited`](crate::stream::StreamExt::write_limited),
//! and the three listing grants select how deep `entries` may walk.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::path::VfsPath;

/// A single granted capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Permission {
    /// Read file contents.
    Read,
    /// Create or replace files.
    Write,
    /// Delete files.
    Delete,
    /// Cap uploads at this many bytes.
    MaxSize(u64),
    /// List direct children.
    ListShallow,
    /// List recursively.
    ListDeep,
    /// List with either mode.
    ListAll,
}

/// Decides what a request may do with a path.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// The permissions granted for `path`. An empty set denies everything.
    async fn grants(&self, path: &VfsPath) -> Result<Vec<Permission>>;
}

/// Grants every permission to every path. For trusted embeddings and tests.
pub struct AllowAll;

#[async_trait]
impl Authorizer for AllowAll {
    async fn grants(&self, _path: &VfsPath) -> Result<Vec<Permission>> {
        Ok(vec![
            Permission::Read,
            Permission::Write,
            Permission::Delete,
            Permission::ListAll,
        ])
    }
}

/// True if `granted` permits a listing of the requested depth.
pub fn allows_listing(granted: &[Permission], recursive: bool) -> bool {
    granted.iter().any(|p| match p {
        Permission::ListAll => true,
        Permission::ListShallow => !recursive,
        Permission::ListDeep => recursive,
        _ => false,
    })
}

/// The upload cap in `granted`, if any.
pub fn max_size(granted: &[Permission]) -> Option<u64> {
    granted.iter().find_map(|p| match p {
        Permission::MaxSize(n) => Some(*n),
        _ => None,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allow_all_grants_everything() {
        let auth = AllowAll;
        let granted = auth.grants(&VfsPath::root()).await.unwrap();
        assert!(granted.contains(&Permission::Read));
        assert!(allows_listing(&granted, true));
        assert!(allows_listing(&granted, false));
    }

    #[test]
    fn listing_depth_selection() {
        let shallow_only = [Permission::ListShallow];
        assert!(allows_listing(&shallow_only, false));
        assert!(!allows_listing(&shallow_only, true));

        let deep_only = [Permission::ListDeep];
        assert!(!allows_listing(&deep_only, false));
        assert!(allows_listing(&deep_only, true));

        assert!(!allows_listing(&[Permission::Read], false));
    }

    #[test]
    fn max_size_extraction() {
        assert_eq!(max_size(&[Permission::Read]), None);
        assert_eq!(
            max_size(&[Permission::Write, Permission::MaxSize(512)]),
            Some(512)
        );
    }
}
