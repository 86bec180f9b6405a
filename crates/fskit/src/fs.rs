//! Filesystem trait definitions.
//!
//! # Overview
//!
//! [`FileSystem`] is the single contract every backend implements: the
//! in-memory tree, the host-disk passthrough, the object-store backend, the
//! overlay, and the mount router all answer the same set of operations.
//! Callers hold backends as `Arc<dyn FileSystem>` and never care which one
//! they are talking to.
//!
//! # Semantics contract
//!
//! All implementations MUST uphold:
//!
//! 1. **Handles match capabilities**: `open_read` yields entries whose
//!    stream rejects writes; `open_write` yields entries whose stream
//!    rejects reads.
//! 2. **Read-only is absolute**: every mutating operation on a read-only
//!    filesystem fails with [`Error::ReadOnly`] before touching storage.
//! 3. **Listings never open streams**: `entries` produces only
//!    `Directory` and `FileRef` entries.
//! 4. **Per-path atomicity**: a create, delete, or open-for-write on one
//!    path is atomic with respect to readers of the same path on the same
//!    instance.
//!
//! # Cancellation
//!
//! Operations are futures; dropping one abandons the work at its next await
//! point. Partial effects are allowed: a half-copied integrate leaves the
//! target in whatever state the backend reached, and bookkeeping such as
//! tombstones is not rolled back.

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;

use crate::entry::FileEntry;
use crate::error::{Error, Result};
use crate::path::VfsPath;

/// What a filesystem knows about a file path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    /// The file exists.
    Exists,
    /// The file does not exist and never did, as far as this backend knows.
    NotFound,
    /// The file was deleted here; a deletion marker shadows any lower layer.
    Deleted,
}

/// Access policy for a sub-filesystem created with [`FileSystem::at`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubFsMode {
    /// Keep the parent's policy.
    #[default]
    Inherit,
    /// Force read-only.
    ReadOnly,
    /// Require read-write. Upgrading a read-only filesystem fails with
    /// [`Error::ReadOnly`].
    ReadWrite,
}

/// A compiled glob filter over entry names.
///
/// `*` matches any run of characters, `?` matches one character. Matching is
/// case-insensitive and anchored at the end of the name. An empty pattern or
/// a bare `*` matches everything.
#[derive(Debug, Clone)]
pub struct NameFilter(Option<Regex>);

impl NameFilter {
    /// A filter that matches every name.
    pub fn any() -> Self {
        NameFilter(None)
    }

    /// Compile a glob pattern.
    pub fn pattern(glob: &str) -> Result<Self> {
        if glob.is_empty() || glob == "*" {
            return Ok(NameFilter(None));
        }
        let mut re = String::with_capacity(glob.len() + 8);
        re.push_str("(?i)");
        for ch in glob.chars() {
            match ch {
                '*' => re.push_str(".*"),
                '?' => re.push('.'),
                _ => re.push_str(&regex::escape(&ch.to_string())),
            }
        }
        re.push('$');
        let re = Regex::new(&re)
            .map_err(|e| Error::invalid_path(format!("bad filter {:?}: {}", glob, e)))?;
        Ok(NameFilter(Some(re)))
    }

    /// True if `name` passes the filter.
    pub fn matches(&self, name: &str) -> bool {
        match &self.0 {
            None => true,
            Some(re) => re.is_match(name),
        }
    }
}

/// How [`FileSystem::entries`] walks a directory.
#[derive(Debug, Clone)]
pub enum ListMode {
    /// Direct children only.
    Shallow(NameFilter),
    /// Depth-first over the whole subtree.
    Recursive(NameFilter),
}

impl ListMode {
    /// Shallow listing with no filter.
    pub fn shallow() -> Self {
        ListMode::Shallow(NameFilter::any())
    }

    /// Recursive listing with no filter.
    pub fn recursive() -> Self {
        ListMode::Recursive(NameFilter::any())
    }

    /// The name filter to apply.
    pub fn filter(&self) -> &NameFilter {
        match self {
            ListMode::Shallow(f) | ListMode::Recursive(f) => f,
        }
    }

    /// True for [`ListMode::Recursive`].
    pub fn is_recursive(&self) -> bool {
        matches!(self, ListMode::Recursive(_))
    }
}

/// Async virtual filesystem.
///
/// Implement this to add a storage backend; wrap existing implementations
/// ([`MemoryFs`](crate::MemoryFs), [`RealFs`](crate::RealFs),
/// [`ObjectStoreFs`](crate::ObjectStoreFs)) with
/// [`OverlayFs`](crate::OverlayFs) or [`MountFs`](crate::MountFs) to
/// compose them.
///
/// # Thread safety
///
/// Implementations must be `Send + Sync`; use interior mutability for
/// shared state. The filesystem object is safe for concurrent operations on
/// distinct paths. Handles it returns are single-caller.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// True if mutating operations are rejected.
    fn read_only(&self) -> bool;

    /// Check whether a file exists at `path`.
    async fn file_exists(&self, path: &VfsPath) -> Result<bool>;

    /// Check whether a directory exists at `path`.
    async fn dir_exists(&self, path: &VfsPath) -> Result<bool>;

    /// Report the status of a file path, distinguishing deleted paths when
    /// the backend keeps deletion markers.
    async fn file_stat(&self, path: &VfsPath) -> Result<FileStatus>;

    /// Create (or replace) a file, returning a read-write handle.
    ///
    /// Missing parent directories are created. Replacing an existing file
    /// discards its previous contents.
    async fn create_file(&self, path: &VfsPath) -> Result<FileEntry>;

    /// Create a directory and any missing intermediates. Idempotent for an
    /// existing directory.
    async fn create_dir(&self, path: &VfsPath) -> Result<FileEntry>;

    /// Open a file for reading. `None` if it does not exist.
    async fn open_read(&self, path: &VfsPath) -> Result<Option<FileEntry>>;

    /// Open a file for writing.
    ///
    /// Whether a missing file is created or reported as `None` is
    /// backend policy: the memory backend creates it, the host-disk and
    /// object-store backends return `None`.
    async fn open_write(&self, path: &VfsPath) -> Result<Option<FileEntry>>;

    /// Open a file for reading and writing, creating it if absent.
    async fn open_read_write(&self, path: &VfsPath) -> Result<FileEntry>;

    /// Delete a file. Returns `true` iff a file was removed.
    async fn delete_file(&self, path: &VfsPath) -> Result<bool>;

    /// Delete a directory. Returns `true` iff it was removed.
    ///
    /// Refusing to delete a non-empty directory without `recursive` is
    /// backend-defined; the flat object store always deletes the subtree.
    async fn delete_dir(&self, path: &VfsPath, recursive: bool) -> Result<bool>;

    /// Import a readable entry from another filesystem.
    ///
    /// Creates or replaces the file at the source entry's path in this
    /// filesystem and bulk-copies the source's remaining bytes. Returns a
    /// read-write handle over the imported file. This is the copy-up
    /// primitive the overlay uses.
    ///
    /// # Errors
    ///
    /// [`Error::NotSupported`] if `source` is not open for reading.
    async fn integrate(&self, source: FileEntry) -> Result<FileEntry>;

    /// List a directory.
    ///
    /// Entries come back as [`FileEntry::Directory`] and
    /// [`FileEntry::FileRef`] with paths relative to this filesystem's
    /// root. Fails with [`Error::NotFound`] if the directory is absent.
    async fn entries(&self, path: &VfsPath, mode: ListMode) -> Result<Vec<FileEntry>>;

    /// A sub-filesystem rooted at `path`.
    async fn at(&self, path: &VfsPath, mode: SubFsMode) -> Result<Arc<dyn FileSystem>>;
}

/// Resolve the read-only flag of a sub-filesystem.
///
/// Shared by every backend's `at`: `Inherit` keeps the parent flag,
/// `ReadOnly` forces it on, and `ReadWrite` fails if the parent is already
/// read-only.
pub(crate) fn sub_fs_read_only(parent_read_only: bool, mode: SubFsMode) -> Result<bool> {
    match mode {
        SubFsMode::Inherit => Ok(parent_read_only),
        SubFsMode::ReadOnly => Ok(true),
        SubFsMode::ReadWrite => {
            if parent_read_only {
                Err(Error::ReadOnly)
            } else {
                Ok(false)
            }
        }
    }
}
