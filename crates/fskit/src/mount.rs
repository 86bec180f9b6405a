//! Mount-table filesystem.
//!
//! [`MountFs`] routes every operation to the child filesystem whose mount
//! point is the longest prefix of the requested path, after rebasing the
//! path so the child sees itself rooted at `/`. It is a pure router: it
//! stores nothing, merges nothing across mounts, and advertises itself as
//! read-only while still passing mutations through to whichever child owns
//! the path.

// RwLock.read()/write().unwrap() only panics on lock poisoning (prior panic
// while holding lock). This is intentional - corrupted state should not propagate.
#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::entry::FileEntry;
use crate::error::{Error, Result};
use crate::fs::{FileStatus, FileSystem, ListMode, SubFsMode};
use crate::path::VfsPath;

/// Longest-prefix router over mounted filesystems.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use fskit::{FileSystem, MemoryFs, MountFs, VfsPath};
///
/// # #[tokio::main]
/// # async fn main() -> fskit::Result<()> {
/// let scratch = Arc::new(MemoryFs::new());
/// let home = Arc::new(MemoryFs::new());
///
/// let mounts = MountFs::new();
/// mounts.mount("/tmp".parse()?, scratch.clone());
/// mounts.mount("/".parse()?, home);
///
/// mounts.create_file(&"/tmp/x".parse()?).await?;
/// // The file landed in the scratch filesystem as /x.
/// assert!(scratch.file_exists(&"/x".parse()?).await?);
/// # Ok(())
/// # }
/// ```
pub struct MountFs {
    mounts: RwLock<HashMap<VfsPath, Arc<dyn FileSystem>>>,
}

impl MountFs {
    /// An empty mount table.
    pub fn new() -> Self {
        MountFs {
            mounts: RwLock::new(HashMap::new()),
        }
    }

    /// Mount `fs` at `path`, replacing any filesystem already mounted there.
    pub fn mount(&self, path: VfsPath, fs: Arc<dyn FileSystem>) {
        self.mounts.write().unwrap().insert(path, fs);
    }

    /// Remove the mount at `path`.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if nothing is mounted there.
    pub fn unmount(&self, path: &VfsPath) -> Result<()> {
        match self.mounts.write().unwrap().remove(path) {
            Some(_) => Ok(()),
            None => Err(Error::not_found(path.as_str())),
        }
    }

    /// Mount points currently in the table.
    pub fn mount_points(&self) -> Vec<VfsPath> {
        let mut points: Vec<VfsPath> = self.mounts.read().unwrap().keys().cloned().collect();
        points.sort();
        points
    }

    /// Pick the owning child for `path` and rebase the path into it.
    fn route(&self, path: &VfsPath) -> Result<(Arc<dyn FileSystem>, VfsPath)> {
        let mounts = self.mounts.read().unwrap();
        let mut best: Option<(&VfsPath, &Arc<dyn FileSystem>)> = None;
        for (mount_path, fs) in mounts.iter() {
            if path == mount_path || path.in_directory(mount_path) {
                let longer = match best {
                    None => true,
                    Some((current, _)) => mount_path.as_str().len() > current.as_str().len(),
                };
                if longer {
                    best = Some((mount_path, fs));
                }
            }
        }
        match best {
            Some((mount_path, fs)) => {
                let rebased = path.rebase(mount_path, &VfsPath::root())?;
                Ok((fs.clone(), rebased))
            }
            None => Err(Error::not_found(path.as_str())),
        }
    }
}

impl Default for MountFs {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileSystem for MountFs {
    /// The router itself is not writable; children decide their own policy.
    fn read_only(&self) -> bool {
        true
    }

    async fn file_exists(&self, path: &VfsPath) -> Result<bool> {
        let (fs, rebased) = self.route(path)?;
        fs.file_exists(&rebased).await
    }

    async fn dir_exists(&self, path: &VfsPath) -> Result<bool> {
        let (fs, rebased) = self.route(path)?;
        fs.dir_exists(&rebased).await
    }

    async fn file_stat(&self, path: &VfsPath) -> Result<FileStatus> {
        let (fs, rebased) = self.route(path)?;
        fs.file_stat(&rebased).await
    }

    async fn create_file(&self, path: &VfsPath) -> Result<FileEntry> {
        let (fs, rebased) = self.route(path)?;
        fs.create_file(&rebased).await
    }

    async fn create_dir(&self, path: &VfsPath) -> Result<FileEntry> {
        let (fs, rebased) = self.route(path)?;
        fs.create_dir(&rebased).await
    }

    async fn open_read(&self, path: &VfsPath) -> Result<Option<FileEntry>> {
        let (fs, rebased) = self.route(path)?;
        fs.open_read(&rebased).await
    }

    async fn open_write(&self, path: &VfsPath) -> Result<Option<FileEntry>> {
        let (fs, rebased) = self.route(path)?;
        fs.open_write(&rebased).await
    }

    async fn open_read_write(&self, path: &VfsPath) -> Result<FileEntry> {
        let (fs, rebased) = self.route(path)?;
        fs.open_read_write(&rebased).await
    }

    async fn delete_file(&self, path: &VfsPath) -> Result<bool> {
        let (fs, rebased) = self.route(path)?;
        fs.delete_file(&rebased).await
    }

    async fn delete_dir(&self, path: &VfsPath, recursive: bool) -> Result<bool> {
        let (fs, rebased) = self.route(path)?;
        fs.delete_dir(&rebased, recursive).await
    }

    async fn integrate(&self, source: FileEntry) -> Result<FileEntry> {
        let (fs, rebased) = self.route(source.path())?;
        fs.integrate(source.with_path(rebased)).await
    }

    /// Listing never merges across mount points: the single owning child
    /// answers, with entry paths relative to that child.
    async fn entries(&self, path: &VfsPath, mode: ListMode) -> Result<Vec<FileEntry>> {
        let (fs, rebased) = self.route(path)?;
        fs.entries(&rebased, mode).await
    }

    async fn at(&self, path: &VfsPath, mode: SubFsMode) -> Result<Arc<dyn FileSystem>> {
        let (fs, rebased) = self.route(path)?;
        fs.at(&rebased, mode).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::memory::MemoryFs;

    fn p(s: &str) -> VfsPath {
        VfsPath::parse(s).unwrap()
    }

    fn table() -> (Arc<MemoryFs>, Arc<MemoryFs>, MountFs) {
        let a = Arc::new(MemoryFs::new());
        let b = Arc::new(MemoryFs::new());
        let mounts = MountFs::new();
        mounts.mount(p("/tmp"), a.clone());
        mounts.mount(p("/"), b.clone());
        (a, b, mounts)
    }

    #[tokio::test]
    async fn routes_by_longest_prefix() {
        let (a, b, mounts) = table();

        mounts.create_file(&p("/tmp/x")).await.unwrap();
        mounts.create_file(&p("/y")).await.unwrap();

        assert!(a.file_exists(&p("/x")).await.unwrap());
        assert!(b.file_exists(&p("/y")).await.unwrap());
        assert!(!b.file_exists(&p("/tmp/x")).await.unwrap());
    }

    #[tokio::test]
    async fn listing_stays_within_one_mount() {
        let (_, _, mounts) = table();
        mounts.create_file(&p("/tmp/x")).await.unwrap();
        mounts.create_file(&p("/y")).await.unwrap();

        let entries = mounts.entries(&p("/tmp"), ListMode::shallow()).await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.path().as_str()).collect();
        assert_eq!(names, vec!["/x"]);
    }

    #[tokio::test]
    async fn nested_mounts_prefer_the_deeper_one() {
        let outer = Arc::new(MemoryFs::new());
        let inner = Arc::new(MemoryFs::new());
        let mounts = MountFs::new();
        mounts.mount(p("/mnt"), outer.clone());
        mounts.mount(p("/mnt/nested"), inner.clone());

        mounts.create_file(&p("/mnt/a")).await.unwrap();
        mounts.create_file(&p("/mnt/nested/b")).await.unwrap();

        assert!(outer.file_exists(&p("/a")).await.unwrap());
        assert!(inner.file_exists(&p("/b")).await.unwrap());
        assert!(!outer.file_exists(&p("/nested/b")).await.unwrap());
    }

    #[tokio::test]
    async fn no_matching_mount_is_not_found() {
        let mounts = MountFs::new();
        mounts.mount(p("/data"), Arc::new(MemoryFs::new()));

        let err = mounts.file_exists(&p("/elsewhere/f")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn unmount_removes_routing() {
        let (_, _, mounts) = table();
        mounts.create_file(&p("/tmp/x")).await.unwrap();

        mounts.unmount(&p("/tmp")).unwrap();
        assert!(mounts.unmount(&p("/tmp")).is_err());

        // /tmp/x now routes to the "/" mount, which has no such file.
        assert!(!mounts.file_exists(&p("/tmp/x")).await.unwrap());
    }

    #[tokio::test]
    async fn at_enters_the_owning_child() {
        let (a, _, mounts) = table();
        mounts.create_file(&p("/tmp/docs/f.txt")).await.unwrap();

        let sub = mounts.at(&p("/tmp/docs"), SubFsMode::Inherit).await.unwrap();
        assert!(sub.file_exists(&p("/f.txt")).await.unwrap());

        // At exactly the mount point we get the child's root.
        let root = mounts.at(&p("/tmp"), SubFsMode::Inherit).await.unwrap();
        assert!(root.file_exists(&p("/docs/f.txt")).await.unwrap());
        assert!(a.file_exists(&p("/docs/f.txt")).await.unwrap());
    }

    #[tokio::test]
    async fn integrate_rebases_into_the_owning_child() {
        let (a, _, mounts) = table();

        let source_fs = MemoryFs::new();
        let mut f = source_fs.create_file(&p("/tmp/foo.txt")).await.unwrap();
        f.write_all(b"payload").await.unwrap();
        drop(f);

        let readable = source_fs.open_read(&p("/tmp/foo.txt")).await.unwrap().unwrap();
        let mut imported = mounts.integrate(readable).await.unwrap();

        // The child sees the rebased path, not the mount-space path.
        assert_eq!(imported.path().as_str(), "/foo.txt");
        assert_eq!(imported.read_to_end().await.unwrap(), b"payload");
        assert!(a.file_exists(&p("/foo.txt")).await.unwrap());
        assert!(!a.dir_exists(&p("/tmp")).await.unwrap());
    }

    #[tokio::test]
    async fn router_reports_read_only_but_routes_writes() {
        let (_, _, mounts) = table();
        assert!(mounts.read_only());
        // Children accept writes regardless of the router's own flag.
        mounts.create_file(&p("/tmp/w")).await.unwrap();
    }

    #[test]
    fn mount_points_are_listed() {
        let mounts = MountFs::new();
        mounts.mount(p("/b"), Arc::new(MemoryFs::new()));
        mounts.mount(p("/a"), Arc::new(MemoryFs::new()));
        let points = mounts.mount_points();
        let names: Vec<_> = points.iter().map(|q| q.as_str()).collect();
        assert_eq!(names, vec!["/a", "/b"]);
    }
}
