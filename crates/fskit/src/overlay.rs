//! Overlay filesystem implementation.
//!
//! [`OverlayFs`] composes a read-only `lower` layer with a writable `upper`
//! layer. Reads fall through to the lower layer until a path is written, at
//! which point the file is copied up into the upper layer via
//! [`FileSystem::integrate`] and all subsequent access sees the copy.
//! Deletions go to the upper layer, whose [`FileStatus::Deleted`] markers
//! shadow same-named lower files.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use crate::entry::FileEntry;
use crate::error::{Error, Result};
use crate::fs::{FileStatus, FileSystem, ListMode, SubFsMode};
use crate::memory::{MemoryDir, MemoryFs};
use crate::path::VfsPath;

/// Copy-on-write composition of two filesystems.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use fskit::{FileSystem, MemoryFs, OverlayFs, VfsPath};
///
/// # #[tokio::main]
/// # async fn main() -> fskit::Result<()> {
/// let lower = Arc::new(MemoryFs::new());
/// let path: VfsPath = "/r.txt".parse()?;
/// let mut f = lower.create_file(&path).await?;
/// f.write_all(b"lo").await?;
/// drop(f);
///
/// let overlay = OverlayFs::new(lower.clone(), Arc::new(MemoryFs::new()));
///
/// // Writing through the overlay copies the file up; the lower layer
/// // keeps its original contents.
/// let mut rw = overlay.open_read_write(&path).await?;
/// rw.write_all(b"hi").await?;
/// drop(rw);
///
/// let mut through = overlay.open_read(&path).await?.expect("visible");
/// assert_eq!(through.read_to_string().await?, "hi");
/// let mut original = lower.open_read(&path).await?.expect("intact");
/// assert_eq!(original.read_to_string().await?, "lo");
/// # Ok(())
/// # }
/// ```
pub struct OverlayFs {
    lower: Arc<dyn FileSystem>,
    upper: Arc<dyn FileSystem>,
}

impl OverlayFs {
    /// Compose `lower` (treated as the pristine source) with `upper` (where
    /// every mutation lands).
    pub fn new(lower: Arc<dyn FileSystem>, upper: Arc<dyn FileSystem>) -> Self {
        OverlayFs { lower, upper }
    }
}

#[async_trait]
impl FileSystem for OverlayFs {
    fn read_only(&self) -> bool {
        self.upper.read_only()
    }

    async fn file_exists(&self, path: &VfsPath) -> Result<bool> {
        match self.upper.file_stat(path).await? {
            FileStatus::Exists => Ok(true),
            FileStatus::Deleted => Ok(false),
            FileStatus::NotFound => self.lower.file_exists(path).await,
        }
    }

    async fn dir_exists(&self, path: &VfsPath) -> Result<bool> {
        if self.upper.dir_exists(path).await? {
            return Ok(true);
        }
        self.lower.dir_exists(path).await
    }

    async fn file_stat(&self, path: &VfsPath) -> Result<FileStatus> {
        match self.upper.file_stat(path).await? {
            FileStatus::NotFound => self.lower.file_stat(path).await,
            status => Ok(status),
        }
    }

    async fn create_file(&self, path: &VfsPath) -> Result<FileEntry> {
        self.upper.create_file(path).await
    }

    async fn create_dir(&self, path: &VfsPath) -> Result<FileEntry> {
        self.upper.create_dir(path).await
    }

    async fn open_read(&self, path: &VfsPath) -> Result<Option<FileEntry>> {
        match self.upper.file_stat(path).await? {
            FileStatus::Exists => self.upper.open_read(path).await,
            FileStatus::Deleted => Ok(None),
            FileStatus::NotFound => self.lower.open_read(path).await,
        }
    }

    async fn open_write(&self, path: &VfsPath) -> Result<Option<FileEntry>> {
        let handle = self.open_read_write(path).await?;
        Ok(Some(handle.into_write_only()?))
    }

    async fn open_read_write(&self, path: &VfsPath) -> Result<FileEntry> {
        match self.upper.file_stat(path).await? {
            FileStatus::Exists => self.upper.open_read_write(path).await,
            // A deletion marker shadows the lower layer, so this starts
            // fresh instead of copying up.
            FileStatus::Deleted => self.upper.create_file(path).await,
            FileStatus::NotFound => match self.lower.open_read(path).await? {
                Some(source) => self.upper.integrate(source).await,
                None => self.upper.create_file(path).await,
            },
        }
    }

    async fn delete_file(&self, path: &VfsPath) -> Result<bool> {
        self.upper.delete_file(path).await
    }

    async fn delete_dir(&self, path: &VfsPath, recursive: bool) -> Result<bool> {
        self.upper.delete_dir(path, recursive).await
    }

    async fn integrate(&self, source: FileEntry) -> Result<FileEntry> {
        self.upper.integrate(source).await
    }

    async fn entries(&self, path: &VfsPath, mode: ListMode) -> Result<Vec<FileEntry>> {
        let mut seen: HashSet<VfsPath> = HashSet::new();
        let mut out: Vec<FileEntry> = Vec::new();

        let upper_entries = match self.upper.entries(path, mode.clone()).await {
            Ok(entries) => entries,
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => return Err(e),
        };
        let upper_missing = upper_entries.is_empty() && !self.upper.dir_exists(path).await?;
        for entry in upper_entries {
            seen.insert(entry.path().clone());
            out.push(entry);
        }

        let lower_entries = match self.lower.entries(path, mode).await {
            Ok(entries) => entries,
            Err(e) if e.is_not_found() => {
                if upper_missing {
                    return Err(Error::not_found(path.as_str()));
                }
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        for entry in lower_entries {
            if seen.contains(entry.path()) {
                continue;
            }
            if entry.is_file()
                && self.upper.file_stat(entry.path()).await? == FileStatus::Deleted
            {
                continue;
            }
            out.push(entry);
        }
        Ok(out)
    }

    async fn at(&self, path: &VfsPath, mode: SubFsMode) -> Result<Arc<dyn FileSystem>> {
        // The lower layer keeps its own policy; writability is the upper
        // layer's concern.
        let lower = match self.lower.at(path, SubFsMode::Inherit).await {
            Ok(fs) => fs,
            Err(e) if e.is_not_found() => {
                // Nothing below this path in the lower layer yet; an empty
                // frozen stand-in keeps the composition total.
                Arc::new(MemoryFs::with_root(MemoryDir::root(), true)) as Arc<dyn FileSystem>
            }
            Err(e) => return Err(e),
        };
        let upper = self.upper.at(path, mode).await?;
        Ok(Arc::new(OverlayFs::new(lower, upper)))
    }
}
