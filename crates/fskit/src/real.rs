//! Host filesystem passthrough.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs::OpenOptions;

use crate::entry::{FileEntry, OpenFile};
use crate::error::{Error, Result};
use crate::fs::{sub_fs_read_only, FileStatus, FileSystem, ListMode, SubFsMode};
use crate::path::VfsPath;
use crate::stream::{copy, FileStream};

/// Thin mapping onto the host filesystem, confined to a root directory.
///
/// Every virtual path resolves under the configured root; a resolution that
/// escapes it fails with [`Error::Forbidden`]. The backend keeps no state of
/// its own: statuses are whatever the host reports, so deleted files show as
/// [`FileStatus::NotFound`], never `Deleted`.
pub struct RealFs {
    root: PathBuf,
    read_only: bool,
}

impl RealFs {
    /// A writable filesystem rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        RealFs {
            root: root.into(),
            read_only: false,
        }
    }

    /// A read-only filesystem rooted at `root`.
    pub fn new_read_only(root: impl Into<PathBuf>) -> Self {
        RealFs {
            root: root.into(),
            read_only: true,
        }
    }

    /// The configured host root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn check_writable(&self) -> Result<()> {
        if self.read_only {
            Err(Error::ReadOnly)
        } else {
            Ok(())
        }
    }

    fn resolve(&self, path: &VfsPath) -> Result<PathBuf> {
        let full = path.full_path(&self.root);
        // VfsPath has no dotted segments, so join cannot climb out; this
        // guards against surprises in the configured root itself.
        if !full.starts_with(&self.root) {
            return Err(Error::forbidden(full.display().to_string()));
        }
        Ok(full)
    }

    async fn open_entry(
        &self,
        path: &VfsPath,
        readable: bool,
        writable: bool,
        create: bool,
        truncate: bool,
    ) -> Result<Option<FileStream>> {
        let full = self.resolve(path)?;
        if create {
            if let Some(parent) = full.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let opened = OpenOptions::new()
            .read(readable)
            .write(writable)
            .create(create)
            .truncate(truncate)
            .open(&full)
            .await;
        let file = match opened {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let len = file.metadata().await?.len();
        Ok(Some(FileStream::new(file, len, readable, writable)))
    }

    fn list_dir<'a>(
        &'a self,
        path: &'a VfsPath,
        mode: &'a ListMode,
        out: &'a mut Vec<FileEntry>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let full = self.resolve(path)?;
            let mut reader = tokio::fs::read_dir(&full).await.map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::not_found(path.as_str())
                } else {
                    e.into()
                }
            })?;

            let mut names: Vec<(String, bool)> = Vec::new();
            while let Some(item) = reader.next_entry().await? {
                let name = item.file_name().to_string_lossy().into_owned();
                let is_dir = item.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
                names.push((name, is_dir));
            }
            names.sort();

            for (name, is_dir) in names {
                // Host names the virtual path grammar cannot express are skipped.
                let Ok(child) = path.append(&name) else { continue };
                if is_dir {
                    if mode.filter().matches(&name) {
                        out.push(FileEntry::Directory(child.clone()));
                    }
                    if mode.is_recursive() {
                        self.list_dir(&child, mode, out).await?;
                    }
                } else if mode.filter().matches(&name) {
                    out.push(FileEntry::FileRef(child));
                }
            }
            Ok(())
        })
    }
}

#[async_trait]
impl FileSystem for RealFs {
    fn read_only(&self) -> bool {
        self.read_only
    }

    async fn file_exists(&self, path: &VfsPath) -> Result<bool> {
        let full = self.resolve(path)?;
        match tokio::fs::metadata(full).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn dir_exists(&self, path: &VfsPath) -> Result<bool> {
        let full = self.resolve(path)?;
        match tokio::fs::metadata(full).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn file_stat(&self, path: &VfsPath) -> Result<FileStatus> {
        if self.file_exists(path).await? {
            Ok(FileStatus::Exists)
        } else {
            Ok(FileStatus::NotFound)
        }
    }

    async fn create_file(&self, path: &VfsPath) -> Result<FileEntry> {
        self.check_writable()?;
        let stream = self
            .open_entry(path, true, true, true, true)
            .await?
            .ok_or_else(|| Error::not_found(path.as_str()))?;
        Ok(FileEntry::ReadWrite(OpenFile::new(
            path.clone(),
            Box::new(stream),
        )))
    }

    async fn create_dir(&self, path: &VfsPath) -> Result<FileEntry> {
        self.check_writable()?;
        let full = self.resolve(path)?;
        tokio::fs::create_dir_all(full).await?;
        Ok(FileEntry::Directory(path.clone()))
    }

    async fn open_read(&self, path: &VfsPath) -> Result<Option<FileEntry>> {
        match self.open_entry(path, true, false, false, false).await? {
            Some(stream) => Ok(Some(FileEntry::ReadOnly(OpenFile::new(
                path.clone(),
                Box::new(stream),
            )))),
            None => Ok(None),
        }
    }

    async fn open_write(&self, path: &VfsPath) -> Result<Option<FileEntry>> {
        self.check_writable()?;
        match self.open_entry(path, false, true, false, false).await? {
            Some(stream) => Ok(Some(FileEntry::WriteOnly(OpenFile::new(
                path.clone(),
                Box::new(stream),
            )))),
            None => Ok(None),
        }
    }

    async fn open_read_write(&self, path: &VfsPath) -> Result<FileEntry> {
        self.check_writable()?;
        let stream = self
            .open_entry(path, true, true, true, false)
            .await?
            .ok_or_else(|| Error::not_found(path.as_str()))?;
        Ok(FileEntry::ReadWrite(OpenFile::new(
            path.clone(),
            Box::new(stream),
        )))
    }

    async fn delete_file(&self, path: &VfsPath) -> Result<bool> {
        self.check_writable()?;
        let full = self.resolve(path)?;
        match tokio::fs::remove_file(full).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_dir(&self, path: &VfsPath, recursive: bool) -> Result<bool> {
        self.check_writable()?;
        let full = self.resolve(path)?;
        let result = if recursive {
            tokio::fs::remove_dir_all(full).await
        } else {
            tokio::fs::remove_dir(full).await
        };
        match result {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn integrate(&self, source: FileEntry) -> Result<FileEntry> {
        self.check_writable()?;
        let path = source.path().clone();
        let mut src = source
            .into_stream()
            .ok_or(Error::NotSupported("integrate needs an open readable entry"))?;
        if !src.readable() {
            return Err(Error::NotSupported("integrate needs an open readable entry"));
        }

        let mut target = self.create_file(&path).await?;
        let _ = src.seek(0).await;
        {
            let dst = target
                .stream()
                .ok_or(Error::NotSupported("created entry is not open"))?;
            copy(&mut *src, &mut **dst).await?;
            dst.flush().await?;
            dst.seek(0).await?;
        }
        Ok(target)
    }

    async fn entries(&self, path: &VfsPath, mode: ListMode) -> Result<Vec<FileEntry>> {
        let mut out = Vec::new();
        self.list_dir(path, &mode, &mut out).await?;
        Ok(out)
    }

    async fn at(&self, path: &VfsPath, mode: SubFsMode) -> Result<Arc<dyn FileSystem>> {
        let read_only = sub_fs_read_only(self.read_only, mode)?;
        let root = self.resolve(path)?;
        Ok(Arc::new(RealFs { root, read_only }))
    }
}
