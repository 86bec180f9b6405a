//! Object-store filesystem.
//!
//! Object stores expose one flat key namespace, so everything directory-
//! shaped here is simulated: a shared [`StoreNamespace`] tracks directories
//! that exist logically but hold no objects yet, plus files that have been
//! opened but not flushed. The namespace is rooted in the outermost
//! filesystem and handed by `Arc` into every sub-filesystem, so a directory
//! created through `at("/sub")` is immediately visible on the parent and
//! vice versa.
//!
//! Writes never touch the store directly. They accumulate in an
//! [`UploadStream`] buffer and become externally visible only on `flush`,
//! which uploads the buffer as a single object (content type inferred from
//! the extension) after lazily ensuring the bucket exists.

// RwLock.read()/write().unwrap() only panics on lock poisoning (prior panic
// while holding lock). This is intentional - corrupted state should not propagate.
#![allow(clippy::unwrap_used)]

mod client;
mod http;
mod memory;

pub use client::{ObjectStat, ObjectStoreClient, ObjectStoreConfig};
pub use http::{HttpObjectStore, HttpBodyStream};
pub use memory::MemoryObjectStore;

use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::entry::{FileEntry, OpenFile};
use crate::error::{Error, Result};
use crate::fs::{sub_fs_read_only, FileStatus, FileSystem, ListMode, SubFsMode};
use crate::mime;
use crate::path::VfsPath;
use crate::stream::{self, BoxStream, MemoryStream, Stream, StreamExt};

/// In-process bookkeeping shared along an `at()` chain.
struct StoreNamespace {
    /// Directories that exist logically but have no objects under them.
    directories: RwLock<HashSet<VfsPath>>,
    /// Files opened for writing whose upload has not happened yet.
    files: RwLock<HashSet<VfsPath>>,
    /// Set once the bucket is known to exist.
    bucket_ready: AtomicBool,
}

/// Filesystem over an S3-style object store.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use fskit::{FileSystem, VfsPath};
/// use fskit::object_store::{MemoryObjectStore, ObjectStoreFs};
///
/// # #[tokio::main]
/// # async fn main() -> fskit::Result<()> {
/// let client = Arc::new(MemoryObjectStore::new());
/// let fs = ObjectStoreFs::new(client, "", false);
///
/// let path: VfsPath = "/k.txt".parse()?;
/// let mut file = fs.create_file(&path).await?;
/// file.write_all(b"A").await?; // write_all flushes, which uploads
/// assert!(fs.file_exists(&path).await?);
/// # Ok(())
/// # }
/// ```
pub struct ObjectStoreFs {
    client: Arc<dyn ObjectStoreClient>,
    ns: Arc<StoreNamespace>,
    /// Root of this instance within the outermost namespace.
    prefix: VfsPath,
    /// Key prefix prepended to every path, from the configuration.
    key_prefix: String,
    read_only: bool,
}

impl ObjectStoreFs {
    /// A filesystem over `client`, storing keys under `key_prefix`.
    pub fn new(
        client: Arc<dyn ObjectStoreClient>,
        key_prefix: impl Into<String>,
        read_only: bool,
    ) -> Self {
        let key_prefix = key_prefix.into().trim_matches('/').to_string();
        ObjectStoreFs {
            client,
            ns: Arc::new(StoreNamespace {
                directories: RwLock::new(HashSet::new()),
                files: RwLock::new(HashSet::new()),
                bucket_ready: AtomicBool::new(false),
            }),
            prefix: VfsPath::root(),
            key_prefix,
            read_only,
        }
    }

    fn check_writable(&self) -> Result<()> {
        if self.read_only {
            Err(Error::ReadOnly)
        } else {
            Ok(())
        }
    }

    fn abs(&self, path: &VfsPath) -> VfsPath {
        self.prefix.join(path)
    }

    fn rel(&self, abs: &VfsPath) -> Option<VfsPath> {
        abs.rebase(&self.prefix, &VfsPath::root()).ok()
    }

    fn key_for_abs(&self, abs: &VfsPath) -> String {
        if self.key_prefix.is_empty() {
            abs.as_str()[1..].to_string()
        } else if abs.is_root() {
            self.key_prefix.clone()
        } else {
            format!("{}{}", self.key_prefix, abs.as_str())
        }
    }

    fn key(&self, path: &VfsPath) -> String {
        self.key_for_abs(&self.abs(path))
    }

    /// Listing prefix for everything under a directory path.
    fn dir_key(&self, path: &VfsPath) -> String {
        let key = self.key(path);
        if key.is_empty() {
            key
        } else {
            format!("{}/", key)
        }
    }

    /// Map a store key back to a path relative to this instance.
    fn path_for_key(&self, key: &str) -> Option<VfsPath> {
        let rest = if self.key_prefix.is_empty() {
            key
        } else {
            // A sibling prefix like "tenant-ab" must not pass a
            // "tenant-a" filter, hence the explicit separator check.
            let rest = key.strip_prefix(&self.key_prefix)?;
            if rest.is_empty() {
                rest
            } else {
                rest.strip_prefix('/')?
            }
        };
        let abs = VfsPath::parse(&format!("/{}", rest.trim_end_matches('/'))).ok()?;
        self.rel(&abs)
    }

    /// Record every ancestor of `abs` as a simulated directory.
    fn register_parents(&self, abs: &VfsPath) {
        let mut dirs = self.ns.directories.write().unwrap();
        let mut current = abs.parent();
        while let Some(dir) = current {
            if dir.is_root() {
                break;
            }
            dirs.insert(dir.clone());
            current = dir.parent();
        }
    }

    fn upload_stream(&self, path: &VfsPath, buf: Vec<u8>) -> UploadStream {
        UploadStream {
            client: self.client.clone(),
            ns: self.ns.clone(),
            key: self.key(path),
            content_type: mime::mime_for_path(path),
            buf,
            pos: 0,
        }
    }

    async fn fetch_bytes(&self, path: &VfsPath) -> Result<Option<Vec<u8>>> {
        match self.client.get_object(&self.key(path)).await? {
            Some(mut s) => Ok(Some(stream::read_to_end(&mut *s).await?)),
            None => Ok(None),
        }
    }

    /// Open a write-through handle preloaded with the object's current
    /// bytes, registering the path so it exists before the first flush.
    async fn open_buffered(&self, path: &VfsPath) -> Result<FileEntry> {
        let bytes = self.fetch_bytes(path).await?.unwrap_or_default();
        let abs = self.abs(path);
        self.register_parents(&abs);
        self.ns.files.write().unwrap().insert(abs);
        Ok(FileEntry::ReadWrite(OpenFile::new(
            path.clone(),
            Box::new(self.upload_stream(path, bytes)),
        )))
    }

    /// The ancestor of `path` that sits directly below `base`.
    fn first_below(base: &VfsPath, path: &VfsPath) -> Option<VfsPath> {
        let mut current = path.clone();
        loop {
            let parent = current.parent()?;
            if &parent == base {
                return Some(current);
            }
            if !current.in_directory(base) {
                return None;
            }
            current = parent;
        }
    }
}

#[async_trait]
impl FileSystem for ObjectStoreFs {
    fn read_only(&self) -> bool {
        self.read_only
    }

    async fn file_exists(&self, path: &VfsPath) -> Result<bool> {
        if self.ns.files.read().unwrap().contains(&self.abs(path)) {
            return Ok(true);
        }
        // Client failures read as absence for existence checks.
        Ok(matches!(
            self.client.stat_object(&self.key(path)).await,
            Ok(Some(_))
        ))
    }

    async fn dir_exists(&self, path: &VfsPath) -> Result<bool> {
        let abs = self.abs(path);
        if abs.is_root() {
            return Ok(true);
        }
        if self.ns.directories.read().unwrap().contains(&abs) {
            return Ok(true);
        }
        match self.client.list_objects(&self.dir_key(path), true).await {
            Ok(stats) => Ok(!stats.is_empty()),
            Err(_) => Ok(false),
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
        let abs = self.abs(path);
        self.register_parents(&abs);
        self.ns.files.write().unwrap().insert(abs);
        Ok(FileEntry::ReadWrite(OpenFile::new(
            path.clone(),
            Box::new(self.upload_stream(path, Vec::new())),
        )))
    }

    async fn create_dir(&self, path: &VfsPath) -> Result<FileEntry> {
        self.check_writable()?;
        let abs = self.abs(path);
        if !abs.is_root() {
            self.register_parents(&abs);
            self.ns.directories.write().unwrap().insert(abs);
        }
        Ok(FileEntry::Directory(path.clone()))
    }

    async fn open_read(&self, path: &VfsPath) -> Result<Option<FileEntry>> {
        if let Some(body) = self.client.get_object(&self.key(path)).await? {
            return Ok(Some(FileEntry::ReadOnly(OpenFile::new(
                path.clone(),
                body.read_only(),
            ))));
        }
        // A file created but not yet flushed reads as empty.
        if self.ns.files.read().unwrap().contains(&self.abs(path)) {
            let empty: BoxStream = Box::new(MemoryStream::new());
            return Ok(Some(FileEntry::ReadOnly(OpenFile::new(
                path.clone(),
                empty.read_only(),
            ))));
        }
        Ok(None)
    }

    async fn open_write(&self, path: &VfsPath) -> Result<Option<FileEntry>> {
        self.check_writable()?;
        if !self.file_exists(path).await? {
            return Ok(None);
        }
        let entry = self.open_buffered(path).await?;
        Ok(Some(entry.into_write_only()?))
    }

    async fn open_read_write(&self, path: &VfsPath) -> Result<FileEntry> {
        self.check_writable()?;
        self.open_buffered(path).await
    }

    async fn delete_file(&self, path: &VfsPath) -> Result<bool> {
        self.check_writable()?;
        let existed = self.file_exists(path).await?;
        self.ns.files.write().unwrap().remove(&self.abs(path));
        self.client.remove_object(&self.key(path)).await?;
        Ok(existed)
    }

    async fn delete_dir(&self, path: &VfsPath, _recursive: bool) -> Result<bool> {
        self.check_writable()?;
        let existed = self.dir_exists(path).await?;

        // The store is flat, so removing a directory is removing the keys
        // under its prefix; there is no cheaper non-recursive variant.
        let stats = self.client.list_objects(&self.dir_key(path), true).await?;
        for stat in stats {
            self.client.remove_object(&stat.key).await?;
        }

        let abs = self.abs(path);
        self.ns
            .directories
            .write()
            .unwrap()
            .retain(|d| d != &abs && !d.in_directory(&abs));
        self.ns
            .files
            .write()
            .unwrap()
            .retain(|f| !f.in_directory(&abs));
        Ok(existed)
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
        let _ = src.seek(0).await;
        let bytes = stream::read_to_end(&mut *src).await?;

        let abs = self.abs(&path);
        self.register_parents(&abs);
        self.ns.files.write().unwrap().insert(abs);
        Ok(FileEntry::ReadWrite(OpenFile::new(
            path.clone(),
            Box::new(self.upload_stream(&path, bytes)),
        )))
    }

    async fn entries(&self, path: &VfsPath, mode: ListMode) -> Result<Vec<FileEntry>> {
        if !self.dir_exists(path).await? {
            return Err(Error::not_found(path.as_str()));
        }

        let mut dirs: BTreeSet<VfsPath> = BTreeSet::new();
        let mut files: BTreeSet<VfsPath> = BTreeSet::new();

        for stat in self.client.list_objects(&self.dir_key(path), true).await? {
            let Some(p) = self.path_for_key(&stat.key) else { continue };
            if !p.in_directory(path) {
                continue;
            }
            files.insert(p.clone());
            // Keys imply every directory on the way down.
            let mut current = p.parent();
            while let Some(dir) = current {
                if &dir == path || !dir.in_directory(path) {
                    break;
                }
                dirs.insert(dir.clone());
                current = dir.parent();
            }
        }

        for dir in self.ns.directories.read().unwrap().iter() {
            if let Some(p) = self.rel(dir) {
                if p.in_directory(path) {
                    dirs.insert(p);
                }
            }
        }
        for file in self.ns.files.read().unwrap().iter() {
            if let Some(p) = self.rel(file) {
                if p.in_directory(path) {
                    files.insert(p);
                }
            }
        }

        // Shallow mode collapses everything to the layer directly below the
        // queried directory.
        let (dirs, files) = if mode.is_recursive() {
            (dirs, files)
        } else {
            let mut top_dirs = BTreeSet::new();
            let mut top_files = BTreeSet::new();
            for d in dirs {
                if let Some(top) = Self::first_below(path, &d) {
                    top_dirs.insert(top);
                }
            }
            for f in files {
                if f.parent().as_ref() == Some(path) {
                    top_files.insert(f);
                } else if let Some(top) = Self::first_below(path, &f) {
                    top_dirs.insert(top);
                }
            }
            (top_dirs, top_files)
        };

        let mut out: Vec<FileEntry> = Vec::new();
        for d in dirs {
            if matches_name(&mode, &d) {
                out.push(FileEntry::Directory(d));
            }
        }
        for f in files {
            if matches_name(&mode, &f) {
                out.push(FileEntry::FileRef(f));
            }
        }
        out.sort_by(|a, b| a.path().cmp(b.path()));
        Ok(out)
    }

    async fn at(&self, path: &VfsPath, mode: SubFsMode) -> Result<Arc<dyn FileSystem>> {
        let read_only = sub_fs_read_only(self.read_only, mode)?;
        Ok(Arc::new(ObjectStoreFs {
            client: self.client.clone(),
            ns: self.ns.clone(),
            prefix: self.prefix.join(path),
            key_prefix: self.key_prefix.clone(),
            read_only,
        }))
    }
}

fn matches_name(mode: &ListMode, path: &VfsPath) -> bool {
    path.file_name()
        .map(|name| mode.filter().matches(name))
        .unwrap_or(false)
}

/// Write-through stream backing object-store file handles.
///
/// Reads and writes operate on an in-memory buffer; `flush` uploads the
/// buffer's current contents as one object, creating the bucket first if
/// nobody has yet.
pub struct UploadStream {
    client: Arc<dyn ObjectStoreClient>,
    ns: Arc<StoreNamespace>,
    key: String,
    content_type: &'static str,
    buf: Vec<u8>,
    pos: u64,
}

#[async_trait]
impl Stream for UploadStream {
    fn readable(&self) -> bool {
        true
    }

    fn writable(&self) -> bool {
        true
    }

    fn owned(&self) -> bool {
        true
    }

    fn len(&self) -> u64 {
        self.buf.len() as u64
    }

    fn position(&self) -> u64 {
        self.pos
    }

    async fn seek(&mut self, pos: u64) -> Result<()> {
        self.pos = pos;
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let start = (self.pos as usize).min(self.buf.len());
        let n = buf.len().min(self.buf.len() - start);
        buf[..n].copy_from_slice(&self.buf[start..start + n]);
        self.pos += n as u64;
        Ok(n)
    }

    async fn write(&mut self, buf: &[u8]) -> Result<()> {
        let start = self.pos as usize;
        if start > self.buf.len() {
            self.buf.resize(start, 0);
        }
        let overlap = buf.len().min(self.buf.len().saturating_sub(start));
        self.buf[start..start + overlap].copy_from_slice(&buf[..overlap]);
        self.buf.extend_from_slice(&buf[overlap..]);
        self.pos += buf.len() as u64;
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        if !self.ns.bucket_ready.load(Ordering::Acquire) {
            if !self.client.bucket_exists().await? {
                self.client.make_bucket().await?;
            }
            self.ns.bucket_ready.store(true, Ordering::Release);
        }
        self.client
            .put_object(&self.key, &self.buf, self.content_type)
            .await
    }

    async fn set_len(&mut self, len: u64) -> Result<()> {
        self.buf.resize(len as usize, 0);
        Ok(())
    }
}
