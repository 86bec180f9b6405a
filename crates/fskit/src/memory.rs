//! In-memory filesystem implementation.
//!
//! [`MemoryFs`] keeps a rooted tree of directory nodes whose file leaves are
//! shared byte buffers. Opening a file hands out a mirror over the tree's
//! buffer, so any number of readers coexist without disturbing each other's
//! cursors. Deletions leave tombstones in a set owned by the tree root;
//! [`FileSystem::file_stat`] reports those paths as
//! [`FileStatus::Deleted`], which is what lets an overlay hide a lower-layer
//! file after a delete.

// RwLock.read()/write().unwrap() only panics on lock poisoning (prior panic
// while holding lock). This is intentional - corrupted state should not propagate.
#![allow(clippy::unwrap_used)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::entry::{FileEntry, OpenFile};
use crate::error::{Error, Result};
use crate::fs::{sub_fs_read_only, FileStatus, FileSystem, ListMode, SubFsMode};
use crate::path::VfsPath;
use crate::stream::{self, BoxStream, MemoryStream, SharedBuf, StreamExt};

/// A directory node in a memory tree.
///
/// Nodes are shared: several [`MemoryFs`] instances may be rooted at the
/// same node (see [`MemoryFs::with_root`] and [`FileSystem::at`]).
/// Structural mutations within one directory serialize on its child map;
/// concurrent reads are free.
pub struct MemoryDir {
    children: RwLock<HashMap<String, Node>>,
}

enum Node {
    Dir(Arc<MemoryDir>),
    File(SharedBuf),
}

impl MemoryDir {
    /// A fresh, empty root node.
    pub fn root() -> Arc<MemoryDir> {
        Arc::new(MemoryDir {
            children: RwLock::new(HashMap::new()),
        })
    }

    fn child_dir(&self, name: &str) -> Option<Arc<MemoryDir>> {
        match self.children.read().unwrap().get(name) {
            Some(Node::Dir(d)) => Some(d.clone()),
            _ => None,
        }
    }
}

type Tombstones = Arc<RwLock<HashSet<VfsPath>>>;

/// In-memory filesystem over a shared directory tree.
///
/// # Example
///
/// ```rust
/// use fskit::{FileSystem, MemoryFs, VfsPath};
///
/// # #[tokio::main]
/// # async fn main() -> fskit::Result<()> {
/// let fs = MemoryFs::new();
/// let path: VfsPath = "/a/b.txt".parse()?;
///
/// let mut file = fs.create_file(&path).await?;
/// file.write_all(b"hi").await?;
/// drop(file);
///
/// let mut read = fs.open_read(&path).await?.expect("file exists");
/// assert_eq!(read.read_to_string().await?, "hi");
/// # Ok(())
/// # }
/// ```
pub struct MemoryFs {
    root: Arc<MemoryDir>,
    tombstones: Tombstones,
    /// Path of `root` within the whole tree; tombstones are recorded under
    /// this prefix so every sub-filesystem sees the same set.
    prefix: VfsPath,
    read_only: bool,
}

impl MemoryFs {
    /// An empty writable filesystem with a fresh root.
    pub fn new() -> Self {
        Self::with_root(MemoryDir::root(), false)
    }

    /// A filesystem over an existing tree.
    ///
    /// Two instances over the same node observe each other's files, but each
    /// family of instances (this one plus everything its `at` produces)
    /// keeps its own tombstone set.
    pub fn with_root(root: Arc<MemoryDir>, read_only: bool) -> Self {
        MemoryFs {
            root,
            tombstones: Arc::new(RwLock::new(HashSet::new())),
            prefix: VfsPath::root(),
            read_only,
        }
    }

    /// The node this filesystem is rooted at.
    pub fn root_node(&self) -> Arc<MemoryDir> {
        self.root.clone()
    }

    fn check_writable(&self) -> Result<()> {
        if self.read_only() {
            Err(Error::ReadOnly)
        } else {
            Ok(())
        }
    }

    fn resolve_dir(&self, path: &VfsPath) -> Option<Arc<MemoryDir>> {
        let mut current = self.root.clone();
        for segment in path.segments() {
            current = current.child_dir(segment)?;
        }
        Some(current)
    }

    fn resolve_file(&self, path: &VfsPath) -> Option<SharedBuf> {
        let parent = self.resolve_dir(&path.parent()?)?;
        let name = path.file_name()?;
        let result = match parent.children.read().unwrap().get(name) {
            Some(Node::File(buf)) => Some(buf.clone()),
            _ => None,
        };
        result
    }

    /// Walk to `path`, creating missing intermediate directories. Fails on
    /// a file in the way.
    fn ensure_dir(&self, path: &VfsPath) -> Result<Arc<MemoryDir>> {
        let mut current = self.root.clone();
        for segment in path.segments() {
            let existing = current.child_dir(segment);
            current = match existing {
                Some(d) => d,
                None => {
                    let mut children = current.children.write().unwrap();
                    // Re-check under the write lock; another caller may have
                    // raced the same segment in.
                    let raced = match children.get(segment) {
                        Some(Node::Dir(d)) => Some(d.clone()),
                        Some(Node::File(_)) => {
                            return Err(std::io::Error::other("not a directory").into())
                        }
                        None => None,
                    };
                    match raced {
                        Some(d) => d,
                        None => {
                            let dir = Arc::new(MemoryDir {
                                children: RwLock::new(HashMap::new()),
                            });
                            children.insert(segment.to_string(), Node::Dir(dir.clone()));
                            dir
                        }
                    }
                }
            };
        }
        Ok(current)
    }

    fn tombstone_key(&self, path: &VfsPath) -> VfsPath {
        self.prefix.join(path)
    }

    fn has_tombstone(&self, path: &VfsPath) -> bool {
        self.tombstones
            .read()
            .unwrap()
            .contains(&self.tombstone_key(path))
    }

    fn install_file(&self, path: &VfsPath, buf: SharedBuf) -> Result<()> {
        let parent_path = path
            .parent()
            .ok_or(Error::NotSupported("the root is not a file"))?;
        let name = path
            .file_name()
            .ok_or(Error::NotSupported("the root is not a file"))?;
        let parent = self.ensure_dir(&parent_path)?;
        // The previous buffer, if any, is released here; outstanding mirrors
        // keep their snapshot alive.
        parent
            .children
            .write()
            .unwrap()
            .insert(name.to_string(), Node::File(buf));
        self.tombstones
            .write()
            .unwrap()
            .remove(&self.tombstone_key(path));
        Ok(())
    }

    fn rw_entry(&self, path: &VfsPath, buf: SharedBuf) -> FileEntry {
        FileEntry::ReadWrite(OpenFile::new(
            path.clone(),
            Box::new(MemoryStream::view(buf)),
        ))
    }

    fn collect_entries(
        &self,
        dir: &Arc<MemoryDir>,
        base: &VfsPath,
        mode: &ListMode,
        out: &mut Vec<FileEntry>,
    ) -> Result<()> {
        let mut names: Vec<String> = dir.children.read().unwrap().keys().cloned().collect();
        names.sort();

        for name in names {
            let node = {
                let children = dir.children.read().unwrap();
                match children.get(&name) {
                    Some(Node::Dir(d)) => Some(Node::Dir(d.clone())),
                    Some(Node::File(b)) => Some(Node::File(b.clone())),
                    None => None,
                }
            };
            let Some(node) = node else { continue };
            let path = base.append(&name)?;
            match node {
                Node::Dir(d) => {
                    if mode.filter().matches(&name) {
                        out.push(FileEntry::Directory(path.clone()));
                    }
                    if mode.is_recursive() {
                        self.collect_entries(&d, &path, mode, out)?;
                    }
                }
                Node::File(_) => {
                    if mode.filter().matches(&name) {
                        out.push(FileEntry::FileRef(path));
                    }
                }
            }
        }
        Ok(())
    }

    fn collect_file_paths(dir: &Arc<MemoryDir>, base: &VfsPath, out: &mut Vec<VfsPath>) {
        let children = dir.children.read().unwrap();
        for (name, node) in children.iter() {
            let Ok(path) = base.append(name) else { continue };
            match node {
                Node::Dir(d) => Self::collect_file_paths(d, &path, out),
                Node::File(_) => out.push(path),
            }
        }
    }
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileSystem for MemoryFs {
    fn read_only(&self) -> bool {
        self.read_only
    }

    async fn file_exists(&self, path: &VfsPath) -> Result<bool> {
        Ok(self.resolve_file(path).is_some())
    }

    async fn dir_exists(&self, path: &VfsPath) -> Result<bool> {
        Ok(self.resolve_dir(path).is_some())
    }

    async fn file_stat(&self, path: &VfsPath) -> Result<FileStatus> {
        if self.resolve_file(path).is_some() {
            Ok(FileStatus::Exists)
        } else if self.has_tombstone(path) {
            Ok(FileStatus::Deleted)
        } else {
            Ok(FileStatus::NotFound)
        }
    }

    async fn create_file(&self, path: &VfsPath) -> Result<FileEntry> {
        self.check_writable()?;
        let buf = SharedBuf::default();
        self.install_file(path, buf.clone())?;
        Ok(self.rw_entry(path, buf))
    }

    async fn create_dir(&self, path: &VfsPath) -> Result<FileEntry> {
        self.check_writable()?;
        self.ensure_dir(path)?;
        Ok(FileEntry::Directory(path.clone()))
    }

    async fn open_read(&self, path: &VfsPath) -> Result<Option<FileEntry>> {
        match self.resolve_file(path) {
            Some(buf) => {
                let stream: BoxStream = Box::new(MemoryStream::view(buf));
                Ok(Some(FileEntry::ReadOnly(OpenFile::new(
                    path.clone(),
                    stream.read_only(),
                ))))
            }
            None => Ok(None),
        }
    }

    async fn open_write(&self, path: &VfsPath) -> Result<Option<FileEntry>> {
        self.check_writable()?;
        let buf = match self.resolve_file(path) {
            Some(buf) => buf,
            None => {
                let buf = SharedBuf::default();
                self.install_file(path, buf.clone())?;
                buf
            }
        };
        let stream: BoxStream = Box::new(MemoryStream::view(buf));
        Ok(Some(FileEntry::WriteOnly(OpenFile::new(
            path.clone(),
            stream.write_only(),
        ))))
    }

    async fn open_read_write(&self, path: &VfsPath) -> Result<FileEntry> {
        match self.resolve_file(path) {
            Some(buf) => Ok(self.rw_entry(path, buf)),
            None => self.create_file(path).await,
        }
    }

    async fn delete_file(&self, path: &VfsPath) -> Result<bool> {
        self.check_writable()?;
        let removed = match (path.parent(), path.file_name()) {
            (Some(parent_path), Some(name)) => match self.resolve_dir(&parent_path) {
                Some(parent) => {
                    let mut children = parent.children.write().unwrap();
                    let is_file = matches!(children.get(name), Some(Node::File(_)));
                    if is_file {
                        children.remove(name);
                    }
                    is_file
                }
                None => false,
            },
            _ => false,
        };
        // Absent files are tombstoned too, so a later overlay still shadows
        // any lower layer.
        self.tombstones
            .write()
            .unwrap()
            .insert(self.tombstone_key(path));
        Ok(removed)
    }

    async fn delete_dir(&self, path: &VfsPath, recursive: bool) -> Result<bool> {
        self.check_writable()?;
        let (Some(parent_path), Some(name)) = (path.parent(), path.file_name()) else {
            return Err(Error::NotSupported("cannot delete the root directory"));
        };
        let Some(parent) = self.resolve_dir(&parent_path) else {
            return Ok(false);
        };

        let detached = {
            let mut children = parent.children.write().unwrap();
            let dir = match children.get(name) {
                Some(Node::Dir(d)) => Some(d.clone()),
                _ => None,
            };
            match dir {
                Some(d) => {
                    if !recursive && !d.children.read().unwrap().is_empty() {
                        return Err(Error::directory_not_empty());
                    }
                    children.remove(name);
                    Some(d)
                }
                None => None,
            }
        };

        match detached {
            Some(dir) => {
                let mut files = Vec::new();
                Self::collect_file_paths(&dir, path, &mut files);
                let mut tombstones = self.tombstones.write().unwrap();
                for file in files {
                    tombstones.insert(self.prefix.join(&file));
                }
                Ok(true)
            }
            None => Ok(false),
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

        let _ = src.seek(0).await;
        let bytes = stream::read_to_end(&mut *src).await?;
        let buf = SharedBuf::from_vec(bytes);
        self.install_file(&path, buf.clone())?;
        Ok(self.rw_entry(&path, buf))
    }

    async fn entries(&self, path: &VfsPath, mode: ListMode) -> Result<Vec<FileEntry>> {
        let dir = self
            .resolve_dir(path)
            .ok_or_else(|| Error::not_found(path.as_str()))?;
        let mut out = Vec::new();
        self.collect_entries(&dir, path, &mode, &mut out)?;
        Ok(out)
    }

    async fn at(&self, path: &VfsPath, mode: SubFsMode) -> Result<Arc<dyn FileSystem>> {
        let read_only = sub_fs_read_only(self.read_only(), mode)?;
        let root = match self.resolve_dir(path) {
            Some(dir) => dir,
            None if self.read_only() => return Err(Error::not_found(path.as_str())),
            None => self.ensure_dir(path)?,
        };
        Ok(Arc::new(MemoryFs {
            root,
            tombstones: self.tombstones.clone(),
            prefix: self.prefix.join(path),
            read_only,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> VfsPath {
        VfsPath::parse(s).unwrap()
    }

    #[tokio::test]
    async fn write_then_read() {
        let fs = MemoryFs::new();
        let mut f = fs.create_file(&p("/a/b.txt")).await.unwrap();
        f.write_all(&[0x68, 0x69]).await.unwrap();
        drop(f);

        let mut r = fs.open_read(&p("/a/b.txt")).await.unwrap().unwrap();
        assert_eq!(r.read_to_string().await.unwrap(), "hi");
    }

    #[tokio::test]
    async fn create_file_makes_parents() {
        let fs = MemoryFs::new();
        fs.create_file(&p("/x/y/z.txt")).await.unwrap();
        assert!(fs.dir_exists(&p("/x/y")).await.unwrap());
        assert!(fs.file_exists(&p("/x/y/z.txt")).await.unwrap());
    }

    #[tokio::test]
    async fn create_replaces_existing_contents() {
        let fs = MemoryFs::new();
        let mut f = fs.create_file(&p("/f")).await.unwrap();
        f.write_all(b"old").await.unwrap();
        drop(f);

        fs.create_file(&p("/f")).await.unwrap();
        let mut r = fs.open_read(&p("/f")).await.unwrap().unwrap();
        assert_eq!(r.read_to_end().await.unwrap(), b"");
    }

    #[tokio::test]
    async fn readers_do_not_interfere() {
        let fs = MemoryFs::new();
        let mut f = fs.create_file(&p("/shared")).await.unwrap();
        f.write_all(b"abcdef").await.unwrap();
        drop(f);

        let mut a = fs.open_read(&p("/shared")).await.unwrap().unwrap();
        let mut b = fs.open_read(&p("/shared")).await.unwrap().unwrap();

        let mut buf = [0u8; 3];
        a.stream().unwrap().read(&mut buf).await.unwrap();
        assert_eq!(&buf, b"abc");
        assert_eq!(b.read_to_end().await.unwrap(), b"abcdef");
    }

    #[tokio::test]
    async fn delete_tombstones_and_reports_status() {
        let fs = MemoryFs::new();
        let mut f = fs.create_file(&p("/a/b.txt")).await.unwrap();
        f.write_all(b"hi").await.unwrap();
        drop(f);

        assert!(fs.delete_file(&p("/a/b.txt")).await.unwrap());
        assert!(!fs.file_exists(&p("/a/b.txt")).await.unwrap());
        assert_eq!(
            fs.file_stat(&p("/a/b.txt")).await.unwrap(),
            FileStatus::Deleted
        );

        // Deleting a path that never existed still tombstones, returns false.
        assert!(!fs.delete_file(&p("/ghost")).await.unwrap());
        assert_eq!(fs.file_stat(&p("/ghost")).await.unwrap(), FileStatus::Deleted);
    }

    #[tokio::test]
    async fn create_clears_tombstone() {
        let fs = MemoryFs::new();
        fs.create_file(&p("/f")).await.unwrap();
        fs.delete_file(&p("/f")).await.unwrap();
        fs.create_file(&p("/f")).await.unwrap();
        assert_eq!(fs.file_stat(&p("/f")).await.unwrap(), FileStatus::Exists);
    }

    #[tokio::test]
    async fn delete_dir_tombstones_every_file() {
        let fs = MemoryFs::new();
        fs.create_file(&p("/d/one.txt")).await.unwrap();
        fs.create_file(&p("/d/sub/two.txt")).await.unwrap();

        assert!(fs.delete_dir(&p("/d"), true).await.unwrap());
        assert!(!fs.dir_exists(&p("/d")).await.unwrap());
        assert_eq!(
            fs.file_stat(&p("/d/one.txt")).await.unwrap(),
            FileStatus::Deleted
        );
        assert_eq!(
            fs.file_stat(&p("/d/sub/two.txt")).await.unwrap(),
            FileStatus::Deleted
        );
    }

    #[tokio::test]
    async fn delete_dir_non_recursive_refuses_non_empty() {
        let fs = MemoryFs::new();
        fs.create_file(&p("/d/f")).await.unwrap();
        assert!(fs.delete_dir(&p("/d"), false).await.is_err());

        fs.create_dir(&p("/empty")).await.unwrap();
        assert!(fs.delete_dir(&p("/empty"), false).await.unwrap());
        assert!(!fs.delete_dir(&p("/missing"), false).await.unwrap());
    }

    #[tokio::test]
    async fn open_write_creates_missing_file() {
        let fs = MemoryFs::new();
        let mut w = fs.open_write(&p("/new")).await.unwrap().unwrap();
        assert!(w.read_to_end().await.is_err());
        w.write_all(b"wo").await.unwrap();
        drop(w);

        let mut r = fs.open_read(&p("/new")).await.unwrap().unwrap();
        assert_eq!(r.read_to_end().await.unwrap(), b"wo");
    }

    #[tokio::test]
    async fn open_read_is_read_only() {
        let fs = MemoryFs::new();
        fs.create_file(&p("/f")).await.unwrap();
        let mut r = fs.open_read(&p("/f")).await.unwrap().unwrap();
        assert!(r.write_all(b"x").await.is_err());
    }

    #[tokio::test]
    async fn shallow_and_recursive_listing() {
        let fs = MemoryFs::new();
        fs.create_file(&p("/d/a.txt")).await.unwrap();
        fs.create_file(&p("/d/b.json")).await.unwrap();
        fs.create_file(&p("/d/sub/c.txt")).await.unwrap();

        let shallow = fs.entries(&p("/d"), ListMode::shallow()).await.unwrap();
        let names: Vec<_> = shallow.iter().map(|e| e.path().as_str()).collect();
        assert_eq!(names, vec!["/d/a.txt", "/d/b.json", "/d/sub"]);

        let filtered = fs
            .entries(
                &p("/d"),
                ListMode::Shallow(crate::fs::NameFilter::pattern("*.txt").unwrap()),
            )
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].path().as_str(), "/d/a.txt");

        let recursive = fs.entries(&p("/d"), ListMode::recursive()).await.unwrap();
        let names: Vec<_> = recursive.iter().map(|e| e.path().as_str()).collect();
        assert_eq!(
            names,
            vec!["/d/a.txt", "/d/b.json", "/d/sub", "/d/sub/c.txt"]
        );

        assert!(fs.entries(&p("/missing"), ListMode::shallow()).await.is_err());
    }

    #[tokio::test]
    async fn integrate_copies_bytes() {
        let src_fs = MemoryFs::new();
        let mut f = src_fs.create_file(&p("/doc")).await.unwrap();
        f.write_all(b"payload").await.unwrap();
        drop(f);

        let dst_fs = MemoryFs::new();
        let readable = src_fs.open_read(&p("/doc")).await.unwrap().unwrap();
        let mut imported = dst_fs.integrate(readable).await.unwrap();
        assert_eq!(imported.read_to_end().await.unwrap(), b"payload");
        assert!(dst_fs.file_exists(&p("/doc")).await.unwrap());
    }

    #[tokio::test]
    async fn sub_fs_shares_tree_and_tombstones() {
        let fs = MemoryFs::new();
        fs.create_file(&p("/a/inner.txt")).await.unwrap();

        let sub = fs.at(&p("/a"), SubFsMode::Inherit).await.unwrap();
        assert!(sub.file_exists(&p("/inner.txt")).await.unwrap());

        sub.delete_file(&p("/inner.txt")).await.unwrap();
        assert_eq!(
            fs.file_stat(&p("/a/inner.txt")).await.unwrap(),
            FileStatus::Deleted
        );

        // Writes through the sub-FS land in the shared tree.
        sub.create_file(&p("/fresh")).await.unwrap();
        assert!(fs.file_exists(&p("/a/fresh")).await.unwrap());
    }

    #[tokio::test]
    async fn read_only_blocks_mutation() {
        let fs = MemoryFs::new();
        fs.create_file(&p("/f")).await.unwrap();

        let ro = fs.at(&VfsPath::root(), SubFsMode::ReadOnly).await.unwrap();
        assert!(matches!(
            ro.create_file(&p("/g")).await,
            Err(Error::ReadOnly)
        ));
        assert!(matches!(ro.delete_file(&p("/f")).await, Err(Error::ReadOnly)));
        assert!(ro.open_read(&p("/f")).await.unwrap().is_some());

        // A read-only sub-FS cannot be upgraded back.
        assert!(matches!(
            ro.at(&VfsPath::root(), SubFsMode::ReadWrite).await.err(),
            Some(Error::ReadOnly)
        ));
    }
}
