//! Tagged file handles.

use crate::error::{Error, Result};
use crate::path::VfsPath;
use crate::stream::{self, BoxStream, StreamExt};

/// An opened file: its path plus the stream it owns.
pub struct OpenFile {
    path: VfsPath,
    stream: BoxStream,
}

impl OpenFile {
    /// Pair a path with the stream it was opened as. Backend implementations
    /// use this to build the opened [`FileEntry`] variants.
    pub fn new(path: VfsPath, stream: BoxStream) -> Self {
        OpenFile { path, stream }
    }

    /// Path of the opened file.
    pub fn path(&self) -> &VfsPath {
        &self.path
    }

    /// The owned stream.
    pub fn stream(&mut self) -> &mut BoxStream {
        &mut self.stream
    }

    /// Give up the handle, keeping the stream.
    pub fn into_stream(self) -> BoxStream {
        self.stream
    }
}

/// A directory entry or file handle produced by a filesystem.
///
/// The three opened variants own their stream for the lifetime of the
/// handle, and the stream's capability flags match the variant: a
/// [`FileEntry::ReadOnly`] stream rejects writes, a [`FileEntry::WriteOnly`]
/// stream rejects reads. Listings only ever produce [`FileEntry::Directory`]
/// and [`FileEntry::FileRef`]; no listing opens a stream behind your back.
pub enum FileEntry {
    /// A directory.
    Directory(VfsPath),
    /// A file that exists but is not open.
    FileRef(VfsPath),
    /// A file opened for reading.
    ReadOnly(OpenFile),
    /// A file opened for writing.
    WriteOnly(OpenFile),
    /// A file opened for reading and writing.
    ReadWrite(OpenFile),
}

impl FileEntry {
    /// The entry's path.
    pub fn path(&self) -> &VfsPath {
        match self {
            FileEntry::Directory(p) | FileEntry::FileRef(p) => p,
            FileEntry::ReadOnly(f) | FileEntry::WriteOnly(f) | FileEntry::ReadWrite(f) => f.path(),
        }
    }

    /// The same entry under a different path.
    ///
    /// Open variants keep their stream. Routing layers use this when they
    /// translate a path before delegating to the filesystem that owns it.
    pub fn with_path(self, path: VfsPath) -> FileEntry {
        match self {
            FileEntry::Directory(_) => FileEntry::Directory(path),
            FileEntry::FileRef(_) => FileEntry::FileRef(path),
            FileEntry::ReadOnly(f) => FileEntry::ReadOnly(OpenFile::new(path, f.into_stream())),
            FileEntry::WriteOnly(f) => FileEntry::WriteOnly(OpenFile::new(path, f.into_stream())),
            FileEntry::ReadWrite(f) => FileEntry::ReadWrite(OpenFile::new(path, f.into_stream())),
        }
    }

    /// True for [`FileEntry::Directory`].
    pub fn is_dir(&self) -> bool {
        matches!(self, FileEntry::Directory(_))
    }

    /// True for any file variant, open or not.
    pub fn is_file(&self) -> bool {
        !self.is_dir()
    }

    /// True for the three opened variants.
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            FileEntry::ReadOnly(_) | FileEntry::WriteOnly(_) | FileEntry::ReadWrite(_)
        )
    }

    /// The owned stream, if this entry is open.
    pub fn stream(&mut self) -> Option<&mut BoxStream> {
        match self {
            FileEntry::ReadOnly(f) | FileEntry::WriteOnly(f) | FileEntry::ReadWrite(f) => {
                Some(f.stream())
            }
            _ => None,
        }
    }

    /// Consume the entry, keeping the stream of an open variant.
    pub fn into_stream(self) -> Option<BoxStream> {
        match self {
            FileEntry::ReadOnly(f) | FileEntry::WriteOnly(f) | FileEntry::ReadWrite(f) => {
                Some(f.into_stream())
            }
            _ => None,
        }
    }

    /// Narrow an open handle to write-only.
    ///
    /// # Errors
    ///
    /// [`Error::NotSupported`] if the entry is not open for writing.
    pub fn into_write_only(self) -> Result<FileEntry> {
        match self {
            FileEntry::ReadWrite(f) | FileEntry::WriteOnly(f) => {
                let OpenFile { path, stream } = f;
                Ok(FileEntry::WriteOnly(OpenFile::new(
                    path,
                    stream.write_only(),
                )))
            }
            _ => Err(Error::NotSupported("entry is not open for writing")),
        }
    }

    /// Narrow an open handle to read-only.
    ///
    /// # Errors
    ///
    /// [`Error::NotSupported`] if the entry is not open for reading.
    pub fn into_read_only(self) -> Result<FileEntry> {
        match self {
            FileEntry::ReadWrite(f) | FileEntry::ReadOnly(f) => {
                let OpenFile { path, stream } = f;
                Ok(FileEntry::ReadOnly(OpenFile::new(path, stream.read_only())))
            }
            _ => Err(Error::NotSupported("entry is not open for reading")),
        }
    }

    /// Read the rest of the stream from its cursor.
    ///
    /// # Errors
    ///
    /// [`Error::NotSupported`] if the entry is not open for reading.
    pub async fn read_to_end(&mut self) -> Result<Vec<u8>> {
        match self.stream() {
            Some(s) => stream::read_to_end(&mut **s).await,
            None => Err(Error::NotSupported("entry is not open")),
        }
    }

    /// Read the rest of the stream as UTF-8 text.
    pub async fn read_to_string(&mut self) -> Result<String> {
        let bytes = self.read_to_end().await?;
        String::from_utf8(bytes)
            .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
    }

    /// Write a byte slice at the cursor and flush.
    pub async fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        match self.stream() {
            Some(s) => {
                s.write(bytes).await?;
                s.flush().await
            }
            None => Err(Error::NotSupported("entry is not open")),
        }
    }

    /// Flush the owned stream, if any.
    pub async fn flush(&mut self) -> Result<()> {
        match self.stream() {
            Some(s) => s.flush().await,
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for FileEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (kind, path) = match self {
            FileEntry::Directory(p) => ("Directory", p),
            FileEntry::FileRef(p) => ("FileRef", p),
            FileEntry::ReadOnly(o) => ("ReadOnly", o.path()),
            FileEntry::WriteOnly(o) => ("WriteOnly", o.path()),
            FileEntry::ReadWrite(o) => ("ReadWrite", o.path()),
        };
        write!(f, "{}({})", kind, path)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::stream::MemoryStream;

    fn open_rw(path: &str, bytes: &[u8]) -> FileEntry {
        FileEntry::ReadWrite(OpenFile::new(
            VfsPath::parse(path).unwrap(),
            Box::new(MemoryStream::from_vec(bytes.to_vec())),
        ))
    }

    #[test]
    fn variant_predicates() {
        let dir = FileEntry::Directory(VfsPath::parse("/d").unwrap());
        assert!(dir.is_dir());
        assert!(!dir.is_file());
        assert!(!dir.is_open());

        let fref = FileEntry::FileRef(VfsPath::parse("/f").unwrap());
        assert!(fref.is_file());
        assert!(!fref.is_open());

        let open = open_rw("/f", b"");
        assert!(open.is_file());
        assert!(open.is_open());
    }

    #[tokio::test]
    async fn read_and_write_helpers() {
        let mut entry = open_rw("/notes.txt", b"");
        entry.write_all(b"hi").await.unwrap();
        entry.stream().unwrap().seek(0).await.unwrap();
        assert_eq!(entry.read_to_string().await.unwrap(), "hi");
    }

    #[tokio::test]
    async fn narrowing_matches_capabilities() {
        let entry = open_rw("/f", b"data");
        let mut wo = entry.into_write_only().unwrap();
        assert!(wo.read_to_end().await.is_err());
        wo.write_all(b"x").await.unwrap();

        let entry = open_rw("/f", b"data");
        let mut ro = entry.into_read_only().unwrap();
        assert!(ro.write_all(b"x").await.is_err());
        assert_eq!(ro.read_to_end().await.unwrap(), b"data");

        let fref = FileEntry::FileRef(VfsPath::parse("/f").unwrap());
        assert!(fref.into_write_only().is_err());
    }

    #[tokio::test]
    async fn with_path_keeps_variant_and_stream() {
        let mut moved =
            open_rw("/tmp/foo.txt", b"data").with_path(VfsPath::parse("/foo.txt").unwrap());
        assert_eq!(moved.path().as_str(), "/foo.txt");
        assert!(moved.is_open());
        assert_eq!(moved.read_to_end().await.unwrap(), b"data");

        let dir = FileEntry::Directory(VfsPath::parse("/a").unwrap())
            .with_path(VfsPath::parse("/b").unwrap());
        assert!(dir.is_dir());
        assert_eq!(dir.path().as_str(), "/b");
    }

    #[test]
    fn debug_shows_kind_and_path() {
        let entry = FileEntry::FileRef(VfsPath::parse("/a/b").unwrap());
        assert_eq!(format!("{:?}", entry), "FileRef(/a/b)");
    }
}
