//! Host file stream.

use std::io::SeekFrom;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use crate::error::{Error, Result};
use crate::stream::Stream;

/// A stream over an open host file.
///
/// Owns the file handle: dropping the stream closes it. The length and
/// cursor are tracked locally so the synchronous accessors stay cheap.
pub struct FileStream {
    file: File,
    len: u64,
    pos: u64,
    readable: bool,
    writable: bool,
}

impl FileStream {
    /// Wrap an already-open file. `len` is the file's current size.
    pub fn new(file: File, len: u64, readable: bool, writable: bool) -> Self {
        FileStream {
            file,
            len,
            pos: 0,
            readable,
            writable,
        }
    }
}

#[async_trait]
impl Stream for FileStream {
    fn readable(&self) -> bool {
        self.readable
    }

    fn writable(&self) -> bool {
        self.writable
    }

    fn owned(&self) -> bool {
        true
    }

    fn len(&self) -> u64 {
        self.len
    }

    fn position(&self) -> u64 {
        self.pos
    }

    async fn seek(&mut self, pos: u64) -> Result<()> {
        self.file.seek(SeekFrom::Start(pos)).await?;
        self.pos = pos;
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if !self.readable {
            return Err(Error::NotSupported("read on a write-only stream"));
        }
        let n = self.file.read(buf).await?;
        self.pos += n as u64;
        Ok(n)
    }

    async fn write(&mut self, buf: &[u8]) -> Result<()> {
        if !self.writable {
            return Err(Error::NotSupported("write on a read-only stream"));
        }
        self.file.write_all(buf).await?;
        self.pos += buf.len() as u64;
        self.len = self.len.max(self.pos);
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        self.file.flush().await?;
        Ok(())
    }

    async fn set_len(&mut self, len: u64) -> Result<()> {
        if !self.writable {
            return Err(Error::NotSupported("set_len on a read-only stream"));
        }
        self.file.set_len(len).await?;
        self.len = len;
        Ok(())
    }
}
