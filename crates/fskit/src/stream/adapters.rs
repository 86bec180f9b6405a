//! Capability-narrowing stream adapters.

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::stream::{BoxStream, Stream};

/// Restricts a stream to one direction.
///
/// The disallowed direction fails with [`Error::NotSupported`]; seeking and
/// flushing pass through untouched. Built via
/// [`StreamExt::read_only`](crate::stream::StreamExt::read_only) and
/// [`StreamExt::write_only`](crate::stream::StreamExt::write_only).
pub struct Restricted {
    inner: BoxStream,
    readable: bool,
    writable: bool,
}

impl Restricted {
    /// Wrap `inner`, rejecting writes.
    pub fn read_only(inner: BoxStream) -> Self {
        Restricted {
            inner,
            readable: true,
            writable: false,
        }
    }

    /// Wrap `inner`, rejecting reads.
    pub fn write_only(inner: BoxStream) -> Self {
        Restricted {
            inner,
            readable: false,
            writable: true,
        }
    }
}

#[async_trait]
impl Stream for Restricted {
    fn readable(&self) -> bool {
        self.readable && self.inner.readable()
    }

    fn writable(&self) -> bool {
        self.writable && self.inner.writable()
    }

    fn owned(&self) -> bool {
        self.inner.owned()
    }

    fn len(&self) -> u64 {
        self.inner.len()
    }

    fn position(&self) -> u64 {
        self.inner.position()
    }

    async fn seek(&mut self, pos: u64) -> Result<()> {
        self.inner.seek(pos).await
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if !self.readable {
            return Err(Error::NotSupported("read on a write-only stream"));
        }
        self.inner.read(buf).await
    }

    async fn write(&mut self, buf: &[u8]) -> Result<()> {
        if !self.writable {
            return Err(Error::NotSupported("write on a read-only stream"));
        }
        self.inner.write(buf).await
    }

    async fn flush(&mut self) -> Result<()> {
        self.inner.flush().await
    }

    async fn set_len(&mut self, len: u64) -> Result<()> {
        if !self.writable {
            return Err(Error::NotSupported("set_len on a read-only stream"));
        }
        self.inner.set_len(len).await
    }
}

/// Enforces a cumulative cap on bytes written.
///
/// A write that would cross the cap applies the bytes that still fit, then
/// fails with [`Error::WriteLimitExceeded`]. Truncating to zero resets the
/// counter, so a capped handle can be rewritten from scratch.
pub struct WriteLimited {
    inner: BoxStream,
    limit: u64,
    written: u64,
}

impl WriteLimited {
    /// Wrap `inner` with a cap of `limit` bytes.
    pub fn new(inner: BoxStream, limit: u64) -> Self {
        WriteLimited {
            inner,
            limit,
            written: 0,
        }
    }

    /// Bytes written so far against the cap.
    pub fn written(&self) -> u64 {
        self.written
    }
}

#[async_trait]
impl Stream for WriteLimited {
    fn readable(&self) -> bool {
        self.inner.readable()
    }

    fn writable(&self) -> bool {
        self.inner.writable()
    }

    fn owned(&self) -> bool {
        self.inner.owned()
    }

    fn len(&self) -> u64 {
        self.inner.len()
    }

    fn position(&self) -> u64 {
        self.inner.position()
    }

    async fn seek(&mut self, pos: u64) -> Result<()> {
        self.inner.seek(pos).await
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.inner.read(buf).await
    }

    async fn write(&mut self, buf: &[u8]) -> Result<()> {
        let remaining = self.limit.saturating_sub(self.written);
        let fits = (buf.len() as u64).min(remaining) as usize;
        if fits > 0 {
            self.inner.write(&buf[..fits]).await?;
            self.written += fits as u64;
        }
        if (buf.len() as u64) > remaining {
            return Err(Error::WriteLimitExceeded { limit: self.limit });
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        self.inner.flush().await
    }

    async fn set_len(&mut self, len: u64) -> Result<()> {
        self.inner.set_len(len).await?;
        if len == 0 {
            self.written = 0;
        }
        Ok(())
    }
}
