//! Capability-typed byte streams.
//!
//! Every opened file hands out a [`Stream`]: a cursor over a byte sequence
//! with three capability flags (`readable`, `writable`, `owned`). Backends
//! provide concrete implementations ([`MemoryStream`], a host-file stream,
//! an object-store upload buffer); callers narrow or extend capabilities
//! with the adapters on [`StreamExt`].
//!
//! Adapters compose, so a capped upload into a read-only base is
//! `base.copy_on_write(factory).write_limited(n)`.
//!
//! # Cancellation
//!
//! Operations are plain futures. Dropping an in-flight future abandons the
//! work at its next await point; a partially applied write leaves the cursor
//! wherever the backend got to.

mod adapters;
mod cow;
mod file;
mod memory;

pub use adapters::{Restricted, WriteLimited};
pub use cow::{CopyOnWrite, StreamFactory};
pub use file::FileStream;
pub use memory::MemoryStream;

pub(crate) use memory::SharedBuf;

use async_trait::async_trait;

use crate::error::Result;

/// A boxed stream handle.
pub type BoxStream = Box<dyn Stream>;

/// An asynchronous byte stream with capability flags.
///
/// Implementations are not required to be safe for concurrent use by
/// multiple callers; a handle is driven through `&mut self`. The filesystem
/// that produced the handle stays usable concurrently.
#[async_trait]
pub trait Stream: Send {
    /// True if [`Stream::read`] is permitted.
    fn readable(&self) -> bool;

    /// True if [`Stream::write`] and [`Stream::set_len`] are permitted.
    fn writable(&self) -> bool;

    /// True if dropping this handle releases an underlying resource.
    ///
    /// Non-owning views (see [`MemoryStream::mirror`]) report `false`; their
    /// drop only discards the cursor.
    fn owned(&self) -> bool;

    /// Total length of the byte sequence.
    fn len(&self) -> u64;

    /// True if the byte sequence is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current cursor position.
    fn position(&self) -> u64;

    /// Move the cursor.
    ///
    /// # Errors
    ///
    /// [`crate::Error::NotSupported`] on forward-only streams.
    async fn seek(&mut self, pos: u64) -> Result<()>;

    /// Read up to `buf.len()` bytes at the cursor. Returns the number of
    /// bytes read; `0` at end of stream.
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write all of `buf` at the cursor.
    async fn write(&mut self, buf: &[u8]) -> Result<()>;

    /// Push buffered bytes to the underlying storage.
    ///
    /// For most streams this is a no-op; the object-store upload stream
    /// performs its actual upload here.
    async fn flush(&mut self) -> Result<()>;

    /// Truncate or extend the byte sequence. Extension zero-fills.
    async fn set_len(&mut self, len: u64) -> Result<()>;
}

/// Read every remaining byte from the cursor to the end.
pub async fn read_to_end(stream: &mut dyn Stream) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        out.extend_from_slice(&chunk[..n]);
    }
    Ok(out)
}

/// Copy every remaining byte of `src` into `dst` at its cursor.
///
/// Returns the number of bytes copied. Neither stream is flushed.
pub async fn copy(src: &mut dyn Stream, dst: &mut dyn Stream) -> Result<u64> {
    let mut total = 0u64;
    let mut chunk = [0u8; 8192];
    loop {
        let n = src.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        dst.write(&chunk[..n]).await?;
        total += n as u64;
    }
    Ok(total)
}

/// Drain a stream into a fresh seekable [`MemoryStream`] positioned at zero.
///
/// This is how callers get random access over an otherwise forward-only
/// backend stream.
pub async fn into_memory(stream: &mut dyn Stream) -> Result<MemoryStream> {
    let bytes = read_to_end(stream).await?;
    Ok(MemoryStream::from_vec(bytes))
}

/// Capability adapters for boxed streams.
pub trait StreamExt {
    /// Wrap the stream so writes fail with `NotSupported`.
    fn read_only(self) -> BoxStream;

    /// Wrap the stream so reads fail with `NotSupported`.
    fn write_only(self) -> BoxStream;

    /// Cap the cumulative number of bytes written. `set_len(0)` resets the
    /// counter so a truncate-and-rewrite gets a fresh budget.
    fn write_limited(self, limit: u64) -> BoxStream;

    /// Lazy-clone wrapper: reads pass through until the first mutation, at
    /// which point `factory` builds a private writable stream, the origin's
    /// contents are copied into it, and all later operations target the
    /// copy. The origin is never written.
    fn copy_on_write<F>(self, factory: F) -> BoxStream
    where
        F: FnMut() -> Result<BoxStream> + Send + 'static;
}

impl StreamExt for BoxStream {
    fn read_only(self) -> BoxStream {
        Box::new(Restricted::read_only(self))
    }

    fn write_only(self) -> BoxStream {
        Box::new(Restricted::write_only(self))
    }

    fn write_limited(self, limit: u64) -> BoxStream {
        Box::new(WriteLimited::new(self, limit))
    }

    fn copy_on_write<F>(self, factory: F) -> BoxStream
    where
        F: FnMut() -> Result<BoxStream> + Send + 'static,
    {
        Box::new(CopyOnWrite::new(self, Box::new(factory)))
    }
}
