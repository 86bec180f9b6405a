//! Seekable in-memory streams with shared buffers.

// RwLock.read()/write().unwrap() only panics on lock poisoning (prior panic
// while holding lock). This is intentional - corrupted state should not propagate.
#![allow(clippy::unwrap_used)]

use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::error::Result;
use crate::stream::Stream;

/// Byte buffer shared between a stream and its mirrors.
#[derive(Clone, Default)]
pub(crate) struct SharedBuf(Arc<RwLock<Vec<u8>>>);

impl SharedBuf {
    pub(crate) fn from_vec(bytes: Vec<u8>) -> Self {
        SharedBuf(Arc::new(RwLock::new(bytes)))
    }

    pub(crate) fn len(&self) -> u64 {
        self.0.read().unwrap().len() as u64
    }
}

/// A seekable in-memory byte stream.
///
/// The buffer lives behind an `Arc`, so [`MemoryStream::mirror`] can hand
/// out additional cursors over the same bytes. A mirror is non-owning:
/// dropping it discards only the cursor, never the buffer. This is what lets
/// the memory backend serve many concurrent readers of one file without
/// their positions interfering.
///
/// # Example
///
/// ```rust
/// use fskit::stream::{MemoryStream, Stream};
///
/// # #[tokio::main]
/// # async fn main() -> fskit::Result<()> {
/// let mut s = MemoryStream::new();
/// s.write(b"hi").await?;
///
/// let mut view = s.mirror();
/// let mut buf = [0u8; 2];
/// assert_eq!(view.read(&mut buf).await?, 2);
/// assert_eq!(&buf, b"hi");
/// // The original cursor is unaffected by the mirror's reads.
/// assert_eq!(s.position(), 2);
/// # Ok(())
/// # }
/// ```
pub struct MemoryStream {
    buf: SharedBuf,
    pos: u64,
    owned: bool,
}

impl MemoryStream {
    /// Create an empty stream positioned at zero.
    pub fn new() -> Self {
        MemoryStream {
            buf: SharedBuf::default(),
            pos: 0,
            owned: true,
        }
    }

    /// Create a stream over existing bytes, positioned at zero.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        MemoryStream {
            buf: SharedBuf::from_vec(bytes),
            pos: 0,
            owned: true,
        }
    }

    /// A non-owning cursor over a buffer held elsewhere (the memory tree).
    pub(crate) fn view(buf: SharedBuf) -> Self {
        MemoryStream {
            buf,
            pos: 0,
            owned: false,
        }
    }

    /// A non-owning view over the same buffer, positioned at zero.
    pub fn mirror(&self) -> MemoryStream {
        MemoryStream {
            buf: self.buf.clone(),
            pos: 0,
            owned: false,
        }
    }
}

impl Default for MemoryStream {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stream for MemoryStream {
    fn readable(&self) -> bool {
        true
    }

    fn writable(&self) -> bool {
        true
    }

    fn owned(&self) -> bool {
        self.owned
    }

    fn len(&self) -> u64 {
        self.buf.len()
    }

    fn position(&self) -> u64 {
        self.pos
    }

    async fn seek(&mut self, pos: u64) -> Result<()> {
        self.pos = pos;
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let data = self.buf.0.read().unwrap();
        let start = (self.pos as usize).min(data.len());
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        drop(data);
        self.pos += n as u64;
        Ok(n)
    }

    async fn write(&mut self, buf: &[u8]) -> Result<()> {
        let mut data = self.buf.0.write().unwrap();
        let start = self.pos as usize;
        if start > data.len() {
            // Writing past the end zero-fills the gap, like a host file.
            data.resize(start, 0);
        }
        let overlap = buf.len().min(data.len().saturating_sub(start));
        data[start..start + overlap].copy_from_slice(&buf[..overlap]);
        data.extend_from_slice(&buf[overlap..]);
        drop(data);
        self.pos += buf.len() as u64;
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    async fn set_len(&mut self, len: u64) -> Result<()> {
        self.buf.0.write().unwrap().resize(len as usize, 0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::read_to_end;

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let mut s = MemoryStream::new();
        s.write(b"hello").await.unwrap();
        assert_eq!(s.len(), 5);
        s.seek(0).await.unwrap();
        assert_eq!(read_to_end(&mut s).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn overwrite_in_the_middle() {
        let mut s = MemoryStream::from_vec(b"abcdef".to_vec());
        s.seek(2).await.unwrap();
        s.write(b"XY").await.unwrap();
        s.seek(0).await.unwrap();
        assert_eq!(read_to_end(&mut s).await.unwrap(), b"abXYef");
    }

    #[tokio::test]
    async fn write_past_end_zero_fills() {
        let mut s = MemoryStream::new();
        s.seek(3).await.unwrap();
        s.write(b"x").await.unwrap();
        s.seek(0).await.unwrap();
        assert_eq!(read_to_end(&mut s).await.unwrap(), &[0, 0, 0, b'x']);
    }

    #[tokio::test]
    async fn mirrors_share_bytes_but_not_cursors() {
        let mut s = MemoryStream::new();
        s.write(b"shared").await.unwrap();

        let mut a = s.mirror();
        let mut b = s.mirror();
        assert!(!a.owned());

        let mut buf = [0u8; 3];
        a.read(&mut buf).await.unwrap();
        assert_eq!(&buf, b"sha");
        // b's cursor is untouched by a's progress.
        assert_eq!(b.position(), 0);
        assert_eq!(read_to_end(&mut b).await.unwrap(), b"shared");

        // Writes through one handle are visible through the other.
        s.seek(0).await.unwrap();
        s.write(b"SHARED").await.unwrap();
        b.seek(0).await.unwrap();
        assert_eq!(read_to_end(&mut b).await.unwrap(), b"SHARED");
    }

    #[tokio::test]
    async fn set_len_truncates_and_extends() {
        let mut s = MemoryStream::from_vec(b"abcdef".to_vec());
        s.set_len(3).await.unwrap();
        assert_eq!(s.len(), 3);
        s.set_len(5).await.unwrap();
        s.seek(0).await.unwrap();
        assert_eq!(read_to_end(&mut s).await.unwrap(), &[b'a', b'b', b'c', 0, 0]);
    }
}
