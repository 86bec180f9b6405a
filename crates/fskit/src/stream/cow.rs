//! Copy-on-write stream wrapper.

use async_trait::async_trait;

use crate::error::Result;
use crate::stream::{copy, BoxStream, Stream};

/// Builds the private target stream for a [`CopyOnWrite`] on first mutation.
pub type StreamFactory = Box<dyn FnMut() -> Result<BoxStream> + Send>;

/// A lazy clone of another stream.
///
/// Reads pass through to the origin until the first `write` or `set_len`.
/// At that point the factory runs exactly once, the origin's contents are
/// copied into the new target, the cursor is carried over, and all later
/// operations go to the target. The origin itself is never mutated.
///
/// The memory backend's `integrate` and the overlay's copy-up both lean on
/// this: a reader that never writes costs nothing beyond the origin handle.
pub struct CopyOnWrite {
    origin: BoxStream,
    factory: StreamFactory,
    target: Option<BoxStream>,
}

impl CopyOnWrite {
    /// Wrap `origin` with a deferred clone built by `factory`.
    pub fn new(origin: BoxStream, factory: StreamFactory) -> Self {
        CopyOnWrite {
            origin,
            factory,
            target: None,
        }
    }

    /// True once the private copy has been materialized.
    pub fn materialized(&self) -> bool {
        self.target.is_some()
    }

    fn active(&self) -> &BoxStream {
        self.target.as_ref().unwrap_or(&self.origin)
    }

    fn active_mut(&mut self) -> &mut BoxStream {
        self.target.as_mut().unwrap_or(&mut self.origin)
    }

    async fn materialize(&mut self) -> Result<()> {
        if self.target.is_some() {
            return Ok(());
        }
        let mut target = (self.factory)()?;

        let pos = self.origin.position();
        // Forward-only origins cannot rewind; their remaining tail is all we
        // can preserve.
        let _ = self.origin.seek(0).await;
        copy(&mut *self.origin, &mut *target).await?;
        target.seek(pos).await?;

        self.target = Some(target);
        Ok(())
    }
}

#[async_trait]
impl Stream for CopyOnWrite {
    fn readable(&self) -> bool {
        self.active().readable()
    }

    fn writable(&self) -> bool {
        true
    }

    fn owned(&self) -> bool {
        true
    }

    fn len(&self) -> u64 {
        self.active().len()
    }

    fn position(&self) -> u64 {
        self.active().position()
    }

    async fn seek(&mut self, pos: u64) -> Result<()> {
        self.active_mut().seek(pos).await
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.active_mut().read(buf).await
    }

    async fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.materialize().await?;
        self.active_mut().write(buf).await
    }

    async fn flush(&mut self) -> Result<()> {
        self.active_mut().flush().await
    }

    async fn set_len(&mut self, len: u64) -> Result<()> {
        self.materialize().await?;
        self.active_mut().set_len(len).await
    }
}
