//! fskit - one asynchronous filesystem contract over many storage backends
//!
//! A program opens, reads, writes, lists, and deletes through the
//! [`FileSystem`] trait; the bytes may live in process memory
//! ([`MemoryFs`]), on the local disk ([`RealFs`]), in an S3-compatible
//! object store ([`ObjectStoreFs`](object_store::ObjectStoreFs)), behind a
//! copy-on-write merge of two backends ([`OverlayFs`]), or under a mount
//! table routing paths to backends ([`MountFs`]).
//!
//! Opened files hand out capability-typed [`stream::Stream`] handles:
//! read-only, write-only, write-limited, copy-on-write, and in-memory
//! materialization adapters compose over any backend's streams.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use fskit::{FileSystem, MemoryFs, MountFs, OverlayFs, VfsPath};
//!
//! #[tokio::main]
//! async fn main() -> fskit::Result<()> {
//!     // A read-only template, made writable through an overlay.
//!     let template = Arc::new(MemoryFs::new());
//!     let mut f = template.create_file(&"/config.json".parse()?).await?;
//!     f.write_all(b"{}").await?;
//!     drop(f);
//!
//!     let overlay = Arc::new(OverlayFs::new(template, Arc::new(MemoryFs::new())));
//!
//!     // Routed next to a scratch area.
//!     let mounts = MountFs::new();
//!     mounts.mount("/".parse()?, overlay);
//!     mounts.mount("/tmp".parse()?, Arc::new(MemoryFs::new()));
//!
//!     let path: VfsPath = "/config.json".parse()?;
//!     let mut handle = mounts.open_read_write(&path).await?;
//!     handle.write_all(b"{\"debug\":true}").await?;
//!     Ok(())
//! }
//! ```

mod entry;
mod error;
mod fs;
mod memory;
mod mime;
mod mount;
mod overlay;
mod path;
mod permissions;
mod real;

pub mod object_store;
pub mod stream;

pub use entry::{FileEntry, OpenFile};
pub use error::{Error, Result};
pub use fs::{FileStatus, FileSystem, ListMode, NameFilter, SubFsMode};
pub use memory::{MemoryDir, MemoryFs};
pub use mime::{mime_for_extension, mime_for_path, OCTET_STREAM};
pub use mount::MountFs;
pub use overlay::OverlayFs;
pub use path::VfsPath;
pub use permissions::{allows_listing, max_size, AllowAll, Authorizer, Permission};
pub use real::RealFs;

pub use object_store::ObjectStoreFs;
