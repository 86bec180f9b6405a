//! End-to-end scenarios composing backends, streams, and routing.

use std::sync::Arc;

use fskit::object_store::{MemoryObjectStore, ObjectStoreFs};
use fskit::stream::StreamExt;
use fskit::{FileStatus, FileSystem, ListMode, MemoryFs, MountFs, OverlayFs, VfsPath};

fn p(s: &str) -> VfsPath {
    s.parse().unwrap()
}

#[tokio::test]
async fn memory_write_then_read_text() {
    let fs = MemoryFs::new();
    let mut f = fs.create_file(&p("/a/b.txt")).await.unwrap();
    f.write_all(&[0x68, 0x69]).await.unwrap();
    drop(f);

    let mut r = fs.open_read(&p("/a/b.txt")).await.unwrap().unwrap();
    assert_eq!(r.read_to_string().await.unwrap(), "hi");
}

#[tokio::test]
async fn memory_delete_then_stat() {
    let fs = MemoryFs::new();
    let mut f = fs.create_file(&p("/a/b.txt")).await.unwrap();
    f.write_all(&[0x68, 0x69]).await.unwrap();
    drop(f);

    assert!(fs.delete_file(&p("/a/b.txt")).await.unwrap());
    assert_eq!(
        fs.file_stat(&p("/a/b.txt")).await.unwrap(),
        FileStatus::Deleted
    );
    assert!(!fs.file_exists(&p("/a/b.txt")).await.unwrap());
}

#[tokio::test]
async fn overlay_copy_up_preserves_lower() {
    let lower = Arc::new(MemoryFs::new());
    let mut f = lower.create_file(&p("/r.txt")).await.unwrap();
    f.write_all(b"lo").await.unwrap();
    drop(f);

    let overlay = OverlayFs::new(lower.clone(), Arc::new(MemoryFs::new()));

    let mut handle = overlay.open_read_write(&p("/r.txt")).await.unwrap();
    handle.stream().unwrap().seek(0).await.unwrap();
    handle.write_all(b"hi").await.unwrap();
    drop(handle);

    let mut low = lower.open_read(&p("/r.txt")).await.unwrap().unwrap();
    assert_eq!(low.read_to_string().await.unwrap(), "lo");
    let mut merged = overlay.open_read(&p("/r.txt")).await.unwrap().unwrap();
    assert_eq!(merged.read_to_string().await.unwrap(), "hi");
}

#[tokio::test]
async fn mount_routing_by_longest_prefix() {
    let a = Arc::new(MemoryFs::new());
    let b = Arc::new(MemoryFs::new());
    let mounts = MountFs::new();
    mounts.mount(p("/tmp"), a.clone());
    mounts.mount(p("/"), b.clone());

    mounts.create_file(&p("/tmp/x")).await.unwrap();
    mounts.create_file(&p("/y")).await.unwrap();

    assert!(a.file_exists(&p("/x")).await.unwrap());
    assert!(b.file_exists(&p("/y")).await.unwrap());

    let entries = mounts.entries(&p("/tmp"), ListMode::shallow()).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].path().as_str(), "/x");
}

#[tokio::test]
async fn object_store_flush_visibility() {
    let client = Arc::new(MemoryObjectStore::new());
    let fs = ObjectStoreFs::new(client.clone(), "", false);

    let mut f = fs.create_file(&p("/k")).await.unwrap();
    f.stream().unwrap().write(&[0x41]).await.unwrap();

    // Before the flush only the creating filesystem knows about /k.
    assert!(fs.file_exists(&p("/k")).await.unwrap());
    let other = ObjectStoreFs::new(client.clone(), "", false);
    assert!(!other.file_exists(&p("/k")).await.unwrap());

    f.flush().await.unwrap();

    // After the flush a fresh filesystem over the same bucket sees it too.
    let fresh = ObjectStoreFs::new(client, "", false);
    assert!(fresh.file_exists(&p("/k")).await.unwrap());
    let mut r = fresh.open_read(&p("/k")).await.unwrap().unwrap();
    assert_eq!(r.read_to_end().await.unwrap(), vec![0x41]);
}

#[tokio::test]
async fn write_limited_upload() {
    let fs = MemoryFs::new();
    fs.create_file(&p("/upload")).await.unwrap();

    let wo = fs.open_write(&p("/upload")).await.unwrap().unwrap();
    let mut capped = wo.into_stream().unwrap().write_limited(3);

    capped.write(&[0x41, 0x42]).await.unwrap();
    assert!(capped.write(&[0x43, 0x44]).await.is_err());
    drop(capped);

    let mut r = fs.open_read(&p("/upload")).await.unwrap().unwrap();
    let contents = r.read_to_end().await.unwrap();
    assert!(contents.len() <= 3);
    assert_eq!(&contents[..2], &[0x41, 0x42]);
}

#[tokio::test]
async fn overlay_over_object_store_with_mounts() {
    // A realistic stack: object-store lower layer, in-memory upper,
    // routed under /data; scratch memory under /.
    let client = Arc::new(MemoryObjectStore::new());
    let seeded = ObjectStoreFs::new(client.clone(), "", false);
    let mut f = seeded.create_file(&p("/model.json")).await.unwrap();
    f.write_all(b"{\"v\":1}").await.unwrap();
    drop(f);

    let lower: Arc<dyn FileSystem> = Arc::new(ObjectStoreFs::new(client.clone(), "", true));
    let upper = Arc::new(MemoryFs::new());
    let overlay: Arc<dyn FileSystem> = Arc::new(OverlayFs::new(lower, upper));

    let mounts = MountFs::new();
    mounts.mount(p("/data"), overlay);
    mounts.mount(p("/"), Arc::new(MemoryFs::new()));

    // Edit through the mount: the overlay copies up, the store is untouched.
    let mut handle = mounts.open_read_write(&p("/data/model.json")).await.unwrap();
    handle.stream().unwrap().seek(5).await.unwrap();
    handle.write_all(b"2}").await.unwrap();
    drop(handle);

    let mut merged = mounts.open_read(&p("/data/model.json")).await.unwrap().unwrap();
    assert_eq!(merged.read_to_string().await.unwrap(), "{\"v\":2}");

    let untouched = ObjectStoreFs::new(client, "", false);
    let mut original = untouched.open_read(&p("/model.json")).await.unwrap().unwrap();
    assert_eq!(original.read_to_string().await.unwrap(), "{\"v\":1}");
}
