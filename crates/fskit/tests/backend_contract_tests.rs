//! Contract tests run against every backend.
//!
//! Each backend gets the same treatment: write/read round trip, delete
//! visibility, open-mode capabilities, and listing filters, exercised
//! through `Arc<dyn FileSystem>` so nothing backend-specific leaks in.

use std::sync::Arc;

use fskit::object_store::{MemoryObjectStore, ObjectStoreFs};
use fskit::{FileStatus, FileSystem, ListMode, MemoryFs, NameFilter, OverlayFs, RealFs, VfsPath};

fn p(s: &str) -> VfsPath {
    s.parse().unwrap()
}

async fn assert_write_read_round_trip(fs: Arc<dyn FileSystem>) {
    let path = p("/contract/data.bin");
    let payload: Vec<u8> = (0u8..=255).collect();

    let mut handle = fs.create_file(&path).await.unwrap();
    handle.write_all(&payload).await.unwrap();
    drop(handle);

    let mut read = fs.open_read(&path).await.unwrap().expect("file exists");
    assert_eq!(read.read_to_end().await.unwrap(), payload);
}

async fn assert_delete_visibility(fs: Arc<dyn FileSystem>) {
    let path = p("/contract/doomed.txt");
    let mut handle = fs.create_file(&path).await.unwrap();
    handle.write_all(b"bye").await.unwrap();
    drop(handle);

    assert!(fs.delete_file(&path).await.unwrap());
    assert!(!fs.file_exists(&path).await.unwrap());
    assert!(matches!(
        fs.file_stat(&path).await.unwrap(),
        FileStatus::NotFound | FileStatus::Deleted
    ));
    assert!(fs.open_read(&path).await.unwrap().is_none());
}

async fn assert_open_capabilities(fs: Arc<dyn FileSystem>) {
    let path = p("/contract/caps.txt");
    let mut handle = fs.create_file(&path).await.unwrap();
    handle.write_all(b"caps").await.unwrap();
    drop(handle);

    let mut ro = fs.open_read(&path).await.unwrap().expect("readable");
    assert!(ro.write_all(b"x").await.is_err());
    assert_eq!(ro.read_to_end().await.unwrap(), b"caps");

    let mut rw = fs.open_read_write(&path).await.unwrap();
    rw.stream().unwrap().seek(0).await.unwrap();
    rw.write_all(b"CAPS").await.unwrap();
    drop(rw);

    let mut check = fs.open_read(&path).await.unwrap().expect("readable");
    assert_eq!(check.read_to_string().await.unwrap(), "CAPS");
}

async fn assert_shallow_listing_filters(fs: Arc<dyn FileSystem>) {
    for path in ["/list/a.txt", "/list/b.TXT", "/list/c.json"] {
        let mut handle = fs.create_file(&p(path)).await.unwrap();
        handle.write_all(b"1").await.unwrap();
    }
    fs.create_dir(&p("/list/child")).await.unwrap();

    let all = fs.entries(&p("/list"), ListMode::shallow()).await.unwrap();
    let mut names: Vec<_> = all.iter().map(|e| e.path().as_str().to_string()).collect();
    names.sort();
    assert_eq!(
        names,
        vec!["/list/a.txt", "/list/b.TXT", "/list/c.json", "/list/child"]
    );
    assert!(all.iter().all(|e| !e.is_open()));

    // Case-insensitive suffix glob.
    let txt = fs
        .entries(
            &p("/list"),
            ListMode::Shallow(NameFilter::pattern("*.txt").unwrap()),
        )
        .await
        .unwrap();
    let mut names: Vec<_> = txt.iter().map(|e| e.path().as_str().to_string()).collect();
    names.sort();
    assert_eq!(names, vec!["/list/a.txt", "/list/b.TXT"]);
}

async fn run_contract(fs: Arc<dyn FileSystem>) {
    assert_write_read_round_trip(fs.clone()).await;
    assert_delete_visibility(fs.clone()).await;
    assert_open_capabilities(fs.clone()).await;
    assert_shallow_listing_filters(fs).await;
}

#[tokio::test]
async fn memory_backend_contract() {
    run_contract(Arc::new(MemoryFs::new())).await;
}

#[tokio::test]
async fn real_backend_contract() {
    let dir = tempfile::tempdir().unwrap();
    run_contract(Arc::new(RealFs::new(dir.path()))).await;
}

#[tokio::test]
async fn object_store_backend_contract() {
    let client = Arc::new(MemoryObjectStore::new());
    run_contract(Arc::new(ObjectStoreFs::new(client, "", false))).await;
}

#[tokio::test]
async fn object_store_backend_contract_with_key_prefix() {
    let client = Arc::new(MemoryObjectStore::new());
    run_contract(Arc::new(ObjectStoreFs::new(client, "nested/prefix", false))).await;
}

#[tokio::test]
async fn overlay_backend_contract() {
    let lower = Arc::new(MemoryFs::new());
    let upper = Arc::new(MemoryFs::new());
    run_contract(Arc::new(OverlayFs::new(lower, upper))).await;
}

#[tokio::test]
async fn integrate_imports_across_backends() {
    // Memory -> object store, object store -> disk: integrate is the
    // cross-backend import primitive, so any readable should move.
    let memory = Arc::new(MemoryFs::new());
    let mut src = memory.create_file(&p("/doc/report.txt")).await.unwrap();
    src.write_all(b"quarterly numbers").await.unwrap();
    drop(src);

    let store: Arc<dyn FileSystem> = Arc::new(ObjectStoreFs::new(
        Arc::new(MemoryObjectStore::new()),
        "",
        false,
    ));
    let readable = memory.open_read(&p("/doc/report.txt")).await.unwrap().unwrap();
    let mut imported = store.integrate(readable).await.unwrap();
    imported.flush().await.unwrap();
    assert!(store.file_exists(&p("/doc/report.txt")).await.unwrap());

    let dir = tempfile::tempdir().unwrap();
    let disk: Arc<dyn FileSystem> = Arc::new(RealFs::new(dir.path()));
    let readable = store.open_read(&p("/doc/report.txt")).await.unwrap().unwrap();
    let mut on_disk = disk.integrate(readable).await.unwrap();
    assert_eq!(on_disk.read_to_string().await.unwrap(), "quarterly numbers");
}
