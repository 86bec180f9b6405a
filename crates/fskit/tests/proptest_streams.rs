//! Property-based tests for streams and backend round trips.

use std::sync::Arc;

use fskit::object_store::{MemoryObjectStore, ObjectStoreFs};
use fskit::stream::{MemoryStream, Stream, StreamExt};
use fskit::{FileSystem, MemoryFs, VfsPath};
use proptest::prelude::*;

fn p(s: &str) -> VfsPath {
    s.parse().unwrap()
}

async fn round_trip(fs: Arc<dyn FileSystem>, bytes: &[u8]) -> Vec<u8> {
    let path = p("/prop/file.bin");
    let mut handle = fs.create_file(&path).await.unwrap();
    handle.write_all(bytes).await.unwrap();
    drop(handle);

    let mut read = fs.open_read(&path).await.unwrap().unwrap();
    read.read_to_end().await.unwrap()
}

// Each case spins up a runtime, so the counts stay modest.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Whatever bytes go into a backend come back out, byte for byte.
    #[test]
    fn memory_round_trips_arbitrary_bytes(bytes in prop::collection::vec(any::<u8>(), 0..4096)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let out = rt.block_on(round_trip(Arc::new(MemoryFs::new()), &bytes));
        prop_assert_eq!(out, bytes);
    }

    #[test]
    fn object_store_round_trips_arbitrary_bytes(bytes in prop::collection::vec(any::<u8>(), 0..4096)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let fs = Arc::new(ObjectStoreFs::new(Arc::new(MemoryObjectStore::new()), "", false));
        let out = rt.block_on(round_trip(fs, &bytes));
        prop_assert_eq!(out, bytes);
    }

    /// Writes within the cap succeed; the first write past it fails and the
    /// underlying stream never holds more than the cap.
    #[test]
    fn write_limited_enforces_the_cap(
        limit in 0u64..64,
        chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..32), 1..8),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let base = MemoryStream::new();
            let probe = base.mirror();
            let inner: Box<dyn Stream> = Box::new(base);
            let mut capped = inner.write_limited(limit);

            let mut written = 0u64;
            for chunk in &chunks {
                let result = capped.write(chunk).await;
                if written + chunk.len() as u64 <= limit {
                    assert!(result.is_ok());
                    written += chunk.len() as u64;
                } else {
                    assert!(result.is_err());
                    break;
                }
            }
            assert!(probe.len() <= limit);
        });
        prop_assert!(true);
    }

    /// Truncating to zero resets the budget completely.
    #[test]
    fn truncate_resets_write_budget(limit in 1u64..64) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let inner: Box<dyn Stream> = Box::new(MemoryStream::new());
            let mut capped = inner.write_limited(limit);

            let fill = vec![0xAB; limit as usize];
            capped.write(&fill).await.unwrap();
            assert!(capped.write(&[0x01]).await.is_err());

            capped.set_len(0).await.unwrap();
            capped.seek(0).await.unwrap();
            capped.write(&fill).await.unwrap();
            assert_eq!(capped.len(), limit);
        });
        prop_assert!(true);
    }

    /// A copy-on-write stream never mutates its origin, whatever the writes.
    #[test]
    fn copy_on_write_isolation(
        origin_bytes in prop::collection::vec(any::<u8>(), 0..256),
        write_bytes in prop::collection::vec(any::<u8>(), 1..256),
        offset in 0u64..300,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let origin = MemoryStream::from_vec(origin_bytes.clone());
            let view: Box<dyn Stream> = Box::new(origin.mirror());
            let mut cow = view.copy_on_write(|| Ok(Box::new(MemoryStream::new()) as Box<dyn Stream>));

            cow.seek(offset).await.unwrap();
            cow.write(&write_bytes).await.unwrap();

            let mut check = origin.mirror();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 512];
            loop {
                let n = check.read(&mut chunk).await.unwrap();
                if n == 0 { break; }
                buf.extend_from_slice(&chunk[..n]);
            }
            assert_eq!(buf, origin_bytes);
        });
        prop_assert!(true);
    }
}
