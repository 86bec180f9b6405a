//! In-memory object store, for tests and ephemeral buckets.

// RwLock.read()/write().unwrap() only panics on lock poisoning (prior panic
// while holding lock). This is intentional - corrupted state should not propagate.
#![allow(clippy::unwrap_used)]

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::stream::{BoxStream, MemoryStream, StreamExt};

use super::client::{ObjectStat, ObjectStoreClient};

struct StoredObject {
    data: Vec<u8>,
    content_type: String,
    etag: String,
}

/// A bucket that lives in process memory.
///
/// Implements the full [`ObjectStoreClient`] contract, including common
/// prefixes in non-recursive listings, so the object-store filesystem can be
/// exercised without a network. Two filesystems sharing one client see the
/// same bucket, which is exactly what the flush-visibility tests need.
#[derive(Default)]
pub struct MemoryObjectStore {
    bucket: RwLock<bool>,
    objects: RwLock<BTreeMap<String, StoredObject>>,
}

impl MemoryObjectStore {
    /// An empty store whose bucket does not exist yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty store whose bucket already exists.
    pub fn with_bucket() -> Self {
        let store = Self::default();
        *store.bucket.write().unwrap() = true;
        store
    }

    fn check_bucket(&self) -> Result<()> {
        if *self.bucket.read().unwrap() {
            Ok(())
        } else {
            Err(Error::store("bucket does not exist"))
        }
    }
}

#[async_trait]
impl ObjectStoreClient for MemoryObjectStore {
    async fn bucket_exists(&self) -> Result<bool> {
        Ok(*self.bucket.read().unwrap())
    }

    async fn make_bucket(&self) -> Result<()> {
        *self.bucket.write().unwrap() = true;
        Ok(())
    }

    async fn put_object(&self, key: &str, data: &[u8], content_type: &str) -> Result<()> {
        self.check_bucket()?;
        let etag = format!("{:x}", md5::compute(data));
        self.objects.write().unwrap().insert(
            key.to_string(),
            StoredObject {
                data: data.to_vec(),
                content_type: content_type.to_string(),
                etag,
            },
        );
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Option<BoxStream>> {
        let objects = self.objects.read().unwrap();
        Ok(objects.get(key).map(|obj| {
            let stream: BoxStream = Box::new(MemoryStream::from_vec(obj.data.clone()));
            stream.read_only()
        }))
    }

    async fn stat_object(&self, key: &str) -> Result<Option<ObjectStat>> {
        let objects = self.objects.read().unwrap();
        Ok(objects.get(key).map(|obj| ObjectStat {
            key: key.to_string(),
            size: obj.data.len() as u64,
            etag: Some(obj.etag.clone()),
            content_type: Some(obj.content_type.clone()),
            is_prefix: false,
        }))
    }

    async fn remove_object(&self, key: &str) -> Result<()> {
        self.objects.write().unwrap().remove(key);
        Ok(())
    }

    async fn list_objects(&self, prefix: &str, recursive: bool) -> Result<Vec<ObjectStat>> {
        let objects = self.objects.read().unwrap();
        let mut out = Vec::new();
        let mut prefixes: Vec<String> = Vec::new();

        for (key, obj) in objects.range(prefix.to_string()..) {
            if !key.starts_with(prefix) {
                break;
            }
            let rest = &key[prefix.len()..];
            match (recursive, rest.find('/')) {
                (false, Some(slash)) => {
                    let common = format!("{}{}/", prefix, &rest[..slash]);
                    if prefixes.last() != Some(&common) {
                        prefixes.push(common);
                    }
                }
                _ => out.push(ObjectStat {
                    key: key.clone(),
                    size: obj.data.len() as u64,
                    etag: Some(obj.etag.clone()),
                    content_type: Some(obj.content_type.clone()),
                    is_prefix: false,
                }),
            }
        }

        out.extend(prefixes.into_iter().map(|key| ObjectStat {
            key,
            size: 0,
            etag: None,
            content_type: None,
            is_prefix: true,
        }));
        Ok(out)
    }
}
