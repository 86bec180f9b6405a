//! Object-store client contract.
//!
//! [`ObjectStoreFs`](super::ObjectStoreFs) never talks to a store directly;
//! it goes through [`ObjectStoreClient`], which is the seam for different
//! transports. The crate ships two implementations:
//! [`HttpObjectStore`](super::HttpObjectStore) for S3-compatible endpoints
//! and [`MemoryObjectStore`](super::MemoryObjectStore) for tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::stream::BoxStream;

/// Metadata for one stored object or listing prefix.
#[derive(Debug, Clone)]
pub struct ObjectStat {
    /// Full object key, without any bucket component.
    pub key: String,
    /// Object size in bytes. Zero for prefixes.
    pub size: u64,
    /// Store-assigned entity tag, if the store reports one.
    pub etag: Option<String>,
    /// Content type recorded at upload, if the store reports one.
    pub content_type: Option<String>,
    /// True for a common-prefix result from a non-recursive listing. These
    /// stand in for directories in the store's flat namespace.
    pub is_prefix: bool,
}

/// Raw operations against one bucket of an object store.
///
/// Implementations map their transport's "no such key" onto `Ok(None)`;
/// every other transport failure is an [`Error::Store`](crate::Error::Store).
/// The filesystem layer decides which of those to swallow.
#[async_trait]
pub trait ObjectStoreClient: Send + Sync {
    /// Whether the configured bucket exists.
    async fn bucket_exists(&self) -> Result<bool>;

    /// Create the configured bucket. Creating an existing bucket is not an
    /// error.
    async fn make_bucket(&self) -> Result<()>;

    /// Store `data` under `key`, replacing any previous object.
    async fn put_object(&self, key: &str, data: &[u8], content_type: &str) -> Result<()>;

    /// Open the object's content as a readable stream, or `None` if the key
    /// is absent. The stream may be forward-only.
    async fn get_object(&self, key: &str) -> Result<Option<BoxStream>>;

    /// Metadata for one key, or `None` if absent.
    async fn stat_object(&self, key: &str) -> Result<Option<ObjectStat>>;

    /// Remove one key. Removing an absent key is not an error.
    async fn remove_object(&self, key: &str) -> Result<()>;

    /// List keys under `prefix`.
    ///
    /// Recursive listings return every matching object. Non-recursive
    /// listings stop at the next `/` and report deeper content as
    /// common-prefix entries with [`ObjectStat::is_prefix`] set.
    async fn list_objects(&self, prefix: &str, recursive: bool) -> Result<Vec<ObjectStat>>;
}

/// Connection settings for an S3-compatible endpoint.
///
/// Builder methods follow the usual pattern:
///
/// ```rust
/// use fskit::object_store::ObjectStoreConfig;
///
/// let config = ObjectStoreConfig::new("minio.internal:9000", "artifacts")
///     .secure(false)
///     .credentials("dev", "devsecret");
/// assert_eq!(config.bucket, "artifacts");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectStoreConfig {
    /// Host or host:port, optionally with an explicit `http://`/`https://`
    /// scheme.
    pub endpoint: String,
    /// Bucket name.
    pub bucket: String,
    /// Access key, for deployments that authenticate at a gateway.
    #[serde(default)]
    pub access_key: Option<String>,
    /// Secret key, paired with `access_key`.
    #[serde(default)]
    pub secret_key: Option<String>,
    /// Use TLS when the endpoint does not name a scheme.
    #[serde(default = "default_secure")]
    pub secure: bool,
}

fn default_secure() -> bool {
    true
}

impl ObjectStoreConfig {
    /// Settings for `bucket` on `endpoint`, TLS on, no credentials.
    pub fn new(endpoint: impl Into<String>, bucket: impl Into<String>) -> Self {
        ObjectStoreConfig {
            endpoint: endpoint.into(),
            bucket: bucket.into(),
            access_key: None,
            secret_key: None,
            secure: true,
        }
    }

    /// Set whether to use TLS.
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Set the credential pair.
    pub fn credentials(mut self, access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        self.access_key = Some(access_key.into());
        self.secret_key = Some(secret_key.into());
        self
    }
}
