//! S3-compatible HTTP client.
//!
//! A thin transport for S3-style endpoints (MinIO, localstack, real S3
//! behind a signing gateway). Requests are not SigV4-signed: the client
//! targets anonymous buckets and deployments where authentication happens at
//! a proxy. When credentials are configured they are attached as basic auth
//! for gateways that consume it. Signed transports plug in behind
//! [`ObjectStoreClient`] instead.
//!
//! # Security posture
//!
//! Mirrors the conservative HTTP defaults used elsewhere in this workspace:
//! explicit connect and request timeouts, and no automatic redirect
//! following, so a misbehaving endpoint cannot bounce a request somewhere
//! unexpected.

use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, StatusCode};
use url::Url;

use crate::error::{Error, Result};
use crate::stream::{BoxStream, Stream};

use super::client::{ObjectStat, ObjectStoreClient, ObjectStoreConfig};

/// Default request timeout (30 seconds).
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Object-store client over plain HTTP(S).
pub struct HttpObjectStore {
    http: Client,
    config: ObjectStoreConfig,
}

impl HttpObjectStore {
    /// Build a client for `config` with default timeouts.
    pub fn new(config: ObjectStoreConfig) -> Result<Self> {
        Self::with_timeout(config, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Build a client with a custom request timeout.
    pub fn with_timeout(config: ObjectStoreConfig, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent("fskit/0.1.0")
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Error::store(format!("failed to build HTTP client: {}", e)))?;
        Ok(HttpObjectStore { http, config })
    }

    fn base_url(&self) -> Result<Url> {
        let raw = if self.config.endpoint.contains("://") {
            self.config.endpoint.clone()
        } else {
            let scheme = if self.config.secure { "https" } else { "http" };
            format!("{}://{}", scheme, self.config.endpoint)
        };
        Url::parse(&raw).map_err(|e| Error::store(format!("bad endpoint: {}", e)))
    }

    fn bucket_url(&self) -> Result<Url> {
        let mut url = self.base_url()?;
        url.path_segments_mut()
            .map_err(|_| Error::store("endpoint cannot carry a path"))?
            .push(&self.config.bucket);
        Ok(url)
    }

    /// Path-style object URL. Anonymous deployments use this directly as the
    /// download URL, which is what a presigned GET degenerates to without
    /// signing.
    pub fn object_url(&self, key: &str) -> Result<Url> {
        let mut url = self.bucket_url()?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| Error::store("endpoint cannot carry a path"))?;
            for part in key.split('/') {
                segments.push(part);
            }
        }
        Ok(url)
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        let mut req = self.http.request(method, url);
        if let (Some(access), Some(secret)) =
            (&self.config.access_key, &self.config.secret_key)
        {
            req = req.basic_auth(access, Some(secret));
        }
        req
    }

    async fn send(&self, req: reqwest::RequestBuilder, what: &str) -> Result<reqwest::Response> {
        req.send()
            .await
            .map_err(|e| Error::store(format!("{} failed: {}", what, e)))
    }

    async fn list_page(
        &self,
        prefix: &str,
        recursive: bool,
        continuation: Option<&str>,
    ) -> Result<(Vec<ObjectStat>, Option<String>)> {
        let mut url = self.bucket_url()?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("list-type", "2");
            query.append_pair("prefix", prefix);
            if !recursive {
                query.append_pair("delimiter", "/");
            }
            if let Some(token) = continuation {
                query.append_pair("continuation-token", token);
            }
        }
        let resp = self.send(self.request(reqwest::Method::GET, url), "list").await?;
        if !resp.status().is_success() {
            return Err(Error::store(format!("list returned {}", resp.status())));
        }
        let body = resp
            .text()
            .await
            .map_err(|e| Error::store(format!("list body: {}", e)))?;
        Ok(parse_list_response(&body))
    }
}

#[async_trait]
impl ObjectStoreClient for HttpObjectStore {
    async fn bucket_exists(&self) -> Result<bool> {
        let resp = self
            .send(self.request(reqwest::Method::HEAD, self.bucket_url()?), "bucket head")
            .await?;
        match resp.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s => Err(Error::store(format!("bucket head returned {}", s))),
        }
    }

    async fn make_bucket(&self) -> Result<()> {
        let resp = self
            .send(self.request(reqwest::Method::PUT, self.bucket_url()?), "bucket create")
            .await?;
        match resp.status() {
            s if s.is_success() => Ok(()),
            StatusCode::CONFLICT => Ok(()),
            s => Err(Error::store(format!("bucket create returned {}", s))),
        }
    }

    async fn put_object(&self, key: &str, data: &[u8], content_type: &str) -> Result<()> {
        let req = self
            .request(reqwest::Method::PUT, self.object_url(key)?)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(data.to_vec());
        let resp = self.send(req, "put").await?;
        if !resp.status().is_success() {
            return Err(Error::store(format!("put {} returned {}", key, resp.status())));
        }
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Option<BoxStream>> {
        let resp = self
            .send(self.request(reqwest::Method::GET, self.object_url(key)?), "get")
            .await?;
        match resp.status() {
            s if s.is_success() => {
                let len = resp.content_length().unwrap_or(0);
                Ok(Some(Box::new(HttpBodyStream::new(resp, len))))
            }
            StatusCode::NOT_FOUND => Ok(None),
            s => Err(Error::store(format!("get {} returned {}", key, s))),
        }
    }

    async fn stat_object(&self, key: &str) -> Result<Option<ObjectStat>> {
        let resp = self
            .send(self.request(reqwest::Method::HEAD, self.object_url(key)?), "stat")
            .await?;
        match resp.status() {
            s if s.is_success() => {
                let header = |name: reqwest::header::HeaderName| {
                    resp.headers()
                        .get(name)
                        .and_then(|v| v.to_str().ok())
                        .map(|v| v.trim_matches('"').to_string())
                };
                Ok(Some(ObjectStat {
                    key: key.to_string(),
                    size: resp.content_length().unwrap_or(0),
                    etag: header(reqwest::header::ETAG),
                    content_type: header(reqwest::header::CONTENT_TYPE),
                    is_prefix: false,
                }))
            }
            StatusCode::NOT_FOUND => Ok(None),
            s => Err(Error::store(format!("stat {} returned {}", key, s))),
        }
    }

    async fn remove_object(&self, key: &str) -> Result<()> {
        let resp = self
            .send(self.request(reqwest::Method::DELETE, self.object_url(key)?), "delete")
            .await?;
        match resp.status() {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Ok(()),
            s => Err(Error::store(format!("delete {} returned {}", key, s))),
        }
    }

    async fn list_objects(&self, prefix: &str, recursive: bool) -> Result<Vec<ObjectStat>> {
        let mut out = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let (mut page, next) = self
                .list_page(prefix, recursive, continuation.as_deref())
                .await?;
            out.append(&mut page);
            match next {
                Some(token) => continuation = Some(token),
                None => break,
            }
        }
        Ok(out)
    }
}

/// Forward-only stream over an HTTP response body.
///
/// The advertised length comes from the response's `Content-Length`.
/// Seeking is unsupported; callers that need random access drain it with
/// [`into_memory`](crate::stream::into_memory).
pub struct HttpBodyStream {
    response: reqwest::Response,
    buffer: Vec<u8>,
    buffer_pos: usize,
    pos: u64,
    len: u64,
}

impl HttpBodyStream {
    fn new(response: reqwest::Response, len: u64) -> Self {
        HttpBodyStream {
            response,
            buffer: Vec::new(),
            buffer_pos: 0,
            pos: 0,
            len,
        }
    }
}

#[async_trait]
impl Stream for HttpBodyStream {
    fn readable(&self) -> bool {
        true
    }

    fn writable(&self) -> bool {
        false
    }

    fn owned(&self) -> bool {
        true
    }

    fn len(&self) -> u64 {
        self.len
    }

    fn position(&self) -> u64 {
        self.pos
    }

    async fn seek(&mut self, _pos: u64) -> Result<()> {
        Err(Error::NotSupported("seek on an HTTP body stream"))
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.buffer_pos >= self.buffer.len() {
            match self
                .response
                .chunk()
                .await
                .map_err(|e| Error::store(format!("read body: {}", e)))?
            {
                Some(chunk) => {
                    self.buffer = chunk.to_vec();
                    self.buffer_pos = 0;
                }
                None => return Ok(0),
            }
        }
        let n = buf.len().min(self.buffer.len() - self.buffer_pos);
        buf[..n].copy_from_slice(&self.buffer[self.buffer_pos..self.buffer_pos + n]);
        self.buffer_pos += n;
        self.pos += n as u64;
        Ok(n)
    }

    async fn write(&mut self, _buf: &[u8]) -> Result<()> {
        Err(Error::NotSupported("write on an HTTP body stream"))
    }

    async fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    async fn set_len(&mut self, _len: u64) -> Result<()> {
        Err(Error::NotSupported("set_len on an HTTP body stream"))
    }
}

/// Extract keys, sizes, and common prefixes from a ListObjectsV2 response.
///
/// Handles only the elements this client needs; the store's XML is flat and
/// predictable enough that full XML parsing would buy nothing.
fn parse_list_response(body: &str) -> (Vec<ObjectStat>, Option<String>) {
    let mut out = Vec::new();

    // Panic-free: all three patterns are literals known to compile.
    if let Ok(contents_re) = Regex::new(r"(?s)<Contents>(.*?)</Contents>") {
        let key_re = Regex::new(r"<Key>([^<]*)</Key>").ok();
        let size_re = Regex::new(r"<Size>([0-9]+)</Size>").ok();
        let etag_re = Regex::new(r"<ETag>([^<]*)</ETag>").ok();
        for block in contents_re.captures_iter(body) {
            let block = &block[1];
            let key = key_re
                .as_ref()
                .and_then(|re| re.captures(block))
                .map(|c| xml_unescape(&c[1]));
            let Some(key) = key else { continue };
            let size = size_re
                .as_ref()
                .and_then(|re| re.captures(block))
                .and_then(|c| c[1].parse().ok())
                .unwrap_or(0);
            let etag = etag_re
                .as_ref()
                .and_then(|re| re.captures(block))
                .map(|c| xml_unescape(&c[1]).trim_matches('"').to_string());
            out.push(ObjectStat {
                key,
                size,
                etag,
                content_type: None,
                is_prefix: false,
            });
        }
    }

    if let Ok(common_re) = Regex::new(r"(?s)<CommonPrefixes>(.*?)</CommonPrefixes>") {
        let prefix_re = Regex::new(r"<Prefix>([^<]*)</Prefix>").ok();
        for block in common_re.captures_iter(body) {
            if let Some(prefix) = prefix_re
                .as_ref()
                .and_then(|re| re.captures(&block[1]))
                .map(|c| xml_unescape(&c[1]))
            {
                out.push(ObjectStat {
                    key: prefix,
                    size: 0,
                    etag: None,
                    content_type: None,
                    is_prefix: true,
                });
            }
        }
    }

    let next = Regex::new(r"<NextContinuationToken>([^<]*)</NextContinuationToken>")
        .ok()
        .and_then(|re| re.captures(body).map(|c| xml_unescape(&c[1])));

    (out, next)
}

fn xml_unescape(input: &str) -> String {
    input
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
