//! Storage capability traits
//!
//! [`RemoteStorage`] is what orchestration code depends on. [`ObjectSession`]
//! is the narrower set of single-shot calls a backend client must provide so
//! the generic [`StorageClient`](crate::StorageClient) can drive it through
//! the pool.

use std::collections::BTreeMap;
use std::pin::Pin;

use async_trait::async_trait;
use jiff::Timestamp;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Result;
use crate::file::RemoteFile;

/// Streaming download returned by [`RemoteStorage::get_file_reader`]
pub type BoxReader = Pin<Box<dyn AsyncRead + Send>>;

/// File-system-like view over one bucket
#[async_trait]
pub trait RemoteStorage: Send + Sync {
    /// Fixed backend identifier, e.g. `"S3"`
    fn kind(&self) -> &'static str;

    /// Release clients held by this storage
    async fn close(&self) -> Result<()>;

    /// Visit every entry under `path`
    ///
    /// Non-recursive walks report immediate children only, with deeper keys
    /// grouped into [`RemoteFile::Prefix`] entries. An error returned by
    /// `visit` aborts the walk and is returned unchanged.
    async fn walk(
        &self,
        path: &str,
        recursive: bool,
        visit: &mut (dyn FnMut(RemoteFile) -> Result<()> + Send),
    ) -> Result<()>;

    /// Open a streaming read of `key`
    async fn get_file_reader(&self, key: &str) -> Result<BoxReader>;

    /// Upload everything `reader` yields to `key`
    async fn put_file(&self, key: &str, reader: &mut (dyn AsyncRead + Send + Unpin)) -> Result<()>;

    /// Metadata of `key`; [`Error::NotFound`](crate::Error::NotFound) when absent
    async fn stat_file(&self, key: &str) -> Result<RemoteFile>;

    async fn delete_file(&self, key: &str) -> Result<()>;

    /// Delete `key` under the object-disk root
    async fn delete_file_from_object_disk_backup(&self, key: &str) -> Result<()>;

    /// Server-side copy of `src_bucket/src_key` to `dst_key` under the
    /// object-disk root. Returns the number of bytes copied.
    async fn copy_object(&self, src_bucket: &str, src_key: &str, dst_key: &str) -> Result<u64>;
}

/// Attributes of a stored object as reported by the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectAttrs {
    pub key: String,
    pub size: u64,
    pub updated: Option<Timestamp>,
}

/// One item of a prefix/delimiter listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListEntry {
    /// Common prefix, including the trailing delimiter
    Prefix(String),
    Object(ObjectAttrs),
}

impl ListEntry {
    pub fn key(&self) -> &str {
        match self {
            ListEntry::Prefix(p) => p,
            ListEntry::Object(attrs) => &attrs.key,
        }
    }
}

/// Parameters of one listing page request
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub bucket: String,
    pub prefix: String,
    pub delimiter: Option<String>,
    pub continuation_token: Option<String>,
}

/// One page of a listing
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub entries: Vec<ListEntry>,
    /// Present while more pages remain
    pub next_token: Option<String>,
}

/// Upload settings applied to every written object
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOptions {
    pub storage_class: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

/// Streaming upload; the object exists only once [`finish`](Self::finish)
/// returns `Ok`
#[async_trait]
pub trait ObjectWriter: AsyncWrite + Send + Unpin {
    async fn finish(&mut self) -> Result<()>;
}

/// Single-shot calls a pooled backend client must support
///
/// Implementations translate backend errors: a missing object is
/// [`Error::NotFound`](crate::Error::NotFound), anything else
/// [`Error::Transport`](crate::Error::Transport).
#[async_trait]
pub trait ObjectSession: Send + Sync {
    async fn list(&self, query: &ListQuery) -> Result<ListPage>;

    async fn open_reader(&self, bucket: &str, key: &str) -> Result<BoxReader>;

    async fn open_writer(
        &self,
        bucket: &str,
        key: &str,
        options: &WriteOptions,
    ) -> Result<Box<dyn ObjectWriter>>;

    async fn attrs(&self, bucket: &str, key: &str) -> Result<ObjectAttrs>;

    async fn delete(&self, bucket: &str, key: &str) -> Result<()>;

    async fn copy(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> Result<()>;
}
