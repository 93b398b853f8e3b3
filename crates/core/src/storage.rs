//! Pooled storage façade
//!
//! Every operation borrows one client from the pool and settles it before
//! returning: released on success, invalidated on any backend error. A
//! missing object during `stat_file` is the exception.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::io::{AsyncRead, BufReader};
use tokio::sync::Mutex;

use crate::config::StorageConfig;
use crate::error::{Error, Result};
use crate::file::RemoteFile;
use crate::keys::{KeyMapper, SEPARATOR, relative_name};
use crate::pool::{Manager, Pool, PoolStatus, PooledHandle};
use crate::traits::{BoxReader, ListEntry, ListQuery, ObjectSession, RemoteStorage, WriteOptions};

/// Size of the intermediate buffer used when uploading
pub const COPY_BUFFER_SIZE: usize = 512 * 1024;

/// Walks a paginated listing one entry at a time
pub struct ListCursor<'a, S: ObjectSession + ?Sized> {
    session: &'a S,
    query: ListQuery,
    buffered: VecDeque<ListEntry>,
    exhausted: bool,
}

impl<'a, S: ObjectSession + ?Sized> ListCursor<'a, S> {
    pub fn new(session: &'a S, query: ListQuery) -> Self {
        Self {
            session,
            query,
            buffered: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Next entry in backend order, `None` once every page is consumed
    pub async fn next_entry(&mut self) -> Result<Option<ListEntry>> {
        loop {
            if let Some(entry) = self.buffered.pop_front() {
                return Ok(Some(entry));
            }
            if self.exhausted {
                return Ok(None);
            }

            let page = self.session.list(&self.query).await?;
            self.buffered.extend(page.entries);
            match page.next_token {
                Some(token) => self.query.continuation_token = Some(token),
                None => self.exhausted = true,
            }
        }
    }
}

/// [`RemoteStorage`] over a pool of backend sessions
pub struct StorageClient<M>
where
    M: Manager,
    M::Handle: ObjectSession,
{
    kind: &'static str,
    bucket: String,
    keys: KeyMapper,
    write_options: WriteOptions,
    pool: Pool<M>,
    direct: Mutex<Option<M::Handle>>,
}

impl<M> StorageClient<M>
where
    M: Manager,
    M::Handle: ObjectSession,
{
    /// Build the pool and create the auxiliary direct client
    pub async fn connect(kind: &'static str, manager: M, config: &StorageConfig) -> Result<Self> {
        config.validate()?;
        let pool = Pool::new(manager, config.pool_config())?;
        let direct = pool.manager().create().await.map_err(|e| match e {
            Error::ConnectFailed(_) => e,
            other => Error::ConnectFailed(other.to_string()),
        })?;

        tracing::debug!(
            kind,
            bucket = %config.bucket,
            pool_size = config.client_pool_size,
            "storage connected"
        );

        Ok(Self {
            kind,
            bucket: config.bucket.clone(),
            keys: config.key_mapper(),
            write_options: config.write_options(),
            pool,
            direct: Mutex::new(Some(direct)),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn keys(&self) -> &KeyMapper {
        &self.keys
    }

    pub fn pool_status(&self) -> PoolStatus {
        self.pool.status()
    }

    /// Close the client pool only, leaving the direct client alone
    pub async fn close_pool(&self) {
        self.pool.close().await;
    }

    async fn borrow(&self) -> Result<PooledHandle<M>> {
        self.pool
            .acquire()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "can't get client connection from pool"))
    }

    /// Release on success, invalidate on failure
    async fn settle<T>(client: PooledHandle<M>, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                client.release();
                Ok(value)
            }
            Err(e) => {
                client.invalidate().await;
                Err(e)
            }
        }
    }

    /// Like [`settle`](Self::settle), but a missing object keeps the client
    async fn settle_lookup<T>(client: PooledHandle<M>, result: Result<T>) -> Result<T> {
        match result {
            Err(e) if e.is_not_found() => {
                client.release();
                Err(e)
            }
            other => Self::settle(client, other).await,
        }
    }

    async fn walk_pages(
        session: &M::Handle,
        query: ListQuery,
        visit: &mut (dyn FnMut(RemoteFile) -> Result<()> + Send),
    ) -> Result<()> {
        let prefix = query.prefix.clone();
        let mut cursor = ListCursor::new(session, query);

        while let Some(entry) = cursor.next_entry().await? {
            let file = match entry {
                ListEntry::Prefix(p) => RemoteFile::prefix(relative_name(&prefix, &p)),
                ListEntry::Object(attrs) => RemoteFile::object(
                    relative_name(&prefix, &attrs.key),
                    attrs.size,
                    attrs.updated,
                ),
            };
            visit(file)?;
        }
        Ok(())
    }

    async fn delete_key(&self, key: String) -> Result<()> {
        let client = self.borrow().await?;
        let result = client.delete(&self.bucket, &key).await;
        Self::settle(client, result).await?;
        tracing::debug!(bucket = %self.bucket, key = %key, "deleted object");
        Ok(())
    }
}

fn finalization_error(key: &str, error: Error) -> Error {
    match error {
        Error::WriteFinalization { .. } => error,
        other => Error::WriteFinalization {
            key: key.to_string(),
            message: other.to_string(),
        },
    }
}

#[async_trait]
impl<M> RemoteStorage for StorageClient<M>
where
    M: Manager,
    M::Handle: ObjectSession,
{
    fn kind(&self) -> &'static str {
        self.kind
    }

    async fn close(&self) -> Result<()> {
        let direct = self.direct.lock().await.take();
        let destroyed = match direct {
            Some(direct) => self.pool.manager().destroy(direct).await,
            None => Ok(()),
        };
        self.pool.close().await;
        destroyed
    }

    async fn walk(
        &self,
        path: &str,
        recursive: bool,
        visit: &mut (dyn FnMut(RemoteFile) -> Result<()> + Send),
    ) -> Result<()> {
        let client = self.borrow().await?;
        let query = ListQuery {
            bucket: self.bucket.clone(),
            prefix: self.keys.walk_prefix(path),
            delimiter: (!recursive).then(|| SEPARATOR.to_string()),
            continuation_token: None,
        };

        let result = Self::walk_pages(&client, query, visit).await;
        Self::settle(client, result).await
    }

    async fn get_file_reader(&self, key: &str) -> Result<BoxReader> {
        let client = self.borrow().await?;
        let key = self.keys.to_primary_key(key);
        let result = client.open_reader(&self.bucket, &key).await;
        Self::settle(client, result).await
    }

    async fn put_file(&self, key: &str, reader: &mut (dyn AsyncRead + Send + Unpin)) -> Result<()> {
        let client = self.borrow().await?;
        let key = self.keys.to_primary_key(key);

        let mut writer = match client.open_writer(&self.bucket, &key, &self.write_options).await {
            Ok(writer) => writer,
            Err(e) => {
                client.invalidate().await;
                return Err(e);
            }
        };

        let mut source = BufReader::with_capacity(COPY_BUFFER_SIZE, reader);
        let result = match tokio::io::copy_buf(&mut source, &mut *writer).await {
            Ok(bytes) => writer.finish().await.map(|()| bytes).map_err(|e| {
                tracing::warn!(key = %key, error = %e, "can't close writer");
                finalization_error(&key, e)
            }),
            Err(e) => Err(Error::Io(e)),
        };
        drop(writer);

        let bytes = Self::settle(client, result).await?;
        tracing::debug!(bucket = %self.bucket, key = %key, bytes, "uploaded object");
        Ok(())
    }

    async fn stat_file(&self, key: &str) -> Result<RemoteFile> {
        let client = self.borrow().await?;
        let full_key = self.keys.to_primary_key(key);
        let result = client.attrs(&self.bucket, &full_key).await;
        let attrs = Self::settle_lookup(client, result).await?;

        let root = self.keys.walk_prefix("");
        Ok(RemoteFile::object(
            relative_name(&root, &attrs.key),
            attrs.size,
            attrs.updated,
        ))
    }

    async fn delete_file(&self, key: &str) -> Result<()> {
        self.delete_key(self.keys.to_primary_key(key)).await
    }

    async fn delete_file_from_object_disk_backup(&self, key: &str) -> Result<()> {
        self.delete_key(self.keys.to_secondary_key(key)?).await
    }

    async fn copy_object(&self, src_bucket: &str, src_key: &str, dst_key: &str) -> Result<u64> {
        let dst_key = self.keys.to_secondary_key(dst_key)?;
        let client = self.borrow().await?;

        let result = async {
            let attrs = client.attrs(src_bucket, src_key).await?;
            client
                .copy(src_bucket, src_key, &self.bucket, &dst_key)
                .await?;
            Ok::<u64, Error>(attrs.size)
        }
        .await;
        let size = Self::settle(client, result).await?;

        tracing::debug!(
            "{}->CopyObject {}/{} -> {}/{}",
            self.kind,
            src_bucket,
            src_key,
            self.bucket,
            dst_key
        );
        Ok(size)
    }
}
