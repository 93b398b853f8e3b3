//! S3 session implementation
//!
//! Wraps aws-sdk-s3 and implements the `ObjectSession` and `Manager` traits
//! from rstore-core, so the pooled façade can drive it.

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

use async_trait::async_trait;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::primitives::{ByteStream, DateTime};
use aws_sdk_s3::types::StorageClass;
use jiff::Timestamp;
use rstore_core::{
    BoxReader, CredentialSource, Error, ListEntry, ListPage, ListQuery, Manager, ObjectAttrs,
    ObjectSession, ObjectWriter, Result, StorageConfig, WriteOptions,
};
use tempfile::TempPath;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::debug::DebugInterceptor;

/// Creates S3 sessions that share one SDK configuration
pub struct S3Manager {
    config: aws_sdk_s3::Config,
    next_id: AtomicU64,
}

impl S3Manager {
    /// Resolve credentials, region and endpoint into an SDK configuration
    pub async fn new(config: &StorageConfig) -> Result<Self> {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .retry_config(aws_config::retry::RetryConfig::disabled());

        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        loader = match config.credential_source()? {
            CredentialSource::Static(creds) => {
                loader.credentials_provider(aws_credential_types::Credentials::new(
                    creds.access_key_id,
                    creds.secret_access_key,
                    creds.session_token,
                    None,
                    "rstore-static-credentials",
                ))
            }
            CredentialSource::Anonymous => loader.no_credentials(),
            CredentialSource::DefaultChain => loader,
        };

        let sdk_config = loader.load().await;

        let mut builder =
            aws_sdk_s3::config::Builder::from(&sdk_config).force_path_style(config.force_path_style);
        if config.debug {
            builder = builder.interceptor(DebugInterceptor);
        }

        Ok(Self {
            config: builder.build(),
            next_id: AtomicU64::new(1),
        })
    }
}

#[async_trait]
impl Manager for S3Manager {
    type Handle = S3Session;

    async fn create(&self) -> Result<S3Session> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(session = id, "creating S3 session");
        Ok(S3Session {
            id,
            inner: aws_sdk_s3::Client::from_conf(self.config.clone()),
        })
    }

    async fn destroy(&self, session: S3Session) -> Result<()> {
        tracing::trace!(session = session.id, "destroying S3 session");
        Ok(())
    }
}

/// One pooled aws-sdk-s3 client
pub struct S3Session {
    id: u64,
    inner: aws_sdk_s3::Client,
}

impl S3Session {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Get the underlying aws-sdk-s3 client
    pub fn inner(&self) -> &aws_sdk_s3::Client {
        &self.inner
    }
}

/// Format AWS SDK error into a detailed error message
pub(crate) fn format_sdk_error<E: std::fmt::Display>(error: &SdkError<E>) -> String {
    match error {
        SdkError::ServiceError(service_err) => {
            let err = service_err.err();
            let meta = service_err.raw();
            let mut msg = format!("Service error: {err}");
            if let Some(code) = meta.headers().get("x-amz-error-code") {
                msg.push_str(&format!(" (code: {code})"));
            }
            msg
        }
        SdkError::ConstructionFailure(err) => format!("Request construction failed: {err:?}"),
        SdkError::TimeoutError(_) => "Request timeout".to_string(),
        SdkError::DispatchFailure(err) => format!("Network dispatch error: {err:?}"),
        SdkError::ResponseError(err) => format!("Response error: {err:?}"),
        _ => error.to_string(),
    }
}

fn transport_error<E: std::fmt::Display>(action: &str, error: &SdkError<E>) -> Error {
    Error::Transport(format!("{action}: {}", format_sdk_error(error)))
}

fn timestamp(value: &DateTime) -> Option<Timestamp> {
    Timestamp::new(value.secs(), value.subsec_nanos() as i32).ok()
}

fn object_path(bucket: &str, key: &str) -> String {
    format!("{bucket}/{key}")
}

/// Merge delimiter groups and objects into one key-ordered page
fn merge_entries(prefixes: Vec<String>, objects: Vec<ObjectAttrs>) -> Vec<ListEntry> {
    let mut entries: Vec<ListEntry> = prefixes
        .into_iter()
        .map(ListEntry::Prefix)
        .chain(objects.into_iter().map(ListEntry::Object))
        .collect();
    entries.sort_by(|a, b| a.key().cmp(b.key()));
    entries
}

#[async_trait]
impl ObjectSession for S3Session {
    async fn list(&self, query: &ListQuery) -> Result<ListPage> {
        let mut request = self
            .inner
            .list_objects_v2()
            .bucket(&query.bucket)
            .set_delimiter(query.delimiter.clone())
            .set_continuation_token(query.continuation_token.clone());

        if !query.prefix.is_empty() {
            request = request.prefix(&query.prefix);
        }

        let response = request.send().await.map_err(|e| {
            let is_missing_bucket = e.as_service_error().is_some_and(|se| se.is_no_such_bucket());
            if is_missing_bucket {
                Error::NotFound(format!("Bucket not found: {}", query.bucket))
            } else {
                transport_error("ListObjectsV2", &e)
            }
        })?;

        let prefixes = response
            .common_prefixes()
            .iter()
            .filter_map(|p| p.prefix().map(str::to_string))
            .collect();

        let objects = response
            .contents()
            .iter()
            .filter_map(|object| {
                let key = object.key()?.to_string();
                Some(ObjectAttrs {
                    key,
                    size: object.size().unwrap_or(0).max(0) as u64,
                    updated: object.last_modified().and_then(timestamp),
                })
            })
            .collect();

        let next_token = if response.is_truncated().unwrap_or(false) {
            response.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        Ok(ListPage {
            entries: merge_entries(prefixes, objects),
            next_token,
        })
    }

    async fn open_reader(&self, bucket: &str, key: &str) -> Result<BoxReader> {
        let response = self
            .inner
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    Error::NotFound(object_path(bucket, key))
                } else {
                    transport_error("GetObject", &e)
                }
            })?;

        Ok(Box::pin(response.body.into_async_read()))
    }

    async fn open_writer(
        &self,
        bucket: &str,
        key: &str,
        options: &WriteOptions,
    ) -> Result<Box<dyn ObjectWriter>> {
        let (file, path) = tempfile::NamedTempFile::new()?.into_parts();

        Ok(Box::new(S3Writer {
            client: self.inner.clone(),
            bucket: bucket.to_string(),
            key: key.to_string(),
            options: options.clone(),
            spool: tokio::fs::File::from_std(file),
            path,
        }))
    }

    async fn attrs(&self, bucket: &str, key: &str) -> Result<ObjectAttrs> {
        let response = self
            .inner
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_not_found()) {
                    Error::NotFound(object_path(bucket, key))
                } else {
                    transport_error("HeadObject", &e)
                }
            })?;

        Ok(ObjectAttrs {
            key: key.to_string(),
            size: response.content_length().unwrap_or(0).max(0) as u64,
            updated: response.last_modified().and_then(timestamp),
        })
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        self.inner
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| transport_error("DeleteObject", &e))?;

        Ok(())
    }

    async fn copy(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> Result<()> {
        let copy_source = format!("{src_bucket}/{}", urlencoding::encode(src_key));

        self.inner
            .copy_object()
            .copy_source(copy_source)
            .bucket(dst_bucket)
            .key(dst_key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_object_not_in_active_tier_error()) {
                    Error::Transport(format!(
                        "CopyObject: source {} is archived",
                        object_path(src_bucket, src_key)
                    ))
                } else {
                    transport_error("CopyObject", &e)
                }
            })?;

        Ok(())
    }
}

/// Spools the upload to a temporary file and sends it on `finish`
///
/// S3 needs the content length up front, so streaming writes are buffered on
/// disk rather than in memory.
struct S3Writer {
    client: aws_sdk_s3::Client,
    bucket: String,
    key: String,
    options: WriteOptions,
    spool: tokio::fs::File,
    path: TempPath,
}

impl AsyncWrite for S3Writer {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        Pin::new(&mut self.spool).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.spool).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.spool).poll_shutdown(cx)
    }
}

#[async_trait]
impl ObjectWriter for S3Writer {
    async fn finish(&mut self) -> Result<()> {
        self.spool.flush().await?;

        let body = ByteStream::from_path(&self.path)
            .await
            .map_err(|e| Error::WriteFinalization {
                key: self.key.clone(),
                message: format!("can't read spooled upload: {e}"),
            })?;

        let metadata = (!self.options.metadata.is_empty())
            .then(|| self.options.metadata.clone().into_iter().collect());

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .body(body)
            .set_storage_class(self.options.storage_class.as_deref().map(StorageClass::from))
            .set_metadata(metadata)
            .send()
            .await
            .map_err(|e| Error::WriteFinalization {
                key: self.key.clone(),
                message: format_sdk_error(&e),
            })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(key: &str, size: u64) -> ObjectAttrs {
        ObjectAttrs {
            key: key.to_string(),
            size,
            updated: None,
        }
    }

    #[test]
    fn test_merge_entries_orders_by_key() {
        let entries = merge_entries(
            vec!["root/b/".to_string(), "root/d/".to_string()],
            vec![attrs("root/a.txt", 1), attrs("root/c.txt", 2)],
        );

        let keys: Vec<&str> = entries.iter().map(ListEntry::key).collect();
        assert_eq!(keys, vec!["root/a.txt", "root/b/", "root/c.txt", "root/d/"]);
        assert!(matches!(entries[1], ListEntry::Prefix(_)));
        assert!(matches!(entries[2], ListEntry::Object(ObjectAttrs { size: 2, .. })));
    }

    #[test]
    fn test_timestamp_keeps_subseconds() {
        let value = DateTime::from_secs_and_nanos(1_700_000_000, 250_000_000);
        let ts = timestamp(&value).expect("in range");
        assert_eq!(ts.as_second(), 1_700_000_000);
        assert_eq!(ts.subsec_nanosecond(), 250_000_000);
    }

    #[test]
    fn test_timeout_is_transport_error() {
        let err: SdkError<String> = SdkError::timeout_error("deadline elapsed");
        let translated = transport_error("HeadObject", &err);
        assert!(translated.is_transient());
        assert_eq!(
            translated.to_string(),
            "Transport error: HeadObject: Request timeout"
        );
    }

    fn anonymous_config() -> StorageConfig {
        StorageConfig {
            bucket: "backups".to_string(),
            endpoint: Some("http://127.0.0.1:9000".to_string()),
            force_path_style: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_manager_hands_out_distinct_sessions() {
        let manager = S3Manager::new(&anonymous_config()).await.unwrap();
        let first = manager.create().await.unwrap();
        let second = manager.create().await.unwrap();

        assert_ne!(first.id(), second.id());
        manager.destroy(first).await.unwrap();
        manager.destroy(second).await.unwrap();
    }

    #[tokio::test]
    async fn test_manager_rejects_bad_credentials_document() {
        let config = StorageConfig {
            credentials_json: Some("not json".to_string()),
            ..anonymous_config()
        };

        let err = S3Manager::new(&config).await.err().expect("config error");
        assert!(matches!(err, Error::Config(_)));
    }
}
