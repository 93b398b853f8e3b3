//! rstore-s3: S3 backend for rstore
//!
//! This crate wires aws-sdk-s3 into the pooled façade from rstore-core.
//! It is the only crate that depends on the AWS SDK.

mod client;
mod debug;

pub use client::{S3Manager, S3Session};
pub use debug::DebugInterceptor;

use rstore_core::{Result, StorageClient, StorageConfig};

/// Backend name reported by [`RemoteStorage::kind`](rstore_core::RemoteStorage::kind)
pub const KIND: &str = "S3";

/// Pooled S3 storage
pub type S3Storage = StorageClient<S3Manager>;

/// Validate the config, build the client pool and the direct client
pub async fn connect(config: &StorageConfig) -> Result<S3Storage> {
    config.validate()?;
    let manager = S3Manager::new(config).await?;
    StorageClient::connect(KIND, manager, config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstore_core::{Error, RemoteStorage};

    #[tokio::test]
    async fn test_connect_requires_bucket() {
        let err = connect(&StorageConfig::default()).await.err().expect("config error");
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_connect_builds_pool() {
        let config = StorageConfig {
            bucket: "backups".to_string(),
            path: "shadow".to_string(),
            endpoint: Some("http://127.0.0.1:9000".to_string()),
            client_pool_size: 3,
            ..Default::default()
        };

        let storage = connect(&config).await.unwrap();
        assert_eq!(storage.kind(), "S3");
        assert_eq!(storage.pool_status().max_size, 3);
        assert_eq!(storage.pool_status().live, 0);

        storage.close().await.unwrap();
        assert!(storage.pool_status().closed);
    }
}
