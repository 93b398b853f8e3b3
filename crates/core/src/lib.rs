//! rstore-core: Core library for the rstore object-store client
//!
//! This crate provides:
//! - A bounded client pool with explicit release/invalidate discipline
//! - Key mapping between caller paths and backend keys
//! - The `RemoteStorage` capability trait and a generic pooled façade
//! - Configuration loading
//! - An in-memory backend for tests
//!
//! It does not depend on any cloud SDK; backend crates implement
//! `ObjectSession` and plug a `Manager` into `StorageClient`.

pub mod config;
pub mod error;
pub mod file;
pub mod keys;
pub mod memory;
pub mod pool;
pub mod storage;
pub mod traits;

pub use config::{ConfigManager, CredentialSource, StaticCredentials, StorageConfig};
pub use error::{Error, ErrorKind, Result};
pub use file::RemoteFile;
pub use keys::KeyMapper;
pub use memory::MemoryBackend;
pub use pool::{Manager, Pool, PoolConfig, PoolStatus, PooledHandle};
pub use storage::{COPY_BUFFER_SIZE, ListCursor, StorageClient};
pub use traits::{
    BoxReader, ListEntry, ListPage, ListQuery, ObjectAttrs, ObjectSession, ObjectWriter,
    RemoteStorage, WriteOptions,
};
