//! In-process object store
//!
//! Behaves like a prefix/delimiter object store: keys are flat, listings are
//! lexicographic and paginated, and "directories" exist only as common
//! prefixes. Failures can be injected per operation to exercise handle
//! invalidation.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::Cursor;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::Bytes;
use jiff::Timestamp;
use tokio::io::AsyncWrite;

use crate::error::{Error, Result};
use crate::pool::Manager;
use crate::traits::{
    BoxReader, ListEntry, ListPage, ListQuery, ObjectAttrs, ObjectSession, ObjectWriter,
    WriteOptions,
};

/// Operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Create,
    List,
    Read,
    Write,
    Finish,
    Attrs,
    Delete,
    Copy,
    Destroy,
}

/// A stored object
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Bytes,
    pub updated: Timestamp,
    pub storage_class: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Default)]
struct State {
    objects: BTreeMap<(String, String), StoredObject>,
    failures: HashMap<Op, usize>,
    handles_seen: Vec<u64>,
}

struct Shared {
    state: Mutex<State>,
    page_size: usize,
    next_id: AtomicU64,
    created: AtomicUsize,
    destroyed: AtomicUsize,
}

/// Pool manager handing out sessions over one shared in-memory store
#[derive(Clone)]
pub struct MemoryBackend {
    shared: Arc<Shared>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_page_size(1000)
    }

    /// Listings return at most `page_size` entries per page
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                page_size: page_size.max(1),
                next_id: AtomicU64::new(1),
                created: AtomicUsize::new(0),
                destroyed: AtomicUsize::new(0),
            }),
        }
    }

    /// Store an object directly
    pub fn insert(&self, bucket: &str, key: &str, data: impl Into<Bytes>) {
        self.shared.lock().objects.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                data: data.into(),
                updated: Timestamp::now(),
                storage_class: None,
                metadata: BTreeMap::new(),
            },
        );
    }

    pub fn get(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.shared
            .lock()
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// All keys in `bucket`, sorted
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.shared
            .lock()
            .objects
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect()
    }

    /// Make the next `times` calls of `op` fail with a transport error
    pub fn fail_next(&self, op: Op, times: usize) {
        *self.shared.lock().failures.entry(op).or_default() += times;
    }

    /// Handles created so far
    pub fn created(&self) -> usize {
        self.shared.created.load(Ordering::SeqCst)
    }

    /// Handles destroyed so far
    pub fn destroyed(&self) -> usize {
        self.shared.destroyed.load(Ordering::SeqCst)
    }

    /// Ids of the sessions that served calls, in call order
    pub fn handles_seen(&self) -> Vec<u64> {
        self.shared.lock().handles_seen.clone()
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the call and consume an injected failure, if any
    fn take_failure(&self, op: Op) -> bool {
        let mut state = self.lock();
        match state.failures.get_mut(&op) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }

    fn enter(&self, session: u64, op: Op) -> Result<()> {
        self.lock().handles_seen.push(session);
        if self.take_failure(op) {
            return Err(Error::Transport(format!("injected {op:?} failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl Manager for MemoryBackend {
    type Handle = MemorySession;

    async fn create(&self) -> Result<MemorySession> {
        if self.shared.take_failure(Op::Create) {
            return Err(Error::ConnectFailed("injected Create failure".to_string()));
        }
        self.shared.created.fetch_add(1, Ordering::SeqCst);
        Ok(MemorySession {
            id: self.shared.next_id.fetch_add(1, Ordering::SeqCst),
            shared: Arc::clone(&self.shared),
        })
    }

    async fn destroy(&self, _handle: MemorySession) -> Result<()> {
        self.shared.destroyed.fetch_add(1, Ordering::SeqCst);
        if self.shared.take_failure(Op::Destroy) {
            return Err(Error::Transport("injected Destroy failure".to_string()));
        }
        Ok(())
    }
}

/// One client of a [`MemoryBackend`]
pub struct MemorySession {
    id: u64,
    shared: Arc<Shared>,
}

impl MemorySession {
    pub fn id(&self) -> u64 {
        self.id
    }
}

#[async_trait]
impl ObjectSession for MemorySession {
    async fn list(&self, query: &ListQuery) -> Result<ListPage> {
        self.shared.enter(self.id, Op::List)?;
        let state = self.shared.lock();

        let after = query.continuation_token.as_deref();
        let mut seen_prefixes = BTreeSet::new();
        let mut entries = Vec::new();
        let mut next_token = None;

        let matching = state
            .objects
            .iter()
            .filter(|((bucket, key), _)| bucket == &query.bucket && key.starts_with(&query.prefix));

        for ((_, key), object) in matching {
            let entry = match query.delimiter.as_deref() {
                Some(delimiter) => {
                    let rest = &key[query.prefix.len()..];
                    match rest.find(delimiter) {
                        Some(idx) => {
                            let prefix = &key[..query.prefix.len() + idx + delimiter.len()];
                            if !seen_prefixes.insert(prefix.to_string()) {
                                continue;
                            }
                            ListEntry::Prefix(prefix.to_string())
                        }
                        None => object_entry(key, object),
                    }
                }
                None => object_entry(key, object),
            };

            if after.is_some_and(|token| entry.key() <= token) {
                continue;
            }
            if entries.len() == self.shared.page_size {
                next_token = entries.last().map(|e: &ListEntry| e.key().to_string());
                break;
            }
            entries.push(entry);
        }

        Ok(ListPage {
            entries,
            next_token,
        })
    }

    async fn open_reader(&self, bucket: &str, key: &str) -> Result<BoxReader> {
        self.shared.enter(self.id, Op::Read)?;
        let data = self
            .shared
            .lock()
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|o| o.data.clone())
            .ok_or_else(|| Error::NotFound(format!("{bucket}/{key}")))?;
        Ok(Box::pin(Cursor::new(data)))
    }

    async fn open_writer(
        &self,
        bucket: &str,
        key: &str,
        options: &WriteOptions,
    ) -> Result<Box<dyn ObjectWriter>> {
        self.shared.enter(self.id, Op::Write)?;
        Ok(Box::new(MemoryWriter {
            session: self.id,
            shared: Arc::clone(&self.shared),
            bucket: bucket.to_string(),
            key: key.to_string(),
            options: options.clone(),
            buffer: Vec::new(),
        }))
    }

    async fn attrs(&self, bucket: &str, key: &str) -> Result<ObjectAttrs> {
        self.shared.enter(self.id, Op::Attrs)?;
        self.shared
            .lock()
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|object| ObjectAttrs {
                key: key.to_string(),
                size: object.data.len() as u64,
                updated: Some(object.updated),
            })
            .ok_or_else(|| Error::NotFound(format!("{bucket}/{key}")))
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        self.shared.enter(self.id, Op::Delete)?;
        self.shared
            .lock()
            .objects
            .remove(&(bucket.to_string(), key.to_string()))
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("{bucket}/{key}")))
    }

    async fn copy(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> Result<()> {
        self.shared.enter(self.id, Op::Copy)?;
        let mut state = self.shared.lock();
        let mut object = state
            .objects
            .get(&(src_bucket.to_string(), src_key.to_string()))
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("{src_bucket}/{src_key}")))?;
        object.updated = Timestamp::now();
        state
            .objects
            .insert((dst_bucket.to_string(), dst_key.to_string()), object);
        Ok(())
    }
}

fn object_entry(key: &str, object: &StoredObject) -> ListEntry {
    ListEntry::Object(ObjectAttrs {
        key: key.to_string(),
        size: object.data.len() as u64,
        updated: Some(object.updated),
    })
}

/// Buffers the upload and stores it on finish
struct MemoryWriter {
    session: u64,
    shared: Arc<Shared>,
    bucket: String,
    key: String,
    options: WriteOptions,
    buffer: Vec<u8>,
}

impl AsyncWrite for MemoryWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        self.buffer.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[async_trait]
impl ObjectWriter for MemoryWriter {
    async fn finish(&mut self) -> Result<()> {
        self.shared
            .enter(self.session, Op::Finish)
            .map_err(|e| Error::WriteFinalization {
                key: self.key.clone(),
                message: e.to_string(),
            })?;

        let object = StoredObject {
            data: Bytes::from(std::mem::take(&mut self.buffer)),
            updated: Timestamp::now(),
            storage_class: self.options.storage_class.clone(),
            metadata: self.options.metadata.clone(),
        };
        self.shared
            .lock()
            .objects
            .insert((self.bucket.clone(), self.key.clone()), object);
        Ok(())
    }
}
