//! Bounded pool of backend client handles
//!
//! Slots are semaphore permits: a borrower holds one permit for as long as it
//! owns a handle, and idle handles sit in a vector. A handle is created only
//! when a permit is held and no idle handle is left, so `idle + borrowed`
//! never exceeds `max_size`.
//!
//! Health is never probed. The borrower knows whether the backend call it
//! made succeeded, so it either [`release`](PooledHandle::release)s the
//! handle or [`invalidate`](PooledHandle::invalidate)s it. A handle dropped
//! without either (e.g. the operation future was cancelled) is destroyed.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{Error, Result};

/// Factory, teardown and validation hooks for pooled handles
#[async_trait]
pub trait Manager: Send + Sync + 'static {
    type Handle: Send + 'static;

    /// Create a new ready-to-use handle
    async fn create(&self) -> Result<Self::Handle>;

    /// Tear down a handle that leaves the pool for good
    async fn destroy(&self, handle: Self::Handle) -> Result<()>;

    /// Checked before an idle handle is lent out again
    fn validate(&self, _handle: &Self::Handle) -> bool {
        true
    }
}

/// Pool sizing and waiting policy
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of live (idle + borrowed) handles
    pub max_size: usize,
    /// How long `acquire` waits for a free slot; `None` waits until the
    /// caller drops the future or the pool closes
    pub wait_timeout: Option<Duration>,
}

impl PoolConfig {
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            wait_timeout: None,
        }
    }

    pub fn wait_timeout(mut self, wait: Duration) -> Self {
        self.wait_timeout = Some(wait);
        self
    }
}

/// Snapshot of pool accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub max_size: usize,
    pub live: usize,
    pub idle: usize,
    pub closed: bool,
}

/// Bounded pool; cheap to clone, clones share the same slots
pub struct Pool<M: Manager> {
    inner: Arc<PoolInner<M>>,
}

impl<M: Manager> Clone for Pool<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct PoolInner<M: Manager> {
    manager: M,
    config: PoolConfig,
    slots: Arc<Semaphore>,
    idle: Mutex<Vec<M::Handle>>,
    live: AtomicUsize,
    closed: AtomicBool,
}

impl<M: Manager> Pool<M> {
    pub fn new(manager: M, config: PoolConfig) -> Result<Self> {
        if config.max_size == 0 {
            return Err(Error::Config("pool max_size must be at least 1".to_string()));
        }

        Ok(Self {
            inner: Arc::new(PoolInner {
                manager,
                slots: Arc::new(Semaphore::new(config.max_size)),
                idle: Mutex::new(Vec::with_capacity(config.max_size)),
                live: AtomicUsize::new(0),
                closed: AtomicBool::new(false),
                config,
            }),
        })
    }

    pub fn manager(&self) -> &M {
        &self.inner.manager
    }

    /// Borrow a handle, reusing an idle one or creating a new one
    pub async fn acquire(&self) -> Result<PooledHandle<M>> {
        if self.is_closed() {
            return Err(Error::PoolClosed);
        }

        let slots = Arc::clone(&self.inner.slots);
        let permit = match self.inner.config.wait_timeout {
            Some(wait) => tokio::time::timeout(wait, slots.acquire_owned())
                .await
                .map_err(|_| {
                    Error::PoolExhausted(format!(
                        "no client available within {}ms (max {})",
                        wait.as_millis(),
                        self.inner.config.max_size
                    ))
                })?,
            None => slots.acquire_owned().await,
        }
        .map_err(|_| Error::PoolClosed)?;

        if self.is_closed() {
            return Err(Error::PoolClosed);
        }

        while let Some(handle) = self.inner.pop_idle() {
            if self.inner.manager.validate(&handle) {
                return Ok(PooledHandle::new(Arc::clone(&self.inner), handle, permit));
            }
            tracing::debug!("discarding idle client that failed validation");
            self.inner.destroy(handle).await;
        }

        let handle = self.inner.manager.create().await.map_err(|e| match e {
            Error::ConnectFailed(_) => e,
            other => Error::ConnectFailed(other.to_string()),
        })?;
        let live = self.inner.live.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(live, max = self.inner.config.max_size, "created pooled client");

        Ok(PooledHandle::new(Arc::clone(&self.inner), handle, permit))
    }

    /// Destroy idle handles and refuse further acquisition
    ///
    /// Waiters fail with [`Error::PoolClosed`]. Handles still borrowed are
    /// destroyed when they are released or invalidated.
    pub async fn close(&self) {
        let drained = {
            let mut idle = self.inner.lock_idle();
            self.inner.closed.store(true, Ordering::SeqCst);
            std::mem::take(&mut *idle)
        };
        self.inner.slots.close();

        for handle in drained {
            self.inner.destroy(handle).await;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            max_size: self.inner.config.max_size,
            live: self.inner.live.load(Ordering::SeqCst),
            idle: self.inner.lock_idle().len(),
            closed: self.is_closed(),
        }
    }
}

impl<M: Manager> PoolInner<M> {
    fn lock_idle(&self) -> MutexGuard<'_, Vec<M::Handle>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pop_idle(&self) -> Option<M::Handle> {
        self.lock_idle().pop()
    }

    fn put_back(self: &Arc<Self>, handle: M::Handle, permit: Option<OwnedSemaphorePermit>) {
        {
            let mut idle = self.lock_idle();
            if !self.closed.load(Ordering::SeqCst) {
                idle.push(handle);
                return;
            }
        }
        self.destroy_detached(handle, permit);
    }

    async fn destroy(&self, handle: M::Handle) {
        self.live.fetch_sub(1, Ordering::SeqCst);
        if let Err(e) = self.manager.destroy(handle).await {
            tracing::warn!(error = %e, "failed to destroy pooled client");
        }
    }

    /// Destroy from a synchronous context (drop, release after close)
    ///
    /// The slot stays taken until the handle is gone.
    fn destroy_detached(self: &Arc<Self>, handle: M::Handle, permit: Option<OwnedSemaphorePermit>) {
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let pool = Arc::clone(self);
                runtime.spawn(async move {
                    pool.destroy(handle).await;
                    drop(permit);
                });
            }
            Err(_) => {
                self.live.fetch_sub(1, Ordering::SeqCst);
                drop(handle);
                drop(permit);
            }
        }
    }
}

/// A handle borrowed from a [`Pool`]
///
/// Holds a pool slot until released, invalidated or dropped.
pub struct PooledHandle<M: Manager> {
    pool: Arc<PoolInner<M>>,
    handle: Option<M::Handle>,
    permit: Option<OwnedSemaphorePermit>,
}

impl<M: Manager> PooledHandle<M> {
    fn new(pool: Arc<PoolInner<M>>, handle: M::Handle, permit: OwnedSemaphorePermit) -> Self {
        Self {
            pool,
            handle: Some(handle),
            permit: Some(permit),
        }
    }

    /// Return a healthy handle to the idle set
    pub fn release(mut self) {
        if let Some(handle) = self.handle.take() {
            self.pool.put_back(handle, self.permit.take());
        }
    }

    /// Destroy a handle implicated in a failure and free its slot
    pub async fn invalidate(mut self) {
        if let Some(handle) = self.handle.take() {
            self.pool.destroy(handle).await;
        }
    }
}

impl<M: Manager> Deref for PooledHandle<M> {
    type Target = M::Handle;

    fn deref(&self) -> &Self::Target {
        self.handle.as_ref().expect("handle is present until released")
    }
}

impl<M: Manager> DerefMut for PooledHandle<M> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.handle.as_mut().expect("handle is present until released")
    }
}

impl<M: Manager> Drop for PooledHandle<M> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            tracing::debug!("pooled client dropped while borrowed, destroying it");
            self.pool.destroy_detached(handle, self.permit.take());
        }
    }
}
