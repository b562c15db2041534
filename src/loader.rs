use crate::{config::LoaderConfig, key::ModuleKey};

use anyhow::Result;
use async_trait::async_trait;
use std::{
    any::Any,
    fmt,
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};
use tokio::sync::{oneshot, OnceCell};

pub use lazymod_macros::IntoLoader;

pub trait UnitReqs: Any + Send + Sync + 'static {}
impl<T: Any + Send + Sync + 'static> UnitReqs for T {}

/// Asynchronously produces one unit. Errors are treated as transient.
#[async_trait]
pub trait Resolver: Send + Sync + 'static {
    type Output: UnitReqs;

    async fn resolve(&self) -> Result<Self::Output>;
}

/// Adapts a closure returning a future into a [`Resolver`].
pub struct FnResolver<F>(F);

pub fn resolver_fn<F, Fut, T>(f: F) -> FnResolver<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
    T: UnitReqs,
{
    FnResolver(f)
}

#[async_trait]
impl<F, Fut, T> Resolver for FnResolver<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
    T: UnitReqs,
{
    type Output = T;

    async fn resolve(&self) -> Result<T> {
        (self.0)().await
    }
}

pub(crate) type BoxedFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Type-erased view of a [`Loader`], so loaders of different unit types can share a registry.
pub(crate) trait LoaderObj: Send + Sync {
    fn key(&self) -> &ModuleKey;
    fn unit_type_name(&self) -> &'static str;
    fn preload_boxed(self: Arc<Self>) -> BoxedFuture<()>;
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: UnitReqs> LoaderObj for Loader<T> {
    fn key(&self) -> &ModuleKey {
        &self.key
    }

    fn unit_type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn preload_boxed(self: Arc<Self>) -> BoxedFuture<()> {
        Box::pin(async move {
            self.resolve().await;
        })
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Resolves one keyed unit on first request and keeps it for the life of the loader.
///
/// Failed attempts are retried after a constant delay, without limit, and are never
/// reported to callers. Concurrent first callers share one in-flight attempt.
pub struct Loader<T: UnitReqs> {
    key: ModuleKey,
    resolver: Box<dyn Resolver<Output = T>>,
    config: LoaderConfig,
    resolved: OnceCell<Arc<T>>,
    attempts: AtomicUsize,
    failed_attempts: AtomicUsize,
    driving: AtomicBool,
    pub debug_name: &'static str,
}

impl<T: UnitReqs> fmt::Debug for Loader<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loader")
            .field("key", &self.key)
            .field("debug_name", &self.debug_name)
            .field("resolved", &self.is_resolved())
            .field("attempts", &self.attempts())
            .finish()
    }
}

impl<T: UnitReqs> Loader<T> {
    pub fn new<R>(key: impl Into<ModuleKey>, resolver: R) -> Self
    where
        R: Resolver<Output = T>,
    {
        Self::with_config(key, resolver, LoaderConfig::default())
    }

    pub fn with_config<R>(key: impl Into<ModuleKey>, resolver: R, config: LoaderConfig) -> Self
    where
        R: Resolver<Output = T>,
    {
        Self {
            key: key.into(),
            resolver: Box::new(resolver),
            config,
            resolved: OnceCell::new(),
            attempts: AtomicUsize::new(0),
            failed_attempts: AtomicUsize::new(0),
            driving: AtomicBool::new(false),
            debug_name: std::any::type_name::<R>(),
        }
    }

    pub fn key(&self) -> &ModuleKey {
        &self.key
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Number of times the resolver has been called.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Number of resolver calls that failed and were scheduled for a retry.
    pub fn failed_attempts(&self) -> usize {
        self.failed_attempts.load(Ordering::Relaxed)
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.initialized()
    }

    /// Synchronous peek at the cache. `None` until the first successful resolution.
    pub fn currently_resolved(&self) -> Option<Arc<T>> {
        self.resolved.get().cloned()
    }

    /// Returns the cached unit, resolving it first if needed.
    ///
    /// Never fails: if the resolver keeps failing, the returned future stays pending.
    /// Retry waits use the tokio timer, so a failing resolver must be driven inside
    /// a tokio runtime. A cache hit or a first-time success needs no runtime.
    pub async fn resolve(&self) -> Arc<T> {
        self.resolved
            .get_or_init(|| self.resolve_with_retry())
            .await
            .clone()
    }

    async fn resolve_with_retry(&self) -> Arc<T> {
        log::debug!("Resolving {} ({})", self.key, self.debug_name);

        loop {
            self.attempts.fetch_add(1, Ordering::Relaxed);

            match self.resolver.resolve().await {
                Ok(unit) => {
                    log::debug!("Resolved {} after {} attempt(s)", self.key, self.attempts());
                    return Arc::new(unit);
                }
                Err(err) => {
                    self.failed_attempts.fetch_add(1, Ordering::Relaxed);
                    log::info!(
                        "Could not load {} ({:#}), retrying in {:?}",
                        self.key,
                        err,
                        self.config.retry_delay
                    );
                    tokio::time::sleep(self.config.retry_delay).await;
                }
            }
        }
    }

    /// Starts resolution in the background and returns a handle to its outcome.
    ///
    /// At most one task drives the resolver per loader. Each subscription adds a
    /// waiter task that exits as soon as the subscription is revoked.
    ///
    /// Needs a tokio runtime unless the unit is already cached.
    pub fn subscribe(self: Arc<Self>) -> Subscription<T> {
        let (mut sender, receiver) = oneshot::channel();

        if let Some(unit) = self.currently_resolved() {
            let _ = sender.send(unit);
            return Subscription { receiver };
        }

        if !self.driving.swap(true, Ordering::AcqRel) {
            let driver = self.clone();
            tokio::task::spawn(async move {
                driver.resolve().await;
            });
        }

        tokio::task::spawn(async move {
            let unit = tokio::select! {
                unit = self.resolve() => unit,
                _ = sender.closed() => return,
            };
            let _ = sender.send(unit);
        });

        Subscription { receiver }
    }
}

/// One holder's interest in the outcome of a [`Loader`].
///
/// Revoking it only stops delivery to this holder; resolution and caching go on.
pub struct Subscription<T: UnitReqs> {
    receiver: oneshot::Receiver<Arc<T>>,
}

impl<T: UnitReqs> Subscription<T> {
    /// Non-blocking check for a settled result.
    pub fn try_take(&mut self) -> Option<Arc<T>> {
        self.receiver.try_recv().ok()
    }

    /// Waits for the result. `None` if the background task was torn down first.
    pub async fn settled(self) -> Option<Arc<T>> {
        self.receiver.await.ok()
    }

    pub fn revoke(mut self) {
        self.receiver.close();
    }
}

/// A [`Resolver`] that knows its own module key.
///
/// Usually derived with `#[derive(IntoLoader)]`.
pub trait IntoLoader: Resolver + Sized {
    fn module_key(&self) -> ModuleKey;

    fn into_loader(self) -> Loader<<Self as Resolver>::Output> {
        self.into_loader_with(LoaderConfig::default())
    }

    fn into_loader_with(self, config: LoaderConfig) -> Loader<<Self as Resolver>::Output> {
        Loader::with_config(self.module_key(), self, config)
    }
}
