//! Session-scoped resolution cache.
//!
//! Each key maps to exactly one shared future. The first `resolve` of a key
//! runs its registered factory; every other `resolve` of that key, concurrent
//! or later, awaits the same future and observes the same outcome. Failures
//! are stored like successes and are never retried.
//!
//! A factory runs on its own tokio task once started, so it completes even
//! when every caller waiting on it has gone away.
//!
//! A factory receives a [`Resolver`] that remembers which keys are being
//! resolved on its chain, so a task that (transitively) asks for itself fails
//! with [`DeployError::CyclicDependency`] instead of waiting on itself. Two
//! chains started independently that wait on each other are not detected and
//! never complete.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{self, BoxFuture, FutureExt, Shared};
use tokio::runtime::Handle;
use tracing::{debug, error, info};

use crate::error::{DeployError, Result};

pub trait CacheKey: Clone + Eq + Hash + Display + Send + Sync + 'static {}

impl<T> CacheKey for T where T: Clone + Eq + Hash + Display + Send + Sync + 'static {}

pub trait CacheValue: Clone + Send + Sync + 'static {}

impl<T> CacheValue for T where T: Clone + Send + Sync + 'static {}

type TaskFuture<V> = BoxFuture<'static, Result<V>>;
type Factory<K, V> = Arc<dyn Fn(Resolver<K, V>) -> TaskFuture<V> + Send + Sync>;
type Pending<V> = Shared<TaskFuture<V>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionState {
    Pending,
    Resolved,
    Failed,
}

struct Inner<K, V> {
    // Lock order: `entries` before `factories` before `settled`.
    entries: Mutex<HashMap<K, Pending<V>>>,
    factories: Mutex<HashMap<K, Factory<K, V>>>,
    settled: Mutex<HashMap<K, ResolutionState>>,
}

pub struct ResolutionCache<K, V> {
    inner: Arc<Inner<K, V>>,
}

impl<K, V> Clone for ResolutionCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: CacheKey, V: CacheValue> Default for ResolutionCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: CacheKey, V: CacheValue> ResolutionCache<K, V> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(HashMap::new()),
                factories: Mutex::new(HashMap::new()),
                settled: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Registers the factory that produces the value for `key`.
    pub fn register<F, Fut>(&self, key: K, factory: F) -> Result<()>
    where
        F: Fn(Resolver<K, V>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let entries = lock(&self.inner.entries);
        let mut factories = lock(&self.inner.factories);
        if entries.contains_key(&key) || factories.contains_key(&key) {
            return Err(DeployError::AlreadyRegistered {
                task: key.to_string(),
            });
        }
        let factory: Factory<K, V> = Arc::new(move |resolver| factory(resolver).boxed());
        factories.insert(key, factory);
        Ok(())
    }

    /// Registers an already known value for `key`.
    pub fn register_value(&self, key: K, value: V) -> Result<()> {
        let mut entries = lock(&self.inner.entries);
        let factories = lock(&self.inner.factories);
        if entries.contains_key(&key) || factories.contains_key(&key) {
            return Err(DeployError::AlreadyRegistered {
                task: key.to_string(),
            });
        }
        lock(&self.inner.settled).insert(key.clone(), ResolutionState::Resolved);
        entries.insert(key, future::ready(Ok(value)).boxed().shared());
        Ok(())
    }

    pub fn is_registered(&self, key: &K) -> bool {
        let entries = lock(&self.inner.entries);
        entries.contains_key(key) || lock(&self.inner.factories).contains_key(key)
    }

    /// A resolver at the root of a resolution chain.
    pub fn resolver(&self) -> Resolver<K, V> {
        Resolver {
            cache: self.clone(),
            chain: Arc::new(Vec::new()),
        }
    }

    pub async fn resolve(&self, key: K) -> Result<V> {
        self.resolver().resolve(key).await
    }

    /// `None` until `key` has been requested or given a value.
    pub fn state(&self, key: &K) -> Option<ResolutionState> {
        let entries = lock(&self.inner.entries);
        if !entries.contains_key(key) {
            return None;
        }
        let settled = lock(&self.inner.settled).get(key).copied();
        Some(settled.unwrap_or(ResolutionState::Pending))
    }

    fn settle(&self, key: K, state: ResolutionState) {
        lock(&self.inner.settled).insert(key, state);
    }

    /// Returns the shared future for `key`, creating it on first use.
    fn entry(&self, key: &K, chain: &[K]) -> Result<Pending<V>> {
        let mut entries = lock(&self.inner.entries);
        match entries.entry(key.clone()) {
            Entry::Occupied(existing) => {
                debug!(task = %key, "joining existing resolution");
                Ok(existing.get().clone())
            }
            Entry::Vacant(vacant) => {
                let factory = lock(&self.inner.factories)
                    .get(key)
                    .cloned()
                    .ok_or_else(|| DeployError::UnknownTask {
                        task: key.to_string(),
                    })?;
                let mut path = chain.to_vec();
                path.push(key.clone());
                let resolver = Resolver {
                    cache: self.clone(),
                    chain: Arc::new(path),
                };
                let runtime = Handle::try_current().map_err(|e| DeployError::Runtime(e.to_string()))?;
                let task = key.to_string();
                let cache = self.clone();
                let key = key.clone();
                let run = async move {
                    debug!(%task, "running factory");
                    match factory(resolver).await {
                        Ok(value) => {
                            info!(%task, "resolved");
                            cache.settle(key, ResolutionState::Resolved);
                            Ok(value)
                        }
                        Err(source) => {
                            if matches!(source, DeployError::TaskResolutionFailure { .. }) {
                                debug!(%task, "dependency failed");
                            } else {
                                error!(%task, error = %source, "task failed");
                            }
                            cache.settle(key, ResolutionState::Failed);
                            Err(DeployError::TaskResolutionFailure {
                                task,
                                source: Box::new(source),
                            })
                        }
                    }
                };
                let handle = runtime.spawn(run);
                let task = vacant.key().to_string();
                let failed_key = vacant.key().clone();
                let cache = self.clone();
                let pending = async move {
                    match handle.await {
                        Ok(outcome) => outcome,
                        Err(join_error) => {
                            error!(%task, error = %join_error, "task did not finish");
                            cache.settle(failed_key, ResolutionState::Failed);
                            Err(DeployError::TaskResolutionFailure {
                                task,
                                source: Box::new(DeployError::Runtime(join_error.to_string())),
                            })
                        }
                    }
                }
                .boxed()
                .shared();
                Ok(vacant.insert(pending).clone())
            }
        }
    }
}

/// Handle given to factories for resolving their dependencies.
pub struct Resolver<K, V> {
    cache: ResolutionCache<K, V>,
    chain: Arc<Vec<K>>,
}

impl<K, V> Clone for Resolver<K, V> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            chain: Arc::clone(&self.chain),
        }
    }
}

impl<K: CacheKey, V: CacheValue> Resolver<K, V> {
    pub async fn resolve(&self, key: K) -> Result<V> {
        if let Some(start) = self.chain.iter().position(|k| *k == key) {
            let mut path: Vec<String> = self.chain[start..].iter().map(ToString::to_string).collect();
            path.push(key.to_string());
            return Err(DeployError::CyclicDependency { path });
        }
        let pending = self.cache.entry(&key, &self.chain)?;
        pending.await
    }

    /// Keys currently being resolved on this chain, outermost first.
    pub fn chain(&self) -> &[K] {
        &self.chain
    }

    pub fn cache(&self) -> &ResolutionCache<K, V> {
        &self.cache
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
