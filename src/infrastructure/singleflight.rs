//! Per-key deduplication of in-flight computations
//!
//! The first caller for a key starts the computation on its own task;
//! later callers for the same key wait for that result instead of
//! starting another. A caller that gives up waiting only detaches
//! itself, the computation keeps running for everyone else.
//!
//! Results are not cached: the key is released the moment the
//! computation finishes, before its result is handed out.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::debug;

use crate::domain::DomainError;
use crate::infrastructure::observability::record_singleflight_join;

type Slot<T> = Option<Result<T, DomainError>>;

struct Call<T> {
    result: watch::Sender<Slot<T>>,
    task: AbortHandle,
}

struct Inner<T> {
    calls: Mutex<HashMap<String, Call<T>>>,
    closed: AtomicBool,
}

impl<T> Inner<T> {
    fn calls(&self) -> MutexGuard<'_, HashMap<String, Call<T>>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Coalesces concurrent computations that share a key
pub struct Singleflight<T> {
    name: &'static str,
    inner: Arc<Inner<T>>,
}

impl<T> std::fmt::Debug for Singleflight<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Singleflight")
            .field("name", &self.name)
            .field("in_flight", &self.inner.calls().len())
            .finish()
    }
}

impl<T> Singleflight<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// `name` labels the join metric and log lines
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            inner: Arc::new(Inner {
                calls: Mutex::new(HashMap::new()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Run `compute` for `key`, or join the run already in flight
    ///
    /// Every caller attached to one run receives the same value or the
    /// same error. A panic inside `compute` surfaces as
    /// [`DomainError::ComputationFailed`].
    pub async fn run<F, Fut>(&self, key: &str, compute: F) -> Result<T, DomainError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, DomainError>> + Send + 'static,
    {
        let mut receiver = {
            let mut calls = self.inner.calls();

            if self.inner.closed.load(Ordering::SeqCst) {
                return Err(DomainError::Shutdown);
            }

            match calls.get(key) {
                Some(call) => {
                    debug!(coordinator = self.name, key, "Joining in-flight computation");
                    record_singleflight_join(self.name);
                    call.result.subscribe()
                }
                None => {
                    debug!(coordinator = self.name, key, "Leading computation");
                    let (sender, receiver) = watch::channel(None);
                    let task = self.spawn(key.to_string(), compute());
                    calls.insert(
                        key.to_string(),
                        Call {
                            result: sender,
                            task,
                        },
                    );
                    receiver
                }
            }
        };

        let slot = receiver
            .wait_for(Option::is_some)
            .await
            .map_err(|_| DomainError::computation_failed("computation abandoned"))?;

        match &*slot {
            Some(result) => result.clone(),
            None => Err(DomainError::internal("singleflight slot empty")),
        }
    }

    fn spawn<Fut>(&self, key: String, future: Fut) -> AbortHandle
    where
        Fut: Future<Output = Result<T, DomainError>> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);

        let handle = tokio::spawn(async move {
            let result = AssertUnwindSafe(future)
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(DomainError::computation_failed("computation panicked")));

            // Release the key first so callers arriving from here on start fresh
            let call = inner.calls().remove(&key);
            if let Some(call) = call {
                call.result.send_replace(Some(result));
            }
        });

        handle.abort_handle()
    }

    /// Number of keys with a computation in flight
    pub fn in_flight(&self) -> usize {
        self.inner.calls().len()
    }

    /// Fail every pending waiter with [`DomainError::Shutdown`], abort the
    /// running computations and reject further calls
    pub fn shutdown(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);

        let pending: Vec<(String, Call<T>)> = self.inner.calls().drain().collect();
        let count = pending.len();

        for (_, call) in pending {
            call.result.send_replace(Some(Err(DomainError::Shutdown)));
            call.task.abort();
        }

        if count > 0 {
            debug!(coordinator = self.name, count, "Flushed in-flight computations");
        }
    }
}
