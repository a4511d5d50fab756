use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::BoxFuture;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::typed_fetch::{FetchError, FetchResult};

/// Snapshot exposed to consumers of a fetch-on-mount controller.
///
/// `loading` is true iff an operation has begun executing and has neither
/// resolved, failed, nor been cancelled. A cancelled outcome sets `aborted`,
/// never `error`.
#[derive(Debug, Clone)]
pub struct FetchState<T> {
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<FetchError>,
    pub aborted: bool,
}

impl<T> Default for FetchState<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
            aborted: false,
        }
    }
}

type FetchFactory<K, T> =
    dyn Fn(K, CancellationToken) -> BoxFuture<'static, FetchResult<T>> + Send + Sync;

struct Operation<K> {
    generation: u64,
    token: Option<CancellationToken>,
    last_key: Option<K>,
}

/// Controller owning at most one in-flight operation built from a factory
/// `(key, token) -> future`.
///
/// Starting a new operation cancels the previous token and bumps a
/// monotonically increasing generation; a completion may write state only
/// while its generation is still the current one. Stale responses are
/// therefore discarded no matter how late they arrive.
pub struct AbortableFetch<K, T> {
    factory: Box<FetchFactory<K, T>>,
    state: watch::Sender<FetchState<T>>,
    inner: Mutex<Operation<K>>,
}

impl<K, T> AbortableFetch<K, T>
where
    K: Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub fn new<F, Fut>(factory: F) -> Arc<Self>
    where
        F: Fn(K, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FetchResult<T>> + Send + 'static,
    {
        let (state, _) = watch::channel(FetchState::default());
        Arc::new(Self {
            factory: Box::new(move |key, token| Box::pin(factory(key, token))),
            state,
            inner: Mutex::new(Operation {
                generation: 0,
                token: None,
                last_key: None,
            }),
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<FetchState<T>> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> FetchState<T> {
        self.state.borrow().clone()
    }

    /// First activation or dependency-key change: supersedes any in-flight
    /// operation and starts a new one for `key`.
    pub fn load(self: &Arc<Self>, key: K) {
        let (generation, token) = {
            let mut op = self.lock_inner();
            if let Some(prev) = op.token.take() {
                prev.cancel();
            }
            op.generation += 1;
            op.last_key = Some(key.clone());
            let token = CancellationToken::new();
            op.token = Some(token.clone());
            // Published under the lock so a superseded load can never write
            // `loading=true` after the winner's terminal state.
            self.state.send_modify(|state| {
                state.loading = true;
                state.error = None;
                state.aborted = false;
            });
            (op.generation, token)
        };

        let this = Arc::clone(self);
        tokio::spawn(async move {
            let result = (this.factory)(key, token.clone()).await;
            this.apply(generation, &token, result);
        });
    }

    /// Re-runs the last `load` unconditionally. No-op before the first load.
    pub fn retry(self: &Arc<Self>) {
        let key = self.lock_inner().last_key.clone();
        if let Some(key) = key {
            self.load(key);
        }
    }

    /// Cancels the in-flight operation, if any, and surfaces the abort
    /// immediately without waiting for the transport to observe the token.
    pub fn cancel(&self) {
        let mut op = self.lock_inner();
        let Some(token) = op.token.take() else {
            return;
        };
        token.cancel();
        self.state.send_modify(|state| {
            state.aborted = true;
            state.loading = false;
        });
        debug!("fetch operation cancelled by caller");
    }

    /// Teardown: cancels without touching state. The generation bump turns
    /// any still-pending completion into a stale write, so nothing mutates
    /// state after shutdown.
    pub fn shutdown(&self) {
        let mut op = self.lock_inner();
        op.generation += 1;
        if let Some(token) = op.token.take() {
            token.cancel();
        }
    }

    fn apply(&self, generation: u64, token: &CancellationToken, result: FetchResult<T>) {
        // The lock is held across the generation check and the state write so
        // the check-then-act sequence is one atomic step.
        let op = self.lock_inner();
        if op.generation != generation {
            debug!(generation, "discarding superseded fetch result");
            return;
        }
        match result {
            Ok(data) if !token.is_cancelled() => self.state.send_modify(|state| {
                state.data = Some(data);
                state.loading = false;
            }),
            // Cancellation raced ahead of a settling future; the cancelled
            // branch wins and the result is discarded.
            Ok(_) => self.state.send_modify(|state| {
                state.aborted = true;
                state.loading = false;
            }),
            Err(err) if err.is_cancelled() || token.is_cancelled() => {
                self.state.send_modify(|state| {
                    state.aborted = true;
                    state.loading = false;
                })
            }
            Err(err) => self.state.send_modify(|state| {
                state.error = Some(err);
                state.loading = false;
            }),
        }
    }

    fn lock_inner(&self) -> MutexGuard<'_, Operation<K>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
