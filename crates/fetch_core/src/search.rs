use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::typed_fetch::{FetchError, FetchResult};

/// Executor-level debounce default; UI layers normally pass their own.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Snapshot exposed to consumers of the debounced search controller.
#[derive(Debug, Clone)]
pub struct SearchState<R> {
    pub query: String,
    pub results: Option<R>,
    pub loading: bool,
    pub error: Option<FetchError>,
    pub aborted: bool,
}

impl<R> Default for SearchState<R> {
    fn default() -> Self {
        Self {
            query: String::new(),
            results: None,
            loading: false,
            error: None,
            aborted: false,
        }
    }
}

/// Lifecycle counters for dispatched searches. An operation is `issued` once
/// its debounce window elapses; it is then counted `completed` on success or
/// `cancelled` when superseded or aborted. An operation that fails with a
/// genuine error counts in neither, as do searches cancelled while still
/// inside the debounce window (those are never issued at all).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SearchMetrics {
    pub issued: u64,
    pub completed: u64,
    pub cancelled: u64,
}

type SearchFn<R> =
    dyn Fn(String, CancellationToken) -> BoxFuture<'static, FetchResult<R>> + Send + Sync;

/// Side-effect hook fired on a manual `cancel()`, kept apart from the pure
/// state transition so hosts can relocate or drop the notification.
pub type CancelNotifier = Box<dyn Fn() + Send + Sync>;

struct Operation {
    generation: u64,
    token: Option<CancellationToken>,
}

/// Debounced, cancellable search controller.
///
/// Every query change supersedes the previous operation (cancelling both a
/// pending debounce timer and an in-flight request) before scheduling its
/// own. Result application is generation-guarded exactly like
/// [`AbortableFetch`](crate::AbortableFetch), so out-of-order arrivals can
/// never flash a stale result.
pub struct AbortableSearch<R> {
    search: Box<SearchFn<R>>,
    state: watch::Sender<SearchState<R>>,
    inner: Mutex<Operation>,
    debounce: Duration,
    on_cancel: Option<CancelNotifier>,
    issued: AtomicU64,
    completed: AtomicU64,
    cancelled: AtomicU64,
}

impl<R> AbortableSearch<R>
where
    R: Clone + Send + Sync + 'static,
{
    pub fn new<F, Fut>(search: F) -> Arc<Self>
    where
        F: Fn(String, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FetchResult<R>> + Send + 'static,
    {
        Self::new_with_dependencies(search, DEFAULT_DEBOUNCE, None)
    }

    pub fn new_with_debounce<F, Fut>(search: F, debounce: Duration) -> Arc<Self>
    where
        F: Fn(String, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FetchResult<R>> + Send + 'static,
    {
        Self::new_with_dependencies(search, debounce, None)
    }

    pub fn new_with_dependencies<F, Fut>(
        search: F,
        debounce: Duration,
        on_cancel: Option<CancelNotifier>,
    ) -> Arc<Self>
    where
        F: Fn(String, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FetchResult<R>> + Send + 'static,
    {
        let (state, _) = watch::channel(SearchState::default());
        Arc::new(Self {
            search: Box::new(move |query, token| Box::pin(search(query, token))),
            state,
            inner: Mutex::new(Operation {
                generation: 0,
                token: None,
            }),
            debounce,
            on_cancel,
            issued: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            cancelled: AtomicU64::new(0),
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchState<R>> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> SearchState<R> {
        self.state.borrow().clone()
    }

    pub fn metrics(&self) -> SearchMetrics {
        SearchMetrics {
            issued: self.issued.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
        }
    }

    /// Echoes the query text into state immediately, then schedules the
    /// debounced search for it.
    pub fn set_query(self: &Arc<Self>, query: impl Into<String>) {
        let query = query.into();
        self.state.send_modify(|state| state.query = query.clone());
        self.perform_search(query);
    }

    fn perform_search(self: &Arc<Self>, query: String) {
        let (generation, token) = {
            let mut op = self.lock_inner();
            if let Some(prev) = op.token.take() {
                // Supersedes both an in-flight request and a pending timer.
                prev.cancel();
            }
            op.generation += 1;
            if query.trim().is_empty() {
                // An empty query is never searched; drop straight to idle.
                self.state.send_modify(|state| {
                    state.results = None;
                    state.loading = false;
                    state.error = None;
                    state.aborted = false;
                });
                return;
            }
            let token = CancellationToken::new();
            op.token = Some(token.clone());
            (op.generation, token)
        };

        let this = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!(%query, "search superseded during debounce window");
                    return;
                }
                _ = tokio::time::sleep(this.debounce) => {}
            }
            if !this.begin(generation, &token) {
                return;
            }
            let result = (this.search)(query, token.clone()).await;
            this.apply(generation, &token, result);
        });
    }

    /// Cancels the active operation and any pending debounce timer; the
    /// abort is surfaced synchronously, before the transport observes it.
    pub fn cancel(&self) {
        {
            let mut op = self.lock_inner();
            let Some(token) = op.token.take() else {
                return;
            };
            token.cancel();
            self.state.send_modify(|state| {
                state.aborted = true;
                state.loading = false;
            });
        }
        debug!("search cancelled by caller");
        if let Some(notify) = &self.on_cancel {
            notify();
        }
    }

    /// Teardown: cancels without touching state; the generation bump keeps
    /// late completions from ever writing again.
    pub fn shutdown(&self) {
        let mut op = self.lock_inner();
        op.generation += 1;
        if let Some(token) = op.token.take() {
            token.cancel();
        }
    }

    fn begin(&self, generation: u64, token: &CancellationToken) -> bool {
        let op = self.lock_inner();
        if op.generation != generation || token.is_cancelled() {
            return false;
        }
        self.issued.fetch_add(1, Ordering::Relaxed);
        self.state.send_modify(|state| {
            state.loading = true;
            state.error = None;
            state.aborted = false;
        });
        true
    }

    fn apply(&self, generation: u64, token: &CancellationToken, result: FetchResult<R>) {
        let op = self.lock_inner();
        if op.generation != generation {
            self.cancelled.fetch_add(1, Ordering::Relaxed);
            debug!(generation, "discarding superseded search result");
            return;
        }
        match result {
            Ok(results) if !token.is_cancelled() => {
                self.completed.fetch_add(1, Ordering::Relaxed);
                self.state.send_modify(|state| {
                    state.results = Some(results);
                    state.loading = false;
                });
            }
            Ok(_) => {
                self.cancelled.fetch_add(1, Ordering::Relaxed);
                self.state.send_modify(|state| {
                    state.aborted = true;
                    state.loading = false;
                });
            }
            Err(err) if err.is_cancelled() || token.is_cancelled() => {
                self.cancelled.fetch_add(1, Ordering::Relaxed);
                self.state.send_modify(|state| {
                    state.aborted = true;
                    state.loading = false;
                });
            }
            Err(err) => self.state.send_modify(|state| {
                state.error = Some(err);
                state.loading = false;
            }),
        }
    }

    fn lock_inner(&self) -> MutexGuard<'_, Operation> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
