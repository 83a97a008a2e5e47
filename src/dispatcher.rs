//! Bounded request dispatcher
//!
//! Every outbound call is submitted here. Submissions join a FIFO waiting
//! list; at most `max_concurrent` of them run at once. When one settles the
//! slot is released, the caller receives the outcome, and the next admission
//! attempt is scheduled `drain_delay` later instead of refilling the window
//! immediately, which smooths out bursts of UI-driven reads.
//!
//! There is no priority, cancellation or timeout at this layer. A producer
//! that never settles keeps its slot; bounding that is the transport's job.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use brainquiz_client::dispatcher::RequestDispatcher;
//!
//! # tokio_test::block_on(async {
//! let dispatcher = RequestDispatcher::with_limits(3, Duration::from_millis(100));
//! let answer = dispatcher.submit(|| async { Ok(42) }).await.unwrap();
//! assert_eq!(answer, 42);
//! # });
//! ```

use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::config::DispatcherConfig;
use crate::{Error, Result};

/// Hands the outcome to the waiting caller; returns whether it was a success.
type Deliver = Box<dyn FnOnce() -> bool + Send>;

/// Deferred unit of work: runs the producer and yields the delivery step.
type Job = Box<dyn FnOnce() -> BoxFuture<'static, Deliver> + Send>;

/// A submission waiting for a concurrency slot
struct QueuedRequest {
    id: u64,
    job: Job,
}

/// Counter and waiting list, always mutated together
#[derive(Default)]
struct DispatchState {
    in_flight: usize,
    waiting: VecDeque<QueuedRequest>,
}

#[derive(Default)]
struct DispatchCounters {
    submitted: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    peak_in_flight: AtomicUsize,
}

struct Inner {
    state: Mutex<DispatchState>,
    max_concurrent: usize,
    drain_delay: Duration,
    counters: DispatchCounters,
}

/// Bounded request dispatcher
///
/// Cheap to clone; clones share the same window and waiting list.
#[derive(Clone)]
pub struct RequestDispatcher {
    inner: Arc<Inner>,
}

impl RequestDispatcher {
    /// Create a dispatcher from configuration
    #[must_use]
    pub fn new(config: &DispatcherConfig) -> Self {
        Self::with_limits(config.max_concurrent, config.drain_delay)
    }

    /// Create a dispatcher with an explicit ceiling and re-drain delay
    ///
    /// A ceiling of zero is raised to one.
    #[must_use]
    pub fn with_limits(max_concurrent: usize, drain_delay: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(DispatchState::default()),
                max_concurrent: max_concurrent.max(1),
                drain_delay,
                counters: DispatchCounters::default(),
            }),
        }
    }

    /// Submit a unit of work
    ///
    /// The submission is enqueued (and admitted, if a slot is free) before
    /// this returns, so submission order is admission order even if the
    /// returned futures are polled in a different order. The future settles
    /// with whatever `producer` settles with. A panicking producer settles as
    /// [`Error::Internal`] and releases its slot.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit<F, Fut, T>(&self, producer: F) -> impl Future<Output = Result<T>> + Send + 'static
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel::<Result<T>>();

        let job: Job = Box::new(move || {
            async move {
                let result = match AssertUnwindSafe(async move { producer().await })
                    .catch_unwind()
                    .await
                {
                    Ok(result) => result,
                    Err(_) => {
                        warn!("Request producer panicked");
                        Err(Error::Internal("request producer panicked".to_string()))
                    }
                };
                let deliver: Deliver = Box::new(move || {
                    let ok = result.is_ok();
                    // Receiver gone means the caller stopped waiting
                    let _ = tx.send(result);
                    ok
                });
                deliver
            }
            .boxed()
        });

        let id = self.inner.counters.submitted.fetch_add(1, Ordering::Relaxed);
        {
            let mut state = self.inner.state.lock();
            state.waiting.push_back(QueuedRequest { id, job });
            debug!(
                request_id = id,
                in_flight = state.in_flight,
                queued = state.waiting.len(),
                "Request queued"
            );
        }
        Inner::drain(&self.inner);

        async move {
            match rx.await {
                Ok(result) => result,
                Err(_) => Err(Error::Internal(
                    "dispatcher dropped the request".to_string(),
                )),
            }
        }
    }

    /// Number of requests currently executing
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inner.state.lock().in_flight
    }

    /// Number of requests waiting for a slot
    #[must_use]
    pub fn queued(&self) -> usize {
        self.inner.state.lock().waiting.len()
    }

    /// Concurrency ceiling
    #[must_use]
    pub fn max_concurrent(&self) -> usize {
        self.inner.max_concurrent
    }

    /// Get dispatcher statistics
    pub fn stats(&self) -> DispatcherStatsSnapshot {
        let (in_flight, queued) = {
            let state = self.inner.state.lock();
            (state.in_flight, state.waiting.len())
        };
        let counters = &self.inner.counters;
        DispatcherStatsSnapshot {
            submitted: counters.submitted.load(Ordering::Relaxed),
            succeeded: counters.succeeded.load(Ordering::Relaxed),
            failed: counters.failed.load(Ordering::Relaxed),
            in_flight,
            queued,
            peak_in_flight: counters.peak_in_flight.load(Ordering::Relaxed),
        }
    }
}

impl Inner {
    /// Admit waiting requests while there is room in the window
    fn drain(this: &Arc<Self>) {
        let mut admitted = Vec::new();
        {
            let mut state = this.state.lock();
            while state.in_flight < this.max_concurrent {
                let Some(request) = state.waiting.pop_front() else {
                    break;
                };
                state.in_flight += 1;
                this.counters
                    .peak_in_flight
                    .fetch_max(state.in_flight, Ordering::Relaxed);
                debug!(
                    request_id = request.id,
                    in_flight = state.in_flight,
                    queued = state.waiting.len(),
                    "Request admitted"
                );
                admitted.push(request);
            }
        }

        for request in admitted {
            tokio::spawn(Self::run(Arc::clone(this), request));
        }
    }

    async fn run(this: Arc<Self>, request: QueuedRequest) {
        let deliver = (request.job)().await;

        this.state.lock().in_flight -= 1;

        if deliver() {
            this.counters.succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            this.counters.failed.fetch_add(1, Ordering::Relaxed);
        }
        debug!(request_id = request.id, "Request settled");

        if !this.drain_delay.is_zero() {
            tokio::time::sleep(this.drain_delay).await;
        }
        Self::drain(&this);
    }
}

/// Snapshot of dispatcher statistics
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DispatcherStatsSnapshot {
    /// Total submissions
    pub submitted: u64,
    /// Submissions that settled with `Ok`
    pub succeeded: u64,
    /// Submissions that settled with `Err`
    pub failed: u64,
    /// Currently executing
    pub in_flight: usize,
    /// Currently waiting for a slot
    pub queued: usize,
    /// Highest number ever executing at once
    pub peak_in_flight: usize,
}
