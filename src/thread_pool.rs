//! # Thread Pool Module
//!
//! Bounded worker-thread pool that every other subsystem schedules onto:
//! connection handlers, fired timer callbacks, and the accept loop itself.
//!
//! ## Features
//!
//! - **Bounded workers**: threads are spawned on demand up to `max_threads`
//! - **FIFO delivery**: jobs are dequeued in submission order, each by
//!   exactly one worker
//! - **Idle reaping**: a worker that sees no work for the configured linger
//!   time terminates itself
//! - **Panic isolation**: a panicking job takes down neither its worker nor
//!   the pool
//! - **Metrics**: dispatched/completed/panicked counts and queue depth
//!
//! ## Configuration
//!
//! - `UPNP_MAX_THREADS`: worker ceiling (default: 13)
//! - `UPNP_LINGER_SECS`: idle worker lifetime in seconds; 0 disables
//!   reaping (default: 5)
//!
//! ## Locking
//!
//! One mutex guards the queue and thread counts. It is never held across a
//! job's execution or any blocking I/O; workers release it before running
//! a job and re-take it afterwards.
//!
//! ## Shutdown ordering
//!
//! [`ThreadPool::shutdown`] (also reached through `Drop`) waits until every
//! worker has exited. A long-lived job parked on its own blocking call, such
//! as a [`TimerThread`](crate::timer::TimerThread) loop or a
//! [`MiniServer`](crate::server::MiniServer) accept loop, counts as a busy
//! worker and never sees the shutdown flag on its own. Stop those subsystems
//! first (`TimerThread::shutdown`, `MiniServer::stop`), then shut the pool
//! down; the reverse order blocks forever.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use crate::error::Error;
use tracing::{debug, error, info};

/// A unit of work: boxed closure, run exactly once by exactly one worker.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Sizing and linger behavior for a [`ThreadPool`].
#[derive(Debug, Clone, Copy)]
pub struct ThreadPoolConfig {
    /// Ceiling on concurrently live worker threads
    pub max_threads: usize,
    /// How long an idle worker waits before self-terminating; `None` keeps
    /// idle workers alive indefinitely
    pub linger: Option<Duration>,
}

impl ThreadPoolConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let max_threads = std::env::var("UPNP_MAX_THREADS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|&n| n > 0)
            .unwrap_or(13);

        let linger_secs: u64 = std::env::var("UPNP_LINGER_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        Self {
            max_threads,
            linger: (linger_secs > 0).then(|| Duration::from_secs(linger_secs)),
        }
    }

    pub fn new(max_threads: usize, linger: Option<Duration>) -> Self {
        Self {
            max_threads,
            linger,
        }
    }
}

impl Default for ThreadPoolConfig {
    fn default() -> Self {
        Self {
            max_threads: 13,
            linger: Some(Duration::from_secs(5)),
        }
    }
}

/// Eventually-consistent pool counters; snapshots, not transactions.
#[derive(Debug, Default)]
pub struct ThreadPoolMetrics {
    /// Total jobs accepted by `schedule`
    pub dispatched_count: AtomicU64,
    /// Total jobs that finished (panicked ones included)
    pub completed_count: AtomicU64,
    /// Jobs whose closure panicked
    pub panicked_count: AtomicU64,
    /// Jobs queued but not yet picked up (approximate)
    pub queue_depth: AtomicUsize,
}

impl ThreadPoolMetrics {
    fn record_dispatch(&self) {
        self.dispatched_count.fetch_add(1, Ordering::Relaxed);
        self.queue_depth.fetch_add(1, Ordering::Relaxed);
    }

    fn record_start(&self) {
        self.queue_depth.fetch_sub(1, Ordering::Relaxed);
    }

    fn record_completion(&self, panicked: bool) {
        self.completed_count.fetch_add(1, Ordering::Relaxed);
        if panicked {
            self.panicked_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn get_dispatched_count(&self) -> u64 {
        self.dispatched_count.load(Ordering::Relaxed)
    }

    pub fn get_completed_count(&self) -> u64 {
        self.completed_count.load(Ordering::Relaxed)
    }

    pub fn get_panicked_count(&self) -> u64 {
        self.panicked_count.load(Ordering::Relaxed)
    }

    pub fn get_queue_depth(&self) -> usize {
        self.queue_depth.load(Ordering::Relaxed)
    }
}

struct PoolState {
    queue: VecDeque<Job>,
    /// Live worker threads; never exceeds `max_threads` except transiently
    /// during the shutdown drain
    live: usize,
    /// Workers currently parked on the condition variable
    idle: usize,
    die: bool,
}

struct PoolInner {
    state: Mutex<PoolState>,
    /// "queue non-empty or shutdown requested"
    work: Condvar,
    /// queue just became empty
    drained: Condvar,
    /// a worker exited
    reaped: Condvar,
    config: ThreadPoolConfig,
    metrics: Arc<ThreadPoolMetrics>,
    next_worker_id: AtomicUsize,
}

/// Reusable bounded worker pool.
///
/// Shared across subsystems behind an `Arc`; dropping the last handle shuts
/// the pool down.
pub struct ThreadPool {
    inner: Arc<PoolInner>,
}

impl ThreadPool {
    pub fn new(config: ThreadPoolConfig) -> Self {
        info!(
            max_threads = config.max_threads,
            linger = ?config.linger,
            "creating thread pool"
        );
        Self {
            inner: Arc::new(PoolInner {
                state: Mutex::new(PoolState {
                    queue: VecDeque::new(),
                    live: 0,
                    idle: 0,
                    die: false,
                }),
                work: Condvar::new(),
                drained: Condvar::new(),
                reaped: Condvar::new(),
                config,
                metrics: Arc::new(ThreadPoolMetrics::default()),
                next_worker_id: AtomicUsize::new(0),
            }),
        }
    }

    pub fn from_env() -> Self {
        Self::new(ThreadPoolConfig::from_env())
    }

    pub fn config(&self) -> &ThreadPoolConfig {
        &self.inner.config
    }

    pub fn metrics(&self) -> &Arc<ThreadPoolMetrics> {
        &self.inner.metrics
    }

    /// Append a job to the FIFO queue and wake (or spawn) a worker.
    ///
    /// Never blocks. Fails only when the pool is shutting down; the job is
    /// returned to the caller inside the error case semantics (dropped).
    pub fn schedule<F>(&self, job: F) -> Result<(), Error>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut st = self.inner.state.lock().unwrap();
        if st.die {
            return Err(Error::PoolShutDown);
        }
        st.queue.push_back(Box::new(job));
        self.inner.metrics.record_dispatch();
        if st.idle == 0 && st.live < self.inner.config.max_threads {
            st.live += 1;
            let id = self.inner.next_worker_id.fetch_add(1, Ordering::Relaxed);
            let inner = Arc::clone(&self.inner);
            let spawned = thread::Builder::new()
                .name(format!("upnp-pool-{id}"))
                .spawn(move || worker_loop(inner, id));
            if let Err(e) = spawned {
                st.live -= 1;
                error!(worker_id = id, error = %e, "failed to spawn pool worker");
            }
        }
        drop(st);
        self.inner.work.notify_one();
        Ok(())
    }

    /// Block until the queue is empty or shutdown is requested; callers use
    /// this as backpressure before proceeding.
    pub fn wait_for_zero_jobs(&self) {
        let mut st = self.inner.state.lock().unwrap();
        while !st.queue.is_empty() && !st.die {
            st = self.inner.drained.wait(st).unwrap();
        }
    }

    /// Jobs queued but not yet started (snapshot).
    pub fn jobs_pending(&self) -> usize {
        self.inner.state.lock().unwrap().queue.len()
    }

    /// Live worker threads (snapshot).
    pub fn threads_running(&self) -> usize {
        self.inner.state.lock().unwrap().live
    }

    /// Stop accepting work and wait until every worker has exited.
    ///
    /// The condition variable is broadcast repeatedly to defeat missed
    /// wakeups; queued-but-unstarted jobs are discarded. Jobs that block on
    /// their own resources (a timer loop, an accept loop) must already have
    /// been stopped, or this call never returns; see the module-level notes
    /// on shutdown ordering.
    pub fn shutdown(&self) {
        let mut st = self.inner.state.lock().unwrap();
        if !st.die {
            debug!(
                pending = st.queue.len(),
                live = st.live,
                "shutting down thread pool"
            );
        }
        st.die = true;
        st.queue.clear();
        self.inner.drained.notify_all();
        while st.live > 0 {
            self.inner.work.notify_all();
            let (guard, _) = self
                .inner
                .reaped
                .wait_timeout(st, Duration::from_millis(10))
                .unwrap();
            st = guard;
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(inner: Arc<PoolInner>, worker_id: usize) {
    debug!(worker_id, "pool worker started");
    let mut st = inner.state.lock().unwrap();
    loop {
        if st.die {
            break;
        }
        if let Some(job) = st.queue.pop_front() {
            if st.queue.is_empty() {
                inner.drained.notify_all();
            }
            drop(st);
            inner.metrics.record_start();
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(job));
            if let Err(panic) = &outcome {
                error!(worker_id, panic_message = ?panic, "pool job panicked");
            }
            inner.metrics.record_completion(outcome.is_err());
            st = inner.state.lock().unwrap();
            continue;
        }
        st.idle += 1;
        match inner.config.linger {
            Some(linger) => {
                let (guard, timeout) = inner.work.wait_timeout(st, linger).unwrap();
                st = guard;
                st.idle -= 1;
                if timeout.timed_out() && st.queue.is_empty() && !st.die {
                    // idle past the linger deadline: self-reap
                    break;
                }
            }
            None => {
                st = inner.work.wait(st).unwrap();
                st.idle -= 1;
            }
        }
    }
    st.live -= 1;
    if st.live == 0 {
        inner.reaped.notify_all();
    }
    drop(st);
    debug!(worker_id, "pool worker exiting");
}
