//! # Timer Module
//!
//! Sorted deferred-event dispatch: advertisement renewal, subscription
//! expiry, and any other "run this later" work in the stack.
//!
//! ## Overview
//!
//! A [`TimerThread`] keeps a time-ordered event queue and a single loop that
//! runs as a job on the shared [`ThreadPool`]. When an event's fire time
//! arrives its callback is handed back to the pool, so the timer loop itself
//! never blocks running user code.
//!
//! ## Ordering
//!
//! Events fire in non-decreasing fire-time order; among equal fire times, in
//! scheduling order (the monotonically increasing event id is the tie-break
//! key). An event can be cancelled by id any time before it fires; once
//! fired it is gone, and callers racing a cancellation must check their own
//! flag inside the callback.
//!
//! ## Shutdown
//!
//! Every still-pending callback runs synchronously as a drain step, then the
//! loop exits. Callers that schedule cleanup through the timer can therefore
//! count on it running exactly once.
//!
//! The loop occupies one pool worker for the timer's whole lifetime, and
//! [`ThreadPool::shutdown`] waits for every worker to exit. Shut the timer
//! down (dropping it is enough) before shutting down the pool it runs on;
//! the reverse order deadlocks. Holding the pool in an `Arc` next to the
//! timer and letting both drop works, since the timer's `Drop` runs first.

use std::collections::BTreeMap;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::error::Error;
use crate::thread_pool::{Job, ThreadPool};
use tracing::{debug, trace, warn};

/// Handle for cancelling a scheduled event; unique while the event is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId(u64);

struct TimerState {
    /// Keyed by (fire time, insertion id): the map's order is the fire order.
    events: BTreeMap<(Instant, u64), Job>,
    next_id: u64,
    die: bool,
    running: bool,
}

struct TimerInner {
    state: Mutex<TimerState>,
    /// "new event scheduled or shutdown requested"
    changed: Condvar,
    /// the loop has fully exited (drain included)
    stopped: Condvar,
}

/// Deferred-callback scheduler running on the shared pool.
pub struct TimerThread {
    inner: Arc<TimerInner>,
    pool: Arc<ThreadPool>,
}

impl TimerThread {
    /// Start the timer loop as a pool job.
    pub fn start(pool: Arc<ThreadPool>) -> Result<Self, Error> {
        let inner = Arc::new(TimerInner {
            state: Mutex::new(TimerState {
                events: BTreeMap::new(),
                next_id: 0,
                die: false,
                running: true,
            }),
            changed: Condvar::new(),
            stopped: Condvar::new(),
        });
        let loop_inner = Arc::clone(&inner);
        let loop_pool = Arc::clone(&pool);
        pool.schedule(move || timer_loop(loop_inner, loop_pool))?;
        Ok(Self { inner, pool })
    }

    /// Schedule `callback` to fire `delay` from now.
    ///
    /// Insertion point is before the first event with a strictly later fire
    /// time, so equal delays fire in scheduling order.
    pub fn schedule<F>(&self, delay: Duration, callback: F) -> Result<EventId, Error>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut st = self.inner.state.lock().unwrap();
        if st.die {
            return Err(Error::PoolShutDown);
        }
        let id = st.next_id;
        st.next_id += 1;
        st.events
            .insert((Instant::now() + delay, id), Box::new(callback));
        trace!(event_id = id, delay_ms = delay.as_millis() as u64, "timer event scheduled");
        drop(st);
        self.inner.changed.notify_all();
        Ok(EventId(id))
    }

    /// Cancel a pending event; returns false when it already fired (or never
    /// existed). The callback is dropped, running its owned cleanup.
    pub fn cancel(&self, id: EventId) -> bool {
        let mut st = self.inner.state.lock().unwrap();
        let key = st
            .events
            .keys()
            .find(|(_, event_id)| *event_id == id.0)
            .copied();
        match key {
            Some(key) => {
                st.events.remove(&key);
                trace!(event_id = id.0, "timer event cancelled");
                true
            }
            None => false,
        }
    }

    /// Pending (not yet fired) events, snapshot.
    pub fn events_pending(&self) -> usize {
        self.inner.state.lock().unwrap().events.len()
    }

    /// Stop the loop, draining every pending callback synchronously before
    /// returning.
    pub fn shutdown(&self) {
        let mut st = self.inner.state.lock().unwrap();
        st.die = true;
        self.inner.changed.notify_all();
        while st.running {
            st = self.inner.stopped.wait(st).unwrap();
        }
    }

    pub fn pool(&self) -> &Arc<ThreadPool> {
        &self.pool
    }
}

impl Drop for TimerThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn timer_loop(inner: Arc<TimerInner>, pool: Arc<ThreadPool>) {
    debug!("timer loop started");
    let mut st = inner.state.lock().unwrap();
    loop {
        if st.die {
            break;
        }
        let now = Instant::now();
        match st.events.first_key_value().map(|(key, _)| *key) {
            Some((fire, id)) if fire <= now => {
                let callback = match st.events.remove(&(fire, id)) {
                    Some(cb) => cb,
                    None => continue,
                };
                drop(st);
                trace!(event_id = id, "timer event fired");
                if let Err(e) = pool.schedule(callback) {
                    warn!(event_id = id, error = %e, "pool refused fired timer callback");
                }
                st = inner.state.lock().unwrap();
            }
            Some((fire, _)) => {
                // sleep until the nearer of this deadline or a new event
                let (guard, _) = inner.changed.wait_timeout(st, fire - now).unwrap();
                st = guard;
            }
            None => {
                st = inner.changed.wait(st).unwrap();
            }
        }
    }
    let drained: Vec<Job> = std::mem::take(&mut st.events).into_values().collect();
    drop(st);
    if !drained.is_empty() {
        debug!(count = drained.len(), "draining pending timer callbacks");
    }
    for callback in drained {
        callback();
    }
    let mut st = inner.state.lock().unwrap();
    st.running = false;
    inner.stopped.notify_all();
    drop(st);
    debug!("timer loop exited");
}
