//! Shared state between the worker loop thread and caller threads.
//!
//! Every field follows a single-writer-per-role discipline:
//!
//! - `run` is written by callers; the loop only observes it (and exits
//!   on `ShuttingDown`).
//! - The access flag transitions `Free→Requested` on a caller thread,
//!   `Requested→Granted` on the loop thread, and `Granted→Free` (or
//!   `Requested→Free` on timeout abandonment) on the requesting caller.
//! - The engine mutex is uncontended by protocol: the loop holds it
//!   only while stepping or draining, and it busy-waits *without* it
//!   while a grant is outstanding, so the granted caller's lock
//!   acquisition never blocks.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Condvar, Mutex};

use vivarium_core::ComputeEngine;

use crate::config::WorkerConfig;
use crate::fault::FaultChannel;
use crate::jobs::PendingJobs;
use crate::monitor::MonitorCell;
use crate::pool::BufferPool;
use crate::tps::TpsGauge;

/// Legal values of the access handoff flag.
pub(crate) mod access {
    /// No access request outstanding.
    pub const FREE: u8 = 0;
    /// A caller has requested exclusive access.
    pub const REQUESTED: u8 = 1;
    /// The loop has granted access and is spinning until release.
    pub const GRANTED: u8 = 2;
}

/// Loop scheduling state. Written by callers, observed by the loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RunState {
    /// The loop sleeps until woken.
    Stopped,
    /// The loop advances timesteps each iteration.
    Running,
    /// The loop must exit after the current iteration.
    ShuttingDown,
}

/// State shared by the loop thread and all caller threads.
pub(crate) struct WorkerContext {
    pub config: WorkerConfig,
    /// Scheduling state, paired with `worker_cv`.
    pub run: Mutex<RunState>,
    /// Wakes the loop: run-state changes, job submission, guard release.
    pub worker_cv: Condvar,
    /// The tri-state access handoff flag.
    pub access: AtomicU8,
    /// Pairs with `access_cv`; held only around the grant handshake.
    pub access_mutex: Mutex<()>,
    /// Signals a requester that access was granted.
    pub access_cv: Condvar,
    /// Serializes concurrent requesters before they contend for the
    /// flag, held for the full guard lifetime.
    pub requester_lock: Mutex<()>,
    /// The compute capability. `None` once the session is shut down.
    pub engine: Mutex<Option<Box<dyn ComputeEngine>>>,
    pub jobs: PendingJobs,
    pub monitor: MonitorCell,
    pub fault: FaultChannel,
    pub tps: TpsGauge,
    pub pool: Mutex<BufferPool>,
    /// Set by the loop thread on exit.
    pub stopped: AtomicBool,
}

impl WorkerContext {
    pub fn new(engine: Box<dyn ComputeEngine>, config: WorkerConfig) -> Self {
        Self {
            config,
            run: Mutex::new(RunState::Stopped),
            worker_cv: Condvar::new(),
            access: AtomicU8::new(access::FREE),
            access_mutex: Mutex::new(()),
            access_cv: Condvar::new(),
            requester_lock: Mutex::new(()),
            engine: Mutex::new(Some(engine)),
            jobs: PendingJobs::new(),
            monitor: MonitorCell::new(),
            fault: FaultChannel::new(),
            tps: TpsGauge::new(),
            pool: Mutex::new(BufferPool::new()),
            stopped: AtomicBool::new(false),
        }
    }

    /// Current run state.
    pub fn run_state(&self) -> RunState {
        *self.run.lock().expect("run state poisoned")
    }

    /// Wake the loop thread. The run mutex is taken briefly so a wake
    /// cannot slip between the loop's state check and its wait.
    pub fn wake_worker(&self) {
        let _run = self.run.lock().expect("run state poisoned");
        self.worker_cv.notify_all();
    }

    /// Loop side of the handoff: publish the grant and wake the
    /// requester. The access mutex is taken so the notification cannot
    /// race ahead of the requester's wait.
    ///
    /// The grant must lose to a concurrent timeout retraction
    /// (`Requested→Free` on the caller side), so it is a
    /// compare-exchange, never a plain store: granting a request
    /// nobody holds anymore would leave the flag `Granted` with no
    /// owner to release it.
    pub fn grant_access(&self) {
        let _guard = self.access_mutex.lock().expect("access mutex poisoned");
        if self
            .access
            .compare_exchange(
                access::REQUESTED,
                access::GRANTED,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
        {
            self.access_cv.notify_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkerConfig;
    use vivarium_test_utils::MockEngine;

    fn context() -> WorkerContext {
        WorkerContext::new(Box::new(MockEngine::new()), WorkerConfig::default())
    }

    #[test]
    fn grant_fires_only_on_an_outstanding_request() {
        let ctx = context();
        assert_eq!(ctx.access.load(Ordering::Acquire), access::FREE);

        // No request outstanding: the grant must not publish.
        ctx.grant_access();
        assert_eq!(ctx.access.load(Ordering::Acquire), access::FREE);

        ctx.access.store(access::REQUESTED, Ordering::Release);
        ctx.grant_access();
        assert_eq!(ctx.access.load(Ordering::Acquire), access::GRANTED);
    }

    #[test]
    fn retracted_request_cannot_be_granted() {
        let ctx = context();
        // A caller requests, then its deadline elapses and it retracts
        // before the loop's grant lands. The grant must be a no-op, or
        // the flag would end up Granted with no owner to free it.
        ctx.access.store(access::REQUESTED, Ordering::Release);
        let retracted = ctx
            .access
            .compare_exchange(
                access::REQUESTED,
                access::FREE,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        assert!(retracted);

        ctx.grant_access();
        assert_eq!(ctx.access.load(Ordering::Acquire), access::FREE);
    }
}
