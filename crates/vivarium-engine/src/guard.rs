//! Guarded access protocol.
//!
//! An [`AccessGuard`] gives a caller thread exclusive, consistent
//! access to the compute engine for the extent of one scoped operation.
//! While the loop is running, the guard requests a handoff through the
//! tri-state access flag and waits for the loop to grant it between
//! units of work; the loop then spins until the guard is dropped.
//! Release happens in `Drop`, so it is guaranteed on every exit path —
//! normal return, early `?`, or panic — and the loop can never be left
//! waiting indefinitely because a caller's operation bailed out.

use std::sync::atomic::Ordering;
use std::sync::MutexGuard;
use std::time::Duration;

use vivarium_core::{AccessError, ComputeEngine};

use crate::context::{access, RunState, WorkerContext};

/// Scoped exclusive access to the shared engine.
pub(crate) struct AccessGuard<'a> {
    ctx: &'a WorkerContext,
    engine: Option<MutexGuard<'a, Option<Box<dyn ComputeEngine>>>>,
    /// Held for the guard's lifetime; serializes requesters.
    _requester: MutexGuard<'a, ()>,
    timed_out: bool,
    /// Whether the access flag must be reset on drop.
    synchronized: bool,
}

impl<'a> AccessGuard<'a> {
    /// Acquire access, waiting up to `max_wait` if given, or up to the
    /// configured hard bound otherwise.
    ///
    /// With a caller deadline, elapsing it is soft: the guard is
    /// returned with [`is_timeout`](Self::is_timeout) set and the
    /// engine inaccessible. Without one, elapsing the hard bound is a
    /// fatal [`AccessError::HardTimeout`]. Both paths re-raise any
    /// pending fault first; so does construction itself.
    pub fn acquire(
        ctx: &'a WorkerContext,
        max_wait: Option<Duration>,
    ) -> Result<Self, AccessError> {
        let requester = ctx.requester_lock.lock().expect("requester lock poisoned");
        ctx.fault.check()?;

        let loop_stepping =
            ctx.run_state() == RunState::Running && !ctx.stopped.load(Ordering::Acquire);
        if !loop_stepping {
            // No loop thread is mutating state (stopped, shut down, or
            // already exited on a fault); take the engine directly.
            // Destruction is a no-op beyond dropping the lock.
            let engine = ctx.engine.lock().expect("engine mutex poisoned");
            return Ok(Self {
                ctx,
                engine: Some(engine),
                _requester: requester,
                timed_out: false,
                synchronized: false,
            });
        }

        ctx.access.store(access::REQUESTED, Ordering::Release);
        let wait = max_wait.unwrap_or(ctx.config.hard_access_timeout);
        let handshake = ctx.access_mutex.lock().expect("access mutex poisoned");
        // The wait also ends when the loop thread exits (shutdown or
        // fault) so the requester is not stranded until its deadline.
        let (handshake, _result) = ctx
            .access_cv
            .wait_timeout_while(handshake, wait, |_| {
                ctx.access.load(Ordering::Acquire) != access::GRANTED
                    && !ctx.stopped.load(Ordering::Acquire)
            })
            .expect("access mutex poisoned");
        drop(handshake);

        if ctx.access.load(Ordering::Acquire) != access::GRANTED {
            let fault = ctx.fault.check();
            // Retract the request. If the grant raced in after the
            // deadline, release it so the loop stops spinning.
            if ctx
                .access
                .compare_exchange(
                    access::REQUESTED,
                    access::FREE,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_err()
            {
                ctx.access.store(access::FREE, Ordering::Release);
                ctx.wake_worker();
            }
            fault?;
            if ctx.stopped.load(Ordering::Acquire) {
                // The loop exited without granting; no thread is
                // mutating state anymore, so take the engine directly.
                let engine = ctx.engine.lock().expect("engine mutex poisoned");
                return Ok(Self {
                    ctx,
                    engine: Some(engine),
                    _requester: requester,
                    timed_out: false,
                    synchronized: false,
                });
            }
            if max_wait.is_some() {
                return Ok(Self {
                    ctx,
                    engine: None,
                    _requester: requester,
                    timed_out: true,
                    synchronized: false,
                });
            }
            return Err(AccessError::HardTimeout);
        }

        // Granted: the loop is spinning without the engine mutex, so
        // this lock is uncontended.
        let engine = ctx.engine.lock().expect("engine mutex poisoned");
        Ok(Self {
            ctx,
            engine: Some(engine),
            _requester: requester,
            timed_out: false,
            synchronized: true,
        })
    }

    /// True if a caller-supplied deadline elapsed before grant. The
    /// protected operation must check this and skip its engine access.
    pub fn is_timeout(&self) -> bool {
        self.timed_out
    }

    /// Exclusive access to the engine for the guarded operation.
    ///
    /// The `+ 'static` bound keeps the trait object's own lifetime
    /// from being elided to the `&mut self` borrow, which the boxed
    /// engine could not coerce to.
    pub fn engine(&mut self) -> Result<&mut (dyn ComputeEngine + 'static), AccessError> {
        self.engine
            .as_mut()
            .and_then(|slot| slot.as_deref_mut())
            .ok_or(AccessError::NoSession)
    }
}

impl Drop for AccessGuard<'_> {
    fn drop(&mut self) {
        // Release the engine before publishing FREE: the loop resumes
        // stepping the moment it observes the flag.
        self.engine.take();
        if self.synchronized {
            self.ctx.access.store(access::FREE, Ordering::Release);
            self.ctx.wake_worker();
        }
    }
}
