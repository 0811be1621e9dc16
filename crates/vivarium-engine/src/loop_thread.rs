//! The worker loop: rate-controlled timestep scheduling, access-grant
//! servicing, TPS measurement, monitor refresh, and job draining.
//!
//! The loop never takes a blocking lock on its hot path. The engine
//! mutex it holds while stepping is uncontended by protocol, and the
//! only waits are the condition-variable sleep while `Stopped` and the
//! busy spin while an access grant is outstanding. The spin is a
//! deliberate latency trade: grants are rare and short relative to
//! timestep computation, and a `spin_loop` hint keeps the cost down.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use vivarium_core::EngineError;

use crate::context::{access, RunState, WorkerContext};
use crate::tps::measured_tps;

/// State owned by the loop thread.
pub(crate) struct LoopState {
    ctx: Arc<WorkerContext>,
    /// Start of the current TPS measurement window.
    window_anchor: Option<Instant>,
    /// Timesteps completed in the current window.
    steps_in_window: u64,
    /// Start of the most recent timestep, for throttle spacing.
    step_start: Option<Instant>,
}

impl LoopState {
    pub fn new(ctx: Arc<WorkerContext>) -> Self {
        Self {
            ctx,
            window_anchor: None,
            steps_in_window: 0,
            step_start: None,
        }
    }

    /// Main loop. Runs until shutdown or a fault.
    ///
    /// A fault raised by the step or the job drain is terminal: it is
    /// recorded in the fault channel for re-raising on caller threads
    /// and the loop exits. A new worker must be created to resume.
    pub fn run(mut self) {
        log::debug!("worker loop started");
        if let Err(fault) = self.run_inner() {
            log::error!("worker loop fault: {fault}");
            self.ctx.fault.record(fault.to_string());
        }
        self.ctx.stopped.store(true, Ordering::Release);
        // Wake any requester still waiting for a grant; it re-checks
        // the stopped flag and falls back to direct access. The mutex
        // is taken so the notification cannot race ahead of its wait.
        {
            let _guard = self
                .ctx
                .access_mutex
                .lock()
                .expect("access mutex poisoned");
            self.ctx.access_cv.notify_all();
        }
        log::debug!("worker loop exited");
    }

    fn run_inner(&mut self) -> Result<(), EngineError> {
        loop {
            {
                let mut run = self.ctx.run.lock().expect("run state poisoned");
                if *run == RunState::Stopped {
                    self.ctx.tps.store_rate(0.0);
                    self.step_start = None;
                    // Drop the measurement window so resuming does not
                    // average across the paused gap.
                    self.window_anchor = None;
                    self.steps_in_window = 0;
                    // Park only when the job store is empty: a
                    // submission that landed before this point already
                    // spent its notification, so waiting on it would
                    // strand the jobs until the next wakeup. Woken by a
                    // run-state change, a job submission, or shutdown;
                    // fall through either way so pending jobs are
                    // drained even while paused.
                    if !self.ctx.jobs.has_pending() {
                        run = self.ctx.worker_cv.wait(run).expect("run state poisoned");
                    }
                    drop(run);
                }
            }
            if self.ctx.run_state() == RunState::ShuttingDown {
                return Ok(());
            }

            self.service_access_request();

            if self.ctx.run_state() == RunState::Running {
                self.throttle();
                self.measure_tps();
                self.step_start = Some(Instant::now());

                let mut slot = self.ctx.engine.lock().expect("engine mutex poisoned");
                let Some(engine) = slot.as_deref_mut() else {
                    return Ok(());
                };
                engine.step()?;
                self.steps_in_window += 1;
                self.ctx
                    .monitor
                    .refresh(engine, self.ctx.config.monitor_refresh);
            }

            let mut slot = self.ctx.engine.lock().expect("engine mutex poisoned");
            if let Some(engine) = slot.as_deref_mut() {
                self.ctx.jobs.drain(engine)?;
            }
        }
    }

    /// Grant outstanding access requests and busy-wait for release.
    ///
    /// The spin waits only while a grant is outstanding: a caller may
    /// release and immediately re-request, and the transient `Free` in
    /// between is not guaranteed to be observed here. Exiting on
    /// `Requested` lets the outer check grant the follow-up request
    /// without a timestep in between.
    fn service_access_request(&self) {
        while self.ctx.access.load(Ordering::Acquire) == access::REQUESTED {
            self.ctx.grant_access();
            while self.ctx.access.load(Ordering::Acquire) == access::GRANTED {
                std::hint::spin_loop();
            }
        }
    }

    /// Busy-wait until the configured inter-timestep spacing has
    /// elapsed since the previous timestep start, re-checking for
    /// access requests on every spin so a request is serviced promptly
    /// even mid-throttle. The restriction is re-read each iteration so
    /// a caller can change it while the loop is spinning.
    fn throttle(&self) {
        let Some(start) = self.step_start else {
            return;
        };
        loop {
            let desired_us = self.ctx.tps.desired_spacing_us();
            let elapsed_us = start.elapsed().as_micros() as u64;
            if self.ctx.access.load(Ordering::Acquire) == access::REQUESTED {
                self.ctx.grant_access();
            }
            if elapsed_us >= desired_us && self.ctx.access.load(Ordering::Acquire) == access::FREE
            {
                return;
            }
            std::hint::spin_loop();
        }
    }

    /// Recompute the observed rate once per elapsed measurement window.
    fn measure_tps(&mut self) {
        let now = Instant::now();
        match self.window_anchor {
            None => self.window_anchor = Some(now),
            Some(anchor) => {
                let elapsed_ms = now.duration_since(anchor).as_millis() as u64;
                if let Some(rate) = measured_tps(elapsed_ms, self.steps_in_window) {
                    self.ctx.tps.store_rate(rate);
                    self.window_anchor = Some(now);
                    self.steps_in_window = 0;
                }
            }
        }
    }
}
