//! Integration test: loop-thread faults.
//!
//! A compute-engine failure on the loop thread must terminate the loop,
//! be captured exactly once, and be re-raised to every subsequent
//! guarded operation. The session is permanently failed; lock-free
//! reads stay available.

use std::time::{Duration, Instant};

use vivarium_core::AccessError;
use vivarium_engine::{SimWorker, WorkerConfig};
use vivarium_test_utils::MockEngine;

fn poll_until(deadline: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}

fn faulted_worker() -> SimWorker {
    let engine = MockEngine::new().with_fail_after(3);
    let worker = SimWorker::new(Box::new(engine), WorkerConfig::default()).unwrap();
    worker.run();
    assert!(
        poll_until(Duration::from_secs(2), || {
            worker.current_timestep().is_err()
        }),
        "fault never surfaced to a guarded operation"
    );
    worker
}

// ── Tests ────────────────────────────────────────────────────────────

#[test]
fn step_fault_is_reraised_on_every_guarded_operation() {
    let worker = faulted_worker();

    for _ in 0..3 {
        match worker.current_timestep() {
            Err(AccessError::SimulationFault { message }) => {
                assert!(
                    message.contains("injected failure"),
                    "fault message not preserved: {message}"
                );
            }
            other => panic!("expected SimulationFault, got {other:?}"),
        }
    }
}

#[test]
fn fault_fails_reads_and_edits_alike() {
    let worker = faulted_worker();
    let region = vivarium_core::WorldRect::default();

    assert!(matches!(
        worker.region_data(region),
        Err(AccessError::SimulationFault { .. })
    ));
    assert!(matches!(
        worker.try_region_data(region),
        Err(AccessError::SimulationFault { .. })
    ));
    assert!(matches!(
        worker.clear(),
        Err(AccessError::SimulationFault { .. })
    ));
    assert!(matches!(
        worker.pause(),
        Err(AccessError::SimulationFault { .. })
    ));
}

#[test]
fn lock_free_reads_survive_a_fault() {
    let worker = faulted_worker();

    // The monitor keeps serving its last snapshot; the steps that
    // completed before the fault are still visible.
    let stats = worker.monitor_data();
    assert!(stats.time_step > 0);
    let _ = worker.tps();
    assert_eq!(worker.tps_restriction(), 0);
}

#[test]
fn async_submissions_after_a_fault_do_not_panic() {
    let worker = faulted_worker();
    // The loop is gone, so these can never be applied, but submission
    // stays non-blocking and harmless.
    worker.set_parameters_async(vivarium_core::SimulationParameters::default());
    worker.apply_force_async(
        vivarium_core::Vec2::default(),
        vivarium_core::Vec2::default(),
        vivarium_core::Vec2::default(),
        1.0,
    );
}

#[test]
fn fault_keeps_the_first_message() {
    let engine = MockEngine::new().with_fail_after(0);
    let worker = SimWorker::new(Box::new(engine), WorkerConfig::default()).unwrap();
    worker.run();
    assert!(poll_until(Duration::from_secs(2), || {
        worker.current_timestep().is_err()
    }));

    let first = worker.current_timestep().unwrap_err();
    let second = worker.current_timestep().unwrap_err();
    assert_eq!(first, second);
}

#[test]
fn shutdown_after_fault_completes() {
    let mut worker = faulted_worker();
    worker.begin_shutdown();
    worker.end_shutdown();
}
