//! Integration test: rate restriction and TPS measurement.
//!
//! Bounds are deliberately loose: CI machines schedule coarsely, so
//! the assertions check the order of magnitude and the directional
//! behavior rather than exact rates.

use std::time::{Duration, Instant};

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

// ── Tests ────────────────────────────────────────────────────────────

#[test]
fn restriction_bounds_step_rate() {
    let engine = MockEngine::new();
    let probe = engine.probe();
    let worker = SimWorker::new(Box::new(engine), WorkerConfig::default()).unwrap();

    worker.set_tps_restriction(50);
    assert_eq!(worker.tps_restriction(), 50);

    worker.run();
    std::thread::sleep(Duration::from_secs(1));
    worker.pause().unwrap();

    let steps = probe.steps();
    // 50 Hz for 1 s: allow wide scheduling slack in both directions.
    assert!(steps >= 10, "only {steps} steps in 1s at 50 Hz cap");
    assert!(steps <= 80, "{steps} steps in 1s exceeds a 50 Hz cap");
}

#[test]
fn unlimited_rate_outruns_a_tight_cap() {
    let capped = {
        let engine = MockEngine::new().with_step_delay(Duration::from_micros(100));
        let probe = engine.probe();
        let worker = SimWorker::new(Box::new(engine), WorkerConfig::default()).unwrap();
        worker.set_tps_restriction(20);
        worker.run();
        std::thread::sleep(Duration::from_millis(500));
        worker.pause().unwrap();
        probe.steps()
    };
    let unlimited = {
        let engine = MockEngine::new().with_step_delay(Duration::from_micros(100));
        let probe = engine.probe();
        let worker = SimWorker::new(Box::new(engine), WorkerConfig::default()).unwrap();
        worker.run();
        std::thread::sleep(Duration::from_millis(500));
        worker.pause().unwrap();
        probe.steps()
    };
    assert!(
        unlimited > capped * 2,
        "unlimited ({unlimited}) not clearly faster than capped ({capped})"
    );
}

#[test]
fn measured_tps_is_positive_while_running_and_zero_when_paused() {
    let worker = SimWorker::new(Box::new(MockEngine::new()), WorkerConfig::default()).unwrap();
    assert_eq!(worker.tps(), 0.0);

    worker.set_tps_restriction(100);
    worker.run();
    assert!(
        poll_until(Duration::from_secs(2), || worker.tps() > 0.0),
        "measured rate never became positive"
    );

    worker.pause().unwrap();
    // The loop publishes a zero rate when it parks.
    assert!(
        poll_until(Duration::from_secs(2), || worker.tps() == 0.0),
        "measured rate not reset after pause"
    );
}

#[test]
fn restriction_can_change_while_running() {
    let worker = SimWorker::new(Box::new(MockEngine::new()), WorkerConfig::default()).unwrap();
    worker.set_tps_restriction(1000);
    worker.run();
    std::thread::sleep(Duration::from_millis(100));

    // Tighten mid-run; the throttle re-reads the cap every spin, so a
    // guarded operation must still get through promptly.
    worker.set_tps_restriction(5);
    let start = Instant::now();
    worker.current_timestep().unwrap();
    assert!(
        start.elapsed() < Duration::from_secs(2),
        "guarded access stalled behind the throttle"
    );

    worker.set_tps_restriction(0);
    assert_eq!(worker.tps_restriction(), 0);
}
