//! Vivarium SimWorker — background-threaded simulation with concurrent access.
//!
//! Demonstrates:
//!   1. Creating a SimWorker around a compute engine
//!   2. Seeding world data through a guarded operation
//!   3. Running with a TPS cap and watching the monitor advance
//!   4. Asynchronous configuration and point-effect jobs
//!   5. Guarded reads and edits concurrent with the running loop
//!   6. Two-phase shutdown
//!
//! Run with:
//!   cargo run --example realtime
//!
//! Set `RUST_LOG=debug` to see the loop thread's lifecycle logging.

use std::thread;
use std::time::Duration;

use vivarium_core::{Cell, SimulationParameters, Vec2, WorldData, WorldRect};
use vivarium_engine::{SimWorker, WorkerConfig};
use vivarium_test_utils::MockEngine;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    println!("=== Vivarium SimWorker Example ===\n");

    // 1. Create the worker. The engine moves into the session; the loop
    //    thread starts stopped.
    let mut worker = SimWorker::new(Box::new(MockEngine::new()), WorkerConfig::default())?;
    println!("SimWorker created — loop thread idle");

    // 2. Seed the world while stopped. Guarded operations on a stopped
    //    worker take the engine directly, no handoff needed.
    let mut seed = WorldData::default();
    for i in 0..64 {
        seed.cells.push(Cell {
            id: i,
            pos: Vec2::new((i % 8) as f32, (i / 8) as f32),
            vel: Vec2::new(0.01, 0.0),
            energy: 100.0,
            token_count: 0,
        });
    }
    worker.set_data(&seed)?;
    println!("Seeded {} cells\n", seed.cells.len());

    // 3. Cap the rate and start. The loop spaces timesteps to honor the
    //    cap; the measured rate converges over 200 ms windows.
    worker.set_tps_restriction(100);
    worker.run();
    println!("Running at <=100 TPS:");
    for _ in 0..5 {
        thread::sleep(Duration::from_millis(250));
        let stats = worker.monitor_data();
        println!(
            "  timestep={:>4}  cells={}  energy={:.0}  tps={:.1}",
            stats.time_step,
            stats.num_cells,
            stats.total_internal_energy,
            worker.tps(),
        );
    }

    // 4. Submit asynchronous jobs while running. Neither call blocks;
    //    the loop applies them between timesteps.
    println!("\nSubmitting async parameter update and a point effect...");
    worker.set_parameters_async(SimulationParameters {
        friction: 0.02,
        ..SimulationParameters::default()
    });
    worker.apply_force_async(
        Vec2::new(4.0, 4.0),
        Vec2::new(4.0, 4.0),
        Vec2::new(0.0, 0.5),
        2.0,
    );

    // 5. Guarded read concurrent with the running loop. The call waits
    //    for the loop to grant access between timesteps.
    let region = WorldRect {
        top_left: Vec2::new(0.0, 0.0),
        bottom_right: Vec2::new(100.0, 100.0),
    };
    let data = worker.region_data(region)?;
    println!("Guarded read while running: {} cells in region", data.cells.len());

    // A frame-rate-bound variant gives up after ~30 ms instead of
    // stalling a render loop; None means "skip this frame".
    match worker.try_region_data(region)? {
        Some(data) => println!("Frame-bound read: {} cells", data.cells.len()),
        None => println!("Frame-bound read: loop busy, skipped"),
    }

    // 6. Pause, single-step, and shut down. Pause is guarded, so the
    //    in-flight timestep completes first.
    worker.pause()?;
    let before = worker.current_timestep()?;
    worker.calc_single_timestep()?;
    println!(
        "\nPaused at timestep {}, single-stepped to {}",
        before,
        worker.current_timestep()?
    );

    println!("Shutting down...");
    worker.begin_shutdown();
    worker.end_shutdown();
    println!("Done.");
    Ok(())
}
