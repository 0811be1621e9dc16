//! Worker loop and concurrency core for the Vivarium simulation engine.
//!
//! The simulation runs on a dedicated loop thread owned by a
//! [`SimWorker`]. Caller threads never touch the compute engine
//! directly; they go through one of three channels, ordered from
//! cheapest to most intrusive:
//!
//! - **Monitoring** — [`SimWorker::monitor_data`] and
//!   [`SimWorker::tps`] read lock-free atomic snapshots the loop
//!   refreshes on its own schedule.
//! - **Asynchronous jobs** — the `*_async` methods stage configuration
//!   updates (last write wins) and point effects (strictly ordered)
//!   that the loop applies between timesteps.
//! - **Guarded operations** — data reads and edits acquire scoped
//!   exclusive access via a flag handoff; the loop grants access at a
//!   consistent point between units of work and resumes when the guard
//!   drops.
//!
//! Loop-thread faults are captured once and re-raised on every
//! subsequent guarded operation; the session is then permanently
//! failed and a new worker must be created.
//!
//! # Quick start
//!
//! ```no_run
//! use vivarium_engine::{SimWorker, WorkerConfig};
//! use vivarium_test_utils::MockEngine;
//!
//! let worker = SimWorker::new(Box::new(MockEngine::new()), WorkerConfig::default())?;
//! worker.set_tps_restriction(60);
//! worker.run();
//! // ... observe via worker.monitor_data(), edit via guarded ops ...
//! worker.pause()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
mod context;
mod fault;
mod guard;
mod jobs;
mod loop_thread;
mod monitor;
mod pool;
mod tps;
pub mod worker;

pub use config::{ConfigError, WorkerConfig};
pub use worker::SimWorker;
