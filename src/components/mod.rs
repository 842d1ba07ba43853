//! # Shared leaf components.
//!
//! Small services other services depend on. Both register at a high priority so they
//! are initialized before their users:
//! - [`WorkerPool`]: roster of workers, reports one status line per worker.
//! - [`ProcessorController`]: holds the single active [`Processor`].

mod processor_controller;
mod worker_pool;

pub use processor_controller::{Processor, ProcessorController};
pub use worker_pool::{Worker, WorkerPool};
