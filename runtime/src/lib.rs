//! Kernel runtime for tessera.
//!
//! Coordinates compute kernels with a render loop:
//! - the [`ArgumentStore`] owns typed buffers and scalars per kernel
//! - the [`Executor`] parses kernel signatures, binds arguments and dispatches
//! - the [`Scheduler`] drains deferred [`BufferJob`]s and [`KernelJob`]s once
//!   per render tick and throttles the simulation step with a run budget
//!
//! # Threading
//!
//! One render thread owns the `Executor` and calls
//! [`Scheduler::check_and_run`]; any number of producer threads share the
//! `Scheduler` through an `Arc` and enqueue jobs.

pub mod config;
pub mod error;
pub mod executor;
pub mod jobs;
pub mod kernel;
pub mod scheduler;
pub mod signature;
pub mod sources;
pub mod store;


pub use config::{RuntimeConfig, SchedulerConfig};
pub use error::*;
pub use executor::Executor;
pub use jobs::{BufferJob, KernelJob};
pub use kernel::{BindMode, Kernel, KernelId, KernelRegistry};
pub use scheduler::{Phase, Scheduler, SimulationStep, TickReport};
pub use signature::{ArgSlot, Signature};
pub use sources::KernelSources;
pub use store::{ArgTable, ArgumentStore, BufferSlot, FillMode, FillOutcome, PrintMode};
