//! Tick-driven job scheduler.
//!
//! Producer threads enqueue buffer and kernel jobs; the render thread calls
//! [`Scheduler::check_and_run`] once per frame to drain them against the
//! executor and to advance the simulation step.
//!
//! # Phases
//!
//! ```text
//! Idle --schedule--> Pending --tick--> Draining --done--> Idle
//!                                          |
//!                                          +--jobs arrived meanwhile--> Pending
//! ```
//!
//! Each domain (buffer jobs, kernel jobs) holds at most one undrained batch. A
//! `schedule*` call on a domain with a pending batch blocks until a tick drains
//! it.
//!
//! # Step budget
//!
//! Independent of job draining, every tick with a positive budget (or with
//! always-run set) runs the simulation callback and the position and color
//! kernels. The budget decrements once per such tick.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::{Condvar, Mutex, MutexGuard};
use tessera_device::{ExecParams, SharedHandle};
use tessera_dtype::{Access, ElemType, HostData};

use crate::config::SchedulerConfig;
use crate::error::Result;
use crate::executor::Executor;
use crate::jobs::{BufferJob, KernelJob};
use crate::store::FillMode;

/// Scheduler state machine phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, strum::Display)]
pub enum Phase {
    #[default]
    Idle,
    Pending,
    Draining,
}

/// Callback run once per budgeted tick, before the step kernels.
pub trait SimulationStep: Send + Sync {
    fn step(&self, executor: &mut Executor) -> Result<()>;
}

impl<F> SimulationStep for F
where
    F: Fn(&mut Executor) -> Result<()> + Send + Sync,
{
    fn step(&self, executor: &mut Executor) -> Result<()> {
        self(executor)
    }
}

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Zero-based tick number.
    pub tick: u64,
    pub buffer_jobs: usize,
    pub kernel_jobs: usize,
    pub simulation_ran: bool,
    pub position_dispatched: bool,
    pub color_dispatched: bool,
}

impl TickReport {
    pub fn drained(&self) -> bool {
        self.buffer_jobs + self.kernel_jobs > 0
    }

    /// At least one of the simulation step and the step kernels ran.
    pub fn step_fired(&self) -> bool {
        self.simulation_ran || self.position_dispatched || self.color_dispatched
    }
}

#[derive(Default)]
struct StepPlan {
    position: Option<KernelJob>,
    color: Option<KernelJob>,
    simulation: Option<Arc<dyn SimulationStep>>,
}

#[derive(Default)]
struct State {
    buffer_jobs: Vec<BufferJob>,
    kernel_jobs: Vec<KernelJob>,
    phase: Phase,
    /// Completed drains; waiters wake on every increment.
    drains: u64,
    ticks: u64,
    initiated: bool,
    plan: StepPlan,
}

impl State {
    fn has_jobs(&self) -> bool {
        !self.buffer_jobs.is_empty() || !self.kernel_jobs.is_empty()
    }

    fn mark_pending(&mut self) {
        if self.phase == Phase::Idle && self.has_jobs() {
            self.phase = Phase::Pending;
        }
    }
}

/// Serialises job batches against the render tick. Shared through `Arc`.
pub struct Scheduler {
    state: Mutex<State>,
    drained: Condvar,
    initiated: Condvar,
    budget: AtomicU64,
    always_run: AtomicBool,
    runs_completed: AtomicU64,
    stall_warning: Duration,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Scheduler")
            .field("phase", &state.phase)
            .field("buffer_jobs", &state.buffer_jobs.len())
            .field("kernel_jobs", &state.kernel_jobs.len())
            .field("budget", &self.budget.load(Ordering::Relaxed))
            .field("always_run", &self.always_run.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            state: Mutex::new(State::default()),
            drained: Condvar::new(),
            initiated: Condvar::new(),
            budget: AtomicU64::new(config.run_chunk),
            always_run: AtomicBool::new(config.always_run),
            runs_completed: AtomicU64::new(0),
            stall_warning: config.stall_warning,
        }
    }

    pub fn phase(&self) -> Phase {
        self.state.lock().phase
    }

    /// Number of completed drains.
    pub fn drains(&self) -> u64 {
        self.state.lock().drains
    }

    /// Undrained (buffer, kernel) job counts.
    pub fn pending_jobs(&self) -> (usize, usize) {
        let state = self.state.lock();
        (state.buffer_jobs.len(), state.kernel_jobs.len())
    }

    // =========================================================================
    // Producers
    // =========================================================================

    /// Block while `pending` holds, warning every stall interval.
    fn wait_for_drain(&self, state: &mut MutexGuard<'_, State>, domain: &'static str, pending: impl Fn(&State) -> bool) {
        let mut waited = Duration::ZERO;
        while pending(&**state) {
            if self.drained.wait_for(state, self.stall_warning).timed_out() {
                waited += self.stall_warning;
                tracing::warn!(domain, waited_ms = waited.as_millis() as u64, "still waiting for a tick to drain");
            }
        }
    }

    pub fn schedule_buffer(&self, job: BufferJob) {
        self.schedule_buffers([job]);
    }

    /// Enqueue a batch of buffer jobs, waiting for the previous batch to drain.
    pub fn schedule_buffers(&self, jobs: impl IntoIterator<Item = BufferJob>) {
        let mut state = self.state.lock();
        self.wait_for_drain(&mut state, "buffer", |s| !s.buffer_jobs.is_empty());
        state.buffer_jobs.extend(jobs);
        state.mark_pending();
        tracing::trace!(queued = state.buffer_jobs.len(), "buffer jobs scheduled");
    }

    pub fn schedule_kernel(&self, job: KernelJob) {
        self.schedule_kernels([job]);
    }

    /// Enqueue a batch of kernel jobs, waiting for the previous batch to drain.
    pub fn schedule_kernels(&self, jobs: impl IntoIterator<Item = KernelJob>) {
        let mut state = self.state.lock();
        self.wait_for_drain(&mut state, "kernel", |s| !s.kernel_jobs.is_empty());
        state.kernel_jobs.extend(jobs);
        state.mark_pending();
        tracing::trace!(queued = state.kernel_jobs.len(), "kernel jobs scheduled");
    }

    pub fn schedule_create_buffer(
        &self,
        kernel: impl Into<String>,
        slot: usize,
        len: usize,
        values: impl Into<HostData>,
        access: Access,
        mode: FillMode,
    ) {
        let values = values.into();
        self.schedule_buffer(BufferJob::Create { kernel: kernel.into(), slot, len, values, access, mode });
    }

    #[allow(clippy::too_many_arguments)]
    pub fn schedule_create_shared(
        &self,
        kernel: impl Into<String>,
        slot: usize,
        len: usize,
        values: impl Into<HostData>,
        access: Access,
        mode: FillMode,
        handle: SharedHandle,
    ) {
        self.schedule_buffer(BufferJob::CreateShared {
            kernel: kernel.into(),
            slot,
            len,
            values: values.into(),
            access,
            mode,
            handle,
        });
    }

    pub fn schedule_update_buffer(
        &self,
        kernel: impl Into<String>,
        slot: usize,
        values: impl Into<HostData>,
        mode: FillMode,
    ) {
        self.schedule_buffer(BufferJob::Update { kernel: kernel.into(), slot, values: values.into(), mode });
    }

    pub fn schedule_update_shared(
        &self,
        kernel: impl Into<String>,
        slot: usize,
        values: impl Into<HostData>,
        mode: FillMode,
    ) {
        self.schedule_buffer(BufferJob::UpdateShared { kernel: kernel.into(), slot, values: values.into(), mode });
    }

    pub fn schedule_copy_buffer(
        &self,
        elem: ElemType,
        src: impl Into<String>,
        src_slot: usize,
        dst: impl Into<String>,
        dst_slot: usize,
        set_mode: bool,
    ) {
        self.schedule_buffer(BufferJob::Copy { elem, src: src.into(), src_slot, dst: dst.into(), dst_slot, set_mode });
    }

    pub fn schedule_kernel_1d(&self, kernel: impl Into<String>, global: usize, local: usize) {
        self.schedule_kernel(KernelJob::new_1d(kernel, global, local));
    }

    pub fn schedule_kernel_2d(&self, kernel: impl Into<String>, global: [usize; 2], local: [usize; 2]) {
        self.schedule_kernel(KernelJob::new_2d(kernel, global, local));
    }

    pub fn schedule_kernel_3d(&self, kernel: impl Into<String>, global: [usize; 3], local: [usize; 3]) {
        self.schedule_kernel(KernelJob::new_3d(kernel, global, local));
    }

    // =========================================================================
    // Tick
    // =========================================================================

    /// Drain pending jobs, then advance the simulation step.
    ///
    /// `frame` is the caller's frame context and is not inspected. On a job
    /// error the phase is restored, waiters are woken, the rest of the batch is
    /// dropped, and the step is skipped for this tick.
    #[tracing::instrument(skip_all)]
    pub fn check_and_run<F: ?Sized>(&self, executor: &mut Executor, _frame: &F) -> Result<TickReport> {
        let (tick, batch) = {
            let mut state = self.state.lock();
            let tick = state.ticks;
            state.ticks += 1;
            if !state.initiated {
                state.initiated = true;
                self.initiated.notify_all();
            }
            let batch = if state.phase == Phase::Pending {
                state.phase = Phase::Draining;
                Some((std::mem::take(&mut state.buffer_jobs), std::mem::take(&mut state.kernel_jobs)))
            } else {
                None
            };
            (tick, batch)
        };

        let mut report = TickReport { tick, ..Default::default() };
        if let Some((buffer_jobs, kernel_jobs)) = batch {
            report.buffer_jobs = buffer_jobs.len();
            report.kernel_jobs = kernel_jobs.len();
            let result = Self::drain(executor, &buffer_jobs, &kernel_jobs);
            {
                let mut state = self.state.lock();
                state.drains += 1;
                state.phase = if state.has_jobs() { Phase::Pending } else { Phase::Idle };
            }
            self.drained.notify_all();
            result?;
            tracing::debug!(tick, buffer_jobs = report.buffer_jobs, kernel_jobs = report.kernel_jobs, "batch drained");
        }

        self.run_step(executor, &mut report)?;
        Ok(report)
    }

    /// Buffer jobs first, then kernel jobs, each in enqueue order.
    fn drain(executor: &mut Executor, buffer_jobs: &[BufferJob], kernel_jobs: &[KernelJob]) -> Result<()> {
        let total = buffer_jobs.len() + kernel_jobs.len();
        for (done, job) in buffer_jobs.iter().enumerate() {
            if let Err(error) = job.run(executor) {
                tracing::warn!(kernel.name = job.kernel(), %error, dropped = total - done - 1, "buffer job failed");
                return Err(error);
            }
        }
        for (done, job) in kernel_jobs.iter().enumerate() {
            if let Err(error) = job.run(executor) {
                let dropped = total - buffer_jobs.len() - done - 1;
                tracing::warn!(kernel.name = %job.kernel, %error, dropped, "kernel job failed");
                return Err(error);
            }
        }
        Ok(())
    }

    fn run_step(&self, executor: &mut Executor, report: &mut TickReport) -> Result<()> {
        let budgeted =
            self.budget.fetch_update(Ordering::AcqRel, Ordering::Acquire, |budget| budget.checked_sub(1)).is_ok();
        if !budgeted && !self.always_run.load(Ordering::Acquire) {
            return Ok(());
        }

        let (simulation, position, color) = {
            let state = self.state.lock();
            (state.plan.simulation.clone(), state.plan.position.clone(), state.plan.color.clone())
        };

        let result = Self::fire_step(executor, report, simulation, position, color);
        // A step that fired partway still counts as a run.
        if report.step_fired() {
            self.runs_completed.fetch_add(1, Ordering::AcqRel);
        }
        result
    }

    fn fire_step(
        executor: &mut Executor,
        report: &mut TickReport,
        simulation: Option<Arc<dyn SimulationStep>>,
        position: Option<KernelJob>,
        color: Option<KernelJob>,
    ) -> Result<()> {
        if let Some(simulation) = simulation {
            simulation.step(executor)?;
            report.simulation_ran = true;
        }
        if let Some(position) = &position {
            position.run(executor)?;
            report.position_dispatched = true;
        }
        if let Some(color) = color
            && position.as_ref().is_none_or(|p| p.kernel != color.kernel)
        {
            color.run(executor)?;
            report.color_dispatched = true;
        }
        Ok(())
    }

    // =========================================================================
    // Step configuration
    // =========================================================================

    pub fn set_position_kernel(&self, kernel: impl Into<String>, params: ExecParams) {
        self.state.lock().plan.position = Some(KernelJob::new(kernel, params));
    }

    pub fn set_color_kernel(&self, kernel: impl Into<String>, params: ExecParams) {
        self.state.lock().plan.color = Some(KernelJob::new(kernel, params));
    }

    /// One kernel computing both; it runs once per step.
    pub fn set_position_color_kernel(&self, kernel: impl Into<String>, params: ExecParams) {
        let job = KernelJob::new(kernel, params);
        let mut state = self.state.lock();
        state.plan.color = Some(job.clone());
        state.plan.position = Some(job);
    }

    pub fn clear_step_kernels(&self) {
        let mut state = self.state.lock();
        state.plan.position = None;
        state.plan.color = None;
    }

    pub fn set_simulation_step(&self, step: impl SimulationStep + 'static) {
        self.state.lock().plan.simulation = Some(Arc::new(step));
    }

    pub fn clear_simulation_step(&self) {
        self.state.lock().plan.simulation = None;
    }

    /// Run the step for the next `runs` ticks, then pause.
    pub fn schedule_kernel_run_chunk(&self, runs: u64) {
        self.always_run.store(false, Ordering::Release);
        self.budget.store(runs, Ordering::Release);
    }

    /// With `off` set the step runs every tick regardless of the budget.
    pub fn set_kernel_chunk_runs_off(&self, off: bool) {
        self.always_run.store(off, Ordering::Release);
    }

    pub fn runs_completed(&self) -> u64 {
        self.runs_completed.load(Ordering::Acquire)
    }

    pub fn clear_runs_completed(&self) {
        self.runs_completed.store(0, Ordering::Release);
    }

    pub fn remaining_runs(&self) -> u64 {
        self.budget.load(Ordering::Acquire)
    }

    // =========================================================================
    // Start-up
    // =========================================================================

    pub fn is_initiated(&self) -> bool {
        self.state.lock().initiated
    }

    /// Mark the render loop as started without running a tick.
    pub fn mark_initiated(&self) {
        self.state.lock().initiated = true;
        self.initiated.notify_all();
    }

    /// Block until the first tick (or [`mark_initiated`](Self::mark_initiated)).
    pub fn wait_for_initiated(&self) {
        let mut state = self.state.lock();
        while !state.initiated {
            self.initiated.wait(&mut state);
        }
    }
}
