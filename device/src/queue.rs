//! Command queue abstraction.
//!
//! Operations are batched on the queue and only reach the device on
//! [`CommandQueue::submit`]:
//!
//! ```ignore
//! queue.upload(&input);
//! queue.exec(program, &args, &ExecParams::new_1d(1024, 64));
//! queue.download(&output);
//! queue.submit()?;
//! ```

use std::sync::Arc;

use snafu::ensure;

use crate::buffer::Buffer;
use crate::device::{KernelArg, Program};
use crate::error::{InvalidLaunchSnafu, Result};

/// Kernel execution parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecParams {
    /// Global work size (total number of work items per dimension).
    pub global_size: [usize; 3],
    /// Local work size (work group size per dimension).
    pub local_size: [usize; 3],
    /// Number of meaningful dimensions (1, 2 or 3).
    pub dims: u8,
}

impl ExecParams {
    /// Create 1D execution parameters.
    pub fn new_1d(global: usize, local: usize) -> Self {
        Self { global_size: [global, 1, 1], local_size: [local, 1, 1], dims: 1 }
    }

    /// Create 2D execution parameters.
    pub fn new_2d(global: [usize; 2], local: [usize; 2]) -> Self {
        Self { global_size: [global[0], global[1], 1], local_size: [local[0], local[1], 1], dims: 2 }
    }

    /// Create 3D execution parameters.
    pub fn new_3d(global: [usize; 3], local: [usize; 3]) -> Self {
        Self { global_size: global, local_size: local, dims: 3 }
    }

    /// Total number of work items.
    pub fn work_items(&self) -> usize {
        self.global_size.iter().product()
    }

    /// Every local size must be non-zero and divide its global size.
    pub fn validate(&self) -> Result<()> {
        for (dim, (global, local)) in self.global_size.iter().zip(&self.local_size).enumerate() {
            ensure!(*local > 0, InvalidLaunchSnafu { reason: format!("local size of dimension {dim} is zero") });
            ensure!(
                global % local == 0,
                InvalidLaunchSnafu {
                    reason: format!("global size {global} of dimension {dim} is not a multiple of local size {local}")
                }
            );
        }
        Ok(())
    }
}

impl Default for ExecParams {
    fn default() -> Self {
        Self { global_size: [1, 1, 1], local_size: [1, 1, 1], dims: 1 }
    }
}

/// Command queue for submitting transfers and launches to a device.
///
/// All operations are deferred until `submit()`, which blocks until they
/// complete. Queues are `Send` but owned by a single thread at a time.
pub trait CommandQueue: Send + std::fmt::Debug {
    /// Enqueue a host-to-device copy of the buffer's host mirror.
    fn upload(&mut self, buffer: &Buffer);

    /// Enqueue a device-to-host refresh of the buffer's host mirror.
    fn download(&mut self, buffer: &Buffer);

    /// Enqueue a kernel launch.
    fn exec(&mut self, program: Arc<dyn Program>, args: &[KernelArg], params: &ExecParams);

    /// Insert a memory barrier.
    fn memory_barrier(&mut self);

    /// Run everything enqueued so far and wait for completion.
    fn submit(&mut self) -> Result<()>;

    /// Number of operations waiting for `submit()`.
    fn pending(&self) -> usize;
}

/// Pending operation in the host queue.
enum PendingOp {
    Upload(Buffer),
    Download(Buffer),
    Exec { program: Arc<dyn Program>, args: Vec<KernelArg>, params: ExecParams },
    MemoryBarrier,
}

/// Queue that executes operations in order on the calling thread.
#[derive(Default)]
pub struct HostQueue {
    pending: Vec<PendingOp>,
    launches: usize,
}

impl std::fmt::Debug for HostQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostQueue").field("pending_count", &self.pending.len()).field("launches", &self.launches).finish()
    }
}

impl HostQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of kernel launches completed by this queue.
    pub fn launches(&self) -> usize {
        self.launches
    }

    fn execute_op(&mut self, op: PendingOp) -> Result<()> {
        match op {
            PendingOp::Upload(buffer) => buffer.upload(),
            PendingOp::Download(buffer) => buffer.download().map(|_| ()),
            PendingOp::Exec { program, args, params } => {
                params.validate()?;
                tracing::trace!(kernel.name = program.name(), work_items = params.work_items(), "launching");
                program.launch(&args, &params)?;
                self.launches += 1;
                Ok(())
            }
            PendingOp::MemoryBarrier => {
                std::sync::atomic::fence(std::sync::atomic::Ordering::SeqCst);
                Ok(())
            }
        }
    }
}

impl CommandQueue for HostQueue {
    fn upload(&mut self, buffer: &Buffer) {
        self.pending.push(PendingOp::Upload(buffer.clone()));
    }

    fn download(&mut self, buffer: &Buffer) {
        self.pending.push(PendingOp::Download(buffer.clone()));
    }

    fn exec(&mut self, program: Arc<dyn Program>, args: &[KernelArg], params: &ExecParams) {
        self.pending.push(PendingOp::Exec { program, args: args.to_vec(), params: *params });
    }

    fn memory_barrier(&mut self) {
        self.pending.push(PendingOp::MemoryBarrier);
    }

    fn submit(&mut self) -> Result<()> {
        let ops = std::mem::take(&mut self.pending);
        for op in ops {
            self.execute_op(op)?;
        }
        Ok(())
    }

    fn pending(&self) -> usize {
        self.pending.len()
    }
}
