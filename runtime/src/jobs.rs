//! Deferred buffer and kernel operations.
//!
//! Jobs are immutable records built on producer threads and run on the tick
//! thread against the executor, each exactly once.

use tessera_device::{ExecParams, SharedHandle};
use tessera_dtype::{Access, ElemType, HostData};

use crate::error::Result;
use crate::executor::Executor;
use crate::store::FillMode;

/// A buffer mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum BufferJob {
    /// Create a buffer of `len` elements at `slot` and fill it with `values`.
    Create { kernel: String, slot: usize, len: usize, values: HostData, access: Access, mode: FillMode },
    /// Create a buffer shared with an external resource and fill it with `values`.
    CreateShared {
        kernel: String,
        slot: usize,
        len: usize,
        values: HostData,
        access: Access,
        mode: FillMode,
        handle: SharedHandle,
    },
    /// Rewrite an existing buffer.
    Update { kernel: String, slot: usize, values: HostData, mode: FillMode },
    /// Rewrite an existing shared buffer inside an acquire/release cycle.
    UpdateShared { kernel: String, slot: usize, values: HostData, mode: FillMode },
    /// Alias a buffer of one kernel into another.
    Copy { elem: ElemType, src: String, src_slot: usize, dst: String, dst_slot: usize, set_mode: bool },
}

impl BufferJob {
    /// Kernel whose arguments the job changes.
    pub fn kernel(&self) -> &str {
        match self {
            Self::Create { kernel, .. }
            | Self::CreateShared { kernel, .. }
            | Self::Update { kernel, .. }
            | Self::UpdateShared { kernel, .. } => kernel,
            Self::Copy { dst, .. } => dst,
        }
    }

    pub fn run(&self, executor: &mut Executor) -> Result<()> {
        match self {
            Self::Create { kernel, slot, len, values, access, mode } => {
                executor.create_buffer_filled(kernel, *slot, *len, values, *access, *mode)?;
            }
            Self::CreateShared { kernel, slot, len, values, access, mode, handle } => {
                executor.create_shared_buffer_filled(kernel, *slot, *len, values, *access, *mode, *handle)?;
            }
            Self::Update { kernel, slot, values, mode } => {
                executor.update_buffer(kernel, *slot, values, *mode)?;
            }
            Self::UpdateShared { kernel, slot, values, mode } => {
                executor.update_shared_buffer(kernel, *slot, values, *mode)?;
            }
            Self::Copy { elem, src, src_slot, dst, dst_slot, set_mode } => {
                executor.copy_buffer(*elem, src, *src_slot, dst, *dst_slot, *set_mode)?;
            }
        }
        Ok(())
    }
}

/// A kernel dispatch with a fixed launch shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelJob {
    pub kernel: String,
    pub params: ExecParams,
}

impl KernelJob {
    pub fn new(kernel: impl Into<String>, params: ExecParams) -> Self {
        Self { kernel: kernel.into(), params }
    }

    pub fn new_1d(kernel: impl Into<String>, global: usize, local: usize) -> Self {
        Self::new(kernel, ExecParams::new_1d(global, local))
    }

    pub fn new_2d(kernel: impl Into<String>, global: [usize; 2], local: [usize; 2]) -> Self {
        Self::new(kernel, ExecParams::new_2d(global, local))
    }

    pub fn new_3d(kernel: impl Into<String>, global: [usize; 3], local: [usize; 3]) -> Self {
        Self::new(kernel, ExecParams::new_3d(global, local))
    }

    pub fn run(&self, executor: &mut Executor) -> Result<()> {
        executor.dispatch(&self.kernel, self.params)
    }
}
