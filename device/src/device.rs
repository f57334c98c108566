//! Device abstraction.
//!
//! A [`Device`] bundles what the runtime needs to run kernels on one backend:
//! - **Allocator**: device memory for buffers
//! - **Compiler**: turns kernel source plus an entry point into a [`Program`]
//! - **Queue factory**: creates command queues for transfers and launches
//!
//! The in-tree backend is the host backend. Its compiler resolves entry points
//! against Rust functions registered on a [`HostCompiler`], which lets the
//! runtime be driven end to end without a GPU.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use snafu::{OptionExt, ensure};
use tessera_dtype::{Element, Scalar};

use crate::allocator::{Allocator, HostAllocator};
use crate::buffer::Buffer;
use crate::error::{
    ArgIndexSnafu, ArgKindMismatchSnafu, EntryPointNotDeclaredSnafu, EntryPointNotFoundSnafu, Result,
};
use crate::queue::{CommandQueue, ExecParams, HostQueue};

/// One bound kernel argument.
#[derive(Debug, Clone)]
pub enum KernelArg {
    Buffer(Buffer),
    Scalar(Scalar),
}

impl KernelArg {
    pub fn as_buffer(&self) -> Option<&Buffer> {
        match self {
            Self::Buffer(buffer) => Some(buffer),
            Self::Scalar(_) => None,
        }
    }

    pub fn as_scalar(&self) -> Option<Scalar> {
        match self {
            Self::Scalar(scalar) => Some(*scalar),
            Self::Buffer(_) => None,
        }
    }
}

/// A compiled, executable kernel program.
pub trait Program: Send + Sync + std::fmt::Debug {
    /// Execute the kernel with its bound arguments.
    fn launch(&self, args: &[KernelArg], params: &ExecParams) -> Result<()>;

    /// Get the kernel name (for debugging/profiling).
    fn name(&self) -> &str;
}

/// Builds executable programs from kernel source.
pub trait Compiler: Send + Sync + std::fmt::Debug {
    /// Compile `src` and return the program for entry point `entry`.
    fn compile(&self, entry: &str, src: &str) -> Result<Arc<dyn Program>>;
}

/// Factory creating command queues for a device.
pub type QueueFactory = Arc<dyn Fn() -> Box<dyn CommandQueue> + Send + Sync>;

/// Broad class of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Cpu,
    Gpu,
}

/// Static properties of a device used by selection and launch sizing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub vendor: String,
    pub kind: DeviceKind,
    /// Maximum number of work items in one work group.
    pub max_work_group_size: usize,
}

impl DeviceInfo {
    /// Largest local size not above `max` that divides `global`, or the
    /// fallback when `global` fits in one group.
    fn local_size_within(global: usize, max: usize, fallback: usize) -> usize {
        if global <= max {
            return fallback.max(1);
        }
        let mut local = max.max(1);
        while global % local != 0 && local > 1 {
            local -= 1;
        }
        local
    }

    pub fn max_local_size_1d(&self, global: usize) -> usize {
        Self::local_size_within(global, self.max_work_group_size, global)
    }

    /// Per-dimension local size for a square work group.
    pub fn max_local_size_2d(&self, global: usize) -> usize {
        let max = (self.max_work_group_size as f64).sqrt() as usize;
        Self::local_size_within(global, max, (global as f64).sqrt() as usize)
    }

    /// Per-dimension local size for a cubic work group.
    pub fn max_local_size_3d(&self, global: usize) -> usize {
        let max = (self.max_work_group_size as f64).cbrt() as usize;
        Self::local_size_within(global, max, (global as f64).cbrt() as usize)
    }
}

/// A device that owns its allocator, compiler, and queue factory.
pub struct Device {
    pub info: DeviceInfo,
    pub allocator: Arc<dyn Allocator>,
    pub compiler: Arc<dyn Compiler>,
    pub queues: QueueFactory,
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device").field("info", &self.info).field("allocator", &self.allocator.name()).finish()
    }
}

impl Device {
    pub fn new(
        info: DeviceInfo,
        allocator: Arc<dyn Allocator>,
        compiler: Arc<dyn Compiler>,
        queues: QueueFactory,
    ) -> Self {
        Self { info, allocator, compiler, queues }
    }

    /// Host device running kernels registered on `compiler`.
    pub fn host(compiler: Arc<HostCompiler>) -> Self {
        let info = DeviceInfo {
            name: "host".to_string(),
            vendor: "tessera".to_string(),
            kind: DeviceKind::Cpu,
            max_work_group_size: 1024,
        };
        let queues: QueueFactory = Arc::new(|| -> Box<dyn CommandQueue> { Box::new(HostQueue::new()) });
        Self::new(info, Arc::new(HostAllocator::new()), compiler, queues)
    }

    pub fn create_queue(&self) -> Box<dyn CommandQueue> {
        (self.queues)()
    }
}

// =============================================================================
// Host backend
// =============================================================================

/// Signature of a kernel body on the host backend.
pub type HostKernelFn = Arc<dyn Fn(&mut LaunchArgs<'_>) -> Result<()> + Send + Sync>;

/// Compiler for the host backend: entry points map to registered Rust functions.
#[derive(Default)]
pub struct HostCompiler {
    kernels: RwLock<HashMap<String, HostKernelFn>>,
}

impl std::fmt::Debug for HostCompiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kernels = self.kernels.read();
        f.debug_struct("HostCompiler").field("kernels", &kernels.keys().collect::<Vec<_>>()).finish()
    }
}

impl HostCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the body for entry point `name`.
    pub fn register<F>(&self, name: impl Into<String>, body: F)
    where
        F: Fn(&mut LaunchArgs<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.kernels.write().insert(name.into(), Arc::new(body));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.kernels.read().contains_key(name)
    }
}

impl Compiler for HostCompiler {
    fn compile(&self, entry: &str, src: &str) -> Result<Arc<dyn Program>> {
        ensure!(src.contains(entry), EntryPointNotDeclaredSnafu { name: entry });
        let body = self.kernels.read().get(entry).cloned().context(EntryPointNotFoundSnafu { name: entry })?;
        tracing::debug!(kernel.name = entry, "host kernel resolved");
        Ok(Arc::new(HostProgram { name: entry.to_string(), body }))
    }
}

/// Program executed by calling a registered host function.
pub struct HostProgram {
    name: String,
    body: HostKernelFn,
}

impl std::fmt::Debug for HostProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostProgram").field("name", &self.name).finish()
    }
}

impl Program for HostProgram {
    fn launch(&self, args: &[KernelArg], params: &ExecParams) -> Result<()> {
        let mut launch = LaunchArgs { args, params };
        (self.body)(&mut launch)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// View of the bound arguments handed to a host kernel body.
///
/// Buffer accessors work on device memory, exactly as a device kernel would.
#[derive(Debug)]
pub struct LaunchArgs<'a> {
    args: &'a [KernelArg],
    params: &'a ExecParams,
}

impl<'a> LaunchArgs<'a> {
    pub fn params(&self) -> &ExecParams {
        self.params
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    fn arg(&self, index: usize) -> Result<&'a KernelArg> {
        self.args.get(index).context(ArgIndexSnafu { index, len: self.args.len() })
    }

    pub fn scalar(&self, index: usize) -> Result<Scalar> {
        self.arg(index)?.as_scalar().context(ArgKindMismatchSnafu { index, expected: "scalar" })
    }

    /// Typed scalar argument.
    pub fn value<T: Element>(&self, index: usize) -> Result<T> {
        let scalar = self.scalar(index)?;
        T::from_scalar(scalar).context(ArgKindMismatchSnafu { index, expected: format!("{} scalar", T::ELEM) })
    }

    pub fn buffer(&self, index: usize) -> Result<&'a Buffer> {
        self.arg(index)?.as_buffer().context(ArgKindMismatchSnafu { index, expected: "buffer" })
    }

    pub fn read<T: Element>(&self, index: usize) -> Result<Vec<T>> {
        self.buffer(index)?.read_device()
    }

    pub fn write<T: Element>(&self, index: usize, values: &[T]) -> Result<()> {
        self.buffer(index)?.write_device(values)
    }

    /// Read-modify-write a buffer argument in device memory.
    pub fn update<T: Element>(&self, index: usize, f: impl FnOnce(&mut [T])) -> Result<()> {
        let buffer = self.buffer(index)?;
        let mut values = buffer.read_device::<T>()?;
        f(&mut values);
        buffer.write_device(&values)
    }
}
