//! Device layer: buffers, shared-buffer acquisition, command queues, programs,
//! and device selection.

pub mod allocator;
pub mod buffer;
pub mod device;
pub mod error;
pub mod interop;
pub mod queue;
pub mod registry;

#[cfg(test)]
pub mod test;

pub use allocator::{Allocator, BufferOptions, HostAllocator, RawBuffer};
pub use buffer::{Buffer, BufferId};
pub use device::{
    Compiler, Device, DeviceInfo, DeviceKind, HostCompiler, HostKernelFn, KernelArg, LaunchArgs, Program,
    QueueFactory,
};
pub use error::{Error, Result};
pub use interop::{SharedAcquisition, SharedHandle};
pub use queue::{CommandQueue, ExecParams, HostQueue};
pub use registry::{DeviceFilter, DeviceRegistry, get_device, host, registry};
