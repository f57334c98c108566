use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use snafu::ensure;

use crate::error::{Result, SizeMismatchSnafu};

/// Opaque handle to device memory.
#[derive(Debug)]
pub enum RawBuffer {
    /// Device memory emulated in system memory.
    Host { data: Mutex<Box<[u8]>> },
}

impl RawBuffer {
    /// Get the size of the buffer in bytes.
    pub fn size(&self) -> usize {
        match self {
            RawBuffer::Host { data } => data.lock().len(),
        }
    }

    /// Copy host bytes into device memory.
    pub fn write(&self, src: &[u8]) -> Result<()> {
        match self {
            RawBuffer::Host { data } => {
                let mut data = data.lock();
                ensure!(data.len() == src.len(), SizeMismatchSnafu { expected: data.len(), actual: src.len() });
                data.copy_from_slice(src);
                Ok(())
            }
        }
    }

    /// Copy device memory into host bytes.
    pub fn read(&self, dst: &mut [u8]) -> Result<()> {
        match self {
            RawBuffer::Host { data } => {
                let data = data.lock();
                ensure!(data.len() == dst.len(), SizeMismatchSnafu { expected: data.len(), actual: dst.len() });
                dst.copy_from_slice(&data);
                Ok(())
            }
        }
    }
}

/// Options for buffer allocation.
#[derive(Debug, Clone, Default)]
pub struct BufferOptions {
    /// Whether to zero-initialize the buffer.
    pub zero_init: bool,
}

pub trait Allocator: Send + Sync + std::fmt::Debug {
    fn alloc(&self, size: usize, options: &BufferOptions) -> Result<RawBuffer>;
    fn free(&self, _buffer: RawBuffer) {}
    fn name(&self) -> &str;
    /// Bytes currently held by live allocations.
    fn allocated_bytes(&self) -> usize;
}

/// Allocator backing device buffers with system memory.
#[derive(Debug, Default)]
pub struct HostAllocator {
    allocated: AtomicUsize,
}

impl HostAllocator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Allocator for HostAllocator {
    fn alloc(&self, size: usize, _options: &BufferOptions) -> Result<RawBuffer> {
        // System memory is always zeroed here; the option only matters for real devices.
        let data = vec![0u8; size].into_boxed_slice();
        self.allocated.fetch_add(size, Ordering::Relaxed);
        Ok(RawBuffer::Host { data: Mutex::new(data) })
    }

    fn free(&self, buffer: RawBuffer) {
        self.allocated.fetch_sub(buffer.size(), Ordering::Relaxed);
    }

    fn name(&self) -> &str {
        "HOST"
    }

    fn allocated_bytes(&self) -> usize {
        self.allocated.load(Ordering::Relaxed)
    }
}
