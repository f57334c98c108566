use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use snafu::{OptionExt, ensure};
use tessera_dtype::{ElemType, Element, HostData};

use crate::allocator::{Allocator, BufferOptions, RawBuffer};
use crate::error::{ElemMismatchSnafu, NotAllocatedSnafu, NotSharedSnafu, Result, SizeMismatchSnafu};
use crate::interop::{SharedHandle, SharedState};

static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(0);

/// Process-unique identity of a buffer's storage. Aliases share it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(u64);

impl std::fmt::Display for BufferId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "buf#{}", self.0)
    }
}

/// Storage shared by every alias of a buffer.
#[derive(Debug)]
struct BufferData {
    id: BufferId,
    elem: ElemType,
    len: usize,
    /// Host mirror, written by fills and refreshed by reads.
    host: Mutex<HostData>,
    /// Host mirror holds writes the device has not seen yet.
    host_dirty: AtomicBool,
    raw: Option<RawBuffer>,
    allocator: Arc<dyn Allocator>,
    shared: Option<SharedState>,
}

impl BufferData {
    fn raw(&self) -> Result<&RawBuffer> {
        self.raw.as_ref().context(NotAllocatedSnafu)
    }
}

impl Drop for BufferData {
    fn drop(&mut self) {
        if let Some(raw) = self.raw.take() {
            self.allocator.free(raw);
        }
    }
}

/// A typed device buffer with a host mirror.
///
/// Cloning yields an alias of the same storage, which is how one kernel's
/// output is fed to another kernel without copying device memory.
#[derive(Debug, Clone)]
pub struct Buffer {
    data: Arc<BufferData>,
}

impl Buffer {
    /// Allocate a zeroed buffer of `len` elements.
    pub fn allocate(allocator: Arc<dyn Allocator>, elem: ElemType, len: usize) -> Result<Self> {
        Self::with_state(allocator, elem, len, None)
    }

    /// Allocate a buffer whose storage is shared with the external resource `handle`.
    pub fn allocate_shared(
        allocator: Arc<dyn Allocator>,
        elem: ElemType,
        len: usize,
        handle: SharedHandle,
    ) -> Result<Self> {
        Self::with_state(allocator, elem, len, Some(SharedState::new(handle)))
    }

    fn with_state(
        allocator: Arc<dyn Allocator>,
        elem: ElemType,
        len: usize,
        shared: Option<SharedState>,
    ) -> Result<Self> {
        let raw = allocator.alloc(len * elem.bytes(), &BufferOptions { zero_init: true })?;
        let id = BufferId(NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed));
        Ok(Self {
            data: Arc::new(BufferData {
                id,
                elem,
                len,
                host: Mutex::new(HostData::zeroed(elem, len)),
                host_dirty: AtomicBool::new(false),
                raw: Some(raw),
                allocator,
                shared,
            }),
        })
    }

    pub fn id(&self) -> BufferId {
        self.data.id
    }

    pub fn elem(&self) -> ElemType {
        self.data.elem
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.len
    }

    pub fn is_empty(&self) -> bool {
        self.data.len == 0
    }

    /// Size in bytes.
    pub fn size(&self) -> usize {
        self.data.len * self.data.elem.bytes()
    }

    /// `true` when both handles point at the same storage.
    pub fn same_storage(&self, other: &Buffer) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    pub fn is_host_dirty(&self) -> bool {
        self.data.host_dirty.load(Ordering::Acquire)
    }

    fn check_elem<T: Element>(&self) -> Result<()> {
        ensure!(T::ELEM == self.data.elem, ElemMismatchSnafu { expected: self.data.elem, actual: T::ELEM });
        Ok(())
    }

    // =========================================================================
    // Host mirror
    // =========================================================================

    /// Run `f` over the host mirror.
    pub fn with_host<T: Element, R>(&self, f: impl FnOnce(&[T]) -> R) -> Result<R> {
        self.check_elem::<T>()?;
        let host = self.data.host.lock();
        let values = T::slice(&host).context(ElemMismatchSnafu { expected: self.data.elem, actual: T::ELEM })?;
        Ok(f(values))
    }

    /// Run `f` over the host mirror and mark it as newer than the device copy.
    pub fn with_host_mut<T: Element, R>(&self, f: impl FnOnce(&mut [T]) -> R) -> Result<R> {
        self.check_elem::<T>()?;
        let mut host = self.data.host.lock();
        let values =
            T::slice_mut(&mut host).context(ElemMismatchSnafu { expected: self.data.elem, actual: T::ELEM })?;
        let result = f(values);
        self.data.host_dirty.store(true, Ordering::Release);
        Ok(result)
    }

    /// Copy of the host mirror.
    pub fn host_snapshot(&self) -> HostData {
        self.data.host.lock().clone()
    }

    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        self.with_host(|values: &[T]| values.to_vec())
    }

    // =========================================================================
    // Host <-> device transfers
    // =========================================================================

    /// Copy the host mirror into device memory.
    pub fn upload(&self) -> Result<()> {
        let host = self.data.host.lock();
        self.data.raw()?.write(host.as_bytes())?;
        self.data.host_dirty.store(false, Ordering::Release);
        Ok(())
    }

    /// Refresh the host mirror from device memory.
    ///
    /// A dirty mirror is newer than the device copy and is left untouched;
    /// returns whether a read happened.
    pub fn download(&self) -> Result<bool> {
        let mut host = self.data.host.lock();
        if self.data.host_dirty.load(Ordering::Acquire) {
            tracing::trace!(buffer = %self.data.id, "host mirror is newer than device, skipping read");
            return Ok(false);
        }
        self.data.raw()?.read(host.as_bytes_mut())?;
        Ok(true)
    }

    /// Overwrite the host mirror with device memory, discarding pending host writes.
    pub fn refresh(&self) -> Result<()> {
        let mut host = self.data.host.lock();
        self.data.raw()?.read(host.as_bytes_mut())?;
        self.data.host_dirty.store(false, Ordering::Release);
        Ok(())
    }

    /// Read device memory directly, bypassing the host mirror.
    pub fn read_device<T: Element>(&self) -> Result<Vec<T>> {
        self.check_elem::<T>()?;
        let mut values = vec![T::default(); self.data.len];
        self.data.raw()?.read(bytemuck::cast_slice_mut(&mut values))?;
        Ok(values)
    }

    /// Overwrite device memory directly, bypassing the host mirror.
    pub fn write_device<T: Element>(&self, values: &[T]) -> Result<()> {
        self.check_elem::<T>()?;
        ensure!(values.len() == self.data.len, SizeMismatchSnafu { expected: self.data.len, actual: values.len() });
        self.data.raw()?.write(bytemuck::cast_slice(values))
    }

    // =========================================================================
    // Shared buffers
    // =========================================================================

    pub fn is_shared(&self) -> bool {
        self.data.shared.is_some()
    }

    pub fn shared_handle(&self) -> Option<SharedHandle> {
        self.data.shared.as_ref().map(|s| s.handle)
    }

    pub fn is_acquired(&self) -> bool {
        self.data.shared.as_ref().is_some_and(SharedState::is_acquired)
    }

    /// How many times the buffer has been acquired and released so far.
    pub fn acquire_counts(&self) -> (u64, u64) {
        self.data.shared.as_ref().map_or((0, 0), |s| (s.acquisitions(), s.releases()))
    }

    /// Take the buffer from the external owner.
    pub fn acquire_shared(&self) -> Result<()> {
        self.data.shared.as_ref().context(NotSharedSnafu)?.acquire()
    }

    /// Hand the buffer back to the external owner; returns whether it was held.
    pub fn release_shared(&self) -> bool {
        self.data.shared.as_ref().is_some_and(SharedState::release)
    }
}
