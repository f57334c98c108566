//! Kernel executor.
//!
//! The [`Executor`] ties the kernel registry and the argument store to one
//! device and command queue. All public operations address kernels by name;
//! names resolve to [`KernelId`] handles once per call.
//!
//! A dispatch runs these steps:
//! 1. resolve the kernel (`KernelNotFound` if unknown)
//! 2. bind arguments if the kernel was never bound
//! 3. acquire shared buffers, upload plain buffers whose host mirror is dirty
//! 4. launch and wait for the queue
//! 5. read back every plain buffer whose slot was registered as an output
//! 6. release shared buffers (on every exit path)

use std::path::PathBuf;
use std::sync::Arc;

use smallvec::SmallVec;
use snafu::{OptionExt, ResultExt};
use tessera_device::{Buffer, CommandQueue, Device, DeviceInfo, ExecParams, KernelArg, SharedAcquisition, SharedHandle};
use tessera_dtype::{Access, ArgKind, ElemType, Element, HostData, Scalar};

use crate::config::RuntimeConfig;
use crate::error::{DeviceSnafu, InvalidDirectionSnafu, Result, UnsupportedTypeSnafu};
use crate::kernel::{BindMode, KernelId, KernelRegistry};
use crate::signature::{ArgSlot, Signature};
use crate::sources::KernelSources;
use crate::store::{ArgumentStore, FillMode, FillOutcome};

/// Runs kernels on one device.
pub struct Executor {
    device: Arc<Device>,
    queue: Box<dyn CommandQueue>,
    kernels: KernelRegistry,
    store: ArgumentStore,
    sources: KernelSources,
    config: RuntimeConfig,
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("device", &self.device.info.name)
            .field("kernels", &self.kernels.len())
            .field("config", &self.config)
            .finish()
    }
}

impl Executor {
    pub fn new(device: Arc<Device>, config: RuntimeConfig) -> Self {
        let queue = device.create_queue();
        let mut store = ArgumentStore::new(Arc::clone(&device.allocator));
        store.set_print_mode(config.print_mode);
        store.set_quiet(config.quiet);
        let sources = KernelSources::new(config.kernel_paths.iter().cloned());
        tracing::debug!(device.name = %device.info.name, "executor created");
        Self { device, queue, kernels: KernelRegistry::new(), store, sources, config }
    }

    /// Executor on the registered device matching `config.device`.
    pub fn from_config(config: RuntimeConfig) -> Result<Self> {
        let device = tessera_device::get_device(&config.device).context(DeviceSnafu)?;
        Ok(Self::new(device, config))
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    pub fn device_info(&self) -> &DeviceInfo {
        &self.device.info
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn kernels(&self) -> &KernelRegistry {
        &self.kernels
    }

    pub fn store(&self) -> &ArgumentStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ArgumentStore {
        &mut self.store
    }

    pub fn sources(&self) -> &KernelSources {
        &self.sources
    }

    pub fn add_kernel_search_dir(&mut self, dir: impl Into<PathBuf>) {
        self.sources.add_dir(dir);
    }

    pub fn set_quiet(&mut self, quiet: bool) {
        self.config.quiet = quiet;
        self.store.set_quiet(quiet);
    }

    pub fn kernel_id(&self, name: &str) -> Result<KernelId> {
        self.kernels.lookup(name)
    }

    pub fn signature(&self, name: &str) -> Result<&Signature> {
        Ok(self.kernels.by_name(name)?.signature())
    }

    // =========================================================================
    // Kernels
    // =========================================================================

    /// Parse, compile and register a kernel.
    ///
    /// Registering a name twice keeps the first kernel.
    #[tracing::instrument(skip_all, fields(kernel.name = name))]
    pub fn create_kernel(&mut self, name: &str, source: &str) -> Result<KernelId> {
        if let Ok(id) = self.kernels.lookup(name) {
            tracing::warn!("kernel already registered, keeping its signature");
            return Ok(id);
        }

        let signature = Signature::parse(source)?;
        let program = self.device.compiler.compile(name, source).context(DeviceSnafu)?;
        let families: SmallVec<[(ArgKind, ElemType); 6]> = signature.families().collect();
        let params = signature.len();

        let Some(id) = self.kernels.insert(name, signature, program) else {
            return self.kernels.lookup(name);
        };
        self.store.register(id, name);
        for (kind, elem) in families {
            self.store.init_family(id, kind, elem)?;
        }
        tracing::debug!(%id, params, "kernel created");
        Ok(id)
    }

    /// Load `file` (default `<name>.cl`) from the kernel search directories.
    pub fn create_kernel_from_file(&mut self, name: &str, file: Option<&str>) -> Result<KernelId> {
        let file = file.map_or_else(|| format!("{name}.cl"), str::to_string);
        let (_, source) = self.sources.load(&file)?;
        self.create_kernel(name, &source)
    }

    /// Bind the stored arguments to the kernel's signature.
    ///
    /// `rebind` is a request: a kernel that was never bound always appends, a
    /// bound kernel always overwrites by index.
    pub fn bind_arguments(&mut self, name: &str, rebind: bool) -> Result<BindMode> {
        let id = self.kernels.lookup(name)?;
        let requested = if rebind { BindMode::Overwrite } else { BindMode::Append };
        self.bind(id, requested)
    }

    fn bind(&mut self, id: KernelId, requested: BindMode) -> Result<BindMode> {
        let kernel = self.kernels.get(id);
        let mut args = SmallVec::<[KernelArg; 8]>::with_capacity(kernel.signature().len());
        for slot in kernel.signature().slots() {
            let arg = match slot.kind {
                ArgKind::Buffer => KernelArg::Buffer(self.store.buffer(id, slot.elem, slot.family_index)?.buffer.clone()),
                ArgKind::Scalar => KernelArg::Scalar(self.store.scalar(id, slot.elem, slot.family_index)?),
            };
            args.push(arg);
        }
        let kernel = self.kernels.get_mut(id);
        let mode = kernel.bind(args, requested);
        tracing::trace!(kernel.name = kernel.name(), %mode, args = kernel.args().len(), "arguments bound");
        Ok(mode)
    }

    /// Refresh the bound arguments of an already bound kernel.
    fn rebind_if_bound(&mut self, id: KernelId) -> Result<()> {
        if self.kernels.get(id).is_bound() {
            self.bind(id, BindMode::Overwrite)?;
        }
        Ok(())
    }

    /// Signature slots the store cannot satisfy yet.
    pub fn missing_arguments(&self, name: &str) -> Result<Vec<ArgSlot>> {
        let kernel = self.kernels.by_name(name)?;
        self.store.missing_arguments(kernel.id(), kernel.signature())
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    pub fn dispatch_1d(&mut self, name: &str, global: usize, local: usize) -> Result<()> {
        self.dispatch(name, ExecParams::new_1d(global, local))
    }

    pub fn dispatch_2d(&mut self, name: &str, global: [usize; 2], local: [usize; 2]) -> Result<()> {
        self.dispatch(name, ExecParams::new_2d(global, local))
    }

    pub fn dispatch_3d(&mut self, name: &str, global: [usize; 3], local: [usize; 3]) -> Result<()> {
        self.dispatch(name, ExecParams::new_3d(global, local))
    }

    #[tracing::instrument(skip_all, fields(kernel.name = name))]
    pub fn dispatch(&mut self, name: &str, params: ExecParams) -> Result<()> {
        let id = self.kernels.lookup(name)?;
        if !self.kernels.get(id).is_bound() {
            tracing::warn!("dispatching a kernel that was never bound, binding now");
            self.bind(id, BindMode::Append)?;
        }

        let kernel = self.kernels.get(id);
        let mut shared = SharedAcquisition::new();
        for buffer in kernel.args().iter().filter_map(KernelArg::as_buffer) {
            if buffer.is_shared() {
                shared.acquire(buffer).context(DeviceSnafu)?;
            } else if buffer.is_host_dirty() {
                self.queue.upload(buffer);
            }
        }
        self.queue.memory_barrier();

        self.queue.exec(Arc::clone(kernel.program()), kernel.args(), &params);
        self.queue.submit().context(DeviceSnafu)?;

        let mut read_back = 0usize;
        for slot in kernel.signature().buffers() {
            let stored = self.store.buffer(id, slot.elem, slot.family_index)?;
            if !stored.buffer.is_shared() && stored.access.is_output() {
                self.queue.download(&stored.buffer);
                read_back += 1;
            }
        }
        self.queue.submit().context(DeviceSnafu)?;

        tracing::debug!(work_items = params.work_items(), shared = shared.len(), read_back, "dispatched");
        Ok(())
    }

    pub fn max_local_size_1d(&self, global: usize) -> usize {
        self.device.info.max_local_size_1d(global)
    }

    pub fn max_local_size_2d(&self, global: usize) -> usize {
        self.device.info.max_local_size_2d(global)
    }

    pub fn max_local_size_3d(&self, global: usize) -> usize {
        self.device.info.max_local_size_3d(global)
    }

    // =========================================================================
    // Buffers
    // =========================================================================

    /// Create a zeroed buffer at `slot`.
    pub fn create_buffer(
        &mut self,
        kernel: &str,
        elem: ElemType,
        slot: usize,
        len: usize,
        access: Access,
    ) -> Result<Buffer> {
        let id = self.kernels.lookup(kernel)?;
        let buffer = self.store.create_buffer(elem, len)?;
        self.store.push_buffer(id, slot, buffer.clone(), access, false)?;
        self.rebind_if_bound(id)?;
        Ok(buffer)
    }

    /// Create a buffer of `len` elements at `slot` and fill it with `values`.
    pub fn create_buffer_filled(
        &mut self,
        kernel: &str,
        slot: usize,
        len: usize,
        values: &HostData,
        access: Access,
        mode: FillMode,
    ) -> Result<(Buffer, FillOutcome)> {
        let id = self.kernels.lookup(kernel)?;
        let buffer = self.store.create_buffer(values.elem(), len)?;
        let outcome = self.store.fill_buffer(&buffer, values, mode)?;
        self.store.push_buffer(id, slot, buffer.clone(), access, false)?;
        self.rebind_if_bound(id)?;
        Ok((buffer, outcome))
    }

    /// [`create_buffer`](Self::create_buffer) with a string type tag and direction.
    pub fn create_buffer_tagged(
        &mut self,
        kernel: &str,
        tag: &str,
        slot: usize,
        len: usize,
        direction: &str,
    ) -> Result<Buffer> {
        let elem: ElemType = tag.parse().ok().context(UnsupportedTypeSnafu { tag })?;
        let access: Access = direction.parse().context(InvalidDirectionSnafu)?;
        self.create_buffer(kernel, elem, slot, len, access)
    }

    /// Create a zeroed buffer whose storage is shared with the external resource `handle`.
    pub fn create_shared_buffer(
        &mut self,
        kernel: &str,
        elem: ElemType,
        slot: usize,
        len: usize,
        access: Access,
        handle: SharedHandle,
    ) -> Result<Buffer> {
        let values = HostData::zeroed(elem, 0);
        let (buffer, _) =
            self.create_shared_buffer_filled(kernel, slot, len, &values, access, FillMode::Positional, handle)?;
        Ok(buffer)
    }

    /// Create a shared buffer and upload `values` inside one acquire/release cycle.
    #[allow(clippy::too_many_arguments)]
    pub fn create_shared_buffer_filled(
        &mut self,
        kernel: &str,
        slot: usize,
        len: usize,
        values: &HostData,
        access: Access,
        mode: FillMode,
        handle: SharedHandle,
    ) -> Result<(Buffer, FillOutcome)> {
        let id = self.kernels.lookup(kernel)?;
        let buffer = self.store.create_shared_buffer(values.elem(), len, handle)?;

        let mut shared = SharedAcquisition::new();
        if !values.is_empty() {
            shared.acquire(&buffer).context(DeviceSnafu)?;
        }
        let outcome = self.store.fill_buffer(&buffer, values, mode)?;
        if buffer.is_host_dirty() {
            self.queue.upload(&buffer);
            self.queue.submit().context(DeviceSnafu)?;
        }
        shared.release();

        self.store.push_buffer(id, slot, buffer.clone(), access, false)?;
        self.rebind_if_bound(id)?;
        Ok((buffer, outcome))
    }

    /// Rewrite the buffer at `slot` in place after reading it back.
    pub fn update_buffer(&mut self, kernel: &str, slot: usize, values: &HostData, mode: FillMode) -> Result<FillOutcome> {
        let id = self.kernels.lookup(kernel)?;
        self.store.update_buffer(id, slot, values, mode)
    }

    /// Rewrite a shared buffer inside one acquire/release cycle.
    ///
    /// The host mirror is reloaded from the device first, so a partial fill
    /// keeps what earlier dispatches wrote past the updated prefix.
    pub fn update_shared_buffer(
        &mut self,
        kernel: &str,
        slot: usize,
        values: &HostData,
        mode: FillMode,
    ) -> Result<FillOutcome> {
        let id = self.kernels.lookup(kernel)?;
        let buffer = self.store.buffer(id, values.elem(), slot)?.buffer.clone();
        let mut shared = SharedAcquisition::new();
        shared.acquire(&buffer).context(DeviceSnafu)?;
        buffer.refresh().context(DeviceSnafu)?;
        let outcome = self.store.fill_buffer(&buffer, values, mode)?;
        self.queue.upload(&buffer);
        self.queue.submit().context(DeviceSnafu)?;
        shared.release();
        Ok(outcome)
    }

    /// Alias a buffer of `src` into `dst` without copying storage.
    pub fn copy_buffer(
        &mut self,
        elem: ElemType,
        src: &str,
        src_slot: usize,
        dst: &str,
        dst_slot: usize,
        set_mode: bool,
    ) -> Result<()> {
        let src = self.kernels.lookup(src)?;
        let dst = self.kernels.lookup(dst)?;
        self.store.copy_buffer_across_kernel(elem, src, src_slot, dst, dst_slot, set_mode)?;
        self.rebind_if_bound(dst)
    }

    /// Buffer with host-visible contents; see [`ArgumentStore::get_buffer`].
    pub fn get_buffer(&self, kernel: &str, elem: ElemType, slot: usize) -> Result<Buffer> {
        self.store.get_buffer(self.kernels.lookup(kernel)?, elem, slot)
    }

    pub fn read_buffer<T: Element>(&mut self, kernel: &str, slot: usize) -> Result<Vec<T>> {
        let id = self.kernels.lookup(kernel)?;
        self.store.buffer_to_vec(id, slot, None, false)
    }

    /// Read back and log the first `count` values (all when `None`).
    pub fn print_buffer<T: Element>(&mut self, kernel: &str, slot: usize, count: Option<usize>) -> Result<Vec<T>> {
        let id = self.kernels.lookup(kernel)?;
        self.store.buffer_to_vec(id, slot, count, true)
    }

    pub fn buffer_sum(&self, kernel: &str, elem: ElemType, slot: usize, count: Option<usize>) -> Result<f64> {
        self.store.buffer_sum(self.kernels.lookup(kernel)?, elem, slot, count)
    }

    pub fn last_buffer_max(&self) -> f64 {
        self.store.last_buffer_max()
    }

    pub fn device_used_mb(&self, kernel: &str) -> Result<f64> {
        self.store.device_used_mb(self.kernels.lookup(kernel)?)
    }

    // =========================================================================
    // Scalars
    // =========================================================================

    pub fn set_scalar(&mut self, kernel: &str, slot: usize, value: Scalar) -> Result<()> {
        let id = self.kernels.lookup(kernel)?;
        self.store.set_scalar(id, slot, value)?;
        self.rebind_if_bound(id)
    }

    pub fn set_int_arg(&mut self, kernel: &str, slot: usize, value: i32) -> Result<()> {
        self.set_scalar(kernel, slot, Scalar::Int(value))
    }

    pub fn set_float_arg(&mut self, kernel: &str, slot: usize, value: f32) -> Result<()> {
        self.set_scalar(kernel, slot, Scalar::Float(value))
    }

    pub fn set_long_arg(&mut self, kernel: &str, slot: usize, value: i64) -> Result<()> {
        self.set_scalar(kernel, slot, Scalar::Long(value))
    }

    pub fn int_arg(&self, kernel: &str, slot: usize) -> Result<i32> {
        self.store.scalar_as(self.kernels.lookup(kernel)?, slot)
    }

    pub fn float_arg(&self, kernel: &str, slot: usize) -> Result<f32> {
        self.store.scalar_as(self.kernels.lookup(kernel)?, slot)
    }

    pub fn long_arg(&self, kernel: &str, slot: usize) -> Result<i64> {
        self.store.scalar_as(self.kernels.lookup(kernel)?, slot)
    }
}
