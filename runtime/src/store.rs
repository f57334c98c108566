//! Per-kernel argument storage.
//!
//! Every kernel gets an [`ArgTable`] holding one positional sequence per
//! (kind, element type) family: `int`, `float` and `long` buffers, and `int`,
//! `float` and `long` scalars. A signature slot with `family_index = n` binds
//! the `n`-th entry of its family.

use std::collections::HashMap;
use std::sync::Arc;

use snafu::{OptionExt, ResultExt, ensure};
use strum::EnumCount;
use tessera_device::{Allocator, Buffer, SharedHandle};
use tessera_dtype::{Access, ArgKind, ElemType, Element, HostData, Scalar};

use crate::error::{
    DeviceSnafu, KernelNotFoundSnafu, MissingArgumentSnafu, Result, SlotOutOfOrderSnafu, TypeMismatchSnafu,
};
use crate::kernel::KernelId;
use crate::signature::{ArgSlot, Signature};

/// How fill values map onto buffer elements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, strum::Display)]
pub enum FillMode {
    /// Element `i` takes `values[i]`; a single value is broadcast.
    #[default]
    #[strum(to_string = "positional")]
    Positional,
    /// Element `i` takes `values[i % values.len()]`.
    #[strum(to_string = "repeat")]
    Repeat,
}

/// What a fill wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillOutcome {
    /// Every element was written.
    Complete,
    /// Only the first `written` of `len` elements were written; the rest kept
    /// their previous contents.
    Partial { written: usize, len: usize },
}

impl FillOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

/// Layout of printed buffer contents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(ascii_case_insensitive)]
pub enum PrintMode {
    /// All values on one line.
    #[default]
    #[strum(serialize = "values")]
    Values,
    /// One `index: value` line per element.
    #[strum(serialize = "indexed")]
    IndexedValues,
}

/// A stored buffer and the direction it was registered with.
#[derive(Debug, Clone)]
pub struct BufferSlot {
    pub buffer: Buffer,
    pub access: Access,
}

/// Argument families of one kernel.
#[derive(Debug, Default)]
pub struct ArgTable {
    name: String,
    buffers: [Option<Vec<BufferSlot>>; ElemType::COUNT],
    scalars: [Option<Vec<Scalar>>; ElemType::COUNT],
}

impl ArgTable {
    fn new(name: &str) -> Self {
        Self { name: name.to_string(), ..Default::default() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_initialized(&self, kind: ArgKind, elem: ElemType) -> bool {
        match kind {
            ArgKind::Buffer => self.buffers[elem.index()].is_some(),
            ArgKind::Scalar => self.scalars[elem.index()].is_some(),
        }
    }

    pub fn buffers(&self, elem: ElemType) -> &[BufferSlot] {
        self.buffers[elem.index()].as_deref().unwrap_or_default()
    }

    pub fn scalars(&self, elem: ElemType) -> &[Scalar] {
        self.scalars[elem.index()].as_deref().unwrap_or_default()
    }

    fn buffers_mut(&mut self, elem: ElemType) -> &mut Vec<BufferSlot> {
        self.buffers[elem.index()].get_or_insert_with(Vec::new)
    }

    fn scalars_mut(&mut self, elem: ElemType) -> &mut Vec<Scalar> {
        self.scalars[elem.index()].get_or_insert_with(Vec::new)
    }

    fn all_buffers(&self) -> impl Iterator<Item = &BufferSlot> {
        self.buffers.iter().flatten().flatten()
    }

    fn has(&self, slot: &ArgSlot) -> bool {
        match slot.kind {
            ArgKind::Buffer => slot.family_index < self.buffers(slot.elem).len(),
            ArgKind::Scalar => slot.family_index < self.scalars(slot.elem).len(),
        }
    }
}

/// Buffers and scalars of every kernel of an executor.
#[derive(Debug)]
pub struct ArgumentStore {
    allocator: Arc<dyn Allocator>,
    tables: HashMap<KernelId, ArgTable>,
    last_max: f64,
    print_mode: PrintMode,
    quiet: bool,
}

impl ArgumentStore {
    pub fn new(allocator: Arc<dyn Allocator>) -> Self {
        Self { allocator, tables: HashMap::new(), last_max: 0.0, print_mode: PrintMode::default(), quiet: false }
    }

    pub fn set_print_mode(&mut self, mode: PrintMode) {
        self.print_mode = mode;
    }

    /// Suppress printed buffer contents.
    pub fn set_quiet(&mut self, quiet: bool) {
        self.quiet = quiet;
    }

    /// Start an empty table for `kernel`.
    pub fn register(&mut self, kernel: KernelId, name: &str) {
        self.tables.entry(kernel).or_insert_with(|| ArgTable::new(name));
    }

    pub fn table(&self, kernel: KernelId) -> Result<&ArgTable> {
        self.tables.get(&kernel).context(KernelNotFoundSnafu { name: kernel.to_string() })
    }

    fn table_mut(&mut self, kernel: KernelId) -> Result<&mut ArgTable> {
        self.tables.get_mut(&kernel).context(KernelNotFoundSnafu { name: kernel.to_string() })
    }

    /// Create the backing sequence of one family; returns `false` if it already existed.
    pub fn init_family(&mut self, kernel: KernelId, kind: ArgKind, elem: ElemType) -> Result<bool> {
        let table = self.table_mut(kernel)?;
        if table.is_initialized(kind, elem) {
            return Ok(false);
        }
        match kind {
            ArgKind::Buffer => table.buffers[elem.index()] = Some(Vec::new()),
            ArgKind::Scalar => table.scalars[elem.index()] = Some(Vec::new()),
        }
        tracing::trace!(kernel = %table.name, %kind, %elem, "initialized argument family");
        Ok(true)
    }

    // =========================================================================
    // Buffers
    // =========================================================================

    pub fn create_buffer(&self, elem: ElemType, len: usize) -> Result<Buffer> {
        Buffer::allocate(Arc::clone(&self.allocator), elem, len).context(DeviceSnafu)
    }

    pub fn create_shared_buffer(&self, elem: ElemType, len: usize, handle: SharedHandle) -> Result<Buffer> {
        Buffer::allocate_shared(Arc::clone(&self.allocator), elem, len, handle).context(DeviceSnafu)
    }

    /// Write `values` into the host mirror of `buffer`.
    ///
    /// A positional fill shorter than the buffer leaves the tail as it was and
    /// reports [`FillOutcome::Partial`].
    pub fn fill_buffer(&self, buffer: &Buffer, values: &HostData, mode: FillMode) -> Result<FillOutcome> {
        if buffer.elem() != values.elem() {
            tracing::warn!(buffer = %buffer.id(), expected = %buffer.elem(), actual = %values.elem(), "fill type mismatch");
            return TypeMismatchSnafu { expected: buffer.elem(), actual: values.elem() }.fail();
        }
        let len = buffer.len();
        if values.is_empty() {
            return Ok(if len == 0 { FillOutcome::Complete } else { FillOutcome::Partial { written: 0, len } });
        }

        let written = match values {
            HostData::Int(v) => buffer.with_host_mut(|dst: &mut [i32]| fill_slice(dst, v, mode)),
            HostData::Float(v) => buffer.with_host_mut(|dst: &mut [f32]| fill_slice(dst, v, mode)),
            HostData::Long(v) => buffer.with_host_mut(|dst: &mut [i64]| fill_slice(dst, v, mode)),
        }
        .context(DeviceSnafu)?;

        if written < len {
            tracing::warn!(buffer = %buffer.id(), written, len, "positional fill shorter than buffer, tail left unchanged");
            return Ok(FillOutcome::Partial { written, len });
        }
        if values.len() > len && mode == FillMode::Positional {
            tracing::debug!(buffer = %buffer.id(), values = values.len(), len, "fill values truncated to buffer length");
        }
        Ok(FillOutcome::Complete)
    }

    /// Put `buffer` at `slot` of its family.
    ///
    /// `slot == len` appends and `slot < len` replaces; with `rebind` the slot
    /// must already exist. `access` decides whether a dispatch reads the slot
    /// back.
    pub fn push_buffer(
        &mut self,
        kernel: KernelId,
        slot: usize,
        buffer: Buffer,
        access: Access,
        rebind: bool,
    ) -> Result<()> {
        let table = self.table_mut(kernel)?;
        let name = table.name.clone();
        let elem = buffer.elem();
        let seq = table.buffers_mut(elem);
        let len = seq.len();
        ensure!(slot < len || (slot == len && !rebind), SlotOutOfOrderSnafu { kernel: name, elem, slot, len });

        let entry = BufferSlot { buffer, access };
        if slot < len {
            tracing::trace!(kernel = %name, %elem, slot, "replacing buffer");
            seq[slot] = entry;
        } else {
            seq.push(entry);
        }
        Ok(())
    }

    /// Stored buffer without any device synchronisation.
    pub fn buffer(&self, kernel: KernelId, elem: ElemType, slot: usize) -> Result<&BufferSlot> {
        let table = self.table(kernel)?;
        table.buffers(elem).get(slot).context(MissingArgumentSnafu {
            kernel: table.name.clone(),
            kind: ArgKind::Buffer,
            elem,
            index: slot,
        })
    }

    /// Buffer with host-visible contents.
    ///
    /// A plain buffer is read back from the device (blocking). A shared buffer
    /// is handed back to its external owner if it is still acquired.
    pub fn get_buffer(&self, kernel: KernelId, elem: ElemType, slot: usize) -> Result<Buffer> {
        let buffer = &self.buffer(kernel, elem, slot)?.buffer;
        if buffer.is_shared() {
            if buffer.is_acquired() {
                buffer.release_shared();
            }
        } else {
            buffer.download().context(DeviceSnafu)?;
        }
        Ok(buffer.clone())
    }

    /// Alias `src_slot` of `src` into `dst_slot` of `dst`, sharing storage.
    ///
    /// With `set_mode` the destination slot must exist and is overwritten;
    /// otherwise the usual append/replace rule applies.
    pub fn copy_buffer_across_kernel(
        &mut self,
        elem: ElemType,
        src: KernelId,
        src_slot: usize,
        dst: KernelId,
        dst_slot: usize,
        set_mode: bool,
    ) -> Result<()> {
        let BufferSlot { buffer, access } = self.buffer(src, elem, src_slot)?.clone();
        self.push_buffer(dst, dst_slot, buffer, access, set_mode)
    }

    /// Read back, then rewrite the buffer at `slot` in place.
    pub fn update_buffer(
        &self,
        kernel: KernelId,
        slot: usize,
        values: &HostData,
        mode: FillMode,
    ) -> Result<FillOutcome> {
        let buffer = self.get_buffer(kernel, values.elem(), slot)?;
        self.fill_buffer(&buffer, values, mode)
    }

    // =========================================================================
    // Scalars
    // =========================================================================

    /// Set a scalar slot, padding skipped slots with zero.
    pub fn set_scalar(&mut self, kernel: KernelId, slot: usize, value: Scalar) -> Result<()> {
        let elem = value.elem();
        let seq = self.table_mut(kernel)?.scalars_mut(elem);
        if slot >= seq.len() {
            seq.resize(slot + 1, Scalar::zero(elem));
        }
        seq[slot] = value;
        Ok(())
    }

    pub fn scalar(&self, kernel: KernelId, elem: ElemType, slot: usize) -> Result<Scalar> {
        let table = self.table(kernel)?;
        table.scalars(elem).get(slot).copied().context(MissingArgumentSnafu {
            kernel: table.name.clone(),
            kind: ArgKind::Scalar,
            elem,
            index: slot,
        })
    }

    pub fn scalar_as<T: Element>(&self, kernel: KernelId, slot: usize) -> Result<T> {
        let scalar = self.scalar(kernel, T::ELEM, slot)?;
        T::from_scalar(scalar).context(TypeMismatchSnafu { expected: scalar.elem(), actual: T::ELEM })
    }

    // =========================================================================
    // Retrieval
    // =========================================================================

    /// First `count` values (all when `None`) of a buffer after a read back.
    pub fn buffer_to_vec<T: Element>(
        &mut self,
        kernel: KernelId,
        slot: usize,
        count: Option<usize>,
        print: bool,
    ) -> Result<Vec<T>> {
        let buffer = self.get_buffer(kernel, T::ELEM, slot)?;
        let count = count.unwrap_or(buffer.len()).min(buffer.len());
        let values = buffer.with_host(|host: &[T]| host[..count].to_vec()).context(DeviceSnafu)?;

        self.last_max = buffer.host_snapshot().max_non_negative(count);
        if print && !self.quiet {
            self.print_values(kernel, slot, &values);
        }
        Ok(values)
    }

    fn print_values<T: Element>(&self, kernel: KernelId, slot: usize, values: &[T]) {
        let name = self.tables.get(&kernel).map_or("", |t| t.name.as_str());
        match self.print_mode {
            PrintMode::Values => {
                let line = values.iter().map(ToString::to_string).collect::<Vec<_>>().join(" ");
                tracing::info!(kernel = name, slot, elem = %T::ELEM, "{line}");
            }
            PrintMode::IndexedValues => {
                for (index, value) in values.iter().enumerate() {
                    tracing::info!(kernel = name, slot, elem = %T::ELEM, "{index}: {value}");
                }
            }
        }
    }

    /// Sum of the first `count` values (all when `None`) after a read back.
    pub fn buffer_sum(&self, kernel: KernelId, elem: ElemType, slot: usize, count: Option<usize>) -> Result<f64> {
        let buffer = self.get_buffer(kernel, elem, slot)?;
        Ok(buffer.host_snapshot().sum(count.unwrap_or(usize::MAX)))
    }

    /// Largest value seen by the most recent [`buffer_to_vec`](Self::buffer_to_vec), never below zero.
    pub fn last_buffer_max(&self) -> f64 {
        self.last_max
    }

    /// Bytes held by the kernel's buffers; aliased buffers count once per slot.
    pub fn device_used_bytes(&self, kernel: KernelId) -> Result<usize> {
        Ok(self.table(kernel)?.all_buffers().map(|slot| slot.buffer.size()).sum())
    }

    pub fn device_used_mb(&self, kernel: KernelId) -> Result<f64> {
        Ok(self.device_used_bytes(kernel)? as f64 / 1e6)
    }

    /// Slots of `signature` with nothing stored for them.
    pub fn missing_arguments(&self, kernel: KernelId, signature: &Signature) -> Result<Vec<ArgSlot>> {
        let table = self.table(kernel)?;
        Ok(signature.slots().iter().filter(|slot| !table.has(slot)).copied().collect())
    }
}

/// Returns how many leading elements of `dst` were written.
fn fill_slice<T: Copy>(dst: &mut [T], src: &[T], mode: FillMode) -> usize {
    match (mode, src) {
        (FillMode::Repeat, _) => {
            for (i, value) in dst.iter_mut().enumerate() {
                *value = src[i % src.len()];
            }
            dst.len()
        }
        (FillMode::Positional, [single]) => {
            dst.fill(*single);
            dst.len()
        }
        (FillMode::Positional, _) => {
            let n = src.len().min(dst.len());
            dst[..n].copy_from_slice(&src[..n]);
            n
        }
    }
}
