//! Buffers shared with an external rendering resource.
//!
//! A shared buffer is not uploaded or read back around a dispatch. Instead the
//! compute side acquires it before the launch and releases it afterwards so the
//! renderer can consume the storage directly. [`SharedAcquisition`] scopes that
//! cycle: whatever it acquired is released when it goes out of scope, including
//! on error paths.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use smallvec::SmallVec;
use snafu::ensure;

use crate::buffer::{Buffer, BufferId};
use crate::error::{AlreadyAcquiredSnafu, Result};

/// Opaque identifier of an external (rendering-side) buffer object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SharedHandle(pub u32);

impl std::fmt::Display for SharedHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "shared#{}", self.0)
    }
}

/// Acquisition bookkeeping for one shared buffer.
#[derive(Debug)]
pub(crate) struct SharedState {
    pub(crate) handle: SharedHandle,
    acquired: AtomicBool,
    acquisitions: AtomicU64,
    releases: AtomicU64,
}

impl SharedState {
    pub(crate) fn new(handle: SharedHandle) -> Self {
        Self { handle, acquired: AtomicBool::new(false), acquisitions: AtomicU64::new(0), releases: AtomicU64::new(0) }
    }

    pub(crate) fn acquire(&self) -> Result<()> {
        let was_free =
            self.acquired.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_ok();
        ensure!(was_free, AlreadyAcquiredSnafu { handle: self.handle });
        self.acquisitions.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(handle = %self.handle, "acquired shared buffer");
        Ok(())
    }

    /// Returns `true` when the buffer was held and is now released.
    pub(crate) fn release(&self) -> bool {
        let released = self.acquired.swap(false, Ordering::AcqRel);
        if released {
            self.releases.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(handle = %self.handle, "released shared buffer");
        }
        released
    }

    pub(crate) fn is_acquired(&self) -> bool {
        self.acquired.load(Ordering::Acquire)
    }

    pub(crate) fn acquisitions(&self) -> u64 {
        self.acquisitions.load(Ordering::Relaxed)
    }

    pub(crate) fn releases(&self) -> u64 {
        self.releases.load(Ordering::Relaxed)
    }
}

/// Scoped acquisition of the shared buffers used by one dispatch.
///
/// Each distinct buffer is acquired at most once even when it is bound to
/// several slots.
#[derive(Debug, Default)]
pub struct SharedAcquisition {
    held: SmallVec<[Buffer; 4]>,
}

impl SharedAcquisition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire `buffer` unless this scope already holds it. Non-shared buffers are ignored.
    pub fn acquire(&mut self, buffer: &Buffer) -> Result<()> {
        if !buffer.is_shared() || self.holds(buffer.id()) {
            return Ok(());
        }
        buffer.acquire_shared()?;
        self.held.push(buffer.clone());
        Ok(())
    }

    pub fn holds(&self, id: BufferId) -> bool {
        self.held.iter().any(|b| b.id() == id)
    }

    pub fn len(&self) -> usize {
        self.held.len()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    /// Release everything now.
    pub fn release(mut self) {
        self.release_all();
    }

    fn release_all(&mut self) {
        for buffer in self.held.drain(..) {
            buffer.release_shared();
        }
    }
}

impl Drop for SharedAcquisition {
    fn drop(&mut self) {
        if !self.held.is_empty() {
            tracing::debug!(count = self.held.len(), "releasing shared buffers on scope exit");
            self.release_all();
        }
    }
}
