//! Registered kernels and their bound argument lists.

use std::collections::HashMap;
use std::sync::Arc;

use smallvec::SmallVec;
use snafu::OptionExt;
use tessera_device::{KernelArg, Program};

use crate::error::{KernelNotFoundSnafu, Result};
use crate::signature::Signature;

/// Handle to a registered kernel. Stable for the registry's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KernelId(u32);

impl KernelId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for KernelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "kernel#{}", self.0)
    }
}

/// How a binding pass writes into the kernel's argument list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum BindMode {
    /// Push arguments in declaration order. Only for a kernel never bound.
    #[strum(to_string = "append")]
    Append,
    /// Replace arguments by slot index; the count stays fixed.
    #[strum(to_string = "overwrite")]
    Overwrite,
}

/// A compiled kernel with its signature and bound arguments.
#[derive(Debug)]
pub struct Kernel {
    id: KernelId,
    name: String,
    signature: Signature,
    program: Arc<dyn Program>,
    args: Vec<KernelArg>,
    bound: bool,
}

impl Kernel {
    pub fn id(&self) -> KernelId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn program(&self) -> &Arc<dyn Program> {
        &self.program
    }

    pub fn args(&self) -> &[KernelArg] {
        &self.args
    }

    pub fn is_bound(&self) -> bool {
        self.bound
    }

    /// Store a full argument set, one per signature slot.
    ///
    /// The first binding appends; every later one overwrites by index whatever
    /// `requested` says, so the argument count never changes after binding.
    pub(crate) fn bind(&mut self, args: SmallVec<[KernelArg; 8]>, requested: BindMode) -> BindMode {
        let mode = if self.bound { BindMode::Overwrite } else { BindMode::Append };
        if mode != requested {
            tracing::debug!(kernel.name = %self.name, %requested, applied = %mode, "bind mode adjusted");
        }
        match mode {
            BindMode::Append => self.args.extend(args),
            BindMode::Overwrite => {
                for (slot, arg) in self.args.iter_mut().zip(args) {
                    *slot = arg;
                }
            }
        }
        self.bound = true;
        mode
    }
}

/// Owns every kernel of an executor; names resolve to [`KernelId`] handles.
#[derive(Debug, Default)]
pub struct KernelRegistry {
    kernels: Vec<Kernel>,
    by_name: HashMap<String, KernelId>,
}

impl KernelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a kernel; returns `None` when the name is already taken.
    pub(crate) fn insert(&mut self, name: &str, signature: Signature, program: Arc<dyn Program>) -> Option<KernelId> {
        if self.by_name.contains_key(name) {
            return None;
        }
        let id = KernelId(self.kernels.len() as u32);
        self.kernels.push(Kernel { id, name: name.to_string(), signature, program, args: Vec::new(), bound: false });
        self.by_name.insert(name.to_string(), id);
        Some(id)
    }

    pub fn lookup(&self, name: &str) -> Result<KernelId> {
        self.by_name.get(name).copied().context(KernelNotFoundSnafu { name })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn get(&self, id: KernelId) -> &Kernel {
        &self.kernels[id.index()]
    }

    pub(crate) fn get_mut(&mut self, id: KernelId) -> &mut Kernel {
        &mut self.kernels[id.index()]
    }

    pub fn by_name(&self, name: &str) -> Result<&Kernel> {
        self.lookup(name).map(|id| self.get(id))
    }

    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Kernel> {
        self.kernels.iter()
    }
}
