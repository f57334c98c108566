//! Error types for kernel registration, argument binding and scheduling.

use std::path::PathBuf;

use snafu::Snafu;
use tessera_dtype::{ArgKind, ElemType};

/// Result type for runtime operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors that can occur while preparing or running kernels.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Type tag or parameter type outside the int/float/long families.
    #[snafu(display("unsupported type: {tag:?}"))]
    UnsupportedType { tag: String },

    /// No kernel registered under this name.
    #[snafu(display("kernel '{name}' not found"))]
    KernelNotFound { name: String },

    /// Values of one element type were given to a buffer of another.
    #[snafu(display("type mismatch: buffer holds {expected}, values are {actual}"))]
    TypeMismatch { expected: ElemType, actual: ElemType },

    /// Kernel source has no recognisable parameter list.
    #[snafu(display("cannot parse kernel signature: {reason}"))]
    SignatureParse { reason: String },

    /// A slot the signature needs has nothing stored for it.
    #[snafu(display("kernel '{kernel}' has no {elem} {kind} #{index}"))]
    MissingArgument { kernel: String, kind: ArgKind, elem: ElemType, index: usize },

    /// Buffer slot creation skipped an index.
    #[snafu(display("kernel '{kernel}': {elem} buffer slot {slot} out of order ({len} exist)"))]
    SlotOutOfOrder { kernel: String, elem: ElemType, slot: usize, len: usize },

    #[snafu(display("invalid direction: {source}"))]
    InvalidDirection { source: tessera_dtype::Error },

    #[snafu(display("kernel source '{file}' not found in {searched} search directories"))]
    KernelSourceNotFound { file: String, searched: usize },

    #[snafu(display("I/O error on {}: {source}", path.display()))]
    Io { path: PathBuf, source: std::io::Error },

    /// Device layer failure (allocation, transfer, launch).
    #[snafu(display("device error: {source}"))]
    Device { source: tessera_device::Error },
}
