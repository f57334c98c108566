use snafu::Snafu;
use tessera_dtype::ElemType;

use crate::interop::SharedHandle;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("size mismatch: expected {expected}, got {actual}"))]
    SizeMismatch { expected: usize, actual: usize },

    /// Typed access used an element type the buffer was not created with.
    #[snafu(display("element type mismatch: buffer holds {expected}, accessed as {actual}"))]
    ElemMismatch { expected: ElemType, actual: ElemType },

    #[snafu(display("no registered device matches filter {filter:?}"))]
    NoMatchingDevice { filter: String },

    /// Buffer is not allocated.
    #[snafu(display("buffer not allocated"))]
    NotAllocated,

    #[snafu(display("entry point '{name}' not found"))]
    EntryPointNotFound { name: String },

    #[snafu(display("kernel source does not declare entry point '{name}'"))]
    EntryPointNotDeclared { name: String },

    #[snafu(display("shared buffer {handle:?} is already acquired"))]
    AlreadyAcquired { handle: SharedHandle },

    #[snafu(display("buffer is not shared with an external resource"))]
    NotShared,

    #[snafu(display("invalid launch: {reason}"))]
    InvalidLaunch { reason: String },

    #[snafu(display("argument {index} out of range ({len} bound)"))]
    ArgIndex { index: usize, len: usize },

    #[snafu(display("argument {index} is not a {expected}"))]
    ArgKindMismatch { index: usize, expected: String },

    /// Failure reported by a kernel body.
    #[snafu(display("kernel failed: {message}"))]
    Runtime { message: String },
}
