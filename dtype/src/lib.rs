use std::str::FromStr;

use snafu::OptionExt;

pub mod data;
pub mod error;
pub mod ext;


pub use data::{HostData, Scalar};
pub use error::{Error, Result};
pub use ext::Element;

use crate::error::{InvalidAccessCodeSnafu, InvalidAccessSnafu, UnknownElemTagSnafu};

/// Address space qualifier of a kernel parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AddrSpace {
    /// Global/device memory.
    Global,
    /// Work-group local memory.
    Local,
    /// No qualifier (scalars passed by value).
    #[default]
    Private,
}

/// Element type of a buffer or scalar kernel argument.
///
/// The discriminant doubles as the index of the type family inside
/// per-kernel argument tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(strum::EnumCount, strum::EnumIter, strum::VariantArray, strum::FromRepr, strum::Display)]
#[repr(u8)]
pub enum ElemType {
    #[strum(to_string = "int")]
    Int = 0,
    #[strum(to_string = "float")]
    Float = 1,
    #[strum(to_string = "long")]
    Long = 2,
}

impl ElemType {
    pub const fn bytes(&self) -> usize {
        match self {
            Self::Int => 4,
            Self::Float => 4,
            Self::Long => 8,
        }
    }

    pub const fn index(&self) -> usize {
        *self as usize
    }
}

impl FromStr for ElemType {
    type Err = Error;

    /// Parses the legacy string tags (`"int"`, `"float"`, `"long"`), case-insensitive.
    fn from_str(tag: &str) -> Result<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "int" | "i32" => Ok(Self::Int),
            "float" | "f32" => Ok(Self::Float),
            "long" | "i64" => Ok(Self::Long),
            _ => UnknownElemTagSnafu { tag }.fail(),
        }
    }
}

/// Whether a kernel parameter is passed by value or through a device buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(strum::EnumCount, strum::EnumIter, strum::Display)]
pub enum ArgKind {
    #[strum(to_string = "scalar")]
    Scalar,
    #[strum(to_string = "buffer")]
    Buffer,
}

/// Access direction of a buffer or argument.
///
/// Accepts the string encoding `"r" | "w" | "rw"` and the integer encoding
/// `1 | 2 | 0`. Anything that is not read-only is read back after a dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(strum::EnumCount, strum::EnumIter, strum::VariantArray, strum::FromRepr)]
#[repr(u8)]
pub enum Access {
    #[default]
    ReadWrite = 0,
    ReadOnly = 1,
    WriteOnly = 2,
}

impl Access {
    /// Integer code (`0` read/write, `1` read, `2` write).
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: i32) -> Result<Self> {
        u8::try_from(code).ok().and_then(Self::from_repr).context(InvalidAccessCodeSnafu { code })
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ReadWrite => "rw",
            Self::ReadOnly => "r",
            Self::WriteOnly => "w",
        }
    }

    /// Buffers with this access are re-read after every dispatch.
    pub const fn is_output(self) -> bool {
        !matches!(self, Self::ReadOnly)
    }
}

impl FromStr for Access {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "r" | "read" | "read_only" | "readonly" => Ok(Self::ReadOnly),
            "w" | "write" | "write_only" | "writeonly" => Ok(Self::WriteOnly),
            "rw" | "wr" | "read_write" | "readwrite" => Ok(Self::ReadWrite),
            _ => InvalidAccessSnafu { value }.fail(),
        }
    }
}

impl TryFrom<i32> for Access {
    type Error = Error;

    fn try_from(code: i32) -> Result<Self> {
        Self::from_code(code)
    }
}

impl From<Access> for i32 {
    fn from(access: Access) -> Self {
        i32::from(access.code())
    }
}

impl std::fmt::Display for Access {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
