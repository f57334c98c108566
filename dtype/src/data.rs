//! Host-side values for the three argument families.

use crate::{ElemType, Element};

/// A single typed kernel argument passed by value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Int(i32),
    Float(f32),
    Long(i64),
}

impl Scalar {
    pub const fn zero(elem: ElemType) -> Self {
        match elem {
            ElemType::Int => Self::Int(0),
            ElemType::Float => Self::Float(0.0),
            ElemType::Long => Self::Long(0),
        }
    }

    pub const fn elem(&self) -> ElemType {
        match self {
            Self::Int(_) => ElemType::Int,
            Self::Float(_) => ElemType::Float,
            Self::Long(_) => ElemType::Long,
        }
    }
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Long(v) => write!(f, "{v}"),
        }
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<f32> for Scalar {
    fn from(value: f32) -> Self {
        Self::Float(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Self::Long(value)
    }
}

/// A typed sequence of host values.
///
/// Used both as the host mirror of a device buffer and as the payload of
/// fill/update requests.
#[derive(Debug, Clone, PartialEq)]
pub enum HostData {
    Int(Vec<i32>),
    Float(Vec<f32>),
    Long(Vec<i64>),
}

impl HostData {
    pub fn zeroed(elem: ElemType, len: usize) -> Self {
        match elem {
            ElemType::Int => Self::Int(vec![0; len]),
            ElemType::Float => Self::Float(vec![0.0; len]),
            ElemType::Long => Self::Long(vec![0; len]),
        }
    }

    pub const fn elem(&self) -> ElemType {
        match self {
            Self::Int(_) => ElemType::Int,
            Self::Float(_) => ElemType::Float,
            Self::Long(_) => ElemType::Long,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Int(v) => v.len(),
            Self::Float(v) => v.len(),
            Self::Long(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size of the payload in bytes.
    pub fn size(&self) -> usize {
        self.len() * self.elem().bytes()
    }

    pub fn get(&self, index: usize) -> Option<Scalar> {
        match self {
            Self::Int(v) => v.get(index).map(|x| Scalar::Int(*x)),
            Self::Float(v) => v.get(index).map(|x| Scalar::Float(*x)),
            Self::Long(v) => v.get(index).map(|x| Scalar::Long(*x)),
        }
    }

    pub fn as_slice<T: Element>(&self) -> Option<&[T]> {
        T::slice(self)
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Int(v) => bytemuck::cast_slice(v),
            Self::Float(v) => bytemuck::cast_slice(v),
            Self::Long(v) => bytemuck::cast_slice(v),
        }
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        match self {
            Self::Int(v) => bytemuck::cast_slice_mut(v),
            Self::Float(v) => bytemuck::cast_slice_mut(v),
            Self::Long(v) => bytemuck::cast_slice_mut(v),
        }
    }

    /// Sum of the first `count` elements as `f64`.
    pub fn sum(&self, count: usize) -> f64 {
        match self {
            Self::Int(v) => v.iter().take(count).map(|x| x.to_f64()).sum(),
            Self::Float(v) => v.iter().take(count).map(|x| x.to_f64()).sum(),
            Self::Long(v) => v.iter().take(count).map(|x| x.to_f64()).sum(),
        }
    }

    /// Largest of the first `count` elements, floored at zero.
    pub fn max_non_negative(&self, count: usize) -> f64 {
        let fold = |acc: f64, x: f64| if x > acc { x } else { acc };
        match self {
            Self::Int(v) => v.iter().take(count).map(|x| x.to_f64()).fold(0.0, fold),
            Self::Float(v) => v.iter().take(count).map(|x| x.to_f64()).fold(0.0, fold),
            Self::Long(v) => v.iter().take(count).map(|x| x.to_f64()).fold(0.0, fold),
        }
    }
}

impl<T: Element> From<Vec<T>> for HostData {
    fn from(values: Vec<T>) -> Self {
        T::wrap(values)
    }
}

impl<T: Element> From<&[T]> for HostData {
    fn from(values: &[T]) -> Self {
        T::wrap(values.to_vec())
    }
}
