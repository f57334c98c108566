use super::*;

/// Host element type that maps onto one of the three argument families.
pub trait Element:
    bytemuck::Pod + Default + PartialOrd + std::fmt::Debug + std::fmt::Display + Send + Sync + 'static
{
    const ELEM: ElemType;

    fn to_f64(self) -> f64;

    fn into_scalar(self) -> Scalar;

    fn from_scalar(scalar: Scalar) -> Option<Self>;

    fn slice(data: &HostData) -> Option<&[Self]>;

    fn slice_mut(data: &mut HostData) -> Option<&mut [Self]>;

    fn wrap(values: Vec<Self>) -> HostData;
}

macro_rules! impl_element {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl Element for $ty {
            const ELEM: ElemType = ElemType::$variant;

            fn to_f64(self) -> f64 {
                self as f64
            }

            fn into_scalar(self) -> Scalar {
                Scalar::$variant(self)
            }

            fn from_scalar(scalar: Scalar) -> Option<Self> {
                match scalar {
                    Scalar::$variant(value) => Some(value),
                    _ => None,
                }
            }

            fn slice(data: &HostData) -> Option<&[Self]> {
                match data {
                    HostData::$variant(values) => Some(values),
                    _ => None,
                }
            }

            fn slice_mut(data: &mut HostData) -> Option<&mut [Self]> {
                match data {
                    HostData::$variant(values) => Some(values),
                    _ => None,
                }
            }

            fn wrap(values: Vec<Self>) -> HostData {
                HostData::$variant(values)
            }
        })*
    };
}

impl_element! {
    i32 => Int,
    f32 => Float,
    i64 => Long,
}
