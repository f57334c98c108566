use proptest::prelude::*;

use crate::{ElemType, Element, HostData, Scalar};

#[test]
fn test_zeroed_has_requested_shape() {
    let data = HostData::zeroed(ElemType::Long, 5);
    assert_eq!(data.elem(), ElemType::Long);
    assert_eq!(data.len(), 5);
    assert_eq!(data.size(), 40);
    assert_eq!(data.as_bytes().len(), 40);
}

#[test]
fn test_from_vec_picks_family() {
    assert_eq!(HostData::from(vec![1i32, 2]).elem(), ElemType::Int);
    assert_eq!(HostData::from(vec![1.0f32]).elem(), ElemType::Float);
    assert_eq!(HostData::from(vec![1i64]).elem(), ElemType::Long);
}

#[test]
fn test_typed_slice_rejects_other_family() {
    let data = HostData::from(vec![1.0f32, 2.0]);
    assert_eq!(data.as_slice::<f32>(), Some(&[1.0f32, 2.0][..]));
    assert!(data.as_slice::<i32>().is_none());
}

#[test]
fn test_get_returns_tagged_scalar() {
    let data = HostData::from(vec![7i64, 9]);
    assert_eq!(data.get(1), Some(Scalar::Long(9)));
    assert_eq!(data.get(2), None);
}

#[test]
fn test_max_is_floored_at_zero() {
    let data = HostData::from(vec![-3.0f32, -1.0]);
    assert_eq!(data.max_non_negative(2), 0.0);
}

#[test]
fn test_scalar_roundtrip_through_element() {
    assert_eq!(i32::from_scalar(5i32.into_scalar()), Some(5));
    assert_eq!(f32::from_scalar(Scalar::Int(5)), None);
    assert_eq!(Scalar::zero(ElemType::Float), Scalar::Float(0.0));
}

proptest! {
    #[test]
    fn sum_over_prefix_matches_iterator(values in prop::collection::vec(-1000i32..1000, 0..64), count in 0usize..80) {
        let data = HostData::from(values.clone());
        let expected: f64 = values.iter().take(count).map(|v| f64::from(*v)).sum();
        prop_assert_eq!(data.sum(count), expected);
    }

    #[test]
    fn max_over_prefix_is_largest_non_negative(values in prop::collection::vec(-1000i64..1000, 0..64)) {
        let data = HostData::from(values.clone());
        let expected = values.iter().copied().max().map_or(0, |m| m.max(0)) as f64;
        prop_assert_eq!(data.max_non_negative(values.len()), expected);
    }
}
