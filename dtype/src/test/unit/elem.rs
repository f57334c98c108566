use strum::{EnumCount, IntoEnumIterator};
use test_case::test_case;

use crate::ElemType;

#[test_case("int", ElemType::Int; "int")]
#[test_case("float", ElemType::Float; "float")]
#[test_case("long", ElemType::Long; "long")]
#[test_case("FLOAT", ElemType::Float; "upper_float")]
fn test_parse_elem_tag(tag: &str, expected: ElemType) {
    assert_eq!(tag.parse::<ElemType>().unwrap(), expected);
}

#[test_case("double"; "double")]
#[test_case("char"; "char")]
#[test_case(""; "empty")]
fn test_unknown_elem_tag(tag: &str) {
    let err = tag.parse::<ElemType>().unwrap_err();
    assert!(matches!(err, crate::Error::UnknownElemTag { .. }));
}

#[test]
fn test_family_indices_are_dense() {
    let indices: Vec<usize> = ElemType::iter().map(|e| e.index()).collect();
    assert_eq!(indices, (0..ElemType::COUNT).collect::<Vec<_>>());
}

#[test]
fn test_display_round_trips_through_tag() {
    for elem in ElemType::iter() {
        assert_eq!(elem.to_string().parse::<ElemType>().unwrap(), elem);
    }
}
