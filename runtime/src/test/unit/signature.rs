use proptest::prelude::*;
use tessera_dtype::{Access, AddrSpace, ArgKind, ElemType};
use test_case::test_case;

use crate::{Error, Signature};

#[test]
fn test_slots_follow_declaration_order() {
    let sig = Signature::parse("__kernel void k(__global float* a, int n, __global float* b)").unwrap();

    let shape: Vec<_> = sig.slots().iter().map(|s| (s.kind, s.elem, s.family_index)).collect();
    assert_eq!(
        shape,
        vec![
            (ArgKind::Buffer, ElemType::Float, 0),
            (ArgKind::Scalar, ElemType::Int, 0),
            (ArgKind::Buffer, ElemType::Float, 1),
        ]
    );
    assert_eq!(sig.slots().iter().map(|s| s.position).collect::<Vec<_>>(), vec![0, 1, 2]);
}

#[test_case("__global const float* a", ArgKind::Buffer, ElemType::Float, AddrSpace::Global, true; "const global float buffer")]
#[test_case("__global float *a", ArgKind::Buffer, ElemType::Float, AddrSpace::Global, false; "star on name")]
#[test_case("__local int* tile", ArgKind::Buffer, ElemType::Int, AddrSpace::Local, false; "local int buffer")]
#[test_case("__global long* ids", ArgKind::Buffer, ElemType::Long, AddrSpace::Global, false; "long buffer")]
#[test_case("const int n", ArgKind::Scalar, ElemType::Int, AddrSpace::Private, true; "const int scalar")]
#[test_case("long count", ArgKind::Scalar, ElemType::Long, AddrSpace::Private, false; "long scalar")]
#[test_case("float", ArgKind::Scalar, ElemType::Float, AddrSpace::Private, false; "unnamed")]
fn test_classify_param(param: &str, kind: ArgKind, elem: ElemType, addr: AddrSpace, constant: bool) {
    let sig = Signature::parse(&format!("__kernel void k({param})")).unwrap();
    let slot = sig.slots()[0];

    assert_eq!((slot.kind, slot.elem, slot.addr, slot.constant), (kind, elem, addr, constant));
    assert_eq!(slot.access, if constant { Access::ReadOnly } else { Access::ReadWrite });
}

#[test_case("__kernel void k(long* interval)", ElemType::Long; "int inside name")]
#[test_case("__kernel void k(long integer)", ElemType::Long; "type word as name")]
fn test_name_is_not_classified(src: &str, elem: ElemType) {
    assert_eq!(Signature::parse(src).unwrap().slots()[0].elem, elem);
}

#[test_case("__kernel void k()"; "empty")]
#[test_case("__kernel void k( void )"; "void")]
fn test_empty_signature(src: &str) {
    assert!(Signature::parse(src).unwrap().is_empty());
}

#[test]
fn test_plain_kernel_qualifier() {
    let sig = Signature::parse("kernel void k(global float* a)").unwrap();
    assert_eq!(sig.len(), 1);
    assert_eq!(sig.slots()[0].addr, AddrSpace::Global);
}

#[test_case("void k(float* a)"; "no qualifier")]
#[test_case("void my_kernel(float* a)"; "qualifier only inside identifier")]
#[test_case("__kernel void k"; "no parentheses")]
#[test_case("__kernel void k(float* a"; "unterminated")]
#[test_case("__kernel void k(float* a, , int n)"; "empty parameter")]
fn test_parse_error(src: &str) {
    assert!(matches!(Signature::parse(src), Err(Error::SignatureParse { .. })));
}

#[test]
fn test_unsupported_element() {
    let err = Signature::parse("__kernel void k(__global double* a)").unwrap_err();
    assert!(matches!(err, Error::UnsupportedType { ref tag } if tag == "__global double* a"));
}

#[test]
fn test_first_entry_point_wins() {
    let src = "__kernel void a(float* x) {}\n__kernel void b(int n, int m) {}";
    assert_eq!(Signature::parse(src).unwrap().len(), 1);
}

#[test]
fn test_families_and_buffers() {
    let sig = Signature::parse("__kernel void k(const float* a, int n, float* b, int* c, int m)").unwrap();

    let families: Vec<_> = sig.families().collect();
    assert_eq!(
        families,
        vec![(ArgKind::Buffer, ElemType::Float), (ArgKind::Scalar, ElemType::Int), (ArgKind::Buffer, ElemType::Int)]
    );
    let buffers: Vec<_> = sig.buffers().map(|s| (s.position, s.family_index)).collect();
    assert_eq!(buffers, vec![(0, 0), (2, 1), (3, 0)]);
}

fn param() -> impl Strategy<Value = (bool, ElemType, bool)> {
    (any::<bool>(), prop::sample::select(vec![ElemType::Int, ElemType::Float, ElemType::Long]), any::<bool>())
}

proptest! {
    #[test]
    fn family_indices_count_per_family(params in prop::collection::vec(param(), 0..12)) {
        let list = params
            .iter()
            .enumerate()
            .map(|(i, (buffer, elem, constant))| {
                let qualifier = if *constant { "const " } else { "" };
                let star = if *buffer { "*" } else { "" };
                format!("{qualifier}{elem}{star} p{i}")
            })
            .collect::<Vec<_>>()
            .join(", ");
        let sig = Signature::parse(&format!("__kernel void k({list})")).unwrap();

        prop_assert_eq!(sig.len(), params.len());
        for (i, slot) in sig.slots().iter().enumerate() {
            let (buffer, elem, constant) = params[i];
            prop_assert_eq!(slot.is_buffer(), buffer);
            prop_assert_eq!(slot.elem, elem);
            prop_assert_eq!(slot.constant, constant);
            let earlier = params[..i].iter().filter(|(b, e, _)| *b == buffer && *e == elem).count();
            prop_assert_eq!(slot.family_index, earlier);
        }
    }
}
