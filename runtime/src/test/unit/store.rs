use tessera_device::SharedHandle;
use tessera_dtype::{Access, ArgKind, ElemType, HostData, Scalar};
use test_case::test_case;

use super::{NOOP_SRC, SCALE_SRC, host_executor, register_common};
use crate::{Error, Executor, FillMode, FillOutcome};

fn executor() -> Executor {
    let mut exec = host_executor(register_common);
    exec.create_kernel("noop", NOOP_SRC).unwrap();
    exec.create_kernel("scale", SCALE_SRC).unwrap();
    exec
}

fn fill(values: Vec<f32>, mode: FillMode) -> (Vec<f32>, FillOutcome) {
    let exec = executor();
    let store = exec.store();
    let buffer = store.create_buffer(ElemType::Float, 8).unwrap();
    buffer.with_host_mut(|v: &mut [f32]| v.fill(9.0)).unwrap();
    let outcome = store.fill_buffer(&buffer, &HostData::from(values), mode).unwrap();
    (buffer.to_vec().unwrap(), outcome)
}

#[test]
fn test_fill_single_value_broadcasts() {
    let (values, outcome) = fill(vec![1.0], FillMode::Positional);
    assert_eq!(values, vec![1.0; 8]);
    assert_eq!(outcome, FillOutcome::Complete);
}

#[test]
fn test_fill_repeat_cycles() {
    let (values, outcome) = fill(vec![1.0, 2.0], FillMode::Repeat);
    assert_eq!(values, vec![1.0, 2.0, 1.0, 2.0, 1.0, 2.0, 1.0, 2.0]);
    assert!(outcome.is_complete());
}

#[test]
fn test_short_positional_fill_keeps_tail() {
    let (values, outcome) = fill(vec![5.0, 6.0, 7.0], FillMode::Positional);
    assert_eq!(values, vec![5.0, 6.0, 7.0, 9.0, 9.0, 9.0, 9.0, 9.0]);
    assert_eq!(outcome, FillOutcome::Partial { written: 3, len: 8 });
}

#[test]
fn test_long_positional_fill_truncates() {
    let (values, outcome) = fill((0..10).map(|i| i as f32).collect(), FillMode::Positional);
    assert_eq!(values, (0..8).map(|i| i as f32).collect::<Vec<_>>());
    assert_eq!(outcome, FillOutcome::Complete);
}

#[test_case(FillMode::Positional; "positional")]
#[test_case(FillMode::Repeat; "repeat")]
fn test_empty_fill_is_noop(mode: FillMode) {
    let (values, outcome) = fill(vec![], mode);
    assert_eq!(values, vec![9.0; 8]);
    assert_eq!(outcome, FillOutcome::Partial { written: 0, len: 8 });
}

#[test]
fn test_fill_type_mismatch_writes_nothing() {
    let exec = executor();
    let buffer = exec.store().create_buffer(ElemType::Float, 2).unwrap();

    let result = exec.store().fill_buffer(&buffer, &HostData::from(vec![1i32, 2]), FillMode::Positional);
    assert!(matches!(result, Err(Error::TypeMismatch { expected: ElemType::Float, actual: ElemType::Int })));
    assert_eq!(buffer.to_vec::<f32>().unwrap(), vec![0.0, 0.0]);
    assert!(!buffer.is_host_dirty());
}

#[test]
fn test_buffer_slots_are_created_in_order() {
    let mut exec = executor();
    let id = exec.kernel_id("noop").unwrap();
    let store = exec.store_mut();
    let a = store.create_buffer(ElemType::Float, 4).unwrap();
    let b = store.create_buffer(ElemType::Float, 4).unwrap();

    assert!(matches!(
        store.push_buffer(id, 1, a.clone(), Access::ReadWrite, false),
        Err(Error::SlotOutOfOrder { slot: 1, len: 0, .. })
    ));
    assert!(matches!(store.push_buffer(id, 0, a.clone(), Access::ReadWrite, true), Err(Error::SlotOutOfOrder { .. })));

    store.push_buffer(id, 0, a, Access::ReadWrite, false).unwrap();
    store.push_buffer(id, 0, b.clone(), Access::ReadOnly, true).unwrap();

    let table = store.table(id).unwrap();
    assert_eq!(table.buffers(ElemType::Float).len(), 1);
    assert!(table.buffers(ElemType::Float)[0].buffer.same_storage(&b));
    assert_eq!(table.buffers(ElemType::Float)[0].access, Access::ReadOnly);
}

#[test]
fn test_families_initialised_from_signature() {
    let exec = executor();
    let table = exec.store().table(exec.kernel_id("scale").unwrap()).unwrap();

    assert!(table.is_initialized(ArgKind::Buffer, ElemType::Float));
    assert!(table.is_initialized(ArgKind::Scalar, ElemType::Float));
    assert!(!table.is_initialized(ArgKind::Scalar, ElemType::Int));
    assert!(!table.is_initialized(ArgKind::Buffer, ElemType::Long));
    assert_eq!(table.name(), "scale");
}

#[test]
fn test_init_family_runs_once() {
    let mut exec = executor();
    let id = exec.kernel_id("noop").unwrap();

    assert!(!exec.store_mut().init_family(id, ArgKind::Buffer, ElemType::Float).unwrap());
    assert!(exec.store_mut().init_family(id, ArgKind::Scalar, ElemType::Long).unwrap());
    assert!(!exec.store_mut().init_family(id, ArgKind::Scalar, ElemType::Long).unwrap());
}

#[test]
fn test_scalars_pad_with_zero() {
    let mut exec = executor();
    let id = exec.kernel_id("scale").unwrap();
    exec.store_mut().set_scalar(id, 2, Scalar::Long(7)).unwrap();

    let table = exec.store().table(id).unwrap();
    assert_eq!(table.scalars(ElemType::Long), &[Scalar::Long(0), Scalar::Long(0), Scalar::Long(7)]);
    assert_eq!(exec.store().scalar_as::<i64>(id, 2).unwrap(), 7);
    assert!(matches!(
        exec.store().scalar(id, ElemType::Int, 0),
        Err(Error::MissingArgument { kind: ArgKind::Scalar, elem: ElemType::Int, index: 0, .. })
    ));
}

#[test]
fn test_copy_across_kernels_aliases() {
    let mut exec = executor();
    let buffer = exec.create_buffer("noop", ElemType::Float, 0, 4, Access::WriteOnly).unwrap();

    exec.copy_buffer(ElemType::Float, "noop", 0, "scale", 0, false).unwrap();
    let copied = exec.store().buffer(exec.kernel_id("scale").unwrap(), ElemType::Float, 0).unwrap();
    assert!(copied.buffer.same_storage(&buffer));
    assert_eq!(copied.access, Access::WriteOnly);

    assert!(matches!(
        exec.copy_buffer(ElemType::Float, "noop", 0, "scale", 1, true),
        Err(Error::SlotOutOfOrder { slot: 1, len: 1, .. })
    ));
    assert!(matches!(exec.copy_buffer(ElemType::Float, "noop", 3, "scale", 1, false), Err(Error::MissingArgument { .. })));
}

#[test]
fn test_retrieval_helpers() {
    let mut exec = executor();
    let values = HostData::from(vec![3.0f32, -1.0, 8.5, 2.0]);
    exec.create_buffer_filled("noop", 0, 4, &values, Access::ReadWrite, FillMode::Positional).unwrap();
    let id = exec.kernel_id("noop").unwrap();

    assert_eq!(exec.store_mut().buffer_to_vec::<f32>(id, 0, Some(2), false).unwrap(), vec![3.0, -1.0]);
    assert_eq!(exec.last_buffer_max(), 3.0);
    assert_eq!(exec.print_buffer::<f32>("noop", 0, Some(100)).unwrap().len(), 4);
    assert_eq!(exec.last_buffer_max(), 8.5);
    assert_eq!(exec.buffer_sum("noop", ElemType::Float, 0, None).unwrap(), 12.5);
    assert_eq!(exec.buffer_sum("noop", ElemType::Float, 0, Some(2)).unwrap(), 2.0);
}

#[test]
fn test_last_max_never_below_zero() {
    let mut exec = executor();
    let values = HostData::from(vec![-3.0f32, -1.0]);
    exec.create_buffer_filled("noop", 0, 2, &values, Access::ReadWrite, FillMode::Positional).unwrap();

    exec.read_buffer::<f32>("noop", 0).unwrap();
    assert_eq!(exec.last_buffer_max(), 0.0);
}

#[test]
fn test_device_usage() {
    let mut exec = executor();
    exec.create_buffer("noop", ElemType::Float, 0, 250_000, Access::ReadWrite).unwrap();
    exec.create_buffer("noop", ElemType::Long, 0, 125_000, Access::ReadWrite).unwrap();
    let id = exec.kernel_id("noop").unwrap();

    assert_eq!(exec.store().device_used_bytes(id).unwrap(), 2_000_000);
    assert_eq!(exec.device_used_mb("noop").unwrap(), 2.0);
    assert_eq!(exec.device_used_mb("scale").unwrap(), 0.0);
}

#[test]
fn test_missing_arguments() {
    let mut exec = executor();
    let missing = exec.missing_arguments("scale").unwrap();
    assert_eq!(missing.iter().map(|s| s.position).collect::<Vec<_>>(), vec![0, 1]);

    exec.set_float_arg("scale", 0, 2.0).unwrap();
    let missing = exec.missing_arguments("scale").unwrap();
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].kind, ArgKind::Buffer);
}

#[test]
fn test_get_buffer_releases_shared() {
    let mut exec = executor();
    let buffer =
        exec.create_shared_buffer("noop", ElemType::Float, 0, 4, Access::ReadWrite, SharedHandle(3)).unwrap();
    buffer.acquire_shared().unwrap();

    let fetched = exec.get_buffer("noop", ElemType::Float, 0).unwrap();
    assert!(fetched.same_storage(&buffer));
    assert!(!buffer.is_acquired());
    assert_eq!(buffer.acquire_counts(), (1, 1));
}

#[test]
fn test_get_buffer_reads_device() {
    let mut exec = executor();
    let buffer = exec.create_buffer("noop", ElemType::Float, 0, 2, Access::ReadWrite).unwrap();
    buffer.write_device(&[4.0f32, 5.0]).unwrap();

    exec.get_buffer("noop", ElemType::Float, 0).unwrap();
    assert_eq!(buffer.to_vec::<f32>().unwrap(), vec![4.0, 5.0]);
}

#[test]
fn test_unknown_tags() {
    let mut exec = executor();

    assert!(exec.create_buffer_tagged("noop", "FLOAT", 0, 4, "rw").is_ok());
    assert!(matches!(exec.create_buffer_tagged("noop", "double", 1, 4, "rw"), Err(Error::UnsupportedType { .. })));
    assert!(matches!(exec.create_buffer_tagged("noop", "float", 1, 4, "x"), Err(Error::InvalidDirection { .. })));
}
