use tessera_dtype::ElemType;

use super::allocator;
use crate::{Buffer, Error, SharedAcquisition, SharedHandle};

fn shared(handle: u32) -> Buffer {
    Buffer::allocate_shared(allocator(), ElemType::Float, 4, SharedHandle(handle)).unwrap()
}

#[test]
fn test_acquire_release_cycle() {
    let buffer = shared(1);
    assert_eq!(buffer.shared_handle(), Some(SharedHandle(1)));

    buffer.acquire_shared().unwrap();
    assert!(buffer.is_acquired());
    assert!(matches!(buffer.acquire_shared(), Err(Error::AlreadyAcquired { handle: SharedHandle(1) })));

    assert!(buffer.release_shared());
    assert!(!buffer.release_shared());
    assert_eq!(buffer.acquire_counts(), (1, 1));
}

#[test]
fn test_plain_buffer_is_not_shared() {
    let buffer = Buffer::allocate(allocator(), ElemType::Float, 4).unwrap();

    assert!(!buffer.is_shared());
    assert!(matches!(buffer.acquire_shared(), Err(Error::NotShared)));
    assert!(!buffer.release_shared());
    assert_eq!(buffer.acquire_counts(), (0, 0));
}

#[test]
fn test_scope_deduplicates_and_skips_plain() {
    let a = shared(1);
    let b = shared(2);
    let plain = Buffer::allocate(allocator(), ElemType::Int, 4).unwrap();

    let mut scope = SharedAcquisition::new();
    scope.acquire(&a).unwrap();
    scope.acquire(&a.clone()).unwrap();
    scope.acquire(&b).unwrap();
    scope.acquire(&plain).unwrap();

    assert_eq!(scope.len(), 2);
    assert!(scope.holds(a.id()));
    assert!(!scope.holds(plain.id()));

    scope.release();
    assert_eq!(a.acquire_counts(), (1, 1));
    assert_eq!(b.acquire_counts(), (1, 1));
}

#[test]
fn test_scope_releases_on_drop() {
    let a = shared(3);
    {
        let mut scope = SharedAcquisition::new();
        scope.acquire(&a).unwrap();
        assert!(a.is_acquired());
    }
    assert!(!a.is_acquired());
    assert_eq!(a.acquire_counts(), (1, 1));
}
