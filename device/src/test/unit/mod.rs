mod interop;
mod registry;

use std::sync::Arc;

use crate::HostAllocator;

pub(crate) fn allocator() -> Arc<HostAllocator> {
    Arc::new(HostAllocator::new())
}
