use std::sync::Arc;

use test_case::test_case;

use crate::{
    CommandQueue, Device, DeviceFilter, DeviceInfo, DeviceKind, DeviceRegistry, Error, HostAllocator, HostCompiler,
    HostQueue, QueueFactory,
};

fn gpu(vendor: &str) -> Arc<Device> {
    let info = DeviceInfo { name: format!("{vendor} gpu"), vendor: vendor.into(), kind: DeviceKind::Gpu, max_work_group_size: 256 };
    let queues: QueueFactory = Arc::new(|| -> Box<dyn CommandQueue> { Box::new(HostQueue::new()) });
    Arc::new(Device::new(info, Arc::new(HostAllocator::new()), Arc::new(HostCompiler::new()), queues))
}

#[test_case("" => DeviceFilter::Any; "empty")]
#[test_case("GPU" => DeviceFilter::Gpu; "gpu")]
#[test_case("cpu" => DeviceFilter::Cpu; "cpu lowercase")]
#[test_case(" NVIDIA " => DeviceFilter::Vendor("NVIDIA".into()); "vendor trimmed")]
fn test_parse_filter(s: &str) -> DeviceFilter {
    DeviceFilter::parse(s)
}

#[test]
fn test_default_registry_has_host() {
    let registry = DeviceRegistry::default();
    let device = registry.select(&DeviceFilter::Any).unwrap();
    assert_eq!(device.info.kind, DeviceKind::Cpu);
    assert!(matches!(registry.select(&DeviceFilter::Gpu), Err(Error::NoMatchingDevice { .. })));
}

#[test]
fn test_any_prefers_gpu() {
    let registry = DeviceRegistry::default();
    registry.register(gpu("Acme"));

    assert_eq!(registry.select(&DeviceFilter::Any).unwrap().info.kind, DeviceKind::Gpu);
    assert_eq!(registry.select(&DeviceFilter::Cpu).unwrap().info.kind, DeviceKind::Cpu);
    assert_eq!(registry.select(&"acme".into()).unwrap().info.vendor, "Acme");
    assert!(registry.select(&"Other".into()).is_err());
    assert_eq!(registry.devices().len(), 2);
}

#[test]
fn test_global_host() {
    let device = crate::host().unwrap();
    assert_eq!(device.info.name, "host");
    crate::registry().host_compiler().register("global_probe", |_| Ok(()));
    assert!(crate::registry().host_compiler().contains("global_probe"));
}
