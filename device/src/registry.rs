use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use snafu::OptionExt;

use crate::device::{Device, DeviceInfo, DeviceKind, HostCompiler};
use crate::error::{NoMatchingDeviceSnafu, Result};

/// Device-class filter resolved once at start-up.
///
/// Examples:
/// - "" -> DeviceFilter::Any
/// - "GPU" -> DeviceFilter::Gpu
/// - "cpu" -> DeviceFilter::Cpu
/// - "NVIDIA" -> DeviceFilter::Vendor("NVIDIA")
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum DeviceFilter {
    #[default]
    Any,
    Cpu,
    Gpu,
    /// Case-insensitive match against the device name or vendor.
    Vendor(String),
}

impl DeviceFilter {
    pub fn parse(s: &str) -> Self {
        let trimmed = s.trim();
        match trimmed.to_uppercase().as_str() {
            "" | "ANY" => Self::Any,
            "CPU" => Self::Cpu,
            "GPU" => Self::Gpu,
            _ => Self::Vendor(trimmed.to_string()),
        }
    }

    pub fn matches(&self, info: &DeviceInfo) -> bool {
        match self {
            Self::Any => true,
            Self::Cpu => info.kind == DeviceKind::Cpu,
            Self::Gpu => info.kind == DeviceKind::Gpu,
            Self::Vendor(vendor) => {
                let vendor = vendor.to_lowercase();
                info.vendor.to_lowercase().contains(&vendor) || info.name.to_lowercase().contains(&vendor)
            }
        }
    }
}

impl From<&str> for DeviceFilter {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl std::fmt::Display for DeviceFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Any => f.write_str(""),
            Self::Cpu => f.write_str("CPU"),
            Self::Gpu => f.write_str("GPU"),
            Self::Vendor(vendor) => f.write_str(vendor),
        }
    }
}

/// Set of devices available to the process.
pub struct DeviceRegistry {
    devices: RwLock<Vec<Arc<Device>>>,
    host_compiler: Arc<HostCompiler>,
}

impl Default for DeviceRegistry {
    /// Registry holding only the host device.
    fn default() -> Self {
        let host_compiler = Arc::new(HostCompiler::new());
        let host = Arc::new(Device::host(Arc::clone(&host_compiler)));
        Self { devices: RwLock::new(vec![host]), host_compiler }
    }
}

impl DeviceRegistry {
    /// Make another backend selectable.
    pub fn register(&self, device: Arc<Device>) {
        tracing::debug!(device.name = %device.info.name, device.vendor = %device.info.vendor, "registered device");
        self.devices.write().push(device);
    }

    /// Pick a device for `filter`; with [`DeviceFilter::Any`] a GPU wins over the host.
    pub fn select(&self, filter: &DeviceFilter) -> Result<Arc<Device>> {
        let devices = self.devices.read();
        let preferred = match filter {
            DeviceFilter::Any => devices.iter().find(|d| d.info.kind == DeviceKind::Gpu),
            _ => None,
        };
        preferred
            .or_else(|| devices.iter().find(|d| filter.matches(&d.info)))
            .cloned()
            .context(NoMatchingDeviceSnafu { filter: filter.to_string() })
    }

    /// Compiler of the host device, where host kernel bodies are registered.
    pub fn host_compiler(&self) -> &Arc<HostCompiler> {
        &self.host_compiler
    }

    pub fn devices(&self) -> Vec<DeviceInfo> {
        self.devices.read().iter().map(|d| d.info.clone()).collect()
    }
}

/// Global device registry instance.
static REGISTRY: Lazy<DeviceRegistry> = Lazy::new(DeviceRegistry::default);

/// Get the global device registry.
pub fn registry() -> &'static DeviceRegistry {
    &REGISTRY
}

/// Convenience function to select a device by filter string.
pub fn get_device(filter: &str) -> Result<Arc<Device>> {
    registry().select(&DeviceFilter::parse(filter))
}

/// Convenience function to get the host device.
pub fn host() -> Result<Arc<Device>> {
    registry().select(&DeviceFilter::Cpu)
}
