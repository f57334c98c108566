//! Runtime and scheduler configuration.
//!
//! Both configurations come with bon builders and environment fallbacks.

use std::path::PathBuf;
use std::time::Duration;

use bon::bon;

use crate::store::PrintMode;

// ============================================================================
// RUNTIME
// ============================================================================

/// Executor configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuntimeConfig {
    /// Device filter: `"GPU"`, `"CPU"`, a vendor name, or empty for any.
    pub device: String,
    /// Kernel source directories searched after the defaults.
    pub kernel_paths: Vec<PathBuf>,
    pub print_mode: PrintMode,
    /// Suppress printed buffer contents.
    pub quiet: bool,
}

#[bon]
impl RuntimeConfig {
    #[builder(finish_fn = build)]
    pub fn builder(
        #[builder(default)] device: String,
        #[builder(default)] kernel_paths: Vec<PathBuf>,
        #[builder(default)] print_mode: PrintMode,
        #[builder(default = false)] quiet: bool,
    ) -> Self {
        Self { device, kernel_paths, print_mode, quiet }
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// * `TESSERA_DEVICE` - Device filter (default: any)
    /// * `TESSERA_KERNEL_PATH` - Extra kernel directories, platform path-list syntax
    /// * `TESSERA_PRINT_INDEXED` - Print `index: value` lines if set
    /// * `TESSERA_QUIET` - Suppress printed buffers if set
    pub fn from_env() -> Self {
        let device = std::env::var("TESSERA_DEVICE").unwrap_or_default();
        let kernel_paths = std::env::var_os("TESSERA_KERNEL_PATH")
            .map(|paths| std::env::split_paths(&paths).collect())
            .unwrap_or_default();
        let print_mode =
            if std::env::var("TESSERA_PRINT_INDEXED").is_ok() { PrintMode::IndexedValues } else { PrintMode::Values };
        let quiet = std::env::var("TESSERA_QUIET").is_ok();

        Self { device, kernel_paths, print_mode, quiet }
    }
}

// ============================================================================
// SCHEDULER
// ============================================================================

/// Scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// How long a blocked `schedule*` call waits between stall warnings.
    pub stall_warning: Duration,
    /// Run the step kernels every tick regardless of the budget.
    pub always_run: bool,
    /// Initial step budget.
    pub run_chunk: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { stall_warning: Duration::from_millis(20), always_run: false, run_chunk: 0 }
    }
}

#[bon]
impl SchedulerConfig {
    #[builder(finish_fn = build)]
    pub fn builder(
        #[builder(default = 20)] stall_warning_ms: u64,
        #[builder(default = false)] always_run: bool,
        #[builder(default = 0)] run_chunk: u64,
    ) -> Self {
        Self { stall_warning: Duration::from_millis(stall_warning_ms), always_run, run_chunk }
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// * `TESSERA_STALL_WARN_MS` - Stall warning interval (default: 20)
    /// * `TESSERA_ALWAYS_RUN` - Ignore the step budget if set
    /// * `TESSERA_RUN_CHUNK` - Initial step budget (default: 0)
    pub fn from_env() -> Self {
        let stall_warning_ms = std::env::var("TESSERA_STALL_WARN_MS").ok().and_then(|s| s.parse().ok()).unwrap_or(20);
        let always_run = std::env::var("TESSERA_ALWAYS_RUN").is_ok();
        let run_chunk = std::env::var("TESSERA_RUN_CHUNK").ok().and_then(|s| s.parse().ok()).unwrap_or(0);

        Self { stall_warning: Duration::from_millis(stall_warning_ms), always_run, run_chunk }
    }
}
