mod signature;
mod sources;
mod store;

use std::sync::Arc;

use tessera_device::{Device, Error as DeviceError, HostCompiler};

use crate::{Executor, RuntimeConfig};

pub(crate) const NOOP_SRC: &str = "__kernel void noop(__global float* data)";
pub(crate) const ADD_ONE_SRC: &str = "__kernel void add_one(__global float* data)";
pub(crate) const SCALE_SRC: &str = "__kernel void scale(__global float* data, float factor)";
pub(crate) const IOTA_SRC: &str = "__kernel void iota(__global int* out)";
pub(crate) const FAIL_SRC: &str = "__kernel void fail(__global float* data)";

/// Executor on a private host device whose kernels `setup` registers.
pub(crate) fn host_executor(setup: impl FnOnce(&HostCompiler)) -> Executor {
    let compiler = Arc::new(HostCompiler::new());
    setup(&compiler);
    let device = Arc::new(Device::host(Arc::clone(&compiler)));
    Executor::new(device, RuntimeConfig::builder().quiet(true).build())
}

pub(crate) fn register_common(compiler: &HostCompiler) {
    compiler.register("noop", |_| Ok(()));
    compiler.register("add_one", |args| args.update(0, |v: &mut [f32]| v.iter_mut().for_each(|x| *x += 1.0)));
    compiler.register("scale", |args| {
        let factor: f32 = args.value(1)?;
        args.update(0, |v: &mut [f32]| v.iter_mut().for_each(|x| *x *= factor))
    });
    compiler.register("iota", |args| {
        args.update(0, |v: &mut [i32]| v.iter_mut().enumerate().for_each(|(i, x)| *x = i as i32 * 2))
    });
    compiler.register("fail", |_| Err(DeviceError::Runtime { message: "kernel aborted".into() }));
}
