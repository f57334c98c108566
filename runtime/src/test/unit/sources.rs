use std::path::PathBuf;

use super::{host_executor, register_common};
use crate::{Error, KernelSources};

/// Fresh directory under the system temp dir.
fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("tessera-{}-{name}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn test_default_dirs() {
    let sources = KernelSources::default();
    assert_eq!(sources.dirs(), &[PathBuf::from("./GPUKernels/"), PathBuf::from("./src/GPUKernels/")]);

    let extended = KernelSources::new([PathBuf::from("extra")]);
    assert_eq!(extended.dirs().len(), 3);
}

#[test]
fn test_locate_in_dir_then_subdir() {
    let root = scratch("locate");
    std::fs::create_dir_all(root.join("nested")).unwrap();
    std::fs::write(root.join("top.cl"), "__kernel void top()").unwrap();
    std::fs::write(root.join("nested").join("deep.cl"), "__kernel void deep()").unwrap();

    let sources = KernelSources::only([root.clone()]);
    assert_eq!(sources.locate("top.cl").unwrap(), root.join("top.cl"));
    assert_eq!(sources.locate("deep.cl").unwrap(), root.join("nested").join("deep.cl"));
    assert!(matches!(sources.locate("none.cl"), Err(Error::KernelSourceNotFound { searched: 1, .. })));

    let (path, source) = sources.load("deep.cl").unwrap();
    assert_eq!(path, root.join("nested").join("deep.cl"));
    assert_eq!(source, "__kernel void deep()");
    std::fs::remove_dir_all(root).unwrap();
}

#[test]
fn test_create_kernel_from_file() {
    let root = scratch("from-file");
    std::fs::write(root.join("add_one.cl"), "__kernel void add_one(__global float* data) {}").unwrap();
    std::fs::write(root.join("other.cl"), "__kernel void noop(__global float* a, int n) {}").unwrap();

    let mut exec = host_executor(register_common);
    exec.add_kernel_search_dir(&root);
    exec.create_kernel_from_file("add_one", None).unwrap();
    exec.create_kernel_from_file("noop", Some("other.cl")).unwrap();

    assert_eq!(exec.signature("add_one").unwrap().len(), 1);
    assert_eq!(exec.signature("noop").unwrap().len(), 2);
    assert!(matches!(exec.create_kernel_from_file("scale", None), Err(Error::KernelSourceNotFound { .. })));
    std::fs::remove_dir_all(root).unwrap();
}
