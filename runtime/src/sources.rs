//! Kernel source file lookup.

use std::path::{Path, PathBuf};

use snafu::ResultExt;

use crate::error::{IoSnafu, KernelSourceNotFoundSnafu, Result};

/// Directories searched for kernel source files.
///
/// Each directory is searched first, then its direct subdirectories.
#[derive(Debug, Clone)]
pub struct KernelSources {
    dirs: Vec<PathBuf>,
}

impl Default for KernelSources {
    fn default() -> Self {
        Self { dirs: vec![PathBuf::from("./GPUKernels/"), PathBuf::from("./src/GPUKernels/")] }
    }
}

impl KernelSources {
    /// Default directories followed by `extra`.
    pub fn new(extra: impl IntoIterator<Item = PathBuf>) -> Self {
        let mut sources = Self::default();
        sources.dirs.extend(extra);
        sources
    }

    /// Search only `dirs`.
    pub fn only(dirs: impl IntoIterator<Item = PathBuf>) -> Self {
        Self { dirs: dirs.into_iter().collect() }
    }

    pub fn add_dir(&mut self, dir: impl Into<PathBuf>) {
        self.dirs.push(dir.into());
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Resolve `file`, accepting an existing path as is.
    pub fn locate(&self, file: &str) -> Result<PathBuf> {
        let direct = Path::new(file);
        if direct.is_file() {
            return Ok(direct.to_path_buf());
        }

        for dir in &self.dirs {
            let candidate = dir.join(file);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
        for dir in &self.dirs {
            let Ok(entries) = std::fs::read_dir(dir) else { continue };
            for entry in entries.flatten() {
                let candidate = entry.path().join(file);
                if entry.path().is_dir() && candidate.is_file() {
                    return Ok(candidate);
                }
            }
        }
        KernelSourceNotFoundSnafu { file, searched: self.dirs.len() }.fail()
    }

    pub fn load(&self, file: &str) -> Result<(PathBuf, String)> {
        let path = self.locate(file)?;
        let source = std::fs::read_to_string(&path).context(IoSnafu { path: path.clone() })?;
        tracing::debug!(path = %path.display(), bytes = source.len(), "loaded kernel source");
        Ok((path, source))
    }
}
