//! Trace suppliers
//!
//! A [`TraceSupplier`] hands the pipeline a populated trace file. Capturing a
//! trace by running an instrumented client lives outside this crate; the
//! built-in [`ExistingTrace`] points at a file that already exists.

use crate::config::RunConfig;
use crate::error::ReplayError;
use std::path::{Path, PathBuf};

/// Source of a trace file for one run
pub trait TraceSupplier {
    /// Path of a populated trace
    fn supply(&mut self) -> Result<PathBuf, ReplayError>;

    /// Fold settings learned while supplying back into the run configuration
    fn merge_into(&self, config: &mut RunConfig, trace: &Path) {
        config.trace = Some(trace.to_path_buf());
    }
}

/// Trace captured earlier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingTrace {
    path: PathBuf,
}

impl ExistingTrace {
    /// Create supplier for `path`
    #[inline]
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Supplied path
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TraceSupplier for ExistingTrace {
    fn supply(&mut self) -> Result<PathBuf, ReplayError> {
        let meta = std::fs::metadata(&self.path).map_err(|e| ReplayError::io(&self.path, e))?;
        if !meta.is_file() {
            return Err(ReplayError::config(format!(
                "trace {} is not a file",
                self.path.display()
            )));
        }
        Ok(self.path.clone())
    }
}
