//! Compute backend trait and device abstraction.
//!
//! The [`ComputeBackend`] trait abstracts over execution strategies
//! (a single caller thread, a Rayon worker pool) so that the per-voxel
//! kernels in `nemato-core` stay independent of how the batch axis is
//! scheduled.
//!
//! Every batch operation is expressed as a *row fill*: the output buffer is a
//! flat slice made of equally sized rows (one row per voxel), and a kernel is
//! invoked once per row index with exclusive access to that row. Rows never
//! overlap, so no synchronisation is needed and the result does not depend on
//! the order in which rows are visited.

use num_complex::Complex64;
use thiserror::Error;

/// Errors originating from compute backends.
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Backend not available: {0}")]
    Unavailable(String),

    #[error("Output buffer of length {len} cannot be split into rows of length {row_len}")]
    InvalidPartition { len: usize, row_len: usize },
}

/// Describes the capabilities of a compute backend.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub backend_type: BackendType,
    pub worker_threads: usize,
}

/// The type of compute backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    Sequential,
    Cpu,
}

/// Row-fill kernel over a real output buffer.
pub type RealRowKernel<'a> = dyn Fn(usize, &mut [f64]) + Send + Sync + 'a;

/// Row-fill kernel over a complex output buffer.
pub type ComplexRowKernel<'a> = dyn Fn(usize, &mut [Complex64]) + Send + Sync + 'a;

/// Abstraction over batch execution strategies.
///
/// Implementations must call the kernel exactly once for every row index in
/// `0..out.len() / row_len`, handing it the disjoint slice
/// `out[i * row_len..(i + 1) * row_len]`.
pub trait ComputeBackend: Send + Sync {
    /// Return information about the backend.
    fn device_info(&self) -> DeviceInfo;

    /// Fill a real buffer row by row.
    fn fill_real_rows(
        &self,
        out: &mut [f64],
        row_len: usize,
        kernel: &RealRowKernel<'_>,
    ) -> Result<(), ComputeError>;

    /// Fill a complex buffer row by row.
    fn fill_complex_rows(
        &self,
        out: &mut [Complex64],
        row_len: usize,
        kernel: &ComplexRowKernel<'_>,
    ) -> Result<(), ComputeError>;
}

/// Check that `len` elements split evenly into rows of `row_len`.
pub(crate) fn check_partition(len: usize, row_len: usize) -> Result<(), ComputeError> {
    if row_len == 0 || len % row_len != 0 {
        return Err(ComputeError::InvalidPartition { len, row_len });
    }
    Ok(())
}
