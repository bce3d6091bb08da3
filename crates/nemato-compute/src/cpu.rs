//! CPU compute backend using Rayon for shared-memory parallelism.

use num_complex::Complex64;
use rayon::prelude::*;

use crate::backend::{
    check_partition, BackendType, ComplexRowKernel, ComputeBackend, ComputeError, DeviceInfo,
    RealRowKernel,
};

/// Smallest number of rows handed to a single Rayon task. Per-voxel kernels
/// are a few dozen flops, so splitting finer than this costs more in
/// scheduling than it gains.
const MIN_ROWS_PER_TASK: usize = 512;

/// CPU backend that parallelises rows across a Rayon worker pool.
pub struct CpuBackend {
    num_threads: usize,
    /// Dedicated pool; `None` means the global Rayon pool.
    pool: Option<rayon::ThreadPool>,
}

impl CpuBackend {
    /// Create a new CPU backend on the global Rayon pool.
    pub fn new() -> Self {
        Self {
            num_threads: rayon::current_num_threads(),
            pool: None,
        }
    }

    /// Create a CPU backend with its own fixed-size worker pool.
    pub fn with_threads(num_threads: usize) -> Result<Self, ComputeError> {
        let num_threads = num_threads.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("nemato-worker-{i}"))
            .build()
            .map_err(|e| ComputeError::Unavailable(format!("Failed to build thread pool: {e}")))?;
        log::debug!("Built Rayon pool with {num_threads} worker threads");
        Ok(Self {
            num_threads,
            pool: Some(pool),
        })
    }

    fn fill_rows<T: Send>(
        &self,
        out: &mut [T],
        row_len: usize,
        kernel: &(dyn Fn(usize, &mut [T]) + Send + Sync + '_),
    ) -> Result<(), ComputeError> {
        check_partition(out.len(), row_len)?;
        let mut run = || {
            out.par_chunks_mut(row_len)
                .with_min_len(MIN_ROWS_PER_TASK)
                .enumerate()
                .for_each(|(i, row)| kernel(i, row));
        };
        match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        }
        Ok(())
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ComputeBackend for CpuBackend {
    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            name: format!("CPU ({} threads)", self.num_threads),
            backend_type: BackendType::Cpu,
            worker_threads: self.num_threads,
        }
    }

    fn fill_real_rows(
        &self,
        out: &mut [f64],
        row_len: usize,
        kernel: &RealRowKernel<'_>,
    ) -> Result<(), ComputeError> {
        self.fill_rows(out, row_len, kernel)
    }

    fn fill_complex_rows(
        &self,
        out: &mut [Complex64],
        row_len: usize,
        kernel: &ComplexRowKernel<'_>,
    ) -> Result<(), ComputeError> {
        self.fill_rows(out, row_len, kernel)
    }
}
