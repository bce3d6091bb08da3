//! Single-threaded backend running every row on the caller's thread.

use num_complex::Complex64;

use crate::backend::{
    check_partition, BackendType, ComplexRowKernel, ComputeBackend, ComputeError, DeviceInfo,
    RealRowKernel,
};

/// Backend that visits rows in index order on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct SequentialBackend;

impl ComputeBackend for SequentialBackend {
    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            name: "Sequential".into(),
            backend_type: BackendType::Sequential,
            worker_threads: 1,
        }
    }

    fn fill_real_rows(
        &self,
        out: &mut [f64],
        row_len: usize,
        kernel: &RealRowKernel<'_>,
    ) -> Result<(), ComputeError> {
        check_partition(out.len(), row_len)?;
        out.chunks_mut(row_len)
            .enumerate()
            .for_each(|(i, row)| kernel(i, row));
        Ok(())
    }

    fn fill_complex_rows(
        &self,
        out: &mut [Complex64],
        row_len: usize,
        kernel: &ComplexRowKernel<'_>,
    ) -> Result<(), ComputeError> {
        check_partition(out.len(), row_len)?;
        out.chunks_mut(row_len)
            .enumerate()
            .for_each(|(i, row)| kernel(i, row));
        Ok(())
    }
}
