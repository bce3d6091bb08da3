//! # Nemato Compute
//!
//! Batch execution backends for the Nemato framework. This crate provides a
//! [`ComputeBackend`](backend::ComputeBackend) trait that isolates the
//! per-voxel kernels from how the batch axis is scheduled.
//!
//! ## Available backends
//!
//! | Backend | Feature flag | Notes |
//! |---------|-------------|-------|
//! | Sequential | always | Caller's thread, index order |
//! | CPU (Rayon) | `cpu` (default) | Global or dedicated fixed-size pool |

pub mod backend;
pub mod sequential;

#[cfg(feature = "cpu")]
pub mod cpu;

pub use backend::{BackendType, ComputeBackend, ComputeError, DeviceInfo};
pub use sequential::SequentialBackend;

#[cfg(feature = "cpu")]
pub use cpu::CpuBackend;
