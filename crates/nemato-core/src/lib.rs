//! # Nemato Core
//!
//! The numerical backbone of the Nemato framework: light propagation through
//! inhomogeneous anisotropic (liquid-crystal-like) media in the layered
//! transfer-matrix formalism. This crate implements the per-voxel dielectric
//! tensor rotation engine and the vector field data model consumed and
//! produced by every propagation stage.
//!
//! ## Architecture
//!
//! A director field (orientation angles per voxel) is turned into a packed
//! permittivity tensor field by the [`tensor::TensorFieldBuilder`], which
//! drives the closed-form kernels of [`rotation`] over a
//! [`nemato_compute::ComputeBackend`]. Input light is described by a
//! [`field::FieldData`] triple built by [`field::Illuminator`], reduced to
//! intensity or spectra, and persisted in the `.dtmf` container of [`io`].
//!
//! ## Modules
//!
//! - [`types`]: Core data structures (tensors, field data triple).
//! - [`rotation`]: Rotation matrices and diagonal tensor rotation.
//! - [`tensor`]: Batch tensor-field builder over director fields.
//! - [`field`]: Validation, flux reduction and illumination construction.
//! - [`wave`]: Plane-wave generation.
//! - [`window`]: Window and aperture functions.
//! - [`diffract`]: Propagation seam and angular-spectrum implementation.
//! - [`io`]: `.dtmf` field data files.
//! - [`npy`]: NumPy array records used inside `.dtmf` files.
//! - [`cache`]: Single-entry result cache.
//! - [`config`]: Engine configuration.

pub mod cache;
pub mod config;
pub mod diffract;
pub mod field;
pub mod io;
pub mod npy;
pub mod rotation;
pub mod tensor;
pub mod types;
pub mod wave;
pub mod window;

pub use config::{Config, ConfigError, Precision};
pub use field::{FieldData, FieldError};
pub use io::{load_field, save_field, IoError};
pub use tensor::{TensorError, TensorFieldBuilder};
