//! # Nemato Materials
//!
//! Principal-frame dielectric providers. All materials implement
//! [`MaterialProvider`](provider::MaterialProvider), which returns the
//! principal refractive indices at a wavelength and, through `ε = n²`, the
//! diagonal permittivity fed to the tensor-field builder.
//!
//! | Source | Module |
//! |--------|--------|
//! | Cauchy dispersion (5CB, glasses) | [`cauchy`] |
//! | Tabulated `(λ, n, k)` data, e.g. Palik fused silica | [`tabulated`] |
//! | Lookup by name, job-file descriptions | [`catalog`] |
//!
//! Tabulated data is interpolated with natural cubic splines
//! ([`spline::CubicSpline`]).

pub mod catalog;
pub mod cauchy;
pub mod provider;
pub mod spline;
pub mod tabulated;

pub use catalog::{by_name, MaterialSpec};
pub use provider::{MaterialError, MaterialProvider};
