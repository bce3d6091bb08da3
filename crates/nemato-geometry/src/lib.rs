//! # Nemato Geometry
//!
//! Director fields for liquid-crystal samples on a voxel grid:
//!
//! - **Regions** ([`primitives`]): spheres, ellipsoids, cuboids and cylinders
//!   bounding a nematic region inside an isotropic host.
//! - **Discretisation** ([`discretise`]): voxel centres and region masks.
//! - **Director generators** ([`director`]): uniform, radial and bipolar
//!   droplets, twisted cells, and conversion to orientation angles.

pub mod director;
pub mod discretise;
pub mod primitives;

pub use director::{DirectorField, DirectorSpec};
