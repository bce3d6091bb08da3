//! Discretisation of regions onto the voxel grid.
//!
//! Director fields are sampled on a regular `[nz, ny, nx]` grid of unit
//! voxels. Voxel `(k, i, j)` has its centre at
//! `(j - (nx - 1)/2, i - (ny - 1)/2, k - (nz - 1)/2)`, so the grid is centred
//! on the origin for both odd and even sizes.

use ndarray::Array3;

use crate::primitives::Primitive;

/// Grid dimensions `(nz, ny, nx)`.
pub type GridShape = (usize, usize, usize);

/// Centre of voxel `(k, i, j)` as `(x, y, z)`.
pub fn voxel_centre(shape: GridShape, k: usize, i: usize, j: usize) -> [f64; 3] {
    let (nz, ny, nx) = shape;
    let offset = |index: usize, n: usize| index as f64 - (n as f64 - 1.0) / 2.0;
    [offset(j, nx), offset(i, ny), offset(k, nz)]
}

/// Mark every voxel whose centre lies inside `primitive`.
pub fn voxelise(primitive: &Primitive, shape: GridShape) -> Array3<bool> {
    Array3::from_shape_fn(shape, |(k, i, j)| {
        primitive.contains(&voxel_centre(shape, k, i, j))
    })
}
