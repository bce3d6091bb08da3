//! Core types shared across the Nemato framework.
//!
//! Tensors handled by the per-voxel kernels are fixed-size arrays so that
//! their shape is checked by the compiler; batch data lives in `ndarray`
//! arrays whose trailing axes carry these fixed shapes.

use std::borrow::Cow;

use ndarray::ArrayViewD;
use num_complex::Complex64;

/// A 3×3 real rotation matrix, row-major.
pub type RotationMatrix = [[f64; 3]; 3];

/// Permittivity tensor in the material's principal frame `(εx, εy, εz)`.
pub type DiagonalTensor = [Complex64; 3];

/// Symmetric tensor packed as `(T00, T11, T22, T01, T02, T12)`.
pub type PackedTensor = [Complex64; 6];

/// A full 3×3 complex tensor, row-major.
pub type TensorMatrix = [[Complex64; 3]; 3];

/// Number of tangential field components in the transfer-matrix formalism.
pub const FIELD_COMPONENTS: usize = 4;

/// Orientation sample of one voxel: `(material_id, theta, phi)` in radians.
pub type OrientationSample = [f64; 3];

/// Principal-frame permittivity from principal refractive indices, `ε = n²`.
pub fn refind2eps(n: [Complex64; 3]) -> DiagonalTensor {
    [n[0] * n[0], n[1] * n[1], n[2] * n[2]]
}

/// Borrow the elements of an array in logical (row-major) order, copying only
/// when the view is not already contiguous.
pub(crate) fn row_major<'a, T: Clone>(view: &'a ArrayViewD<'_, T>) -> Cow<'a, [T]> {
    match view.as_slice() {
        Some(slice) => Cow::Borrowed(slice),
        None => Cow::Owned(view.iter().cloned().collect()),
    }
}
