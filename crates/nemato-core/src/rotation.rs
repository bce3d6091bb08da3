//! Rotation algebra for anisotropic permittivity tensors.
//!
//! A material's permittivity is known in its principal frame as a diagonal
//! tensor $\operatorname{diag}(\epsilon_x, \epsilon_y, \epsilon_z)$. In the
//! laboratory frame it becomes
//!
//! $$
//! \boldsymbol{\epsilon} = \mathbf{R}\,\operatorname{diag}(\epsilon)\,\mathbf{R}^T,
//! \qquad \mathbf{R} = R_z(\phi)\,R_y(\theta)\,R_z(\psi)
//! $$
//!
//! where $\psi$ is the yaw (twist about the optical axis), $\theta$ the tilt
//! and $\phi$ the azimuth. The elementary rotations follow the convention
//!
//! $$
//! R_z(a) = \begin{pmatrix} \cos a & -\sin a & 0 \\ \sin a & \cos a & 0 \\ 0 & 0 & 1 \end{pmatrix},
//! \quad
//! R_y(a) = \begin{pmatrix} \cos a & 0 & -\sin a \\ 0 & 1 & 0 \\ \sin a & 0 & \cos a \end{pmatrix}
//! $$
//!
//! Note the sign placement in $R_y$: the phase and handedness of polarisation
//! downstream depend on it.
//!
//! The composed matrices are written out in closed form rather than built by
//! matrix products. The kernels on fixed-size arrays never fail; the `*_into`
//! variants write into caller-provided `ndarray` views and reject views of the
//! wrong shape with [`TensorError::ShapeMismatch`].

use ndarray::{ArrayView1, ArrayView2, ArrayViewMut1, ArrayViewMut2, Dimension};
use num_complex::Complex64;

use crate::tensor::TensorError;
use crate::types::{DiagonalTensor, PackedTensor, RotationMatrix, TensorMatrix};

/// Full rotation matrix $R_z(\phi)\,R_y(\theta)\,R_z(\psi)$ for yaw $\psi$.
///
/// ```
/// use nemato_core::rotation::{rotation_matrix, rotation_matrix_y, rotation_matrix_z};
///
/// let a = rotation_matrix(0.12, 0.245, 0.78);
/// let (rf, rt, ry) = (rotation_matrix_z(0.78), rotation_matrix_y(0.245), rotation_matrix_z(0.12));
/// let mut b = [[0.0; 3]; 3];
/// for i in 0..3 {
///     for j in 0..3 {
///         for k in 0..3 {
///             for l in 0..3 {
///                 b[i][j] += rf[i][k] * rt[k][l] * ry[l][j];
///             }
///         }
///     }
/// }
/// for i in 0..3 {
///     for j in 0..3 {
///         assert!((a[i][j] - b[i][j]).abs() < 1e-12);
///     }
/// }
/// ```
pub fn rotation_matrix(yaw: f64, theta: f64, phi: f64) -> RotationMatrix {
    let (sinyaw, cosyaw) = yaw.sin_cos();
    let (sintheta, costheta) = theta.sin_cos();
    let (sinphi, cosphi) = phi.sin_cos();

    let sinphi_sinyaw = sinphi * sinyaw;
    let sinphi_cosyaw = sinphi * cosyaw;
    let cosphi_sinyaw = cosphi * sinyaw;
    let cosphi_cosyaw = cosphi * cosyaw;

    [
        [
            costheta * cosphi_cosyaw - sinphi_sinyaw,
            -costheta * cosphi_sinyaw - sinphi_cosyaw,
            -cosphi * sintheta,
        ],
        [
            costheta * sinphi_cosyaw + cosphi_sinyaw,
            cosphi_cosyaw - costheta * sinphi_sinyaw,
            -sintheta * sinphi,
        ],
        [cosyaw * sintheta, -sintheta * sinyaw, costheta],
    ]
}

/// Rotation matrix $R_z(\phi)\,R_y(\theta)$ for uniaxial media.
///
/// Identical to [`rotation_matrix`] with zero yaw; a uniaxial tensor is
/// invariant under rotation about its optical axis, so the yaw term is never
/// needed.
pub fn rotation_matrix_uniaxial(theta: f64, phi: f64) -> RotationMatrix {
    let (sintheta, costheta) = theta.sin_cos();
    let (sinphi, cosphi) = phi.sin_cos();

    [
        [costheta * cosphi, -sinphi, -cosphi * sintheta],
        [costheta * sinphi, cosphi, -sintheta * sinphi],
        [sintheta, 0.0, costheta],
    ]
}

/// Elementary rotation about the z axis.
pub fn rotation_matrix_z(angle: f64) -> RotationMatrix {
    let (s, c) = angle.sin_cos();
    [[c, -s, 0.0], [s, c, 0.0], [0.0, 0.0, 1.0]]
}

/// Elementary rotation about the y axis (with the $-\sin$ in the top row).
pub fn rotation_matrix_y(angle: f64) -> RotationMatrix {
    let (s, c) = angle.sin_cos();
    [[c, 0.0, -s], [0.0, 1.0, 0.0], [s, 0.0, c]]
}

/// 2D rotation matrix in the transverse plane.
pub fn rotation_matrix2(angle: f64) -> [[f64; 2]; 2] {
    let (s, c) = angle.sin_cos();
    [[c, -s], [s, c]]
}

/// Unit vector `(cos a, sin a)`.
pub fn rotation_vector2(angle: f64) -> [f64; 2] {
    let (s, c) = angle.sin_cos();
    [c, s]
}

/// Rotate a diagonal tensor: returns the packed upper triangle of
/// $\mathbf{R}\,\operatorname{diag}(d)\,\mathbf{R}^T$.
///
/// Only the six independent entries are evaluated:
/// $T_{ij} = \sum_k d_k R_{ik} R_{jk}$.
pub fn rotate_diagonal_tensor(r: &RotationMatrix, diagonal: &DiagonalTensor) -> PackedTensor {
    let d = diagonal;
    let entry = |i: usize, j: usize| {
        d[0] * r[i][0] * r[j][0] + d[1] * r[i][1] * r[j][1] + d[2] * r[i][2] * r[j][2]
    };
    [
        entry(0, 0),
        entry(1, 1),
        entry(2, 2),
        entry(0, 1),
        entry(0, 2),
        entry(1, 2),
    ]
}

/// Expand a packed symmetric tensor into a full 3×3 matrix.
pub fn tensor_to_matrix(tensor: &PackedTensor) -> TensorMatrix {
    let t = tensor;
    [[t[0], t[3], t[4]], [t[3], t[1], t[5]], [t[4], t[5], t[2]]]
}

/// Expand a diagonal tensor into a full 3×3 matrix with zero off-diagonals.
pub fn diagonal_tensor_to_matrix(diagonal: &DiagonalTensor) -> TensorMatrix {
    let zero = Complex64::new(0.0, 0.0);
    let d = diagonal;
    [[d[0], zero, zero], [zero, d[1], zero], [zero, zero, d[2]]]
}

fn check_shape<D: Dimension>(what: &'static str, found: D, expected: &[usize]) -> Result<(), TensorError> {
    if found.slice() != expected {
        return Err(TensorError::ShapeMismatch {
            what,
            expected: expected.to_vec(),
            found: found.slice().to_vec(),
        });
    }
    Ok(())
}

fn write_matrix<T: Copy>(src: &[[T; 3]; 3], mut out: ArrayViewMut2<'_, T>) {
    for (i, row) in src.iter().enumerate() {
        for (j, &value) in row.iter().enumerate() {
            out[[i, j]] = value;
        }
    }
}

/// Load a 3×3 view into a fixed-size matrix after checking its shape.
pub fn matrix_from_view(r: ArrayView2<'_, f64>) -> Result<RotationMatrix, TensorError> {
    check_shape("rotation matrix", r.raw_dim(), &[3, 3])?;
    let mut m = [[0.0; 3]; 3];
    for (i, row) in m.iter_mut().enumerate() {
        for (j, value) in row.iter_mut().enumerate() {
            *value = r[[i, j]];
        }
    }
    Ok(m)
}

/// [`rotation_matrix`] writing into a caller-provided `(3, 3)` view.
pub fn rotation_matrix_into(
    yaw: f64,
    theta: f64,
    phi: f64,
    out: ArrayViewMut2<'_, f64>,
) -> Result<(), TensorError> {
    check_shape("output matrix", out.raw_dim(), &[3, 3])?;
    write_matrix(&rotation_matrix(yaw, theta, phi), out);
    Ok(())
}

/// [`rotation_matrix_uniaxial`] writing into a caller-provided `(3, 3)` view.
pub fn rotation_matrix_uniaxial_into(
    theta: f64,
    phi: f64,
    out: ArrayViewMut2<'_, f64>,
) -> Result<(), TensorError> {
    check_shape("output matrix", out.raw_dim(), &[3, 3])?;
    write_matrix(&rotation_matrix_uniaxial(theta, phi), out);
    Ok(())
}

/// [`rotate_diagonal_tensor`] over views: `r` must be `(3, 3)`, `diagonal`
/// `(3,)` and `out` `(6,)`.
pub fn rotate_diagonal_tensor_into(
    r: ArrayView2<'_, f64>,
    diagonal: ArrayView1<'_, Complex64>,
    mut out: ArrayViewMut1<'_, Complex64>,
) -> Result<(), TensorError> {
    let r = matrix_from_view(r)?;
    check_shape("diagonal tensor", diagonal.raw_dim(), &[3])?;
    check_shape("output tensor", out.raw_dim(), &[6])?;
    let d = [diagonal[0], diagonal[1], diagonal[2]];
    for (o, v) in out.iter_mut().zip(rotate_diagonal_tensor(&r, &d)) {
        *o = v;
    }
    Ok(())
}

/// [`tensor_to_matrix`] over views: `tensor` must be `(6,)`, `out` `(3, 3)`.
pub fn tensor_to_matrix_into(
    tensor: ArrayView1<'_, Complex64>,
    out: ArrayViewMut2<'_, Complex64>,
) -> Result<(), TensorError> {
    check_shape("packed tensor", tensor.raw_dim(), &[6])?;
    check_shape("output matrix", out.raw_dim(), &[3, 3])?;
    let mut t = [Complex64::new(0.0, 0.0); 6];
    for (dst, src) in t.iter_mut().zip(tensor.iter()) {
        *dst = *src;
    }
    write_matrix(&tensor_to_matrix(&t), out);
    Ok(())
}

/// [`diagonal_tensor_to_matrix`] over views: `diagonal` must be `(3,)`,
/// `out` `(3, 3)`.
pub fn diagonal_tensor_to_matrix_into(
    diagonal: ArrayView1<'_, Complex64>,
    out: ArrayViewMut2<'_, Complex64>,
) -> Result<(), TensorError> {
    check_shape("diagonal tensor", diagonal.raw_dim(), &[3])?;
    check_shape("output matrix", out.raw_dim(), &[3, 3])?;
    let d = [diagonal[0], diagonal[1], diagonal[2]];
    write_matrix(&diagonal_tensor_to_matrix(&d), out);
    Ok(())
}
