//! Properties of the rotation algebra and the batch tensor-field builder.
//!
//! - Rotation matrices are orthogonal with determinant +1
//! - The uniaxial path equals the general path with zero yaw
//! - Packed tensor rotation equals `R·diag·Rᵗ` by direct multiplication
//! - A uniform isotropic-aligned director field leaves the tensor diagonal
//! - Results do not depend on the compute backend

use std::sync::Arc;

use approx::assert_abs_diff_eq;
use ndarray::{Array, Array1, Array2, ArrayD, IxDyn};
use num_complex::Complex64;

use nemato_compute::{ComputeBackend, CpuBackend, SequentialBackend};
use nemato_core::rotation::{
    rotate_diagonal_tensor, rotation_matrix, rotation_matrix_into, rotation_matrix_uniaxial,
    rotation_matrix_y, rotation_matrix_z, tensor_to_matrix,
};
use nemato_core::tensor::{Azimuth, MaterialKind, MaterialTable, TensorError, TensorFieldBuilder};
use nemato_core::types::{refind2eps, RotationMatrix};

// ─────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────

/// Deterministic angle triples covering all quadrants and tiny angles.
fn angle_grid() -> Vec<(f64, f64, f64)> {
    let values = [-3.0, -1.2, -1e-9, 0.0, 1e-7, 0.4, 1.5707963, 2.9];
    let mut out = Vec::new();
    for &a in &values {
        for &b in &values {
            for &c in &values {
                out.push((a, b, c));
            }
        }
    }
    out
}

fn matmul(a: &RotationMatrix, b: &RotationMatrix) -> RotationMatrix {
    let mut c = [[0.0; 3]; 3];
    for i in 0..3 {
        for j in 0..3 {
            c[i][j] = (0..3).map(|k| a[i][k] * b[k][j]).sum();
        }
    }
    c
}

fn det(r: &RotationMatrix) -> f64 {
    r[0][0] * (r[1][1] * r[2][2] - r[1][2] * r[2][1])
        - r[0][1] * (r[1][0] * r[2][2] - r[1][2] * r[2][0])
        + r[0][2] * (r[1][0] * r[2][1] - r[1][1] * r[2][0])
}

// ─────────────────────────────────────────────────────────────
// Rotation algebra
// ─────────────────────────────────────────────────────────────

#[test]
fn test_rotation_matrices_are_proper_orthogonal() {
    for (yaw, theta, phi) in angle_grid() {
        let r = rotation_matrix(yaw, theta, phi);
        for i in 0..3 {
            for j in 0..3 {
                let dot: f64 = (0..3).map(|k| r[i][k] * r[j][k]).sum();
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(dot, expected, epsilon = 1e-12);
            }
        }
        assert_abs_diff_eq!(det(&r), 1.0, epsilon = 1e-12);
    }
}

#[test]
fn test_closed_form_matches_composition() {
    for (yaw, theta, phi) in angle_grid() {
        let composed = matmul(
            &matmul(&rotation_matrix_z(phi), &rotation_matrix_y(theta)),
            &rotation_matrix_z(yaw),
        );
        let closed = rotation_matrix(yaw, theta, phi);
        for i in 0..3 {
            for j in 0..3 {
                assert_abs_diff_eq!(closed[i][j], composed[i][j], epsilon = 1e-12);
            }
        }
    }
}

#[test]
fn test_uniaxial_path_equals_zero_yaw() {
    for (_, theta, phi) in angle_grid() {
        assert_eq!(
            rotation_matrix_uniaxial(theta, phi),
            rotation_matrix(0.0, theta, phi)
        );
    }
}

#[test]
fn test_packed_rotation_matches_direct_product() {
    let diagonals = [
        [Complex64::new(2.25, 0.0), Complex64::new(2.25, 0.0), Complex64::new(2.89, 0.0)],
        [Complex64::new(1.0, 0.1), Complex64::new(-4.0, 0.5), Complex64::new(2.0, -3.0)],
    ];
    for (yaw, theta, phi) in angle_grid().into_iter().step_by(7) {
        let r = rotation_matrix(yaw, theta, phi);
        for d in &diagonals {
            let m = tensor_to_matrix(&rotate_diagonal_tensor(&r, d));
            for i in 0..3 {
                for j in 0..3 {
                    let direct: Complex64 = (0..3).map(|k| r[i][k] * d[k] * r[j][k]).sum();
                    assert_abs_diff_eq!((m[i][j] - direct).norm(), 0.0, epsilon = 1e-12);
                }
            }
        }
    }
}

#[test]
fn test_output_view_shape_is_enforced() {
    let mut ok = Array2::<f64>::zeros((3, 3));
    rotation_matrix_into(0.1, 0.2, 0.3, ok.view_mut()).unwrap();
    assert_eq!(ok[[2, 2]], 0.2f64.cos());

    let mut bad = Array2::<f64>::zeros((3, 4));
    assert!(matches!(
        rotation_matrix_into(0.1, 0.2, 0.3, bad.view_mut()),
        Err(TensorError::ShapeMismatch { .. })
    ));
}

// ─────────────────────────────────────────────────────────────
// Batch builder
// ─────────────────────────────────────────────────────────────

#[test]
fn test_uniform_field_keeps_tensor_diagonal() {
    let n = Complex64::new(1.5, 0.0);
    let diagonal = Array1::from(refind2eps([n, n, n]).to_vec()).into_dyn();
    let angles = Array::<f64, _>::zeros((10, 10, 3)).into_dyn();
    let builder = TensorFieldBuilder::new(Arc::new(SequentialBackend));
    let eps = builder
        .tensor_field(&angles.view(), &diagonal.view(), &Azimuth::Uniform(0.0))
        .unwrap();
    assert_eq!(eps.shape(), &[10, 10, 6]);
    let expected = [2.25, 2.25, 2.25, 0.0, 0.0, 0.0];
    for voxel in eps.into_shape_with_order((100, 6)).unwrap().outer_iter() {
        for (v, e) in voxel.iter().zip(expected) {
            assert_abs_diff_eq!(v.re, e, epsilon = 1e-12);
            assert_abs_diff_eq!(v.im, 0.0, epsilon = 1e-12);
        }
    }
}

#[test]
fn test_results_independent_of_backend() {
    // Mixed materials, varying angles and per-voxel azimuths.
    let shape = (7, 11, 13);
    let angles = Array::from_shape_fn((shape.0, shape.1, shape.2, 3), |(i, j, k, c)| match c {
        0 => ((i + j + k) % 3) as f64,
        1 => 0.05 * (i * 13 + k) as f64,
        _ => -0.03 * (j * 7 + k) as f64,
    })
    .into_dyn();
    let phi0 = Azimuth::PerVoxel(
        Array::from_shape_fn(shape, |(i, j, k)| 0.01 * (i * j + k) as f64).into_dyn(),
    );
    let diagonal: ArrayD<Complex64> = Array1::from(vec![
        Complex64::new(2.3, 0.01),
        Complex64::new(2.4, 0.0),
        Complex64::new(2.9, 0.02),
    ])
    .into_dyn();
    let materials = MaterialTable::new(vec![
        MaterialKind::Isotropic,
        MaterialKind::Uniaxial,
        MaterialKind::Biaxial,
    ]);

    let backends: Vec<Arc<dyn ComputeBackend>> = vec![
        Arc::new(SequentialBackend),
        Arc::new(CpuBackend::with_threads(4).unwrap()),
    ];
    let results: Vec<_> = backends
        .into_iter()
        .map(|backend| {
            let builder = TensorFieldBuilder::new(backend).with_materials(materials.clone());
            (
                builder.rotation_field(&angles.view(), &phi0).unwrap(),
                builder
                    .tensor_field(&angles.view(), &diagonal.view(), &phi0)
                    .unwrap(),
            )
        })
        .collect();
    assert_eq!(results[0].0, results[1].0);
    assert_eq!(results[0].1, results[1].1);
    assert_eq!(results[0].1.shape(), &[7, 11, 13, 6]);
}

#[test]
fn test_non_contiguous_angles_are_read_in_logical_order() {
    let angles = Array::from_shape_fn((3, 4, 3), |(i, j, c)| {
        if c == 1 {
            0.1 * (i + 2 * j) as f64
        } else {
            0.0
        }
    });
    let transposed = angles.clone().permuted_axes([1, 0, 2]);
    let builder = TensorFieldBuilder::new(Arc::new(SequentialBackend));
    let a = builder
        .rotation_field(&transposed.view().into_dyn(), &Azimuth::default())
        .unwrap();
    let b = builder
        .rotation_field(
            &transposed.as_standard_layout().view().into_dyn(),
            &Azimuth::default(),
        )
        .unwrap();
    assert_eq!(a, b);
    assert_eq!(a.shape(), &[4, 3, 3, 3]);
    let r = rotation_matrix_uniaxial(0.1 * (2.0 + 2.0 * 3.0), 0.0);
    assert_abs_diff_eq!(a[IxDyn(&[3, 2, 0, 2])], r[0][2], epsilon = 1e-15);
}
