//! Batch tensor-field builder.
//!
//! Applies the per-voxel kernels of [`crate::rotation`] over a director field
//! of arbitrary leading shape. The trailing axis of the orientation array holds
//! one [`OrientationSample`] `(material_id, theta, phi)` per voxel; outputs
//! keep the leading shape and append the per-voxel shape (`[3, 3]` for
//! rotation matrices, `[6]` for packed tensors).
//!
//! Each voxel is computed independently and writes only its own output row,
//! so the result is the same for every [`ComputeBackend`].

use std::f64::consts::FRAC_PI_2;
use std::sync::Arc;

use ndarray::{ArrayD, ArrayViewD, IxDyn};
use num_complex::Complex64;
use thiserror::Error;

use nemato_compute::{ComputeBackend, ComputeError, CpuBackend};

use crate::config::{Config, ConfigError};
use crate::rotation::{rotate_diagonal_tensor, rotation_matrix, rotation_matrix_uniaxial};
use crate::types::{row_major, DiagonalTensor, OrientationSample, RotationMatrix};

/// Errors raised by the rotation kernels and the batch builder.
#[derive(Debug, Error)]
pub enum TensorError {
    #[error("Shape mismatch for {what}: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("Invalid material id {value} at voxel {voxel}")]
    InvalidMaterial { voxel: usize, value: f64 },

    #[error("Compute backend error: {0}")]
    Compute(#[from] ComputeError),
}

/// Optical symmetry class of a material, selecting the rotation path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaterialKind {
    /// Orientation angles are ignored; a fixed axis swap
    /// (`theta = π/2`, `phi = -phi0`) is applied.
    Isotropic,
    /// Rotation without yaw.
    #[default]
    Uniaxial,
    /// Full rotation path (yaw fixed at zero).
    Biaxial,
}

/// Material kinds indexed by the material id stored in each orientation
/// sample.
///
/// An empty table treats every voxel as uniaxial and ignores the id slot.
/// Ids beyond the table length are uniaxial as well.
#[derive(Debug, Clone, Default)]
pub struct MaterialTable {
    kinds: Vec<MaterialKind>,
}

impl MaterialTable {
    pub fn new(kinds: Vec<MaterialKind>) -> Self {
        Self { kinds }
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Kind of material `id`.
    pub fn kind(&self, id: usize) -> MaterialKind {
        self.kinds.get(id).copied().unwrap_or_default()
    }
}

/// Azimuthal reference angle subtracted from every sample's `phi`.
#[derive(Debug, Clone)]
pub enum Azimuth {
    /// One angle for every voxel.
    Uniform(f64),
    /// One angle per voxel; the shape must equal the leading shape of the
    /// orientation array.
    PerVoxel(ArrayD<f64>),
}

impl Default for Azimuth {
    fn default() -> Self {
        Azimuth::Uniform(0.0)
    }
}

/// Builds rotation-matrix and permittivity-tensor fields from director data.
pub struct TensorFieldBuilder {
    /// Backend scheduling the per-voxel kernels.
    pub backend: Arc<dyn ComputeBackend>,
    /// Material kinds keyed by material id.
    pub materials: MaterialTable,
}

impl Default for TensorFieldBuilder {
    fn default() -> Self {
        Self {
            backend: Arc::new(CpuBackend::new()),
            materials: MaterialTable::default(),
        }
    }
}

/// Leading shape and voxel count of an orientation array `[..., 3]`.
fn leading_shape(angles: &ArrayViewD<'_, f64>) -> Result<(Vec<usize>, usize), TensorError> {
    let shape = angles.shape();
    match shape.split_last() {
        Some((&3, leading)) => Ok((leading.to_vec(), leading.iter().product())),
        _ => Err(TensorError::ShapeMismatch {
            what: "orientation samples",
            expected: vec![3],
            found: shape.to_vec(),
        }),
    }
}

fn output_array<T>(
    leading: &[usize],
    tail: &[usize],
    data: Vec<T>,
) -> Result<ArrayD<T>, TensorError> {
    let shape: Vec<usize> = leading.iter().chain(tail).copied().collect();
    let len = data.len();
    ArrayD::from_shape_vec(IxDyn(&shape), data).map_err(|_| TensorError::ShapeMismatch {
        what: "output buffer",
        expected: shape.clone(),
        found: vec![len],
    })
}

impl TensorFieldBuilder {
    /// Create a builder on the given backend with an empty material table.
    pub fn new(backend: Arc<dyn ComputeBackend>) -> Self {
        Self {
            backend,
            materials: MaterialTable::default(),
        }
    }

    /// Create a builder whose backend is selected by `config`.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self::new(config.backend()?))
    }

    pub fn with_materials(mut self, materials: MaterialTable) -> Self {
        self.materials = materials;
        self
    }

    /// Per-voxel material kinds, validating the id slot of every sample.
    fn voxel_kinds(&self, samples: &[f64]) -> Result<Vec<MaterialKind>, TensorError> {
        let nvoxels = samples.len() / 3;
        if self.materials.is_empty() {
            return Ok(vec![MaterialKind::Uniaxial; nvoxels]);
        }
        samples
            .chunks_exact(3)
            .enumerate()
            .map(|(voxel, sample)| {
                let id = sample[0];
                if !id.is_finite() || id < 0.0 || id.fract() != 0.0 {
                    return Err(TensorError::InvalidMaterial { voxel, value: id });
                }
                Ok(self.materials.kind(id as usize))
            })
            .collect()
    }

    /// Per-voxel azimuth reference angles.
    fn voxel_azimuths(
        phi0: &Azimuth,
        leading: &[usize],
        nvoxels: usize,
    ) -> Result<Vec<f64>, TensorError> {
        match phi0 {
            Azimuth::Uniform(value) => Ok(vec![*value; nvoxels]),
            Azimuth::PerVoxel(values) => {
                if values.shape() != leading {
                    return Err(TensorError::ShapeMismatch {
                        what: "azimuth reference",
                        expected: leading.to_vec(),
                        found: values.shape().to_vec(),
                    });
                }
                Ok(values.iter().copied().collect())
            }
        }
    }

    /// Build the rotation matrix of every voxel: `angles[..., 3] → [..., 3, 3]`.
    pub fn rotation_field(
        &self,
        angles: &ArrayViewD<'_, f64>,
        phi0: &Azimuth,
    ) -> Result<ArrayD<f64>, TensorError> {
        let (leading, nvoxels) = leading_shape(angles)?;
        let samples = row_major(angles);
        let kinds = self.voxel_kinds(&samples)?;
        let azimuths = Self::voxel_azimuths(phi0, &leading, nvoxels)?;

        log::debug!(
            "Building {} rotation matrices on {}",
            nvoxels,
            self.backend.device_info().name
        );

        let mut out = vec![0.0; nvoxels * 9];
        self.backend.fill_real_rows(&mut out, 9, &|i, row| {
            let sample = [samples[3 * i], samples[3 * i + 1], samples[3 * i + 2]];
            let r = voxel_rotation(kinds[i], &sample, azimuths[i]);
            for (dst, src) in row.iter_mut().zip(r.iter().flatten()) {
                *dst = *src;
            }
        })?;

        output_array(&leading, &[3, 3], out)
    }

    /// Build the packed lab-frame permittivity of every voxel:
    /// `angles[..., 3] → [..., 6]`.
    ///
    /// `diagonal` is either a single principal-frame tensor of shape `[3]`
    /// applied to every voxel, or one tensor per voxel with shape
    /// `[..., 3]` matching the leading shape of `angles`. The rotation matrix
    /// is consumed inside the kernel and never stored.
    pub fn tensor_field(
        &self,
        angles: &ArrayViewD<'_, f64>,
        diagonal: &ArrayViewD<'_, Complex64>,
        phi0: &Azimuth,
    ) -> Result<ArrayD<Complex64>, TensorError> {
        let (leading, nvoxels) = leading_shape(angles)?;
        let per_voxel = diagonal.shape() != [3];
        if per_voxel {
            let expected: Vec<usize> = leading.iter().copied().chain([3]).collect();
            if diagonal.shape() != expected.as_slice() {
                return Err(TensorError::ShapeMismatch {
                    what: "diagonal tensor",
                    expected,
                    found: diagonal.shape().to_vec(),
                });
            }
        }
        let samples = row_major(angles);
        let diagonals = row_major(diagonal);
        let kinds = self.voxel_kinds(&samples)?;
        let azimuths = Self::voxel_azimuths(phi0, &leading, nvoxels)?;

        log::debug!(
            "Building {} permittivity tensors on {}",
            nvoxels,
            self.backend.device_info().name
        );

        let mut out = vec![Complex64::new(0.0, 0.0); nvoxels * 6];
        self.backend.fill_complex_rows(&mut out, 6, &|i, row| {
            let offset = if per_voxel { 3 * i } else { 0 };
            let d: DiagonalTensor = [
                diagonals[offset],
                diagonals[offset + 1],
                diagonals[offset + 2],
            ];
            let sample = [samples[3 * i], samples[3 * i + 1], samples[3 * i + 2]];
            let r = voxel_rotation(kinds[i], &sample, azimuths[i]);
            row.copy_from_slice(&rotate_diagonal_tensor(&r, &d));
        })?;

        output_array(&leading, &[6], out)
    }
}

/// Rotation of a single voxel relative to the azimuth reference `phi0`.
pub fn voxel_rotation(kind: MaterialKind, sample: &OrientationSample, phi0: f64) -> RotationMatrix {
    match kind {
        MaterialKind::Isotropic => rotation_matrix_uniaxial(FRAC_PI_2, -phi0),
        MaterialKind::Uniaxial => rotation_matrix_uniaxial(sample[1], sample[2] - phi0),
        MaterialKind::Biaxial => rotation_matrix(0.0, sample[1], sample[2] - phi0),
    }
}
