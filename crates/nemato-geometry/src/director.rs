//! Director-field generators.
//!
//! A [`DirectorField`] holds the local optical axis `n = (nx, ny, nz)` of
//! every voxel of a `[nz, ny, nx]` grid together with the material id of the
//! voxel. Voxels outside the liquid-crystal region carry the host material
//! id and a zero director. [`DirectorField::to_angles`] turns the field into
//! the `(material_id, theta, phi)` orientation samples consumed by
//! `nemato_core::tensor::TensorFieldBuilder`.

use nalgebra::{Rotation3, Unit, Vector3};
use ndarray::{Array3, Array4, ArrayView4, Axis, Zip};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::discretise::{voxel_centre, voxelise, GridShape};
use crate::primitives::Primitive;

/// Material id of voxels outside the liquid-crystal region.
pub const HOST_ID: u16 = 0;
/// Material id of liquid-crystal voxels.
pub const NEMATIC_ID: u16 = 1;

#[derive(Debug, Error)]
pub enum DirectorError {
    #[error("Grid shape {0:?} has an empty axis")]
    EmptyGrid(GridShape),

    #[error("Director array must have shape [nz, ny, nx, 3], found {0:?}")]
    Shape(Vec<usize>),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Structure of the director inside a droplet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropletStructure {
    /// Director points away from the centre; a point defect at the centre.
    #[default]
    Radial,
    /// Director follows arcs joining two surface poles on the z axis.
    Bipolar,
}

/// Declarative description of a director field, as found in job files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DirectorSpec {
    /// Same director everywhere, given by tilt from z and azimuth from x.
    Uniform {
        #[serde(default)]
        theta: f64,
        #[serde(default)]
        phi: f64,
    },
    /// A nematic region inside an isotropic host.
    Droplet {
        region: Primitive,
        #[serde(default)]
        structure: DropletStructure,
    },
    /// Cell with a director rotating linearly about z from bottom to top.
    TwistedCell {
        /// Total twist angle (radians).
        twist: f64,
        /// Pretilt out of the xy plane (radians).
        #[serde(default)]
        tilt: f64,
    },
}

impl DirectorSpec {
    pub fn build(&self, shape: GridShape) -> Result<DirectorField, DirectorError> {
        match self {
            DirectorSpec::Uniform { theta, phi } => {
                let (st, ct) = theta.sin_cos();
                let (sp, cp) = phi.sin_cos();
                DirectorField::uniform(shape, [st * cp, st * sp, ct])
            }
            DirectorSpec::Droplet { region, structure } => match structure {
                DropletStructure::Radial => DirectorField::radial(shape, region),
                DropletStructure::Bipolar => DirectorField::bipolar(shape, region),
            },
            DirectorSpec::TwistedCell { twist, tilt } => {
                DirectorField::twisted_cell(shape, *twist, *tilt)
            }
        }
    }
}

/// Director and material id per voxel.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectorField {
    /// `[nz, ny, nx, 3]` director components `(nx, ny, nz)`.
    pub director: Array4<f64>,
    /// `[nz, ny, nx]` material ids.
    pub material: Array3<u16>,
}

fn check_shape(shape: GridShape) -> Result<(), DirectorError> {
    if shape.0 == 0 || shape.1 == 0 || shape.2 == 0 {
        return Err(DirectorError::EmptyGrid(shape));
    }
    Ok(())
}

fn normalised(v: Vector3<f64>) -> [f64; 3] {
    let norm = v.norm();
    if norm == 0.0 {
        [0.0; 3]
    } else {
        let v = v / norm;
        [v.x, v.y, v.z]
    }
}

impl DirectorField {
    /// Grid dimensions `(nz, ny, nx)`.
    pub fn shape(&self) -> GridShape {
        self.material.dim()
    }

    /// Nematic everywhere with a fixed director (normalised here).
    pub fn uniform(shape: GridShape, n: [f64; 3]) -> Result<Self, DirectorError> {
        check_shape(shape)?;
        let n = normalised(Vector3::from(n));
        if n == [0.0; 3] {
            return Err(DirectorError::InvalidParameter("zero director".into()));
        }
        let director = Array4::from_shape_fn((shape.0, shape.1, shape.2, 3), |(_, _, _, c)| n[c]);
        Ok(Self {
            director,
            material: Array3::from_elem(shape, NEMATIC_ID),
        })
    }

    /// Fill the voxels of `region` with a director computed from the offset
    /// of each voxel to the region centre.
    fn masked<F>(shape: GridShape, region: &Primitive, f: F) -> Result<Self, DirectorError>
    where
        F: Fn(Vector3<f64>) -> Vector3<f64>,
    {
        check_shape(shape)?;
        let mask = voxelise(region, shape);
        let centre = Vector3::from(region.centre());
        let mut director = Array4::zeros((shape.0, shape.1, shape.2, 3));
        for ((k, i, j), inside) in mask.indexed_iter() {
            if *inside {
                let r = Vector3::from(voxel_centre(shape, k, i, j)) - centre;
                let n = normalised(f(r));
                for (c, v) in n.iter().enumerate() {
                    director[[k, i, j, c]] = *v;
                }
            }
        }
        let material = mask.mapv(|inside| if inside { NEMATIC_ID } else { HOST_ID });
        Ok(Self { director, material })
    }

    /// Radial droplet: `n = r / |r|` inside `region`, zero at the centre.
    pub fn radial(shape: GridShape, region: &Primitive) -> Result<Self, DirectorError> {
        Self::masked(shape, region, |r| r)
    }

    /// Bipolar droplet with poles at `±R ẑ`, where `R` is the region's
    /// half-height. Field lines are the circular arcs through both poles:
    /// `n ∝ (−2xz, −2yz, R² + x² + y² − z²)`.
    pub fn bipolar(shape: GridShape, region: &Primitive) -> Result<Self, DirectorError> {
        let big_r = region.half_extents()[2];
        if big_r.is_nan() || big_r <= 0.0 {
            return Err(DirectorError::InvalidParameter(
                "bipolar droplet needs a region with positive height".into(),
            ));
        }
        Self::masked(shape, region, move |r| {
            let rho2 = r.x * r.x + r.y * r.y;
            Vector3::new(-2.0 * r.x * r.z, -2.0 * r.y * r.z, big_r * big_r + rho2 - r.z * r.z)
        })
    }

    /// Twisted cell: the in-plane director rotates linearly about z from
    /// azimuth 0 on the bottom layer to `twist` on the top layer, tilted out
    /// of plane by `tilt`.
    pub fn twisted_cell(shape: GridShape, twist: f64, tilt: f64) -> Result<Self, DirectorError> {
        check_shape(shape)?;
        let (nz, ny, nx) = shape;
        let base = Vector3::new(tilt.cos(), 0.0, tilt.sin());
        let axis = Unit::new_normalize(Vector3::z());
        let layers: Vec<[f64; 3]> = (0..nz)
            .map(|k| {
                let fraction = if nz > 1 { k as f64 / (nz - 1) as f64 } else { 0.0 };
                normalised(Rotation3::from_axis_angle(&axis, twist * fraction) * base)
            })
            .collect();
        let director = Array4::from_shape_fn((nz, ny, nx, 3), |(k, _, _, c)| layers[k][c]);
        Ok(Self {
            director,
            material: Array3::from_elem(shape, NEMATIC_ID),
        })
    }

    /// Orientation samples `[nz, ny, nx, 3]` of `(material_id, theta, phi)`.
    pub fn to_angles(&self) -> Array4<f64> {
        let mut angles = director_to_angles(&self.director.view());
        Zip::from(angles.lanes_mut(Axis(3)))
            .and(&self.material)
            .for_each(|mut sample, &id| sample[0] = f64::from(id));
        angles
    }
}

/// Orientation angles of a director: `theta` is the tilt from z and `phi`
/// the azimuth chosen so that the rotation `Rz(phi)·Ry(theta)` maps `ẑ` onto
/// `n`, i.e. `R·ẑ = n / |n|`. Zero directors give zero angles.
pub fn director_angles(n: [f64; 3]) -> (f64, f64) {
    let [x, y, z] = n;
    let rho = (x * x + y * y).sqrt();
    if rho == 0.0 && z == 0.0 {
        return (0.0, 0.0);
    }
    let theta = rho.atan2(z);
    let phi = if rho == 0.0 { 0.0 } else { (-y).atan2(-x) };
    (theta, phi)
}

/// Convert a `[..., 3]` director array into `(0, theta, phi)` samples.
pub fn director_to_angles(director: &ArrayView4<'_, f64>) -> Array4<f64> {
    let mut out = Array4::zeros(director.raw_dim());
    Zip::from(out.lanes_mut(Axis(3)))
        .and(director.lanes(Axis(3)))
        .for_each(|mut sample, n| {
            let (theta, phi) = director_angles([n[0], n[1], n[2]]);
            sample[1] = theta;
            sample[2] = phi;
        });
    out
}

/// Wrap a raw `[nz, ny, nx, 3]` director array, marking voxels with a
/// non-zero director as nematic.
pub fn from_director_array(director: Array4<f64>) -> Result<DirectorField, DirectorError> {
    if director.shape()[3] != 3 {
        return Err(DirectorError::Shape(director.shape().to_vec()));
    }
    let material = director
        .lanes(Axis(3))
        .into_iter()
        .map(|n| if n.iter().any(|v| *v != 0.0) { NEMATIC_ID } else { HOST_ID })
        .collect::<Vec<_>>();
    let (nz, ny, nx, _) = director.dim();
    let material = Array3::from_shape_vec((nz, ny, nx), material)
        .map_err(|_| DirectorError::Shape(director.shape().to_vec()))?;
    Ok(DirectorField { director, material })
}
