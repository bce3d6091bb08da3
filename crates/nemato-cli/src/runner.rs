//! Job runner: ties together illumination, director fields, materials and
//! the tensor builder.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use ndarray::{stack, Array4, ArrayD, Axis};
use num_complex::Complex64;
use serde::Serialize;

use nemato_core::field::{
    field_to_specter, illumination_betaphi, jonesvec, FieldData, Illuminator, Incidence,
    IlluminationParams,
};
use nemato_core::tensor::{Azimuth, MaterialKind, MaterialTable};
use nemato_core::{npy, window, Config, Precision, TensorFieldBuilder};
use nemato_geometry::director::HOST_ID;

use crate::config::{IlluminationConfig, JobConfig, WavelengthSpec, WindowConfig};

/// Expand a wavelength specification into an explicit list (nm).
pub fn wavelengths(spec: &WavelengthSpec) -> Result<Vec<f64>> {
    let values = match spec {
        WavelengthSpec::Range { range, points } => {
            if *points == 0 {
                bail!("Wavelength range needs at least one point");
            }
            let [start, end] = *range;
            (0..*points)
                .map(|i| start + (end - start) * i as f64 / (*points - 1).max(1) as f64)
                .collect::<Vec<_>>()
        }
        WavelengthSpec::List { values } => values.clone(),
    };
    if values.is_empty() {
        bail!("No wavelengths given");
    }
    Ok(values)
}

/// Translate the `[illumination]` section into engine parameters.
pub fn illumination_params(ill: &IlluminationConfig) -> Result<IlluminationParams> {
    let shape = (ill.shape[0], ill.shape[1]);
    let incidence = match ill.na {
        Some(na) => illumination_betaphi(na, ill.nrays)?,
        None => Incidence::Single {
            beta: ill.beta,
            phi: ill.phi,
        },
    };
    let window = ill.window.as_ref().map(|w| match w {
        WindowConfig::Blackman => window::blackman(shape),
        WindowConfig::Aperture { diameter, alpha } => window::aperture(shape, *diameter, *alpha),
    });
    let jones = ill
        .jones
        .map(|[x, y]| jonesvec([Complex64::new(x, 0.0), Complex64::new(y, 0.0)]))
        .transpose()?;
    Ok(IlluminationParams {
        incidence,
        n: ill.n,
        focus: ill.focus,
        window,
        backdir: ill.backdir,
        jones,
        betamax: ill.betamax,
    })
}

/// Build the input field data described by a job.
pub fn run_illumination(job: &JobConfig, config: &Config) -> Result<FieldData> {
    let ill = &job.illumination;
    let wavelengths = wavelengths(&ill.wavelengths)?;
    let params = illumination_params(ill)?;
    println!(
        "Illumination: {}x{} pixels, {} wavelength(s), {} direction(s)",
        ill.shape[0],
        ill.shape[1],
        wavelengths.len(),
        params.incidence.len()
    );
    let illuminator = Illuminator::new(config)?;
    let data = illuminator.illumination_data(
        (ill.shape[0], ill.shape[1]),
        &wavelengths,
        ill.pixelsize,
        &params,
    )?;
    Ok(data)
}

/// Permittivity tensor fields of a job, one per wavelength.
pub struct TensorOutput {
    pub wavelengths: Vec<f64>,
    /// `[nw, nz, ny, nx, 6]` packed lab-frame permittivity.
    pub tensor: ArrayD<Complex64>,
}

/// Build the packed permittivity of every voxel at every job wavelength.
pub fn run_tensor(job: &JobConfig, config: &Config) -> Result<TensorOutput> {
    let director = job
        .director
        .as_ref()
        .context("Job has no [director] section")?;
    let [nz, ny, nx] = director.shape;
    let field = director.spec.build((nz, ny, nx))?;
    let angles = field.to_angles().into_dyn();
    let provider = job.material.spec.build()?;
    let wavelengths = wavelengths(&job.illumination.wavelengths)?;
    println!(
        "Director: {}x{}x{} voxels, material {}",
        nz,
        ny,
        nx,
        provider.name()
    );

    let host = Complex64::new(job.material.host_index.powi(2), 0.0);
    let builder = TensorFieldBuilder::from_config(config)?.with_materials(MaterialTable::new(
        vec![MaterialKind::Isotropic, MaterialKind::Uniaxial],
    ));

    let mut per_wavelength = Vec::with_capacity(wavelengths.len());
    for &wavelength in &wavelengths {
        let eps = provider
            .principal_permittivity(wavelength)
            .with_context(|| format!("Material '{}' at {wavelength:.1} nm", provider.name()))?;
        let diagonal = Array4::from_shape_fn((nz, ny, nx, 3), |(k, i, j, c)| {
            if field.material[[k, i, j]] == HOST_ID {
                host
            } else {
                eps[c]
            }
        })
        .into_dyn();
        let tensor = builder.tensor_field(&angles.view(), &diagonal.view(), &Azimuth::default())?;
        per_wavelength.push(tensor);
    }
    let views: Vec<_> = per_wavelength.iter().map(|t| t.view()).collect();
    let tensor = stack(Axis(0), &views)?;
    Ok(TensorOutput {
        wavelengths,
        tensor,
    })
}

/// Write a tensor field as a NumPy `.npy` file.
pub fn write_tensor(path: &Path, output: &TensorOutput, precision: Precision) -> Result<PathBuf> {
    let path = if path.extension().is_some() {
        path.to_path_buf()
    } else {
        path.with_extension("npy")
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut w = BufWriter::new(
        File::create(&path).with_context(|| format!("Cannot create {}", path.display()))?,
    );
    npy::write_complex(&mut w, &output.tensor.view(), precision)?;
    w.flush()?;
    log::info!(
        "Saved tensor field {:?} to {}",
        output.tensor.shape(),
        path.display()
    );
    Ok(path)
}

/// Short description of a field data file.
#[derive(Debug, Serialize)]
pub struct FieldSummary {
    pub shape: Vec<usize>,
    pub wavelengths: Vec<f64>,
    pub pixelsize: f64,
    /// Flux averaged over pixels and leading axes, per wavelength.
    pub mean_flux: Vec<f64>,
}

pub fn summarise(data: &FieldData) -> Result<FieldSummary> {
    let nw = data.wavelengths().len();
    let specter = field_to_specter(&data.field().view())?;
    let rows = specter.len() / nw.max(1);
    let mean_flux = specter
        .into_shape_with_order((rows, nw))?
        .mean_axis(Axis(0))
        .map(|m| m.to_vec())
        .unwrap_or_default();
    Ok(FieldSummary {
        shape: data.field().shape().to_vec(),
        wavelengths: data.wavelengths().to_vec(),
        pixelsize: data.pixelsize(),
        mean_flux,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use approx::assert_abs_diff_eq;
    use nemato_core::config::BackendChoice;

    fn sequential() -> Config {
        Config {
            backend: BackendChoice::Sequential,
            ..Default::default()
        }
    }

    #[test]
    fn test_wavelength_range() {
        let w = wavelengths(&WavelengthSpec::Range {
            range: [400.0, 600.0],
            points: 3,
        })
        .unwrap();
        assert_eq!(w, vec![400.0, 500.0, 600.0]);
        assert!(wavelengths(&WavelengthSpec::Range {
            range: [400.0, 600.0],
            points: 0
        })
        .is_err());
        assert!(wavelengths(&WavelengthSpec::List { values: vec![] }).is_err());
    }

    #[test]
    fn test_normal_incidence_job() {
        let job = parse_config(
            "[illumination]\nshape = [8, 8]\nwavelengths = { values = [500.0, 600.0] }\n",
        )
        .unwrap();
        let data = run_illumination(&job, &sequential()).unwrap();
        assert_eq!(data.field().shape(), &[2, 2, 4, 8, 8]);

        let summary = summarise(&data).unwrap();
        assert_eq!(summary.wavelengths, vec![500.0, 600.0]);
        for flux in summary.mean_flux {
            assert_abs_diff_eq!(flux, 0.5, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_ray_bundle_params() {
        let job = parse_config(
            "[illumination]\nna = 0.1\nnrays = 10\njones = [0.0, 2.0]\nwindow = { type = \"blackman\" }\n",
        )
        .unwrap();
        let params = illumination_params(&job.illumination).unwrap();
        assert!(params.incidence.len() > 1);
        assert_eq!(params.window.as_ref().map(|w| w.dim()), Some((64, 64)));
        let jones = params.jones.unwrap();
        assert_abs_diff_eq!(jones.y.re, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_tensor_job_with_host() {
        let job = parse_config(
            r#"
            [illumination]
            wavelengths = { values = [550.0] }

            [director]
            shape = [5, 5, 5]
            type = "droplet"
            region = { type = "sphere", radius = 1.5 }

            [material]
            host_index = 1.5
            type = "constant"
            no = 1.5
            ne = 1.7
            "#,
        )
        .unwrap();
        let out = run_tensor(&job, &sequential()).unwrap();
        assert_eq!(out.tensor.shape(), &[1, 5, 5, 5, 6]);

        // Host corner voxel: isotropic 2.25.
        for c in 0..3 {
            assert_abs_diff_eq!(out.tensor[[0, 0, 0, 0, c]].re, 2.25, epsilon = 1e-12);
            assert_abs_diff_eq!(out.tensor[[0, 0, 0, 0, c + 3]].norm(), 0.0, epsilon = 1e-12);
        }
        // Voxel at x = +1 inside the radial droplet: optical axis along x.
        assert_abs_diff_eq!(out.tensor[[0, 2, 2, 3, 0]].re, 2.89, epsilon = 1e-9);
        assert_abs_diff_eq!(out.tensor[[0, 2, 2, 3, 1]].re, 2.25, epsilon = 1e-9);
        assert_abs_diff_eq!(out.tensor[[0, 2, 2, 3, 2]].re, 2.25, epsilon = 1e-9);
    }

    #[test]
    fn test_tensor_needs_director() {
        let job = parse_config("").unwrap();
        assert!(run_tensor(&job, &sequential()).is_err());
    }
}
