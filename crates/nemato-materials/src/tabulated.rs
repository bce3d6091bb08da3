//! Tabulated optical constants.
//!
//! Data are tabulated $(\lambda, n, k)$ triples per principal axis, each
//! column interpolated with a natural cubic spline. The built-in fused-silica
//! table is from E. D. Palik, *Handbook of Optical Constants of Solids*
//! (Academic Press, 1985), Vol. 1, pp. 749–763.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::provider::{check_range, MaterialError, MaterialProvider};
use crate::spline::CubicSpline;

/// One row of a table: wavelength (nm), real index `n`, extinction `k`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexSample {
    pub wavelength: f64,
    pub n: f64,
    #[serde(default)]
    pub k: f64,
}

#[derive(Debug, Clone)]
struct AxisSpline {
    n: CubicSpline,
    k: CubicSpline,
}

impl AxisSpline {
    fn new(wavelengths: &[f64], samples: &[IndexSample]) -> Result<Self, MaterialError> {
        Ok(Self {
            n: CubicSpline::try_new(wavelengths.to_vec(), samples.iter().map(|s| s.n).collect())?,
            k: CubicSpline::try_new(wavelengths.to_vec(), samples.iter().map(|s| s.k).collect())?,
        })
    }

    fn evaluate(&self, wavelength_nm: f64) -> Complex64 {
        // Interpolation overshoot must not create gain.
        Complex64::new(self.n.evaluate(wavelength_nm), self.k.evaluate(wavelength_nm).max(0.0))
    }
}

/// Material with spline-interpolated tabulated indices.
///
/// Isotropic when only the ordinary table is given; otherwise uniaxial with
/// the extraordinary table on the z axis. Both tables must share the same
/// wavelengths.
#[derive(Debug, Clone)]
pub struct TabulatedMaterial {
    name: String,
    range: (f64, f64),
    ordinary: AxisSpline,
    extraordinary: Option<AxisSpline>,
}

impl TabulatedMaterial {
    pub fn try_new(
        name: impl Into<String>,
        ordinary: &[IndexSample],
        extraordinary: Option<&[IndexSample]>,
    ) -> Result<Self, MaterialError> {
        let wavelengths: Vec<f64> = ordinary.iter().map(|s| s.wavelength).collect();
        let extraordinary = match extraordinary {
            Some(table) => {
                if table.len() != ordinary.len()
                    || table.iter().zip(&wavelengths).any(|(s, &w)| s.wavelength != w)
                {
                    return Err(MaterialError::DataError(
                        "ordinary and extraordinary tables must share wavelengths".into(),
                    ));
                }
                Some(AxisSpline::new(&wavelengths, table)?)
            }
            None => None,
        };
        let ordinary = AxisSpline::new(&wavelengths, ordinary)?;
        Ok(Self {
            name: name.into(),
            range: ordinary.n.range(),
            ordinary,
            extraordinary,
        })
    }

    /// Fused silica (amorphous SiO₂), 300–1000 nm, lossless in this range.
    pub fn fused_silica() -> Result<Self, MaterialError> {
        // (λ/nm, n)
        let data: &[(f64, f64)] = &[
            (300.0, 1.487),
            (320.0, 1.482),
            (340.0, 1.478),
            (360.0, 1.475),
            (380.0, 1.473),
            (400.0, 1.470),
            (440.0, 1.468),
            (480.0, 1.466),
            (500.0, 1.462),
            (540.0, 1.460),
            (580.0, 1.458),
            (620.0, 1.457),
            (660.0, 1.456),
            (700.0, 1.455),
            (760.0, 1.453),
            (800.0, 1.452),
            (860.0, 1.451),
            (900.0, 1.450),
            (960.0, 1.449),
            (1000.0, 1.448),
        ];
        let samples: Vec<IndexSample> = data
            .iter()
            .map(|&(wavelength, n)| IndexSample { wavelength, n, k: 0.0 })
            .collect();
        Self::try_new("SiO₂ (Palik)", &samples, None)
    }
}

impl MaterialProvider for TabulatedMaterial {
    fn name(&self) -> &str {
        &self.name
    }

    fn wavelength_range(&self) -> (f64, f64) {
        self.range
    }

    fn principal_indices(&self, wavelength_nm: f64) -> Result<[Complex64; 3], MaterialError> {
        check_range(self, wavelength_nm)?;
        let no = self.ordinary.evaluate(wavelength_nm);
        let ne = self
            .extraordinary
            .as_ref()
            .map_or(no, |e| e.evaluate(wavelength_nm));
        Ok([no, no, ne])
    }
}
