//! Material provider trait.
//!
//! Every material implements [`MaterialProvider`], which returns the
//! principal refractive indices `(n1, n2, n3)` at a wavelength. The
//! principal-frame permittivity consumed by the tensor builder follows from
//! `ε = n²` ([`refind2eps`]).

use ndarray::Array2;
use nemato_core::types::{refind2eps, DiagonalTensor};
use num_complex::Complex64;
use thiserror::Error;

/// Errors from material providers.
#[derive(Debug, Error)]
pub enum MaterialError {
    #[error("Wavelength {wavelength_nm} nm is outside the data range [{min}, {max}] nm")]
    OutOfRange {
        wavelength_nm: f64,
        min: f64,
        max: f64,
    },

    #[error("Material not found: {0}")]
    NotFound(String),

    #[error("Data error: {0}")]
    DataError(String),
}

/// Provides wavelength-dependent principal refractive indices.
pub trait MaterialProvider: Send + Sync {
    /// Human-readable name of this material.
    fn name(&self) -> &str;

    /// Wavelength range over which the material is defined (nm).
    fn wavelength_range(&self) -> (f64, f64) {
        (0.0, f64::INFINITY)
    }

    /// Principal refractive indices along the x, y and z axes of the
    /// material frame. For uniaxial media the optical axis is z.
    fn principal_indices(&self, wavelength_nm: f64) -> Result<[Complex64; 3], MaterialError>;

    /// Principal-frame permittivity at `wavelength_nm`.
    fn principal_permittivity(&self, wavelength_nm: f64) -> Result<DiagonalTensor, MaterialError> {
        Ok(refind2eps(self.principal_indices(wavelength_nm)?))
    }

    /// Principal-frame permittivity for each wavelength, shape `[nw, 3]`.
    fn permittivity_spectrum(&self, wavelengths_nm: &[f64]) -> Result<Array2<Complex64>, MaterialError> {
        let mut out = Array2::zeros((wavelengths_nm.len(), 3));
        for (mut row, &wavelength) in out.outer_iter_mut().zip(wavelengths_nm) {
            let eps = self.principal_permittivity(wavelength)?;
            for (dst, src) in row.iter_mut().zip(eps) {
                *dst = src;
            }
        }
        Ok(out)
    }
}

/// Fail with [`MaterialError::OutOfRange`] when `wavelength_nm` lies outside
/// `provider`'s range.
pub(crate) fn check_range<P: MaterialProvider + ?Sized>(
    provider: &P,
    wavelength_nm: f64,
) -> Result<(), MaterialError> {
    let (min, max) = provider.wavelength_range();
    if wavelength_nm.is_nan() || wavelength_nm < min || wavelength_nm > max {
        return Err(MaterialError::OutOfRange {
            wavelength_nm,
            min,
            max,
        });
    }
    Ok(())
}
