//! Cauchy dispersion for transparent dielectrics and nematic liquid crystals.
//!
//! $n(\lambda) = A + B/\lambda^2 + C/\lambda^4$ with $\lambda$ in µm. Uniaxial
//! materials carry one set of coefficients for the ordinary index (x and y)
//! and one for the extraordinary index (z, the optical axis).

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::provider::{check_range, MaterialError, MaterialProvider};

/// Cauchy coefficients `(A, B [µm²], C [µm⁴])`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cauchy {
    pub a: f64,
    #[serde(default)]
    pub b: f64,
    #[serde(default)]
    pub c: f64,
}

impl Cauchy {
    /// Non-dispersive index `n`.
    pub const fn constant(n: f64) -> Self {
        Self { a: n, b: 0.0, c: 0.0 }
    }

    /// Refractive index at `wavelength_nm`.
    pub fn index(&self, wavelength_nm: f64) -> f64 {
        let l2 = (wavelength_nm * 1e-3).powi(2);
        self.a + self.b / l2 + self.c / (l2 * l2)
    }
}

/// Isotropic or uniaxial material with Cauchy dispersion.
#[derive(Debug, Clone, PartialEq)]
pub struct CauchyMaterial {
    name: String,
    ordinary: Cauchy,
    extraordinary: Option<Cauchy>,
}

impl CauchyMaterial {
    pub fn isotropic(name: impl Into<String>, n: Cauchy) -> Self {
        Self {
            name: name.into(),
            ordinary: n,
            extraordinary: None,
        }
    }

    pub fn uniaxial(name: impl Into<String>, ordinary: Cauchy, extraordinary: Cauchy) -> Self {
        Self {
            name: name.into(),
            ordinary,
            extraordinary: Some(extraordinary),
        }
    }

    /// 5CB at 25 °C (J. Li and S.-T. Wu, J. Appl. Phys. 95, 896 (2004)).
    pub fn five_cb() -> Self {
        Self::uniaxial(
            "5CB",
            Cauchy {
                a: 1.5187,
                b: 0.0016,
                c: 0.0011,
            },
            Cauchy {
                a: 1.6795,
                b: 0.0048,
                c: 0.0027,
            },
        )
    }

    /// Birefringence `ne - no`; zero for isotropic materials.
    pub fn birefringence(&self, wavelength_nm: f64) -> f64 {
        match self.extraordinary {
            Some(e) => e.index(wavelength_nm) - self.ordinary.index(wavelength_nm),
            None => 0.0,
        }
    }
}

impl MaterialProvider for CauchyMaterial {
    fn name(&self) -> &str {
        &self.name
    }

    fn wavelength_range(&self) -> (f64, f64) {
        (f64::MIN_POSITIVE, f64::INFINITY)
    }

    fn principal_indices(&self, wavelength_nm: f64) -> Result<[Complex64; 3], MaterialError> {
        check_range(self, wavelength_nm)?;
        let no = Complex64::new(self.ordinary.index(wavelength_nm), 0.0);
        let ne = self
            .extraordinary
            .map_or(no, |e| Complex64::new(e.index(wavelength_nm), 0.0));
        Ok([no, no, ne])
    }
}
