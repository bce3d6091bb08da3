//! Plane-wave generation.

use std::sync::Arc;

use ndarray::{s, Array3, Array4, ArrayView1};
use num_complex::Complex64;

use crate::cache::{ArgKey, ResultCache};

/// Unit-amplitude plane wave `exp(i·k0·β·(cosφ·x + sinφ·y))` sampled at pixel
/// coordinates, one `[H, W]` slab per wavenumber.
///
/// `k0` is expressed in radians per pixel (`2π/λ · pixelsize`); `x` runs
/// along columns and `y` along rows.
pub fn planewave(shape: (usize, usize), k0: &[f64], beta: f64, phi: f64) -> Array3<Complex64> {
    let (h, w) = shape;
    let (sin_phi, cos_phi) = phi.sin_cos();
    Array3::from_shape_fn((k0.len(), h, w), |(k, i, j)| {
        let kt = k0[k] * beta;
        Complex64::from_polar(1.0, kt * (cos_phi * j as f64 + sin_phi * i as f64))
    })
}

/// Plane-wave stacks `[nrays, nk, H, W]`, memoising the latest request.
pub struct PlaneWaves {
    cache: ResultCache<Array4<Complex64>>,
}

impl Default for PlaneWaves {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaneWaves {
    pub fn new() -> Self {
        Self {
            cache: ResultCache::new("planewave"),
        }
    }

    /// One plane wave per `(beta[r], phi[r])` pair and wavenumber.
    ///
    /// `beta` and `phi` must have equal lengths; this is checked by the
    /// callers that build incidences.
    pub fn generate(
        &self,
        cached: bool,
        shape: (usize, usize),
        k0: &[f64],
        beta: &[f64],
        phi: &[f64],
    ) -> Arc<Array4<Complex64>> {
        let args = vec![
            ArgKey::from(shape.0),
            ArgKey::from(shape.1),
            ArgKey::real_array(&ArrayView1::from(k0).into_dyn()),
            ArgKey::real_array(&ArrayView1::from(beta).into_dyn()),
            ArgKey::real_array(&ArrayView1::from(phi).into_dyn()),
        ];
        let result = self.cache.get_or_compute(cached, args, || {
            let (h, w) = shape;
            let mut out = Array4::zeros((beta.len(), k0.len(), h, w));
            for (r, (&b, &p)) in beta.iter().zip(phi).enumerate() {
                out.slice_mut(s![r, .., .., ..])
                    .assign(&planewave(shape, k0, b, p));
            }
            Ok::<_, std::convert::Infallible>(out)
        });
        match result {
            Ok(waves) => waves,
            Err(never) => match never {},
        }
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}
