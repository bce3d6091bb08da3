//! Field propagation through a homogeneous medium.
//!
//! Propagation is an external collaborator of the illumination builder and is
//! reached through the [`Diffraction`] trait. [`AngularSpectrum`] implements
//! it as a scalar angular-spectrum propagator: every `[H, W]` component slab
//! is transformed with a 2D FFT, each spatial frequency is advanced by its
//! own phase, and frequencies at or beyond the `betamax` cutoff are removed.

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use ndarray::{Array2, ArrayD};
use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};

use nemato_compute::{ComputeBackend, CpuBackend};

use crate::field::FieldError;
use crate::types::FIELD_COMPONENTS;

/// Propagation direction convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PropagationMode {
    /// Forward (transmitted) propagation, `"t"`.
    #[default]
    Transmitted,
    /// Backward (reflected) propagation, `"r"`.
    Reflected,
}

impl PropagationMode {
    fn sign(self) -> f64 {
        match self {
            PropagationMode::Transmitted => 1.0,
            PropagationMode::Reflected => -1.0,
        }
    }
}

impl FromStr for PropagationMode {
    type Err = FieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "t" | "transmitted" => Ok(PropagationMode::Transmitted),
            "r" | "reflected" => Ok(PropagationMode::Reflected),
            other => Err(FieldError::InvalidArgument(format!(
                "unknown propagation mode '{other}' (expected 't' or 'r')"
            ))),
        }
    }
}

impl fmt::Display for PropagationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropagationMode::Transmitted => write!(f, "t"),
            PropagationMode::Reflected => write!(f, "r"),
        }
    }
}

/// Propagates 4-component vector fields `[..., nk, 4, H, W]` over a distance
/// `d` (in pixels) through a medium of refractive index `n`.
pub trait Diffraction: Send + Sync {
    fn diffracted_field(
        &self,
        field: ArrayD<Complex64>,
        k0: &[f64],
        d: f64,
        n: f64,
        mode: PropagationMode,
        betamax: f64,
    ) -> Result<ArrayD<Complex64>, FieldError>;
}

/// Sample frequencies of a length-`n` DFT in cycles per sample.
pub fn fftfreq(n: usize) -> Vec<f64> {
    let half = n.div_ceil(2);
    (0..n)
        .map(|i| {
            let i = if i < half { i as f64 } else { i as f64 - n as f64 };
            i / n as f64
        })
        .collect()
}

/// Transfer function of one wavenumber: the propagation phase for admitted
/// frequencies and zero for frequencies with `β = |k⊥|/k0 ≥ betamax`.
pub fn transfer_function(
    shape: (usize, usize),
    k0: f64,
    d: f64,
    n: f64,
    mode: PropagationMode,
    betamax: f64,
) -> Array2<Complex64> {
    let (h, w) = shape;
    let fy = fftfreq(h);
    let fx = fftfreq(w);
    let sign = mode.sign();
    Array2::from_shape_fn(shape, |(i, j)| {
        let kx = 2.0 * PI * fx[j];
        let ky = 2.0 * PI * fy[i];
        let beta = (kx * kx + ky * ky).sqrt() / k0;
        if beta >= betamax {
            return Complex64::new(0.0, 0.0);
        }
        // Above n the root is imaginary and the phase becomes a decay.
        let kz = Complex64::new(n * n - beta * beta, 0.0).sqrt();
        (Complex64::i() * sign * k0 * d * kz).exp()
    })
}

struct Plans {
    row_fwd: Arc<dyn Fft<f64>>,
    col_fwd: Arc<dyn Fft<f64>>,
    row_inv: Arc<dyn Fft<f64>>,
    col_inv: Arc<dyn Fft<f64>>,
}

impl Plans {
    fn new(h: usize, w: usize) -> Self {
        let mut planner = FftPlanner::<f64>::new();
        Self {
            row_fwd: planner.plan_fft_forward(w),
            col_fwd: planner.plan_fft_forward(h),
            row_inv: planner.plan_fft_inverse(w),
            col_inv: planner.plan_fft_inverse(h),
        }
    }

    fn fft2(&self, data: &mut [Complex64], w: usize, inverse: bool) {
        let (row, col) = if inverse {
            (&self.row_inv, &self.col_inv)
        } else {
            (&self.row_fwd, &self.col_fwd)
        };
        let h = data.len() / w;
        for r in data.chunks_exact_mut(w) {
            row.process(r);
        }
        let mut col_buf = vec![Complex64::new(0.0, 0.0); h];
        for c in 0..w {
            for (r, v) in col_buf.iter_mut().enumerate() {
                *v = data[r * w + c];
            }
            col.process(&mut col_buf);
            for (r, v) in col_buf.iter().enumerate() {
                data[r * w + c] = *v;
            }
        }
        if inverse {
            let scale = 1.0 / data.len() as f64;
            data.iter_mut().for_each(|v| *v *= scale);
        }
    }
}

/// Scalar angular-spectrum propagator running on a compute backend.
///
/// Each of the four components is propagated independently with the same
/// transfer function; polarisation coupling of the eigenmode solver is not
/// modelled.
pub struct AngularSpectrum {
    backend: Arc<dyn ComputeBackend>,
}

impl Default for AngularSpectrum {
    fn default() -> Self {
        Self::new(Arc::new(CpuBackend::new()))
    }
}

impl AngularSpectrum {
    pub fn new(backend: Arc<dyn ComputeBackend>) -> Self {
        Self { backend }
    }
}

impl Diffraction for AngularSpectrum {
    fn diffracted_field(
        &self,
        field: ArrayD<Complex64>,
        k0: &[f64],
        d: f64,
        n: f64,
        mode: PropagationMode,
        betamax: f64,
    ) -> Result<ArrayD<Complex64>, FieldError> {
        let shape = field.shape().to_vec();
        let ndim = shape.len();
        if ndim < 4 || shape[ndim - 3] != FIELD_COMPONENTS || shape[ndim - 4] != k0.len() {
            return Err(FieldError::Shape {
                what: "diffracted field",
                expected: format!("[..., {}, {FIELD_COMPONENTS}, H, W]", k0.len()),
                found: shape,
            });
        }
        if k0.iter().any(|&k| !(k.is_finite() && k > 0.0)) {
            return Err(FieldError::InvalidArgument(
                "wavenumbers must be positive and finite".into(),
            ));
        }
        let (h, w) = (shape[ndim - 2], shape[ndim - 1]);
        let slab = h * w;
        if slab == 0 {
            return Ok(field);
        }

        let transfer: Vec<Array2<Complex64>> = k0
            .iter()
            .map(|&k| transfer_function((h, w), k, d, n, mode, betamax))
            .collect();
        let plans = Plans::new(h, w);
        log::debug!(
            "Angular-spectrum propagation of {} slabs ({h}x{w}), d = {d}, mode = {mode}",
            field.len() / slab
        );

        let mut field = if field.is_standard_layout() {
            field
        } else {
            field.as_standard_layout().into_owned()
        };
        let nk = k0.len();
        let data = field
            .as_slice_mut()
            .ok_or_else(|| FieldError::InvalidArgument("field is not contiguous".into()))?;
        self.backend.fill_complex_rows(data, slab, &|i, row| {
            let kernel = &transfer[(i / FIELD_COMPONENTS) % nk];
            plans.fft2(row, w, false);
            for (v, t) in row.iter_mut().zip(kernel.iter()) {
                *v *= *t;
            }
            plans.fft2(row, w, true);
        })?;
        Ok(field)
    }
}
