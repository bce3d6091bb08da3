//! Vector field data: validation, flux reduction and illumination.
//!
//! A field is sampled over a transverse `[H, W]` grid for each wavelength and
//! each of the four tangential components of the transfer-matrix formalism,
//! so field arrays always end in `[..., nwavelengths, 4, H, W]`. Leading axes
//! index polarisation branches, incidence directions or layers.

use std::f64::consts::PI;

use ndarray::{Array1, Array2, ArrayD, ArrayViewD, Axis, IxDyn};
use num_complex::Complex64;
use thiserror::Error;

use nemato_compute::ComputeError;

use crate::config::{Config, ConfigError};
use crate::diffract::{AngularSpectrum, Diffraction, PropagationMode};
use crate::types::FIELD_COMPONENTS;
use crate::wave::PlaneWaves;

/// Errors raised by field validation, reduction and construction.
#[derive(Debug, Error)]
pub enum FieldError {
    #[error("Invalid field data: {0}")]
    Validation(String),

    #[error("Shape mismatch for {what}: expected {expected}, found {found:?}")]
    Shape {
        what: &'static str,
        expected: String,
        found: Vec<usize>,
    },

    #[error("Empty input: {0}")]
    EmptyInput(&'static str),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Compute error: {0}")]
    Compute(#[from] ComputeError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Unchecked `(field, wavelengths, pixelsize)` triple as received from
/// callers or files.
pub type FieldTriple = (ArrayD<Complex64>, ArrayD<f64>, f64);

/// A validated field data triple.
///
/// Invariants: `field.ndim() >= 4`, `wavelengths.len() == field.shape()[ndim - 4]`,
/// `pixelsize` positive and finite. Construct through [`validate`] or
/// [`FieldData::new`].
#[derive(Debug, Clone, PartialEq)]
pub struct FieldData {
    field: ArrayD<Complex64>,
    wavelengths: Array1<f64>,
    pixelsize: f64,
}

impl FieldData {
    /// Check the invariants without changing any value.
    pub fn new(
        field: ArrayD<Complex64>,
        wavelengths: Array1<f64>,
        pixelsize: f64,
    ) -> Result<Self, FieldError> {
        if field.ndim() < 4 {
            return Err(FieldError::Validation(format!(
                "field must have at least 4 dimensions, found {}",
                field.ndim()
            )));
        }
        let nw = field.shape()[field.ndim() - 4];
        if wavelengths.len() != nw {
            return Err(FieldError::Validation(format!(
                "incompatible wavelengths: {} values for a wavelength axis of length {nw}",
                wavelengths.len()
            )));
        }
        if !(pixelsize.is_finite() && pixelsize > 0.0) {
            return Err(FieldError::Validation(format!(
                "pixel size must be positive and finite, found {pixelsize}"
            )));
        }
        Ok(Self {
            field,
            wavelengths,
            pixelsize,
        })
    }

    pub fn field(&self) -> &ArrayD<Complex64> {
        &self.field
    }

    pub fn wavelengths(&self) -> &Array1<f64> {
        &self.wavelengths
    }

    /// Pixel size in nm.
    pub fn pixelsize(&self) -> f64 {
        self.pixelsize
    }

    /// Transverse grid `(H, W)`.
    pub fn grid_shape(&self) -> (usize, usize) {
        let s = self.field.shape();
        (s[s.len() - 2], s[s.len() - 1])
    }

    pub fn into_parts(self) -> (ArrayD<Complex64>, Array1<f64>, f64) {
        (self.field, self.wavelengths, self.pixelsize)
    }

    /// Net forward flux per pixel, see [`field_to_intensity`].
    pub fn intensity(&self) -> Result<ArrayD<f64>, FieldError> {
        field_to_intensity(&self.field.view())
    }
}

/// Validate a field data triple and coerce its values to the configured
/// precision.
///
/// Single precision rounds every real and imaginary part through `f32`; the
/// pixel size is kept as a plain `f64` scalar.
pub fn validate(data: FieldTriple, config: &Config) -> Result<FieldData, FieldError> {
    let (mut field, wavelengths, pixelsize) = data;
    if wavelengths.ndim() != 1 {
        return Err(FieldError::Validation(format!(
            "wavelengths must be one-dimensional, found shape {:?}",
            wavelengths.shape()
        )));
    }
    let mut wavelengths = wavelengths
        .into_dimensionality::<ndarray::Ix1>()
        .map_err(|e| FieldError::Validation(e.to_string()))?;
    let precision = config.precision;
    field.mapv_inplace(|v| Complex64::new(precision.round(v.re), precision.round(v.im)));
    wavelengths.mapv_inplace(|v| precision.round(v));
    FieldData::new(field, wavelengths, pixelsize)
}

#[inline]
fn flux(f0: Complex64, f1: Complex64, f2: Complex64, f3: Complex64) -> f64 {
    (f0.re * f1.re + f0.im * f1.im) - (f2.re * f3.re + f2.im * f3.im)
}

fn require_core(
    what: &'static str,
    shape: &[usize],
    core: usize,
    expected: &str,
) -> Result<(), FieldError> {
    let ndim = shape.len();
    if ndim < core || shape[ndim - 3] != FIELD_COMPONENTS {
        return Err(FieldError::Shape {
            what,
            expected: expected.to_string(),
            found: shape.to_vec(),
        });
    }
    Ok(())
}

/// Reduce `[..., 4, H, W]` to the per-pixel net forward flux `[..., H, W]`:
/// `Re f0·Re f1 + Im f0·Im f1 − (Re f2·Re f3 + Im f2·Im f3)`.
pub fn field_to_intensity(field: &ArrayViewD<'_, Complex64>) -> Result<ArrayD<f64>, FieldError> {
    let shape = field.shape();
    require_core("intensity input", shape, 3, "[..., 4, H, W]")?;
    let ndim = shape.len();
    let (h, w) = (shape[ndim - 2], shape[ndim - 1]);
    let px = h * w;
    let data = field.as_standard_layout();
    let data = data.as_slice().unwrap_or_default();

    let mut out = Vec::with_capacity(data.len() / FIELD_COMPONENTS);
    if px > 0 {
        for block in data.chunks_exact(FIELD_COMPONENTS * px) {
            out.extend((0..px).map(|p| {
                flux(block[p], block[px + p], block[2 * px + p], block[3 * px + p])
            }));
        }
    }
    let mut out_shape = shape[..ndim - 3].to_vec();
    out_shape.extend([h, w]);
    to_array(out_shape, out)
}

fn to_array(shape: Vec<usize>, data: Vec<f64>) -> Result<ArrayD<f64>, FieldError> {
    ArrayD::from_shape_vec(IxDyn(&shape), data).map_err(|e| FieldError::InvalidArgument(e.to_string()))
}

/// Accumulate the spectra of `layers` consecutive `[nw, 4, H, W]` blocks
/// into one `[H, W, nw]` block.
fn accumulate_specter(blocks: &[Complex64], layers: usize, nw: usize, px: usize, out: &mut [f64]) {
    let block = nw * FIELD_COMPONENTS * px;
    for l in 0..layers {
        let layer = &blocks[l * block..(l + 1) * block];
        for k in 0..nw {
            let f = &layer[k * FIELD_COMPONENTS * px..(k + 1) * FIELD_COMPONENTS * px];
            for p in 0..px {
                let v = flux(f[p], f[px + p], f[2 * px + p], f[3 * px + p]);
                if l == 0 {
                    out[p * nw + k] = v;
                } else {
                    out[p * nw + k] += v;
                }
            }
        }
    }
}

fn specter_impl(
    field: &ArrayViewD<'_, Complex64>,
    summed: bool,
) -> Result<ArrayD<f64>, FieldError> {
    let shape = field.shape();
    let (what, core, expected) = if summed {
        ("specter-sum input", 5, "[..., L, W, 4, H, Wd]")
    } else {
        ("specter input", 4, "[..., W, 4, H, Wd]")
    };
    require_core(what, shape, core, expected)?;
    let ndim = shape.len();
    let (nw, h, w) = (shape[ndim - 4], shape[ndim - 2], shape[ndim - 1]);
    let layers = if summed { shape[ndim - 5] } else { 1 };
    if layers == 0 {
        return Err(FieldError::EmptyInput("specter sum over an empty layer axis"));
    }
    let px = h * w;
    let outer: usize = shape[..ndim - core].iter().product();
    let in_block = layers * nw * FIELD_COMPONENTS * px;
    let out_block = px * nw;

    let data = field.as_standard_layout();
    let data = data.as_slice().unwrap_or_default();
    let mut out = vec![0.0; outer * out_block];
    if in_block > 0 {
        for (blocks, out) in data
            .chunks_exact(in_block)
            .zip(out.chunks_exact_mut(out_block))
        {
            accumulate_specter(blocks, layers, nw, px, out);
        }
    }
    let mut out_shape = shape[..ndim - core].to_vec();
    out_shape.extend([h, w, nw]);
    to_array(out_shape, out)
}

/// Per-wavelength flux `[..., W, 4, H, Wd] -> [..., H, Wd, W]`; the
/// wavelength axis moves to the end.
pub fn field_to_specter(field: &ArrayViewD<'_, Complex64>) -> Result<ArrayD<f64>, FieldError> {
    specter_impl(field, false)
}

/// Incoherent sum of spectra over the layer axis,
/// `[..., L, W, 4, H, Wd] -> [..., H, Wd, W]`. An empty `L` is rejected.
pub fn field_to_specter_sum(field: &ArrayViewD<'_, Complex64>) -> Result<ArrayD<f64>, FieldError> {
    specter_impl(field, true)
}

/// Normalised Jones vector `(c, s)` of a fully polarised state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JonesVector {
    pub x: Complex64,
    pub y: Complex64,
}

impl JonesVector {
    pub const X: JonesVector = JonesVector {
        x: Complex64::new(1.0, 0.0),
        y: Complex64::new(0.0, 0.0),
    };
    pub const Y: JonesVector = JonesVector {
        x: Complex64::new(0.0, 0.0),
        y: Complex64::new(1.0, 0.0),
    };
}

/// Normalise a two-component polarisation vector.
///
/// ```
/// use nemato_core::field::jonesvec;
/// use num_complex::Complex64;
///
/// let left = jonesvec([Complex64::new(1.0, 0.0), Complex64::new(0.0, 1.0)]).unwrap();
/// assert!((left.y.im - 0.5f64.sqrt()).abs() < 1e-12);
/// ```
pub fn jonesvec(pol: [Complex64; 2]) -> Result<JonesVector, FieldError> {
    let norm = (pol[0].norm_sqr() + pol[1].norm_sqr()).sqrt();
    if !(norm.is_finite() && norm > 0.0) {
        return Err(FieldError::InvalidArgument(
            "Jones vector must have a finite non-zero norm".into(),
        ));
    }
    Ok(JonesVector {
        x: pol[0] / norm,
        y: pol[1] / norm,
    })
}

/// Direction(s) of the incident light.
#[derive(Debug, Clone, PartialEq)]
pub enum Incidence {
    /// One plane wave with the given `beta` and azimuth `phi`.
    Single { beta: f64, phi: f64 },
    /// A bundle of plane waves summed incoherently.
    Rays { beta: Vec<f64>, phi: Vec<f64> },
}

impl Default for Incidence {
    fn default() -> Self {
        Incidence::normal()
    }
}

impl Incidence {
    pub fn normal() -> Self {
        Incidence::Single {
            beta: 0.0,
            phi: 0.0,
        }
    }

    pub fn rays(beta: Vec<f64>, phi: Vec<f64>) -> Result<Self, FieldError> {
        if beta.len() != phi.len() {
            return Err(FieldError::InvalidArgument(format!(
                "{} beta values but {} phi values",
                beta.len(),
                phi.len()
            )));
        }
        if beta.is_empty() {
            return Err(FieldError::EmptyInput("ray bundle without rays"));
        }
        Ok(Incidence::Rays { beta, phi })
    }

    /// Number of incidence directions.
    pub fn len(&self) -> usize {
        match self {
            Incidence::Single { .. } => 1,
            Incidence::Rays { beta, .. } => beta.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn angles(&self) -> (Vec<f64>, Vec<f64>) {
        match self {
            Incidence::Single { beta, phi } => (vec![*beta], vec![*phi]),
            Incidence::Rays { beta, phi } => (beta.clone(), phi.clone()),
        }
    }
}

/// Ray bundle with a homogeneous angular distribution filling a numerical
/// aperture `na`, with approximately `nrays` rays.
pub fn illumination_betaphi(na: f64, nrays: usize) -> Result<Incidence, FieldError> {
    if nrays == 0 {
        return Err(FieldError::EmptyInput("illumination with zero rays"));
    }
    if !(na.is_finite() && na >= 0.0) {
        return Err(FieldError::InvalidArgument(format!(
            "numerical aperture must be non-negative, found {na}"
        )));
    }
    let radius = (nrays as f64 / PI).sqrt();
    let m = radius as i64;
    let mut beta = Vec::new();
    let mut phi = Vec::new();
    for y in -m..=m {
        for x in -m..=m {
            let (x, y) = (x as f64, y as f64);
            let b = (x * x + y * y).sqrt() / radius * na;
            if b <= na {
                beta.push(b);
                phi.push(y.atan2(x));
            }
        }
    }
    Incidence::rays(beta, phi)
}

/// Scalar plane waves for every incidence direction and wavenumber,
/// multiplied by an optional `[H, W]` window.
///
/// Returns `[nk, H, W]` for a single direction and `[nrays, nk, H, W]` for a
/// ray bundle.
pub fn illumination_waves(
    shape: (usize, usize),
    k0: &[f64],
    incidence: &Incidence,
    window: Option<&Array2<f64>>,
    waves: &PlaneWaves,
    config: &Config,
) -> Result<ArrayD<Complex64>, FieldError> {
    if let Some(window) = window {
        if window.dim() != shape {
            return Err(FieldError::Shape {
                what: "window",
                expected: format!("[{}, {}]", shape.0, shape.1),
                found: window.shape().to_vec(),
            });
        }
    }
    let (beta, phi) = incidence.angles();
    let mut out = waves.generate(config.cache, shape, k0, &beta, &phi).as_ref().clone();
    if let Some(window) = window {
        out.zip_mut_with(window, |v, &m| *v *= m);
    }
    let out = out.into_dyn();
    Ok(match incidence {
        Incidence::Single { .. } => out.index_axis_move(Axis(0), 0),
        Incidence::Rays { .. } => out,
    })
}

/// Expand scalar waves `[nk, H, W]` (one direction) or `[nrays, nk, H, W]`
/// into 4-component vector field data and propagate it by `-focus`.
///
/// Without a Jones vector two orthogonal polarisation branches are produced
/// on a new axis in front of `nk`: branch 0 fills components 0 and 1, branch 1
/// fills component 2 and the negated component 3. With a Jones vector
/// `(c, s)` the single wave fills the components as `c, c, s, −s`. Amplitudes
/// are normalised by `1/sqrt(nrays)`, with `nrays` counting directions times
/// polarisation branches.
#[allow(clippy::too_many_arguments)]
pub fn waves2field(
    waves: &ArrayViewD<'_, Complex64>,
    k0: &[f64],
    n: f64,
    focus: f64,
    jones: Option<JonesVector>,
    mode: PropagationMode,
    betamax: f64,
    diffraction: &dyn Diffraction,
) -> Result<ArrayD<Complex64>, FieldError> {
    let shape = waves.shape();
    let nk = k0.len();
    let (directions, single) = match shape {
        [k, _, _] if *k == nk => (1, true),
        [r, k, _, _] if *k == nk => (*r, false),
        _ => {
            return Err(FieldError::Shape {
                what: "waves",
                expected: format!("[{nk}, H, W] or [nrays, {nk}, H, W]"),
                found: shape.to_vec(),
            })
        }
    };
    let (h, w) = (shape[shape.len() - 2], shape[shape.len() - 1]);
    let px = h * w;

    let zero = Complex64::new(0.0, 0.0);
    let one = Complex64::new(1.0, 0.0);
    let branches: Vec<[Complex64; FIELD_COMPONENTS]> = match jones {
        None => vec![[one, one, zero, zero], [zero, zero, one, -one]],
        Some(j) => vec![[j.x, j.x, j.y, -j.y]],
    };
    let nrays = (directions * branches.len()) as f64;
    let norm = 1.0 / nrays.sqrt();

    let waves = waves.as_standard_layout();
    let waves = waves.as_slice().unwrap_or_default();
    let mut data = Vec::with_capacity(directions * branches.len() * nk * FIELD_COMPONENTS * px);
    for r in 0..directions {
        for coefficients in &branches {
            for k in 0..nk {
                let wave = &waves[(r * nk + k) * px..(r * nk + k + 1) * px];
                for c in coefficients {
                    data.extend(wave.iter().map(|v| v * c * norm));
                }
            }
        }
    }

    let mut out_shape = Vec::with_capacity(6);
    if !single {
        out_shape.push(directions);
    }
    if jones.is_none() {
        out_shape.push(2);
    }
    out_shape.extend([nk, FIELD_COMPONENTS, h, w]);
    let field = ArrayD::from_shape_vec(IxDyn(&out_shape), data)
        .map_err(|e| FieldError::InvalidArgument(e.to_string()))?;

    diffraction.diffracted_field(field, k0, -focus, n, mode, betamax)
}

/// Parameters of an input illumination.
#[derive(Debug, Clone)]
pub struct IlluminationParams {
    pub incidence: Incidence,
    /// Refractive index of the medium the light propagates in.
    pub n: f64,
    /// Focal plane, in pixels.
    pub focus: f64,
    pub window: Option<Array2<f64>>,
    /// Backward propagating light.
    pub backdir: bool,
    pub jones: Option<JonesVector>,
    pub betamax: f64,
}

impl Default for IlluminationParams {
    fn default() -> Self {
        Self {
            incidence: Incidence::normal(),
            n: 1.0,
            focus: 0.0,
            window: None,
            backdir: false,
            jones: None,
            betamax: 0.9,
        }
    }
}

/// Builds input illumination field data.
///
/// Holds the configuration, the plane-wave cache and the propagation
/// collaborator, so repeated illuminations of the same grid reuse work.
pub struct Illuminator {
    config: Config,
    waves: PlaneWaves,
    diffraction: Box<dyn Diffraction>,
}

impl Illuminator {
    /// Illuminator propagating with [`AngularSpectrum`] on the configured
    /// backend.
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let backend = config.backend()?;
        Ok(Self::with_diffraction(
            config,
            Box::new(AngularSpectrum::new(backend)),
        ))
    }

    pub fn with_diffraction(config: &Config, diffraction: Box<dyn Diffraction>) -> Self {
        Self {
            config: config.clone(),
            waves: PlaneWaves::new(),
            diffraction,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Forward (or, with `backdir`, backward) propagating illumination over a
    /// `shape` grid. Wavenumbers are `2π/λ · pixelsize`.
    pub fn illumination_data(
        &self,
        shape: (usize, usize),
        wavelengths: &[f64],
        pixelsize: f64,
        params: &IlluminationParams,
    ) -> Result<FieldData, FieldError> {
        if wavelengths.is_empty() {
            return Err(FieldError::EmptyInput("illumination without wavelengths"));
        }
        if let Some(bad) = wavelengths.iter().find(|l| !(l.is_finite() && **l > 0.0)) {
            return Err(FieldError::InvalidArgument(format!(
                "wavelengths must be positive, found {bad}"
            )));
        }
        if !(pixelsize.is_finite() && pixelsize > 0.0) {
            return Err(FieldError::Validation(format!(
                "pixel size must be positive and finite, found {pixelsize}"
            )));
        }
        let k0: Vec<f64> = wavelengths
            .iter()
            .map(|l| 2.0 * PI / l * pixelsize)
            .collect();
        log::debug!(
            "Illumination {}x{}: {} wavelengths, {} directions",
            shape.0,
            shape.1,
            k0.len(),
            params.incidence.len()
        );

        let waves = illumination_waves(
            shape,
            &k0,
            &params.incidence,
            params.window.as_ref(),
            &self.waves,
            &self.config,
        )?;
        let mode = if params.backdir {
            PropagationMode::Reflected
        } else {
            PropagationMode::Transmitted
        };
        let field = waves2field(
            &waves.view(),
            &k0,
            params.n,
            params.focus,
            params.jones,
            mode,
            params.betamax,
            self.diffraction.as_ref(),
        )?;
        let wavelengths = ArrayD::from_shape_vec(IxDyn(&[wavelengths.len()]), wavelengths.to_vec())
            .map_err(|e| FieldError::InvalidArgument(e.to_string()))?;
        validate((field, wavelengths, pixelsize), &self.config)
    }

    pub fn clear_cache(&self) {
        self.waves.clear_cache();
    }
}

/// One-shot illumination with default propagation on the configured backend.
pub fn illumination_data(
    shape: (usize, usize),
    wavelengths: &[f64],
    pixelsize: f64,
    params: &IlluminationParams,
    config: &Config,
) -> Result<FieldData, FieldError> {
    Illuminator::new(config)?.illumination_data(shape, wavelengths, pixelsize, params)
}
