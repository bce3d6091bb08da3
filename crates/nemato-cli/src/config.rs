//! TOML job files.
//!
//! ```toml
//! [config]            # optional engine settings, see nemato_core::Config
//! precision = "single"
//!
//! [illumination]
//! shape = [64, 64]
//! wavelengths = { range = [450.0, 650.0], points = 5 }
//! pixelsize = 100.0
//! na = 0.2
//! nrays = 20
//! window = { type = "aperture", diameter = 0.9, alpha = 0.1 }
//!
//! [director]
//! shape = [20, 64, 64]
//! type = "droplet"
//! structure = "radial"
//! region = { type = "sphere", radius = 12.0 }
//!
//! [material]
//! type = "named"
//! name = "5cb"
//!
//! [output]
//! directory = "./output"
//! name = "droplet"
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use nemato_core::Config;
use nemato_geometry::DirectorSpec;
use nemato_materials::MaterialSpec;
use serde::Deserialize;

/// Top-level job configuration.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobConfig {
    /// Engine settings; the user configuration is loaded when absent.
    #[serde(default)]
    pub config: Option<Config>,
    #[serde(default)]
    pub illumination: IlluminationConfig,
    #[serde(default)]
    pub director: Option<DirectorConfig>,
    #[serde(default)]
    pub material: MaterialConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Wavelength specification in nm: either a range or explicit list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WavelengthSpec {
    Range { range: [f64; 2], points: usize },
    List { values: Vec<f64> },
}

impl Default for WavelengthSpec {
    fn default() -> Self {
        WavelengthSpec::List {
            values: vec![550.0],
        }
    }
}

/// Field diaphragm multiplied into the input waves.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WindowConfig {
    Blackman,
    Aperture {
        #[serde(default = "default_one")]
        diameter: f64,
        #[serde(default = "default_alpha")]
        alpha: f64,
    },
}

/// Input light.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IlluminationConfig {
    /// Grid `[height, width]` in pixels.
    pub shape: [usize; 2],
    pub wavelengths: WavelengthSpec,
    /// Pixel size in nm.
    pub pixelsize: f64,
    /// Numerical aperture of a ray bundle; a single wave when absent.
    pub na: Option<f64>,
    /// Approximate number of rays in the bundle.
    pub nrays: usize,
    /// Incidence of a single wave.
    pub beta: f64,
    pub phi: f64,
    /// Refractive index of the input medium.
    pub n: f64,
    /// Focal plane in pixels.
    pub focus: f64,
    pub window: Option<WindowConfig>,
    pub backdir: bool,
    /// Real Jones vector `[x, y]`; both polarisations when absent.
    pub jones: Option<[f64; 2]>,
    pub betamax: f64,
}

impl Default for IlluminationConfig {
    fn default() -> Self {
        Self {
            shape: [64, 64],
            wavelengths: WavelengthSpec::default(),
            pixelsize: 100.0,
            na: None,
            nrays: 20,
            beta: 0.0,
            phi: 0.0,
            n: 1.0,
            focus: 0.0,
            window: None,
            backdir: false,
            jones: None,
            betamax: 0.9,
        }
    }
}

/// Director field of the sample.
#[derive(Debug, Clone, Deserialize)]
pub struct DirectorConfig {
    /// Grid `[nz, ny, nx]` in voxels.
    pub shape: [usize; 3],
    #[serde(flatten)]
    pub spec: DirectorSpec,
}

/// Liquid-crystal material and the isotropic host around it.
#[derive(Debug, Clone, Deserialize)]
pub struct MaterialConfig {
    /// Refractive index of host voxels.
    #[serde(default = "default_one")]
    pub host_index: f64,
    #[serde(flatten)]
    pub spec: MaterialSpec,
}

impl Default for MaterialConfig {
    fn default() -> Self {
        Self {
            host_index: 1.0,
            spec: MaterialSpec::default(),
        }
    }
}

/// Output configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub directory: String,
    /// Base name of the written files.
    pub name: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: "./output".into(),
            name: "nemato".into(),
        }
    }
}

fn default_one() -> f64 {
    1.0
}
fn default_alpha() -> f64 {
    0.1
}

/// Parse a job from TOML text.
pub fn parse_config(content: &str) -> Result<JobConfig> {
    let job: JobConfig = toml::from_str(content).context("Malformed job file")?;
    Ok(job)
}

/// Load and parse a TOML job configuration file.
pub fn load_config(path: &Path) -> Result<JobConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read job file {}", path.display()))?;
    parse_config(&content).with_context(|| format!("In {}", path.display()))
}

impl JobConfig {
    /// Engine settings of this job: the `[config]` section if given,
    /// otherwise the user configuration, with environment overrides either
    /// way.
    pub fn engine_config(&self) -> Result<Config> {
        match &self.config {
            Some(config) => {
                let mut config = config.clone().checked()?;
                config.apply_env(|key| std::env::var(key).ok())?;
                Ok(config)
            }
            None => Ok(Config::load()?),
        }
    }
}
