//! Material lookup by name and declarative material descriptions.

use serde::{Deserialize, Serialize};

use crate::cauchy::{Cauchy, CauchyMaterial};
use crate::provider::{MaterialError, MaterialProvider};
use crate::tabulated::{IndexSample, TabulatedMaterial};

/// Built-in material by identifier (case-insensitive).
///
/// | Identifier | Material |
/// |-----------|----------|
/// | `5cb` | 5CB nematic, Cauchy dispersion |
/// | `sio2`, `fused_silica` | Fused silica, Palik table |
pub fn by_name(name: &str) -> Result<Box<dyn MaterialProvider>, MaterialError> {
    match name.to_ascii_lowercase().as_str() {
        "5cb" => Ok(Box::new(CauchyMaterial::five_cb())),
        "sio2" | "fused_silica" => Ok(Box::new(TabulatedMaterial::fused_silica()?)),
        _ => Err(MaterialError::NotFound(name.to_string())),
    }
}

/// Material as written in a job file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MaterialSpec {
    /// One of the built-in materials, see [`by_name`].
    Named { name: String },
    /// Fixed ordinary and (optionally) extraordinary indices.
    Constant {
        no: f64,
        #[serde(default)]
        ne: Option<f64>,
    },
    /// Cauchy dispersion per axis.
    Cauchy {
        ordinary: Cauchy,
        #[serde(default)]
        extraordinary: Option<Cauchy>,
    },
    /// Tabulated `(wavelength, n, k)` rows per axis.
    Table {
        ordinary: Vec<IndexSample>,
        #[serde(default)]
        extraordinary: Option<Vec<IndexSample>>,
    },
}

impl Default for MaterialSpec {
    fn default() -> Self {
        MaterialSpec::Named { name: "5cb".into() }
    }
}

impl MaterialSpec {
    pub fn build(&self) -> Result<Box<dyn MaterialProvider>, MaterialError> {
        let cauchy = |ordinary: Cauchy, extraordinary: Option<Cauchy>| -> Box<dyn MaterialProvider> {
            Box::new(match extraordinary {
                Some(e) => CauchyMaterial::uniaxial("custom", ordinary, e),
                None => CauchyMaterial::isotropic("custom", ordinary),
            })
        };
        match self {
            MaterialSpec::Named { name } => by_name(name),
            MaterialSpec::Constant { no, ne } => {
                Ok(cauchy(Cauchy::constant(*no), ne.map(Cauchy::constant)))
            }
            MaterialSpec::Cauchy {
                ordinary,
                extraordinary,
            } => Ok(cauchy(*ordinary, *extraordinary)),
            MaterialSpec::Table {
                ordinary,
                extraordinary,
            } => Ok(Box::new(TabulatedMaterial::try_new(
                "custom",
                ordinary,
                extraordinary.as_deref(),
            )?)),
        }
    }
}
